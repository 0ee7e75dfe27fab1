//! The DATAR REST API as seen from the client.

pub mod http;
#[cfg(test)]
pub mod testing;

pub use http::HttpBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::{Agent, Experience};
use crate::error::ApiError;

/// Reply to a selection or a chat message. `mensaje` is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    #[serde(rename = "mensaje", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AgentReply {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// The message if present and non-blank.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }
}

/// One logged exchange from the backend's conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "agente")]
    pub agent_id: String,
    #[serde(rename = "usuario")]
    pub user_message: String,
    #[serde(rename = "respuesta")]
    pub reply: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(rename = "servicio", default)]
    pub service: String,
    #[serde(rename = "agentes_disponibles", default)]
    pub agents_available: usize,
}

/// Body of `POST /api/agente/seleccionar`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectAgentRequest {
    pub agente_id: String,
}

/// Body of `POST /api/mensaje`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageRequest {
    pub mensaje: String,
    pub agente_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExperiencesEnvelope {
    pub experiencias: Vec<Experience>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryEnvelope {
    #[serde(default)]
    pub historial: Vec<HistoryEntry>,
}

/// Operations the client needs from the backend.
///
/// Any non-2xx response is a failure; bodies of failed responses are never
/// inspected.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /api/agentes`
    async fn list_agents(&self) -> Result<Vec<Agent>, ApiError>;

    /// `GET /api/experiencias`
    async fn list_experiences(&self) -> Result<Vec<Experience>, ApiError>;

    /// `POST /api/agente/seleccionar`
    async fn select_agent(&self, agent_id: &str) -> Result<AgentReply, ApiError>;

    /// `POST /api/mensaje`
    async fn send_message(&self, agent_id: &str, message: &str) -> Result<AgentReply, ApiError>;

    /// `GET /health`
    async fn health(&self) -> Result<HealthStatus, ApiError>;

    /// `GET /api/historial`
    async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError>;

    /// `DELETE /api/historial/limpiar`
    async fn clear_history(&self) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_without_mensaje() {
        let reply: AgentReply = serde_json::from_str(r#"{"exitoso": true}"#).unwrap();
        assert!(reply.message().is_none());
    }

    #[test]
    fn blank_reply_counts_as_missing() {
        assert!(AgentReply::text("   ").message().is_none());
        assert_eq!(AgentReply::text("hola").message(), Some("hola"));
    }

    #[test]
    fn request_bodies_use_backend_names() {
        let body = serde_json::to_value(MessageRequest {
            mensaje: "hola".into(),
            agente_id: "bosque".into(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"mensaje": "hola", "agente_id": "bosque"}));
    }

    #[test]
    fn history_entry_parses() {
        let env: HistoryEnvelope = serde_json::from_str(
            r#"{"historial": [{"agente": "bosque", "usuario": "hola", "respuesta": "hey"}]}"#,
        )
        .unwrap();
        assert_eq!(env.historial[0].agent_id, "bosque");
        assert_eq!(env.historial[0].reply, "hey");
    }
}
