//! reqwest-backed implementation of [`Backend`].

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{
    AgentReply, Backend, ExperiencesEnvelope, HealthStatus, HistoryEntry, HistoryEnvelope,
    MessageRequest, SelectAgentRequest,
};
use crate::catalog::{Agent, Experience};
use crate::config::ClientConfig;
use crate::error::ApiError;

/// HTTP client for the DATAR backend.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a client with no request timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| ApiError::InvalidUrl {
            url: config.api_base_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.client.get(self.url(path));
        self.execute(path, request).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.url(path)).json(body);
        self.execute(path, request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        debug!(endpoint = %path, "Backend request");

        let resp = request.send().await.map_err(|e| {
            warn!(endpoint = %path, error = %e, "Backend request failed");
            ApiError::RequestFailed {
                endpoint: path.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(endpoint = %path, status = %status, "Backend returned error status");
            return Err(ApiError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        resp.json::<T>().await.map_err(|e| ApiError::InvalidBody {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_agents(&self) -> Result<Vec<Agent>, ApiError> {
        self.get_json("/api/agentes").await
    }

    async fn list_experiences(&self) -> Result<Vec<Experience>, ApiError> {
        let envelope: ExperiencesEnvelope = self.get_json("/api/experiencias").await?;
        Ok(envelope.experiencias)
    }

    async fn select_agent(&self, agent_id: &str) -> Result<AgentReply, ApiError> {
        let body = SelectAgentRequest {
            agente_id: agent_id.to_string(),
        };
        self.post_json("/api/agente/seleccionar", &body).await
    }

    async fn send_message(&self, agent_id: &str, message: &str) -> Result<AgentReply, ApiError> {
        let body = MessageRequest {
            mensaje: message.to_string(),
            agente_id: agent_id.to_string(),
        };
        self.post_json("/api/mensaje", &body).await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get_json("/health").await
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        let envelope: HistoryEnvelope = self.get_json("/api/historial").await?;
        Ok(envelope.historial)
    }

    async fn clear_history(&self) -> Result<(), ApiError> {
        let path = "/api/historial/limpiar";
        let request = self.client.delete(self.url(path));
        // Response body is a confirmation message; only the status matters.
        let _: serde_json::Value = self.execute(path, request).await?;
        Ok(())
    }
}
