//! In-process backend stub for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{AgentReply, Backend, HealthStatus, HistoryEntry};
use crate::catalog::{Agent, Experience};
use crate::error::ApiError;

fn server_error(endpoint: &str) -> ApiError {
    ApiError::Status {
        endpoint: endpoint.to_string(),
        status: 500,
    }
}

/// Scriptable [`Backend`]. Selections and sends can be held open with gates
/// to reproduce in-flight ordering.
#[derive(Default)]
pub struct StubBackend {
    agents: Vec<Agent>,
    experiences: Vec<Experience>,
    fail_loads: bool,
    fail_actions: bool,
    failing_selects: HashSet<String>,
    greetings: HashMap<String, AgentReply>,
    reply: Option<AgentReply>,
    select_gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    send_gate: Mutex<Option<Arc<Semaphore>>>,
    sent: Mutex<Vec<(String, String)>>,
    history: Mutex<Vec<HistoryEntry>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(mut self, agents: Vec<Agent>) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_experiences(mut self, experiences: Vec<Experience>) -> Self {
        self.experiences = experiences;
        self
    }

    /// Greeting returned when `agent_id` is selected. Defaults to
    /// `"Hola desde {agent_id}"`.
    pub fn with_greeting(mut self, agent_id: &str, reply: AgentReply) -> Self {
        self.greetings.insert(agent_id.to_string(), reply);
        self
    }

    /// Fixed reply to every sent message. Defaults to an echo.
    pub fn with_reply(mut self, reply: AgentReply) -> Self {
        self.reply = Some(reply);
        self
    }

    pub fn failing_loads(mut self) -> Self {
        self.fail_loads = true;
        self
    }

    pub fn failing_actions(mut self) -> Self {
        self.fail_actions = true;
        self
    }

    /// Fail selections of `agent_id` only.
    pub fn failing_select_for(mut self, agent_id: &str) -> Self {
        self.failing_selects.insert(agent_id.to_string());
        self
    }

    /// Hold selections of `agent_id` until a permit is added to the gate.
    pub fn gate_select(&self, agent_id: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.select_gates
            .lock()
            .unwrap()
            .insert(agent_id.to_string(), Arc::clone(&gate));
        gate
    }

    /// Hold every send until a permit is added to the gate.
    pub fn gate_send(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.send_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Messages received so far, as `(agent_id, message)`.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    async fn pass(gate: Option<Arc<Semaphore>>) {
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn list_agents(&self) -> Result<Vec<Agent>, ApiError> {
        if self.fail_loads {
            return Err(server_error("/api/agentes"));
        }
        Ok(self.agents.clone())
    }

    async fn list_experiences(&self) -> Result<Vec<Experience>, ApiError> {
        if self.fail_loads {
            return Err(server_error("/api/experiencias"));
        }
        Ok(self.experiences.clone())
    }

    async fn select_agent(&self, agent_id: &str) -> Result<AgentReply, ApiError> {
        let gate = self.select_gates.lock().unwrap().get(agent_id).cloned();
        Self::pass(gate).await;
        if self.fail_actions || self.failing_selects.contains(agent_id) {
            return Err(server_error("/api/agente/seleccionar"));
        }
        Ok(self
            .greetings
            .get(agent_id)
            .cloned()
            .unwrap_or_else(|| AgentReply::text(format!("Hola desde {agent_id}"))))
    }

    async fn send_message(&self, agent_id: &str, message: &str) -> Result<AgentReply, ApiError> {
        self.sent
            .lock()
            .unwrap()
            .push((agent_id.to_string(), message.to_string()));
        let gate = self.send_gate.lock().unwrap().clone();
        Self::pass(gate).await;
        if self.fail_actions {
            return Err(server_error("/api/mensaje"));
        }
        let reply = self
            .reply
            .clone()
            .unwrap_or_else(|| AgentReply::text(format!("eco: {message}")));
        self.history.lock().unwrap().push(HistoryEntry {
            agent_id: agent_id.to_string(),
            user_message: message.to_string(),
            reply: reply.message.clone().unwrap_or_default(),
        });
        Ok(reply)
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        Ok(HealthStatus {
            status: "OK".into(),
            service: "stub".into(),
            agents_available: self.agents.len(),
        })
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        Ok(self.history.lock().unwrap().clone())
    }

    async fn clear_history(&self) -> Result<(), ApiError> {
        self.history.lock().unwrap().clear();
        Ok(())
    }
}
