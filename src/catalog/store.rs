//! In-memory catalog store.

use std::sync::Arc;

use tracing::{debug, info};

use super::model::{Agent, Experience};
use crate::api::Backend;
use crate::error::{ApiError, CatalogError};

/// Agents and experiences for the current session.
///
/// Lists are replaced wholesale on a successful load and left untouched on
/// failure.
#[derive(Debug, Default)]
pub struct CatalogStore {
    agents: Vec<Agent>,
    experiences: Vec<Arc<Experience>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-fetched lists.
    #[cfg(test)]
    pub fn with_contents(agents: Vec<Agent>, experiences: Vec<Experience>) -> Self {
        Self {
            agents,
            experiences: experiences.into_iter().map(Arc::new).collect(),
        }
    }

    /// Fetch the agent list. Returns the number of agents loaded.
    pub async fn load_agents(&mut self, backend: &dyn Backend) -> Result<usize, ApiError> {
        let agents = backend.list_agents().await?;
        info!(count = agents.len(), "Agents loaded");
        self.agents = agents;
        Ok(self.agents.len())
    }

    /// Fetch the experience list. Returns the number of experiences loaded.
    pub async fn load_experiences(&mut self, backend: &dyn Backend) -> Result<usize, ApiError> {
        let experiences = backend.list_experiences().await?;
        info!(count = experiences.len(), "Experiences loaded");
        self.experiences = experiences.into_iter().map(Arc::new).collect();
        Ok(self.experiences.len())
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn experiences(&self) -> &[Arc<Experience>] {
        &self.experiences
    }

    /// Look up an agent by ID.
    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Look up an agent, failing with `AgentNotFound`.
    pub fn require_agent(&self, id: &str) -> Result<&Agent, CatalogError> {
        self.agent(id).ok_or_else(|| {
            debug!(agent_id = %id, "Agent lookup missed");
            CatalogError::AgentNotFound { id: id.to_string() }
        })
    }

    /// Look up an experience, failing with `ExperienceNotFound`.
    pub fn require_experience(&self, id: &str) -> Result<Arc<Experience>, CatalogError> {
        self.experiences
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| {
                debug!(experience_id = %id, "Experience lookup missed");
                CatalogError::ExperienceNotFound { id: id.to_string() }
            })
    }
}
