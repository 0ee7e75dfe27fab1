//! Application controller — the single owner of client state.
//!
//! Created once at startup, mutated only through the methods below. Chat
//! requests run as spawned tasks so the caller stays responsive while they
//! are in flight; their results surface through [`ChatEvent`]s and
//! notifications.
//!
//! [`ChatEvent`]: crate::chat::ChatEvent

use std::str::FromStr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{Backend, HealthStatus, HistoryEntry};
use crate::catalog::CatalogStore;
use crate::chat::{ChatController, Completion};
use crate::error::{ApiError, CatalogError, ChatError};
use crate::experience::{ExperienceNavigator, Transition};
use crate::notify::Notifier;

/// Which half of the client is in front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Agent catalog and chat.
    #[default]
    Free,
    /// Experience catalog and stage navigator.
    Guided,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" | "libre" => Ok(Self::Free),
            "guided" | "guiado" => Ok(Self::Guided),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Guided => write!(f, "guided"),
        }
    }
}

/// What the startup load managed to fetch. `None` means that list failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub agents: Option<usize>,
    pub experiences: Option<usize>,
}

pub struct App {
    backend: Arc<dyn Backend>,
    catalog: CatalogStore,
    navigator: ExperienceNavigator,
    chat: ChatController,
    notifier: Notifier,
    mode: Mode,
}

impl App {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let notifier = Notifier::new();
        let chat = ChatController::new(Arc::clone(&backend), notifier.clone());
        Self {
            backend,
            catalog: CatalogStore::new(),
            navigator: ExperienceNavigator::new(),
            chat,
            notifier,
            mode: Mode::default(),
        }
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn navigator(&self) -> &ExperienceNavigator {
        &self.navigator
    }

    pub fn chat(&self) -> &ChatController {
        &self.chat
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Fetch agents, then experiences. A failed list is reported and left
    /// as it was; loading never fails as a whole.
    pub async fn load(&mut self) -> LoadSummary {
        let agents = match self.catalog.load_agents(self.backend.as_ref()).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Failed to load agents");
                self.notifier.error(
                    "Error al cargar agentes. Por favor, verifica que el servidor esté corriendo.",
                );
                None
            }
        };

        let experiences = match self.catalog.load_experiences(self.backend.as_ref()).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Failed to load experiences");
                self.notifier.error("Error al cargar experiencias guiadas.");
                None
            }
        };

        LoadSummary {
            agents,
            experiences,
        }
    }

    /// Switch modes. Leaving a mode tears down its state: free mode closes
    /// the experience, guided mode closes the chat.
    pub async fn show_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            info!(%mode, "Mode changed");
        }
        self.mode = mode;
        match mode {
            Mode::Free => self.navigator.close(),
            Mode::Guided => self.chat.close().await,
        }
    }

    // ── Guided experiences ──────────────────────────────────────────

    pub async fn start_experience(&mut self, experience_id: &str) -> Result<(), CatalogError> {
        let experience = match self.catalog.require_experience(experience_id) {
            Ok(experience) => experience,
            Err(e) => {
                self.notifier
                    .warning(format!("Experiencia '{experience_id}' no encontrada"));
                return Err(e);
            }
        };
        self.show_mode(Mode::Guided).await;
        let name = experience.name.clone();
        self.navigator.start(experience);
        self.notifier
            .success(format!("Experiencia \"{name}\" iniciada"));
        Ok(())
    }

    pub fn next_stage(&mut self) -> Transition {
        let transition = self.navigator.next();
        if transition == Transition::Completed {
            self.notifier.success("¡Experiencia completada!");
        }
        transition
    }

    pub fn prev_stage(&mut self) -> Transition {
        self.navigator.prev()
    }

    pub fn close_experience(&mut self) {
        if let Some(experience) = self.navigator.active_experience() {
            self.notifier
                .info(format!("Experiencia \"{}\" cerrada", experience.name));
        }
        self.navigator.close();
    }

    // ── Chat ────────────────────────────────────────────────────────

    /// Select an agent by ID and open a chat with it. Unknown IDs are
    /// rejected without touching the current chat.
    ///
    /// The agent is bound before this returns; the greeting request runs in
    /// the returned task. Pass its output to [`settle_selection`] to apply
    /// the mode switch.
    ///
    /// [`settle_selection`]: Self::settle_selection
    pub async fn select_agent(
        &mut self,
        agent_id: &str,
    ) -> Result<JoinHandle<Result<Completion, ApiError>>, CatalogError> {
        let agent = match self.catalog.require_agent(agent_id) {
            Ok(agent) => agent.clone(),
            Err(e) => {
                self.notifier
                    .warning(format!("Agente '{agent_id}' no encontrado"));
                return Err(e);
            }
        };

        let ticket = self.chat.open(&agent).await;
        let chat = self.chat.clone();
        Ok(tokio::spawn(async move {
            chat.complete_select(agent, ticket).await
        }))
    }

    /// Apply a finished selection. A greeting moves the client to free
    /// mode, closing any experience. Failed or superseded selections leave
    /// the mode and the experience as they were.
    pub async fn settle_selection(&mut self, outcome: &Result<Completion, ApiError>) {
        if let Ok(Completion::Appended(_)) = outcome {
            self.show_mode(Mode::Free).await;
        }
    }

    /// Send `text` to the active agent. The user's message is appended
    /// before this returns; the relay runs in the returned task.
    pub async fn send_message(&self, text: &str) -> Result<JoinHandle<Completion>, ChatError> {
        let (ticket, user_message) = self.chat.begin_send(text).await?;
        let chat = self.chat.clone();
        Ok(tokio::spawn(async move {
            chat.complete_send(ticket, user_message).await
        }))
    }

    pub async fn close_chat(&self) {
        self.chat.close().await;
    }

    // ── Backend housekeeping ────────────────────────────────────────

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        self.backend.history().await.inspect_err(|e| {
            warn!(error = %e, "Failed to fetch history");
            self.notifier.error("Error al obtener el historial");
        })
    }

    pub async fn clear_history(&self) -> Result<(), ApiError> {
        match self.backend.clear_history().await {
            Ok(()) => {
                self.notifier.success("Historial limpiado");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear history");
                self.notifier.error("Error al limpiar el historial");
                Err(e)
            }
        }
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.backend.health().await
    }
}
