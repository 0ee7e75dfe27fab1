//! ChatController — drives a [`ChatSession`] against the backend.
//!
//! The session lock is never held across a network await: each operation
//! takes a ticket under the lock, releases it for the request, then
//! re-locks to apply the result if the ticket is still current.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::session::{ChatMessage, ChatSession, RequestTicket};
use super::{APOLOGY_REPLY, FALLBACK_REPLY, fallback_greeting};
use crate::api::Backend;
use crate::catalog::Agent;
use crate::error::{ApiError, ChatError};
use crate::notify::Notifier;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 128;

/// Chat changes pushed to the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Opened { agent: Agent },
    Message { message: ChatMessage },
    BusyChanged { busy: bool },
    /// A selection failed and the previous chat is back in place.
    Restored {
        agent: Agent,
        transcript: Vec<ChatMessage>,
    },
    Closed,
}

/// How a request finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The response was appended to the transcript.
    Appended(ChatMessage),
    /// The session moved on while the request was in flight; nothing was
    /// appended.
    Superseded,
}

struct Inner {
    session: Mutex<ChatSession>,
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    events: broadcast::Sender<ChatEvent>,
}

/// Cloneable handle; clones share one session.
#[derive(Clone)]
pub struct ChatController {
    inner: Arc<Inner>,
}

impl ChatController {
    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        let (events, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(ChatSession::new()),
                backend,
                notifier,
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.events.subscribe()
    }

    pub async fn active_agent(&self) -> Option<Agent> {
        self.inner.session.lock().await.active_agent().cloned()
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.inner.session.lock().await.transcript().to_vec()
    }

    pub async fn is_busy(&self) -> bool {
        self.inner.session.lock().await.is_busy()
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.inner.events.send(event);
    }

    /// Bind `agent` and fetch its greeting.
    ///
    /// The transcript is cleared before the request goes out. On failure
    /// the previous chat is restored and an error notification is raised;
    /// the error is returned for callers that want it.
    pub async fn select(&self, agent: Agent) -> Result<Completion, ApiError> {
        let ticket = self.open(&agent).await;
        self.complete_select(agent, ticket).await
    }

    /// First half of [`select`](Self::select): bind the agent and return
    /// the ticket for the greeting request.
    pub async fn open(&self, agent: &Agent) -> RequestTicket {
        let (ticket, was_busy) = {
            let mut session = self.inner.session.lock().await;
            let was_busy = session.is_busy();
            (session.begin_select(agent.clone()), was_busy)
        };
        info!(agent_id = %agent.id, "Agent selected");
        if was_busy {
            self.emit(ChatEvent::BusyChanged { busy: false });
        }
        self.emit(ChatEvent::Opened {
            agent: agent.clone(),
        });
        ticket
    }

    /// Second half of [`select`](Self::select): request the greeting and
    /// apply it if `ticket` is still current.
    pub async fn complete_select(
        &self,
        agent: Agent,
        ticket: RequestTicket,
    ) -> Result<Completion, ApiError> {
        let result = self.inner.backend.select_agent(&agent.id).await;

        let mut session = self.inner.session.lock().await;
        match result {
            Ok(reply) => {
                let greeting = reply
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| fallback_greeting(&agent.name));
                let appended = session.finish_select(&ticket, greeting);
                drop(session);
                match appended {
                    Some(message) => {
                        self.emit(ChatEvent::Message {
                            message: message.clone(),
                        });
                        self.inner
                            .notifier
                            .success(format!("Chat iniciado con {}", agent.name));
                        Ok(Completion::Appended(message))
                    }
                    None => {
                        debug!(agent_id = %agent.id, "Dropping greeting from superseded selection");
                        Ok(Completion::Superseded)
                    }
                }
            }
            Err(e) => {
                warn!(agent_id = %agent.id, error = %e, "Agent selection failed");
                if session.abandon_select(&ticket) {
                    let restored = session.active_agent().cloned();
                    let transcript = session.transcript().to_vec();
                    drop(session);
                    match restored {
                        Some(agent) => self.emit(ChatEvent::Restored { agent, transcript }),
                        None => self.emit(ChatEvent::Closed),
                    }
                    self.inner.notifier.error("Error al conectar con el agente");
                }
                Err(e)
            }
        }
    }

    /// Relay `text` to the active agent.
    ///
    /// Rejections (blank text, no agent, a send already pending) raise a
    /// warning and leave the transcript untouched. Otherwise exactly one
    /// agent reply follows the user's message, or none if the session was
    /// superseded in the meantime.
    pub async fn send(&self, text: &str) -> Result<Completion, ChatError> {
        let (ticket, user_message) = self.begin_send(text).await?;
        Ok(self.complete_send(ticket, user_message).await)
    }

    /// First half of [`send`](Self::send): validate, append the user's
    /// message and mark the session busy.
    pub async fn begin_send(&self, text: &str) -> Result<(RequestTicket, ChatMessage), ChatError> {
        let begun = {
            let mut session = self.inner.session.lock().await;
            session.begin_send(text)
        };
        match begun {
            Ok((ticket, user_message)) => {
                self.emit(ChatEvent::Message {
                    message: user_message.clone(),
                });
                self.emit(ChatEvent::BusyChanged { busy: true });
                Ok((ticket, user_message))
            }
            Err(e) => {
                match &e {
                    ChatError::EmptyMessage => {
                        self.inner.notifier.warning("Por favor escribe un mensaje")
                    }
                    ChatError::NoActiveAgent => self
                        .inner
                        .notifier
                        .warning("Por favor selecciona un agente primero"),
                    ChatError::Busy => self
                        .inner
                        .notifier
                        .warning("Espera la respuesta del agente antes de enviar otro mensaje"),
                }
                debug!(error = %e, "Send rejected");
                Err(e)
            }
        }
    }

    /// Second half of [`send`](Self::send): relay the message and append
    /// exactly one reply if `ticket` is still current.
    pub async fn complete_send(&self, ticket: RequestTicket, user_message: ChatMessage) -> Completion {
        let result = self
            .inner
            .backend
            .send_message(ticket.agent_id(), &user_message.text)
            .await;

        let reply = match result {
            Ok(reply) => reply
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| FALLBACK_REPLY.to_string()),
            Err(e) => {
                warn!(agent_id = %ticket.agent_id(), error = %e, "Message relay failed");
                APOLOGY_REPLY.to_string()
            }
        };

        let appended = {
            let mut session = self.inner.session.lock().await;
            session.finish_send(&ticket, reply)
        };
        match appended {
            Some(message) => {
                self.emit(ChatEvent::Message {
                    message: message.clone(),
                });
                self.emit(ChatEvent::BusyChanged { busy: false });
                Completion::Appended(message)
            }
            None => {
                debug!(agent_id = %ticket.agent_id(), "Dropping reply for superseded session");
                Completion::Superseded
            }
        }
    }

    /// Unbind the agent and clear the transcript.
    pub async fn close(&self) {
        let (had_agent, was_busy) = {
            let mut session = self.inner.session.lock().await;
            let had_agent = session.active_agent().is_some();
            let was_busy = session.is_busy();
            session.close();
            (had_agent, was_busy)
        };
        if was_busy {
            self.emit(ChatEvent::BusyChanged { busy: false });
        }
        if had_agent {
            info!("Chat closed");
            self.emit(ChatEvent::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::AgentReply;
    use crate::api::testing::StubBackend;
    use crate::chat::MessageSender;
    use crate::notify::NotificationLevel;

    fn agent(id: &str, name: &str) -> Agent {
        Agent {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            color: "#90EE90".into(),
        }
    }

    fn controller(backend: StubBackend) -> (ChatController, Arc<StubBackend>, Notifier) {
        let backend = Arc::new(backend);
        let notifier = Notifier::new();
        let chat = ChatController::new(backend.clone(), notifier.clone());
        (chat, backend, notifier)
    }

    /// Let spawned tasks run up to their next suspension point.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn select_appends_backend_greeting() {
        let (chat, _, notifier) =
            controller(StubBackend::new().with_greeting("bosque", AgentReply::text("Bienvenido")));
        let mut notes = notifier.subscribe();

        let done = chat.select(agent("bosque", "Agente Bosque")).await.unwrap();
        let Completion::Appended(msg) = done else {
            panic!("expected greeting");
        };
        assert_eq!(msg.text, "Bienvenido");
        assert_eq!(msg.sender, MessageSender::Agent);
        assert_eq!(chat.active_agent().await.unwrap().id, "bosque");

        let note = notes.recv().await.unwrap();
        assert_eq!(note.level, NotificationLevel::Success);
        assert_eq!(note.message, "Chat iniciado con Agente Bosque");
    }

    #[tokio::test]
    async fn select_without_message_uses_fallback_greeting() {
        let (chat, _, _) =
            controller(StubBackend::new().with_greeting("bosque", AgentReply::default()));
        chat.select(agent("bosque", "Agente Bosque")).await.unwrap();
        let transcript = chat.transcript().await;
        assert_eq!(
            transcript[0].text,
            "Hola, soy Agente Bosque. ¿En qué puedo ayudarte?"
        );
    }

    #[tokio::test]
    async fn failed_first_select_leaves_no_chat() {
        let (chat, _, notifier) = controller(StubBackend::new().failing_actions());
        let mut notes = notifier.subscribe();
        let mut events = chat.subscribe();

        assert!(chat.select(agent("bosque", "Bosque")).await.is_err());
        assert!(chat.active_agent().await.is_none());
        assert!(chat.transcript().await.is_empty());

        assert!(matches!(events.recv().await.unwrap(), ChatEvent::Opened { .. }));
        assert_eq!(events.recv().await.unwrap(), ChatEvent::Closed);
        let note = notes.recv().await.unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert_eq!(note.message, "Error al conectar con el agente");
    }

    #[tokio::test]
    async fn failed_select_keeps_previous_chat() {
        let (chat, _, notifier) = controller(StubBackend::new().failing_select_for("b"));
        chat.select(agent("a", "A")).await.unwrap();
        let mut notes = notifier.subscribe();
        let mut events = chat.subscribe();

        assert!(chat.select(agent("b", "B")).await.is_err());

        assert_eq!(chat.active_agent().await.unwrap().id, "a");
        let transcript = chat.transcript().await;
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].text, "Hola desde a");

        assert!(matches!(events.recv().await.unwrap(), ChatEvent::Opened { .. }));
        let ChatEvent::Restored { agent, transcript } = events.recv().await.unwrap() else {
            panic!("expected the previous chat back");
        };
        assert_eq!(agent.id, "a");
        assert_eq!(transcript.len(), 1);
        assert_eq!(notes.recv().await.unwrap().level, NotificationLevel::Error);

        // The restored chat still relays messages.
        chat.send("sigo aquí").await.unwrap();
        assert_eq!(chat.transcript().await.len(), 3);
    }

    #[tokio::test]
    async fn send_appends_user_then_reply() {
        let (chat, backend, _) = controller(StubBackend::new());
        chat.select(agent("bosque", "Bosque")).await.unwrap();

        chat.send("  hola  ").await.unwrap();

        let transcript = chat.transcript().await;
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1].sender, MessageSender::User);
        assert_eq!(transcript[1].text, "hola");
        assert_eq!(transcript[2].text, "eco: hola");
        assert_eq!(backend.sent(), vec![("bosque".to_string(), "hola".to_string())]);
        assert!(!chat.is_busy().await);
    }

    #[tokio::test]
    async fn send_without_content_uses_fallback_reply() {
        let (chat, _, _) = controller(StubBackend::new().with_reply(AgentReply::default()));
        chat.select(agent("bosque", "Bosque")).await.unwrap();
        chat.send("hola").await.unwrap();
        assert_eq!(chat.transcript().await[2].text, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn failed_send_appends_apology() {
        let (chat, _, _) = controller(StubBackend::new().failing_actions());
        // Selection fails against this backend, so bind the agent directly.
        chat.inner
            .session
            .lock()
            .await
            .begin_select(agent("bosque", "Bosque"));

        let done = chat.send("hola").await.unwrap();
        let Completion::Appended(msg) = done else {
            panic!("expected apology");
        };
        assert_eq!(msg.text, APOLOGY_REPLY);
        assert_eq!(chat.transcript().await.len(), 2);
        assert!(!chat.is_busy().await);
    }

    #[tokio::test]
    async fn blank_send_is_noop() {
        let (chat, backend, notifier) = controller(StubBackend::new());
        chat.select(agent("bosque", "Bosque")).await.unwrap();
        let mut notes = notifier.subscribe();

        assert_eq!(chat.send("").await.unwrap_err(), ChatError::EmptyMessage);
        assert_eq!(chat.send("   ").await.unwrap_err(), ChatError::EmptyMessage);

        assert_eq!(chat.transcript().await.len(), 1);
        assert!(backend.sent().is_empty());
        assert_eq!(notes.recv().await.unwrap().level, NotificationLevel::Warning);
    }

    #[tokio::test]
    async fn second_send_rejected_while_first_pending() {
        let (chat, backend, _) = controller(StubBackend::new());
        chat.select(agent("bosque", "Bosque")).await.unwrap();
        let gate = backend.gate_send();

        let first = tokio::spawn({
            let chat = chat.clone();
            async move { chat.send("uno").await }
        });
        settle().await;

        assert!(chat.is_busy().await);
        assert_eq!(chat.send("dos").await.unwrap_err(), ChatError::Busy);
        // greeting + pending user message, no reply yet
        assert_eq!(chat.transcript().await.len(), 2);

        gate.add_permits(1);
        first.await.unwrap().unwrap();

        let transcript = chat.transcript().await;
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[2].text, "eco: uno");
        assert!(!chat.is_busy().await);
        assert_eq!(backend.sent().len(), 1);
    }

    #[tokio::test]
    async fn superseded_selection_greeting_never_lands() {
        let backend = StubBackend::new()
            .with_greeting("a", AgentReply::text("soy A"))
            .with_greeting("b", AgentReply::text("soy B"));
        let gate_a = backend.gate_select("a");
        let (chat, _, _) = controller(backend);

        let first = tokio::spawn({
            let chat = chat.clone();
            async move { chat.select(agent("a", "A")).await }
        });
        settle().await;

        chat.select(agent("b", "B")).await.unwrap();
        gate_a.add_permits(1);
        assert_eq!(first.await.unwrap().unwrap(), Completion::Superseded);

        let transcript = chat.transcript().await;
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].text, "soy B");
        assert_eq!(chat.active_agent().await.unwrap().id, "b");
    }

    #[tokio::test]
    async fn reply_dropped_after_reselect() {
        let (chat, backend, _) = controller(StubBackend::new());
        chat.select(agent("a", "A")).await.unwrap();
        let gate = backend.gate_send();

        let pending = tokio::spawn({
            let chat = chat.clone();
            async move { chat.send("hola").await }
        });
        settle().await;

        let mut events = chat.subscribe();
        chat.select(agent("b", "B")).await.unwrap();
        assert!(!chat.is_busy().await);
        assert_eq!(
            events.recv().await.unwrap(),
            ChatEvent::BusyChanged { busy: false }
        );
        gate.add_permits(1);
        assert_eq!(pending.await.unwrap().unwrap(), Completion::Superseded);

        let transcript = chat.transcript().await;
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].text, "Hola desde b");
    }

    #[tokio::test]
    async fn close_clears_everything() {
        let (chat, _, _) = controller(StubBackend::new());
        let mut events = chat.subscribe();
        chat.select(agent("a", "A")).await.unwrap();
        chat.close().await;

        assert!(chat.active_agent().await.is_none());
        assert!(chat.transcript().await.is_empty());

        assert!(matches!(events.recv().await.unwrap(), ChatEvent::Opened { .. }));
        assert!(matches!(events.recv().await.unwrap(), ChatEvent::Message { .. }));
        assert_eq!(events.recv().await.unwrap(), ChatEvent::Closed);
    }

    #[tokio::test]
    async fn close_during_send_reports_not_busy() {
        let (chat, backend, _) = controller(StubBackend::new());
        chat.select(agent("a", "A")).await.unwrap();
        let gate = backend.gate_send();

        let pending = tokio::spawn({
            let chat = chat.clone();
            async move { chat.send("hola").await }
        });
        settle().await;

        let mut events = chat.subscribe();
        chat.close().await;
        assert_eq!(
            events.recv().await.unwrap(),
            ChatEvent::BusyChanged { busy: false }
        );
        assert_eq!(events.recv().await.unwrap(), ChatEvent::Closed);

        gate.add_permits(1);
        assert_eq!(pending.await.unwrap().unwrap(), Completion::Superseded);
        // No busy-false from the dropped reply either.
        assert!(events.try_recv().is_err());
    }
}
