//! Chat session state.
//!
//! Every selection and close bumps a generation counter. In-flight requests
//! carry the generation they were issued under, and completions from an
//! older generation are dropped instead of landing in a newer transcript.
//!
//! A selection is optimistic: the new agent is bound before its greeting
//! arrives. The last settled chat is kept aside until then and put back if
//! the selection fails.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::Agent;
use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    User,
    Agent,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub sender: MessageSender,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(sender: MessageSender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Handle for an in-flight request, tied to the generation it was issued in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    generation: u64,
    agent_id: String,
}

impl RequestTicket {
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

/// Chat that was showing before a selection still awaiting its greeting.
#[derive(Debug, Default)]
struct SettledChat {
    agent: Option<Agent>,
    transcript: Vec<ChatMessage>,
}

#[derive(Debug, Default)]
pub struct ChatSession {
    active_agent: Option<Agent>,
    transcript: Vec<ChatMessage>,
    busy: bool,
    generation: u64,
    settled: Option<SettledChat>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_agent(&self) -> Option<&Agent> {
        self.active_agent.as_ref()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Whether a send is awaiting its reply.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Bind `agent` with an empty transcript. The returned ticket is the
    /// greeting request's.
    ///
    /// The previous chat is set aside for [`abandon_select`]. If another
    /// selection is still pending, the chat set aside for it is kept and
    /// the pending one is discarded.
    ///
    /// [`abandon_select`]: Self::abandon_select
    pub fn begin_select(&mut self, agent: Agent) -> RequestTicket {
        self.generation += 1;
        self.busy = false;
        let previous = SettledChat {
            agent: self.active_agent.take(),
            transcript: std::mem::take(&mut self.transcript),
        };
        if self.settled.is_none() {
            self.settled = Some(previous);
        }
        let ticket = RequestTicket {
            generation: self.generation,
            agent_id: agent.id.clone(),
        };
        self.active_agent = Some(agent);
        ticket
    }

    /// Append the greeting for `ticket`. Returns `None` if the selection
    /// was superseded.
    pub fn finish_select(&mut self, ticket: &RequestTicket, greeting: String) -> Option<ChatMessage> {
        if !self.is_current(ticket) {
            return None;
        }
        self.settled = None;
        Some(self.push(ChatMessage::new(MessageSender::Agent, greeting)))
    }

    /// Undo a selection whose request failed, restoring the chat that was
    /// showing before it. Returns `false` if it was already superseded.
    ///
    /// Requests issued against the failed agent are invalidated.
    pub fn abandon_select(&mut self, ticket: &RequestTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.generation += 1;
        self.busy = false;
        let previous = self.settled.take().unwrap_or_default();
        self.active_agent = previous.agent;
        self.transcript = previous.transcript;
        true
    }

    /// Validate `text` and append it as the user's message. Returns the
    /// ticket for the relay request and the trimmed text to send.
    pub fn begin_send(&mut self, text: &str) -> Result<(RequestTicket, ChatMessage), ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let agent = self.active_agent.as_ref().ok_or(ChatError::NoActiveAgent)?;
        if self.busy {
            return Err(ChatError::Busy);
        }

        let ticket = RequestTicket {
            generation: self.generation,
            agent_id: agent.id.clone(),
        };
        self.busy = true;
        let message = self.push(ChatMessage::new(MessageSender::User, text));
        Ok((ticket, message))
    }

    /// Append the agent's reply for `ticket` and clear busy. Returns `None`
    /// if the session moved on while the request was in flight.
    pub fn finish_send(&mut self, ticket: &RequestTicket, reply: String) -> Option<ChatMessage> {
        if !self.is_current(ticket) {
            return None;
        }
        self.busy = false;
        Some(self.push(ChatMessage::new(MessageSender::Agent, reply)))
    }

    pub fn close(&mut self) {
        self.generation += 1;
        self.active_agent = None;
        self.transcript.clear();
        self.busy = false;
        self.settled = None;
    }

    fn push(&mut self, message: ChatMessage) -> ChatMessage {
        self.transcript.push(message.clone());
        message
    }
}
