//! Chat with one agent. Messages are relayed to the backend and kept in a transcript.

pub mod controller;
pub mod session;

pub use controller::{ChatController, ChatEvent, Completion};
pub use session::{ChatMessage, ChatSession, MessageSender, RequestTicket};

/// Greeting used when the backend accepts a selection without a message.
pub fn fallback_greeting(agent_name: &str) -> String {
    format!("Hola, soy {agent_name}. ¿En qué puedo ayudarte?")
}

/// Reply used when the backend answers a message without content.
pub const FALLBACK_REPLY: &str = "Procesando tu solicitud...";

/// Reply used when relaying a message fails.
pub const APOLOGY_REPLY: &str =
    "Lo siento, hubo un error al procesar tu mensaje. Por favor intenta de nuevo.";
