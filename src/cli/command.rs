//! REPL command parsing.

use crate::app::Mode;

pub const HELP: &str = "\
Comandos:
  /agents              lista los agentes
  /experiences         lista las experiencias guiadas
  /mode free|guided    cambia de modo
  /select <agente>     abre un chat con un agente
  /start <experiencia> inicia una experiencia guiada
  /next, /prev         navega entre etapas
  /close               cierra la experiencia o el chat
  /transcript          muestra la conversación actual
  /history             historial del servidor
  /clear-history       borra el historial del servidor
  /health              estado del servidor
  /help                esta ayuda
  /quit                salir
Cualquier otro texto se envía al agente seleccionado.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Agents,
    Experiences,
    Mode(Mode),
    Select(String),
    Start(String),
    Next,
    Prev,
    Close,
    Transcript,
    History,
    ClearHistory,
    Health,
    Help,
    Quit,
    /// Plain text for the active agent.
    Say(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Self::Say(line.to_string())));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let cmd = match name {
            "agents" | "agentes" => Self::Agents,
            "experiences" | "experiencias" => Self::Experiences,
            "mode" | "modo" => Self::Mode(arg.parse()?),
            "select" | "chat" => Self::Select(required(name, arg)?),
            "start" => Self::Start(required(name, arg)?),
            "next" => Self::Next,
            "prev" => Self::Prev,
            "close" => Self::Close,
            "transcript" => Self::Transcript,
            "history" => Self::History,
            "clear-history" => Self::ClearHistory,
            "health" => Self::Health,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("Comando desconocido: /{other}. Usa /help.")),
        };
        Ok(Some(cmd))
    }
}

fn required(name: &str, arg: &str) -> Result<String, String> {
    if arg.is_empty() {
        Err(format!("/{name} necesita un identificador"))
    } else {
        Ok(arg.to_string())
    }
}
