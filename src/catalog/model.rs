//! Catalog data model: agents, experiences and their stages.
//!
//! Field names on the wire are the backend's (`nombre`, `etapas`, ...).

use serde::{Deserialize, Serialize};

/// A selectable conversational persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique ID (e.g. `pasto_bogotano`).
    pub id: String,
    /// Display name.
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    /// Display color hint, usually a `#rrggbb` string.
    pub color: String,
}

/// One step of an experience, worked with exactly one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// 1-based display label.
    #[serde(rename = "orden")]
    pub order: u32,
    #[serde(rename = "descripcion")]
    pub description: String,
    /// Reference to [`Agent::id`]. Not guaranteed to resolve.
    #[serde(rename = "agente")]
    pub agent_id: String,
}

/// A named, ordered sequence of stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "duracion_estimada")]
    pub estimated_duration: String,
    /// Empty for the open-ended "free experimentation" experience.
    #[serde(rename = "etapas", default)]
    pub stages: Vec<Stage>,
}

impl Experience {
    /// Whether this experience has no stages to walk through.
    pub fn is_free_form(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Icon shown on an agent's card.
pub fn agent_icon(agent_id: &str) -> &'static str {
    match agent_id {
        "pasto_bogotano" => "🌿",
        "susurro_paramo" => "🌄",
        "guatilaM" => "🦎",
        "diario_intuitivo" => "🌊",
        "bosque" => "🌳",
        "multimodal" => "🔬",
        _ => "🤖",
    }
}
