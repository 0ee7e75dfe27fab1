//! Text rendering of client state.
//!
//! Every function here is a pure projection; the REPL calls them after each
//! transition and prints the result.

use std::fmt::Write;

use crate::api::{HealthStatus, HistoryEntry};
use crate::catalog::{Agent, CatalogStore, Experience, agent_icon};
use crate::chat::{ChatMessage, MessageSender};
use crate::experience::{NavControls, NavigatorView, StageView};
use crate::notify::{Notification, NotificationLevel};

/// Color used for a stage whose agent is not in the catalog.
pub const DEFAULT_STAGE_COLOR: &str = "#2C5F2D";

/// Width of the progress bar in cells.
const PROGRESS_WIDTH: usize = 20;

pub fn agent_card(agent: &Agent, selected: bool) -> String {
    let marker = if selected { "▶" } else { " " };
    format!(
        "{marker} {icon} {name} [{id}]\n    {description}\n    Chatear con {name}",
        icon = agent_icon(&agent.id),
        name = agent.name,
        id = agent.id,
        description = agent.description,
    )
}

pub fn agent_cards(agents: &[Agent], selected: Option<&str>) -> String {
    if agents.is_empty() {
        return "No hay agentes disponibles.".to_string();
    }
    agents
        .iter()
        .map(|a| agent_card(a, selected == Some(a.id.as_str())))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn experience_card(experience: &Experience) -> String {
    let dots = "●".repeat(experience.stages.len());
    let mut out = format!(
        "  {name} [{id}]\n    {description}\n    ",
        name = experience.name,
        id = experience.id,
        description = experience.description,
    );
    if !dots.is_empty() {
        out.push_str(&dots);
        out.push(' ');
    }
    out.push_str(&experience.estimated_duration);
    out
}

pub fn experience_cards<E: AsRef<Experience>>(experiences: &[E]) -> String {
    if experiences.is_empty() {
        return "No hay experiencias disponibles.".to_string();
    }
    experiences
        .iter()
        .map(|e| experience_card(e.as_ref()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn progress_bar(percent: u8) -> String {
    let filled = (percent as usize * PROGRESS_WIDTH + 50) / 100;
    format!(
        "[{}{}] {percent}%",
        "█".repeat(filled),
        "░".repeat(PROGRESS_WIDTH - filled)
    )
}

pub fn controls(controls: NavControls) -> String {
    let prev = if controls.prev_enabled {
        "/prev ← Anterior"
    } else {
        "(← Anterior)"
    };
    let next = if controls.next_enabled {
        format!("/next {}", controls.next_action.label())
    } else {
        format!("({})", controls.next_action.label())
    };
    format!("{prev}    {next}")
}

fn stage_panel(view: &StageView<'_>, catalog: &CatalogStore) -> String {
    let agent = catalog.agent(&view.stage.agent_id);
    let color = agent.map_or(DEFAULT_STAGE_COLOR, |a| a.color.as_str());
    let agent_name = agent.map_or("Agente", |a| a.name.as_str());
    let agent_description = agent.map_or("", |a| a.description.as_str());

    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", view.experience.name);
    let _ = writeln!(out, "{}", progress_bar(view.progress_percent));
    let _ = writeln!(out, "Etapa {} de {}", view.label, view.total);
    let _ = writeln!(
        out,
        "Etapa {}: {} ({color})",
        view.stage.order, view.stage.description
    );
    let _ = writeln!(
        out,
        "En esta etapa trabajarás con {agent_name}: {agent_description}"
    );
    out.push_str(&controls(view.controls()));
    out
}

/// Render the navigator panel. Idle renders nothing.
pub fn navigator(view: &NavigatorView<'_>, catalog: &CatalogStore) -> Option<String> {
    match view {
        NavigatorView::Idle => None,
        NavigatorView::FreeMode { experience } => Some(format!(
            "== {} ==\nModo de Experimentación Libre\n\
             En este modo puedes interactuar con cualquiera de los agentes en el orden que prefieras.\n\
             Vuelve al modo de exploración libre para comenzar.\n{}",
            experience.name,
            controls(view.controls()),
        )),
        NavigatorView::Stage(stage) => Some(stage_panel(stage, catalog)),
    }
}

pub fn message(message: &ChatMessage, agent: Option<&Agent>) -> String {
    let label = match message.sender {
        MessageSender::User => "Tú",
        MessageSender::Agent => agent.map_or("Agente", |a| a.name.as_str()),
    };
    format!("{label}: {}", message.text)
}

pub fn transcript(messages: &[ChatMessage], agent: Option<&Agent>) -> String {
    match agent {
        None => "No hay un chat abierto. Usa /select <agente>.".to_string(),
        Some(a) => {
            let mut out = format!("Chat con {}", a.name);
            for m in messages {
                out.push('\n');
                out.push_str(&message(m, agent));
            }
            out
        }
    }
}

pub fn notification(notification: &Notification) -> String {
    let marker = match notification.level {
        NotificationLevel::Success => "✓",
        NotificationLevel::Error => "✗",
        NotificationLevel::Warning => "!",
        NotificationLevel::Info => "i",
    };
    format!("[{marker}] {}", notification.message)
}

pub fn history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "El historial está vacío.".to_string();
    }
    entries
        .iter()
        .map(|e| format!("[{}] Tú: {}\n    → {}", e.agent_id, e.user_message, e.reply))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn health(status: &HealthStatus) -> String {
    format!(
        "{} — {} ({} agentes disponibles)",
        status.status, status.service, status.agents_available
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::catalog::Stage;
    use crate::experience::ExperienceNavigator;

    fn agent(id: &str) -> Agent {
        Agent {
            id: id.into(),
            name: "Agente Bosque".into(),
            description: "Descubre la vida oculta del bosque".into(),
            color: "#228B22".into(),
        }
    }

    fn experience(stage_agents: &[&str]) -> Experience {
        Experience {
            id: "exploracion_sensorial".into(),
            name: "Exploración Sensorial".into(),
            description: "Un viaje".into(),
            estimated_duration: "15-20 minutos".into(),
            stages: stage_agents
                .iter()
                .enumerate()
                .map(|(i, a)| Stage {
                    order: i as u32 + 1,
                    description: format!("Etapa {}", i + 1),
                    agent_id: a.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn agent_card_has_icon_and_call_to_action() {
        let card = agent_card(&agent("bosque"), true);
        assert!(card.starts_with("▶ 🌳 Agente Bosque [bosque]"));
        assert!(card.contains("Chatear con Agente Bosque"));
    }

    #[test]
    fn experience_card_has_one_dot_per_stage() {
        let card = experience_card(&experience(&["a", "b", "c"]));
        assert!(card.contains("●●● 15-20 minutos"));
    }

    #[test]
    fn progress_bar_bounds() {
        assert!(progress_bar(0).starts_with(&format!("[{}]", "░".repeat(20))));
        assert!(progress_bar(100).starts_with(&format!("[{}]", "█".repeat(20))));
        assert!(progress_bar(25).ends_with("25%"));
    }

    #[test]
    fn stage_panel_resolves_agent() {
        let catalog = CatalogStore::with_contents(vec![agent("bosque")], vec![]);
        let mut nav = ExperienceNavigator::new();
        nav.start(Arc::new(experience(&["bosque", "bosque"])));

        let panel = navigator(&nav.current_view(), &catalog).unwrap();
        assert!(panel.contains("Etapa 1 de 2"));
        assert!(panel.contains("50%"));
        assert!(panel.contains("trabajarás con Agente Bosque"));
        assert!(panel.contains("(← Anterior)"));
        assert!(panel.contains("/next Siguiente →"));

        nav.next();
        let panel = navigator(&nav.current_view(), &catalog).unwrap();
        assert!(panel.contains("/next Finalizar"));
        assert!(panel.contains("/prev"));
    }

    #[test]
    fn stage_panel_with_dangling_agent_uses_defaults() {
        let catalog = CatalogStore::new();
        let mut nav = ExperienceNavigator::new();
        nav.start(Arc::new(experience(&["fantasma"])));
        let panel = navigator(&nav.current_view(), &catalog).unwrap();
        assert!(panel.contains(DEFAULT_STAGE_COLOR));
        assert!(panel.contains("trabajarás con Agente"));
    }

    #[test]
    fn free_mode_panel_disables_both_controls() {
        let mut nav = ExperienceNavigator::new();
        nav.start(Arc::new(experience(&[])));
        let panel = navigator(&nav.current_view(), &CatalogStore::new()).unwrap();
        assert!(panel.contains("Modo de Experimentación Libre"));
        assert!(panel.contains("(← Anterior)"));
        assert!(panel.contains("(Siguiente →)"));
        assert!(!panel.contains('%'));
    }

    #[test]
    fn idle_navigator_renders_nothing() {
        let nav = ExperienceNavigator::new();
        assert!(navigator(&nav.current_view(), &CatalogStore::new()).is_none());
    }

    #[test]
    fn message_labels() {
        let a = agent("bosque");
        let user = ChatMessage {
            sender: MessageSender::User,
            text: "hola".into(),
            at: Utc::now(),
        };
        let reply = ChatMessage {
            sender: MessageSender::Agent,
            text: "hey".into(),
            at: Utc::now(),
        };
        assert_eq!(message(&user, Some(&a)), "Tú: hola");
        assert_eq!(message(&reply, Some(&a)), "Agente Bosque: hey");
        assert_eq!(message(&reply, None), "Agente: hey");
    }

    #[test]
    fn notification_markers() {
        let n = Notification {
            level: NotificationLevel::Error,
            message: "falló".into(),
        };
        assert_eq!(notification(&n), "[✗] falló");
    }
}
