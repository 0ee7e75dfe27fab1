//! Experience navigator state machine.

use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::{Experience, Stage};

/// Where the navigator is.
///
/// `Idle → AtStage(0) → … → AtStage(n-1) → Idle`. Experiences without
/// stages park in `FreeMode`, where no position is meaningful.
#[derive(Debug, Clone, Default)]
enum NavigatorState {
    #[default]
    Idle,
    FreeMode {
        experience: Arc<Experience>,
    },
    AtStage {
        experience: Arc<Experience>,
        /// Always a valid index into `experience.stages`.
        position: usize,
    },
}

/// Outcome of a navigation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Moved to the stage at this index.
    Moved { position: usize },
    /// `next()` on the last stage: the experience finished and the
    /// navigator is idle again.
    Completed,
    /// Nothing to do from the current state.
    Ignored,
}

/// What the forward control does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Advance,
    Finalize,
}

impl NextAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Advance => "Siguiente →",
            Self::Finalize => "Finalizar",
        }
    }
}

/// Enabled state of the navigation controls, derived from a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavControls {
    pub prev_enabled: bool,
    pub next_enabled: bool,
    pub next_action: NextAction,
}

impl NavControls {
    const DISABLED: Self = Self {
        prev_enabled: false,
        next_enabled: false,
        next_action: NextAction::Advance,
    };
}

/// Presentation data for the current stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageView<'a> {
    pub experience: &'a Experience,
    pub stage: &'a Stage,
    /// 1-based position.
    pub label: usize,
    pub total: usize,
    pub progress_percent: u8,
    pub is_first: bool,
    pub is_last: bool,
}

impl StageView<'_> {
    pub fn controls(&self) -> NavControls {
        NavControls {
            prev_enabled: !self.is_first,
            next_enabled: true,
            next_action: if self.is_last {
                NextAction::Finalize
            } else {
                NextAction::Advance
            },
        }
    }
}

/// Read-only projection of the navigator's position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigatorView<'a> {
    Idle,
    FreeMode { experience: &'a Experience },
    Stage(StageView<'a>),
}

impl NavigatorView<'_> {
    pub fn controls(&self) -> NavControls {
        match self {
            Self::Stage(view) => view.controls(),
            Self::Idle | Self::FreeMode { .. } => NavControls::DISABLED,
        }
    }
}

/// Progress shown after entering stage `index` of `total`: the 1-based
/// count over the total, rounded half up. `total` must be non-zero.
pub fn progress_percent(index: usize, total: usize) -> u8 {
    debug_assert!(total > 0 && index < total);
    let pct = (200 * (index + 1) + total) / (2 * total);
    pct.min(100) as u8
}

/// Tracks the active experience and the current stage.
#[derive(Debug, Default)]
pub struct ExperienceNavigator {
    state: NavigatorState,
}

impl ExperienceNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, NavigatorState::Idle)
    }

    /// The experience being walked, if any.
    pub fn active_experience(&self) -> Option<&Arc<Experience>> {
        match &self.state {
            NavigatorState::Idle => None,
            NavigatorState::FreeMode { experience }
            | NavigatorState::AtStage { experience, .. } => Some(experience),
        }
    }

    /// Begin `experience`, discarding whatever was active.
    pub fn start(&mut self, experience: Arc<Experience>) {
        info!(
            experience_id = %experience.id,
            stages = experience.stages.len(),
            "Experience started"
        );
        self.state = if experience.is_free_form() {
            NavigatorState::FreeMode { experience }
        } else {
            NavigatorState::AtStage {
                experience,
                position: 0,
            }
        };
    }

    /// Advance one stage, or finish on the last one.
    pub fn next(&mut self) -> Transition {
        let NavigatorState::AtStage {
            experience,
            position,
        } = &mut self.state
        else {
            return Transition::Ignored;
        };

        if *position + 1 < experience.stages.len() {
            *position += 1;
            debug!(experience_id = %experience.id, position = *position, "Stage advanced");
            Transition::Moved {
                position: *position,
            }
        } else {
            info!(experience_id = %experience.id, "Experience completed");
            self.state = NavigatorState::Idle;
            Transition::Completed
        }
    }

    /// Go back one stage. No-op on the first stage.
    pub fn prev(&mut self) -> Transition {
        match &mut self.state {
            NavigatorState::AtStage {
                experience,
                position,
            } if *position > 0 => {
                *position -= 1;
                debug!(experience_id = %experience.id, position = *position, "Stage rewound");
                Transition::Moved {
                    position: *position,
                }
            }
            _ => Transition::Ignored,
        }
    }

    /// Drop the active experience.
    pub fn close(&mut self) {
        if let Some(experience) = self.active_experience() {
            debug!(experience_id = %experience.id, "Experience closed");
        }
        self.state = NavigatorState::Idle;
    }

    /// Project the current state for rendering.
    pub fn current_view(&self) -> NavigatorView<'_> {
        match &self.state {
            NavigatorState::Idle => NavigatorView::Idle,
            NavigatorState::FreeMode { experience } => NavigatorView::FreeMode { experience },
            NavigatorState::AtStage {
                experience,
                position,
            } => {
                let total = experience.stages.len();
                let i = *position;
                NavigatorView::Stage(StageView {
                    experience,
                    stage: &experience.stages[i],
                    label: i + 1,
                    total,
                    progress_percent: progress_percent(i, total),
                    is_first: i == 0,
                    is_last: i + 1 == total,
                })
            }
        }
    }
}
