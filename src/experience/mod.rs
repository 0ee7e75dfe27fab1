//! Guided experiences, walked through one stage at a time.
//!
//! The navigator owns the only piece of transition logic: where the user is
//! in the active experience. Everything the front end shows (progress,
//! button state) is projected from it on demand via
//! [`ExperienceNavigator::current_view`].

pub mod navigator;

pub use navigator::{
    ExperienceNavigator, NavControls, NavigatorView, NextAction, StageView, Transition,
    progress_percent,
};
