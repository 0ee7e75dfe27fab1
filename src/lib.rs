//! DATAR client: agent catalog, chat and guided experiences in the terminal.

pub mod api;
pub mod app;
pub mod catalog;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod experience;
pub mod notify;
pub mod view;
