//! Terminal front end: a stdin/stdout REPL over the application controller.

pub mod command;
pub mod repl;

pub use command::{Command, HELP};
pub use repl::Repl;
