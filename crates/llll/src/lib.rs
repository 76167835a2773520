//! llll library - command handlers and output formatting for the CLI
//!
//! Exposed as a library so the handlers can be tested without spawning
//! the binary.

pub mod commands;
pub mod logging;
pub mod output;
