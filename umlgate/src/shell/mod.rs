//! # Shell Module
//!
//! Entry point and CLI logic for the `umlgate` binary.
//!
//! - **`cli`**: argument parsing, settings overrides and the render/sanitize run

pub mod cli;

pub use cli::{Cli, execute, run};
