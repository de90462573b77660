//! # Utility Modules
//!
//! - **`logging`**: initialization of the `tracing` subscriber used by the
//!   `umlgate` binary and by tests.

pub mod logging;
