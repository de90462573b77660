//! # Render Adapter
//!
//! The diagram engine is an opaque, blocking function from diagram text to
//! bytes. It always runs on a worker thread of the
//! [`RenderPool`](crate::harness::RenderPool), never on an async runtime thread.
//!
//! Engines receive a [`CancellationToken`] that is cancelled when the caller
//! gives up (deadline or dropped request). Honoring it is optional: the pool
//! enforces its deadline whether or not the engine stops.
//!
//! [`text::SequenceTextEngine`] is a small bundled engine for simple sequence
//! diagrams.

pub mod text;

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tokio_util::sync::CancellationToken;

pub use text::SequenceTextEngine;

/// Output formats understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII art.
    Txt,
    /// Unicode box drawing.
    Utxt,
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Utxt => "utxt",
            OutputFormat::Svg => "svg",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            OutputFormat::Txt | OutputFormat::Utxt => "text/plain; charset=utf-8",
            OutputFormat::Svg => "image/svg+xml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported output format '{0}' (expected one of: txt, utxt, svg)")]
pub struct ParseFormatError(pub String);

impl FromStr for OutputFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "ascii" => Ok(OutputFormat::Txt),
            "utxt" => Ok(OutputFormat::Utxt),
            "svg" => Ok(OutputFormat::Svg),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

/// The payload of one render task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub source: String,
    pub format: OutputFormat,
}

impl RenderRequest {
    pub fn new(source: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            source: source.into(),
            format,
        }
    }
}

/// A blocking diagram engine.
pub trait RenderAdapter: Send + Sync + 'static {
    /// Engine name used in logs.
    fn name(&self) -> &str;

    fn render(
        &self,
        source: &str,
        format: OutputFormat,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, EngineError>;
}
