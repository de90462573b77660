//! Render-path error types.
//!
//! [`EngineError`] is what a [`RenderAdapter`](crate::render::RenderAdapter)
//! reports; [`RenderError`] is what callers of the gateway see. Engine syntax
//! messages carry the offending line as `line: N`, which is extracted into
//! [`RenderError::Syntax`].

use regex::Regex;
use std::{sync::OnceLock, time::Duration};

/// Failure reported by a render engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The diagram is structurally invalid. The message is in the engine's own
    /// format and normally contains `line: N`.
    #[error("{0}")]
    Syntax(String),

    #[error("{0}")]
    Failed(String),
}

/// Errors surfaced by the gateway for a single render request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("Syntax Error?{}", format_line(.line))]
    Syntax {
        line: Option<usize>,
        message: String,
    },

    #[error("Empty diagram, missing delimiters?")]
    EmptyDiagram,

    #[error("cannot include {path} (line: {line})")]
    ForbiddenInclude { path: String, line: usize },

    #[error("Render timed out after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("Render pool is saturated ({capacity} tasks outstanding), try again later")]
    Saturated { capacity: usize },

    #[error("Render pool is shut down")]
    PoolClosed,

    #[error("Render failed: {0}")]
    Internal(String),
}

impl RenderError {
    /// True when the request itself is at fault (a 400-class failure).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RenderError::Syntax { .. }
                | RenderError::EmptyDiagram
                | RenderError::ForbiddenInclude { .. }
        )
    }

    /// Get error category for programmatic handling
    pub fn error_category(&self) -> &'static str {
        match self {
            RenderError::Syntax { .. } | RenderError::EmptyDiagram => "SYNTAX",
            RenderError::ForbiddenInclude { .. } => "SECURITY",
            RenderError::Timeout { .. } => "TIMEOUT",
            RenderError::Saturated { .. } | RenderError::PoolClosed => "RESOURCE",
            RenderError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<EngineError> for RenderError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Syntax(message) => RenderError::Syntax {
                line: extract_line_number(&message),
                message,
            },
            EngineError::Failed(message) => RenderError::Internal(message),
        }
    }
}

/// Finds the `line: N` marker used by engine error messages.
pub fn extract_line_number(message: &str) -> Option<usize> {
    static LINE_RX: OnceLock<Regex> = OnceLock::new();
    let rx = LINE_RX
        .get_or_init(|| Regex::new(r"line:\s*(\d+)").expect("line number regex must compile"));
    rx.captures(message)?.get(1)?.as_str().parse().ok()
}

fn format_line(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" (line: {line})"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_line_is_extracted_from_engine_message() {
        let error = RenderError::from(EngineError::Syntax("Syntax Error? (line: 1)".into()));
        assert_eq!(
            error,
            RenderError::Syntax {
                line: Some(1),
                message: "Syntax Error? (line: 1)".into()
            }
        );
        assert!(error.to_string().starts_with("Syntax Error? (line: 1)"));
    }

    #[test]
    fn test_syntax_without_line_number() {
        let error = RenderError::from(EngineError::Syntax("bad diagram".into()));
        assert_eq!(error.to_string(), "Syntax Error?");
    }

    #[test]
    fn test_forbidden_include_message() {
        let error = RenderError::ForbiddenInclude {
            path: "/etc/password".into(),
            line: 1,
        };
        assert_eq!(error.to_string(), "cannot include /etc/password (line: 1)");
        assert!(error.is_client_error());
        assert_eq!(error.error_category(), "SECURITY");
    }

    #[test]
    fn test_failed_engine_maps_to_internal() {
        let error = RenderError::from(EngineError::Failed("out of fonts".into()));
        assert_eq!(error, RenderError::Internal("out of fonts".into()));
        assert!(!error.is_client_error());
    }

    #[test]
    fn test_timeout_message() {
        let error = RenderError::Timeout {
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(error.to_string(), "Render timed out after 1500ms");
        assert_eq!(error.error_category(), "TIMEOUT");
    }

    #[test]
    fn test_extract_line_number_variants() {
        assert_eq!(extract_line_number("error (line: 12)"), Some(12));
        assert_eq!(extract_line_number("line:3"), Some(3));
        assert_eq!(extract_line_number("no marker"), None);
    }
}
