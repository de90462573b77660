//! # Diagram Gateway
//!
//! The request path from raw diagram text to rendered bytes:
//!
//! 1. optional sanitization ([`DiagramGateway::convert`] only),
//! 2. delimiter check: text without an `@start...`/`@end...` pair is rejected
//!    with [`RenderError::EmptyDiagram`] before any engine work,
//! 3. include guard: a local absolute include the policy would drop is rejected
//!    with [`RenderError::ForbiddenInclude`],
//! 4. submission to the [`RenderPool`] under the configured deadline.

use crate::{
    config::GatewayConfig,
    diagram,
    error::RenderError,
    harness::{ExecutionTask, RenderPool},
    render::{OutputFormat, RenderAdapter, RenderRequest},
    sanitizer::{self, Classification, Verdict, classify, decide, parse_directive},
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct DiagramGateway {
    config: Arc<GatewayConfig>,
    pool: RenderPool,
}

impl DiagramGateway {
    /// Starts the render pool described by `config.pool` around `adapter`.
    pub fn new(config: GatewayConfig, adapter: Arc<dyn RenderAdapter>) -> Result<Self> {
        let pool = RenderPool::new(config.pool.clone(), adapter)?;
        Ok(Self {
            config: Arc::new(config),
            pool,
        })
    }

    pub fn config(&self) -> &Arc<GatewayConfig> {
        &self.config
    }

    pub fn pool(&self) -> &RenderPool {
        &self.pool
    }

    /// Sanitizes `text` with the gateway's mode, whitelist and stdlib registry.
    pub fn sanitize(&self, text: &str) -> String {
        sanitizer::sanitize(
            text,
            self.config.safe_mode,
            &self.config.whitelist,
            &self.config.stdlib,
        )
    }

    /// Sanitizes (when enabled) and renders.
    pub async fn convert(&self, text: &str, format: OutputFormat) -> Result<Vec<u8>, RenderError> {
        if self.config.sanitize {
            let sanitized = self.sanitize(text);
            self.render(&sanitized, format).await
        } else {
            self.render(text, format).await
        }
    }

    /// Renders with the configured default deadline.
    pub async fn render(&self, text: &str, format: OutputFormat) -> Result<Vec<u8>, RenderError> {
        self.render_with(text, format, self.config.pool.default_timeout, CancellationToken::new())
            .await
    }

    /// Renders with an explicit deadline and a caller-owned cancellation token.
    pub async fn render_with(
        &self,
        text: &str,
        format: OutputFormat,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, RenderError> {
        self.check_includes(text)?;

        let task =
            ExecutionTask::new(RenderRequest::new(text, format), timeout).with_cancel(cancel);
        self.pool.execute(task).await.into_result(timeout)
    }

    fn check_includes(&self, text: &str) -> Result<(), RenderError> {
        let block = diagram::locate(text).ok_or(RenderError::EmptyDiagram)?;

        for (idx, line) in text.lines().enumerate() {
            let Some(directive) = parse_directive(line, idx) else {
                continue;
            };
            let classification = classify(&directive, &self.config.stdlib);
            if classification != Classification::LocalAbsolutePath {
                continue;
            }
            let verdict = decide(
                &directive,
                classification,
                self.config.safe_mode,
                &self.config.whitelist,
            );
            if verdict == Verdict::Drop {
                tracing::warn!(
                    "Refusing to render forbidden include {} (safe mode {})",
                    directive.path,
                    self.config.safe_mode
                );
                return Err(RenderError::ForbiddenInclude {
                    path: directive.path,
                    line: block.relative_line(idx),
                });
            }
        }
        Ok(())
    }
}
