//! # umlgate CLI
//!
//! Command-line interface definition and main entry point.

use crate::{
    config::{
        GatewayConfig, INCLUDE_WHITELIST_KEY, RENDER_TIMEOUT_KEY, RENDER_WORKERS_KEY, SAFE_MODE_KEY,
        SANITIZE_KEY, Settings,
    },
    gateway::DiagramGateway,
    render::{OutputFormat, SequenceTextEngine},
    safe_mode::SafeMode,
    utils::logging::init_logging,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// umlgate: sanitize and render untrusted diagram sources.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about,
    long_about = "umlgate reads a diagram from FILE (or stdin), removes inclusion directives
that the safe mode does not allow, and renders it with a hard deadline.

Examples:
  umlgate diagram.puml
  umlgate --safe-mode safe --whitelist-file allowed.txt --format svg -o out.svg diagram.puml
  cat diagram.puml | umlgate --sanitize-only

Settings are also read from UMLGATE_* environment variables; flags take precedence."
)]
pub struct Cli {
    /// Diagram source file; stdin when omitted or '-'
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Safe mode: unsafe, safe or secure
    #[arg(long)]
    pub safe_mode: Option<SafeMode>,

    /// File of include whitelist patterns, one per line
    #[arg(long)]
    pub whitelist_file: Option<PathBuf>,

    /// Render deadline in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Number of render worker threads
    #[arg(long)]
    pub workers: Option<usize>,

    /// Render the diagram as given, without sanitizing it first
    #[arg(long)]
    pub no_sanitize: bool,

    /// Print the sanitized diagram instead of rendering it
    #[arg(long, conflicts_with = "no_sanitize")]
    pub sanitize_only: bool,

    /// Output format: txt, utxt or svg
    #[arg(long, default_value = "txt")]
    pub format: OutputFormat,

    /// Write the result to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log to stderr instead of file
    #[arg(long)]
    pub log_to_stderr: bool,
}

impl Cli {
    /// Applies the command-line flags on top of `base`.
    pub fn settings(&self, base: Settings) -> Settings {
        let mut settings = base;
        if let Some(mode) = self.safe_mode {
            settings.insert(SAFE_MODE_KEY, mode.as_str());
        }
        if let Some(path) = &self.whitelist_file {
            settings.insert(INCLUDE_WHITELIST_KEY, path.display().to_string());
        }
        if let Some(timeout) = self.timeout_ms {
            settings.insert(RENDER_TIMEOUT_KEY, timeout.to_string());
        }
        if let Some(workers) = self.workers {
            settings.insert(RENDER_WORKERS_KEY, workers.to_string());
        }
        if self.no_sanitize {
            settings.insert(SANITIZE_KEY, "false");
        }
        settings
    }

    fn reads_stdin(&self) -> bool {
        self.input.as_ref().is_none_or(|path| path.as_os_str() == "-")
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    init_logging(log_level, !cli.log_to_stderr)?;

    let source = read_input(&cli).await?;
    let output = execute(&cli, &source, Settings::from_env()).await?;
    write_output(&cli, &output).await
}

/// Sanitizes or renders `source` as the flags ask, returning the bytes to emit.
pub async fn execute(cli: &Cli, source: &str, env: Settings) -> Result<Vec<u8>> {
    let config = GatewayConfig::from_settings(&cli.settings(env));

    if cli.sanitize_only {
        let sanitized = crate::sanitizer::sanitize(
            source,
            config.safe_mode,
            &config.whitelist,
            &config.stdlib,
        );
        return Ok(sanitized.into_bytes());
    }

    let gateway = DiagramGateway::new(config, Arc::new(SequenceTextEngine))
        .context("Failed to start render pool")?;
    let rendered = gateway
        .convert(source, cli.format)
        .await
        .with_context(|| format!("Failed to render diagram as {}", cli.format))?;
    Ok(rendered)
}

async fn read_input(cli: &Cli) -> Result<String> {
    match &cli.input {
        Some(path) if !cli.reads_stdin() => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read diagram from {}", path.display())),
        _ => {
            let mut source = String::new();
            tokio::io::stdin()
                .read_to_string(&mut source)
                .await
                .context("Failed to read diagram from stdin")?;
            Ok(source)
        }
    }
}

async fn write_output(cli: &Cli, bytes: &[u8]) -> Result<()> {
    match &cli.output {
        Some(path) => tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(bytes).await.context("Failed to write to stdout")?;
            stdout.flush().await.context("Failed to flush stdout")
        }
    }
}
