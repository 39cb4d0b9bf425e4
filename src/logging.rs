use std::io::IsTerminal as _;

use anyhow::Context as _;

/// Used when `RUST_LOG` is unset. The line editor is chatty at debug level.
const DEFAULT_FILTER: &str = "info,rustyline=warn";

/// Logs go to stderr so stdout carries only command output and the session transcript.
pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
