//! Process plumbing shared by the `check`, `in` and `out` binaries.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use tracing_subscriber::EnvFilter;

/// Log to stderr; stdout belongs to the response. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Decode the JSON request the pipeline writes to stdin.
pub fn read_request<T: DeserializeOwned>() -> Result<T> {
    let mut raw = Vec::new();
    std::io::stdin()
        .read_to_end(&mut raw)
        .context("Cannot read configuration")?;
    parse_request(&raw)
}

pub fn parse_request<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    serde_json::from_slice(raw).context("These are invalid parameters")
}

/// Encode `response` as one line of JSON on stdout.
pub fn write_response<T: Serialize>(response: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, response).context("failed to marshal response")?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
