//! The `check`, `in` and `out` steps, independent of process plumbing.

use crate::concourse::{CheckRequest, InRequest, OutRequest, VersionResponse};
use crate::outrunner::{self, BblStateDir, CommandRunner, StateDir};
use crate::storage::{StorageClient, Version};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Versions the pipeline has not seen yet.
pub async fn run_check(client: &StorageClient, request: &CheckRequest) -> Result<Vec<Version>> {
    if let Some(watermark) = &request.version {
        let storage = client.storage_for(&watermark.name);
        return storage
            .get_all_newer_versions(watermark)
            .await
            .context("failed to list bbl state versions");
    }

    if !request.source.name.is_empty() {
        let storage = client.storage_for(&request.source.name);
        return match storage.version().await {
            Ok(version) => Ok(vec![version]),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e).context("failed to fetch bbl state version"),
        };
    }

    client
        .storage_for("")
        .get_all_newer_versions(&Version::default())
        .await
        .context("failed to list bbl state versions")
}

/// Restore the requested environment into `target_dir`.
pub async fn run_in(
    client: &StorageClient,
    request: &InRequest,
    target_dir: &Path,
) -> Result<VersionResponse> {
    let name = request.name()?;
    tracing::info!(name, target = %target_dir.display(), "downloading bbl state");

    let version = client
        .storage_for(name)
        .download(target_dir)
        .await
        .context("failed to download bbl state")?;
    Ok(VersionResponse { version })
}

/// Result of `out`: the stored version, and bbl's failure if it had one.
/// The state is uploaded either way.
#[derive(Debug)]
pub struct OutOutcome {
    pub response: VersionResponse,
    pub bbl_error: Option<anyhow::Error>,
}

pub async fn run_out(
    client: &StorageClient,
    runner: &dyn CommandRunner,
    request: &OutRequest,
    sources_dir: &Path,
) -> Result<OutOutcome> {
    let params = &request.params;
    let name = outrunner::name::resolve(sources_dir, params)?;
    let state_dir = StateDir::new(sources_dir.join(params.state_dir_or_default()));
    let storage = client.storage_for(&name);

    tracing::info!(name = %name, state_dir = %state_dir.path().display(), "downloading bbl state");
    storage
        .download(state_dir.path())
        .await
        .context("failed to download bbl state")?;

    let patches: Vec<PathBuf> = params.plan_patches.iter().map(|p| sources_dir.join(p)).collect();
    state_dir.apply_plan_patches(&patches)?;

    let flags = outrunner::all_flags(&request.source, &params.args);
    let outcome = outrunner::run_injected(runner, &name, &state_dir, &params.command, &flags).await;
    for warning in &outcome.warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(name = %name, "uploading bbl state");
    let version = storage
        .upload(state_dir.path())
        .await
        .context("failed to upload bbl state")?;

    Ok(OutOutcome {
        response: VersionResponse { version },
        bbl_error: outcome.result.err(),
    })
}
