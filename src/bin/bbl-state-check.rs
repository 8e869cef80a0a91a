//! `check`: report versions of bbl state newer than the one given.

use bbl_state::cli::{init_tracing, read_request, write_response};
use bbl_state::concourse::CheckRequest;
use bbl_state::resource::run_check;
use bbl_state::StorageClient;
use clap::Parser;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bbl-state-check", version, about = "Report new versions of bbl state")]
struct Cli {}

#[tokio::main]
async fn main() -> ExitCode {
    let _cli = Cli::parse();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let request: CheckRequest = read_request()?;
    let client = StorageClient::from_source(&request.source).await?;
    let versions = run_check(&client, &request).await?;
    write_response(&versions)
}
