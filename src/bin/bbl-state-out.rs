//! `out`: run bbl against the stored state and store the result.

use bbl_state::cli::{init_tracing, read_request, write_response};
use bbl_state::concourse::OutRequest;
use bbl_state::outrunner::BblRunner;
use bbl_state::resource::run_out;
use bbl_state::StorageClient;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bbl-state-out", version, about = "Run bbl and store its state")]
struct Cli {
    /// Directory holding the step's inputs
    sources_dir: PathBuf,

    /// bbl executable to run
    #[arg(long, env = "BBL_BINARY", default_value = "bbl")]
    bbl: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let request: OutRequest = read_request()?;
    let client = StorageClient::from_source(&request.source).await?;
    let runner = BblRunner::new(cli.bbl.as_str());

    let outcome = run_out(&client, &runner, &request, &cli.sources_dir).await?;
    write_response(&outcome.response)?;

    // The state is stored either way; the step still fails
    match outcome.bbl_error {
        Some(e) => {
            tracing::error!("{e:#}");
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}
