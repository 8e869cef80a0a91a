//! Runs bbl against a state directory and derives the interop files.

pub mod flags;
pub mod name;
pub mod state_dir;

pub use flags::{all_flags, Flag};
pub use state_dir::{BblState, BblStateDir, BoshDeploymentResourceConfig, StateDir};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Executes one bbl subcommand.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, args: &[String]) -> Result<()>;
}

/// Runs the `bbl` binary from `PATH`. Its stdout and stderr both go to our
/// stderr, leaving stdout for the resource response.
#[derive(Debug, Clone)]
pub struct BblRunner {
    program: String,
}

impl BblRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for BblRunner {
    fn default() -> Self {
        Self::new("bbl")
    }
}

#[async_trait]
impl CommandRunner for BblRunner {
    async fn run(&self, command: &str, args: &[String]) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-n").arg(command).args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::from(std::io::stderr()));
        cmd.stderr(Stdio::inherit());

        let status = cmd
            .status()
            .await
            .with_context(|| format!("Failed to spawn {}", self.program))?;
        if !status.success() {
            return Err(anyhow!("{} exited with {}", self.program, status));
        }
        Ok(())
    }
}

/// What a run produced: bbl's own result plus interop problems that did not
/// stop the run.
#[derive(Debug)]
pub struct RunOutcome {
    pub warnings: Vec<String>,
    pub result: Result<()>,
}

/// Run `command` for environment `name` inside `state_dir`, then refresh the
/// interop files whatever bbl's result.
pub async fn run_injected(
    runner: &dyn CommandRunner,
    name: &str,
    state_dir: &dyn BblStateDir,
    command: &str,
    flags: &[Flag],
) -> RunOutcome {
    let dir = state_dir.path().display().to_string();
    let mut args = vec![
        Flag::new("name", name).to_string(),
        Flag::new("state-dir", dir.as_str()).to_string(),
    ];
    args.extend(flags.iter().map(ToString::to_string));

    tracing::info!(command, name, state_dir = %dir, "running bbl");
    let result = runner.run(command, &args).await.map_err(|e| {
        anyhow!(
            "failed running bbl {} --state-dir={} <sensitive flags omitted>: {}",
            command,
            dir,
            e
        )
    });

    let warnings = write_interop(name, state_dir);
    RunOutcome { warnings, result }
}

/// Best effort: every failure becomes a warning and stops further interop work.
pub fn write_interop(name: &str, state_dir: &dyn BblStateDir) -> Vec<String> {
    let mut warnings = Vec::new();

    let state = match state_dir.read() {
        Ok(Some(state)) => state,
        Ok(None) => {
            if let Err(e) = state_dir.expunge_interop_files() {
                warnings.push(format!("Failed to expunge interop files: {:#}", e));
            }
            return warnings;
        }
        Err(e) => {
            warnings.push(format!("Failed to read bbl state: {:#}", e));
            return warnings;
        }
    };

    let key = match state_dir.jumpbox_ssh_key() {
        Ok(key) => key,
        Err(e) => {
            warnings.push(format!("Failed to read jumpbox ssh key: {:#}", e));
            return warnings;
        }
    };

    let config = BoshDeploymentResourceConfig::new(&state, key);
    if let Err(e) = state_dir.write_interop_files(name, &config) {
        warnings.push(format!("Failed to write interop files: {:#}", e));
    }
    warnings
}


#[cfg(test)]
mod tests {
    use super::fakes::{FakeRunner, FakeStateDir};
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;

    fn state_dir() -> FakeStateDir {
        let dir = FakeStateDir {
            path: PathBuf::from("some-bbl-state-dir"),
            ..Default::default()
        };
        let mut state = BblState::default();
        state.jumpbox.url = "some-jumpbox".to_string();
        state.director.address = "some-director".to_string();
        *dir.state.lock().unwrap() = Some(state);
        *dir.key.lock().unwrap() = "some-ssh-key".to_string();
        dir
    }

    fn lb_flags() -> Vec<Flag> {
        vec![Flag::new("lb-cert", "some-lb-cert"), Flag::new("lb-key", "some-lb-key")]
    }

    #[tokio::test]
    async fn test_runs_bbl_with_name_state_dir_and_flags() {
        let runner = FakeRunner::default();
        let dir = state_dir();

        let outcome = run_injected(&runner, "some-env-name", &dir, "up", &lb_flags()).await;
        outcome.result.unwrap();

        assert_eq!(*runner.command.lock().unwrap(), "up");
        assert_eq!(
            *runner.args.lock().unwrap(),
            vec![
                "--name=some-env-name",
                "--state-dir=some-bbl-state-dir",
                "--lb-cert=some-lb-cert",
                "--lb-key=some-lb-key",
            ]
        );
    }

    #[tokio::test]
    async fn test_without_flags_only_name_and_state_dir() {
        let runner = FakeRunner::default();
        let outcome = run_injected(&runner, "some-env-name", &state_dir(), "up", &[]).await;
        outcome.result.unwrap();
        assert_eq!(
            *runner.args.lock().unwrap(),
            vec!["--name=some-env-name", "--state-dir=some-bbl-state-dir"]
        );
    }

    #[tokio::test]
    async fn test_writes_interop_config() {
        let runner = FakeRunner::default();
        let dir = state_dir();

        let outcome = run_injected(&runner, "some-env-name", &dir, "up", &lb_flags()).await;
        assert!(outcome.warnings.is_empty());

        assert_eq!(dir.write_calls.load(Ordering::SeqCst), 1);
        let (name, config) = dir.written.lock().unwrap().clone().unwrap();
        assert_eq!(name, "some-env-name");
        assert_eq!(
            config,
            BoshDeploymentResourceConfig {
                target: "some-director".to_string(),
                jumpbox_url: "some-jumpbox".to_string(),
                jumpbox_ssh_key: "some-ssh-key".to_string(),
                jumpbox_username: "jumpbox".to_string(),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_bbl_failure_hides_flags() {
        let runner = FakeRunner::failing("some-error");
        let dir = state_dir();

        let outcome = run_injected(&runner, "some-env-name", &dir, "up", &lb_flags()).await;
        let err = outcome.result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed running bbl up --state-dir=some-bbl-state-dir <sensitive flags omitted>: some-error"
        );
        assert_eq!(dir.write_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreadable_state_is_only_a_warning() {
        let runner = FakeRunner::default();
        let dir = state_dir();
        *dir.read_error.lock().unwrap() = Some("some-error".to_string());

        let outcome = run_injected(&runner, "some-env-name", &dir, "up", &[]).await;
        outcome.result.unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("some-error"));
        assert_eq!(dir.key_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_state_expunges_interop_files() {
        let runner = FakeRunner::default();
        let dir = state_dir();
        *dir.state.lock().unwrap() = None;

        let outcome = run_injected(&runner, "some-env-name", &dir, "down", &[]).await;
        outcome.result.unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(dir.expunge_calls.load(Ordering::SeqCst), 1);
        assert_eq!(dir.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_expunge_stops_interop() {
        let runner = FakeRunner::default();
        let dir = state_dir();
        *dir.state.lock().unwrap() = None;
        *dir.expunge_error.lock().unwrap() = Some("wat".to_string());

        let outcome = run_injected(&runner, "some-env-name", &dir, "down", &[]).await;
        outcome.result.unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(dir.key_calls.load(Ordering::SeqCst), 0);
        assert_eq!(dir.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_ssh_key_is_only_a_warning() {
        let runner = FakeRunner::default();
        let dir = state_dir();
        *dir.key_error.lock().unwrap() = Some("some-error".to_string());

        let outcome = run_injected(&runner, "some-env-name", &dir, "up", &[]).await;
        outcome.result.unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(dir.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_bbl_runner_reports_exit_status() {
        let runner = BblRunner::new("false");
        assert!(runner.run("up", &[]).await.is_err());

        let runner = BblRunner::new("true");
        runner.run("up", &["--name=x".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_bbl_runner_missing_binary() {
        let runner = BblRunner::new("definitely-not-a-real-bbl-binary");
        let err = runner.run("up", &[]).await.unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }
}
