// External circom/snarkjs tooling
// Commands are built as argument vectors and spawned directly, never through a shell.

use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::process::Command;

use crate::artifacts::ArtifactDir;
use crate::error::{PipelineError, Result};

pub const WITNESS_STAGE: &str = "witness generation";
pub const PROVE_STAGE: &str = "proving";

/// One external program call: executable plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub stage: &'static str,
    pub program: OsString,
    pub args: Vec<OsString>,
}

/// Space-joined rendering for logs only.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Executables used for the two external stages.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub node: OsString,
    pub snarkjs: OsString,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            node: "node".into(),
            snarkjs: "snarkjs".into(),
        }
    }
}

impl Toolchain {
    /// `node <dir>/generate_witness.js <dir>/withdraw.wasm <dir>/input.json <dir>/witness.wtns`
    pub fn witness_invocation(&self, dir: &ArtifactDir) -> Invocation {
        Invocation {
            stage: WITNESS_STAGE,
            program: self.node.clone(),
            args: vec![
                dir.witness_script().into(),
                dir.circuit().into(),
                dir.input().into(),
                dir.witness().into(),
            ],
        }
    }

    /// `snarkjs groth16 prove <dir>/final.zkey <dir>/witness.wtns <dir>/proof.json <dir>/public.json`
    pub fn prove_invocation(&self, dir: &ArtifactDir) -> Invocation {
        Invocation {
            stage: PROVE_STAGE,
            program: self.snarkjs.clone(),
            args: vec![
                "groth16".into(),
                "prove".into(),
                dir.proving_key().into(),
                dir.witness().into(),
                dir.proof().into(),
                dir.public_signals().into(),
            ],
        }
    }
}

/// Result of a finished external process.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an [`Invocation`] to completion.
pub trait ToolRunner {
    fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<ToolOutput>>;
}

/// Spawns real child processes and waits for them to exit.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        tracing::debug!("$ {}", invocation);

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).kill_on_drop(true);
        let child = command.output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child).await.map_err(|_| {
                PipelineError::Timeout {
                    stage: invocation.stage,
                    limit,
                }
            })?,
            None => child.await,
        }
        .map_err(|source| PipelineError::Spawn {
            program: invocation.program.to_string_lossy().into_owned(),
            source,
        })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(inv: &Invocation) -> Vec<String> {
        inv.args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_witness_invocation_args() {
        let dir = ArtifactDir::new("/tmp/art");
        let inv = Toolchain::default().witness_invocation(&dir);
        assert_eq!(inv.program, OsString::from("node"));
        assert_eq!(
            strings(&inv),
            vec![
                "/tmp/art/generate_witness.js",
                "/tmp/art/withdraw.wasm",
                "/tmp/art/input.json",
                "/tmp/art/witness.wtns",
            ]
        );
    }

    #[test]
    fn test_prove_invocation_args() {
        let dir = ArtifactDir::new("/tmp/art");
        let toolchain = Toolchain {
            snarkjs: "/opt/bin/snarkjs".into(),
            ..Toolchain::default()
        };
        let inv = toolchain.prove_invocation(&dir);
        assert_eq!(inv.program, OsString::from("/opt/bin/snarkjs"));
        assert_eq!(
            strings(&inv),
            vec![
                "groth16",
                "prove",
                "/tmp/art/final.zkey",
                "/tmp/art/witness.wtns",
                "/tmp/art/proof.json",
                "/tmp/art/public.json",
            ]
        );
    }

    #[test]
    fn test_shell_metacharacters_stay_in_one_argument() {
        let dir = ArtifactDir::new("/tmp/a b; rm -rf x");
        let inv = Toolchain::default().witness_invocation(&dir);
        assert_eq!(inv.args.len(), 4);
        assert_eq!(strings(&inv)[1], "/tmp/a b; rm -rf x/withdraw.wasm");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_reports_exit_code() {
        let runner = ProcessRunner::default();
        let inv = Invocation {
            stage: PROVE_STAGE,
            program: "sh".into(),
            args: vec!["-c".into(), "echo oops >&2; exit 3".into()],
        };
        let out = runner.run(&inv).await.unwrap();
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_process_runner_missing_program() {
        let runner = ProcessRunner::default();
        let inv = Invocation {
            stage: WITNESS_STAGE,
            program: "definitely-not-a-real-binary-7f3a".into(),
            args: vec![],
        };
        let err = runner.run(&inv).await.unwrap_err();
        assert!(matches!(err, PipelineError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_timeout() {
        let runner = ProcessRunner::new(Some(Duration::from_millis(100)));
        let inv = Invocation {
            stage: WITNESS_STAGE,
            program: "sleep".into(),
            args: vec!["5".into()],
        };
        let err = runner.run(&inv).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { stage: WITNESS_STAGE, .. }));
        assert_eq!(err.to_string(), "witness generation did not finish within 100ms");
    }

    #[test]
    fn test_invocation_display() {
        let dir = ArtifactDir::new("/tmp/art");
        let inv = Toolchain::default().prove_invocation(&dir);
        assert_eq!(
            inv.to_string(),
            "snarkjs groth16 prove /tmp/art/final.zkey /tmp/art/witness.wtns \
             /tmp/art/proof.json /tmp/art/public.json"
        );
    }
}
