// Layout of the artefact directory shared by every stage of a proof run

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

pub const CIRCUIT_WASM: &str = "withdraw.wasm";
pub const INPUT_JSON: &str = "input.json";
pub const PROVING_KEY: &str = "final.zkey";
pub const WITNESS_SCRIPT: &str = "generate_witness.js";
pub const WITNESS_WTNS: &str = "witness.wtns";
pub const PROOF_JSON: &str = "proof.json";
pub const PUBLIC_JSON: &str = "public.json";

/// A directory holding the inputs and outputs of one withdraw proof run.
///
/// Paths are the directory joined with a fixed file name; nothing is
/// canonicalised or escaped.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn circuit(&self) -> PathBuf {
        self.root.join(CIRCUIT_WASM)
    }

    pub fn input(&self) -> PathBuf {
        self.root.join(INPUT_JSON)
    }

    pub fn proving_key(&self) -> PathBuf {
        self.root.join(PROVING_KEY)
    }

    pub fn witness_script(&self) -> PathBuf {
        self.root.join(WITNESS_SCRIPT)
    }

    pub fn witness(&self) -> PathBuf {
        self.root.join(WITNESS_WTNS)
    }

    pub fn proof(&self) -> PathBuf {
        self.root.join(PROOF_JSON)
    }

    pub fn public_signals(&self) -> PathBuf {
        self.root.join(PUBLIC_JSON)
    }

    /// Fails on the first pre-existing input that is absent.
    /// Outputs (witness, proof, public signals) are overwritten and never checked.
    pub fn check_inputs(&self) -> Result<()> {
        let required = [
            ("witness generator script", self.witness_script()),
            ("circuit wasm", self.circuit()),
            ("witness input", self.input()),
            ("proving key", self.proving_key()),
        ];
        for (role, path) in required {
            if !path.is_file() {
                return Err(PipelineError::MissingInput { role, path });
            }
        }
        Ok(())
    }
}
