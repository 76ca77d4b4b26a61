// Withdraw proof pipeline: witness -> groth16 prove -> flatten

use std::time::Instant;

use crate::artifacts::ArtifactDir;
use crate::error::{PipelineError, Result};
use crate::proof::{
    flatten_lines, read_document, tokens_from_flattened, FlattenedProof, ProofDocument,
    PublicSignals,
};
use crate::tools::{Invocation, Toolchain, ToolRunner};

/// How `proof.json` is turned into calldata tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenOptions {
    /// Use the line-length filter over the pretty-printed document instead of parsing it.
    pub legacy_lines: bool,
    /// Append the values from `public.json` after the proof elements.
    pub include_public: bool,
}

pub struct Pipeline<R> {
    dir: ArtifactDir,
    toolchain: Toolchain,
    runner: R,
    options: FlattenOptions,
}

impl<R: ToolRunner> Pipeline<R> {
    pub fn new(dir: ArtifactDir, toolchain: Toolchain, runner: R, options: FlattenOptions) -> Self {
        Self {
            dir,
            toolchain,
            runner,
            options,
        }
    }

    /// Runs both external stages in order, each only after the previous one
    /// exited successfully, then flattens the resulting proof.
    pub async fn run(&self) -> Result<FlattenedProof> {
        let start_time = Instant::now();
        tracing::info!("Starting withdraw proof generation in {}", self.dir.root().display());

        self.dir.check_inputs()?;

        let witness = self.toolchain.witness_invocation(&self.dir);
        self.run_stage(&witness, |code, stderr| PipelineError::WitnessGeneration { code, stderr })
            .await?;

        let prove = self.toolchain.prove_invocation(&self.dir);
        self.run_stage(&prove, |code, stderr| PipelineError::Proving { code, stderr })
            .await?;

        let flat = self.flatten()?;
        tracing::info!(
            tokens = flat.tokens.len(),
            "Total proof time: {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
        Ok(flat)
    }

    async fn run_stage(
        &self,
        invocation: &Invocation,
        on_failure: impl FnOnce(Option<i32>, String) -> PipelineError,
    ) -> Result<()> {
        tracing::info!("Step: {}", invocation.stage);
        let stage_start = Instant::now();

        let output = self.runner.run(invocation).await?;
        if !output.success() {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            };
            tracing::error!(code = ?output.code, "{} failed", invocation.stage);
            return Err(on_failure(output.code, detail));
        }

        tracing::info!(
            "{} finished in {:.2}s",
            invocation.stage,
            stage_start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn flatten(&self) -> Result<FlattenedProof> {
        let proof_path = self.dir.proof();
        let tokens = if self.options.legacy_lines {
            let text = read_document(&proof_path)?;
            tokens_from_flattened(&flatten_lines(&text))?
        } else {
            let doc = ProofDocument::load(&proof_path)?;
            tracing::debug!(protocol = ?doc.protocol, curve = ?doc.curve, "Parsed proof document");
            doc.tokens()?
        };

        let mut flat = FlattenedProof::new(tokens);
        if self.options.include_public {
            let signals = PublicSignals::load(&self.dir.public_signals())?;
            tracing::debug!("Appending {} public signals", signals.0.len());
            flat.append_public(signals);
        }
        Ok(flat)
    }
}
