mod artifacts;
mod error;
mod pipeline;
mod proof;
mod tools;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use artifacts::ArtifactDir;
use clap::Parser;
use pipeline::{FlattenOptions, Pipeline};
use proof::Encoding;
use tools::{ProcessRunner, Toolchain};

/// Generates a groth16 proof for the withdraw circuit and prints it as
/// comma-separated verifier call arguments.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// The full path to the artefact directory.
    artefact_path: PathBuf,
    /// Node.js executable used to run `generate_witness.js`.
    #[clap(long, env = "NODE_BIN", default_value = "node")]
    node_bin: String,
    /// snarkjs executable used for `groth16 prove`.
    #[clap(long, env = "SNARKJS_BIN", default_value = "snarkjs")]
    snarkjs_bin: String,
    /// Abort an external step that runs longer than this many seconds.
    #[clap(long, env = "PROVER_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
    /// Flatten by filtering long lines of the pretty-printed proof instead of parsing it.
    #[clap(long)]
    legacy_lines: bool,
    /// Append the public signals from `public.json` after the proof elements.
    #[clap(long)]
    include_public: bool,
    /// Number format of the printed elements.
    #[clap(long, value_enum, default_value_t = Encoding::Decimal)]
    encoding: Encoding,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for the flattened proof.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let toolchain = Toolchain {
        node: args.node_bin.into(),
        snarkjs: args.snarkjs_bin.into(),
    };
    let runner = ProcessRunner::new(args.timeout_secs.map(Duration::from_secs));
    let options = FlattenOptions {
        legacy_lines: args.legacy_lines,
        include_public: args.include_public,
    };

    let pipeline = Pipeline::new(ArtifactDir::new(args.artefact_path), toolchain, runner, options);
    let flat = pipeline.run().await.context("withdraw proof generation failed")?;

    println!("{}", flat.render(args.encoding));
    Ok(())
}
