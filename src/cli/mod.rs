//! Command-line parsing for the `vrb` driver.
//!
//! Argument parsing and command dispatch are kept apart from the biasing core
//! so the core stays usable as a library.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "vrb", version, about = "Variance-reduction biasing driver")]
pub struct Cli {
    /// Default log level when neither VRB_LOG nor RUST_LOG is set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure, initialize and install every technique, then list what was built.
    Check(CheckArgs),
    /// Classify a track list and report continue/kill verdicts.
    Classify(ClassifyArgs),
    /// Generate a reproducible synthetic track list.
    Sample(SampleArgs),
}

/// Inputs shared by `check` and `classify`.
#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    /// Parameter file (JSON object of `Vr/...` names to values).
    #[arg(short = 'p', long, value_name = "JSON", env = "VRB_PARAMETERS")]
    pub parameters: PathBuf,

    /// Geometry description (JSON). Only the world volume exists without it.
    #[arg(short = 'g', long, value_name = "JSON", env = "VRB_GEOMETRY")]
    pub geometry: Option<PathBuf>,

    /// Number of execution contexts (context 0 is the leader).
    #[arg(short = 'j', long, default_value_t = 1, env = "VRB_CONTEXTS")]
    pub contexts: usize,

    /// Export issued directives to JSON.
    #[arg(long = "export-directives", value_name = "JSON")]
    pub export_directives: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Track list (JSON array).
    #[arg(short = 't', long, value_name = "JSON")]
    pub tracks: PathBuf,

    /// Number of runs; techniques are re-initialized between runs.
    #[arg(long, default_value_t = 1)]
    pub runs: usize,

    /// Treat the geometry as rebuilt between runs.
    #[arg(long)]
    pub rebuilt: bool,

    /// Export per-track verdicts to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Output track list (JSON).
    #[arg(short = 'o', long, value_name = "JSON")]
    pub output: PathBuf,

    /// Number of tracks.
    #[arg(short = 'n', long, default_value_t = 100)]
    pub count: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Species to draw from (comma separated).
    #[arg(long, value_delimiter = ',', default_value = "gamma,e-")]
    pub species: Vec<String>,

    /// Creator processes for secondaries (comma separated).
    #[arg(long, value_delimiter = ',', default_value = "eBrem")]
    pub processes: Vec<String>,

    /// Fraction of primaries (no creator process).
    #[arg(long, default_value_t = 0.1)]
    pub primary_fraction: f64,

    /// Source position in mm.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true, default_values_t = [0.0, 0.0, 0.0])]
    pub source: Vec<f64>,

    /// Source spread (standard deviation per axis) in mm.
    #[arg(long, default_value_t = 10.0)]
    pub spread: f64,

    /// Mean kinetic energy in MeV.
    #[arg(long, default_value_t = 1.0)]
    pub energy: f64,

    /// Kinetic energy standard deviation in MeV.
    #[arg(long, default_value_t = 0.3)]
    pub energy_sigma: f64,

    /// Volume assigned to every track.
    #[arg(long)]
    pub volume: Option<String>,

    /// Region assigned to every track.
    #[arg(long)]
    pub region: Option<String>,
}
