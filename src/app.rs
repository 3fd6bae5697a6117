//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs logging
//! - parses CLI arguments
//! - runs the classification pipeline
//! - prints reports and writes optional exports

use clap::Parser;
use nalgebra::Vector3;

use crate::cli::{CheckArgs, ClassifyArgs, Command, ConfigArgs, SampleArgs};
use crate::error::AppError;
use crate::particles::ParticleTable;
use crate::sample::SampleConfig;

pub mod logging;
pub mod pipeline;

/// Entry point for the `vrb` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env file is fine; a malformed one is not worth aborting for.
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Ignoring .env: {err}");
        }
    }

    let cli = crate::cli::Cli::parse();
    logging::init(&cli.log_level);

    match cli.command {
        Command::Check(args) => handle_check(args),
        Command::Classify(args) => handle_classify(args),
        Command::Sample(args) => handle_sample(args),
    }
}

fn handle_check(args: CheckArgs) -> Result<(), AppError> {
    let collaborators = load(&args.config)?;
    let output = pipeline::check(&collaborators, args.config.contexts)?;

    print!("{}", crate::report::format_header("configuration check", chrono::Local::now()));
    print!("{}", crate::report::format_configuration(&output));

    export_directives(&args.config, &output)
}

fn handle_classify(args: ClassifyArgs) -> Result<(), AppError> {
    let collaborators = load(&args.config)?;
    let tracks = crate::io::read_tracks_json(&args.tracks)?;
    let config = pipeline::PipelineConfig {
        contexts: args.config.contexts,
        runs: args.runs,
        rebuilt: args.rebuilt,
    };
    let output = pipeline::classify(&collaborators, &tracks, config)?;

    print!("{}", crate::report::format_header("track classification", chrono::Local::now()));
    print!("{}", crate::report::format_configuration(&output));
    println!();
    print!("{}", crate::report::format_verdicts(&output));

    if let Some(path) = &args.export {
        crate::io::write_verdicts_csv(path, &output.verdicts)?;
        log::info!("Wrote {} verdict(s) to {}", output.verdicts.len(), path.display());
    }
    export_directives(&args.config, &output)
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = sample_config_from_args(&args)?;
    let tracks = crate::sample::generate_tracks(&config, &ParticleTable::standard())?;
    crate::io::write_tracks_json(&args.output, &tracks)?;
    log::info!("Wrote {} track(s) to {}", tracks.len(), args.output.display());
    Ok(())
}

fn load(config: &ConfigArgs) -> Result<crate::registry::Collaborators, AppError> {
    pipeline::load_collaborators(&config.parameters, config.geometry.as_deref())
}

fn export_directives(config: &ConfigArgs, output: &pipeline::RunOutput) -> Result<(), AppError> {
    if let Some(path) = &config.export_directives {
        let per_context: Vec<_> = output
            .contexts
            .iter()
            .map(|c| (c.context, c.directives.clone()))
            .collect();
        crate::io::write_directives_json(path, &per_context)?;
    }
    Ok(())
}

pub fn sample_config_from_args(args: &SampleArgs) -> Result<SampleConfig, AppError> {
    let [x, y, z] = <[f64; 3]>::try_from(args.source.as_slice())
        .map_err(|_| AppError::input("--source takes exactly three coordinates."))?;
    Ok(SampleConfig {
        count: args.count,
        seed: args.seed,
        species: args.species.clone(),
        creator_processes: args.processes.clone(),
        primary_fraction: args.primary_fraction,
        source: Vector3::new(x, y, z),
        spread: args.spread,
        energy_mean: args.energy,
        energy_sigma: args.energy_sigma,
        volume: args.volume.clone(),
        region: args.region.clone(),
    })
}
