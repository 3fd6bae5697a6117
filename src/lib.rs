//! `vr-biasing` library crate.
//!
//! Variance-reduction biasing for particle-transport Monte Carlo: a registry
//! of named biasing techniques configured from `Vr/<name>/...` parameters,
//! which classifies new tracks and issues directives to the engine's native
//! biasing machinery.
//!
//! The binary (`vrb`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - a transport engine can embed the registry directly

pub mod app;
pub mod cli;
pub mod domain;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod io;
pub mod params;
pub mod particles;
pub mod registry;
pub mod report;
pub mod sample;
pub mod store;
pub mod technique;
