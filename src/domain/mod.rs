//! Domain types shared by the registry and every technique.
//!
//! This module defines:
//!
//! - the technique type tags (`TechniqueKind`) and lifecycle (`LifecycleState`)
//! - the per-track verdict (`Classification`)
//! - the read-only track view handed over by the transport engine (`Track`, `Species`)
//! - small configuration enums (`PlaceOfAction`, `SplitAxis`)

pub mod types;

pub use types::*;
