//! Input/output helpers.
//!
//! - parameter, geometry and track JSON loading (`params`, `geometry`, `tracks`)
//! - result exports (CSV/JSON) (`export`)

pub mod export;
pub mod geometry;
pub mod params;
pub mod tracks;

pub use export::*;
pub use geometry::*;
pub use params::*;
pub use tracks::*;
