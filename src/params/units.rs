//! Unit conversion into internal units (mm for lengths, MeV for energies).

use serde::{Deserialize, Serialize};

/// Physical dimension expected by a dimensioned parameter lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Length,
    Energy,
}

impl Dimension {
    pub fn internal_unit(self) -> &'static str {
        match self {
            Dimension::Length => "mm",
            Dimension::Energy => "MeV",
        }
    }
}

/// Scale factor from `unit` into the internal unit of `dimension`.
///
/// Returns `None` when the unit does not belong to the dimension.
pub fn scale_to_internal(dimension: Dimension, unit: &str) -> Option<f64> {
    let factor = match (dimension, unit.trim()) {
        (Dimension::Length, "nm") => 1e-6,
        (Dimension::Length, "um" | "µm" | "micrometer") => 1e-3,
        (Dimension::Length, "mm") => 1.0,
        (Dimension::Length, "cm") => 10.0,
        (Dimension::Length, "m") => 1e3,
        (Dimension::Length, "km") => 1e6,
        (Dimension::Energy, "eV") => 1e-6,
        (Dimension::Energy, "keV") => 1e-3,
        (Dimension::Energy, "MeV") => 1.0,
        (Dimension::Energy, "GeV") => 1e3,
        (Dimension::Energy, "TeV") => 1e6,
        _ => return None,
    };
    Some(factor)
}
