//! Shared domain types.
//!
//! Configuration strings (type tags, places of action, axes) are normalized once
//! at parse time into the enums below, so no call site lowers strings ad hoc.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Normalize a configuration token for case-insensitive matching.
///
/// Lower-cases and drops `-`, `_` and spaces, so `Directional-Russian-Roulette`,
/// `directional_russian_roulette` and `DirectionalRussianRoulette` compare equal.
pub fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Closed set of biasing technique variants selectable through `Vr/<name>/Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TechniqueKind {
    GeometricalParticleSplit,
    ImportanceSampling,
    WeightWindow,
    UniformSplitting,
    CrossSectionEnhancement,
    ForcedInteraction,
    KillOtherParticles,
    DirectionalRussianRoulette,
    RangeRejection,
    InelasticSplitting,
    AutomaticImportanceSampling,
    AutomaticImportanceSamplingParallel,
    PeriodicBoundaryCondition,
}

impl TechniqueKind {
    pub const ALL: [TechniqueKind; 13] = [
        TechniqueKind::GeometricalParticleSplit,
        TechniqueKind::ImportanceSampling,
        TechniqueKind::WeightWindow,
        TechniqueKind::UniformSplitting,
        TechniqueKind::CrossSectionEnhancement,
        TechniqueKind::ForcedInteraction,
        TechniqueKind::KillOtherParticles,
        TechniqueKind::DirectionalRussianRoulette,
        TechniqueKind::RangeRejection,
        TechniqueKind::InelasticSplitting,
        TechniqueKind::AutomaticImportanceSampling,
        TechniqueKind::AutomaticImportanceSamplingParallel,
        TechniqueKind::PeriodicBoundaryCondition,
    ];

    /// Parse a type discriminator. Returns `None` for unknown values.
    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match normalize_token(raw).as_str() {
            "geometricalparticlesplit" | "geometricparticlesplit" => TechniqueKind::GeometricalParticleSplit,
            "importancesampling" => TechniqueKind::ImportanceSampling,
            "weightwindow" => TechniqueKind::WeightWindow,
            "uniformsplitting" | "secondarybiasing" => TechniqueKind::UniformSplitting,
            "crosssectionenhancement" => TechniqueKind::CrossSectionEnhancement,
            "forcedinteraction" => TechniqueKind::ForcedInteraction,
            "killotherparticles" => TechniqueKind::KillOtherParticles,
            "directionalrussianroulette" => TechniqueKind::DirectionalRussianRoulette,
            "rangerejection" => TechniqueKind::RangeRejection,
            "inelasticsplitting" => TechniqueKind::InelasticSplitting,
            "automaticimportancesampling" => TechniqueKind::AutomaticImportanceSampling,
            "automaticimportancesamplingparallel" => TechniqueKind::AutomaticImportanceSamplingParallel,
            "periodicboundarycondition" => TechniqueKind::PeriodicBoundaryCondition,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical spelling used in logs and reports.
    pub fn display_name(self) -> &'static str {
        match self {
            TechniqueKind::GeometricalParticleSplit => "GeometricalParticleSplit",
            TechniqueKind::ImportanceSampling => "ImportanceSampling",
            TechniqueKind::WeightWindow => "WeightWindow",
            TechniqueKind::UniformSplitting => "UniformSplitting",
            TechniqueKind::CrossSectionEnhancement => "CrossSectionEnhancement",
            TechniqueKind::ForcedInteraction => "ForcedInteraction",
            TechniqueKind::KillOtherParticles => "KillOtherParticles",
            TechniqueKind::DirectionalRussianRoulette => "DirectionalRussianRoulette",
            TechniqueKind::RangeRejection => "RangeRejection",
            TechniqueKind::InelasticSplitting => "InelasticSplitting",
            TechniqueKind::AutomaticImportanceSampling => "AutomaticImportanceSampling",
            TechniqueKind::AutomaticImportanceSamplingParallel => "AutomaticImportanceSamplingParallel",
            TechniqueKind::PeriodicBoundaryCondition => "PeriodicBoundaryCondition",
        }
    }

    /// Whether the variant intercepts track creation.
    pub fn classifies_tracks(self) -> bool {
        matches!(
            self,
            TechniqueKind::KillOtherParticles
                | TechniqueKind::DirectionalRussianRoulette
                | TechniqueKind::RangeRejection
        )
    }
}

impl std::fmt::Display for TechniqueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lifecycle of a technique instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Constructed, parameters not (successfully) resolved yet.
    Unconfigured,
    /// Parameters resolved; not yet initialized for the current run.
    Configured,
    /// Initialized for the current run; classification allowed.
    Active,
}

/// Verdict for a newly created track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Continue,
    Kill,
}

impl Classification {
    pub fn label(self) -> &'static str {
        match self {
            Classification::Continue => "continue",
            Classification::Kill => "kill",
        }
    }
}

/// Where the weight-window sampler acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaceOfAction {
    OnBoundary,
    OnCollision,
    OnBoundaryAndCollision,
}

impl PlaceOfAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "onboundary" => Some(PlaceOfAction::OnBoundary),
            "oncollision" => Some(PlaceOfAction::OnCollision),
            "onboundaryandcollision" => Some(PlaceOfAction::OnBoundaryAndCollision),
            _ => None,
        }
    }
}

/// Axis along which geometrical particle splitting is symmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitAxis {
    X,
    Y,
    Z,
}

impl SplitAxis {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "xaxis" => Some(SplitAxis::X),
            "yaxis" => Some(SplitAxis::Y),
            "zaxis" => Some(SplitAxis::Z),
            _ => None,
        }
    }
}

/// Particle species identity of a track.
///
/// Ions carry their atomic number, mass number and integer charge; ordinary
/// particles carry whatever the particle table assigns (0 for leptons/photons).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    #[serde(default)]
    pub atomic_number: i32,
    #[serde(default)]
    pub atomic_mass: i32,
    #[serde(default)]
    pub charge: i32,
}

impl Species {
    pub fn new(name: impl Into<String>, atomic_number: i32, atomic_mass: i32, charge: i32) -> Self {
        Self {
            name: name.into(),
            atomic_number,
            atomic_mass,
            charge,
        }
    }

    /// A fully specified generic ion.
    pub fn ion(atomic_number: i32, atomic_mass: i32, charge: i32) -> Self {
        Self::new("GenericIon", atomic_number, atomic_mass, charge)
    }
}

/// Read-only view of a newly created track, as handed over by the engine.
///
/// Lengths are in mm, energies in MeV, times in ns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub position: Vector3<f64>,
    pub direction: Vector3<f64>,
    #[serde(default)]
    pub global_time: f64,
    #[serde(default)]
    pub kinetic_energy: f64,
    #[serde(default = "unit_weight")]
    pub weight: f64,
    pub species: Species,
    /// Creator process; `None` for primaries.
    #[serde(default)]
    pub creator_process: Option<String>,
    /// Current physical volume; `None` outside the world.
    #[serde(default)]
    pub volume: Option<String>,
    /// Region of the current volume.
    #[serde(default)]
    pub region: Option<String>,
    /// Residual CSDA range, filled by the engine when range rejection is active.
    #[serde(default)]
    pub csda_range: Option<f64>,
    /// Distance to the boundary of the current volume along the direction.
    #[serde(default)]
    pub distance_to_exit: Option<f64>,
}

fn unit_weight() -> f64 {
    1.0
}

impl Track {
    /// Minimal track at `position` moving along `direction` (normalized here).
    pub fn new(species: Species, position: Vector3<f64>, direction: Vector3<f64>) -> Self {
        let direction = direction
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::z);
        Self {
            position,
            direction,
            global_time: 0.0,
            kinetic_energy: 0.0,
            weight: 1.0,
            species,
            creator_process: None,
            volume: None,
            region: None,
            csda_range: None,
            distance_to_exit: None,
        }
    }

    pub fn with_creator(mut self, process: impl Into<String>) -> Self {
        self.creator_process = Some(process.into());
        self
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_energy(mut self, kinetic_energy: f64) -> Self {
        self.kinetic_energy = kinetic_energy;
        self
    }

    pub fn with_range(mut self, csda_range: f64, distance_to_exit: f64) -> Self {
        self.csda_range = Some(csda_range);
        self.distance_to_exit = Some(distance_to_exit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_parse_case_insensitively() {
        assert_eq!(
            TechniqueKind::parse("DirectionalRussianRoulette"),
            Some(TechniqueKind::DirectionalRussianRoulette)
        );
        assert_eq!(
            TechniqueKind::parse("directional-russian-roulette"),
            Some(TechniqueKind::DirectionalRussianRoulette)
        );
        assert_eq!(TechniqueKind::parse("SecondaryBiasing"), Some(TechniqueKind::UniformSplitting));
        assert_eq!(TechniqueKind::parse("uniform_splitting"), Some(TechniqueKind::UniformSplitting));
        assert_eq!(TechniqueKind::parse("RouletteEverything"), None);
    }

    #[test]
    fn every_kind_parses_from_its_display_name() {
        for kind in TechniqueKind::ALL {
            assert_eq!(TechniqueKind::parse(kind.display_name()), Some(kind));
        }
    }

    #[test]
    fn place_of_action_parses_known_values_only() {
        assert_eq!(PlaceOfAction::parse("OnBoundary"), Some(PlaceOfAction::OnBoundary));
        assert_eq!(PlaceOfAction::parse("oncollision"), Some(PlaceOfAction::OnCollision));
        assert_eq!(
            PlaceOfAction::parse("OnBoundaryAndCollision"),
            Some(PlaceOfAction::OnBoundaryAndCollision)
        );
        assert_eq!(PlaceOfAction::parse("OnStep"), None);
    }

    #[test]
    fn track_direction_is_normalized() {
        let track = Track::new(
            Species::new("e-", 0, 0, -1),
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, 5.0),
        );
        assert!((track.direction.norm() - 1.0).abs() < 1e-12);
    }
}
