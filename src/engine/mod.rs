//! Directives issued to the transport engine's native biasing subsystems.
//!
//! Native mechanisms (secondary splitting, weight-window sampling, forced
//! interaction, ...) live in the engine. Techniques only translate their
//! configuration into `Directive` values and hand them to a `BiasingEngine`.

use serde::{Deserialize, Serialize};

use crate::domain::{PlaceOfAction, SplitAxis, TechniqueKind};

/// Sink for directives.
pub trait BiasingEngine {
    fn submit(&mut self, directive: Directive);
}

/// One instruction for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Directive {
    /// Split secondaries of `process` in `region` below `energy_limit` (MeV).
    SecondaryBiasing {
        process: String,
        region: String,
        split_number: f64,
        energy_limit: f64,
    },
    DirectionalSplitting { enabled: bool },
    /// Target point (mm) of directional splitting.
    DirectionalSplittingTarget { target: [f64; 3] },
    /// Acceptance radius (mm) around the target.
    DirectionalSplittingRadius { radius: f64 },
    /// Scale the cross section of `process` by `factor`.
    BiasingFactor {
        process: String,
        factor: f64,
        flag: bool,
    },
    ForcedInteraction {
        process: String,
        region: String,
        distance: f64,
        correct_by_weight: bool,
    },
    /// Prepare the shared sampler; issued by the leader context only.
    PrepareSampler {
        world: String,
        particle: String,
        parallel: bool,
        algorithm: SamplerAlgorithm,
    },
    /// Attach a per-context sampler process.
    AttachSampler { world: String, particle: String },
    /// Non-physics bias for a particle (periodic boundaries).
    NonPhysicsBias {
        technique: TechniqueKind,
        particle: String,
    },
    /// Attach a biasing operator to logical volumes.
    AttachOperator {
        technique: TechniqueKind,
        volumes: Vec<String>,
        operator: OperatorSpec,
    },
}

impl Directive {
    /// Kebab-case tag, as used in serialized output.
    pub fn label(&self) -> &'static str {
        match self {
            Directive::SecondaryBiasing { .. } => "secondary-biasing",
            Directive::DirectionalSplitting { .. } => "directional-splitting",
            Directive::DirectionalSplittingTarget { .. } => "directional-splitting-target",
            Directive::DirectionalSplittingRadius { .. } => "directional-splitting-radius",
            Directive::BiasingFactor { .. } => "biasing-factor",
            Directive::ForcedInteraction { .. } => "forced-interaction",
            Directive::PrepareSampler { .. } => "prepare-sampler",
            Directive::AttachSampler { .. } => "attach-sampler",
            Directive::NonPhysicsBias { .. } => "non-physics-bias",
            Directive::AttachOperator { .. } => "attach-operator",
        }
    }
}

/// Sampling algorithm behind a prepared sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum SamplerAlgorithm {
    WeightWindow {
        upper_limit_factor: f64,
        survival_factor: f64,
        max_split: i64,
        place: PlaceOfAction,
    },
    Importance,
    GeometricalSplit { axis: SplitAxis },
}

/// Operator payload for `AttachOperator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "kebab-case")]
pub enum OperatorSpec {
    InelasticSplit {
        split_number: i64,
        only_primary: bool,
        only_once: bool,
        roulette_exempt_particles: Vec<String>,
    },
    ImportanceMesh {
        divisions: [usize; 3],
        values: Vec<f64>,
        parallel_world: Option<String>,
    },
}

/// Engine that records every directive in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectiveLog {
    directives: Vec<Directive>,
}

impl DirectiveLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn clear(&mut self) {
        self.directives.clear();
    }

    pub fn into_directives(self) -> Vec<Directive> {
        self.directives
    }
}

impl BiasingEngine for DirectiveLog {
    fn submit(&mut self, directive: Directive) {
        log::trace!("directive {directive:?}");
        self.directives.push(directive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_submission_order() {
        let mut log = DirectiveLog::new();
        log.submit(Directive::DirectionalSplitting { enabled: false });
        log.submit(Directive::DirectionalSplittingRadius { radius: 5.0 });
        assert_eq!(log.len(), 2);
        assert_eq!(log.directives()[0], Directive::DirectionalSplitting { enabled: false });
    }

    #[test]
    fn directives_serialize_with_kind_tag() {
        let json = serde_json::to_value(Directive::BiasingFactor {
            process: "compt".into(),
            factor: 10.0,
            flag: true,
        })
        .unwrap();
        assert_eq!(json["kind"], "biasing-factor");
        assert_eq!(json["process"], "compt");
    }
}
