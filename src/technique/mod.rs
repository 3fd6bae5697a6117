//! Biasing techniques.
//!
//! Every variant implements `BiasingTechnique`. The registry owns the boxed
//! instances and drives their lifecycle:
//!
//! - `resolve` right after construction and again when parameters changed
//! - `start_run` at the beginning of every run (after `reset`)
//! - `add_biasing_process` once, when the engine installs processes
//! - `classify` for the variants that filter new tracks
//!
//! Misconfiguration is reported as `AppError::quit` naming the parameter.

use crate::domain::{Classification, LifecycleState, TechniqueKind, Track};
use crate::engine::BiasingEngine;
use crate::error::AppError;
use crate::geometry::{Component, DEFAULT_REGION, GeometryService};
use crate::params::ParameterStore;
use crate::particles::ParticleTable;
use crate::store::{CellStores, ExecutionContext};

pub mod directional_roulette;
pub mod importance;
pub mod kill_other;
pub mod operator;
pub mod periodic_boundary;
pub mod process_bias;
pub mod range_rejection;
pub mod sampler;
pub mod uniform_splitting;
pub mod weight_window;

pub use directional_roulette::DirectionalRussianRoulette;
pub use importance::{GeometricalParticleSplit, ImportanceSampling};
pub use kill_other::KillOtherParticles;
pub use operator::{AutomaticImportanceSampling, InelasticSplitting};
pub use periodic_boundary::PeriodicBoundaryCondition;
pub use process_bias::{CrossSectionEnhancement, ForcedInteraction};
pub use range_rejection::RangeRejection;
pub use uniform_splitting::UniformSplitting;
pub use weight_window::WeightWindow;

/// Everything a technique may consult while resolving or initializing.
#[derive(Clone, Copy)]
pub struct BiasingContext<'a> {
    pub parameters: &'a ParameterStore,
    pub geometry: &'a dyn GeometryService,
    pub particles: &'a ParticleTable,
    pub stores: &'a CellStores,
    pub exec: ExecutionContext,
}

/// State shared by every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueBase {
    pub name: String,
    pub kind: TechniqueKind,
    pub state: LifecycleState,
    /// A parameter of this technique changed since the last resolve.
    pub changed: bool,
    pub verbosity: i64,
}

impl TechniqueBase {
    pub fn new(name: impl Into<String>, kind: TechniqueKind, verbosity: i64) -> Self {
        Self {
            name: name.into(),
            kind,
            state: LifecycleState::Unconfigured,
            changed: false,
            verbosity,
        }
    }

    /// `Vr/<name>/<parm>`
    pub fn full_parm_name(&self, parm: &str) -> String {
        format!("Vr/{}/{parm}", self.name)
    }

    /// Fatal configuration error on `Vr/<name>/<parm>`.
    pub fn quit(&self, parm: &str, message: impl Into<String>) -> AppError {
        AppError::quit(self.full_parm_name(parm), message)
    }
}

pub trait BiasingTechnique: Send {
    fn base(&self) -> &TechniqueBase;
    fn base_mut(&mut self) -> &mut TechniqueBase;

    /// Read and validate this technique's parameters.
    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError>;

    /// Per-run setup; issues the directives the variant translates to.
    fn initialize(&mut self, _ctx: &BiasingContext<'_>, _engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        Ok(())
    }

    /// Drop per-run state.
    fn clear(&mut self) {}

    /// Attach native operators or samplers for this execution context.
    fn add_biasing_process(
        &mut self,
        _ctx: &BiasingContext<'_>,
        _engine: &mut dyn BiasingEngine,
    ) -> Result<(), AppError> {
        Ok(())
    }

    /// Verdict for a new track; `None` for variants that do not classify.
    fn apply(&self, _track: &Track) -> Option<Classification> {
        None
    }

    /// Whether a geometry rebuild invalidates the resolved configuration.
    fn depends_on_geometry(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn kind(&self) -> TechniqueKind {
        self.base().kind
    }

    fn state(&self) -> LifecycleState {
        self.base().state
    }

    fn full_parm_name(&self, parm: &str) -> String {
        self.base().full_parm_name(parm)
    }

    fn update_for_specific_parameter_change(&mut self, parameter: &str) {
        log::debug!("{}: parameter {parameter} changed", self.base().name);
        self.base_mut().changed = true;
    }

    /// Re-resolve when a parameter changed (or the geometry this technique
    /// depends on was rebuilt).
    fn update_for_new_run(&mut self, ctx: &BiasingContext<'_>, rebuilt: bool) -> Result<(), AppError> {
        if self.base().changed || (rebuilt && self.depends_on_geometry()) {
            self.resolve(ctx)?;
        }
        Ok(())
    }

    /// `resolve_parameters` plus lifecycle bookkeeping.
    fn resolve(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        self.base_mut().verbosity = ctx.parameters.verbosity();
        self.resolve_parameters(ctx)?;
        let base = self.base_mut();
        base.changed = false;
        if base.state == LifecycleState::Unconfigured {
            base.state = LifecycleState::Configured;
        }
        Ok(())
    }

    /// `initialize` plus lifecycle bookkeeping.
    fn start_run(&mut self, ctx: &BiasingContext<'_>, engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        if self.state() == LifecycleState::Unconfigured {
            return Err(AppError::internal(format!(
                "{} was initialized before its parameters were resolved.",
                self.name()
            )));
        }
        self.initialize(ctx, engine)?;
        self.base_mut().state = LifecycleState::Active;
        Ok(())
    }

    /// `clear` plus lifecycle bookkeeping.
    fn reset(&mut self) {
        self.clear();
        if self.state() == LifecycleState::Active {
            self.base_mut().state = LifecycleState::Configured;
        }
    }

    /// Total classification: anything not resolved yet continues.
    fn classify(&self, track: &Track) -> Classification {
        if self.state() == LifecycleState::Unconfigured {
            return Classification::Continue;
        }
        self.apply(track).unwrap_or(Classification::Continue)
    }
}

/// Construct the variant for `kind` and resolve its parameters.
pub fn construct(
    kind: TechniqueKind,
    name: &str,
    ctx: &BiasingContext<'_>,
) -> Result<Box<dyn BiasingTechnique>, AppError> {
    let verbosity = ctx.parameters.verbosity();
    let base = TechniqueBase::new(name, kind, verbosity);
    let mut technique: Box<dyn BiasingTechnique> = match kind {
        TechniqueKind::GeometricalParticleSplit => Box::new(GeometricalParticleSplit::new(base)),
        TechniqueKind::ImportanceSampling => Box::new(ImportanceSampling::new(base)),
        TechniqueKind::WeightWindow => Box::new(WeightWindow::new(base)),
        TechniqueKind::UniformSplitting => Box::new(UniformSplitting::new(base)),
        TechniqueKind::CrossSectionEnhancement => Box::new(CrossSectionEnhancement::new(base)),
        TechniqueKind::ForcedInteraction => Box::new(ForcedInteraction::new(base)),
        TechniqueKind::KillOtherParticles => Box::new(KillOtherParticles::new(base)),
        TechniqueKind::DirectionalRussianRoulette => Box::new(DirectionalRussianRoulette::new(base)),
        TechniqueKind::RangeRejection => Box::new(RangeRejection::new(base)),
        TechniqueKind::InelasticSplitting => Box::new(InelasticSplitting::new(base)),
        TechniqueKind::AutomaticImportanceSampling | TechniqueKind::AutomaticImportanceSamplingParallel => {
            Box::new(AutomaticImportanceSampling::new(base))
        }
        TechniqueKind::PeriodicBoundaryCondition => Box::new(PeriodicBoundaryCondition::new(base)),
    };
    technique.resolve(ctx)?;
    Ok(technique)
}

/// Region names configured under `Vr/<name>/ForRegion/<region>/<suffix>`, in
/// lexical order, deduplicated case-insensitively (first wins). The default
/// world region is returned in its canonical spelling.
pub(crate) fn configured_regions(base: &TechniqueBase, parameters: &ParameterStore, suffix: &str) -> Vec<String> {
    let prefix = base.full_parm_name("ForRegion/");
    let tail = format!("/{suffix}");
    let mut seen = std::collections::HashSet::new();
    parameters
        .names_bracketed_by(&prefix, &tail)
        .into_iter()
        .filter_map(|parameter| {
            let region = parameter.get(prefix.len()..parameter.len() - tail.len())?;
            if region.is_empty() || region.contains('/') {
                return None;
            }
            let region = if region.eq_ignore_ascii_case(DEFAULT_REGION) {
                DEFAULT_REGION.to_string()
            } else {
                region.to_string()
            };
            seen.insert(region.to_lowercase()).then_some(region)
        })
        .collect()
}

/// `Vr/<name>/ForRegion/<region>/<parm>`
pub(crate) fn region_parm(base: &TechniqueBase, region: &str, parm: &str) -> String {
    base.full_parm_name(&format!("ForRegion/{region}/{parm}"))
}

/// Fail unless `region` exists in the geometry.
pub(crate) fn require_region(ctx: &BiasingContext<'_>, region: &str, parameter: &str) -> Result<(), AppError> {
    if ctx.geometry.region_exists(region) {
        Ok(())
    } else {
        Err(AppError::quit(
            parameter,
            format!("Refers to an unknown region \"{region}\"."),
        ))
    }
}

/// Component lookup that fails with the parameter name.
pub(crate) fn require_component<'a>(
    ctx: &BiasingContext<'a>,
    name: &str,
    parameter: &str,
) -> Result<&'a Component, AppError> {
    ctx.geometry
        .component(name)
        .ok_or_else(|| AppError::quit(parameter, format!("Refers to an unknown component \"{name}\".")))
}

/// Fail unless `actual` equals `expected`.
pub(crate) fn require_same_length(
    parameter: &str,
    actual: usize,
    reference: &str,
    expected: usize,
) -> Result<(), AppError> {
    if actual == expected {
        Ok(())
    } else {
        Err(AppError::quit(
            parameter,
            format!("Has {actual} elements; the number of elements must match {reference} ({expected})."),
        ))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::geometry::InMemoryGeometry;
    use crate::params::{ParameterStore, ParameterValue};
    use crate::particles::ParticleTable;
    use crate::store::{CellStores, ExecutionContext};

    use super::BiasingContext;

    /// Owned collaborators for unit tests.
    pub struct Harness {
        pub parameters: ParameterStore,
        pub geometry: InMemoryGeometry,
        pub particles: ParticleTable,
        pub stores: CellStores,
        pub exec: ExecutionContext,
    }

    impl Harness {
        pub fn new(parameters: ParameterStore, geometry: InMemoryGeometry) -> Self {
            Self {
                parameters,
                geometry,
                particles: ParticleTable::standard(),
                stores: CellStores::new(),
                exec: ExecutionContext::leader(),
            }
        }

        pub fn ctx(&self) -> BiasingContext<'_> {
            BiasingContext {
                parameters: &self.parameters,
                geometry: &self.geometry,
                particles: &self.particles,
                stores: &self.stores,
                exec: self.exec,
            }
        }
    }

    pub fn string(value: &str) -> ParameterValue {
        ParameterValue::String(value.to_string())
    }

    pub fn strings(values: &[&str]) -> ParameterValue {
        ParameterValue::StringVector(values.iter().map(|v| v.to_string()).collect())
    }

    pub fn doubles(values: &[f64], unit: &str) -> ParameterValue {
        ParameterValue::DoubleVector {
            values: values.to_vec(),
            unit: Some(unit.to_string()),
        }
    }

    pub fn unitless(values: &[f64]) -> ParameterValue {
        ParameterValue::DoubleVector {
            values: values.to_vec(),
            unit: None,
        }
    }
}
