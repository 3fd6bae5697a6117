//! Periodic boundary condition: particles exempt from ordinary biasing so an
//! external periodic-boundary mechanism can act on them. Does not classify.

use crate::domain::TechniqueKind;
use crate::engine::{BiasingEngine, Directive};
use crate::error::AppError;
use crate::particles::{SpeciesSelector, resolve_species_list};

use super::{BiasingContext, BiasingTechnique, TechniqueBase};

#[derive(Debug)]
pub struct PeriodicBoundaryCondition {
    base: TechniqueBase,
    particles: Vec<String>,
}

impl PeriodicBoundaryCondition {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::PeriodicBoundaryCondition);
        Self {
            base,
            particles: Vec::new(),
        }
    }

    pub fn particles(&self) -> &[String] {
        &self.particles
    }
}

impl BiasingTechnique for PeriodicBoundaryCondition {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let parm = self.base.full_parm_name("ParticlesNamed");
        let raw = ctx.parameters.string_vector(&parm)?;
        let selectors = resolve_species_list(ctx.parameters, ctx.particles, &parm)?;
        self.particles = selectors
            .into_iter()
            .zip(raw)
            .map(|(selector, raw)| match selector {
                SpeciesSelector::Exact(name) => name,
                SpeciesSelector::Ion { .. } => raw,
            })
            .collect();
        Ok(())
    }

    fn add_biasing_process(
        &mut self,
        _ctx: &BiasingContext<'_>,
        engine: &mut dyn BiasingEngine,
    ) -> Result<(), AppError> {
        for particle in &self.particles {
            engine.submit(Directive::NonPhysicsBias {
                technique: self.base.kind,
                particle: particle.clone(),
            });
        }
        Ok(())
    }
}
