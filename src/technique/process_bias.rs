//! Per-process cross-section enhancement and per-region forced interaction.

use crate::domain::TechniqueKind;
use crate::engine::{BiasingEngine, Directive};
use crate::error::AppError;
use crate::params::Dimension;

use super::{
    BiasingContext, BiasingTechnique, TechniqueBase, configured_regions, region_parm, require_region,
    require_same_length,
};

#[derive(Debug)]
pub struct CrossSectionEnhancement {
    base: TechniqueBase,
    /// (process, factor) in configuration order.
    factors: Vec<(String, f64)>,
}

impl CrossSectionEnhancement {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::CrossSectionEnhancement);
        Self {
            base,
            factors: Vec::new(),
        }
    }

    pub fn factors(&self) -> &[(String, f64)] {
        &self.factors
    }
}

impl BiasingTechnique for CrossSectionEnhancement {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let processes_parm = self.base.full_parm_name("ProcessesNamed");
        let factor_parm = self.base.full_parm_name("EnhancementFactor");
        let processes = ctx.parameters.string_vector(&processes_parm)?;
        let factors = ctx.parameters.unitless_vector(&factor_parm)?;
        require_same_length(&factor_parm, factors.len(), &processes_parm, processes.len())?;
        if let Some(bad) = factors.iter().find(|f| **f <= 0.0) {
            return Err(AppError::quit(factor_parm, format!("Enhancement factors must be positive, found {bad}.")));
        }
        self.factors = processes.into_iter().zip(factors).collect();
        Ok(())
    }

    fn initialize(&mut self, _ctx: &BiasingContext<'_>, engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        for (process, factor) in &self.factors {
            log::info!("{}: cross-section enhancement of {process} by {factor}", self.base.name);
            engine.submit(Directive::BiasingFactor {
                process: process.clone(),
                factor: *factor,
                flag: true,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForcedRegion {
    pub region: String,
    /// (process, forced distance in mm).
    pub processes: Vec<(String, f64)>,
    pub correct_by_weight: bool,
}

#[derive(Debug)]
pub struct ForcedInteraction {
    base: TechniqueBase,
    regions: Vec<ForcedRegion>,
}

impl ForcedInteraction {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::ForcedInteraction);
        Self {
            base,
            regions: Vec::new(),
        }
    }

    pub fn regions(&self) -> &[ForcedRegion] {
        &self.regions
    }
}

impl BiasingTechnique for ForcedInteraction {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let mut regions = Vec::new();
        for region in configured_regions(&self.base, ctx.parameters, "ProcessesNamed") {
            let processes_parm = region_parm(&self.base, &region, "ProcessesNamed");
            let distances_parm = region_parm(&self.base, &region, "ForcedDistances");
            require_region(ctx, &region, &processes_parm)?;

            let processes = ctx.parameters.string_vector(&processes_parm)?;
            let distances = ctx.parameters.double_vector(&distances_parm, Dimension::Length)?;
            require_same_length(&distances_parm, distances.len(), &processes_parm, processes.len())?;
            let correct_by_weight = ctx
                .parameters
                .boolean_or(&region_parm(&self.base, &region, "CorrectByWeight"), false)?;

            regions.push(ForcedRegion {
                region,
                processes: processes.into_iter().zip(distances).collect(),
                correct_by_weight,
            });
        }
        self.regions = regions;
        Ok(())
    }

    fn initialize(&mut self, _ctx: &BiasingContext<'_>, engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        for region in &self.regions {
            for (process, distance) in &region.processes {
                if self.base.verbosity > 0 {
                    log::info!(
                        "{}: forced interaction of {process} in {} within {distance} mm (correct by weight: {})",
                        self.base.name,
                        region.region,
                        region.correct_by_weight
                    );
                }
                engine.submit(Directive::ForcedInteraction {
                    process: process.clone(),
                    region: region.region.clone(),
                    distance: *distance,
                    correct_by_weight: region.correct_by_weight,
                });
            }
        }
        Ok(())
    }
}
