//! Uniform splitting of secondaries per region and process.
//!
//! Translates `Vr/<n>/ForRegion/<region>/{ProcessesNamed,SplitNumber,MaximumEnergies}`
//! into secondary-biasing directives, plus the optional directional-splitting
//! target configured by `UseDirectionalSplitting`, `TransX/Y/Z` and `RMax`.

use crate::domain::TechniqueKind;
use crate::engine::{BiasingEngine, Directive};
use crate::error::AppError;
use crate::params::Dimension;

use super::{
    BiasingContext, BiasingTechnique, TechniqueBase, configured_regions, region_parm, require_region,
    require_same_length,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSplit {
    pub process: String,
    pub split_number: f64,
    /// Below this energy (MeV) the engine plays Russian roulette instead.
    pub energy_limit: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionSplitting {
    pub region: String,
    pub processes: Vec<ProcessSplit>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalTarget {
    pub target: [f64; 3],
    pub radius: f64,
}

#[derive(Debug)]
pub struct UniformSplitting {
    base: TechniqueBase,
    regions: Vec<RegionSplitting>,
    directional: Option<DirectionalTarget>,
}

impl UniformSplitting {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::UniformSplitting);
        Self {
            base,
            regions: Vec::new(),
            directional: None,
        }
    }

    pub fn regions(&self) -> &[RegionSplitting] {
        &self.regions
    }

    pub fn directional(&self) -> Option<DirectionalTarget> {
        self.directional
    }

    /// One secondary-biasing directive per (process, region), then the
    /// directional-splitting switch.
    pub fn set_uniform_splitting(&self, engine: &mut dyn BiasingEngine) {
        for region in &self.regions {
            for split in &region.processes {
                if self.base.verbosity > 0 {
                    log::info!(
                        "{}: secondary biasing {} in {} split {} below {} MeV",
                        self.base.name,
                        split.process,
                        region.region,
                        split.split_number,
                        split.energy_limit
                    );
                }
                engine.submit(Directive::SecondaryBiasing {
                    process: split.process.clone(),
                    region: region.region.clone(),
                    split_number: split.split_number,
                    energy_limit: split.energy_limit,
                });
            }
        }

        match self.directional {
            Some(DirectionalTarget { target, radius }) => {
                log::info!("{}: using directional splitting", self.base.name);
                engine.submit(Directive::DirectionalSplitting { enabled: true });
                engine.submit(Directive::DirectionalSplittingTarget { target });
                engine.submit(Directive::DirectionalSplittingRadius { radius });
            }
            None => engine.submit(Directive::DirectionalSplitting { enabled: false }),
        }
    }

    fn resolve_region(&self, ctx: &BiasingContext<'_>, region: &str) -> Result<RegionSplitting, AppError> {
        let parameters = ctx.parameters;
        let processes_parm = region_parm(&self.base, region, "ProcessesNamed");
        let split_parm = region_parm(&self.base, region, "SplitNumber");
        let energy_parm = region_parm(&self.base, region, "MaximumEnergies");

        require_region(ctx, region, &processes_parm)?;

        let processes = parameters.string_vector(&processes_parm)?;
        let split_numbers = parameters.unitless_vector(&split_parm)?;
        let energy_limits = parameters.double_vector(&energy_parm, Dimension::Energy)?;
        require_same_length(&split_parm, split_numbers.len(), &processes_parm, processes.len())?;
        require_same_length(&energy_parm, energy_limits.len(), &processes_parm, processes.len())?;

        if let Some(bad) = split_numbers.iter().find(|n| **n < 1.0) {
            return Err(AppError::quit(split_parm, format!("Split numbers must be at least 1, found {bad}.")));
        }

        let processes = processes
            .into_iter()
            .zip(split_numbers)
            .zip(energy_limits)
            .map(|((process, split_number), energy_limit)| ProcessSplit {
                process,
                split_number,
                energy_limit,
            })
            .collect();
        Ok(RegionSplitting {
            region: region.to_string(),
            processes,
        })
    }
}

impl BiasingTechnique for UniformSplitting {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let regions = configured_regions(&self.base, ctx.parameters, "ProcessesNamed")
            .iter()
            .map(|region| self.resolve_region(ctx, region))
            .collect::<Result<Vec<_>, _>>()?;

        let parameters = ctx.parameters;
        let directional = if parameters.boolean_or(&self.base.full_parm_name("UseDirectionalSplitting"), false)? {
            let length = |parm: &str| parameters.double(&self.base.full_parm_name(parm), Dimension::Length);
            Some(DirectionalTarget {
                target: [length("TransX")?, length("TransY")?, length("TransZ")?],
                radius: length("RMax")?,
            })
        } else {
            None
        };

        self.regions = regions;
        self.directional = directional;
        Ok(())
    }

    fn initialize(&mut self, ctx: &BiasingContext<'_>, engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        self.clear();
        self.resolve_parameters(ctx)?;
        self.set_uniform_splitting(engine);
        Ok(())
    }

    fn clear(&mut self) {
        self.regions.clear();
        self.directional = None;
    }
}
