//! Sampler binding shared by the cell-table techniques (weight window,
//! importance sampling, geometrical particle split).

use crate::engine::{BiasingEngine, Directive, SamplerAlgorithm};
use crate::error::AppError;
use crate::geometry::WORLD;
use crate::particles::{SpeciesSelector, TREAT_EXCITED_IONS_AS_GROUND_STATE};
use crate::store::GeometryCell;

use super::{BiasingContext, TechniqueBase, require_component};

/// Controlling component, its parent and sub-components, plus the particles
/// the sampler is installed for.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerBinding {
    pub component: String,
    pub parent: String,
    pub sub_components: Vec<String>,
    /// World the sampler binds to: the component when parallel, else `World`.
    pub world: String,
    pub parallel: bool,
    pub particles: Vec<String>,
}

impl SamplerBinding {
    pub fn resolve(base: &TechniqueBase, ctx: &BiasingContext<'_>) -> Result<Self, AppError> {
        let parameters = ctx.parameters;

        let component_parm = base.full_parm_name("Component");
        let component = require_component(ctx, &parameters.string(&component_parm)?, &component_parm)?;

        let subs_parm = base.full_parm_name("SubComponents");
        let sub_components = parameters
            .string_vector(&subs_parm)?
            .iter()
            .map(|name| require_component(ctx, name, &subs_parm).map(|c| c.name.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        if sub_components.is_empty() {
            return Err(AppError::quit(subs_parm, "At least one sub-component is required."));
        }

        let particle_parm = base.full_parm_name("ParticleName");
        let treat_excited = parameters.boolean_or(TREAT_EXCITED_IONS_AS_GROUND_STATE, false)?;
        let particles = parameters
            .string_vector(&particle_parm)?
            .into_iter()
            .map(|raw| {
                ctx.particles
                    .resolve(&raw, &particle_parm, treat_excited)
                    .map(|selector| match selector {
                        SpeciesSelector::Exact(name) => name,
                        SpeciesSelector::Ion { .. } => raw,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            component: component.name.clone(),
            parent: component.parent.clone().unwrap_or_else(|| WORLD.to_string()),
            sub_components,
            world: component.owning_world().to_string(),
            parallel: component.parallel,
            particles,
        })
    }

    pub fn parent_cell(&self) -> GeometryCell {
        GeometryCell::new(&self.parent, 0)
    }

    pub fn component_cell(&self) -> GeometryCell {
        GeometryCell::new(&self.component, 0)
    }

    pub fn sub_cells(&self) -> impl Iterator<Item = GeometryCell> + '_ {
        self.sub_components.iter().map(|name| GeometryCell::new(name, 0))
    }

    /// Leader prepares and configures the shared samplers, every context
    /// attaches its own.
    pub fn install(&self, ctx: &BiasingContext<'_>, algorithm: &SamplerAlgorithm, engine: &mut dyn BiasingEngine) {
        for particle in &self.particles {
            if ctx.exec.leader {
                engine.submit(Directive::PrepareSampler {
                    world: self.world.clone(),
                    particle: particle.clone(),
                    parallel: self.parallel,
                    algorithm: algorithm.clone(),
                });
            }
            engine.submit(Directive::AttachSampler {
                world: self.world.clone(),
                particle: particle.clone(),
            });
        }
    }
}
