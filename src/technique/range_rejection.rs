//! Range rejection: kill tracks that cannot leave their current volume.
//!
//! The engine supplies the residual CSDA range and the distance to the volume
//! boundary along the direction of flight; the technique only compares them
//! for selected species in selected regions.

use crate::domain::{Classification, TechniqueKind, Track};
use crate::error::AppError;
use crate::geometry::DEFAULT_REGION;
use crate::particles::{SpeciesFilter, resolve_species_filter};

use super::{BiasingContext, BiasingTechnique, TechniqueBase, require_region};

#[derive(Debug)]
pub struct RangeRejection {
    base: TechniqueBase,
    filter: Option<SpeciesFilter>,
    /// Lower-cased region names.
    regions: Vec<String>,
}

impl RangeRejection {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::RangeRejection);
        Self {
            base,
            filter: None,
            regions: Vec::new(),
        }
    }

    fn applies_to(&self, track: &Track) -> bool {
        let species_selected = self
            .filter
            .as_ref()
            .is_some_and(|filter| filter.accepts(&track.species));
        let region_selected = track
            .region
            .as_deref()
            .is_some_and(|region| self.regions.contains(&region.to_lowercase()));
        species_selected && track.volume.is_some() && region_selected
    }
}

impl BiasingTechnique for RangeRejection {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let named = self.base.full_parm_name("ParticlesNamed");
        let not_named = self.base.full_parm_name("ParticlesNotNamed");
        let filter = resolve_species_filter(ctx.parameters, ctx.particles, &named, &not_named)?
            .ok_or_else(|| AppError::quit(named.clone(), format!("Either this or {not_named} must be set.")))?;

        let regions_parm = self.base.full_parm_name("Regions");
        if !ctx.parameters.exists(&regions_parm) {
            return Err(AppError::quit(regions_parm, "Has not been defined."));
        }
        let mut regions = Vec::new();
        for region in ctx.parameters.string_vector(&regions_parm)? {
            if !region.eq_ignore_ascii_case(DEFAULT_REGION) {
                require_region(ctx, &region, &regions_parm)?;
            }
            regions.push(region.to_lowercase());
        }

        self.filter = Some(filter);
        self.regions = regions;
        Ok(())
    }

    fn initialize(
        &mut self,
        ctx: &BiasingContext<'_>,
        _engine: &mut dyn crate::engine::BiasingEngine,
    ) -> Result<(), AppError> {
        self.clear();
        self.resolve_parameters(ctx)
    }

    fn clear(&mut self) {
        self.filter = None;
        self.regions.clear();
    }

    fn apply(&self, track: &Track) -> Option<Classification> {
        if !self.applies_to(track) {
            return Some(Classification::Continue);
        }
        let verdict = match (track.csda_range, track.distance_to_exit) {
            (Some(range), Some(distance)) if distance > range => Classification::Kill,
            _ => Classification::Continue,
        };
        Some(verdict)
    }
}
