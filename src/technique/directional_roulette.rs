//! Directional Russian roulette.
//!
//! Secondaries created by listed processes in listed regions survive only when
//! their forward ray crosses a disc: the disc sits `limit` mm along the
//! reference component's axis, is perpendicular to the direction from the
//! origin to its centre, and has the configured radius.

use std::collections::HashMap;

use nalgebra::{Unit, Vector3};

use crate::domain::{Classification, TechniqueKind, Track};
use crate::error::AppError;
use crate::params::Dimension;

use super::{
    BiasingContext, BiasingTechnique, TechniqueBase, configured_regions, region_parm, require_component,
    require_region, require_same_length,
};

/// One (process, limit, radius) entry of a region.
#[derive(Debug, Clone, PartialEq)]
pub struct RouletteEntry {
    pub process: String,
    pub limit: f64,
    pub radius: f64,
}

/// Reference frame taken from the reference component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    pub axis: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl ReferenceFrame {
    /// Region-of-interest point for an axial limit.
    pub fn roi(&self, limit: f64) -> Vector3<f64> {
        self.axis * limit + self.translation
    }

    /// Whether the forward ray of `track` hits the disc of `radius` around the
    /// region-of-interest point at `limit`.
    pub fn accepts(&self, track: &Track, limit: f64, radius: f64) -> bool {
        let roi = self.roi(limit);
        let normal = Unit::try_new(roi, f64::EPSILON)
            .or_else(|| Unit::try_new(self.axis, f64::EPSILON))
            .map(|n| -n.into_inner())
            .unwrap_or_else(|| -Vector3::z());

        let denominator = normal.dot(&track.direction);
        if denominator == 0.0 {
            return false;
        }
        let s = -normal.dot(&(track.position - roi)) / denominator;
        if !s.is_finite() || s < 0.0 {
            return false;
        }
        let offset = track.position + track.direction * s - roi;
        offset.norm() <= radius
    }
}

#[derive(Debug)]
pub struct DirectionalRussianRoulette {
    base: TechniqueBase,
    /// Lower-cased region name → entries.
    regions: HashMap<String, Vec<RouletteEntry>>,
    frame: Option<ReferenceFrame>,
}

impl DirectionalRussianRoulette {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::DirectionalRussianRoulette);
        Self {
            base,
            regions: HashMap::new(),
            frame: None,
        }
    }

    pub fn frame(&self) -> Option<ReferenceFrame> {
        self.frame
    }

    pub fn entries(&self, region: &str) -> Option<&[RouletteEntry]> {
        self.regions.get(&region.to_lowercase()).map(Vec::as_slice)
    }

    fn resolve_region(&self, ctx: &BiasingContext<'_>, region: &str) -> Result<Vec<RouletteEntry>, AppError> {
        let processes_parm = region_parm(&self.base, region, "ProcessesNamed");
        let limits_parm = region_parm(&self.base, region, "DirectionalSplitLimits");
        let radius_parm = region_parm(&self.base, region, "DirectionalSplitRadius");

        require_region(ctx, region, &processes_parm)?;

        let processes = ctx.parameters.string_vector(&processes_parm)?;
        let limits = ctx.parameters.double_vector(&limits_parm, Dimension::Length)?;
        let radii = ctx.parameters.double_vector(&radius_parm, Dimension::Length)?;
        require_same_length(&limits_parm, limits.len(), &processes_parm, processes.len())?;
        require_same_length(&radius_parm, radii.len(), &processes_parm, processes.len())?;

        Ok(processes
            .into_iter()
            .zip(limits)
            .zip(radii)
            .map(|((process, limit), radius)| RouletteEntry { process, limit, radius })
            .collect())
    }
}

impl BiasingTechnique for DirectionalRussianRoulette {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let mut regions = HashMap::new();
        for region in configured_regions(&self.base, ctx.parameters, "DirectionalSplitLimits") {
            let entries = self.resolve_region(ctx, &region)?;
            regions.insert(region.to_lowercase(), entries);
        }

        let frame = if regions.is_empty() {
            None
        } else {
            let parm = self.base.full_parm_name("ReferenceComponent");
            if !ctx.parameters.exists(&parm) {
                return Err(AppError::quit(parm, "Is required when directional regions are configured."));
            }
            let component = require_component(ctx, &ctx.parameters.string(&parm)?, &parm)?;
            Some(ReferenceFrame {
                axis: component.world_z_axis(),
                translation: component.translation,
            })
        };

        if self.base.verbosity > 0 {
            log::info!("{}: {} directional region(s)", self.base.name, regions.len());
        }
        self.regions = regions;
        self.frame = frame;
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
        self.regions.clear();
        self.frame = None;
    }

    fn depends_on_geometry(&self) -> bool {
        true
    }

    fn apply(&self, track: &Track) -> Option<Classification> {
        let verdict = match (track.region.as_deref(), track.creator_process.as_deref(), self.frame) {
            (Some(region), Some(creator), Some(frame)) => {
                let rejected = self
                    .regions
                    .get(&region.to_lowercase())
                    .into_iter()
                    .flatten()
                    .filter(|entry| entry.process == creator)
                    .any(|entry| !frame.accepts(track, entry.limit, entry.radius));
                if rejected {
                    Classification::Kill
                } else {
                    Classification::Continue
                }
            }
            _ => Classification::Continue,
        };
        Some(verdict)
    }
}
