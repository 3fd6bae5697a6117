//! Kill every species not selected by an allow-list (or selected by a
//! deny-list), optionally sparing tracks inside exempt components.

use crate::domain::{Classification, TechniqueKind, Track};
use crate::error::AppError;
use crate::particles::{SpeciesFilter, resolve_species_filter};

use super::{BiasingContext, BiasingTechnique, TechniqueBase, require_component};

#[derive(Debug)]
pub struct KillOtherParticles {
    base: TechniqueBase,
    filter: Option<SpeciesFilter>,
    /// Lower-cased exempt volume names; `None` when no exemption list is set.
    exempt_volumes: Option<Vec<String>>,
}

impl KillOtherParticles {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::KillOtherParticles);
        Self {
            base,
            filter: None,
            exempt_volumes: None,
        }
    }

    pub fn filter(&self) -> Option<&SpeciesFilter> {
        self.filter.as_ref()
    }

    /// Species matches some entry, XOR the deny-list flag.
    pub fn accept_track(&self, track: &Track) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|filter| filter.accepts(&track.species))
    }

    fn exempt(&self, track: &Track) -> bool {
        match (&self.exempt_volumes, track.volume.as_deref()) {
            (Some(volumes), Some(volume)) => volumes.iter().any(|v| v.eq_ignore_ascii_case(volume)),
            _ => false,
        }
    }
}

impl BiasingTechnique for KillOtherParticles {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let named = self.base.full_parm_name("OnlyTrackParticlesNamed");
        let not_named = self.base.full_parm_name("OnlyTrackParticlesNotNamed");
        let filter = resolve_species_filter(ctx.parameters, ctx.particles, &named, &not_named)?
            .ok_or_else(|| AppError::quit(named.clone(), format!("Either this or {not_named} must be set.")))?;

        let exempt_parm = self.base.full_parm_name("HaveNoEffectInComponentsNamed");
        let exempt_volumes = if ctx.parameters.exists(&exempt_parm) {
            let names = ctx.parameters.string_vector(&exempt_parm)?;
            let volumes = names
                .iter()
                .map(|name| require_component(ctx, name, &exempt_parm).map(|c| c.name.to_lowercase()))
                .collect::<Result<Vec<_>, _>>()?;
            Some(volumes)
        } else {
            None
        };

        if self.base.verbosity > 0 {
            log::info!(
                "{}: {} species entr(ies), invert={}, exemptions={:?}",
                self.base.name,
                filter.selectors.len(),
                filter.invert,
                exempt_volumes
            );
        }
        self.filter = Some(filter);
        self.exempt_volumes = exempt_volumes;
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
        self.exempt_volumes = None;
    }

    fn apply(&self, track: &Track) -> Option<Classification> {
        let kill = !self.accept_track(track) && !self.exempt(track);
        Some(if kill { Classification::Kill } else { Classification::Continue })
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use super::*;
    use crate::domain::Species;
    use crate::geometry::{Component, InMemoryGeometry};
    use crate::params::ParameterStore;
    use crate::technique::fixtures::*;

    fn kill_other(params: ParameterStore) -> Result<KillOtherParticles, AppError> {
        let geometry = InMemoryGeometry::new().with_component(Component::new("Collimator"));
        let harness = Harness::new(params, geometry);
        let mut technique = KillOtherParticles::new(TechniqueBase::new("Kill", TechniqueKind::KillOtherParticles, 0));
        technique.resolve(&harness.ctx())?;
        Ok(technique)
    }

    fn track(species: Species) -> Track {
        Track::new(species, Vector3::zeros(), Vector3::z())
    }

    #[test]
    fn allow_list_kills_everything_else() {
        let technique = kill_other(
            ParameterStore::new().with("Vr/Kill/OnlyTrackParticlesNamed", strings(&["e-", "gamma"])),
        )
        .unwrap();
        assert_eq!(technique.classify(&track(Species::new("proton", 1, 1, 1))), Classification::Kill);
        assert_eq!(technique.classify(&track(Species::new("e-", 0, 0, -1))), Classification::Continue);
    }

    #[test]
    fn deny_list_inverts_acceptance() {
        let technique = kill_other(
            ParameterStore::new().with("Vr/Kill/OnlyTrackParticlesNotNamed", strings(&["GenericIon(6,*,*)"])),
        )
        .unwrap();
        assert!(!technique.accept_track(&track(Species::ion(6, 12, 4))));
        assert!(technique.accept_track(&track(Species::ion(8, 16, 8))));
        assert!(technique.accept_track(&track(Species::new("gamma", 0, 0, 0))));
    }

    #[test]
    fn exempt_volumes_spare_rejected_species() {
        let technique = kill_other(
            ParameterStore::new()
                .with("Vr/Kill/OnlyTrackParticlesNamed", strings(&["gamma"]))
                .with("Vr/Kill/HaveNoEffectInComponentsNamed", strings(&["Collimator"])),
        )
        .unwrap();
        let inside = track(Species::new("e-", 0, 0, -1)).with_volume("Collimator");
        let outside = track(Species::new("e-", 0, 0, -1)).with_volume("World");
        assert_eq!(technique.classify(&inside), Classification::Continue);
        assert_eq!(technique.classify(&outside), Classification::Kill);
    }

    #[test]
    fn unknown_names_are_fatal() {
        let err = kill_other(ParameterStore::new().with("Vr/Kill/OnlyTrackParticlesNamed", strings(&["graviton"])))
            .unwrap_err();
        assert_eq!(err.parameter(), Some("Vr/Kill/OnlyTrackParticlesNamed"));

        let err = kill_other(
            ParameterStore::new()
                .with("Vr/Kill/OnlyTrackParticlesNamed", strings(&["gamma"]))
                .with("Vr/Kill/HaveNoEffectInComponentsNamed", strings(&["Gantry"])),
        )
        .unwrap_err();
        assert_eq!(err.parameter(), Some("Vr/Kill/HaveNoEffectInComponentsNamed"));
    }

    #[test]
    fn a_species_list_is_required() {
        let err = kill_other(ParameterStore::new()).unwrap_err();
        assert!(err.is_configuration());
    }
}
