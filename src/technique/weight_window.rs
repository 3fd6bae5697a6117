//! Weight-window technique.
//!
//! Builds the per-cell (energy upper bound → lower weight) table for the
//! controlling component, its parent and each sub-component, publishes it to
//! the shared `CellStores` from the leader context, and installs a
//! weight-window sampler for each listed particle.

use crate::domain::{PlaceOfAction, TechniqueKind};
use crate::engine::{BiasingEngine, SamplerAlgorithm};
use crate::error::AppError;
use crate::params::Dimension;
use crate::store::WeightWindowTable;

use super::sampler::SamplerBinding;
use super::{BiasingContext, BiasingTechnique, TechniqueBase, require_same_length};

#[derive(Debug, Clone, PartialEq)]
pub struct WeightWindowSettings {
    pub binding: SamplerBinding,
    /// One (energy upper bound, lower weight) pair per sub-component.
    pub windows: Vec<(f64, f64)>,
    pub upper_limit_factor: f64,
    pub survival_factor: f64,
    pub max_split: i64,
    pub place: PlaceOfAction,
}

impl WeightWindowSettings {
    /// Parent and component take the first pair; sub-component i takes pair i.
    pub fn cell_table(&self) -> WeightWindowTable {
        let mut table = WeightWindowTable::default();
        let first: Vec<_> = self.windows.first().copied().into_iter().collect();
        table.insert(self.binding.parent_cell(), first.clone());
        table.insert(self.binding.component_cell(), first);
        for (cell, window) in self.binding.sub_cells().zip(&self.windows) {
            table.insert(cell, vec![*window]);
        }
        table
    }

    fn algorithm(&self) -> SamplerAlgorithm {
        SamplerAlgorithm::WeightWindow {
            upper_limit_factor: self.upper_limit_factor,
            survival_factor: self.survival_factor,
            max_split: self.max_split,
            place: self.place,
        }
    }
}

#[derive(Debug)]
pub struct WeightWindow {
    base: TechniqueBase,
    settings: Option<WeightWindowSettings>,
    needs_rebuild: bool,
}

impl WeightWindow {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::WeightWindow);
        Self {
            base,
            settings: None,
            needs_rebuild: true,
        }
    }

    pub fn settings(&self) -> Option<&WeightWindowSettings> {
        self.settings.as_ref()
    }

    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    fn settings_or_err(&self) -> Result<&WeightWindowSettings, AppError> {
        self.settings
            .as_ref()
            .ok_or_else(|| AppError::internal(format!("{} used before its parameters were resolved.", self.base.name)))
    }
}

impl BiasingTechnique for WeightWindow {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let parameters = ctx.parameters;
        let binding = SamplerBinding::resolve(&self.base, ctx)?;

        let subs_parm = self.base.full_parm_name("SubComponents");
        let energy_parm = self.base.full_parm_name("EnergyMap");
        let weight_parm = self.base.full_parm_name("WeightMap");
        let energies = parameters.double_vector(&energy_parm, Dimension::Energy)?;
        let weights = parameters.unitless_vector(&weight_parm)?;
        require_same_length(&energy_parm, energies.len(), &subs_parm, binding.sub_components.len())?;
        require_same_length(&weight_parm, weights.len(), &subs_parm, binding.sub_components.len())?;

        let place_parm = self.base.full_parm_name("PlaceOfAction");
        let place_raw = parameters.string(&place_parm)?;
        let place = PlaceOfAction::parse(&place_raw).ok_or_else(|| {
            AppError::quit(
                place_parm,
                format!("Refers to an unknown place of action \"{place_raw}\" for the weight window technique."),
            )
        })?;

        self.settings = Some(WeightWindowSettings {
            binding,
            windows: energies.into_iter().zip(weights).collect(),
            upper_limit_factor: parameters.unitless(&self.base.full_parm_name("UpperLimitFactor"))?,
            survival_factor: parameters.unitless(&self.base.full_parm_name("SurvivalFactor"))?,
            max_split: parameters.integer(&self.base.full_parm_name("MaximumSplitNumber"))?,
            place,
        });
        Ok(())
    }

    fn initialize(&mut self, ctx: &BiasingContext<'_>, _engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        if !self.needs_rebuild {
            return Ok(());
        }
        let settings = self.settings_or_err()?;
        if ctx.exec.leader {
            let table = settings.cell_table();
            if self.base.verbosity > 1 {
                for cell in [settings.binding.parent_cell(), settings.binding.component_cell()]
                    .into_iter()
                    .chain(settings.binding.sub_cells())
                {
                    log::info!("{}: cell {} bounds {:?}", self.base.name, cell.volume, table.bounds(&cell));
                }
            }
            ctx.stores
                .publish_weight_windows(ctx.exec, &self.base.name, &settings.binding.world, table)?;
        }
        self.needs_rebuild = false;
        Ok(())
    }

    fn clear(&mut self) {
        self.needs_rebuild = true;
    }

    fn add_biasing_process(
        &mut self,
        ctx: &BiasingContext<'_>,
        engine: &mut dyn BiasingEngine,
    ) -> Result<(), AppError> {
        let settings = self.settings_or_err()?;
        settings.binding.install(ctx, &settings.algorithm(), engine);
        Ok(())
    }

    fn depends_on_geometry(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Directive, DirectiveLog};
    use crate::geometry::{Component, InMemoryGeometry};
    use crate::params::{ParameterStore, ParameterValue};
    use crate::store::{ExecutionContext, GeometryCell};
    use crate::technique::fixtures::*;

    fn params() -> ParameterStore {
        ParameterStore::new()
            .with("Vr/Ww/Component", string("Shield"))
            .with("Vr/Ww/SubComponents", strings(&["Layer1", "Layer2"]))
            .with("Vr/Ww/EnergyMap", doubles(&[10.0, 20.0], "MeV"))
            .with("Vr/Ww/WeightMap", unitless(&[0.5, 0.25]))
            .with("Vr/Ww/ParticleName", strings(&["neutron"]))
            .with("Vr/Ww/UpperLimitFactor", ParameterValue::Double { value: 5.0, unit: None })
            .with("Vr/Ww/SurvivalFactor", ParameterValue::Double { value: 3.0, unit: None })
            .with("Vr/Ww/MaximumSplitNumber", ParameterValue::Integer(5))
            .with("Vr/Ww/PlaceOfAction", string("OnBoundary"))
    }

    fn geometry() -> InMemoryGeometry {
        InMemoryGeometry::new()
            .with_component(Component::new("Shield").with_parent("Room").parallel())
            .with_component(Component::new("Room"))
            .with_component(Component::new("Layer1").with_parent("Shield").parallel())
            .with_component(Component::new("Layer2").with_parent("Shield").parallel())
    }

    fn weight_window() -> WeightWindow {
        WeightWindow::new(TechniqueBase::new("Ww", TechniqueKind::WeightWindow, 0))
    }

    #[test]
    fn leader_publishes_one_cell_per_volume() {
        let harness = Harness::new(params(), geometry());
        let ctx = harness.ctx();
        let mut ww = weight_window();
        ww.resolve(&ctx).unwrap();
        ww.start_run(&ctx, &mut DirectiveLog::new()).unwrap();

        let table = harness.stores.weight_windows("Shield").unwrap().unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.bounds(&GeometryCell::new("Room", 0)), Some(&[(10.0, 0.5)][..]));
        assert_eq!(table.bounds(&GeometryCell::new("Shield", 0)), Some(&[(10.0, 0.5)][..]));
        assert_eq!(table.bounds(&GeometryCell::new("Layer2", 0)), Some(&[(20.0, 0.25)][..]));
        assert!(!ww.needs_rebuild());
    }

    #[test]
    fn workers_attach_without_touching_the_table() {
        let mut harness = Harness::new(params(), geometry());
        harness.exec = ExecutionContext::worker(2);
        let ctx = harness.ctx();
        let mut ww = weight_window();
        ww.resolve(&ctx).unwrap();
        let mut log = DirectiveLog::new();
        ww.start_run(&ctx, &mut log).unwrap();
        ww.add_biasing_process(&ctx, &mut log).unwrap();

        assert!(harness.stores.weight_windows("Shield").unwrap().is_none());
        assert_eq!(
            log.directives(),
            &[Directive::AttachSampler {
                world: "Shield".into(),
                particle: "neutron".into()
            }]
        );
    }

    #[test]
    fn leader_prepares_then_attaches() {
        let harness = Harness::new(params(), geometry());
        let ctx = harness.ctx();
        let mut ww = weight_window();
        ww.resolve(&ctx).unwrap();
        let mut log = DirectiveLog::new();
        ww.add_biasing_process(&ctx, &mut log).unwrap();
        assert_eq!(log.len(), 2);
        assert!(matches!(
            &log.directives()[0],
            Directive::PrepareSampler {
                parallel: true,
                algorithm: SamplerAlgorithm::WeightWindow {
                    max_split: 5,
                    place: PlaceOfAction::OnBoundary,
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn mass_world_component_binds_to_world() {
        let geometry = geometry().with_component(Component::new("Shield").with_parent("Room"));
        let harness = Harness::new(params(), geometry);
        let mut ww = weight_window();
        ww.resolve(&harness.ctx()).unwrap();
        assert_eq!(ww.settings().map(|s| s.binding.world.as_str()), Some("World"));
    }

    #[test]
    fn clear_marks_the_table_for_rebuild() {
        let harness = Harness::new(params(), geometry());
        let ctx = harness.ctx();
        let mut ww = weight_window();
        ww.resolve(&ctx).unwrap();
        ww.start_run(&ctx, &mut DirectiveLog::new()).unwrap();
        ww.reset();
        assert!(ww.needs_rebuild());
    }

    #[test]
    fn length_mismatch_and_unknown_place_are_fatal() {
        let harness = Harness::new(params().with("Vr/Ww/WeightMap", unitless(&[0.5])), geometry());
        let err = weight_window().resolve(&harness.ctx()).unwrap_err();
        assert_eq!(err.parameter(), Some("Vr/Ww/WeightMap"));

        let harness = Harness::new(params().with("Vr/Ww/PlaceOfAction", string("OnStep")), geometry());
        let err = weight_window().resolve(&harness.ctx()).unwrap_err();
        assert_eq!(err.parameter(), Some("Vr/Ww/PlaceOfAction"));
    }
}
