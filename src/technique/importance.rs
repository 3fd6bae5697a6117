//! Importance sampling and geometrical particle splitting.
//!
//! Both build a per-cell table over a controlling component and its
//! sub-components (leader only) and install a geometry sampler per particle.

use crate::domain::{SplitAxis, TechniqueKind};
use crate::engine::{BiasingEngine, SamplerAlgorithm};
use crate::error::AppError;
use crate::store::{ImportanceTable, SplitCell, SplitTable};

use super::sampler::SamplerBinding;
use super::{BiasingContext, BiasingTechnique, TechniqueBase, require_same_length};

fn unresolved(base: &TechniqueBase) -> AppError {
    AppError::internal(format!("{} used before its parameters were resolved.", base.name))
}

#[derive(Debug)]
pub struct ImportanceSampling {
    base: TechniqueBase,
    binding: Option<SamplerBinding>,
    importances: Vec<f64>,
}

impl ImportanceSampling {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::ImportanceSampling);
        Self {
            base,
            binding: None,
            importances: Vec::new(),
        }
    }

    /// Parent and component importance 1; sub-components their values.
    pub fn cell_table(&self) -> Option<ImportanceTable> {
        let binding = self.binding.as_ref()?;
        let mut table = ImportanceTable::default();
        table.insert(binding.parent_cell(), 1.0);
        table.insert(binding.component_cell(), 1.0);
        for (cell, importance) in binding.sub_cells().zip(&self.importances) {
            table.insert(cell, *importance);
        }
        Some(table)
    }
}

impl BiasingTechnique for ImportanceSampling {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let binding = SamplerBinding::resolve(&self.base, ctx)?;
        let values_parm = self.base.full_parm_name("ImportanceValues");
        let importances = ctx.parameters.unitless_vector(&values_parm)?;
        require_same_length(
            &values_parm,
            importances.len(),
            &self.base.full_parm_name("SubComponents"),
            binding.sub_components.len(),
        )?;
        if let Some(bad) = importances.iter().find(|v| **v <= 0.0) {
            return Err(AppError::quit(values_parm, format!("Importance values must be positive, found {bad}.")));
        }
        self.binding = Some(binding);
        self.importances = importances;
        Ok(())
    }

    fn initialize(&mut self, ctx: &BiasingContext<'_>, _engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        if !ctx.exec.leader {
            return Ok(());
        }
        let table = self.cell_table().ok_or_else(|| unresolved(&self.base))?;
        if self.base.verbosity > 1 {
            log::info!("{}: {} importance cell(s)", self.base.name, table.len());
        }
        let world = self.binding.as_ref().map(|b| b.world.as_str()).unwrap_or_default();
        ctx.stores.publish_importances(ctx.exec, &self.base.name, world, table)
    }

    fn add_biasing_process(
        &mut self,
        ctx: &BiasingContext<'_>,
        engine: &mut dyn BiasingEngine,
    ) -> Result<(), AppError> {
        let binding = self.binding.as_ref().ok_or_else(|| unresolved(&self.base))?;
        binding.install(ctx, &SamplerAlgorithm::Importance, engine);
        Ok(())
    }

    fn depends_on_geometry(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitSettings {
    pub axis: SplitAxis,
    pub split_numbers: Vec<i64>,
    pub symmetric: Vec<bool>,
    pub russian_roulette: Vec<bool>,
}

#[derive(Debug)]
pub struct GeometricalParticleSplit {
    base: TechniqueBase,
    binding: Option<SamplerBinding>,
    settings: Option<SplitSettings>,
}

impl GeometricalParticleSplit {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::GeometricalParticleSplit);
        Self {
            base,
            binding: None,
            settings: None,
        }
    }

    /// Parent and component: split 1, not symmetric, no roulette. Sub-component
    /// j: the running product of split numbers 0..=j.
    pub fn cell_table(&self) -> Option<SplitTable> {
        let binding = self.binding.as_ref()?;
        let settings = self.settings.as_ref()?;
        let neutral = SplitCell {
            split_number: 1,
            symmetric: false,
            russian_roulette: false,
        };
        let mut table = SplitTable::default();
        table.insert(binding.parent_cell(), neutral);
        table.insert(binding.component_cell(), neutral);

        let mut cumulative = 1_i64;
        for (j, cell) in binding.sub_cells().enumerate() {
            cumulative = cumulative.saturating_mul(settings.split_numbers[j]);
            table.insert(
                cell,
                SplitCell {
                    split_number: cumulative,
                    symmetric: settings.symmetric[j],
                    russian_roulette: settings.russian_roulette[j],
                },
            );
        }
        Some(table)
    }
}

impl BiasingTechnique for GeometricalParticleSplit {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let parameters = ctx.parameters;
        let binding = SamplerBinding::resolve(&self.base, ctx)?;
        if !binding.parallel {
            return Err(self.base.quit(
                "Component",
                "Geometry component for variance reduction is not a parallel component.",
            ));
        }

        let axis_parm = self.base.full_parm_name("SplitAxis");
        let axis_raw = parameters.string(&axis_parm)?;
        let axis = SplitAxis::parse(&axis_raw)
            .ok_or_else(|| AppError::quit(axis_parm, format!("Refers to an unknown split axis \"{axis_raw}\".")))?;

        let subs_parm = self.base.full_parm_name("SubComponents");
        let subs = binding.sub_components.len();
        let split_parm = self.base.full_parm_name("SplitNumber");
        let symmetric_parm = self.base.full_parm_name("Symmetric");
        let roulette_parm = self.base.full_parm_name("RussianRoulette");
        let split_numbers = parameters.integer_vector(&split_parm)?;
        let symmetric = parameters.boolean_vector(&symmetric_parm)?;
        let russian_roulette = parameters.boolean_vector(&roulette_parm)?;
        require_same_length(&split_parm, split_numbers.len(), &subs_parm, subs)?;
        require_same_length(&symmetric_parm, symmetric.len(), &subs_parm, subs)?;
        require_same_length(&roulette_parm, russian_roulette.len(), &subs_parm, subs)?;
        if let Some(bad) = split_numbers.iter().find(|n| **n < 1) {
            return Err(AppError::quit(split_parm, format!("Split numbers must be at least 1, found {bad}.")));
        }

        self.binding = Some(binding);
        self.settings = Some(SplitSettings {
            axis,
            split_numbers,
            symmetric,
            russian_roulette,
        });
        Ok(())
    }

    fn initialize(&mut self, ctx: &BiasingContext<'_>, _engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        if !ctx.exec.leader {
            return Ok(());
        }
        let table = self.cell_table().ok_or_else(|| unresolved(&self.base))?;
        if self.base.verbosity > 0 {
            log::info!("{}: {} split cell(s)", self.base.name, table.len());
        }
        let world = self.binding.as_ref().map(|b| b.world.as_str()).unwrap_or_default();
        ctx.stores.publish_splits(ctx.exec, &self.base.name, world, table)
    }

    fn add_biasing_process(
        &mut self,
        ctx: &BiasingContext<'_>,
        engine: &mut dyn BiasingEngine,
    ) -> Result<(), AppError> {
        let (binding, settings) = self
            .binding
            .as_ref()
            .zip(self.settings.as_ref())
            .ok_or_else(|| unresolved(&self.base))?;
        binding.install(ctx, &SamplerAlgorithm::GeometricalSplit { axis: settings.axis }, engine);
        Ok(())
    }

    fn depends_on_geometry(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DirectiveLog;
    use crate::geometry::{Component, InMemoryGeometry};
    use crate::params::{ParameterStore, ParameterValue};
    use crate::store::GeometryCell;
    use crate::technique::fixtures::*;

    fn geometry(parallel: bool) -> InMemoryGeometry {
        let shell = Component::new("Shell");
        let shell = if parallel { shell.parallel() } else { shell };
        InMemoryGeometry::new()
            .with_component(shell)
            .with_component(Component::new("Inner").with_parent("Shell").parallel())
            .with_component(Component::new("Core").with_parent("Shell").parallel())
    }

    fn base_params() -> ParameterStore {
        ParameterStore::new()
            .with("Vr/Vr1/Component", string("Shell"))
            .with("Vr/Vr1/SubComponents", strings(&["Inner", "Core"]))
            .with("Vr/Vr1/ParticleName", strings(&["gamma", "e-"]))
    }

    #[test]
    fn importance_table_gives_unit_importance_to_parent_and_component() {
        let params = base_params().with("Vr/Vr1/ImportanceValues", unitless(&[2.0, 4.0]));
        let harness = Harness::new(params, geometry(true));
        let ctx = harness.ctx();
        let mut importance = ImportanceSampling::new(TechniqueBase::new("Vr1", TechniqueKind::ImportanceSampling, 0));
        importance.resolve(&ctx).unwrap();
        importance.start_run(&ctx, &mut DirectiveLog::new()).unwrap();

        let table = harness.stores.importances("Shell").unwrap().unwrap();
        assert_eq!(table.importance(&GeometryCell::new("World", 0)), Some(1.0));
        assert_eq!(table.importance(&GeometryCell::new("Shell", 0)), Some(1.0));
        assert_eq!(table.importance(&GeometryCell::new("Core", 0)), Some(4.0));
    }

    #[test]
    fn importance_values_must_match_sub_components() {
        let params = base_params().with("Vr/Vr1/ImportanceValues", unitless(&[2.0]));
        let harness = Harness::new(params, geometry(false));
        let mut importance = ImportanceSampling::new(TechniqueBase::new("Vr1", TechniqueKind::ImportanceSampling, 0));
        let err = importance.resolve(&harness.ctx()).unwrap_err();
        assert_eq!(err.parameter(), Some("Vr/Vr1/ImportanceValues"));
    }

    fn split_params() -> ParameterStore {
        base_params()
            .with("Vr/Vr1/SplitAxis", string("ZAxis"))
            .with("Vr/Vr1/SplitNumber", ParameterValue::IntegerVector(vec![2, 3]))
            .with("Vr/Vr1/Symmetric", ParameterValue::BooleanVector(vec![false, true]))
            .with("Vr/Vr1/RussianRoulette", ParameterValue::BooleanVector(vec![true, true]))
    }

    fn particle_split() -> GeometricalParticleSplit {
        GeometricalParticleSplit::new(TechniqueBase::new("Vr1", TechniqueKind::GeometricalParticleSplit, 0))
    }

    #[test]
    fn split_numbers_accumulate_along_sub_components() {
        let harness = Harness::new(split_params(), geometry(true));
        let mut split = particle_split();
        split.resolve(&harness.ctx()).unwrap();
        let table = split.cell_table().unwrap();
        assert_eq!(table.get(&GeometryCell::new("Shell", 0)).map(|c| c.split_number), Some(1));
        assert_eq!(table.get(&GeometryCell::new("Inner", 0)).map(|c| c.split_number), Some(2));
        let core = table.get(&GeometryCell::new("Core", 0)).unwrap();
        assert_eq!(core.split_number, 6);
        assert!(core.symmetric);
    }

    #[test]
    fn split_requires_a_parallel_component_and_known_axis() {
        let harness = Harness::new(split_params(), geometry(false));
        let err = particle_split().resolve(&harness.ctx()).unwrap_err();
        assert_eq!(err.parameter(), Some("Vr/Vr1/Component"));

        let harness = Harness::new(split_params().with("Vr/Vr1/SplitAxis", string("RAxis")), geometry(true));
        let err = particle_split().resolve(&harness.ctx()).unwrap_err();
        assert_eq!(err.parameter(), Some("Vr/Vr1/SplitAxis"));
    }

    #[test]
    fn split_installs_one_sampler_per_particle() {
        let harness = Harness::new(split_params(), geometry(true));
        let ctx = harness.ctx();
        let mut split = particle_split();
        split.resolve(&ctx).unwrap();
        let mut log = DirectiveLog::new();
        split.add_biasing_process(&ctx, &mut log).unwrap();
        // prepare + attach for each of two particles
        assert_eq!(log.len(), 4);
    }
}
