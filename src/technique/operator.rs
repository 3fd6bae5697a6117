//! Techniques that attach a native biasing operator to logical volumes:
//! inelastic splitting and automatic importance sampling (mass or parallel
//! world).

use std::path::PathBuf;

use crate::domain::TechniqueKind;
use crate::engine::{BiasingEngine, Directive, OperatorSpec};
use crate::error::AppError;
use crate::particles::{SpeciesSelector, TREAT_EXCITED_IONS_AS_GROUND_STATE};

use super::{BiasingContext, BiasingTechnique, TechniqueBase, require_component};

fn volumes(base: &TechniqueBase, ctx: &BiasingContext<'_>) -> Result<Vec<String>, AppError> {
    let parm = base.full_parm_name("ApplyBiasingInVolumesNamed");
    ctx.parameters
        .string_vector(&parm)?
        .iter()
        .map(|name| require_component(ctx, name, &parm).map(|c| c.name.clone()))
        .collect()
}

fn unresolved(base: &TechniqueBase) -> AppError {
    AppError::internal(format!("{} used before its parameters were resolved.", base.name))
}

#[derive(Debug)]
pub struct InelasticSplitting {
    base: TechniqueBase,
    volumes: Vec<String>,
    operator: Option<OperatorSpec>,
}

impl InelasticSplitting {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert_eq!(base.kind, TechniqueKind::InelasticSplitting);
        Self {
            base,
            volumes: Vec::new(),
            operator: None,
        }
    }
}

impl BiasingTechnique for InelasticSplitting {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let parameters = ctx.parameters;
        let split_parm = self.base.full_parm_name("SplitNumber");
        let split_number = parameters.integer(&split_parm)?;
        if split_number < 1 {
            return Err(AppError::quit(split_parm, format!("Must be at least 1, found {split_number}.")));
        }

        let roulette_parm = self.base.full_parm_name("ApplyRussianRouletteToParticlesDifferentThan");
        let roulette_exempt_particles = if parameters.exists(&roulette_parm) {
            let treat_excited = parameters.boolean_or(TREAT_EXCITED_IONS_AS_GROUND_STATE, false)?;
            parameters
                .string_vector(&roulette_parm)?
                .into_iter()
                .map(|raw| {
                    ctx.particles
                        .resolve(&raw, &roulette_parm, treat_excited)
                        .map(|selector| match selector {
                            SpeciesSelector::Exact(name) => name,
                            SpeciesSelector::Ion { .. } => raw,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        self.volumes = volumes(&self.base, ctx)?;
        self.operator = Some(OperatorSpec::InelasticSplit {
            split_number,
            only_primary: parameters.boolean(&self.base.full_parm_name("OnlyBiasPrimaryParticle"))?,
            only_once: parameters.boolean(&self.base.full_parm_name("BiasParticleOnlyOnce"))?,
            roulette_exempt_particles,
        });
        Ok(())
    }

    fn add_biasing_process(
        &mut self,
        _ctx: &BiasingContext<'_>,
        engine: &mut dyn BiasingEngine,
    ) -> Result<(), AppError> {
        let operator = self.operator.clone().ok_or_else(|| unresolved(&self.base))?;
        log::info!("{}: inelastic split operator on {:?}", self.base.name, self.volumes);
        engine.submit(Directive::AttachOperator {
            technique: self.base.kind,
            volumes: self.volumes.clone(),
            operator,
        });
        Ok(())
    }
}

/// Binned importance map read from a file of little-endian f64 values in
/// x-major order (`index = ix*ny*nz + iy*nz + iz`).
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceMesh {
    pub divisions: [usize; 3],
    pub values: Vec<f64>,
}

impl ImportanceMesh {
    pub fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        let [_, ny, nz] = self.divisions;
        ix * ny * nz + iy * nz + iz
    }

    pub fn importance(&self, ix: usize, iy: usize, iz: usize) -> Option<f64> {
        self.values.get(self.index(ix, iy, iz)).copied()
    }

    /// Decode `bytes`; trailing values beyond `nx·ny·nz` are ignored.
    pub fn decode(divisions: [usize; 3], bytes: &[u8]) -> Option<Self> {
        let count = divisions.iter().product::<usize>();
        if bytes.len() < count * 8 {
            return None;
        }
        let values = bytes
            .chunks_exact(8)
            .take(count)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();
        Some(Self { divisions, values })
    }
}

#[derive(Debug)]
pub struct AutomaticImportanceSampling {
    base: TechniqueBase,
    volume: Option<String>,
    parallel_world: Option<String>,
    mesh: Option<ImportanceMesh>,
}

impl AutomaticImportanceSampling {
    pub fn new(base: TechniqueBase) -> Self {
        debug_assert!(matches!(
            base.kind,
            TechniqueKind::AutomaticImportanceSampling | TechniqueKind::AutomaticImportanceSamplingParallel
        ));
        Self {
            base,
            volume: None,
            parallel_world: None,
            mesh: None,
        }
    }

    pub fn mesh(&self) -> Option<&ImportanceMesh> {
        self.mesh.as_ref()
    }

    fn parallel(&self) -> bool {
        self.base.kind == TechniqueKind::AutomaticImportanceSamplingParallel
    }

    /// Bins from the component, else from `Ge/<volume>/{X,Y,Z}Bins`.
    fn divisions(ctx: &BiasingContext<'_>, volume: &str, bins: Option<[usize; 3]>) -> Result<[usize; 3], AppError> {
        if let Some(bins) = bins {
            return Ok(bins);
        }
        let mut divisions = [0usize; 3];
        for (slot, axis) in divisions.iter_mut().zip(["XBins", "YBins", "ZBins"]) {
            let parm = format!("Ge/{volume}/{axis}");
            let count = ctx.parameters.integer(&parm)?;
            *slot = usize::try_from(count)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| AppError::quit(parm, format!("Bin count must be positive, found {count}.")))?;
        }
        Ok(divisions)
    }
}

impl BiasingTechnique for AutomaticImportanceSampling {
    fn base(&self) -> &TechniqueBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TechniqueBase {
        &mut self.base
    }

    fn resolve_parameters(&mut self, ctx: &BiasingContext<'_>) -> Result<(), AppError> {
        let volumes_parm = self.base.full_parm_name("ApplyBiasingInVolumesNamed");
        let names = ctx.parameters.string_vector(&volumes_parm)?;
        let [name] = names.as_slice() else {
            return Err(AppError::quit(
                volumes_parm,
                "For automatic importance sampling exactly one (binned) volume is allowed.",
            ));
        };
        let component = require_component(ctx, name, &volumes_parm)?;
        if self.parallel() && !component.parallel {
            return Err(AppError::quit(volumes_parm, format!("Component \"{name}\" is not a parallel component.")));
        }
        let divisions = Self::divisions(ctx, &component.name, component.bins)?;

        let file_parm = self.base.full_parm_name("InputFile");
        let path = PathBuf::from(ctx.parameters.string(&file_parm)?);
        let bytes = std::fs::read(&path)
            .map_err(|e| AppError::quit(file_parm.clone(), format!("Input file {} not found: {e}", path.display())))?;
        let mesh = ImportanceMesh::decode(divisions, &bytes).ok_or_else(|| {
            AppError::quit(
                file_parm,
                format!(
                    "Input file {} holds {} bytes; {}x{}x{} importance values need {}.",
                    path.display(),
                    bytes.len(),
                    divisions[0],
                    divisions[1],
                    divisions[2],
                    divisions.iter().product::<usize>() * 8
                ),
            )
        })?;

        if self.base.verbosity > 0 {
            log::info!(
                "{}: {} importance values over {:?}",
                self.base.name,
                mesh.values.len(),
                mesh.divisions
            );
        }
        self.parallel_world = self.parallel().then(|| component.name.clone());
        self.volume = Some(component.name.clone());
        self.mesh = Some(mesh);
        Ok(())
    }

    fn add_biasing_process(
        &mut self,
        _ctx: &BiasingContext<'_>,
        engine: &mut dyn BiasingEngine,
    ) -> Result<(), AppError> {
        let (volume, mesh) = self
            .volume
            .as_ref()
            .zip(self.mesh.as_ref())
            .ok_or_else(|| unresolved(&self.base))?;
        engine.submit(Directive::AttachOperator {
            technique: self.base.kind,
            volumes: vec![volume.clone()],
            operator: OperatorSpec::ImportanceMesh {
                divisions: mesh.divisions,
                values: mesh.values.clone(),
                parallel_world: self.parallel_world.clone(),
            },
        });
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
    use crate::technique::fixtures::*;

    fn mesh_file(name: &str, values: &[f64]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("vrb-{}-{name}.bin", std::process::id()));
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn geometry() -> InMemoryGeometry {
        InMemoryGeometry::new()
            .with_component(Component::new("Grid").with_bins([2, 1, 2]))
            .with_component(Component::new("ParallelGrid").with_bins([2, 1, 2]).parallel())
    }

    #[test]
    fn mesh_index_is_x_major() {
        let mesh = ImportanceMesh::decode([2, 3, 4], &vec![0u8; 24 * 8]).unwrap();
        assert_eq!(mesh.index(0, 0, 1), 1);
        assert_eq!(mesh.index(0, 1, 0), 4);
        assert_eq!(mesh.index(1, 0, 0), 12);
        assert!(ImportanceMesh::decode([2, 3, 4], &[0u8; 16]).is_none());
    }

    #[test]
    fn automatic_importance_reads_the_mesh() {
        let path = mesh_file("mass", &[1.0, 2.0, 4.0, 8.0]);
        let params = ParameterStore::new()
            .with("Vr/Ais/ApplyBiasingInVolumesNamed", strings(&["Grid"]))
            .with("Vr/Ais/InputFile", string(&path.to_string_lossy()));
        let harness = Harness::new(params, geometry());
        let ctx = harness.ctx();
        let mut ais = AutomaticImportanceSampling::new(TechniqueBase::new(
            "Ais",
            TechniqueKind::AutomaticImportanceSampling,
            0,
        ));
        ais.resolve(&ctx).unwrap();
        assert_eq!(ais.mesh().and_then(|m| m.importance(1, 0, 1)), Some(8.0));

        let mut log = DirectiveLog::new();
        ais.add_biasing_process(&ctx, &mut log).unwrap();
        assert!(matches!(
            &log.directives()[0],
            Directive::AttachOperator {
                operator: OperatorSpec::ImportanceMesh { parallel_world: None, .. },
                ..
            }
        ));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn parallel_variant_needs_a_parallel_component() {
        let path = mesh_file("parallel", &[1.0, 2.0, 4.0, 8.0]);
        let params = ParameterStore::new()
            .with("Vr/Ais/ApplyBiasingInVolumesNamed", strings(&["Grid"]))
            .with("Vr/Ais/InputFile", string(&path.to_string_lossy()));
        let harness = Harness::new(params, geometry());
        let mut ais = AutomaticImportanceSampling::new(TechniqueBase::new(
            "Ais",
            TechniqueKind::AutomaticImportanceSamplingParallel,
            0,
        ));
        assert!(ais.resolve(&harness.ctx()).is_err());

        let params = harness
            .parameters
            .clone()
            .with("Vr/Ais/ApplyBiasingInVolumesNamed", strings(&["ParallelGrid"]));
        let harness = Harness::new(params, geometry());
        ais.resolve(&harness.ctx()).unwrap();
        assert_eq!(ais.parallel_world.as_deref(), Some("ParallelGrid"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn only_one_volume_and_an_existing_file() {
        let params = ParameterStore::new()
            .with("Vr/Ais/ApplyBiasingInVolumesNamed", strings(&["Grid", "ParallelGrid"]))
            .with("Vr/Ais/InputFile", string("missing.bin"));
        let harness = Harness::new(params.clone(), geometry());
        let mut ais = AutomaticImportanceSampling::new(TechniqueBase::new(
            "Ais",
            TechniqueKind::AutomaticImportanceSampling,
            0,
        ));
        let err = ais.resolve(&harness.ctx()).unwrap_err();
        assert_eq!(err.parameter(), Some("Vr/Ais/ApplyBiasingInVolumesNamed"));

        let harness = Harness::new(
            params.with("Vr/Ais/ApplyBiasingInVolumesNamed", strings(&["Grid"])),
            geometry(),
        );
        let err = ais.resolve(&harness.ctx()).unwrap_err();
        assert_eq!(err.parameter(), Some("Vr/Ais/InputFile"));
    }

    #[test]
    fn inelastic_split_attaches_one_operator() {
        let params = ParameterStore::new()
            .with("Vr/Split/SplitNumber", ParameterValue::Integer(10))
            .with("Vr/Split/OnlyBiasPrimaryParticle", ParameterValue::Boolean(true))
            .with("Vr/Split/BiasParticleOnlyOnce", ParameterValue::Boolean(false))
            .with("Vr/Split/ApplyBiasingInVolumesNamed", strings(&["Grid"]))
            .with("Vr/Split/ApplyRussianRouletteToParticlesDifferentThan", strings(&["neutron"]));
        let harness = Harness::new(params, geometry());
        let ctx = harness.ctx();
        let mut split = InelasticSplitting::new(TechniqueBase::new("Split", TechniqueKind::InelasticSplitting, 0));
        split.resolve(&ctx).unwrap();
        let mut log = DirectiveLog::new();
        split.add_biasing_process(&ctx, &mut log).unwrap();
        assert_eq!(
            log.directives(),
            &[Directive::AttachOperator {
                technique: TechniqueKind::InelasticSplitting,
                volumes: vec!["Grid".into()],
                operator: OperatorSpec::InelasticSplit {
                    split_number: 10,
                    only_primary: true,
                    only_once: false,
                    roulette_exempt_particles: vec!["neutron".into()],
                },
            }]
        );
    }
}
