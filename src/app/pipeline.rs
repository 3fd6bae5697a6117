//! Shared classification pipeline used by the `check` and `classify` commands.
//!
//! Workflow per invocation:
//! load collaborators -> leader context (configure, initialize, install) ->
//! worker contexts in parallel -> per run: classify every track -> next run.
//!
//! The leader always finishes its initialization before any worker starts,
//! so the shared cell stores are complete when workers read them.

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;

use crate::domain::{Classification, TechniqueKind, Track};
use crate::engine::{Directive, DirectiveLog};
use crate::error::AppError;
use crate::geometry::{GeometryService, InMemoryGeometry};
use crate::particles::ParticleTable;
use crate::registry::{BiasingRegistry, Collaborators};
use crate::store::{CellStores, ExecutionContext};

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Number of execution contexts; context 0 is the leader.
    pub contexts: usize,
    pub runs: usize,
    /// Treat the geometry as rebuilt between runs.
    pub rebuilt: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            contexts: 1,
            runs: 1,
            rebuilt: false,
        }
    }
}

/// Verdict for one track in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub run: usize,
    pub track: usize,
    pub context: usize,
    pub species: String,
    pub creator_process: Option<String>,
    pub region: Option<String>,
    pub classification: Classification,
}

/// Per-context outcome.
#[derive(Debug, Clone)]
pub struct ContextReport {
    pub context: usize,
    pub directives: Vec<Directive>,
    pub kills: usize,
    pub continues: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub techniques: Vec<(String, TechniqueKind)>,
    pub contexts: Vec<ContextReport>,
    pub verdicts: Vec<Verdict>,
    pub runs: usize,
}

impl RunOutput {
    pub fn kills(&self) -> usize {
        self.contexts.iter().map(|c| c.kills).sum()
    }

    pub fn continues(&self) -> usize {
        self.contexts.iter().map(|c| c.continues).sum()
    }
}

/// Load the parameter file and optional geometry file into collaborators.
pub fn load_collaborators(parameters: &Path, geometry: Option<&Path>) -> Result<Collaborators, AppError> {
    let store = crate::io::read_parameters_json(parameters)?;
    let geometry: InMemoryGeometry = match geometry {
        Some(path) => crate::io::read_geometry_json(path)?,
        None => InMemoryGeometry::new(),
    };
    Ok(collaborators_from(store, geometry))
}

pub fn collaborators_from(
    parameters: crate::params::ParameterStore,
    geometry: impl GeometryService + 'static,
) -> Collaborators {
    Collaborators::new(
        Arc::new(parameters),
        Arc::new(geometry),
        Arc::new(ParticleTable::standard()),
        Arc::new(CellStores::new()),
    )
}

struct ContextState {
    registry: BiasingRegistry,
    log: DirectiveLog,
}

impl ContextState {
    fn prepare(collaborators: &Collaborators, exec: ExecutionContext) -> Result<Self, AppError> {
        let mut registry = BiasingRegistry::configure(collaborators.clone(), exec)?;
        let mut log = DirectiveLog::new();
        registry.initialize(&mut log)?;
        registry.add_biasing_process(&mut log)?;
        Ok(Self { registry, log })
    }

    fn new_run(&mut self, rebuilt: bool) -> Result<(), AppError> {
        self.registry.update_for_new_run(rebuilt, &mut self.log)
    }

    fn classify(&self, run: usize, tracks: &[Track], stride: usize) -> Vec<Verdict> {
        let context = self.registry.exec().index;
        tracks
            .iter()
            .enumerate()
            .skip(context)
            .step_by(stride)
            .map(|(index, track)| Verdict {
                run,
                track: index,
                context,
                species: track.species.name.clone(),
                creator_process: track.creator_process.clone(),
                region: track.region.clone(),
                classification: self.registry.classify_new_track(track),
            })
            .collect()
    }
}

/// Configure, initialize and install on every context without classifying.
///
/// Returns the leader's technique list and every context's directives.
pub fn check(collaborators: &Collaborators, contexts: usize) -> Result<RunOutput, AppError> {
    classify(
        collaborators,
        &[],
        PipelineConfig {
            contexts,
            ..PipelineConfig::default()
        },
    )
}

/// Classify `tracks` across `config.contexts` contexts for `config.runs` runs.
///
/// Tracks are dealt round-robin: track `i` goes to context `i % contexts`.
pub fn classify(
    collaborators: &Collaborators,
    tracks: &[Track],
    config: PipelineConfig,
) -> Result<RunOutput, AppError> {
    let contexts = config.contexts.max(1);
    let runs = config.runs.max(1);

    let leader = ContextState::prepare(collaborators, ExecutionContext::leader())?;
    let workers = (1..contexts)
        .into_par_iter()
        .map(|index| ContextState::prepare(collaborators, ExecutionContext::worker(index)))
        .collect::<Result<Vec<_>, AppError>>()?;
    let mut states = Vec::with_capacity(contexts);
    states.push(leader);
    states.extend(workers);
    log::info!(
        "Configured {} biasing technique(s) on {contexts} context(s)",
        states[0].registry.len()
    );

    let mut verdicts = Vec::with_capacity(tracks.len() * runs);
    for run in 0..runs {
        if run > 0 {
            if let Some((leader, workers)) = states.split_first_mut() {
                leader.new_run(config.rebuilt)?;
                workers
                    .par_iter_mut()
                    .map(|state| state.new_run(config.rebuilt))
                    .collect::<Result<Vec<_>, AppError>>()?;
            }
        }
        let per_context: Vec<Vec<Verdict>> = states
            .par_iter_mut()
            .map(|state| state.classify(run, tracks, contexts))
            .collect();
        let before = verdicts.len();
        verdicts.extend(per_context.into_iter().flatten());
        log::debug!("Run {run}: classified {} track(s)", verdicts.len() - before);
    }
    verdicts.sort_by_key(|v| (v.run, v.track));

    let techniques = states[0].registry.summary();
    let contexts = states
        .into_iter()
        .map(|state| {
            let context = state.registry.exec().index;
            let kills = verdicts
                .iter()
                .filter(|v| v.context == context && v.classification == Classification::Kill)
                .count();
            let total = verdicts.iter().filter(|v| v.context == context).count();
            ContextReport {
                context,
                directives: state.log.into_directives(),
                kills,
                continues: total - kills,
            }
        })
        .collect();

    Ok(RunOutput {
        techniques,
        contexts,
        verdicts,
        runs,
    })
}
