//! Biasing registry.
//!
//! One registry exists per execution context. It discovers `Vr/<name>/Type`
//! entries, constructs the matching techniques in registration order, drives
//! their lifecycle and forwards new tracks to the classifying variants.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::{Classification, TechniqueKind, Track};
use crate::engine::BiasingEngine;
use crate::error::AppError;
use crate::geometry::GeometryService;
use crate::params::ParameterStore;
use crate::particles::ParticleTable;
use crate::store::{CellStores, ExecutionContext};
use crate::technique::{self, BiasingContext, BiasingTechnique};

const NAMESPACE: &str = "Vr";
const TYPE_PROPERTY: &str = "Type";

/// Shared, read-only collaborators plus the injected cell stores.
#[derive(Clone)]
pub struct Collaborators {
    pub parameters: Arc<ParameterStore>,
    pub geometry: Arc<dyn GeometryService>,
    pub particles: Arc<ParticleTable>,
    pub stores: Arc<CellStores>,
}

impl Collaborators {
    pub fn new(
        parameters: Arc<ParameterStore>,
        geometry: Arc<dyn GeometryService>,
        particles: Arc<ParticleTable>,
        stores: Arc<CellStores>,
    ) -> Self {
        Self {
            parameters,
            geometry,
            particles,
            stores,
        }
    }

    fn context(&self, exec: ExecutionContext) -> BiasingContext<'_> {
        BiasingContext {
            parameters: &self.parameters,
            geometry: self.geometry.as_ref(),
            particles: &self.particles,
            stores: &self.stores,
            exec,
        }
    }
}

pub struct BiasingRegistry {
    collaborators: Collaborators,
    exec: ExecutionContext,
    techniques: Vec<Box<dyn BiasingTechnique>>,
    kill_other_particles: Option<usize>,
    directional_roulette: Option<usize>,
    range_rejection: Option<usize>,
}

impl std::fmt::Debug for BiasingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiasingRegistry")
            .field("exec", &self.exec)
            .field("techniques", &self.summary())
            .finish()
    }
}

impl BiasingRegistry {
    /// Discover and construct every configured technique.
    pub fn configure(collaborators: Collaborators, exec: ExecutionContext) -> Result<Self, AppError> {
        let names = collaborators
            .parameters
            .names_bracketed_by(&format!("{NAMESPACE}/"), &format!("/{TYPE_PROPERTY}"));
        let mut registry = Self {
            collaborators,
            exec,
            techniques: Vec::new(),
            kill_other_particles: None,
            directional_roulette: None,
            range_rejection: None,
        };
        registry.configure_from_names(names)?;
        log::debug!(
            "context {}: configured {} biasing technique(s)",
            exec.index,
            registry.techniques.len()
        );
        Ok(registry)
    }

    /// Construct techniques for `Vr/<name>/Type` parameter names, in order.
    ///
    /// Names that are not exactly two levels below the namespace are ignored.
    /// A name seen before (case-insensitively) is skipped without constructing
    /// anything.
    fn configure_from_names(&mut self, names: Vec<String>) -> Result<(), AppError> {
        let mut seen: HashSet<String> = self.techniques.iter().map(|t| t.name().to_lowercase()).collect();
        for parameter in names {
            let Some(name) = technique_name(&parameter) else {
                continue;
            };
            if !seen.insert(name.to_lowercase()) {
                log::warn!("Ignoring duplicate biasing technique name {name}");
                continue;
            }

            let raw_type = self.collaborators.parameters.string(&parameter)?;
            let kind = TechniqueKind::parse(&raw_type).ok_or_else(|| {
                AppError::quit(parameter.clone(), format!("Biasing technique type \"{raw_type}\" not found."))
            })?;

            let ctx = self.collaborators.context(self.exec);
            let technique = technique::construct(kind, name, &ctx)?;
            let index = self.techniques.len();
            let slot = match kind {
                TechniqueKind::KillOtherParticles => Some(&mut self.kill_other_particles),
                TechniqueKind::DirectionalRussianRoulette => Some(&mut self.directional_roulette),
                TechniqueKind::RangeRejection => Some(&mut self.range_rejection),
                _ => None,
            };
            if let Some(slot) = slot {
                if let Some(first) = *slot {
                    log::warn!("{kind} is already configured as technique {first}; {name} will not classify tracks");
                } else {
                    *slot = Some(index);
                }
            }
            if technique.base().verbosity > 0 {
                log::info!("Registered biasing technique {name} ({kind})");
            }
            self.techniques.push(technique);
        }
        Ok(())
    }

    pub fn exec(&self) -> ExecutionContext {
        self.exec
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    pub fn parameters(&self) -> &Arc<ParameterStore> {
        &self.collaborators.parameters
    }

    /// (name, kind) in registration order.
    pub fn summary(&self) -> Vec<(String, TechniqueKind)> {
        self.techniques
            .iter()
            .map(|t| (t.name().to_string(), t.kind()))
            .collect()
    }

    /// Initialize every technique in registration order.
    pub fn initialize(&mut self, engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        let ctx = self.collaborators.context(self.exec);
        for technique in &mut self.techniques {
            technique.start_run(&ctx, engine)?;
        }
        Ok(())
    }

    pub fn add_biasing_process(&mut self, engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        let ctx = self.collaborators.context(self.exec);
        for technique in &mut self.techniques {
            technique.add_biasing_process(&ctx, engine)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        for technique in &mut self.techniques {
            technique.reset();
        }
    }

    /// Swap in a new parameter snapshot. Techniques pick it up on the next
    /// resolve.
    pub fn replace_parameters(&mut self, parameters: Arc<ParameterStore>) {
        self.collaborators.parameters = parameters;
    }

    /// Route a changed `Vr/<name>/...` parameter to its technique. Returns
    /// whether a technique owns it.
    pub fn update_for_parameter_change(&mut self, parameter: &str) -> bool {
        let mut segments = parameter.split('/');
        let owner = match (segments.next(), segments.next()) {
            (Some(namespace), Some(name)) if namespace.eq_ignore_ascii_case(NAMESPACE) => name,
            _ => return false,
        };
        match self
            .techniques
            .iter_mut()
            .find(|t| t.name().eq_ignore_ascii_case(owner))
        {
            Some(technique) => {
                technique.update_for_specific_parameter_change(parameter);
                true
            }
            None => false,
        }
    }

    /// Re-resolve changed techniques, then clear and initialize all of them.
    pub fn update_for_new_run(&mut self, rebuilt: bool, engine: &mut dyn BiasingEngine) -> Result<(), AppError> {
        let ctx = self.collaborators.context(self.exec);
        for technique in &mut self.techniques {
            technique.update_for_new_run(&ctx, rebuilt)?;
        }
        for technique in &mut self.techniques {
            technique.reset();
        }
        for technique in &mut self.techniques {
            technique.start_run(&ctx, engine)?;
        }
        Ok(())
    }

    fn dispatch(&self, index: Option<usize>, track: &Track) -> Option<Classification> {
        index
            .and_then(|i| self.techniques.get(i))
            .map(|technique| technique.classify(track))
    }

    /// `None` when no kill-other-particles technique is configured.
    pub fn apply_kill_other_particles(&self, track: &Track) -> Option<Classification> {
        self.dispatch(self.kill_other_particles, track)
    }

    pub fn apply_directional_russian_roulette(&self, track: &Track) -> Option<Classification> {
        self.dispatch(self.directional_roulette, track)
    }

    pub fn apply_range_rejection(&self, track: &Track) -> Option<Classification> {
        self.dispatch(self.range_rejection, track)
    }

    /// Stacking-time verdict: the first configured of kill-other-particles,
    /// range rejection and directional roulette decides alone.
    pub fn classify_new_track(&self, track: &Track) -> Classification {
        self.apply_kill_other_particles(track)
            .or_else(|| self.apply_range_rejection(track))
            .or_else(|| self.apply_directional_russian_roulette(track))
            .unwrap_or(Classification::Continue)
    }

    /// Index of the first technique of the given type (any accepted spelling).
    pub fn biasing_process_exists(&self, type_name: &str) -> Option<usize> {
        let kind = TechniqueKind::parse(type_name)?;
        self.techniques.iter().position(|t| t.kind() == kind)
    }

    pub fn technique(&self, index: usize) -> Option<&dyn BiasingTechnique> {
        self.techniques.get(index).map(|t| t.as_ref())
    }
}

/// `<name>` of `Vr/<name>/Type`, if the parameter has exactly that shape.
fn technique_name(parameter: &str) -> Option<&str> {
    let mut segments = parameter.split('/');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(namespace), Some(name), Some(property), None)
            if namespace.eq_ignore_ascii_case(NAMESPACE)
                && property.eq_ignore_ascii_case(TYPE_PROPERTY)
                && !name.is_empty() =>
        {
            Some(name)
        }
        _ => None,
    }
}
