//! End-to-end scenarios through the public registry API.

use std::sync::Arc;

use nalgebra::Vector3;

use vr_biasing::domain::{Classification, Species, TechniqueKind, Track};
use vr_biasing::engine::{Directive, DirectiveLog};
use vr_biasing::geometry::{Component, InMemoryGeometry};
use vr_biasing::params::{ParameterStore, ParameterValue};
use vr_biasing::particles::ParticleTable;
use vr_biasing::registry::{BiasingRegistry, Collaborators};
use vr_biasing::store::{CellStores, ExecutionContext};

fn string(value: &str) -> ParameterValue {
    ParameterValue::String(value.to_string())
}

fn strings(values: &[&str]) -> ParameterValue {
    ParameterValue::StringVector(values.iter().map(|v| v.to_string()).collect())
}

fn with_unit(values: &[f64], unit: &str) -> ParameterValue {
    ParameterValue::DoubleVector {
        values: values.to_vec(),
        unit: Some(unit.to_string()),
    }
}

fn registry(parameters: ParameterStore, geometry: InMemoryGeometry) -> BiasingRegistry {
    let collaborators = Collaborators::new(
        Arc::new(parameters),
        Arc::new(geometry),
        Arc::new(ParticleTable::standard()),
        Arc::new(CellStores::new()),
    );
    let mut registry = BiasingRegistry::configure(collaborators, ExecutionContext::leader()).unwrap();
    registry.initialize(&mut DirectiveLog::new()).unwrap();
    registry
}

fn electron() -> Species {
    Species::new("e-", 0, 0, -1)
}

#[test]
fn directional_roulette_keeps_tracks_aimed_at_the_disc() {
    let parameters = ParameterStore::new()
        .with("Vr/Roulette/Type", string("DirectionalRussianRoulette"))
        .with("Vr/Roulette/ReferenceComponent", string("Phantom"))
        .with("Vr/Roulette/ForRegion/Target/ProcessesNamed", strings(&["eBrem"]))
        .with("Vr/Roulette/ForRegion/Target/DirectionalSplitLimits", with_unit(&[100.0], "mm"))
        .with("Vr/Roulette/ForRegion/Target/DirectionalSplitRadius", with_unit(&[10.0], "mm"));
    let geometry = InMemoryGeometry::new()
        .with_component(Component::new("Linac").with_region("Target"))
        .with_component(Component::new("Phantom"));
    let registry = registry(parameters, geometry);

    let photon = Species::new("gamma", 0, 0, 0);
    let on_axis = Track::new(photon.clone(), Vector3::new(0.0, 0.0, 50.0), Vector3::z())
        .with_region("Target")
        .with_creator("eBrem");
    let off_axis = Track::new(photon, Vector3::new(20.0, 0.0, 50.0), Vector3::z())
        .with_region("Target")
        .with_creator("eBrem");

    assert_eq!(registry.classify_new_track(&on_axis), Classification::Continue);
    assert_eq!(registry.classify_new_track(&off_axis), Classification::Kill);
    assert_eq!(
        registry.apply_directional_russian_roulette(&off_axis),
        Some(Classification::Kill)
    );

    // Other processes and other regions are never rouletted.
    let unlisted = off_axis.clone().with_creator("compt");
    assert_eq!(registry.classify_new_track(&unlisted), Classification::Continue);
    let elsewhere = off_axis.with_region("DefaultRegionForTheWorld");
    assert_eq!(registry.classify_new_track(&elsewhere), Classification::Continue);
}

#[test]
fn kill_other_particles_keeps_only_listed_species() {
    let parameters = ParameterStore::new()
        .with("Vr/Kill/Type", string("KillOtherParticles"))
        .with("Vr/Kill/OnlyTrackParticlesNamed", strings(&["e-", "gamma"]));
    let registry = registry(parameters, InMemoryGeometry::new());

    let proton = Track::new(Species::new("proton", 1, 1, 1), Vector3::zeros(), Vector3::z());
    let electron = Track::new(electron(), Vector3::zeros(), Vector3::z());

    assert_eq!(registry.classify_new_track(&proton), Classification::Kill);
    assert_eq!(registry.classify_new_track(&electron), Classification::Continue);
    assert_eq!(registry.biasing_process_exists("KillOtherParticles"), Some(0));
}

#[test]
fn uniform_splitting_issues_one_directive_per_pair() {
    let parameters = ParameterStore::new()
        .with("Vr/Split/Type", string("UniformSplitting"))
        .with("Vr/Split/ForRegion/Target/ProcessesNamed", strings(&["compt"]))
        .with(
            "Vr/Split/ForRegion/Target/SplitNumber",
            ParameterValue::IntegerVector(vec![4]),
        )
        .with("Vr/Split/ForRegion/Target/MaximumEnergies", with_unit(&[1.0], "MeV"));
    let geometry = InMemoryGeometry::new().with_component(Component::new("Linac").with_region("Target"));
    let collaborators = Collaborators::new(
        Arc::new(parameters),
        Arc::new(geometry),
        Arc::new(ParticleTable::standard()),
        Arc::new(CellStores::new()),
    );
    let mut registry = BiasingRegistry::configure(collaborators, ExecutionContext::leader()).unwrap();
    let mut log = DirectiveLog::new();
    registry.initialize(&mut log).unwrap();

    let splitting: Vec<&Directive> = log
        .directives()
        .iter()
        .filter(|d| matches!(d, Directive::SecondaryBiasing { .. }))
        .collect();
    assert_eq!(
        splitting,
        vec![&Directive::SecondaryBiasing {
            process: "compt".to_string(),
            region: "Target".to_string(),
            split_number: 4.0,
            energy_limit: 1.0,
        }]
    );
    assert!(log.directives().contains(&Directive::DirectionalSplitting { enabled: false }));
    assert_eq!(registry.summary(), vec![("Split".to_string(), TechniqueKind::UniformSplitting)]);

    // Tracks are never classified by a splitting-only configuration.
    let track = Track::new(electron(), Vector3::zeros(), Vector3::z());
    assert_eq!(registry.classify_new_track(&track), Classification::Continue);
}

#[test]
fn region_names_differing_in_case_keep_the_first_file_entry() {
    let parameters = vr_biasing::io::parameters_from_json(
        &serde_json::from_str(
            r#"{
                "Vr/Split/Type": "UniformSplitting",
                "Vr/Split/ForRegion/Target/ProcessesNamed": ["compt"],
                "Vr/Split/ForRegion/Target/SplitNumber": [4],
                "Vr/Split/ForRegion/Target/MaximumEnergies": { "value": [1.0], "unit": "MeV" },
                "Vr/Split/ForRegion/target/SplitNumber": [8]
            }"#,
        )
        .unwrap(),
    )
    .unwrap();
    let geometry = InMemoryGeometry::new().with_component(Component::new("Linac").with_region("Target"));
    let collaborators = Collaborators::new(
        Arc::new(parameters),
        Arc::new(geometry),
        Arc::new(ParticleTable::standard()),
        Arc::new(CellStores::new()),
    );
    let mut registry = BiasingRegistry::configure(collaborators, ExecutionContext::leader()).unwrap();
    let mut log = DirectiveLog::new();
    registry.initialize(&mut log).unwrap();

    let splitting: Vec<&Directive> = log
        .directives()
        .iter()
        .filter(|d| matches!(d, Directive::SecondaryBiasing { .. }))
        .collect();
    assert_eq!(
        splitting,
        vec![&Directive::SecondaryBiasing {
            process: "compt".to_string(),
            region: "Target".to_string(),
            split_number: 4.0,
            energy_limit: 1.0,
        }]
    );
}

#[test]
fn unknown_type_is_a_fatal_configuration_error() {
    let parameters = ParameterStore::new().with("Vr/Mystery/Type", string("QuantumTunnelling"));
    let collaborators = Collaborators::new(
        Arc::new(parameters),
        Arc::new(InMemoryGeometry::new()),
        Arc::new(ParticleTable::standard()),
        Arc::new(CellStores::new()),
    );
    let err = BiasingRegistry::configure(collaborators, ExecutionContext::leader()).unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert_eq!(err.parameter(), Some("Vr/Mystery/Type"));
}
