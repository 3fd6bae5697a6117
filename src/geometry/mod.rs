//! Geometry collaborator.
//!
//! The biasing subsystem never builds geometry. It only needs to look up
//! components (placement frame, parent, parallel-world flag, binning) and to
//! check that a region name exists. `GeometryService` is that seam;
//! `InMemoryGeometry` is the implementation the host fills from a JSON file.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{Rotation3, Vector3};

/// Name of the top-level mass world.
pub const WORLD: &str = "World";
/// Region every volume belongs to unless assigned elsewhere.
pub const DEFAULT_REGION: &str = "DefaultRegionForTheWorld";

/// Placed geometry component, as seen from the world frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub parent: Option<String>,
    /// Lives in a parallel world rather than in the mass world.
    pub parallel: bool,
    /// Placement rotation; local axes map to world axes through its inverse.
    pub rotation: Rotation3<f64>,
    /// Placement translation in mm.
    pub translation: Vector3<f64>,
    pub region: Option<String>,
    /// Number of divisions along x, y, z for binned components.
    pub bins: Option<[usize; 3]>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(WORLD.to_string()),
            parallel: false,
            rotation: Rotation3::identity(),
            translation: Vector3::zeros(),
            region: None,
            bins: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_translation(mut self, translation: Vector3<f64>) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation3<f64>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_bins(mut self, bins: [usize; 3]) -> Self {
        self.bins = Some(bins);
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// The component's local z-axis expressed in world coordinates.
    pub fn world_z_axis(&self) -> Vector3<f64> {
        self.rotation.inverse() * Vector3::z()
    }

    /// Name of the world the component lives in: itself when parallel, else
    /// the mass world.
    pub fn owning_world(&self) -> &str {
        if self.parallel { &self.name } else { WORLD }
    }
}

pub trait GeometryService: Send + Sync {
    /// Case-insensitive component lookup.
    fn component(&self, name: &str) -> Option<&Component>;

    /// Case-insensitive region lookup. The default world region always exists.
    fn region_exists(&self, name: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct InMemoryGeometry {
    components: BTreeMap<String, Component>,
    regions: BTreeSet<String>,
}

impl Default for InMemoryGeometry {
    fn default() -> Self {
        let mut world = Component::new(WORLD);
        world.parent = None;
        let mut geometry = Self {
            components: BTreeMap::new(),
            regions: BTreeSet::new(),
        };
        geometry.add_component(world);
        geometry.add_region(DEFAULT_REGION);
        geometry
    }
}

impl InMemoryGeometry {
    /// Geometry holding only the world volume.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a component. Its region, if any, is registered too.
    pub fn add_component(&mut self, component: Component) {
        if let Some(region) = &component.region {
            self.regions.insert(region.to_lowercase());
        }
        self.components.insert(component.name.to_lowercase(), component);
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.add_component(component);
        self
    }

    pub fn add_region(&mut self, name: &str) {
        self.regions.insert(name.to_lowercase());
    }

    pub fn with_region(mut self, name: &str) -> Self {
        self.add_region(name);
        self
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }
}

impl GeometryService for InMemoryGeometry {
    fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(&name.to_lowercase())
    }

    fn region_exists(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(DEFAULT_REGION) || self.regions.contains(&name.to_lowercase())
    }
}
