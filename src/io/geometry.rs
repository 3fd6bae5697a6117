//! Geometry description loading.
//!
//! ```json
//! {
//!   "regions": ["Target"],
//!   "components": [
//!     { "name": "Linac", "region": "Target" },
//!     { "name": "Phantom", "translation": [0, 0, 1000], "rotation_deg": [0, 90, 0] },
//!     { "name": "Mesh", "parallel": true, "bins": [10, 10, 20] }
//!   ]
//! }
//! ```
//!
//! Translations are in `unit` (default mm). Rotations are roll/pitch/yaw in
//! degrees about the world x, y and z axes.

use std::fs::File;
use std::path::Path;

use nalgebra::{Rotation3, Vector3};
use serde::Deserialize;

use crate::error::AppError;
use crate::geometry::{Component, InMemoryGeometry, WORLD};
use crate::params::{Dimension, units};

#[derive(Debug, Clone, Deserialize)]
pub struct GeometryFile {
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentEntry {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub translation: Option<[f64; 3]>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub rotation_deg: Option<[f64; 3]>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub bins: Option<[usize; 3]>,
}

impl ComponentEntry {
    fn into_component(self) -> Result<Component, AppError> {
        if self.name.eq_ignore_ascii_case(WORLD) {
            return Err(AppError::input("The world volume is implicit and cannot be redefined."));
        }
        let scale = match &self.unit {
            None => 1.0,
            Some(unit) => units::scale_to_internal(Dimension::Length, unit).ok_or_else(|| {
                AppError::input(format!("Component {}: unknown length unit \"{unit}\".", self.name))
            })?,
        };
        let translation = self.translation.map(Vector3::from).unwrap_or_else(Vector3::zeros) * scale;
        let rotation = self
            .rotation_deg
            .map(|[x, y, z]| Rotation3::from_euler_angles(x.to_radians(), y.to_radians(), z.to_radians()))
            .unwrap_or_else(Rotation3::identity);
        if self.bins.is_some_and(|bins| bins.contains(&0)) {
            return Err(AppError::input(format!("Component {}: bins must be positive.", self.name)));
        }

        let mut component = Component::new(self.name)
            .with_translation(translation)
            .with_rotation(rotation);
        if let Some(parent) = self.parent {
            component = component.with_parent(parent);
        }
        if let Some(region) = self.region {
            component = component.with_region(region);
        }
        if let Some(bins) = self.bins {
            component = component.with_bins(bins);
        }
        if self.parallel {
            component = component.parallel();
        }
        Ok(component)
    }
}

impl GeometryFile {
    pub fn into_geometry(self) -> Result<InMemoryGeometry, AppError> {
        let mut geometry = InMemoryGeometry::new();
        for region in &self.regions {
            geometry.add_region(region);
        }
        for entry in self.components {
            geometry.add_component(entry.into_component()?);
        }
        Ok(geometry)
    }
}

pub fn read_geometry_json(path: &Path) -> Result<InMemoryGeometry, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open geometry file '{}': {e}", path.display())))?;
    let description: GeometryFile = serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid geometry JSON '{}': {e}", path.display())))?;
    description.into_geometry()
}
