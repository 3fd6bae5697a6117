//! Shared per-cell tables consulted by the engine's native samplers.
//!
//! One `CellStores` is created by the host and shared (`Arc`) by every
//! execution context. Tables are keyed by world name. Only the leader context
//! may replace a table; other contexts read.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::error::AppError;

/// Identity of the execution context a registry runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionContext {
    pub index: usize,
    /// The leader builds shared tables; workers only attach to them.
    pub leader: bool,
}

impl ExecutionContext {
    pub fn leader() -> Self {
        Self { index: 0, leader: true }
    }

    pub fn worker(index: usize) -> Self {
        Self { index, leader: false }
    }
}

/// (volume, replica number) pair addressing one geometry cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GeometryCell {
    pub volume: String,
    pub replica: i32,
}

impl GeometryCell {
    pub fn new(volume: impl Into<String>, replica: i32) -> Self {
        Self {
            volume: volume.into(),
            replica,
        }
    }
}

/// Per cell, energy upper bound (MeV) → lower weight bound, ordered by energy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeightWindowTable {
    cells: BTreeMap<GeometryCell, Vec<(f64, f64)>>,
}

impl WeightWindowTable {
    pub fn insert(&mut self, cell: GeometryCell, mut bounds: Vec<(f64, f64)>) {
        bounds.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.cells.insert(cell, bounds);
    }

    /// Lower weight bound of the first energy bin whose upper bound is at
    /// least `energy`.
    pub fn lower_weight(&self, cell: &GeometryCell, energy: f64) -> Option<f64> {
        self.cells
            .get(cell)?
            .iter()
            .find(|(upper, _)| *upper >= energy)
            .map(|(_, weight)| *weight)
    }

    pub fn bounds(&self, cell: &GeometryCell) -> Option<&[(f64, f64)]> {
        self.cells.get(cell).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportanceTable {
    cells: BTreeMap<GeometryCell, f64>,
}

impl ImportanceTable {
    pub fn insert(&mut self, cell: GeometryCell, importance: f64) {
        self.cells.insert(cell, importance);
    }

    pub fn importance(&self, cell: &GeometryCell) -> Option<f64> {
        self.cells.get(cell).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitCell {
    pub split_number: i64,
    pub symmetric: bool,
    pub russian_roulette: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SplitTable {
    cells: BTreeMap<GeometryCell, SplitCell>,
}

impl SplitTable {
    pub fn insert(&mut self, cell: GeometryCell, split: SplitCell) {
        self.cells.insert(cell, split);
    }

    pub fn get(&self, cell: &GeometryCell) -> Option<SplitCell> {
        self.cells.get(cell).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A published table and the technique that built it.
#[derive(Debug)]
struct Published<T> {
    owner: String,
    table: T,
}

type Tables<T> = RwLock<HashMap<String, Published<T>>>;

#[derive(Debug, Default)]
pub struct CellStores {
    weight_windows: Tables<WeightWindowTable>,
    importances: Tables<ImportanceTable>,
    splits: Tables<SplitTable>,
}

impl CellStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_weight_windows(
        &self,
        exec: ExecutionContext,
        owner: &str,
        world: &str,
        table: WeightWindowTable,
    ) -> Result<(), AppError> {
        publish(&self.weight_windows, exec, owner, world, table, "weight-window")
    }

    pub fn weight_windows(&self, world: &str) -> Result<Option<WeightWindowTable>, AppError> {
        Ok(read(&self.weight_windows, "weight-window")?.get(world).map(|p| p.table.clone()))
    }

    pub fn publish_importances(
        &self,
        exec: ExecutionContext,
        owner: &str,
        world: &str,
        table: ImportanceTable,
    ) -> Result<(), AppError> {
        publish(&self.importances, exec, owner, world, table, "importance")
    }

    pub fn importances(&self, world: &str) -> Result<Option<ImportanceTable>, AppError> {
        Ok(read(&self.importances, "importance")?.get(world).map(|p| p.table.clone()))
    }

    pub fn publish_splits(
        &self,
        exec: ExecutionContext,
        owner: &str,
        world: &str,
        table: SplitTable,
    ) -> Result<(), AppError> {
        publish(&self.splits, exec, owner, world, table, "split")
    }

    pub fn splits(&self, world: &str) -> Result<Option<SplitTable>, AppError> {
        Ok(read(&self.splits, "split")?.get(world).map(|p| p.table.clone()))
    }
}

fn read<'a, T>(
    lock: &'a Tables<T>,
    label: &str,
) -> Result<RwLockReadGuard<'a, HashMap<String, Published<T>>>, AppError> {
    lock.read()
        .map_err(|_| AppError::internal(format!("The {label} store is poisoned.")))
}

fn write<'a, T>(
    lock: &'a Tables<T>,
    label: &str,
) -> Result<RwLockWriteGuard<'a, HashMap<String, Published<T>>>, AppError> {
    lock.write()
        .map_err(|_| AppError::internal(format!("The {label} store is poisoned.")))
}

/// Replace the table of `world`. A world holds one table per kind; a second
/// technique binding the same world is a configuration error.
fn publish<T>(
    lock: &Tables<T>,
    exec: ExecutionContext,
    owner: &str,
    world: &str,
    table: T,
    label: &str,
) -> Result<(), AppError> {
    if !exec.leader {
        return Err(AppError::internal(format!(
            "Execution context {} attempted to rebuild the {label} table for {world}; only the leader may.",
            exec.index
        )));
    }
    let mut tables = write(lock, label)?;
    if let Some(existing) = tables.get(world) {
        if !existing.owner.eq_ignore_ascii_case(owner) {
            return Err(AppError::quit(
                format!("Vr/{owner}/Component"),
                format!(
                    "World \"{world}\" already has a {label} table built by {}.",
                    existing.owner
                ),
            ));
        }
    }
    tables.insert(
        world.to_string(),
        Published {
            owner: owner.to_string(),
            table,
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> WeightWindowTable {
        let mut table = WeightWindowTable::default();
        table.insert(GeometryCell::new("Shell", 0), vec![(10.0, 0.5), (1.0, 0.25)]);
        table
    }

    #[test]
    fn lower_weight_uses_first_bin_covering_energy() {
        let table = table();
        let cell = GeometryCell::new("Shell", 0);
        assert_eq!(table.lower_weight(&cell, 0.5), Some(0.25));
        assert_eq!(table.lower_weight(&cell, 1.0), Some(0.25));
        assert_eq!(table.lower_weight(&cell, 5.0), Some(0.5));
        assert_eq!(table.lower_weight(&cell, 50.0), None);
        assert_eq!(table.lower_weight(&GeometryCell::new("Core", 0), 0.5), None);
    }

    #[test]
    fn only_the_leader_publishes() {
        let stores = CellStores::new();
        let err = stores
            .publish_weight_windows(ExecutionContext::worker(3), "Ww", "World", table())
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INTERNAL);
        assert!(stores.weight_windows("World").unwrap().is_none());

        stores
            .publish_weight_windows(ExecutionContext::leader(), "Ww", "World", table())
            .unwrap();
        assert_eq!(stores.weight_windows("World").unwrap().map(|t| t.len()), Some(1));
    }

    #[test]
    fn a_world_keeps_the_table_of_its_first_owner() {
        let stores = CellStores::new();
        stores
            .publish_weight_windows(ExecutionContext::leader(), "Ww", "Shield", table())
            .unwrap();
        // The same technique republishes on every run.
        stores
            .publish_weight_windows(ExecutionContext::leader(), "ww", "Shield", WeightWindowTable::default())
            .unwrap();
        assert_eq!(stores.weight_windows("Shield").unwrap().map(|t| t.len()), Some(0));

        let err = stores
            .publish_weight_windows(ExecutionContext::leader(), "OtherWw", "Shield", table())
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.parameter(), Some("Vr/OtherWw/Component"));
        assert!(err.message().contains("Ww"));
        assert_eq!(stores.weight_windows("Shield").unwrap().map(|t| t.len()), Some(0));

        // Other kinds of table for the same world are independent.
        stores
            .publish_importances(ExecutionContext::leader(), "OtherWw", "Shield", ImportanceTable::default())
            .unwrap();
    }
}
