//! Reporting utilities: verdict tallies and formatted terminal output.

use std::collections::BTreeMap;

use crate::app::pipeline::Verdict;
use crate::domain::Classification;

pub mod format;

pub use format::*;

/// Continue/kill counts for one species.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub continues: usize,
    pub kills: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.continues + self.kills
    }

    /// Fraction of tracks killed, 0 when empty.
    pub fn kill_fraction(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.kills as f64 / self.total() as f64
        }
    }
}

/// Tally verdicts by species name, sorted by name.
pub fn tally_by_species(verdicts: &[Verdict]) -> BTreeMap<String, Tally> {
    let mut out: BTreeMap<String, Tally> = BTreeMap::new();
    for v in verdicts {
        let tally = out.entry(v.species.clone()).or_default();
        match v.classification {
            Classification::Continue => tally.continues += 1,
            Classification::Kill => tally.kills += 1,
        }
    }
    out
}
