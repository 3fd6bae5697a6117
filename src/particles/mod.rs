//! Particle table and species filters.
//!
//! Species entries in configuration come in three forms:
//!
//! - a particle name (`e-`, `proton`, `he3`), matched case-insensitively
//! - a PDG code (`2212`, `1000020040`, or the ion form `100ZZZAAAI`)
//! - `GenericIon(Z,A[,Q])`, where any field may be `*`
//!
//! All three resolve to a `SpeciesSelector`, which is what techniques keep.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::Species;
use crate::error::AppError;
use crate::params::ParameterStore;

/// Parameter that lets excited-state ion codes resolve to the ground state.
pub const TREAT_EXCITED_IONS_AS_GROUND_STATE: &str = "Ts/TreatExcitedIonsAsGroundState";

const GENERIC_ION: &str = "GenericIon";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticleEntry {
    pub name: &'static str,
    pub pdg: i64,
    pub atomic_number: i32,
    pub atomic_mass: i32,
    pub charge: i32,
}

const STANDARD: &[ParticleEntry] = &[
    entry("gamma", 22, 0, 0, 0),
    entry("opticalphoton", 0, 0, 0, 0),
    entry("e-", 11, 0, 0, -1),
    entry("e+", -11, 0, 0, 1),
    entry("mu-", 13, 0, 0, -1),
    entry("mu+", -13, 0, 0, 1),
    entry("nu_e", 12, 0, 0, 0),
    entry("anti_nu_e", -12, 0, 0, 0),
    entry("pi+", 211, 0, 0, 1),
    entry("pi-", -211, 0, 0, -1),
    entry("pi0", 111, 0, 0, 0),
    entry("kaon+", 321, 0, 0, 1),
    entry("kaon-", -321, 0, 0, -1),
    entry("proton", 2212, 1, 1, 1),
    entry("anti_proton", -2212, -1, 1, -1),
    entry("neutron", 2112, 0, 1, 0),
    entry("deuteron", 1_000_010_020, 1, 2, 1),
    entry("triton", 1_000_010_030, 1, 3, 1),
    entry("He3", 1_000_020_030, 2, 3, 2),
    entry("alpha", 1_000_020_040, 2, 4, 2),
];

const fn entry(name: &'static str, pdg: i64, atomic_number: i32, atomic_mass: i32, charge: i32) -> ParticleEntry {
    ParticleEntry {
        name,
        pdg,
        atomic_number,
        atomic_mass,
        charge,
    }
}

/// Lookup table of known particle species.
#[derive(Debug, Clone)]
pub struct ParticleTable {
    entries: Vec<ParticleEntry>,
    by_name: HashMap<String, usize>,
    by_pdg: HashMap<i64, usize>,
}

impl Default for ParticleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl ParticleTable {
    /// Table with the leptons, hadrons and light ions used by transport physics.
    pub fn standard() -> Self {
        let entries = STANDARD.to_vec();
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.to_lowercase(), i))
            .collect();
        let by_pdg = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.pdg != 0)
            .map(|(i, e)| (e.pdg, i))
            .collect();
        Self {
            entries,
            by_name,
            by_pdg,
        }
    }

    pub fn find(&self, name: &str) -> Option<&ParticleEntry> {
        self.by_name.get(&name.to_lowercase()).map(|&i| &self.entries[i])
    }

    pub fn find_pdg(&self, code: i64) -> Option<&ParticleEntry> {
        if code == 0 {
            return self.find("opticalphoton");
        }
        self.by_pdg.get(&code).map(|&i| &self.entries[i])
    }

    /// Species value for a known particle name.
    pub fn species(&self, name: &str) -> Option<Species> {
        self.find(name)
            .map(|e| Species::new(e.name, e.atomic_number, e.atomic_mass, e.charge))
    }

    /// Resolve one configuration entry into a selector.
    ///
    /// `parameter` is only used to name the offending parameter on error.
    pub fn resolve(
        &self,
        raw: &str,
        parameter: &str,
        treat_excited_as_ground: bool,
    ) -> Result<SpeciesSelector, AppError> {
        let text = raw.trim();
        if let Ok(code) = text.parse::<i64>() {
            return self.resolve_pdg(code, parameter, treat_excited_as_ground);
        }
        if text
            .get(..GENERIC_ION.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(GENERIC_ION))
        {
            return parse_generic_ion(&text[GENERIC_ION.len()..], parameter);
        }
        self.find(text)
            .map(|e| SpeciesSelector::Exact(e.name.to_string()))
            .ok_or_else(|| AppError::quit(parameter, format!("Particle \"{text}\" is not a known particle.")))
    }

    fn resolve_pdg(
        &self,
        code: i64,
        parameter: &str,
        treat_excited_as_ground: bool,
    ) -> Result<SpeciesSelector, AppError> {
        if let Some(e) = self.find_pdg(code) {
            return Ok(SpeciesSelector::Exact(e.name.to_string()));
        }
        // 100ZZZAAAI
        if (1_000_000_000..1_010_000_000).contains(&code) {
            let atomic_number = ((code / 10_000) % 1_000) as i32;
            let atomic_mass = ((code / 10) % 1_000) as i32;
            let isomer = code % 10;
            if isomer != 0 && !treat_excited_as_ground {
                return Err(AppError::quit(
                    parameter,
                    format!(
                        "PDG code {code} is an excited ion state. Set {TREAT_EXCITED_IONS_AS_GROUND_STATE} to use the ground state."
                    ),
                ));
            }
            return ion_selector(Some(atomic_number), Some(atomic_mass), None, parameter);
        }
        Err(AppError::quit(parameter, format!("PDG code {code} is not a known particle.")))
    }
}

/// One resolved species entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SpeciesSelector {
    /// A named particle.
    Exact(String),
    /// An ion; `None` fields are wildcards.
    Ion {
        atomic_number: Option<i32>,
        atomic_mass: Option<i32>,
        charge: Option<i32>,
    },
}

impl SpeciesSelector {
    pub fn matches(&self, species: &Species) -> bool {
        match self {
            SpeciesSelector::Exact(name) => species.name.eq_ignore_ascii_case(name),
            SpeciesSelector::Ion {
                atomic_number,
                atomic_mass,
                charge,
            } => {
                is_ion(species)
                    && atomic_number.is_none_or(|z| z == species.atomic_number)
                    && atomic_mass.is_none_or(|a| a == species.atomic_mass)
                    && charge.is_none_or(|q| q == species.charge)
            }
        }
    }
}

/// Nuclei heavier than the proton, plus anything labelled as a generic ion.
///
/// Ion selectors only ever match species that pass this test, so
/// `GenericIon(1,1,1)` never matches the table's `proton` (A = 1, not named
/// `GenericIon`). It does match a track whose species is a Z = 1, A = 1
/// generic ion.
fn is_ion(species: &Species) -> bool {
    species.name.eq_ignore_ascii_case(GENERIC_ION) || species.atomic_mass >= 2
}

fn parse_generic_ion(rest: &str, parameter: &str) -> Result<SpeciesSelector, AppError> {
    let rest = rest.trim();
    if rest.is_empty() {
        return ion_selector(None, None, None, parameter);
    }
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| AppError::quit(parameter, format!("Malformed ion specification \"GenericIon{rest}\".")))?;

    let fields: Vec<&str> = inner.split(',').map(str::trim).collect();
    if fields.len() < 2 || fields.len() > 3 {
        return Err(AppError::quit(
            parameter,
            "GenericIon needs (Z,A) or (Z,A,Q).",
        ));
    }
    let field = |text: &str| -> Result<Option<i32>, AppError> {
        if text == "*" {
            return Ok(None);
        }
        text.parse::<i32>()
            .map(Some)
            .map_err(|_| AppError::quit(parameter, format!("\"{text}\" is not an integer or \"*\".")))
    };
    let atomic_number = field(fields[0])?;
    let atomic_mass = field(fields[1])?;
    let charge = match fields.get(2) {
        Some(text) => field(text)?,
        None => None,
    };
    ion_selector(atomic_number, atomic_mass, charge, parameter)
}

fn ion_selector(
    atomic_number: Option<i32>,
    atomic_mass: Option<i32>,
    charge: Option<i32>,
    parameter: &str,
) -> Result<SpeciesSelector, AppError> {
    if let Some(z) = atomic_number {
        if !(1..=999).contains(&z) {
            return Err(AppError::quit(parameter, format!("Ion atomic number {z} is out of range.")));
        }
        if let Some(a) = atomic_mass {
            if z > a {
                return Err(AppError::quit(
                    parameter,
                    format!("Ion atomic number {z} exceeds its mass number {a}."),
                ));
            }
        }
        if let Some(q) = charge {
            if q.abs() > z {
                return Err(AppError::quit(
                    parameter,
                    format!("Ion charge {q} exceeds its atomic number {z}."),
                ));
            }
        }
    }
    Ok(SpeciesSelector::Ion {
        atomic_number,
        atomic_mass,
        charge,
    })
}

/// Allow-list (or deny-list when `invert`) of species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesFilter {
    pub selectors: Vec<SpeciesSelector>,
    pub invert: bool,
}

impl SpeciesFilter {
    /// Matches-any XOR invert.
    pub fn accepts(&self, species: &Species) -> bool {
        self.selectors.iter().any(|s| s.matches(species)) != self.invert
    }
}

/// Resolve every entry of a string-vector parameter.
pub fn resolve_species_list(
    parameters: &ParameterStore,
    particles: &ParticleTable,
    parameter: &str,
) -> Result<Vec<SpeciesSelector>, AppError> {
    let treat_excited = parameters.boolean_or(TREAT_EXCITED_IONS_AS_GROUND_STATE, false)?;
    parameters
        .string_vector(parameter)?
        .iter()
        .map(|raw| particles.resolve(raw, parameter, treat_excited))
        .collect()
}

/// Build a filter from a pair of mutually exclusive allow/deny parameters.
///
/// Returns `Ok(None)` when neither is set.
pub fn resolve_species_filter(
    parameters: &ParameterStore,
    particles: &ParticleTable,
    named: &str,
    not_named: &str,
) -> Result<Option<SpeciesFilter>, AppError> {
    match (parameters.exists(named), parameters.exists(not_named)) {
        (true, true) => Err(AppError::quit(
            named,
            format!("Cannot be combined with {not_named}. Use only one of them."),
        )),
        (true, false) => Ok(Some(SpeciesFilter {
            selectors: resolve_species_list(parameters, particles, named)?,
            invert: false,
        })),
        (false, true) => Ok(Some(SpeciesFilter {
            selectors: resolve_species_list(parameters, particles, not_named)?,
            invert: true,
        })),
        (false, false) => Ok(None),
    }
}
