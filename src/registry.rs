//! Collection-wide variable identity registry
//!
//! The registry totals record counts per variable fingerprint across every
//! leaf of a collection tree. Whether a fingerprint is dominant can only be
//! decided once the whole tree has been seen, so the registry has two phases:
//!
//! 1. `Collecting`: pass 1 calls [`VariableRegistry::register_occurrence`]
//! 2. `Sealed`: after [`VariableRegistry::finalize_dominance`], entries are
//!    frozen and [`VariableRegistry::is_dominant`] may be queried
//!
//! Using the registry out of phase is an error rather than a silent wrong
//! answer.

use crate::error::InspectError;
use crate::identifiers::Fingerprint;
use crate::Result;
use indexmap::IndexMap;
use rustc_hash::FxHasher;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::hash::BuildHasherDefault;

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Lifecycle phase of a [`VariableRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryPhase {
    Collecting,
    Sealed { threshold: u64 },
}

impl Display for RegistryPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collecting => f.write_str("collecting"),
            Self::Sealed { threshold } => write!(f, "sealed (threshold {})", threshold),
        }
    }
}

/// Collection-wide totals for one fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VarAggregate {
    /// Display name from the first registration
    pub name: String,
    /// Sum of record counts over every contributing leaf variable
    pub total: u64,
    /// Number of leaf variables that contributed
    pub occurrences: u32,
    /// Set once by `finalize_dominance`
    pub dominant: bool,
}

/// Fingerprint to aggregate map, iterated in first-registration order
#[derive(Debug, Clone)]
pub struct VariableRegistry {
    entries: FxIndexMap<Fingerprint, VarAggregate>,
    phase: RegistryPhase,
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self {
            entries: FxIndexMap::default(),
            phase: RegistryPhase::Collecting,
        }
    }

    pub fn phase(&self) -> RegistryPhase {
        self.phase
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self.phase, RegistryPhase::Sealed { .. })
    }

    /// Threshold the registry was sealed with, if any
    pub fn threshold(&self) -> Option<u64> {
        match self.phase {
            RegistryPhase::Sealed { threshold } => Some(threshold),
            RegistryPhase::Collecting => None,
        }
    }

    /// Add one leaf variable's record count to its fingerprint's total
    pub fn register_occurrence(&mut self, fingerprint: Fingerprint, display_name: &str, record_count: u64) -> Result<()> {
        if self.is_sealed() {
            return Err(InspectError::registry_phase("register_occurrence", self.phase.to_string()));
        }

        let entry = self.entries.entry(fingerprint).or_insert_with(|| VarAggregate {
            name: display_name.to_string(),
            total: 0,
            occurrences: 0,
            dominant: false,
        });
        entry.total = entry.total.saturating_add(record_count);
        entry.occurrences = entry.occurrences.saturating_add(1);
        Ok(())
    }

    /// Mark every fingerprint whose total exceeds `threshold` as dominant and seal
    pub fn finalize_dominance(&mut self, threshold: u64) -> Result<()> {
        if self.is_sealed() {
            return Err(InspectError::registry_phase("finalize_dominance", self.phase.to_string()));
        }

        for aggregate in self.entries.values_mut() {
            aggregate.dominant = aggregate.total > threshold;
        }
        self.phase = RegistryPhase::Sealed { threshold };
        Ok(())
    }

    /// Whether `fingerprint` is dominant across the collection
    pub fn is_dominant(&self, fingerprint: Fingerprint) -> Result<bool> {
        if !self.is_sealed() {
            return Err(InspectError::registry_phase("is_dominant", self.phase.to_string()));
        }
        self.entries
            .get(&fingerprint)
            .map(|aggregate| aggregate.dominant)
            .ok_or(InspectError::UnknownFingerprint(fingerprint))
    }

    pub fn get(&self, fingerprint: Fingerprint) -> Option<&VarAggregate> {
        self.entries.get(&fingerprint)
    }

    /// Collection-wide record total for `fingerprint`
    pub fn total(&self, fingerprint: Fingerprint) -> Option<u64> {
        self.entries.get(&fingerprint).map(|aggregate| aggregate.total)
    }

    /// Aggregates in first-registration order
    pub fn aggregates(&self) -> impl Iterator<Item = (Fingerprint, &VarAggregate)> {
        self.entries.iter().map(|(fp, aggregate)| (*fp, aggregate))
    }

    pub fn dominant_fingerprints(&self) -> Vec<Fingerprint> {
        self.entries
            .iter()
            .filter(|(_, aggregate)| aggregate.dominant)
            .map(|(fp, _)| *fp)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
