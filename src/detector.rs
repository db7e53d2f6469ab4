//! Misplacement detection
//!
//! A variable is misplaced in a leaf when its fingerprint is not dominant
//! across the collection. Classification only needs the catalog counts;
//! locating the individual records requires loading the sparse record array
//! and is done lazily.

use crate::collection::{CollectionIndex, VariableIndex};
use crate::reader::IndexReader;
use crate::registry::VariableRegistry;
use crate::structures::Record;
use crate::Result;
use serde::Serialize;

/// Outcome of checking one variable against the sealed registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Placed,
    /// Carries the variable's record count in this leaf
    Misplaced(u64),
}

impl Classification {
    /// Records this classification contributes to a leaf's misplaced total
    pub fn misplaced_count(self) -> u64 {
        match self {
            Self::Placed => 0,
            Self::Misplaced(count) => count,
        }
    }
}

/// Classify `variable` against a sealed registry
///
/// Fails with `RegistryPhase` if the registry is not sealed and with
/// `UnknownFingerprint` if the variable was never registered.
pub fn classify_variable(variable: &VariableIndex, registry: &VariableRegistry) -> Result<Classification> {
    if registry.is_dominant(variable.fingerprint)? {
        Ok(Classification::Placed)
    } else {
        Ok(Classification::Misplaced(variable.nrecords))
    }
}

/// One misplaced record resolved to its member file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MisplacedRecord {
    pub variable: String,
    pub filename: String,
    pub pos: u64,
}

/// Lazy sequence of resolved record locations for one variable
///
/// Each item is resolved through the index's file table on demand; an unknown
/// file number fails that item only.
pub struct RecordLocations<'a> {
    index: &'a CollectionIndex,
    variable: &'a VariableIndex,
    records: std::vec::IntoIter<Record>,
}

impl RecordLocations<'_> {
    /// Records not yet yielded
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl Iterator for RecordLocations<'_> {
    type Item = Result<MisplacedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            self.index
                .files()
                .filename(record.fileno)
                .map(|filename| MisplacedRecord {
                    variable: self.variable.name.clone(),
                    filename: filename.to_string(),
                    pos: record.pos,
                }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

/// Load `variable`'s record array and return its record locations
///
/// The load happens here, before any item is produced, so a truncated or
/// malformed record section fails with `CorruptIndex` up front.
pub fn locate_records<'a, R: IndexReader + ?Sized>(
    reader: &R,
    index: &'a CollectionIndex,
    variable: &'a VariableIndex,
) -> Result<RecordLocations<'a>> {
    let sparse = reader.read_records(index, variable)?;
    Ok(RecordLocations {
        index,
        variable,
        records: sparse.records().to_vec().into_iter(),
    })
}
