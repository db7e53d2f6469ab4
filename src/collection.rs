//! In-memory model of an opened collection index
//!
//! A [`CollectionIndex`] is one node of the partition tree. Leaf indices carry
//! datasets whose variables point at sparse record arrays; partition indices
//! list their child partitions. The record arrays themselves stay on disk
//! until [`crate::reader::IndexReader::read_records`] is called.

use crate::error::InspectError;
use crate::identifiers::Fingerprint;
use crate::layout::RecordSection;
use crate::structures::SparseArrayLocation;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Shape of a node in the partition tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Holds datasets and record arrays directly
    Leaf,
    /// Children are themselves partition indices, each in its own directory
    PartitionOfPartitions,
    /// Children are leaf indices living next to this index
    PartitionOfLeaves,
}

impl CollectionKind {
    /// Numeric code stored in the index header
    pub fn code(self) -> u32 {
        match self {
            Self::Leaf => 0,
            Self::PartitionOfPartitions => 1,
            Self::PartitionOfLeaves => 2,
        }
    }

    /// Decode a header kind code
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Leaf),
            1 => Some(Self::PartitionOfPartitions),
            2 => Some(Self::PartitionOfLeaves),
            _ => None,
        }
    }

    pub fn is_partition(self) -> bool {
        !matches!(self, Self::Leaf)
    }
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Leaf => "leaf",
            Self::PartitionOfPartitions => "partition of partitions",
            Self::PartitionOfLeaves => "partition of leaves",
        };
        f.write_str(label)
    }
}

/// Kind of a dataset within a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    TwoD,
    Best,
    BestComplete,
    SingleRuntime,
    MultipleRuntime,
    UniqueTime,
}

impl DatasetKind {
    /// Derived datasets re-present records owned by another dataset
    pub fn is_derived(self) -> bool {
        matches!(self, Self::Best | Self::BestComplete)
    }
}

impl Display for DatasetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TwoD => "TwoD",
            Self::Best => "Best",
            Self::BestComplete => "BestComplete",
            Self::SingleRuntime => "SRC",
            Self::MultipleRuntime => "MRC",
            Self::UniqueTime => "MRUTC",
        };
        f.write_str(label)
    }
}

/// Per-variable entry of a leaf index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableIndex {
    pub fingerprint: Fingerprint,
    pub name: String,
    pub nrecords: u64,
    pub ndups: u64,
    pub nmissing: u64,
    /// Where the sparse record array is stored
    pub records: SparseArrayLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub description: String,
    pub variables: Vec<VariableIndex>,
}

impl Group {
    /// Sum of record counts over the group's variables
    pub fn total_records(&self) -> u64 {
        self.variables.iter().fold(0u64, |total, v| total.saturating_add(v.nrecords))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub groups: Vec<Group>,
}

impl Dataset {
    /// Iterate every variable of every group, in listing order
    pub fn variables(&self) -> impl Iterator<Item = &VariableIndex> {
        self.groups.iter().flat_map(|g| g.variables.iter())
    }
}

/// Ordered member file names, addressed by file number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTable {
    files: Vec<String>,
}

impl FileTable {
    pub fn new(files: Vec<String>) -> Self {
        Self { files }
    }

    /// Resolve a record's file number to the member file name
    pub fn filename(&self, fileno: u32) -> Result<&str, InspectError> {
        self.files
            .get(fileno as usize)
            .map(String::as_str)
            .ok_or(InspectError::UnknownFileNumber {
                fileno,
                table_len: self.files.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate `(fileno, name)` pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.files.iter().enumerate().map(|(i, f)| (i as u32, f.as_str()))
    }
}

/// Child entry of a partition index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    /// Directory the child was stored in when the parent was built
    pub directory: PathBuf,
    /// File name of the child index
    pub filename: String,
}

/// One opened node of the partition tree
///
/// Owns the memory mapping of its file. Not `Clone`: an index is opened,
/// visited, and closed exactly once per traversal.
#[derive(Debug)]
pub struct CollectionIndex {
    pub(crate) path: PathBuf,
    pub(crate) name: String,
    pub(crate) kind: CollectionKind,
    pub(crate) datasets: Vec<Dataset>,
    pub(crate) files: FileTable,
    pub(crate) partitions: Vec<Partition>,
    pub(crate) records: Option<RecordSection>,
}

impl CollectionIndex {
    /// Build an index node without a backing mapping
    ///
    /// Used by readers that keep record arrays somewhere other than an
    /// index file.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        kind: CollectionKind,
        datasets: Vec<Dataset>,
        files: FileTable,
        partitions: Vec<Partition>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            kind,
            datasets,
            files,
            partitions,
            records: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing this index file
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub(crate) fn record_section(&self) -> Option<&RecordSection> {
        self.records.as_ref()
    }

    /// Variables participating in analysis, in listing order
    ///
    /// Derived datasets are skipped unless `include_derived` is set.
    pub fn analyzed_variables(&self, include_derived: bool) -> impl Iterator<Item = &VariableIndex> {
        self.datasets
            .iter()
            .filter(move |d| include_derived || !d.kind.is_derived())
            .flat_map(Dataset::variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(name: &str, fp: u32, nrecords: u64) -> VariableIndex {
        VariableIndex {
            fingerprint: Fingerprint::new(fp),
            name: name.to_string(),
            nrecords,
            ndups: 0,
            nmissing: 0,
            records: SparseArrayLocation::default(),
        }
    }

    #[test]
    fn test_kind_codes() {
        for kind in [
            CollectionKind::Leaf,
            CollectionKind::PartitionOfPartitions,
            CollectionKind::PartitionOfLeaves,
        ] {
            assert_eq!(CollectionKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(CollectionKind::from_code(9), None);
        assert!(!CollectionKind::Leaf.is_partition());
        assert!(CollectionKind::PartitionOfLeaves.is_partition());
    }

    #[test]
    fn test_file_table_lookup() {
        let table = FileTable::new(vec!["a.grib2".into(), "b.grib2".into()]);
        assert_eq!(table.filename(1).unwrap(), "b.grib2");
        match table.filename(2) {
            Err(InspectError::UnknownFileNumber { fileno, table_len }) => {
                assert_eq!(fileno, 2);
                assert_eq!(table_len, 2);
            }
            other => panic!("expected UnknownFileNumber, got {:?}", other),
        }
        let pairs: Vec<_> = table.iter().collect();
        assert_eq!(pairs, vec![(0, "a.grib2"), (1, "b.grib2")]);
    }

    #[test]
    fn test_analyzed_variables_skip_derived() {
        let index = CollectionIndex::new(
            "/data/leaf.ncx",
            "leaf",
            CollectionKind::Leaf,
            vec![
                Dataset {
                    kind: DatasetKind::TwoD,
                    groups: vec![Group {
                        description: "g".into(),
                        variables: vec![variable("X", 1, 10), variable("Y", 2, 5)],
                    }],
                },
                Dataset {
                    kind: DatasetKind::Best,
                    groups: vec![Group {
                        description: "g".into(),
                        variables: vec![variable("X", 1, 10)],
                    }],
                },
            ],
            FileTable::default(),
            Vec::new(),
        );

        let names: Vec<_> = index.analyzed_variables(false).map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["X", "Y"]);
        assert_eq!(index.analyzed_variables(true).count(), 3);
        assert_eq!(index.directory(), Path::new("/data"));
        assert_eq!(index.datasets()[0].groups[0].total_records(), 15);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(DatasetKind::UniqueTime.to_string(), "MRUTC");
        assert_eq!(CollectionKind::PartitionOfLeaves.to_string(), "partition of leaves");
        assert!(DatasetKind::BestComplete.is_derived());
        assert!(!DatasetKind::TwoD.is_derived());
    }
}
