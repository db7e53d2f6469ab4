//! Test utilities for inspector testing
//!
//! This module provides common helpers for unit tests: RAII test
//! environments, small fixture writers for leaf and partition indices, and a
//! counting reader that records how the walker drives the `IndexReader` seam.

use crate::collection::{CollectionIndex, CollectionKind, Dataset, DatasetKind, FileTable, Group, VariableIndex};
use crate::identifiers::Fingerprint;
use crate::layout::{DatasetSpec, GroupSpec, IndexWriter, VariableSpec};
use crate::reader::IndexReader;
use crate::error::InspectError;
use crate::structures::{Record, SparseArray, SparseArrayLocation};
use crate::Result;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// RAII-based test environment for isolated testing
///
/// Each test gets its own temporary directory that is removed when the
/// environment is dropped.
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub test_name: String,
}

impl TestEnvironment {
    /// Create a new test environment with the given test name
    ///
    /// # Panics
    /// Panics if unable to create temporary directory
    pub fn new(test_name: &str) -> Self {
        let temp_dir =
            TempDir::new().unwrap_or_else(|e| panic!("Failed to create temp dir for test {}: {}", test_name, e));

        Self {
            temp_dir,
            test_name: test_name.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a subdirectory within the test environment
    pub fn create_subdir(&self, name: &str) -> std::io::Result<PathBuf> {
        let subdir_path = self.temp_dir.path().join(name);
        std::fs::create_dir_all(&subdir_path)?;
        Ok(subdir_path)
    }
}

/// Dense records spread over one member file, 1 KiB apart
pub fn dense_records(count: usize) -> SparseArray {
    SparseArray::dense((0..count).map(|i| Record::new(0, i as u64 * 1024)).collect())
}

/// Write a leaf index with one TwoD group holding `variables`
///
/// Each entry is `(name, fingerprint, record count)`.
pub fn leaf_fixture(dir: &Path, name: &str, variables: &[(&str, u32, usize)]) -> PathBuf {
    let group = variables.iter().fold(GroupSpec::new("grid"), |group, &(var, fp, count)| {
        group.variable(VariableSpec::new(var, Fingerprint::new(fp), dense_records(count)))
    });
    let path = dir.join(format!("{}.ncx", name));
    IndexWriter::new(CollectionKind::Leaf, name)
        .file(format!("{}.grib2", name))
        .dataset(DatasetSpec::new(DatasetKind::TwoD).group(group))
        .write(&path)
        .unwrap_or_else(|e| panic!("Failed to write leaf fixture {}: {}", name, e));
    path
}

/// Write a partition-of-leaves index next to already written leaf files
pub fn partition_fixture(dir: &Path, name: &str, leaves: &[&str]) -> PathBuf {
    let writer = leaves.iter().fold(
        IndexWriter::new(CollectionKind::PartitionOfLeaves, name),
        |writer, leaf| writer.partition(*leaf, dir.join(leaf), format!("{}.ncx", leaf)),
    );
    let path = dir.join(format!("{}.ncx", name));
    writer
        .write(&path)
        .unwrap_or_else(|e| panic!("Failed to write partition fixture {}: {}", name, e));
    path
}

/// Reader wrapper counting every call made through the `IndexReader` seam
pub struct CountingReader<R> {
    inner: R,
    opens: Cell<usize>,
    closes: Cell<usize>,
    record_reads: Cell<usize>,
}

impl<R: IndexReader> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            opens: Cell::new(0),
            closes: Cell::new(0),
            record_reads: Cell::new(0),
        }
    }

    /// Successful opens
    pub fn opens(&self) -> usize {
        self.opens.get()
    }

    pub fn closes(&self) -> usize {
        self.closes.get()
    }

    pub fn record_reads(&self) -> usize {
        self.record_reads.get()
    }
}

impl<R: IndexReader> IndexReader for CountingReader<R> {
    fn open(&self, path: &Path) -> Result<CollectionIndex> {
        let index = self.inner.open(path)?;
        self.opens.set(self.opens.get() + 1);
        Ok(index)
    }

    fn read_records(&self, index: &CollectionIndex, variable: &VariableIndex) -> Result<SparseArray> {
        self.record_reads.set(self.record_reads.get() + 1);
        self.inner.read_records(index, variable)
    }

    fn close(&self, index: &CollectionIndex) {
        self.closes.set(self.closes.get() + 1);
        self.inner.close(index);
    }
}

/// Reader serving one in-memory leaf that has a catalog but no record section
///
/// Lets tests declare record counts no fixture file could hold.
pub struct CatalogReader {
    variables: Vec<(String, u32, u64)>,
}

impl CatalogReader {
    /// Each entry is `(name, fingerprint, declared record count)`
    pub fn new(variables: &[(&str, u32, u64)]) -> Self {
        Self {
            variables: variables
                .iter()
                .map(|&(name, fp, nrecords)| (name.to_string(), fp, nrecords))
                .collect(),
        }
    }
}

impl IndexReader for CatalogReader {
    fn open(&self, path: &Path) -> Result<CollectionIndex> {
        let variables = self
            .variables
            .iter()
            .map(|(name, fp, nrecords)| VariableIndex {
                fingerprint: Fingerprint::new(*fp),
                name: name.clone(),
                nrecords: *nrecords,
                ndups: *nrecords,
                nmissing: *nrecords,
                records: SparseArrayLocation::default(),
            })
            .collect();
        let dataset = Dataset {
            kind: DatasetKind::TwoD,
            groups: vec![Group {
                description: "grid".to_string(),
                variables,
            }],
        };
        Ok(CollectionIndex::new(
            path,
            "catalog",
            CollectionKind::Leaf,
            vec![dataset],
            FileTable::new(vec!["catalog.grib2".to_string()]),
            Vec::new(),
        ))
    }

    fn read_records(&self, index: &CollectionIndex, _variable: &VariableIndex) -> Result<SparseArray> {
        Err(InspectError::corrupt_index(index.path(), "index has no record section"))
    }
}
