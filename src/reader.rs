//! Index reader seam
//!
//! The walker never touches index files directly; it goes through an
//! [`IndexReader`]. [`FileIndexReader`] is the memory-mapped implementation
//! for `.ncx` files. [`ScopedIndex`] guarantees that every opened index is
//! closed again, whichever way its visit ends.

use crate::collection::{CollectionIndex, VariableIndex};
use crate::error::InspectError;
use crate::layout::{open_index_file, read_sparse_array};
use crate::structures::SparseArray;
use crate::Result;
use std::ops::Deref;
use std::path::Path;
use tracing::{debug, trace};

/// Source of collection indices and their record arrays
pub trait IndexReader {
    /// Open the index at `path`
    ///
    /// Fails with `NotAnIndexFile` or `CorruptIndex` for files that are not
    /// usable indices, and with `Io` when the file cannot be read at all.
    fn open(&self, path: &Path) -> Result<CollectionIndex>;

    /// Load a variable's sparse record array
    ///
    /// Fails with `CorruptIndex` when the record section is truncated or
    /// malformed.
    fn read_records(&self, index: &CollectionIndex, variable: &VariableIndex) -> Result<SparseArray>;

    /// Release any resources held for `index`
    ///
    /// Called exactly once per successful `open` by [`ScopedIndex`].
    fn close(&self, _index: &CollectionIndex) {}
}

/// Reader for memory-mapped `.ncx` index files
#[derive(Debug, Clone, Copy, Default)]
pub struct FileIndexReader;

impl FileIndexReader {
    pub fn new() -> Self {
        Self
    }
}

impl IndexReader for FileIndexReader {
    fn open(&self, path: &Path) -> Result<CollectionIndex> {
        let index = open_index_file(path)?;
        debug!(
            path = %path.display(),
            kind = %index.kind(),
            datasets = index.datasets().len(),
            partitions = index.partitions().len(),
            "opened collection index"
        );
        Ok(index)
    }

    fn read_records(&self, index: &CollectionIndex, variable: &VariableIndex) -> Result<SparseArray> {
        let section = index
            .record_section()
            .ok_or_else(|| InspectError::corrupt_index(index.path(), "index has no record section"))?;
        let sparse = read_sparse_array(section, &variable.records)?;
        if sparse.len() as u64 != variable.nrecords {
            return Err(InspectError::corrupt_index(
                index.path(),
                format!(
                    "variable '{}' lists {} records but its record array holds {}",
                    variable.name,
                    variable.nrecords,
                    sparse.len()
                ),
            ));
        }
        trace!(variable = %variable.name, records = sparse.len(), "loaded record array");
        Ok(sparse)
    }
}

/// An opened index that is closed through its reader when dropped
pub struct ScopedIndex<'r, R: IndexReader + ?Sized> {
    reader: &'r R,
    index: Option<CollectionIndex>,
}

impl<'r, R: IndexReader + ?Sized> ScopedIndex<'r, R> {
    /// Open `path` through `reader`
    pub fn open(reader: &'r R, path: &Path) -> Result<Self> {
        let index = reader.open(path)?;
        Ok(Self {
            reader,
            index: Some(index),
        })
    }
}

impl<R: IndexReader + ?Sized> Deref for ScopedIndex<'_, R> {
    type Target = CollectionIndex;

    fn deref(&self) -> &CollectionIndex {
        // Only taken in Drop
        match &self.index {
            Some(index) => index,
            None => unreachable!("scoped index accessed after close"),
        }
    }
}

impl<R: IndexReader + ?Sized> Drop for ScopedIndex<'_, R> {
    fn drop(&mut self) {
        if let Some(index) = self.index.take() {
            self.reader.close(&index);
            trace!(path = %index.path().display(), "closed collection index");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{leaf_fixture, CountingReader};
    use tempfile::TempDir;

    #[test]
    fn test_scoped_index_closes_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = leaf_fixture(dir.path(), "leaf", &[("X", 1, 3)]);
        let reader = CountingReader::new(FileIndexReader::new());

        {
            let index = ScopedIndex::open(&reader, &path).unwrap();
            assert_eq!(index.name(), "leaf");
            assert_eq!(reader.opens(), 1);
            assert_eq!(reader.closes(), 0);
        }
        assert_eq!(reader.closes(), 1);
    }

    #[test]
    fn test_scoped_index_closes_on_error_path() {
        let dir = TempDir::new().unwrap();
        let path = leaf_fixture(dir.path(), "leaf", &[("X", 1, 3)]);
        let reader = CountingReader::new(FileIndexReader::new());

        fn visit<R: IndexReader>(reader: &R, path: &Path) -> Result<()> {
            let _index = ScopedIndex::open(reader, path)?;
            Err(InspectError::corrupt_index(path, "simulated failure"))
        }

        assert!(visit(&reader, &path).is_err());
        assert_eq!(reader.opens(), 1);
        assert_eq!(reader.closes(), 1);
    }

    #[test]
    fn test_failed_open_is_not_closed() {
        let dir = TempDir::new().unwrap();
        let reader = CountingReader::new(FileIndexReader::new());
        assert!(ScopedIndex::open(&reader, &dir.path().join("absent.ncx")).is_err());
        assert_eq!(reader.closes(), 0);
    }

    #[test]
    fn test_read_records_checks_record_count() {
        let dir = TempDir::new().unwrap();
        let path = leaf_fixture(dir.path(), "leaf", &[("X", 1, 4)]);
        let reader = FileIndexReader::new();
        let index = reader.open(&path).unwrap();

        let mut variable = index.analyzed_variables(false).next().unwrap().clone();
        assert_eq!(reader.read_records(&index, &variable).unwrap().len(), 4);

        variable.nrecords = 5;
        assert!(matches!(
            reader.read_records(&index, &variable),
            Err(InspectError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_index_without_record_section() {
        use crate::collection::{CollectionKind, FileTable};
        let index = CollectionIndex::new("/x.ncx", "x", CollectionKind::Leaf, Vec::new(), FileTable::default(), Vec::new());
        let variable = VariableIndex {
            fingerprint: crate::identifiers::Fingerprint::new(1),
            name: "X".into(),
            nrecords: 0,
            ndups: 0,
            nmissing: 0,
            records: Default::default(),
        };
        assert!(FileIndexReader::new().read_records(&index, &variable).is_err());
    }
}
