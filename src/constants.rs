//! Central constants for the index file format and inspection defaults
//!
//! This module is the single source of truth for magic numbers, format
//! versions, and default policy values.

/// File format magic numbers used for file type identification
pub mod magic {
    /// Collection index file magic bytes
    pub const COLLECTION_INDEX: &[u8; 4] = b"NCXI";

    /// Sparse record array blob magic bytes
    pub const SPARSE_ARRAY: &[u8; 4] = b"SPAR";

    /// Corruption testing magic bytes
    #[cfg(test)]
    pub const TEST_CORRUPTION: &[u8; 4] = b"XXXX";
}

/// Index format versions
pub mod version {
    /// Current index format version written by `IndexWriter`
    pub const CURRENT: u32 = 1;

    /// Oldest index format version the reader accepts
    pub const MIN_SUPPORTED: u32 = 1;
}

/// Default record-count threshold above which a fingerprint is dominant
pub const DEFAULT_DOMINANCE_THRESHOLD: u64 = 1000;

/// Default number of spaces per report indent level
pub const DEFAULT_INDENT_WIDTH: usize = 2;

/// Alignment of every section inside an index file
pub const SECTION_ALIGNMENT: usize = 8;

/// Partition nesting beyond this depth is treated as a cyclic or corrupt tree
pub const MAX_PARTITION_DEPTH: usize = 32;
