//! ncx-inspect - Consistency checks for partitioned collection indexes
//!
//! A collection index (`.ncx`) catalogs the records of a set of gridded data
//! files. Large collections are split into partitions, each with its own
//! index, arranged in a tree whose leaves hold the record arrays. When a
//! variable that is dense across the whole collection shows up only sparsely
//! in some leaf, those records usually landed in the wrong partition.
//!
//! The misplaced fields report finds them in two passes: pass 1 totals every
//! variable across all leaves, pass 2 lists the records of every variable
//! whose collection-wide total does not exceed the dominance threshold.

pub mod api;
pub mod collection;
pub mod config;
pub mod constants;
pub mod detector;
pub mod duplicates;
pub mod error;
pub mod identifiers;
pub mod inspector;
pub mod layout;
pub mod memory;
pub mod reader;
pub mod registry;
pub mod report;
pub mod structures;
pub mod summary;
pub mod walker;

#[cfg(test)]
pub mod test_utils;

pub use collection::{CollectionIndex, CollectionKind, Dataset, DatasetKind, FileTable, Group, Partition, VariableIndex};
pub use config::InspectorConfig;
pub use detector::{classify_variable, locate_records, Classification, MisplacedRecord};
pub use duplicates::DuplicateTotals;
pub use error::InspectError;
pub use identifiers::Fingerprint;
pub use inspector::{run_misplaced_fields_report, Inspector};
pub use layout::{open_index_file, resolve_partition_path, IndexWriter, ResolvedPartition};
pub use memory::{IndexHeader, MemoryMappedFile};
pub use reader::{FileIndexReader, IndexReader, ScopedIndex};
pub use registry::{RegistryPhase, VarAggregate, VariableRegistry};
pub use report::{DiagnosticEntry, Report, ReportEvent, ReportFormatter, ReportSink};
pub use structures::{Record, SparseArray, SparseArrayLocation};
pub use summary::{summarize_index, SummaryTotals};
pub use walker::{CollectionTotals, LeafVisitor, MisplacedTotals, PartitionWalker};

/// Type alias for Results using InspectError
pub type Result<T> = std::result::Result<T, InspectError>;
