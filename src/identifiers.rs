//! Identifier types for inspected indices
//!
//! This module provides type-safe wrappers for the identifiers stored in
//! collection indices so that fingerprints cannot be mixed up with record
//! counts or file numbers.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Stable hash identifying a logical variable across partitions
///
/// Two variable indices in different partition files that describe the same
/// logical variable (same canonical name and coordinate structure) carry the
/// same fingerprint, independent of which data file holds their records.
/// Fingerprints are computed when an index is built and only read here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u32);

impl Fingerprint {
    /// Wrap a raw fingerprint value read from an index
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 value
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
