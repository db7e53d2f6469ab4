//! Report events and text layout
//!
//! Walkers and scanners describe what they found as structured
//! [`ReportEvent`]s sent to a [`ReportSink`]. [`ReportFormatter`] is the only
//! place that turns those events into text; it produces a [`Report`], an
//! ordered list of lines plus named totals.

use crate::collection::{CollectionKind, DatasetKind};
use crate::detector::MisplacedRecord;
use crate::error::InspectError;
use crate::identifiers::Fingerprint;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Something worth reporting, found during a traversal
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    /// The root of a traversal was opened
    IndexEntered {
        name: String,
        kind: CollectionKind,
        path: PathBuf,
        depth: usize,
    },
    /// A child partition was resolved; `exists` is false when its index file is missing
    PartitionVisited {
        name: String,
        path: PathBuf,
        exists: bool,
        depth: usize,
    },
    /// Collection-wide total of one fingerprint after pass 1
    VariableTotal {
        name: String,
        fingerprint: Fingerprint,
        total: u64,
        occurrences: u32,
        dominant: bool,
        depth: usize,
    },
    /// Misplaced record total of one leaf
    LeafSummary { misplaced: u64, depth: usize },
    /// A non-dominant variable found in a leaf
    MisplacedVariable {
        name: String,
        fingerprint: Fingerprint,
        count: u64,
        collection_total: u64,
        depth: usize,
    },
    MisplacedRecord { record: MisplacedRecord, depth: usize },
    /// Record detail was cut short by the configured cap
    RecordsElided { remaining: u64, depth: usize },
    /// Duplicate message references found in one leaf
    LeafDuplicates { duplicates: u64, records: u64, depth: usize },
    DatasetEntered { kind: DatasetKind, depth: usize },
    GroupEntered { description: String, depth: usize },
    VariableStats {
        name: String,
        nrecords: u64,
        ndups: u64,
        nmissing: u64,
        depth: usize,
    },
    GroupTotals {
        nrecords: u64,
        ndups: u64,
        nmissing: u64,
        depth: usize,
    },
    FileEntry { fileno: u32, name: String, depth: usize },
    /// Header of one dumped sparse record array
    SparseArrayInfo {
        name: String,
        fingerprint: Fingerprint,
        shape: Vec<u32>,
        cells: u64,
        nrecords: u64,
        ndups: u64,
        nmissing: u64,
        depth: usize,
    },
    /// One cell of a dumped sparse array; `record` is `None` for a missing cell
    SparseCell {
        coords: Vec<u32>,
        record: Option<(String, u64)>,
        depth: usize,
    },
    /// A recoverable failure that did not stop the traversal
    Diagnostic {
        path: PathBuf,
        kind: &'static str,
        message: String,
        depth: usize,
    },
}

impl ReportEvent {
    /// Build a diagnostic event from a recoverable error
    pub fn diagnostic(path: &Path, error: &InspectError, depth: usize) -> Self {
        Self::Diagnostic {
            path: path.to_path_buf(),
            kind: error.kind_label(),
            message: error.to_string(),
            depth,
        }
    }
}

/// Receiver of report output
pub trait ReportSink {
    /// Start a new titled section
    fn section(&mut self, title: &str);

    fn event(&mut self, event: ReportEvent);

    /// Record a named total
    fn total(&mut self, name: &str, count: u64);
}

/// A diagnostic as it appears in the finished report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEntry {
    pub path: PathBuf,
    pub kind: String,
    pub message: String,
}

/// Finished, ordered report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub lines: Vec<String>,
    pub totals: IndexMap<String, u64>,
    pub diagnostics: Vec<DiagnosticEntry>,
}

impl Report {
    /// Join the lines into one newline-terminated string
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn total(&self, name: &str) -> Option<u64> {
        self.totals.get(name).copied()
    }

    /// Lines containing `needle`, for quick inspection
    pub fn lines_containing<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = &'a str> {
        self.lines.iter().map(String::as_str).filter(move |line| line.contains(needle))
    }
}

/// Text layout of report events
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    indent_width: usize,
    report: Report,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_INDENT_WIDTH)
    }
}

impl ReportFormatter {
    pub fn new(indent_width: usize) -> Self {
        Self {
            indent_width,
            report: Report::default(),
        }
    }

    /// Append one line at the given depth
    pub fn line(&mut self, indent: usize, text: impl AsRef<str>) {
        let pad = indent * self.indent_width;
        self.report.lines.push(format!("{:pad$}{}", "", text.as_ref(), pad = pad));
    }

    pub fn finish(self) -> Report {
        self.report
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    part as f64 / whole.max(1) as f64
}

impl ReportSink for ReportFormatter {
    fn section(&mut self, title: &str) {
        if !self.report.lines.is_empty() {
            self.report.lines.push(String::new());
        }
        self.report.lines.push(format!("== {} ==", title));
    }

    fn event(&mut self, event: ReportEvent) {
        match event {
            ReportEvent::IndexEntered { name, kind, path, depth } => {
                self.line(depth, format!("{} ({}) {}", name, kind, path.display()));
            }
            ReportEvent::PartitionVisited {
                name,
                path,
                exists,
                depth,
            } => {
                let status = if exists { "exists" } else { "NOT EXIST" };
                self.line(depth, format!("partition {} {} {}", name, path.display(), status));
            }
            ReportEvent::VariableTotal {
                name,
                fingerprint,
                total,
                occurrences,
                dominant,
                depth,
            } => {
                let status = if dominant { "dominant" } else { "not dominant" };
                self.line(
                    depth,
                    format!("{} {} total={} occurrences={} {}", name, fingerprint, total, occurrences, status),
                );
            }
            ReportEvent::LeafSummary { misplaced, depth } => {
                if misplaced == 0 {
                    self.line(depth, "misplaced: none");
                } else {
                    self.line(depth, format!("misplaced: {}", misplaced));
                }
            }
            ReportEvent::MisplacedVariable {
                name,
                fingerprint,
                count,
                collection_total,
                depth,
            } => {
                self.line(
                    depth,
                    format!(
                        "{} {} misplaced={} collection_total={}",
                        name, fingerprint, count, collection_total
                    ),
                );
            }
            ReportEvent::MisplacedRecord { record, depth } => {
                self.line(depth, format!("{} {}", record.filename, record.pos));
            }
            ReportEvent::RecordsElided { remaining, depth } => {
                self.line(depth, format!("... {} more", remaining));
            }
            ReportEvent::LeafDuplicates {
                duplicates,
                records,
                depth,
            } => {
                self.line(depth, format!("duplicates = {} / {}", duplicates, records));
            }
            ReportEvent::DatasetEntered { kind, depth } => {
                let derived = if kind.is_derived() { " (derived)" } else { "" };
                self.line(depth, format!("Dataset {}{}", kind, derived));
            }
            ReportEvent::GroupEntered { description, depth } => {
                self.line(depth, format!("Group {}", description));
            }
            ReportEvent::VariableStats {
                name,
                nrecords,
                ndups,
                nmissing,
                depth,
            } => {
                self.line(
                    depth,
                    format!("{} nrecords={} ndups={} nmissing={}", name, nrecords, ndups, nmissing),
                );
            }
            ReportEvent::GroupTotals {
                nrecords,
                ndups,
                nmissing,
                depth,
            } => {
                self.line(
                    depth,
                    format!(
                        "Group total nrecords={}, ndups={} ({:.6}), nmiss={} ({:.6})",
                        nrecords,
                        ndups,
                        ratio(ndups, nrecords),
                        nmissing,
                        ratio(nmissing, nrecords)
                    ),
                );
            }
            ReportEvent::FileEntry { fileno, name, depth } => {
                self.line(depth, format!("{}: {}", fileno, name));
            }
            ReportEvent::SparseArrayInfo {
                name,
                fingerprint,
                shape,
                cells,
                nrecords,
                ndups,
                nmissing,
                depth,
            } => {
                self.line(
                    depth,
                    format!(
                        "{} {} shape={:?} cells={} nrecords={} ndups={} nmissing={} ({:.6})",
                        name,
                        fingerprint,
                        shape,
                        cells,
                        nrecords,
                        ndups,
                        nmissing,
                        ratio(nmissing, cells)
                    ),
                );
            }
            ReportEvent::SparseCell { coords, record, depth } => match record {
                Some((filename, pos)) => self.line(depth, format!("{:?} {} {}", coords, filename, pos)),
                None => self.line(depth, format!("{:?} missing", coords)),
            },
            ReportEvent::Diagnostic {
                path,
                kind,
                message,
                depth,
            } => {
                self.line(depth, format!("ERROR [{}] {}", kind, message));
                self.report.diagnostics.push(DiagnosticEntry {
                    path,
                    kind: kind.to_string(),
                    message,
                });
            }
        }
    }

    fn total(&mut self, name: &str, count: u64) {
        self.report.lines.push(format!("total {} = {}", name, count));
        self.report.totals.insert(name.to_string(), count);
    }
}
