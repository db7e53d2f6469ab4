//! Operation API using the ApiThing pattern
//!
//! A single [`InspectContext`] carries configuration and cached state; each
//! operation takes its own parameter object.

pub mod context;
pub mod operations;
pub mod parameters;

pub use apithing::ApiOperation;
pub use context::InspectContext;
pub use operations::{CollectTotals, RunMisplacedFieldsReport, ScanDuplicates, SummarizeIndex};
pub use parameters::{
    CollectTotalsParams, RunMisplacedFieldsReportParams, RunMisplacedFieldsReportParamsBuilder, ScanDuplicatesParams,
    SummarizeIndexParams,
};
