//! Inspection operations using the ApiThing pattern
//!
//! Each operation pairs an [`InspectContext`] with a parameter struct.
//! Settings the parameters leave unset come from the context configuration.
//!
//! # Operations
//!
//! - [`CollectTotals`]: Pass 1 only; seals a registry and caches it in the context
//! - [`RunMisplacedFieldsReport`]: Both passes rendered as a [`Report`]
//! - [`SummarizeIndex`]: Dataset, group and file summary of one index
//! - [`ScanDuplicates`]: Duplicate message references per leaf
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use ncx_inspect::api::{InspectContext, RunMisplacedFieldsReportParams};
//! use ncx_inspect::api::operations::RunMisplacedFieldsReport;
//! use apithing::ApiOperation;
//!
//! let mut context = InspectContext::new();
//! let params = RunMisplacedFieldsReportParams::builder()
//!     .root("/data/gfs/gfs.ncx")
//!     .threshold(500)
//!     .build()?;
//!
//! let report = RunMisplacedFieldsReport::execute(&mut context, &params)?;
//! print!("{}", report.render());
//! assert!(context.registry().is_some());
//! # Ok::<(), ncx_inspect::error::InspectError>(())
//! ```

use crate::api::context::InspectContext;
use crate::api::parameters::{
    CollectTotalsParams, RunMisplacedFieldsReportParams, ScanDuplicatesParams, SummarizeIndexParams,
};
use crate::error::InspectError;
use crate::inspector::Inspector;
use crate::report::Report;
use crate::walker::CollectionTotals;
use apithing::ApiOperation;

/// Run pass 1 over a tree and cache the sealed registry in the context
///
/// Dominance is decided with the parameter threshold when given, otherwise
/// with the context configuration.
///
/// # Example
///
/// ```rust,no_run
/// use ncx_inspect::api::{CollectTotalsParams, InspectContext};
/// use ncx_inspect::api::operations::CollectTotals;
/// use apithing::ApiOperation;
///
/// let mut context = InspectContext::new();
/// let params = CollectTotalsParams::new("/data/gfs/gfs.ncx")?.with_threshold(100);
/// let totals = CollectTotals::execute(&mut context, &params)?;
/// println!("{} leaves", totals.leaves_visited);
/// # Ok::<(), ncx_inspect::error::InspectError>(())
/// ```
pub struct CollectTotals;

/// Run both passes and render the misplaced fields report
///
/// The registry built by pass 1 is cached in the context, replacing any
/// earlier one.
pub struct RunMisplacedFieldsReport;

/// Summarize the datasets, groups and files of a single index
pub struct SummarizeIndex;

/// Count duplicate message references in every leaf of a tree
pub struct ScanDuplicates;

impl ApiOperation<InspectContext, CollectTotalsParams> for CollectTotals {
    type Output = CollectionTotals;
    type Error = InspectError;

    fn execute(context: &mut InspectContext, parameters: &CollectTotalsParams) -> Result<Self::Output, Self::Error> {
        parameters.validate()?;

        let inspector = Inspector::new(parameters.effective_config(context.config()))?;
        let (registry, totals) = inspector.build_registry(&parameters.root)?;
        context.store_registry(&parameters.root, registry);
        Ok(totals)
    }
}

impl ApiOperation<InspectContext, RunMisplacedFieldsReportParams> for RunMisplacedFieldsReport {
    type Output = Report;
    type Error = InspectError;

    fn execute(
        context: &mut InspectContext,
        parameters: &RunMisplacedFieldsReportParams,
    ) -> Result<Self::Output, Self::Error> {
        parameters.validate()?;

        let inspector = Inspector::new(parameters.effective_config(context.config()))?;
        // Always a fresh pass 1; a cached registry may describe an older tree
        let (registry, _) = inspector.build_registry(&parameters.root)?;
        let report = inspector.report_misplaced(&parameters.root, &registry)?;
        context.store_registry(&parameters.root, registry);
        Ok(report)
    }
}

impl ApiOperation<InspectContext, SummarizeIndexParams> for SummarizeIndex {
    type Output = Report;
    type Error = InspectError;

    fn execute(context: &mut InspectContext, parameters: &SummarizeIndexParams) -> Result<Self::Output, Self::Error> {
        parameters.validate()?;
        Inspector::new(context.config().clone())?
            .summarize_with_records(&parameters.index_path, parameters.records.as_deref())
    }
}

impl ApiOperation<InspectContext, ScanDuplicatesParams> for ScanDuplicates {
    type Output = Report;
    type Error = InspectError;

    fn execute(context: &mut InspectContext, parameters: &ScanDuplicatesParams) -> Result<Self::Output, Self::Error> {
        parameters.validate()?;
        Inspector::new(context.config().clone())?.scan_duplicates(&parameters.root)
    }
}
