//! InspectContext - Central context object for the operation API
//!
//! The context carries the inspection configuration shared by every
//! operation and keeps the sealed registry of the most recent pass 1, so a
//! caller can query collection-wide totals after running a report.
//!
//! # Usage Examples
//!
//! ```rust
//! use ncx_inspect::api::InspectContext;
//! use ncx_inspect::InspectorConfig;
//!
//! let context = InspectContext::new();
//! assert!(context.registry().is_none());
//! assert_eq!(context.config().dominance_threshold, 1000);
//!
//! let mut context = InspectContext::with_config(InspectorConfig::new().dominance_threshold(10));
//! context
//!     .update_config(InspectorConfig::new().indent_width(4))
//!     .expect("valid config");
//! assert_eq!(context.config().indent_width, 4);
//! ```

use crate::config::InspectorConfig;
use crate::registry::VariableRegistry;
use crate::Result;
use std::path::{Path, PathBuf};

/// Registry sealed by the most recent pass 1 run through the context
#[derive(Debug, Clone)]
struct CachedRegistry {
    root: PathBuf,
    registry: VariableRegistry,
}

/// Shared state for API operations
#[derive(Debug, Clone, Default)]
pub struct InspectContext {
    config: InspectorConfig,
    last_registry: Option<CachedRegistry>,
}

impl InspectContext {
    /// Create a context with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: InspectorConfig) -> Self {
        Self {
            config,
            last_registry: None,
        }
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    /// Replace the configuration after validating it
    ///
    /// A cached registry is dropped because it was sealed with the old
    /// threshold.
    pub fn update_config(&mut self, config: InspectorConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.last_registry = None;
        Ok(())
    }

    /// Registry sealed by the most recent pass 1, if any
    pub fn registry(&self) -> Option<&VariableRegistry> {
        self.last_registry.as_ref().map(|cached| &cached.registry)
    }

    /// Root index the cached registry was collected from
    pub fn registry_root(&self) -> Option<&Path> {
        self.last_registry.as_ref().map(|cached| cached.root.as_path())
    }

    pub fn clear_registry(&mut self) {
        self.last_registry = None;
    }

    pub(crate) fn store_registry(&mut self, root: &Path, registry: VariableRegistry) {
        self.last_registry = Some(CachedRegistry {
            root: root.to_path_buf(),
            registry,
        });
    }
}
