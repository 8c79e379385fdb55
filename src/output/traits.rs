//! Output sink trait
//!
//! This module defines the interface every output format implements.

use crate::config::OutputFormat;
use crate::crawler::PageResult;
use crate::OutputResult;
use std::path::Path;

/// Trait for record sinks
///
/// A sink persists the records of one run. Implementations must be
/// thread-safe so a sink can be shared with a cancellation handler.
pub trait RecordSink: Send + Sync {
    /// Writes the records of `pages` in page order
    ///
    /// An empty slice writes nothing and leaves any existing file alone.
    ///
    /// # Arguments
    ///
    /// * `pages` - The committed pages of a run
    fn write(&self, pages: &[PageResult]) -> OutputResult<()>;

    /// The file this sink writes to
    fn path(&self) -> &Path;

    /// The serialization format
    fn format(&self) -> OutputFormat;
}

/// Creates the parent directories of `path`, if any
pub(crate) fn ensure_parent_dir(path: &Path) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

