//! JSON output

use crate::config::OutputFormat;
use crate::crawler::PageResult;
use crate::output::traits::{ensure_parent_dir, RecordSink};
use crate::OutputResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes records as a pretty-printed JSON array
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSink for JsonSink {
    fn write(&self, pages: &[PageResult]) -> OutputResult<()> {
        if pages.is_empty() {
            tracing::warn!(path = %self.path.display(), "No data to save");
            return Ok(());
        }

        ensure_parent_dir(&self.path)?;

        let records: Vec<_> = pages.iter().map(|page| &page.record).collect();
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, &records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::info!(
            path = %self.path.display(),
            records = records.len(),
            "Saved JSON output"
        );
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}
