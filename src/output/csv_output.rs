//! CSV output
//!
//! Records become rows. The header is the union of every record's field
//! names in first-seen order; a field a record lacks, or an unmatched
//! single field, becomes an empty cell. Multi-valued fields are joined
//! into one cell with `"; "`.

use crate::config::OutputFormat;
use crate::crawler::{FieldValue, PageResult, Record};
use crate::output::traits::{ensure_parent_dir, RecordSink};
use crate::OutputResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Byte order mark so spreadsheet tools detect UTF-8
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Separator for multi-valued cells
const LIST_SEPARATOR: &str = "; ";

/// Writes records as CSV rows
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Field names across all records, in first-seen order
fn header_fields<'a>(records: impl Iterator<Item = &'a Record>) -> Vec<&'a str> {
    let mut fields: Vec<&str> = Vec::new();
    for record in records {
        for name in record.field_names() {
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
    }
    fields
}

fn cell(value: Option<&FieldValue>) -> String {
    match value {
        None | Some(FieldValue::Missing) => String::new(),
        Some(FieldValue::Single(value)) => value.clone(),
        Some(FieldValue::Multiple(values)) => values.join(LIST_SEPARATOR),
    }
}

impl RecordSink for CsvSink {
    fn write(&self, pages: &[PageResult]) -> OutputResult<()> {
        if pages.is_empty() {
            tracing::warn!(path = %self.path.display(), "No data to save");
            return Ok(());
        }

        ensure_parent_dir(&self.path)?;

        let header = header_fields(pages.iter().map(|page| &page.record));

        let mut file = BufWriter::new(File::create(&self.path)?);
        file.write_all(UTF8_BOM)?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(&header)?;
        for page in pages {
            let row: Vec<String> = header
                .iter()
                .map(|field| cell(page.record.get(field)))
                .collect();
            writer.write_record(&row)?;
        }
        writer.flush()?;

        tracing::info!(
            path = %self.path.display(),
            records = pages.len(),
            columns = header.len(),
            "Saved CSV output"
        );
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }
}
