//! Tab-separated CSV emission alongside the index.
//!
//! The header is the canonical header, then the default misc fields, then
//! the assertion/meta columns, then the sampled layer names, in that
//! order. Multi-values are pipe-joined inside a cell. The sensitive
//! variant omits a caller-supplied set of column names.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use crate::error::PipelineError;
use crate::header::HeaderField;

/// Assertion and meta columns appended after the misc fields.
const META_COLUMNS: &[&str] = &[
    "assertions",
    "assertions_passed",
    "assertions_missing",
    "assertions_unchecked",
    "system_assertions",
    "species_group",
    "species_subgroup",
    "species_list_uid",
    "suitable_modelling",
    "batch_id_s",
];

/// Emission column order: canonical header + misc fields + assertion/meta
/// columns + sampled layer names.
pub fn csv_columns(
    header: &[HeaderField],
    misc_fields: &[String],
    sample_fields: &[String],
) -> Vec<String> {
    let mut columns: Vec<String> = vec!["id".to_string(), "row_key".to_string()];
    columns.extend(header.iter().map(|f| f.index_name.to_string()));
    columns.extend(misc_fields.iter().cloned());
    columns.extend(META_COLUMNS.iter().map(|c| c.to_string()));
    columns.extend(sample_fields.iter().cloned());
    columns
}

/// Appends one row per indexed document to a writer.
pub struct CsvEmitter {
    writer: csv::Writer<Box<dyn Write + Send>>,
    columns: Vec<String>,
}

impl CsvEmitter {
    /// Create an emitter and write the header row. `exclude` drops columns
    /// entirely (the sensitive-exclusion variant).
    pub fn new(
        out: Box<dyn Write + Send>,
        columns: Vec<String>,
        exclude: &HashSet<String>,
    ) -> Result<Self, PipelineError> {
        let columns: Vec<String> = columns
            .into_iter()
            .filter(|c| !exclude.contains(c))
            .collect();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(out);
        writer.write_record(&columns)?;
        Ok(Self { writer, columns })
    }

    /// Append one document row; multi-values are pipe-joined.
    pub fn append(&mut self, row: &HashMap<String, Vec<String>>) -> Result<(), PipelineError> {
        let record: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                row.get(column)
                    .map(|values| values.join("|"))
                    .unwrap_or_default()
            })
            .collect();
        self.writer.write_record(&record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}
