//! Output formatting and persistence for assignment sheets and summaries.
//!
//! Supports the classified assignment sheet (CSV) and summary tables through
//! the [`TableSink`] port, with CSV and JSON implementations.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use csv::WriterBuilder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::types::{ClassifiedSubmission, ModeConfig, SummaryDocument, SummaryTable};
use crate::analyzers::utility::format_number;
use crate::parser::TIER_HEADER;

/// Suffix every summary output name carries.
pub const SUMMARY_SUFFIX: &str = "_summary";

/// Receives a finished summary table. Only called when aggregation succeeded.
pub trait TableSink {
    fn write_table(&mut self, table: &SummaryTable) -> Result<()>;
}

/// Writes the summary as CSV: header row, then one row per student.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TableSink for CsvSink {
    fn write_table(&mut self, table: &SummaryTable) -> Result<()> {
        let file = create_file(&self.path)?;
        let mut writer = WriterBuilder::new().from_writer(file);

        writer.write_record(table.headers())?;
        for row in table.rows() {
            writer.write_record(row.iter().map(|c| c.to_string()))?;
        }
        writer.flush()?;

        info!(path = %self.path.display(), students = table.students.len(), "Summary written");
        Ok(())
    }
}

/// Writes the summary as a JSON document with the rule label and rate columns.
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TableSink for JsonSink {
    fn write_table(&mut self, table: &SummaryTable) -> Result<()> {
        let doc = SummaryDocument {
            generated_at: Utc::now(),
            rule: &table.rule,
            headers: table.headers(),
            rate_columns: table.rate_columns(),
            rows: table.rows(),
        };
        let file = create_file(&self.path)?;
        serde_json::to_writer_pretty(file, &doc)?;

        info!(path = %self.path.display(), students = table.students.len(), "Summary written");
        Ok(())
    }
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

/// Appends the `_summary` suffix to `name` unless it is already there.
pub fn summary_name(name: &str) -> String {
    if name.ends_with(SUMMARY_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{SUMMARY_SUFFIX}")
    }
}

/// Refuses to touch an existing file unless `force` is set.
pub fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    Ok(())
}

/// Column headers of the assignment sheet for a given flag label.
pub fn sheet_headers(flag_header_label: &str) -> Vec<String> {
    [
        "ID",
        "Email",
        "Student name",
        "Course name",
        "Assignment title",
        "Submission state",
        "Score",
        "MaxPoints",
        flag_header_label,
        TIER_HEADER,
        "Course ID",
        "CourseWork ID",
        "Submission ID",
        "Student ID",
        "Topic name",
        "Topic ID",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect()
}

/// Writes classified rows as the assignment sheet, replacing any existing file.
pub fn write_sheet(path: &Path, rows: &[ClassifiedSubmission], config: &ModeConfig) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing assignment sheet");

    let file = create_file(path)?;
    let mut writer = WriterBuilder::new().from_writer(file);
    writer.write_record(sheet_headers(&config.flag_header_label))?;

    let optional = |v: Option<f64>| v.map(format_number).unwrap_or_default();

    for (i, row) in rows.iter().enumerate() {
        let r = &row.record;
        writer.write_record([
            (i + 1).to_string(),
            r.student_email.clone(),
            r.student_name.clone(),
            r.course_name.clone(),
            r.assignment_title.clone(),
            r.submission_state.clone(),
            optional(r.score),
            optional(r.max_points),
            format_number(row.flag),
            row.tier.map(|t| t.to_string()).unwrap_or_default(),
            r.course_id.clone(),
            r.course_work_id.clone(),
            r.submission_id.clone(),
            r.student_id.clone(),
            r.topic_name.clone(),
            r.topic_id.clone(),
        ])?;
    }
    writer.flush()?;

    Ok(())
}

/// Logs a summary table using Rust's debug pretty-print format.
pub fn print_pretty(table: &SummaryTable) {
    debug!("{:#?}", table);
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
