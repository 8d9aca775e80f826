use crate::analyzers::aggregate::aggregate_sheet;
use crate::analyzers::classify::classify_all;
use crate::analyzers::types::{ClassifiedSheet, ClassifyStats, ModeConfig, SummaryTable};
use crate::output::{TableSink, write_sheet};
use crate::parser::parse_sheet;
use crate::services::submission_source::SubmissionSource;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Which classes and assignments to aggregate.
///
/// An empty class list means every class in the sheet; `all_assignments`
/// takes every assignment in the sheet instead of `assignments`.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub classes: Vec<String>,
    pub assignments: Vec<String>,
    pub all_assignments: bool,
}

/// Classes and assignment titles present in a sheet, sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Targets {
    pub rule: String,
    pub classes: Vec<String>,
    pub assignments: Vec<String>,
}

impl Targets {
    pub fn from_sheet(sheet: &ClassifiedSheet) -> Self {
        let rows = || sheet.rows.iter().map(|r| &r.record);
        Self {
            rule: sheet.flag_header_label.clone(),
            classes: distinct(rows().map(|r| r.course_name.as_str())),
            assignments: distinct(rows().map(|r| r.assignment_title.as_str())),
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Selection {
    /// Fills in defaults from the sheet and checks both lists are non-empty.
    pub fn resolve(&self, targets: &Targets) -> Result<(Vec<String>, Vec<String>)> {
        let classes = if self.classes.is_empty() {
            targets.classes.clone()
        } else {
            self.classes.clone()
        };
        let assignments = if self.all_assignments {
            targets.assignments.clone()
        } else {
            self.assignments.clone()
        };

        if classes.is_empty() || assignments.is_empty() {
            bail!("select at least one class and one assignment");
        }
        Ok((classes, assignments))
    }
}

/// Loads the assignment sheet at `path`.
pub fn load_sheet(path: &Path) -> Result<ClassifiedSheet> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read assignment sheet {}", path.display()))?;
    parse_sheet(&bytes)
}

/// Pulls every submission from `source`, classifies it under `config` and
/// writes the assignment sheet to `sheet_path`.
///
/// Nothing is written when the source is empty.
#[tracing::instrument(skip_all, fields(origin = %source.describe(), mode = ?config.mode))]
pub async fn classify_source(
    source: &dyn SubmissionSource,
    config: &ModeConfig,
    sheet_path: &Path,
) -> Result<ClassifyStats> {
    let records = source.fetch_submissions().await?;
    if records.is_empty() {
        bail!("no submissions found in {}", source.describe());
    }

    let (rows, stats) = classify_all(records, config);
    write_sheet(sheet_path, &rows, config)?;

    info!(
        rows = stats.rows,
        unsubmitted = stats.unsubmitted,
        high = stats.high,
        mid = stats.mid,
        low = stats.low,
        sheet = %sheet_path.display(),
        "Classification complete"
    );
    Ok(stats)
}

/// Aggregates the sheet at `sheet_path` and hands the table to `sink`.
///
/// The sink is only called when aggregation succeeds, so a failed run never
/// leaves a partial summary behind.
#[tracing::instrument(skip_all, fields(sheet = %sheet_path.display()))]
pub fn summarize_sheet(
    sheet_path: &Path,
    selection: &Selection,
    sink: &mut dyn TableSink,
) -> Result<SummaryTable> {
    let sheet = load_sheet(sheet_path)?;
    let targets = Targets::from_sheet(&sheet);
    let (classes, assignments) = selection.resolve(&targets)?;

    info!(
        rule = %sheet.flag_header_label,
        classes = classes.len(),
        assignments = assignments.len(),
        "Starting aggregation"
    );

    let table = aggregate_sheet(&sheet, &classes, &assignments)?;
    sink.write_table(&table)?;

    info!(students = table.students.len(), "Aggregation complete");
    Ok(table)
}
