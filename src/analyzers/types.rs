//! Data types used by the classification and aggregation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::analyzers::utility::format_number;

/// A single row deserialized from a submissions CSV (raw export or assignment sheet).
///
/// Column names follow the assignment sheet layout; any extra columns such as
/// the flag or tier are ignored here.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubmissionRow {
    #[serde(rename = "Email", default)]
    pub email: String,
    #[serde(rename = "Student name", default)]
    pub student_name: String,
    #[serde(rename = "Course name", default)]
    pub course_name: String,
    #[serde(rename = "Assignment title", default)]
    pub assignment_title: String,
    #[serde(rename = "Submission state", default)]
    pub submission_state: String,
    #[serde(rename = "Score", default, deserialize_with = "finite_number")]
    pub score: Option<f64>,
    #[serde(rename = "MaxPoints", default, deserialize_with = "finite_number")]
    pub max_points: Option<f64>,
    #[serde(rename = "Course ID", default)]
    pub course_id: String,
    #[serde(rename = "CourseWork ID", default)]
    pub course_work_id: String,
    #[serde(rename = "Submission ID", default)]
    pub submission_id: String,
    #[serde(rename = "Student ID", default)]
    pub student_id: String,
    #[serde(rename = "Topic name", default)]
    pub topic_name: String,
    #[serde(rename = "Topic ID", default)]
    pub topic_id: String,
}

/// Reads a numeric cell; blank, unreadable, `NaN` and infinite values are absent.
fn finite_number<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    let value: Option<f64> = csv::invalid_option(de)?;
    Ok(value.filter(|v| v.is_finite()))
}

/// One student's submission for one assignment.
///
/// `unsubmitted` is fixed at ingestion: a missing score and a score of exactly
/// zero are the same thing downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    pub student_email: String,
    pub student_name: String,
    pub course_name: String,
    pub assignment_title: String,
    pub submission_state: String,
    pub score: Option<f64>,
    pub max_points: Option<f64>,
    pub unsubmitted: bool,

    // passthrough identifiers
    pub course_id: String,
    pub course_work_id: String,
    pub submission_id: String,
    pub student_id: String,
    pub topic_name: String,
    pub topic_id: String,
}

impl From<SubmissionRow> for SubmissionRecord {
    fn from(row: SubmissionRow) -> Self {
        let unsubmitted = row.score.is_none() || row.score == Some(0.0);
        Self {
            student_email: row.email,
            student_name: row.student_name,
            course_name: row.course_name,
            assignment_title: row.assignment_title,
            submission_state: row.submission_state,
            score: row.score,
            max_points: row.max_points,
            unsubmitted,
            course_id: row.course_id,
            course_work_id: row.course_work_id,
            submission_id: row.submission_id,
            student_id: row.student_id,
            topic_name: row.topic_name,
            topic_id: row.topic_id,
        }
    }
}

/// Scoring policy that maps a raw score to a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoreMode {
    #[default]
    ThreeStep,
    Binary,
    Custom,
    Percentage,
    RawScore,
}

impl ScoreMode {
    /// Recovers the mode from a flag column header such as `Flag (素点)`.
    ///
    /// Only the substrings that drive full-score units are significant, so any
    /// unrecognised label falls back to one point per assignment (Binary).
    pub fn from_flag_header(label: &str) -> Self {
        if label.contains("素点") {
            ScoreMode::RawScore
        } else if label.contains("3段階カスタム") {
            ScoreMode::Custom
        } else if label.contains("3段階") {
            ScoreMode::ThreeStep
        } else if label.contains("割合") {
            ScoreMode::Percentage
        } else {
            ScoreMode::Binary
        }
    }

    /// Points one assigned assignment adds to a student's full score.
    pub fn full_score_unit(self, max_points: Option<f64>) -> f64 {
        match self {
            ScoreMode::RawScore => max_points.unwrap_or(0.0),
            ScoreMode::ThreeStep | ScoreMode::Custom => 2.0,
            ScoreMode::Binary | ScoreMode::Percentage => 1.0,
        }
    }
}

/// Thresholds for [`ScoreMode::Custom`]: `full` earns 2, `partial` earns 1.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomParams {
    pub full: f64,
    pub partial: f64,
}

/// Scoring mode selected for one run, plus the header label written above
/// the flag column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeConfig {
    pub mode: ScoreMode,
    pub params: Option<CustomParams>,
    pub flag_header_label: String,
}

impl ModeConfig {
    pub fn new(mode: ScoreMode, params: Option<CustomParams>) -> Self {
        let params = match mode {
            ScoreMode::Custom => Some(params.unwrap_or_default()),
            _ => None,
        };
        let flag_header_label = match (mode, params) {
            (ScoreMode::Binary, _) => "Flag (提出チェック)".to_string(),
            (ScoreMode::Custom, Some(p)) => format!(
                "Flag (3段階カスタム: {}/{})",
                format_number(p.full),
                format_number(p.partial)
            ),
            (ScoreMode::Percentage, _) => "Flag (割合)".to_string(),
            (ScoreMode::RawScore, _) => "Flag (素点)".to_string(),
            _ => "Flag (3段階評価)".to_string(),
        };
        Self {
            mode,
            params,
            flag_header_label,
        }
    }

    /// Human readable mode name as shown in the settings table.
    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            ScoreMode::ThreeStep => "3段階評価モード",
            ScoreMode::Binary => "提出チェックモード",
            ScoreMode::Custom => "3段階カスタムモード",
            ScoreMode::Percentage => "割合モード",
            ScoreMode::RawScore => "素点モード",
        }
    }
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self::new(ScoreMode::ThreeStep, None)
    }
}

/// Presentation tier of a classified submission (drives cell colouring in sinks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Mid,
    High,
}

impl Tier {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Tier::Low),
            "mid" => Some(Tier::Mid),
            "high" => Some(Tier::High),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Low => "low",
            Tier::Mid => "mid",
            Tier::High => "high",
        };
        f.write_str(s)
    }
}

/// Output of the classifier for one submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub flag: f64,
    pub tier: Tier,
}

/// A submission with its flag attached.
///
/// `tier` is `None` when the row was read back from a sheet without a tier column.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSubmission {
    pub record: SubmissionRecord,
    pub flag: f64,
    pub tier: Option<Tier>,
}

/// A classified assignment sheet: the flag column label plus its rows.
#[derive(Debug, Clone)]
pub struct ClassifiedSheet {
    pub flag_header_label: String,
    pub rows: Vec<ClassifiedSubmission>,
}

/// Row and tier counts for one classification run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifyStats {
    pub rows: usize,
    pub unsubmitted: usize,
    pub low: usize,
    pub mid: usize,
    pub high: usize,
}

/// Summary of one student over the target assignments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub name: String,
    pub class: String,
    pub email: String,
    pub total_score: f64,
    pub full_score: f64,
    pub score_rate: f64,
    pub missing_count: usize,
    pub assigned_count: usize,
    pub missing_rate: f64,
    /// Flag per target assignment, in column order; `None` means not assigned.
    pub flags: Vec<Option<f64>>,
}

/// A single output cell handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Count(usize),
}

impl Cell {
    /// Marker for an assignment the student was never given.
    pub const NOT_ASSIGNED: &'static str = ".";
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => f.write_str(&format_number(*n)),
            Cell::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Fixed summary columns, in output order, before the per-assignment columns.
pub const SUMMARY_HEADERS: [&str; 8] = [
    "Student name",
    "Class",
    "Email",
    "Total Score",
    "Full Score",
    "Score Rate",
    "Missing Count",
    "Missing Rate",
];

/// Number of fixed summary columns before the per-assignment columns.
pub const SUMMARY_COLUMNS: usize = SUMMARY_HEADERS.len();
/// Index of the `Score Rate` column.
pub const SCORE_RATE_COLUMN: usize = 5;
/// Index of the `Missing Rate` column.
pub const MISSING_RATE_COLUMN: usize = 7;

/// Complete aggregation result for one run, handed to a [`TableSink`](crate::output::TableSink).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    /// Flag label the table was computed under.
    pub rule: String,
    pub mode: ScoreMode,
    /// Target assignments, deduplicated and sorted; fixes column order.
    pub assignments: Vec<String>,
    pub students: Vec<StudentSummary>,
}

impl SummaryTable {
    pub fn headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = SUMMARY_HEADERS.iter().map(|h| h.to_string()).collect();
        headers.extend(self.assignments.iter().cloned());
        headers
    }

    pub fn rows(&self) -> Vec<Vec<Cell>> {
        self.students
            .iter()
            .map(|s| {
                let mut row = vec![
                    Cell::Text(s.name.clone()),
                    Cell::Text(s.class.clone()),
                    Cell::Text(s.email.clone()),
                    Cell::Number(s.total_score),
                    Cell::Number(s.full_score),
                    Cell::Number(s.score_rate),
                    Cell::Count(s.missing_count),
                    Cell::Number(s.missing_rate),
                ];
                row.extend(s.flags.iter().map(|flag| match flag {
                    Some(v) => Cell::Number(*v),
                    None => Cell::Text(Cell::NOT_ASSIGNED.to_string()),
                }));
                row
            })
            .collect()
    }

    /// Zero-based indexes of columns that should render as percentages.
    ///
    /// Always the score and missing rates; in Percentage mode every
    /// per-assignment column as well.
    pub fn rate_columns(&self) -> Vec<usize> {
        let mut cols = vec![SCORE_RATE_COLUMN, MISSING_RATE_COLUMN];
        if self.mode == ScoreMode::Percentage {
            cols.extend(SUMMARY_COLUMNS..SUMMARY_COLUMNS + self.assignments.len());
        }
        cols
    }
}

/// JSON document written by the JSON sink.
#[derive(Serialize)]
pub struct SummaryDocument<'a> {
    pub generated_at: DateTime<Utc>,
    pub rule: &'a str,
    pub headers: Vec<String>,
    pub rate_columns: Vec<usize>,
    pub rows: Vec<Vec<Cell>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsubmitted_is_fixed_at_ingestion() {
        let absent = SubmissionRecord::from(SubmissionRow::default());
        assert!(absent.unsubmitted);

        let zero = SubmissionRecord::from(SubmissionRow {
            score: Some(0.0),
            ..Default::default()
        });
        assert!(zero.unsubmitted);

        let scored = SubmissionRecord::from(SubmissionRow {
            score: Some(0.5),
            ..Default::default()
        });
        assert!(!scored.unsubmitted);
    }

    #[test]
    fn test_header_labels() {
        assert_eq!(ModeConfig::default().flag_header_label, "Flag (3段階評価)");
        assert_eq!(
            ModeConfig::new(ScoreMode::Binary, None).flag_header_label,
            "Flag (提出チェック)"
        );
        assert_eq!(
            ModeConfig::new(
                ScoreMode::Custom,
                Some(CustomParams {
                    full: 100.0,
                    partial: 60.5
                })
            )
            .flag_header_label,
            "Flag (3段階カスタム: 100/60.5)"
        );
        assert_eq!(
            ModeConfig::new(ScoreMode::Custom, None).flag_header_label,
            "Flag (3段階カスタム: 0/0)"
        );
        assert_eq!(
            ModeConfig::new(ScoreMode::Percentage, None).flag_header_label,
            "Flag (割合)"
        );
        assert_eq!(
            ModeConfig::new(ScoreMode::RawScore, None).flag_header_label,
            "Flag (素点)"
        );
    }

    #[test]
    fn test_mode_round_trips_through_label() {
        for mode in [
            ScoreMode::ThreeStep,
            ScoreMode::Binary,
            ScoreMode::Custom,
            ScoreMode::Percentage,
            ScoreMode::RawScore,
        ] {
            let label = ModeConfig::new(mode, None).flag_header_label;
            assert_eq!(ScoreMode::from_flag_header(&label), mode, "{label}");
        }
        assert_eq!(ScoreMode::from_flag_header("Flag (不明)"), ScoreMode::Binary);
    }

    #[test]
    fn test_full_score_units() {
        assert_eq!(ScoreMode::RawScore.full_score_unit(Some(100.0)), 100.0);
        assert_eq!(ScoreMode::RawScore.full_score_unit(None), 0.0);
        assert_eq!(ScoreMode::ThreeStep.full_score_unit(Some(100.0)), 2.0);
        assert_eq!(ScoreMode::Custom.full_score_unit(None), 2.0);
        assert_eq!(ScoreMode::Binary.full_score_unit(Some(10.0)), 1.0);
        assert_eq!(ScoreMode::Percentage.full_score_unit(Some(10.0)), 1.0);
    }

    #[test]
    fn test_rate_columns_include_assignments_only_for_percentage() {
        let mut table = SummaryTable {
            rule: "Flag (割合)".into(),
            mode: ScoreMode::Percentage,
            assignments: vec!["A".into(), "B".into()],
            students: vec![],
        };
        assert_eq!(table.rate_columns(), vec![5, 7, 8, 9]);

        table.mode = ScoreMode::ThreeStep;
        assert_eq!(table.rate_columns(), vec![5, 7]);
    }

    #[test]
    fn test_rate_columns_point_at_rate_headers() {
        assert_eq!(SUMMARY_HEADERS[SCORE_RATE_COLUMN], "Score Rate");
        assert_eq!(SUMMARY_HEADERS[MISSING_RATE_COLUMN], "Missing Rate");

        let table = SummaryTable {
            rule: "Flag (割合)".into(),
            mode: ScoreMode::Percentage,
            assignments: vec!["A".into()],
            students: vec![],
        };
        let headers = table.headers();
        let rated: Vec<&str> = table
            .rate_columns()
            .into_iter()
            .map(|i| headers[i].as_str())
            .collect();
        assert_eq!(rated, vec!["Score Rate", "Missing Rate", "A"]);
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!(Tier::parse("High"), Some(Tier::High));
        assert_eq!(Tier::parse(" mid "), Some(Tier::Mid));
        assert_eq!(Tier::parse(""), None);
    }
}
