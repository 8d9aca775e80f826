use crate::analyzers::types::{
    ClassifiedSheet, ClassifiedSubmission, ScoreMode, StudentSummary, SummaryTable,
};
use crate::analyzers::utility::{collate, rate};
use crate::error::{EngineError, EngineResult};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Flag and max points of one assignment a student was given.
#[derive(Debug, Clone, Copy)]
struct AssignedWork {
    flag: f64,
    max_points: Option<f64>,
}

/// Running per-student state. Only assignments the student has a row for are
/// present in `scores`; absence means "not assigned", never zero.
struct StudentAggregate<'a> {
    name: &'a str,
    course_name: &'a str,
    email: &'a str,
    scores: HashMap<&'a str, AssignedWork>,
}

impl StudentAggregate<'_> {
    fn summarize(&self, assignments: &[String], mode: ScoreMode) -> StudentSummary {
        let mut total_score = 0.0;
        let mut full_score = 0.0;
        let mut missing_count = 0;
        let mut assigned_count = 0;
        let mut flags = Vec::with_capacity(assignments.len());

        for title in assignments {
            let Some(work) = self.scores.get(title.as_str()) else {
                flags.push(None);
                continue;
            };

            assigned_count += 1;
            full_score += mode.full_score_unit(work.max_points);
            total_score += work.flag;
            if work.flag == 0.0 {
                missing_count += 1;
            }
            flags.push(Some(work.flag));
        }

        StudentSummary {
            name: self.name.to_string(),
            class: self.course_name.to_string(),
            email: self.email.to_string(),
            total_score,
            full_score,
            score_rate: rate(total_score, full_score),
            missing_count,
            assigned_count,
            missing_rate: rate(missing_count as f64, assigned_count as f64),
            flags,
        }
    }
}

/// Rolls classified submissions up into one summary row per student.
///
/// Rows are kept when their class is in `target_classes` and their assignment
/// is in `target_assignments`. Each student's full score and missing rate use
/// only the target assignments that student has a row for, so students given
/// different subsets are never measured against the whole target set.
///
/// # Errors
///
/// [`EngineError::NoMatchingData`] when the filter keeps no rows.
pub fn aggregate(
    classified: &[ClassifiedSubmission],
    target_classes: &[String],
    target_assignments: &[String],
    mode: ScoreMode,
    rule: &str,
) -> EngineResult<SummaryTable> {
    let assignments: Vec<String> = target_assignments
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let class_set: HashSet<&str> = target_classes.iter().map(String::as_str).collect();
    let assignment_set: HashSet<&str> = assignments.iter().map(String::as_str).collect();

    let rows: Vec<&ClassifiedSubmission> = classified
        .iter()
        .filter(|c| {
            class_set.contains(c.record.course_name.as_str())
                && assignment_set.contains(c.record.assignment_title.as_str())
        })
        .collect();

    if rows.is_empty() {
        return Err(EngineError::NoMatchingData {
            classes: class_set.len(),
            assignments: assignment_set.len(),
        });
    }

    let mut students: HashMap<&str, StudentAggregate> = HashMap::new();
    for row in rows.iter().copied() {
        let r = &row.record;
        let student = students
            .entry(r.student_email.as_str())
            .or_insert_with(|| StudentAggregate {
                name: &r.student_name,
                course_name: &r.course_name,
                email: &r.student_email,
                scores: HashMap::new(),
            });
        student.scores.insert(
            r.assignment_title.as_str(),
            AssignedWork {
                flag: row.flag,
                max_points: r.max_points,
            },
        );
    }

    let mut ordered: Vec<&StudentAggregate> = students.values().collect();
    ordered.sort_by(|a, b| {
        collate(a.course_name, b.course_name).then_with(|| collate(a.email, b.email))
    });

    let summaries: Vec<StudentSummary> = ordered
        .into_iter()
        .map(|s| s.summarize(&assignments, mode))
        .collect();

    debug!(
        rows = rows.len(),
        students = summaries.len(),
        assignments = assignments.len(),
        ?mode,
        "Aggregated submissions"
    );

    Ok(SummaryTable {
        rule: rule.to_string(),
        mode,
        assignments,
        students: summaries,
    })
}

/// Aggregates a stored assignment sheet, recovering the mode from its flag label.
pub fn aggregate_sheet(
    sheet: &ClassifiedSheet,
    target_classes: &[String],
    target_assignments: &[String],
) -> EngineResult<SummaryTable> {
    let mode = ScoreMode::from_flag_header(&sheet.flag_header_label);
    aggregate(
        &sheet.rows,
        target_classes,
        target_assignments,
        mode,
        &sheet.flag_header_label,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::classify::classify_all;
    use crate::analyzers::types::{ModeConfig, SubmissionRecord, SubmissionRow};

    fn record(
        email: &str,
        class: &str,
        title: &str,
        score: Option<f64>,
        max: Option<f64>,
    ) -> SubmissionRecord {
        SubmissionRecord::from(SubmissionRow {
            email: email.into(),
            student_name: email.split('@').next().unwrap_or_default().into(),
            course_name: class.into(),
            assignment_title: title.into(),
            submission_state: "TURNED_IN".into(),
            score,
            max_points: max,
            ..Default::default()
        })
    }

    fn fixture() -> Vec<SubmissionRecord> {
        vec![
            record("taro@example.com", "Class Alpha", "Math HW 1", Some(10.0), Some(10.0)),
            record("taro@example.com", "Class Alpha", "Math HW 2", Some(7.0), Some(10.0)),
            record("taro@example.com", "Class Alpha", "Science Report", Some(0.0), Some(100.0)),
            record("hanako@example.com", "Class Alpha", "Math HW 1", Some(10.0), Some(10.0)),
            record("hanako@example.com", "Class Alpha", "Math HW 2", Some(10.0), Some(10.0)),
            record("hanako@example.com", "Class Alpha", "Science Report", None, Some(100.0)),
            record("jiro@example.com", "Class Beta", "Art Project", Some(88.0), None),
            record("saburo@example.com", "Class Alpha", "Math HW 1", Some(5.0), Some(10.0)),
            record("saburo@example.com", "Class Alpha", "Math HW 2", Some(8.0), Some(10.0)),
        ]
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn run(config: ModeConfig, records: Vec<SubmissionRecord>) -> SummaryTable {
        let (classified, _) = classify_all(records, &config);
        aggregate(
            &classified,
            &strings(&["Class Alpha", "Class Beta"]),
            &strings(&["Science Report", "Math HW 2", "Math HW 1", "Math HW 1"]),
            config.mode,
            &config.flag_header_label,
        )
        .unwrap()
    }

    fn student<'a>(table: &'a SummaryTable, email: &str) -> &'a StudentSummary {
        table.students.iter().find(|s| s.email == email).unwrap()
    }

    #[test]
    fn test_three_step_uses_per_student_full_score() {
        let table = run(ModeConfig::default(), fixture());

        let taro = student(&table, "taro@example.com");
        assert_eq!(taro.flags, vec![Some(2.0), Some(1.0), Some(0.0)]);
        assert_eq!((taro.total_score, taro.full_score), (3.0, 6.0));

        let hanako = student(&table, "hanako@example.com");
        assert_eq!((hanako.total_score, hanako.full_score), (4.0, 6.0));

        let saburo = student(&table, "saburo@example.com");
        assert_eq!((saburo.total_score, saburo.full_score), (2.0, 4.0));
        assert_eq!(saburo.flags, vec![Some(1.0), Some(1.0), None]);
        assert_eq!(saburo.score_rate, 0.5);
    }

    #[test]
    fn test_raw_score_sums_heterogeneous_max_points() {
        let table = run(ModeConfig::new(ScoreMode::RawScore, None), fixture());

        let taro = student(&table, "taro@example.com");
        assert_eq!((taro.total_score, taro.full_score), (17.0, 120.0));

        let saburo = student(&table, "saburo@example.com");
        assert_eq!((saburo.total_score, saburo.full_score), (13.0, 20.0));
    }

    #[test]
    fn test_binary_full_score() {
        let table = run(ModeConfig::new(ScoreMode::Binary, None), fixture());

        let taro = student(&table, "taro@example.com");
        assert_eq!((taro.total_score, taro.full_score), (2.0, 3.0));

        let saburo = student(&table, "saburo@example.com");
        assert_eq!((saburo.total_score, saburo.full_score), (2.0, 2.0));
    }

    #[test]
    fn test_missing_rate_uses_assigned_count() {
        let records = vec![
            record("a@x", "C", "HW 1", Some(5.0), Some(10.0)),
            record("a@x", "C", "HW 2", None, Some(10.0)),
            record("b@x", "C", "HW 3", Some(5.0), Some(10.0)),
        ];
        let (classified, _) = classify_all(records, &ModeConfig::default());
        let table = aggregate(
            &classified,
            &strings(&["C"]),
            &strings(&["HW 1", "HW 2", "HW 3"]),
            ScoreMode::ThreeStep,
            "Flag (3段階評価)",
        )
        .unwrap();

        let a = student(&table, "a@x");
        assert_eq!((a.missing_count, a.assigned_count), (1, 2));
        assert_eq!(a.missing_rate, 0.5);
    }

    #[test]
    fn test_filters_by_class_and_assignment() {
        let (classified, _) = classify_all(fixture(), &ModeConfig::default());
        let table = aggregate(
            &classified,
            &strings(&["Class Alpha"]),
            &strings(&["Math HW 1"]),
            ScoreMode::ThreeStep,
            "Flag (3段階評価)",
        )
        .unwrap();

        assert_eq!(table.students.len(), 3);
        assert!(table.students.iter().all(|s| s.class == "Class Alpha"));
        assert!(table.students.iter().all(|s| s.assigned_count == 1));
    }

    #[test]
    fn test_no_matching_data() {
        let (classified, _) = classify_all(fixture(), &ModeConfig::default());
        let err = aggregate(
            &classified,
            &strings(&["Class Gamma"]),
            &strings(&["Math HW 1"]),
            ScoreMode::ThreeStep,
            "Flag (3段階評価)",
        )
        .unwrap_err();

        assert_eq!(
            err,
            EngineError::NoMatchingData {
                classes: 1,
                assignments: 1
            }
        );
    }

    #[test]
    fn test_rows_sorted_by_class_then_email_regardless_of_input_order() {
        let classes = strings(&["Class Beta", "Class Alpha"]);
        let assignments = strings(&["Math HW 1", "Art Project"]);

        let (forward_rows, _) = classify_all(fixture(), &ModeConfig::default());
        let mut reversed_input = fixture();
        reversed_input.reverse();
        let (reversed_rows, _) = classify_all(reversed_input, &ModeConfig::default());

        let forward =
            aggregate(&forward_rows, &classes, &assignments, ScoreMode::ThreeStep, "r").unwrap();
        let reversed =
            aggregate(&reversed_rows, &classes, &assignments, ScoreMode::ThreeStep, "r").unwrap();

        let emails: Vec<&str> = forward.students.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(
            emails,
            vec![
                "hanako@example.com",
                "saburo@example.com",
                "taro@example.com",
                "jiro@example.com",
            ]
        );
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_rows_follow_locale_collation() {
        let records = vec![
            record("taro2@example.com", "C", "HW", Some(1.0), Some(10.0)),
            record("taro@example.com", "C", "HW", Some(1.0), Some(10.0)),
            record("a.b@x.com", "C", "HW", Some(1.0), Some(10.0)),
            record("a_b@x.com", "C", "HW", Some(1.0), Some(10.0)),
            record("x@x", "あい", "HW", Some(1.0), Some(10.0)),
            record("y@x", "アア", "HW", Some(1.0), Some(10.0)),
        ];
        let (classified, _) = classify_all(records, &ModeConfig::default());
        let table = aggregate(
            &classified,
            &strings(&["C", "あい", "アア"]),
            &strings(&["HW"]),
            ScoreMode::ThreeStep,
            "r",
        )
        .unwrap();

        let order: Vec<String> = table
            .students
            .iter()
            .map(|s| format!("{}|{}", s.class, s.email))
            .collect();
        assert_eq!(
            order,
            vec![
                "C|a_b@x.com",
                "C|a.b@x.com",
                "C|taro@example.com",
                "C|taro2@example.com",
                "アア|y@x",
                "あい|x@x",
            ]
        );
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let (classified, _) = classify_all(fixture(), &ModeConfig::default());
        let classes = strings(&["Class Alpha", "Class Beta"]);
        let assignments = strings(&["Math HW 2", "Art Project", "Math HW 1"]);

        let first = aggregate(&classified, &classes, &assignments, ScoreMode::ThreeStep, "r").unwrap();
        let second = aggregate(&classified, &classes, &assignments, ScoreMode::ThreeStep, "r").unwrap();

        assert_eq!(first.rows(), second.rows());
        assert_eq!(first.headers(), second.headers());
    }

    #[test]
    fn test_headers_and_not_assigned_sentinel() {
        let table = run(ModeConfig::default(), fixture());
        assert_eq!(
            table.headers(),
            strings(&[
                "Student name",
                "Class",
                "Email",
                "Total Score",
                "Full Score",
                "Score Rate",
                "Missing Count",
                "Missing Rate",
                "Math HW 1",
                "Math HW 2",
                "Science Report",
            ])
        );

        // jiro only has Art Project, which is not a target here
        assert!(table.students.iter().all(|s| s.email != "jiro@example.com"));

        let rows = table.rows();
        let saburo = rows
            .iter()
            .find(|r| r[2].to_string() == "saburo@example.com")
            .unwrap();
        assert_eq!(saburo[4].to_string(), "4");
        assert_eq!(saburo[8].to_string(), "1");
        assert_eq!(saburo[10].to_string(), ".");
    }

    #[test]
    fn test_percentage_flags_are_summed() {
        let table = run(ModeConfig::new(ScoreMode::Percentage, None), fixture());
        let taro = student(&table, "taro@example.com");
        assert_eq!(taro.full_score, 3.0);
        assert!((taro.total_score - 1.7).abs() < 1e-9);
        assert_eq!(taro.missing_count, 1);
    }

    #[test]
    fn test_later_row_overwrites_same_assignment() {
        let records = vec![
            record("a@x", "C", "HW", None, Some(10.0)),
            record("a@x", "C", "HW", Some(10.0), Some(10.0)),
        ];
        let (classified, _) = classify_all(records, &ModeConfig::default());
        let table = aggregate(&classified, &strings(&["C"]), &strings(&["HW"]), ScoreMode::ThreeStep, "r")
            .unwrap();

        let a = student(&table, "a@x");
        assert_eq!((a.total_score, a.full_score, a.assigned_count), (2.0, 2.0, 1));
    }

    #[test]
    fn test_aggregate_sheet_reads_mode_from_label() {
        let config = ModeConfig::new(ScoreMode::RawScore, None);
        let (rows, _) = classify_all(fixture(), &config);
        let sheet = ClassifiedSheet {
            flag_header_label: config.flag_header_label.clone(),
            rows,
        };

        let table = aggregate_sheet(
            &sheet,
            &strings(&["Class Alpha"]),
            &strings(&["Math HW 1", "Math HW 2", "Science Report"]),
        )
        .unwrap();

        assert_eq!(table.mode, ScoreMode::RawScore);
        assert_eq!(table.rule, "Flag (素点)");
        assert_eq!(student(&table, "taro@example.com").full_score, 120.0);
    }
}
