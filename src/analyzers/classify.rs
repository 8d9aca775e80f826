use crate::analyzers::types::{
    Classification, ClassifiedSubmission, ClassifyStats, CustomParams, ModeConfig, ScoreMode,
    SubmissionRecord, Tier,
};

/// Maps one submission to a flag and a presentation tier under `mode`.
///
/// | Mode       | Flag                                              | Tier                     |
/// |------------|---------------------------------------------------|--------------------------|
/// | Binary     | 0 unsubmitted, else 1                             | Low / High               |
/// | Custom     | 0 unsubmitted; 2 if >= full; 1 if >= partial; 0   | Low / High / Mid / Low   |
/// | Percentage | score / max, 0 if unsubmitted or max <= 0         | 1 High, > 0 Mid, else Low|
/// | RawScore   | score, 0 if unsubmitted                           | High at max, Mid, Low    |
/// | ThreeStep  | 0 unsubmitted; 2 at max; else 1                   | Low / High / Mid         |
///
/// An absent `max_points` never counts as full marks.
pub fn classify(
    score: Option<f64>,
    max_points: Option<f64>,
    mode: ScoreMode,
    params: Option<CustomParams>,
) -> Classification {
    let unsubmitted = score.is_none() || score == Some(0.0);
    let value = score.unwrap_or(0.0);
    let at_max = score.is_some() && max_points.is_some() && score == max_points;

    let (flag, tier) = match mode {
        ScoreMode::Binary => {
            if unsubmitted {
                (0.0, Tier::Low)
            } else {
                (1.0, Tier::High)
            }
        }
        ScoreMode::Custom => {
            let p = params.unwrap_or_default();
            if unsubmitted {
                (0.0, Tier::Low)
            } else if value >= p.full {
                (2.0, Tier::High)
            } else if value >= p.partial {
                (1.0, Tier::Mid)
            } else {
                (0.0, Tier::Low)
            }
        }
        ScoreMode::Percentage => {
            let flag = match max_points {
                Some(max) if max > 0.0 && !unsubmitted => value / max,
                _ => 0.0,
            };
            let tier = match flag {
                f if f == 1.0 => Tier::High,
                f if f > 0.0 => Tier::Mid,
                _ => Tier::Low,
            };
            (flag, tier)
        }
        ScoreMode::RawScore => {
            let flag = if unsubmitted { 0.0 } else { value };
            let tier = if at_max {
                Tier::High
            } else if !unsubmitted {
                Tier::Mid
            } else {
                Tier::Low
            };
            (flag, tier)
        }
        ScoreMode::ThreeStep => {
            if unsubmitted {
                (0.0, Tier::Low)
            } else if at_max {
                (2.0, Tier::High)
            } else {
                (1.0, Tier::Mid)
            }
        }
    };

    Classification { flag, tier }
}

/// Classifies every record under `config`, keeping input order.
pub fn classify_all(
    records: Vec<SubmissionRecord>,
    config: &ModeConfig,
) -> (Vec<ClassifiedSubmission>, ClassifyStats) {
    let mut stats = ClassifyStats::default();

    let rows = records
        .into_iter()
        .map(|record| {
            let c = classify(record.score, record.max_points, config.mode, config.params);

            stats.rows += 1;
            if record.unsubmitted {
                stats.unsubmitted += 1;
            }
            match c.tier {
                Tier::Low => stats.low += 1,
                Tier::Mid => stats.mid += 1,
                Tier::High => stats.high += 1,
            }

            ClassifiedSubmission {
                record,
                flag: c.flag,
                tier: Some(c.tier),
            }
        })
        .collect();

    (rows, stats)
}
