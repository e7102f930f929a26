use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::{
    Impact, LevelDrift, Priority, Recommendation, RiskAssessment, RiskFactor, RiskLevel,
    StudentRecord,
};

pub const GPA_WEIGHT: f64 = 0.4;
pub const ATTENDANCE_WEIGHT: f64 = 0.3;
pub const ENGAGEMENT_WEIGHT: f64 = 0.2;
pub const YEAR_WEIGHT: f64 = 0.1;

/// Sub-score substituted for an absent measurement.
pub const NEUTRAL_SUB_SCORE: f64 = 0.5;

const GPA_TARGET: f64 = 0.6;
const ATTENDANCE_TARGET: f64 = 0.75;
const ENGAGEMENT_TARGET: f64 = 0.6;
const POSITIVE_YEAR_LIMIT: i64 = 2;

/// Normalised inputs to the composite score, each within [0, 1] where 1 is best.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubScores {
    pub gpa: f64,
    pub attendance: f64,
    pub engagement: f64,
    pub year: f64,
}

impl SubScores {
    pub fn composite(&self) -> f64 {
        let standing = self.gpa * GPA_WEIGHT
            + self.attendance * ATTENDANCE_WEIGHT
            + self.engagement * ENGAGEMENT_WEIGHT
            + self.year * YEAR_WEIGHT;
        (1.0 - standing).clamp(0.0, 1.0)
    }
}

/// Years are unbounded; arithmetic runs in f64 so extreme values cannot overflow.
pub fn year_score(year: i64) -> f64 {
    (1.0 - (year as f64 - 1.0) * 0.2).clamp(0.0, 1.0)
}

fn ratio_or_neutral(value: Option<f64>, ceiling: f64) -> f64 {
    value
        .map(|value| (value / ceiling).clamp(0.0, 1.0))
        .unwrap_or(NEUTRAL_SUB_SCORE)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub(crate) fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

pub(crate) fn round1(value: f64) -> f64 {
    round_to(value, 1)
}

/// Stateless scorer turning student records into risk assessments.
#[derive(Debug, Clone, Copy)]
pub struct RiskEngine {
    config: EngineConfig,
}

impl RiskEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sub_scores(&self, record: &StudentRecord) -> SubScores {
        SubScores {
            gpa: ratio_or_neutral(record.gpa, self.config.gpa_scale.ceiling()),
            attendance: ratio_or_neutral(record.attendance_rate, 100.0),
            engagement: ratio_or_neutral(record.engagement_score, 100.0),
            year: year_score(record.effective_year()),
        }
    }

    /// Computes a fresh assessment. Never consults the stored `risk_level`.
    pub fn assess_student(&self, record: &StudentRecord) -> Result<RiskAssessment, EngineError> {
        record.validate()?;

        let sub_scores = self.sub_scores(record);
        let score = sub_scores.composite();
        let level = RiskLevel::from_score(score);
        debug!(student = %record.id, score, %level, "assessed student");

        Ok(RiskAssessment {
            student_id: record.id.clone(),
            score,
            level,
            confidence: self.config.confidence.confidence(record.missing_measurements()),
            factors: self.factors(record, &sub_scores),
            recommendations: self.recommendations(record, &sub_scores),
        })
    }

    /// One result per input record, in input order. Invalid records are reported in place.
    pub fn assess_batch(
        &self,
        records: &[StudentRecord],
    ) -> Vec<Result<RiskAssessment, EngineError>> {
        let results: Vec<_> = records
            .iter()
            .map(|record| {
                let result = self.assess_student(record);
                if let Err(err) = &result {
                    warn!(student = %record.id, error = %err, "skipping record");
                }
                result
            })
            .collect();

        let rejected = results.iter().filter(|result| result.is_err()).count();
        info!(
            assessed = results.len() - rejected,
            rejected, "batch assessment complete"
        );
        results
    }

    /// Assesses rows as they came from the record source, keeping rejected rows in place
    /// so output position `i` always describes input row `i`.
    pub fn assess_rows(
        &self,
        rows: &[Result<StudentRecord, EngineError>],
    ) -> Vec<Result<RiskAssessment, EngineError>> {
        rows.iter()
            .map(|row| match row {
                Ok(record) => self.assess_student(record),
                Err(err) => Err(err.clone()),
            })
            .collect()
    }

    /// The persisted classification, which may be stale relative to `assess_student`.
    pub fn stored_level(record: &StudentRecord) -> Option<RiskLevel> {
        record.risk_level
    }

    /// Records whose stored level is missing or disagrees with a fresh assessment.
    pub fn reconcile(&self, records: &[StudentRecord]) -> Vec<LevelDrift> {
        records
            .iter()
            .filter_map(|record| match self.assess_student(record) {
                Ok(assessment) => {
                    let stored = Self::stored_level(record);
                    (stored != Some(assessment.level)).then(|| LevelDrift {
                        student_id: record.id.clone(),
                        student_name: record.name.clone(),
                        stored,
                        fresh: assessment.level,
                        score: assessment.score,
                    })
                }
                Err(err) => {
                    warn!(student = %record.id, error = %err, "cannot reconcile record");
                    None
                }
            })
            .collect()
    }

    fn factors(&self, record: &StudentRecord, sub_scores: &SubScores) -> Vec<RiskFactor> {
        let impact = |positive: bool| {
            if positive {
                Impact::Positive
            } else {
                Impact::Neutral
            }
        };
        let display = |value: Option<String>| value.unwrap_or_else(|| "N/A".to_string());
        let ceiling = self.config.gpa_scale.ceiling();

        vec![
            RiskFactor {
                name: "Academic Performance".to_string(),
                weight: GPA_WEIGHT,
                score: sub_scores.gpa,
                impact: impact(sub_scores.gpa >= GPA_TARGET),
                actual_value_display: display(
                    record.gpa.map(|gpa| format!("{gpa:.2} / {ceiling}")),
                ),
            },
            RiskFactor {
                name: "Attendance".to_string(),
                weight: ATTENDANCE_WEIGHT,
                score: sub_scores.attendance,
                impact: impact(sub_scores.attendance >= ATTENDANCE_TARGET),
                actual_value_display: display(
                    record.attendance_rate.map(|rate| format!("{rate}%")),
                ),
            },
            RiskFactor {
                name: "Engagement".to_string(),
                weight: ENGAGEMENT_WEIGHT,
                score: sub_scores.engagement,
                impact: impact(sub_scores.engagement >= ENGAGEMENT_TARGET),
                actual_value_display: display(
                    record.engagement_score.map(|score| format!("{score}/100")),
                ),
            },
            RiskFactor {
                name: "Year Standing".to_string(),
                weight: YEAR_WEIGHT,
                score: sub_scores.year,
                impact: impact(record.effective_year() <= POSITIVE_YEAR_LIMIT),
                actual_value_display: display(record.year.map(|year| format!("Year {year}"))),
            },
        ]
    }

    fn recommendations(
        &self,
        record: &StudentRecord,
        sub_scores: &SubScores,
    ) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        if sub_scores.attendance < ATTENDANCE_TARGET {
            let description = match record.attendance_rate {
                Some(rate) => format!(
                    "Attendance is at {rate}%, below the 75% target. Schedule a check-in and agree on weekly attendance goals."
                ),
                None => "No attendance data is recorded. Confirm attendance with instructors and set weekly goals.".to_string(),
            };
            recommendations.push(Recommendation {
                priority: Priority::High,
                action: "Improve Attendance".to_string(),
                description,
                expected_impact: round2(ATTENDANCE_TARGET - sub_scores.attendance),
            });
        }

        if sub_scores.gpa < GPA_TARGET {
            let description = match record.gpa {
                Some(gpa) => format!(
                    "GPA of {gpa:.2} on the {} scale is below target. Arrange tutoring and an academic advising session.",
                    self.config.gpa_scale.label()
                ),
                None => "No GPA is recorded. Review recent grades with an academic advisor.".to_string(),
            };
            recommendations.push(Recommendation {
                priority: Priority::High,
                action: "Academic Support Required".to_string(),
                description,
                expected_impact: round2(GPA_TARGET - sub_scores.gpa),
            });
        }

        if sub_scores.engagement < ENGAGEMENT_TARGET {
            recommendations.push(Recommendation {
                priority: Priority::Medium,
                action: "Increase Engagement".to_string(),
                description: "Encourage participation in study groups, office hours and class activities.".to_string(),
                expected_impact: round2(ENGAGEMENT_TARGET - sub_scores.engagement),
            });
        }

        if recommendations.is_empty() {
            recommendations.push(Recommendation {
                priority: Priority::Low,
                action: "Maintain Current Performance".to_string(),
                description: "All indicators are on track. Continue regular monitoring.".to_string(),
                expected_impact: 0.0,
            });
        }

        recommendations
    }
}

/// Orders assessments from highest to lowest risk score.
pub fn rank_by_score(assessments: &[RiskAssessment]) -> Vec<&RiskAssessment> {
    let mut ranked: Vec<&RiskAssessment> = assessments.iter().collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}
