use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub department: String,
    pub year: Option<i64>,
    pub gpa: Option<f64>,
    pub attendance_rate: Option<f64>,
    pub engagement_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
}

impl StudentRecord {
    /// Academic year used for scoring; absent years count as first year.
    pub fn effective_year(&self) -> i64 {
        self.year.unwrap_or(1)
    }

    /// Rejects measurements that are present but not finite numbers.
    pub fn validate(&self) -> Result<(), EngineError> {
        let measurements = [
            ("gpa", self.gpa),
            ("attendance_rate", self.attendance_rate),
            ("engagement_score", self.engagement_score),
        ];
        for (field, value) in measurements {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(EngineError::invalid(
                        &self.id,
                        field,
                        format!("is not a finite number: {value}"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn missing_measurements(&self) -> usize {
        [self.gpa, self.attendance_rate, self.engagement_score]
            .iter()
            .filter(|value| value.is_none())
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const HIGH_THRESHOLD: f64 = 0.6;
    pub const MEDIUM_THRESHOLD: f64 = 0.35;

    /// Cut points are strict: a score sitting exactly on a threshold stays in the lower tier.
    pub fn from_score(score: f64) -> Self {
        if score > Self::HIGH_THRESHOLD {
            RiskLevel::High
        } else if score > Self::MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    pub name: String,
    pub weight: f64,
    pub score: f64,
    pub impact: Impact,
    pub actual_value_display: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub priority: Priority,
    pub action: String,
    pub description: String,
    pub expected_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub student_id: String,
    pub score: f64,
    pub level: RiskLevel,
    pub confidence: f64,
    pub factors: Vec<RiskFactor>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    AttendanceAlert,
    HighRiskAlert,
    AcademicAlert,
    Opportunity,
    DepartmentAlert,
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Positive,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Positive => "positive",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateInsight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub affected_count: usize,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeStats {
    pub students_analyzed: usize,
    pub high_risk_count: usize,
    pub avg_gpa: f64,
    pub avg_attendance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightReport {
    pub insights: Vec<AggregateInsight>,
    pub stats: RealtimeStats,
}

/// A record whose persisted classification no longer matches a fresh assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDrift {
    pub student_id: String,
    pub student_name: String,
    pub stored: Option<RiskLevel>,
    pub fresh: RiskLevel,
    pub score: f64,
}
