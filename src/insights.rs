use std::collections::HashMap;
use std::hash::Hash;

use tracing::info;

use crate::config::GpaScale;
use crate::error::EngineError;
use crate::models::{
    AggregateInsight, InsightReport, InsightType, RealtimeStats, RiskLevel, Severity,
    StudentRecord,
};
use crate::risk::{round1, round2, RiskEngine};

const ATTENDANCE_ALERT_BELOW: f64 = 75.0;
const ATTENDANCE_CRITICAL_SHARE: f64 = 0.2;
const LOW_GPA_FOUR_POINT: f64 = 2.0;
const HIGH_PERFORMER_GPA_FOUR_POINT: f64 = 3.5;
const HIGH_PERFORMER_ATTENDANCE: f64 = 85.0;
const DEPARTMENT_CRITICAL_RATE: f64 = 0.3;
const MAX_LISTED_DEPARTMENTS: usize = 3;

/// Groups items by an opaque key, keeping groups in the order their key first appears.
pub fn group_by<'a, T, K, F>(items: &'a [T], key_fn: F) -> Vec<(K, Vec<&'a T>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&'a T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&'a T>)> = Vec::new();

    for item in items {
        let key = key_fn(item);
        match index.get(&key) {
            Some(&position) => groups[position].1.push(item),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![item]));
            }
        }
    }

    groups
}

fn is_stored_high(record: &StudentRecord) -> bool {
    RiskEngine::stored_level(record) == Some(RiskLevel::High)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

pub fn realtime_stats(records: &[StudentRecord]) -> RealtimeStats {
    if records.is_empty() {
        return RealtimeStats::default();
    }

    // Absent values count as zero in the sums; the divisor is the full cohort.
    let total = records.len() as f64;
    let gpa_sum: f64 = records.iter().map(|r| r.gpa.unwrap_or(0.0)).sum();
    let attendance_sum: f64 = records.iter().map(|r| r.attendance_rate.unwrap_or(0.0)).sum();

    RealtimeStats {
        students_analyzed: records.len(),
        high_risk_count: records.iter().filter(|r| is_stored_high(r)).count(),
        avg_gpa: round2(gpa_sum / total),
        avg_attendance: round1(attendance_sum / total),
    }
}

/// Cohort-level observations. High-risk counts read the stored `risk_level`
/// rather than recomputing scores; use `RiskEngine::reconcile` to find stale rows.
///
/// The GPA cut-offs are defined on the 0–4 scale (low below 2.0, high performer at
/// 3.5 or above) and rescaled by `ceiling / 4` for `gpa_scale`, so on the 0–10 scale
/// they become 5.0 and 8.75. Insight descriptions state both values.
pub fn derive_insights(
    records: &[StudentRecord],
    gpa_scale: GpaScale,
) -> Result<InsightReport, EngineError> {
    for record in records {
        record.validate()?;
    }

    let stats = realtime_stats(records);
    if records.is_empty() {
        return Ok(InsightReport {
            insights: vec![AggregateInsight {
                insight_type: InsightType::NoData,
                title: "No Student Data".to_string(),
                description: "No student records are available for analysis.".to_string(),
                severity: Severity::Info,
                affected_count: 0,
                recommendation: "Import or sync student records to generate insights."
                    .to_string(),
            }],
            stats,
        });
    }

    let insights: Vec<AggregateInsight> = [
        attendance_alert(records),
        high_risk_alert(records),
        low_gpa_alert(records, gpa_scale),
        high_performer_opportunity(records, gpa_scale),
        worst_department_alert(records),
    ]
    .into_iter()
    .flatten()
    .collect();

    info!(
        students = stats.students_analyzed,
        insights = insights.len(),
        "derived cohort insights"
    );
    Ok(InsightReport { insights, stats })
}

fn attendance_alert(records: &[StudentRecord]) -> Option<AggregateInsight> {
    let affected: Vec<&StudentRecord> = records
        .iter()
        .filter(|r| r.attendance_rate.is_some_and(|rate| rate < ATTENDANCE_ALERT_BELOW))
        .collect();
    if affected.is_empty() {
        return None;
    }

    let departments = group_by(&affected, |r| r.department.clone());
    let listed: Vec<&str> = departments
        .iter()
        .take(MAX_LISTED_DEPARTMENTS)
        .map(|(department, _)| department.as_str())
        .collect();
    let severity = if affected.len() as f64 > records.len() as f64 * ATTENDANCE_CRITICAL_SHARE {
        Severity::Critical
    } else {
        Severity::High
    };

    Some(AggregateInsight {
        insight_type: InsightType::AttendanceAlert,
        title: "Attendance Below Threshold".to_string(),
        description: format!(
            "{} below 75% attendance across {}: {}",
            plural(affected.len(), "student"),
            plural(departments.len(), "department"),
            listed.join(", ")
        ),
        severity,
        affected_count: affected.len(),
        recommendation: "Contact affected students and review attendance with their advisors."
            .to_string(),
    })
}

fn high_risk_alert(records: &[StudentRecord]) -> Option<AggregateInsight> {
    let count = records.iter().filter(|r| is_stored_high(r)).count();
    (count > 0).then(|| AggregateInsight {
        insight_type: InsightType::HighRiskAlert,
        title: "High-Risk Students Identified".to_string(),
        description: format!("{} currently classified as high risk.", plural(count, "student")),
        severity: Severity::Critical,
        affected_count: count,
        recommendation: "Schedule intervention meetings with high-risk students this week."
            .to_string(),
    })
}

fn low_gpa_alert(records: &[StudentRecord], gpa_scale: GpaScale) -> Option<AggregateInsight> {
    let threshold = gpa_scale.from_four_point(LOW_GPA_FOUR_POINT);
    let count = records
        .iter()
        .filter(|r| r.gpa.is_some_and(|gpa| gpa < threshold))
        .count();
    (count > 0).then(|| AggregateInsight {
        insight_type: InsightType::AcademicAlert,
        title: "Low GPA Alert".to_string(),
        description: format!(
            "{} with GPA below {threshold} on the {} scale ({LOW_GPA_FOUR_POINT:.1} on 0-4).",
            plural(count, "student"),
            gpa_scale.label()
        ),
        severity: Severity::High,
        affected_count: count,
        recommendation: "Enroll students in tutoring and academic support programs.".to_string(),
    })
}

fn high_performer_opportunity(
    records: &[StudentRecord],
    gpa_scale: GpaScale,
) -> Option<AggregateInsight> {
    let gpa_floor = gpa_scale.from_four_point(HIGH_PERFORMER_GPA_FOUR_POINT);
    let count = records
        .iter()
        .filter(|r| {
            r.gpa.is_some_and(|gpa| gpa >= gpa_floor)
                && r.attendance_rate
                    .is_some_and(|rate| rate >= HIGH_PERFORMER_ATTENDANCE)
        })
        .count();
    (count > 0).then(|| AggregateInsight {
        insight_type: InsightType::Opportunity,
        title: "High Performers".to_string(),
        description: format!(
            "{} with GPA of at least {gpa_floor} on the {} scale ({HIGH_PERFORMER_GPA_FOUR_POINT:.1} on 0-4) and attendance of at least 85%.",
            plural(count, "student"),
            gpa_scale.label()
        ),
        severity: Severity::Positive,
        affected_count: count,
        recommendation: "Invite high performers to peer mentoring and advanced programs."
            .to_string(),
    })
}

fn worst_department_alert(records: &[StudentRecord]) -> Option<AggregateInsight> {
    let mut worst: Option<(&str, usize, f64)> = None;

    for (department, members) in group_by(records, |r| r.department.as_str()) {
        let high = members.iter().filter(|r| is_stored_high(r)).count();
        if high == 0 {
            continue;
        }
        let rate = high as f64 / members.len() as f64;
        // Strict comparison keeps the earliest department on ties.
        if worst.map_or(true, |(_, _, best)| rate > best) {
            worst = Some((department, high, rate));
        }
    }

    worst.map(|(department, high, rate)| AggregateInsight {
        insight_type: InsightType::DepartmentAlert,
        title: format!("{department} Needs Attention"),
        description: format!(
            "{department} has the highest share of high-risk students: {} ({:.1}%).",
            plural(high, "student"),
            rate * 100.0
        ),
        severity: if rate > DEPARTMENT_CRITICAL_RATE {
            Severity::Critical
        } else {
            Severity::High
        },
        affected_count: high,
        recommendation: format!("Review support resources and advising capacity in {department}."),
    })
}
