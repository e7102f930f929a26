use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::config::GpaScale;
use crate::error::EngineError;
use crate::models::{InsightReport, RiskAssessment, RiskLevel};
use crate::risk;

pub struct ReportInput<'a> {
    pub gpa_scale: GpaScale,
    pub generated_at: DateTime<Utc>,
    pub assessments: &'a [RiskAssessment],
    pub rejected: &'a [EngineError],
    pub insights: &'a InsightReport,
    pub top: usize,
}

pub fn level_counts(assessments: &[RiskAssessment]) -> [(RiskLevel, usize); 3] {
    [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low].map(|level| {
        let count = assessments.iter().filter(|a| a.level == level).count();
        (level, count)
    })
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let mut output = String::new();
    let stats = &input.insights.stats;

    let _ = writeln!(output, "# Student Risk Report");
    let _ = writeln!(
        output,
        "Generated {} (GPA scale {})",
        input.generated_at.format("%Y-%m-%d %H:%M UTC"),
        input.gpa_scale.label()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort Summary");
    let _ = writeln!(output, "- Students analyzed: {}", stats.students_analyzed);
    let _ = writeln!(output, "- Stored high-risk count: {}", stats.high_risk_count);
    let _ = writeln!(output, "- Average GPA: {:.2}", stats.avg_gpa);
    let _ = writeln!(output, "- Average attendance: {:.1}%", stats.avg_attendance);
    for (level, count) in level_counts(input.assessments) {
        let _ = writeln!(output, "- Assessed {level}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");

    if input.insights.insights.is_empty() {
        let _ = writeln!(output, "No cohort-level concerns detected.");
    } else {
        for insight in input.insights.insights.iter() {
            let _ = writeln!(
                output,
                "- [{}] {}: {} ({} affected). {}",
                insight.severity.as_str(),
                insight.title,
                insight.description,
                insight.affected_count,
                insight.recommendation
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Students");

    if input.assessments.is_empty() {
        let _ = writeln!(output, "No students could be assessed.");
    } else {
        for assessment in risk::rank_by_score(input.assessments).iter().take(input.top) {
            let actions: Vec<&str> = assessment
                .recommendations
                .iter()
                .map(|rec| rec.action.as_str())
                .collect();
            let _ = writeln!(
                output,
                "- {} score {:.2} ({}): {}",
                assessment.student_id,
                assessment.score,
                assessment.level,
                actions.join("; ")
            );
        }
    }

    if !input.rejected.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Rejected Records");
        for error in input.rejected {
            let _ = writeln!(output, "- {error}");
        }
    }

    output
}
