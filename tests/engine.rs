use student_risk_engine::models::{InsightType, Priority, Severity};
use student_risk_engine::records::parse_records;
use student_risk_engine::report::{build_report, ReportInput};
use student_risk_engine::{
    derive_insights, EngineConfig, EngineError, GpaScale, RiskEngine, RiskLevel, StudentRecord,
};

const COHORT: &str = r#"[
    {"id": "stu-001", "name": "Avery Lee", "department": "Computer Science", "year": 1,
     "gpa": 9.0, "attendance_rate": 90, "engagement_score": 80, "risk_level": "low"},
    {"id": "stu-002", "name": "Jules Moreno", "department": "Mechanical Engineering", "year": 3,
     "gpa": 1.5, "attendance_rate": 40, "engagement_score": 30, "risk_level": "high"},
    {"id": "stu-003", "name": "Kiara Patel", "department": "Computer Science", "year": "1",
     "gpa": null, "attendance_rate": "", "engagement_score": null},
    {"id": "stu-004", "name": "Noor Haddad", "department": "Biology", "year": 2,
     "gpa": "n/a", "attendance_rate": 70}
]"#;

fn load(json: &str) -> (Vec<StudentRecord>, Vec<EngineError>) {
    let mut valid = Vec::new();
    let mut rejected = Vec::new();
    for result in parse_records(json).unwrap() {
        match result {
            Ok(record) => valid.push(record),
            Err(err) => rejected.push(err),
        }
    }
    (valid, rejected)
}

#[test]
fn scores_cohort_from_json() {
    let (students, rejected) = load(COHORT);
    assert_eq!(students.len(), 3);
    assert_eq!(rejected.len(), 1);

    let engine = RiskEngine::new(EngineConfig::new(GpaScale::Ten));
    let results = engine.assess_batch(&students);
    let levels: Vec<RiskLevel> = results
        .iter()
        .map(|result| result.as_ref().unwrap().level)
        .collect();
    assert_eq!(levels, vec![RiskLevel::Low, RiskLevel::High, RiskLevel::Medium]);

    for assessment in results.iter().flatten() {
        assert!((0.0..=1.0).contains(&assessment.score));
        assert!(!assessment.recommendations.is_empty());
        assert_eq!(assessment.factors.len(), 4);
    }

    let neutral = results[2].as_ref().unwrap();
    assert!((neutral.score - 0.45).abs() < 1e-9);
    assert_eq!(neutral.recommendations[0].priority, Priority::High);
}

#[test]
fn row_assessment_lines_up_with_input_rows() {
    let json = r#"[
        {"id": "a", "gpa": "bad"},
        {"id": "b", "gpa": 9.0, "attendance_rate": 90, "engagement_score": 80, "year": 1},
        {"id": "c", "risk_level": "unknown"}
    ]"#;
    let rows = parse_records(json).unwrap();
    let engine = RiskEngine::new(EngineConfig::new(GpaScale::Ten));
    let results = engine.assess_rows(&rows);

    assert_eq!(results.len(), 3);
    assert!(matches!(
        &results[0],
        Err(EngineError::InvalidInput { record_id, .. }) if record_id == "a"
    ));
    assert_eq!(results[1].as_ref().unwrap().student_id, "b");
    assert!(matches!(
        &results[2],
        Err(EngineError::InvalidInput { record_id, .. }) if record_id == "c"
    ));
}

#[test]
fn stored_and_fresh_levels_can_disagree() {
    let (mut students, _) = load(COHORT);
    students[0].risk_level = Some(RiskLevel::High);

    let engine = RiskEngine::new(EngineConfig::new(GpaScale::Ten));
    assert_eq!(RiskEngine::stored_level(&students[0]), Some(RiskLevel::High));
    assert_eq!(
        engine.assess_student(&students[0]).unwrap().level,
        RiskLevel::Low
    );

    let drift = engine.reconcile(&students);
    let ids: Vec<&str> = drift.iter().map(|d| d.student_id.as_str()).collect();
    assert_eq!(ids, vec!["stu-001", "stu-003"]);
}

#[test]
fn insights_and_report_cover_cohort() {
    let (students, rejected) = load(COHORT);
    let insights = derive_insights(&students, GpaScale::Ten).unwrap();

    assert_eq!(insights.stats.students_analyzed, 3);
    assert_eq!(insights.stats.high_risk_count, 1);
    assert_eq!(insights.stats.avg_gpa, 3.5);
    assert_eq!(insights.stats.avg_attendance, 43.3);

    let department = insights
        .insights
        .iter()
        .find(|insight| insight.insight_type == InsightType::DepartmentAlert)
        .unwrap();
    assert_eq!(department.title, "Mechanical Engineering Needs Attention");
    assert_eq!(department.severity, Severity::Critical);

    let engine = RiskEngine::new(EngineConfig::new(GpaScale::Ten));
    let assessments: Vec<_> = engine
        .assess_batch(&students)
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    let report = build_report(&ReportInput {
        gpa_scale: GpaScale::Ten,
        generated_at: chrono::Utc::now(),
        assessments: &assessments,
        rejected: &rejected,
        insights: &insights,
        top: 2,
    });
    assert!(report.contains("- stu-002 score 0.70 (high)"));
    assert!(!report.contains("- stu-001 score"));
    assert!(report.contains("field `gpa`"));
}
