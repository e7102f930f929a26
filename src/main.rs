use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use student_risk_engine::models::{InsightReport, RiskAssessment, StudentRecord};
use student_risk_engine::report::{self, ReportInput};
use student_risk_engine::{
    derive_insights, records, risk, ConfidencePolicy, EngineConfig, EngineError, GpaScale,
    RiskEngine,
};

#[derive(Parser)]
#[command(name = "student-risk")]
#[command(
    about = "Dropout risk scoring and cohort insights for student records",
    long_about = None
)]
struct Cli {
    /// GPA scale used by the input records
    #[arg(long, value_enum, env = "RISK_GPA_SCALE", global = true)]
    gpa_scale: Option<GpaScale>,
    /// TOML engine configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Lower confidence for each measurement missing from a record
    #[arg(long, global = true)]
    confidence_degrade: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every student in the input file
    Assess {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Derive cohort insights and summary statistics
    Insights {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List students whose stored risk level disagrees with a fresh score
    Drift {
        #[arg(long)]
        input: PathBuf,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "risk-report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[derive(Serialize)]
#[serde(untagged)]
enum AssessmentRow {
    Assessed(RiskAssessment),
    Rejected { error: String },
}

#[derive(Serialize)]
struct InsightsOutput {
    #[serde(flatten)]
    report: InsightReport,
    rejected: Vec<String>,
}

type Rows = Vec<Result<StudentRecord, EngineError>>;

fn resolve_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match (&cli.config, cli.gpa_scale) {
        (Some(path), scale) => {
            let mut loaded = EngineConfig::load(path)?;
            if let Some(scale) = scale {
                loaded.gpa_scale = scale;
            }
            loaded
        }
        (None, Some(scale)) => EngineConfig::new(scale),
        (None, None) => bail!("a GPA scale is required: pass --gpa-scale four|ten or --config"),
    };
    if cli.confidence_degrade {
        config = config.with_confidence(ConfidencePolicy::degrade_from_default())?;
    }
    Ok(config)
}

fn read_rows(path: &Path) -> anyhow::Result<Rows> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let rows = records::parse_records(&content)
        .with_context(|| format!("failed to load records from {}", path.display()))?;

    let rejected = rows.iter().filter(|row| row.is_err()).count();
    info!(
        loaded = rows.len() - rejected,
        rejected,
        "read student records from {}",
        path.display()
    );
    Ok(rows)
}

fn print_rejected(rejected: &[EngineError]) {
    for err in rejected {
        println!("! {err}");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let engine = RiskEngine::new(config);

    match cli.command {
        Commands::Assess { input, limit, json } => {
            let rows = read_rows(&input)?;
            let results = engine.assess_rows(&rows);

            if json {
                let output: Vec<AssessmentRow> = results
                    .into_iter()
                    .map(|result| match result {
                        Ok(assessment) => AssessmentRow::Assessed(assessment),
                        Err(err) => AssessmentRow::Rejected {
                            error: err.to_string(),
                        },
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }

            let mut assessments = Vec::new();
            let mut failures = Vec::new();
            for result in results {
                match result {
                    Ok(assessment) => assessments.push(assessment),
                    Err(err) => failures.push(err),
                }
            }

            if assessments.is_empty() {
                println!("No students could be assessed.");
            } else {
                println!("Top students by risk score:");
                for assessment in risk::rank_by_score(&assessments).iter().take(limit) {
                    println!(
                        "- {} score {:.2} ({}, confidence {:.2})",
                        assessment.student_id,
                        assessment.score,
                        assessment.level,
                        assessment.confidence
                    );
                }
            }
            print_rejected(&failures);
        }
        Commands::Insights { input, json } => {
            let (students, rejected) = records::partition_rows(read_rows(&input)?);
            let report = derive_insights(&students, engine.config().gpa_scale)?;

            if json {
                let output = InsightsOutput {
                    report,
                    rejected: rejected.iter().map(|err| err.to_string()).collect(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }

            let stats = &report.stats;
            println!(
                "{} students analyzed, {} high risk, avg GPA {:.2}, avg attendance {:.1}%",
                stats.students_analyzed,
                stats.high_risk_count,
                stats.avg_gpa,
                stats.avg_attendance
            );
            for insight in report.insights.iter() {
                println!(
                    "- [{}] {}: {}",
                    insight.severity.as_str(),
                    insight.title,
                    insight.description
                );
            }
            print_rejected(&rejected);
        }
        Commands::Drift { input } => {
            let (students, rejected) = records::partition_rows(read_rows(&input)?);
            let drift = engine.reconcile(&students);

            if drift.is_empty() {
                println!("Stored risk levels match fresh scores.");
            } else {
                println!("Stored risk levels that disagree with fresh scores:");
                for entry in drift.iter() {
                    println!(
                        "- {} ({}) stored {} now {} (score {:.2})",
                        entry.student_name,
                        entry.student_id,
                        entry
                            .stored
                            .map(|level| level.to_string())
                            .unwrap_or_else(|| "none".to_string()),
                        entry.fresh,
                        entry.score
                    );
                }
            }
            print_rejected(&rejected);
        }
        Commands::Report { input, out, top } => {
            let (students, mut rejected) = records::partition_rows(read_rows(&input)?);
            let mut assessments = Vec::new();
            for result in engine.assess_batch(&students) {
                match result {
                    Ok(assessment) => assessments.push(assessment),
                    Err(err) => rejected.push(err),
                }
            }
            let valid: Vec<StudentRecord> = students
                .into_iter()
                .filter(|record| record.validate().is_ok())
                .collect();
            let insights = derive_insights(&valid, engine.config().gpa_scale)?;

            let report = report::build_report(&ReportInput {
                gpa_scale: engine.config().gpa_scale,
                generated_at: chrono::Utc::now(),
                assessments: &assessments,
                rejected: &rejected,
                insights: &insights,
                top,
            });
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
