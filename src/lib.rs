//! Dropout-risk scoring and cohort insights for student records.
//!
//! [`risk::RiskEngine`] produces a fresh [`models::RiskAssessment`] per record;
//! [`insights::derive_insights`] summarises a cohort from the records as stored.

pub mod config;
pub mod error;
pub mod insights;
pub mod models;
pub mod records;
pub mod report;
pub mod risk;

pub use config::{ConfidencePolicy, EngineConfig, GpaScale};
pub use error::EngineError;
pub use insights::derive_insights;
pub use models::{
    AggregateInsight, InsightReport, RealtimeStats, RiskAssessment, RiskLevel, StudentRecord,
};
pub use risk::RiskEngine;
