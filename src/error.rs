use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid input for record {record_id}: field `{field}` {reason}")]
    InvalidInput {
        record_id: String,
        field: String,
        reason: String,
    },
}

impl EngineError {
    pub fn invalid(record_id: &str, field: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            record_id: record_id.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
