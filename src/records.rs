use anyhow::{bail, Context};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::EngineError;
use crate::models::{RiskLevel, StudentRecord};

/// Parses a JSON array of loosely typed student rows. The outer document must be
/// an array; each row converts independently so one bad row does not sink the batch.
pub fn parse_records(json: &str) -> anyhow::Result<Vec<Result<StudentRecord, EngineError>>> {
    let document: Value = serde_json::from_str(json).context("records are not valid JSON")?;
    let Value::Array(rows) = document else {
        bail!("expected a JSON array of student records");
    };

    Ok(rows
        .iter()
        .enumerate()
        .map(|(position, row)| {
            let result = record_from_value(position, row);
            if let Err(err) = &result {
                warn!(row = position, error = %err, "rejected student record");
            }
            result
        })
        .collect())
}

/// Separates parsed rows into usable records and the errors for rejected rows,
/// preserving input order within each side.
pub fn partition_rows(
    rows: Vec<Result<StudentRecord, EngineError>>,
) -> (Vec<StudentRecord>, Vec<EngineError>) {
    let mut valid = Vec::new();
    let mut rejected = Vec::new();
    for row in rows {
        match row {
            Ok(record) => valid.push(record),
            Err(err) => rejected.push(err),
        }
    }
    (valid, rejected)
}

pub fn record_from_value(position: usize, row: &Value) -> Result<StudentRecord, EngineError> {
    let fallback_id = format!("row-{position}");
    let Some(fields) = row.as_object() else {
        return Err(EngineError::invalid(&fallback_id, "record", "is not a JSON object"));
    };

    let id = text_field(fields, &["id"]).unwrap_or(fallback_id);
    let name = text_field(fields, &["name"]).unwrap_or_default();
    let department = text_field(fields, &["department"]).unwrap_or_default();

    Ok(StudentRecord {
        year: year_field(fields),
        gpa: numeric_field(&id, fields, &["gpa"])?,
        attendance_rate: numeric_field(&id, fields, &["attendance_rate", "attendance"])?,
        engagement_score: numeric_field(&id, fields, &["engagement_score", "engagement"])?,
        risk_level: risk_level_field(&id, fields)?,
        id,
        name,
        department,
    })
}

fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<(&'a str, &'a Value)> {
    keys.iter().find_map(|key| {
        fields
            .get_key_value(*key)
            .map(|(name, value)| (name.as_str(), value))
    })
}

fn text_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match lookup(fields, keys)?.1 {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Numbers and numeric strings are accepted; null and blank strings mean absent.
fn numeric_field(
    record_id: &str,
    fields: &Map<String, Value>,
    keys: &[&str],
) -> Result<Option<f64>, EngineError> {
    let Some((field, value)) = lookup(fields, keys) else {
        return Ok(None);
    };

    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => number.as_f64(),
        Value::String(text) if text.trim().is_empty() => return Ok(None),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(number) if number.is_finite() => Ok(Some(number)),
        _ => Err(EngineError::invalid(
            record_id,
            field,
            format!("is not a number: {value}"),
        )),
    }
}

/// Absent or non-numeric years fall back to first year rather than failing.
/// Fractional years truncate toward zero whether sent as numbers or strings.
fn year_field(fields: &Map<String, Value>) -> Option<i64> {
    let truncate = |year: f64| year.is_finite().then(|| year.trunc() as i64);
    match lookup(fields, &["year"])?.1 {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(truncate)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(truncate))
        }
        _ => None,
    }
}

fn risk_level_field(
    record_id: &str,
    fields: &Map<String, Value>,
) -> Result<Option<RiskLevel>, EngineError> {
    match lookup(fields, &["risk_level"]) {
        None | Some((_, Value::Null)) => Ok(None),
        Some((_, Value::String(text))) if text.trim().is_empty() => Ok(None),
        Some((field, Value::String(text))) => text
            .parse::<RiskLevel>()
            .map(Some)
            .map_err(|reason| EngineError::invalid(record_id, field, reason)),
        Some((field, other)) => Err(EngineError::invalid(
            record_id,
            field,
            format!("is not a risk level: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_strings_and_blanks() {
        let json = r#"[
            {"id": "s1", "name": "Avery Lee", "department": "Physics", "year": 2,
             "gpa": "3.4", "attendance": 88, "engagement_score": "", "risk_level": "Medium"}
        ]"#;
        let records = parse_records(json).unwrap();
        let record = records[0].as_ref().unwrap();
        assert_eq!(record.id, "s1");
        assert_eq!(record.year, Some(2));
        assert_eq!(record.gpa, Some(3.4));
        assert_eq!(record.attendance_rate, Some(88.0));
        assert_eq!(record.engagement_score, None);
        assert_eq!(record.risk_level, Some(RiskLevel::Medium));
    }

    #[test]
    fn unparsable_measurement_is_invalid_input() {
        let json = r#"[
            {"id": "s1", "gpa": "abc"},
            {"id": "s2", "gpa": 3.1}
        ]"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 2);
        match &records[0] {
            Err(EngineError::InvalidInput {
                record_id, field, ..
            }) => {
                assert_eq!(record_id, "s1");
                assert_eq!(field, "gpa");
            }
            other => panic!("expected invalid input, got {other:?}"),
        }
        assert!(records[1].is_ok());
    }

    #[test]
    fn non_numeric_year_defaults_and_missing_id_uses_row() {
        let json = r#"[{"name": "Jules Moreno", "year": "third"}]"#;
        let records = parse_records(json).unwrap();
        let record = records[0].as_ref().unwrap();
        assert_eq!(record.id, "row-0");
        assert_eq!(record.year, None);
        assert_eq!(record.effective_year(), 1);
    }

    #[test]
    fn fractional_years_truncate_for_numbers_and_strings() {
        let json = r#"[
            {"id": "s1", "year": "3.0"},
            {"id": "s2", "year": 3.0},
            {"id": "s3", "year": " 2.7 "},
            {"id": "s4", "year": -1e30},
            {"id": "s5", "year": "NaN"}
        ]"#;
        let years: Vec<Option<i64>> = parse_records(json)
            .unwrap()
            .into_iter()
            .map(|record| record.unwrap().year)
            .collect();
        assert_eq!(years, vec![Some(3), Some(3), Some(2), Some(i64::MIN), None]);
    }

    #[test]
    fn rejects_unknown_risk_level_and_non_objects() {
        let json = r#"[{"id": "s1", "risk_level": "severe"}, 42]"#;
        let records = parse_records(json).unwrap();
        assert!(records[0].is_err());
        assert!(matches!(
            &records[1],
            Err(EngineError::InvalidInput { record_id, .. }) if record_id == "row-1"
        ));
    }

    #[test]
    fn partition_keeps_every_rejected_row() {
        let json = r#"[
            {"id": "s1", "gpa": "bad"},
            {"id": "s2", "gpa": 3.1},
            {"id": "s3", "attendance_rate": "??"},
            {"id": "s4"}
        ]"#;
        let (valid, rejected) = partition_rows(parse_records(json).unwrap());
        let ids: Vec<&str> = valid.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s4"]);
        let rejected_ids: Vec<&str> = rejected
            .iter()
            .map(|EngineError::InvalidInput { record_id, .. }| record_id.as_str())
            .collect();
        assert_eq!(rejected_ids, vec!["s1", "s3"]);
    }

    #[test]
    fn outer_document_must_be_array() {
        assert!(parse_records(r#"{"id": "s1"}"#).is_err());
        assert!(parse_records("not json").is_err());
    }
}
