use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::{PhotoData, Report, SyncStatusPolicy, MAX_CELL_CHARS};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("report is not an object")]
    NotAnObject,

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("field {field} exceeds {} characters", MAX_CELL_CHARS)]
    FieldTooLong { field: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RejectedItem {
    pub index: usize,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct BatchValidation {
    pub accepted: Vec<Report>,
    pub rejected: Vec<RejectedItem>,
}

// Canonical key first, then the keys sent by the older mobile client.
const ID: &[&str] = &["id"];
const TIMESTAMP: &[&str] = &["timestamp", "fecha"];
const SHIFT: &[&str] = &["shift", "turno"];
const REPORT_TYPE: &[&str] = &["reportType", "tipo"];
const EQUIPMENT: &[&str] = &["equipment", "equipo"];
const DESCRIPTION: &[&str] = &["description", "descripcion"];
const OPERATOR: &[&str] = &["operator", "operador"];
const AREA: &[&str] = &["area"];
const SYNC_STATUS: &[&str] = &["syncStatus"];
const PHOTO: &[&str] = &["photoReference", "photo", "foto"];

/// Normalize one raw record into a `Report`. Pure.
pub fn validate(raw: &Value, policy: &SyncStatusPolicy) -> Result<Report, Rejection> {
    let obj = raw.as_object().ok_or(Rejection::NotAnObject)?;
    let field = |keys: &[&str]| -> String {
        keys.iter()
            .map(|k| coerce(obj.get(*k)))
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    };

    let report = Report {
        id: field(ID),
        timestamp: field(TIMESTAMP),
        shift: field(SHIFT),
        report_type: field(REPORT_TYPE),
        equipment: field(EQUIPMENT),
        description: field(DESCRIPTION),
        operator: field(OPERATOR),
        area: field(AREA),
        sync_status: policy.resolve(&field(SYNC_STATUS)),
        photo: photo(&field(PHOTO)),
    };

    let columns = [
        ("id", &report.id),
        ("timestamp", &report.timestamp),
        ("shift", &report.shift),
        ("reportType", &report.report_type),
        ("equipment", &report.equipment),
        ("description", &report.description),
        ("operator", &report.operator),
        ("area", &report.area),
        ("syncStatus", &report.sync_status),
    ];

    let missing: Vec<&'static str> = columns[..6]
        .iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(Rejection::MissingFields(missing));
    }

    // the store cannot hold it, so reject here instead of failing the batch
    if let Some((field, _)) = columns
        .iter()
        .find(|(_, v)| v.chars().count() > MAX_CELL_CHARS)
    {
        return Err(Rejection::FieldTooLong { field: *field });
    }
    Ok(report)
}

/// Validate every item, keeping accepted reports in input order.
pub fn validate_batch(items: &[Value], policy: &SyncStatusPolicy) -> BatchValidation {
    let mut out = BatchValidation::default();
    for (index, raw) in items.iter().enumerate() {
        match validate(raw, policy) {
            Ok(report) => out.accepted.push(report),
            Err(reason) => out.rejected.push(RejectedItem {
                index,
                reason: reason.to_string(),
            }),
        }
    }
    out
}

fn coerce(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

fn photo(raw: &str) -> Option<PhotoData> {
    if raw.is_empty() {
        return None;
    }
    let parsed = PhotoData::parse(raw);
    if parsed.is_none() {
        warn!(len = raw.len(), "photo is not a base64 image data URL; ignoring it");
    }
    parsed
}
