//! Validation and enrichment of provider rows

use crate::error::{Error, FieldViolation, Result};
use crate::pipeline::{FieldKind, FieldRule, PipelineDefinition, UnknownFields, BATCHED_AT};
use crate::types::{JsonObject, JsonValue, Record, DATE_FORMAT};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Number;
use std::collections::HashSet;

/// A validated row, tagged with its pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pipeline: String,
    fields: JsonObject,
    batched_at: DateTime<Utc>,
}

impl EnrichedRecord {
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Validated fields, without the ingestion timestamp
    pub fn fields(&self) -> &JsonObject {
        &self.fields
    }

    pub fn batched_at(&self) -> DateTime<Utc> {
        self.batched_at
    }

    /// The row as written to the sink
    pub fn to_json(&self) -> JsonObject {
        let mut row = self.fields.clone();
        row.insert(
            BATCHED_AT.to_string(),
            JsonValue::String(self.batched_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        row
    }

    /// One NDJSON line, newline included
    pub fn to_ndjson_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(&self.to_json())?;
        line.push('\n');
        Ok(line)
    }
}

/// Applies a pipeline's validation rules to provider rows
#[derive(Debug, Clone, Copy, Default)]
pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Self
    }

    /// Validate and enrich one row, stamping it with the current time
    pub fn transform(&self, record: &Record, pipeline: &PipelineDefinition) -> Result<EnrichedRecord> {
        self.transform_at(record, pipeline, Utc::now())
    }

    /// Validate and enrich one row with an explicit ingestion time
    pub fn transform_at(
        &self,
        record: &Record,
        pipeline: &PipelineDefinition,
        batched_at: DateTime<Utc>,
    ) -> Result<EnrichedRecord> {
        let mut violations = Vec::new();
        let fields = validate_object(
            "",
            record,
            &pipeline.rules,
            pipeline.unknown_fields,
            &mut violations,
        );

        if !violations.is_empty() {
            return Err(Error::Validation {
                pipeline: pipeline.name.clone(),
                violations,
            });
        }

        Ok(EnrichedRecord {
            pipeline: pipeline.name.clone(),
            fields,
            batched_at,
        })
    }
}

fn validate_object(
    prefix: &str,
    record: &JsonObject,
    rules: &[FieldRule],
    unknown: UnknownFields,
    violations: &mut Vec<FieldViolation>,
) -> JsonObject {
    let mut out = JsonObject::new();

    for rule in rules {
        let path = format!("{prefix}{}", rule.name);
        let value = record.get(rule.source_key()).filter(|v| !v.is_null());

        let converted = match value {
            None if rule.required => {
                violations.push(FieldViolation::new(&path, "missing"));
                continue;
            }
            None => match rule.kind {
                FieldKind::Repeated(_) => JsonValue::Array(Vec::new()),
                _ => JsonValue::Null,
            },
            Some(value) => match convert(&path, value, rule, unknown, violations) {
                Some(v) => v,
                None => continue,
            },
        };
        out.insert(rule.name.clone(), converted);
    }

    if unknown != UnknownFields::Strip {
        let known: HashSet<&str> = rules.iter().map(FieldRule::source_key).collect();
        for (key, value) in record {
            if known.contains(key.as_str()) {
                continue;
            }
            match unknown {
                UnknownFields::Reject => violations.push(FieldViolation::new(
                    format!("{prefix}{key}"),
                    "unexpected field",
                )),
                _ => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
    }

    out
}

/// Convert one present value, recording a violation when it has the wrong type
fn convert(
    path: &str,
    value: &JsonValue,
    rule: &FieldRule,
    unknown: UnknownFields,
    violations: &mut Vec<FieldViolation>,
) -> Option<JsonValue> {
    let converted = match &rule.kind {
        FieldKind::String => value.as_str().map(|s| JsonValue::String(s.to_string())),
        FieldKind::Numeric => to_number(value).map(JsonValue::Number),
        FieldKind::Date => value
            .as_str()
            .filter(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok())
            .map(|s| JsonValue::String(s.to_string())),
        FieldKind::Timestamp => value.as_str().and_then(parse_timestamp).map(|ts| {
            JsonValue::String(ts.to_rfc3339_opts(SecondsFormat::Secs, true))
        }),
        FieldKind::Repeated(nested) => {
            let Some(items) = value.as_array() else {
                violations.push(FieldViolation::new(path, "expected an array"));
                return None;
            };
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{i}]");
                match item.as_object() {
                    Some(obj) => out.push(JsonValue::Object(validate_object(
                        &format!("{item_path}."),
                        obj,
                        nested,
                        unknown,
                        violations,
                    ))),
                    None => violations.push(FieldViolation::new(item_path, "expected a record")),
                }
            }
            return Some(JsonValue::Array(out));
        }
    };

    if converted.is_none() {
        violations.push(FieldViolation::new(
            path,
            format!("expected {}", rule.kind.column_type()),
        ));
    }
    converted
}

/// Numbers pass through; numeric strings become numbers
///
/// Integers stay exact; anything with a fraction or exponent goes through f64.
fn to_number(value: &JsonValue) -> Option<Number> {
    match value {
        JsonValue::Number(n) => Some(n.clone()),
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Number::from(i));
            }
            if let Ok(u) = s.parse::<u64>() {
                return Some(Number::from(u));
            }
            s.parse::<f64>().ok().and_then(Number::from_f64)
        }
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
