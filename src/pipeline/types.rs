//! Pipeline definition and sink schema types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the ingestion timestamp column added to every row
pub const BATCHED_AT: &str = "_batched_at";

// ============================================================================
// Validation Rules
// ============================================================================

/// Type a field must have after transformation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// Number, or a string holding one
    Numeric,
    /// `YYYY-MM-DD`
    Date,
    /// RFC 3339, or the provider's `+0000` offset form
    Timestamp,
    /// Array of nested records
    Repeated(Vec<FieldRule>),
}

impl FieldKind {
    /// Warehouse column type
    pub fn column_type(&self) -> &'static str {
        match self {
            FieldKind::String => "STRING",
            FieldKind::Numeric => "NUMERIC",
            FieldKind::Date => "DATE",
            FieldKind::Timestamp => "TIMESTAMP",
            FieldKind::Repeated(_) => "RECORD",
        }
    }
}

/// A single validation rule, one per output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    /// Output column name
    pub name: String,
    /// Provider key when it differs from `name` (e.g. `1d_view` for `_1d_view`)
    pub source: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            source: None,
            kind,
            required: false,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn numeric(name: &str) -> Self {
        Self::new(name, FieldKind::Numeric)
    }

    pub fn date(name: &str) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn timestamp(name: &str) -> Self {
        Self::new(name, FieldKind::Timestamp)
    }

    pub fn repeated(name: &str, fields: Vec<FieldRule>) -> Self {
        Self::new(name, FieldKind::Repeated(fields))
    }

    /// Mark the field as required
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Read the value from a differently-named provider key
    #[must_use]
    pub fn from_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Key looked up in the provider record
    pub fn source_key(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }

    /// Warehouse column for this rule
    pub fn to_table_field(&self) -> TableField {
        match &self.kind {
            FieldKind::Repeated(fields) => TableField {
                name: self.name.clone(),
                field_type: self.kind.column_type().to_string(),
                mode: Some("REPEATED".to_string()),
                fields: Some(fields.iter().map(FieldRule::to_table_field).collect()),
            },
            kind => TableField::new(&self.name, kind.column_type()),
        }
    }
}

/// What happens to provider fields no rule describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFields {
    /// Copied to the output unchanged
    Passthrough,
    /// Dropped silently
    #[default]
    Strip,
    /// The record fails validation
    Reject,
}

// ============================================================================
// Pipeline Definition
// ============================================================================

/// A statically defined report pipeline
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    /// Unique name, used in table and task names
    pub name: String,
    /// Report level (`ad`, `account`, ...)
    pub level: String,
    /// Fields requested from the provider
    pub fields: Vec<String>,
    /// Comma separated breakdowns, if any
    pub breakdowns: Option<String>,
    pub attribution_windows: Vec<String>,
    /// Provider-side filters sent with the report request
    pub filtering: Vec<Value>,
    pub rules: Vec<FieldRule>,
    pub unknown_fields: UnknownFields,
}

impl PipelineDefinition {
    /// Schema of the sink table: every rule plus the ingestion timestamp
    pub fn sink_schema(&self) -> TableSchema {
        let mut fields: Vec<TableField> =
            self.rules.iter().map(FieldRule::to_table_field).collect();
        fields.push(TableField::new(BATCHED_AT, "TIMESTAMP"));
        TableSchema { fields }
    }

    /// Sink table for one account
    pub fn table_name(&self, account_id: &str) -> String {
        format!("p_{}__{account_id}", self.name)
    }

    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.name == name)
    }
}

// ============================================================================
// Table Schema
// ============================================================================

/// Warehouse table schema, in the BigQuery `{fields: [...]}` shape
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<TableField>,
}

/// A warehouse column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<TableField>>,
}

impl TableField {
    pub fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: None,
            fields: None,
        }
    }

    fn normalized_mode(&self) -> String {
        self.mode
            .as_deref()
            .unwrap_or("NULLABLE")
            .to_ascii_uppercase()
    }
}

impl TableSchema {
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Describe the first conflict with an existing schema, if any
    ///
    /// Types and modes compare case-insensitively and an absent mode means
    /// `NULLABLE`, matching how the warehouse reports schemas back.
    pub fn conflict_with(&self, existing: &TableSchema) -> Option<String> {
        diff_fields("", &self.fields, &existing.fields)
    }
}

fn diff_fields(prefix: &str, wanted: &[TableField], existing: &[TableField]) -> Option<String> {
    if wanted.len() != existing.len() {
        let wanted_names: Vec<&str> = wanted.iter().map(|f| f.name.as_str()).collect();
        let existing_names: Vec<&str> = existing.iter().map(|f| f.name.as_str()).collect();
        return Some(format!(
            "{prefix}expected columns {wanted_names:?}, table has {existing_names:?}"
        ));
    }

    for field in wanted {
        let Some(other) = existing.iter().find(|f| f.name == field.name) else {
            return Some(format!("{prefix}column {} is missing", field.name));
        };
        if !field.field_type.eq_ignore_ascii_case(&other.field_type) {
            return Some(format!(
                "{prefix}column {} is {}, expected {}",
                field.name, other.field_type, field.field_type
            ));
        }
        if field.normalized_mode() != other.normalized_mode() {
            return Some(format!(
                "{prefix}column {} has mode {}, expected {}",
                field.name,
                other.normalized_mode(),
                field.normalized_mode()
            ));
        }
        let nested_prefix = format!("{prefix}{}.", field.name);
        if let Some(conflict) = diff_fields(
            &nested_prefix,
            field.fields.as_deref().unwrap_or_default(),
            other.fields.as_deref().unwrap_or_default(),
        ) {
            return Some(conflict);
        }
    }

    None
}
