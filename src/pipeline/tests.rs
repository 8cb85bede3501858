//! Tests for the pipeline registry

use super::*;
use crate::error::Error;
use pretty_assertions::assert_eq;
use test_case::test_case;

#[test]
fn test_builtin_registry_names() {
    let registry = PipelineRegistry::builtin();
    assert_eq!(
        registry.names(),
        vec![
            "AdsInsights",
            "AgeGenderInsights",
            "DeviceInsights",
            "PlatformPositionInsights",
            "RegionInsights",
        ]
    );
    assert_eq!(registry.len(), 5);
}

#[test_case("AdsInsights", "ad", None)]
#[test_case("AgeGenderInsights", "account", Some("age,gender"))]
#[test_case("DeviceInsights", "account", Some("device_platform"))]
#[test_case("PlatformPositionInsights", "account", Some("publisher_platform,platform_position"))]
#[test_case("RegionInsights", "account", Some("region"))]
fn test_builtin_report_shape(name: &str, level: &str, breakdowns: Option<&str>) {
    let pipeline = PipelineRegistry::builtin().get(name).unwrap();
    assert_eq!(pipeline.level, level);
    assert_eq!(pipeline.breakdowns.as_deref(), breakdowns);
    assert_eq!(pipeline.unknown_fields, UnknownFields::Reject);
    assert_eq!(pipeline.filtering.len(), 2);
    assert!(pipeline.fields.contains(&"spend".to_string()));
}

#[test]
fn test_unknown_pipeline() {
    let err = PipelineRegistry::builtin().get("VideoInsights").unwrap_err();
    assert!(matches!(err, Error::PipelineNotFound { ref name } if name == "VideoInsights"));
}

#[test]
fn test_sink_schema_is_rules_plus_batched_at() {
    for pipeline in PipelineRegistry::builtin().iter() {
        let schema = pipeline.sink_schema();
        let mut expected: Vec<&str> = pipeline.rules.iter().map(|r| r.name.as_str()).collect();
        expected.push(BATCHED_AT);

        assert_eq!(schema.field_names(), expected, "pipeline {}", pipeline.name);
        let last = schema.fields.last().unwrap();
        assert_eq!(last.field_type, "TIMESTAMP");
    }
}

#[test]
fn test_action_breakdown_columns() {
    let pipeline = PipelineRegistry::builtin().get("AdsInsights").unwrap();
    let actions = pipeline.rule("actions").unwrap();

    let FieldKind::Repeated(nested) = &actions.kind else {
        panic!("actions should be a repeated record");
    };
    let sources: Vec<(&str, &str)> = nested
        .iter()
        .map(|r| (r.name.as_str(), r.source_key()))
        .collect();
    assert_eq!(
        sources,
        vec![
            ("action_type", "action_type"),
            ("value", "value"),
            ("_1d_click", "1d_click"),
            ("_1d_view", "1d_view"),
            ("_7d_click", "7d_click"),
            ("_7d_view", "7d_view"),
        ]
    );

    let field = actions.to_table_field();
    assert_eq!(field.field_type, "RECORD");
    assert_eq!(field.mode.as_deref(), Some("REPEATED"));
    assert_eq!(field.fields.unwrap().len(), 6);
}

#[test]
fn test_breakdown_columns_are_required() {
    let pipeline = PipelineRegistry::builtin().get("AgeGenderInsights").unwrap();
    assert!(pipeline.rule("age").unwrap().required);
    assert!(pipeline.rule("gender").unwrap().required);
    assert!(!pipeline.rule("spend").unwrap().required);
}

#[test]
fn test_table_name() {
    let pipeline = PipelineRegistry::builtin().get("AdsInsights").unwrap();
    assert_eq!(pipeline.table_name("123"), "p_AdsInsights__123");
}

#[test]
fn test_registry_rejects_duplicates() {
    let ads = PipelineRegistry::builtin().get("AdsInsights").unwrap();
    let err = PipelineRegistry::new(vec![(*ads).clone(), (*ads).clone()]).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[test]
fn test_schema_conflict_detection() {
    let schema = PipelineRegistry::builtin()
        .get("RegionInsights")
        .unwrap()
        .sink_schema();

    assert_eq!(schema.conflict_with(&schema), None);

    // The warehouse reports modes explicitly and may lowercase types
    let mut reported = schema.clone();
    for field in &mut reported.fields {
        if field.mode.is_none() {
            field.mode = Some("NULLABLE".to_string());
        }
        field.field_type = field.field_type.to_lowercase();
    }
    assert_eq!(schema.conflict_with(&reported), None);

    let mut retyped = schema.clone();
    retyped.fields[0].field_type = "STRING".to_string();
    let conflict = schema.conflict_with(&retyped).unwrap();
    assert!(conflict.contains("account_id"));

    let mut truncated = schema.clone();
    truncated.fields.pop();
    assert!(schema.conflict_with(&truncated).is_some());
}

#[test]
fn test_table_schema_json_shape() {
    let schema = TableSchema {
        fields: vec![
            TableField::new("spend", "NUMERIC"),
            FieldRule::repeated("actions", vec![FieldRule::string("action_type")]).to_table_field(),
        ],
    };

    assert_eq!(
        serde_json::to_value(&schema).unwrap(),
        serde_json::json!({
            "fields": [
                {"name": "spend", "type": "NUMERIC"},
                {
                    "name": "actions",
                    "type": "RECORD",
                    "mode": "REPEATED",
                    "fields": [{"name": "action_type", "type": "STRING"}]
                }
            ]
        })
    );
}
