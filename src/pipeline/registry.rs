//! Built-in pipelines and lookup by name

use super::types::{FieldRule, PipelineDefinition, UnknownFields};
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Attribution windows requested for every built-in pipeline
pub const ATTRIBUTION_WINDOWS: &[&str] = &["1d_click", "1d_view", "7d_click", "7d_view"];

/// Ad statuses included by the default filter
const EFFECTIVE_STATUSES: &[&str] = &[
    "ACTIVE",
    "PAUSED",
    "DELETED",
    "PENDING_REVIEW",
    "DISAPPROVED",
    "PREAPPROVED",
    "PENDING_BILLING_INFO",
    "CAMPAIGN_PAUSED",
    "ARCHIVED",
    "ADSET_PAUSED",
    "IN_PROCESS",
    "WITH_ISSUES",
];

const ACTION_BREAKDOWNS: &[&str] = &[
    "actions",
    "action_values",
    "cost_per_action_type",
    "cost_per_unique_action_type",
];

const METRICS: &[&str] = &["reach", "impressions", "cpc", "cpm", "ctr", "clicks", "spend"];

static BUILTIN: Lazy<PipelineRegistry> = Lazy::new(|| PipelineRegistry {
    pipelines: vec![
        Arc::new(ads_insights()),
        Arc::new(breakdown_insights("AgeGenderInsights", "account", &["age", "gender"])),
        Arc::new(breakdown_insights("DeviceInsights", "account", &["device_platform"])),
        Arc::new(breakdown_insights(
            "PlatformPositionInsights",
            "account",
            &["publisher_platform", "platform_position"],
        )),
        Arc::new(breakdown_insights("RegionInsights", "account", &["region"])),
    ],
});

/// Set of pipelines the dispatcher fans out over
#[derive(Debug, Clone)]
pub struct PipelineRegistry {
    pipelines: Vec<Arc<PipelineDefinition>>,
}

impl PipelineRegistry {
    /// The built-in pipelines
    pub fn builtin() -> &'static PipelineRegistry {
        &BUILTIN
    }

    /// Build a registry, rejecting duplicate names
    pub fn new(pipelines: Vec<PipelineDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for p in &pipelines {
            if !seen.insert(p.name.clone()) {
                return Err(Error::config(format!(
                    "Pipeline '{}' is defined more than once",
                    p.name
                )));
            }
        }
        Ok(Self {
            pipelines: pipelines.into_iter().map(Arc::new).collect(),
        })
    }

    /// Look up a pipeline by name
    pub fn get(&self, name: &str) -> Result<Arc<PipelineDefinition>> {
        self.pipelines
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| Error::PipelineNotFound {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PipelineDefinition>> {
        self.pipelines.iter()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

// ============================================================================
// Definitions
// ============================================================================

fn default_filtering() -> Vec<Value> {
    vec![
        json!({"field": "ad.impressions", "operator": "GREATER_THAN", "value": 0}),
        json!({"field": "ad.effective_status", "operator": "IN", "value": EFFECTIVE_STATUSES}),
    ]
}

/// Rules for one entry of an action breakdown list
fn action_rules() -> Vec<FieldRule> {
    let mut rules = vec![FieldRule::string("action_type"), FieldRule::numeric("value")];
    for window in ATTRIBUTION_WINDOWS {
        rules.push(FieldRule::numeric(&format!("_{window}")).from_source(window));
    }
    rules
}

fn metric_and_action_rules() -> Vec<FieldRule> {
    let mut rules: Vec<FieldRule> = METRICS.iter().map(|m| FieldRule::numeric(m)).collect();
    rules.extend(
        ACTION_BREAKDOWNS
            .iter()
            .map(|name| FieldRule::repeated(name, action_rules())),
    );
    rules
}

fn requested_fields(dimensions: &[&str]) -> Vec<String> {
    dimensions
        .iter()
        .chain(METRICS)
        .chain(ACTION_BREAKDOWNS)
        .map(|f| (*f).to_string())
        .collect()
}

fn ads_insights() -> PipelineDefinition {
    let dimensions = [
        "date_start",
        "date_stop",
        "account_id",
        "account_name",
        "campaign_id",
        "campaign_name",
        "adset_id",
        "adset_name",
        "ad_id",
        "ad_name",
    ];

    let mut rules = vec![
        FieldRule::date("date_start"),
        FieldRule::date("date_stop"),
        FieldRule::numeric("account_id").required(),
        FieldRule::string("account_name"),
        FieldRule::numeric("campaign_id"),
        FieldRule::string("campaign_name"),
        FieldRule::numeric("adset_id"),
        FieldRule::string("adset_name"),
        FieldRule::numeric("ad_id"),
        FieldRule::string("ad_name"),
    ];
    rules.extend(metric_and_action_rules());

    PipelineDefinition {
        name: "AdsInsights".to_string(),
        level: "ad".to_string(),
        fields: requested_fields(&dimensions),
        breakdowns: None,
        attribution_windows: ATTRIBUTION_WINDOWS.iter().map(ToString::to_string).collect(),
        filtering: default_filtering(),
        rules,
        unknown_fields: UnknownFields::Reject,
    }
}

/// Account-level report split by one or more breakdown columns
fn breakdown_insights(name: &str, level: &str, breakdowns: &[&str]) -> PipelineDefinition {
    let mut rules = vec![
        FieldRule::numeric("account_id").required(),
        FieldRule::date("date_start"),
        FieldRule::date("date_stop"),
    ];
    rules.extend(breakdowns.iter().map(|b| FieldRule::string(b).required()));
    rules.extend(metric_and_action_rules());

    PipelineDefinition {
        name: name.to_string(),
        level: level.to_string(),
        fields: requested_fields(&["date_start", "date_stop", "account_id"]),
        breakdowns: Some(breakdowns.join(",")),
        attribution_windows: ATTRIBUTION_WINDOWS.iter().map(ToString::to_string).collect(),
        filtering: default_filtering(),
        rules,
        unknown_fields: UnknownFields::Reject,
    }
}
