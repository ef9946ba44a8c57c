use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `ruleguard.toml` schema v1.
///
/// This is a *user-facing* config model: it is intentionally permissive so forward-compat is easy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuleguardConfigV1 {
    /// Optional schema string for tooling (`ruleguard.config.v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Baseline id supplying default rule selection and configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,

    #[serde(default)]
    pub rule: RuleConfig,

    #[serde(default, rename = "override")]
    pub overrides: OverrideConfig,

    /// Free-form configuration values handed to the run.
    #[serde(default)]
    pub configuration: BTreeMap<String, serde_json::Value>,
}

/// Which rules a run executes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuleConfig {
    /// Rule names or ids to run; one entry may be a wildcard pattern.
    #[serde(default)]
    pub include: Vec<String>,

    /// Rule names or ids to skip; wins over include.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Required tags; value `*` accepts any value for the key.
    #[serde(default)]
    pub tag: BTreeMap<String, String>,

    /// Required taxonomy labels; each key maps to accepted values.
    #[serde(default)]
    pub labels: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OverrideConfig {
    /// Map of rule name or id -> severity: `error`, `warning`, `information`.
    #[serde(default)]
    pub level: BTreeMap<String, String>,
}
