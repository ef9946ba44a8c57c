//! Loaded resource model.
//!
//! Resources are created once at load and immutable afterward. A resource is
//! identified by its primary id and may carry an opaque ref and any number of
//! aliases; all three forms participate in identity (see
//! [`crate::cache::ResourceCache`]).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ruleguard_types::{ResourceId, ResourceIdKind, SeverityLevel};

use crate::expr::ExpressionTree;

/// The closed set of resource kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Rule,
    Baseline,
    Selector,
    ModuleConfig,
    Convention,
    SuppressionGroup,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Rule => "Rule",
            ResourceKind::Baseline => "Baseline",
            ResourceKind::Selector => "Selector",
            ResourceKind::ModuleConfig => "ModuleConfig",
            ResourceKind::Convention => "Convention",
            ResourceKind::SuppressionGroup => "SuppressionGroup",
        }
    }
}

/// Where a resource was loaded from, for error context.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Metadata common to every resource kind.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    /// Taxonomy labels; each key maps to a set of values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Value>,
}

/// A loaded resource of any kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,

    /// Stable opaque reference, preserved across renames.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<ResourceId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<ResourceId>,

    #[serde(default)]
    pub metadata: ResourceMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,

    #[serde(flatten)]
    pub spec: ResourceSpec,
}

impl Resource {
    pub fn new(id: ResourceId, spec: ResourceSpec) -> Self {
        Self {
            id,
            ref_id: None,
            aliases: Vec::new(),
            metadata: ResourceMetadata::default(),
            source: None,
            spec,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match &self.spec {
            ResourceSpec::Rule(_) => ResourceKind::Rule,
            ResourceSpec::Baseline(_) => ResourceKind::Baseline,
            ResourceSpec::Selector(_) => ResourceKind::Selector,
            ResourceSpec::ModuleConfig(_) => ResourceKind::ModuleConfig,
            ResourceSpec::Convention(_) => ResourceKind::Convention,
            ResourceSpec::SuppressionGroup(_) => ResourceKind::SuppressionGroup,
        }
    }

    /// Every id form this resource answers to, with the kind it carries.
    pub fn effective_ids(&self) -> impl Iterator<Item = (ResourceId, ResourceIdKind)> + '_ {
        let primary = std::iter::once((self.id.as_kind(ResourceIdKind::Id), ResourceIdKind::Id));
        let by_ref = self
            .ref_id
            .iter()
            .map(|id| (id.as_kind(ResourceIdKind::Ref), ResourceIdKind::Ref));
        let by_alias = self
            .aliases
            .iter()
            .map(|id| (id.as_kind(ResourceIdKind::Alias), ResourceIdKind::Alias));
        primary.chain(by_ref).chain(by_alias)
    }

    pub fn as_rule(&self) -> Option<&RuleSpec> {
        match &self.spec {
            ResourceSpec::Rule(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn as_selector(&self) -> Option<&SelectorSpec> {
        match &self.spec {
            ResourceSpec::Selector(spec) => Some(spec),
            _ => None,
        }
    }
}

/// Kind-specific payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum ResourceSpec {
    Rule(RuleSpec),
    Baseline(BaselineSpec),
    Selector(SelectorSpec),
    ModuleConfig(ModuleConfigSpec),
    Convention(ConventionSpec),
    SuppressionGroup(SuppressionGroupSpec),
}

/// A rule definition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    /// The raw condition tree; compiled when the run is built.
    pub condition: ExpressionTree,

    /// Declared severity. `None` normalizes to `Error` at run build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<SeverityLevel>,

    /// Target type preconditions; empty means any type.
    #[serde(default, rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub type_of: Vec<String>,

    /// Named selector preconditions; any matching selector satisfies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub with: Vec<String>,

    /// Inline sub-selector precondition.
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_if: Option<ExpressionTree>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceId>,
}

/// A named selector: a bare condition tree reusable from rule preconditions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSpec {
    #[serde(rename = "if")]
    pub condition: ExpressionTree,
}

/// A baseline: a named bundle of rule filter settings plus configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tag: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: BTreeMap<String, Value>,
}

/// Module-scoped default configuration, overridden by baseline and run
/// configuration in that order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfigSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: BTreeMap<String, Value>,
}

/// A convention participates in run ordering but carries no condition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConventionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

/// Suppresses listed rules for objects matching the condition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuppressionGroupSpec {
    /// Rule names or ids this group suppresses. Empty means all rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule: Vec<String>,

    #[serde(rename = "if")]
    pub condition: ExpressionTree,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruleguard_types::ResourceIdKind;
    use serde_json::json;

    #[test]
    fn effective_ids_cover_ref_and_aliases() {
        let mut resource = Resource::new(
            ResourceId::parse("module/Rule1", ResourceIdKind::Id).unwrap(),
            ResourceSpec::Rule(RuleSpec::default()),
        );
        resource.ref_id = Some(ResourceId::parse("module/RG-0001", ResourceIdKind::Ref).unwrap());
        resource.aliases =
            vec![ResourceId::parse("module/OldRule1", ResourceIdKind::Alias).unwrap()];

        let ids: Vec<_> = resource.effective_ids().collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0].1, ResourceIdKind::Id);
        assert_eq!(ids[1].1, ResourceIdKind::Ref);
        assert_eq!(ids[2].1, ResourceIdKind::Alias);
        assert_eq!(ids[2].0.name(), "OldRule1");
    }

    #[test]
    fn rule_spec_deserializes_from_document_form() {
        let resource: Resource = serde_json::from_value(json!({
            "id": "module/Rule1",
            "kind": "Rule",
            "spec": {
                "condition": { "field": "Name", "exists": true },
                "level": "warning",
                "type": ["App.Service"],
                "dependsOn": ["module/Rule0"],
            },
        }))
        .unwrap();

        assert_eq!(resource.kind(), ResourceKind::Rule);
        let rule = resource.as_rule().unwrap();
        assert_eq!(rule.level, Some(ruleguard_types::SeverityLevel::Warning));
        assert_eq!(rule.type_of, ["App.Service"]);
        assert_eq!(rule.depends_on.len(), 1);
    }

    #[test]
    fn selector_spec_uses_if_key() {
        let resource: Resource = serde_json::from_value(json!({
            "id": "module/IsService",
            "kind": "Selector",
            "spec": { "if": { "field": "kind", "equals": "service" } },
        }))
        .unwrap();
        assert_eq!(resource.kind(), ResourceKind::Selector);
        assert!(resource.as_selector().is_some());
    }
}
