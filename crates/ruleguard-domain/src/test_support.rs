//! Builders for constructing resources in tests.
//!
//! Not part of the public contract; kept `pub` so integration tests and
//! downstream crates' tests can assemble fixtures without hand-writing
//! documents.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use ruleguard_types::{ResourceId, ResourceIdKind, SeverityLevel};

use crate::expr::ExpressionTree;
use crate::resource::{
    BaselineSpec, Resource, ResourceSpec, RuleSpec, SelectorSpec, SuppressionGroupSpec,
};

fn id(value: &str) -> ResourceId {
    ResourceId::parse(value, ResourceIdKind::Id).expect("valid resource id")
}

fn tree(value: Value) -> ExpressionTree {
    serde_json::from_value(value).expect("valid expression tree")
}

/// Start building a rule resource.
pub fn rule(rule_id: &str) -> RuleBuilder {
    RuleBuilder {
        id: id(rule_id),
        tags: BTreeMap::new(),
        spec: RuleSpec {
            condition: tree(json!({ "field": "name", "exists": true })),
            ..RuleSpec::default()
        },
    }
}

pub struct RuleBuilder {
    id: ResourceId,
    tags: BTreeMap<String, String>,
    spec: RuleSpec,
}

impl RuleBuilder {
    pub fn condition(mut self, condition: Value) -> Self {
        self.spec.condition = tree(condition);
        self
    }

    pub fn level(mut self, level: SeverityLevel) -> Self {
        self.spec.level = Some(level);
        self
    }

    pub fn type_of(mut self, types: &[&str]) -> Self {
        self.spec.type_of = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_selector(mut self, name: &str) -> Self {
        self.spec.with.push(name.to_string());
        self
    }

    pub fn where_if(mut self, condition: Value) -> Self {
        self.spec.where_if = Some(tree(condition));
        self
    }

    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.spec.depends_on = ids
            .iter()
            .map(|d| ResourceId::parse(d, ResourceIdKind::Unknown).expect("valid dependency id"))
            .collect();
        self
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Resource {
        let mut resource = Resource::new(self.id, ResourceSpec::Rule(self.spec));
        resource.metadata.tags = self.tags;
        resource
    }
}

/// A selector resource with the given condition.
pub fn selector(selector_id: &str, condition: Value) -> Resource {
    Resource::new(
        id(selector_id),
        ResourceSpec::Selector(SelectorSpec {
            condition: tree(condition),
        }),
    )
}

/// A baseline resource with the given include list.
pub fn baseline(baseline_id: &str, include: &[&str]) -> Resource {
    Resource::new(
        id(baseline_id),
        ResourceSpec::Baseline(BaselineSpec {
            include: include.iter().map(|s| s.to_string()).collect(),
            ..BaselineSpec::default()
        }),
    )
}

/// A suppression group over the named rules.
pub fn suppression_group(group_id: &str, rules: &[&str], condition: Value) -> Resource {
    Resource::new(
        id(group_id),
        ResourceSpec::SuppressionGroup(SuppressionGroupSpec {
            rule: rules.iter().map(|s| s.to_string()).collect(),
            condition: tree(condition),
        }),
    )
}
