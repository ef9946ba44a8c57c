//! Run construction.
//!
//! A `Run` is one execution unit: the compiled, dependency-ordered rule graph
//! plus merged configuration and the severity override map. Everything
//! fallible happens here, before any object is evaluated. The run itself is
//! immutable and can be shared across workers.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use ruleguard_types::{ResourceId, ResourceIdKind, SeverityLevel};

use crate::cache::ResourceCache;
use crate::error::ConfigError;
use crate::expr::CompiledExpression;
use crate::filter::RuleFilter;
use crate::graph::{
    DependencyGraph, DependencyGraphBuilder, DependencyTarget, DependencyTargetCollection,
};
use crate::resource::{Resource, ResourceSpec};

/// Options resolved from configuration; see the settings crate.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub tag: BTreeMap<String, String>,
    pub labels: BTreeMap<String, Vec<String>>,

    /// Baseline to source filter settings and configuration from. Explicit
    /// options above take precedence over the baseline's.
    pub baseline: Option<ResourceId>,

    /// Per-rule severity overrides, keyed by rule name or id.
    pub level_overrides: BTreeMap<String, SeverityLevel>,

    /// Run-level configuration values, highest precedence.
    pub configuration: BTreeMap<String, Value>,
}

/// A compiled, executable rule.
#[derive(Debug)]
pub struct RuleBlock {
    pub id: ResourceId,
    pub default_level: SeverityLevel,
    pub tags: BTreeMap<String, String>,
    pub type_of: Vec<String>,
    pub condition: CompiledExpression,
    pub with: Vec<CompiledSelector>,
    pub where_if: Option<CompiledExpression>,
    // Normalized to the targets' primary ids.
    depends_on: Vec<ResourceId>,
}

impl DependencyTarget for RuleBlock {
    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn dependencies(&self) -> &[ResourceId] {
        &self.depends_on
    }
}

/// A named selector compiled for precondition use.
#[derive(Debug)]
pub struct CompiledSelector {
    pub id: ResourceId,
    pub condition: CompiledExpression,
}

/// A compiled suppression group.
#[derive(Debug)]
pub struct SuppressionBlock {
    pub id: ResourceId,
    /// Rule names or ids this group applies to; empty applies to all.
    rules: Vec<ResourceId>,
    pub condition: CompiledExpression,
}

impl SuppressionBlock {
    pub fn applies_to(&self, rule: &ResourceId) -> bool {
        self.rules.is_empty()
            || self.rules.iter().any(|entry| {
                entry == rule
                    || (entry.scope() == ruleguard_types::STANDALONE_SCOPE
                        && entry.name().eq_ignore_ascii_case(rule.name()))
            })
    }
}

/// One immutable execution unit.
#[derive(Debug)]
pub struct Run {
    graph: DependencyGraph<RuleBlock>,
    overrides: HashMap<ResourceId, SeverityLevel>,
    suppressions: Vec<SuppressionBlock>,
    configuration: BTreeMap<String, Value>,
}

impl Run {
    pub fn graph(&self) -> &DependencyGraph<RuleBlock> {
        &self.graph
    }

    pub fn suppressions(&self) -> &[SuppressionBlock] {
        &self.suppressions
    }

    pub fn configuration(&self) -> &BTreeMap<String, Value> {
        &self.configuration
    }

    /// The severity a rule reports with: the run override when present,
    /// otherwise the rule's declared default.
    pub fn effective_level(&self, rule: &RuleBlock) -> SeverityLevel {
        self.overrides
            .get(&rule.id)
            .copied()
            .unwrap_or(rule.default_level)
    }
}

/// Builds a [`Run`] from loaded resources and resolved options.
pub struct RunBuilder<'a> {
    cache: &'a ResourceCache,
    options: RunOptions,
}

impl<'a> RunBuilder<'a> {
    pub fn new(cache: &'a ResourceCache, options: RunOptions) -> Self {
        Self { cache, options }
    }

    pub fn build(self) -> Result<Run, ConfigError> {
        let baseline = self.baseline()?;
        let filter = self.filter(baseline)?;

        // Matched set is computed against resources; the graph then pulls in
        // transitive dependencies on top.
        let mut matched = HashSet::new();
        let mut collection = DependencyTargetCollection::new();
        for resource in self.cache.iter() {
            let Some(spec) = resource.as_rule() else {
                continue;
            };
            if filter.matches(resource) {
                matched.insert(resource.id.clone());
            }
            collection.insert(self.compile_rule(resource, spec)?)?;
        }

        let mut builder = DependencyGraphBuilder::new(collection);
        builder.include_matching(|block| matched.contains(&block.id))?;
        let graph = builder.build();
        debug!(rules = graph.len(), "run graph built");

        Ok(Run {
            overrides: self.overrides(&graph),
            suppressions: self.suppressions()?,
            configuration: self.configuration(baseline),
            graph,
        })
    }

    fn baseline(&self) -> Result<Option<&'a Resource>, ConfigError> {
        let Some(id) = &self.options.baseline else {
            return Ok(None);
        };
        let hit = self
            .cache
            .get(id)
            .ok_or_else(|| ConfigError::BaselineNotFound(id.clone()))?;
        match &hit.resource.spec {
            ResourceSpec::Baseline(_) => Ok(Some(hit.resource)),
            _ => Err(ConfigError::BaselineNotFound(id.clone())),
        }
    }

    fn filter(&self, baseline: Option<&Resource>) -> Result<RuleFilter, ConfigError> {
        let spec = baseline.and_then(|b| match &b.spec {
            ResourceSpec::Baseline(spec) => Some(spec),
            _ => None,
        });
        let include: &[String] = if !self.options.include.is_empty() {
            &self.options.include
        } else {
            spec.map_or(&[], |s| s.include.as_slice())
        };
        let exclude: &[String] = if !self.options.exclude.is_empty() {
            &self.options.exclude
        } else {
            spec.map_or(&[], |s| s.exclude.as_slice())
        };
        let tag = if !self.options.tag.is_empty() {
            self.options.tag.clone()
        } else {
            spec.map(|s| s.tag.clone()).unwrap_or_default()
        };
        let labels = if !self.options.labels.is_empty() {
            self.options.labels.clone()
        } else {
            spec.map(|s| s.labels.clone()).unwrap_or_default()
        };
        RuleFilter::new(include, exclude, tag, labels)
    }

    fn compile_rule(
        &self,
        resource: &Resource,
        spec: &crate::resource::RuleSpec,
    ) -> Result<RuleBlock, ConfigError> {
        let rule_id = resource.id.clone();
        let expression = |tree: &crate::expr::ExpressionTree| {
            tree.compile().map_err(|source| ConfigError::Expression {
                rule: rule_id.clone(),
                source,
            })
        };

        let mut with = Vec::new();
        for name in &spec.with {
            let (selector, selector_spec) =
                self.cache
                    .get_selector(rule_id.scope(), name)
                    .ok_or_else(|| ConfigError::SelectorNotFound {
                        rule: rule_id.clone(),
                        selector: name.clone(),
                    })?;
            with.push(CompiledSelector {
                id: selector.id.clone(),
                condition: selector_spec.condition.compile().map_err(|source| {
                    ConfigError::Expression {
                        rule: selector.id.clone(),
                        source,
                    }
                })?,
            });
        }

        let mut depends_on = Vec::new();
        for dep in &spec.depends_on {
            let hit =
                self.cache
                    .get(dep)
                    .ok_or_else(|| ConfigError::DependencyNotFound {
                        rule: rule_id.clone(),
                        dependency: dep.clone(),
                    })?;
            if hit.resource.as_rule().is_none() {
                return Err(ConfigError::NotARule(dep.clone()));
            }
            depends_on.push(hit.resource.id.clone());
        }

        Ok(RuleBlock {
            default_level: spec.level.unwrap_or_default(),
            tags: resource.metadata.tags.clone(),
            type_of: spec.type_of.clone(),
            condition: expression(&spec.condition)?,
            with,
            where_if: spec.where_if.as_ref().map(&expression).transpose()?,
            depends_on,
            id: rule_id,
        })
    }

    fn overrides(&self, graph: &DependencyGraph<RuleBlock>) -> HashMap<ResourceId, SeverityLevel> {
        let mut overrides = HashMap::new();
        for (key, level) in &self.options.level_overrides {
            let resolved = self.resolve_override(key, graph);
            match resolved {
                Some(id) => {
                    overrides.insert(id, *level);
                }
                None => debug!(rule = %key, "severity override does not match a loaded rule"),
            }
        }
        overrides
    }

    fn resolve_override(
        &self,
        key: &str,
        graph: &DependencyGraph<RuleBlock>,
    ) -> Option<ResourceId> {
        if let Ok(id) = ResourceId::parse(key, ResourceIdKind::Unknown) {
            if let Some(hit) = self.cache.get(&id) {
                return Some(hit.resource.id.clone());
            }
        }
        // Bare rule name without a scope.
        graph
            .iter()
            .find(|block| block.id.name().eq_ignore_ascii_case(key))
            .map(|block| block.id.clone())
    }

    fn suppressions(&self) -> Result<Vec<SuppressionBlock>, ConfigError> {
        let mut blocks = Vec::new();
        for resource in self.cache.iter() {
            let ResourceSpec::SuppressionGroup(spec) = &resource.spec else {
                continue;
            };
            let mut rules = Vec::new();
            for entry in &spec.rule {
                if let Ok(id) = ResourceId::parse(entry, ResourceIdKind::Unknown) {
                    rules.push(id);
                }
            }
            blocks.push(SuppressionBlock {
                id: resource.id.clone(),
                rules,
                condition: spec.condition.compile().map_err(|source| {
                    ConfigError::Expression {
                        rule: resource.id.clone(),
                        source,
                    }
                })?,
            });
        }
        Ok(blocks)
    }

    /// Module config defaults, then baseline configuration, then run options.
    fn configuration(&self, baseline: Option<&Resource>) -> BTreeMap<String, Value> {
        let mut merged = BTreeMap::new();
        for resource in self.cache.iter() {
            if let ResourceSpec::ModuleConfig(spec) = &resource.spec {
                merged.extend(spec.configuration.clone());
            }
        }
        if let Some(ResourceSpec::Baseline(spec)) = baseline.map(|b| &b.spec) {
            merged.extend(spec.configuration.clone());
        }
        merged.extend(self.options.configuration.clone());
        merged
    }
}
