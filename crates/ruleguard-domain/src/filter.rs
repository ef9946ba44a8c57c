//! Rule filtering.
//!
//! A filter decides which rules a run executes. Order matters: exclusion wins
//! over inclusion, then tag and taxonomy label constraints narrow the set.

use std::collections::BTreeMap;

use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;

use ruleguard_types::{ResourceId, ResourceIdKind};

use crate::error::ConfigError;
use crate::resource::Resource;

/// A named entry in the include or exclude list: matched against the
/// resource's bare name and every effective id, case-insensitively.
#[derive(Debug)]
struct NameEntry {
    raw: String,
    id: Option<ResourceId>,
}

impl NameEntry {
    fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            id: ResourceId::parse(raw, ResourceIdKind::Unknown).ok(),
        }
    }

    fn matches(&self, resource: &Resource) -> bool {
        if self.raw.eq_ignore_ascii_case(resource.id.name()) {
            return true;
        }
        match &self.id {
            Some(id) => resource.effective_ids().any(|(eid, _)| eid == *id),
            None => false,
        }
    }
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?'])
}

#[derive(Debug, Default)]
pub struct RuleFilter {
    include: Vec<NameEntry>,
    wildcard: Option<GlobMatcher>,
    exclude: Vec<NameEntry>,
    tag: BTreeMap<String, String>,
    labels: BTreeMap<String, Vec<String>>,
}

impl RuleFilter {
    /// Build a filter from configured name lists and tag/label constraints.
    ///
    /// At most one include entry may carry a wildcard, and only when it is
    /// the sole entry.
    pub fn new(
        include: &[String],
        exclude: &[String],
        tag: BTreeMap<String, String>,
        labels: BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ConfigError> {
        let mut wildcard = None;
        if include.iter().any(|entry| has_wildcard(entry)) {
            if include.len() > 1 {
                return Err(ConfigError::MultipleWildcardInclude(include.len()));
            }
            let pattern = &include[0];
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| ConfigError::InvalidIncludePattern {
                    pattern: pattern.clone(),
                    source,
                })?;
            wildcard = Some(glob.compile_matcher());
        }
        Ok(Self {
            include: if wildcard.is_some() {
                Vec::new()
            } else {
                include.iter().map(|e| NameEntry::new(e)).collect()
            },
            wildcard,
            exclude: exclude.iter().map(|e| NameEntry::new(e)).collect(),
            tag,
            labels,
        })
    }

    /// True when the resource survives exclusion, inclusion, and the tag and
    /// label constraints.
    pub fn matches(&self, resource: &Resource) -> bool {
        if self.exclude.iter().any(|entry| entry.matches(resource)) {
            debug!(rule = %resource.id, "rule excluded by name");
            return false;
        }
        if !self.included(resource) {
            debug!(rule = %resource.id, "rule not in include list");
            return false;
        }
        if !self.tag_match(resource) || !self.label_match(resource) {
            debug!(rule = %resource.id, "rule filtered by tag or label");
            return false;
        }
        true
    }

    fn included(&self, resource: &Resource) -> bool {
        if let Some(glob) = &self.wildcard {
            return glob.is_match(resource.id.name())
                || resource
                    .effective_ids()
                    .any(|(id, _)| glob.is_match(id.value()));
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|entry| entry.matches(resource))
    }

    fn tag_match(&self, resource: &Resource) -> bool {
        if self.tag.is_empty() {
            return true;
        }
        let tags = &resource.metadata.tags;
        if self.tag.len() > tags.len() {
            return false;
        }
        self.tag.iter().all(|(key, want)| {
            tags.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .is_some_and(|(_, have)| want == "*" || have.eq_ignore_ascii_case(want))
        })
    }

    fn label_match(&self, resource: &Resource) -> bool {
        if self.labels.is_empty() {
            return true;
        }
        let labels = &resource.metadata.labels;
        if self.labels.len() > labels.len() {
            return false;
        }
        self.labels.iter().all(|(key, want)| {
            labels
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .is_some_and(|(_, have)| {
                    want.iter().any(|w| {
                        w == "*" || have.iter().any(|h| h.eq_ignore_ascii_case(w))
                    })
                })
        })
    }
}
