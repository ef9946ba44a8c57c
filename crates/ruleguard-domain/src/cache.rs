//! Indexed store of loaded resources.
//!
//! Every id form a resource answers to (primary id, ref, aliases) lands in one
//! index, so lookups resolve any form and duplicate identities fail at insert
//! rather than producing ambiguous lookups later.

use std::collections::HashMap;

use tracing::warn;

use ruleguard_types::{ResourceId, ResourceIdKind, SCOPE_SEPARATOR};

use crate::error::ConfigError;
use crate::resource::{Resource, SelectorSpec};

/// A lookup result: the resource plus the id form that matched.
#[derive(Clone, Copy, Debug)]
pub struct CacheHit<'a> {
    pub resource: &'a Resource,
    pub matched: ResourceIdKind,
}

#[derive(Debug, Default)]
pub struct ResourceCache {
    resources: Vec<Resource>,
    // Maps every effective id to (resource index, id kind at that entry).
    index: HashMap<ResourceId, (usize, ResourceIdKind)>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resource, claiming all of its effective ids.
    ///
    /// Fails if any id form is already claimed by another resource.
    pub fn insert(&mut self, resource: Resource) -> Result<(), ConfigError> {
        for (id, _) in resource.effective_ids() {
            if self.index.contains_key(&id) {
                return Err(ConfigError::DuplicateResourceId { id });
            }
        }
        let at = self.resources.len();
        for (id, kind) in resource.effective_ids() {
            self.index.insert(id, (at, kind));
        }
        self.resources.push(resource);
        Ok(())
    }

    /// Resolve a resource by any id form.
    ///
    /// A hit through an alias is logged; callers should migrate to the
    /// primary id.
    pub fn get(&self, id: &ResourceId) -> Option<CacheHit<'_>> {
        let (at, matched) = *self.index.get(id)?;
        if matched == ResourceIdKind::Alias {
            warn!(
                alias = %id,
                resource = %self.resources[at].id,
                "resource referenced by alias"
            );
        }
        Some(CacheHit {
            resource: &self.resources[at],
            matched,
        })
    }

    /// Resolve a selector by name.
    ///
    /// A qualified `scope/name` resolves directly. A bare name resolves
    /// relative to the referencing resource's scope first, then falls back to
    /// the standalone scope.
    pub fn get_selector(&self, scope: &str, name: &str) -> Option<(&Resource, &SelectorSpec)> {
        if name.contains(SCOPE_SEPARATOR) {
            let id = ResourceId::parse(name, ResourceIdKind::Unknown).ok()?;
            return self.selector_by_id(&id);
        }
        self.selector_by_id(&ResourceId::new(Some(scope), name, ResourceIdKind::Unknown))
            .or_else(|| self.selector_by_id(&ResourceId::new(None, name, ResourceIdKind::Unknown)))
    }

    fn selector_by_id(&self, id: &ResourceId) -> Option<(&Resource, &SelectorSpec)> {
        let hit = self.get(id)?;
        hit.resource.as_selector().map(|spec| (hit.resource, spec))
    }

    /// Resources in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceSpec, RuleSpec, SelectorSpec};

    fn rule(id: &str) -> Resource {
        Resource::new(
            ResourceId::parse(id, ResourceIdKind::Id).unwrap(),
            ResourceSpec::Rule(RuleSpec::default()),
        )
    }

    #[test]
    fn lookup_by_any_id_form() {
        let mut cache = ResourceCache::new();
        let mut r = rule("module/Rule1");
        r.ref_id = Some(ResourceId::parse("module/RG-0001", ResourceIdKind::Ref).unwrap());
        r.aliases = vec![ResourceId::parse("module/OldRule1", ResourceIdKind::Alias).unwrap()];
        cache.insert(r).unwrap();

        let by_id = ResourceId::parse("module/rule1", ResourceIdKind::Unknown).unwrap();
        assert_eq!(cache.get(&by_id).unwrap().matched, ResourceIdKind::Id);

        let by_ref = ResourceId::parse("module/rg-0001", ResourceIdKind::Unknown).unwrap();
        assert_eq!(cache.get(&by_ref).unwrap().matched, ResourceIdKind::Ref);

        let by_alias = ResourceId::parse("module/oldrule1", ResourceIdKind::Unknown).unwrap();
        let hit = cache.get(&by_alias).unwrap();
        assert_eq!(hit.matched, ResourceIdKind::Alias);
        assert_eq!(hit.resource.id.name(), "Rule1");
    }

    #[test]
    fn duplicate_effective_id_fails_insert() {
        let mut cache = ResourceCache::new();
        cache.insert(rule("module/Rule1")).unwrap();

        // A different primary id claiming Rule1 as an alias still collides.
        let mut other = rule("module/Rule2");
        other.aliases = vec![ResourceId::parse("module/RULE1", ResourceIdKind::Alias).unwrap()];
        let err = cache.insert(other).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateResourceId { .. }));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn selector_lookup_rejects_non_selectors() {
        let mut cache = ResourceCache::new();
        cache.insert(rule("module/Rule1")).unwrap();
        cache
            .insert(Resource::new(
                ResourceId::parse("module/IsService", ResourceIdKind::Id).unwrap(),
                ResourceSpec::Selector(SelectorSpec::default()),
            ))
            .unwrap();

        assert!(cache.get_selector(".", "module/IsService").is_some());
        assert!(cache.get_selector(".", "module/Rule1").is_none());
        assert!(cache.get_selector(".", "module/Missing").is_none());
    }

    #[test]
    fn bare_selector_names_resolve_relative_to_scope() {
        let mut cache = ResourceCache::new();
        cache
            .insert(Resource::new(
                ResourceId::parse("module/IsService", ResourceIdKind::Id).unwrap(),
                ResourceSpec::Selector(SelectorSpec::default()),
            ))
            .unwrap();
        cache
            .insert(Resource::new(
                ResourceId::parse("Standalone", ResourceIdKind::Id).unwrap(),
                ResourceSpec::Selector(SelectorSpec::default()),
            ))
            .unwrap();

        // Referencing scope first.
        let (found, _) = cache.get_selector("module", "IsService").unwrap();
        assert_eq!(found.id.scope(), "module");
        assert!(cache.get_selector("other", "IsService").is_none());

        // Standalone fallback for any referencing scope.
        let (found, _) = cache.get_selector("module", "Standalone").unwrap();
        assert_eq!(found.id.name(), "Standalone");
    }
}
