//! Resource identity.
//!
//! A `ResourceId` is `scope/name`. Equality and hashing ignore case on both
//! parts so that rule references written in any casing resolve to the same
//! resource.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separates the scope from the name in the canonical id form.
pub const SCOPE_SEPARATOR: char = '/';

/// The scope used for resources declared outside any module.
pub const STANDALONE_SCOPE: &str = ".";

/// How an identifier relates to the resource it names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResourceIdKind {
    /// Origin not tracked, typically an id parsed from user input.
    #[default]
    Unknown,
    /// The primary identifier.
    Id,
    /// An opaque stable reference.
    Ref,
    /// An alternative name kept for compatibility.
    Alias,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("resource id must not be empty")]
    Empty,
    #[error("resource id '{0}' has an empty name")]
    EmptyName(String),
}

/// A unique identifier for a resource within a scope.
///
/// The id kind is carried for diagnostics but excluded from equality: an id,
/// ref, and alias naming the same scope+name are the same identity.
#[derive(Clone, Debug)]
pub struct ResourceId {
    scope: String,
    name: String,
    kind: ResourceIdKind,
}

impl ResourceId {
    pub fn new(scope: Option<&str>, name: impl Into<String>, kind: ResourceIdKind) -> Self {
        Self {
            scope: normalize_scope(scope),
            name: name.into(),
            kind,
        }
    }

    /// Parse `scope/name` or a bare `name` (standalone scope).
    pub fn parse(id: &str, kind: ResourceIdKind) -> Result<Self, ParseIdError> {
        if id.is_empty() {
            return Err(ParseIdError::Empty);
        }
        let (scope, name) = match id.find(SCOPE_SEPARATOR) {
            Some(at) => (Some(&id[..at]), &id[at + 1..]),
            None => (None, id),
        };
        if name.is_empty() {
            return Err(ParseIdError::EmptyName(id.to_string()));
        }
        Ok(Self::new(scope, name, kind))
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceIdKind {
        self.kind
    }

    /// The canonical `scope/name` string form.
    pub fn value(&self) -> String {
        format!("{}{}{}", self.scope, SCOPE_SEPARATOR, self.name)
    }

    /// The same identity tagged with a different kind.
    pub fn as_kind(&self, kind: ResourceIdKind) -> Self {
        Self {
            scope: self.scope.clone(),
            name: self.name.clone(),
            kind,
        }
    }
}

fn normalize_scope(scope: Option<&str>) -> String {
    match scope {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => STANDALONE_SCOPE.to_string(),
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scope, SCOPE_SEPARATOR, self.name)
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.scope.eq_ignore_ascii_case(&other.scope) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.scope.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(b'/');
        for b in self.name.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value())
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ResourceId::parse(&s, ResourceIdKind::Unknown).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_with_scope() {
        let id = ResourceId::parse("MyModule/Rule1", ResourceIdKind::Id).unwrap();
        assert_eq!(id.scope(), "MyModule");
        assert_eq!(id.name(), "Rule1");
        assert_eq!(id.value(), "MyModule/Rule1");
    }

    #[test]
    fn parse_standalone() {
        let id = ResourceId::parse("Rule1", ResourceIdKind::Unknown).unwrap();
        assert_eq!(id.scope(), STANDALONE_SCOPE);
        assert_eq!(id.value(), "./Rule1");
    }

    #[test]
    fn parse_rejects_empty_name() {
        assert_eq!(
            ResourceId::parse("MyModule/", ResourceIdKind::Unknown),
            Err(ParseIdError::EmptyName("MyModule/".to_string()))
        );
        assert_eq!(
            ResourceId::parse("", ResourceIdKind::Unknown),
            Err(ParseIdError::Empty)
        );
    }

    #[test]
    fn equality_ignores_case_and_kind() {
        let a = ResourceId::new(Some("Mod"), "Rule1", ResourceIdKind::Id);
        let b = ResourceId::new(Some("mod"), "RULE1", ResourceIdKind::Alias);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_agrees_with_equality() {
        let mut map = HashMap::new();
        map.insert(ResourceId::new(Some("Mod"), "Rule1", ResourceIdKind::Id), 1);
        assert_eq!(
            map.get(&ResourceId::new(Some("MOD"), "rule1", ResourceIdKind::Ref)),
            Some(&1)
        );
    }

    #[test]
    fn serde_round_trip_as_string() {
        let id = ResourceId::new(Some("Mod"), "Rule1", ResourceIdKind::Id);
        let s = serde_json::to_string(&id).unwrap();
        assert_eq!(s, "\"Mod/Rule1\"");
        let back: ResourceId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, id);
    }
}
