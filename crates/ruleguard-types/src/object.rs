//! The target object model.
//!
//! Input documents arrive in one of three shapes. The engine dispatches over
//! this closed union rather than reflecting on arbitrary types; nested values
//! below the first level are always plain JSON values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A loaded document in one of the shapes the field resolver understands.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectShape {
    /// A parsed JSON/YAML document.
    Json(Value),
    /// A dynamic property bag built up by a binder or host.
    Bag(PropertyBag),
    /// A plain record with a fixed set of named fields.
    Record(Record),
}

/// An insertion-ordered dynamic property bag.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    entries: Vec<(String, Value)>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any entry with the exact same key.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str, case_sensitive: bool) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| key_eq(k, key, case_sensitive))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single named field of a [`Record`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub value: Value,
}

/// A plain record: a fixed list of named fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Vec<RecordField>,
}

impl Record {
    pub fn new(fields: Vec<RecordField>) -> Self {
        Self { fields }
    }

    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push(RecordField {
            name: name.into(),
            value,
        });
        self
    }

    pub fn get(&self, name: &str, case_sensitive: bool) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| key_eq(&f.name, name, case_sensitive))
            .map(|f| &f.value)
    }
}

fn key_eq(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// A bound input document: the name/type supplied by the binding collaborator
/// plus the document value itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetObject {
    pub name: String,
    pub type_name: String,
    pub value: ObjectShape,
}

impl TargetObject {
    pub fn json(name: impl Into<String>, type_name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: ObjectShape::Json(value),
        }
    }

    pub fn bag(name: impl Into<String>, type_name: impl Into<String>, bag: PropertyBag) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: ObjectShape::Bag(bag),
        }
    }

    pub fn record(
        name: impl Into<String>,
        type_name: impl Into<String>,
        record: Record,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: ObjectShape::Record(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bag_set_replaces_exact_key() {
        let mut bag = PropertyBag::new();
        bag.set("Name", json!("a"));
        bag.set("Name", json!("b"));
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.get("Name", true), Some(&json!("b")));
    }

    #[test]
    fn bag_get_case_sensitivity() {
        let mut bag = PropertyBag::new();
        bag.set("Name", json!("a"));
        assert_eq!(bag.get("name", false), Some(&json!("a")));
        assert_eq!(bag.get("name", true), None);
    }

    #[test]
    fn record_get() {
        let record = Record::default()
            .field("Name", json!("web-01"))
            .field("Count", json!(3));
        assert_eq!(record.get("count", false), Some(&json!(3)));
        assert_eq!(record.get("missing", false), None);
    }
}
