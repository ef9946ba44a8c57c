//! Field path parsing and resolution.
//!
//! Paths are dotted segments with optional `[index]` access, e.g.
//! `spec.containers[0].image`. A negative index counts from the end. Paths are
//! parsed once at expression compile time; resolution walks the target object
//! and stops at the first absent segment.

use ruleguard_types::ObjectShape;
use serde_json::Value;

use crate::error::ExpressionError;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(i64),
}

/// A parsed field path.
#[derive(Clone, Debug)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, ExpressionError> {
        let trimmed = path.strip_prefix("$.").unwrap_or(path);
        if trimmed.is_empty() {
            return Err(ExpressionError::InvalidPath(path.to_string()));
        }

        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            if part.is_empty() {
                return Err(ExpressionError::InvalidPath(path.to_string()));
            }
            let mut rest = part;
            if !rest.starts_with('[') {
                let name_end = rest.find('[').unwrap_or(rest.len());
                segments.push(Segment::Field(rest[..name_end].to_string()));
                rest = &rest[name_end..];
            }
            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| ExpressionError::InvalidPath(path.to_string()))?;
                if !rest.starts_with('[') {
                    return Err(ExpressionError::InvalidPath(path.to_string()));
                }
                let index: i64 = rest[1..close]
                    .parse()
                    .map_err(|_| ExpressionError::InvalidPath(path.to_string()))?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
            }
        }
        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolve this path against a target object shape.
    ///
    /// Returns `None` at the first segment that does not exist; never panics.
    pub fn resolve<'a>(&self, root: &'a ObjectShape, case_sensitive: bool) -> Option<&'a Value> {
        let mut segments = self.segments.iter();
        let first = segments.next()?;

        // The first hop dispatches over the document shape; everything below
        // is plain JSON.
        let mut current = match (first, root) {
            (Segment::Field(name), ObjectShape::Json(value)) => {
                field_of(value, name, case_sensitive)?
            }
            (Segment::Field(name), ObjectShape::Bag(bag)) => bag.get(name, case_sensitive)?,
            (Segment::Field(name), ObjectShape::Record(record)) => {
                record.get(name, case_sensitive)?
            }
            (Segment::Index(index), ObjectShape::Json(value)) => index_of(value, *index)?,
            (Segment::Index(_), _) => return None,
        };

        for segment in segments {
            current = match segment {
                Segment::Field(name) => field_of(current, name, case_sensitive)?,
                Segment::Index(index) => index_of(current, *index)?,
            };
        }
        Some(current)
    }
}

fn field_of<'a>(value: &'a Value, name: &str, case_sensitive: bool) -> Option<&'a Value> {
    let map = value.as_object()?;
    if case_sensitive {
        map.get(name)
    } else {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

fn index_of(value: &Value, index: i64) -> Option<&Value> {
    let items = value.as_array()?;
    let at = if index < 0 {
        items.len().checked_sub(index.unsigned_abs() as usize)?
    } else {
        index as usize
    };
    items.get(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruleguard_types::{PropertyBag, Record};
    use serde_json::json;

    fn shape(value: Value) -> ObjectShape {
        ObjectShape::Json(value)
    }

    #[test]
    fn resolves_nested_fields() {
        let obj = shape(json!({ "spec": { "replicas": 3 } }));
        let path = FieldPath::parse("spec.replicas").unwrap();
        assert_eq!(path.resolve(&obj, false), Some(&json!(3)));
    }

    #[test]
    fn resolves_indexed_fields() {
        let obj = shape(json!({ "items": [{ "name": "a" }, { "name": "b" }] }));
        let path = FieldPath::parse("items[1].name").unwrap();
        assert_eq!(path.resolve(&obj, false), Some(&json!("b")));
    }

    #[test]
    fn negative_index_counts_from_end() {
        let obj = shape(json!({ "items": [1, 2, 3] }));
        let path = FieldPath::parse("items[-1]").unwrap();
        assert_eq!(path.resolve(&obj, false), Some(&json!(3)));
        let path = FieldPath::parse("items[-4]").unwrap();
        assert_eq!(path.resolve(&obj, false), None);
    }

    #[test]
    fn stops_at_first_absent_segment() {
        let obj = shape(json!({ "spec": {} }));
        let path = FieldPath::parse("spec.template.name").unwrap();
        assert_eq!(path.resolve(&obj, false), None);
    }

    #[test]
    fn case_sensitivity_is_caller_supplied() {
        let obj = shape(json!({ "Name": "web" }));
        let path = FieldPath::parse("name").unwrap();
        assert_eq!(path.resolve(&obj, false), Some(&json!("web")));
        assert_eq!(path.resolve(&obj, true), None);
    }

    #[test]
    fn resolves_against_bag_and_record() {
        let mut bag = PropertyBag::new();
        bag.set("Config", json!({ "enabled": true }));
        let obj = ObjectShape::Bag(bag);
        let path = FieldPath::parse("config.enabled").unwrap();
        assert_eq!(path.resolve(&obj, false), Some(&json!(true)));

        let record = Record::default().field("Count", json!(2));
        let obj = ObjectShape::Record(record);
        let path = FieldPath::parse("count").unwrap();
        assert_eq!(path.resolve(&obj, false), Some(&json!(2)));
    }

    #[test]
    fn leading_json_path_prefix_is_accepted() {
        let obj = shape(json!({ "a": 1 }));
        let path = FieldPath::parse("$.a").unwrap();
        assert_eq!(path.resolve(&obj, false), Some(&json!(1)));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse("a[x]").is_err());
        assert!(FieldPath::parse("a[0").is_err());
    }

    #[test]
    fn index_into_bag_root_is_not_found() {
        let obj = ObjectShape::Bag(PropertyBag::new());
        let path = FieldPath::parse("[0]").unwrap();
        assert_eq!(path.resolve(&obj, false), None);
    }
}
