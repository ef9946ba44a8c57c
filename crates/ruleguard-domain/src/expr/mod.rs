//! The condition expression engine.
//!
//! A declarative expression tree (operators `if`/`allOf`/`anyOf`/`not` over a
//! fixed set of field conditions) compiles into a [`CompiledExpression`]. All
//! shape errors — unknown names, missing literals, invalid regex — surface at
//! compile time; evaluation itself is infallible apart from the recoverable
//! [`EvaluateError`] channel caught at the rule loop boundary.
//!
//! Results are three-valued (`Option<bool>`): operators collapse an
//! indeterminate child the same way the rule language defines it — `allOf`
//! treats it as not-true, `anyOf` skips it, `not` yields false, `if` yields
//! true.

pub mod context;
mod helpers;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use ruleguard_types::TargetObject;

use crate::error::{EvaluateError, ExpressionError};
use crate::path::FieldPath;

pub use context::ExpressionContext;

// Operators
const IF: &str = "if";
const ALL_OF: &str = "allOf";
const ANY_OF: &str = "anyOf";
const NOT: &str = "not";

// Conditions
const EXISTS: &str = "exists";
const EQUALS: &str = "equals";
const NOT_EQUALS: &str = "notEquals";
const HAS_VALUE: &str = "hasValue";
const MATCH: &str = "match";
const NOT_MATCH: &str = "notMatch";
const IN: &str = "in";
const NOT_IN: &str = "notIn";
const LESS: &str = "less";
const LESS_OR_EQUALS: &str = "lessOrEquals";
const GREATER: &str = "greater";
const GREATER_OR_EQUALS: &str = "greaterOrEquals";

// Properties
const FIELD: &str = "field";
const CASE_SENSITIVE: &str = "caseSensitive";

const CONDITIONS: &[&str] = &[
    EXISTS,
    EQUALS,
    NOT_EQUALS,
    HAS_VALUE,
    MATCH,
    NOT_MATCH,
    IN,
    NOT_IN,
    LESS,
    LESS_OR_EQUALS,
    GREATER,
    GREATER_OR_EQUALS,
];

/// A raw declarative expression node as loaded from a rule or selector
/// document. Built once at load; compiled before any evaluation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpressionTree(pub Map<String, Value>);

impl ExpressionTree {
    /// Compile the raw tree into an executable predicate.
    pub fn compile(&self) -> Result<CompiledExpression, ExpressionError> {
        Ok(CompiledExpression {
            root: compile_node(&self.0)?,
        })
    }
}

/// An immutable, executable expression tree.
#[derive(Debug)]
pub struct CompiledExpression {
    root: Node,
}

impl CompiledExpression {
    /// Evaluate against a target object, collecting failure reasons in `ctx`.
    pub fn evaluate(
        &self,
        ctx: &mut ExpressionContext,
        object: &TargetObject,
    ) -> Result<Option<bool>, EvaluateError> {
        self.root.evaluate(ctx, object)
    }
}

#[derive(Debug)]
enum Node {
    If(Box<Node>),
    AllOf(Vec<Node>),
    AnyOf(Vec<Node>),
    Not(Box<Node>),
    Condition(ConditionNode),
}

#[derive(Debug)]
struct ConditionNode {
    path: FieldPath,
    case_sensitive: bool,
    kind: ConditionKind,
}

#[derive(Debug)]
enum ConditionKind {
    Exists(bool),
    Equals(Value),
    NotEquals(Value),
    HasValue(bool),
    Match(Regex),
    NotMatch(Regex),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Less(i64),
    LessOrEquals(i64),
    Greater(i64),
    GreaterOrEquals(i64),
}

impl ConditionKind {
    fn name(&self) -> &'static str {
        match self {
            ConditionKind::Exists(_) => EXISTS,
            ConditionKind::Equals(_) => EQUALS,
            ConditionKind::NotEquals(_) => NOT_EQUALS,
            ConditionKind::HasValue(_) => HAS_VALUE,
            ConditionKind::Match(_) => MATCH,
            ConditionKind::NotMatch(_) => NOT_MATCH,
            ConditionKind::In(_) => IN,
            ConditionKind::NotIn(_) => NOT_IN,
            ConditionKind::Less(_) => LESS,
            ConditionKind::LessOrEquals(_) => LESS_OR_EQUALS,
            ConditionKind::Greater(_) => GREATER,
            ConditionKind::GreaterOrEquals(_) => GREATER_OR_EQUALS,
        }
    }
}

// ---------------------------------------------------------------------------
// Compile
// ---------------------------------------------------------------------------

fn compile_node(map: &Map<String, Value>) -> Result<Node, ExpressionError> {
    if let Some(value) = prop(map, IF) {
        return Ok(Node::If(Box::new(compile_inner(IF, value)?)));
    }
    if let Some(value) = prop(map, NOT) {
        return Ok(Node::Not(Box::new(compile_inner(NOT, value)?)));
    }
    if let Some(value) = prop(map, ALL_OF) {
        return Ok(Node::AllOf(compile_list(ALL_OF, value)?));
    }
    if let Some(value) = prop(map, ANY_OF) {
        return Ok(Node::AnyOf(compile_list(ANY_OF, value)?));
    }
    compile_condition(map).map(Node::Condition)
}

fn compile_inner(name: &str, value: &Value) -> Result<Node, ExpressionError> {
    let map = value
        .as_object()
        .ok_or(ExpressionError::InvalidLiteral {
            name: name.to_string(),
            expected: "object",
        })?;
    compile_node(map)
}

fn compile_list(name: &str, value: &Value) -> Result<Vec<Node>, ExpressionError> {
    let items = value
        .as_array()
        .ok_or(ExpressionError::InvalidLiteral {
            name: name.to_string(),
            expected: "array",
        })?;
    if items.is_empty() {
        return Err(ExpressionError::EmptyOperator(name.to_string()));
    }
    items
        .iter()
        .map(|item| compile_inner(name, item))
        .collect()
}

fn compile_condition(map: &Map<String, Value>) -> Result<ConditionNode, ExpressionError> {
    let mut condition: Option<(&str, &Value)> = None;
    for (key, value) in map {
        if key.eq_ignore_ascii_case(FIELD) || key.eq_ignore_ascii_case(CASE_SENSITIVE) {
            continue;
        }
        match CONDITIONS
            .iter()
            .copied()
            .find(|name| key.eq_ignore_ascii_case(name))
        {
            Some(name) => match condition {
                Some((first, _)) => {
                    return Err(ExpressionError::AmbiguousCondition(
                        first.to_string(),
                        name.to_string(),
                    ));
                }
                None => condition = Some((name, value)),
            },
            None => return Err(ExpressionError::UnknownName(key.clone())),
        }
    }
    let (name, literal) = condition.ok_or(ExpressionError::MissingCondition)?;

    let field = prop(map, FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| ExpressionError::MissingField(name.to_string()))?;
    let path = FieldPath::parse(field)?;
    let case_sensitive = match prop(map, CASE_SENSITIVE) {
        Some(v) => v.as_bool().ok_or(ExpressionError::InvalidLiteral {
            name: CASE_SENSITIVE.to_string(),
            expected: "boolean",
        })?,
        None => false,
    };

    let kind = match name {
        EXISTS => ConditionKind::Exists(bool_literal(name, literal)?),
        HAS_VALUE => ConditionKind::HasValue(bool_literal(name, literal)?),
        EQUALS => ConditionKind::Equals(scalar_literal(name, literal)?),
        NOT_EQUALS => ConditionKind::NotEquals(scalar_literal(name, literal)?),
        MATCH => ConditionKind::Match(regex_literal(name, literal, case_sensitive)?),
        NOT_MATCH => ConditionKind::NotMatch(regex_literal(name, literal, case_sensitive)?),
        IN => ConditionKind::In(array_literal(name, literal)?),
        NOT_IN => ConditionKind::NotIn(array_literal(name, literal)?),
        LESS => ConditionKind::Less(int_literal(name, literal)?),
        LESS_OR_EQUALS => ConditionKind::LessOrEquals(int_literal(name, literal)?),
        GREATER => ConditionKind::Greater(int_literal(name, literal)?),
        GREATER_OR_EQUALS => ConditionKind::GreaterOrEquals(int_literal(name, literal)?),
        _ => unreachable!("condition names are matched from CONDITIONS"),
    };

    Ok(ConditionNode {
        path,
        case_sensitive,
        kind,
    })
}

fn prop<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

fn bool_literal(name: &str, value: &Value) -> Result<bool, ExpressionError> {
    value.as_bool().ok_or(ExpressionError::InvalidLiteral {
        name: name.to_string(),
        expected: "boolean",
    })
}

fn int_literal(name: &str, value: &Value) -> Result<i64, ExpressionError> {
    value.as_i64().ok_or(ExpressionError::InvalidLiteral {
        name: name.to_string(),
        expected: "integer",
    })
}

fn scalar_literal(name: &str, value: &Value) -> Result<Value, ExpressionError> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => Ok(value.clone()),
        _ => Err(ExpressionError::InvalidLiteral {
            name: name.to_string(),
            expected: "scalar",
        }),
    }
}

fn array_literal(name: &str, value: &Value) -> Result<Vec<Value>, ExpressionError> {
    value
        .as_array()
        .cloned()
        .ok_or(ExpressionError::InvalidLiteral {
            name: name.to_string(),
            expected: "array",
        })
}

fn regex_literal(name: &str, value: &Value, case_sensitive: bool) -> Result<Regex, ExpressionError> {
    let pattern = value.as_str().ok_or(ExpressionError::InvalidLiteral {
        name: name.to_string(),
        expected: "string",
    })?;
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|source| ExpressionError::InvalidRegex {
            name: name.to_string(),
            source,
        })
}

// ---------------------------------------------------------------------------
// Evaluate
// ---------------------------------------------------------------------------

impl Node {
    fn evaluate(
        &self,
        ctx: &mut ExpressionContext,
        object: &TargetObject,
    ) -> Result<Option<bool>, EvaluateError> {
        match self {
            Node::If(inner) => Ok(Some(inner.evaluate(ctx, object)?.unwrap_or(true))),
            Node::Not(inner) => Ok(Some(!inner.evaluate(ctx, object)?.unwrap_or(true))),
            Node::AllOf(children) => {
                for child in children {
                    if child.evaluate(ctx, object)? != Some(true) {
                        return Ok(Some(false));
                    }
                }
                Ok(Some(true))
            }
            Node::AnyOf(children) => {
                for child in children {
                    if child.evaluate(ctx, object)? == Some(true) {
                        return Ok(Some(true));
                    }
                }
                Ok(Some(false))
            }
            Node::Condition(condition) => condition.evaluate(ctx, object).map(Some),
        }
    }
}

impl ConditionNode {
    fn evaluate(
        &self,
        ctx: &mut ExpressionContext,
        object: &TargetObject,
    ) -> Result<bool, EvaluateError> {
        let path = self.path.as_str();
        let value = self.path.resolve(&object.value, self.case_sensitive);
        let result = self.apply(ctx, value)?;
        trace!(
            condition = self.kind.name(),
            path,
            found = value.is_some(),
            result,
            "expression trace"
        );
        Ok(result)
    }

    fn apply(
        &self,
        ctx: &mut ExpressionContext,
        value: Option<&Value>,
    ) -> Result<bool, EvaluateError> {
        let path = self.path.as_str();
        match &self.kind {
            ConditionKind::Exists(expected) => {
                let found = value.is_some();
                if found != *expected {
                    ctx.reason(if *expected {
                        format!("Path '{path}' does not exist.")
                    } else {
                        format!("Path '{path}' exists.")
                    });
                    return Ok(false);
                }
                Ok(true)
            }
            ConditionKind::Equals(expected) => match value {
                None => {
                    ctx.reason(format!("Path '{path}' does not exist."));
                    Ok(false)
                }
                Some(actual) => {
                    if !helpers::equal(expected, actual, self.case_sensitive) {
                        ctx.reason(format!(
                            "Path '{path}' is set to '{}'.",
                            helpers::display(actual)
                        ));
                        return Ok(false);
                    }
                    Ok(true)
                }
            },
            ConditionKind::NotEquals(expected) => match value {
                // Vacuously true when the path does not exist.
                None => Ok(true),
                Some(actual) => {
                    if helpers::equal(expected, actual, self.case_sensitive) {
                        ctx.reason(format!(
                            "Path '{path}' is set to '{}'.",
                            helpers::display(actual)
                        ));
                        return Ok(false);
                    }
                    Ok(true)
                }
            },
            ConditionKind::HasValue(expected) => {
                let empty = value.map(helpers::null_or_empty).unwrap_or(true);
                if *expected == empty {
                    ctx.reason(if *expected {
                        format!("Path '{path}' has no value.")
                    } else {
                        format!("Path '{path}' has a value.")
                    });
                    return Ok(false);
                }
                Ok(true)
            }
            ConditionKind::Match(pattern) => match value {
                // Vacuously true when the path does not exist.
                None => Ok(true),
                Some(actual) => match helpers::scalar_string(actual) {
                    Some(s) if pattern.is_match(&s) => Ok(true),
                    Some(s) => {
                        ctx.reason(format!(
                            "The value '{s}' does not match the pattern '{pattern}'."
                        ));
                        Ok(false)
                    }
                    None => {
                        ctx.reason(format!("Path '{path}' is not a string."));
                        Ok(false)
                    }
                },
            },
            ConditionKind::NotMatch(pattern) => match value {
                None => Ok(true),
                Some(actual) => match helpers::scalar_string(actual) {
                    Some(s) if pattern.is_match(&s) => {
                        ctx.reason(format!("The value '{s}' matches the pattern '{pattern}'."));
                        Ok(false)
                    }
                    _ => Ok(true),
                },
            },
            ConditionKind::In(set) => match value {
                None => {
                    ctx.reason(format!("Path '{path}' does not exist."));
                    Ok(false)
                }
                Some(actual) => {
                    if set.iter().any(|item| helpers::equal(item, actual, false)) {
                        return Ok(true);
                    }
                    ctx.reason(format!(
                        "The value '{}' was not included in the set.",
                        helpers::display(actual)
                    ));
                    Ok(false)
                }
            },
            ConditionKind::NotIn(set) => match value {
                None => Ok(true),
                Some(actual) => {
                    if set.iter().any(|item| helpers::equal(item, actual, false)) {
                        ctx.reason(format!(
                            "Path '{path}' is set to '{}'.",
                            helpers::display(actual)
                        ));
                        return Ok(false);
                    }
                    Ok(true)
                }
            },
            ConditionKind::Less(threshold) => self.compare(ctx, value, *threshold, "<", |c| c < 0),
            ConditionKind::LessOrEquals(threshold) => {
                self.compare(ctx, value, *threshold, "<=", |c| c <= 0)
            }
            ConditionKind::Greater(threshold) => {
                self.compare(ctx, value, *threshold, ">", |c| c > 0)
            }
            ConditionKind::GreaterOrEquals(threshold) => {
                self.compare(ctx, value, *threshold, ">=", |c| c >= 0)
            }
        }
    }

    /// Numeric comparison with string-to-number coercion of the actual value.
    ///
    /// An absent or null field keeps the source's asymmetric defaults: the
    /// strict comparisons hold when the threshold is positive, the inclusive
    /// ones when it is non-negative.
    fn compare(
        &self,
        ctx: &mut ExpressionContext,
        value: Option<&Value>,
        threshold: i64,
        op: &str,
        accept: impl Fn(i8) -> bool,
    ) -> Result<bool, EvaluateError> {
        let path = self.path.as_str();
        let value = match value {
            None | Some(Value::Null) => {
                let result = match op {
                    "<" | ">" => threshold > 0,
                    _ => threshold >= 0,
                };
                if !result {
                    ctx.reason(format!("Path '{path}' is null or empty."));
                }
                return Ok(result);
            }
            Some(v) => v,
        };
        let actual = helpers::coerce_number(value).ok_or_else(|| EvaluateError::NotNumeric {
            path: path.to_string(),
            value: helpers::display(value),
        })?;
        let compare = if actual < threshold as f64 {
            -1
        } else if actual > threshold as f64 {
            1
        } else {
            0
        };
        if !accept(compare) {
            ctx.reason(format!(
                "The value '{}' was not {op} '{threshold}'.",
                helpers::display(value)
            ));
            return Ok(false);
        }
        Ok(true)
    }
}
