use ruleguard_types::ResourceId;

/// Fatal configuration errors raised before any object is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("dependency '{dependency}' of rule '{rule}' could not be found")]
    DependencyNotFound {
        rule: ResourceId,
        dependency: ResourceId,
    },

    #[error("circular dependency detected between '{from}' and '{to}'")]
    CircularDependency { from: ResourceId, to: ResourceId },

    #[error("a resource with id '{id}' was already registered")]
    DuplicateResourceId { id: ResourceId },

    #[error("selector '{selector}' referenced by rule '{rule}' could not be found")]
    SelectorNotFound { rule: ResourceId, selector: String },

    #[error("baseline '{0}' could not be found")]
    BaselineNotFound(ResourceId),

    #[error("'{0}' is not a rule")]
    NotARule(ResourceId),

    #[error("only the first include entry may use a wildcard; got {0} entries")]
    MultipleWildcardInclude(usize),

    #[error("invalid include pattern '{pattern}'")]
    InvalidIncludePattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("rule '{rule}' has an invalid condition")]
    Expression {
        rule: ResourceId,
        #[source]
        source: ExpressionError,
    },
}

/// Compile-time expression errors. These surface at load, never while an
/// object is being evaluated.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("unknown operator or condition '{0}'")]
    UnknownName(String),

    #[error("expression node has no operator or condition key")]
    MissingCondition,

    #[error("expression node mixes multiple conditions: '{0}' and '{1}'")]
    AmbiguousCondition(String, String),

    #[error("condition '{0}' requires a 'field' property")]
    MissingField(String),

    #[error("condition '{name}' requires a {expected} literal")]
    InvalidLiteral { name: String, expected: &'static str },

    #[error("operator '{0}' requires at least one inner expression")]
    EmptyOperator(String),

    #[error("invalid field path '{0}'")]
    InvalidPath(String),

    #[error("invalid regular expression in '{name}'")]
    InvalidRegex {
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// Recoverable faults raised while evaluating a condition against an object.
///
/// These are caught at the rule evaluation loop boundary and converted into an
/// `Error` outcome for the affected (rule, object) pair only.
#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error("field '{path}' is not comparable as a number: {value}")]
    NotNumeric { path: String, value: String },
}
