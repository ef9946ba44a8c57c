//! Pure rule evaluation engine: no I/O, no global state.
//!
//! Load [`resource::Resource`]s into a [`cache::ResourceCache`], build a
//! [`run::Run`] with [`run::RunBuilder`], then call [`eval::evaluate`] once
//! per target object. Everything fallible happens at build time; evaluation
//! only surfaces per-rule faults as `Error` outcomes.

#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod eval;
pub mod expr;
pub mod filter;
pub mod graph;
pub mod path;
pub mod resource;
pub mod run;
pub mod test_support;

pub use cache::ResourceCache;
pub use error::{ConfigError, EvaluateError, ExpressionError};
pub use eval::{evaluate, evaluate_rule};
pub use expr::{CompiledExpression, ExpressionContext, ExpressionTree};
pub use filter::RuleFilter;
pub use graph::{DependencyGraph, DependencyGraphBuilder, ExecutionState, GraphState};
pub use path::FieldPath;
pub use resource::{Resource, ResourceKind, ResourceSpec, RuleSpec, SelectorSpec};
pub use run::{Run, RunBuilder, RunOptions};
