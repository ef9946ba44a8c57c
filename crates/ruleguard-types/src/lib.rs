//! Stable DTOs and IDs used across the ruleguard workspace.
//!
//! This crate is intentionally boring:
//! - resource identity (scope + name, case-insensitive)
//! - severity levels, outcomes, and the emitted rule record
//! - the target object model evaluated by the engine

#![forbid(unsafe_code)]

pub mod ids;
pub mod object;
pub mod record;

pub use ids::{ParseIdError, ResourceId, ResourceIdKind, SCOPE_SEPARATOR, STANDALONE_SCOPE};
pub use object::{ObjectShape, PropertyBag, Record, RecordField, TargetObject};
pub use record::{OutcomeCounts, RuleOutcome, RuleOutcomeReason, RuleRecord, SeverityLevel};
