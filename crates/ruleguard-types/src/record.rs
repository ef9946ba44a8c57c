use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::ResourceId;

/// Severity is intentionally small: it maps cleanly to CI signals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    #[default]
    Error,
    Warning,
    Information,
}

/// The outcome after a rule processes an object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RuleOutcome {
    #[default]
    None,
    Pass,
    Fail,
    Error,
}

/// Why a rule produced its outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RuleOutcomeReason {
    #[default]
    None,
    /// The rule condition ran to completion.
    Processed,
    /// A type/with/where precondition did not hold for this object.
    PreconditionFail,
    /// An upstream dependency failed, so the condition never ran.
    DependencyFail,
    /// The condition returned no result.
    Inconclusive,
}

/// The outcome of evaluating one rule against one object.
///
/// Records are created fresh per (rule, object) pair and are not mutated after
/// the evaluation loop hands them downstream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuleRecord {
    #[schemars(with = "String")]
    pub rule_id: ResourceId,
    pub rule_name: String,

    pub target_name: String,
    pub target_type: String,

    pub outcome: RuleOutcome,
    pub outcome_reason: RuleOutcomeReason,

    /// The level declared on the rule definition.
    pub default_level: SeverityLevel,
    /// The level after run overrides are applied.
    pub level: SeverityLevel,

    /// Reasons accumulated while the condition evaluated to fail.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reason: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tag: BTreeMap<String, String>,

    /// Diagnostic detail when the outcome is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RuleRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RuleOutcome::Pass | RuleOutcome::None)
    }

    pub fn is_processed(&self) -> bool {
        matches!(
            self.outcome,
            RuleOutcome::Pass | RuleOutcome::Fail | RuleOutcome::Error
        )
    }
}

/// Aggregate outcome counts handed to output writers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OutcomeCounts {
    pub pass: u32,
    pub fail: u32,
    pub error: u32,
    pub none: u32,
}

impl OutcomeCounts {
    pub fn from_records(records: &[RuleRecord]) -> Self {
        let mut counts = OutcomeCounts::default();
        for r in records {
            match r.outcome {
                RuleOutcome::Pass => counts.pass += 1,
                RuleOutcome::Fail => counts.fail += 1,
                RuleOutcome::Error => counts.error += 1,
                RuleOutcome::None => counts.none += 1,
            }
        }
        counts
    }
}
