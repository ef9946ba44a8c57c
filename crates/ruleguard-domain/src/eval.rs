//! The per-object rule evaluation loop.
//!
//! One object walks its run's graph in dependency order. Faults raised while
//! a single rule evaluates are caught here and become an `Error` outcome for
//! that (rule, object) pair only; the rest of the run continues.

use tracing::debug;

use ruleguard_types::{RuleOutcome, RuleOutcomeReason, RuleRecord, TargetObject};

use crate::error::EvaluateError;
use crate::expr::ExpressionContext;
use crate::run::{Run, RuleBlock};

/// Evaluate every rule in the run against one target object.
///
/// Records come back in graph execution order, one per rule.
pub fn evaluate(run: &Run, object: &TargetObject) -> Vec<RuleRecord> {
    let graph = run.graph();
    let mut state = graph.new_state();
    let mut records = Vec::with_capacity(graph.len());

    let mut walk = graph.walk(&mut state);
    while let Some(step) = walk.next() {
        let record = if step.skipped {
            record_with(
                run,
                step.item,
                object,
                RuleOutcome::None,
                RuleOutcomeReason::DependencyFail,
            )
        } else {
            let record = match evaluate_rule(run, step.item, object) {
                Ok(record) => record,
                Err(fault) => {
                    debug!(rule = %step.item.id, error = %fault, "rule evaluation fault");
                    let mut record = record_with(
                        run,
                        step.item,
                        object,
                        RuleOutcome::Error,
                        RuleOutcomeReason::Processed,
                    );
                    record.error = Some(fault.to_string());
                    record
                }
            };
            // Error finalizes as fail so dependents do not run on bad input.
            if record.is_success() {
                walk.pass(step.index);
            } else {
                walk.fail(step.index);
            }
            record
        };
        records.push(record);
    }
    records
}

/// Evaluate one rule against one object.
///
/// Order: suppression, type precondition, `with` selectors, `where`
/// sub-selector, then the rule condition itself.
pub fn evaluate_rule(
    run: &Run,
    rule: &RuleBlock,
    object: &TargetObject,
) -> Result<RuleRecord, EvaluateError> {
    for group in run.suppressions() {
        if !group.applies_to(&rule.id) {
            continue;
        }
        let mut ctx = ExpressionContext::new();
        if group.condition.evaluate(&mut ctx, object)? == Some(true) {
            debug!(rule = %rule.id, group = %group.id, "rule suppressed");
            return Ok(record_with(
                run,
                rule,
                object,
                RuleOutcome::None,
                RuleOutcomeReason::None,
            ));
        }
    }

    if !rule.type_of.is_empty()
        && !rule
            .type_of
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&object.type_name))
    {
        return Ok(record_with(
            run,
            rule,
            object,
            RuleOutcome::None,
            RuleOutcomeReason::PreconditionFail,
        ));
    }

    if !rule.with.is_empty() {
        let mut matched = false;
        for selector in &rule.with {
            let mut ctx = ExpressionContext::new();
            if selector.condition.evaluate(&mut ctx, object)? == Some(true) {
                matched = true;
                break;
            }
        }
        if !matched {
            return Ok(record_with(
                run,
                rule,
                object,
                RuleOutcome::None,
                RuleOutcomeReason::PreconditionFail,
            ));
        }
    }

    if let Some(where_if) = &rule.where_if {
        let mut ctx = ExpressionContext::new();
        if where_if.evaluate(&mut ctx, object)? != Some(true) {
            return Ok(record_with(
                run,
                rule,
                object,
                RuleOutcome::None,
                RuleOutcomeReason::PreconditionFail,
            ));
        }
    }

    let mut ctx = ExpressionContext::new();
    let mut record = match rule.condition.evaluate(&mut ctx, object)? {
        Some(true) => record_with(run, rule, object, RuleOutcome::Pass, RuleOutcomeReason::Processed),
        Some(false) => record_with(run, rule, object, RuleOutcome::Fail, RuleOutcomeReason::Processed),
        None => record_with(
            run,
            rule,
            object,
            RuleOutcome::None,
            RuleOutcomeReason::Inconclusive,
        ),
    };
    if record.outcome == RuleOutcome::Fail {
        record.reason = ctx.take_reasons();
    }
    Ok(record)
}

fn record_with(
    run: &Run,
    rule: &RuleBlock,
    object: &TargetObject,
    outcome: RuleOutcome,
    outcome_reason: RuleOutcomeReason,
) -> RuleRecord {
    RuleRecord {
        rule_id: rule.id.clone(),
        rule_name: rule.id.name().to_string(),
        target_name: object.name.clone(),
        target_type: object.type_name.clone(),
        outcome,
        outcome_reason,
        default_level: rule.default_level,
        level: run.effective_level(rule),
        reason: Vec::new(),
        tag: rule.tags.clone(),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResourceCache;
    use std::collections::BTreeMap;
    use crate::run::{RunBuilder, RunOptions};
    use crate::test_support::{rule, selector, suppression_group};
    use ruleguard_types::SeverityLevel;
    use serde_json::json;

    fn run_with(resources: Vec<crate::resource::Resource>) -> Run {
        let mut cache = ResourceCache::new();
        for r in resources {
            cache.insert(r).unwrap();
        }
        RunBuilder::new(&cache, RunOptions::default()).build().unwrap()
    }

    fn object(value: serde_json::Value) -> TargetObject {
        TargetObject::json("obj", "Object", value)
    }

    fn outcome_of<'a>(records: &'a [RuleRecord], name: &str) -> &'a RuleRecord {
        records
            .iter()
            .find(|r| r.rule_name == name)
            .expect("record for rule")
    }

    #[test]
    fn pass_and_fail_outcomes() {
        let run = run_with(vec![
            rule("m/HasX").condition(json!({ "field": "x", "exists": true })).build(),
        ]);

        let records = evaluate(&run, &object(json!({ "x": 1 })));
        assert_eq!(records[0].outcome, RuleOutcome::Pass);
        assert_eq!(records[0].outcome_reason, RuleOutcomeReason::Processed);
        assert!(records[0].reason.is_empty());

        let records = evaluate(&run, &object(json!({})));
        assert_eq!(records[0].outcome, RuleOutcome::Fail);
        assert_eq!(records[0].reason, ["Path 'x' does not exist."]);
    }

    #[test]
    fn dependency_failure_skips_dependent_condition() {
        let run = run_with(vec![
            rule("m/A").condition(json!({ "field": "x", "exists": true })).build(),
            rule("m/B")
                .condition(json!({ "field": "y", "equals": 1 }))
                .depends_on(&["m/A"])
                .build(),
        ]);

        let records = evaluate(&run, &object(json!({ "x": 1, "y": 1 })));
        assert_eq!(outcome_of(&records, "A").outcome, RuleOutcome::Pass);
        assert_eq!(outcome_of(&records, "B").outcome, RuleOutcome::Pass);

        let records = evaluate(&run, &object(json!({ "y": 1 })));
        assert_eq!(outcome_of(&records, "A").outcome, RuleOutcome::Fail);
        let b = outcome_of(&records, "B");
        assert_eq!(b.outcome, RuleOutcome::None);
        assert_eq!(b.outcome_reason, RuleOutcomeReason::DependencyFail);
    }

    #[test]
    fn type_precondition_yields_none() {
        let run = run_with(vec![
            rule("m/A")
                .condition(json!({ "field": "x", "exists": true }))
                .type_of(&["App.Service"])
                .build(),
        ]);

        let records = evaluate(&run, &object(json!({ "x": 1 })));
        assert_eq!(records[0].outcome, RuleOutcome::None);
        assert_eq!(records[0].outcome_reason, RuleOutcomeReason::PreconditionFail);

        let service = TargetObject::json("svc", "app.service", json!({ "x": 1 }));
        let records = evaluate(&run, &service);
        assert_eq!(records[0].outcome, RuleOutcome::Pass);
    }

    #[test]
    fn with_selector_gates_evaluation() {
        let run = run_with(vec![
            selector("m/IsService", json!({ "field": "kind", "equals": "service" })),
            rule("m/A")
                .condition(json!({ "field": "x", "exists": true }))
                .with_selector("m/IsService")
                .build(),
        ]);

        let records = evaluate(&run, &object(json!({ "kind": "service", "x": 1 })));
        assert_eq!(records[0].outcome, RuleOutcome::Pass);

        let records = evaluate(&run, &object(json!({ "kind": "job", "x": 1 })));
        assert_eq!(records[0].outcome, RuleOutcome::None);
        assert_eq!(records[0].outcome_reason, RuleOutcomeReason::PreconditionFail);
    }

    #[test]
    fn where_precondition_gates_evaluation() {
        let run = run_with(vec![
            rule("m/A")
                .condition(json!({ "field": "x", "exists": true }))
                .where_if(json!({ "field": "env", "equals": "prod" }))
                .build(),
        ]);

        let records = evaluate(&run, &object(json!({ "env": "dev", "x": 1 })));
        assert_eq!(records[0].outcome, RuleOutcome::None);

        let records = evaluate(&run, &object(json!({ "env": "prod" })));
        assert_eq!(records[0].outcome, RuleOutcome::Fail);
    }

    #[test]
    fn evaluation_fault_is_isolated_to_one_record() {
        let run = run_with(vec![
            rule("m/Bad").condition(json!({ "field": "Count", "greater": 3 })).build(),
            rule("m/Good").condition(json!({ "field": "x", "exists": true })).build(),
        ]);

        let records = evaluate(&run, &object(json!({ "Count": "abc", "x": 1 })));
        let bad = outcome_of(&records, "Bad");
        assert_eq!(bad.outcome, RuleOutcome::Error);
        assert!(bad.error.as_deref().unwrap().contains("Count"));
        assert_eq!(outcome_of(&records, "Good").outcome, RuleOutcome::Pass);
    }

    #[test]
    fn error_outcome_fails_dependents() {
        let run = run_with(vec![
            rule("m/Bad").condition(json!({ "field": "Count", "greater": 3 })).build(),
            rule("m/Dep")
                .condition(json!({ "field": "x", "exists": true }))
                .depends_on(&["m/Bad"])
                .build(),
        ]);

        let records = evaluate(&run, &object(json!({ "Count": "abc", "x": 1 })));
        let dep = outcome_of(&records, "Dep");
        assert_eq!(dep.outcome, RuleOutcome::None);
        assert_eq!(dep.outcome_reason, RuleOutcomeReason::DependencyFail);
    }

    #[test]
    fn precondition_none_does_not_fail_dependents() {
        let run = run_with(vec![
            rule("m/A")
                .condition(json!({ "field": "x", "exists": true }))
                .type_of(&["App.Service"])
                .build(),
            rule("m/B")
                .condition(json!({ "field": "x", "exists": true }))
                .depends_on(&["m/A"])
                .build(),
        ]);

        let records = evaluate(&run, &object(json!({ "x": 1 })));
        assert_eq!(outcome_of(&records, "A").outcome, RuleOutcome::None);
        assert_eq!(outcome_of(&records, "B").outcome, RuleOutcome::Pass);
    }

    #[test]
    fn suppression_group_suppresses_listed_rules() {
        let run = run_with(vec![
            rule("m/A").condition(json!({ "field": "x", "exists": true })).build(),
            rule("m/B").condition(json!({ "field": "x", "exists": true })).build(),
            suppression_group(
                "m/IgnoreLegacy",
                &["A"],
                json!({ "field": "legacy", "equals": true }),
            ),
        ]);

        let records = evaluate(&run, &object(json!({ "legacy": true })));
        let a = outcome_of(&records, "A");
        assert_eq!(a.outcome, RuleOutcome::None);
        assert_eq!(a.outcome_reason, RuleOutcomeReason::None);
        assert_eq!(outcome_of(&records, "B").outcome, RuleOutcome::Fail);

        let records = evaluate(&run, &object(json!({ "legacy": false })));
        assert_eq!(outcome_of(&records, "A").outcome, RuleOutcome::Fail);
    }

    #[test]
    fn severity_override_reports_both_levels() {
        let mut cache = ResourceCache::new();
        cache
            .insert(rule("m/A").condition(json!({ "field": "x", "exists": true })).build())
            .unwrap();
        let mut level_overrides = BTreeMap::new();
        level_overrides.insert("m/A".to_string(), SeverityLevel::Warning);
        let run = RunBuilder::new(&cache, RunOptions { level_overrides, ..RunOptions::default() })
            .build()
            .unwrap();

        let records = evaluate(&run, &object(json!({})));
        assert_eq!(records[0].default_level, SeverityLevel::Error);
        assert_eq!(records[0].level, SeverityLevel::Warning);
    }

    #[test]
    fn runs_are_shareable_across_workers() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Run>();
        assert_send_sync::<TargetObject>();
    }

    #[test]
    fn evaluation_is_idempotent() {
        let run = run_with(vec![
            rule("m/A").condition(json!({ "field": "x", "equals": "y" })).build(),
        ]);
        let obj = object(json!({ "x": "z" }));
        let first = evaluate(&run, &obj);
        let second = evaluate(&run, &obj);
        assert_eq!(first, second);
    }
}
