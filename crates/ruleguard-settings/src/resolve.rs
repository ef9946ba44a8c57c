use anyhow::Context;
use globset::Glob;

use ruleguard_domain::RunOptions;
use ruleguard_types::{ResourceId, ResourceIdKind, SeverityLevel};

use crate::model::RuleguardConfigV1;

/// Programmatic overrides layered over the file model, typically from CLI
/// flags. Anything set here wins over `ruleguard.toml`.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub baseline: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

pub fn resolve_config(cfg: RuleguardConfigV1, overrides: Overrides) -> anyhow::Result<RunOptions> {
    let include = if !overrides.include.is_empty() {
        overrides.include
    } else {
        cfg.rule.include
    };
    validate_patterns("rule.include", &include)?;
    let exclude = if !overrides.exclude.is_empty() {
        overrides.exclude
    } else {
        cfg.rule.exclude
    };

    let baseline = overrides
        .baseline
        .or(cfg.baseline)
        .map(|b| {
            ResourceId::parse(&b, ResourceIdKind::Unknown)
                .with_context(|| format!("invalid baseline id: {b}"))
        })
        .transpose()?;

    let mut level_overrides = std::collections::BTreeMap::new();
    for (rule, level) in cfg.overrides.level {
        let level = parse_level(&level).with_context(|| format!("invalid level for {rule}"))?;
        level_overrides.insert(rule, level);
    }

    Ok(RunOptions {
        include,
        exclude,
        tag: cfg.rule.tag,
        labels: cfg.rule.labels,
        baseline,
        level_overrides,
        configuration: cfg.configuration,
    })
}

fn validate_patterns(key: &str, patterns: &[String]) -> anyhow::Result<()> {
    // Plain names are valid globs, so validate every entry.
    for pattern in patterns {
        Glob::new(pattern).with_context(|| format!("invalid {key} pattern: {pattern}"))?;
    }
    Ok(())
}

fn parse_level(v: &str) -> anyhow::Result<SeverityLevel> {
    match v {
        "error" => Ok(SeverityLevel::Error),
        "warning" | "warn" => Ok(SeverityLevel::Warning),
        "information" | "info" => Ok(SeverityLevel::Information),
        other => anyhow::bail!("unknown level: {other} (expected error|warning|information)"),
    }
}
