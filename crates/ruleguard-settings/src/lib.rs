//! Config parsing and run option resolution.
//!
//! This crate is intentionally IO-free: it parses and resolves configuration provided as strings.

#![forbid(unsafe_code)]

mod model;
mod resolve;

pub use model::{OverrideConfig, RuleConfig, RuleguardConfigV1};
pub use resolve::Overrides;

use ruleguard_domain::RunOptions;

/// Parse `ruleguard.toml` (or equivalent) into a typed model.
pub fn parse_config_toml(input: &str) -> anyhow::Result<RuleguardConfigV1> {
    let cfg: RuleguardConfigV1 = toml::from_str(input)?;
    Ok(cfg)
}

/// Resolve run options from the file model plus programmatic overrides.
pub fn resolve_config(cfg: RuleguardConfigV1, overrides: Overrides) -> anyhow::Result<RunOptions> {
    resolve::resolve_config(cfg, overrides)
}
