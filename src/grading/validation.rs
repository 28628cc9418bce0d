use std::collections::HashSet;

use super::credits::{MAX_CREDITS, MIN_CREDITS};
use super::parser::{MAX_SCORE, MIN_SCORE};
use crate::config::Config;

/// Validate configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    // Catalog groups and their modules
    let mut seen = HashSet::new();
    for (i, group) in config.catalog.groups.iter().enumerate() {
        if group.name.trim().is_empty() {
            errors.push(format!("catalog.groups[{}].name: must not be empty", i));
        } else if !seen.insert(group.name.as_str()) {
            errors.push(format!(
                "catalog.groups[{}].name: duplicate group '{}'",
                i, group.name
            ));
        }

        for (j, module) in group.modules.iter().enumerate() {
            let at = format!("catalog.groups[{}].modules[{}]", i, j);
            if module.name.trim().is_empty() {
                errors.push(format!("{}.name: must not be empty", at));
            }
            if !credits_in_range(module.credits) {
                errors.push(format!(
                    "{}.credits: {} is outside {}-{}",
                    at, module.credits, MIN_CREDITS, MAX_CREDITS
                ));
            }
            if let Some(aliases) = &module.aliases {
                for (k, alias) in aliases.iter().enumerate() {
                    if alias.trim().is_empty() {
                        errors.push(format!("{}.aliases[{}]: must not be empty", at, k));
                    }
                }
            }
        }
    }

    for (i, rule) in config.credit_rules.iter().enumerate() {
        if rule.pattern.is_empty() {
            errors.push(format!("credit_rules[{}].pattern: must not be empty", i));
        }
        if !credits_in_range(rule.credits) {
            errors.push(format!(
                "credit_rules[{}].credits: {} is outside {}-{}",
                i, rule.credits, MIN_CREDITS, MAX_CREDITS
            ));
        }
    }

    let threshold = config.matching.similarity_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        errors.push(format!(
            "matching.similarity_threshold: {} must be in (0, 1]",
            threshold
        ));
    }

    let passing = &config.passing;
    for (field, mark) in [
        ("module", passing.module),
        ("strict", passing.strict),
        ("overall", passing.overall),
    ] {
        if !(MIN_SCORE..=MAX_SCORE).contains(&mark) {
            errors.push(format!(
                "passing.{}: {} must be between {} and {}",
                field, mark, MIN_SCORE, MAX_SCORE
            ));
        }
    }
    for (i, pattern) in passing.strict_patterns.iter().enumerate() {
        if pattern.is_empty() {
            errors.push(format!("passing.strict_patterns[{}]: must not be empty", i));
        }
    }

    if let Err(e) = humantime::parse_duration(config.editing.debounce.trim()) {
        errors.push(format!(
            "editing.debounce: invalid '{}' - {}",
            config.editing.debounce, e
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn credits_in_range(credits: u32) -> bool {
    (MIN_CREDITS..=MAX_CREDITS).contains(&credits)
}
