use super::config::{CreditRule, GroupCatalog};
use super::matcher::normalize_name;

/// Credits given to a module nobody configured.
pub const DEFAULT_CREDITS: u32 = 1;

pub const MIN_CREDITS: u32 = 1;
pub const MAX_CREDITS: u32 = 20;

/// Resolves a module's credit weight from the configured rules and catalog.
#[derive(Debug, Clone, Copy)]
pub struct CreditResolver<'a> {
    rules: &'a [CreditRule],
    catalog: &'a GroupCatalog,
}

impl<'a> CreditResolver<'a> {
    pub fn new(rules: &'a [CreditRule], catalog: &'a GroupCatalog) -> Self {
        Self { rules, catalog }
    }

    /// First hit wins: keyword rules, exact name, alias, then loose
    /// substring against entries without aliases. Defaults to 1.
    pub fn resolve(&self, module_name: &str) -> u32 {
        let name = normalize_name(module_name);

        if let Some(rule) = self.rules.iter().find(|r| r.pattern.matches(&name)) {
            return clamp_credits(rule.credits);
        }

        let modules = || self.catalog.modules();

        if let Some(entry) = modules().find(|m| normalize_name(&m.name) == name) {
            return clamp_credits(entry.credits);
        }

        let alias_hit = modules().find(|m| {
            m.aliases().is_some_and(|aliases| {
                aliases.iter().map(|a| normalize_name(a)).any(|alias| {
                    !alias.is_empty() && (name.contains(&alias) || alias.contains(&name))
                })
            })
        });
        if let Some(entry) = alias_hit {
            return clamp_credits(entry.credits);
        }

        let loose_hit = modules().filter(|m| m.aliases().is_none()).find(|m| {
            let entry = normalize_name(&m.name);
            !entry.is_empty() && !name.is_empty() && (name.contains(&entry) || entry.contains(&name))
        });
        if let Some(entry) = loose_hit {
            return clamp_credits(entry.credits);
        }

        DEFAULT_CREDITS
    }
}

pub fn clamp_credits(credits: u32) -> u32 {
    credits.clamp(MIN_CREDITS, MAX_CREDITS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::config::{CatalogGroup, CatalogModule, NamePattern};

    fn catalog() -> GroupCatalog {
        GroupCatalog::new(vec![
            CatalogGroup {
                name: "UE Maths".to_string(),
                modules: vec![
                    CatalogModule::new("Algèbre", 3),
                    CatalogModule::new("Analyse", 2)
                        .with_aliases(vec!["calcul différentiel".to_string()]),
                ],
            },
            CatalogGroup {
                name: "UE Info".to_string(),
                modules: vec![CatalogModule::new("Base de données", 4)],
            },
        ])
    }

    #[test]
    fn test_exact_match_ignores_case_and_spaces() {
        let catalog = catalog();
        let resolver = CreditResolver::new(&[], &catalog);
        assert_eq!(resolver.resolve("  ALGÈBRE "), 3);
        assert_eq!(resolver.resolve("Base   de données"), 4);
    }

    #[test]
    fn test_alias_match() {
        let catalog = catalog();
        let resolver = CreditResolver::new(&[], &catalog);
        assert_eq!(resolver.resolve("Calcul différentiel avancé"), 2);
    }

    #[test]
    fn test_substring_only_for_entries_without_aliases() {
        let catalog = catalog();
        let resolver = CreditResolver::new(&[], &catalog);
        // "Algèbre" has no aliases: substring applies
        assert_eq!(resolver.resolve("Algèbre linéaire"), 3);
        // "Analyse" declares aliases: no loose substring
        assert_eq!(resolver.resolve("Analyse de données"), 1);
    }

    #[test]
    fn test_default_when_unknown() {
        let catalog = GroupCatalog::default();
        let resolver = CreditResolver::new(&[], &catalog);
        assert_eq!(resolver.resolve("Physique"), DEFAULT_CREDITS);
    }

    #[test]
    fn test_rules_run_before_catalog() {
        let catalog = catalog();
        let rules = vec![CreditRule { pattern: NamePattern::from("algèbre"), credits: 6 }];
        let resolver = CreditResolver::new(&rules, &catalog);
        assert_eq!(resolver.resolve("Algèbre"), 6);
    }

    #[test]
    fn test_configured_credits_are_clamped() {
        let catalog = GroupCatalog::new(vec![CatalogGroup {
            name: "UE".to_string(),
            modules: vec![CatalogModule::new("Stage", 40), CatalogModule::new("Sport", 0)],
        }]);
        let resolver = CreditResolver::new(&[], &catalog);
        assert_eq!(resolver.resolve("Stage"), MAX_CREDITS);
        assert_eq!(resolver.resolve("Sport"), MIN_CREDITS);
    }
}
