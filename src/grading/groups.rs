use std::collections::HashSet;

use super::average::overall_group;
use super::config::{CatalogGroup, CatalogModule, GroupCatalog};
use super::error::GradeError;
use super::matcher::ModuleMatcher;
use super::types::{GroupRecord, ModuleRecord};

/// Partitions modules into UEs following the catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupAssigner {
    matcher: ModuleMatcher,
}

impl GroupAssigner {
    pub fn new(matcher: ModuleMatcher) -> Self {
        Self { matcher }
    }

    /// Build the groups for `records`.
    ///
    /// Catalog groups come first, in catalog order, then one singleton per
    /// unmatched module in source order. A module goes to the first group
    /// with a matching entry. The overall UE record is appended when the
    /// catalog is non-empty and carries credits.
    pub fn assign(&self, records: &[ModuleRecord], catalog: &GroupCatalog) -> Vec<GroupRecord> {
        let mut groups: Vec<GroupRecord> = catalog
            .groups
            .iter()
            .map(|g| GroupRecord::new(g.name.clone()))
            .collect();
        let mut singletons: Vec<GroupRecord> = Vec::new();

        for record in records.iter().filter(|r| !r.is_aggregate) {
            match self.find_group(&record.designation, catalog) {
                Some(idx) => groups[idx].members.push(record.clone()),
                None => {
                    let mut group = GroupRecord::singleton(record.clone());
                    group.name = unique_name(&record.designation, |name| {
                        groups.iter().chain(singletons.iter()).any(|g| g.name == name)
                    });
                    singletons.push(group);
                }
            }
        }

        groups.extend(singletons);
        for group in groups.iter_mut() {
            group.recompute();
        }

        if !catalog.is_empty() {
            let overall = overall_group(&groups);
            if overall.total_credits > 0 {
                groups.push(overall);
            }
        }
        groups
    }

    /// First catalog group with an entry matching `designation`.
    fn find_group(&self, designation: &str, catalog: &GroupCatalog) -> Option<usize> {
        catalog.groups.iter().position(|g| {
            g.modules
                .iter()
                .any(|m| self.matcher.matches(designation, &m.name, m.aliases()))
        })
    }

    /// Merge `a` and `b` into one group named `"a + b"` (members of `a`
    /// first) and record it in the catalog in place of both operands.
    pub fn merge(
        &self,
        groups: &[GroupRecord],
        catalog: &mut GroupCatalog,
        a: &str,
        b: &str,
    ) -> Result<GroupRecord, GradeError> {
        if a == b {
            return Err(GradeError::SameGroup(a.to_string()));
        }
        let first = find_real_group(groups, a)?;
        let second = find_real_group(groups, b)?;

        let name = unique_name(&format!("{} + {}", a, b), |candidate| {
            candidate != a
                && candidate != b
                && (groups.iter().any(|g| g.name == candidate) || catalog.get(candidate).is_some())
        });

        let mut merged = GroupRecord::new(name);
        merged.members.extend(first.members.iter().cloned());
        merged.members.extend(second.members.iter().cloned());
        merged.recompute();

        let index = [catalog.position(a), catalog.position(b)]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(catalog.groups.len());
        // Aliases of the entries being folded into the merged group
        let previous: Vec<CatalogModule> = [a, b]
            .into_iter()
            .filter_map(|n| catalog.get(n))
            .flat_map(|g| g.modules.iter().cloned())
            .collect();
        let mut entry = CatalogGroup::from_record(&merged);
        for module in &mut entry.modules {
            if let Some(old) = previous
                .iter()
                .find(|m| self.matcher.matches(&module.name, &m.name, m.aliases()))
            {
                module.aliases = old.aliases.clone();
            }
        }

        catalog.remove(a);
        catalog.remove(b);
        catalog.insert(index, entry);

        Ok(merged)
    }

    /// Break a group back into one singleton per member and forget it in
    /// the catalog.
    pub fn split(
        &self,
        groups: &[GroupRecord],
        catalog: &mut GroupCatalog,
        name: &str,
    ) -> Result<Vec<GroupRecord>, GradeError> {
        let group = find_real_group(groups, name)?;
        catalog.remove(name);
        Ok(group
            .members
            .iter()
            .cloned()
            .map(GroupRecord::singleton)
            .collect())
    }
}

fn find_real_group<'a>(groups: &'a [GroupRecord], name: &str) -> Result<&'a GroupRecord, GradeError> {
    let group = groups
        .iter()
        .find(|g| g.name == name)
        .ok_or_else(|| GradeError::UnknownGroup(name.to_string()))?;
    if group.is_aggregate {
        return Err(GradeError::AggregateRecord(name.to_string()));
    }
    Ok(group)
}

/// `base`, or `base (2)`, `base (3)`... whichever is not taken.
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{} ({})", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// True when every non-aggregate module sits in exactly one group.
pub fn is_partition(records: &[ModuleRecord], groups: &[GroupRecord]) -> bool {
    let expected: Vec<&str> = records
        .iter()
        .filter(|r| !r.is_aggregate)
        .map(|r| r.designation.as_str())
        .collect();
    let placed: Vec<&str> = groups
        .iter()
        .filter(|g| !g.is_aggregate)
        .flat_map(|g| g.members.iter().map(|m| m.designation.as_str()))
        .collect();
    let unique: HashSet<&str> = placed.iter().copied().collect();
    placed.len() == expected.len()
        && unique.len() == placed.len()
        && expected.iter().all(|name| unique.contains(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::types::OVERALL_GROUP_NAME;

    fn module(name: &str, average: Option<f64>, credits: u32) -> ModuleRecord {
        let mut m = ModuleRecord::new(name, "", None, None, average, credits);
        m.average = average;
        m
    }

    fn records() -> Vec<ModuleRecord> {
        vec![
            module("Algèbre", Some(10.0), 3),
            module("Analyse", Some(14.0), 2),
            module("Réseaux", Some(8.0), 5),
            module("Physique", None, 2),
        ]
    }

    fn maths_catalog() -> GroupCatalog {
        GroupCatalog::new(vec![CatalogGroup {
            name: "UE Maths".to_string(),
            modules: vec![CatalogModule::new("Algèbre", 3), CatalogModule::new("Analyse", 2)],
        }])
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_catalog_gives_singletons() {
        let assigner = GroupAssigner::default();
        let records = records();
        let groups = assigner.assign(&records, &GroupCatalog::default());

        assert_eq!(groups.len(), 4);
        assert!(groups.iter().all(|g| g.members.len() == 1 && !g.is_aggregate));
        assert_eq!(groups[0].name, "Algèbre");
        assert!(is_partition(&records, &groups));
    }

    #[test]
    fn test_catalog_groups_then_singletons() {
        let assigner = GroupAssigner::default();
        let records = records();
        let groups = assigner.assign(&records, &maths_catalog());

        assert_eq!(groups[0].name, "UE Maths");
        assert_eq!(groups[0].member_names(), vec!["Algèbre", "Analyse"]);
        assert!(approx(groups[0].average, 11.6));
        assert_eq!(groups[1].name, "Réseaux");
        assert_eq!(groups[2].name, "Physique");
        let overall = groups.last().unwrap();
        assert!(overall.is_aggregate);
        assert_eq!(overall.name, OVERALL_GROUP_NAME);
        assert_eq!(overall.total_credits, 12);
        assert!(is_partition(&records, &groups));
    }

    #[test]
    fn test_fuzzy_assignment() {
        let assigner = GroupAssigner::default();
        let records = vec![module("Algèbre linéaire", Some(12.0), 3)];
        let groups = assigner.assign(&records, &maths_catalog());
        assert_eq!(groups[0].member_names(), vec!["Algèbre linéaire"]);
    }

    #[test]
    fn test_first_matching_group_wins() {
        let catalog = GroupCatalog::new(vec![
            CatalogGroup {
                name: "UE A".to_string(),
                modules: vec![CatalogModule::new("Algèbre linéaire", 3)],
            },
            CatalogGroup {
                name: "UE B".to_string(),
                modules: vec![CatalogModule::new("Algèbre", 3)],
            },
        ]);
        let records = vec![module("Algèbre", Some(10.0), 3)];
        let groups = GroupAssigner::default().assign(&records, &catalog);
        assert_eq!(groups[0].name, "UE A");
        assert_eq!(groups[0].member_names(), vec!["Algèbre"]);
        assert!(groups[1].members.is_empty());
        assert!(is_partition(&records, &groups));
    }

    #[test]
    fn test_singleton_name_collision_is_suffixed() {
        let catalog = GroupCatalog::new(vec![CatalogGroup {
            name: "Physique".to_string(),
            modules: vec![CatalogModule::new("Mécanique", 2)],
        }]);
        let records = vec![module("Physique", Some(12.0), 2)];
        let groups = GroupAssigner::default().assign(&records, &catalog);
        assert!(groups.iter().any(|g| g.name == "Physique (2)"));
    }

    #[test]
    fn test_merge_then_split_restores_partition() {
        let assigner = GroupAssigner::default();
        let records = records();
        let mut catalog = GroupCatalog::default();
        let before = assigner.assign(&records, &catalog);

        let merged = assigner
            .merge(&before, &mut catalog, "Algèbre", "Analyse")
            .unwrap();
        assert_eq!(merged.name, "Algèbre + Analyse");
        assert_eq!(merged.total_credits, 5);
        assert!(approx(merged.average, 11.6));
        assert_eq!(catalog.groups.len(), 1);

        let after_merge = assigner.assign(&records, &catalog);
        assert_eq!(after_merge[0].name, "Algèbre + Analyse");
        assert!(is_partition(&records, &after_merge));

        let parts = assigner
            .split(&after_merge, &mut catalog, "Algèbre + Analyse")
            .unwrap();
        assert_eq!(parts.len(), 2);
        assert!(catalog.is_empty());

        let after_split = assigner.assign(&records, &catalog);
        assert_eq!(after_split, before);
    }

    #[test]
    fn test_merge_keeps_catalog_aliases() {
        let assigner = GroupAssigner::default();
        let records = records();
        let mut catalog = GroupCatalog::new(vec![CatalogGroup {
            name: "UE Maths".to_string(),
            modules: vec![
                CatalogModule::new("Algèbre", 3).with_aliases(vec!["Algebre lineaire".to_string()]),
                CatalogModule::new("Analyse", 2),
            ],
        }]);
        let groups = assigner.assign(&records, &catalog);

        let merged = assigner
            .merge(&groups, &mut catalog, "UE Maths", "Réseaux")
            .unwrap();
        let entry = catalog.get(&merged.name).unwrap();
        let algebre = entry.modules.iter().find(|m| m.name == "Algèbre").unwrap();
        assert_eq!(algebre.aliases(), Some(&["Algebre lineaire".to_string()][..]));
        let reseaux = entry.modules.iter().find(|m| m.name == "Réseaux").unwrap();
        assert!(reseaux.aliases().is_none());
    }

    #[test]
    fn test_merge_refusals() {
        let assigner = GroupAssigner::default();
        let records = records();
        let mut catalog = maths_catalog();
        let groups = assigner.assign(&records, &catalog);

        assert_eq!(
            assigner.merge(&groups, &mut catalog, "UE Maths", "UE Maths"),
            Err(GradeError::SameGroup("UE Maths".to_string()))
        );
        assert_eq!(
            assigner.merge(&groups, &mut catalog, "UE Maths", "Nope"),
            Err(GradeError::UnknownGroup("Nope".to_string()))
        );
        assert_eq!(
            assigner.merge(&groups, &mut catalog, OVERALL_GROUP_NAME, "Réseaux"),
            Err(GradeError::AggregateRecord(OVERALL_GROUP_NAME.to_string()))
        );
        assert_eq!(catalog, maths_catalog());
    }

    #[test]
    fn test_merge_catalog_group_keeps_position() {
        let assigner = GroupAssigner::default();
        let records = records();
        let mut catalog = maths_catalog();
        let groups = assigner.assign(&records, &catalog);

        assigner.merge(&groups, &mut catalog, "Réseaux", "UE Maths").unwrap();
        assert_eq!(catalog.groups.len(), 1);
        assert_eq!(catalog.groups[0].name, "Réseaux + UE Maths");

        let rebuilt = assigner.assign(&records, &catalog);
        assert_eq!(
            rebuilt[0].member_names(),
            vec!["Algèbre", "Analyse", "Réseaux"]
        );
        assert!(is_partition(&records, &rebuilt));
    }

    #[test]
    fn test_split_refuses_overall() {
        let assigner = GroupAssigner::default();
        let mut catalog = maths_catalog();
        let groups = assigner.assign(&records(), &catalog);
        assert!(matches!(
            assigner.split(&groups, &mut catalog, OVERALL_GROUP_NAME),
            Err(GradeError::AggregateRecord(_))
        ));
    }

    #[test]
    fn test_unique_name() {
        let taken = ["A", "A (2)"];
        assert_eq!(unique_name("A", |n| taken.contains(&n)), "A (3)");
        assert_eq!(unique_name("B", |n| taken.contains(&n)), "B");
    }
}
