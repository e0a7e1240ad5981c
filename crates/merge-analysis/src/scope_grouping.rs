use std::collections::BTreeMap;

use merge_model::model::{ContributionId, DeclarationEnv, ScopeKey};

/// Contributions partitioned by their declared scope. Each group keeps discovery order.
#[derive(Debug, Clone, Default)]
pub struct ScopeGroups {
    groups: BTreeMap<ScopeKey, Vec<ContributionId>>,
}

impl ScopeGroups {
    pub fn new(env: &DeclarationEnv) -> Self {
        let mut groups: BTreeMap<ScopeKey, Vec<ContributionId>> = BTreeMap::new();
        for contribution in env.get_contributions() {
            groups
                .entry(contribution.scope.clone())
                .or_default()
                .push(contribution.id);
        }
        Self { groups }
    }

    /// The contributions declared with `scope`; empty for a scope nobody contributes to.
    pub fn contributions(&self, scope: &ScopeKey) -> &[ContributionId] {
        self.groups.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn scopes(&self) -> impl Iterator<Item = &ScopeKey> {
        self.groups.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use merge_model::scan;

    #[test]
    fn groups_by_scope_in_discovery_order() {
        let env = scan([(
            "Source.kt",
            indoc! {"
                @ContributesTo(Any::class) interface A
                @ContributesTo(Unit::class) interface B
                @ContributesTo(Any::class) interface C
            "},
        )]);
        let groups = ScopeGroups::new(&env);
        let any = ScopeKey::new("kotlin.Any");
        let types: Vec<_> = groups
            .contributions(&any)
            .iter()
            .map(|id| env.get_contribution(*id).contributed_type.as_str())
            .collect();
        assert_eq!(types, vec!["A", "C"]);
        assert_eq!(groups.contributions(&ScopeKey::new("kotlin.Unit")).len(), 1);
        assert!(groups.contributions(&ScopeKey::new("Nothing")).is_empty());
        assert_eq!(groups.scopes().count(), 2);
    }
}
