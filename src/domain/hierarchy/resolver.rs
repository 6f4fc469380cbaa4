use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context;

use crate::domain::errors::WorkflowError;
use super::{ChainLevel, OrgUnitType};

const BUILTIN_HIERARCHY: &str = include_str!("default_hierarchy.json");

static BUILTIN: LazyLock<HierarchyTable> = LazyLock::new(|| {
    HierarchyTable::from_json(BUILTIN_HIERARCHY).expect("embedded hierarchy table is valid")
});

/// Table-driven mapping from a submitter's unit to its ordered approval levels.
///
/// Every chain is validated on load, so `resolve_chain` is total over
/// `units()`: non-empty, ends at the regional level, no repeated level.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyTable {
    chains: BTreeMap<OrgUnitType, Vec<ChainLevel>>,
}

impl HierarchyTable {
    /// The table shipped with the crate
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Parse a `{ "unit": ["level", ...] }` document
    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| WorkflowError::InvalidChain(format!("unreadable hierarchy table: {}", e)))?;

        let chains = raw
            .into_iter()
            .map(|(unit, levels)| {
                (
                    OrgUnitType::new(unit),
                    levels.into_iter().map(ChainLevel::from).collect(),
                )
            })
            .collect();

        Self::from_chains(chains)
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read hierarchy table {}", path.display()))?;
        let table = Self::from_json(&json)?;

        tracing::info!(path = %path.display(), units = table.chains.len(), "Loaded hierarchy table");
        Ok(table)
    }

    pub fn from_chains(chains: BTreeMap<OrgUnitType, Vec<ChainLevel>>) -> Result<Self, WorkflowError> {
        if chains.is_empty() {
            return Err(WorkflowError::InvalidChain("hierarchy table has no units".into()));
        }
        for (unit, levels) in &chains {
            validate_levels(unit, levels)?;
        }
        Ok(Self { chains })
    }

    /// Ordered approval levels for a submitter in `unit`
    pub fn resolve_chain(&self, unit: &OrgUnitType) -> Result<Vec<ChainLevel>, WorkflowError> {
        self.chains
            .get(unit)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownOrgUnit(unit.to_string()))
    }

    pub fn units(&self) -> impl Iterator<Item = &OrgUnitType> {
        self.chains.keys()
    }

    pub fn contains(&self, unit: &OrgUnitType) -> bool {
        self.chains.contains_key(unit)
    }
}

fn validate_levels(unit: &OrgUnitType, levels: &[ChainLevel]) -> Result<(), WorkflowError> {
    let Some(last) = levels.last() else {
        return Err(WorkflowError::InvalidChain(format!("{} has an empty chain", unit)));
    };
    if !last.is_regional() {
        return Err(WorkflowError::InvalidChain(format!(
            "{} chain ends at {} instead of the regional level",
            unit, last
        )));
    }
    if levels[..levels.len() - 1].iter().any(ChainLevel::is_regional) {
        return Err(WorkflowError::InvalidChain(format!(
            "{} chain reaches the regional level before its end",
            unit
        )));
    }

    let mut seen = HashSet::new();
    for level in levels {
        if !seen.insert(level) {
            return Err(WorkflowError::InvalidChain(format!("{} chain repeats {}", unit, level)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(code: &str) -> OrgUnitType {
        OrgUnitType::new(code)
    }

    #[test]
    fn test_builtin_table_is_total_and_terminates_at_regional() {
        let table = HierarchyTable::builtin();
        let units: Vec<_> = table.units().cloned().collect();
        assert_eq!(units.len(), 14);

        for u in &units {
            let chain = table.resolve_chain(u).unwrap();
            assert!(!chain.is_empty(), "{} resolved to an empty chain", u);
            assert_eq!(chain.last(), Some(&ChainLevel::Regional), "{} does not end at regional", u);
        }
    }

    #[test]
    fn test_field_office_reports_through_parent_office() {
        let table = HierarchyTable::builtin();
        let chain = table.resolve_chain(&unit("pugo_csc")).unwrap();

        assert_eq!(
            chain,
            vec![
                ChainLevel::Unit(unit("pugo_csc")),
                ChainLevel::Unit(unit("launion_po")),
                ChainLevel::Unit(unit("tmsd")),
                ChainLevel::Unit(unit("afsd")),
                ChainLevel::Regional,
            ]
        );
    }

    #[test]
    fn test_divisions_skip_their_own_head() {
        let table = HierarchyTable::builtin();
        assert_eq!(
            table.resolve_chain(&unit("tmsd")).unwrap(),
            vec![ChainLevel::Unit(unit("afsd")), ChainLevel::Regional]
        );
        assert_eq!(table.resolve_chain(&unit("afsd")).unwrap(), vec![ChainLevel::Regional]);
    }

    #[test]
    fn test_regional_staff_chain_is_director_only() {
        let table = HierarchyTable::builtin();
        assert_eq!(table.resolve_chain(&OrgUnitType::regional()).unwrap(), vec![ChainLevel::Regional]);
    }

    #[test]
    fn test_unknown_unit_fails() {
        let table = HierarchyTable::builtin();
        let err = table.resolve_chain(&unit("atlantis_csc")).unwrap_err();
        assert_eq!(err, WorkflowError::UnknownOrgUnit("atlantis_csc".into()));
    }

    #[test]
    fn test_new_unit_is_pure_data() {
        let table = HierarchyTable::from_json(
            r#"{ "vigan_csc": ["vigan_csc", "ilocossur_po", "regional"] }"#,
        )
        .unwrap();

        assert!(table.contains(&unit("vigan_csc")));
        assert_eq!(table.resolve_chain(&unit("vigan_csc")).unwrap().len(), 3);
    }

    #[test]
    fn test_malformed_tables_are_rejected() {
        let cases = [
            r#"{ "a": [] }"#,
            r#"{ "a": ["a", "b"] }"#,
            r#"{ "a": ["regional", "a", "regional"] }"#,
            r#"{ "a": ["a", "a", "regional"] }"#,
            r#"{}"#,
            r#"not json"#,
        ];

        for json in cases {
            let err = HierarchyTable::from_json(json).unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidChain(_)), "accepted {}", json);
        }
    }
}
