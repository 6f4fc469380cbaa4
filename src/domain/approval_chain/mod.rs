// ============================================================================
// Approval Chain - levels bound to concrete approvers
// ============================================================================
//
// - Value objects (Approver, BoundLevel, ApprovalChain)
// - Roster collaborator (ApproverRoster, InMemoryRoster)
// - Builder (ApprovalChainBuilder)
//
// ============================================================================

pub mod builder;
pub mod roster;

pub use builder::ApprovalChainBuilder;
pub use roster::{ApproverRoster, InMemoryRoster};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::WorkflowError;
use crate::domain::hierarchy::{ChainLevel, OrgUnitType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverRole {
    Head,
    Director,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    pub id: Uuid,
    pub name: String,
    pub unit: OrgUnitType,
    pub role: ApproverRole,
}

impl Approver {
    pub fn head(id: Uuid, name: impl Into<String>, unit: OrgUnitType) -> Self {
        Self { id, name: name.into(), unit, role: ApproverRole::Head }
    }

    pub fn director(id: Uuid, name: impl Into<String>, unit: OrgUnitType) -> Self {
        Self { id, name: name.into(), unit, role: ApproverRole::Director }
    }

    /// Whether this approver may sign for `level`
    pub fn qualifies_for(&self, level: &ChainLevel) -> bool {
        match level {
            ChainLevel::Unit(unit) => self.role == ApproverRole::Head && &self.unit == unit,
            ChainLevel::Regional => {
                self.role == ApproverRole::Director || (self.role == ApproverRole::Head && self.unit.is_regional())
            }
        }
    }
}

/// A chain level together with the approver selected to satisfy it.
///
/// `candidates` is the roster snapshot taken when the chain was built; any
/// later re-binding must stay inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundLevel {
    pub level: ChainLevel,
    pub approver: Approver,
    pub candidates: Vec<Approver>,
}

impl BoundLevel {
    pub fn candidate(&self, approver_id: Uuid) -> Option<&Approver> {
        self.candidates.iter().find(|c| c.id == approver_id)
    }

    /// The bound approver, or at the regional level any director from the snapshot
    pub fn accepts(&self, approver_id: Uuid) -> bool {
        if self.approver.id == approver_id {
            return true;
        }
        self.level.is_regional()
            && self
                .candidate(approver_id)
                .is_some_and(|c| c.role == ApproverRole::Director)
    }
}

/// Ordered, frozen approval chain stored on a travel order.
///
/// Deserialization goes through `ApprovalChain::new`, so a stored chain can
/// never come back empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredChain")]
pub struct ApprovalChain {
    levels: Vec<BoundLevel>,
}

#[derive(Deserialize)]
struct StoredChain {
    levels: Vec<BoundLevel>,
}

impl TryFrom<StoredChain> for ApprovalChain {
    type Error = WorkflowError;

    fn try_from(stored: StoredChain) -> Result<Self, Self::Error> {
        ApprovalChain::new(stored.levels)
    }
}

impl ApprovalChain {
    pub fn new(levels: Vec<BoundLevel>) -> Result<Self, WorkflowError> {
        if levels.is_empty() {
            return Err(WorkflowError::InvalidChain("approval chain is empty".into()));
        }
        Ok(Self { levels })
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, index: usize) -> Option<&BoundLevel> {
        self.levels.get(index)
    }

    pub fn levels(&self) -> &[BoundLevel] {
        &self.levels
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.levels.len()
    }

    /// Copy of this chain with `index` bound to another candidate
    pub fn rebind(&self, index: usize, approver_id: Uuid) -> Result<Self, WorkflowError> {
        let bound = self
            .levels
            .get(index)
            .ok_or(WorkflowError::InvalidApproverOverride { index, approver_id })?;
        let approver = bound
            .candidate(approver_id)
            .cloned()
            .ok_or(WorkflowError::InvalidApproverOverride { index, approver_id })?;

        let mut levels = self.levels.clone();
        levels[index].approver = approver;
        Ok(Self { levels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(code: &str) -> OrgUnitType {
        OrgUnitType::new(code)
    }

    #[test]
    fn test_head_qualifies_only_for_own_unit() {
        let head = Approver::head(Uuid::new_v4(), "Head", unit("tmsd"));
        assert!(head.qualifies_for(&ChainLevel::Unit(unit("tmsd"))));
        assert!(!head.qualifies_for(&ChainLevel::Unit(unit("afsd"))));
        assert!(!head.qualifies_for(&ChainLevel::Regional));
    }

    #[test]
    fn test_director_satisfies_regional_regardless_of_unit() {
        let director = Approver::director(Uuid::new_v4(), "RD", unit("afsd"));
        assert!(director.qualifies_for(&ChainLevel::Regional));
        assert!(!director.qualifies_for(&ChainLevel::Unit(unit("afsd"))));

        let regional_head = Approver::head(Uuid::new_v4(), "Regional Head", OrgUnitType::regional());
        assert!(regional_head.qualifies_for(&ChainLevel::Regional));
    }

    #[test]
    fn test_empty_chain_is_invalid() {
        assert!(matches!(ApprovalChain::new(vec![]), Err(WorkflowError::InvalidChain(_))));
    }

    #[test]
    fn test_stored_chain_must_not_be_empty() {
        let director = Approver::director(Uuid::new_v4(), "RD", OrgUnitType::regional());
        let chain = ApprovalChain::new(vec![BoundLevel {
            level: ChainLevel::Regional,
            approver: director.clone(),
            candidates: vec![director],
        }])
        .unwrap();

        let json = serde_json::to_value(&chain).unwrap();
        let restored: ApprovalChain = serde_json::from_value(json).unwrap();
        assert_eq!(restored, chain);

        let err = serde_json::from_str::<ApprovalChain>(r#"{ "levels": [] }"#).unwrap_err();
        assert!(err.to_string().contains("approval chain is empty"), "got {}", err);
    }

    #[test]
    fn test_regional_level_accepts_any_snapshot_director() {
        let bound_director = Approver::director(Uuid::new_v4(), "RD", OrgUnitType::regional());
        let other_director = Approver::director(Uuid::new_v4(), "ARD", OrgUnitType::regional());
        let outsider = Uuid::new_v4();

        let level = BoundLevel {
            level: ChainLevel::Regional,
            approver: bound_director.clone(),
            candidates: vec![bound_director.clone(), other_director.clone()],
        };

        assert!(level.accepts(bound_director.id));
        assert!(level.accepts(other_director.id));
        assert!(!level.accepts(outsider));
    }

    #[test]
    fn test_unit_level_accepts_only_bound_head() {
        let a = Approver::head(Uuid::new_v4(), "A", unit("tmsd"));
        let b = Approver::head(Uuid::new_v4(), "B", unit("tmsd"));
        let level = BoundLevel {
            level: ChainLevel::Unit(unit("tmsd")),
            approver: a.clone(),
            candidates: vec![a.clone(), b.clone()],
        };

        assert!(level.accepts(a.id));
        assert!(!level.accepts(b.id));
    }

    #[test]
    fn test_rebind_stays_inside_candidates() {
        let a = Approver::head(Uuid::new_v4(), "A", unit("tmsd"));
        let b = Approver::head(Uuid::new_v4(), "B", unit("tmsd"));
        let chain = ApprovalChain::new(vec![BoundLevel {
            level: ChainLevel::Unit(unit("tmsd")),
            approver: a.clone(),
            candidates: vec![a.clone(), b.clone()],
        }])
        .unwrap();

        let rebound = chain.rebind(0, b.id).unwrap();
        assert_eq!(rebound.level(0).unwrap().approver.id, b.id);
        assert_eq!(chain.level(0).unwrap().approver.id, a.id);

        let stranger = Uuid::new_v4();
        assert_eq!(
            chain.rebind(0, stranger).unwrap_err(),
            WorkflowError::InvalidApproverOverride { index: 0, approver_id: stranger }
        );
        assert!(chain.rebind(3, a.id).is_err());
    }
}
