use crate::domain::hierarchy::OrgUnitType;
use super::{Approver, ApproverRole};

/// Lookup of current position-holders. Read once per chain build.
pub trait ApproverRoster: Send + Sync {
    /// Everyone holding an approving position in `unit`
    fn approvers(&self, unit: &OrgUnitType) -> Vec<Approver>;

    /// Every director, whatever their unit
    fn directors(&self) -> Vec<Approver>;
}

/// Fixed roster snapshot held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoster {
    approvers: Vec<Approver>,
}

impl InMemoryRoster {
    pub fn new(approvers: Vec<Approver>) -> Self {
        Self { approvers }
    }

    pub fn with(mut self, approver: Approver) -> Self {
        self.approvers.push(approver);
        self
    }

    pub fn len(&self) -> usize {
        self.approvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.approvers.is_empty()
    }
}

impl ApproverRoster for InMemoryRoster {
    fn approvers(&self, unit: &OrgUnitType) -> Vec<Approver> {
        self.approvers.iter().filter(|a| &a.unit == unit).cloned().collect()
    }

    fn directors(&self) -> Vec<Approver> {
        self.approvers
            .iter()
            .filter(|a| a.role == ApproverRole::Director)
            .cloned()
            .collect()
    }
}
