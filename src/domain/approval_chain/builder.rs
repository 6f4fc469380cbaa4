use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::errors::WorkflowError;
use crate::domain::hierarchy::{ChainLevel, OrgUnitType};
use super::{ApprovalChain, Approver, ApproverRoster, BoundLevel};

/// Binds each resolved level to a concrete approver from the roster.
///
/// Default choice is the candidate with the lowest id. Overrides are keyed by
/// level index and must name a member of that level's candidate set.
pub struct ApprovalChainBuilder<'a> {
    roster: &'a dyn ApproverRoster,
}

impl<'a> ApprovalChainBuilder<'a> {
    pub fn new(roster: &'a dyn ApproverRoster) -> Self {
        Self { roster }
    }

    /// Qualified approvers for `level`, sorted by id, without duplicates
    pub fn candidates(&self, level: &ChainLevel) -> Vec<Approver> {
        let mut pool = match level {
            ChainLevel::Unit(unit) => self.roster.approvers(unit),
            ChainLevel::Regional => {
                let mut pool = self.roster.approvers(&OrgUnitType::regional());
                pool.extend(self.roster.directors());
                pool
            }
        };

        pool.retain(|a| a.qualifies_for(level));
        pool.sort_by_key(|a| a.id);
        pool.dedup_by_key(|a| a.id);
        pool
    }

    pub fn build(&self, levels: &[ChainLevel]) -> Result<ApprovalChain, WorkflowError> {
        self.build_with_overrides(levels, &BTreeMap::new())
    }

    pub fn build_with_overrides(
        &self,
        levels: &[ChainLevel],
        overrides: &BTreeMap<usize, Uuid>,
    ) -> Result<ApprovalChain, WorkflowError> {
        if let Some((&index, &approver_id)) = overrides.iter().find(|&(&i, _)| i >= levels.len()) {
            return Err(WorkflowError::InvalidApproverOverride { index, approver_id });
        }

        let mut bound = Vec::with_capacity(levels.len());

        for (index, level) in levels.iter().enumerate() {
            let candidates = self.candidates(level);

            let approver = match overrides.get(&index) {
                Some(&approver_id) => candidates
                    .iter()
                    .find(|c| c.id == approver_id)
                    .cloned()
                    .ok_or(WorkflowError::InvalidApproverOverride { index, approver_id })?,
                None => candidates
                    .first()
                    .cloned()
                    .ok_or_else(|| WorkflowError::NoQualifiedApprover { index, level: level.clone() })?,
            };

            bound.push(BoundLevel {
                level: level.clone(),
                approver,
                candidates,
            });
        }

        ApprovalChain::new(bound)
    }
}
