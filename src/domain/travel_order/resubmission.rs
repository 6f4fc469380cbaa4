use crate::domain::approval_chain::{ApprovalChainBuilder, ApproverRoster};
use crate::domain::errors::WorkflowError;
use crate::domain::hierarchy::HierarchyTable;
use super::aggregate::TravelOrderAggregate;
use super::commands::ResubmissionPlan;
use super::value_objects::{OrderAmendment, OrderStatus, Submitter};

/// Turns a submitter's amendment of a rejected order into a resubmission plan.
///
/// The chain is rebuilt from the current roster only when the submitter's
/// unit changes or explicit overrides are given; otherwise the frozen chain
/// carries over to the next round.
pub struct ResubmissionHandler<'a> {
    hierarchy: &'a HierarchyTable,
    roster: &'a dyn ApproverRoster,
}

impl<'a> ResubmissionHandler<'a> {
    pub fn new(hierarchy: &'a HierarchyTable, roster: &'a dyn ApproverRoster) -> Self {
        Self { hierarchy, roster }
    }

    pub fn plan(
        &self,
        order: &TravelOrderAggregate,
        amendment: &OrderAmendment,
    ) -> Result<ResubmissionPlan, WorkflowError> {
        if order.status != OrderStatus::Rejected {
            return Err(WorkflowError::NotRejected(order.status));
        }

        let submitter = match &amendment.submitter_unit {
            Some(unit) => Submitter { unit: unit.clone(), ..order.submitter.clone() },
            None => order.submitter.clone(),
        };
        let details = amendment
            .apply_to(&order.details)
            .normalized(submitter.employee_id)?;

        let unit_changed = submitter.unit != order.submitter.unit;
        let chain = if unit_changed || !amendment.approver_overrides.is_empty() {
            let levels = self.hierarchy.resolve_chain(&submitter.unit)?;
            let chain = ApprovalChainBuilder::new(self.roster)
                .build_with_overrides(&levels, &amendment.approver_overrides)?;
            tracing::debug!(
                order_id = %order.id,
                unit = %submitter.unit,
                levels = chain.len(),
                "Rebuilt approval chain for resubmission"
            );
            Some(chain)
        } else {
            None
        };

        Ok(ResubmissionPlan {
            round: order.round + 1,
            submitter,
            details,
            chain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    use crate::domain::approval_chain::Approver;
    use crate::domain::hierarchy::{ChainLevel, OrgUnitType};
    use crate::domain::travel_order::fixtures::*;
    use crate::domain::travel_order::value_objects::{DecisionRequest, WorkflowPolicy};
    use crate::domain::travel_order::TravelOrderCommand;
    use crate::event_sourcing::core::Aggregate;

    fn rejected() -> TravelOrderAggregate {
        let events = TravelOrderAggregate::draft(&submitter(), details(), chain(), WorkflowPolicy::default()).unwrap();
        let mut order = TravelOrderAggregate::apply_first_event(Uuid::new_v4(), &events[0]).unwrap();
        for command in [
            TravelOrderCommand::Submit,
            TravelOrderCommand::Decide(DecisionRequest::reject(PO_HEAD, "Missing itinerary")),
        ] {
            for event in order.handle_command(&command).unwrap() {
                order.apply_event(&event).unwrap();
            }
        }
        order
    }

    #[test]
    fn test_plain_amendment_keeps_chain() {
        let order = rejected();
        let table = HierarchyTable::builtin();
        let roster = roster();

        let amendment = OrderAmendment {
            purpose: Some("Spectrum monitoring and inspection".into()),
            ..Default::default()
        };
        let plan = ResubmissionHandler::new(&table, &roster).plan(&order, &amendment).unwrap();

        assert_eq!(plan.round, 2);
        assert!(plan.chain.is_none());
        assert_eq!(plan.details.purpose, "Spectrum monitoring and inspection");
        assert_eq!(plan.details.employees[0], SUBMITTER);
    }

    #[test]
    fn test_unit_change_rebuilds_chain() {
        let order = rejected();
        let table = HierarchyTable::builtin();
        let roster = roster();

        let amendment = OrderAmendment {
            submitter_unit: Some(OrgUnitType::new("tmsd")),
            ..Default::default()
        };
        let plan = ResubmissionHandler::new(&table, &roster).plan(&order, &amendment).unwrap();
        let chain = plan.chain.unwrap();

        assert_eq!(plan.submitter.unit, OrgUnitType::new("tmsd"));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.level(0).unwrap().approver.id, AFSD_HEAD);
        assert_eq!(chain.level(1).unwrap().level, ChainLevel::Regional);
    }

    #[test]
    fn test_overrides_rebuild_against_current_roster() {
        let order = rejected();
        let table = HierarchyTable::builtin();
        let roster = roster().with(Approver::head(Uuid::from_u128(5), "New PO Head", OrgUnitType::new("launion_po")));

        let mut overrides = BTreeMap::new();
        overrides.insert(3, ASSISTANT_DIRECTOR);
        let amendment = OrderAmendment { approver_overrides: overrides, ..Default::default() };

        let chain = ResubmissionHandler::new(&table, &roster)
            .plan(&order, &amendment)
            .unwrap()
            .chain
            .unwrap();
        // Non-overridden levels take the default pick from the roster as it is now
        assert_eq!(chain.level(0).unwrap().approver.id, Uuid::from_u128(5));
        assert_eq!(chain.level(3).unwrap().approver.id, ASSISTANT_DIRECTOR);
    }

    #[test]
    fn test_unknown_unit_fails_planning() {
        let order = rejected();
        let table = HierarchyTable::builtin();
        let roster = roster();

        let amendment = OrderAmendment {
            submitter_unit: Some(OrgUnitType::new("moon_base")),
            ..Default::default()
        };
        assert_eq!(
            ResubmissionHandler::new(&table, &roster).plan(&order, &amendment).unwrap_err(),
            WorkflowError::UnknownOrgUnit("moon_base".into())
        );
    }

    #[test]
    fn test_only_rejected_orders_can_be_planned() {
        let mut order = rejected();
        order.status = OrderStatus::Completed;
        let table = HierarchyTable::builtin();
        let roster = roster();

        assert_eq!(
            ResubmissionHandler::new(&table, &roster)
                .plan(&order, &OrderAmendment::default())
                .unwrap_err(),
            WorkflowError::NotRejected(OrderStatus::Completed)
        );
    }
}
