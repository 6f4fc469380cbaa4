use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::approval_chain::{ApprovalChain, Approver};
use crate::domain::errors::WorkflowError;
use crate::event_sourcing::core::Aggregate;
use super::commands::{ResubmissionPlan, TravelOrderCommand};
use super::decision_recorder::DecisionRecorder;
use super::events::*;
use super::value_objects::{
    Decision, OrderStatus, Submitter, TravelDetails, Verdict, WorkflowPolicy,
};

// ============================================================================
// Travel Order Aggregate - Approval State Machine
// ============================================================================
//
//   Draft --submit--> PendingApproval(0) --approve--> PendingApproval(k+1)
//   PendingApproval(last) --approve--> Completed
//   PendingApproval(k) --reject--> Rejected | RejectedFinal
//   Rejected --resubmit--> PendingApproval(0), round + 1
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelOrderAggregate {
    // Identity
    pub id: Uuid,
    pub version: i64,

    // Request
    pub submitter: Submitter,
    pub details: TravelDetails,
    pub chain: ApprovalChain,
    pub policy: WorkflowPolicy,

    // Workflow state
    pub status: OrderStatus,
    pub round: u32,
    pub decisions: Vec<Decision>,

    // Rejection (cleared on resubmission)
    pub rejection_comment: Option<String>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,

    pub is_resubmitted: bool,
    pub travel_order_number: Option<String>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TravelOrderAggregate {
    /// Events that create a new draft order
    pub fn draft(
        submitter: &Submitter,
        details: TravelDetails,
        chain: ApprovalChain,
        policy: WorkflowPolicy,
    ) -> Result<Vec<TravelOrderEvent>, WorkflowError> {
        let details = details.normalized(submitter.employee_id)?;

        Ok(vec![TravelOrderEvent::Drafted(OrderDrafted {
            submitter: submitter.clone(),
            details,
            chain,
            policy,
            drafted_at: Utc::now(),
        })])
    }

    pub fn current_level(&self) -> Option<usize> {
        self.status.pending_level()
    }

    /// Approver bound to the level awaiting a decision
    pub fn current_approver(&self) -> Option<&Approver> {
        self.current_level()
            .and_then(|level| self.chain.level(level))
            .map(|bound| &bound.approver)
    }

    pub fn decisions_in_round(&self, round: u32) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(move |d| d.round == round)
    }

    pub fn approvals_in_current_round(&self) -> Vec<&Decision> {
        self.decisions_in_round(self.round)
            .filter(|d| d.verdict == Verdict::Approve)
            .collect()
    }

    /// Everyone who signed in the current round
    pub fn prior_signers(&self) -> Vec<Uuid> {
        DecisionRecorder::prior_signers(&self.decisions, self.round)
    }

    fn require_draft(&self, action: &str) -> Result<(), WorkflowError> {
        match self.status {
            OrderStatus::Draft => Ok(()),
            status => Err(WorkflowError::StaleState(format!(
                "cannot {} order {} in status {}",
                action, self.id, status
            ))),
        }
    }

    fn require_chain(&self) -> Result<(), WorkflowError> {
        if self.chain.is_empty() {
            return Err(WorkflowError::InvalidChain(format!("order {} has no approval levels", self.id)));
        }
        Ok(())
    }

    fn validate_resubmission(&self, plan: &ResubmissionPlan) -> Result<TravelDetails, WorkflowError> {
        if self.status != OrderStatus::Rejected {
            return Err(WorkflowError::NotRejected(self.status));
        }
        if plan.round != self.round + 1 {
            return Err(WorkflowError::StaleState(format!(
                "resubmission planned for round {} but order {} is in round {}",
                plan.round, self.id, self.round
            )));
        }
        plan.details.clone().normalized(plan.submitter.employee_id)
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for TravelOrderAggregate {
    type Event = TravelOrderEvent;
    type Command = TravelOrderCommand;
    type Error = WorkflowError;

    fn apply_first_event(aggregate_id: Uuid, event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            TravelOrderEvent::Drafted(e) => Ok(Self {
                id: aggregate_id,
                version: 0,
                submitter: e.submitter.clone(),
                details: e.details.clone(),
                chain: e.chain.clone(),
                policy: e.policy,
                status: OrderStatus::Draft,
                round: 1,
                decisions: Vec::new(),
                rejection_comment: None,
                rejected_by: None,
                rejected_at: None,
                is_resubmitted: false,
                travel_order_number: None,
                created_at: e.drafted_at,
                updated_at: e.drafted_at,
                submitted_at: None,
                completed_at: None,
            }),
            _ => Err(WorkflowError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            TravelOrderEvent::Drafted(_) => {
                return Err(WorkflowError::StaleState(format!("order {} is already drafted", self.id)));
            }
            TravelOrderEvent::ApproverReassigned(e) => {
                self.require_draft("reassign approvers on")?;
                self.chain = self.chain.rebind(e.level, e.approver_id)?;
                self.updated_at = e.reassigned_at;
            }
            TravelOrderEvent::Submitted(e) => {
                self.require_draft("submit")?;
                self.require_chain()?;
                self.status = OrderStatus::PendingApproval { level: 0 };
                self.submitted_at = Some(e.submitted_at);
                self.updated_at = e.submitted_at;
            }
            TravelOrderEvent::DecisionRecorded(e) => {
                let decision = &e.decision;
                DecisionRecorder::append(&mut self.decisions, decision.clone())?;

                match decision.verdict {
                    Verdict::Approve if self.chain.is_last(decision.level) => {
                        self.status = OrderStatus::Completed;
                        self.completed_at = Some(decision.decided_at);
                    }
                    Verdict::Approve => {
                        self.status = OrderStatus::PendingApproval { level: decision.level + 1 };
                    }
                    Verdict::Reject => {
                        self.status = if e.final_rejection {
                            OrderStatus::RejectedFinal
                        } else {
                            OrderStatus::Rejected
                        };
                        self.rejection_comment = decision.payload.comment_text().map(str::to_string);
                        self.rejected_by = Some(decision.approver_id);
                        self.rejected_at = Some(decision.decided_at);
                    }
                }
                self.updated_at = decision.decided_at;
            }
            TravelOrderEvent::OrderNumberAssigned(e) => {
                if self.status != OrderStatus::Completed {
                    return Err(WorkflowError::StaleState(format!(
                        "order {} cannot be numbered in status {}",
                        self.id, self.status
                    )));
                }
                self.travel_order_number = Some(e.travel_order_number.clone());
                self.updated_at = e.assigned_at;
            }
            TravelOrderEvent::Resubmitted(e) => {
                if self.status != OrderStatus::Rejected {
                    return Err(WorkflowError::NotRejected(self.status));
                }
                self.round = e.round;
                self.submitter = e.submitter.clone();
                self.details = e.details.clone();
                if let Some(chain) = &e.chain {
                    self.chain = chain.clone();
                }
                self.status = OrderStatus::PendingApproval { level: 0 };
                self.is_resubmitted = true;
                self.rejection_comment = None;
                self.rejected_by = None;
                self.rejected_at = None;
                self.travel_order_number = None;
                self.submitted_at = Some(e.resubmitted_at);
                self.updated_at = e.resubmitted_at;
            }
        }
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TravelOrderCommand::ReassignApprover { level, approver_id } => {
                self.require_draft("reassign approvers on")?;
                self.chain.rebind(*level, *approver_id)?;

                Ok(vec![TravelOrderEvent::ApproverReassigned(ApproverReassigned {
                    level: *level,
                    approver_id: *approver_id,
                    reassigned_at: Utc::now(),
                })])
            }

            TravelOrderCommand::Submit => {
                self.require_draft("submit")?;
                self.require_chain()?;

                Ok(vec![TravelOrderEvent::Submitted(OrderSubmitted {
                    submitted_at: Utc::now(),
                })])
            }

            TravelOrderCommand::Decide(request) => {
                let decision = DecisionRecorder::record(self, request, Utc::now())?;
                let final_rejection =
                    decision.verdict == Verdict::Reject && self.policy.is_final_round(self.round);

                Ok(vec![TravelOrderEvent::DecisionRecorded(DecisionRecorded {
                    decision,
                    final_rejection,
                })])
            }

            TravelOrderCommand::Resubmit(plan) => {
                let details = self.validate_resubmission(plan)?;

                Ok(vec![TravelOrderEvent::Resubmitted(OrderResubmitted {
                    round: plan.round,
                    submitter: plan.submitter.clone(),
                    details,
                    chain: plan.chain.clone(),
                    resubmitted_at: Utc::now(),
                })])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}
