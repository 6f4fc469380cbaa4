use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::WorkflowError;
use super::aggregate::TravelOrderAggregate;
use super::value_objects::{Decision, DecisionPayload, DecisionRequest, OrderStatus, Verdict};

// ============================================================================
// Decision Recorder
// ============================================================================
//
// Validates a decision against the order's current state and produces the
// immutable history entry. The history is append-only and ordered by
// (round, level); within a round a rejection is always the last entry.
//
// ============================================================================

pub struct DecisionRecorder;

impl DecisionRecorder {
    /// Check `request` against `order` and build the entry to record.
    ///
    /// Checks run in a fixed order: pending status, expected level, approver
    /// identity, payload shape. An approver the current level does not accept
    /// who already decided in this round gets `StaleState` rather than
    /// `NotCurrentApprover`. Someone bound at several levels may sign each.
    pub fn record(
        order: &TravelOrderAggregate,
        request: &DecisionRequest,
        now: DateTime<Utc>,
    ) -> Result<Decision, WorkflowError> {
        let OrderStatus::PendingApproval { level } = order.status else {
            return Err(WorkflowError::StaleState(format!(
                "order {} is {}, not awaiting a decision",
                order.id, order.status
            )));
        };

        if let Some(expected) = request.expected_level {
            if expected != level {
                return Err(WorkflowError::StaleState(format!(
                    "order {} is at level {}, decision was made for level {}",
                    order.id, level, expected
                )));
            }
        }

        let bound = order.chain.level(level).ok_or_else(|| {
            WorkflowError::InvalidChain(format!("order {} has no chain level {}", order.id, level))
        })?;
        if !bound.accepts(request.approver_id) {
            // A signer retrying after the order moved on is stale, not an outsider
            if let Some(previous) = order
                .decisions_in_round(order.round)
                .find(|d| d.approver_id == request.approver_id)
            {
                return Err(WorkflowError::StaleState(format!(
                    "approver {} already decided level {} in round {}",
                    request.approver_id, previous.level, order.round
                )));
            }
            return Err(WorkflowError::NotCurrentApprover {
                approver_id: request.approver_id,
                level,
            });
        }

        let payload = validate_payload(request.verdict, &request.payload)?;

        Ok(Decision {
            round: order.round,
            level,
            approver_id: request.approver_id,
            verdict: request.verdict,
            payload,
            decided_at: now,
        })
    }

    /// Append to `history`, refusing anything that breaks (round, level) order
    pub fn append(history: &mut Vec<Decision>, decision: Decision) -> Result<(), WorkflowError> {
        let in_order = match history.last() {
            None => decision.level == 0,
            Some(last) if decision.round == last.round => {
                last.verdict == Verdict::Approve && decision.level == last.level + 1
            }
            Some(last) => decision.round > last.round && decision.level == 0,
        };

        if !in_order {
            return Err(WorkflowError::StaleState(format!(
                "decision for round {} level {} is out of order",
                decision.round, decision.level
            )));
        }

        history.push(decision);
        Ok(())
    }

    /// Approvers who signed in `round`, in level order
    pub fn prior_signers(history: &[Decision], round: u32) -> Vec<Uuid> {
        history
            .iter()
            .filter(|d| d.round == round && d.verdict == Verdict::Approve)
            .map(|d| d.approver_id)
            .collect()
    }
}

fn validate_payload(verdict: Verdict, payload: &DecisionPayload) -> Result<DecisionPayload, WorkflowError> {
    match (verdict, payload) {
        (Verdict::Approve, DecisionPayload::Signature { signature, comment }) => {
            if signature.is_blank() {
                return Err(WorkflowError::InvalidDecisionPayload("signature is empty".into()));
            }
            Ok(DecisionPayload::Signature {
                signature: signature.clone(),
                comment: comment
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
            })
        }
        (Verdict::Approve, DecisionPayload::Comment { .. }) => Err(WorkflowError::InvalidDecisionPayload(
            "approval requires a signature".into(),
        )),
        (Verdict::Reject, DecisionPayload::Comment { text }) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(WorkflowError::InvalidDecisionPayload(
                    "rejection requires a comment".into(),
                ));
            }
            Ok(DecisionPayload::comment(text))
        }
        (Verdict::Reject, DecisionPayload::Signature { .. }) => Err(WorkflowError::InvalidDecisionPayload(
            "rejection requires a comment, not a signature".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn decision(round: u32, level: usize, verdict: Verdict) -> Decision {
        Decision {
            round,
            level,
            approver_id: Uuid::new_v4(),
            verdict,
            payload: match verdict {
                Verdict::Approve => DecisionPayload::signature("sig"),
                Verdict::Reject => DecisionPayload::comment("no"),
            },
            decided_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_enforces_level_order() {
        let mut history = Vec::new();
        DecisionRecorder::append(&mut history, decision(1, 0, Verdict::Approve)).unwrap();
        DecisionRecorder::append(&mut history, decision(1, 1, Verdict::Approve)).unwrap();

        let skipped = DecisionRecorder::append(&mut history, decision(1, 3, Verdict::Approve));
        assert!(matches!(skipped, Err(WorkflowError::StaleState(_))));

        let repeated = DecisionRecorder::append(&mut history, decision(1, 1, Verdict::Approve));
        assert!(repeated.is_err());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_rejection_closes_the_round() {
        let mut history = Vec::new();
        DecisionRecorder::append(&mut history, decision(1, 0, Verdict::Reject)).unwrap();

        assert!(DecisionRecorder::append(&mut history, decision(1, 1, Verdict::Approve)).is_err());
        assert!(DecisionRecorder::append(&mut history, decision(2, 1, Verdict::Approve)).is_err());
        DecisionRecorder::append(&mut history, decision(2, 0, Verdict::Approve)).unwrap();
    }

    #[test]
    fn test_first_entry_must_be_level_zero() {
        let mut history = Vec::new();
        assert!(DecisionRecorder::append(&mut history, decision(1, 2, Verdict::Approve)).is_err());
        assert!(history.is_empty());
    }

    #[test]
    fn test_prior_signers_only_counts_approvals_in_round() {
        let mut history = vec![decision(1, 0, Verdict::Approve), decision(1, 1, Verdict::Reject)];
        let round_two = decision(2, 0, Verdict::Approve);
        let signer = round_two.approver_id;
        history.push(round_two);

        assert_eq!(DecisionRecorder::prior_signers(&history, 1), vec![history[0].approver_id]);
        assert_eq!(DecisionRecorder::prior_signers(&history, 2), vec![signer]);
    }

    #[test]
    fn test_payload_must_match_verdict() {
        assert!(validate_payload(Verdict::Approve, &DecisionPayload::comment("ok")).is_err());
        assert!(validate_payload(Verdict::Reject, &DecisionPayload::signature("sig")).is_err());
        assert!(validate_payload(Verdict::Reject, &DecisionPayload::comment("   ")).is_err());
        assert!(validate_payload(Verdict::Approve, &DecisionPayload::signature(" ")).is_err());

        let trimmed = validate_payload(Verdict::Reject, &DecisionPayload::comment("  wrong dates ")).unwrap();
        assert_eq!(trimmed.comment_text(), Some("wrong dates"));
    }
}
