use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::WorkflowError;
use crate::domain::hierarchy::OrgUnitType;

// ============================================================================
// Travel Order Value Objects
// ============================================================================

/// Employee who files the order; their unit drives chain derivation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Submitter {
    pub employee_id: Uuid,
    pub name: String,
    pub unit: OrgUnitType,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ItineraryLine {
    pub date: NaiveDate,
    pub destination: String,
    pub departure_time: Option<NaiveTime>,
    pub arrival_time: Option<NaiveTime>,
    pub means_of_transport: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TravelDetails {
    pub destination: String,
    pub purpose: String,
    pub departure_date: NaiveDate,
    pub return_date: NaiveDate,
    /// Traveling employees; the submitter is always first
    pub employees: Vec<Uuid>,
    pub itinerary: Vec<ItineraryLine>,
}

impl TravelDetails {
    /// Validate and put the submitter at the head of the traveler list
    pub fn normalized(mut self, submitter_id: Uuid) -> Result<Self, WorkflowError> {
        self.destination = self.destination.trim().to_string();
        self.purpose = self.purpose.trim().to_string();

        if self.destination.is_empty() {
            return Err(WorkflowError::InvalidTravelDetails("destination is required".into()));
        }
        if self.purpose.is_empty() {
            return Err(WorkflowError::InvalidTravelDetails("purpose is required".into()));
        }
        if self.return_date < self.departure_date {
            return Err(WorkflowError::InvalidTravelDetails(format!(
                "return date {} precedes departure date {}",
                self.return_date, self.departure_date
            )));
        }
        if let Some(line) = self
            .itinerary
            .iter()
            .find(|l| l.date < self.departure_date || l.date > self.return_date)
        {
            return Err(WorkflowError::InvalidTravelDetails(format!(
                "itinerary date {} is outside the travel period",
                line.date
            )));
        }

        self.employees.retain(|id| *id != submitter_id);
        self.employees.insert(0, submitter_id);
        let mut seen = std::collections::HashSet::new();
        self.employees.retain(|id| seen.insert(*id));

        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    PendingApproval { level: usize },
    Completed,
    Rejected,
    /// Rejected in the last permitted round; cannot be resubmitted
    RejectedFinal,
}

impl OrderStatus {
    pub fn pending_level(&self) -> Option<usize> {
        match self {
            OrderStatus::PendingApproval { level } => Some(*level),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Rejected | OrderStatus::RejectedFinal)
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::PendingApproval { .. } => "pending_approval",
            OrderStatus::Completed => "completed",
            OrderStatus::Rejected => "rejected",
            OrderStatus::RejectedFinal => "rejected_final",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::PendingApproval { level } => write!(f, "pending_approval(level {})", level),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approve => "approve",
            Verdict::Reject => "reject",
        }
    }
}

/// Opaque signature image data (base64 from the signing pad)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct SignatureBlob(pub String);

impl SignatureBlob {
    pub fn new(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionPayload {
    Signature {
        signature: SignatureBlob,
        comment: Option<String>,
    },
    Comment {
        text: String,
    },
}

impl DecisionPayload {
    pub fn signature(data: impl Into<String>) -> Self {
        DecisionPayload::Signature { signature: SignatureBlob::new(data), comment: None }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        DecisionPayload::Comment { text: text.into() }
    }

    pub fn comment_text(&self) -> Option<&str> {
        match self {
            DecisionPayload::Signature { comment, .. } => comment.as_deref(),
            DecisionPayload::Comment { text } => Some(text),
        }
    }
}

/// One immutable entry in an order's decision history
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Decision {
    pub round: u32,
    pub level: usize,
    pub approver_id: Uuid,
    pub verdict: Verdict,
    pub payload: DecisionPayload,
    pub decided_at: DateTime<Utc>,
}

/// What an approver submits for the order's current level
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub approver_id: Uuid,
    pub verdict: Verdict,
    pub payload: DecisionPayload,
    /// Level the caller believes is current; a mismatch is stale state
    pub expected_level: Option<usize>,
}

impl DecisionRequest {
    pub fn approve(approver_id: Uuid, signature: impl Into<String>) -> Self {
        Self {
            approver_id,
            verdict: Verdict::Approve,
            payload: DecisionPayload::signature(signature),
            expected_level: None,
        }
    }

    pub fn reject(approver_id: Uuid, comment: impl Into<String>) -> Self {
        Self {
            approver_id,
            verdict: Verdict::Reject,
            payload: DecisionPayload::comment(comment),
            expected_level: None,
        }
    }

    pub fn at_level(mut self, level: usize) -> Self {
        self.expected_level = Some(level);
        self
    }
}

/// Fields a submitter may change when resubmitting a rejected order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderAmendment {
    pub destination: Option<String>,
    pub purpose: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub employees: Option<Vec<Uuid>>,
    pub itinerary: Option<Vec<ItineraryLine>>,
    /// Changing the unit forces the approval chain to be rebuilt
    pub submitter_unit: Option<OrgUnitType>,
    /// Explicit approver choices by level index; also forces a rebuild
    pub approver_overrides: BTreeMap<usize, Uuid>,
}

impl OrderAmendment {
    pub fn apply_to(&self, details: &TravelDetails) -> TravelDetails {
        TravelDetails {
            destination: self.destination.clone().unwrap_or_else(|| details.destination.clone()),
            purpose: self.purpose.clone().unwrap_or_else(|| details.purpose.clone()),
            departure_date: self.departure_date.unwrap_or(details.departure_date),
            return_date: self.return_date.unwrap_or(details.return_date),
            employees: self.employees.clone().unwrap_or_else(|| details.employees.clone()),
            itinerary: self.itinerary.clone().unwrap_or_else(|| details.itinerary.clone()),
        }
    }
}

/// Per-order workflow rules, frozen on the order when it is drafted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowPolicy {
    /// Rounds allowed before a rejection becomes final. `None` means unlimited.
    pub max_rounds: Option<u32>,
}

impl WorkflowPolicy {
    pub fn is_final_round(&self, round: u32) -> bool {
        self.max_rounds.is_some_and(|max| round >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn details() -> TravelDetails {
        TravelDetails {
            destination: " Vigan City ".to_string(),
            purpose: "Provincial coordination meeting".to_string(),
            departure_date: date(10),
            return_date: date(12),
            employees: vec![],
            itinerary: vec![ItineraryLine {
                date: date(10),
                destination: "Vigan City".to_string(),
                departure_time: NaiveTime::from_hms_opt(6, 0, 0),
                arrival_time: NaiveTime::from_hms_opt(11, 30, 0),
                means_of_transport: Some("Service vehicle".to_string()),
            }],
        }
    }

    #[test]
    fn test_submitter_is_always_first_traveler() {
        let submitter = Uuid::new_v4();
        let colleague = Uuid::new_v4();
        let mut d = details();
        d.employees = vec![colleague, submitter, colleague];

        let normalized = d.normalized(submitter).unwrap();
        assert_eq!(normalized.employees, vec![submitter, colleague]);
        assert_eq!(normalized.destination, "Vigan City");
    }

    #[test]
    fn test_return_before_departure_is_rejected() {
        let mut d = details();
        d.return_date = date(9);
        assert!(matches!(
            d.normalized(Uuid::new_v4()),
            Err(WorkflowError::InvalidTravelDetails(_))
        ));
    }

    #[test]
    fn test_itinerary_outside_period_is_rejected() {
        let mut d = details();
        d.itinerary[0].date = date(20);
        assert!(d.normalized(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_blank_destination_is_rejected() {
        let mut d = details();
        d.destination = "   ".to_string();
        assert!(d.normalized(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_status_display_and_terminality() {
        assert_eq!(OrderStatus::PendingApproval { level: 2 }.to_string(), "pending_approval(level 2)");
        assert_eq!(OrderStatus::RejectedFinal.to_string(), "rejected_final");
        assert!(OrderStatus::Completed.is_terminal());
        assert!(!OrderStatus::Draft.is_terminal());
        assert_eq!(OrderStatus::PendingApproval { level: 1 }.pending_level(), Some(1));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::PendingApproval { level: 3 }).unwrap();
        assert_eq!(json, r#"{"state":"pending_approval","level":3}"#);
        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderStatus::PendingApproval { level: 3 });
    }

    #[test]
    fn test_amendment_only_replaces_given_fields() {
        let original = details();
        let amendment = OrderAmendment {
            purpose: Some("Rescheduled meeting".to_string()),
            return_date: Some(date(13)),
            ..Default::default()
        };

        let amended = amendment.apply_to(&original);
        assert_eq!(amended.purpose, "Rescheduled meeting");
        assert_eq!(amended.return_date, date(13));
        assert_eq!(amended.destination, original.destination);
        assert_eq!(amended.itinerary, original.itinerary);
    }

    #[test]
    fn test_policy_final_round() {
        assert!(!WorkflowPolicy::default().is_final_round(99));
        let policy = WorkflowPolicy { max_rounds: Some(2) };
        assert!(!policy.is_final_round(1));
        assert!(policy.is_final_round(2));
    }
}
