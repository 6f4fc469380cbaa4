//! Shared test data: a La Union provincial office submitter whose chain is
//! launion_po -> tmsd -> afsd -> regional.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::approval_chain::{ApprovalChain, ApprovalChainBuilder, Approver, InMemoryRoster};
use crate::domain::hierarchy::{HierarchyTable, OrgUnitType};
use super::value_objects::{ItineraryLine, Submitter, TravelDetails};

pub const SUBMITTER: Uuid = Uuid::from_u128(1);
pub const PO_HEAD: Uuid = Uuid::from_u128(10);
pub const PO_DEPUTY: Uuid = Uuid::from_u128(20);
pub const TMSD_HEAD: Uuid = Uuid::from_u128(30);
pub const AFSD_HEAD: Uuid = Uuid::from_u128(40);
pub const REGIONAL_DIRECTOR: Uuid = Uuid::from_u128(90);
pub const ASSISTANT_DIRECTOR: Uuid = Uuid::from_u128(91);

pub fn roster() -> InMemoryRoster {
    InMemoryRoster::default()
        .with(Approver::head(PO_HEAD, "Lorna Agbayani", OrgUnitType::new("launion_po")))
        .with(Approver::head(PO_DEPUTY, "Ramon Dizon", OrgUnitType::new("launion_po")))
        .with(Approver::head(TMSD_HEAD, "Edgar Lucero", OrgUnitType::new("tmsd")))
        .with(Approver::head(AFSD_HEAD, "Celia Manuel", OrgUnitType::new("afsd")))
        .with(Approver::director(REGIONAL_DIRECTOR, "Antonio Ramos", OrgUnitType::regional()))
        .with(Approver::director(ASSISTANT_DIRECTOR, "Marites Cruz", OrgUnitType::regional()))
}

pub fn submitter() -> Submitter {
    Submitter {
        employee_id: SUBMITTER,
        name: "Jose Bautista".to_string(),
        unit: OrgUnitType::new("launion_po"),
    }
}

pub fn details() -> TravelDetails {
    let departure = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    TravelDetails {
        destination: "Laoag City".to_string(),
        purpose: "Spectrum monitoring".to_string(),
        departure_date: departure,
        return_date: NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(),
        employees: vec![],
        itinerary: vec![ItineraryLine {
            date: departure,
            destination: "Laoag City".to_string(),
            departure_time: None,
            arrival_time: None,
            means_of_transport: Some("Bus".to_string()),
        }],
    }
}

pub fn chain() -> ApprovalChain {
    let levels = HierarchyTable::builtin()
        .resolve_chain(&OrgUnitType::new("launion_po"))
        .unwrap();
    ApprovalChainBuilder::new(&roster()).build(&levels).unwrap()
}
