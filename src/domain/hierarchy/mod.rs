// ============================================================================
// Organizational Hierarchy
// ============================================================================
//
// Units and approval levels are data. The engine never branches on a specific
// unit code; it only distinguishes "a unit" from the terminal regional level.
//
// ============================================================================

pub mod resolver;

pub use resolver::HierarchyTable;

use std::fmt;
use serde::{Deserialize, Serialize};

/// Code of the regional unit and of the terminal chain level
pub const REGIONAL: &str = "regional";

/// A submitter's or approver's organizational unit, e.g. `urdaneta_csc`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgUnitType(String);

impl OrgUnitType {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_ascii_lowercase())
    }

    pub fn regional() -> Self {
        Self(REGIONAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_regional(&self) -> bool {
        self.0 == REGIONAL
    }
}

impl fmt::Display for OrgUnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One required approval step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChainLevel {
    /// Satisfied by the head of this unit
    Unit(OrgUnitType),
    /// Terminal level, satisfied by a director (or the regional head)
    Regional,
}

impl ChainLevel {
    pub fn is_regional(&self) -> bool {
        matches!(self, ChainLevel::Regional)
    }
}

impl From<String> for ChainLevel {
    fn from(code: String) -> Self {
        let unit = OrgUnitType::new(code);
        if unit.is_regional() {
            ChainLevel::Regional
        } else {
            ChainLevel::Unit(unit)
        }
    }
}

impl From<ChainLevel> for String {
    fn from(level: ChainLevel) -> Self {
        level.to_string()
    }
}

impl fmt::Display for ChainLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainLevel::Unit(unit) => write!(f, "{}", unit),
            ChainLevel::Regional => f.write_str(REGIONAL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_codes_are_normalized() {
        assert_eq!(OrgUnitType::new("  Pangasinan_PO "), OrgUnitType::new("pangasinan_po"));
        assert!(OrgUnitType::new("REGIONAL").is_regional());
    }

    #[test]
    fn test_regional_code_parses_to_terminal_level() {
        assert_eq!(ChainLevel::from("regional".to_string()), ChainLevel::Regional);
        assert_eq!(
            ChainLevel::from("tmsd".to_string()),
            ChainLevel::Unit(OrgUnitType::new("tmsd"))
        );
    }

    #[test]
    fn test_level_serializes_as_plain_code() {
        let levels = vec![ChainLevel::Unit(OrgUnitType::new("afsd")), ChainLevel::Regional];
        let json = serde_json::to_string(&levels).unwrap();
        assert_eq!(json, r#"["afsd","regional"]"#);

        let back: Vec<ChainLevel> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, levels);
    }
}
