//! Employee domain model.
//!
//! # Responsibility
//! - Define the employee record and its create/update payload.
//! - Keep rank values inside the closed `1..=4` range.
//!
//! # Invariants
//! - `id` is service-assigned and never reused.
//! - `name` is non-blank after trim.

use super::ModelValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Service-assigned employee identifier.
pub type EmployeeId = i64;

/// Seniority rank. Rank one is unrestricted, higher ranks carry tighter
/// assignment quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EmployeeRank {
    One,
    Two,
    Three,
    Four,
}

impl EmployeeRank {
    /// All ranks in ascending order.
    pub const ALL: [EmployeeRank; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    pub fn as_u8(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }
}

impl TryFrom<u8> for EmployeeRank {
    type Error = ModelValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            other => Err(ModelValidationError::InvalidRank(i64::from(other))),
        }
    }
}

impl TryFrom<i64> for EmployeeRank {
    type Error = ModelValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| ModelValidationError::InvalidRank(value))
            .and_then(Self::try_from)
    }
}

impl From<EmployeeRank> for u8 {
    fn from(value: EmployeeRank) -> Self {
        value.as_u8()
    }
}

impl Display for EmployeeRank {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Employee read model as returned by the project service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub rank: EmployeeRank,
    /// Opaque display-only timestamp.
    pub registered_at: String,
}

/// Create/update payload for employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub name: String,
    pub rank: EmployeeRank,
}

impl EmployeeDraft {
    pub fn new(name: impl Into<String>, rank: EmployeeRank) -> Self {
        Self {
            name: name.into(),
            rank,
        }
    }

    /// Returns a trimmed copy, rejecting blank names.
    pub fn validate(&self) -> Result<Self, ModelValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ModelValidationError::BlankEmployeeName);
        }
        Ok(Self {
            name: name.to_string(),
            rank: self.rank,
        })
    }
}

impl From<&Employee> for EmployeeDraft {
    fn from(value: &Employee) -> Self {
        Self {
            name: value.name.clone(),
            rank: value.rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EmployeeDraft, EmployeeRank};
    use crate::model::ModelValidationError;

    #[test]
    fn rank_conversion_rejects_out_of_range_values() {
        assert_eq!(EmployeeRank::try_from(3_u8).unwrap(), EmployeeRank::Three);
        assert!(matches!(
            EmployeeRank::try_from(0_u8),
            Err(ModelValidationError::InvalidRank(0))
        ));
        assert!(matches!(
            EmployeeRank::try_from(-7_i64),
            Err(ModelValidationError::InvalidRank(-7))
        ));
    }

    #[test]
    fn rank_serializes_as_plain_integer() {
        let json = serde_json::to_string(&EmployeeRank::Four).unwrap();
        assert_eq!(json, "4");
        let err = serde_json::from_str::<EmployeeRank>("5");
        assert!(err.is_err());
    }

    #[test]
    fn draft_validation_trims_and_rejects_blank_names() {
        let draft = EmployeeDraft::new("  Ada  ", EmployeeRank::Two)
            .validate()
            .unwrap();
        assert_eq!(draft.name, "Ada");

        let err = EmployeeDraft::new("   ", EmployeeRank::One)
            .validate()
            .unwrap_err();
        assert_eq!(err, ModelValidationError::BlankEmployeeName);
    }
}
