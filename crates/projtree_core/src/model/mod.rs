//! Domain model for employees, projects and participant membership.
//!
//! # Responsibility
//! - Define canonical data structures mirrored from the project service.
//! - Validate create/update payloads before they leave the core.
//!
//! # Invariants
//! - Every entity is identified by a service-assigned integer id.
//! - Membership is the Project x Employee relation; it has no record of
//!   its own and changes only through the membership service.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod employee;
pub mod membership;
pub mod project;

/// Payload validation failures raised before any service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// Employee name is blank after trim.
    BlankEmployeeName,
    /// Rank outside `1..=4`.
    InvalidRank(i64),
    /// Project title is blank after trim.
    BlankProjectTitle,
    /// Capacity below zero or beyond the supported range.
    InvalidCapacity(i64),
    /// Project names itself as parent.
    SelfParent(i64),
    /// Parent project does not exist.
    ParentNotFound(i64),
    /// Reparenting would make the project its own ancestor.
    ParentCycle { project_id: i64, parent_id: i64 },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankEmployeeName => write!(f, "employee name must not be blank"),
            Self::InvalidRank(value) => write!(f, "employee rank must be 1..4, got {value}"),
            Self::BlankProjectTitle => write!(f, "project title must not be blank"),
            Self::InvalidCapacity(value) => {
                write!(f, "max_participants must be non-negative, got {value}")
            }
            Self::SelfParent(id) => write!(f, "project {id} cannot be its own parent"),
            Self::ParentNotFound(id) => write!(f, "parent project not found: {id}"),
            Self::ParentCycle {
                project_id,
                parent_id,
            } => write!(
                f,
                "parent {parent_id} would make project {project_id} its own ancestor"
            ),
        }
    }
}

impl Error for ModelValidationError {}
