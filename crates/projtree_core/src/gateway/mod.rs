//! Project service contract.
//!
//! # Responsibility
//! - Define the request/response operations the core consumes from the
//!   project service (employees, projects, participants).
//! - Map every service outcome onto one error taxonomy.
//!
//! # Invariants
//! - A failed call has no effect the caller may rely on; callers apply
//!   local updates only after `Ok`.
//! - Capacity and rank refusals are distinguishable from every other
//!   failure and carry a human-readable detail message.

use crate::db::DbError;
use crate::model::employee::{Employee, EmployeeDraft, EmployeeId};
use crate::model::membership::AdmissionRejection;
use crate::model::project::{Project, ProjectDraft, ProjectId, ProjectTreeNode};
use crate::model::ModelValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite_gateway;

/// Result type used by project service calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Entity referenced by a `NotFound` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Project(ProjectId),
    Employee(EmployeeId),
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Project(id) => write!(f, "project {id}"),
            Self::Employee(id) => write!(f, "employee {id}"),
        }
    }
}

/// Exchange with the service did not complete.
#[derive(Debug)]
pub enum TransportFailure {
    /// Storage backing the service failed mid-request.
    Storage(DbError),
    /// Service unreachable or the exchange was cut off.
    Unavailable(String),
}

impl Display for TransportFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "storage failure: {err}"),
            Self::Unavailable(message) => write!(f, "service unavailable: {message}"),
        }
    }
}

/// Errors returned by project service calls.
#[derive(Debug)]
pub enum GatewayError {
    /// Referenced project or employee does not exist.
    NotFound(EntityRef),
    /// Project is full and no override was requested.
    CapacityExceeded { detail: String },
    /// A rank quota refused the admission and no override was requested.
    AssignmentRuleViolated { detail: String },
    /// Malformed create/update payload.
    Validation(ModelValidationError),
    /// Exchange did not complete; treat as no effect.
    Transport(TransportFailure),
}

impl GatewayError {
    /// Returns whether a forced retry of the same admission could succeed.
    pub fn is_overridable(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. } | Self::AssignmentRuleViolated { .. }
        )
    }

    /// Operator-facing detail for overridable refusals.
    pub fn override_detail(&self) -> Option<&str> {
        match self {
            Self::CapacityExceeded { detail } | Self::AssignmentRuleViolated { detail } => {
                Some(detail)
            }
            _ => None,
        }
    }

    /// Short stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::AssignmentRuleViolated { .. } => "assignment_rule_violated",
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
        }
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::CapacityExceeded { detail } => write!(f, "capacity exceeded: {detail}"),
            Self::AssignmentRuleViolated { detail } => {
                write!(f, "assignment rule violated: {detail}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Transport(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Transport(TransportFailure::Storage(err)) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for GatewayError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AdmissionRejection> for GatewayError {
    fn from(value: AdmissionRejection) -> Self {
        match value {
            AdmissionRejection::CapacityExceeded { detail } => Self::CapacityExceeded { detail },
            AdmissionRejection::RuleViolated { detail } => Self::AssignmentRuleViolated { detail },
        }
    }
}

impl From<DbError> for GatewayError {
    fn from(value: DbError) -> Self {
        Self::Transport(TransportFailure::Storage(value))
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Transport(TransportFailure::Storage(DbError::Sqlite(value)))
    }
}

/// Paging window for list calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Page {
    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }
}

/// Query options for listing projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectListQuery {
    pub page: Page,
    /// Load each project's direct participants.
    pub with_participants: bool,
    /// Case-sensitive substring filter on title.
    pub search: Option<String>,
}

impl Default for ProjectListQuery {
    fn default() -> Self {
        Self {
            page: Page::default(),
            with_participants: true,
            search: None,
        }
    }
}

/// Request/response operations offered by the project service.
///
/// Project lists come back newest first, employee lists in registration
/// order, participant lists in assignment order.
pub trait ProjectGateway {
    fn list_employees(&self, page: Page) -> GatewayResult<Vec<Employee>>;
    fn create_employee(&self, draft: &EmployeeDraft) -> GatewayResult<Employee>;
    fn update_employee(&self, id: EmployeeId, draft: &EmployeeDraft) -> GatewayResult<Employee>;
    /// Deletes one employee and drops it from every participant set.
    fn delete_employee(&self, id: EmployeeId) -> GatewayResult<()>;

    fn list_projects(&self, query: &ProjectListQuery) -> GatewayResult<Vec<Project>>;
    /// Loads one project with participants and its full descendant subtree.
    fn get_project_with_children(&self, id: ProjectId) -> GatewayResult<ProjectTreeNode>;
    fn create_project(&self, draft: &ProjectDraft) -> GatewayResult<Project>;
    fn update_project(&self, id: ProjectId, draft: &ProjectDraft) -> GatewayResult<Project>;
    /// Deletes one project; returns every project id the service removed.
    fn delete_project(&self, id: ProjectId) -> GatewayResult<Vec<ProjectId>>;

    /// Adds one participant and returns the updated participant set.
    ///
    /// Re-adding an existing member succeeds without change.
    fn add_participant(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
        force: bool,
    ) -> GatewayResult<Vec<Employee>>;
    /// Removes one participant. Removing a non-member succeeds.
    fn remove_participant(&self, project_id: ProjectId, employee_id: EmployeeId)
        -> GatewayResult<()>;
}

impl<G: ProjectGateway + ?Sized> ProjectGateway for &G {
    fn list_employees(&self, page: Page) -> GatewayResult<Vec<Employee>> {
        (**self).list_employees(page)
    }

    fn create_employee(&self, draft: &EmployeeDraft) -> GatewayResult<Employee> {
        (**self).create_employee(draft)
    }

    fn update_employee(&self, id: EmployeeId, draft: &EmployeeDraft) -> GatewayResult<Employee> {
        (**self).update_employee(id, draft)
    }

    fn delete_employee(&self, id: EmployeeId) -> GatewayResult<()> {
        (**self).delete_employee(id)
    }

    fn list_projects(&self, query: &ProjectListQuery) -> GatewayResult<Vec<Project>> {
        (**self).list_projects(query)
    }

    fn get_project_with_children(&self, id: ProjectId) -> GatewayResult<ProjectTreeNode> {
        (**self).get_project_with_children(id)
    }

    fn create_project(&self, draft: &ProjectDraft) -> GatewayResult<Project> {
        (**self).create_project(draft)
    }

    fn update_project(&self, id: ProjectId, draft: &ProjectDraft) -> GatewayResult<Project> {
        (**self).update_project(id, draft)
    }

    fn delete_project(&self, id: ProjectId) -> GatewayResult<Vec<ProjectId>> {
        (**self).delete_project(id)
    }

    fn add_participant(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
        force: bool,
    ) -> GatewayResult<Vec<Employee>> {
        (**self).add_participant(project_id, employee_id, force)
    }

    fn remove_participant(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
    ) -> GatewayResult<()> {
        (**self).remove_participant(project_id, employee_id)
    }
}
