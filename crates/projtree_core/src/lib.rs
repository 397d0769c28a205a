//! Core domain logic for project hierarchies and participant membership.
//! This crate is the single source of truth for hierarchy and admission rules.

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod service;
pub mod tree;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use gateway::sqlite_gateway::SqliteProjectGateway;
pub use gateway::{
    EntityRef, GatewayError, GatewayResult, Page, ProjectGateway, ProjectListQuery,
    TransportFailure,
};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use model::employee::{Employee, EmployeeDraft, EmployeeId, EmployeeRank};
pub use model::membership::{check_admission, Admission, AdmissionRejection, AssignmentContext};
pub use model::project::{Project, ProjectDraft, ProjectId, ProjectTreeNode};
pub use model::ModelValidationError;
pub use service::membership_service::{AddMode, AdmissionOutcome, MembershipService};
pub use service::node_state::NodeState;
pub use service::workspace_service::{ProjectWorkspace, WorkspaceError, WorkspaceResult};
pub use tree::builder::{
    build_forest, build_project_tree, find_node, flatten_preorder, ProjectForest, TreeDiagnostic,
};
pub use tree::ensure_valid_parent;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
