//! Participant membership use-case service.
//!
//! # Responsibility
//! - Issue add/remove participant requests against the project service.
//! - Implement the operator confirmation protocol for overriding capacity
//!   and rank quotas.
//!
//! # Invariants
//! - A forced admission is only ever requested through `AddMode::Forced`
//!   or after `confirm` returned `true`; there is no automatic fallback.
//! - The service's refusal is authoritative even when a local view
//!   believed there was room.

use crate::gateway::{GatewayError, GatewayResult, ProjectGateway};
use crate::model::employee::{Employee, EmployeeId};
use crate::model::project::ProjectId;
use log::{info, warn};

/// How an admission request treats capacity and rank quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMode {
    /// Refuse when the project is full or a quota is reached.
    Checked,
    /// Admit regardless of capacity and quotas.
    Forced,
}

impl AddMode {
    pub fn is_forced(self) -> bool {
        matches!(self, Self::Forced)
    }
}

/// Result of the confirmation protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Participant is a member; carries the updated participant set.
    Added(Vec<Employee>),
    /// Operator declined to override the refusal.
    Declined { detail: String },
}

/// Membership service facade.
pub struct MembershipService<G: ProjectGateway> {
    gateway: G,
}

impl<G: ProjectGateway> MembershipService<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Adds one participant and returns the updated participant set.
    ///
    /// # Errors
    /// - `CapacityExceeded` / `AssignmentRuleViolated` in `Checked` mode.
    /// - `NotFound` when project or employee is missing.
    /// - `Transport` when the exchange did not complete.
    pub fn add_participant(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
        mode: AddMode,
    ) -> GatewayResult<Vec<Employee>> {
        let result = self
            .gateway
            .add_participant(project_id, employee_id, mode.is_forced());
        match &result {
            Ok(members) => info!(
                "event=membership_add module=service status=ok project_id={project_id} employee_id={employee_id} forced={} count={}",
                mode.is_forced(),
                members.len()
            ),
            Err(err) => warn!(
                "event=membership_add module=service status=error project_id={project_id} employee_id={employee_id} forced={} error_code={}",
                mode.is_forced(),
                err.code()
            ),
        }
        result
    }

    /// Adds one participant, asking `confirm` before overriding a refusal.
    ///
    /// `confirm` receives the service's detail message and is called at
    /// most once. A `true` answer issues a second, forced request.
    pub fn add_participant_with_confirmation<C>(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
        confirm: C,
    ) -> GatewayResult<AdmissionOutcome>
    where
        C: FnOnce(&str) -> bool,
    {
        let detail = match self.add_participant(project_id, employee_id, AddMode::Checked) {
            Ok(members) => return Ok(AdmissionOutcome::Added(members)),
            Err(err) => override_detail(err)?,
        };

        if !confirm(&detail) {
            info!(
                "event=membership_override module=service status=declined project_id={project_id} employee_id={employee_id}"
            );
            return Ok(AdmissionOutcome::Declined { detail });
        }

        info!(
            "event=membership_override module=service status=confirmed project_id={project_id} employee_id={employee_id}"
        );
        self.add_participant(project_id, employee_id, AddMode::Forced)
            .map(AdmissionOutcome::Added)
    }

    /// Removes one participant. Removing a non-member is not an error.
    pub fn remove_participant(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
    ) -> GatewayResult<()> {
        self.gateway.remove_participant(project_id, employee_id)?;
        info!(
            "event=membership_remove module=service status=ok project_id={project_id} employee_id={employee_id}"
        );
        Ok(())
    }
}

fn override_detail(err: GatewayError) -> Result<String, GatewayError> {
    match err {
        GatewayError::CapacityExceeded { detail }
        | GatewayError::AssignmentRuleViolated { detail } => Ok(detail),
        other => Err(other),
    }
}
