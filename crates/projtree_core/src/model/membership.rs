//! Participant admission rules.
//!
//! # Responsibility
//! - Decide whether one employee may join one project.
//! - Keep capacity and rank quotas overridable only through an explicit
//!   force flag.
//!
//! # Invariants
//! - Re-adding an existing member is a no-op, never a rejection.
//! - Capacity is checked before rank quotas, so a full project always
//!   reports `CapacityExceeded` first.
//! - `force = true` bypasses capacity and rank quotas, nothing else.

use super::employee::{Employee, EmployeeRank};
use super::project::Project;
use std::fmt::{Display, Formatter};

/// Assignment counts for one employee relative to one target project.
///
/// Computed by whoever holds the authoritative membership data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentContext {
    /// Root-level projects the employee already belongs to.
    pub top_level_assignments: usize,
    /// Whether the employee belongs to the target's root-level ancestor.
    /// Ignored for root-level targets.
    pub in_top_level_project: bool,
    /// Subprojects of the target's root-level ancestor that the employee
    /// already belongs to (the ancestor itself excluded).
    pub subproject_assignments: usize,
}

/// Positive admission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Employee is not yet a member and may be inserted.
    Admit,
    /// Employee already belongs to the project; nothing to write.
    AlreadyMember,
}

/// Overridable admission refusal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionRejection {
    CapacityExceeded { detail: String },
    RuleViolated { detail: String },
}

impl AdmissionRejection {
    pub fn detail(&self) -> &str {
        match self {
            Self::CapacityExceeded { detail } | Self::RuleViolated { detail } => detail,
        }
    }
}

impl Display for AdmissionRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.detail())
    }
}

/// Decides admission of `employee` into `project`.
pub fn check_admission(
    project: &Project,
    employee: &Employee,
    force: bool,
    context: &AssignmentContext,
) -> Result<Admission, AdmissionRejection> {
    if project.has_member(employee.id) {
        return Ok(Admission::AlreadyMember);
    }
    if force {
        return Ok(Admission::Admit);
    }

    if project.is_full() {
        return Err(AdmissionRejection::CapacityExceeded {
            detail: format!(
                "Project reached maximum participants ({}/{})",
                project.participant_count(),
                project.max_participants
            ),
        });
    }

    match rank_violation(project, employee.rank, context) {
        Some(detail) => Err(AdmissionRejection::RuleViolated { detail }),
        None => Ok(Admission::Admit),
    }
}

fn rank_violation(
    project: &Project,
    rank: EmployeeRank,
    context: &AssignmentContext,
) -> Option<String> {
    if rank == EmployeeRank::One {
        return None;
    }

    if project.parent_project_id.is_none() {
        let limit = match rank {
            EmployeeRank::Two => 3,
            EmployeeRank::Three => 2,
            _ => 1,
        };
        if context.top_level_assignments >= limit {
            return Some(format!(
                "Rank {rank} employee cannot be in more than {limit} top-level project{}",
                plural(limit)
            ));
        }
        return None;
    }

    if !context.in_top_level_project {
        return Some(
            "Employee must be assigned to the top-level project before being added to its subproject"
                .to_string(),
        );
    }

    let limit = match rank {
        EmployeeRank::Three => 2,
        EmployeeRank::Four => 1,
        _ => return None,
    };
    if context.subproject_assignments >= limit {
        return Some(format!(
            "Rank {rank} employee cannot be in more than {limit} subproject{} within a top-level project",
            plural(limit)
        ));
    }
    None
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::{check_admission, Admission, AdmissionRejection, AssignmentContext};
    use crate::model::employee::{Employee, EmployeeRank};
    use crate::model::project::Project;

    fn employee(id: i64, rank: EmployeeRank) -> Employee {
        Employee {
            id,
            name: format!("E{id}"),
            rank,
            registered_at: String::new(),
        }
    }

    fn project(parent: Option<i64>, max: u32, members: Vec<Employee>) -> Project {
        Project {
            id: 1,
            title: "P1".to_string(),
            description: String::new(),
            parent_project_id: parent,
            max_participants: max,
            created_at: String::new(),
            employees: members,
        }
    }

    #[test]
    fn full_project_rejects_unless_forced() {
        let members = vec![
            employee(1, EmployeeRank::One),
            employee(2, EmployeeRank::One),
        ];
        let p1 = project(None, 2, members);
        let e3 = employee(3, EmployeeRank::One);
        let ctx = AssignmentContext::default();

        let err = check_admission(&p1, &e3, false, &ctx).unwrap_err();
        assert!(matches!(err, AdmissionRejection::CapacityExceeded { .. }));
        assert!(err.detail().contains("2/2"));

        assert_eq!(
            check_admission(&p1, &e3, true, &ctx).unwrap(),
            Admission::Admit
        );
    }

    #[test]
    fn existing_member_is_noop_even_when_full() {
        let p1 = project(None, 1, vec![employee(1, EmployeeRank::Four)]);
        let ctx = AssignmentContext {
            top_level_assignments: 5,
            ..AssignmentContext::default()
        };
        assert_eq!(
            check_admission(&p1, &employee(1, EmployeeRank::Four), false, &ctx).unwrap(),
            Admission::AlreadyMember
        );
    }

    #[test]
    fn zero_capacity_project_is_full_from_the_start() {
        let p = project(None, 0, Vec::new());
        let err = check_admission(
            &p,
            &employee(1, EmployeeRank::One),
            false,
            &AssignmentContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AdmissionRejection::CapacityExceeded { .. }));
    }

    #[test]
    fn top_level_quota_depends_on_rank() {
        let p = project(None, 10, Vec::new());
        let ctx = AssignmentContext {
            top_level_assignments: 2,
            ..AssignmentContext::default()
        };
        assert!(check_admission(&p, &employee(1, EmployeeRank::One), false, &ctx).is_ok());
        assert!(check_admission(&p, &employee(2, EmployeeRank::Two), false, &ctx).is_ok());
        let err = check_admission(&p, &employee(3, EmployeeRank::Three), false, &ctx).unwrap_err();
        assert_eq!(
            err.detail(),
            "Rank 3 employee cannot be in more than 2 top-level projects"
        );
        assert!(check_admission(&p, &employee(3, EmployeeRank::Three), true, &ctx).is_ok());
    }

    #[test]
    fn subproject_requires_top_level_membership() {
        let p = project(Some(9), 10, Vec::new());
        let err = check_admission(
            &p,
            &employee(1, EmployeeRank::Two),
            false,
            &AssignmentContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AdmissionRejection::RuleViolated { .. }));

        let ctx = AssignmentContext {
            in_top_level_project: true,
            subproject_assignments: 1,
            ..AssignmentContext::default()
        };
        assert!(check_admission(&p, &employee(2, EmployeeRank::Three), false, &ctx).is_ok());
        let err = check_admission(&p, &employee(3, EmployeeRank::Four), false, &ctx).unwrap_err();
        assert_eq!(
            err.detail(),
            "Rank 4 employee cannot be in more than 1 subproject within a top-level project"
        );
    }
}
