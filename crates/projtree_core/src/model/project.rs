//! Project domain model.
//!
//! # Responsibility
//! - Define the flat project record, its participant set and the derived
//!   tree node shape.
//! - Provide the create/update payload used by edit flows.
//!
//! # Invariants
//! - A project never names itself as parent.
//! - `employees` holds each employee id at most once.
//! - `employees.len() <= max_participants` unless a forced admission
//!   pushed the set past capacity.

use super::employee::{Employee, EmployeeId};
use super::ModelValidationError;
use serde::{Deserialize, Serialize};

/// Service-assigned project identifier.
pub type ProjectId = i64;

/// Flat project record as mirrored from the project service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub description: String,
    /// `None` means root-level project.
    pub parent_project_id: Option<ProjectId>,
    pub max_participants: u32,
    /// Opaque display-only timestamp.
    pub created_at: String,
    /// Direct participants. Empty when fetched without participants.
    #[serde(default)]
    pub employees: Vec<Employee>,
}

impl Project {
    pub fn participant_count(&self) -> usize {
        self.employees.len()
    }

    pub fn has_member(&self, employee_id: EmployeeId) -> bool {
        self.employees
            .iter()
            .any(|employee| employee.id == employee_id)
    }

    /// Returns whether a checked admission would be refused for capacity.
    pub fn is_full(&self) -> bool {
        self.participant_count() >= self.max_participants as usize
    }

    /// Copies the editable fields (and service timestamp) from `other`,
    /// leaving the participant set untouched.
    pub fn apply_fields(&mut self, other: &Project) {
        self.title = other.title.clone();
        self.description = other.description.clone();
        self.parent_project_id = other.parent_project_id;
        self.max_participants = other.max_participants;
        self.created_at = other.created_at.clone();
    }
}

/// Derived tree node: one project plus its ordered children.
///
/// Never a source of truth; rebuilt from the flat collection on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTreeNode {
    #[serde(flatten)]
    pub project: Project,
    pub children: Vec<ProjectTreeNode>,
}

impl ProjectTreeNode {
    pub fn leaf(project: Project) -> Self {
        Self {
            project,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> ProjectId {
        self.project.id
    }

    /// Number of nodes in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(ProjectTreeNode::subtree_len)
            .sum::<usize>()
    }

    /// Finds `project_id` in this subtree, self included.
    pub fn find(&self, project_id: ProjectId) -> Option<&ProjectTreeNode> {
        if self.id() == project_id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(project_id))
    }

    pub fn find_mut(&mut self, project_id: ProjectId) -> Option<&mut ProjectTreeNode> {
        if self.id() == project_id {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(project_id))
    }

    /// Returns the id of the node holding `project_id` as a direct child.
    pub fn parent_of(&self, project_id: ProjectId) -> Option<ProjectId> {
        if self.children.iter().any(|child| child.id() == project_id) {
            return Some(self.id());
        }
        self.children
            .iter()
            .find_map(|child| child.parent_of(project_id))
    }

    /// Removes the descendant `project_id` with its subtree.
    pub fn detach(&mut self, project_id: ProjectId) -> Option<ProjectTreeNode> {
        if let Some(index) = self
            .children
            .iter()
            .position(|child| child.id() == project_id)
        {
            return Some(self.children.remove(index));
        }
        self.children
            .iter_mut()
            .find_map(|child| child.detach(project_id))
    }

    /// Drops every descendant for which `keep` returns false, together with
    /// the descendant's own subtree.
    pub fn retain_descendants<F>(&mut self, keep: &F)
    where
        F: Fn(ProjectId) -> bool,
    {
        self.children.retain(|child| keep(child.id()));
        for child in &mut self.children {
            child.retain_descendants(keep);
        }
    }

    /// Visits every project in this subtree, self included.
    pub fn for_each_project_mut<F>(&mut self, visit: &mut F)
    where
        F: FnMut(&mut Project),
    {
        visit(&mut self.project);
        for child in &mut self.children {
            child.for_each_project_mut(visit);
        }
    }
}

/// Create/update payload for projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub title: String,
    pub description: String,
    pub parent_project_id: Option<ProjectId>,
    pub max_participants: u32,
}

impl ProjectDraft {
    pub fn new(title: impl Into<String>, max_participants: u32) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            parent_project_id: None,
            max_participants,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parent(mut self, parent_project_id: Option<ProjectId>) -> Self {
        self.parent_project_id = parent_project_id;
        self
    }

    /// Returns a trimmed copy of the payload.
    ///
    /// `project_id` is the id being updated, or `None` for creation.
    pub fn validate(&self, project_id: Option<ProjectId>) -> Result<Self, ModelValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ModelValidationError::BlankProjectTitle);
        }
        if let (Some(id), Some(parent)) = (project_id, self.parent_project_id) {
            if id == parent {
                return Err(ModelValidationError::SelfParent(id));
            }
        }
        Ok(Self {
            title: title.to_string(),
            description: self.description.trim().to_string(),
            parent_project_id: self.parent_project_id,
            max_participants: self.max_participants,
        })
    }
}

impl From<&Project> for ProjectDraft {
    fn from(value: &Project) -> Self {
        Self {
            title: value.title.clone(),
            description: value.description.clone(),
            parent_project_id: value.parent_project_id,
            max_participants: value.max_participants,
        }
    }
}

/// Converts a wire/storage capacity into the model type.
pub fn parse_capacity(value: i64) -> Result<u32, ModelValidationError> {
    u32::try_from(value).map_err(|_| ModelValidationError::InvalidCapacity(value))
}

#[cfg(test)]
mod tests {
    use super::{parse_capacity, Project, ProjectDraft, ProjectTreeNode};
    use crate::model::employee::{Employee, EmployeeRank};
    use crate::model::ModelValidationError;

    fn project(id: i64, parent: Option<i64>) -> Project {
        Project {
            id,
            title: format!("P{id}"),
            description: String::new(),
            parent_project_id: parent,
            max_participants: 2,
            created_at: "2024-01-01T00:00:00".to_string(),
            employees: Vec::new(),
        }
    }

    #[test]
    fn is_full_compares_members_against_capacity() {
        let mut p = project(1, None);
        assert!(!p.is_full());
        for id in 1..=2 {
            p.employees.push(Employee {
                id,
                name: format!("E{id}"),
                rank: EmployeeRank::One,
                registered_at: String::new(),
            });
        }
        assert!(p.is_full());
        assert!(p.has_member(2));
        assert!(!p.has_member(3));
    }

    #[test]
    fn draft_rejects_self_parent_and_blank_title() {
        let draft = ProjectDraft::new("Apollo", 3).with_parent(Some(7));
        assert_eq!(
            draft.validate(Some(7)).unwrap_err(),
            ModelValidationError::SelfParent(7)
        );
        assert!(draft.validate(Some(8)).is_ok());
        assert_eq!(
            ProjectDraft::new("  ", 3).validate(None).unwrap_err(),
            ModelValidationError::BlankProjectTitle
        );
    }

    #[test]
    fn negative_capacity_is_invalid() {
        assert_eq!(parse_capacity(4).unwrap(), 4);
        assert_eq!(
            parse_capacity(-1).unwrap_err(),
            ModelValidationError::InvalidCapacity(-1)
        );
    }

    #[test]
    fn tree_node_serializes_project_fields_flat() {
        let node = ProjectTreeNode {
            project: project(1, None),
            children: vec![ProjectTreeNode::leaf(project(2, Some(1)))],
        };
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["parent_project_id"], serde_json::Value::Null);
        assert_eq!(value["children"][0]["parent_project_id"], 1);
        assert_eq!(node.subtree_len(), 2);
    }

    #[test]
    fn retain_descendants_prunes_whole_subtrees() {
        let mut node = ProjectTreeNode {
            project: project(1, None),
            children: vec![
                ProjectTreeNode {
                    project: project(2, Some(1)),
                    children: vec![ProjectTreeNode::leaf(project(3, Some(2)))],
                },
                ProjectTreeNode::leaf(project(4, Some(1))),
            ],
        };
        node.retain_descendants(&|id| id != 2);
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].id(), 4);
    }

    #[test]
    fn detach_and_parent_lookup_walk_nested_levels() {
        let mut node = ProjectTreeNode {
            project: project(1, None),
            children: vec![ProjectTreeNode {
                project: project(2, Some(1)),
                children: vec![ProjectTreeNode::leaf(project(3, Some(2)))],
            }],
        };
        assert_eq!(node.parent_of(3), Some(2));
        assert_eq!(node.parent_of(1), None);
        let detached = node.detach(3).unwrap();
        assert_eq!(detached.id(), 3);
        assert!(node.find(3).is_none());
        assert!(node.detach(1).is_none());
        node.find_mut(2).unwrap().project.title = "renamed".to_string();
        assert_eq!(node.find(2).unwrap().project.title, "renamed");
    }
}
