//! Per-node lazy-load and edit state.
//!
//! # Responsibility
//! - Hold one tree node's expansion flag, cached detail and edit draft.
//! - Apply confirmed service outcomes to the cached detail.
//!
//! # Invariants
//! - State transitions here never perform I/O; `ProjectWorkspace` calls
//!   the service first and only then applies the outcome.
//! - Collapsing keeps the cached detail; only `invalidate` forces a refetch.
//! - `draft` is `Some` exactly while an edit is in progress.

use crate::model::employee::{Employee, EmployeeId};
use crate::model::project::{Project, ProjectDraft, ProjectId, ProjectTreeNode};

/// State owned by one tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    expanded: bool,
    loaded: bool,
    detail: ProjectTreeNode,
    draft: Option<ProjectDraft>,
}

impl NodeState {
    /// Seeds state from the shallow node produced by the tree builder.
    pub fn new(shallow: ProjectTreeNode) -> Self {
        Self {
            expanded: false,
            loaded: false,
            detail: shallow,
            draft: None,
        }
    }

    pub fn id(&self) -> ProjectId {
        self.detail.id()
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Whether `detail` came from a full fetch that was not invalidated.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    pub fn detail(&self) -> &ProjectTreeNode {
        &self.detail
    }

    pub fn draft(&self) -> Option<&ProjectDraft> {
        self.draft.as_ref()
    }

    pub(crate) fn detail_mut(&mut self) -> &mut ProjectTreeNode {
        &mut self.detail
    }

    pub(crate) fn draft_mut(&mut self) -> Option<&mut ProjectDraft> {
        self.draft.as_mut()
    }

    pub(crate) fn expand(&mut self) {
        self.expanded = true;
    }

    pub(crate) fn collapse(&mut self) {
        self.expanded = false;
    }

    /// Replaces the cached detail with a fresh full fetch.
    pub(crate) fn replace_detail(&mut self, detail: ProjectTreeNode) {
        self.detail = detail;
        self.loaded = true;
    }

    /// Replaces the detail with one rebuilt from a refreshed flat store.
    /// The loaded flag and any open draft are kept.
    pub(crate) fn reseed(&mut self, detail: ProjectTreeNode) {
        self.detail = detail;
    }

    pub(crate) fn invalidate(&mut self) {
        self.loaded = false;
    }

    /// Captures the editable fields of the cached detail.
    pub(crate) fn begin_edit(&mut self) {
        self.draft = Some(ProjectDraft::from(&self.detail.project));
    }

    pub(crate) fn cancel_edit(&mut self) {
        self.draft = None;
    }

    /// Applies a confirmed update: fields change, children and
    /// participants stay, editing ends.
    pub(crate) fn apply_saved(&mut self, updated: &Project) {
        self.detail.project.apply_fields(updated);
        self.draft = None;
    }

    pub(crate) fn set_members(&mut self, members: Vec<Employee>) {
        self.detail.project.employees = members;
    }

    pub(crate) fn remove_member(&mut self, employee_id: EmployeeId) {
        self.detail
            .project
            .employees
            .retain(|employee| employee.id != employee_id);
    }
}

#[cfg(test)]
mod tests {
    use super::NodeState;
    use crate::model::project::{Project, ProjectTreeNode};

    fn project(id: i64, parent: Option<i64>, title: &str) -> Project {
        Project {
            id,
            title: title.to_string(),
            description: "desc".to_string(),
            parent_project_id: parent,
            max_participants: 3,
            created_at: String::new(),
            employees: Vec::new(),
        }
    }

    #[test]
    fn collapse_keeps_loaded_detail() {
        let mut state = NodeState::new(ProjectTreeNode::leaf(project(1, None, "a")));
        assert!(!state.is_loaded());
        state.replace_detail(ProjectTreeNode {
            project: project(1, None, "a"),
            children: vec![ProjectTreeNode::leaf(project(2, Some(1), "b"))],
        });
        state.expand();
        state.collapse();
        assert!(state.is_loaded());
        assert!(!state.is_expanded());
        assert_eq!(state.detail().children.len(), 1);
        state.invalidate();
        assert!(!state.is_loaded());
    }

    #[test]
    fn save_preserves_children_and_ends_editing() {
        let mut state = NodeState::new(ProjectTreeNode {
            project: project(2, Some(1), "old"),
            children: vec![ProjectTreeNode::leaf(project(3, Some(2), "child"))],
        });
        state.begin_edit();
        assert_eq!(state.draft().unwrap().title, "old");
        state.draft_mut().unwrap().title = "new".to_string();
        assert_eq!(state.detail().project.title, "old");

        state.apply_saved(&project(2, None, "new"));
        assert!(!state.is_editing());
        assert_eq!(state.detail().project.title, "new");
        assert_eq!(state.detail().project.parent_project_id, None);
        assert_eq!(state.detail().children.len(), 1);
    }

    #[test]
    fn cancel_discards_draft() {
        let mut state = NodeState::new(ProjectTreeNode::leaf(project(1, None, "a")));
        state.begin_edit();
        state.draft_mut().unwrap().title = "changed".to_string();
        state.cancel_edit();
        assert!(state.draft().is_none());
        assert_eq!(state.detail().project.title, "a");
    }
}
