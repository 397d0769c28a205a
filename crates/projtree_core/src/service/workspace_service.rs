//! Project workspace: flat stores, derived tree and per-node state.
//!
//! # Responsibility
//! - Own the id-keyed employee and project stores mirrored from the
//!   project service.
//! - Drive each node's lazy expansion and edit lifecycle.
//! - Write every confirmed mutation through to the flat store and to the
//!   cached node details it affects.
//!
//! # Invariants
//! - Local state changes only after the service confirmed success; a
//!   failed call leaves every store and node untouched.
//! - The flat project store is the source of truth for `forest()`.
//! - Participant changes update the node's detail only; the flat store's
//!   participant snapshot catches up on the next `refresh()`.
//! - After `refresh()` every cached detail is rebuilt from the complete
//!   flat store, so remote deletes, renames and moves are reflected.

use crate::gateway::{GatewayError, Page, ProjectGateway, ProjectListQuery};
use crate::model::employee::{Employee, EmployeeDraft, EmployeeId};
use crate::model::project::{Project, ProjectDraft, ProjectId, ProjectTreeNode};
use crate::model::ModelValidationError;
use crate::service::membership_service::{AddMode, AdmissionOutcome, MembershipService};
use crate::service::node_state::NodeState;
use crate::tree::builder::{build_forest, build_project_tree, ProjectForest};
use crate::tree::ensure_valid_parent;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors from workspace operations.
#[derive(Debug)]
pub enum WorkspaceError {
    /// Project service call failed; nothing changed locally.
    Gateway(GatewayError),
    /// Draft rejected locally before any service call.
    Validation(ModelValidationError),
    /// Project id is neither in the flat store nor in any cached detail.
    UnknownProject(ProjectId),
    /// Save/draft access on a node that is not being edited.
    NotEditing(ProjectId),
    /// Edit requested while another edit of the same node is open.
    AlreadyEditing(ProjectId),
}

impl WorkspaceError {
    /// Returns the service error, when the failure came from the service.
    pub fn gateway(&self) -> Option<&GatewayError> {
        match self {
            Self::Gateway(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gateway(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::UnknownProject(id) => write!(f, "project not in workspace: {id}"),
            Self::NotEditing(id) => write!(f, "project {id} is not being edited"),
            Self::AlreadyEditing(id) => write!(f, "project {id} is already being edited"),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Gateway(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GatewayError> for WorkspaceError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl From<ModelValidationError> for WorkspaceError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

/// In-memory mirror of the project service plus per-node view state.
pub struct ProjectWorkspace<G: ProjectGateway> {
    gateway: G,
    page_limit: Option<u32>,
    employees: IndexMap<EmployeeId, Employee>,
    projects: IndexMap<ProjectId, Project>,
    nodes: HashMap<ProjectId, NodeState>,
}

impl<G: ProjectGateway> ProjectWorkspace<G> {
    /// Creates an empty workspace; call `refresh` to populate it.
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            page_limit: None,
            employees: IndexMap::new(),
            projects: IndexMap::new(),
            nodes: HashMap::new(),
        }
    }

    /// Sets the page size `refresh` uses when walking the list endpoints.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = Some(limit);
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Refetches every employee and project (with participants), page by
    /// page until the service returns a short page.
    ///
    /// Stores are replaced only when every fetch succeeds. Node states of
    /// projects that no longer exist are dropped; the remaining cached
    /// details are rebuilt from the refreshed flat store.
    pub fn refresh(&mut self) -> WorkspaceResult<()> {
        let gateway = &self.gateway;
        let employees = fetch_all(self.page_limit, |page| gateway.list_employees(page))?;
        let projects = fetch_all(self.page_limit, |page| {
            gateway.list_projects(&ProjectListQuery {
                page,
                with_participants: true,
                search: None,
            })
        })?;

        self.employees = employees
            .into_iter()
            .map(|employee| (employee.id, employee))
            .collect();
        self.projects = projects
            .into_iter()
            .map(|project| (project.id, project))
            .collect();

        let projects = &self.projects;
        let before = self.nodes.len();
        self.nodes.retain(|id, _| projects.contains_key(id));
        for (id, node) in self.nodes.iter_mut() {
            if let Some(project) = projects.get(id) {
                node.reseed(ProjectTreeNode {
                    project: project.clone(),
                    children: build_project_tree(projects.values(), Some(*id)),
                });
            }
        }
        info!(
            "event=workspace_refresh module=workspace status=ok employees={} projects={} dropped_nodes={} reseeded_nodes={}",
            self.employees.len(),
            self.projects.len(),
            before - self.nodes.len(),
            self.nodes.len()
        );
        Ok(())
    }

    pub fn employees(&self) -> impl Iterator<Item = &Employee> {
        self.employees.values()
    }

    pub fn employee(&self, id: EmployeeId) -> Option<&Employee> {
        self.employees.get(&id)
    }

    /// Flat project store in service order.
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    /// Rebuilds the root-level forest from the flat store.
    pub fn forest(&self) -> ProjectForest {
        build_forest(self.projects.values())
    }

    /// Returns node state if the node has been touched.
    pub fn node_state(&self, id: ProjectId) -> Option<&NodeState> {
        self.nodes.get(&id)
    }

    /// Returns node state, seeding it from the tree builder on first use.
    pub fn node(&mut self, id: ProjectId) -> WorkspaceResult<&NodeState> {
        Ok(&*self.ensure_node(id)?)
    }

    pub fn is_loaded(&self, id: ProjectId) -> bool {
        self.nodes.get(&id).is_some_and(NodeState::is_loaded)
    }

    /// Toggles expansion; returns the new expanded flag.
    ///
    /// Expanding a node whose detail is not loaded fetches the full subtree
    /// first. When that fetch fails the node stays collapsed.
    pub fn toggle(&mut self, id: ProjectId) -> WorkspaceResult<bool> {
        let node = self.ensure_node(id)?;
        if node.is_expanded() {
            node.collapse();
            debug!("event=node_toggle module=workspace status=ok project_id={id} expanded=false");
            return Ok(false);
        }
        if !node.is_loaded() {
            self.load(id)?;
        }
        self.ensure_node(id)?.expand();
        debug!("event=node_toggle module=workspace status=ok project_id={id} expanded=true");
        Ok(true)
    }

    /// Fetches the node's full subtree and replaces its cached detail.
    pub fn load(&mut self, id: ProjectId) -> WorkspaceResult<()> {
        self.ensure_node(id)?;
        let detail = match self.gateway.get_project_with_children(id) {
            Ok(detail) => detail,
            Err(err) => {
                warn!(
                    "event=node_load module=workspace status=error project_id={id} error_code={}",
                    err.code()
                );
                return Err(err.into());
            }
        };
        let size = detail.subtree_len();
        self.ensure_node(id)?.replace_detail(detail);
        info!("event=node_load module=workspace status=ok project_id={id} subtree_len={size}");
        Ok(())
    }

    /// Marks the node's detail stale so the next expansion refetches it.
    pub fn invalidate(&mut self, id: ProjectId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.invalidate();
        }
    }

    /// Starts editing; the draft captures the cached detail's fields.
    pub fn begin_edit(&mut self, id: ProjectId) -> WorkspaceResult<&mut ProjectDraft> {
        let node = self.ensure_node(id)?;
        if node.is_editing() {
            return Err(WorkspaceError::AlreadyEditing(id));
        }
        node.begin_edit();
        node.draft_mut().ok_or(WorkspaceError::NotEditing(id))
    }

    pub fn draft_mut(&mut self, id: ProjectId) -> WorkspaceResult<&mut ProjectDraft> {
        self.nodes
            .get_mut(&id)
            .and_then(NodeState::draft_mut)
            .ok_or(WorkspaceError::NotEditing(id))
    }

    /// Discards the draft without contacting the service.
    pub fn cancel_edit(&mut self, id: ProjectId) -> WorkspaceResult<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .filter(|node| node.is_editing())
            .ok_or(WorkspaceError::NotEditing(id))?;
        node.cancel_edit();
        Ok(())
    }

    /// Submits the draft and writes the confirmed update through.
    ///
    /// Order: node detail fields, then the flat store entry, then every
    /// other cached detail that shows this project.
    pub fn save_edit(&mut self, id: ProjectId) -> WorkspaceResult<Project> {
        let draft = self
            .nodes
            .get(&id)
            .and_then(NodeState::draft)
            .cloned()
            .ok_or(WorkspaceError::NotEditing(id))?;
        let draft = draft.validate(Some(id))?;
        if let Some(parent) = draft.parent_project_id {
            let projects = &self.projects;
            ensure_valid_parent::<WorkspaceError, _>(Some(id), parent, |current| {
                Ok(projects.get(&current).map(|project| project.parent_project_id))
            })?;
        }

        let updated = self.gateway.update_project(id, &draft)?;

        let node = self.ensure_node(id)?;
        node.apply_saved(&updated);
        let saved_subtree = node.detail().clone();

        match self.projects.get_mut(&id) {
            Some(entry) => entry.apply_fields(&updated),
            None => {
                self.projects.insert(id, updated.clone());
            }
        }

        for (node_id, other) in self.nodes.iter_mut() {
            if *node_id != id {
                write_through_update(other.detail_mut(), &updated, &saved_subtree);
            }
        }

        info!(
            "event=project_save module=workspace status=ok project_id={id} parent_project_id={:?}",
            updated.parent_project_id
        );
        Ok(updated)
    }

    /// Deletes a project and removes whatever the service reports removed.
    pub fn delete_project(&mut self, id: ProjectId) -> WorkspaceResult<Vec<ProjectId>> {
        let removed = self.gateway.delete_project(id)?;
        if !removed.contains(&id) {
            warn!(
                "event=project_delete module=workspace status=warn project_id={id} reason=root_not_reported removed_count={}",
                removed.len()
            );
        }

        let gone: HashSet<ProjectId> = removed.iter().copied().collect();
        self.projects.retain(|project_id, _| !gone.contains(project_id));
        self.nodes.retain(|project_id, _| !gone.contains(project_id));
        for node in self.nodes.values_mut() {
            node.detail_mut()
                .retain_descendants(&|project_id| !gone.contains(&project_id));
        }

        info!(
            "event=project_delete module=workspace status=ok project_id={id} removed_count={}",
            removed.len()
        );
        Ok(removed)
    }

    /// Creates a project; it enters the flat store as the newest entry.
    pub fn create_project(&mut self, draft: &ProjectDraft) -> WorkspaceResult<Project> {
        let created = self.gateway.create_project(draft)?;
        self.projects.shift_insert(0, created.id, created.clone());

        if let Some(parent) = created.parent_project_id {
            for node in self.nodes.values_mut() {
                if let Some(target) = node.detail_mut().find_mut(parent) {
                    target.children.push(ProjectTreeNode::leaf(created.clone()));
                }
            }
        }

        info!(
            "event=project_create module=workspace status=ok project_id={}",
            created.id
        );
        Ok(created)
    }

    /// Adds one participant and stores the returned set on the node.
    pub fn add_participant(
        &mut self,
        project_id: ProjectId,
        employee_id: EmployeeId,
        mode: AddMode,
    ) -> WorkspaceResult<&[Employee]> {
        self.ensure_node(project_id)?;
        let members = MembershipService::new(&self.gateway).add_participant(
            project_id,
            employee_id,
            mode,
        )?;
        let node = self.ensure_node(project_id)?;
        node.set_members(members);
        Ok(node.detail().project.employees.as_slice())
    }

    /// Adds one participant through the confirmation protocol.
    pub fn add_participant_with_confirmation<C>(
        &mut self,
        project_id: ProjectId,
        employee_id: EmployeeId,
        confirm: C,
    ) -> WorkspaceResult<AdmissionOutcome>
    where
        C: FnOnce(&str) -> bool,
    {
        self.ensure_node(project_id)?;
        let outcome = MembershipService::new(&self.gateway).add_participant_with_confirmation(
            project_id,
            employee_id,
            confirm,
        )?;
        if let AdmissionOutcome::Added(members) = &outcome {
            self.ensure_node(project_id)?.set_members(members.clone());
        }
        Ok(outcome)
    }

    /// Removes one participant from the node's detail after the service
    /// confirmed it. Absent members are simply not present afterwards.
    pub fn remove_participant(
        &mut self,
        project_id: ProjectId,
        employee_id: EmployeeId,
    ) -> WorkspaceResult<()> {
        self.ensure_node(project_id)?;
        MembershipService::new(&self.gateway).remove_participant(project_id, employee_id)?;
        self.ensure_node(project_id)?.remove_member(employee_id);
        Ok(())
    }

    pub fn create_employee(&mut self, draft: &EmployeeDraft) -> WorkspaceResult<Employee> {
        let created = self.gateway.create_employee(draft)?;
        self.employees.insert(created.id, created.clone());
        info!(
            "event=employee_create module=workspace status=ok employee_id={}",
            created.id
        );
        Ok(created)
    }

    /// Updates one employee everywhere it is shown, keyed by id.
    pub fn update_employee(
        &mut self,
        id: EmployeeId,
        draft: &EmployeeDraft,
    ) -> WorkspaceResult<Employee> {
        let updated = self.gateway.update_employee(id, draft)?;
        self.employees.insert(id, updated.clone());
        self.for_each_project_mut(|project| {
            for member in project.employees.iter_mut().filter(|member| member.id == id) {
                *member = updated.clone();
            }
        });
        info!("event=employee_update module=workspace status=ok employee_id={id}");
        Ok(updated)
    }

    /// Deletes one employee and drops it from every participant set.
    pub fn delete_employee(&mut self, id: EmployeeId) -> WorkspaceResult<()> {
        self.gateway.delete_employee(id)?;
        self.employees.shift_remove(&id);
        self.for_each_project_mut(|project| {
            project.employees.retain(|member| member.id != id);
        });
        info!("event=employee_delete module=workspace status=ok employee_id={id}");
        Ok(())
    }

    fn for_each_project_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut Project),
    {
        for project in self.projects.values_mut() {
            visit(project);
        }
        for node in self.nodes.values_mut() {
            node.detail_mut().for_each_project_mut(&mut visit);
        }
    }

    fn ensure_node(&mut self, id: ProjectId) -> WorkspaceResult<&mut NodeState> {
        if !self.nodes.contains_key(&id) {
            let seed = self.shallow_node(id)?;
            self.nodes.insert(id, NodeState::new(seed));
        }
        self.nodes
            .get_mut(&id)
            .ok_or(WorkspaceError::UnknownProject(id))
    }

    /// Builds the node the tree builder would render for `id`, falling back
    /// to a copy from any cached detail that already holds it.
    fn shallow_node(&self, id: ProjectId) -> WorkspaceResult<ProjectTreeNode> {
        if let Some(project) = self.projects.get(&id) {
            return Ok(ProjectTreeNode {
                project: project.clone(),
                children: build_project_tree(self.projects.values(), Some(id)),
            });
        }
        self.nodes
            .values()
            .find_map(|node| node.detail().find(id))
            .cloned()
            .ok_or(WorkspaceError::UnknownProject(id))
    }
}

/// Collects every page of a list call. `None` fetches everything at once.
fn fetch_all<T, F>(page_limit: Option<u32>, mut fetch: F) -> Result<Vec<T>, GatewayError>
where
    F: FnMut(Page) -> Result<Vec<T>, GatewayError>,
{
    let Some(limit) = page_limit.filter(|limit| *limit > 0) else {
        return fetch(Page::default());
    };
    let mut items = Vec::new();
    let mut offset = 0_u32;
    loop {
        let batch = fetch(Page {
            limit: Some(limit),
            offset,
        })?;
        let len = batch.len();
        items.extend(batch);
        if len < limit as usize {
            return Ok(items);
        }
        offset = offset.saturating_add(limit);
    }
}

/// Applies a confirmed project update to one cached detail that is not the
/// edited node's own.
fn write_through_update(detail: &mut ProjectTreeNode, updated: &Project, saved: &ProjectTreeNode) {
    if detail.id() == updated.id {
        detail.project.apply_fields(updated);
        return;
    }

    let cached_parent = detail.parent_of(updated.id);
    if cached_parent.is_some() && cached_parent == updated.parent_project_id {
        if let Some(node) = detail.find_mut(updated.id) {
            node.project.apply_fields(updated);
        }
        return;
    }

    let moved = detail.detach(updated.id);
    let Some(new_parent) = updated.parent_project_id else {
        return;
    };
    if let Some(target) = detail.find_mut(new_parent) {
        let mut subtree = moved.unwrap_or_else(|| saved.clone());
        subtree.project.apply_fields(updated);
        target.children.push(subtree);
    }
}
