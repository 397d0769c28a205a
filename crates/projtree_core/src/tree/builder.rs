//! Flat-to-nested project tree assembly.
//!
//! # Responsibility
//! - Turn a flat, parent-pointer addressed project list into an ordered
//!   forest of `ProjectTreeNode`s.
//! - Report projects that cannot be placed instead of failing.
//!
//! # Invariants
//! - Sibling order follows input order (stable grouping).
//! - A project id never appears twice on one root-to-node path; the edge
//!   that would close a loop is dropped and reported.
//! - Assembly never panics and always terminates.

use crate::model::project::{Project, ProjectId, ProjectTreeNode};
use log::warn;
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

/// Reason a project was left out of an assembled forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeDiagnostic {
    /// Parent id does not name any project in the input.
    MissingParent {
        project_id: ProjectId,
        parent_project_id: ProjectId,
    },
    /// Project was reached again on its own ancestor path.
    CycleDetected {
        project_id: ProjectId,
        parent_project_id: Option<ProjectId>,
    },
    /// Ancestor chain never reaches a root (loop or broken ancestor).
    Unreachable { project_id: ProjectId },
}

impl TreeDiagnostic {
    pub fn project_id(&self) -> ProjectId {
        match self {
            Self::MissingParent { project_id, .. }
            | Self::CycleDetected { project_id, .. }
            | Self::Unreachable { project_id } => *project_id,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::MissingParent { .. } => "missing_parent",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::Unreachable { .. } => "unreachable",
        }
    }
}

impl Display for TreeDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingParent {
                project_id,
                parent_project_id,
            } => write!(
                f,
                "project {project_id} points to missing parent {parent_project_id}"
            ),
            Self::CycleDetected {
                project_id,
                parent_project_id,
            } => match parent_project_id {
                Some(parent) => write!(
                    f,
                    "project {project_id} under {parent} closes an ancestor cycle"
                ),
                None => write!(f, "project {project_id} closes an ancestor cycle"),
            },
            Self::Unreachable { project_id } => {
                write!(f, "project {project_id} is not reachable from any root")
            }
        }
    }
}

/// Full forest assembled from the null root plus placement diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectForest {
    pub roots: Vec<ProjectTreeNode>,
    pub diagnostics: Vec<TreeDiagnostic>,
}

/// Builds the ordered child list of `parent_id` from a flat collection.
///
/// `parent_id = None` yields the root-level forest. Loop edges are dropped;
/// use [`build_forest`] to learn which projects were left out.
pub fn build_project_tree<'a, I>(projects: I, parent_id: Option<ProjectId>) -> Vec<ProjectTreeNode>
where
    I: IntoIterator<Item = &'a Project>,
{
    let mut diagnostics = Vec::new();
    let nodes = assemble_from(projects, parent_id, &mut diagnostics);
    log_diagnostics(&diagnostics);
    nodes
}

/// Builds the root-level forest and reports every input project that the
/// traversal did not place.
pub fn build_forest<'a, I>(projects: I) -> ProjectForest
where
    I: IntoIterator<Item = &'a Project>,
{
    let projects: Vec<&Project> = projects.into_iter().collect();
    let mut diagnostics = Vec::new();
    let roots = assemble_from(projects.iter().copied(), None, &mut diagnostics);

    let known_ids: HashSet<ProjectId> = projects.iter().map(|project| project.id).collect();
    let placed_ids: HashSet<ProjectId> = flatten_preorder(&roots)
        .into_iter()
        .map(|project| project.id)
        .collect();
    let mut reported: HashSet<ProjectId> = diagnostics
        .iter()
        .map(TreeDiagnostic::project_id)
        .collect();

    for project in &projects {
        if placed_ids.contains(&project.id) || !reported.insert(project.id) {
            continue;
        }
        let diagnostic = match project.parent_project_id {
            Some(parent) if !known_ids.contains(&parent) => TreeDiagnostic::MissingParent {
                project_id: project.id,
                parent_project_id: parent,
            },
            _ => TreeDiagnostic::Unreachable {
                project_id: project.id,
            },
        };
        diagnostics.push(diagnostic);
    }

    log_diagnostics(&diagnostics);
    ProjectForest { roots, diagnostics }
}

/// Walks a forest depth-first, parents before children.
pub fn flatten_preorder(nodes: &[ProjectTreeNode]) -> Vec<&Project> {
    let mut out = Vec::new();
    let mut stack: Vec<&ProjectTreeNode> = nodes.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(&node.project);
        stack.extend(node.children.iter().rev());
    }
    out
}

/// Finds one node anywhere in a forest.
pub fn find_node(nodes: &[ProjectTreeNode], project_id: ProjectId) -> Option<&ProjectTreeNode> {
    for node in nodes {
        if node.id() == project_id {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, project_id) {
            return Some(found);
        }
    }
    None
}

fn assemble_from<'a, I>(
    projects: I,
    parent_id: Option<ProjectId>,
    diagnostics: &mut Vec<TreeDiagnostic>,
) -> Vec<ProjectTreeNode>
where
    I: IntoIterator<Item = &'a Project>,
{
    let by_parent = group_by_parent(projects);
    let mut path = HashSet::new();
    if let Some(parent_id) = parent_id {
        path.insert(parent_id);
    }
    assemble(&by_parent, parent_id, &mut path, diagnostics)
}

fn group_by_parent<'a, I>(projects: I) -> HashMap<Option<ProjectId>, Vec<&'a Project>>
where
    I: IntoIterator<Item = &'a Project>,
{
    let mut by_parent: HashMap<Option<ProjectId>, Vec<&'a Project>> = HashMap::new();
    for project in projects {
        by_parent
            .entry(project.parent_project_id)
            .or_default()
            .push(project);
    }
    by_parent
}

fn assemble(
    by_parent: &HashMap<Option<ProjectId>, Vec<&Project>>,
    parent_id: Option<ProjectId>,
    path: &mut HashSet<ProjectId>,
    diagnostics: &mut Vec<TreeDiagnostic>,
) -> Vec<ProjectTreeNode> {
    let Some(children) = by_parent.get(&parent_id) else {
        return Vec::new();
    };

    let mut nodes = Vec::with_capacity(children.len());
    for project in children {
        if !path.insert(project.id) {
            diagnostics.push(TreeDiagnostic::CycleDetected {
                project_id: project.id,
                parent_project_id: parent_id,
            });
            continue;
        }
        let grandchildren = assemble(by_parent, Some(project.id), path, diagnostics);
        path.remove(&project.id);
        nodes.push(ProjectTreeNode {
            project: (*project).clone(),
            children: grandchildren,
        });
    }
    nodes
}

fn log_diagnostics(diagnostics: &[TreeDiagnostic]) {
    for diagnostic in diagnostics {
        warn!(
            "event=tree_build module=tree status=warn code={} project_id={}",
            diagnostic.code(),
            diagnostic.project_id()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{build_forest, build_project_tree, find_node, flatten_preorder, TreeDiagnostic};
    use crate::model::project::{Project, ProjectTreeNode};

    fn project(id: i64, parent: Option<i64>) -> Project {
        Project {
            id,
            title: format!("P{id}"),
            description: String::new(),
            parent_project_id: parent,
            max_participants: 5,
            created_at: String::new(),
            employees: Vec::new(),
        }
    }

    fn shape(nodes: &[ProjectTreeNode]) -> String {
        nodes
            .iter()
            .map(|node| format!("{}[{}]", node.id(), shape(&node.children)))
            .collect::<Vec<_>>()
            .join(",")
    }

    #[test]
    fn chain_nests_three_levels() {
        let projects = vec![project(1, None), project(2, Some(1)), project(3, Some(2))];
        let forest = build_project_tree(&projects, None);
        assert_eq!(shape(&forest), "1[2[3[]]]");
    }

    #[test]
    fn sibling_order_follows_input_order() {
        let projects = vec![
            project(5, None),
            project(9, Some(5)),
            project(1, None),
            project(4, Some(5)),
            project(7, Some(5)),
        ];
        let forest = build_project_tree(&projects, None);
        assert_eq!(shape(&forest), "5[9[],4[],7[]],1[]");
    }

    #[test]
    fn preorder_flatten_returns_every_project_once() {
        let projects = vec![
            project(3, Some(1)),
            project(1, None),
            project(4, Some(3)),
            project(2, None),
            project(5, Some(2)),
            project(6, Some(1)),
        ];
        let forest = build_project_tree(&projects, None);
        let mut ids: Vec<i64> = flatten_preorder(&forest).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3, 4, 6, 2, 5]);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn every_node_points_at_its_output_parent() {
        fn check(nodes: &[ProjectTreeNode], parent: Option<i64>) {
            for node in nodes {
                assert_eq!(node.project.parent_project_id, parent);
                check(&node.children, Some(node.id()));
            }
        }
        let projects = vec![
            project(1, None),
            project(2, Some(1)),
            project(3, Some(1)),
            project(4, Some(3)),
            project(5, Some(99)),
        ];
        check(&build_project_tree(&projects, None), None);
    }

    #[test]
    fn subtree_build_starts_below_requested_parent() {
        let projects = vec![project(1, None), project(2, Some(1)), project(3, Some(2))];
        let children = build_project_tree(&projects, Some(2));
        assert_eq!(shape(&children), "3[]");
    }

    #[test]
    fn two_node_cycle_terminates_and_is_excluded() {
        let projects = vec![project(1, None), project(10, Some(11)), project(11, Some(10))];
        let forest = build_forest(&projects);
        assert_eq!(shape(&forest.roots), "1[]");
        assert!(forest
            .diagnostics
            .contains(&TreeDiagnostic::Unreachable { project_id: 10 }));
        assert!(forest
            .diagnostics
            .contains(&TreeDiagnostic::Unreachable { project_id: 11 }));
    }

    #[test]
    fn cycle_below_requested_parent_drops_the_closing_edge() {
        let projects = vec![project(10, Some(11)), project(11, Some(10))];
        let children = build_project_tree(&projects, Some(10));
        assert_eq!(shape(&children), "11[]");
    }

    #[test]
    fn self_parented_project_is_reported_not_looped() {
        let projects = vec![project(1, None), project(2, Some(2))];
        let forest = build_forest(&projects);
        assert_eq!(shape(&forest.roots), "1[]");
        assert_eq!(
            forest.diagnostics,
            vec![TreeDiagnostic::Unreachable { project_id: 2 }]
        );
        assert_eq!(shape(&build_project_tree(&projects, Some(2))), "");
    }

    #[test]
    fn orphan_and_its_descendants_are_reported() {
        let projects = vec![project(1, None), project(2, Some(42)), project(3, Some(2))];
        let forest = build_forest(&projects);
        assert_eq!(shape(&forest.roots), "1[]");
        assert_eq!(
            forest.diagnostics,
            vec![
                TreeDiagnostic::MissingParent {
                    project_id: 2,
                    parent_project_id: 42
                },
                TreeDiagnostic::Unreachable { project_id: 3 },
            ]
        );
    }

    #[test]
    fn find_node_searches_nested_levels() {
        let projects = vec![project(1, None), project(2, Some(1)), project(3, Some(2))];
        let forest = build_project_tree(&projects, None);
        assert_eq!(find_node(&forest, 3).map(|node| node.id()), Some(3));
        assert!(find_node(&forest, 4).is_none());
    }
}
