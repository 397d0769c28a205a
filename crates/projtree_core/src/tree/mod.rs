//! Project hierarchy views and hierarchy guards.
//!
//! # Responsibility
//! - Derive nested views from the flat project collection.
//! - Validate parent changes before they reach the project service.
//!
//! # Invariants
//! - Views are pure functions of their input; nothing here owns state.

pub mod builder;

use crate::model::project::ProjectId;
use crate::model::ModelValidationError;
use std::collections::HashSet;

/// Checks that `project_id` may be placed under `candidate_parent`.
///
/// `parent_of` resolves one project id to its current parent pointer, or
/// `None` when the project does not exist. `project_id = None` means the
/// project is being created and cannot be anyone's ancestor yet.
///
/// # Errors
/// - `SelfParent` / `ParentCycle` / `ParentNotFound` wrapped into `E`.
/// - Any lookup error from `parent_of`.
pub fn ensure_valid_parent<E, F>(
    project_id: Option<ProjectId>,
    candidate_parent: ProjectId,
    mut parent_of: F,
) -> Result<(), E>
where
    E: From<ModelValidationError>,
    F: FnMut(ProjectId) -> Result<Option<Option<ProjectId>>, E>,
{
    if project_id == Some(candidate_parent) {
        return Err(ModelValidationError::SelfParent(candidate_parent).into());
    }

    let mut visited = HashSet::new();
    let mut cursor = Some(candidate_parent);
    while let Some(current) = cursor {
        if Some(current) == project_id || !visited.insert(current) {
            return Err(ModelValidationError::ParentCycle {
                project_id: project_id.unwrap_or(candidate_parent),
                parent_id: candidate_parent,
            }
            .into());
        }
        cursor = match parent_of(current)? {
            Some(parent) => parent,
            None if current == candidate_parent => {
                return Err(ModelValidationError::ParentNotFound(candidate_parent).into());
            }
            // Broken chain above the candidate: no loop through this project.
            None => None,
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ensure_valid_parent;
    use crate::model::ModelValidationError;
    use std::collections::HashMap;

    fn lookup(
        parents: &HashMap<i64, Option<i64>>,
    ) -> impl FnMut(i64) -> Result<Option<Option<i64>>, ModelValidationError> + '_ {
        move |id| Ok(parents.get(&id).copied())
    }

    #[test]
    fn accepts_unrelated_parent() {
        let parents = HashMap::from([(1, None), (2, Some(1)), (3, None)]);
        assert!(ensure_valid_parent(Some(3), 2, lookup(&parents)).is_ok());
        assert!(ensure_valid_parent(None, 2, lookup(&parents)).is_ok());
    }

    #[test]
    fn rejects_descendant_as_parent() {
        let parents = HashMap::from([(1, None), (2, Some(1)), (3, Some(2))]);
        let err = ensure_valid_parent(Some(1), 3, lookup(&parents)).unwrap_err();
        assert_eq!(
            err,
            ModelValidationError::ParentCycle {
                project_id: 1,
                parent_id: 3
            }
        );
    }

    #[test]
    fn rejects_missing_and_self_parent() {
        let parents = HashMap::from([(1, None)]);
        assert_eq!(
            ensure_valid_parent(Some(1), 9, lookup(&parents)).unwrap_err(),
            ModelValidationError::ParentNotFound(9)
        );
        assert_eq!(
            ensure_valid_parent(Some(1), 1, lookup(&parents)).unwrap_err(),
            ModelValidationError::SelfParent(1)
        );
    }

    #[test]
    fn terminates_on_existing_loop_above_candidate() {
        let parents = HashMap::from([(5, Some(6)), (6, Some(5)), (7, None)]);
        let err = ensure_valid_parent(Some(7), 5, lookup(&parents)).unwrap_err();
        assert!(matches!(err, ModelValidationError::ParentCycle { .. }));
    }
}
