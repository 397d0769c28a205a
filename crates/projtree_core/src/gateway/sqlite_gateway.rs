//! SQLite-backed reference implementation of the project service.
//!
//! # Responsibility
//! - Serve the `ProjectGateway` contract from a migrated connection.
//! - Decide participant admission authoritatively at write time.
//!
//! # Invariants
//! - Only active (`is_deleted=0`) rows are returned.
//! - Admission checks and the membership insert share one immediate
//!   transaction, so two concurrent checked admissions cannot both pass
//!   against the same free slot.
//! - Deleting a project soft-deletes its whole active subtree and clears
//!   participant rows for every removed project.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::gateway::{
    EntityRef, GatewayError, GatewayResult, Page, ProjectGateway, ProjectListQuery,
};
use crate::model::employee::{Employee, EmployeeDraft, EmployeeId, EmployeeRank};
use crate::model::membership::{check_admission, Admission, AssignmentContext};
use crate::model::project::{parse_capacity, Project, ProjectDraft, ProjectId, ProjectTreeNode};
use crate::tree::builder::build_project_tree;
use crate::tree::ensure_valid_parent;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Params, Row, Transaction, TransactionBehavior};
use std::collections::{HashMap, HashSet};

const EMPLOYEE_SELECT_SQL: &str = "SELECT
    id,
    name,
    rank,
    registered_at
FROM employees";

const PROJECT_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.title AS title,
    p.description AS description,
    p.parent_project_id AS parent_project_id,
    p.max_participants AS max_participants,
    p.created_at AS created_at
FROM projects p";

const MEMBER_SELECT_SQL: &str = "SELECT
    pp.project_id AS project_id,
    e.id AS id,
    e.name AS name,
    e.rank AS rank,
    e.registered_at AS registered_at
FROM project_participants pp
INNER JOIN employees e ON e.id = pp.employee_id";

const SUBTREE_CTE_SQL: &str = "WITH RECURSIVE subtree(id) AS (
    SELECT id
    FROM projects
    WHERE id = ?1
      AND is_deleted = 0
    UNION
    SELECT child.id
    FROM projects child
    INNER JOIN subtree parent ON child.parent_project_id = parent.id
    WHERE child.is_deleted = 0
)";

/// Project service backed by one SQLite connection.
pub struct SqliteProjectGateway<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectGateway<'conn> {
    /// Creates gateway from a migrated connection.
    ///
    /// # Errors
    /// - `Transport` when the connection is not at the latest schema version.
    pub fn try_new(conn: &'conn Connection) -> GatewayResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(DbError::UninitializedConnection {
                expected_version,
                actual_version,
            }
            .into());
        }
        Ok(Self { conn })
    }

    fn immediate(&self) -> GatewayResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl ProjectGateway for SqliteProjectGateway<'_> {
    fn list_employees(&self, page: Page) -> GatewayResult<Vec<Employee>> {
        query_employees(
            self.conn,
            &format!(
                "{EMPLOYEE_SELECT_SQL}
                 WHERE is_deleted = 0
                 ORDER BY id ASC
                 LIMIT ?1 OFFSET ?2;"
            ),
            params![limit_value(page), page.offset],
        )
    }

    fn create_employee(&self, draft: &EmployeeDraft) -> GatewayResult<Employee> {
        let draft = draft.validate()?;
        self.conn.execute(
            "INSERT INTO employees (name, rank) VALUES (?1, ?2);",
            params![draft.name, draft.rank.as_u8()],
        )?;
        let id = self.conn.last_insert_rowid();
        info!("event=employee_create module=gateway status=ok employee_id={id}");
        require_employee(self.conn, id)
    }

    fn update_employee(&self, id: EmployeeId, draft: &EmployeeDraft) -> GatewayResult<Employee> {
        let draft = draft.validate()?;
        let changed = self.conn.execute(
            "UPDATE employees
             SET name = ?2,
                 rank = ?3
             WHERE id = ?1
               AND is_deleted = 0;",
            params![id, draft.name, draft.rank.as_u8()],
        )?;
        if changed == 0 {
            return Err(GatewayError::NotFound(EntityRef::Employee(id)));
        }
        info!("event=employee_update module=gateway status=ok employee_id={id}");
        require_employee(self.conn, id)
    }

    fn delete_employee(&self, id: EmployeeId) -> GatewayResult<()> {
        let tx = self.immediate()?;
        require_employee(&tx, id)?;
        let memberships = tx.execute(
            "DELETE FROM project_participants WHERE employee_id = ?1;",
            [id],
        )?;
        tx.execute(
            "UPDATE employees SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0;",
            [id],
        )?;
        tx.commit()?;
        info!(
            "event=employee_delete module=gateway status=ok employee_id={id} memberships_removed={memberships}"
        );
        Ok(())
    }

    fn list_projects(&self, query: &ProjectListQuery) -> GatewayResult<Vec<Project>> {
        let search = query
            .search
            .as_deref()
            .filter(|value| !value.is_empty());
        let mut projects = query_projects(
            self.conn,
            &format!(
                "{PROJECT_SELECT_SQL}
                 WHERE p.is_deleted = 0
                   AND (?1 IS NULL OR instr(p.title, ?1) > 0)
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?2 OFFSET ?3;"
            ),
            params![search, limit_value(query.page), query.page.offset],
        )?;
        if query.with_participants {
            attach_members(self.conn, &mut projects)?;
        }
        Ok(projects)
    }

    fn get_project_with_children(&self, id: ProjectId) -> GatewayResult<ProjectTreeNode> {
        let mut subtree = query_projects(
            self.conn,
            &format!(
                "{SUBTREE_CTE_SQL}
                 {PROJECT_SELECT_SQL}
                 INNER JOIN subtree s ON s.id = p.id
                 ORDER BY p.created_at DESC, p.id DESC;"
            ),
            [id],
        )?;
        attach_members(self.conn, &mut subtree)?;

        let root_index = subtree
            .iter()
            .position(|project| project.id == id)
            .ok_or(GatewayError::NotFound(EntityRef::Project(id)))?;
        let root = subtree.remove(root_index);
        let children = build_project_tree(&subtree, Some(id));
        Ok(ProjectTreeNode {
            project: root,
            children,
        })
    }

    fn create_project(&self, draft: &ProjectDraft) -> GatewayResult<Project> {
        let draft = draft.validate(None)?;
        let tx = self.immediate()?;
        if let Some(parent) = draft.parent_project_id {
            ensure_valid_parent(None, parent, |current| parent_pointer(&tx, current))?;
        }
        tx.execute(
            "INSERT INTO projects (title, description, parent_project_id, max_participants)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                draft.title,
                draft.description,
                draft.parent_project_id,
                draft.max_participants
            ],
        )?;
        let id = tx.last_insert_rowid();
        let project = require_project(&tx, id)?;
        tx.commit()?;
        info!("event=project_create module=gateway status=ok project_id={id}");
        Ok(project)
    }

    fn update_project(&self, id: ProjectId, draft: &ProjectDraft) -> GatewayResult<Project> {
        let draft = draft.validate(Some(id))?;
        let tx = self.immediate()?;
        require_project(&tx, id)?;
        if let Some(parent) = draft.parent_project_id {
            ensure_valid_parent(Some(id), parent, |current| parent_pointer(&tx, current))?;
        }
        tx.execute(
            "UPDATE projects
             SET title = ?2,
                 description = ?3,
                 parent_project_id = ?4,
                 max_participants = ?5
             WHERE id = ?1
               AND is_deleted = 0;",
            params![
                id,
                draft.title,
                draft.description,
                draft.parent_project_id,
                draft.max_participants
            ],
        )?;
        let project = require_project(&tx, id)?;
        tx.commit()?;
        info!(
            "event=project_update module=gateway status=ok project_id={id} parent_project_id={:?}",
            project.parent_project_id
        );
        Ok(project)
    }

    fn delete_project(&self, id: ProjectId) -> GatewayResult<Vec<ProjectId>> {
        let tx = self.immediate()?;
        require_project(&tx, id)?;

        let mut stmt = tx.prepare(&format!("{SUBTREE_CTE_SQL} SELECT id FROM subtree;"))?;
        let removed = stmt
            .query_map([id], |row| row.get::<_, ProjectId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        for project_id in &removed {
            tx.execute(
                "DELETE FROM project_participants WHERE project_id = ?1;",
                [project_id],
            )?;
            tx.execute(
                "UPDATE projects SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0;",
                [project_id],
            )?;
        }
        tx.commit()?;
        info!(
            "event=project_delete module=gateway status=ok project_id={id} removed_count={}",
            removed.len()
        );
        Ok(removed)
    }

    fn add_participant(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
        force: bool,
    ) -> GatewayResult<Vec<Employee>> {
        let tx = self.immediate()?;
        let project = require_project(&tx, project_id)?;
        let employee = require_employee(&tx, employee_id)?;
        let context = assignment_context(&tx, &project, employee_id)?;

        match check_admission(&project, &employee, force, &context) {
            Ok(Admission::AlreadyMember) => {
                info!(
                    "event=participant_add module=gateway status=ok project_id={project_id} employee_id={employee_id} already_member=true"
                );
                return Ok(project.employees);
            }
            Ok(Admission::Admit) => {}
            Err(rejection) => {
                warn!(
                    "event=participant_add module=gateway status=rejected project_id={project_id} employee_id={employee_id} reason={}",
                    rejection.detail()
                );
                return Err(rejection.into());
            }
        }

        tx.execute(
            "INSERT INTO project_participants (project_id, employee_id) VALUES (?1, ?2);",
            params![project_id, employee_id],
        )?;
        let members = load_members(&tx, project_id)?;
        tx.commit()?;
        info!(
            "event=participant_add module=gateway status=ok project_id={project_id} employee_id={employee_id} forced={force} count={} capacity={}",
            members.len(),
            project.max_participants
        );
        Ok(members)
    }

    fn remove_participant(
        &self,
        project_id: ProjectId,
        employee_id: EmployeeId,
    ) -> GatewayResult<()> {
        let tx = self.immediate()?;
        require_project(&tx, project_id)?;
        require_employee(&tx, employee_id)?;
        let removed = tx.execute(
            "DELETE FROM project_participants WHERE project_id = ?1 AND employee_id = ?2;",
            params![project_id, employee_id],
        )?;
        tx.commit()?;
        info!(
            "event=participant_remove module=gateway status=ok project_id={project_id} employee_id={employee_id} removed={}",
            removed > 0
        );
        Ok(())
    }
}

fn limit_value(page: Page) -> i64 {
    // SQLite treats a negative LIMIT as unbounded.
    page.limit.map_or(-1, i64::from)
}

fn require_employee(conn: &Connection, id: EmployeeId) -> GatewayResult<Employee> {
    query_employees(
        conn,
        &format!("{EMPLOYEE_SELECT_SQL} WHERE id = ?1 AND is_deleted = 0;"),
        [id],
    )?
    .pop()
    .ok_or(GatewayError::NotFound(EntityRef::Employee(id)))
}

fn require_project(conn: &Connection, id: ProjectId) -> GatewayResult<Project> {
    let mut project = query_projects(
        conn,
        &format!("{PROJECT_SELECT_SQL} WHERE p.id = ?1 AND p.is_deleted = 0;"),
        [id],
    )?
    .pop()
    .ok_or(GatewayError::NotFound(EntityRef::Project(id)))?;
    project.employees = load_members(conn, id)?;
    Ok(project)
}

/// Returns `None` when the project is missing, else its parent pointer.
fn parent_pointer(conn: &Connection, id: ProjectId) -> GatewayResult<Option<Option<ProjectId>>> {
    let pointer = conn
        .query_row(
            "SELECT parent_project_id FROM projects WHERE id = ?1 AND is_deleted = 0;",
            [id],
            |row| row.get::<_, Option<ProjectId>>(0),
        )
        .optional()?;
    Ok(pointer)
}

fn load_members(conn: &Connection, project_id: ProjectId) -> GatewayResult<Vec<Employee>> {
    let mut stmt = conn.prepare(&format!(
        "{MEMBER_SELECT_SQL}
         WHERE pp.project_id = ?1
           AND e.is_deleted = 0
         ORDER BY pp.rowid ASC;"
    ))?;
    let mut rows = stmt.query([project_id])?;
    let mut members = Vec::new();
    while let Some(row) = rows.next()? {
        members.push(parse_employee_row(row)?);
    }
    Ok(members)
}

fn attach_members(conn: &Connection, projects: &mut [Project]) -> GatewayResult<()> {
    let wanted: HashSet<ProjectId> = projects.iter().map(|project| project.id).collect();
    let mut stmt = conn.prepare(&format!(
        "{MEMBER_SELECT_SQL}
         WHERE e.is_deleted = 0
         ORDER BY pp.rowid ASC;"
    ))?;
    let mut rows = stmt.query([])?;
    let mut by_project: HashMap<ProjectId, Vec<Employee>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let project_id: ProjectId = row.get("project_id")?;
        if wanted.contains(&project_id) {
            by_project
                .entry(project_id)
                .or_default()
                .push(parse_employee_row(row)?);
        }
    }
    for project in projects {
        project.employees = by_project.remove(&project.id).unwrap_or_default();
    }
    Ok(())
}

fn assignment_context(
    conn: &Connection,
    project: &Project,
    employee_id: EmployeeId,
) -> GatewayResult<AssignmentContext> {
    let top_level_assignments: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM project_participants pp
         INNER JOIN projects p ON p.id = pp.project_id
         WHERE pp.employee_id = ?1
           AND p.parent_project_id IS NULL
           AND p.is_deleted = 0;",
        [employee_id],
        |row| row.get(0),
    )?;
    let mut context = AssignmentContext {
        top_level_assignments: parse_count(top_level_assignments, "top-level assignments")?,
        ..AssignmentContext::default()
    };

    if project.parent_project_id.is_none() {
        return Ok(context);
    }
    let Some(top_id) = top_level_ancestor(conn, project.id)? else {
        return Ok(context);
    };

    let in_top: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM project_participants
            WHERE project_id = ?1
              AND employee_id = ?2
        );",
        params![top_id, employee_id],
        |row| row.get(0),
    )?;
    let in_subprojects: i64 = conn.query_row(
        &format!(
            "{SUBTREE_CTE_SQL}
             SELECT COUNT(*)
             FROM project_participants pp
             INNER JOIN subtree s ON s.id = pp.project_id
             WHERE pp.employee_id = ?2
               AND pp.project_id <> ?1;"
        ),
        params![top_id, employee_id],
        |row| row.get(0),
    )?;

    context.in_top_level_project = in_top == 1;
    context.subproject_assignments = parse_count(in_subprojects, "subproject assignments")?;
    Ok(context)
}

fn parse_count(value: i64, what: &str) -> GatewayResult<usize> {
    usize::try_from(value)
        .map_err(|_| DbError::InvalidData(format!("{what} count out of range: {value}")).into())
}

/// Walks parent pointers up to the root. `None` when the chain is broken
/// or loops.
fn top_level_ancestor(conn: &Connection, id: ProjectId) -> GatewayResult<Option<ProjectId>> {
    let mut visited = HashSet::new();
    let mut current = id;
    loop {
        if !visited.insert(current) {
            return Ok(None);
        }
        match parent_pointer(conn, current)? {
            None => return Ok(None),
            Some(None) => return Ok(Some(current)),
            Some(Some(parent)) => current = parent,
        }
    }
}

fn query_employees<P: Params>(conn: &Connection, sql: &str, params: P) -> GatewayResult<Vec<Employee>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_employee_row(row)?);
    }
    Ok(items)
}

fn query_projects<P: Params>(conn: &Connection, sql: &str, params: P) -> GatewayResult<Vec<Project>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_project_row(row)?);
    }
    Ok(items)
}

fn parse_employee_row(row: &Row<'_>) -> GatewayResult<Employee> {
    let rank_value: i64 = row.get("rank")?;
    let rank = EmployeeRank::try_from(rank_value)
        .map_err(|err| DbError::InvalidData(format!("{err} in employees.rank")))?;
    Ok(Employee {
        id: row.get("id")?,
        name: row.get("name")?,
        rank,
        registered_at: row.get("registered_at")?,
    })
}

fn parse_project_row(row: &Row<'_>) -> GatewayResult<Project> {
    let capacity_value: i64 = row.get("max_participants")?;
    let max_participants = parse_capacity(capacity_value)
        .map_err(|err| DbError::InvalidData(format!("{err} in projects.max_participants")))?;
    Ok(Project {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        parent_project_id: row.get("parent_project_id")?,
        max_participants,
        created_at: row.get("created_at")?,
        employees: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::parse_count;
    use crate::db::DbError;
    use crate::gateway::{GatewayError, TransportFailure};

    #[test]
    fn negative_counts_are_invalid_data() {
        assert_eq!(parse_count(3, "top-level assignments").unwrap(), 3);
        let err = parse_count(-1, "subproject assignments").unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Transport(TransportFailure::Storage(DbError::InvalidData(ref message)))
                if message.contains("subproject assignments")
        ));
    }
}
