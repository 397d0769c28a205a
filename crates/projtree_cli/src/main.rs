//! Operator console over the SQLite-backed project service.
//!
//! # Responsibility
//! - Map subcommands onto `ProjectWorkspace` operations.
//! - Ask the operator before overriding capacity or rank quotas.

use clap::{Args, Parser, Subcommand};
use log::info;
use projtree_core::{
    init_logging, open_db, AdmissionOutcome, CoreConfig, EmployeeDraft, EmployeeRank,
    ProjectDraft, ProjectGateway, ProjectTreeNode, ProjectWorkspace, SqliteProjectGateway,
};
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "projtree")]
#[command(about = "Project hierarchy and participant console")]
#[command(version)]
struct Cli {
    /// Database file; overrides PROJTREE_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the project forest with participant counts.
    Tree,
    Employee {
        #[command(subcommand)]
        command: EmployeeCommand,
    },
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Add an employee to a project.
    Assign {
        project_id: i64,
        employee_id: i64,
        /// Ignore capacity and rank quotas.
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Answer the override prompt with yes.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Remove an employee from a project.
    Unassign { project_id: i64, employee_id: i64 },
}

#[derive(Subcommand)]
enum EmployeeCommand {
    List,
    Add(EmployeeArgs),
    Update {
        id: i64,
        #[command(flatten)]
        fields: EmployeeArgs,
    },
    Delete { id: i64 },
}

#[derive(Args)]
struct EmployeeArgs {
    #[arg(long)]
    name: String,
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    rank: u8,
}

#[derive(Subcommand)]
enum ProjectCommand {
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        parent: Option<i64>,
        #[arg(long)]
        max: u32,
    },
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, conflicts_with = "root")]
        parent: Option<i64>,
        /// Move the project to the root level.
        #[arg(long, default_value_t = false)]
        root: bool,
        #[arg(long)]
        max: Option<u32>,
    },
    /// Delete a project and its whole subtree.
    Delete { id: i64 },
    /// Print one project's subtree with participants.
    Show { id: i64 },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let mut config = CoreConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    init_logging(&config.log_level, config.log_dir.as_deref())?;
    info!(
        "event=cli_start module=cli status=ok db_path={}",
        config.db_path.display()
    );

    let conn = open_db(&config.db_path)?;
    let gateway = SqliteProjectGateway::try_new(&conn)?;
    let mut workspace = ProjectWorkspace::new(gateway).with_page_limit(config.page_limit);
    workspace.refresh()?;

    match cli.command {
        Command::Tree => print_tree(&workspace),
        Command::Employee { command } => run_employee(&mut workspace, command)?,
        Command::Project { command } => run_project(&mut workspace, command)?,
        Command::Assign {
            project_id,
            employee_id,
            force,
            yes,
        } => assign(&mut workspace, project_id, employee_id, force, yes)?,
        Command::Unassign {
            project_id,
            employee_id,
        } => {
            workspace.remove_participant(project_id, employee_id)?;
            println!("removed employee {employee_id} from project {project_id}");
        }
    }
    Ok(())
}

fn run_employee<G: ProjectGateway>(
    workspace: &mut ProjectWorkspace<G>,
    command: EmployeeCommand,
) -> CliResult<()> {
    match command {
        EmployeeCommand::List => {
            for employee in workspace.employees() {
                println!(
                    "{:>4}  rank {}  {}  (registered {})",
                    employee.id, employee.rank, employee.name, employee.registered_at
                );
            }
        }
        EmployeeCommand::Add(args) => {
            let created = workspace.create_employee(&employee_draft(args)?)?;
            println!("created employee {} ({})", created.id, created.name);
        }
        EmployeeCommand::Update { id, fields } => {
            let updated = workspace.update_employee(id, &employee_draft(fields)?)?;
            println!("updated employee {} ({})", updated.id, updated.name);
        }
        EmployeeCommand::Delete { id } => {
            workspace.delete_employee(id)?;
            println!("deleted employee {id}");
        }
    }
    Ok(())
}

fn employee_draft(args: EmployeeArgs) -> CliResult<EmployeeDraft> {
    Ok(EmployeeDraft::new(args.name, EmployeeRank::try_from(args.rank)?))
}

fn run_project<G: ProjectGateway>(
    workspace: &mut ProjectWorkspace<G>,
    command: ProjectCommand,
) -> CliResult<()> {
    match command {
        ProjectCommand::Add {
            title,
            description,
            parent,
            max,
        } => {
            let draft = ProjectDraft::new(title, max)
                .with_description(description)
                .with_parent(parent);
            let created = workspace.create_project(&draft)?;
            println!("created project {} ({})", created.id, created.title);
        }
        ProjectCommand::Update {
            id,
            title,
            description,
            parent,
            root,
            max,
        } => {
            let draft = workspace.begin_edit(id)?;
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(description) = description {
                draft.description = description;
            }
            if root {
                draft.parent_project_id = None;
            } else if parent.is_some() {
                draft.parent_project_id = parent;
            }
            if let Some(max) = max {
                draft.max_participants = max;
            }
            let saved = workspace.save_edit(id)?;
            println!("updated project {} ({})", saved.id, saved.title);
        }
        ProjectCommand::Delete { id } => {
            let removed = workspace.delete_project(id)?;
            println!("deleted {} project(s): {removed:?}", removed.len());
        }
        ProjectCommand::Show { id } => {
            workspace.toggle(id)?;
            if let Some(node) = workspace.node_state(id) {
                print_node(node.detail(), 0, true);
            }
        }
    }
    Ok(())
}

fn assign<G: ProjectGateway>(
    workspace: &mut ProjectWorkspace<G>,
    project_id: i64,
    employee_id: i64,
    force: bool,
    yes: bool,
) -> CliResult<()> {
    if force {
        let members = workspace.add_participant(
            project_id,
            employee_id,
            projtree_core::AddMode::Forced,
        )?;
        println!("project {project_id} now has {} participant(s)", members.len());
        return Ok(());
    }

    let outcome = workspace.add_participant_with_confirmation(project_id, employee_id, |detail| {
        yes || prompt_override(detail)
    })?;
    match outcome {
        AdmissionOutcome::Added(members) => {
            println!("project {project_id} now has {} participant(s)", members.len());
        }
        AdmissionOutcome::Declined { detail } => {
            println!("not assigned: {detail}");
        }
    }
    Ok(())
}

fn prompt_override(detail: &str) -> bool {
    print!("{detail}. Assign anyway? [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_tree<G: ProjectGateway>(workspace: &ProjectWorkspace<G>) {
    let forest = workspace.forest();
    for root in &forest.roots {
        print_node(root, 0, false);
    }
    for diagnostic in &forest.diagnostics {
        eprintln!("warning: {diagnostic}");
    }
}

fn print_node(node: &ProjectTreeNode, depth: usize, with_members: bool) {
    let project = &node.project;
    println!(
        "{:indent$}{} {} [{}/{}]",
        "",
        project.id,
        project.title,
        project.participant_count(),
        project.max_participants,
        indent = depth * 2
    );
    if with_members {
        for employee in &project.employees {
            println!(
                "{:indent$}- {} {} (rank {})",
                "",
                employee.id,
                employee.name,
                employee.rank,
                indent = depth * 2 + 2
            );
        }
    }
    for child in &node.children {
        print_node(child, depth + 1, with_members);
    }
}
