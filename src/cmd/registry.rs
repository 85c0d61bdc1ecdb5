//! Iteration and epic commands: `flowboard iterations|epics`.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use console::style;

use flowboard::board::BoardApi;
use flowboard::board::models::{Epic, EpicId, Iteration, IterationId, Project};
use flowboard::board::registry::{EpicRegistry, IterationRegistry, IterationStatus, epic_color};
use flowboard::config::FlowboardConfig;

use super::{connect, print_json, project_ref};
use crate::{Cli, EpicCommands, IterationCommands};

async fn resolve_project(
    cli: &Cli,
    config: &FlowboardConfig,
) -> Result<(Project, Arc<dyn BoardApi>)> {
    let reference = project_ref(cli, config)?;
    let api = connect(config)?;
    let project = api
        .find_project(&reference)
        .await
        .with_context(|| format!("Failed to look up project '{}'", reference))?;
    Ok((project, api))
}

/// Parse a `YYYY-MM-DD` date as midnight UTC.
fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD", value))?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub async fn cmd_iterations(
    cli: &Cli,
    config: &FlowboardConfig,
    command: Option<IterationCommands>,
) -> Result<()> {
    let (project, api) = resolve_project(cli, config).await?;
    let registry = IterationRegistry::new(api);

    match command {
        None | Some(IterationCommands::List) => {
            let iterations = registry.list(project.id).await?;
            if cli.json {
                return print_json(&iterations);
            }
            println!();
            println!("{}", style(format!("Iterations of {}", project.name)).bold().cyan());
            println!();
            if iterations.is_empty() {
                println!("  {}", style("(none)").dim());
            }
            let now = Utc::now();
            for iteration in &iterations {
                print_iteration(iteration, now);
            }
            println!();
        }
        Some(IterationCommands::Create {
            name,
            description,
            start,
            end,
        }) => {
            let iteration = Iteration {
                id: None,
                project_id: project.id,
                name,
                description,
                status: None,
                start_date: start.as_deref().map(parse_date).transpose()?,
                end_date: end.as_deref().map(parse_date).transpose()?,
            };
            let saved = registry.create(iteration).await?;
            if cli.json {
                return print_json(&saved);
            }
            println!(
                "{} iteration {}",
                style("Created").green().bold(),
                saved.name
            );
        }
        Some(IterationCommands::Close { id }) => {
            let closed = registry.close(IterationId(id)).await?;
            if cli.json {
                return print_json(&closed);
            }
            println!("{} iteration {}", style("Closed").green().bold(), closed.name);
        }
    }
    Ok(())
}

fn print_iteration(iteration: &Iteration, now: DateTime<Utc>) {
    let status = IterationStatus::at(iteration, now);
    let label = match status {
        IterationStatus::InProgress => style(status.label()).green(),
        IterationStatus::Planned => style(status.label()).cyan(),
        IterationStatus::Completed | IterationStatus::NotScheduled => style(status.label()).dim(),
    };
    let id = iteration
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {:>5}  {:<24} {} → {}  {}",
        id,
        iteration.name,
        format_date(iteration.start_date),
        format_date(iteration.end_date),
        label
    );
}

pub async fn cmd_epics(
    cli: &Cli,
    config: &FlowboardConfig,
    command: Option<EpicCommands>,
) -> Result<()> {
    let (project, api) = resolve_project(cli, config).await?;
    let registry = EpicRegistry::new(api);

    match command {
        None | Some(EpicCommands::List) => {
            let epics = registry.list(project.id).await?;
            if cli.json {
                return print_json(&epics);
            }
            println!();
            println!("{}", style(format!("Epics of {}", project.name)).bold().cyan());
            println!();
            if epics.is_empty() {
                println!("  {}", style("(none)").dim());
            }
            for epic in &epics {
                print_epic(epic);
            }
            println!();
        }
        Some(EpicCommands::Create { name, description }) => {
            let epic = Epic {
                id: None,
                project_id: project.id,
                name,
                description,
                start_date: None,
                end_date: None,
            };
            let saved = registry.create(epic).await?;
            if cli.json {
                return print_json(&saved);
            }
            println!("{} epic {}", style("Created").green().bold(), saved.name);
        }
    }
    Ok(())
}

fn print_epic(epic: &Epic) {
    let (id, color) = match epic.id {
        Some(id) => (id.to_string(), epic_color(id)),
        None => ("-".to_string(), epic_color(EpicId(0))),
    };
    println!("  {:>5}  {:<24} {}", id, epic.name, style(color).dim());
}
