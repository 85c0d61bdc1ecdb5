//! Board view and ticket commands: `flowboard board|show|move|create|edit`.

use anyhow::{Result, anyhow, bail};
use console::style;

use flowboard::board::gesture::resolve_column;
use flowboard::board::models::{EpicId, IterationId, NewTicket, ProjectId, StateId, Ticket, TicketId};
use flowboard::board::registry::epic_color;
use flowboard::board::{Board, BoardSnapshot, DropTarget, MoveOutcome};
use flowboard::config::FlowboardConfig;

use super::{open_session, print_json};
use crate::Cli;

/// Field changes requested on the command line. `Some(None)` clears a field.
#[derive(Debug, Default)]
pub struct TicketEdit {
    pub title: Option<String>,
    pub priority: Option<String>,
    pub iteration: Option<Option<i64>>,
    pub epic: Option<Option<i64>>,
}

impl TicketEdit {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.priority.is_none()
            && self.iteration.is_none()
            && self.epic.is_none()
    }

    fn apply(self, ticket: &mut Ticket) {
        if let Some(title) = self.title {
            ticket.request_title = title;
        }
        if let Some(priority) = self.priority {
            ticket.priority = Some(priority);
        }
        if let Some(iteration) = self.iteration {
            ticket.iteration_id = iteration.map(IterationId);
        }
        if let Some(epic) = self.epic {
            ticket.epic_id = epic.map(EpicId);
        }
    }
}

/// Fields of a ticket created from the command line.
#[derive(Debug, Default)]
pub struct TicketDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub iteration: Option<i64>,
    pub epic: Option<i64>,
}

impl TicketDraft {
    fn into_new_ticket(self, project_id: ProjectId, state_id: StateId) -> NewTicket {
        let mut ticket = NewTicket::new(project_id, state_id, self.title.trim());
        ticket.request_description = self.description;
        ticket.priority = self.priority;
        ticket.iteration_id = self.iteration.map(IterationId);
        ticket.epic_id = self.epic.map(EpicId);
        ticket
    }
}

pub async fn cmd_board(
    cli: &Cli,
    config: &FlowboardConfig,
    iteration: Option<i64>,
    epic: Option<i64>,
) -> Result<()> {
    let session = open_session(cli, config).await?;
    session.set_iteration(iteration.map(IterationId)).await?;
    session.set_epic(epic.map(EpicId)).await?;
    // Labels need the registries; the background load may still be running.
    session.refresh_registries().await?;
    let snapshot = session.snapshot().await;
    session.close().await;

    if cli.json {
        return print_json(&snapshot);
    }
    print_board(&snapshot);
    Ok(())
}

fn print_board(snapshot: &BoardSnapshot) {
    println!();
    println!(
        "{} {}",
        style(&snapshot.project.name).bold().cyan(),
        style(format!("({})", snapshot.project.short_name)).dim()
    );
    if !snapshot.filter.is_empty() {
        let mut parts = Vec::new();
        if let Some(id) = snapshot.filter.iteration {
            parts.push(format!("iteration {}", iteration_name(snapshot, id)));
        }
        if let Some(id) = snapshot.filter.epic {
            parts.push(format!("epic {}", epic_name(snapshot, id)));
        }
        println!("{}", style(format!("Filtered by {}", parts.join(", "))).dim());
    }
    println!();

    for (state, tickets) in snapshot.board.iter_columns() {
        println!(
            "{} {}",
            style(&state.state_name).bold(),
            style(format!("[{}]", tickets.len())).dim()
        );
        if tickets.is_empty() {
            println!("  {}", style("(empty)").dim());
        }
        for ticket in tickets {
            println!("  {}", ticket_line(snapshot, ticket));
        }
        println!();
    }
}

fn ticket_line(snapshot: &BoardSnapshot, ticket: &Ticket) -> String {
    let mut line = format!("{} {}", style(format!("#{}", ticket.id)).yellow(), ticket.request_title);
    if let Some(priority) = &ticket.priority {
        line.push_str(&format!(" {}", style(format!("!{}", priority)).red()));
    }
    if let Some(id) = ticket.iteration_id {
        line.push_str(&format!(" {}", style(format!("@{}", iteration_name(snapshot, id))).dim()));
    }
    if let Some(id) = ticket.epic_id {
        line.push_str(&format!(
            " {}",
            style(format!("[{} {}]", epic_name(snapshot, id), epic_color(id))).magenta()
        ));
    }
    if let Some(assignee) = &ticket.assign_user_name {
        line.push_str(&format!(" {}", style(format!("→ {}", assignee)).dim()));
    }
    line
}

fn iteration_name(snapshot: &BoardSnapshot, id: IterationId) -> String {
    snapshot
        .iterations
        .iter()
        .find(|i| i.id == Some(id))
        .map(|i| i.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn epic_name(snapshot: &BoardSnapshot, id: EpicId) -> String {
    snapshot
        .epics
        .iter()
        .find(|e| e.id == Some(id))
        .map(|e| e.name.clone())
        .unwrap_or_else(|| id.to_string())
}

pub async fn cmd_show(cli: &Cli, config: &FlowboardConfig, ticket: i64) -> Result<()> {
    let session = open_session(cli, config).await?;
    session.select_ticket(TicketId(ticket)).await?;
    let detail = session.detail().await;
    session.close().await;
    let ticket = detail.ok_or_else(|| anyhow!("Ticket {} disappeared from the board", ticket))?;

    if cli.json {
        return print_json(&ticket);
    }
    print_ticket(&ticket);
    Ok(())
}

fn print_ticket(ticket: &Ticket) {
    println!();
    println!(
        "{} {}",
        style(format!("#{}", ticket.id)).yellow().bold(),
        style(&ticket.request_title).bold()
    );
    let state = ticket
        .current_state_name
        .clone()
        .unwrap_or_else(|| format!("state {}", ticket.current_state_id));
    println!("  State:     {}", state);
    if let Some(priority) = &ticket.priority {
        println!("  Priority:  {}", priority);
    }
    if let Some(assignee) = &ticket.assign_user_name {
        println!("  Assignee:  {}", assignee);
    }
    if let Some(id) = ticket.iteration_id {
        println!("  Iteration: {}", id);
    }
    if let Some(id) = ticket.epic_id {
        println!("  Epic:      {}", id);
    }
    if let Some(modified) = ticket.modified_at {
        println!("  Modified:  {}", modified.format("%Y-%m-%d %H:%M"));
    }
    if let Some(description) = &ticket.request_description {
        println!();
        println!("{}", description);
    }
    println!();
}

/// Resolve a move target: `state:<id>`, `ticket:<id>`, or a column name.
fn parse_target(board: &Board, target: &str) -> Result<StateId> {
    if let Ok(drop) = target.parse::<DropTarget>() {
        return resolve_column(board, drop)
            .ok_or_else(|| anyhow!("'{}' is not a column on this board", target));
    }
    board
        .columns()
        .iter()
        .find(|s| s.state_name.eq_ignore_ascii_case(target.trim()))
        .map(|s| s.id)
        .ok_or_else(|| {
            let names: Vec<&str> = board.columns().iter().map(|s| s.state_name.as_str()).collect();
            anyhow!("Unknown column '{}'. Columns: {}", target, names.join(", "))
        })
}

pub async fn cmd_move(cli: &Cli, config: &FlowboardConfig, ticket: i64, target: &str) -> Result<()> {
    let session = open_session(cli, config).await?;
    let ticket_id = TicketId(ticket);
    let board = session.board().await;

    let Some(from) = board.locate(ticket_id) else {
        session.close().await;
        bail!("Ticket {} is not on this board", ticket);
    };
    let to = match parse_target(&board, target) {
        Ok(to) => to,
        Err(e) => {
            session.close().await;
            return Err(e);
        }
    };
    if from == to {
        session.close().await;
        println!("Ticket #{} is already in {}", ticket, column_name(&board, to));
        return Ok(());
    }

    let outcome = session.reconcile_move(ticket_id, from, to).await;
    session.close().await;
    match outcome? {
        MoveOutcome::Confirmed(saved) => {
            if cli.json {
                return print_json(&saved);
            }
            println!(
                "{} #{} {} → {}",
                style("Moved").green().bold(),
                ticket,
                column_name(&board, from),
                column_name(&board, saved.current_state_id)
            );
            Ok(())
        }
        MoveOutcome::Reloaded { cause } => Err(anyhow::Error::new(cause)
            .context(format!("Server rejected moving ticket #{}", ticket))),
    }
}

fn column_name(board: &Board, state_id: StateId) -> String {
    board
        .state(state_id)
        .map(|s| s.state_name.clone())
        .unwrap_or_else(|| format!("state {}", state_id))
}

pub async fn cmd_create(
    cli: &Cli,
    config: &FlowboardConfig,
    column: Option<&str>,
    draft: TicketDraft,
) -> Result<()> {
    if draft.title.trim().is_empty() {
        bail!("A ticket needs a non-empty --title");
    }
    let session = open_session(cli, config).await?;
    let board = session.board().await;
    let state_id = match column {
        Some(target) => parse_target(&board, target),
        None => board
            .columns()
            .first()
            .map(|s| s.id)
            .ok_or_else(|| anyhow!("This board has no columns")),
    };
    let state_id = match state_id {
        Ok(id) => id,
        Err(e) => {
            session.close().await;
            return Err(e);
        }
    };

    let ticket = draft.into_new_ticket(session.project().id, state_id);
    let result = session.create_ticket(ticket).await;
    session.close().await;
    let created = result?;

    if cli.json {
        return print_json(&created);
    }
    println!(
        "{} #{} {} in {}",
        style("Created").green().bold(),
        created.id,
        created.request_title,
        column_name(&board, state_id)
    );
    Ok(())
}

pub async fn cmd_edit(
    cli: &Cli,
    config: &FlowboardConfig,
    ticket: i64,
    edit: TicketEdit,
) -> Result<()> {
    if edit.is_empty() {
        bail!("Nothing to change. Pass --title, --priority, --iteration or --epic");
    }
    let session = open_session(cli, config).await?;
    let ticket_id = TicketId(ticket);
    let Some(mut edited) = session.board().await.find(ticket_id).cloned() else {
        session.close().await;
        bail!("Ticket {} is not on this board", ticket);
    };
    edit.apply(&mut edited);

    let result = session.edit_ticket(edited).await;
    session.close().await;
    let saved = result?;

    if cli.json {
        return print_json(&saved);
    }
    println!("{} #{} {}", style("Saved").green().bold(), saved.id, saved.request_title);
    Ok(())
}
