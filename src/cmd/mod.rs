//! CLI command implementations.
//!
//! | Module     | Commands handled                  |
//! |------------|-----------------------------------|
//! | `board`    | `Board`, `Show`, `Move`, `Create`, `Edit` |
//! | `registry` | `Iterations`, `Epics`             |
//! | `config`   | `Config`                          |

pub mod board;
pub mod config;
pub mod registry;

pub use board::{TicketDraft, TicketEdit, cmd_board, cmd_create, cmd_edit, cmd_move, cmd_show};
pub use config::cmd_config;
pub use registry::{cmd_epics, cmd_iterations};

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use flowboard::board::models::ProjectRef;
use flowboard::board::{BoardApi, BoardSession, HttpBoardApi};
use flowboard::config::FlowboardConfig;

use crate::Cli;

/// Project named on the command line, else the configured default.
pub fn project_ref(cli: &Cli, config: &FlowboardConfig) -> Result<ProjectRef> {
    let Some(reference) = cli
        .project
        .clone()
        .or_else(|| config.toml.board.default_project.clone())
    else {
        bail!("No project given. Pass --project or set [board] default_project in flowboard.toml");
    };
    let Ok(project) = reference.parse::<ProjectRef>();
    Ok(project)
}

pub fn connect(config: &FlowboardConfig) -> Result<Arc<dyn BoardApi>> {
    let api = HttpBoardApi::new(config.session_context()?, config.timeout())
        .context("Failed to set up server connection")?;
    Ok(Arc::new(api))
}

pub async fn open_session(cli: &Cli, config: &FlowboardConfig) -> Result<BoardSession> {
    let project = project_ref(cli, config)?;
    let api = connect(config)?;
    BoardSession::open(api, config.session_options(), &project)
        .await
        .with_context(|| format!("Failed to open board for project '{}'", project))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
