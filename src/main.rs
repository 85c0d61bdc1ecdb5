use anyhow::Result;
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use flowboard::config::FlowboardConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "flowboard")]
#[command(version, about = "Kanban board client for ticket workflows")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine-readable JSON instead of formatted output
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to flowboard.toml. Defaults to ./flowboard.toml, then the user config directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server root URL. Overrides FLOWBOARD_BASE_URL and the config file
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Access token. Overrides FLOWBOARD_TOKEN
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Project id or short name. Defaults to [board] default_project
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the project board, one section per workflow state
    Board {
        /// Only tickets in this iteration
        #[arg(long)]
        iteration: Option<i64>,
        /// Only tickets in this epic
        #[arg(long)]
        epic: Option<i64>,
    },
    /// Show one ticket
    Show { ticket: i64 },
    /// Move a ticket to another column
    Move {
        ticket: i64,
        /// Column name, `state:<id>`, or `ticket:<id>` to join that ticket's column
        target: String,
    },
    /// Create a ticket in a column
    Create {
        /// Column name, `state:<id>`, or `ticket:<id>`. Defaults to the first column
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        iteration: Option<i64>,
        #[arg(long)]
        epic: Option<i64>,
    },
    /// Edit ticket fields
    Edit {
        ticket: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long, conflicts_with = "no_iteration")]
        iteration: Option<i64>,
        /// Remove the ticket from its iteration
        #[arg(long)]
        no_iteration: bool,
        #[arg(long, conflicts_with = "no_epic")]
        epic: Option<i64>,
        /// Remove the ticket from its epic
        #[arg(long)]
        no_epic: bool,
    },
    /// List or manage project iterations
    Iterations {
        #[command(subcommand)]
        command: Option<IterationCommands>,
    },
    /// List or manage project epics
    Epics {
        #[command(subcommand)]
        command: Option<EpicCommands>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum IterationCommands {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Start date, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// End date, YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
    },
    Close {
        id: i64,
    },
}

#[derive(Subcommand, Clone)]
pub enum EpicCommands {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    Show,
    Validate,
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("FLOWBOARD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "flowboard=debug,info"
        } else {
            "flowboard=warn,warn"
        })
    });

    let format = env::var("FLOWBOARD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = FlowboardConfig::load(cli.config.clone())?
        .with_cli_args(cli.base_url.clone(), cli.token.clone());

    match &cli.command {
        Commands::Board { iteration, epic } => {
            cmd::cmd_board(&cli, &config, *iteration, *epic).await?;
        }
        Commands::Show { ticket } => cmd::cmd_show(&cli, &config, *ticket).await?,
        Commands::Move { ticket, target } => {
            cmd::cmd_move(&cli, &config, *ticket, target).await?;
        }
        Commands::Create {
            column,
            title,
            description,
            priority,
            iteration,
            epic,
        } => {
            let draft = cmd::TicketDraft {
                title: title.clone(),
                description: description.clone(),
                priority: priority.clone(),
                iteration: *iteration,
                epic: *epic,
            };
            cmd::cmd_create(&cli, &config, column.as_deref(), draft).await?;
        }
        Commands::Edit {
            ticket,
            title,
            priority,
            iteration,
            no_iteration,
            epic,
            no_epic,
        } => {
            let edit = cmd::TicketEdit {
                title: title.clone(),
                priority: priority.clone(),
                iteration: if *no_iteration {
                    Some(None)
                } else {
                    iteration.map(Some)
                },
                epic: if *no_epic { Some(None) } else { epic.map(Some) },
            };
            cmd::cmd_edit(&cli, &config, *ticket, edit).await?;
        }
        Commands::Iterations { command } => {
            cmd::cmd_iterations(&cli, &config, command.clone()).await?;
        }
        Commands::Epics { command } => cmd::cmd_epics(&cli, &config, command.clone()).await?,
        Commands::Config { command } => cmd::cmd_config(&cli, &config, command.clone())?,
    }

    Ok(())
}
