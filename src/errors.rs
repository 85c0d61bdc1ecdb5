//! Typed error hierarchy for the board engine.
//!
//! `BoardError` covers every failure the engine can observe:
//! - transport failures (`Network`) and server rejections (`Server`, `Conflict`)
//! - pagination that never reaches the reported total (`PageLimitExceeded`)
//! - session lifecycle (`Cancelled`, `SessionClosed`)
//! - unusable connection settings (`Config`)
//!
//! The CLI layer wraps these in `anyhow` with context.

use thiserror::Error;

use crate::board::models::{ProjectId, StateId, TicketId};

/// Errors from the board engine and its server collaborators.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Connection refused, timeout, or a response body that never arrived.
    #[error("Network error: {0}")]
    Network(String),

    /// 5xx, validation failure, or a response we could not decode.
    #[error("Server error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Server {
        status: Option<u16>,
        message: String,
    },

    /// The requested transition is no longer valid (ticket moved, deleted, or
    /// its state removed from the workflow).
    #[error("Conflict updating ticket {ticket_id}: {message}")]
    Conflict { ticket_id: TicketId, message: String },

    #[error(
        "Server reported {total} tickets but {fetched} distinct tickets arrived after {pages} pages"
    )]
    PageLimitExceeded {
        total: u64,
        fetched: usize,
        pages: u32,
    },

    #[error("Project '{reference}' not found")]
    ProjectNotFound { reference: String },

    #[error("Project {project_id} has no workflow")]
    WorkflowMissing { project_id: ProjectId },

    #[error("Workflow state {state_id} is not part of this board")]
    UnknownState { state_id: StateId },

    #[error("Ticket {ticket_id} is not on this board")]
    UnknownTicket { ticket_id: TicketId },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Board session is closed")]
    SessionClosed,
}

impl BoardError {
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Page-limit violations are a flavour of server error: the server's
    /// reported total disagrees with what it delivered.
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::PageLimitExceeded { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::SessionClosed)
    }
}

pub type BoardResult<T> = Result<T, BoardError>;
