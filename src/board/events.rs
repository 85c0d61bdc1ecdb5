use serde::Serialize;
use tokio::sync::broadcast;

use super::filter::BoardFilter;
use super::models::{StateId, Ticket, TicketId};

/// Capacity of a session's event channel. Slow subscribers lag rather than
/// block mutations.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Board event types ────────────────────────────────────────────────

/// Notifications a board session publishes to its renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum BoardEvent {
    BoardLoaded {
        epoch: u64,
        tickets: usize,
        columns: usize,
    },
    LoadFailed {
        epoch: u64,
        error: String,
    },
    /// Optimistic move applied locally; the server call has not started yet.
    TicketMoved {
        ticket_id: TicketId,
        from: StateId,
        to: StateId,
    },
    MoveConfirmed {
        ticket: Ticket,
    },
    /// The server refused the move; a full reload follows.
    MoveRejected {
        ticket_id: TicketId,
        error: String,
    },
    TicketUpdated {
        ticket: Ticket,
    },
    EditFailed {
        ticket_id: TicketId,
        error: String,
    },
    FiltersChanged {
        filter: BoardFilter,
    },
    DetailOpened {
        ticket_id: TicketId,
    },
    DetailClosed,
    RegistriesRefreshed {
        iterations: usize,
        epics: usize,
    },
    SessionClosed,
}

impl BoardEvent {
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize board event");
                None
            }
        }
    }
}

pub fn broadcast_event(tx: &broadcast::Sender<BoardEvent>, event: BoardEvent) {
    tracing::trace!(?event, "board event");
    let _ = tx.send(event); // Ignore error if no receivers
}
