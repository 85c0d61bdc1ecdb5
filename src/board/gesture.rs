//! Pointer gesture resolution for ticket cards.
//!
//! A press on a card starts a drag session; the release decides between
//! opening the ticket (quick tap in place), doing nothing (slow release in
//! place), or moving it to another column.
//!
//! ```text
//!            pointer_down(ticket)
//!   ┌──────┐ ───────────────────> ┌──────────────────────────┐
//!   │ Idle │                      │ Dragging(ticket, start)  │
//!   └──────┘ <─────────────────── └──────────────────────────┘
//!            pointer_up / cancel
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::indexer::Board;
use super::models::{StateId, TicketId};

/// Default press duration separating a tap from a drag.
pub const DEFAULT_CLICK_THRESHOLD: Duration = Duration::from_millis(200);

/// Ephemeral record of an in-progress press on a ticket card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureSession {
    pub ticket_id: TicketId,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GestureState {
    #[default]
    Idle,
    Dragging(GestureSession),
}

/// What the pointer was released over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropTarget {
    Column(StateId),
    /// Dropping onto a card counts as dropping into its column.
    Ticket(TicketId),
}

impl FromStr for DropTarget {
    type Err = String;

    /// Parses `state:<id>` or `ticket:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid drop target '{}': expected state:<id> or ticket:<id>", s))?;
        let id: i64 = id
            .trim()
            .parse()
            .map_err(|_| format!("Invalid drop target id in '{}'", s))?;
        match kind.trim() {
            "state" | "column" => Ok(Self::Column(StateId(id))),
            "ticket" => Ok(Self::Ticket(TicketId(id))),
            other => Err(format!("Invalid drop target kind '{}'", other)),
        }
    }
}

impl fmt::Display for DropTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(id) => write!(f, "state:{}", id),
            Self::Ticket(id) => write!(f, "ticket:{}", id),
        }
    }
}

/// Semantic result of a released gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GestureOutcome {
    /// Released outside any column, released with no active press, or the
    /// ticket disappeared from the board mid-drag.
    Discarded,
    /// Quick release in the source column: open the ticket detail.
    Click { ticket_id: TicketId },
    /// Slow release in the source column: an abandoned reorder.
    NoOp,
    /// Released over a different column.
    Move {
        ticket_id: TicketId,
        from: StateId,
        to: StateId,
    },
}

/// Resolve the column a drop target refers to on the rendered board.
pub fn resolve_column(board: &Board, target: DropTarget) -> Option<StateId> {
    match target {
        DropTarget::Column(state_id) => board.contains_state(state_id).then_some(state_id),
        DropTarget::Ticket(ticket_id) => board.locate(ticket_id),
    }
}

#[derive(Debug, Clone)]
pub struct GestureController {
    threshold: Duration,
    state: GestureState,
}

impl Default for GestureController {
    fn default() -> Self {
        Self::new(DEFAULT_CLICK_THRESHOLD)
    }
}

impl GestureController {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            state: GestureState::Idle,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging(_))
    }

    /// Start a press on a ticket card. A press that arrives while another is
    /// active replaces it.
    pub fn pointer_down(&mut self, ticket_id: TicketId, at: Instant) {
        if let GestureState::Dragging(previous) = self.state {
            tracing::debug!(
                previous = %previous.ticket_id,
                %ticket_id,
                "replacing unfinished gesture"
            );
        }
        self.state = GestureState::Dragging(GestureSession {
            ticket_id,
            started_at: at,
        });
    }

    /// Abandon the active press (escape key, pointer left the board).
    pub fn cancel(&mut self) {
        self.state = GestureState::Idle;
    }

    /// Finish the active press. The session is destroyed whatever the outcome.
    ///
    /// `board` is the board as rendered (the filtered view): the source column
    /// is wherever the card currently sits there.
    pub fn pointer_up(
        &mut self,
        target: Option<DropTarget>,
        board: &Board,
        at: Instant,
    ) -> GestureOutcome {
        let GestureState::Dragging(session) = std::mem::take(&mut self.state) else {
            return GestureOutcome::Discarded;
        };

        let Some(to) = target.and_then(|t| resolve_column(board, t)) else {
            return GestureOutcome::Discarded;
        };
        let Some(from) = board.locate(session.ticket_id) else {
            tracing::debug!(ticket_id = %session.ticket_id, "dragged ticket no longer on board");
            return GestureOutcome::Discarded;
        };

        if from != to {
            return GestureOutcome::Move {
                ticket_id: session.ticket_id,
                from,
                to,
            };
        }

        let elapsed = at.saturating_duration_since(session.started_at);
        if elapsed < self.threshold {
            GestureOutcome::Click {
                ticket_id: session.ticket_id,
            }
        } else {
            GestureOutcome::NoOp
        }
    }
}
