//! Optimistic ticket moves.
//!
//! A move is applied to the local board and announced before the state
//! update request is sent. The server's answer either confirms it (its copy
//! of the ticket is merged in) or rejects it, in which case the whole board
//! is reloaded. There is no inverse patch.

use super::events::{BoardEvent, broadcast_event};
use super::models::{StateId, Ticket, TicketId};
use super::session::BoardSession;
use crate::errors::{BoardError, BoardResult};

#[derive(Debug)]
pub enum MoveOutcome {
    /// The server accepted the move; holds its copy of the ticket.
    Confirmed(Ticket),
    /// The server refused the move; the board was reloaded.
    Reloaded { cause: BoardError },
}

impl MoveOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

impl BoardSession {
    /// Move a ticket to another column and sync the change to the server.
    ///
    /// Errors are returned only when the move cannot start (unknown ticket or
    /// column, closed session) or the session closes before the answer lands.
    /// Server rejections are reported through [`MoveOutcome::Reloaded`].
    ///
    /// Holds the session turn until the answer is merged or the reload ends,
    /// so answers apply in request order and a queued reload sees the move.
    pub async fn reconcile_move(
        &self,
        ticket_id: TicketId,
        source: StateId,
        target: StateId,
    ) -> BoardResult<MoveOutcome> {
        let _turn = self.turns.lock().await;
        {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            if !state.board.contains_state(target) {
                return Err(BoardError::UnknownState { state_id: target });
            }
            let from = state
                .board
                .locate(ticket_id)
                .ok_or(BoardError::UnknownTicket { ticket_id })?;
            if from != source {
                tracing::debug!(%ticket_id, %source, actual = %from, "move source out of date");
            }
            state.board.move_ticket(ticket_id, from, target);
            state.touch();
            broadcast_event(
                &self.events,
                BoardEvent::TicketMoved {
                    ticket_id,
                    from,
                    to: target,
                },
            );
        }

        match self.fetcher.update_ticket_state(ticket_id, target).await {
            Ok(ticket) => {
                let mut state = self.state.lock().await;
                state.ensure_open()?;
                state.board.merge_ticket(ticket.clone());
                state.touch();
                broadcast_event(
                    &self.events,
                    BoardEvent::MoveConfirmed {
                        ticket: ticket.clone(),
                    },
                );
                Ok(MoveOutcome::Confirmed(ticket))
            }
            Err(cause) => {
                tracing::warn!(%ticket_id, to = %target, error = %cause, "move rejected, reloading board");
                {
                    let state = self.state.lock().await;
                    state.ensure_open()?;
                    broadcast_event(
                        &self.events,
                        BoardEvent::MoveRejected {
                            ticket_id,
                            error: cause.to_string(),
                        },
                    );
                }
                match self.reload_in_turn().await {
                    Ok(_) => {}
                    Err(BoardError::SessionClosed) => return Err(BoardError::SessionClosed),
                    // LoadFailed has been published; the move outcome stands.
                    Err(e) => tracing::warn!(error = %e, "reload after rejected move failed"),
                }
                Ok(MoveOutcome::Reloaded { cause })
            }
        }
    }
}
