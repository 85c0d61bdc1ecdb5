//! Board indexing: partitions a ticket set into workflow-state buckets.
//!
//! The workflow's state list is the authoritative key set. Tickets pointing at
//! a state the workflow does not know cannot be rendered in any column and are
//! dropped at build time.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use super::models::{StateId, Ticket, TicketId, WorkflowState};

/// Tickets bucketed by workflow state, plus the column rendering order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Board {
    columns: Vec<WorkflowState>,
    buckets: BTreeMap<StateId, Vec<Ticket>>,
}

/// Order states for column rendering: initial states first, final states
/// last, the rest in between. Stable, so ties keep workflow order.
pub fn ordered_states(states: &[WorkflowState]) -> Vec<WorkflowState> {
    let mut ordered = states.to_vec();
    ordered.sort_by_key(|s| match (s.is_initial, s.is_final) {
        (true, _) => 0,
        (false, false) => 1,
        (false, true) => 2,
    });
    ordered
}

/// Build a board from a complete ticket set.
///
/// Every state gets a bucket, empty or not. Fetch order is preserved within
/// each bucket.
pub fn build_board(tickets: Vec<Ticket>, states: &[WorkflowState]) -> Board {
    let columns = ordered_states(states);
    let mut buckets: BTreeMap<StateId, Vec<Ticket>> =
        columns.iter().map(|s| (s.id, Vec::new())).collect();

    let mut dropped = 0usize;
    for ticket in tickets {
        match buckets.get_mut(&ticket.current_state_id) {
            Some(bucket) => bucket.push(ticket),
            None => {
                tracing::warn!(
                    ticket_id = %ticket.id,
                    state_id = %ticket.current_state_id,
                    "dropping ticket with unknown workflow state"
                );
                dropped += 1;
            }
        }
    }

    let board = Board { columns, buckets };
    tracing::debug!(
        columns = board.columns.len(),
        tickets = board.len(),
        dropped,
        "board indexed"
    );
    board
}

impl Board {
    /// Columns in rendering order.
    pub fn columns(&self) -> &[WorkflowState] {
        &self.columns
    }

    pub fn state(&self, state_id: StateId) -> Option<&WorkflowState> {
        self.columns.iter().find(|s| s.id == state_id)
    }

    pub fn contains_state(&self, state_id: StateId) -> bool {
        self.buckets.contains_key(&state_id)
    }

    pub fn bucket(&self, state_id: StateId) -> &[Ticket] {
        self.buckets
            .get(&state_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn buckets(&self) -> &BTreeMap<StateId, Vec<Ticket>> {
        &self.buckets
    }

    /// Buckets in column order, paired with their state.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&WorkflowState, &[Ticket])> {
        self.columns.iter().map(|s| (s, self.bucket(s.id)))
    }

    /// Total number of tickets across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bucket currently holding `ticket_id`.
    pub fn locate(&self, ticket_id: TicketId) -> Option<StateId> {
        self.buckets
            .iter()
            .find(|(_, tickets)| tickets.iter().any(|t| t.id == ticket_id))
            .map(|(state_id, _)| *state_id)
    }

    pub fn find(&self, ticket_id: TicketId) -> Option<&Ticket> {
        self.buckets
            .values()
            .flat_map(|tickets| tickets.iter())
            .find(|t| t.id == ticket_id)
    }

    pub fn ticket_ids(&self) -> HashSet<TicketId> {
        self.buckets
            .values()
            .flat_map(|tickets| tickets.iter().map(|t| t.id))
            .collect()
    }

    /// Move a ticket between buckets.
    ///
    /// Removes the ticket from `from` (falling back to whichever bucket holds
    /// it), rewrites its state, and appends it to `to`. A ticket already in
    /// `to` is replaced in place, so repeating the call is a no-op. Returns
    /// false when the target state or the ticket is unknown.
    pub fn move_ticket(&mut self, ticket_id: TicketId, from: StateId, to: StateId) -> bool {
        if !self.buckets.contains_key(&to) {
            tracing::warn!(%ticket_id, state_id = %to, "move target is not a board column");
            return false;
        }

        let state_name = self.state(to).map(|s| s.state_name.clone());

        if let Some(existing) = self
            .buckets
            .get_mut(&to)
            .and_then(|bucket| bucket.iter_mut().find(|t| t.id == ticket_id))
        {
            existing.current_state_id = to;
            existing.current_state_name = state_name;
            return true;
        }

        let removed = match self.take_from(from, ticket_id) {
            Some(ticket) => Some(ticket),
            None => self
                .locate(ticket_id)
                .and_then(|held_in| self.take_from(held_in, ticket_id)),
        };

        let Some(mut ticket) = removed else {
            tracing::debug!(%ticket_id, "move skipped: ticket not on board");
            return false;
        };

        ticket.current_state_id = to;
        ticket.current_state_name = state_name;
        self.buckets.entry(to).or_default().push(ticket);
        true
    }

    /// Replace a ticket wherever it currently sits. Bucket membership is left
    /// unchanged even if `ticket.current_state_id` disagrees.
    pub fn update_ticket(&mut self, ticket: Ticket) -> bool {
        for bucket in self.buckets.values_mut() {
            if let Some(existing) = bucket.iter_mut().find(|t| t.id == ticket.id) {
                *existing = ticket;
                return true;
            }
        }
        false
    }

    /// Apply a ticket the server considers authoritative: move it to the
    /// bucket of its reported state when needed, then replace its fields.
    pub fn merge_ticket(&mut self, ticket: Ticket) -> bool {
        let Some(held_in) = self.locate(ticket.id) else {
            return false;
        };
        if held_in != ticket.current_state_id
            && !self.move_ticket(ticket.id, held_in, ticket.current_state_id)
        {
            return false;
        }
        self.update_ticket(ticket)
    }

    fn take_from(&mut self, state_id: StateId, ticket_id: TicketId) -> Option<Ticket> {
        let bucket = self.buckets.get_mut(&state_id)?;
        let index = bucket.iter().position(|t| t.id == ticket_id)?;
        Some(bucket.remove(index))
    }

    /// Build a board with the same columns and the given buckets. Used by the
    /// filter engine; bucket keys must match this board's columns.
    pub(crate) fn with_buckets(&self, buckets: BTreeMap<StateId, Vec<Ticket>>) -> Board {
        Board {
            columns: self.columns.clone(),
            buckets,
        }
    }
}
