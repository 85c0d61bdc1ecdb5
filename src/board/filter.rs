//! Filtered board derivation.
//!
//! The filtered board is never mutated on its own: every change goes into
//! the `Board` first and the filtered view is derived again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::indexer::Board;
use super::models::{EpicId, IterationId, Ticket};

/// Iteration/epic selection. `None` means "any".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardFilter {
    pub iteration: Option<IterationId>,
    pub epic: Option<EpicId>,
}

impl BoardFilter {
    pub fn new(iteration: Option<IterationId>, epic: Option<EpicId>) -> Self {
        Self { iteration, epic }
    }

    pub fn is_empty(&self) -> bool {
        self.iteration.is_none() && self.epic.is_none()
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        let iteration_ok = self.iteration.is_none_or(|id| ticket.iteration_id == Some(id));
        let epic_ok = self.epic.is_none_or(|id| ticket.epic_id == Some(id));
        iteration_ok && epic_ok
    }
}

/// Derive the filtered view of `board`. Pure: same inputs, same output,
/// original per-bucket order preserved.
pub fn derive_filtered_board(
    board: &Board,
    iteration: Option<IterationId>,
    epic: Option<EpicId>,
) -> Board {
    let filter = BoardFilter::new(iteration, epic);
    let buckets: BTreeMap<_, Vec<Ticket>> = board
        .buckets()
        .iter()
        .map(|(state_id, tickets)| {
            let kept = tickets
                .iter()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect();
            (*state_id, kept)
        })
        .collect();
    board.with_buckets(buckets)
}

/// Memoized derivation keyed by board revision and selectors.
///
/// Callers bump the revision on every board mutation. Anything else (dialog
/// state, detail selection) leaves the key untouched and reuses the cached
/// view.
#[derive(Debug, Default)]
pub struct FilterEngine {
    key: Option<(u64, BoardFilter)>,
    view: Board,
    recomputations: u64,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn derive(&mut self, board: &Board, revision: u64, filter: BoardFilter) -> &Board {
        let key = (revision, filter);
        if self.key != Some(key) {
            self.view = derive_filtered_board(board, filter.iteration, filter.epic);
            self.key = Some(key);
            self.recomputations += 1;
            tracing::trace!(revision, ?filter, tickets = self.view.len(), "filtered board derived");
        }
        &self.view
    }

    /// Last derived view, if any.
    pub fn current(&self) -> Option<&Board> {
        self.key.map(|_| &self.view)
    }

    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
