//! The board session: one signed-in user's live view of one project.
//!
//! All board state sits behind a single async mutex. Handlers lock it only
//! for synchronous mutations and release it before any network call, so a
//! move is visible locally before its request leaves the client.
//!
//! Reloads, moves and edits also take a turn on a second mutex that they
//! hold across their server calls. Overlapping handlers queue behind each
//! other, so a reload started during a move fetches only after the move's
//! answer has been merged and its result lands last.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use super::api::BoardApi;
use super::events::{BoardEvent, EVENT_CHANNEL_CAPACITY, broadcast_event};
use super::fetcher::{DEFAULT_PAGE_SIZE, TicketFetcher};
use super::filter::{BoardFilter, FilterEngine};
use super::gesture::{DEFAULT_CLICK_THRESHOLD, DropTarget, GestureController, GestureOutcome};
use super::indexer::{Board, build_board};
use super::models::*;
use super::registry::{EpicRegistry, IterationRegistry, RegistrySnapshot};
use crate::errors::{BoardError, BoardResult};

/// Tunables for a board session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub page_size: u32,
    pub click_threshold: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            click_threshold: DEFAULT_CLICK_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    Loaded,
    Failed(String),
}

/// What a renderer needs to draw the board.
#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub project: Project,
    /// The filtered board, the one columns render.
    pub board: Board,
    pub filter: BoardFilter,
    pub load_state: LoadState,
    pub revision: u64,
    pub detail: Option<Ticket>,
    pub iterations: Vec<Iteration>,
    pub epics: Vec<Epic>,
    pub edit_errors: BTreeMap<TicketId, String>,
}

pub(super) struct BoardState {
    pub(super) board: Board,
    /// Bumped on every board mutation; keys the filter memo.
    pub(super) revision: u64,
    pub(super) filter: BoardFilter,
    pub(super) filter_engine: FilterEngine,
    pub(super) gesture: GestureController,
    pub(super) detail: Option<TicketId>,
    pub(super) load_state: LoadState,
    /// Count of reloads started; tags load events.
    pub(super) epoch: u64,
    pub(super) registries: RegistrySnapshot,
    pub(super) edit_errors: BTreeMap<TicketId, String>,
    pub(super) closed: bool,
}

impl BoardState {
    fn new(click_threshold: Duration) -> Self {
        Self {
            board: Board::default(),
            revision: 0,
            filter: BoardFilter::default(),
            filter_engine: FilterEngine::new(),
            gesture: GestureController::new(click_threshold),
            detail: None,
            load_state: LoadState::Loading,
            epoch: 0,
            registries: RegistrySnapshot::default(),
            edit_errors: BTreeMap::new(),
            closed: false,
        }
    }

    pub(super) fn ensure_open(&self) -> BoardResult<()> {
        if self.closed {
            Err(BoardError::SessionClosed)
        } else {
            Ok(())
        }
    }

    pub(super) fn touch(&mut self) {
        self.revision += 1;
    }

    fn filtered(&mut self) -> &Board {
        self.filter_engine
            .derive(&self.board, self.revision, self.filter)
    }
}

/// Live board for one project. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BoardSession {
    pub(super) project: Project,
    pub(super) fetcher: TicketFetcher,
    api: Arc<dyn BoardApi>,
    pub(super) state: Arc<Mutex<BoardState>>,
    pub(super) events: broadcast::Sender<BoardEvent>,
    /// Held by a reload, move or edit from start to finish.
    pub(super) turns: Arc<Mutex<()>>,
    cancel: CancellationToken,
}

impl BoardSession {
    /// Resolve the project, then load workflow and tickets. Iterations and
    /// epics load in the background and never delay the first render.
    pub async fn open(
        api: Arc<dyn BoardApi>,
        options: SessionOptions,
        project_ref: &ProjectRef,
    ) -> BoardResult<Self> {
        let project = api.find_project(project_ref).await?;
        tracing::info!(project_id = %project.id, name = %project.name, "opening board");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let session = Self {
            fetcher: TicketFetcher::new(api.clone(), options.page_size),
            api,
            project,
            state: Arc::new(Mutex::new(BoardState::new(options.click_threshold))),
            events,
            turns: Arc::new(Mutex::new(())),
            cancel: CancellationToken::new(),
        };

        let background = session.clone();
        tokio::spawn(async move {
            if let Err(e) = background.refresh_registries().await {
                tracing::debug!(error = %e, "initial registry load skipped");
            }
        });

        if let Err(e) = session.reload().await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    pub fn iteration_registry(&self) -> IterationRegistry {
        IterationRegistry::new(self.api.clone())
    }

    pub fn epic_registry(&self) -> EpicRegistry {
        EpicRegistry::new(self.api.clone())
    }

    /// Full resync from the server. Waits for any move or edit in flight.
    pub async fn reload(&self) -> BoardResult<()> {
        let _turn = self.turns.lock().await;
        self.reload_in_turn().await
    }

    /// Reload body; the caller holds `turns`.
    pub(super) async fn reload_in_turn(&self) -> BoardResult<()> {
        let epoch = {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            state.epoch += 1;
            state.load_state = LoadState::Loading;
            state.epoch
        };
        tracing::debug!(epoch, project_id = %self.project.id, "reloading board");

        let result = self.load_board().await;

        let mut state = self.state.lock().await;
        state.ensure_open()?;

        match result {
            Ok(board) => {
                let tickets = board.len();
                let columns = board.columns().len();
                state.board = board;
                state.load_state = LoadState::Loaded;
                state.touch();
                if let Some(detail) = state.detail
                    && state.board.find(detail).is_none()
                {
                    state.detail = None;
                }
                tracing::info!(epoch, tickets, columns, "board loaded");
                broadcast_event(
                    &self.events,
                    BoardEvent::BoardLoaded {
                        epoch,
                        tickets,
                        columns,
                    },
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(epoch, error = %e, "board load failed");
                state.load_state = LoadState::Failed(e.to_string());
                broadcast_event(
                    &self.events,
                    BoardEvent::LoadFailed {
                        epoch,
                        error: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    async fn load_board(&self) -> BoardResult<Board> {
        let (workflow, tickets) = tokio::try_join!(
            self.api.project_workflow(self.project.team_id),
            self.fetcher.fetch_all_tickets(self.project.id, &self.cancel),
        )?;
        if workflow.states.is_empty() {
            return Err(BoardError::WorkflowMissing {
                project_id: self.project.id,
            });
        }
        Ok(build_board(tickets, &workflow.states))
    }

    /// Reload iterations and epics. Failures leave empty lists behind.
    pub async fn refresh_registries(&self) -> BoardResult<()> {
        let snapshot = RegistrySnapshot::load(
            &self.iteration_registry(),
            &self.epic_registry(),
            self.project.id,
        )
        .await;

        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let (iterations, epics) = (snapshot.iterations.len(), snapshot.epics.len());
        state.registries = snapshot;
        broadcast_event(
            &self.events,
            BoardEvent::RegistriesRefreshed { iterations, epics },
        );
        Ok(())
    }

    // ── Filters ──────────────────────────────────────────────────────

    pub async fn set_iteration(&self, iteration: Option<IterationId>) -> BoardResult<()> {
        self.update_filter(|f| f.iteration = iteration).await
    }

    pub async fn set_epic(&self, epic: Option<EpicId>) -> BoardResult<()> {
        self.update_filter(|f| f.epic = epic).await
    }

    pub async fn clear_filters(&self) -> BoardResult<()> {
        self.update_filter(|f| *f = BoardFilter::default()).await
    }

    async fn update_filter(&self, apply: impl FnOnce(&mut BoardFilter)) -> BoardResult<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        let before = state.filter;
        apply(&mut state.filter);
        if state.filter != before {
            let filter = state.filter;
            state.filtered();
            broadcast_event(&self.events, BoardEvent::FiltersChanged { filter });
        }
        Ok(())
    }

    // ── Detail view ──────────────────────────────────────────────────

    pub async fn select_ticket(&self, ticket_id: TicketId) -> BoardResult<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        if state.board.find(ticket_id).is_none() {
            return Err(BoardError::UnknownTicket { ticket_id });
        }
        state.detail = Some(ticket_id);
        broadcast_event(&self.events, BoardEvent::DetailOpened { ticket_id });
        Ok(())
    }

    pub async fn close_detail(&self) {
        let mut state = self.state.lock().await;
        if state.detail.take().is_some() {
            broadcast_event(&self.events, BoardEvent::DetailClosed);
        }
    }

    /// The selected ticket as the board currently holds it.
    pub async fn detail(&self) -> Option<Ticket> {
        let state = self.state.lock().await;
        state.detail.and_then(|id| state.board.find(id).cloned())
    }

    // ── Views ────────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> BoardSnapshot {
        let mut state = self.state.lock().await;
        let board = state.filtered().clone();
        BoardSnapshot {
            project: self.project.clone(),
            board,
            filter: state.filter,
            load_state: state.load_state.clone(),
            revision: state.revision,
            detail: state.detail.and_then(|id| state.board.find(id).cloned()),
            iterations: state.registries.iterations.clone(),
            epics: state.registries.epics.clone(),
            edit_errors: state.edit_errors.clone(),
        }
    }

    /// The unfiltered board.
    pub async fn board(&self) -> Board {
        self.state.lock().await.board.clone()
    }

    pub async fn load_state(&self) -> LoadState {
        self.state.lock().await.load_state.clone()
    }

    pub async fn filter_recomputations(&self) -> u64 {
        self.state.lock().await.filter_engine.recomputations()
    }

    pub async fn edit_error(&self, ticket_id: TicketId) -> Option<String> {
        self.state.lock().await.edit_errors.get(&ticket_id).cloned()
    }

    // ── Gestures ─────────────────────────────────────────────────────

    pub async fn pointer_down(&self, ticket_id: TicketId, at: Instant) -> BoardResult<()> {
        let mut state = self.state.lock().await;
        state.ensure_open()?;
        state.gesture.pointer_down(ticket_id, at);
        Ok(())
    }

    pub async fn cancel_gesture(&self) {
        self.state.lock().await.gesture.cancel();
    }

    /// Release the active press and act on the outcome: a click opens the
    /// detail view, a cross-column drop runs a move to completion.
    pub async fn pointer_up(
        &self,
        target: Option<DropTarget>,
        at: Instant,
    ) -> BoardResult<GestureOutcome> {
        let outcome = {
            let mut guard = self.state.lock().await;
            guard.ensure_open()?;
            let state = &mut *guard;
            let filtered = state
                .filter_engine
                .derive(&state.board, state.revision, state.filter);
            let outcome = state.gesture.pointer_up(target, filtered, at);
            // Open the detail under the same lock so a reload cannot remove
            // the clicked ticket first.
            if let GestureOutcome::Click { ticket_id } = outcome {
                state.detail = Some(ticket_id);
                broadcast_event(&self.events, BoardEvent::DetailOpened { ticket_id });
            }
            outcome
        };
        tracing::debug!(?outcome, "gesture resolved");

        match outcome {
            GestureOutcome::Move {
                ticket_id,
                from,
                to,
            } => {
                self.reconcile_move(ticket_id, from, to).await?;
            }
            GestureOutcome::Click { .. } | GestureOutcome::NoOp | GestureOutcome::Discarded => {}
        }
        Ok(outcome)
    }

    // ── Field edits ──────────────────────────────────────────────────

    /// Save an edited ticket.
    ///
    /// The edit is applied locally first (as a move when the state changed).
    /// If the server rejects it, the pre-edit copy is restored, the error is
    /// recorded against the ticket and returned. Other tickets are untouched.
    pub async fn edit_ticket(&self, ticket: Ticket) -> BoardResult<Ticket> {
        let _turn = self.turns.lock().await;
        let ticket_id = ticket.id;
        let (previous, edited) = {
            let mut state = self.state.lock().await;
            state.ensure_open()?;
            let previous = state
                .board
                .find(ticket_id)
                .cloned()
                .ok_or(BoardError::UnknownTicket { ticket_id })?;
            if !state.board.contains_state(ticket.current_state_id) {
                return Err(BoardError::UnknownState {
                    state_id: ticket.current_state_id,
                });
            }

            let mut edited = ticket;
            if previous.current_state_id != edited.current_state_id {
                state.board.move_ticket(
                    ticket_id,
                    previous.current_state_id,
                    edited.current_state_id,
                );
                edited.current_state_name = state
                    .board
                    .state(edited.current_state_id)
                    .map(|s| s.state_name.clone());
            }
            state.board.update_ticket(edited.clone());
            state.edit_errors.remove(&ticket_id);
            state.touch();
            broadcast_event(
                &self.events,
                BoardEvent::TicketUpdated {
                    ticket: edited.clone(),
                },
            );
            (previous, edited)
        };

        let result = self.fetcher.update_ticket(&edited).await;

        let mut state = self.state.lock().await;
        state.ensure_open()?;
        match result {
            Ok(saved) => {
                state.board.merge_ticket(saved.clone());
                state.touch();
                broadcast_event(
                    &self.events,
                    BoardEvent::TicketUpdated {
                        ticket: saved.clone(),
                    },
                );
                tracing::info!(%ticket_id, "ticket saved");
                Ok(saved)
            }
            Err(e) => {
                tracing::warn!(%ticket_id, error = %e, "ticket edit rejected");
                if let Some(held_in) = state.board.locate(ticket_id)
                    && held_in != previous.current_state_id
                {
                    state
                        .board
                        .move_ticket(ticket_id, held_in, previous.current_state_id);
                }
                state.board.update_ticket(previous);
                state.touch();
                state.edit_errors.insert(ticket_id, e.to_string());
                broadcast_event(
                    &self.events,
                    BoardEvent::EditFailed {
                        ticket_id,
                        error: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Create a ticket in a column of this session's project, then reload
    /// so it appears where the server orders it.
    ///
    /// A failed create leaves the board untouched and is returned. A failed
    /// follow-up reload is published as `LoadFailed`; the ticket still exists.
    pub async fn create_ticket(&self, mut ticket: NewTicket) -> BoardResult<Ticket> {
        let _turn = self.turns.lock().await;
        {
            let state = self.state.lock().await;
            state.ensure_open()?;
            if !state.board.contains_state(ticket.current_state_id) {
                return Err(BoardError::UnknownState {
                    state_id: ticket.current_state_id,
                });
            }
        }
        ticket.project_id = self.project.id;

        let created = self.fetcher.create_ticket(&ticket).await?;
        match self.reload_in_turn().await {
            Ok(()) => {}
            Err(BoardError::SessionClosed) => return Err(BoardError::SessionClosed),
            Err(e) => tracing::warn!(error = %e, "reload after ticket creation failed"),
        }
        Ok(created)
    }

    /// Tear the session down. In-flight fetches stop and late responses are
    /// ignored.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        state.gesture.cancel();
        self.cancel.cancel();
        tracing::debug!(project_id = %self.project.id, "board session closed");
        broadcast_event(&self.events, BoardEvent::SessionClosed);
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }
}
