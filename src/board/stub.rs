//! In-memory `BoardApi` double shared by the engine's unit tests.
//!
//! Holds a server-side ticket list that searches page through. Queued
//! results override the stored data one call at a time, so a test can inject
//! a failure or an inconsistent page without rebuilding the whole server.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::api::{BoardApi, Pagination, TicketQuery};
use super::models::*;
use crate::errors::{BoardError, BoardResult};

#[derive(Default)]
pub(crate) struct StubBoardApi {
    pub project: Mutex<Option<Project>>,
    pub workflow: Mutex<Vec<WorkflowState>>,
    pub tickets: Mutex<Vec<Ticket>>,
    pub iterations: Mutex<Vec<Iteration>>,
    pub epics: Mutex<Vec<Epic>>,
    pub fail_registries: AtomicBool,

    page_results: Mutex<VecDeque<BoardResult<Page<Ticket>>>>,
    state_results: Mutex<VecDeque<BoardResult<Ticket>>>,
    update_results: Mutex<VecDeque<BoardResult<Ticket>>>,
    create_results: Mutex<VecDeque<BoardResult<Ticket>>>,

    pub searches: Mutex<Vec<Pagination>>,
    pub state_calls: Mutex<Vec<(TicketId, StateId)>>,
    pub update_calls: Mutex<Vec<Ticket>>,
    pub create_calls: Mutex<Vec<NewTicket>>,

    /// When set, state updates announce themselves on `state_started` and
    /// then wait on the gate before answering.
    pub state_gate: Mutex<Option<Arc<Notify>>>,
    pub state_started: Notify,
    /// When set, ticket searches wait on the gate before answering.
    pub search_gate: Mutex<Option<Arc<Notify>>>,
    /// Same as `state_gate`, for field edits.
    pub update_gate: Mutex<Option<Arc<Notify>>>,
    pub update_started: Notify,
}

impl StubBoardApi {
    /// Project 1 on team 10, Backlog/In Progress/Done workflow, given tickets.
    pub(crate) fn with_board(tickets: Vec<Ticket>) -> Arc<Self> {
        let stub = Self {
            project: Mutex::new(Some(Project {
                id: ProjectId(1),
                name: "Web".into(),
                short_name: "WEB".into(),
                description: None,
                team_id: TeamId(10),
                status: None,
            })),
            workflow: Mutex::new(vec![
                WorkflowState::new(1, "Backlog").initial(),
                WorkflowState::new(2, "In Progress"),
                WorkflowState::new(3, "Done").terminal(),
            ]),
            tickets: Mutex::new(tickets),
            ..Self::default()
        };
        Arc::new(stub)
    }

    pub(crate) async fn push_page(&self, page: BoardResult<Page<Ticket>>) {
        self.page_results.lock().await.push_back(page);
    }

    pub(crate) async fn push_state_result(&self, result: BoardResult<Ticket>) {
        self.state_results.lock().await.push_back(result);
    }

    pub(crate) async fn push_update_result(&self, result: BoardResult<Ticket>) {
        self.update_results.lock().await.push_back(result);
    }

    pub(crate) async fn push_create_result(&self, result: BoardResult<Ticket>) {
        self.create_results.lock().await.push_back(result);
    }

    pub(crate) async fn search_count(&self) -> usize {
        self.searches.lock().await.len()
    }

    pub(crate) async fn set_ticket_state(&self, ticket_id: TicketId, state_id: StateId) {
        let mut tickets = self.tickets.lock().await;
        if let Some(ticket) = tickets.iter_mut().find(|t| t.id == ticket_id) {
            ticket.current_state_id = state_id;
        }
    }
}

pub(crate) fn page(content: Vec<Ticket>, total_elements: u64) -> Page<Ticket> {
    Page {
        content,
        total_elements,
    }
}

#[async_trait]
impl BoardApi for StubBoardApi {
    async fn find_project(&self, project: &ProjectRef) -> BoardResult<Project> {
        let stored = self.project.lock().await.clone();
        match (stored, project) {
            (Some(p), ProjectRef::Id(id)) if p.id == *id => Ok(p),
            (Some(p), ProjectRef::ShortName(name)) if p.short_name == *name => Ok(p),
            _ => Err(BoardError::ProjectNotFound {
                reference: project.to_string(),
            }),
        }
    }

    async fn project_workflow(&self, team_id: TeamId) -> BoardResult<WorkflowDetail> {
        Ok(WorkflowDetail {
            id: team_id.0,
            name: "Default".into(),
            states: self.workflow.lock().await.clone(),
        })
    }

    async fn search_tickets(
        &self,
        _query: &TicketQuery,
        page: &Pagination,
    ) -> BoardResult<Page<Ticket>> {
        self.searches.lock().await.push(page.clone());
        let gate = self.search_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(result) = self.page_results.lock().await.pop_front() {
            return result;
        }
        let tickets = self.tickets.lock().await;
        let start = (page.page.saturating_sub(1) * page.size) as usize;
        let content = tickets
            .iter()
            .skip(start)
            .take(page.size as usize)
            .cloned()
            .collect();
        Ok(Page {
            content,
            total_elements: tickets.len() as u64,
        })
    }

    async fn update_ticket_state(
        &self,
        ticket_id: TicketId,
        new_state_id: StateId,
    ) -> BoardResult<Ticket> {
        self.state_calls.lock().await.push((ticket_id, new_state_id));
        self.state_started.notify_one();
        let gate = self.state_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(result) = self.state_results.lock().await.pop_front() {
            return result;
        }
        let mut tickets = self.tickets.lock().await;
        let ticket = tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| BoardError::Conflict {
                ticket_id,
                message: "ticket not found".into(),
            })?;
        ticket.current_state_id = new_state_id;
        Ok(ticket.clone())
    }

    async fn update_ticket(&self, ticket: &Ticket) -> BoardResult<Ticket> {
        self.update_calls.lock().await.push(ticket.clone());
        self.update_started.notify_one();
        let gate = self.update_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(result) = self.update_results.lock().await.pop_front() {
            return result;
        }
        let mut tickets = self.tickets.lock().await;
        if let Some(stored) = tickets.iter_mut().find(|t| t.id == ticket.id) {
            *stored = ticket.clone();
        }
        Ok(ticket.clone())
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> BoardResult<Ticket> {
        self.create_calls.lock().await.push(ticket.clone());
        if let Some(result) = self.create_results.lock().await.pop_front() {
            return result;
        }
        let mut tickets = self.tickets.lock().await;
        let id = tickets.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
        let mut created = Ticket::new(id, ticket.current_state_id.0, &ticket.request_title);
        created.project_id = Some(ticket.project_id);
        created.iteration_id = ticket.iteration_id;
        created.epic_id = ticket.epic_id;
        created.priority = ticket.priority.clone();
        tickets.insert(0, created.clone());
        Ok(created)
    }

    async fn list_iterations(&self, project_id: ProjectId) -> BoardResult<Vec<Iteration>> {
        if self.fail_registries.load(Ordering::SeqCst) {
            return Err(BoardError::Network("iterations unavailable".into()));
        }
        let iterations = self.iterations.lock().await;
        Ok(iterations
            .iter()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn save_iteration(&self, iteration: &Iteration) -> BoardResult<Iteration> {
        let mut iterations = self.iterations.lock().await;
        let mut saved = iteration.clone();
        match iteration.id {
            Some(id) => {
                let stored = iterations
                    .iter_mut()
                    .find(|i| i.id == Some(id))
                    .ok_or_else(|| BoardError::server("iteration not found"))?;
                *stored = saved.clone();
            }
            None => {
                saved.id = Some(IterationId(iterations.len() as i64 + 100));
                iterations.push(saved.clone());
            }
        }
        Ok(saved)
    }

    async fn close_iteration(&self, iteration_id: IterationId) -> BoardResult<Iteration> {
        let mut iterations = self.iterations.lock().await;
        let stored = iterations
            .iter_mut()
            .find(|i| i.id == Some(iteration_id))
            .ok_or_else(|| BoardError::server("iteration not found"))?;
        stored.status = Some("COMPLETED".into());
        Ok(stored.clone())
    }

    async fn list_epics(&self, project_id: ProjectId) -> BoardResult<Vec<Epic>> {
        if self.fail_registries.load(Ordering::SeqCst) {
            return Err(BoardError::Network("epics unavailable".into()));
        }
        let epics = self.epics.lock().await;
        Ok(epics
            .iter()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn save_epic(&self, epic: &Epic) -> BoardResult<Epic> {
        let mut epics = self.epics.lock().await;
        let mut saved = epic.clone();
        match epic.id {
            Some(id) => {
                let stored = epics
                    .iter_mut()
                    .find(|e| e.id == Some(id))
                    .ok_or_else(|| BoardError::server("epic not found"))?;
                *stored = saved.clone();
            }
            None => {
                saved.id = Some(EpicId(epics.len() as i64 + 200));
                epics.push(saved.clone());
            }
        }
        Ok(saved)
    }
}
