//! Paginated ticket retrieval and ticket write-through.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::api::{BoardApi, Pagination, TicketQuery};
use super::models::{NewTicket, ProjectId, StateId, Ticket, TicketId};
use crate::errors::{BoardError, BoardResult};

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Most pages a fetch may request for a reported total: enough pages to hold
/// every ticket, plus one for tickets created while paging.
pub fn page_limit(total: u64, page_size: u32) -> u32 {
    let pages = total.div_ceil(u64::from(page_size.max(1))) + 1;
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Clone)]
pub struct TicketFetcher {
    api: Arc<dyn BoardApi>,
    page_size: u32,
}

impl TicketFetcher {
    pub fn new(api: Arc<dyn BoardApi>, page_size: u32) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch every ticket of a project, newest first.
    ///
    /// Pages are requested sequentially from page 1 until the number of
    /// distinct tickets reaches the server's reported total. Tickets seen on
    /// an earlier page are skipped. The page count is capped by
    /// [`page_limit`] of the first response's total; running past it yields
    /// `PageLimitExceeded`. Any failed page aborts the whole fetch.
    pub async fn fetch_all_tickets(
        &self,
        project_id: ProjectId,
        cancel: &CancellationToken,
    ) -> BoardResult<Vec<Ticket>> {
        let query = TicketQuery::for_project(project_id);
        let mut tickets: Vec<Ticket> = Vec::new();
        let mut seen = HashSet::new();
        let mut max_pages: Option<(u64, u32)> = None;
        let mut page = 1u32;

        loop {
            if cancel.is_cancelled() {
                return Err(BoardError::Cancelled);
            }
            if let Some((total, limit)) = max_pages
                && page > limit
            {
                tracing::warn!(
                    %project_id,
                    total,
                    fetched = tickets.len(),
                    pages = limit,
                    "ticket pagination did not converge"
                );
                return Err(BoardError::PageLimitExceeded {
                    total,
                    fetched: tickets.len(),
                    pages: limit,
                });
            }

            let request = Pagination::by_id_desc(page, self.page_size);
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BoardError::Cancelled),
                result = self.api.search_tickets(&query, &request) => result?,
            };

            let total = response.total_elements;
            if max_pages.is_none() {
                max_pages = Some((total, page_limit(total, self.page_size)));
            }

            let received = response.content.len();
            let mut duplicates = 0usize;
            for ticket in response.content {
                if seen.insert(ticket.id) {
                    tickets.push(ticket);
                } else {
                    duplicates += 1;
                }
            }
            if duplicates > 0 {
                tracing::debug!(page, duplicates, "skipped tickets already fetched");
            }
            tracing::debug!(
                %project_id,
                page,
                received,
                accumulated = tickets.len(),
                total,
                "ticket page fetched"
            );

            if tickets.len() as u64 >= total {
                break;
            }
            page += 1;
        }

        tracing::info!(%project_id, tickets = tickets.len(), pages = page, "tickets fetched");
        Ok(tickets)
    }

    /// Ask the server to transition a ticket. A rejected transition comes back
    /// as `Conflict`.
    pub async fn update_ticket_state(
        &self,
        ticket_id: TicketId,
        new_state_id: StateId,
    ) -> BoardResult<Ticket> {
        tracing::debug!(%ticket_id, %new_state_id, "updating ticket state");
        let ticket = self.api.update_ticket_state(ticket_id, new_state_id).await?;
        tracing::info!(%ticket_id, state_id = %ticket.current_state_id, "ticket state updated");
        Ok(ticket)
    }

    /// Save a field edit, stamping the modification time.
    pub async fn update_ticket(&self, ticket: &Ticket) -> BoardResult<Ticket> {
        let mut stamped = ticket.clone();
        stamped.modified_at = Some(Utc::now());
        tracing::debug!(ticket_id = %ticket.id, "saving ticket");
        self.api.update_ticket(&stamped).await
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> BoardResult<Ticket> {
        tracing::debug!(state_id = %ticket.current_state_id, "creating ticket");
        let created = self.api.create_ticket(ticket).await?;
        tracing::info!(ticket_id = %created.id, state_id = %created.current_state_id, "ticket created");
        Ok(created)
    }
}
