use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::models::*;
use crate::errors::{BoardError, BoardResult};

/// Abstraction over the project-management server for testability.
/// Real implementation: `HttpBoardApi`. Test doubles live next to the tests.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn find_project(&self, project: &ProjectRef) -> BoardResult<Project>;

    async fn project_workflow(&self, team_id: TeamId) -> BoardResult<WorkflowDetail>;

    async fn search_tickets(
        &self,
        query: &TicketQuery,
        page: &Pagination,
    ) -> BoardResult<Page<Ticket>>;

    async fn update_ticket_state(
        &self,
        ticket_id: TicketId,
        new_state_id: StateId,
    ) -> BoardResult<Ticket>;

    async fn update_ticket(&self, ticket: &Ticket) -> BoardResult<Ticket>;

    async fn create_ticket(&self, ticket: &NewTicket) -> BoardResult<Ticket>;

    async fn list_iterations(&self, project_id: ProjectId) -> BoardResult<Vec<Iteration>>;

    async fn save_iteration(&self, iteration: &Iteration) -> BoardResult<Iteration>;

    async fn close_iteration(&self, iteration_id: IterationId) -> BoardResult<Iteration>;

    async fn list_epics(&self, project_id: ProjectId) -> BoardResult<Vec<Epic>>;

    async fn save_epic(&self, epic: &Epic) -> BoardResult<Epic>;
}

// ── Query types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryFilter {
    pub field: String,
    pub value: serde_json::Value,
    pub operator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketQuery {
    pub filters: Vec<QueryFilter>,
}

impl TicketQuery {
    /// All tickets belonging to one project.
    pub fn for_project(project_id: ProjectId) -> Self {
        Self {
            filters: vec![QueryFilter {
                field: "project.id".to_string(),
                value: serde_json::Value::from(project_id.0),
                operator: "eq".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

/// 1-based page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
    pub sort: Vec<SortField>,
}

impl Pagination {
    /// Newest tickets first, the order the board renders within a column.
    pub fn by_id_desc(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: vec![SortField {
                field: "id".to_string(),
                direction: SortDirection::Desc,
            }],
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("size", self.size.to_string())];
        for sort in &self.sort {
            let dir = match sort.direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            pairs.push(("sort", format!("{},{}", sort.field, dir)));
        }
        pairs
    }
}

// ── Session context ───────────────────────────────────────────────────

/// Explicit credentials for one signed-in user, handed to the transport
/// instead of living in process-wide state.
#[derive(Clone)]
pub struct SessionContext {
    pub base_url: String,
    pub access_token: Option<String>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SessionContext {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

// ── reqwest transport ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct HttpBoardApi {
    session: SessionContext,
    client: reqwest::Client,
}

impl fmt::Debug for HttpBoardApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBoardApi")
            .field("session", &self.session)
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateChangeRequest {
    new_state_id: StateId,
}

impl HttpBoardApi {
    pub fn new(session: SessionContext, timeout: Duration) -> BoardResult<Self> {
        if !(session.base_url.starts_with("http://") || session.base_url.starts_with("https://")) {
            return Err(BoardError::Config(format!(
                "base URL '{}' must start with http:// or https://",
                session.base_url
            )));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("flowboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| BoardError::Network(format!("failed to initialize HTTP client: {e}")))?;
        Ok(Self { session, client })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, self.session.url(path))
            .header("Accept", "application/json");
        match &self.session.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned + Send>(
        &self,
        builder: reqwest::RequestBuilder,
        conflict_ticket: Option<TicketId>,
    ) -> BoardResult<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| BoardError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BoardError::Network(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body, conflict_ticket));
        }

        serde_json::from_str(&body).map_err(|e| BoardError::Server {
            status: Some(status.as_u16()),
            message: format!("failed to decode response: {e}"),
        })
    }
}

/// Map a non-success HTTP status to the engine's error taxonomy.
///
/// State updates treat 404 as a conflict: the ticket was deleted under us.
pub(crate) fn classify_status(
    status: u16,
    body: &str,
    conflict_ticket: Option<TicketId>,
) -> BoardError {
    let message = truncate_for_error(body);
    match (status, conflict_ticket) {
        (409, Some(ticket_id)) | (404, Some(ticket_id)) => BoardError::Conflict {
            ticket_id,
            message,
        },
        (408, _) | (504, _) => BoardError::Network(format!("HTTP {status}: {message}")),
        _ => BoardError::Server {
            status: Some(status),
            message,
        },
    }
}

fn truncate_for_error(body: &str) -> String {
    const MAX_LEN: usize = 200;
    if body.chars().count() <= MAX_LEN {
        body.to_owned()
    } else {
        format!("{}...", body.chars().take(MAX_LEN).collect::<String>())
    }
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn find_project(&self, project: &ProjectRef) -> BoardResult<Project> {
        let path = match project {
            ProjectRef::Id(id) => format!("/api/projects/{}", id),
            ProjectRef::ShortName(name) => format!("/api/projects/short-name/{}", name),
        };
        self.send(self.request(reqwest::Method::GET, &path), None)
            .await
            .map_err(|e| match e {
                BoardError::Server {
                    status: Some(404), ..
                } => BoardError::ProjectNotFound {
                    reference: project.to_string(),
                },
                other => other,
            })
    }

    async fn project_workflow(&self, team_id: TeamId) -> BoardResult<WorkflowDetail> {
        let path = format!("/api/workflows/teams/{}/project-workflow", team_id);
        self.send(self.request(reqwest::Method::GET, &path), None)
            .await
    }

    async fn search_tickets(
        &self,
        query: &TicketQuery,
        page: &Pagination,
    ) -> BoardResult<Page<Ticket>> {
        let builder = self
            .request(reqwest::Method::POST, "/api/tickets/search")
            .query(&page.query_pairs())
            .json(query);
        self.send(builder, None).await
    }

    async fn update_ticket_state(
        &self,
        ticket_id: TicketId,
        new_state_id: StateId,
    ) -> BoardResult<Ticket> {
        let path = format!("/api/tickets/{}/state", ticket_id);
        let builder = self
            .request(reqwest::Method::PATCH, &path)
            .json(&StateChangeRequest { new_state_id });
        self.send(builder, Some(ticket_id)).await
    }

    async fn update_ticket(&self, ticket: &Ticket) -> BoardResult<Ticket> {
        let path = format!("/api/tickets/{}", ticket.id);
        let builder = self.request(reqwest::Method::PUT, &path).json(ticket);
        self.send(builder, Some(ticket.id)).await
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> BoardResult<Ticket> {
        let builder = self
            .request(reqwest::Method::POST, "/api/tickets")
            .json(ticket);
        self.send(builder, None).await
    }

    async fn list_iterations(&self, project_id: ProjectId) -> BoardResult<Vec<Iteration>> {
        let path = format!("/api/projects/{}/iterations", project_id);
        self.send(self.request(reqwest::Method::GET, &path), None)
            .await
    }

    async fn save_iteration(&self, iteration: &Iteration) -> BoardResult<Iteration> {
        let builder = match iteration.id {
            Some(id) => self.request(
                reqwest::Method::PUT,
                &format!("/api/project-iterations/{}", id),
            ),
            None => self.request(reqwest::Method::POST, "/api/project-iterations"),
        };
        self.send(builder.json(iteration), None).await
    }

    async fn close_iteration(&self, iteration_id: IterationId) -> BoardResult<Iteration> {
        let path = format!("/api/project-iterations/{}/close", iteration_id);
        self.send(self.request(reqwest::Method::POST, &path), None)
            .await
    }

    async fn list_epics(&self, project_id: ProjectId) -> BoardResult<Vec<Epic>> {
        let path = format!("/api/projects/{}/epics", project_id);
        self.send(self.request(reqwest::Method::GET, &path), None)
            .await
    }

    async fn save_epic(&self, epic: &Epic) -> BoardResult<Epic> {
        let builder = match epic.id {
            Some(id) => self.request(reqwest::Method::PUT, &format!("/api/project-epics/{}", id)),
            None => self.request(reqwest::Method::POST, "/api/project-epics"),
        };
        self.send(builder.json(epic), None).await
    }
}
