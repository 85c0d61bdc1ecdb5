use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(
    /// Server identifier of a ticket.
    TicketId
);
id_newtype!(
    /// Identifier of a workflow state; doubles as the board column key.
    StateId
);
id_newtype!(ProjectId);
id_newtype!(TeamId);
id_newtype!(IterationId);
id_newtype!(EpicId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub id: StateId,
    pub state_name: String,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
}

impl WorkflowState {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id: StateId(id),
            state_name: name.to_string(),
            is_initial: false,
            is_final: false,
        }
    }

    pub fn initial(mut self) -> Self {
        self.is_initial = true;
        self
    }

    pub fn terminal(mut self) -> Self {
        self.is_final = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDetail {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub states: Vec<WorkflowState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    pub description: Option<String>,
    pub team_id: TeamId,
    pub status: Option<String>,
}

/// A ticket as cached by the client.
///
/// `current_state_id` may run ahead of the server while a move is in flight.
/// Fields the engine does not interpret are kept in `extra` so an edit sends
/// them back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub current_state_id: StateId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state_name: Option<String>,
    pub iteration_id: Option<IterationId>,
    pub epic_id: Option<EpicId>,
    #[serde(default)]
    pub request_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign_user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign_user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Ticket {
    pub fn new(id: i64, state: i64, title: &str) -> Self {
        Self {
            id: TicketId(id),
            current_state_id: StateId(state),
            current_state_name: None,
            iteration_id: None,
            epic_id: None,
            request_title: title.to_string(),
            request_description: None,
            priority: None,
            assign_user_id: None,
            assign_user_name: None,
            project_id: None,
            team_id: None,
            modified_at: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_iteration(mut self, iteration: i64) -> Self {
        self.iteration_id = Some(IterationId(iteration));
        self
    }

    pub fn with_epic(mut self, epic: i64) -> Self {
        self.epic_id = Some(EpicId(epic));
        self
    }
}

/// A ticket to be created in a given column. The server assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub project_id: ProjectId,
    pub current_state_id: StateId,
    pub request_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub iteration_id: Option<IterationId>,
    pub epic_id: Option<EpicId>,
}

impl NewTicket {
    pub fn new(project_id: ProjectId, state_id: StateId, title: &str) -> Self {
        Self {
            project_id,
            current_state_id: state_id,
            request_title: title.to_string(),
            request_description: None,
            priority: None,
            iteration_id: None,
            epic_id: None,
        }
    }
}

/// One page of a paginated search response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<IterationId>,
    pub project_id: ProjectId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Epic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EpicId>,
    pub project_id: ProjectId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// How the board session refers to its project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    Id(ProjectId),
    ShortName(String),
}

impl std::str::FromStr for ProjectRef {
    type Err = std::convert::Infallible;

    /// Numeric references are ids, anything else is a short name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<i64>() {
            Ok(id) => Self::Id(ProjectId(id)),
            Err(_) => Self::ShortName(s.trim().to_string()),
        })
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::ShortName(name) => write!(f, "{}", name),
        }
    }
}
