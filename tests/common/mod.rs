//! Stub project-management server for integration tests.
//!
//! Serves the REST endpoints flowboard talks to from an in-memory store.
//! Tickets are kept newest first, the order search pages return them in.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};

pub const TOKEN: &str = "test-token";

#[derive(Default)]
pub struct ServerData {
    pub tickets: Vec<Value>,
    pub iterations: Vec<Value>,
    pub epics: Vec<Value>,
    /// Query strings of every ticket search, in arrival order.
    pub searches: Vec<HashMap<String, String>>,
    pub search_bodies: Vec<Value>,
    pub ticket_puts: Vec<Value>,
    /// Tickets whose state changes are refused with 409.
    pub locked_tickets: Vec<i64>,
}

pub type Shared = Arc<Mutex<ServerData>>;

type Reply = (StatusCode, Json<Value>);

pub fn ticket(id: i64, state: i64, title: &str) -> Value {
    json!({
        "id": id,
        "currentStateId": state,
        "requestTitle": title,
        "iterationId": null,
        "epicId": null,
        "priority": "Medium",
        "channel": "web"
    })
}

/// Project WEB (id 1, team 10) with five tickets across three columns.
pub fn seeded() -> Shared {
    let mut data = ServerData {
        tickets: vec![
            ticket(5, 1, "Add dark mode"),
            ticket(4, 2, "Fix login redirect"),
            ticket(3, 1, "Update footer links"),
            ticket(2, 3, "Upgrade dependencies"),
            ticket(1, 2, "Write onboarding docs"),
        ],
        ..ServerData::default()
    };
    data.tickets[0]["iterationId"] = json!(7);
    data.tickets[3]["iterationId"] = json!(7);
    data.tickets[1]["epicId"] = json!(1);
    data.iterations.push(json!({
        "id": 7,
        "projectId": 1,
        "name": "Sprint 7",
        "startDate": "2026-01-05T00:00:00Z",
        "endDate": "2026-01-19T00:00:00Z"
    }));
    data.epics.push(json!({
        "id": 1,
        "projectId": 1,
        "name": "Auth",
        "startDate": null,
        "endDate": null
    }));
    Arc::new(Mutex::new(data))
}

fn project() -> Value {
    json!({
        "id": 1,
        "name": "Web",
        "shortName": "WEB",
        "description": "Customer web app",
        "teamId": 10,
        "status": "ACTIVE"
    })
}

fn workflow() -> Value {
    json!({
        "id": 3,
        "name": "Default",
        "states": [
            {"id": 1, "stateName": "Backlog", "isInitial": true, "isFinal": false},
            {"id": 2, "stateName": "In Progress"},
            {"id": 3, "stateName": "Done", "isInitial": false, "isFinal": true}
        ]
    })
}

fn state_name(state_id: i64) -> &'static str {
    match state_id {
        1 => "Backlog",
        2 => "In Progress",
        _ => "Done",
    }
}

fn error(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "message": message })))
}

fn authorized(headers: &HeaderMap) -> Result<(), Reply> {
    let expected = format!("Bearer {}", TOKEN);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(error(StatusCode::UNAUTHORIZED, "invalid token")),
    }
}

async fn project_by_short_name(headers: HeaderMap, Path(short_name): Path<String>) -> Reply {
    if let Err(e) = authorized(&headers) {
        return e;
    }
    if short_name == "WEB" {
        (StatusCode::OK, Json(project()))
    } else {
        error(StatusCode::NOT_FOUND, "project not found")
    }
}

async fn project_by_id(headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    if let Err(e) = authorized(&headers) {
        return e;
    }
    if id == 1 {
        (StatusCode::OK, Json(project()))
    } else {
        error(StatusCode::NOT_FOUND, "project not found")
    }
}

async fn project_workflow(headers: HeaderMap, Path(team_id): Path<i64>) -> Reply {
    if let Err(e) = authorized(&headers) {
        return e;
    }
    if team_id == 10 {
        (StatusCode::OK, Json(workflow()))
    } else {
        error(StatusCode::NOT_FOUND, "no workflow")
    }
}

async fn search_tickets(
    State(data): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Reply {
    if let Err(e) = authorized(&headers) {
        return e;
    }
    let mut data = data.lock().unwrap();
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let size: usize = params.get("size").and_then(|s| s.parse().ok()).unwrap_or(20);
    data.searches.push(params);
    data.search_bodies.push(body);

    let content: Vec<Value> = data
        .tickets
        .iter()
        .skip(page.saturating_sub(1) * size)
        .take(size)
        .cloned()
        .collect();
    (
        StatusCode::OK,
        Json(json!({ "content": content, "totalElements": data.tickets.len() })),
    )
}

async fn update_state(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    if let Err(e) = authorized(&headers) {
        return e;
    }
    let mut data = data.lock().unwrap();
    if data.locked_tickets.contains(&id) {
        return error(StatusCode::CONFLICT, "transition not allowed");
    }
    let Some(new_state) = body["newStateId"].as_i64() else {
        return error(StatusCode::BAD_REQUEST, "newStateId required");
    };
    let Some(ticket) = data.tickets.iter_mut().find(|t| t["id"] == id) else {
        return error(StatusCode::NOT_FOUND, "ticket not found");
    };
    ticket["currentStateId"] = json!(new_state);
    ticket["currentStateName"] = json!(state_name(new_state));
    (StatusCode::OK, Json(ticket.clone()))
}

async fn update_ticket(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    if let Err(e) = authorized(&headers) {
        return e;
    }
    let mut data = data.lock().unwrap();
    data.ticket_puts.push(body.clone());
    if body["requestTitle"].as_str().is_some_and(|t| t.is_empty()) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "title must not be empty");
    }
    let Some(ticket) = data.tickets.iter_mut().find(|t| t["id"] == id) else {
        return error(StatusCode::NOT_FOUND, "ticket not found");
    };
    *ticket = body;
    (StatusCode::OK, Json(ticket.clone()))
}

async fn create_ticket(
    State(data): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Reply {
    if let Err(e) = authorized(&headers) {
        return e;
    }
    if body["requestTitle"].as_str().is_none_or(|t| t.is_empty()) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "title must not be empty");
    }
    let mut data = data.lock().unwrap();
    let id = data
        .tickets
        .iter()
        .filter_map(|t| t["id"].as_i64())
        .max()
        .unwrap_or(0)
        + 1;
    body["id"] = json!(id);
    data.tickets.insert(0, body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn list_iterations(State(data): State<Shared>, Path(project_id): Path<i64>) -> Reply {
    let data = data.lock().unwrap();
    let list: Vec<Value> = data
        .iterations
        .iter()
        .filter(|i| i["projectId"] == project_id)
        .cloned()
        .collect();
    (StatusCode::OK, Json(Value::Array(list)))
}

async fn create_iteration(State(data): State<Shared>, Json(mut body): Json<Value>) -> Reply {
    let mut data = data.lock().unwrap();
    body["id"] = json!(100 + data.iterations.len() as i64);
    body["status"] = json!("PLANNED");
    data.iterations.push(body.clone());
    (StatusCode::OK, Json(body))
}

async fn close_iteration(State(data): State<Shared>, Path(id): Path<i64>) -> Reply {
    let mut data = data.lock().unwrap();
    let Some(iteration) = data.iterations.iter_mut().find(|i| i["id"] == id) else {
        return error(StatusCode::NOT_FOUND, "iteration not found");
    };
    iteration["status"] = json!("COMPLETED");
    (StatusCode::OK, Json(iteration.clone()))
}

async fn list_epics(State(data): State<Shared>, Path(project_id): Path<i64>) -> Reply {
    let data = data.lock().unwrap();
    let list: Vec<Value> = data
        .epics
        .iter()
        .filter(|e| e["projectId"] == project_id)
        .cloned()
        .collect();
    (StatusCode::OK, Json(Value::Array(list)))
}

async fn create_epic(State(data): State<Shared>, Json(mut body): Json<Value>) -> Reply {
    let mut data = data.lock().unwrap();
    body["id"] = json!(200 + data.epics.len() as i64);
    data.epics.push(body.clone());
    (StatusCode::OK, Json(body))
}

pub fn router(data: Shared) -> Router {
    Router::new()
        .route("/api/projects/short-name/{short_name}", get(project_by_short_name))
        .route("/api/projects/{id}", get(project_by_id))
        .route("/api/projects/{id}/iterations", get(list_iterations))
        .route("/api/projects/{id}/epics", get(list_epics))
        .route(
            "/api/workflows/teams/{team_id}/project-workflow",
            get(project_workflow),
        )
        .route("/api/tickets", post(create_ticket))
        .route("/api/tickets/search", post(search_tickets))
        .route("/api/tickets/{id}/state", patch(update_state))
        .route("/api/tickets/{id}", axum::routing::put(update_ticket))
        .route("/api/project-iterations", post(create_iteration))
        .route("/api/project-iterations/{id}/close", post(close_iteration))
        .route("/api/project-epics", post(create_epic))
        .with_state(data)
}

/// Serve on an ephemeral port inside the current runtime.
pub async fn spawn(data: Shared) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(data)).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Serve on an ephemeral port from a dedicated thread, for blocking tests
/// that drive the CLI binary.
pub fn spawn_on_thread(data: Shared) -> String {
    let (tx, rx) = std::sync::mpsc::channel::<SocketAddr>();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, router(data)).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}
