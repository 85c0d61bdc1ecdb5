//! Iteration and epic registries.
//!
//! These feed the board's filter selectors and ticket labels. They load
//! alongside the board but never gate it: a failed load leaves the lists
//! empty and the board usable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::api::BoardApi;
use super::models::{Epic, EpicId, Iteration, IterationId, ProjectId};
use crate::errors::BoardResult;

const EPIC_PALETTE: [&str; 10] = [
    "#8884d8", "#82ca9d", "#ffc658", "#ff8042", "#0088FE", "#00C49F", "#FFBB28", "#FF8042",
    "#a4de6c", "#d0ed57",
];

/// Stable label color for an epic.
pub fn epic_color(epic_id: EpicId) -> &'static str {
    EPIC_PALETTE[epic_id.0.rem_euclid(EPIC_PALETTE.len() as i64) as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    NotScheduled,
    Planned,
    InProgress,
    Completed,
}

impl IterationStatus {
    pub fn at(iteration: &Iteration, now: DateTime<Utc>) -> Self {
        match (iteration.start_date, iteration.end_date) {
            (Some(start), Some(end)) => {
                if now < start {
                    Self::Planned
                } else if now <= end {
                    Self::InProgress
                } else {
                    Self::Completed
                }
            }
            _ => Self::NotScheduled,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotScheduled => "Not scheduled",
            Self::Planned => "Planned",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
        }
    }
}

#[derive(Clone)]
pub struct IterationRegistry {
    api: Arc<dyn BoardApi>,
}

impl IterationRegistry {
    pub fn new(api: Arc<dyn BoardApi>) -> Self {
        Self { api }
    }

    pub async fn list(&self, project_id: ProjectId) -> BoardResult<Vec<Iteration>> {
        self.api.list_iterations(project_id).await
    }

    pub async fn create(&self, mut iteration: Iteration) -> BoardResult<Iteration> {
        iteration.id = None;
        let saved = self.api.save_iteration(&iteration).await?;
        tracing::info!(iteration_id = ?saved.id, name = %saved.name, "iteration created");
        Ok(saved)
    }

    pub async fn update(
        &self,
        iteration_id: IterationId,
        mut iteration: Iteration,
    ) -> BoardResult<Iteration> {
        iteration.id = Some(iteration_id);
        self.api.save_iteration(&iteration).await
    }

    pub async fn close(&self, iteration_id: IterationId) -> BoardResult<Iteration> {
        let closed = self.api.close_iteration(iteration_id).await?;
        tracing::info!(%iteration_id, "iteration closed");
        Ok(closed)
    }
}

#[derive(Clone)]
pub struct EpicRegistry {
    api: Arc<dyn BoardApi>,
}

impl EpicRegistry {
    pub fn new(api: Arc<dyn BoardApi>) -> Self {
        Self { api }
    }

    pub async fn list(&self, project_id: ProjectId) -> BoardResult<Vec<Epic>> {
        self.api.list_epics(project_id).await
    }

    pub async fn create(&self, mut epic: Epic) -> BoardResult<Epic> {
        epic.id = None;
        let saved = self.api.save_epic(&epic).await?;
        tracing::info!(epic_id = ?saved.id, name = %saved.name, "epic created");
        Ok(saved)
    }

    pub async fn update(&self, epic_id: EpicId, mut epic: Epic) -> BoardResult<Epic> {
        epic.id = Some(epic_id);
        self.api.save_epic(&epic).await
    }
}

/// Snapshot of both registries for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub iterations: Vec<Iteration>,
    pub epics: Vec<Epic>,
}

impl RegistrySnapshot {
    /// Load both lists concurrently. Each side degrades to empty on failure.
    pub async fn load(
        iterations: &IterationRegistry,
        epics: &EpicRegistry,
        project_id: ProjectId,
    ) -> Self {
        let (iteration_result, epic_result) =
            tokio::join!(iterations.list(project_id), epics.list(project_id));
        let iterations = iteration_result.unwrap_or_else(|e| {
            tracing::warn!(%project_id, error = %e, "failed to load iterations");
            Vec::new()
        });
        let epics = epic_result.unwrap_or_else(|e| {
            tracing::warn!(%project_id, error = %e, "failed to load epics");
            Vec::new()
        });
        Self { iterations, epics }
    }

    pub fn iteration(&self, iteration_id: IterationId) -> Option<&Iteration> {
        self.iterations.iter().find(|i| i.id == Some(iteration_id))
    }

    pub fn epic(&self, epic_id: EpicId) -> Option<&Epic> {
        self.epics.iter().find(|e| e.id == Some(epic_id))
    }
}
