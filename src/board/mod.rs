//! Kanban board engine for a remote project-management server.
//!
//! ## Overview
//!
//! A board session loads one project's workflow and tickets, buckets the
//! tickets by workflow state, and keeps that board in step with the server
//! while the user filters, opens, drags and edits tickets. Moves are applied
//! locally first and confirmed or repaired (by full reload) afterwards.
//!
//! ## Module Map
//!
//! ```text
//!  pointer events                         ┌──────────────────────────────┐
//!  ─────────────> gesture.rs ──Move────>  │ reconciler.rs                │
//!                 (GestureController)     │  optimistic move, then       │
//!                     │ Click             │  merge or full reload        │
//!                     v                   └──────────────┬───────────────┘
//!  ┌──────────────────────────────────────────────────────┴───────────────┐
//!  │ session.rs  (BoardSession: Board, filters, detail, turns, events)   │
//!  └──────┬──────────────────┬────────────────────┬──────────────────────┘
//!         │ fetch_all        │ build_board        │ derive
//!         v                  v                    v
//!    fetcher.rs          indexer.rs           filter.rs
//!         │                                  (FilterEngine memo)
//!         v
//!    api.rs  (BoardApi trait, HttpBoardApi over reqwest)
//! ```
//!
//! ## Supporting Modules
//!
//! | Module     | Responsibility                                           |
//! |------------|----------------------------------------------------------|
//! | `models`   | Wire types: `Ticket`, `WorkflowState`, `Project`, ids    |
//! | `events`   | `BoardEvent` enum + `broadcast_event()` helper           |
//! | `registry` | Iterations and epics: CRUD, status, epic colors          |

pub mod api;
pub mod events;
pub mod fetcher;
pub mod filter;
pub mod gesture;
pub mod indexer;
pub mod models;
pub mod reconciler;
pub mod registry;
pub mod session;

#[cfg(test)]
pub(crate) mod stub;

pub use api::{BoardApi, HttpBoardApi, SessionContext};
pub use events::BoardEvent;
pub use filter::BoardFilter;
pub use gesture::{DropTarget, GestureOutcome};
pub use indexer::Board;
pub use reconciler::MoveOutcome;
pub use session::{BoardSession, BoardSnapshot, LoadState, SessionOptions};
