//! Kanban board core: data model, mutations, persistence and session control.
//!
//! ## Module Map
//!
//! ```text
//! auth notifier ──> session.rs (SessionController, LoggedOut/Loading/Ready)
//!                      │   load ──> gateway.rs (BoardGateway) ──> db.rs (SQLite)
//!                      │   mutate ─> mutator.rs (BoardMutator) ─> models.rs (Board)
//!                      │   save ──> autosave.rs (single-slot coalescing queue)
//!                      │   generate ─> generator.rs (TaskGenerator, sentinels)
//!                      └─> events.rs (SessionEvent broadcast)
//! ```
//!
//! | Module      | Responsibility                                            |
//! |-------------|-----------------------------------------------------------|
//! | `models`    | `Task`, `Column`, `Board`, seed board, invariants         |
//! | `mutator`   | move / update / insert generated / reset                  |
//! | `gateway`   | `BoardGateway` trait, `LoadOutcome`, document decoding    |
//! | `db`        | SQLite document store via `DbHandle`                      |
//! | `generator` | `TaskGenerator` trait, sentinel titles, `CommandGenerator`|
//! | `autosave`  | serialized, coalesced, retried saves per session          |
//! | `session`   | auth-driven lifecycle and the load/save race guard        |
//! | `events`    | `SessionEvent` + `broadcast_event()` helper               |

pub mod autosave;
pub mod db;
pub mod events;
pub mod gateway;
pub mod generator;
pub mod models;
pub mod mutator;
pub mod session;

pub use autosave::{AutosaveConfig, AutosaveQueue, SaveStatus};
pub use events::SessionEvent;
pub use gateway::{BoardGateway, LoadOutcome};
pub use generator::{CommandGenerator, GenerationMode, GenerationNotice, TaskGenerator};
pub use models::{Board, Column, GeneratedTask, Task};
pub use mutator::{BoardMutator, InsertOutcome, UnknownIdPolicy};
pub use session::{AuthEvent, SessionConfig, SessionController, SessionState};
