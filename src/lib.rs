//! # Stageboard Core
//!
//! Domain models and board logic for a four-stage kanban tracker
//! (START, DEV, QA, FINISH).
//!
//! The crate covers three concerns:
//!
//! - the board state model: grouping tickets by stage, moving them between
//!   stages and renumbering a stage after a reorder ([`domain::board`])
//! - the drag interaction controller that turns drag events into board
//!   transitions ([`interaction::drag`])
//! - persistence reconciliation: the batched, all-or-nothing write that
//!   makes the store agree with the board ([`interaction::reconcile`],
//!   [`storage::Storage::apply_reorder`])
//!
//! [`BoardSession`] ties the three together for a board view, and
//! [`TicketService`] provides validated CRUD on top of any storage backend.

pub mod config;
pub mod domain;
pub mod error;
pub mod interaction;
pub mod service;
pub mod session;
pub mod storage;
pub mod telemetry;

// Re-export commonly used types
pub use config::StageboardConfig;
pub use domain::{BoardSnapshot, Project, ProjectId, Stage, Ticket, TicketId};
pub use error::{Result, StageboardError};
pub use interaction::{DragController, DragOutcome, ReorderBatch, ReorderItem};
pub use service::TicketService;
pub use session::BoardSession;
pub use storage::Storage;
