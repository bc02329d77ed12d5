pub mod board;
pub mod dashboard;
pub mod project;
pub mod sorting;
pub mod stage;
pub mod ticket;

pub use board::{group_by_stage, relocate, reorder_within_stage, snapshot_key, BoardSnapshot};
pub use dashboard::{Dashboard, StageCounts};
pub use project::{Engineer, EngineerId, Project, ProjectId};
pub use sorting::{sort_tickets, SortField, SortOrder};
pub use stage::Stage;
pub use ticket::{Attachment, Priority, Subtask, Ticket, TicketId};
