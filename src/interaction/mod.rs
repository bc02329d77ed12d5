pub mod drag;
pub mod reconcile;

pub use drag::{DragController, DragOutcome, DragState, DropTarget};
pub use reconcile::{reconcile, ReorderBatch, ReorderItem};
