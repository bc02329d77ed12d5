//! Drag interaction controller.
//!
//! Maps the host's drag lifecycle (`start`, `over`, `end`) onto board
//! mutations. Cross-stage moves are applied live while hovering; the drop
//! reorders and reindexes the target stage and hands back exactly one
//! reorder batch for that stage.

use crate::domain::board::BoardSnapshot;
use crate::domain::stage::Stage;
use crate::domain::ticket::{Ticket, TicketId};
use crate::error::{Result, StageboardError};
use crate::interaction::reconcile::{reconcile, ReorderBatch};
use std::str::FromStr;
use tracing::debug;

/// What the pointer is over: another ticket, or a stage column's drop area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Ticket(TicketId),
    Column(Stage),
}

impl DropTarget {
    /// Resolves a raw drop target id. Ticket ids win over column names.
    pub fn resolve(board: &BoardSnapshot, over_id: &str) -> Option<Self> {
        let ticket_id = TicketId::new(over_id);
        if board.contains(&ticket_id) {
            return Some(Self::Ticket(ticket_id));
        }
        Stage::from_str(over_id).ok().map(Self::Column)
    }

    /// Stage the target currently sits in
    pub fn stage(&self, board: &BoardSnapshot) -> Option<Stage> {
        match self {
            Self::Ticket(id) => board.get(id).map(|t| t.stage),
            Self::Column(stage) => Some(*stage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        ticket_id: TicketId,
        /// Stage at drag start, restored when the drop has no target
        origin: Stage,
    },
}

/// Result of finishing a drag gesture
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// The drop landed; `batch` persists the reindexed stage
    Committed { stage: Stage, batch: ReorderBatch },
    /// No usable drop target; any live relocation was rolled back
    Cancelled,
}

impl DragOutcome {
    pub fn batch(&self) -> Option<&ReorderBatch> {
        match self {
            Self::Committed { batch, .. } => Some(batch),
            Self::Cancelled => None,
        }
    }
}

/// Single-gesture state machine: `Idle -> Dragging -> Idle`
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Ticket being dragged, if any
    pub fn active(&self) -> Option<&TicketId> {
        match &self.state {
            DragState::Dragging { ticket_id, .. } => Some(ticket_id),
            DragState::Idle => None,
        }
    }

    /// Records the dragged ticket. The board is not touched.
    pub fn drag_start(&mut self, board: &BoardSnapshot, ticket_id: &TicketId) -> Result<()> {
        if let Some(active) = self.active() {
            return Err(StageboardError::DragInProgress(active.to_string()));
        }
        let ticket = board
            .get(ticket_id)
            .ok_or_else(|| StageboardError::TicketNotFound(ticket_id.to_string()))?;

        debug!(ticket = %ticket_id, stage = %ticket.stage, "drag started");
        self.state = DragState::Dragging {
            ticket_id: ticket_id.clone(),
            origin: ticket.stage,
        };
        Ok(())
    }

    /// Moves the dragged ticket into the hovered stage if it differs.
    ///
    /// Returns whether the board changed. Hovering nothing, an unknown id,
    /// or the ticket's own stage is a no-op.
    pub fn drag_over(&mut self, board: &mut BoardSnapshot, over_id: Option<&str>) -> bool {
        let Some(active) = self.active().cloned() else {
            return false;
        };
        let Some(target) = over_id.and_then(|id| DropTarget::resolve(board, id)) else {
            return false;
        };
        let Some(stage) = target.stage(board) else {
            return false;
        };

        let moved = board.relocate(&active, stage);
        if moved {
            debug!(ticket = %active, stage = %stage, "relocated during hover");
        }
        moved
    }

    /// Finishes the gesture and returns to `Idle`.
    ///
    /// With a resolvable target, the ticket is placed in the target stage at
    /// the hovered ticket's index (or at the end when dropped on the column)
    /// and the stage is reindexed. Without one, the ticket goes back to the
    /// stage it had at drag start and nothing is committed.
    pub fn drag_end(
        &mut self,
        board: &mut BoardSnapshot,
        over_id: Option<&str>,
    ) -> Result<DragOutcome> {
        let (ticket_id, origin) = match std::mem::take(&mut self.state) {
            DragState::Dragging { ticket_id, origin } => (ticket_id, origin),
            DragState::Idle => return Err(StageboardError::NoActiveDrag),
        };

        if !board.contains(&ticket_id) {
            debug!(ticket = %ticket_id, "dragged ticket vanished from board");
            return Ok(DragOutcome::Cancelled);
        }

        let target = over_id.and_then(|id| DropTarget::resolve(board, id));
        let Some((target, stage)) = target.and_then(|t| t.stage(board).map(|s| (t, s))) else {
            board.relocate(&ticket_id, origin);
            debug!(ticket = %ticket_id, stage = %origin, "drag cancelled, relocation rolled back");
            return Ok(DragOutcome::Cancelled);
        };

        board.relocate(&ticket_id, stage);

        let sequence = board.stage(stage);
        let from = index_of(&sequence, &ticket_id, stage)?;
        let to = match &target {
            DropTarget::Column(_) => sequence.len() - 1,
            DropTarget::Ticket(over) => index_of(&sequence, over, stage)?,
        };
        board.reorder_within_stage(stage, from, to)?;

        debug!(ticket = %ticket_id, stage = %stage, from, to, "drag committed");
        Ok(DragOutcome::Committed {
            stage,
            batch: reconcile(board, stage),
        })
    }

    /// Aborts the gesture, restoring the dragged ticket's original stage
    pub fn drag_cancel(&mut self, board: &mut BoardSnapshot) {
        if let DragState::Dragging { ticket_id, origin } = std::mem::take(&mut self.state) {
            board.relocate(&ticket_id, origin);
            debug!(ticket = %ticket_id, "drag aborted");
        }
    }
}

fn index_of(
    sequence: &[&Ticket],
    ticket_id: &TicketId,
    stage: Stage,
) -> Result<usize> {
    sequence
        .iter()
        .position(|t| &t.id == ticket_id)
        .ok_or_else(|| StageboardError::IndexOutOfRange {
            stage: stage.to_string(),
            index: sequence.len(),
            len: sequence.len(),
        })
}
