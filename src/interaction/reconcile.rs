//! Persistence reconciliation.
//!
//! Turns one stage of the working board into a batched reorder request. The
//! batch carries every ticket of the stage, since a single move can shift
//! every sibling's index.

use crate::domain::board::BoardSnapshot;
use crate::domain::stage::Stage;
use crate::domain::ticket::TicketId;
use serde::{Deserialize, Serialize};

/// One `{id, stage, order}` triple of a reorder request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderItem {
    pub id: TicketId,
    pub stage: Stage,
    pub order: u32,
}

impl ReorderItem {
    pub fn new(id: TicketId, stage: Stage, order: u32) -> Self {
        Self { id, stage, order }
    }
}

/// A batched reorder request, applied all-or-nothing by the store.
///
/// Serializes as `{"tickets": [{"id", "stage", "order"}, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderBatch {
    pub tickets: Vec<ReorderItem>,
}

impl ReorderBatch {
    pub fn new(tickets: Vec<ReorderItem>) -> Self {
        Self { tickets }
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

/// Builds the reorder batch for one stage of the board.
///
/// Each ticket's `order` is its zero-based index in the stage's sequence,
/// so the result does not depend on the order values currently held.
pub fn reconcile(board: &BoardSnapshot, stage: Stage) -> ReorderBatch {
    let tickets = board
        .stage(stage)
        .into_iter()
        .enumerate()
        .map(|(index, t)| ReorderItem::new(t.id.clone(), stage, index as u32))
        .collect();
    ReorderBatch::new(tickets)
}
