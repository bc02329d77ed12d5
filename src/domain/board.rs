//! Board state model.
//!
//! A board is the flat list of one project's tickets. Grouping by stage and
//! sorting by `order` is always derived from that list, never stored. The
//! free functions are pure: they take a ticket slice and return a new list.
//! [`BoardSnapshot`] owns a list and applies them in place.

use crate::domain::stage::Stage;
use crate::domain::ticket::{Ticket, TicketId};
use crate::error::{Result, StageboardError};
use std::collections::{BTreeMap, HashMap};

/// Stage to ordered tickets. Every stage has an entry, possibly empty.
pub type StageGroups<'a> = BTreeMap<Stage, Vec<&'a Ticket>>;

/// Partitions tickets by stage and sorts each partition by `order`.
///
/// The sort is stable: tickets sharing an `order` value keep their relative
/// position from the flat list.
pub fn group_by_stage(tickets: &[Ticket]) -> StageGroups<'_> {
    let mut groups: StageGroups<'_> = Stage::ALL.iter().map(|s| (*s, Vec::new())).collect();

    for ticket in tickets {
        groups.entry(ticket.stage).or_default().push(ticket);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|t| t.order);
    }

    groups
}

/// Ordered tickets of a single stage
pub fn stage_sequence(tickets: &[Ticket], stage: Stage) -> Vec<&Ticket> {
    let mut sequence: Vec<&Ticket> = tickets.iter().filter(|t| t.stage == stage).collect();
    sequence.sort_by_key(|t| t.order);
    sequence
}

/// Sets one ticket's stage, leaving every `order` untouched.
///
/// The moved ticket keeps the `order` it had in its old stage until the
/// target stage is reindexed. Unknown ids and same-stage moves return an
/// identical list.
pub fn relocate(tickets: &[Ticket], ticket_id: &TicketId, target: Stage) -> Vec<Ticket> {
    tickets
        .iter()
        .map(|t| {
            if &t.id == ticket_id && t.stage != target {
                let mut moved = t.clone();
                moved.stage = target;
                moved
            } else {
                t.clone()
            }
        })
        .collect()
}

/// Moves the ticket at `from` in a stage's sequence to `to`, then reindexes
/// the whole stage so its orders are exactly `0..n`.
///
/// Elements between the two positions shift by one. Reindexing happens even
/// when `from == to`, which clears duplicate or gapped orders left by
/// cross-stage relocation.
pub fn reorder_within_stage(
    tickets: &[Ticket],
    stage: Stage,
    from: usize,
    to: usize,
) -> Result<Vec<Ticket>> {
    let mut sequence: Vec<TicketId> = stage_sequence(tickets, stage)
        .into_iter()
        .map(|t| t.id.clone())
        .collect();

    let len = sequence.len();
    for index in [from, to] {
        if index >= len {
            return Err(StageboardError::IndexOutOfRange {
                stage: stage.to_string(),
                index,
                len,
            });
        }
    }

    let moved = sequence.remove(from);
    sequence.insert(to, moved);

    let positions: HashMap<&TicketId, u32> = sequence
        .iter()
        .enumerate()
        .map(|(i, id)| (id, i as u32))
        .collect();

    Ok(tickets
        .iter()
        .map(|t| {
            let mut t = t.clone();
            if t.stage == stage {
                if let Some(&order) = positions.get(&t.id) {
                    t.order = order;
                }
            }
            t
        })
        .collect())
}

/// Composite `id:stage:order` key over all tickets, in list order.
///
/// Two lists with the same key render the same board.
pub fn snapshot_key(tickets: &[Ticket]) -> String {
    tickets
        .iter()
        .map(|t| format!("{}:{}:{}", t.id, t.stage, t.order))
        .collect::<Vec<_>>()
        .join(",")
}

/// In-memory board for one project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardSnapshot {
    tickets: Vec<Ticket>,
}

impl BoardSnapshot {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        Self { tickets }
    }

    /// The flat ticket list
    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn into_tickets(self) -> Vec<Ticket> {
        self.tickets
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn get(&self, ticket_id: &TicketId) -> Option<&Ticket> {
        self.tickets.iter().find(|t| &t.id == ticket_id)
    }

    pub fn contains(&self, ticket_id: &TicketId) -> bool {
        self.get(ticket_id).is_some()
    }

    pub fn groups(&self) -> StageGroups<'_> {
        group_by_stage(&self.tickets)
    }

    pub fn stage(&self, stage: Stage) -> Vec<&Ticket> {
        stage_sequence(&self.tickets, stage)
    }

    /// Index of a ticket within its stage's ordered sequence
    pub fn position(&self, ticket_id: &TicketId) -> Option<(Stage, usize)> {
        let ticket = self.get(ticket_id)?;
        self.stage(ticket.stage)
            .iter()
            .position(|t| &t.id == ticket_id)
            .map(|index| (ticket.stage, index))
    }

    pub fn key(&self) -> String {
        snapshot_key(&self.tickets)
    }

    /// Applies [`relocate`]. Returns whether any ticket changed.
    pub fn relocate(&mut self, ticket_id: &TicketId, target: Stage) -> bool {
        let changed = self
            .get(ticket_id)
            .map(|t| t.stage != target)
            .unwrap_or(false);
        if changed {
            self.tickets = relocate(&self.tickets, ticket_id, target);
        }
        changed
    }

    /// Applies [`reorder_within_stage`]
    pub fn reorder_within_stage(&mut self, stage: Stage, from: usize, to: usize) -> Result<()> {
        self.tickets = reorder_within_stage(&self.tickets, stage, from, to)?;
        Ok(())
    }
}
