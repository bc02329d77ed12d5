use crate::domain::ticket::{Priority, Ticket};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::str::FromStr;

/// Fields available for sorting tickets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Order,
    Title,
    Stage,
    Created,
    Updated,
    Due,
    Priority,
    SubtaskProgress,
}

/// Sort order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "order" => Ok(SortField::Order),
            "title" => Ok(SortField::Title),
            "stage" => Ok(SortField::Stage),
            "created" => Ok(SortField::Created),
            "updated" => Ok(SortField::Updated),
            "due" => Ok(SortField::Due),
            "priority" => Ok(SortField::Priority),
            "subtask-progress" => Ok(SortField::SubtaskProgress),
            _ => Err(format!(
                "Invalid sort field '{}'. Valid fields: order, title, stage, created, updated, due, priority, subtask-progress",
                s
            )),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Ascending),
            "desc" => Ok(SortOrder::Descending),
            _ => Err(format!(
                "Invalid sort order '{}'. Valid orders: asc, desc",
                s
            )),
        }
    }
}

/// Sorts tickets in place by a field and direction.
///
/// `Order` sorts by stage first, then by `order`, which is the board's
/// reading order. The sort is stable.
///
/// # Examples
/// ```
/// use stageboard_core::domain::sorting::{sort_tickets, SortField, SortOrder};
/// use stageboard_core::domain::{ProjectId, Ticket, TicketId};
///
/// let project = ProjectId::new("p1");
/// let mut tickets = vec![
///     Ticket::new(TicketId::new("t1"), project.clone(), "Charlie".to_string()),
///     Ticket::new(TicketId::new("t2"), project.clone(), "alpha".to_string()),
/// ];
///
/// sort_tickets(&mut tickets, SortField::Title, SortOrder::Ascending);
/// assert_eq!(tickets[0].title, "alpha");
/// ```
pub fn sort_tickets(tickets: &mut [Ticket], field: SortField, order: SortOrder) {
    tickets.sort_by(|a, b| {
        let cmp = match field {
            SortField::Order => a.stage.cmp(&b.stage).then(a.order.cmp(&b.order)),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Stage => a.stage.cmp(&b.stage),
            SortField::Created => a.created_at.cmp(&b.created_at),
            SortField::Updated => a.updated_at.cmp(&b.updated_at),
            SortField::Due => return compare_option_dates(a.due_date, b.due_date, order),
            SortField::Priority => compare_priority(a.priority, b.priority),
            SortField::SubtaskProgress => compare_subtask_progress(a, b),
        };

        match order {
            SortOrder::Ascending => cmp,
            SortOrder::Descending => cmp.reverse(),
        }
    });
}

/// Tickets without a due date always sort last, in either direction
fn compare_option_dates(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
    order: SortOrder,
) -> Ordering {
    match (a, b) {
        (Some(a_date), Some(b_date)) => match order {
            SortOrder::Ascending => a_date.cmp(&b_date),
            SortOrder::Descending => b_date.cmp(&a_date),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Unset priority ranks as MEDIUM
fn compare_priority(a: Option<Priority>, b: Option<Priority>) -> Ordering {
    a.unwrap_or_default().cmp(&b.unwrap_or_default())
}

/// Tickets with no subtasks count as 0% complete
fn compare_subtask_progress(a: &Ticket, b: &Ticket) -> Ordering {
    fn progress_pct(t: &Ticket) -> f64 {
        match t.subtask_progress() {
            (_, 0) => 0.0,
            (done, total) => done as f64 / total as f64,
        }
    }

    progress_pct(a)
        .partial_cmp(&progress_pct(b))
        .unwrap_or(Ordering::Equal)
}
