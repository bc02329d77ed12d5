//! Due-date dashboard across all projects.

use crate::domain::sorting::{sort_tickets, SortField, SortOrder};
use crate::domain::stage::Stage;
use crate::domain::ticket::Ticket;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Unfinished tickets with a due date, bucketed around today (UTC)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dashboard {
    pub overdue: Vec<Ticket>,
    pub due_today: Vec<Ticket>,
    pub upcoming: Vec<Ticket>,
}

impl Dashboard {
    /// Buckets tickets relative to the start of `now`'s day.
    ///
    /// `upcoming` runs from tomorrow through `upcoming_days` days out.
    /// Finished and undated tickets are skipped. Buckets are sorted by due
    /// date.
    pub fn build(
        tickets: impl IntoIterator<Item = Ticket>,
        now: DateTime<Utc>,
        upcoming_days: u32,
    ) -> Self {
        let today_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);
        let today_end = today_start + Duration::days(1);
        let upcoming_end = today_end + Duration::days(i64::from(upcoming_days));

        let mut dashboard = Self::default();
        for ticket in tickets {
            if ticket.stage.is_finished() {
                continue;
            }
            let Some(due) = ticket.due_date else {
                continue;
            };

            if due < today_start {
                dashboard.overdue.push(ticket);
            } else if due < today_end {
                dashboard.due_today.push(ticket);
            } else if due < upcoming_end {
                dashboard.upcoming.push(ticket);
            }
        }

        for bucket in [
            &mut dashboard.overdue,
            &mut dashboard.due_today,
            &mut dashboard.upcoming,
        ] {
            sort_tickets(bucket, SortField::Due, SortOrder::Ascending);
        }
        dashboard
    }

    pub fn is_empty(&self) -> bool {
        self.overdue.is_empty() && self.due_today.is_empty() && self.upcoming.is_empty()
    }
}

/// Ticket totals per stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub total: usize,
    pub by_stage: BTreeMap<Stage, usize>,
}

impl StageCounts {
    pub fn from_tickets(tickets: &[Ticket]) -> Self {
        let mut by_stage: BTreeMap<Stage, usize> = Stage::ALL.iter().map(|s| (*s, 0)).collect();
        for ticket in tickets {
            *by_stage.entry(ticket.stage).or_default() += 1;
        }
        Self {
            total: tickets.len(),
            by_stage,
        }
    }

    pub fn get(&self, stage: Stage) -> usize {
        self.by_stage.get(&stage).copied().unwrap_or(0)
    }
}
