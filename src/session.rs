//! Board session: the state container a host board view owns.
//!
//! Holds two snapshots of one project's tickets. `committed` is the last
//! authoritative fetch; `working` is what the user sees, including drag
//! results not yet confirmed by the store. A finished drag submits its
//! reorder batch on the runtime and returns immediately; the host may keep
//! interacting while the write is in flight.

use crate::{
    domain::{board::StageGroups, BoardSnapshot, ProjectId, Stage, Ticket, TicketId},
    error::{Result, StageboardError},
    interaction::{DragController, DragOutcome, ReorderBatch},
    storage::Storage,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, warn};

/// An in-flight reorder write.
///
/// Dropping it detaches the write; it still runs to completion.
#[derive(Debug)]
pub struct PendingReconciliation {
    stage: Stage,
    handle: JoinHandle<Result<()>>,
}

impl PendingReconciliation {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Waits for the store's answer
    pub async fn wait(self) -> Result<()> {
        self.handle.await.map_err(|e| {
            StageboardError::StorageError(format!("reconciliation task failed: {}", e))
        })?
    }
}

pub struct BoardSession {
    project_id: ProjectId,
    storage: Arc<dyn Storage>,
    runtime: Handle,
    committed: BoardSnapshot,
    working: BoardSnapshot,
    controller: DragController,
    stale: Arc<AtomicBool>,
}

impl BoardSession {
    /// Loads a project's board. Must be called from within a tokio runtime;
    /// later reconciliations are spawned on that runtime.
    pub async fn open(storage: Arc<dyn Storage>, project_id: ProjectId) -> Result<Self> {
        storage.load_project(&project_id).await?;
        let tickets = storage.list_tickets(&project_id).await?;
        let snapshot = BoardSnapshot::new(tickets);
        debug!(project = %project_id, tickets = snapshot.tickets().len(), "board opened");

        Ok(Self {
            project_id,
            storage,
            runtime: Handle::current(),
            committed: snapshot.clone(),
            working: snapshot,
            controller: DragController::new(),
            stale: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// The board as the user currently sees it
    pub fn board(&self) -> &BoardSnapshot {
        &self.working
    }

    /// The board as last fetched from the store
    pub fn committed(&self) -> &BoardSnapshot {
        &self.committed
    }

    pub fn groups(&self) -> StageGroups<'_> {
        self.working.groups()
    }

    pub fn active_ticket(&self) -> Option<&Ticket> {
        self.controller.active().and_then(|id| self.working.get(id))
    }

    /// Whether local changes differ from the last fetch
    pub fn has_unconfirmed_changes(&self) -> bool {
        self.working.key() != self.committed.key()
    }

    /// Set when a reorder write was rejected; cleared by the next sync
    pub fn needs_refresh(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Adopts authoritative ticket data.
    ///
    /// The working board is rebuilt only when the incoming tickets differ
    /// from it by id, stage or order. Returns whether it was rebuilt.
    pub fn sync(&mut self, tickets: Vec<Ticket>) -> bool {
        let incoming = BoardSnapshot::new(tickets);
        let changed = incoming.key() != self.working.key();

        self.committed = incoming.clone();
        if changed {
            self.working = incoming;
        }
        self.stale.store(false, Ordering::SeqCst);
        changed
    }

    /// Fetches the project's tickets and syncs with them
    pub async fn refresh(&mut self) -> Result<bool> {
        let tickets = self.storage.list_tickets(&self.project_id).await?;
        let changed = self.sync(tickets);
        debug!(project = %self.project_id, changed, "board refreshed");
        Ok(changed)
    }

    pub fn drag_start(&mut self, ticket_id: &TicketId) -> Result<()> {
        self.controller.drag_start(&self.working, ticket_id)
    }

    pub fn drag_over(&mut self, over_id: Option<&str>) -> bool {
        self.controller.drag_over(&mut self.working, over_id)
    }

    /// Finishes the drag. A committed drop starts exactly one reorder write
    /// for the target stage; a cancelled one starts none.
    pub fn drag_end(&mut self, over_id: Option<&str>) -> Result<Option<PendingReconciliation>> {
        match self.controller.drag_end(&mut self.working, over_id)? {
            DragOutcome::Committed { stage, batch } => Ok(Some(self.submit(stage, batch))),
            DragOutcome::Cancelled => Ok(None),
        }
    }

    pub fn drag_cancel(&mut self) {
        self.controller.drag_cancel(&mut self.working);
    }

    fn submit(&self, stage: Stage, batch: ReorderBatch) -> PendingReconciliation {
        let storage = Arc::clone(&self.storage);
        let stale = Arc::clone(&self.stale);
        debug!(stage = %stage, tickets = batch.len(), "submitting reorder");

        let handle = self.runtime.spawn(async move {
            let result = storage.apply_reorder(&batch).await;
            if let Err(e) = &result {
                warn!(
                    stage = %stage,
                    error = %e,
                    "reorder failed, board will resync on next refresh"
                );
                stale.store(true, Ordering::SeqCst);
            }
            result
        });

        PendingReconciliation { stage, handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Project;
    use crate::storage::memory_storage::MemoryStorage;

    async fn seeded(tickets: &[(&str, Stage, u32)]) -> (Arc<MemoryStorage>, ProjectId) {
        let storage = Arc::new(MemoryStorage::new());
        let project = Project::new("Board".to_string());
        storage.save_project(&project).await.unwrap();
        for (id, stage, order) in tickets {
            let ticket = Ticket::new(TicketId::new(*id), project.id.clone(), id.to_string())
                .placed(*stage, *order);
            storage.save_ticket(&ticket).await.unwrap();
        }
        (storage, project.id)
    }

    fn stage_ids(session: &BoardSession, stage: Stage) -> Vec<String> {
        session.groups()[&stage]
            .iter()
            .map(|t| t.id.to_string())
            .collect()
    }

    async fn stored(storage: &MemoryStorage, id: &str) -> (Stage, u32) {
        let t = storage.load_ticket(&TicketId::new(id)).await.unwrap();
        (t.stage, t.order)
    }

    #[tokio::test]
    async fn test_open_unknown_project() {
        let storage = Arc::new(MemoryStorage::new());
        let result = BoardSession::open(storage, ProjectId::new("missing")).await;
        assert!(matches!(result, Err(StageboardError::ProjectNotFound(_))));
    }

    #[tokio::test]
    async fn test_reorder_within_stage_is_persisted() {
        let (storage, project) =
            seeded(&[("A", Stage::Dev, 0), ("B", Stage::Dev, 1), ("C", Stage::Dev, 2)]).await;
        let mut session = BoardSession::open(storage.clone(), project).await.unwrap();

        session.drag_start(&TicketId::new("C")).unwrap();
        session.drag_over(Some("A"));
        let pending = session.drag_end(Some("A")).unwrap().unwrap();

        assert_eq!(stage_ids(&session, Stage::Dev), vec!["C", "A", "B"]);
        assert!(session.has_unconfirmed_changes());
        assert_eq!(pending.stage(), Stage::Dev);
        pending.wait().await.unwrap();

        assert_eq!(stored(&storage, "C").await, (Stage::Dev, 0));
        assert_eq!(stored(&storage, "A").await, (Stage::Dev, 1));
        assert_eq!(stored(&storage, "B").await, (Stage::Dev, 2));

        session.refresh().await.unwrap();
        assert_eq!(stage_ids(&session, Stage::Dev), vec!["C", "A", "B"]);
        assert!(!session.has_unconfirmed_changes());
    }

    #[tokio::test]
    async fn test_move_to_empty_stage_is_persisted() {
        let (storage, project) = seeded(&[("X", Stage::Start, 0)]).await;
        let mut session = BoardSession::open(storage.clone(), project).await.unwrap();

        session.drag_start(&TicketId::new("X")).unwrap();
        assert!(session.drag_over(Some("QA")));
        session.drag_end(Some("QA")).unwrap().unwrap().wait().await.unwrap();

        assert!(stage_ids(&session, Stage::Start).is_empty());
        assert_eq!(stage_ids(&session, Stage::Qa), vec!["X"]);
        assert_eq!(stored(&storage, "X").await, (Stage::Qa, 0));
    }

    #[tokio::test]
    async fn test_drop_outside_changes_nothing() {
        let (storage, project) = seeded(&[("X", Stage::Start, 0), ("Y", Stage::Dev, 0)]).await;
        let mut session = BoardSession::open(storage.clone(), project).await.unwrap();
        let before = session.board().clone();

        session.drag_start(&TicketId::new("X")).unwrap();
        session.drag_over(Some("Y"));
        assert_eq!(session.active_ticket().unwrap().stage, Stage::Dev);

        assert!(session.drag_end(None).unwrap().is_none());
        assert_eq!(session.board(), &before);
        assert!(!session.has_unconfirmed_changes());
        assert_eq!(stored(&storage, "X").await, (Stage::Start, 0));
    }

    #[tokio::test]
    async fn test_rejected_reorder_flags_refresh() {
        let (storage, project) =
            seeded(&[("A", Stage::Dev, 0), ("B", Stage::Dev, 1), ("C", Stage::Dev, 2)]).await;
        let mut session = BoardSession::open(storage.clone(), project).await.unwrap();

        storage.delete_ticket(&TicketId::new("B")).await.unwrap();

        session.drag_start(&TicketId::new("C")).unwrap();
        let pending = session.drag_end(Some("A")).unwrap().unwrap();
        assert!(matches!(
            pending.wait().await,
            Err(StageboardError::ReorderRejected(_))
        ));

        assert!(session.needs_refresh());
        assert_eq!(stage_ids(&session, Stage::Dev), vec!["C", "A", "B"]);
        assert_eq!(stored(&storage, "C").await, (Stage::Dev, 2));

        assert!(session.refresh().await.unwrap());
        assert!(!session.needs_refresh());
        assert_eq!(stage_ids(&session, Stage::Dev), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_next_drag_does_not_wait_for_pending_write() {
        let (storage, project) = seeded(&[
            ("A", Stage::Start, 0),
            ("B", Stage::Start, 1),
            ("C", Stage::Dev, 0),
        ])
        .await;
        let mut session = BoardSession::open(storage.clone(), project).await.unwrap();

        session.drag_start(&TicketId::new("B")).unwrap();
        let first = session.drag_end(Some("A")).unwrap().unwrap();

        session.drag_start(&TicketId::new("A")).unwrap();
        session.drag_over(Some("DEV"));
        let second = session.drag_end(Some("DEV")).unwrap().unwrap();

        first.wait().await.unwrap();
        second.wait().await.unwrap();

        assert_eq!(stage_ids(&session, Stage::Dev), vec!["C", "A"]);
        assert_eq!(stored(&storage, "B").await, (Stage::Start, 0));
        assert_eq!(stored(&storage, "C").await, (Stage::Dev, 0));
    }

    #[tokio::test]
    async fn test_sync_ignores_identical_data() {
        let (storage, project) = seeded(&[("A", Stage::Dev, 0), ("B", Stage::Qa, 0)]).await;
        let mut session = BoardSession::open(storage.clone(), project).await.unwrap();

        assert!(!session.refresh().await.unwrap());

        let mut b = storage.load_ticket(&TicketId::new("B")).await.unwrap();
        b.place(Stage::Finish, 0);
        storage.save_ticket(&b).await.unwrap();

        assert!(session.refresh().await.unwrap());
        assert_eq!(stage_ids(&session, Stage::Finish), vec!["B"]);
    }
}
