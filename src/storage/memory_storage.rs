//! Ephemeral in-memory backend, for tests and short-lived sessions.

use crate::{
    domain::{Engineer, EngineerId, Project, ProjectId, Ticket, TicketId},
    error::{Result, StageboardError},
    interaction::ReorderBatch,
    storage::{sort_by_order, validate_batch, Storage},
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Default)]
struct Inner {
    projects: HashMap<ProjectId, Project>,
    tickets: HashMap<TicketId, Ticket>,
    engineers: HashMap<EngineerId, Engineer>,
}

/// Thread-safe in-memory storage
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        true
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn load_project(&self, id: &ProjectId) -> Result<Project> {
        self.inner
            .read()
            .await
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| StageboardError::ProjectNotFound(id.to_string()))
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> =
            self.inner.read().await.projects.values().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.projects.remove(id).is_none() {
            return Err(StageboardError::ProjectNotFound(id.to_string()));
        }
        inner.tickets.retain(|_, t| &t.project_id != id);
        Ok(())
    }

    async fn save_ticket(&self, ticket: &Ticket) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    async fn load_ticket(&self, id: &TicketId) -> Result<Ticket> {
        self.inner
            .read()
            .await
            .tickets
            .get(id)
            .cloned()
            .ok_or_else(|| StageboardError::TicketNotFound(id.to_string()))
    }

    async fn list_tickets(&self, project_id: &ProjectId) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .inner
            .read()
            .await
            .tickets
            .values()
            .filter(|t| &t.project_id == project_id)
            .cloned()
            .collect();
        sort_by_order(&mut tickets);
        Ok(tickets)
    }

    async fn list_all_tickets(&self) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self.inner.read().await.tickets.values().cloned().collect();
        sort_by_order(&mut tickets);
        Ok(tickets)
    }

    async fn delete_ticket(&self, id: &TicketId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .tickets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StageboardError::TicketNotFound(id.to_string()))
    }

    async fn apply_reorder(&self, batch: &ReorderBatch) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Err(e) = validate_batch(batch, |id| inner.tickets.contains_key(id)) {
            warn!(error = %e, "rejected reorder batch");
            return Err(e);
        }

        for item in &batch.tickets {
            if let Some(ticket) = inner.tickets.get_mut(&item.id) {
                ticket.place(item.stage, item.order);
            }
        }
        Ok(())
    }

    async fn save_engineer(&self, engineer: &Engineer) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.engineers.insert(engineer.id.clone(), engineer.clone());
        Ok(())
    }

    async fn load_engineer(&self, id: &EngineerId) -> Result<Engineer> {
        self.inner
            .read()
            .await
            .engineers
            .get(id)
            .cloned()
            .ok_or_else(|| StageboardError::EngineerNotFound(id.to_string()))
    }

    async fn list_engineers(&self) -> Result<Vec<Engineer>> {
        let mut engineers: Vec<Engineer> =
            self.inner.read().await.engineers.values().cloned().collect();
        engineers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(engineers)
    }

    async fn delete_engineer(&self, id: &EngineerId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.engineers.remove(id).is_none() {
            return Err(StageboardError::EngineerNotFound(id.to_string()));
        }
        for ticket in inner.tickets.values_mut() {
            if ticket.assignee_id.as_ref() == Some(id) {
                ticket.assign(None);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Stage;
    use crate::interaction::ReorderItem;

    async fn seeded() -> (MemoryStorage, Project) {
        let storage = MemoryStorage::new();
        let project = Project::new("Board".to_string());
        storage.save_project(&project).await.unwrap();
        for (id, order) in [("a", 0), ("b", 1)] {
            let ticket = Ticket::new(TicketId::new(id), project.id.clone(), id.to_string())
                .placed(Stage::Dev, order);
            storage.save_ticket(&ticket).await.unwrap();
        }
        (storage, project)
    }

    #[tokio::test]
    async fn test_apply_reorder() {
        let (storage, project) = seeded().await;

        let batch = ReorderBatch::new(vec![
            ReorderItem::new(TicketId::new("b"), Stage::Qa, 0),
            ReorderItem::new(TicketId::new("a"), Stage::Qa, 1),
        ]);
        storage.apply_reorder(&batch).await.unwrap();

        let tickets = storage.list_tickets(&project.id).await.unwrap();
        let placed: Vec<_> = tickets
            .iter()
            .map(|t| (t.id.as_str(), t.stage, t.order))
            .collect();
        assert_eq!(placed, vec![("b", Stage::Qa, 0), ("a", Stage::Qa, 1)]);
    }

    #[tokio::test]
    async fn test_apply_reorder_is_all_or_nothing() {
        let (storage, _) = seeded().await;

        let batch = ReorderBatch::new(vec![
            ReorderItem::new(TicketId::new("a"), Stage::Finish, 5),
            ReorderItem::new(TicketId::new("ghost"), Stage::Finish, 6),
        ]);
        assert!(storage.apply_reorder(&batch).await.is_err());

        let a = storage.load_ticket(&TicketId::new("a")).await.unwrap();
        assert_eq!((a.stage, a.order), (Stage::Dev, 0));
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let (storage, project) = seeded().await;
        storage.delete_project(&project.id).await.unwrap();

        assert!(storage.list_all_tickets().await.unwrap().is_empty());
        assert!(storage.load_project(&project.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_engineer_unassigns() {
        let (storage, _) = seeded().await;
        let engineer = Engineer::new("Alice".to_string(), "alice@example.com".to_string());
        storage.save_engineer(&engineer).await.unwrap();

        let mut a = storage.load_ticket(&TicketId::new("a")).await.unwrap();
        a.assign(Some(engineer.id.clone()));
        storage.save_ticket(&a).await.unwrap();

        storage.delete_engineer(&engineer.id).await.unwrap();
        let a = storage.load_ticket(&TicketId::new("a")).await.unwrap();
        assert!(a.assignee_id.is_none());
    }
}
