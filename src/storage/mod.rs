use crate::{
    config::{StageboardConfig, StorageBackend},
    domain::{Engineer, EngineerId, Project, ProjectId, Ticket, TicketId},
    error::{Result, StageboardError},
    interaction::ReorderBatch,
};
use async_trait::async_trait;
use std::{collections::HashSet, path::Path, sync::Arc};

#[cfg(feature = "file-storage")]
pub mod file_storage;
pub mod memory_storage;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

/// Storage trait for persisting projects, tickets and engineers
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initializes the storage backend
    async fn initialize(&self) -> Result<()>;

    /// Checks if the backend has been initialized
    async fn is_initialized(&self) -> bool;

    /// Saves a project
    async fn save_project(&self, project: &Project) -> Result<()>;

    /// Loads a project by ID
    async fn load_project(&self, id: &ProjectId) -> Result<Project>;

    /// Lists all projects, newest first
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Deletes a project together with all of its tickets
    async fn delete_project(&self, id: &ProjectId) -> Result<()>;

    /// Saves a ticket
    async fn save_ticket(&self, ticket: &Ticket) -> Result<()>;

    /// Loads a ticket by ID
    async fn load_ticket(&self, id: &TicketId) -> Result<Ticket>;

    /// Lists a project's tickets sorted by `order` ascending
    async fn list_tickets(&self, project_id: &ProjectId) -> Result<Vec<Ticket>>;

    /// Lists the tickets of every project
    async fn list_all_tickets(&self) -> Result<Vec<Ticket>>;

    /// Searches tickets whose title, description or subtask titles contain
    /// the query (case-insensitive)
    async fn search_tickets(&self, query: &str) -> Result<Vec<Ticket>> {
        let tickets = self.list_all_tickets().await?;
        Ok(tickets
            .into_iter()
            .filter(|t| matches_query(t, query))
            .collect())
    }

    /// Deletes a ticket
    async fn delete_ticket(&self, id: &TicketId) -> Result<()>;

    /// Applies every `{id, stage, order}` of a batch, or none of them.
    ///
    /// The whole batch is validated before anything is written.
    async fn apply_reorder(&self, batch: &ReorderBatch) -> Result<()>;

    /// Saves an engineer
    async fn save_engineer(&self, engineer: &Engineer) -> Result<()>;

    /// Loads an engineer by ID
    async fn load_engineer(&self, id: &EngineerId) -> Result<Engineer>;

    /// Lists engineers sorted by name
    async fn list_engineers(&self) -> Result<Vec<Engineer>>;

    /// Deletes an engineer and clears their ticket assignments
    async fn delete_engineer(&self, id: &EngineerId) -> Result<()>;
}

/// Opens the backend selected in the configuration.
///
/// Relative storage paths resolve against `project_root`.
pub fn open_storage(
    config: &StageboardConfig,
    project_root: impl AsRef<Path>,
) -> Result<Arc<dyn Storage>> {
    let root = project_root.as_ref();
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(memory_storage::MemoryStorage::new())),
        #[cfg(feature = "file-storage")]
        StorageBackend::File => {
            let path = config.storage.resolve_path(root);
            Ok(Arc::new(file_storage::FileStorage::new(path)))
        }
        #[cfg(not(feature = "file-storage"))]
        StorageBackend::File => Err(StageboardError::ConfigError(
            "file storage requires the `file-storage` feature".to_string(),
        )),
        #[cfg(feature = "sqlite-storage")]
        StorageBackend::Sqlite => {
            let path = config.storage.resolve_path(root).join("stageboard.db");
            Ok(Arc::new(sqlite_storage::SqliteStorage::new(path)?))
        }
        #[cfg(not(feature = "sqlite-storage"))]
        StorageBackend::Sqlite => Err(StageboardError::ConfigError(
            "sqlite storage requires the `sqlite-storage` feature".to_string(),
        )),
    }
}

/// Case-insensitive match over title, description and subtask titles
pub(crate) fn matches_query(ticket: &Ticket, query: &str) -> bool {
    let query = query.to_lowercase();

    ticket.title.to_lowercase().contains(&query)
        || ticket
            .description
            .as_ref()
            .map(|d| d.to_lowercase().contains(&query))
            .unwrap_or(false)
        || ticket
            .subtasks
            .iter()
            .any(|s| s.title.to_lowercase().contains(&query))
}

/// Batch checks shared by every backend: non-empty, no repeated ids, and
/// every id known to the store.
pub(crate) fn validate_batch(
    batch: &ReorderBatch,
    exists: impl Fn(&TicketId) -> bool,
) -> Result<()> {
    if batch.is_empty() {
        return Err(StageboardError::ReorderRejected(
            "tickets array is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for item in &batch.tickets {
        if !seen.insert(&item.id) {
            return Err(StageboardError::ReorderRejected(format!(
                "ticket {} appears more than once",
                item.id
            )));
        }
        if !exists(&item.id) {
            return Err(StageboardError::ReorderRejected(format!(
                "unknown ticket {}",
                item.id
            )));
        }
    }
    Ok(())
}

/// Sorts a project's tickets the way the board reads them
pub(crate) fn sort_by_order(tickets: &mut [Ticket]) {
    tickets.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Stage;
    use crate::interaction::ReorderItem;

    #[test]
    fn test_validate_batch() {
        let known = |id: &TicketId| id.as_str() != "ghost";
        let item = |id: &str| ReorderItem::new(TicketId::new(id), Stage::Dev, 0);

        assert!(validate_batch(&ReorderBatch::new(vec![item("a"), item("b")]), known).is_ok());

        assert!(matches!(
            validate_batch(&ReorderBatch::default(), known),
            Err(StageboardError::ReorderRejected(_))
        ));
        assert!(validate_batch(&ReorderBatch::new(vec![item("a"), item("ghost")]), known).is_err());
        assert!(validate_batch(&ReorderBatch::new(vec![item("a"), item("a")]), known).is_err());
    }

    #[test]
    fn test_matches_query() {
        let mut ticket = Ticket::new(
            TicketId::new("t1"),
            ProjectId::new("p1"),
            "Checkout flow".to_string(),
        );
        ticket.set_description(Some("Stripe payments".to_string()));
        ticket.add_subtask("Write receipts email".to_string()).unwrap();

        assert!(matches_query(&ticket, "CHECKOUT"));
        assert!(matches_query(&ticket, "stripe"));
        assert!(matches_query(&ticket, "receipts"));
        assert!(!matches_query(&ticket, "inventory"));
    }

    #[tokio::test]
    async fn test_open_memory_storage() {
        let mut config = StageboardConfig::default();
        config.storage.backend = StorageBackend::Memory;

        let storage = open_storage(&config, ".").unwrap();
        assert!(storage.is_initialized().await);
        assert!(storage.list_projects().await.unwrap().is_empty());
    }
}
