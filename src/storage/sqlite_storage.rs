use crate::{
    domain::{Engineer, EngineerId, Project, ProjectId, Ticket, TicketId},
    error::{Result, StageboardError},
    interaction::ReorderBatch,
    storage::{sort_by_order, validate_batch, Storage},
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::{
    collections::HashMap,
    path::Path,
    sync::{Mutex, MutexGuard},
};
use tracing::warn;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tickets (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    stage TEXT NOT NULL,
    ord INTEGER NOT NULL,
    assignee_id TEXT,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tickets_project_stage ON tickets (project_id, stage, ord);
CREATE TABLE IF NOT EXISTS engineers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    data TEXT NOT NULL
);
";

/// SQLite-based storage backend.
///
/// Indexed columns mirror the fields queries filter on; the full record is
/// kept as JSON in `data`.
pub struct SqliteStorage {
    connection: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) the database file and ensures the schema
    pub fn new(database_path: impl AsRef<Path>) -> Result<Self> {
        let path = database_path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database
    pub fn new_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| StageboardError::StorageError("connection lock poisoned".to_string()))
    }

    fn query_records<T: serde::de::DeserializeOwned>(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<T>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        Ok(records)
    }

    fn write_ticket(conn: &Connection, ticket: &Ticket) -> Result<()> {
        conn.execute(
            "INSERT INTO tickets (id, project_id, stage, ord, assignee_id, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                stage = excluded.stage,
                ord = excluded.ord,
                assignee_id = excluded.assignee_id,
                data = excluded.data",
            params![
                ticket.id.as_str(),
                ticket.project_id.as_str(),
                ticket.stage.as_str(),
                ticket.order,
                ticket.assignee_id.as_ref().map(|a| a.as_str()),
                serde_json::to_string(ticket)?,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn initialize(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        let Ok(conn) = self.conn() else {
            return false;
        };
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'tickets'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count > 0)
        .unwrap_or(false)
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO projects (id, created_at, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            params![
                project.id.as_str(),
                project.created_at.to_rfc3339(),
                serde_json::to_string(project)?,
            ],
        )?;
        Ok(())
    }

    async fn load_project(&self, id: &ProjectId) -> Result<Project> {
        let data: Option<String> = self
            .conn()?
            .query_row(
                "SELECT data FROM projects WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let data = data.ok_or_else(|| StageboardError::ProjectNotFound(id.to_string()))?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = self.conn()?;
        Self::query_records(&conn, "SELECT data FROM projects ORDER BY created_at DESC", [])
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM projects WHERE id = ?1", [id.as_str()])?;
        if removed == 0 {
            return Err(StageboardError::ProjectNotFound(id.to_string()));
        }
        tx.execute("DELETE FROM tickets WHERE project_id = ?1", [id.as_str()])?;
        tx.commit()?;
        Ok(())
    }

    async fn save_ticket(&self, ticket: &Ticket) -> Result<()> {
        let conn = self.conn()?;
        Self::write_ticket(&conn, ticket)
    }

    async fn load_ticket(&self, id: &TicketId) -> Result<Ticket> {
        let data: Option<String> = self
            .conn()?
            .query_row(
                "SELECT data FROM tickets WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let data = data.ok_or_else(|| StageboardError::TicketNotFound(id.to_string()))?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn list_tickets(&self, project_id: &ProjectId) -> Result<Vec<Ticket>> {
        let conn = self.conn()?;
        let mut tickets: Vec<Ticket> = Self::query_records(
            &conn,
            "SELECT data FROM tickets WHERE project_id = ?1 ORDER BY ord",
            [project_id.as_str()],
        )?;
        sort_by_order(&mut tickets);
        Ok(tickets)
    }

    async fn list_all_tickets(&self) -> Result<Vec<Ticket>> {
        let conn = self.conn()?;
        let mut tickets: Vec<Ticket> =
            Self::query_records(&conn, "SELECT data FROM tickets ORDER BY ord", [])?;
        sort_by_order(&mut tickets);
        Ok(tickets)
    }

    async fn delete_ticket(&self, id: &TicketId) -> Result<()> {
        let removed = self
            .conn()?
            .execute("DELETE FROM tickets WHERE id = ?1", [id.as_str()])?;
        if removed == 0 {
            return Err(StageboardError::TicketNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn apply_reorder(&self, batch: &ReorderBatch) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut loaded: HashMap<TicketId, Ticket> = HashMap::new();
        for item in &batch.tickets {
            let data: Option<String> = tx
                .query_row(
                    "SELECT data FROM tickets WHERE id = ?1",
                    [item.id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(data) = data {
                loaded.insert(item.id.clone(), serde_json::from_str(&data)?);
            }
        }
        if let Err(e) = validate_batch(batch, |id| loaded.contains_key(id)) {
            warn!(error = %e, "rejected reorder batch");
            return Err(e);
        }

        for item in &batch.tickets {
            if let Some(ticket) = loaded.get_mut(&item.id) {
                ticket.place(item.stage, item.order);
                Self::write_ticket(&tx, ticket)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn save_engineer(&self, engineer: &Engineer) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO engineers (id, name, email, data) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                data = excluded.data",
            params![
                engineer.id.as_str(),
                engineer.name,
                engineer.email,
                serde_json::to_string(engineer)?,
            ],
        )?;
        Ok(())
    }

    async fn load_engineer(&self, id: &EngineerId) -> Result<Engineer> {
        let data: Option<String> = self
            .conn()?
            .query_row(
                "SELECT data FROM engineers WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let data = data.ok_or_else(|| StageboardError::EngineerNotFound(id.to_string()))?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn list_engineers(&self) -> Result<Vec<Engineer>> {
        let conn = self.conn()?;
        Self::query_records(&conn, "SELECT data FROM engineers ORDER BY name", [])
    }

    async fn delete_engineer(&self, id: &EngineerId) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM engineers WHERE id = ?1", [id.as_str()])?;
        if removed == 0 {
            return Err(StageboardError::EngineerNotFound(id.to_string()));
        }

        let assigned: Vec<Ticket> = Self::query_records(
            &tx,
            "SELECT data FROM tickets WHERE assignee_id = ?1",
            [id.as_str()],
        )?;
        for mut ticket in assigned {
            ticket.assign(None);
            Self::write_ticket(&tx, &ticket)?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Stage;
    use crate::interaction::ReorderItem;
    use tempfile::TempDir;

    fn ticket(project: &ProjectId, id: &str, stage: Stage, order: u32) -> Ticket {
        Ticket::new(TicketId::new(id), project.clone(), id.to_string()).placed(stage, order)
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("stageboard.db");
        let project = Project::new("Board".to_string());

        {
            let storage = SqliteStorage::new(&path).unwrap();
            assert!(storage.is_initialized().await);
            storage.save_project(&project).await.unwrap();
            storage
                .save_ticket(&ticket(&project.id, "a", Stage::Qa, 2))
                .await
                .unwrap();
        }

        let storage = SqliteStorage::new(&path).unwrap();
        let tickets = storage.list_tickets(&project.id).await.unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].stage, Stage::Qa);
        assert_eq!(storage.load_project(&project.id).await.unwrap(), project);
    }

    #[tokio::test]
    async fn test_apply_reorder_in_transaction() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let project = ProjectId::new("p1");
        storage.save_ticket(&ticket(&project, "a", Stage::Dev, 0)).await.unwrap();
        storage.save_ticket(&ticket(&project, "b", Stage::Dev, 1)).await.unwrap();

        let bad = ReorderBatch::new(vec![
            ReorderItem::new(TicketId::new("b"), Stage::Dev, 0),
            ReorderItem::new(TicketId::new("nope"), Stage::Dev, 1),
        ]);
        assert!(storage.apply_reorder(&bad).await.is_err());
        let b = storage.load_ticket(&TicketId::new("b")).await.unwrap();
        assert_eq!(b.order, 1);

        let good = ReorderBatch::new(vec![
            ReorderItem::new(TicketId::new("b"), Stage::Dev, 0),
            ReorderItem::new(TicketId::new("a"), Stage::Dev, 1),
        ]);
        storage.apply_reorder(&good).await.unwrap();
        let ids: Vec<_> = storage
            .list_tickets(&project)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let project = Project::new("Board".to_string());
        storage.save_project(&project).await.unwrap();
        storage.save_ticket(&ticket(&project.id, "a", Stage::Dev, 0)).await.unwrap();

        storage.delete_project(&project.id).await.unwrap();
        assert!(storage.list_all_tickets().await.unwrap().is_empty());
        assert!(storage.delete_project(&project.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_engineer_unassigns() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let engineer = Engineer::new("Bob".to_string(), "bob@example.com".to_string());
        storage.save_engineer(&engineer).await.unwrap();

        let mut t = ticket(&ProjectId::new("p1"), "a", Stage::Dev, 0);
        t.assign(Some(engineer.id.clone()));
        storage.save_ticket(&t).await.unwrap();

        storage.delete_engineer(&engineer.id).await.unwrap();
        assert!(storage.load_ticket(&t.id).await.unwrap().assignee_id.is_none());
        assert!(storage.list_engineers().await.unwrap().is_empty());
    }
}
