use crate::{
    domain::{Engineer, EngineerId, Project, ProjectId, Stage, Ticket, TicketId},
    error::{Result, StageboardError},
    interaction::ReorderBatch,
    storage::{sort_by_order, validate_batch, Storage},
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::Mutex};
use tracing::warn;

/// File-based storage: one pretty-printed JSON file per record
pub struct FileStorage {
    root_path: PathBuf,
    /// Serializes read-modify-write sequences spanning several files
    write_lock: Mutex<()>,
}

impl FileStorage {
    const PROJECTS_DIR: &'static str = "projects";
    const TICKETS_DIR: &'static str = "tickets";
    const ENGINEERS_DIR: &'static str = "engineers";
    const MARKER_FILE: &'static str = "stageboard.json";

    /// Creates a FileStorage rooted at the given data directory
    pub fn new(root_path: impl AsRef<Path>) -> Self {
        Self {
            root_path: root_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn projects_dir(&self) -> PathBuf {
        self.root_path.join(Self::PROJECTS_DIR)
    }

    fn tickets_dir(&self) -> PathBuf {
        self.root_path.join(Self::TICKETS_DIR)
    }

    fn engineers_dir(&self) -> PathBuf {
        self.root_path.join(Self::ENGINEERS_DIR)
    }

    fn marker_file(&self) -> PathBuf {
        self.root_path.join(Self::MARKER_FILE)
    }

    fn record_file(dir: PathBuf, id: &str) -> Result<PathBuf> {
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(StageboardError::Validation(format!(
                "Identifier '{}' cannot be used as a file name",
                id
            )));
        }
        Ok(dir.join(format!("{}.json", id)))
    }

    fn ticket_file(&self, id: &TicketId) -> Result<PathBuf> {
        Self::record_file(self.tickets_dir(), id.as_str())
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.ensure_directory_exists(parent).await?;
        }
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json).await?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let contents = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn read_all<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(dir).await?;
        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                records.push(Self::read_json(&path).await?);
            }
        }
        Ok(records)
    }

    /// Writes `path`'s ticket, re-placed, to `tmp`
    async fn stage_ticket(
        &self,
        path: &Path,
        tmp: &Path,
        stage: Stage,
        order: u32,
    ) -> Result<()> {
        let mut ticket: Ticket = Self::read_json(path).await?;
        ticket.place(stage, order);
        self.write_json(tmp, &ticket).await
    }

    /// Best-effort removal of temp files from an abandoned reorder
    async fn discard_staged(staged: &[(PathBuf, PathBuf)]) {
        for (tmp, _) in staged {
            if let Err(e) = fs::remove_file(tmp).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tmp.display(), error = %e, "failed to remove staged ticket");
                }
            }
        }
    }

    async fn remove_file(path: &Path, missing: StageboardError) -> Result<()> {
        if !path.exists() {
            return Err(missing);
        }
        fs::remove_file(path).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        self.ensure_directory_exists(&self.projects_dir()).await?;
        self.ensure_directory_exists(&self.tickets_dir()).await?;
        self.ensure_directory_exists(&self.engineers_dir()).await?;

        if !self.marker_file().exists() {
            let marker = serde_json::json!({ "format": 1 });
            self.write_json(&self.marker_file(), &marker).await?;
        }

        let gitignore_path = self.root_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "# Local caches\n*.db\n*.db-*\n*.tmp\n").await?;
        }

        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.marker_file().exists()
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let path = Self::record_file(self.projects_dir(), project.id.as_str())?;
        self.write_json(&path, project).await
    }

    async fn load_project(&self, id: &ProjectId) -> Result<Project> {
        let path = Self::record_file(self.projects_dir(), id.as_str())?;
        if !path.exists() {
            return Err(StageboardError::ProjectNotFound(id.to_string()));
        }
        Self::read_json(&path).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = Self::read_all(&self.projects_dir()).await?;
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = Self::record_file(self.projects_dir(), id.as_str())?;
        Self::remove_file(&path, StageboardError::ProjectNotFound(id.to_string())).await?;

        for ticket in self.list_tickets(id).await? {
            fs::remove_file(self.ticket_file(&ticket.id)?).await?;
        }
        Ok(())
    }

    async fn save_ticket(&self, ticket: &Ticket) -> Result<()> {
        let path = self.ticket_file(&ticket.id)?;
        self.write_json(&path, ticket).await
    }

    async fn load_ticket(&self, id: &TicketId) -> Result<Ticket> {
        let path = self.ticket_file(id)?;
        if !path.exists() {
            return Err(StageboardError::TicketNotFound(id.to_string()));
        }
        Self::read_json(&path).await
    }

    async fn list_tickets(&self, project_id: &ProjectId) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = Self::read_all::<Ticket>(&self.tickets_dir())
            .await?
            .into_iter()
            .filter(|t| &t.project_id == project_id)
            .collect();
        sort_by_order(&mut tickets);
        Ok(tickets)
    }

    async fn list_all_tickets(&self) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = Self::read_all(&self.tickets_dir()).await?;
        sort_by_order(&mut tickets);
        Ok(tickets)
    }

    async fn delete_ticket(&self, id: &TicketId) -> Result<()> {
        let path = self.ticket_file(id)?;
        Self::remove_file(&path, StageboardError::TicketNotFound(id.to_string())).await
    }

    async fn apply_reorder(&self, batch: &ReorderBatch) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut paths = HashMap::new();
        for item in &batch.tickets {
            if let Ok(path) = self.ticket_file(&item.id) {
                if path.exists() {
                    paths.insert(item.id.clone(), path);
                }
            }
        }
        if let Err(e) = validate_batch(batch, |id| paths.contains_key(id)) {
            warn!(error = %e, "rejected reorder batch");
            return Err(e);
        }

        // Stage every rewritten ticket next to its target before touching
        // any live file, so a failed read or write leaves the store as it was.
        let mut staged = Vec::with_capacity(batch.len());
        for item in &batch.tickets {
            let path = &paths[&item.id];
            let tmp = path.with_extension("json.tmp");
            if let Err(e) = self.stage_ticket(path, &tmp, item.stage, item.order).await {
                warn!(ticket = %item.id, error = %e, "failed to stage reorder");
                staged.push((tmp, path.clone()));
                Self::discard_staged(&staged).await;
                return Err(e);
            }
            staged.push((tmp, path.clone()));
        }

        for (tmp, path) in staged {
            fs::rename(tmp, path).await?;
        }
        Ok(())
    }

    async fn save_engineer(&self, engineer: &Engineer) -> Result<()> {
        let path = Self::record_file(self.engineers_dir(), engineer.id.as_str())?;
        self.write_json(&path, engineer).await
    }

    async fn load_engineer(&self, id: &EngineerId) -> Result<Engineer> {
        let path = Self::record_file(self.engineers_dir(), id.as_str())?;
        if !path.exists() {
            return Err(StageboardError::EngineerNotFound(id.to_string()));
        }
        Self::read_json(&path).await
    }

    async fn list_engineers(&self) -> Result<Vec<Engineer>> {
        let mut engineers: Vec<Engineer> = Self::read_all(&self.engineers_dir()).await?;
        engineers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(engineers)
    }

    async fn delete_engineer(&self, id: &EngineerId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = Self::record_file(self.engineers_dir(), id.as_str())?;
        Self::remove_file(&path, StageboardError::EngineerNotFound(id.to_string())).await?;

        for mut ticket in self.list_all_tickets().await? {
            if ticket.assignee_id.as_ref() == Some(id) {
                ticket.assign(None);
                self.save_ticket(&ticket).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::ReorderItem;
    use tempfile::TempDir;

    async fn storage() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join(".stageboard"));
        storage.initialize().await.unwrap();
        (temp_dir, storage)
    }

    fn ticket(project: &Project, id: &str, stage: Stage, order: u32) -> Ticket {
        Ticket::new(TicketId::new(id), project.id.clone(), format!("Ticket {}", id))
            .placed(stage, order)
    }

    #[tokio::test]
    async fn test_storage_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join(".stageboard"));

        assert!(!storage.is_initialized().await);
        storage.initialize().await.unwrap();

        assert!(storage.is_initialized().await);
        assert!(storage.tickets_dir().exists());
        assert!(storage.projects_dir().exists());
    }

    #[tokio::test]
    async fn test_ticket_save_and_load() {
        let (_dir, storage) = storage().await;
        let project = Project::new("Board".to_string());
        storage.save_project(&project).await.unwrap();

        let mut t = ticket(&project, "t1", Stage::Qa, 3);
        t.add_subtask("check".to_string()).unwrap();
        storage.save_ticket(&t).await.unwrap();

        let loaded = storage.load_ticket(&t.id).await.unwrap();
        assert_eq!(loaded, t);
    }

    #[tokio::test]
    async fn test_list_tickets_filters_and_sorts() {
        let (_dir, storage) = storage().await;
        let project = Project::new("Board".to_string());
        let other = Project::new("Other".to_string());

        storage.save_ticket(&ticket(&project, "b", Stage::Dev, 1)).await.unwrap();
        storage.save_ticket(&ticket(&project, "a", Stage::Dev, 0)).await.unwrap();
        storage.save_ticket(&ticket(&other, "z", Stage::Dev, 0)).await.unwrap();

        let tickets = storage.list_tickets(&project.id).await.unwrap();
        let ids: Vec<_> = tickets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_apply_reorder_rewrites_tickets() {
        let (_dir, storage) = storage().await;
        let project = Project::new("Board".to_string());
        storage.save_ticket(&ticket(&project, "a", Stage::Dev, 0)).await.unwrap();
        storage.save_ticket(&ticket(&project, "b", Stage::Start, 0)).await.unwrap();

        let batch = ReorderBatch::new(vec![
            ReorderItem::new(TicketId::new("b"), Stage::Dev, 0),
            ReorderItem::new(TicketId::new("a"), Stage::Dev, 1),
        ]);
        storage.apply_reorder(&batch).await.unwrap();

        let b = storage.load_ticket(&TicketId::new("b")).await.unwrap();
        assert_eq!((b.stage, b.order), (Stage::Dev, 0));
        let a = storage.load_ticket(&TicketId::new("a")).await.unwrap();
        assert_eq!(a.order, 1);
    }

    #[tokio::test]
    async fn test_apply_reorder_rejects_unknown_ticket() {
        let (_dir, storage) = storage().await;
        let project = Project::new("Board".to_string());
        storage.save_ticket(&ticket(&project, "a", Stage::Dev, 0)).await.unwrap();

        let batch = ReorderBatch::new(vec![
            ReorderItem::new(TicketId::new("a"), Stage::Finish, 9),
            ReorderItem::new(TicketId::new("missing"), Stage::Finish, 10),
        ]);
        let err = storage.apply_reorder(&batch).await.unwrap_err();
        assert!(matches!(err, StageboardError::ReorderRejected(_)));

        let a = storage.load_ticket(&TicketId::new("a")).await.unwrap();
        assert_eq!((a.stage, a.order), (Stage::Dev, 0));
    }

    #[tokio::test]
    async fn test_apply_reorder_discards_staged_files_on_failure() {
        let (_dir, storage) = storage().await;
        let project = Project::new("Board".to_string());
        storage.save_ticket(&ticket(&project, "a", Stage::Dev, 0)).await.unwrap();
        storage.save_ticket(&ticket(&project, "b", Stage::Dev, 1)).await.unwrap();
        fs::write(storage.tickets_dir().join("b.json"), "{ not json")
            .await
            .unwrap();

        let batch = ReorderBatch::new(vec![
            ReorderItem::new(TicketId::new("a"), Stage::Dev, 1),
            ReorderItem::new(TicketId::new("b"), Stage::Dev, 0),
        ]);
        assert!(storage.apply_reorder(&batch).await.is_err());

        let mut leftovers = Vec::new();
        let mut entries = fs::read_dir(storage.tickets_dir()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".tmp") {
                leftovers.push(name);
            }
        }
        assert!(leftovers.is_empty(), "staged files left: {:?}", leftovers);

        let a = storage.load_ticket(&TicketId::new("a")).await.unwrap();
        assert_eq!((a.stage, a.order), (Stage::Dev, 0));
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let (_dir, storage) = storage().await;
        let project = Project::new("Board".to_string());
        let other = Project::new("Other".to_string());
        storage.save_project(&project).await.unwrap();
        storage.save_project(&other).await.unwrap();
        storage.save_ticket(&ticket(&project, "a", Stage::Dev, 0)).await.unwrap();
        storage.save_ticket(&ticket(&other, "z", Stage::Dev, 0)).await.unwrap();

        storage.delete_project(&project.id).await.unwrap();

        assert!(storage.load_ticket(&TicketId::new("a")).await.is_err());
        assert!(storage.load_ticket(&TicketId::new("z")).await.is_ok());
        assert_eq!(storage.list_projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_tickets() {
        let (_dir, storage) = storage().await;
        let project = Project::new("Board".to_string());

        let mut t1 = ticket(&project, "t1", Stage::Dev, 0);
        t1.set_title("Authentication Feature".to_string());
        let mut t2 = ticket(&project, "t2", Stage::Dev, 1);
        t2.set_description(Some("Some other feature".to_string()));
        storage.save_ticket(&t1).await.unwrap();
        storage.save_ticket(&t2).await.unwrap();

        let results = storage.search_tickets("AUTHENTICATION").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_str(), "t1");

        assert_eq!(storage.search_tickets("feature").await.unwrap().len(), 2);
        assert!(storage.search_tickets("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_ids() {
        let (_dir, storage) = storage().await;
        let err = storage
            .load_ticket(&TicketId::new("../escape"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageboardError::Validation(_)));
    }

    #[tokio::test]
    async fn test_engineers_sorted_by_name() {
        let (_dir, storage) = storage().await;
        storage
            .save_engineer(&Engineer::new("Carol".to_string(), "c@example.com".to_string()))
            .await
            .unwrap();
        storage
            .save_engineer(&Engineer::new("Alice".to_string(), "a@example.com".to_string()))
            .await
            .unwrap();

        let names: Vec<_> = storage
            .list_engineers()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Carol"]);
    }
}
