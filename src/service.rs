//! Ticket service: validated writes on top of a [`Storage`] backend.
//!
//! Tickets created or moved outside a drag go to the end of their stage
//! (max order + 1, or 0 for an empty stage). Only the drag reorder path
//! inserts mid-list.

use crate::{
    config::{BoardSection, StageboardConfig, TicketsSection},
    domain::{
        sort_tickets, Attachment, Dashboard, Engineer, EngineerId, Priority, Project, ProjectId,
        SortField, SortOrder, Stage, StageCounts, Subtask, Ticket, TicketId,
    },
    error::{Result, StageboardError},
    interaction::ReorderBatch,
    storage::Storage,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Input for a new ticket
#[derive(Debug, Clone, Default)]
pub struct NewTicket {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to START
    pub stage: Option<Stage>,
    pub assignee_id: Option<EngineerId>,
    /// Defaults to MEDIUM
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTicket {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial ticket update; `None` leaves a field as is.
///
/// Nested options clear the field when set to `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub stage: Option<Stage>,
    pub order: Option<u32>,
    pub assignee_id: Option<Option<EngineerId>>,
    pub priority: Option<Option<Priority>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Metadata of an already uploaded file
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub filename: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

pub struct TicketService {
    storage: Arc<dyn Storage>,
    board: BoardSection,
    limits: TicketsSection,
    upcoming_days: u32,
}

impl TicketService {
    pub fn new(storage: Arc<dyn Storage>, config: &StageboardConfig) -> Self {
        Self {
            storage,
            board: config.board.clone(),
            limits: config.tickets.clone(),
            upcoming_days: config.dashboard.upcoming_days,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn board_name(&self) -> &str {
        &self.board.name
    }

    /// Stage columns in display order, with their configured labels
    pub fn columns(&self) -> Vec<(Stage, &str)> {
        Stage::ALL
            .iter()
            .map(|stage| (*stage, self.board.columns.label(*stage)))
            .collect()
    }

    fn normalize_title(&self, title: &str) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StageboardError::Validation("Title is required".to_string()));
        }
        if title.chars().count() > self.limits.max_title_len {
            return Err(StageboardError::Validation(format!(
                "Title must be {} characters or less",
                self.limits.max_title_len
            )));
        }
        Ok(title.to_string())
    }

    async fn check_assignee(&self, assignee: Option<&EngineerId>) -> Result<()> {
        if let Some(id) = assignee {
            self.storage.load_engineer(id).await?;
        }
        Ok(())
    }

    /// Order that appends to the end of a (project, stage) group.
    ///
    /// Fails when the group's last order is already `u32::MAX`.
    pub async fn next_order(&self, project_id: &ProjectId, stage: Stage) -> Result<u32> {
        let last = self
            .storage
            .list_tickets(project_id)
            .await?
            .iter()
            .filter(|t| t.stage == stage)
            .map(|t| t.order)
            .max();

        match last {
            None => Ok(0),
            Some(order) => order.checked_add(1).ok_or_else(|| {
                StageboardError::Validation(format!(
                    "Stage {} has no order left after {}; reorder it first",
                    stage, order
                ))
            }),
        }
    }

    pub async fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StageboardError::Validation("Name is required".to_string()));
        }

        let mut project = Project::new(name.to_string());
        project.description = normalize_text(description);
        self.storage.save_project(&project).await?;

        info!(project = %project.id, name = %project.name, "project created");
        Ok(project)
    }

    pub async fn rename_project(
        &self,
        id: &ProjectId,
        name: Option<&str>,
        description: Option<Option<&str>>,
    ) -> Result<Project> {
        let mut project = self.storage.load_project(id).await?;
        if let Some(name) = name {
            let name = name.trim();
            if name.is_empty() {
                return Err(StageboardError::Validation("Name cannot be empty".to_string()));
            }
            project.set_name(name.to_string());
        }
        if let Some(description) = description {
            project.set_description(normalize_text(description));
        }
        self.storage.save_project(&project).await?;
        Ok(project)
    }

    /// Deletes a project and its tickets
    pub async fn delete_project(&self, id: &ProjectId) -> Result<()> {
        self.storage.delete_project(id).await?;
        info!(project = %id, "project deleted");
        Ok(())
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.storage.list_projects().await
    }

    /// Lists a project's tickets in the requested order
    pub async fn list_tickets(
        &self,
        project_id: &ProjectId,
        field: SortField,
        order: SortOrder,
    ) -> Result<Vec<Ticket>> {
        let mut tickets = self.storage.list_tickets(project_id).await?;
        sort_tickets(&mut tickets, field, order);
        Ok(tickets)
    }

    /// Blank queries match nothing
    pub async fn search(&self, query: &str) -> Result<Vec<Ticket>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.storage.search_tickets(query).await
    }

    pub async fn create_ticket(&self, project_id: &ProjectId, new: NewTicket) -> Result<Ticket> {
        let title = self.normalize_title(&new.title)?;
        self.storage.load_project(project_id).await?;
        self.check_assignee(new.assignee_id.as_ref()).await?;

        let stage = new.stage.unwrap_or(Stage::Start);
        let order = self.next_order(project_id, stage).await?;

        let mut ticket = Ticket::new(TicketId::generate(), project_id.clone(), title);
        ticket.stage = stage;
        ticket.order = order;
        ticket.description = normalize_text(new.description.as_deref());
        ticket.assignee_id = new.assignee_id;
        ticket.priority = Some(new.priority.unwrap_or_default());
        ticket.due_date = new.due_date;
        self.storage.save_ticket(&ticket).await?;

        info!(ticket = %ticket.id, stage = %stage, order, "ticket created");
        Ok(ticket)
    }

    /// Applies a partial update.
    ///
    /// A stage change without an explicit order appends the ticket to the
    /// end of the new stage.
    pub async fn update_ticket(&self, id: &TicketId, update: TicketUpdate) -> Result<Ticket> {
        let mut ticket = self.storage.load_ticket(id).await?;

        if let Some(title) = &update.title {
            let title = self.normalize_title(title)?;
            ticket.set_title(title);
        }
        if let Some(description) = &update.description {
            ticket.set_description(normalize_text(description.as_deref()));
        }
        if let Some(assignee) = update.assignee_id {
            self.check_assignee(assignee.as_ref()).await?;
            ticket.assign(assignee);
        }
        if let Some(priority) = update.priority {
            ticket.set_priority(priority);
        }
        if let Some(due_date) = update.due_date {
            ticket.set_due_date(due_date);
        }

        let stage = update.stage.unwrap_or(ticket.stage);
        let order = match update.order {
            Some(order) => Some(order),
            None if stage != ticket.stage => {
                Some(self.next_order(&ticket.project_id, stage).await?)
            }
            None => None,
        };
        if let Some(order) = order {
            ticket.place(stage, order);
        }

        self.storage.save_ticket(&ticket).await?;
        Ok(ticket)
    }

    /// Moves a ticket to the end of a stage
    pub async fn move_ticket(&self, id: &TicketId, stage: Stage) -> Result<Ticket> {
        let mut ticket = self.storage.load_ticket(id).await?;
        if ticket.stage == stage {
            return Ok(ticket);
        }

        let order = self.next_order(&ticket.project_id, stage).await?;
        ticket.place(stage, order);
        self.storage.save_ticket(&ticket).await?;

        debug!(ticket = %id, stage = %stage, order, "ticket moved");
        Ok(ticket)
    }

    pub async fn delete_ticket(&self, id: &TicketId) -> Result<()> {
        self.storage.delete_ticket(id).await
    }

    /// Applies a batched reorder, all-or-nothing
    pub async fn reorder(&self, batch: &ReorderBatch) -> Result<()> {
        self.storage.apply_reorder(batch).await
    }

    pub async fn add_subtask(&self, ticket_id: &TicketId, title: &str) -> Result<Subtask> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StageboardError::Validation("Title is required".to_string()));
        }

        let mut ticket = self.storage.load_ticket(ticket_id).await?;
        let subtask = ticket.add_subtask(title.to_string())?.clone();
        self.storage.save_ticket(&ticket).await?;
        Ok(subtask)
    }

    /// Flips a subtask and returns its new done flag
    pub async fn toggle_subtask(&self, ticket_id: &TicketId, subtask_id: &str) -> Result<bool> {
        let mut ticket = self.storage.load_ticket(ticket_id).await?;
        let done = ticket.toggle_subtask(subtask_id)?;
        self.storage.save_ticket(&ticket).await?;
        Ok(done)
    }

    pub async fn rename_subtask(
        &self,
        ticket_id: &TicketId,
        subtask_id: &str,
        title: &str,
    ) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StageboardError::Validation("Title cannot be empty".to_string()));
        }

        let mut ticket = self.storage.load_ticket(ticket_id).await?;
        ticket.rename_subtask(subtask_id, title.to_string())?;
        self.storage.save_ticket(&ticket).await
    }

    pub async fn remove_subtask(&self, ticket_id: &TicketId, subtask_id: &str) -> Result<Subtask> {
        let mut ticket = self.storage.load_ticket(ticket_id).await?;
        let removed = ticket.remove_subtask(subtask_id)?;
        self.storage.save_ticket(&ticket).await?;
        Ok(removed)
    }

    /// Records an uploaded image on a ticket
    pub async fn attach(&self, ticket_id: &TicketId, upload: NewAttachment) -> Result<Attachment> {
        if !self
            .limits
            .allowed_attachment_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&upload.mime_type))
        {
            return Err(StageboardError::Validation(format!(
                "Attachment type {} is not allowed. Allowed types: {}",
                upload.mime_type,
                self.limits.allowed_attachment_types.join(", ")
            )));
        }
        if upload.size_bytes > self.limits.max_attachment_bytes {
            return Err(StageboardError::Validation(format!(
                "Attachment must be {} bytes or less",
                self.limits.max_attachment_bytes
            )));
        }

        let mut ticket = self.storage.load_ticket(ticket_id).await?;
        let attachment = Attachment::new(
            upload.filename,
            upload.url,
            upload.mime_type,
            upload.size_bytes,
        );
        ticket.add_attachment(attachment.clone());
        self.storage.save_ticket(&ticket).await?;
        Ok(attachment)
    }

    pub async fn detach(&self, ticket_id: &TicketId, attachment_id: &str) -> Result<Attachment> {
        let mut ticket = self.storage.load_ticket(ticket_id).await?;
        let removed = ticket.remove_attachment(attachment_id)?;
        self.storage.save_ticket(&ticket).await?;
        Ok(removed)
    }

    pub async fn create_engineer(
        &self,
        name: &str,
        email: &str,
        avatar: Option<&str>,
    ) -> Result<Engineer> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StageboardError::Validation("Name is required".to_string()));
        }
        if name.chars().count() > self.limits.max_engineer_name_len {
            return Err(StageboardError::Validation(format!(
                "Name must be {} characters or less",
                self.limits.max_engineer_name_len
            )));
        }
        let email = email.trim();
        if email.is_empty() {
            return Err(StageboardError::Validation("Email is required".to_string()));
        }
        if self
            .storage
            .list_engineers()
            .await?
            .iter()
            .any(|e| e.email == email)
        {
            return Err(StageboardError::DuplicateEngineerEmail(email.to_string()));
        }

        let mut engineer = Engineer::new(name.to_string(), email.to_string());
        engineer.avatar = normalize_text(avatar);
        self.storage.save_engineer(&engineer).await?;
        Ok(engineer)
    }

    pub async fn list_engineers(&self) -> Result<Vec<Engineer>> {
        self.storage.list_engineers().await
    }

    /// Deletes an engineer, unassigning their tickets
    pub async fn delete_engineer(&self, id: &EngineerId) -> Result<()> {
        self.storage.delete_engineer(id).await
    }

    /// Due-date dashboard across all projects
    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<Dashboard> {
        let tickets = self.storage.list_all_tickets().await?;
        Ok(Dashboard::build(tickets, now, self.upcoming_days))
    }

    pub async fn stage_counts(&self) -> Result<StageCounts> {
        let tickets = self.storage.list_all_tickets().await?;
        Ok(StageCounts::from_tickets(&tickets))
    }
}

/// Trims text; blank becomes `None`
fn normalize_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
