use crate::domain::project::{EngineerId, ProjectId};
use crate::domain::stage::Stage;
use crate::error::StageboardError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Opaque unique identifier for a ticket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Wraps an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TicketId {
    type Err = StageboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(StageboardError::Validation(
                "Ticket id cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

impl FromStr for Priority {
    type Err = StageboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(StageboardError::Validation(format!(
                "Invalid priority '{}'. Valid priorities: low, medium, high",
                s
            ))),
        }
    }
}

/// A checklist item on a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub done: bool,
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

impl Subtask {
    pub fn new(title: String, order: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            done: false,
            order,
            created_at: Utc::now(),
        }
    }

    pub fn toggle(&mut self) {
        self.done = !self.done;
    }
}

/// Metadata of an image attached to a ticket.
///
/// The bytes live in external upload storage; only the reference is kept here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn new(filename: String, url: String, mime_type: String, size_bytes: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename,
            url,
            mime_type,
            size_bytes,
            created_at: Utc::now(),
        }
    }
}

/// A ticket on a project board.
///
/// `order` is only meaningful within the ticket's (project, stage) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub stage: Stage,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<EngineerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Creates a new ticket at the head of the START stage
    pub fn new(id: TicketId, project_id: ProjectId, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            title,
            description: None,
            stage: Stage::Start,
            order: 0,
            assignee_id: None,
            priority: None,
            due_date: None,
            subtasks: Vec::new(),
            attachments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style stage and order placement, mostly for fixtures
    pub fn placed(mut self, stage: Stage, order: u32) -> Self {
        self.stage = stage;
        self.order = order;
        self
    }

    /// Moves the ticket to a stage position
    pub fn place(&mut self, stage: Stage, order: u32) {
        self.stage = stage;
        self.order = order;
        self.updated_at = Utc::now();
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
        self.updated_at = Utc::now();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.updated_at = Utc::now();
    }

    pub fn set_priority(&mut self, priority: Option<Priority>) {
        self.priority = priority;
        self.updated_at = Utc::now();
    }

    pub fn set_due_date(&mut self, due_date: Option<DateTime<Utc>>) {
        self.due_date = due_date;
        self.updated_at = Utc::now();
    }

    pub fn assign(&mut self, assignee: Option<EngineerId>) {
        self.assignee_id = assignee;
        self.updated_at = Utc::now();
    }

    /// Appends a subtask after the current last one
    pub fn add_subtask(&mut self, title: String) -> Result<&Subtask, StageboardError> {
        let order = match self.subtasks.iter().map(|s| s.order).max() {
            None => 0,
            Some(last) => last.checked_add(1).ok_or_else(|| {
                StageboardError::Validation(format!("Subtask order {} cannot be followed", last))
            })?,
        };
        self.subtasks.push(Subtask::new(title, order));
        self.subtasks.sort_by_key(|s| s.order);
        self.updated_at = Utc::now();
        // The new subtask has the largest order, so it sorts last
        Ok(&self.subtasks[self.subtasks.len() - 1])
    }

    fn subtask_mut(&mut self, subtask_id: &str) -> Result<&mut Subtask, StageboardError> {
        self.subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or_else(|| StageboardError::SubtaskNotFound(subtask_id.to_string()))
    }

    /// Flips a subtask's done flag and returns the new value
    pub fn toggle_subtask(&mut self, subtask_id: &str) -> Result<bool, StageboardError> {
        let subtask = self.subtask_mut(subtask_id)?;
        subtask.toggle();
        let done = subtask.done;
        self.updated_at = Utc::now();
        Ok(done)
    }

    pub fn rename_subtask(
        &mut self,
        subtask_id: &str,
        title: String,
    ) -> Result<(), StageboardError> {
        self.subtask_mut(subtask_id)?.title = title;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn remove_subtask(&mut self, subtask_id: &str) -> Result<Subtask, StageboardError> {
        let pos = self
            .subtasks
            .iter()
            .position(|s| s.id == subtask_id)
            .ok_or_else(|| StageboardError::SubtaskNotFound(subtask_id.to_string()))?;
        self.updated_at = Utc::now();
        Ok(self.subtasks.remove(pos))
    }

    /// Returns (done, total) subtask counts
    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.done).count();
        (done, self.subtasks.len())
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
        self.updated_at = Utc::now();
    }

    pub fn remove_attachment(
        &mut self,
        attachment_id: &str,
    ) -> Result<Attachment, StageboardError> {
        let pos = self
            .attachments
            .iter()
            .position(|a| a.id == attachment_id)
            .ok_or_else(|| StageboardError::AttachmentNotFound(attachment_id.to_string()))?;
        self.updated_at = Utc::now();
        Ok(self.attachments.remove(pos))
    }
}
