use thiserror::Error;

pub type Result<T> = std::result::Result<T, StageboardError>;

#[derive(Debug, Error)]
pub enum StageboardError {
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Engineer not found: {0}")]
    EngineerNotFound(String),

    #[error("Subtask not found: {0}")]
    SubtaskNotFound(String),

    #[error("Attachment not found: {0}")]
    AttachmentNotFound(String),

    #[error("Invalid stage value: {0}")]
    InvalidStage(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Index {index} out of range for stage {stage} with {len} tickets")]
    IndexOutOfRange {
        stage: String,
        index: usize,
        len: usize,
    },

    #[error("A drag is already active for ticket {0}")]
    DragInProgress(String),

    #[error("No drag is active")]
    NoActiveDrag,

    #[error("Reorder batch rejected: {0}")]
    ReorderRejected(String),

    #[error("An engineer with email {0} already exists")]
    DuplicateEngineerEmail(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "sqlite-storage")]
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
