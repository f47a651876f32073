use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write user file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read user file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize users: {0}")]
    Serialization(serde_json::Error),
    #[error(
        "user file {path} is not a valid user collection: {reason}",
        path = path.display()
    )]
    CorruptData { path: PathBuf, reason: String },
    #[error("failed to move unreadable user file aside (path: {path}): {source}", path = path.display())]
    Quarantine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to allocate user id: {0}")]
    Id(#[from] usuarios_id::IdError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
