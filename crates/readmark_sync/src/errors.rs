use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Persist: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("entry of {got} bytes exceeds per-item quota of {quota} bytes")]
    ItemQuotaExceeded { got: usize, quota: usize },

    #[error("write would bring the store to {got} bytes, over the {quota}-byte total quota")]
    TotalQuotaExceeded { got: usize, quota: usize },
}

pub type Result<T> = std::result::Result<T, StorageError>;
