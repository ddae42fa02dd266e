use readmark_sync::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadmarkError {
    #[error("bit index {index} out of range 0..{capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },

    #[error("bit value must be 0 or 1, got {0}")]
    InvalidBit(u8),

    #[error("Base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded payload of {got} bytes exceeds the {max}-byte buffer")]
    DecodeOverflow { got: usize, max: usize },

    #[error("unsupported identifier: {0}")]
    UnsupportedIdentifier(String),

    #[error("Storage: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ReadmarkError>;
