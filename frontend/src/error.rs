use thiserror::Error;

/// Everything that can go wrong inside the notification engine.
///
/// None of these ever reach the page: the store, the synchronizer and the
/// engine turn them into "absent" or "skip this tick" and log them.
#[derive(Debug, Error)]
pub enum FomoError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("failed to write {key}: {reason}")]
    StorageWrite { key: String, reason: String },

    #[error("value is not an obfuscated blob")]
    Untagged,

    #[error("malformed blob: {0}")]
    MalformedBlob(String),

    #[error("failed to create cipher: {0}")]
    Cipher(String),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("invalid UTF-8 in decrypted payload")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("broadcast unavailable: {0}")]
    Broadcast(String),
}

pub type Result<T> = std::result::Result<T, FomoError>;
