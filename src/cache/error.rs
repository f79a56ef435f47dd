//! Cache registry errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache '{0}' already exists")]
    AlreadyExists(String),

    #[error("cache '{name}' type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}
