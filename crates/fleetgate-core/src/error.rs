//! Error type for the shared key-value store abstraction.

use std::fmt;

/// A failure talking to the shared store (Redis or equivalent).
///
/// Every caller of [`crate::store::SharedStore`] is expected to degrade
/// gracefully on this error rather than propagate it to the client — callers
/// branch on "did it work", not on the specific failure, so `StoreError` is
/// intentionally coarse.
#[derive(Debug, Clone)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn unavailable() -> Self {
        Self::new("shared store unavailable")
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store error: {}", self.message)
    }
}

impl std::error::Error for StoreError {}
