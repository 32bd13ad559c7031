use fleetgate_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("budget store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("malformed budget counter: {0}")]
    Malformed(String),
}
