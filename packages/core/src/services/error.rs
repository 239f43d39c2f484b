//! Service Error Types
//!
//! Errors surfaced by the client-side services to their callers (the UI in
//! the original deployment). The store's taxonomy maps through unchanged,
//! plus one service-only kind: `ConsistencyFault`, raised when locally held
//! state fails a structural check that valid data can never fail.

use crate::db::StoreError;
use crate::models::{TreeError, ValidationError};
use thiserror::Error;

/// Errors from workspace-level operations
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// No active session
    #[error("No active session")]
    Unauthenticated,

    /// Input rejected by validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Target node missing or not owned by the caller
    #[error("Node not found: {id}")]
    NotFound { id: String },

    /// The store could not be reached; local state is kept as-is
    #[error("Store unavailable: {context}")]
    StoreUnavailable { context: String },

    /// Local state failed a structural invariant. Indicates corrupted data,
    /// not bad user input; recovery is a forced reload.
    #[error("Consistency fault: {context}")]
    ConsistencyFault { context: String },
}

impl From<StoreError> for WorkspaceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unauthenticated => Self::Unauthenticated,
            StoreError::Validation(v) => Self::Validation(v),
            StoreError::NotFound { id } => Self::NotFound { id },
            StoreError::Unavailable { context } => Self::StoreUnavailable { context },
        }
    }
}

impl From<TreeError> for WorkspaceError {
    fn from(e: TreeError) -> Self {
        Self::ConsistencyFault {
            context: e.to_string(),
        }
    }
}
