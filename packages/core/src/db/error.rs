//! Store Error Types
//!
//! This module defines the adapter-level error taxonomy. Every remote
//! operation can fail in one of four ways, and callers react differently to
//! each, so the kinds stay distinct all the way up to the UI:
//!
//! - `Unauthenticated`: no active session at the time of the call
//! - `Validation`: malformed input (empty title, invalid parent, cycle)
//! - `NotFound`: target id absent or owned by someone else
//! - `Unavailable`: transport/SQL failure; retryable, state unknown

use crate::models::ValidationError;
use thiserror::Error;

/// Remote store operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// No active session; the caller should prompt for sign-in.
    #[error("No active session")]
    Unauthenticated,

    /// Input rejected before or by the authoritative store.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Target id does not exist or is not owned by the caller. The caller
    /// should reconcile local state with a forced reload.
    #[error("Node not found: {id}")]
    NotFound { id: String },

    /// Transport or SQL failure. The store's answer is unknown, not empty;
    /// callers must keep their last good snapshot.
    #[error("Store unavailable: {context}")]
    Unavailable { context: String },
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an unavailable error with context
    pub fn unavailable(context: impl Into<String>) -> Self {
        Self::Unavailable {
            context: context.into(),
        }
    }
}

impl From<libsql::Error> for StoreError {
    fn from(e: libsql::Error) -> Self {
        Self::Unavailable {
            context: e.to_string(),
        }
    }
}
