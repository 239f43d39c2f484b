//! NodeStore Trait - Remote Store Abstraction
//!
//! This module defines the `NodeStore` trait that abstracts the
//! authoritative backing table for nodes. The trait is the seam between the
//! client-side state controller ([`crate::services::NodeService`]) and
//! whatever actually holds the rows (the embedded libsql store here, a
//! hosted table in the original deployment).
//!
//! # Design Decisions
//!
//! 1. **Async-first**: every operation may suspend arbitrarily long; callers
//!    must not assume two concurrently issued calls complete in issue order
//! 2. **Typed failures**: operations return [`StoreError`] so callers can
//!    distinguish sign-in problems from validation from connectivity
//! 3. **Content-free notifications**: `subscribe` yields signals with no
//!    payload; the only correct reaction is a full re-fetch
//!
//! # Examples
//!
//! ```rust,no_run
//! use notex_core::auth::StaticSession;
//! use notex_core::db::{DatabaseService, NodeStore, TursoStore};
//! use notex_core::models::NodeKind;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./notex.db")).await?);
//!     let session = Arc::new(StaticSession::new("user-1"));
//!     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db, session));
//!
//!     let folder = store.create(NodeKind::Folder, "Work", None).await?;
//!     let nodes = store.fetch_all().await?;
//!     assert_eq!(nodes.len(), 1);
//!     let _ = folder;
//!     Ok(())
//! }
//! ```

use crate::db::{ChangeSubscription, StoreError};
use crate::models::{DeleteResult, Node, NodeKind, NodeUpdate};
use async_trait::async_trait;

/// Abstraction over the authoritative nodes table.
///
/// Implementations must be `Send + Sync`; futures may move between threads.
/// All operations are scoped to the current session's owner: rows belonging
/// to other users are invisible and mutating them reports `NotFound`.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Fetch every node owned by the current user, ordered by `position`
    /// ascending (display-order refinement happens in the tree builder).
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` when no session is active
    /// - `Unavailable` on transport failure; the caller must treat this as
    ///   "state unknown", not as an empty collection
    async fn fetch_all(&self) -> Result<Vec<Node>, StoreError>;

    /// Create a node under `parent_id` (`None` for root level).
    ///
    /// The store computes `position` as max sibling position + 1 (0 for the
    /// first sibling); it is the single point of truth for position
    /// assignment, so racing clients never mint duplicates from a stale max.
    ///
    /// # Errors
    ///
    /// - `Validation` when the title trims to empty or the parent is
    ///   missing or not a folder
    /// - `Unauthenticated` when no session is active
    async fn create(
        &self,
        kind: NodeKind,
        title: &str,
        parent_id: Option<&str>,
    ) -> Result<Node, StoreError>;

    /// Apply a sparse update (rename, content edit, move, reorder) and
    /// refresh `updated_at`.
    ///
    /// Returns the full updated row.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the id does not exist or belongs to another user
    /// - `Validation` on empty title, content on a folder, or a move that
    ///   would target a non-folder or create a cycle
    async fn update(&self, id: &str, update: NodeUpdate) -> Result<Node, StoreError>;

    /// Delete a node and, per store contract, its whole subtree.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the id does not exist or belongs to another user
    async fn delete(&self, id: &str) -> Result<DeleteResult, StoreError>;

    /// Register for content-free change signals covering the owner's nodes.
    ///
    /// Delivery is at-least-once with no payload guarantees; every signal
    /// means "re-fetch everything". The handle unsubscribes idempotently
    /// and is safe to drop during teardown.
    fn subscribe(&self) -> ChangeSubscription;
}
