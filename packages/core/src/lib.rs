//! NOTEX Core - Hierarchical Note Workspace
//!
//! Core engine for a folder/note workspace: a flat, owner-scoped node table
//! as the source of truth, a client-side snapshot with optimistic updates,
//! and on-demand derivation of the display tree.
//!
//! # Architecture
//!
//! ```text
//! EditingSession ── debounced content saves ──┐
//!                                             ▼
//! NodeService ── snapshot + optimistic state ── NodeStore (trait)
//!        ▲                                        │
//!        └── spawn_sync: reload per signal ◄── TursoStore ── DatabaseService
//! ```
//!
//! - [`models`]: node entity, sparse updates, tree derivation
//! - [`db`]: the libsql-backed store, its trait seam, change signals
//! - [`services`]: client state controller and editing session
//! - [`auth`]: session provider seam
//!
//! Reconciliation is refetch-and-replace throughout: change signals carry
//! no payload and every one means "re-fetch everything".

pub mod auth;
pub mod db;
pub mod models;
pub mod services;

pub use auth::{SessionProvider, StaticSession};
pub use db::{
    ChangeNotifier, ChangeSignal, ChangeSubscription, DatabaseService, NodeStore, StoreError,
    TursoStore,
};
pub use models::{
    build_tree, can_parent, normalized_title, DeleteResult, Node, NodeKind, NodeUpdate,
    TreeError, TreeNode, ValidationError,
};
pub use services::{spawn_sync, EditingSession, NodeService, SyncHandle, WorkspaceError};
