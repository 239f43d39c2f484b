//! Client-side services: workspace state, background sync, and editing.

pub mod editing_session;
pub mod error;
pub mod node_service;

pub use editing_session::{EditingSession, DEFAULT_DEBOUNCE};
pub use error::WorkspaceError;
pub use node_service::{spawn_sync, NodeService, SyncHandle};
