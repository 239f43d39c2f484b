//! Database layer: the embedded libsql store and the abstractions over it.
//!
//! [`DatabaseService`] owns the connection and raw SQL, [`TursoStore`]
//! layers session scoping, validation and change signals on top, and
//! [`NodeStore`] is the trait the rest of the crate consumes.

pub mod database;
pub mod error;
pub mod events;
pub mod node_store;
pub mod turso_store;

pub use database::DatabaseService;
pub use error::StoreError;
pub use events::{ChangeNotifier, ChangeSignal, ChangeSubscription};
pub use node_store::NodeStore;
pub use turso_store::TursoStore;
