//! Database Connection Management
//!
//! This module provides the connection and schema layer for the
//! authoritative nodes table, using libsql.
//!
//! # Architecture
//!
//! - **Path-agnostic**: accepts any valid PathBuf the embedding application
//!   chooses
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Foreign keys**: enabled per connection; `parent_id` cascades deletes
//!   down the tree
//! - **Idempotent schema**: `CREATE TABLE IF NOT EXISTS`, no migrations
//!
//! # Database Connection Patterns
//!
//! Always use `connect_with_timeout()` in async functions. The 5-second busy
//! timeout lets concurrent operations wait and retry instead of failing
//! immediately with `SQLITE_BUSY` when the Tokio runtime interleaves them.

use crate::db::StoreError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service managing the libsql connection and the nodes schema.
///
/// # Examples
///
/// ```no_run
/// use notex_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new(PathBuf::from("./data/notex.db")).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path.
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable SQLite features (WAL mode, foreign keys)
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the directory cannot be created,
    /// the connection fails, or schema initialization fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, StoreError> {
        // Only checkpoint the WAL for brand-new files; see initialize_schema.
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::unavailable(format!(
                        "Failed to create parent directory for database at {}: {}",
                        db_path.display(),
                        e
                    ))
                })?;
            }
        }

        let db = Builder::new_local(&db_path).build().await.map_err(|e| {
            StoreError::unavailable(format!(
                "Failed to open database at {}: {}",
                db_path.display(),
                e
            ))
        })?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement.
    ///
    /// PRAGMA statements return rows, so query() is required over execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), StoreError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            StoreError::unavailable(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            StoreError::unavailable(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize the nodes schema and SQLite configuration.
    ///
    /// Idempotent; safe to call on every startup.
    ///
    /// # Schema
    ///
    /// One flat `nodes` table holds folders and notes alike. `parent_id`
    /// carries `ON DELETE CASCADE` so deleting a folder removes its whole
    /// subtree inside the store, which is the authority for cascade
    /// semantics (clients only mirror the removal).
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), StoreError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                parent_id TEXT,
                kind TEXT NOT NULL CHECK (kind IN ('folder', 'note')),
                title TEXT NOT NULL,
                content TEXT,
                position INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                -- Folder deletion cascades to the whole subtree
                FOREIGN KEY (parent_id) REFERENCES nodes(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| StoreError::unavailable(format!("Failed to create nodes table: {}", e)))?;

        self.create_core_indexes(&conn).await?;

        // Flush the WAL for freshly created files so rapid open/close cycles
        // in tests never observe a half-initialized schema.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create core indexes for the nodes table.
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), StoreError> {
        // Owner scoping (every query filters on owner_id)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_owner ON nodes(owner_id)",
            (),
        )
        .await
        .map_err(|e| {
            StoreError::unavailable(format!("Failed to create index 'idx_nodes_owner': {}", e))
        })?;

        // Hierarchy queries and sibling position scans
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id)",
            (),
        )
        .await
        .map_err(|e| {
            StoreError::unavailable(format!("Failed to create index 'idx_nodes_parent': {}", e))
        })?;

        // fetch_all orders by position
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_owner_position ON nodes(owner_id, position)",
            (),
        )
        .await
        .map_err(|e| {
            StoreError::unavailable(format!(
                "Failed to create index 'idx_nodes_owner_position': {}",
                e
            ))
        })?;

        Ok(())
    }

    /// Get a raw synchronous connection handle.
    pub fn connect(&self) -> Result<libsql::Connection, StoreError> {
        self.db.connect().map_err(StoreError::from)
    }

    /// Get a connection configured for async use.
    ///
    /// Sets a 5-second busy timeout so concurrent operations wait instead of
    /// failing when the database is locked, and enables foreign keys so the
    /// `parent_id` cascade holds on every connection (SQLite scopes both
    /// pragmas per connection).
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, StoreError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    //
    // NODE TABLE OPERATIONS
    // Raw SQL for the authoritative table; business validation lives in the
    // NodeStore implementation that wraps these.
    //

    /// Fetch every node owned by `owner_id`, ordered by position ascending.
    ///
    /// Returns raw rows; the caller converts them to `Node` models.
    pub async fn db_fetch_all(&self, owner_id: &str) -> Result<libsql::Rows, StoreError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, owner_id, parent_id, kind, title, content, position,
                        created_at, updated_at
                 FROM nodes WHERE owner_id = ? ORDER BY position ASC",
            )
            .await
            .map_err(|e| {
                StoreError::unavailable(format!("Failed to prepare fetch_all query: {}", e))
            })?;

        stmt.query([owner_id]).await.map_err(|e| {
            StoreError::unavailable(format!("Failed to execute fetch_all query: {}", e))
        })
    }

    /// Fetch a single owner-scoped node row.
    pub async fn db_get_node(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<libsql::Row>, StoreError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT id, owner_id, parent_id, kind, title, content, position,
                        created_at, updated_at
                 FROM nodes WHERE id = ? AND owner_id = ?",
            )
            .await
            .map_err(|e| {
                StoreError::unavailable(format!("Failed to prepare get_node query: {}", e))
            })?;

        let mut rows = stmt.query((id, owner_id)).await.map_err(|e| {
            StoreError::unavailable(format!("Failed to execute get_node query: {}", e))
        })?;

        rows.next()
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))
    }

    /// Insert a node row, computing `position` inside the statement.
    ///
    /// The position subquery (max sibling + 1, 0 for the first sibling) runs
    /// in the same statement as the insert, so two racing creates under the
    /// same parent can never both read a stale maximum. The caller re-reads
    /// the row to learn the assigned position.
    pub async fn db_insert_node(&self, node: &crate::models::Node) -> Result<(), StoreError> {
        let conn = self.connect_with_timeout().await?;

        let content_json = node
            .content
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::unavailable(format!("Failed to serialize content: {}", e)))?;

        conn.execute(
            "INSERT INTO nodes (id, owner_id, parent_id, kind, title, content, position, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?,
                     (SELECT COALESCE(MAX(position) + 1, 0)
                      FROM nodes WHERE owner_id = ? AND parent_id IS ?),
                     ?, ?)",
            (
                node.id.as_str(),
                node.owner_id.as_str(),
                node.parent_id.as_deref(),
                node.kind.as_str(),
                node.title.as_str(),
                content_json.as_deref(),
                node.owner_id.as_str(),
                node.parent_id.as_deref(),
                node.created_at.to_rfc3339(),
                node.updated_at.to_rfc3339(),
            ),
        )
        .await
        .map_err(|e| StoreError::unavailable(format!("Failed to insert node: {}", e)))?;

        Ok(())
    }

    /// Write the full mutable field set of an owner-scoped node row.
    ///
    /// Returns the number of rows affected (0 when the id/owner pair does
    /// not match, which callers surface as NotFound).
    pub async fn db_update_node(&self, node: &crate::models::Node) -> Result<u64, StoreError> {
        let conn = self.connect_with_timeout().await?;

        let content_json = node
            .content
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::unavailable(format!("Failed to serialize content: {}", e)))?;

        let rows_affected = conn
            .execute(
                "UPDATE nodes
                 SET parent_id = ?, title = ?, content = ?, position = ?, updated_at = ?
                 WHERE id = ? AND owner_id = ?",
                (
                    node.parent_id.as_deref(),
                    node.title.as_str(),
                    content_json.as_deref(),
                    node.position,
                    node.updated_at.to_rfc3339(),
                    node.id.as_str(),
                    node.owner_id.as_str(),
                ),
            )
            .await
            .map_err(|e| StoreError::unavailable(format!("Failed to update node: {}", e)))?;

        Ok(rows_affected)
    }

    /// Delete an owner-scoped node and every descendant in one statement.
    ///
    /// Returns the number of rows removed (0 when the target is absent).
    /// The recursive CTE walks the subtree explicitly, so the count covers
    /// the cascade rather than just the target row.
    pub async fn db_delete_subtree(&self, id: &str, owner_id: &str) -> Result<u64, StoreError> {
        let conn = self.connect_with_timeout().await?;

        let rows_affected = conn
            .execute(
                "WITH RECURSIVE subtree(id) AS (
                     SELECT id FROM nodes WHERE id = ? AND owner_id = ?
                     UNION ALL
                     SELECT n.id FROM nodes n JOIN subtree s ON n.parent_id = s.id
                 )
                 DELETE FROM nodes WHERE id IN (SELECT id FROM subtree)",
                (id, owner_id),
            )
            .await
            .map_err(|e| StoreError::unavailable(format!("Failed to delete subtree: {}", e)))?;

        Ok(rows_affected)
    }
}
