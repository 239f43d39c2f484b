//! TursoStore - NodeStore Implementation for libsql
//!
//! This module implements the [`NodeStore`] trait over the embedded libsql
//! database, making it the authoritative table for the user's folder/note
//! tree.
//!
//! # Responsibilities
//!
//! - Session scoping: every operation resolves the owner through the
//!   [`SessionProvider`] collaborator first; no session means
//!   `Unauthenticated`, never a silent no-op
//! - Business validation: titles, parent kinds and cycle prevention are
//!   checked here before any SQL runs where locally detectable
//! - Change signals: one payload-free signal is emitted after every
//!   successful mutation
//!
//! Row conversion between libsql rows and [`Node`] models is centralized in
//! this module; the raw SQL lives in [`DatabaseService`].

use crate::auth::SessionProvider;
use crate::db::node_store::NodeStore;
use crate::db::{ChangeNotifier, ChangeSubscription, DatabaseService, StoreError};
use crate::models::{
    can_parent, normalized_title, DeleteResult, Node, NodeKind, NodeUpdate, ValidationError,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::Row;
use std::sync::Arc;
use tracing::{debug, info};

/// NodeStore implementation backed by an embedded libsql database.
pub struct TursoStore {
    /// Underlying database service (raw SQL operations)
    db: Arc<DatabaseService>,

    /// Authentication collaborator; consulted on every operation
    session: Arc<dyn SessionProvider>,

    /// Change-signal fan-out shared by every handle on this table
    notifier: ChangeNotifier,
}

impl TursoStore {
    /// Create a store with its own notification channel.
    pub fn new(db: Arc<DatabaseService>, session: Arc<dyn SessionProvider>) -> Self {
        Self::with_notifier(db, session, ChangeNotifier::new())
    }

    /// Create a store sharing an existing notification channel.
    ///
    /// Two sessions over the same database (for example two open views)
    /// should share one notifier so each observes the other's mutations.
    pub fn with_notifier(
        db: Arc<DatabaseService>,
        session: Arc<dyn SessionProvider>,
        notifier: ChangeNotifier,
    ) -> Self {
        Self {
            db,
            session,
            notifier,
        }
    }

    /// The change-signal channel of this store.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Resolve the current owner or fail `Unauthenticated`.
    fn owner(&self) -> Result<String, StoreError> {
        self.session
            .current_user_id()
            .ok_or(StoreError::Unauthenticated)
    }

    /// Parse a timestamp from the database.
    ///
    /// New rows store RFC3339; rows written by SQLite's CURRENT_TIMESTAMP
    /// use "YYYY-MM-DD HH:MM:SS", so both forms are accepted.
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        Err(anyhow::anyhow!(
            "Unable to parse timestamp '{}' as RFC3339 or SQLite format",
            s
        ))
    }

    /// Convert a libsql row to a [`Node`] model.
    ///
    /// Expected columns (in order): id, owner_id, parent_id, kind, title,
    /// content, position, created_at, updated_at.
    fn row_to_node(row: &Row) -> Result<Node> {
        let id: String = row.get(0).context("Failed to get id")?;
        let owner_id: String = row.get(1).context("Failed to get owner_id")?;
        let parent_id: Option<String> = row.get(2).context("Failed to get parent_id")?;
        let kind_str: String = row.get(3).context("Failed to get kind")?;
        let title: String = row.get(4).context("Failed to get title")?;
        let content_json: Option<String> = row.get(5).context("Failed to get content")?;
        let position: i64 = row.get(6).context("Failed to get position")?;
        let created_at_str: String = row.get(7).context("Failed to get created_at")?;
        let updated_at_str: String = row.get(8).context("Failed to get updated_at")?;

        let kind: NodeKind = kind_str
            .parse()
            .map_err(|e: ValidationError| anyhow::anyhow!(e.to_string()))?;

        let content = content_json
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .context("Failed to parse content JSON")?;

        let created_at =
            Self::parse_timestamp(&created_at_str).context("Failed to parse created_at")?;
        let updated_at =
            Self::parse_timestamp(&updated_at_str).context("Failed to parse updated_at")?;

        Ok(Node {
            id,
            owner_id,
            parent_id,
            kind,
            title,
            content,
            position,
            created_at,
            updated_at,
        })
    }

    /// Fetch a single owner-scoped node as a model.
    async fn get_node(&self, id: &str, owner_id: &str) -> Result<Option<Node>, StoreError> {
        match self.db.db_get_node(id, owner_id).await? {
            Some(row) => {
                let node = Self::row_to_node(&row)
                    .map_err(|e| StoreError::unavailable(e.to_string()))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// Fetch the owner's whole collection as models.
    async fn fetch_owner_nodes(&self, owner_id: &str) -> Result<Vec<Node>, StoreError> {
        let mut rows = self.db.db_fetch_all(owner_id).await?;

        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?
        {
            let node =
                Self::row_to_node(&row).map_err(|e| StoreError::unavailable(e.to_string()))?;
            nodes.push(node);
        }

        Ok(nodes)
    }

    /// Validate that `parent_id` may receive a new child of any kind.
    async fn validate_parent_for_create(
        &self,
        parent_id: &str,
        owner_id: &str,
    ) -> Result<(), StoreError> {
        let parent = self
            .get_node(parent_id, owner_id)
            .await?
            .ok_or_else(|| ValidationError::ParentNotFound(parent_id.to_string()))?;

        if !parent.is_folder() {
            return Err(ValidationError::ParentNotFolder(parent_id.to_string()).into());
        }

        Ok(())
    }
}

#[async_trait]
impl NodeStore for TursoStore {
    async fn fetch_all(&self) -> Result<Vec<Node>, StoreError> {
        let owner = self.owner()?;
        let nodes = self.fetch_owner_nodes(&owner).await?;
        debug!(owner = %owner, count = nodes.len(), "fetched node collection");
        Ok(nodes)
    }

    async fn create(
        &self,
        kind: NodeKind,
        title: &str,
        parent_id: Option<&str>,
    ) -> Result<Node, StoreError> {
        let owner = self.owner()?;
        let title = normalized_title(title)?;

        if let Some(parent_id) = parent_id {
            self.validate_parent_for_create(parent_id, &owner).await?;
        }

        // Position 0 here is a placeholder; the insert statement computes
        // the authoritative max-sibling + 1 and the re-read returns it.
        let node = Node::new(
            owner.clone(),
            kind,
            title,
            parent_id.map(String::from),
            0,
        );
        self.db.db_insert_node(&node).await?;

        let created = self
            .get_node(&node.id, &owner)
            .await?
            .ok_or_else(|| StoreError::unavailable("Node not found after creation"))?;

        info!(id = %created.id, kind = %created.kind, "created node");
        self.notifier.notify();
        Ok(created)
    }

    async fn update(&self, id: &str, update: NodeUpdate) -> Result<Node, StoreError> {
        let owner = self.owner()?;

        let current = self
            .get_node(id, &owner)
            .await?
            .ok_or_else(|| StoreError::not_found(id))?;

        let title = match update.title {
            Some(title) => normalized_title(&title)?,
            None => current.title.clone(),
        };

        let content = match update.content {
            Some(content) => {
                if current.is_folder() {
                    return Err(ValidationError::ContentOnFolder(id.to_string()).into());
                }
                Some(content)
            }
            None => current.content.clone(),
        };

        let parent_id = match update.parent_id {
            None => current.parent_id.clone(),
            Some(None) => None,
            Some(Some(new_parent_id)) => {
                // Moves need the whole collection for cycle detection; the
                // collection is small by design (hundreds of nodes).
                let nodes = self.fetch_owner_nodes(&owner).await?;
                let parent = nodes
                    .iter()
                    .find(|n| n.id == new_parent_id)
                    .ok_or_else(|| ValidationError::ParentNotFound(new_parent_id.clone()))?;

                if !parent.is_folder() {
                    return Err(ValidationError::ParentNotFolder(new_parent_id).into());
                }
                if !can_parent(&nodes, Some(parent), &current) {
                    return Err(ValidationError::CircularReference(new_parent_id).into());
                }
                Some(new_parent_id)
            }
        };

        let updated = Node {
            parent_id,
            title,
            content,
            position: update.position.unwrap_or(current.position),
            updated_at: Utc::now(),
            ..current
        };

        let rows_affected = self.db.db_update_node(&updated).await?;
        if rows_affected == 0 {
            // Deleted between our read and write, likely by another session.
            return Err(StoreError::not_found(id));
        }

        debug!(id = %updated.id, "updated node");
        self.notifier.notify();
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<DeleteResult, StoreError> {
        let owner = self.owner()?;

        let deleted_count = self.db.db_delete_subtree(id, &owner).await?;
        if deleted_count == 0 {
            return Err(StoreError::not_found(id));
        }

        info!(id = %id, deleted_count, "deleted subtree");
        self.notifier.notify();
        Ok(DeleteResult { deleted_count })
    }

    fn subscribe(&self) -> ChangeSubscription {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticSession;
    use serde_json::json;
    use tempfile::TempDir;

    async fn create_test_store() -> (TursoStore, Arc<StaticSession>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
        let session = Arc::new(StaticSession::new("user-1"));
        let store = TursoStore::new(db, session.clone());

        (store, session, temp_dir)
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_positions() {
        let (store, _session, _temp) = create_test_store().await;

        let a = store.create(NodeKind::Folder, "Work", None).await.unwrap();
        let b = store.create(NodeKind::Note, "Loose", None).await.unwrap();
        assert_eq!(a.position, 0);
        assert_eq!(b.position, 1);

        // Positions restart per parent.
        let child = store
            .create(NodeKind::Note, "Q1 Plan", Some(&a.id))
            .await
            .unwrap();
        assert_eq!(child.position, 0);
        assert_eq!(child.parent_id.as_deref(), Some(a.id.as_str()));

        let sibling = store
            .create(NodeKind::Note, "Q2 Plan", Some(&a.id))
            .await
            .unwrap();
        assert_eq!(sibling.position, 1);
    }

    #[tokio::test]
    async fn test_create_trims_title_and_rejects_empty() {
        let (store, _session, _temp) = create_test_store().await;

        let node = store.create(NodeKind::Note, "  Padded  ", None).await.unwrap();
        assert_eq!(node.title, "Padded");

        let err = store.create(NodeKind::Note, "   ", None).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::EmptyTitle)
        ));

        // Collection unchanged by the rejected create.
        assert_eq!(store.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_parents() {
        let (store, _session, _temp) = create_test_store().await;

        let note = store.create(NodeKind::Note, "A note", None).await.unwrap();

        let err = store
            .create(NodeKind::Note, "Child", Some(&note.id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::ParentNotFolder(_))
        ));

        let err = store
            .create(NodeKind::Note, "Child", Some("no-such-id"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::ParentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mutations_require_session() {
        let (store, session, _temp) = create_test_store().await;
        session.sign_out();

        assert!(matches!(
            store.create(NodeKind::Note, "X", None).await.unwrap_err(),
            StoreError::Unauthenticated
        ));
        assert!(matches!(
            store.update("any", NodeUpdate::title("Y")).await.unwrap_err(),
            StoreError::Unauthenticated
        ));
        assert!(matches!(
            store.delete("any").await.unwrap_err(),
            StoreError::Unauthenticated
        ));
        assert!(matches!(
            store.fetch_all().await.unwrap_err(),
            StoreError::Unauthenticated
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_is_owner_scoped() {
        let (store, session, _temp) = create_test_store().await;

        store.create(NodeKind::Note, "Mine", None).await.unwrap();

        session.sign_in("user-2");
        assert!(store.fetch_all().await.unwrap().is_empty());
        store.create(NodeKind::Note, "Theirs", None).await.unwrap();

        session.sign_in("user-1");
        let mine = store.fetch_all().await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Mine");
    }

    #[tokio::test]
    async fn test_update_renames_and_refreshes_timestamp() {
        let (store, _session, _temp) = create_test_store().await;

        let created = store.create(NodeKind::Note, "Draft", None).await.unwrap();
        let updated = store
            .update(&created.id, NodeUpdate::title("  Final  "))
            .await
            .unwrap();

        assert_eq!(updated.title, "Final");
        assert!(updated.updated_at > created.updated_at);

        let reloaded = store.fetch_all().await.unwrap();
        assert_eq!(reloaded[0].title, "Final");
    }

    #[tokio::test]
    async fn test_update_content_on_folder_is_rejected() {
        let (store, _session, _temp) = create_test_store().await;

        let folder = store.create(NodeKind::Folder, "Work", None).await.unwrap();
        let err = store
            .update(&folder.id, NodeUpdate::content(json!({"type": "doc"})))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::ContentOnFolder(_))
        ));
    }

    #[tokio::test]
    async fn test_update_persists_opaque_content() {
        let (store, _session, _temp) = create_test_store().await;

        let note = store.create(NodeKind::Note, "Doc", None).await.unwrap();
        assert_eq!(note.content, Some(json!({})));

        let body = json!({"type": "doc", "content": [{"type": "paragraph"}]});
        store
            .update(&note.id, NodeUpdate::content(body.clone()))
            .await
            .unwrap();

        let reloaded = store.fetch_all().await.unwrap();
        assert_eq!(reloaded[0].content, Some(body));
    }

    #[tokio::test]
    async fn test_update_foreign_node_is_not_found() {
        let (store, session, _temp) = create_test_store().await;

        let mine = store.create(NodeKind::Note, "Mine", None).await.unwrap();

        session.sign_in("user-2");
        let err = store
            .update(&mine.id, NodeUpdate::title("Hijacked"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_move_validates_target_and_cycles() {
        let (store, _session, _temp) = create_test_store().await;

        let outer = store.create(NodeKind::Folder, "Outer", None).await.unwrap();
        let inner = store
            .create(NodeKind::Folder, "Inner", Some(&outer.id))
            .await
            .unwrap();
        let note = store.create(NodeKind::Note, "Note", None).await.unwrap();

        // Legal move: note into the nested folder.
        let moved = store
            .update(&note.id, NodeUpdate::parent(Some(inner.id.clone())))
            .await
            .unwrap();
        assert_eq!(moved.parent_id.as_deref(), Some(inner.id.as_str()));

        // Moving a folder under its own descendant is a cycle.
        let err = store
            .update(&outer.id, NodeUpdate::parent(Some(inner.id.clone())))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::CircularReference(_))
        ));

        // A note can never be a move target.
        let err = store
            .update(&inner.id, NodeUpdate::parent(Some(note.id.clone())))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::ParentNotFolder(_))
        ));

        // Explicit move back to root.
        let rooted = store
            .update(&note.id, NodeUpdate::parent(None))
            .await
            .unwrap();
        assert!(rooted.parent_id.is_none());
    }

    #[tokio::test]
    async fn test_delete_folder_cascades_to_descendants() {
        let (store, _session, _temp) = create_test_store().await;

        let work = store.create(NodeKind::Folder, "Work", None).await.unwrap();
        let archive = store
            .create(NodeKind::Folder, "Archive", Some(&work.id))
            .await
            .unwrap();
        store
            .create(NodeKind::Note, "Old", Some(&archive.id))
            .await
            .unwrap();
        let keep = store.create(NodeKind::Note, "Keep", None).await.unwrap();

        let result = store.delete(&work.id).await.unwrap();
        assert_eq!(result.deleted_count, 3);

        let remaining = store.fetch_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_delete_note_removes_only_that_note() {
        let (store, _session, _temp) = create_test_store().await;

        let a = store.create(NodeKind::Note, "A", None).await.unwrap();
        store.create(NodeKind::Note, "B", None).await.unwrap();

        let result = store.delete(&a.id).await.unwrap();
        assert_eq!(result.deleted_count, 1);
        assert_eq!(store.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (store, _session, _temp) = create_test_store().await;

        let err = store.delete("no-such-id").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_every_mutation_emits_a_change_signal() {
        let (store, _session, _temp) = create_test_store().await;
        let mut sub = store.subscribe();

        let node = store.create(NodeKind::Note, "A", None).await.unwrap();
        assert!(sub.changed().await.is_some());

        store
            .update(&node.id, NodeUpdate::title("B"))
            .await
            .unwrap();
        assert!(sub.changed().await.is_some());

        store.delete(&node.id).await.unwrap();
        assert!(sub.changed().await.is_some());
    }

    #[tokio::test]
    async fn test_failed_mutations_emit_no_signal() {
        let (store, _session, _temp) = create_test_store().await;
        let mut sub = store.subscribe();

        let _ = store.create(NodeKind::Note, "  ", None).await;
        let _ = store.delete("no-such-id").await;

        // Drop the only notifier-side activity and close our view of it:
        // nothing was sent, so an unsubscribed receiver sees nothing.
        sub.unsubscribe();
        assert_eq!(store.notifier().receiver_count(), 0);
    }
}
