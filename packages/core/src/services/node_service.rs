//! NodeService - Client-Side Workspace State
//!
//! This service is the single owner of the client's view of the node
//! collection. It holds a flat snapshot of the owner's nodes, applies
//! optimistic local updates as store mutations confirm, and derives the
//! display tree on demand.
//!
//! # State discipline
//!
//! - `load` replaces the snapshot wholesale with the store's answer; it
//!   never merges
//! - mutations apply the store's confirmed row to the snapshot, so the
//!   snapshot only ever contains rows the store acknowledged
//! - a failed load keeps the previous snapshot; stale data beats no data
//!
//! Background reconciliation is opt-in via [`spawn_sync`]: a task that
//! listens for change signals and answers each with a full reload.

use crate::db::NodeStore;
use crate::models::{build_tree, DeleteResult, Node, NodeKind, NodeUpdate, TreeNode};
use crate::services::WorkspaceError;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Snapshot of client-side workspace state.
#[derive(Debug, Default)]
struct WorkspaceState {
    nodes: Vec<Node>,
    loading: bool,
}

/// Client-side controller over a [`NodeStore`].
pub struct NodeService {
    store: Arc<dyn NodeStore>,
    state: RwLock<WorkspaceState>,
}

impl NodeService {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self {
            store,
            state: RwLock::new(WorkspaceState::default()),
        }
    }

    /// The store this service fronts.
    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    /// True while a load is in flight.
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Current flat snapshot, position-ordered as fetched.
    pub async fn nodes(&self) -> Vec<Node> {
        self.state.read().await.nodes.clone()
    }

    /// Look up one node in the snapshot.
    pub async fn get_node(&self, id: &str) -> Option<Node> {
        self.state
            .read()
            .await
            .nodes
            .iter()
            .find(|n| n.id == id)
            .cloned()
    }

    /// Re-fetch the whole collection and replace the snapshot.
    ///
    /// On failure the previous snapshot stays untouched and the error is
    /// returned; callers decide whether to surface or retry.
    pub async fn load(&self) -> Result<(), WorkspaceError> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
        }

        let result = self.store.fetch_all().await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(nodes) => {
                debug!(count = nodes.len(), "workspace snapshot replaced");
                state.nodes = nodes;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "load failed, keeping previous snapshot");
                Err(e.into())
            }
        }
    }

    /// Create a node and append the confirmed row to the snapshot.
    pub async fn create_node(
        &self,
        kind: NodeKind,
        title: &str,
        parent_id: Option<&str>,
    ) -> Result<Node, WorkspaceError> {
        let created = self.store.create(kind, title, parent_id).await?;

        let mut state = self.state.write().await;
        state.nodes.push(created.clone());
        Ok(created)
    }

    /// Apply a sparse update and replace the confirmed row in the snapshot.
    pub async fn update_node(
        &self,
        id: &str,
        update: NodeUpdate,
    ) -> Result<Node, WorkspaceError> {
        let updated = self.store.update(id, update).await?;

        let mut state = self.state.write().await;
        if let Some(slot) = state.nodes.iter_mut().find(|n| n.id == id) {
            *slot = updated.clone();
        } else {
            // Confirmed by the store but absent locally: the snapshot is
            // behind (external create observed only through its update).
            state.nodes.push(updated.clone());
        }
        Ok(updated)
    }

    /// Delete a node and drop its whole subtree from the snapshot.
    ///
    /// The store cascades authoritatively; the local removal mirrors that
    /// cascade so the snapshot never shows orphaned descendants.
    pub async fn delete_node(&self, id: &str) -> Result<DeleteResult, WorkspaceError> {
        let result = self.store.delete(id).await?;

        let mut state = self.state.write().await;
        let doomed = collect_subtree_ids(&state.nodes, id);
        state.nodes.retain(|n| !doomed.contains(n.id.as_str()));
        Ok(result)
    }

    /// Derive the display tree for the whole workspace.
    ///
    /// Structural faults in the snapshot are logged and rendered as an
    /// empty tree; the caller's recovery in both cases is a reload.
    pub async fn tree(&self) -> Vec<TreeNode> {
        match self.try_tree(None).await {
            Ok(tree) => tree,
            Err(e) => {
                error!(error = %e, "tree derivation failed");
                Vec::new()
            }
        }
    }

    /// Derive the display tree rooted under `parent_id`, reporting faults.
    pub async fn try_tree(
        &self,
        parent_id: Option<&str>,
    ) -> Result<Vec<TreeNode>, WorkspaceError> {
        let state = self.state.read().await;
        Ok(build_tree(&state.nodes, parent_id)?)
    }
}

/// Ids of `root_id` and every snapshot descendant reachable from it.
fn collect_subtree_ids(nodes: &[Node], root_id: &str) -> HashSet<String> {
    let mut doomed: HashSet<String> = HashSet::new();
    doomed.insert(root_id.to_string());

    // Children lists are unindexed here; repeated sweeps terminate because
    // each pass either grows the set or ends the loop.
    loop {
        let before = doomed.len();
        for node in nodes {
            if let Some(parent_id) = node.parent_id.as_deref() {
                if doomed.contains(parent_id) {
                    doomed.insert(node.id.clone());
                }
            }
        }
        if doomed.len() == before {
            break;
        }
    }

    doomed
}

/// Handle over the background reconciliation task.
///
/// Aborts the task on [`SyncHandle::shutdown`] or drop, whichever comes
/// first.
pub struct SyncHandle {
    handle: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Stop listening for change signals. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn a task that answers every store change signal with a full reload.
///
/// Signals carry no payload, so the only reaction is refetch-and-replace;
/// coalesced signals cost one redundant reload at worst. The task ends on
/// its own when the store's notification channel closes.
pub fn spawn_sync(service: Arc<NodeService>) -> SyncHandle {
    let mut subscription = service.store.subscribe();

    let handle = tokio::spawn(async move {
        while subscription.changed().await.is_some() {
            if let Err(e) = service.load().await {
                warn!(error = %e, "reload after change signal failed");
            }
        }
        debug!("change channel closed, sync task ending");
    });

    SyncHandle {
        handle: Some(handle),
    }
}
