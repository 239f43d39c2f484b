//! EditingSession - Selection and Debounced Content Saves
//!
//! Tracks which note is open in the editor and write-behinds its content.
//! Keystroke-granularity edits land here as whole-document snapshots; the
//! session keeps only the newest one and persists it after a quiet period,
//! so a burst of edits costs one store write.
//!
//! # Flush points
//!
//! A pending edit is forced out, timer or not, whenever losing it becomes
//! possible: switching selection, clearing selection, and closing the
//! session. A failed background flush restores the edit as pending so a
//! later flush retries it; edits are only dropped when a newer snapshot of
//! the same note supersedes them.

use crate::models::{NodeUpdate, ValidationError};
use crate::services::{NodeService, WorkspaceError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Quiet period before a pending edit is written out.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

/// A content snapshot awaiting persistence.
#[derive(Debug, Clone)]
struct PendingEdit {
    node_id: String,
    content: Value,
}

#[derive(Debug, Default)]
struct SessionInner {
    /// Currently selected note id, if any
    selected: Option<String>,
    /// Newest unsaved content snapshot
    pending: Option<PendingEdit>,
    /// True while a store write is in flight
    writing: bool,
    /// Bumped per edit; stale debounce timers recognize themselves by it
    generation: u64,
}

/// Selection plus write-behind persistence for note content.
#[derive(Clone)]
pub struct EditingSession {
    service: Arc<NodeService>,
    debounce: Duration,
    inner: Arc<Mutex<SessionInner>>,
}

impl EditingSession {
    pub fn new(service: Arc<NodeService>) -> Self {
        Self::with_debounce(service, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(service: Arc<NodeService>, debounce: Duration) -> Self {
        Self {
            service,
            debounce,
            inner: Arc::new(Mutex::new(SessionInner::default())),
        }
    }

    /// Currently selected note id.
    pub async fn selected_note(&self) -> Option<String> {
        self.inner.lock().await.selected.clone()
    }

    /// True while an edit awaits persistence or is being written.
    pub async fn has_unsaved_edit(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.pending.is_some() || inner.writing
    }

    /// Select a note for editing, returning its content for the editor.
    ///
    /// Any unsaved edit of the previous selection is flushed first, so
    /// switching can surface that flush's error.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the id is absent from the workspace snapshot
    /// - `Validation` when the id names a folder
    pub async fn select_note(&self, id: &str) -> Result<Value, WorkspaceError> {
        let node = self
            .service
            .get_node(id)
            .await
            .ok_or_else(|| WorkspaceError::NotFound { id: id.to_string() })?;

        if node.is_folder() {
            return Err(ValidationError::ContentOnFolder(id.to_string()).into());
        }

        self.flush().await?;

        let mut inner = self.inner.lock().await;
        inner.selected = Some(id.to_string());
        debug!(id = %id, "note selected");
        Ok(node.content.unwrap_or_else(|| json!({})))
    }

    /// Drop the selection, flushing any unsaved edit first.
    pub async fn clear_selection(&self) -> Result<(), WorkspaceError> {
        self.flush().await?;
        self.inner.lock().await.selected = None;
        Ok(())
    }

    /// Record a new content snapshot for the selected note.
    ///
    /// Supersedes any previous unsaved snapshot and restarts the quiet
    /// period. With no selection the snapshot is dropped; editor events can
    /// trail a deselection and must not resurrect state.
    pub async fn content_changed(&self, content: Value) {
        let generation = {
            let mut inner = self.inner.lock().await;
            let Some(node_id) = inner.selected.clone() else {
                debug!("content event with no selection dropped");
                return;
            };

            inner.generation += 1;
            inner.pending = Some(PendingEdit { node_id, content });
            inner.generation
        };

        let session = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(session.debounce).await;
            session.debounce_elapsed(generation).await;
        });
    }

    /// Persist any unsaved edit now, waiting out an in-flight write.
    pub async fn flush(&self) -> Result<(), WorkspaceError> {
        self.drain_pending().await
    }

    /// End the session, persisting whatever is unsaved.
    pub async fn close(self) -> Result<(), WorkspaceError> {
        self.flush().await?;
        let mut inner = self.inner.lock().await;
        inner.selected = None;
        Ok(())
    }

    /// Timer callback for the edit tagged `generation`.
    async fn debounce_elapsed(&self, generation: u64) {
        {
            let inner = self.inner.lock().await;
            // A newer edit restarted the quiet period, or a write is in
            // flight and will drain this edit itself.
            if inner.generation != generation || inner.writing || inner.pending.is_none() {
                return;
            }
        }

        if let Err(e) = self.drain_pending().await {
            warn!(error = %e, "background content save failed");
        }
    }

    /// Write out pending edits until none remain and no write is in flight.
    ///
    /// Edits that land while a write is in flight are written on the next
    /// loop turn rather than waiting out a fresh quiet period; a closing
    /// flush must never leave a tail behind. A write owned by another task
    /// is waited out, not skipped.
    async fn drain_pending(&self) -> Result<(), WorkspaceError> {
        enum Step {
            Busy,
            Done,
            Write(PendingEdit),
        }

        loop {
            let step = {
                let mut inner = self.inner.lock().await;
                if inner.writing {
                    Step::Busy
                } else {
                    match inner.pending.take() {
                        Some(edit) => {
                            inner.writing = true;
                            Step::Write(edit)
                        }
                        None => Step::Done,
                    }
                }
            };

            let edit = match step {
                Step::Busy => {
                    tokio::task::yield_now().await;
                    continue;
                }
                Step::Done => return Ok(()),
                Step::Write(edit) => edit,
            };

            let result = self
                .service
                .update_node(&edit.node_id, NodeUpdate::content(edit.content.clone()))
                .await;

            let mut inner = self.inner.lock().await;
            inner.writing = false;
            if let Err(e) = result {
                // Keep the edit retryable unless something newer arrived.
                if inner.pending.is_none() {
                    inner.pending = Some(edit);
                }
                return Err(e);
            }
            debug!(id = %edit.node_id, "content saved");
        }
    }
}
