//! Node Data Structures
//!
//! This module defines the core `Node` record and related types for Notex's
//! folder/note tree.
//!
//! # Architecture
//!
//! - **Flat storage**: every node is one row in the `nodes` table; the tree
//!   is derived, never stored (see [`crate::models::tree`])
//! - **Opaque content**: note bodies are editor-defined JSON blobs this core
//!   never inspects; folders carry no content at all
//! - **Owner scoping**: every node belongs to exactly one user and is only
//!   visible through that user's session
//!
//! # Examples
//!
//! ```rust
//! use notex_core::models::{Node, NodeKind};
//!
//! let folder = Node::new("user-1".to_string(), NodeKind::Folder, "Work".to_string(), None, 0);
//! let note = Node::new(
//!     "user-1".to_string(),
//!     NodeKind::Note,
//!     "Q1 Plan".to_string(),
//!     Some(folder.id.clone()),
//!     0,
//! );
//!
//! assert!(folder.is_folder());
//! assert!(note.content.is_some());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for node operations
///
/// These are the locally detectable rejections: empty titles, wrong parent
/// kinds, cycles. They are raised before any remote call where possible.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Invalid node kind: {0}")]
    InvalidKind(String),

    #[error("Parent node not found: {0}")]
    ParentNotFound(String),

    #[error("Parent must be a folder: {0}")]
    ParentNotFolder(String),

    #[error("Circular parent reference: {0}")]
    CircularReference(String),

    #[error("Folders cannot carry content: {0}")]
    ContentOnFolder(String),
}

/// Kind of a node: a `Folder` groups children, a `Note` carries content.
///
/// Immutable after creation. Serialized lowercase to match the persisted
/// record shape (`"folder"` / `"note"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Note,
}

impl NodeKind {
    /// Storage representation, matching the serde form.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Folder => "folder",
            NodeKind::Note => "note",
        }
    }
}

impl std::str::FromStr for NodeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "folder" => Ok(NodeKind::Folder),
            "note" => Ok(NodeKind::Note),
            other => Err(ValidationError::InvalidKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted node record.
///
/// # Fields
///
/// - `id`: unique identifier (UUID v4), assigned at creation, immutable
/// - `owner_id`: owning user, set at creation, immutable
/// - `parent_id`: optional reference to a folder node; `None` means root level
/// - `kind`: `folder` or `note`, immutable after creation
/// - `title`: human-readable name; non-empty after trimming
/// - `content`: opaque editor JSON for notes, `None` for folders
/// - `position`: integer sibling-ordering key (max sibling + 1 at creation);
///   not a dense index
/// - `created_at` / `updated_at`: UTC timestamps; `updated_at` refreshed on
///   every mutation
///
/// The serialized field names are the wire/storage contract other tooling
/// (export, migration) must respect; a contract test pins them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Owning user
    pub owner_id: String,

    /// Parent folder reference; `None` for root-level nodes
    pub parent_id: Option<String>,

    /// Folder or note (immutable)
    pub kind: NodeKind,

    /// Display title
    pub title: String,

    /// Opaque editor document; `None` for folders, defaults to `{}` for notes
    pub content: Option<serde_json::Value>,

    /// Sibling ordering key within the same parent
    pub position: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Create a new node with an auto-generated UUID.
    ///
    /// Notes start with an empty JSON object as content; folders carry none.
    /// The caller supplies the sibling `position` (the authoritative store
    /// computes it as max sibling position + 1).
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use notex_core::models::{Node, NodeKind};
    /// let node = Node::new("user-1".to_string(), NodeKind::Note, "Ideas".to_string(), None, 0);
    /// assert_eq!(node.content, Some(serde_json::json!({})));
    /// assert_eq!(node.position, 0);
    /// ```
    pub fn new(
        owner_id: String,
        kind: NodeKind,
        title: String,
        parent_id: Option<String>,
        position: i64,
    ) -> Self {
        let now = Utc::now();
        let content = match kind {
            NodeKind::Folder => None,
            NodeKind::Note => Some(serde_json::json!({})),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            parent_id,
            kind,
            title,
            content,
            position,
            created_at: now,
            updated_at: now,
        }
    }

    /// True if this node is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// True if this node is a note.
    pub fn is_note(&self) -> bool {
        self.kind == NodeKind::Note
    }
}

/// Validate and normalize a title: must be non-empty after trimming.
///
/// Every creation/rename path goes through this before touching the store.
pub fn normalized_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

/// Check whether `parent_candidate` may become the parent of `node`.
///
/// True iff the candidate is `None` (root), or is a folder that is neither
/// `node` itself nor one of `node`'s descendants. The descendant walk is
/// bounded by the collection size, so a corrupted parent chain cannot loop
/// forever.
///
/// # Examples
///
/// ```rust
/// # use notex_core::models::{can_parent, Node, NodeKind};
/// let folder = Node::new("u".to_string(), NodeKind::Folder, "A".to_string(), None, 0);
/// let note = Node::new("u".to_string(), NodeKind::Note, "B".to_string(), Some(folder.id.clone()), 0);
/// let nodes = vec![folder.clone(), note.clone()];
///
/// assert!(can_parent(&nodes, Some(&folder), &note));
/// assert!(!can_parent(&nodes, Some(&note), &folder)); // notes cannot parent
/// ```
pub fn can_parent(nodes: &[Node], parent_candidate: Option<&Node>, node: &Node) -> bool {
    let Some(parent) = parent_candidate else {
        return true;
    };

    if !parent.is_folder() || parent.id == node.id {
        return false;
    }

    // Walk the candidate's ancestor chain; if it passes through `node`, the
    // candidate is a descendant and reparenting would create a cycle.
    let mut current = parent.parent_id.as_deref();
    let mut hops = 0usize;
    while let Some(ancestor_id) = current {
        if ancestor_id == node.id {
            return false;
        }
        hops += 1;
        if hops > nodes.len() {
            // Parent chain longer than the collection means it already loops.
            return false;
        }
        current = nodes
            .iter()
            .find(|n| n.id == ancestor_id)
            .and_then(|n| n.parent_id.as_deref());
    }

    true
}

fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Accept either T or null from JSON; a missing field is handled by
    // #[serde(default)] on the struct field.
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update for rename, content edit, move and reorder paths.
///
/// All fields are optional; only provided fields are written. `kind` and
/// `owner_id` are immutable and intentionally absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeUpdate {
    /// New title (validated non-empty after trimming)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// New editor document (notes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,

    /// New parent reference
    ///
    /// Uses the double-Option pattern:
    /// - `None`: don't change `parent_id`
    /// - `Some(None)`: move to root level
    /// - `Some(Some(id))`: move under the given folder
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<String>>,

    /// New sibling ordering key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl NodeUpdate {
    /// Convenience constructor for a rename.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Convenience constructor for a content edit.
    pub fn content(content: serde_json::Value) -> Self {
        Self {
            content: Some(content),
            ..Default::default()
        }
    }

    /// Convenience constructor for a move (reparent), keeping position intact.
    pub fn parent(parent_id: Option<String>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }
}

/// Result of a cascade delete: the node itself plus all descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    /// Number of rows removed, including the target node
    pub deleted_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn folder(owner: &str, title: &str, parent: Option<&str>) -> Node {
        Node::new(
            owner.to_string(),
            NodeKind::Folder,
            title.to_string(),
            parent.map(String::from),
            0,
        )
    }

    fn note(owner: &str, title: &str, parent: Option<&str>) -> Node {
        Node::new(
            owner.to_string(),
            NodeKind::Note,
            title.to_string(),
            parent.map(String::from),
            0,
        )
    }

    #[test]
    fn test_new_note_defaults_to_empty_object_content() {
        let n = note("user-1", "My note", None);
        assert!(n.is_note());
        assert_eq!(n.content, Some(json!({})));
        assert_eq!(n.position, 0);
        assert_eq!(n.created_at, n.updated_at);
    }

    #[test]
    fn test_new_folder_has_no_content() {
        let f = folder("user-1", "Work", None);
        assert!(f.is_folder());
        assert!(!f.is_note());
        assert!(f.content.is_none());
    }

    #[test]
    fn test_node_ids_are_unique() {
        let a = note("user-1", "A", None);
        let b = note("user-1", "A", None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_normalized_title_trims_and_rejects_empty() {
        assert_eq!(normalized_title("  Plans  ").unwrap(), "Plans");
        assert!(matches!(
            normalized_title("   "),
            Err(ValidationError::EmptyTitle)
        ));
        assert!(matches!(
            normalized_title(""),
            Err(ValidationError::EmptyTitle)
        ));
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        assert_eq!("folder".parse::<NodeKind>().unwrap(), NodeKind::Folder);
        assert_eq!("note".parse::<NodeKind>().unwrap(), NodeKind::Note);
        assert!("page".parse::<NodeKind>().is_err());
        assert_eq!(NodeKind::Folder.as_str(), "folder");
    }

    /// Contract test: pins the exact persisted record shape.
    ///
    /// Export and migration tooling reads these field names; if this test
    /// fails, the wire contract changed and that tooling needs updating.
    #[test]
    fn test_node_serialization_contract() {
        let mut n = note("user-1", "Q1 Plan", Some("parent-1"));
        n.content = Some(json!({"type": "doc"}));
        n.position = 3;

        let parsed: serde_json::Value = serde_json::to_value(&n).unwrap();

        assert!(parsed.get("id").is_some());
        assert_eq!(parsed.get("owner_id").unwrap(), "user-1");
        assert_eq!(parsed.get("parent_id").unwrap(), "parent-1");
        assert_eq!(parsed.get("kind").unwrap(), "note");
        assert_eq!(parsed.get("title").unwrap(), "Q1 Plan");
        assert_eq!(parsed.get("content").unwrap(), &json!({"type": "doc"}));
        assert_eq!(parsed.get("position").unwrap(), 3);
        assert!(parsed.get("created_at").is_some());
        assert!(parsed.get("updated_at").is_some());

        // Folder content serializes as explicit null, not a missing field.
        let f = folder("user-1", "Work", None);
        let parsed = serde_json::to_value(&f).unwrap();
        assert_eq!(parsed.get("kind").unwrap(), "folder");
        assert!(parsed.get("content").unwrap().is_null());
        assert!(parsed.get("parent_id").unwrap().is_null());
    }

    #[test]
    fn test_node_update_double_option_deserialization() {
        // Field absent: don't touch parent_id.
        let u: NodeUpdate = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert!(u.parent_id.is_none());

        // Field null: move to root.
        let u: NodeUpdate = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        assert_eq!(u.parent_id, Some(None));

        // Field set: move under folder.
        let u: NodeUpdate = serde_json::from_str(r#"{"parent_id":"f-1"}"#).unwrap();
        assert_eq!(u.parent_id, Some(Some("f-1".to_string())));
    }

    #[test]
    fn test_can_parent_accepts_root_and_folders() {
        let f = folder("u", "A", None);
        let n = note("u", "B", None);
        let nodes = vec![f.clone(), n.clone()];

        assert!(can_parent(&nodes, None, &n));
        assert!(can_parent(&nodes, Some(&f), &n));
    }

    #[test]
    fn test_can_parent_rejects_notes_and_self() {
        let f = folder("u", "A", None);
        let n = note("u", "B", None);
        let nodes = vec![f.clone(), n.clone()];

        assert!(!can_parent(&nodes, Some(&n), &f));
        assert!(!can_parent(&nodes, Some(&f), &f));
    }

    #[test]
    fn test_can_parent_rejects_descendants() {
        // grandparent -> parent -> child; the grandparent cannot be moved
        // under any of its descendants.
        let grandparent = folder("u", "gp", None);
        let parent = folder("u", "p", Some(&grandparent.id));
        let child = folder("u", "c", Some(&parent.id));
        let nodes = vec![grandparent.clone(), parent.clone(), child.clone()];

        assert!(!can_parent(&nodes, Some(&child), &grandparent));
        assert!(!can_parent(&nodes, Some(&parent), &grandparent));
        assert!(can_parent(&nodes, Some(&grandparent), &child));
    }

    #[test]
    fn test_can_parent_survives_corrupted_parent_chain() {
        // a and b form a parent cycle that is unrelated to the node being
        // moved; the bounded walk must terminate and reject.
        let mut a = folder("u", "a", None);
        let mut b = folder("u", "b", None);
        a.parent_id = Some(b.id.clone());
        b.parent_id = Some(a.id.clone());
        let n = note("u", "n", None);
        let nodes = vec![a.clone(), b.clone(), n.clone()];

        assert!(!can_parent(&nodes, Some(&a), &n));
    }
}
