//! Data Models
//!
//! This module contains the core data structures used throughout Notex:
//!
//! - `Node` - persisted folder/note record (the flat collection element)
//! - `TreeNode` - derived hierarchical view, computed on every read
//!
//! The flat collection is the source of truth; everything hierarchical is
//! derived by [`build_tree`].

mod node;
mod tree;

pub use node::{can_parent, normalized_title, DeleteResult, Node, NodeKind, NodeUpdate, ValidationError};
pub use tree::{build_tree, TreeError, TreeNode};
