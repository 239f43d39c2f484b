//! Tree Derivation
//!
//! Pure derivation of the ordered folder/note hierarchy from the flat node
//! collection. The tree is recomputed from scratch on every call; at the
//! target scale (hundreds of nodes) this is cheaper and far less bug-prone
//! than incremental diffing.
//!
//! # Ordering
//!
//! Siblings sort folders before notes; within a kind by ascending
//! `position`; position ties break on case-insensitive title comparison.
//!
//! # Consistency faults
//!
//! The builder must never be handed a collection with cycles, but a corrupt
//! parent chain (for example a self-parenting row) would otherwise recurse
//! forever. Traversal is therefore iterative with an explicit stack and a
//! depth cap equal to the collection size; exceeding the cap is an internal
//! consistency fault, surfaced as [`TreeError::DepthCapExceeded`] and
//! distinct from a normal empty result.

use crate::models::Node;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised during tree derivation.
#[derive(Error, Debug)]
pub enum TreeError {
    /// Traversal descended deeper than the collection size, which is only
    /// possible when the parent chain is corrupt.
    #[error("Tree depth cap of {cap} exceeded at node {node_id}")]
    DepthCapExceeded { cap: usize, node_id: String },
}

/// Ephemeral hierarchical view of a [`Node`] with computed children.
///
/// Derived on every read, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    /// The underlying flat record
    #[serde(flatten)]
    pub node: Node,

    /// Ordered children, folders first
    pub children: Vec<TreeNode>,
}

/// Sibling comparator: folders before notes, then ascending position, then
/// case-insensitive title.
fn sibling_order(a: &Node, b: &Node) -> Ordering {
    match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .position
            .cmp(&b.position)
            .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase())),
    }
}

/// Derive the ordered forest rooted at `parent_id` (`None` for root level).
///
/// Every node whose `parent_id` matches the target becomes a root of the
/// returned forest, with children populated transitively. Nodes whose parent
/// is missing from the collection are unreachable and simply do not appear.
///
/// # Errors
///
/// Returns [`TreeError::DepthCapExceeded`] when traversal descends deeper
/// than the collection size. Callers should log this distinctly and fall
/// back to an empty tree rather than crash (see
/// [`crate::services::NodeService::tree`]).
///
/// # Examples
///
/// ```rust
/// use notex_core::models::{build_tree, Node, NodeKind};
///
/// let folder = Node::new("u".to_string(), NodeKind::Folder, "Work".to_string(), None, 0);
/// let note = Node::new(
///     "u".to_string(),
///     NodeKind::Note,
///     "Q1 Plan".to_string(),
///     Some(folder.id.clone()),
///     0,
/// );
///
/// let tree = build_tree(&[folder, note], None).unwrap();
/// assert_eq!(tree.len(), 1);
/// assert_eq!(tree[0].children.len(), 1);
/// assert_eq!(tree[0].children[0].node.title, "Q1 Plan");
/// ```
pub fn build_tree(nodes: &[Node], parent_id: Option<&str>) -> Result<Vec<TreeNode>, TreeError> {
    let mut by_parent: HashMap<Option<&str>, Vec<&Node>> = HashMap::new();
    for node in nodes {
        by_parent
            .entry(node.parent_id.as_deref())
            .or_default()
            .push(node);
    }
    for children in by_parent.values_mut() {
        children.sort_by(|a, b| sibling_order(a, b));
    }

    let cap = nodes.len();
    let roots = by_parent.get(&parent_id).cloned().unwrap_or_default();

    let mut forest = Vec::with_capacity(roots.len());
    for root in roots {
        forest.push(attach_subtree(root, &by_parent, cap)?);
    }
    Ok(forest)
}

/// One in-progress level of the iterative depth-first assembly.
struct Frame<'a> {
    node: &'a Node,
    pending: std::vec::IntoIter<&'a Node>,
    built: Vec<TreeNode>,
}

/// Build the subtree rooted at `root` with an explicit stack.
///
/// The stack depth equals the current tree depth, so `stack.len() > cap`
/// can only happen when a parent chain loops back on itself.
fn attach_subtree(
    root: &Node,
    by_parent: &HashMap<Option<&str>, Vec<&Node>>,
    cap: usize,
) -> Result<TreeNode, TreeError> {
    let children_of = |node: &Node| {
        by_parent
            .get(&Some(node.id.as_str()))
            .cloned()
            .unwrap_or_default()
            .into_iter()
    };

    let mut stack = vec![Frame {
        node: root,
        pending: children_of(root),
        built: Vec::new(),
    }];

    loop {
        if stack.len() > cap {
            let node_id = stack
                .last()
                .map(|f| f.node.id.clone())
                .unwrap_or_default();
            return Err(TreeError::DepthCapExceeded { cap, node_id });
        }

        let top = stack
            .last_mut()
            .expect("stack is non-empty until the root frame completes");

        if let Some(child) = top.pending.next() {
            stack.push(Frame {
                node: child,
                pending: children_of(child),
                built: Vec::new(),
            });
            continue;
        }

        let finished = stack.pop().expect("just observed a top frame");
        let subtree = TreeNode {
            node: finished.node.clone(),
            children: finished.built,
        };

        match stack.last_mut() {
            Some(parent) => parent.built.push(subtree),
            None => return Ok(subtree),
        }
    }
}
