//! Ordered, child-deduplicated named trees.
//!
//! [`SymbolTree`] is an arena: nodes are addressed by [`NodeId`] and each
//! parent keeps a name index of its children, so lookups never search the
//! whole tree. [`Fragment`] is the small owned tree returned while walking
//! rule syntax; it is grafted onto the arena once complete.

use indexmap::IndexMap;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: IndexMap<String, NodeId>,
}

/// Append-only named tree. Duplicate child names under one parent are
/// rejected: the first insertion wins and later ones return the existing node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTree {
    nodes: Vec<Node>,
}

impl SymbolTree {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node {
                name: root.into(),
                parent: None,
                children: IndexMap::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id].name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id].children.values().copied()
    }

    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[parent].children.get(name).copied()
    }

    /// Insert `name` under `parent`, returning the existing child when present.
    pub fn add_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        if let Some(existing) = self.child(parent, name) {
            return existing;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            parent: Some(parent),
            children: IndexMap::new(),
        });
        self.nodes[parent].children.insert(name.to_string(), id);
        id
    }

    /// Insert a chain of names below `parent` and return the deepest node.
    pub fn add_path(&mut self, parent: NodeId, names: &[&str]) -> NodeId {
        names
            .iter()
            .fold(parent, |node, name| self.add_child(node, name))
    }

    /// Merge `fragment` under `parent`; returns the node for the fragment's root.
    pub fn graft(&mut self, parent: NodeId, fragment: &Fragment) -> NodeId {
        let id = self.add_child(parent, &fragment.name);
        for child in &fragment.children {
            self.graft(id, child);
        }
        id
    }

    /// Depth-first search for the first node called `name`.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            if self.nodes[id].name == name {
                return Some(id);
            }
            let children: Vec<NodeId> = self.children(id).collect();
            stack.extend(children.into_iter().rev());
        }
        None
    }

    /// Underscore-joined names from the root down to `id`.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            names.push(self.nodes[node].name.as_str());
            cursor = self.nodes[node].parent;
        }
        names.reverse();
        names.join("_")
    }

    pub fn path_to(&self, name: &str) -> Option<String> {
        self.find(name).map(|id| self.path_of(id))
    }

    /// Every root-to-leaf path, in insertion order.
    pub fn all_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            if self.nodes[id].children.is_empty() {
                out.push(self.path_of(id));
            }
            let children: Vec<NodeId> = self.children(id).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Materialise the subtree rooted at `id` as an owned fragment.
    pub fn subtree(&self, id: NodeId) -> Fragment {
        Fragment {
            name: self.nodes[id].name.clone(),
            children: self.children(id).map(|c| self.subtree(c)).collect(),
        }
    }
}

/// Owned symbol tree used while walking rule syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub children: Vec<Fragment>,
}

impl Fragment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Fragment> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Insert a child, keeping the first one when the name already exists.
    pub fn add_child(&mut self, name: &str) -> &mut Fragment {
        let index = match self.children.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.children.push(Fragment::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Build a linear chain `names[0] -> names[1] -> ...`.
    pub fn chain(names: &[&str]) -> Option<Fragment> {
        let (last, rest) = names.split_last()?;
        let mut node = Fragment::new(*last);
        for name in rest.iter().rev() {
            let mut parent = Fragment::new(*name);
            parent.children.push(node);
            node = parent;
        }
        Some(node)
    }

    /// Follow a chain of child names from this fragment.
    pub fn descend_mut(&mut self, names: &[&str]) -> Option<&mut Fragment> {
        let mut node = self;
        for name in names {
            let index = node.children.iter().position(|c| c.name == *name)?;
            node = &mut node.children[index];
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_child_is_first_write_wins() {
        let mut tree = SymbolTree::new("state");
        let a = tree.add_child(tree.root(), "operator");
        let b = tree.add_child(tree.root(), "operator");
        assert_eq!(a, b);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn paths_are_underscore_joined() {
        let mut tree = SymbolTree::new("state");
        let leaf = tree.add_path(tree.root(), &["io", "input-link", "altitude"]);
        assert_eq!(tree.path_of(leaf), "state_io_input-link_altitude");
        assert_eq!(
            tree.path_to("input-link").as_deref(),
            Some("state_io_input-link")
        );
        assert_eq!(tree.path_to("missing"), None);
    }

    #[test]
    fn all_paths_lists_leaves_in_order() {
        let mut tree = SymbolTree::new("state");
        let root = tree.root();
        tree.add_path(root, &["operator", "name", "move"]);
        tree.add_path(root, &["color"]);
        tree.add_path(root, &["operator", "done"]);
        assert_eq!(
            tree.all_paths(),
            vec![
                "state_operator_name_move".to_string(),
                "state_operator_done".to_string(),
                "state_color".to_string(),
            ]
        );
    }

    #[test]
    fn graft_merges_fragments() {
        let mut tree = SymbolTree::new("state");
        let root = tree.root();
        let first = Fragment::chain(&["operator", "name", "move"]).unwrap();
        let second = Fragment::chain(&["operator", "name", "jump"]).unwrap();
        tree.graft(root, &first);
        tree.graft(root, &second);
        let op = tree.child(root, "operator").unwrap();
        let name = tree.child(op, "name").unwrap();
        let values: Vec<&str> = tree.children(name).map(|c| tree.name(c)).collect();
        assert_eq!(values, vec!["move", "jump"]);
    }

    #[test]
    fn find_is_depth_first() {
        let mut tree = SymbolTree::new("state");
        let root = tree.root();
        tree.add_path(root, &["a", "target"]);
        tree.add_path(root, &["target"]);
        assert_eq!(tree.path_to("target").as_deref(), Some("state_a_target"));
    }

    #[test]
    fn subtree_round_trips_through_graft() {
        let mut tree = SymbolTree::new("state");
        let root = tree.root();
        tree.add_path(root, &["x", "y"]);
        let fragment = tree.subtree(root);
        let mut copy = SymbolTree::new("state");
        for child in &fragment.children {
            copy.graft(copy.root(), child);
        }
        assert_eq!(copy, tree);
    }

    #[test]
    fn fragment_add_child_dedups() {
        let mut fragment = Fragment::new("operator");
        fragment.add_child("name").add_child("move");
        fragment.add_child("name").add_child("move");
        assert_eq!(fragment.children.len(), 1);
        assert_eq!(fragment.children[0].children.len(), 1);
    }
}
