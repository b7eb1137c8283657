//! DOM Tree (arena-based allocation)
//!
//! Every node lives in one `Vec<Node>`; a `NodeId` is an index into it.
//! Link maintenance and read-only traversal live here, the validated
//! mutation algorithms live in [`crate::mutation`].

use std::cmp::Ordering;

use crate::node::{Node, NodeData};
use crate::NodeId;

/// Arena-based DOM tree
#[derive(Debug, Default)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a new empty DOM tree
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Borrow a node that is known to exist.
    ///
    /// # Panics
    /// If `id` was not produced by this arena.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Number of nodes in the arena, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    // --- Traversal ---

    /// Iterate over the children of a node
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).and_then(|n| n.first_child),
        }
    }

    pub fn children_vec(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).collect()
    }

    /// Inclusive descendants of `root` in tree order (shadow trees excluded)
    pub fn tree_iter(&self, root: NodeId) -> TreeIter<'_> {
        TreeIter {
            tree: self,
            root,
            next: self.contains_id(root).then_some(root),
        }
    }

    /// Exclusive descendants of `root` in tree order
    pub fn descendants(&self, root: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.tree_iter(root).skip(1)
    }

    /// Parent chain, nearest first, excluding `id`
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get(id).and_then(|n| n.parent),
        }
    }

    pub fn inclusive_ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(id).chain(self.ancestors(id))
    }

    /// Position among siblings
    pub fn index(&self, id: NodeId) -> usize {
        let mut index = 0;
        let mut cur = self.node(id).prev_sibling;
        while let Some(prev) = cur {
            index += 1;
            cur = self.node(prev).prev_sibling;
        }
        index
    }

    /// Child at position `index`
    pub fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).nth(index)
    }

    /// Root of the node's tree (does not cross shadow boundaries)
    pub fn root(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().unwrap_or(id)
    }

    /// Root reached by hopping from shadow roots to their hosts
    pub fn shadow_including_root(&self, id: NodeId) -> NodeId {
        let mut root = self.root(id);
        while let Some(host) = self.node(root).shadow_host() {
            root = self.root(host);
        }
        root
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inclusive_ancestors(node).any(|id| id == ancestor)
    }

    /// Like [`is_inclusive_ancestor`](Self::is_inclusive_ancestor) but a
    /// fragment root with a host continues at the host.
    pub fn is_host_including_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            let n = self.node(id);
            cur = n.parent.or_else(|| n.shadow_host());
        }
        false
    }

    /// Like [`is_inclusive_ancestor`](Self::is_inclusive_ancestor) but crossing
    /// from shadow roots to hosts.
    pub fn is_shadow_including_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.is_host_including_inclusive_ancestor(ancestor, node)
    }

    /// Inclusive descendants, entering shadow roots before light children
    pub fn shadow_including_inclusive_descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let node = self.node(id);
            let children: Vec<NodeId> = self.children(id).collect();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
            if let Some(shadow) = node.as_element().and_then(|e| e.shadow_root) {
                stack.push(shadow);
            }
        }
        out
    }

    /// Tree order between two nodes of the same tree. Nodes in different
    /// trees compare by root id so the order is at least stable.
    pub fn tree_order(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let mut path_a: Vec<NodeId> = self.inclusive_ancestors(a).collect();
        let mut path_b: Vec<NodeId> = self.inclusive_ancestors(b).collect();
        path_a.reverse();
        path_b.reverse();
        if path_a[0] != path_b[0] {
            return path_a[0].cmp(&path_b[0]);
        }
        let common = path_a
            .iter()
            .zip(path_b.iter())
            .take_while(|(x, y)| x == y)
            .count();
        match (path_a.get(common), path_b.get(common)) {
            // a is an ancestor of b
            (None, _) => Ordering::Less,
            (_, None) => Ordering::Greater,
            (Some(&ca), Some(&cb)) => self.index(ca).cmp(&self.index(cb)),
        }
    }

    /// Value of the null-namespace attribute `local_name` on an element
    pub fn attribute_value(&self, element: NodeId, local_name: &str) -> Option<&str> {
        let data = self.get(element)?.as_element()?;
        data.attributes.iter().find_map(|attr| {
            self.node(attr)
                .as_attribute()
                .filter(|a| a.namespace.is_none() && a.local_name == local_name)
                .map(|a| a.value.as_str())
        })
    }

    pub fn text_content(&self, id: NodeId) -> Option<String> {
        let node = self.node(id);
        match &node.data {
            NodeData::Document | NodeData::DocumentType(_) => None,
            NodeData::Attribute(attr) => Some(attr.value.clone()),
            NodeData::Text(data) | NodeData::Comment(data) => Some(data.clone()),
            NodeData::Element(_) | NodeData::DocumentFragment(_) => {
                let mut text = String::new();
                for desc in self.descendants(id) {
                    if let NodeData::Text(data) = &self.node(desc).data {
                        text.push_str(data);
                    }
                }
                Some(text)
            }
        }
    }

    // --- Link primitives (no validation, no side effects) ---

    /// Link `child` under `parent` before `before`, or last when `None`
    pub(crate) fn link(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        let prev = match before {
            Some(reference) => self.node(reference).prev_sibling,
            None => self.node(parent).last_child,
        };
        {
            let c = self.node_mut(child);
            c.parent = Some(parent);
            c.prev_sibling = prev;
            c.next_sibling = before;
        }
        match prev {
            Some(p) => self.node_mut(p).next_sibling = Some(child),
            None => self.node_mut(parent).first_child = Some(child),
        }
        match before {
            Some(reference) => self.node_mut(reference).prev_sibling = Some(child),
            None => self.node_mut(parent).last_child = Some(child),
        }
        self.node_mut(parent).child_count += 1;
    }

    /// Detach `child` from its parent's child list
    pub(crate) fn unlink(&mut self, child: NodeId) {
        let (parent, prev, next) = {
            let c = self.node(child);
            (c.parent, c.prev_sibling, c.next_sibling)
        };
        let Some(parent) = parent else {
            return;
        };
        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }
        let p = self.node_mut(parent);
        p.child_count = p.child_count.saturating_sub(1);
        let c = self.node_mut(child);
        c.parent = None;
        c.prev_sibling = None;
        c.next_sibling = None;
    }

    /// Bump the version of `id` and every ancestor
    pub(crate) fn bump_version(&mut self, id: NodeId) {
        let chain: Vec<NodeId> = self.inclusive_ancestors(id).collect();
        for node in chain {
            let n = self.node_mut(node);
            n.version = n.version.next();
        }
    }
}

/// Iterator over a node's children
pub struct Children<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node's ancestors
pub struct Ancestors<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).parent;
        Some(current)
    }
}

/// Pre-order iterator bounded by a root
pub struct TreeIter<'a> {
    tree: &'a DomTree,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for TreeIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        let node = self.tree.node(current);
        self.next = if let Some(child) = node.first_child {
            Some(child)
        } else {
            let mut cur = current;
            loop {
                if cur == self.root {
                    break None;
                }
                let n = self.tree.node(cur);
                if let Some(sibling) = n.next_sibling {
                    break Some(sibling);
                }
                match n.parent {
                    Some(parent) => cur = parent,
                    None => break None,
                }
            }
        };
        Some(current)
    }
}
