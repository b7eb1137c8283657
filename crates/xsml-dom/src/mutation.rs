//! Tree mutation algorithms
//!
//! `pre_insert`, `remove`, `replace` and `replace_all` are the only paths
//! that change tree shape. Each validates first and touches nothing on
//! failure; the side effects (ranges, slots, records, reactions, the
//! connected flag) run in the order the DOM standard lays out.

use crate::NodeId;
use crate::custom_elements::{CustomElementState, LifecycleCallback};
use crate::document::{Document, ensure_exists};
use crate::error::{DomError, DomResult};
use crate::node::{NodeData, NodeType};

/// Argument of the ChildNode/ParentNode convenience operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOrText {
    Node(NodeId),
    Text(String),
}

impl From<NodeId> for NodeOrText {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<&str> for NodeOrText {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for NodeOrText {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// What a validated insertion adds under the parent
#[derive(Clone, Copy)]
enum Insertion<'a> {
    /// One node; a fragment contributes its children
    Node(NodeId),
    /// Argument list that will be wrapped into a fresh fragment
    Nodes(&'a [NodeId]),
}

struct InsertionCheck<'a> {
    parent: NodeId,
    insertion: Insertion<'a>,
    child: Option<NodeId>,
    /// `child` is the node being replaced
    replacing: bool,
    /// Current children that will have left the parent before the insertion runs
    ignore: &'a [NodeId],
}

impl Document {
    // --- Validation ---

    fn check_insertion(&self, check: InsertionCheck<'_>) -> DomResult<()> {
        let tree = &self.tree;
        let parent_type = tree.node(check.parent).node_type();
        if !matches!(
            parent_type,
            NodeType::Document | NodeType::DocumentFragment | NodeType::Element
        ) {
            return Err(DomError::hierarchy(format!("{:?} cannot have children", parent_type)));
        }

        let sources: &[NodeId] = match &check.insertion {
            Insertion::Node(node) => std::slice::from_ref(node),
            Insertion::Nodes(nodes) => nodes,
        };
        for &node in sources {
            if tree.is_host_including_inclusive_ancestor(node, check.parent) {
                return Err(DomError::hierarchy("the new child is an ancestor of the parent"));
            }
        }

        if let Some(child) = check.child
            && tree.node(child).parent != Some(check.parent)
        {
            return Err(DomError::not_found("the reference child is not a child of the parent"));
        }

        let wrapped = matches!(check.insertion, Insertion::Nodes(_));
        for &node in sources {
            let node_type = tree.node(node).node_type();
            match node_type {
                NodeType::DocumentFragment | NodeType::Element | NodeType::Text | NodeType::Comment => {}
                NodeType::DocumentType if parent_type == NodeType::Document && !wrapped => {}
                _ => {
                    return Err(DomError::hierarchy(format!(
                        "{:?} cannot be inserted here",
                        node_type
                    )));
                }
            }
            if node_type == NodeType::Text && parent_type == NodeType::Document {
                return Err(DomError::hierarchy("Text cannot be a child of the document"));
            }
        }

        if parent_type != NodeType::Document {
            return Ok(());
        }

        let replaced = check.child.filter(|_| check.replacing);
        let siblings: Vec<NodeId> = tree
            .children(check.parent)
            .filter(|id| !check.ignore.contains(id) && Some(*id) != replaced)
            .collect();
        let kind_of = |id: NodeId| tree.node(id).node_type();
        let has_element = siblings.iter().any(|&id| kind_of(id) == NodeType::Element);
        let has_doctype = siblings.iter().any(|&id| kind_of(id) == NodeType::DocumentType);
        let (doctype_following, element_preceding) = match check.child {
            Some(child) => {
                let position = siblings.iter().position(|&id| id == child);
                let (before, after) = match position {
                    Some(pos) => (&siblings[..pos], &siblings[pos + 1..]),
                    // The replaced child was filtered out; split on its neighbours
                    None => {
                        let index = tree
                            .children(check.parent)
                            .take_while(|&id| id != child)
                            .filter(|id| siblings.contains(id))
                            .count();
                        (&siblings[..index], &siblings[index..])
                    }
                };
                (
                    after.iter().any(|&id| kind_of(id) == NodeType::DocumentType),
                    before.iter().any(|&id| kind_of(id) == NodeType::Element),
                )
            }
            None => (false, false),
        };
        let child_is_doctype =
            !check.replacing && check.child.is_some_and(|c| kind_of(c) == NodeType::DocumentType);

        let source_type = match check.insertion {
            Insertion::Node(node) => kind_of(node),
            Insertion::Nodes(_) => NodeType::DocumentFragment,
        };
        match source_type {
            NodeType::DocumentFragment => {
                let mut added = Vec::new();
                for &node in sources {
                    if kind_of(node) == NodeType::DocumentFragment {
                        added.extend(tree.children(node).map(kind_of));
                    } else {
                        added.push(kind_of(node));
                    }
                }
                let elements = added.iter().filter(|&&t| t == NodeType::Element).count();
                if elements > 1 || added.contains(&NodeType::Text) {
                    return Err(DomError::hierarchy(
                        "a document can hold one element and no text",
                    ));
                }
                if elements == 1 && (has_element || child_is_doctype || doctype_following) {
                    return Err(DomError::hierarchy("the document already has an element"));
                }
            }
            NodeType::Element => {
                if has_element || child_is_doctype || doctype_following {
                    return Err(DomError::hierarchy("the document already has an element"));
                }
            }
            NodeType::DocumentType => {
                if has_doctype || element_preceding || (check.child.is_none() && has_element) {
                    return Err(DomError::hierarchy("doctype must be unique and precede the element"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    // --- Core algorithms ---

    /// Validated insertion of `node` into `parent` before `child`
    pub fn pre_insert(&mut self, node: NodeId, parent: NodeId, child: Option<NodeId>) -> DomResult<NodeId> {
        ensure_exists(self, node)?;
        ensure_exists(self, parent)?;
        if let Some(child) = child {
            ensure_exists(self, child)?;
        }
        self.check_insertion(InsertionCheck {
            parent,
            insertion: Insertion::Node(node),
            child,
            replacing: false,
            ignore: &[],
        })?;

        let mut reference = child;
        if reference == Some(node) {
            reference = self.tree.node(node).next_sibling;
        }
        self.adopt(node);
        self.insert(node, parent, reference, false);
        self.flush_scene_changes();
        Ok(node)
    }

    /// Detach `node` from any previous parent
    fn adopt(&mut self, node: NodeId) {
        if self.tree.node(node).parent.is_some() {
            self.remove_node(node, false);
        }
    }

    /// Unchecked insertion; callers validate first
    pub(crate) fn insert(&mut self, node: NodeId, parent: NodeId, child: Option<NodeId>, suppress_observers: bool) {
        let is_fragment = matches!(self.tree.node(node).data, NodeData::DocumentFragment(_));
        let nodes = if is_fragment {
            self.tree.children_vec(node)
        } else {
            vec![node]
        };
        let count = nodes.len();
        if count == 0 {
            return;
        }

        if is_fragment {
            for &n in &nodes {
                self.remove_node(n, true);
            }
            self.queue_tree_mutation_record(node, Vec::new(), nodes.clone(), None, None);
        }

        if let Some(child) = child {
            let index = self.tree.index(child);
            self.ranges.shift_for_insert(parent, index, count);
        }

        let previous_sibling = match child {
            Some(child) => self.tree.node(child).prev_sibling,
            None => self.tree.node(parent).last_child,
        };
        let parent_is_host = self
            .tree
            .node(parent)
            .as_element()
            .is_some_and(|e| e.shadow_root.is_some());
        let parent_connected = self.tree.node(parent).connected;

        for &n in &nodes {
            self.tree.link(parent, n, child);
            self.tree.bump_version(parent);

            if parent_is_host && self.tree.node(n).is_slotable() {
                self.assign_slot(n);
            }
            if self.is_slot_in_shadow_tree(parent) && self.assigned_nodes(parent).is_empty() {
                self.signal_slot_change(parent);
            }
            let root = self.tree.root(n);
            if self.tree.node(root).is_shadow_root() {
                self.assign_slotables_for_tree(root);
            }

            if parent_connected {
                self.attach_subtree(n);
                for descendant in self.tree.shadow_including_inclusive_descendants(n) {
                    let Some(element) = self.tree.node(descendant).as_element() else {
                        continue;
                    };
                    if element.custom.state == CustomElementState::Custom {
                        self.enqueue_callback_reaction(descendant, LifecycleCallback::Connected);
                    } else {
                        self.try_upgrade(descendant);
                    }
                }
            }
        }

        tracing::trace!("Inserted {} node(s) under {:?}", count, parent);
        if !suppress_observers {
            self.queue_tree_mutation_record(parent, nodes, Vec::new(), previous_sibling, child);
        }
    }

    /// Remove `node` from its parent; a parentless node is left alone
    pub fn remove(&mut self, node: NodeId, suppress_observers: bool) {
        self.remove_node(node, suppress_observers);
        self.flush_scene_changes();
    }

    pub(crate) fn remove_node(&mut self, node: NodeId, suppress_observers: bool) {
        if !self.tree.contains_id(node) {
            return;
        }
        let Some(parent) = self.tree.node(node).parent else {
            return;
        };
        let index = self.tree.index(node);
        self.ranges.adjust_for_remove(&self.tree, parent, node, index);

        let old_previous = self.tree.node(node).prev_sibling;
        let old_next = self.tree.node(node).next_sibling;
        let was_connected = self.tree.node(parent).connected;

        self.tree.unlink(node);

        if let Some(slot) = self.tree.node(node).assigned_slot {
            self.assign_slotables(slot);
        }
        if self.is_slot_in_shadow_tree(parent) && self.assigned_nodes(parent).is_empty() {
            self.signal_slot_change(parent);
        }
        let has_slot_descendant = self
            .tree
            .tree_iter(node)
            .any(|id| self.tree.node(id).as_element().is_some_and(|e| e.is_slot()));
        if has_slot_descendant {
            let parent_root = self.tree.root(parent);
            self.assign_slotables_for_tree(parent_root);
            self.assign_slotables_for_tree(node);
        }

        self.tree.bump_version(parent);
        self.add_transient_observers(node, parent);

        if was_connected {
            let custom: Vec<NodeId> = self
                .tree
                .shadow_including_inclusive_descendants(node)
                .into_iter()
                .filter(|&id| {
                    self.tree
                        .node(id)
                        .as_element()
                        .is_some_and(|e| e.custom.state == CustomElementState::Custom)
                })
                .collect();
            self.detach_subtree(node);
            for element in custom {
                self.enqueue_callback_reaction(element, LifecycleCallback::Disconnected);
            }
        }

        tracing::trace!("Removed {:?} from {:?}", node, parent);
        if !suppress_observers {
            self.queue_tree_mutation_record(parent, Vec::new(), vec![node], old_previous, old_next);
        }
    }

    /// Replace `child` of `parent` with `node`, returning `child`
    ///
    /// Validation runs before the implicit removal of `child`, against the
    /// current siblings with `child` left out.
    pub fn replace(&mut self, node: NodeId, child: NodeId, parent: NodeId) -> DomResult<NodeId> {
        ensure_exists(self, node)?;
        ensure_exists(self, child)?;
        ensure_exists(self, parent)?;
        self.check_insertion(InsertionCheck {
            parent,
            insertion: Insertion::Node(node),
            child: Some(child),
            replacing: true,
            ignore: &[],
        })?;

        let mut reference = self.tree.node(child).next_sibling;
        if reference == Some(node) {
            reference = self.tree.node(node).next_sibling;
        }
        let mut previous_sibling = self.tree.node(child).prev_sibling;
        if previous_sibling == Some(node) {
            previous_sibling = self.tree.node(node).prev_sibling;
        }

        self.adopt(node);

        let mut removed = Vec::new();
        if self.tree.node(child).parent.is_some() {
            removed.push(child);
            self.remove_node(child, true);
        }

        let added = if matches!(self.tree.node(node).data, NodeData::DocumentFragment(_)) {
            self.tree.children_vec(node)
        } else {
            vec![node]
        };
        self.insert(node, parent, reference, true);
        self.queue_tree_mutation_record(parent, added, removed, previous_sibling, reference);
        self.flush_scene_changes();
        Ok(child)
    }

    /// Replace every child of `parent` with `node` (or nothing)
    ///
    /// `node` is validated against the children `parent` has now, before
    /// any of them is removed.
    pub fn replace_all(&mut self, node: Option<NodeId>, parent: NodeId) -> DomResult<()> {
        ensure_exists(self, parent)?;
        if let Some(node) = node {
            ensure_exists(self, node)?;
            self.check_insertion(InsertionCheck {
                parent,
                insertion: Insertion::Node(node),
                child: None,
                replacing: false,
                ignore: &[],
            })?;
        }
        self.replace_all_unchecked(node, parent);
        Ok(())
    }

    pub(crate) fn replace_all_unchecked(&mut self, node: Option<NodeId>, parent: NodeId) {
        if let Some(node) = node {
            self.adopt(node);
        }
        let removed = self.tree.children_vec(parent);
        let added = match node {
            None => Vec::new(),
            Some(node) if matches!(self.tree.node(node).data, NodeData::DocumentFragment(_)) => {
                self.tree.children_vec(node)
            }
            Some(node) => vec![node],
        };
        for &child in &removed {
            self.remove_node(child, true);
        }
        if let Some(node) = node {
            self.insert(node, parent, None, true);
        }
        if !added.is_empty() || !removed.is_empty() {
            self.queue_tree_mutation_record(parent, added, removed, None, None);
        }
        self.flush_scene_changes();
    }

    // --- Node-level wrappers ---

    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> DomResult<NodeId> {
        self.pre_insert(node, parent, None)
    }

    pub fn insert_before(&mut self, parent: NodeId, node: NodeId, child: Option<NodeId>) -> DomResult<NodeId> {
        self.pre_insert(node, parent, child)
    }

    /// Remove `child` from `parent`; NotFound if it is not a child
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        ensure_exists(self, parent)?;
        ensure_exists(self, child)?;
        if self.tree.node(child).parent != Some(parent) {
            return Err(DomError::not_found("the node is not a child of the parent"));
        }
        self.remove(child, false);
        Ok(child)
    }

    pub fn replace_child(&mut self, parent: NodeId, node: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.replace(node, child, parent)
    }

    // --- ChildNode / ParentNode ---

    fn materialize(&mut self, items: Vec<NodeOrText>) -> DomResult<Vec<NodeId>> {
        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            match item {
                NodeOrText::Node(id) => {
                    ensure_exists(self, id)?;
                    nodes.push(id);
                }
                NodeOrText::Text(text) => nodes.push(self.create_text_node(&text)),
            }
        }
        Ok(nodes)
    }

    /// One node stays as-is, several are moved into a new fragment
    fn convert_nodes_into_node(&mut self, nodes: Vec<NodeId>) -> NodeId {
        if let [single] = nodes[..] {
            return single;
        }
        let fragment = self.create_document_fragment();
        for node in nodes {
            self.adopt(node);
            self.insert(node, fragment, None, false);
        }
        fragment
    }

    /// First node from `start` onward (following siblings) not in `excluded`
    fn first_sibling_excluding(&self, start: Option<NodeId>, excluded: &[NodeId]) -> Option<NodeId> {
        let mut cur = start;
        while let Some(id) = cur {
            if !excluded.contains(&id) {
                return Some(id);
            }
            cur = self.tree.node(id).next_sibling;
        }
        None
    }

    fn check_wrapped(
        &self,
        parent: NodeId,
        nodes: &[NodeId],
        child: Option<NodeId>,
        replacing: bool,
        ignore: &[NodeId],
    ) -> DomResult<()> {
        if nodes.len() == 1 {
            // Inserted directly; pre_insert/replace validate it
            return Ok(());
        }
        self.check_insertion(InsertionCheck {
            parent,
            insertion: Insertion::Nodes(nodes),
            child,
            replacing,
            ignore,
        })
    }

    /// Insert `items` before `node`
    pub fn before(&mut self, node: NodeId, items: Vec<NodeOrText>) -> DomResult<()> {
        ensure_exists(self, node)?;
        let Some(parent) = self.tree.node(node).parent else {
            return Ok(());
        };
        let nodes = self.materialize(items)?;

        let mut viable_previous = self.tree.node(node).prev_sibling;
        while let Some(prev) = viable_previous {
            if !nodes.contains(&prev) {
                break;
            }
            viable_previous = self.tree.node(prev).prev_sibling;
        }
        let after_viable = |doc: &Self| match viable_previous {
            Some(prev) => doc.tree.node(prev).next_sibling,
            None => doc.tree.node(parent).first_child,
        };

        let reference = self.first_sibling_excluding(after_viable(self), &nodes);
        self.check_wrapped(parent, &nodes, reference, false, &nodes)?;
        let insertion = self.convert_nodes_into_node(nodes);
        let reference = after_viable(self);
        self.pre_insert(insertion, parent, reference)?;
        Ok(())
    }

    /// Insert `items` after `node`
    pub fn after(&mut self, node: NodeId, items: Vec<NodeOrText>) -> DomResult<()> {
        ensure_exists(self, node)?;
        let Some(parent) = self.tree.node(node).parent else {
            return Ok(());
        };
        let nodes = self.materialize(items)?;
        let viable_next = self.first_sibling_excluding(self.tree.node(node).next_sibling, &nodes);

        self.check_wrapped(parent, &nodes, viable_next, false, &nodes)?;
        let insertion = self.convert_nodes_into_node(nodes);
        self.pre_insert(insertion, parent, viable_next)?;
        Ok(())
    }

    /// Replace `node` with `items`
    pub fn replace_with(&mut self, node: NodeId, items: Vec<NodeOrText>) -> DomResult<()> {
        ensure_exists(self, node)?;
        let Some(parent) = self.tree.node(node).parent else {
            return Ok(());
        };
        let nodes = self.materialize(items)?;
        let viable_next = self.first_sibling_excluding(self.tree.node(node).next_sibling, &nodes);

        if nodes.contains(&node) {
            self.check_wrapped(parent, &nodes, viable_next, false, &nodes)?;
        } else {
            self.check_wrapped(parent, &nodes, Some(node), true, &nodes)?;
        }
        let insertion = self.convert_nodes_into_node(nodes);
        if self.tree.node(node).parent == Some(parent) {
            self.replace(insertion, node, parent)?;
        } else {
            self.pre_insert(insertion, parent, viable_next)?;
        }
        Ok(())
    }

    /// Remove `node` from its parent, if any
    pub fn remove_self(&mut self, node: NodeId) {
        self.remove(node, false);
    }

    /// Append `items` to `parent`
    pub fn append(&mut self, parent: NodeId, items: Vec<NodeOrText>) -> DomResult<()> {
        ensure_exists(self, parent)?;
        let nodes = self.materialize(items)?;
        self.check_wrapped(parent, &nodes, None, false, &nodes)?;
        let insertion = self.convert_nodes_into_node(nodes);
        self.pre_insert(insertion, parent, None)?;
        Ok(())
    }

    /// Insert `items` before the first child of `parent`
    pub fn prepend(&mut self, parent: NodeId, items: Vec<NodeOrText>) -> DomResult<()> {
        ensure_exists(self, parent)?;
        let nodes = self.materialize(items)?;
        let reference = self.first_sibling_excluding(self.tree.node(parent).first_child, &nodes);
        self.check_wrapped(parent, &nodes, reference, false, &nodes)?;
        let insertion = self.convert_nodes_into_node(nodes);
        let first = self.tree.node(parent).first_child;
        self.pre_insert(insertion, parent, first)?;
        Ok(())
    }

    /// Replace all children of `parent` with `items`
    pub fn replace_children(&mut self, parent: NodeId, items: Vec<NodeOrText>) -> DomResult<()> {
        ensure_exists(self, parent)?;
        let nodes = self.materialize(items)?;
        self.check_wrapped(parent, &nodes, None, false, &nodes)?;
        let insertion = self.convert_nodes_into_node(nodes);
        self.replace_all(Some(insertion), parent)
    }

    // --- Content and cloning ---

    pub fn text_content(&self, node: NodeId) -> Option<String> {
        self.tree.get(node)?;
        self.tree.text_content(node)
    }

    /// Replace the content of `node` with a single Text node (or nothing)
    pub fn set_text_content(&mut self, node: NodeId, value: Option<&str>) -> DomResult<()> {
        ensure_exists(self, node)?;
        let value = value.unwrap_or("");
        match self.tree.node(node).node_type() {
            NodeType::Element | NodeType::DocumentFragment => {
                let text = (!value.is_empty()).then(|| self.create_text_node(value));
                self.replace_all_unchecked(text, node);
            }
            NodeType::Attribute => self.set_attribute_value(node, value)?,
            NodeType::Text | NodeType::Comment => {
                let length = self.tree.node(node).length();
                self.replace_data(node, 0, length, value)?;
            }
            NodeType::Document | NodeType::DocumentType => {}
        }
        Ok(())
    }

    /// Copy `node`, with its descendants when `deep`
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> DomResult<NodeId> {
        ensure_exists(self, node)?;
        let copy = match &self.tree.node(node).data {
            NodeData::Document => {
                return Err(DomError::NotSupported("cannot clone the document".to_string()));
            }
            NodeData::DocumentFragment(frag) if frag.shadow.is_some() => {
                return Err(DomError::InvalidState("cannot clone a shadow root".to_string()));
            }
            NodeData::DocumentFragment(_) => self.create_document_fragment(),
            NodeData::DocumentType(doctype) => {
                let doctype = doctype.clone();
                self.tree
                    .push(crate::node::Node::new(NodeData::DocumentType(doctype)))
            }
            NodeData::Text(data) => {
                let data = data.clone();
                self.create_text_node(&data)
            }
            NodeData::Comment(data) => {
                let data = data.clone();
                self.create_comment(&data)
            }
            NodeData::Attribute(attr) => {
                let attr = attr.clone();
                self.new_attribute(attr.namespace, attr.prefix, attr.local_name, attr.value)
            }
            NodeData::Element(element) => {
                let namespace = element.namespace.clone();
                let prefix = element.prefix.clone();
                let local_name = element.local_name.clone();
                let is_value = element.is_value.clone();
                let attrs: Vec<NodeId> = element.attributes.iter().collect();
                let copy = self.create_element_internal(namespace, prefix, local_name, is_value);
                for attr in attrs {
                    let data = self.tree.node(attr).as_attribute().cloned();
                    if let Some(data) = data {
                        let attr_copy =
                            self.new_attribute(data.namespace, data.prefix, data.local_name, data.value);
                        self.append_attribute(copy, attr_copy);
                    }
                }
                copy
            }
        };

        if deep {
            for child in self.tree.children_vec(node) {
                let child_copy = self.clone_node(child, true)?;
                self.insert(child_copy, copy, None, false);
            }
        }
        Ok(copy)
    }

    // --- Read-only helpers ---

    /// Root of `node`'s tree, crossing shadow boundaries when `composed`
    pub fn get_root_node(&self, node: NodeId, composed: bool) -> NodeId {
        if composed {
            self.tree.shadow_including_root(node)
        } else {
            self.tree.root(node)
        }
    }

    pub fn contains(&self, node: NodeId, other: NodeId) -> bool {
        self.tree.contains_id(node)
            && self.tree.contains_id(other)
            && self.tree.is_inclusive_ancestor(node, other)
    }

    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.tree.get(node)?.parent?;
        self.tree.node(parent).is_element().then_some(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Document, NodeId) {
        let doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        (doc, body)
    }

    #[test]
    fn test_append_and_remove() {
        let (mut doc, body) = setup();
        let div = doc.create_element("div").unwrap();
        doc.append_child(body, div).unwrap();
        assert_eq!(doc.node(div).parent(), Some(body));
        assert!(doc.node(div).is_connected());

        doc.remove_child(body, div).unwrap();
        assert_eq!(doc.node(div).parent(), None);
        assert!(!doc.node(div).is_connected());
        assert!(matches!(doc.remove_child(body, div), Err(DomError::NotFound(_))));
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut doc, body) = setup();
        let outer = doc.create_element("div").unwrap();
        let inner = doc.create_element("div").unwrap();
        doc.append_child(body, outer).unwrap();
        doc.append_child(outer, inner).unwrap();
        let result = doc.append_child(inner, outer);
        assert!(matches!(result, Err(DomError::HierarchyRequest(_))));
        assert_eq!(doc.node(outer).parent(), Some(body));
    }

    #[test]
    fn test_fragment_flattening() {
        let (mut doc, body) = setup();
        let frag = doc.create_document_fragment();
        let a = doc.create_element("a").unwrap();
        let b = doc.create_text_node("b");
        doc.append_child(frag, a).unwrap();
        doc.append_child(frag, b).unwrap();

        doc.append_child(body, frag).unwrap();
        assert_eq!(doc.tree().children_vec(body), vec![a, b]);
        assert_eq!(doc.node(frag).child_count(), 0);
    }

    #[test]
    fn test_document_rules() {
        let mut doc = Document::empty("about:blank");
        let root = doc.root();
        let html = doc.create_element("html").unwrap();
        let other = doc.create_element("html").unwrap();
        let text = doc.create_text_node("x");
        let doctype = doc.create_document_type("html", "", "").unwrap();

        doc.append_child(root, html).unwrap();
        assert!(doc.append_child(root, other).is_err());
        assert!(doc.append_child(root, text).is_err());
        // doctype may not follow the element
        assert!(doc.append_child(root, doctype).is_err());
        doc.insert_before(root, doctype, Some(html)).unwrap();
        assert_eq!(doc.tree().children_vec(root), vec![doctype, html]);
    }

    #[test]
    fn test_replace_child() {
        let (mut doc, body) = setup();
        let a = doc.create_element("a").unwrap();
        let b = doc.create_element("b").unwrap();
        doc.append_child(body, a).unwrap();
        assert_eq!(doc.replace_child(body, b, a).unwrap(), a);
        assert_eq!(doc.tree().children_vec(body), vec![b]);
        assert_eq!(doc.node(a).parent(), None);
    }

    #[test]
    fn test_replace_document_element() {
        let mut doc = Document::empty("about:blank");
        let root = doc.root();
        let doctype = doc.create_document_type("html", "", "").unwrap();
        let html = doc.create_element("html").unwrap();
        let other = doc.create_element("html").unwrap();
        doc.append_child(root, doctype).unwrap();
        doc.append_child(root, html).unwrap();

        doc.replace_child(root, other, html).unwrap();
        assert_eq!(doc.document_element(), Some(other));
        // an element cannot take the doctype's place while one exists
        let third = doc.create_element("html").unwrap();
        assert!(doc.replace_child(root, third, doctype).is_err());
    }

    #[test]
    fn test_before_after_self_reference() {
        let (mut doc, body) = setup();
        let a = doc.create_element("a").unwrap();
        let b = doc.create_element("b").unwrap();
        let c = doc.create_element("c").unwrap();
        doc.append(body, vec![a.into(), b.into(), c.into()]).unwrap();

        doc.before(b, vec![b.into(), "t".into()]).unwrap();
        let children = doc.tree().children_vec(body);
        assert_eq!(children.len(), 4);
        assert_eq!(children[0], a);
        assert_eq!(children[1], b);
        assert!(doc.node(children[2]).is_text());
        assert_eq!(children[3], c);

        doc.after(a, vec![c.into()]).unwrap();
        assert_eq!(doc.tree().children_vec(body)[1], c);
    }

    #[test]
    fn test_replace_with_and_remove_self() {
        let (mut doc, body) = setup();
        let a = doc.create_element("a").unwrap();
        doc.append_child(body, a).unwrap();
        doc.replace_with(a, vec!["x".into(), "y".into()]).unwrap();
        assert_eq!(doc.text_content(body).as_deref(), Some("xy"));
        assert_eq!(doc.node(a).parent(), None);

        let first = doc.node(body).first_child().unwrap();
        doc.remove_self(first);
        assert_eq!(doc.text_content(body).as_deref(), Some("y"));
    }

    #[test]
    fn test_multi_argument_validation_is_atomic() {
        let mut doc = Document::empty("about:blank");
        let root = doc.root();
        let html = doc.create_element("html").unwrap();
        doc.append_child(root, html).unwrap();
        let loose = doc.create_element("div").unwrap();
        let holder = doc.create_element("span").unwrap();
        doc.append_child(holder, loose).unwrap();

        let result = doc.append(root, vec![loose.into(), "text".into()]);
        assert!(result.is_err());
        assert_eq!(doc.node(loose).parent(), Some(holder));
    }

    #[test]
    fn test_set_text_content() {
        let (mut doc, body) = setup();
        doc.append(body, vec!["a".into(), "b".into()]).unwrap();
        doc.set_text_content(body, Some("hello")).unwrap();
        assert_eq!(doc.node(body).child_count(), 1);
        assert_eq!(doc.text_content(body).as_deref(), Some("hello"));
        doc.set_text_content(body, None).unwrap();
        assert_eq!(doc.node(body).child_count(), 0);
    }

    #[test]
    fn test_clone_node() {
        let (mut doc, body) = setup();
        let div = doc.create_element("div").unwrap();
        doc.set_attribute(div, "class", "box").unwrap();
        doc.append(div, vec!["text".into()]).unwrap();
        doc.append_child(body, div).unwrap();

        let shallow = doc.clone_node(div, false).unwrap();
        assert_eq!(doc.get_attribute(shallow, "class").as_deref(), Some("box"));
        assert_eq!(doc.node(shallow).child_count(), 0);

        let deep = doc.clone_node(div, true).unwrap();
        assert_eq!(doc.text_content(deep).as_deref(), Some("text"));
        assert!(!doc.node(deep).is_connected());

        let root = doc.root();
        assert!(matches!(doc.clone_node(root, false), Err(DomError::NotSupported(_))));
    }
}
