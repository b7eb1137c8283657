//! Shadow DOM
//!
//! Shadow roots and slot assignment. Assigned nodes and assigned slots are
//! caches derived from the host's children and the slots in its shadow
//! tree; every structural or `slot`/`name` attribute change recomputes them.

use crate::NodeId;
use crate::custom_elements::is_valid_custom_element_name;
use crate::document::{Document, ensure_exists};
use crate::error::{DomError, DomResult};
use crate::node::{FragmentData, Node, NodeData};

/// Shadow root mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowRootMode {
    #[default]
    Open,
    Closed,
}

/// Slot assignment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotAssignmentMode {
    #[default]
    Named,
    Manual,
}

/// Shadow root initialization options
#[derive(Debug, Clone, Default)]
pub struct ShadowRootInit {
    pub mode: ShadowRootMode,
    pub delegates_focus: bool,
    pub slot_assignment: SlotAssignmentMode,
}

/// Shadow root payload of a DocumentFragment
#[derive(Debug, Clone)]
pub struct ShadowRootData {
    pub host: NodeId,
    pub mode: ShadowRootMode,
    pub delegates_focus: bool,
    pub slot_assignment: SlotAssignmentMode,
}

/// HTML elements that may host a shadow root besides custom elements
const VALID_SHADOW_HOSTS: &[&str] = &[
    "article",
    "aside",
    "blockquote",
    "body",
    "div",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "main",
    "nav",
    "p",
    "section",
    "span",
];

impl Document {
    /// Attach a shadow root to `host`
    pub fn attach_shadow(&mut self, host: NodeId, init: ShadowRootInit) -> DomResult<NodeId> {
        ensure_exists(self, host)?;
        let Some(element) = self.tree.node(host).as_element() else {
            return Err(DomError::NotSupported("only elements can host a shadow root".to_string()));
        };
        if !element.is_html() {
            return Err(DomError::NotSupported("shadow hosts must be HTML elements".to_string()));
        }
        let local_name = element.local_name.as_str();
        let is_custom_name = is_valid_custom_element_name(local_name);
        if !is_custom_name && !VALID_SHADOW_HOSTS.contains(&local_name) {
            return Err(DomError::NotSupported(format!("<{}> cannot host a shadow root", local_name)));
        }
        if is_custom_name || element.is_value.is_some() {
            let definition =
                self.registry
                    .lookup(element.namespace.as_deref(), local_name, element.is_value.as_deref());
            if definition.is_some_and(|d| d.disable_shadow) {
                return Err(DomError::NotSupported(format!(
                    "<{}> has shadow roots disabled",
                    local_name
                )));
            }
        }
        if element.shadow_root.is_some() {
            return Err(DomError::NotSupported("the element already hosts a shadow root".to_string()));
        }

        let connected = self.tree.node(host).connected;
        let mut node = Node::new(NodeData::DocumentFragment(FragmentData {
            shadow: Some(ShadowRootData {
                host,
                mode: init.mode,
                delegates_focus: init.delegates_focus,
                slot_assignment: init.slot_assignment,
            }),
        }));
        node.connected = connected;
        let shadow = self.tree.push(node);
        if let Some(e) = self.tree.node_mut(host).as_element_mut() {
            e.shadow_root = Some(shadow);
        }
        tracing::debug!("Attached {:?} shadow root to {:?}", init.mode, host);
        Ok(shadow)
    }

    /// Open shadow root of `host`
    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        let shadow = self.tree.get(host)?.as_element()?.shadow_root?;
        let data = self.tree.node(shadow).as_shadow_root()?;
        (data.mode == ShadowRootMode::Open).then_some(shadow)
    }

    pub(crate) fn is_slot(&self, id: NodeId) -> bool {
        self.tree.node(id).as_element().is_some_and(|e| e.is_slot())
    }

    pub(crate) fn is_slot_in_shadow_tree(&self, id: NodeId) -> bool {
        self.is_slot(id) && self.tree.node(self.tree.root(id)).is_shadow_root()
    }

    /// Slotables currently assigned to `slot`
    pub fn assigned_nodes(&self, slot: NodeId) -> Vec<NodeId> {
        self.tree
            .get(slot)
            .and_then(Node::as_element)
            .map(|e| e.assigned_nodes.clone())
            .unwrap_or_default()
    }

    /// Slot `slotable` is projected into, hidden for closed shadow roots
    pub fn assigned_slot(&self, slotable: NodeId) -> Option<NodeId> {
        self.find_slot(slotable, true)
    }

    fn slot_name(&self, slot: NodeId) -> String {
        self.get_attribute_ns(slot, None, "name").unwrap_or_default()
    }

    fn slotable_name(&self, slotable: NodeId) -> String {
        if self.tree.node(slotable).is_element() {
            self.get_attribute_ns(slotable, None, "slot").unwrap_or_default()
        } else {
            String::new()
        }
    }

    fn slots_in(&self, root: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.tree.tree_iter(root).filter(|&id| self.is_slot(id))
    }

    /// First slot in the parent's shadow tree that `slotable` matches
    pub fn find_slot(&self, slotable: NodeId, open: bool) -> Option<NodeId> {
        let node = self.tree.get(slotable)?;
        if !node.is_slotable() {
            return None;
        }
        let parent = node.parent?;
        let shadow = self.tree.node(parent).as_element()?.shadow_root?;
        let data = self.tree.node(shadow).as_shadow_root()?;
        if open && data.mode != ShadowRootMode::Open {
            return None;
        }
        if data.slot_assignment == SlotAssignmentMode::Manual {
            return self.slots_in(shadow).find(|&slot| {
                self.tree
                    .node(slot)
                    .as_element()
                    .is_some_and(|e| e.manually_assigned_nodes.contains(&slotable))
            });
        }
        let name = self.slotable_name(slotable);
        self.slots_in(shadow).find(|&slot| self.slot_name(slot) == name)
    }

    /// Host children that `slot` would project, in tree order
    pub fn find_slotables(&self, slot: NodeId) -> Vec<NodeId> {
        let root = self.tree.root(slot);
        let Some(data) = self.tree.node(root).as_shadow_root() else {
            return Vec::new();
        };
        let host = data.host;
        if data.slot_assignment == SlotAssignmentMode::Manual {
            let manual = self
                .tree
                .node(slot)
                .as_element()
                .map(|e| e.manually_assigned_nodes.clone())
                .unwrap_or_default();
            return manual
                .into_iter()
                .filter(|&id| self.tree.node(id).parent == Some(host))
                .collect();
        }
        self.tree
            .children(host)
            .filter(|&child| self.tree.node(child).is_slotable() && self.find_slot(child, false) == Some(slot))
            .collect()
    }

    /// Assigned nodes with nested slots expanded and fallback content
    /// used for slots that have none
    pub fn find_flattened_slotables(&self, slot: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        if !self.tree.node(self.tree.root(slot)).is_shadow_root() {
            return result;
        }
        let mut slotables = self.find_slotables(slot);
        if slotables.is_empty() {
            slotables = self
                .tree
                .children(slot)
                .filter(|&id| self.tree.node(id).is_slotable())
                .collect();
        }
        for node in slotables {
            if self.is_slot_in_shadow_tree(node) {
                result.extend(self.find_flattened_slotables(node));
            } else {
                result.push(node);
            }
        }
        result
    }

    /// Recompute `slot`'s assigned nodes, signalling slotchange on change
    pub(crate) fn assign_slotables(&mut self, slot: NodeId) {
        let slotables = self.find_slotables(slot);
        let previous = self.assigned_nodes(slot);
        if slotables == previous {
            return;
        }
        self.signal_slot_change(slot);
        for node in previous {
            if !slotables.contains(&node) && self.tree.node(node).assigned_slot == Some(slot) {
                self.tree.node_mut(node).assigned_slot = None;
            }
        }
        for &node in &slotables {
            self.tree.node_mut(node).assigned_slot = Some(slot);
        }
        if let Some(e) = self.tree.node_mut(slot).as_element_mut() {
            e.assigned_nodes = slotables;
        }
    }

    /// Recompute every slot in `root`'s subtree
    pub fn assign_slotables_for_tree(&mut self, root: NodeId) {
        let slots: Vec<NodeId> = self.slots_in(root).collect();
        for slot in slots {
            self.assign_slotables(slot);
        }
    }

    /// Re-slot a single slotable
    pub fn assign_slot(&mut self, slotable: NodeId) {
        if let Some(slot) = self.find_slot(slotable, false) {
            self.assign_slotables(slot);
        }
    }

    /// Manually assign `nodes` to `slot`, taking them from any other slot
    pub fn assign_slot_manually(&mut self, slot: NodeId, nodes: &[NodeId]) -> DomResult<()> {
        ensure_exists(self, slot)?;
        if !self.is_slot(slot) {
            return Err(DomError::Type("manual assignment targets a slot element".to_string()));
        }
        for &node in nodes {
            ensure_exists(self, node)?;
            if !self.tree.node(node).is_slotable() {
                return Err(DomError::Type("only elements and text can be slotted".to_string()));
            }
        }

        let previous = self
            .tree
            .node(slot)
            .as_element()
            .map(|e| e.manually_assigned_nodes.clone())
            .unwrap_or_default();
        for node in previous {
            if self.tree.node(node).manual_slot_assignment == Some(slot) {
                self.tree.node_mut(node).manual_slot_assignment = None;
            }
        }

        let mut assigned = Vec::with_capacity(nodes.len());
        for &node in nodes {
            if assigned.contains(&node) {
                continue;
            }
            if let Some(other) = self.tree.node(node).manual_slot_assignment
                && other != slot
                && let Some(e) = self.tree.node_mut(other).as_element_mut()
            {
                e.manually_assigned_nodes.retain(|&id| id != node);
            }
            self.tree.node_mut(node).manual_slot_assignment = Some(slot);
            assigned.push(node);
        }
        if let Some(e) = self.tree.node_mut(slot).as_element_mut() {
            e.manually_assigned_nodes = assigned;
        }

        let root = self.tree.root(slot);
        self.assign_slotables_for_tree(root);
        Ok(())
    }
}
