//! DOM Node - tagged variant over node kinds
//!
//! Links are stored as `NodeId`s into the owning arena rather than pointers:
//! - `parent`, `prev_sibling`, `next_sibling` are non-owning back-references
//! - children are the linked list `first_child .. last_child`
//! - kind-specific state lives in [`NodeData`]

use std::collections::VecDeque;
use std::rc::Rc;

use crate::NodeId;
use crate::attributes::AttributeStore;
use crate::custom_elements::{CustomElementDefinition, CustomElementState, Reaction};
use crate::generation::Generation;
use crate::observer::RegisteredObserver;
use crate::shadow::ShadowRootData;

/// HTML namespace
pub const HTML_NS: &str = "http://www.w3.org/1999/xhtml";
/// XML namespace
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
/// XMLNS namespace
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// Node type codes, numbered as in the DOM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NodeType {
    Element = 1,
    Attribute = 2,
    Text = 3,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
}

/// DOM Node - Core structure
#[derive(Debug)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) child_count: u32,
    /// Bumped on every change to this node or its subtree
    pub(crate) version: Generation,
    /// Shadow-including root is the document
    pub(crate) connected: bool,
    pub(crate) registered_observers: Vec<RegisteredObserver>,
    /// Slot this slotable is currently projected into
    pub(crate) assigned_slot: Option<NodeId>,
    /// Slot that manually claimed this slotable
    pub(crate) manual_slot_assignment: Option<NodeId>,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            child_count: 0,
            version: Generation::INITIAL,
            connected: false,
            registered_observers: Vec::new(),
            assigned_slot: None,
            manual_slot_assignment: None,
            data,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match &self.data {
            NodeData::Document => NodeType::Document,
            NodeData::DocumentType(_) => NodeType::DocumentType,
            NodeData::DocumentFragment(_) => NodeType::DocumentFragment,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Attribute(_) => NodeType::Attribute,
            NodeData::Text(_) => NodeType::Text,
            NodeData::Comment(_) => NodeType::Comment,
        }
    }

    /// Node name as the DOM reports it
    pub fn node_name(&self) -> String {
        match &self.data {
            NodeData::Document => "#document".to_string(),
            NodeData::DocumentType(doctype) => doctype.name.clone(),
            NodeData::DocumentFragment(_) => "#document-fragment".to_string(),
            NodeData::Element(elem) => elem.qualified_name(),
            NodeData::Attribute(attr) => attr.qualified_name(),
            NodeData::Text(_) => "#text".to_string(),
            NodeData::Comment(_) => "#comment".to_string(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    pub fn previous_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    pub fn child_count(&self) -> usize {
        self.child_count as usize
    }

    pub fn version(&self) -> Generation {
        self.version
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn assigned_slot(&self) -> Option<NodeId> {
        self.assigned_slot
    }

    /// Check if this is an element
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Check if this is text
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    #[inline]
    pub fn is_character_data(&self) -> bool {
        matches!(self.data, NodeData::Text(_) | NodeData::Comment(_))
    }

    /// Elements and Text nodes can be projected into slots
    #[inline]
    pub fn is_slotable(&self) -> bool {
        self.is_element() || self.is_text()
    }

    #[inline]
    pub fn is_shadow_root(&self) -> bool {
        matches!(&self.data, NodeData::DocumentFragment(frag) if frag.shadow.is_some())
    }

    /// Host element if this node is a shadow root
    pub fn shadow_host(&self) -> Option<NodeId> {
        match &self.data {
            NodeData::DocumentFragment(frag) => frag.shadow.as_ref().map(|s| s.host),
            _ => None,
        }
    }

    pub fn as_shadow_root(&self) -> Option<&ShadowRootData> {
        match &self.data {
            NodeData::DocumentFragment(frag) => frag.shadow.as_ref(),
            _ => None,
        }
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_attribute(&self) -> Option<&AttrData> {
        match &self.data {
            NodeData::Attribute(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_attribute_mut(&mut self) -> Option<&mut AttrData> {
        match &mut self.data {
            NodeData::Attribute(a) => Some(a),
            _ => None,
        }
    }

    /// Text or comment payload
    #[inline]
    pub fn character_data(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(data) | NodeData::Comment(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn character_data_mut(&mut self) -> Option<&mut String> {
        match &mut self.data {
            NodeData::Text(data) | NodeData::Comment(data) => Some(data),
            _ => None,
        }
    }

    /// Node length: UTF-16 length for character data, child count otherwise
    pub fn length(&self) -> usize {
        match &self.data {
            NodeData::DocumentType(_) | NodeData::Attribute(_) => 0,
            NodeData::Text(data) | NodeData::Comment(data) => utf16_len(data),
            _ => self.child_count(),
        }
    }
}

pub(crate) fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Node-specific data
#[derive(Debug)]
pub enum NodeData {
    /// Document root
    Document,
    /// DOCTYPE
    DocumentType(DocumentTypeData),
    /// Fragment; a shadow root when `shadow` is set
    DocumentFragment(FragmentData),
    /// Element
    Element(ElementData),
    /// Attribute, owned by at most one element
    Attribute(AttrData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTypeData {
    pub name: String,
    pub public_id: String,
    pub system_id: String,
}

#[derive(Debug, Default)]
pub struct FragmentData {
    pub shadow: Option<ShadowRootData>,
}

/// Element-specific data
#[derive(Debug)]
pub struct ElementData {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local_name: String,
    /// `is` value for customized built-in elements
    pub is_value: Option<String>,
    pub(crate) attributes: AttributeStore,
    pub(crate) shadow_root: Option<NodeId>,
    pub(crate) custom: CustomElementData,
    /// Slot elements only: slotables currently projected here
    pub(crate) assigned_nodes: Vec<NodeId>,
    /// Slot elements in manual-assignment shadow trees
    pub(crate) manually_assigned_nodes: Vec<NodeId>,
    pub(crate) style_dirty: bool,
}

impl ElementData {
    pub(crate) fn new(namespace: Option<String>, prefix: Option<String>, local_name: String) -> Self {
        Self {
            namespace,
            prefix,
            local_name,
            is_value: None,
            attributes: AttributeStore::new(),
            shadow_root: None,
            custom: CustomElementData::default(),
            assigned_nodes: Vec::new(),
            manually_assigned_nodes: Vec::new(),
            style_dirty: true,
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }

    #[inline]
    pub fn is_html(&self) -> bool {
        self.namespace.as_deref() == Some(HTML_NS)
    }

    /// `<slot>` in the HTML namespace
    #[inline]
    pub fn is_slot(&self) -> bool {
        self.is_html() && self.local_name == "slot"
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn shadow_root(&self) -> Option<NodeId> {
        self.shadow_root
    }

    pub fn custom_state(&self) -> CustomElementState {
        self.custom.state
    }

    pub fn custom_definition(&self) -> Option<&Rc<CustomElementDefinition>> {
        self.custom.definition.as_ref()
    }

    pub fn is_style_dirty(&self) -> bool {
        self.style_dirty
    }

    pub fn clear_style_dirty(&mut self) {
        self.style_dirty = false;
    }
}

/// Custom element bookkeeping carried by every element
#[derive(Debug, Default)]
pub(crate) struct CustomElementData {
    pub(crate) state: CustomElementState,
    pub(crate) definition: Option<Rc<CustomElementDefinition>>,
    pub(crate) reaction_queue: VecDeque<Reaction>,
}

/// Attribute node data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrData {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local_name: String,
    pub value: String,
    pub(crate) owner: Option<NodeId>,
}

impl AttrData {
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }

    pub fn owner_element(&self) -> Option<NodeId> {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_and_name() {
        let text = Node::new(NodeData::Text("hi".to_string()));
        assert_eq!(text.node_type(), NodeType::Text);
        assert_eq!(text.node_name(), "#text");
        assert_eq!(text.length(), 2);

        let elem = Node::new(NodeData::Element(ElementData::new(
            Some(HTML_NS.to_string()),
            Some("x".to_string()),
            "slot".to_string(),
        )));
        assert_eq!(elem.node_name(), "x:slot");
        assert!(elem.as_element().is_some_and(ElementData::is_slot));
        assert!(elem.is_slotable());
    }

    #[test]
    fn test_utf16_length() {
        let text = Node::new(NodeData::Text("a\u{1F680}".to_string()));
        assert_eq!(text.length(), 3);
    }
}
