//! Document - the engine that owns the arena and every registry
//!
//! The id index, live ranges, observers, reaction queues and the deferred
//! task queue are all scoped to one `Document`; nothing here is process-wide.

use std::collections::HashMap;
use std::fmt;

use crate::config::DocumentConfig;
use crate::custom_elements::{CustomElementRegistry, ReactionScheduler};
use crate::error::{DomError, DomResult};
use crate::microtask::MicrotaskQueue;
use crate::names;
use crate::node::{AttrData, DocumentTypeData, ElementData, FragmentData, HTML_NS, Node, NodeData};
use crate::observer::{MutationRecorder, ObserverId};
use crate::query::{SelectorMatcher, SimpleSelectorMatcher};
use crate::range::RangeTracker;
use crate::tree::DomTree;
use crate::NodeId;

/// Capability a host installs to bind connected elements into its 3D scene
pub trait SceneBinding {
    /// Element became connected
    fn connected(&mut self, tree: &DomTree, element: NodeId);
    /// Element stopped being connected
    fn disconnected(&mut self, tree: &DomTree, element: NodeId);
}

/// Where a reported callback failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    MutationObserver(ObserverId),
    CustomElementReaction,
    SlotChange,
    WhenDefined,
}

/// Failure of user-supplied code, caught and reported instead of propagated
#[derive(Debug, Clone)]
pub struct ReportedError {
    pub source: ErrorSource,
    pub node: Option<NodeId>,
    pub message: String,
}

impl fmt::Display for ReportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.source, self.message)
    }
}

/// Handler invoked once per signalled slot in the deferred phase
pub type SlotChangeHandler = Box<dyn FnMut(&DomTree, NodeId) -> anyhow::Result<()>>;

/// XSML Document
pub struct Document {
    pub(crate) tree: DomTree,
    root: NodeId,
    config: DocumentConfig,
    /// Connected elements by `id` attribute value
    id_index: HashMap<String, Vec<NodeId>>,
    pub(crate) ranges: RangeTracker,
    pub(crate) recorder: MutationRecorder,
    pub(crate) reactions: ReactionScheduler,
    pub(crate) registry: CustomElementRegistry,
    pub(crate) microtasks: MicrotaskQueue,
    pub(crate) selector_matcher: Box<dyn SelectorMatcher>,
    scene_binding: Option<Box<dyn SceneBinding>>,
    /// Connection changes of the running tree operation: `(element, connected)`
    scene_changes: Vec<(NodeId, bool)>,
    pub(crate) slotchange_handler: Option<SlotChangeHandler>,
    reported_errors: Vec<ReportedError>,
}

impl Document {
    /// Create a document with `<html><head></head><body></body></html>`
    pub fn new(url: &str) -> Self {
        let mut doc = Self::empty(url);
        let root = doc.root;
        let html = doc.create_html_element("html");
        let head = doc.create_html_element("head");
        let body = doc.create_html_element("body");
        doc.insert(html, root, None, true);
        doc.insert(head, html, None, true);
        doc.insert(body, html, None, true);
        doc.flush_scene_changes();
        doc
    }

    /// Create an empty document (no structure)
    pub fn empty(url: &str) -> Self {
        Self::with_config(DocumentConfig {
            url: url.to_string(),
            ..DocumentConfig::default()
        })
    }

    pub fn with_config(config: DocumentConfig) -> Self {
        let mut tree = DomTree::new();
        let mut document_node = Node::new(NodeData::Document);
        document_node.connected = true;
        let root = tree.push(document_node);
        Self {
            tree,
            root,
            config,
            id_index: HashMap::new(),
            ranges: RangeTracker::default(),
            recorder: MutationRecorder::default(),
            reactions: ReactionScheduler::default(),
            registry: CustomElementRegistry::default(),
            microtasks: MicrotaskQueue::default(),
            selector_matcher: Box::new(SimpleSelectorMatcher),
            scene_binding: None,
            scene_changes: Vec::new(),
            slotchange_handler: None,
            reported_errors: Vec::new(),
        }
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get document URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn is_html(&self) -> bool {
        self.config.is_html()
    }

    /// Access the DOM tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Borrow a node.
    ///
    /// # Panics
    /// If `id` does not belong to this document.
    pub fn node(&self, id: NodeId) -> &Node {
        self.tree.node(id)
    }

    /// Mutable element payload, for host-side flags such as style dirtiness
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.tree.get_mut(id).and_then(Node::as_element_mut)
    }

    /// The single element child of the document node
    pub fn document_element(&self) -> Option<NodeId> {
        self.tree
            .children(self.root)
            .find(|&id| self.tree.node(id).is_element())
    }

    /// `<head>` child of the document element
    pub fn head(&self) -> Option<NodeId> {
        self.html_child("head")
    }

    /// `<body>` child of the document element
    pub fn body(&self) -> Option<NodeId> {
        self.html_child("body")
    }

    fn html_child(&self, local_name: &str) -> Option<NodeId> {
        let html = self.document_element()?;
        self.tree.children(html).find(|&id| {
            self.tree
                .node(id)
                .as_element()
                .is_some_and(|e| e.is_html() && e.local_name == local_name)
        })
    }

    pub fn set_scene_binding(&mut self, binding: Box<dyn SceneBinding>) {
        self.scene_binding = Some(binding);
    }

    pub fn set_selector_matcher(&mut self, matcher: Box<dyn SelectorMatcher>) {
        self.selector_matcher = matcher;
    }

    pub fn set_slotchange_handler(&mut self, handler: SlotChangeHandler) {
        self.slotchange_handler = Some(handler);
    }

    // --- Node creation ---

    /// Create an element in the HTML namespace
    pub fn create_element(&mut self, local_name: &str) -> DomResult<NodeId> {
        names::validate_name(local_name)?;
        let local_name = if self.is_html() {
            local_name.to_ascii_lowercase()
        } else {
            local_name.to_string()
        };
        Ok(self.create_element_internal(Some(HTML_NS.to_string()), None, local_name, None))
    }

    /// Create a customized built-in element (`is` value)
    pub fn create_element_is(&mut self, local_name: &str, is_value: &str) -> DomResult<NodeId> {
        names::validate_name(local_name)?;
        let local_name = if self.is_html() {
            local_name.to_ascii_lowercase()
        } else {
            local_name.to_string()
        };
        Ok(self.create_element_internal(
            Some(HTML_NS.to_string()),
            None,
            local_name,
            Some(is_value.to_string()),
        ))
    }

    /// Create an element from a namespace and qualified name
    pub fn create_element_ns(&mut self, namespace: Option<&str>, qualified_name: &str) -> DomResult<NodeId> {
        let (namespace, prefix, local_name) = names::validate_and_extract(namespace, qualified_name)?;
        Ok(self.create_element_internal(namespace, prefix, local_name, None))
    }

    fn create_html_element(&mut self, local_name: &str) -> NodeId {
        self.create_element_internal(Some(HTML_NS.to_string()), None, local_name.to_string(), None)
    }

    pub(crate) fn create_element_internal(
        &mut self,
        namespace: Option<String>,
        prefix: Option<String>,
        local_name: String,
        is_value: Option<String>,
    ) -> NodeId {
        let mut data = ElementData::new(namespace, prefix, local_name);
        data.is_value = is_value;
        data.custom.state = crate::custom_elements::initial_state(&data);
        let id = self.tree.push(Node::new(NodeData::Element(data)));
        self.try_upgrade(id);
        id
    }

    pub fn create_text_node(&mut self, data: &str) -> NodeId {
        self.tree.push(Node::new(NodeData::Text(data.to_string())))
    }

    pub fn create_comment(&mut self, data: &str) -> NodeId {
        self.tree.push(Node::new(NodeData::Comment(data.to_string())))
    }

    pub fn create_document_fragment(&mut self) -> NodeId {
        self.tree
            .push(Node::new(NodeData::DocumentFragment(FragmentData::default())))
    }

    pub fn create_document_type(&mut self, name: &str, public_id: &str, system_id: &str) -> DomResult<NodeId> {
        names::validate_qualified_name(name)?;
        Ok(self.tree.push(Node::new(NodeData::DocumentType(DocumentTypeData {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        }))))
    }

    /// Create an unowned attribute
    pub fn create_attribute(&mut self, local_name: &str) -> DomResult<NodeId> {
        names::validate_name(local_name)?;
        let local_name = if self.is_html() {
            local_name.to_ascii_lowercase()
        } else {
            local_name.to_string()
        };
        Ok(self.new_attribute(None, None, local_name, String::new()))
    }

    pub fn create_attribute_ns(&mut self, namespace: Option<&str>, qualified_name: &str) -> DomResult<NodeId> {
        let (namespace, prefix, local_name) = names::validate_and_extract(namespace, qualified_name)?;
        Ok(self.new_attribute(namespace, prefix, local_name, String::new()))
    }

    pub(crate) fn new_attribute(
        &mut self,
        namespace: Option<String>,
        prefix: Option<String>,
        local_name: String,
        value: String,
    ) -> NodeId {
        self.tree.push(Node::new(NodeData::Attribute(AttrData {
            namespace,
            prefix,
            local_name,
            value,
            owner: None,
        })))
    }

    // --- Connection bookkeeping ---

    /// Mark `node` and its shadow-including descendants connected
    pub(crate) fn attach_subtree(&mut self, node: NodeId) {
        for id in self.tree.shadow_including_inclusive_descendants(node) {
            self.tree.node_mut(id).connected = true;
            if !self.tree.node(id).is_element() {
                continue;
            }
            if let Some(value) = self.element_id_value(id) {
                self.id_index_add(value, id);
            }
            self.scene_changes.push((id, true));
        }
    }

    /// Mark `node` and its shadow-including descendants disconnected
    pub(crate) fn detach_subtree(&mut self, node: NodeId) {
        for id in self.tree.shadow_including_inclusive_descendants(node) {
            self.tree.node_mut(id).connected = false;
            if !self.tree.node(id).is_element() {
                continue;
            }
            if let Some(value) = self.element_id_value(id) {
                self.id_index_remove(&value, id);
            }
            self.scene_changes.push((id, false));
        }
    }

    /// Hand the connection changes of a finished tree operation to the scene
    pub(crate) fn flush_scene_changes(&mut self) {
        let changes = std::mem::take(&mut self.scene_changes);
        let Some(binding) = self.scene_binding.as_mut() else {
            return;
        };
        for (element, connected) in changes {
            if connected {
                binding.connected(&self.tree, element);
            } else {
                binding.disconnected(&self.tree, element);
            }
        }
    }

    fn element_id_value(&self, element: NodeId) -> Option<String> {
        self.get_attribute_ns(element, None, "id")
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn id_index_add(&mut self, value: String, element: NodeId) {
        let entry = self.id_index.entry(value).or_default();
        if !entry.contains(&element) {
            entry.push(element);
        }
    }

    pub(crate) fn id_index_remove(&mut self, value: &str, element: NodeId) {
        if let Some(entry) = self.id_index.get_mut(value) {
            entry.retain(|&id| id != element);
            if entry.is_empty() {
                self.id_index.remove(value);
            }
        }
    }

    /// Get a connected element by ID, first in tree order
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let candidates = self.id_index.get(id)?;
        candidates
            .iter()
            .copied()
            .filter(|&candidate| self.tree.root(candidate) == self.root)
            .min_by(|&a, &b| self.tree.tree_order(a, b))
    }

    // --- Error reporting side channel ---

    pub(crate) fn report_error(&mut self, source: ErrorSource, node: Option<NodeId>, error: anyhow::Error) {
        tracing::warn!("Uncaught error in {:?} callback: {:#}", source, error);
        self.reported_errors.push(ReportedError {
            source,
            node,
            message: format!("{:#}", error),
        });
    }

    /// Errors raised by user callbacks since the last call
    pub fn take_reported_errors(&mut self) -> Vec<ReportedError> {
        std::mem::take(&mut self.reported_errors)
    }

    /// Memory held by the arena, in nodes
    pub fn node_count(&self) -> usize {
        self.tree.len()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.config.url)
            .field("nodes", &self.tree.len())
            .finish_non_exhaustive()
    }
}

/// Host-facing check that a node id belongs to this document
pub(crate) fn ensure_exists(doc: &Document, id: NodeId) -> DomResult<()> {
    if doc.tree.contains_id(id) {
        Ok(())
    } else {
        Err(DomError::not_found(format!("node {} does not exist", id.index())))
    }
}
