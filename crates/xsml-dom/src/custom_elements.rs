//! Custom Elements
//!
//! Definition registry, per-element reaction queues and the element queue
//! stack. Reactions are only queued by tree and attribute operations; they
//! run when a reaction context is popped or when the backup queue drains in
//! the deferred phase.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::NodeId;
use crate::document::{Document, ErrorSource, ensure_exists};
use crate::error::{DomError, DomResult};
use crate::microtask::Microtask;
use crate::node::{ElementData, HTML_NS};

/// Runs the constructor-equivalent on an element being upgraded
pub type ConstructorCallback = Rc<dyn Fn(&mut Document, NodeId) -> anyhow::Result<()>>;
/// connected / disconnected / adopted callback
pub type ElementCallback = Rc<dyn Fn(&mut Document, NodeId) -> anyhow::Result<()>>;
/// `(element, local name, old value, new value, namespace)`
pub type AttributeChangedCallback =
    Rc<dyn Fn(&mut Document, NodeId, &str, Option<&str>, Option<&str>, Option<&str>) -> anyhow::Result<()>>;
/// Invoked once the awaited name is defined
pub type WhenDefinedCallback = Box<dyn FnOnce(&mut Document) -> anyhow::Result<()>>;

/// Names reserved by SVG and MathML
const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// Validate custom element name
pub fn is_valid_custom_element_name(name: &str) -> bool {
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return false;
    }
    if !name.contains('-') || RESERVED_NAMES.contains(&name) {
        return false;
    }
    name.chars().all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_') || !c.is_ascii()
    })
}

/// Custom element state of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomElementState {
    /// Valid custom element name, no definition applied yet
    Undefined,
    /// Upgrade started or failed
    Failed,
    #[default]
    Uncustomized,
    /// Upgraded successfully
    Custom,
}

/// State a freshly created element starts in
pub(crate) fn initial_state(element: &ElementData) -> CustomElementState {
    if element.is_html() && (is_valid_custom_element_name(&element.local_name) || element.is_value.is_some()) {
        CustomElementState::Undefined
    } else {
        CustomElementState::Uncustomized
    }
}

/// Custom element lifecycle callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCallback {
    Connected,
    Disconnected,
    Adopted,
    AttributeChanged {
        name: String,
        old_value: Option<String>,
        new_value: Option<String>,
        namespace: Option<String>,
    },
}

/// Unit of work queued on one element
#[derive(Debug, Clone)]
pub enum Reaction {
    Upgrade(Rc<CustomElementDefinition>),
    Callback(LifecycleCallback),
}

/// Custom element definition
pub struct CustomElementDefinition {
    pub name: String,
    /// Tag the definition applies to; differs from `name` for customized built-ins
    pub local_name: String,
    pub observed_attributes: Vec<String>,
    pub disable_shadow: bool,
    constructor: Option<ConstructorCallback>,
    connected: Option<ElementCallback>,
    disconnected: Option<ElementCallback>,
    adopted: Option<ElementCallback>,
    attribute_changed: Option<AttributeChangedCallback>,
}

impl CustomElementDefinition {
    pub fn is_customized_builtin(&self) -> bool {
        self.name != self.local_name
    }

    fn wants(&self, callback: &LifecycleCallback) -> bool {
        match callback {
            LifecycleCallback::Connected => self.connected.is_some(),
            LifecycleCallback::Disconnected => self.disconnected.is_some(),
            LifecycleCallback::Adopted => self.adopted.is_some(),
            LifecycleCallback::AttributeChanged { name, .. } => {
                self.attribute_changed.is_some() && self.observed_attributes.contains(name)
            }
        }
    }
}

impl fmt::Debug for CustomElementDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomElementDefinition")
            .field("name", &self.name)
            .field("local_name", &self.local_name)
            .field("observed_attributes", &self.observed_attributes)
            .field("disable_shadow", &self.disable_shadow)
            .finish_non_exhaustive()
    }
}

/// Options for [`Document::define`]
#[derive(Clone, Default)]
pub struct DefinitionOptions {
    extends: Option<String>,
    observed_attributes: Vec<String>,
    disable_shadow: bool,
    constructor: Option<ConstructorCallback>,
    connected: Option<ElementCallback>,
    disconnected: Option<ElementCallback>,
    adopted: Option<ElementCallback>,
    attribute_changed: Option<AttributeChangedCallback>,
}

impl DefinitionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a customized built-in extending `local_name`
    pub fn extends(mut self, local_name: &str) -> Self {
        self.extends = Some(local_name.to_string());
        self
    }

    pub fn observed_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observed_attributes = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn disable_shadow(mut self) -> Self {
        self.disable_shadow = true;
        self
    }

    pub fn constructor(mut self, f: impl Fn(&mut Document, NodeId) -> anyhow::Result<()> + 'static) -> Self {
        self.constructor = Some(Rc::new(f));
        self
    }

    pub fn on_connected(mut self, f: impl Fn(&mut Document, NodeId) -> anyhow::Result<()> + 'static) -> Self {
        self.connected = Some(Rc::new(f));
        self
    }

    pub fn on_disconnected(mut self, f: impl Fn(&mut Document, NodeId) -> anyhow::Result<()> + 'static) -> Self {
        self.disconnected = Some(Rc::new(f));
        self
    }

    pub fn on_adopted(mut self, f: impl Fn(&mut Document, NodeId) -> anyhow::Result<()> + 'static) -> Self {
        self.adopted = Some(Rc::new(f));
        self
    }

    pub fn on_attribute_changed(
        mut self,
        f: impl Fn(&mut Document, NodeId, &str, Option<&str>, Option<&str>, Option<&str>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.attribute_changed = Some(Rc::new(f));
        self
    }
}

/// Definitions of one document
#[derive(Default)]
pub(crate) struct CustomElementRegistry {
    definitions: Vec<Rc<CustomElementDefinition>>,
    when_defined: HashMap<String, Vec<WhenDefinedCallback>>,
    /// Callbacks whose name got defined, run one per deferred task
    resolved: VecDeque<WhenDefinedCallback>,
}

impl CustomElementRegistry {
    fn get_by_name(&self, name: &str) -> Option<&Rc<CustomElementDefinition>> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Definition for an element with this namespace, local name and `is` value
    pub(crate) fn lookup(
        &self,
        namespace: Option<&str>,
        local_name: &str,
        is_value: Option<&str>,
    ) -> Option<Rc<CustomElementDefinition>> {
        if namespace != Some(HTML_NS) {
            return None;
        }
        self.definitions
            .iter()
            .find(|d| {
                d.local_name == local_name && (d.name == local_name || Some(d.name.as_str()) == is_value)
            })
            .cloned()
    }
}

/// Stack of element queues plus the backup queue
#[derive(Debug, Default)]
pub(crate) struct ReactionScheduler {
    stack: Vec<VecDeque<NodeId>>,
    backup: VecDeque<NodeId>,
    /// A backup drain is queued or running
    processing_backup: bool,
}

impl Document {
    // --- Registry ---

    /// Define a custom element and queue upgrades for existing instances
    pub fn define(&mut self, name: &str, options: DefinitionOptions) -> DomResult<()> {
        if !is_valid_custom_element_name(name) {
            return Err(DomError::Syntax(format!("'{}' is not a valid custom element name", name)));
        }
        if self.registry.get_by_name(name).is_some() {
            return Err(DomError::NotSupported(format!("'{}' is already defined", name)));
        }
        let local_name = match &options.extends {
            Some(extends) if is_valid_custom_element_name(extends) => {
                return Err(DomError::NotSupported(format!(
                    "'{}' cannot extend the custom element name '{}'",
                    name, extends
                )));
            }
            Some(extends) => extends.clone(),
            None => name.to_string(),
        };

        let definition = Rc::new(CustomElementDefinition {
            name: name.to_string(),
            local_name,
            observed_attributes: options.observed_attributes,
            disable_shadow: options.disable_shadow,
            constructor: options.constructor,
            connected: options.connected,
            disconnected: options.disconnected,
            adopted: options.adopted,
            attribute_changed: options.attribute_changed,
        });
        self.registry.definitions.push(Rc::clone(&definition));
        tracing::debug!("Defined custom element '{}'", name);

        if self.config().scripting_enabled {
            let root = self.root();
            let candidates: Vec<NodeId> = self
                .tree
                .shadow_including_inclusive_descendants(root)
                .into_iter()
                .filter(|&id| {
                    self.tree.node(id).as_element().is_some_and(|e| {
                        e.is_html()
                            && e.local_name == definition.local_name
                            && (!definition.is_customized_builtin()
                                || e.is_value.as_deref() == Some(definition.name.as_str()))
                    })
                })
                .collect();
            tracing::debug!("Queueing {} upgrade(s) for '{}'", candidates.len(), name);
            for element in candidates {
                self.enqueue_upgrade_reaction(element, Rc::clone(&definition));
            }
        }

        if let Some(callbacks) = self.registry.when_defined.remove(name) {
            for callback in callbacks {
                self.resolve_when_defined(callback);
            }
        }
        Ok(())
    }

    pub fn get_definition(&self, name: &str) -> Option<Rc<CustomElementDefinition>> {
        self.registry.get_by_name(name).cloned()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.registry.get_by_name(name).is_some()
    }

    /// Run `callback` in the next deferred phase once `name` is defined
    pub fn when_defined(&mut self, name: &str, callback: WhenDefinedCallback) -> DomResult<()> {
        if !is_valid_custom_element_name(name) {
            return Err(DomError::Syntax(format!("'{}' is not a valid custom element name", name)));
        }
        if self.is_defined(name) {
            self.resolve_when_defined(callback);
        } else {
            self.registry
                .when_defined
                .entry(name.to_string())
                .or_default()
                .push(callback);
        }
        Ok(())
    }

    fn resolve_when_defined(&mut self, callback: WhenDefinedCallback) {
        self.registry.resolved.push_back(callback);
        self.microtasks.enqueue(Microtask::ResolveWhenDefined);
    }

    pub(crate) fn run_when_defined_callback(&mut self) {
        if let Some(callback) = self.registry.resolved.pop_front()
            && let Err(err) = callback(self)
        {
            self.report_error(ErrorSource::WhenDefined, None, err);
        }
    }

    /// Try to upgrade every element in `root`'s shadow-including subtree
    pub fn upgrade_subtree(&mut self, root: NodeId) -> DomResult<()> {
        ensure_exists(self, root)?;
        for id in self.tree.shadow_including_inclusive_descendants(root) {
            self.try_upgrade(id);
        }
        Ok(())
    }

    /// Queue an upgrade if a definition matches `element`
    pub(crate) fn try_upgrade(&mut self, element: NodeId) {
        if !self.config().scripting_enabled {
            return;
        }
        let definition = match self.tree.node(element).as_element() {
            Some(e) => self
                .registry
                .lookup(e.namespace.as_deref(), &e.local_name, e.is_value.as_deref()),
            None => None,
        };
        if let Some(definition) = definition {
            self.enqueue_upgrade_reaction(element, definition);
        }
    }

    // --- Enqueueing ---

    fn enqueue_upgrade_reaction(&mut self, element: NodeId, definition: Rc<CustomElementDefinition>) {
        if let Some(e) = self.tree.node_mut(element).as_element_mut() {
            e.custom.reaction_queue.push_back(Reaction::Upgrade(definition));
            self.enqueue_element(element);
        }
    }

    /// Queue a lifecycle callback if the element's definition has one for it
    pub(crate) fn enqueue_callback_reaction(&mut self, element: NodeId, callback: LifecycleCallback) {
        let Some(e) = self.tree.node_mut(element).as_element_mut() else {
            return;
        };
        let Some(definition) = e.custom.definition.as_ref() else {
            return;
        };
        if !definition.wants(&callback) {
            return;
        }
        e.custom.reaction_queue.push_back(Reaction::Callback(callback));
        self.enqueue_element(element);
    }

    /// Add `element` to the current element queue, or the backup queue when
    /// no reaction context is open
    pub fn enqueue_element(&mut self, element: NodeId) {
        if let Some(queue) = self.reactions.stack.last_mut() {
            queue.push_back(element);
            return;
        }
        self.reactions.backup.push_back(element);
        if self.reactions.processing_backup {
            return;
        }
        self.reactions.processing_backup = true;
        self.microtasks.enqueue(Microtask::DrainBackupElementQueue);
    }

    /// Open a reaction context
    pub fn push_reaction_context(&mut self) {
        self.reactions.stack.push(VecDeque::new());
    }

    /// Close the innermost reaction context and run its reactions
    pub fn pop_reaction_context(&mut self) {
        if let Some(queue) = self.reactions.stack.pop() {
            self.invoke_reactions(queue);
        }
    }

    /// Depth of open reaction contexts
    pub fn reaction_context_depth(&self) -> usize {
        self.reactions.stack.len()
    }

    pub(crate) fn drain_backup_element_queue(&mut self) {
        while let Some(element) = self.reactions.backup.pop_front() {
            self.invoke_element_reactions(element);
        }
        self.reactions.processing_backup = false;
    }

    fn invoke_reactions(&mut self, mut queue: VecDeque<NodeId>) {
        while let Some(element) = queue.pop_front() {
            self.invoke_element_reactions(element);
        }
    }

    fn invoke_element_reactions(&mut self, element: NodeId) {
        loop {
            let reaction = match self.tree.node_mut(element).as_element_mut() {
                Some(e) => e.custom.reaction_queue.pop_front(),
                None => None,
            };
            let Some(reaction) = reaction else {
                break;
            };
            let result = match reaction {
                Reaction::Upgrade(definition) => self.upgrade_element(element, definition),
                Reaction::Callback(callback) => self.invoke_lifecycle_callback(element, callback),
            };
            if let Err(err) = result {
                self.report_error(ErrorSource::CustomElementReaction, Some(element), err);
            }
        }
    }

    // --- Running ---

    /// Upgrade algorithm: on failure the element is left Failed with an
    /// empty reaction queue
    fn upgrade_element(&mut self, element: NodeId, definition: Rc<CustomElementDefinition>) -> anyhow::Result<()> {
        let (attrs, has_shadow) = {
            let Some(e) = self.tree.node_mut(element).as_element_mut() else {
                return Ok(());
            };
            if !matches!(
                e.custom.state,
                CustomElementState::Undefined | CustomElementState::Uncustomized
            ) {
                return Ok(());
            }
            e.custom.definition = Some(Rc::clone(&definition));
            e.custom.state = CustomElementState::Failed;
            (e.attributes.iter().collect::<Vec<_>>(), e.shadow_root.is_some())
        };

        for attr in attrs {
            let Some(data) = self.tree.node(attr).as_attribute().cloned() else {
                continue;
            };
            self.enqueue_callback_reaction(
                element,
                LifecycleCallback::AttributeChanged {
                    name: data.local_name,
                    old_value: None,
                    new_value: Some(data.value),
                    namespace: data.namespace,
                },
            );
        }
        if self.tree.node(element).connected {
            self.enqueue_callback_reaction(element, LifecycleCallback::Connected);
        }

        let result = if definition.disable_shadow && has_shadow {
            Err(anyhow::anyhow!(
                "'{}' disables shadow roots but the element already has one",
                definition.name
            ))
        } else {
            match &definition.constructor {
                Some(constructor) => constructor(self, element),
                None => Ok(()),
            }
        };

        let Some(e) = self.tree.node_mut(element).as_element_mut() else {
            return result;
        };
        match result {
            Ok(()) => {
                e.custom.state = CustomElementState::Custom;
                tracing::debug!("Upgraded {:?} to '{}'", element, definition.name);
                Ok(())
            }
            Err(err) => {
                e.custom.definition = None;
                e.custom.reaction_queue.clear();
                Err(err.context(format!("upgrading '{}'", definition.name)))
            }
        }
    }

    fn invoke_lifecycle_callback(&mut self, element: NodeId, callback: LifecycleCallback) -> anyhow::Result<()> {
        let Some(definition) = self
            .tree
            .node(element)
            .as_element()
            .and_then(|e| e.custom.definition.clone())
        else {
            return Ok(());
        };
        match callback {
            LifecycleCallback::Connected => match &definition.connected {
                Some(f) => f(self, element),
                None => Ok(()),
            },
            LifecycleCallback::Disconnected => match &definition.disconnected {
                Some(f) => f(self, element),
                None => Ok(()),
            },
            LifecycleCallback::Adopted => match &definition.adopted {
                Some(f) => f(self, element),
                None => Ok(()),
            },
            LifecycleCallback::AttributeChanged {
                name,
                old_value,
                new_value,
                namespace,
            } => match &definition.attribute_changed {
                Some(f) => f(
                    self,
                    element,
                    &name,
                    old_value.as_deref(),
                    new_value.as_deref(),
                    namespace.as_deref(),
                ),
                None => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_custom_element_name("x-panel"));
        assert!(is_valid_custom_element_name("my-element.v2"));
        assert!(!is_valid_custom_element_name("panel"));
        assert!(!is_valid_custom_element_name("X-panel"));
        assert!(!is_valid_custom_element_name("font-face"));
        assert!(!is_valid_custom_element_name("-x"));
    }

    #[test]
    fn test_define_validation() {
        let mut doc = Document::new("about:blank");
        assert!(matches!(doc.define("nohyphen", DefinitionOptions::new()), Err(DomError::Syntax(_))));
        doc.define("x-a", DefinitionOptions::new()).unwrap();
        assert!(matches!(doc.define("x-a", DefinitionOptions::new()), Err(DomError::NotSupported(_))));
        assert!(matches!(
            doc.define("x-b", DefinitionOptions::new().extends("x-a")),
            Err(DomError::NotSupported(_))
        ));
        assert!(doc.is_defined("x-a"));
    }

    #[test]
    fn test_created_element_upgrades_in_deferred_phase() {
        let mut doc = Document::new("about:blank");
        doc.define("x-a", DefinitionOptions::new()).unwrap();
        let el = doc.create_element("x-a").unwrap();
        assert_eq!(doc.node(el).as_element().unwrap().custom_state(), CustomElementState::Undefined);
        doc.run_deferred();
        assert_eq!(doc.node(el).as_element().unwrap().custom_state(), CustomElementState::Custom);
    }

    #[test]
    fn test_reaction_context_runs_on_pop() {
        let mut doc = Document::new("about:blank");
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        doc.define(
            "x-a",
            DefinitionOptions::new().constructor(move |_, el| {
                sink.borrow_mut().push(el);
                Ok(())
            }),
        )
        .unwrap();

        doc.push_reaction_context();
        let el = doc.create_element("x-a").unwrap();
        assert!(log.borrow().is_empty());
        doc.pop_reaction_context();
        assert_eq!(*log.borrow(), vec![el]);
        assert!(!doc.has_pending_deferred());
    }

    #[test]
    fn test_failed_constructor() {
        let mut doc = Document::new("about:blank");
        doc.define(
            "x-bad",
            DefinitionOptions::new().constructor(|_, _| Err(anyhow::anyhow!("boom"))),
        )
        .unwrap();
        let el = doc.create_element("x-bad").unwrap();
        doc.run_deferred();

        let element = doc.node(el).as_element().unwrap();
        assert_eq!(element.custom_state(), CustomElementState::Failed);
        assert!(element.custom_definition().is_none());
        let errors = doc.take_reported_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].source, ErrorSource::CustomElementReaction);
    }

    #[test]
    fn test_when_defined() {
        let mut doc = Document::new("about:blank");
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        doc.when_defined(
            "x-late",
            Box::new(move |_| {
                *counter.borrow_mut() += 1;
                Ok(())
            }),
        )
        .unwrap();
        assert_eq!(*hits.borrow(), 0);
        doc.define("x-late", DefinitionOptions::new()).unwrap();
        assert_eq!(*hits.borrow(), 0);
        doc.run_deferred();
        assert_eq!(*hits.borrow(), 1);

        // Already defined: still waits for the deferred phase
        let counter = Rc::clone(&hits);
        doc.when_defined(
            "x-late",
            Box::new(move |_| {
                *counter.borrow_mut() += 1;
                Ok(())
            }),
        )
        .unwrap();
        assert_eq!(*hits.borrow(), 1);
        assert!(doc.has_pending_deferred());
        doc.run_deferred();
        assert_eq!(*hits.borrow(), 2);
    }
}
