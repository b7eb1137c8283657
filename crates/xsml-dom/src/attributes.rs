//! Element Attributes
//!
//! Attributes are arena nodes so their identity survives value changes.
//! `AttributeStore` keeps the per-element order plus a qualified-name index;
//! the `Document` methods below do validation, observer records, custom
//! element reactions and the element's own attribute-change steps.

use std::collections::HashMap;

use crate::NodeId;
use crate::custom_elements::{CustomElementState, LifecycleCallback};
use crate::document::{Document, ensure_exists};
use crate::error::{DomError, DomResult};
use crate::names;

/// Ordered attribute list of one element
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    list: Vec<NodeId>,
    /// Qualified name -> attributes with that name, in list order
    by_name: HashMap<String, Vec<NodeId>>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of attributes
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Get attribute by index
    pub fn item(&self, index: usize) -> Option<NodeId> {
        self.list.get(index).copied()
    }

    /// Iterate over attributes in list order
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.list.iter().copied()
    }

    pub fn contains(&self, attr: NodeId) -> bool {
        self.list.contains(&attr)
    }

    /// First attribute with this qualified name
    pub fn first_named(&self, qualified_name: &str) -> Option<NodeId> {
        self.by_name.get(qualified_name).and_then(|ids| ids.first().copied())
    }

    pub(crate) fn push(&mut self, attr: NodeId, qualified_name: String) {
        self.list.push(attr);
        self.by_name.entry(qualified_name).or_default().push(attr);
    }

    pub(crate) fn remove(&mut self, attr: NodeId, qualified_name: &str) {
        self.list.retain(|&id| id != attr);
        if let Some(ids) = self.by_name.get_mut(qualified_name) {
            ids.retain(|&id| id != attr);
            if ids.is_empty() {
                self.by_name.remove(qualified_name);
            }
        }
    }

    /// Put `new` in `old`'s list position
    pub(crate) fn replace(&mut self, old: NodeId, old_name: &str, new: NodeId, new_name: String) {
        if let Some(slot) = self.list.iter_mut().find(|id| **id == old) {
            *slot = new;
        }
        if let Some(ids) = self.by_name.get_mut(old_name) {
            ids.retain(|&id| id != old);
            if ids.is_empty() {
                self.by_name.remove(old_name);
            }
        }
        // Keep per-name lists in list order
        let order: Vec<NodeId> = self.list.clone();
        let ids = self.by_name.entry(new_name).or_default();
        ids.push(new);
        ids.sort_by_key(|id| order.iter().position(|x| x == id));
    }
}

impl Document {
    fn store(&self, element: NodeId) -> DomResult<&AttributeStore> {
        ensure_exists(self, element)?;
        self.tree
            .node(element)
            .as_element()
            .map(|e| &e.attributes)
            .ok_or_else(|| DomError::InvalidState("not an element".to_string()))
    }

    /// HTML elements in HTML documents match names case-insensitively
    fn normalize_attribute_name(&self, element: NodeId, name: &str) -> String {
        let html_element = self.tree.node(element).as_element().is_some_and(|e| e.is_html());
        if html_element && self.is_html() {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    // --- Lookup ---

    pub fn get_attribute_node(&self, element: NodeId, name: &str) -> Option<NodeId> {
        let store = self.store(element).ok()?;
        store.first_named(&self.normalize_attribute_name(element, name))
    }

    pub fn get_attribute_node_ns(&self, element: NodeId, namespace: Option<&str>, local_name: &str) -> Option<NodeId> {
        let namespace = namespace.filter(|ns| !ns.is_empty());
        let store = self.store(element).ok()?;
        store.iter().find(|&id| {
            self.tree
                .node(id)
                .as_attribute()
                .is_some_and(|a| a.namespace.as_deref() == namespace && a.local_name == local_name)
        })
    }

    /// Value of the first attribute with this qualified name
    pub fn get_attribute(&self, element: NodeId, name: &str) -> Option<String> {
        let attr = self.get_attribute_node(element, name)?;
        self.tree.node(attr).as_attribute().map(|a| a.value.clone())
    }

    pub fn get_attribute_ns(&self, element: NodeId, namespace: Option<&str>, local_name: &str) -> Option<String> {
        let attr = self.get_attribute_node_ns(element, namespace, local_name)?;
        self.tree.node(attr).as_attribute().map(|a| a.value.clone())
    }

    pub fn has_attribute(&self, element: NodeId, name: &str) -> bool {
        self.get_attribute_node(element, name).is_some()
    }

    pub fn has_attribute_ns(&self, element: NodeId, namespace: Option<&str>, local_name: &str) -> bool {
        self.get_attribute_node_ns(element, namespace, local_name).is_some()
    }

    /// Qualified names in list order
    pub fn attribute_names(&self, element: NodeId) -> Vec<String> {
        let Ok(store) = self.store(element) else {
            return Vec::new();
        };
        store
            .iter()
            .filter_map(|id| self.tree.node(id).as_attribute().map(|a| a.qualified_name()))
            .collect()
    }

    // --- Mutation by name ---

    /// Set an attribute, reusing the existing Attribute node if there is one
    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> DomResult<()> {
        self.store(element)?;
        names::validate_name(name)?;
        let name = self.normalize_attribute_name(element, name);
        match self.get_attribute_node(element, &name) {
            Some(attr) => self.change_attribute(attr, value),
            None => {
                let attr = self.new_attribute(None, None, name, value.to_string());
                self.append_attribute(element, attr);
            }
        }
        Ok(())
    }

    pub fn set_attribute_ns(
        &mut self,
        element: NodeId,
        namespace: Option<&str>,
        qualified_name: &str,
        value: &str,
    ) -> DomResult<()> {
        self.store(element)?;
        let (namespace, prefix, local_name) = names::validate_and_extract(namespace, qualified_name)?;
        match self.get_attribute_node_ns(element, namespace.as_deref(), &local_name) {
            Some(attr) => self.change_attribute(attr, value),
            None => {
                let attr = self.new_attribute(namespace, prefix, local_name, value.to_string());
                self.append_attribute(element, attr);
            }
        }
        Ok(())
    }

    /// Remove by qualified name, returning the removed Attribute node
    pub fn remove_attribute(&mut self, element: NodeId, name: &str) -> Option<NodeId> {
        let attr = self.get_attribute_node(element, name)?;
        self.remove_attribute_internal(element, attr);
        Some(attr)
    }

    pub fn remove_attribute_ns(&mut self, element: NodeId, namespace: Option<&str>, local_name: &str) -> Option<NodeId> {
        let attr = self.get_attribute_node_ns(element, namespace, local_name)?;
        self.remove_attribute_internal(element, attr);
        Some(attr)
    }

    /// Toggle attribute; returns whether it is present afterwards
    pub fn toggle_attribute(&mut self, element: NodeId, name: &str, force: Option<bool>) -> DomResult<bool> {
        self.store(element)?;
        names::validate_name(name)?;
        let name = self.normalize_attribute_name(element, name);
        match (self.get_attribute_node(element, &name), force) {
            (None, Some(false)) => Ok(false),
            (None, _) => {
                let attr = self.new_attribute(None, None, name, String::new());
                self.append_attribute(element, attr);
                Ok(true)
            }
            (Some(_), Some(true)) => Ok(true),
            (Some(attr), _) => {
                self.remove_attribute_internal(element, attr);
                Ok(false)
            }
        }
    }

    // --- Mutation by Attribute node ---

    /// Attach `attr`, returning the attribute it displaced
    pub fn set_attribute_node(&mut self, element: NodeId, attr: NodeId) -> DomResult<Option<NodeId>> {
        self.store(element)?;
        ensure_exists(self, attr)?;
        let (namespace, local_name, owner) = match self.tree.node(attr).as_attribute() {
            Some(a) => (a.namespace.clone(), a.local_name.clone(), a.owner),
            None => return Err(DomError::Type("not an attribute".to_string())),
        };
        if owner.is_some_and(|o| o != element) {
            return Err(DomError::InUseAttribute);
        }
        let old = self.get_attribute_node_ns(element, namespace.as_deref(), &local_name);
        match old {
            Some(old) if old == attr => Ok(Some(attr)),
            Some(old) => {
                self.replace_attribute(old, attr);
                Ok(Some(old))
            }
            None => {
                self.append_attribute(element, attr);
                Ok(None)
            }
        }
    }

    pub fn remove_attribute_node(&mut self, element: NodeId, attr: NodeId) -> DomResult<NodeId> {
        if !self.store(element)?.contains(attr) {
            return Err(DomError::not_found("the attribute is not owned by this element"));
        }
        self.remove_attribute_internal(element, attr);
        Ok(attr)
    }

    /// Set the value of an Attribute node, owned or not
    pub fn set_attribute_value(&mut self, attr: NodeId, value: &str) -> DomResult<()> {
        ensure_exists(self, attr)?;
        let owner = match self.tree.node(attr).as_attribute() {
            Some(a) => a.owner,
            None => return Err(DomError::Type("not an attribute".to_string())),
        };
        match owner {
            Some(_) => self.change_attribute(attr, value),
            None => {
                if let Some(a) = self.tree.node_mut(attr).as_attribute_mut() {
                    a.value = value.to_string();
                }
            }
        }
        Ok(())
    }

    // --- Primitives ---

    /// Snapshot (namespace, local name, qualified name, value) of an attribute
    fn attribute_parts(&self, attr: NodeId) -> Option<(Option<String>, String, String, String)> {
        self.tree
            .node(attr)
            .as_attribute()
            .map(|a| (a.namespace.clone(), a.local_name.clone(), a.qualified_name(), a.value.clone()))
    }

    fn change_attribute(&mut self, attr: NodeId, value: &str) {
        let Some((namespace, local_name, _, old_value)) = self.attribute_parts(attr) else {
            return;
        };
        let Some(element) = self.tree.node(attr).as_attribute().and_then(|a| a.owner) else {
            return;
        };
        self.queue_attribute_mutation_record(element, &local_name, namespace.as_deref(), Some(&old_value));
        if let Some(a) = self.tree.node_mut(attr).as_attribute_mut() {
            a.value = value.to_string();
        }
        self.handle_attribute_changes(element, &local_name, namespace.as_deref(), Some(&old_value), Some(value));
    }

    pub(crate) fn append_attribute(&mut self, element: NodeId, attr: NodeId) {
        let Some((namespace, local_name, qualified_name, value)) = self.attribute_parts(attr) else {
            return;
        };
        self.queue_attribute_mutation_record(element, &local_name, namespace.as_deref(), None);
        if let Some(e) = self.tree.node_mut(element).as_element_mut() {
            e.attributes.push(attr, qualified_name);
        }
        if let Some(a) = self.tree.node_mut(attr).as_attribute_mut() {
            a.owner = Some(element);
        }
        self.handle_attribute_changes(element, &local_name, namespace.as_deref(), None, Some(&value));
    }

    fn remove_attribute_internal(&mut self, element: NodeId, attr: NodeId) {
        let Some((namespace, local_name, qualified_name, value)) = self.attribute_parts(attr) else {
            return;
        };
        self.queue_attribute_mutation_record(element, &local_name, namespace.as_deref(), Some(&value));
        if let Some(e) = self.tree.node_mut(element).as_element_mut() {
            e.attributes.remove(attr, &qualified_name);
        }
        if let Some(a) = self.tree.node_mut(attr).as_attribute_mut() {
            a.owner = None;
        }
        self.handle_attribute_changes(element, &local_name, namespace.as_deref(), Some(&value), None);
    }

    fn replace_attribute(&mut self, old: NodeId, new: NodeId) {
        let Some((namespace, local_name, old_name, old_value)) = self.attribute_parts(old) else {
            return;
        };
        let Some((_, _, new_name, new_value)) = self.attribute_parts(new) else {
            return;
        };
        let Some(element) = self.tree.node(old).as_attribute().and_then(|a| a.owner) else {
            return;
        };
        self.queue_attribute_mutation_record(element, &local_name, namespace.as_deref(), Some(&old_value));
        if let Some(e) = self.tree.node_mut(element).as_element_mut() {
            e.attributes.replace(old, &old_name, new, new_name);
        }
        if let Some(a) = self.tree.node_mut(new).as_attribute_mut() {
            a.owner = Some(element);
        }
        if let Some(a) = self.tree.node_mut(old).as_attribute_mut() {
            a.owner = None;
        }
        self.handle_attribute_changes(element, &local_name, namespace.as_deref(), Some(&old_value), Some(&new_value));
    }

    /// Runs after the value changed: reaction first, then the element's own steps
    fn handle_attribute_changes(
        &mut self,
        element: NodeId,
        local_name: &str,
        namespace: Option<&str>,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) {
        let is_custom = self
            .tree
            .node(element)
            .as_element()
            .is_some_and(|e| e.custom.state == CustomElementState::Custom);
        if is_custom {
            self.enqueue_callback_reaction(
                element,
                LifecycleCallback::AttributeChanged {
                    name: local_name.to_string(),
                    old_value: old_value.map(str::to_string),
                    new_value: new_value.map(str::to_string),
                    namespace: namespace.map(str::to_string),
                },
            );
        }
        self.attribute_changed_steps(element, local_name, namespace, old_value, new_value);
    }

    /// Element-side reaction to an attribute change
    fn attribute_changed_steps(
        &mut self,
        element: NodeId,
        local_name: &str,
        namespace: Option<&str>,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) {
        self.tree.bump_version(element);
        if let Some(e) = self.tree.node_mut(element).as_element_mut() {
            e.style_dirty = true;
        }
        if namespace.is_some() {
            return;
        }

        match local_name {
            "id" if self.tree.node(element).connected => {
                if let Some(old) = old_value.filter(|v| !v.is_empty()) {
                    self.id_index_remove(old, element);
                }
                if let Some(new) = new_value.filter(|v| !v.is_empty()) {
                    self.id_index_add(new.to_string(), element);
                }
            }
            "slot" => {
                if old_value.unwrap_or("") == new_value.unwrap_or("") {
                    return;
                }
                if let Some(slot) = self.tree.node(element).assigned_slot {
                    self.assign_slotables(slot);
                }
                self.assign_slot(element);
            }
            "name" if self.is_slot(element) => {
                if old_value.unwrap_or("") == new_value.unwrap_or("") {
                    return;
                }
                let root = self.tree.root(element);
                self.assign_slotables_for_tree(root);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(doc: &mut Document) -> NodeId {
        doc.create_element("div").unwrap()
    }

    #[test]
    fn test_set_get_attribute() {
        let mut doc = Document::new("about:blank");
        let el = element(&mut doc);
        doc.set_attribute(el, "class", "btn").unwrap();
        doc.set_attribute(el, "ID", "submit").unwrap();

        assert_eq!(doc.get_attribute(el, "class").as_deref(), Some("btn"));
        assert_eq!(doc.get_attribute(el, "id").as_deref(), Some("submit"));
        assert_eq!(doc.attribute_names(el), vec!["class", "id"]);
    }

    #[test]
    fn test_set_preserves_identity() {
        let mut doc = Document::new("about:blank");
        let el = element(&mut doc);
        doc.set_attribute(el, "foo", "1").unwrap();
        let attr = doc.get_attribute_node(el, "foo").unwrap();
        doc.set_attribute(el, "foo", "2").unwrap();
        assert_eq!(doc.get_attribute_node(el, "foo"), Some(attr));
        assert_eq!(doc.node(attr).as_attribute().unwrap().value, "2");
    }

    #[test]
    fn test_toggle_attribute() {
        let mut doc = Document::new("about:blank");
        let el = element(&mut doc);
        assert!(doc.toggle_attribute(el, "disabled", None).unwrap());
        assert!(doc.has_attribute(el, "disabled"));
        assert!(!doc.toggle_attribute(el, "disabled", None).unwrap());
        assert!(!doc.has_attribute(el, "disabled"));
        assert!(!doc.toggle_attribute(el, "disabled", Some(false)).unwrap());
    }

    #[test]
    fn test_attribute_in_use() {
        let mut doc = Document::new("about:blank");
        let a = element(&mut doc);
        let b = element(&mut doc);
        let attr = doc.create_attribute("title").unwrap();
        assert_eq!(doc.set_attribute_node(a, attr), Ok(None));
        assert_eq!(doc.set_attribute_node(b, attr), Err(DomError::InUseAttribute));
        assert_eq!(doc.node(attr).as_attribute().unwrap().owner_element(), Some(a));
    }

    #[test]
    fn test_set_attribute_node_replaces_in_place() {
        let mut doc = Document::new("about:blank");
        let el = element(&mut doc);
        doc.set_attribute(el, "a", "1").unwrap();
        doc.set_attribute(el, "b", "2").unwrap();
        let old = doc.get_attribute_node(el, "a").unwrap();
        let new = doc.create_attribute("a").unwrap();
        doc.set_attribute_value(new, "3").unwrap();

        assert_eq!(doc.set_attribute_node(el, new), Ok(Some(old)));
        assert_eq!(doc.attribute_names(el), vec!["a", "b"]);
        assert_eq!(doc.get_attribute(el, "a").as_deref(), Some("3"));
        assert_eq!(doc.node(old).as_attribute().unwrap().owner_element(), None);
    }

    #[test]
    fn test_remove_attribute_node_not_found() {
        let mut doc = Document::new("about:blank");
        let el = element(&mut doc);
        let attr = doc.create_attribute("x").unwrap();
        assert!(matches!(doc.remove_attribute_node(el, attr), Err(DomError::NotFound(_))));
    }

    #[test]
    fn test_namespaced_attributes() {
        let mut doc = Document::new("about:blank");
        let el = element(&mut doc);
        doc.set_attribute_ns(el, Some("urn:a"), "p:size", "1").unwrap();
        doc.set_attribute_ns(el, Some("urn:b"), "q:size", "2").unwrap();
        assert_eq!(doc.get_attribute_ns(el, Some("urn:a"), "size").as_deref(), Some("1"));
        assert_eq!(doc.get_attribute_ns(el, Some("urn:b"), "size").as_deref(), Some("2"));
        assert!(doc.remove_attribute_ns(el, Some("urn:a"), "size").is_some());
        assert_eq!(doc.attribute_names(el), vec!["q:size"]);
    }

    #[test]
    fn test_id_index_follows_attribute() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let el = element(&mut doc);
        doc.set_attribute(el, "id", "main").unwrap();
        assert_eq!(doc.get_element_by_id("main"), None);

        doc.append_child(body, el).unwrap();
        assert_eq!(doc.get_element_by_id("main"), Some(el));

        doc.set_attribute(el, "id", "other").unwrap();
        assert_eq!(doc.get_element_by_id("main"), None);
        assert_eq!(doc.get_element_by_id("other"), Some(el));
    }
}
