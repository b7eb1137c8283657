//! DOM Observers
//!
//! MutationObserver registration, record queuing and the deferred
//! notification pass. Observers are numbered per document at creation and
//! always notified in that order.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::NodeId;
use crate::document::{Document, ErrorSource, ensure_exists};
use crate::error::{DomError, DomResult};
use crate::microtask::Microtask;

/// Observer handle, ordered by creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Callback receiving one batch of records
pub type MutationCallback = Rc<dyn Fn(&mut Document, &[MutationRecord], ObserverId) -> anyhow::Result<()>>;

/// Mutation observer options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
    pub attribute_old_value: bool,
    pub character_data_old_value: bool,
    pub attribute_filter: Option<Vec<String>>,
}

impl MutationObserverInit {
    /// Apply the implied flags and reject option sets that observe nothing
    fn normalize(mut self) -> DomResult<Self> {
        if self.attribute_old_value || self.attribute_filter.is_some() {
            self.attributes = true;
        }
        if self.character_data_old_value {
            self.character_data = true;
        }
        if !self.child_list && !self.attributes && !self.character_data {
            return Err(DomError::Type(
                "one of childList, attributes or characterData must be set".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Mutation record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub previous_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub attribute_name: Option<String>,
    pub attribute_namespace: Option<String>,
    pub old_value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Attributes,
    CharacterData,
    ChildList,
}

/// Registration of an observer on one node
#[derive(Debug, Clone)]
pub(crate) struct RegisteredObserver {
    pub(crate) observer: ObserverId,
    pub(crate) options: MutationObserverInit,
    /// Set for transient registrations left on removed nodes; the node the
    /// originating registration lives on
    pub(crate) transient_source: Option<NodeId>,
}

struct MutationObserver {
    callback: MutationCallback,
    /// Nodes holding a registration for this observer
    node_list: Vec<NodeId>,
    records: Vec<MutationRecord>,
}

/// Per-document observer registry and pending-notification state
#[derive(Default)]
pub(crate) struct MutationRecorder {
    next_id: u64,
    observers: HashMap<ObserverId, MutationObserver>,
    /// Observers with queued records, iterated in creation order
    pending: BTreeSet<ObserverId>,
    signal_slots: Vec<NodeId>,
    notify_queued: bool,
}

/// Parts of a record that vary by kind
struct RecordParts<'a> {
    name: Option<&'a str>,
    namespace: Option<&'a str>,
    old_value: Option<&'a str>,
    added: Vec<NodeId>,
    removed: Vec<NodeId>,
    previous_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl RecordParts<'_> {
    fn empty() -> Self {
        Self {
            name: None,
            namespace: None,
            old_value: None,
            added: Vec::new(),
            removed: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
        }
    }
}

impl Document {
    // --- Observer API ---

    pub fn create_mutation_observer<F>(&mut self, callback: F) -> ObserverId
    where
        F: Fn(&mut Document, &[MutationRecord], ObserverId) -> anyhow::Result<()> + 'static,
    {
        let id = ObserverId(self.recorder.next_id);
        self.recorder.next_id += 1;
        self.recorder.observers.insert(
            id,
            MutationObserver {
                callback: Rc::new(callback),
                node_list: Vec::new(),
                records: Vec::new(),
            },
        );
        id
    }

    /// Register `observer` on `target`; observing the same target again
    /// replaces the options
    pub fn observe(&mut self, observer: ObserverId, target: NodeId, options: MutationObserverInit) -> DomResult<()> {
        ensure_exists(self, target)?;
        if !self.recorder.observers.contains_key(&observer) {
            return Err(DomError::not_found("unknown mutation observer"));
        }
        let options = options.normalize()?;

        let mut replaced = false;
        for registered in &mut self.tree.node_mut(target).registered_observers {
            if registered.observer == observer && registered.transient_source.is_none() {
                registered.options = options.clone();
                replaced = true;
            }
        }

        if replaced {
            let nodes = self.observer_nodes(observer);
            for node in nodes {
                self.tree
                    .node_mut(node)
                    .registered_observers
                    .retain(|r| !(r.observer == observer && r.transient_source == Some(target)));
            }
        } else {
            self.tree.node_mut(target).registered_observers.push(RegisteredObserver {
                observer,
                options,
                transient_source: None,
            });
            self.track_observed_node(observer, target);
        }
        Ok(())
    }

    /// Unregister `observer` everywhere and drop its queued records
    pub fn disconnect(&mut self, observer: ObserverId) {
        for node in self.observer_nodes(observer) {
            self.tree
                .node_mut(node)
                .registered_observers
                .retain(|r| r.observer != observer);
        }
        if let Some(obs) = self.recorder.observers.get_mut(&observer) {
            obs.node_list.clear();
            obs.records.clear();
        }
    }

    /// Take the records queued for `observer` without waiting for delivery
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.recorder
            .observers
            .get_mut(&observer)
            .map(|obs| std::mem::take(&mut obs.records))
            .unwrap_or_default()
    }

    /// Slots signalled since the last deferred phase
    pub fn pending_slot_changes(&self) -> &[NodeId] {
        &self.recorder.signal_slots
    }

    fn observer_nodes(&self, observer: ObserverId) -> Vec<NodeId> {
        self.recorder
            .observers
            .get(&observer)
            .map(|obs| obs.node_list.clone())
            .unwrap_or_default()
    }

    fn track_observed_node(&mut self, observer: ObserverId, node: NodeId) {
        if let Some(obs) = self.recorder.observers.get_mut(&observer)
            && !obs.node_list.contains(&node)
        {
            obs.node_list.push(node);
        }
    }

    /// Keep subtree observers of the old ancestors watching a removed node
    /// until the next notification
    pub(crate) fn add_transient_observers(&mut self, node: NodeId, parent: NodeId) {
        let mut transient = Vec::new();
        for ancestor in self.tree.inclusive_ancestors(parent) {
            for registered in &self.tree.node(ancestor).registered_observers {
                if registered.options.subtree {
                    transient.push(RegisteredObserver {
                        observer: registered.observer,
                        options: registered.options.clone(),
                        transient_source: Some(registered.transient_source.unwrap_or(ancestor)),
                    });
                }
            }
        }
        for registered in transient {
            let observer = registered.observer;
            self.tree.node_mut(node).registered_observers.push(registered);
            self.track_observed_node(observer, node);
        }
    }

    // --- Queuing ---

    pub(crate) fn queue_tree_mutation_record(
        &mut self,
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
        previous_sibling: Option<NodeId>,
        next_sibling: Option<NodeId>,
    ) {
        debug_assert!(!added.is_empty() || !removed.is_empty());
        self.queue_mutation_record(
            MutationType::ChildList,
            target,
            RecordParts {
                added,
                removed,
                previous_sibling,
                next_sibling,
                ..RecordParts::empty()
            },
        );
    }

    pub(crate) fn queue_attribute_mutation_record(
        &mut self,
        target: NodeId,
        name: &str,
        namespace: Option<&str>,
        old_value: Option<&str>,
    ) {
        self.queue_mutation_record(
            MutationType::Attributes,
            target,
            RecordParts {
                name: Some(name),
                namespace,
                old_value,
                ..RecordParts::empty()
            },
        );
    }

    pub(crate) fn queue_character_data_mutation_record(&mut self, target: NodeId, old_value: &str) {
        self.queue_mutation_record(
            MutationType::CharacterData,
            target,
            RecordParts {
                old_value: Some(old_value),
                ..RecordParts::empty()
            },
        );
    }

    fn queue_mutation_record(&mut self, kind: MutationType, target: NodeId, parts: RecordParts<'_>) {
        // observer -> old value to report; first match wins, capture upgrades
        let mut interested: Vec<(ObserverId, Option<String>)> = Vec::new();
        for node in self.tree.inclusive_ancestors(target) {
            for registered in &self.tree.node(node).registered_observers {
                let options = &registered.options;
                if node != target && !options.subtree {
                    continue;
                }
                let matches = match kind {
                    MutationType::Attributes => {
                        options.attributes
                            && options.attribute_filter.as_ref().is_none_or(|filter| {
                                // Namespaced attributes never pass a filter
                                parts.namespace.is_none()
                                    && filter.iter().any(|value| Some(value.as_str()) == parts.name)
                            })
                    }
                    MutationType::CharacterData => options.character_data,
                    MutationType::ChildList => options.child_list,
                };
                if !matches {
                    continue;
                }
                let capture = match kind {
                    MutationType::Attributes => options.attribute_old_value,
                    MutationType::CharacterData => options.character_data_old_value,
                    MutationType::ChildList => false,
                };
                let entry = match interested.iter().position(|(id, _)| *id == registered.observer) {
                    Some(pos) => &mut interested[pos],
                    None => {
                        interested.push((registered.observer, None));
                        let last = interested.len() - 1;
                        &mut interested[last]
                    }
                };
                if capture {
                    entry.1 = parts.old_value.map(str::to_string);
                }
            }
        }

        if interested.is_empty() {
            return;
        }

        for (observer, old_value) in interested {
            let Some(obs) = self.recorder.observers.get_mut(&observer) else {
                continue;
            };
            obs.records.push(MutationRecord {
                mutation_type: kind,
                target,
                added_nodes: parts.added.clone(),
                removed_nodes: parts.removed.clone(),
                previous_sibling: parts.previous_sibling,
                next_sibling: parts.next_sibling,
                attribute_name: parts.name.map(str::to_string),
                attribute_namespace: parts.namespace.map(str::to_string),
                old_value,
            });
            self.recorder.pending.insert(observer);
        }
        tracing::trace!("Queued {:?} record for {:?}", kind, target);
        self.queue_mutation_observer_microtask();
    }

    /// Schedule one notification pass; further calls before it runs are no-ops
    pub(crate) fn queue_mutation_observer_microtask(&mut self) {
        if self.recorder.notify_queued {
            return;
        }
        self.recorder.notify_queued = true;
        self.microtasks.enqueue(Microtask::NotifyMutationObservers);
    }

    /// Mark `slot` for a slotchange signal in the next deferred phase
    pub(crate) fn signal_slot_change(&mut self, slot: NodeId) {
        if !self.recorder.signal_slots.contains(&slot) {
            self.recorder.signal_slots.push(slot);
        }
        self.queue_mutation_observer_microtask();
    }

    // --- Delivery ---

    pub(crate) fn notify_mutation_observers(&mut self) {
        self.recorder.notify_queued = false;
        let observers: Vec<ObserverId> = std::mem::take(&mut self.recorder.pending).into_iter().collect();
        let signal_set = std::mem::take(&mut self.recorder.signal_slots);
        tracing::debug!(
            "Notifying {} mutation observer(s), {} slot signal(s)",
            observers.len(),
            signal_set.len()
        );

        for observer in observers {
            let Some(obs) = self.recorder.observers.get_mut(&observer) else {
                continue;
            };
            let records = std::mem::take(&mut obs.records);
            let callback = Rc::clone(&obs.callback);
            let nodes = obs.node_list.clone();

            for node in nodes {
                self.tree
                    .node_mut(node)
                    .registered_observers
                    .retain(|r| !(r.observer == observer && r.transient_source.is_some()));
            }
            let tree = &self.tree;
            if let Some(obs) = self.recorder.observers.get_mut(&observer) {
                obs.node_list.retain(|&node| {
                    tree.node(node)
                        .registered_observers
                        .iter()
                        .any(|r| r.observer == observer)
                });
            }

            if !records.is_empty()
                && let Err(err) = callback(self, &records, observer)
            {
                self.report_error(ErrorSource::MutationObserver(observer), None, err);
            }
        }

        for slot in signal_set {
            tracing::debug!("slotchange at {:?}", slot);
            let result = match self.slotchange_handler.as_mut() {
                Some(handler) => handler(&self.tree, slot),
                None => Ok(()),
            };
            if let Err(err) = result {
                self.report_error(ErrorSource::SlotChange, Some(slot), err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recording_observer(doc: &mut Document) -> (ObserverId, Rc<RefCell<Vec<MutationRecord>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = doc.create_mutation_observer(move |_, records, _| {
            sink.borrow_mut().extend_from_slice(records);
            Ok(())
        });
        (id, seen)
    }

    #[test]
    fn test_option_normalization() {
        let init = MutationObserverInit {
            attribute_old_value: true,
            ..Default::default()
        };
        assert!(init.normalize().unwrap().attributes);
        assert!(matches!(
            MutationObserverInit::default().normalize(),
            Err(DomError::Type(_))
        ));
    }

    #[test]
    fn test_child_list_record() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let (observer, seen) = recording_observer(&mut doc);
        doc.observe(
            observer,
            body,
            MutationObserverInit {
                child_list: true,
                ..Default::default()
            },
        )
        .unwrap();

        let div = doc.create_element("div").unwrap();
        doc.append_child(body, div).unwrap();
        assert!(seen.borrow().is_empty());
        doc.run_deferred();

        let records = seen.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mutation_type, MutationType::ChildList);
        assert_eq!(records[0].added_nodes, vec![div]);
    }

    #[test]
    fn test_attribute_filter_and_old_value() {
        let mut doc = Document::new("about:blank");
        let div = doc.create_element("div").unwrap();
        let (observer, seen) = recording_observer(&mut doc);
        doc.observe(
            observer,
            div,
            MutationObserverInit {
                attribute_old_value: true,
                attribute_filter: Some(vec!["title".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();

        doc.set_attribute(div, "title", "a").unwrap();
        doc.set_attribute(div, "class", "x").unwrap();
        doc.set_attribute(div, "title", "b").unwrap();

        let records = doc.take_records(observer);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].old_value, None);
        assert_eq!(records[1].old_value.as_deref(), Some("a"));
        doc.run_deferred();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_transient_observer_sees_removed_subtree() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let outer = doc.create_element("div").unwrap();
        let inner = doc.create_element("span").unwrap();
        doc.append_child(outer, inner).unwrap();
        doc.append_child(body, outer).unwrap();

        let (observer, _) = recording_observer(&mut doc);
        doc.observe(
            observer,
            body,
            MutationObserverInit {
                attributes: true,
                subtree: true,
                ..Default::default()
            },
        )
        .unwrap();

        doc.remove_child(body, outer).unwrap();
        doc.set_attribute(inner, "x", "1").unwrap();
        let records = doc.take_records(observer);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, inner);

        // transient registrations end with the notification
        doc.run_deferred();
        doc.set_attribute(inner, "x", "2").unwrap();
        assert!(doc.take_records(observer).is_empty());
    }

    #[test]
    fn test_disconnect() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let (observer, seen) = recording_observer(&mut doc);
        doc.observe(
            observer,
            body,
            MutationObserverInit {
                child_list: true,
                ..Default::default()
            },
        )
        .unwrap();
        let text = doc.create_text_node("x");
        doc.append_child(body, text).unwrap();
        doc.disconnect(observer);
        doc.run_deferred();
        assert!(seen.borrow().is_empty());
    }
}
