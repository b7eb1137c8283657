//! Live collections
//!
//! A `LiveCollection` re-derives its members from the tree. The result is
//! cached together with the anchor's version and recomputed in one step on
//! the first read after the anchor's subtree changed, so readers only ever
//! see a whole snapshot.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::NodeId;
use crate::document::{Document, ensure_exists};
use crate::error::DomResult;
use crate::generation::Cached;
use crate::node::HTML_NS;
use crate::tree::DomTree;

/// Predicate for a custom collection: `(tree, candidate) -> included`
pub type CollectionPredicate = Rc<dyn Fn(&DomTree, NodeId) -> bool>;

/// What a collection selects relative to its anchor
#[derive(Clone)]
pub enum CollectionQuery {
    /// Every child
    ChildNodes,
    /// Element children
    Children,
    /// Descendant elements by qualified name, `*` for all
    TagName(String),
    /// Descendant elements carrying every class token
    ClassName(Vec<String>),
    /// Descendant elements whose `name` attribute equals the value
    Name(String),
    /// Descendants accepted by a predicate
    Custom(CollectionPredicate),
}

impl fmt::Debug for CollectionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChildNodes => write!(f, "ChildNodes"),
            Self::Children => write!(f, "Children"),
            Self::TagName(name) => f.debug_tuple("TagName").field(name).finish(),
            Self::ClassName(tokens) => f.debug_tuple("ClassName").field(tokens).finish(),
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Versioned read-through cache over a tree query
#[derive(Debug)]
pub struct LiveCollection {
    anchor: NodeId,
    query: CollectionQuery,
    /// HTML documents match HTML elements by lowercased tag name
    html_document: bool,
    cache: RefCell<Cached<Rc<[NodeId]>>>,
}

impl LiveCollection {
    pub fn new(doc: &Document, anchor: NodeId, query: CollectionQuery) -> DomResult<Self> {
        ensure_exists(doc, anchor)?;
        Ok(Self {
            anchor,
            query,
            html_document: doc.is_html(),
            cache: RefCell::new(Cached::stale(Rc::from(Vec::new()))),
        })
    }

    pub fn anchor(&self) -> NodeId {
        self.anchor
    }

    pub fn query(&self) -> &CollectionQuery {
        &self.query
    }

    /// Current members, recomputed if the anchor changed since the last read
    pub fn snapshot(&self, doc: &Document) -> Rc<[NodeId]> {
        let tree = doc.tree();
        let current = tree.node(self.anchor).version();
        if let Some(members) = self.cache.borrow().get_if_valid(current) {
            return Rc::clone(members);
        }
        let members: Rc<[NodeId]> = Rc::from(self.compute(tree));
        self.cache.borrow_mut().update(Rc::clone(&members), current);
        members
    }

    pub fn length(&self, doc: &Document) -> usize {
        self.snapshot(doc).len()
    }

    pub fn is_empty(&self, doc: &Document) -> bool {
        self.snapshot(doc).is_empty()
    }

    pub fn item(&self, doc: &Document, index: usize) -> Option<NodeId> {
        self.snapshot(doc).get(index).copied()
    }

    /// First element whose `id` matches, or whose `name` matches for HTML elements
    pub fn named_item(&self, doc: &Document, key: &str) -> Option<NodeId> {
        if key.is_empty() {
            return None;
        }
        let tree = doc.tree();
        self.snapshot(doc).iter().copied().find(|&id| {
            let Some(element) = tree.node(id).as_element() else {
                return false;
            };
            tree.attribute_value(id, "id") == Some(key)
                || (element.is_html() && tree.attribute_value(id, "name") == Some(key))
        })
    }

    /// Iterate over the current snapshot
    pub fn iter(&self, doc: &Document) -> impl Iterator<Item = NodeId> {
        let members = self.snapshot(doc);
        (0..members.len()).map(move |i| members[i])
    }

    fn compute(&self, tree: &DomTree) -> Vec<NodeId> {
        match &self.query {
            CollectionQuery::ChildNodes => tree.children_vec(self.anchor),
            CollectionQuery::Children => tree
                .children(self.anchor)
                .filter(|&id| tree.node(id).is_element())
                .collect(),
            CollectionQuery::TagName(name) => self.collect_descendants(tree, |id| self.tag_matches(tree, id, name)),
            CollectionQuery::ClassName(tokens) => {
                if tokens.is_empty() {
                    return Vec::new();
                }
                self.collect_descendants(tree, |id| {
                    let classes = tree.attribute_value(id, "class").unwrap_or("");
                    tokens
                        .iter()
                        .all(|token| classes.split_ascii_whitespace().any(|c| c == token))
                })
            }
            CollectionQuery::Name(name) => {
                self.collect_descendants(tree, |id| tree.attribute_value(id, "name") == Some(name.as_str()))
            }
            CollectionQuery::Custom(predicate) => tree
                .descendants(self.anchor)
                .filter(|&id| predicate(tree, id))
                .collect(),
        }
    }

    fn collect_descendants(&self, tree: &DomTree, mut accept: impl FnMut(NodeId) -> bool) -> Vec<NodeId> {
        tree.descendants(self.anchor)
            .filter(|&id| tree.node(id).is_element() && accept(id))
            .collect()
    }

    fn tag_matches(&self, tree: &DomTree, id: NodeId, name: &str) -> bool {
        if name == "*" {
            return true;
        }
        let Some(element) = tree.node(id).as_element() else {
            return false;
        };
        let qualified = element.qualified_name();
        if self.html_document && element.namespace.as_deref() == Some(HTML_NS) {
            qualified == name.to_ascii_lowercase()
        } else {
            qualified == name
        }
    }
}

impl Document {
    pub fn child_nodes(&self, node: NodeId) -> DomResult<LiveCollection> {
        LiveCollection::new(self, node, CollectionQuery::ChildNodes)
    }

    pub fn children(&self, node: NodeId) -> DomResult<LiveCollection> {
        LiveCollection::new(self, node, CollectionQuery::Children)
    }

    pub fn get_elements_by_tag_name(&self, root: NodeId, qualified_name: &str) -> DomResult<LiveCollection> {
        LiveCollection::new(self, root, CollectionQuery::TagName(qualified_name.to_string()))
    }

    /// Elements carrying every whitespace-separated token of `class_names`
    pub fn get_elements_by_class_name(&self, root: NodeId, class_names: &str) -> DomResult<LiveCollection> {
        let tokens = class_names.split_ascii_whitespace().map(str::to_string).collect();
        LiveCollection::new(self, root, CollectionQuery::ClassName(tokens))
    }

    /// Document-wide lookup by `name` attribute
    pub fn get_elements_by_name(&self, name: &str) -> DomResult<LiveCollection> {
        LiveCollection::new(self, self.root(), CollectionQuery::Name(name.to_string()))
    }

    pub fn collection(&self, anchor: NodeId, query: CollectionQuery) -> DomResult<LiveCollection> {
        LiveCollection::new(self, anchor, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_stays_fresh() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let children = doc.children(body).unwrap();
        assert_eq!(children.length(&doc), 0);

        let div = doc.create_element("div").unwrap();
        doc.append_child(body, div).unwrap();
        let text = doc.create_text_node("x");
        doc.append_child(body, text).unwrap();
        assert_eq!(children.length(&doc), 1);
        assert_eq!(children.item(&doc, 0), Some(div));
        assert_eq!(doc.child_nodes(body).unwrap().length(&doc), 2);
    }

    #[test]
    fn test_snapshot_reused_until_change() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let all = doc.get_elements_by_tag_name(body, "*").unwrap();
        let first = all.snapshot(&doc);
        let second = all.snapshot(&doc);
        assert!(Rc::ptr_eq(&first, &second));

        let div = doc.create_element("div").unwrap();
        doc.append_child(body, div).unwrap();
        let third = all.snapshot(&doc);
        assert!(!Rc::ptr_eq(&first, &third));
        assert!(first.is_empty());
        assert_eq!(&third[..], &[div]);
    }

    #[test]
    fn test_class_name_tracks_attribute_changes() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let div = doc.create_element("div").unwrap();
        doc.append_child(body, div).unwrap();
        let cards = doc.get_elements_by_class_name(body, "card  big").unwrap();
        assert!(cards.is_empty(&doc));

        doc.set_attribute(div, "class", "big card").unwrap();
        assert_eq!(cards.item(&doc, 0), Some(div));
        assert!(doc.get_elements_by_class_name(body, "  ").unwrap().is_empty(&doc));
    }

    #[test]
    fn test_named_item_takes_first_match_in_order() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let named = doc.create_element("input").unwrap();
        doc.set_attribute(named, "name", "key").unwrap();
        let with_id = doc.create_element("div").unwrap();
        doc.set_attribute(with_id, "id", "key").unwrap();
        doc.append(body, vec![named.into(), with_id.into()]).unwrap();

        let children = doc.children(body).unwrap();
        assert_eq!(children.named_item(&doc, "key"), Some(named));
        assert_eq!(doc.get_elements_by_name("key").unwrap().item(&doc, 0), Some(named));

        doc.remove_attribute(named, "name");
        assert_eq!(children.named_item(&doc, "key"), Some(with_id));
    }

    #[test]
    fn test_tag_name_case_folding() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let el = doc.create_element("a-frame").unwrap();
        doc.append_child(body, el).unwrap();
        assert_eq!(doc.get_elements_by_tag_name(body, "A-FRAME").unwrap().length(&doc), 1);
    }
}
