//! XSML DOM - Document tree engine
//!
//! Arena-allocated node tree for spatial documents:
//! - Validated insert/remove/replace as the single mutation choke point
//! - Live ranges, live collections and per-node version counters
//! - Shadow roots with slot assignment
//! - Mutation observers and custom element reactions delivered in an
//!   explicit deferred phase ([`Document::run_deferred`])

mod attributes;
mod character_data;
mod collection;
mod config;
mod custom_elements;
mod document;
mod error;
mod generation;
mod microtask;
mod mutation;
mod names;
mod node;
mod observer;
mod query;
mod range;
mod shadow;
mod tree;

pub use attributes::AttributeStore;
pub use collection::{CollectionPredicate, CollectionQuery, LiveCollection};
pub use config::{DocumentConfig, DocumentKind};
pub use custom_elements::{
    AttributeChangedCallback, ConstructorCallback, CustomElementDefinition, CustomElementState,
    DefinitionOptions, ElementCallback, LifecycleCallback, Reaction, WhenDefinedCallback,
    is_valid_custom_element_name,
};
pub use document::{Document, ErrorSource, ReportedError, SceneBinding, SlotChangeHandler};
pub use error::{DomError, DomResult};
pub use generation::{Cached, Generation};
pub use microtask::Microtask;
pub use mutation::NodeOrText;
pub use node::{
    AttrData, DocumentTypeData, ElementData, FragmentData, HTML_NS, Node, NodeData, NodeType, XML_NS,
    XMLNS_NS,
};
pub use observer::{MutationCallback, MutationObserverInit, MutationRecord, MutationType, ObserverId};
pub use query::{SelectorMatcher, SimpleSelectorMatcher};
pub use range::{BoundaryPoint, RangeBoundaries, RangeId, RangeOrdering};
pub use shadow::{ShadowRootData, ShadowRootInit, ShadowRootMode, SlotAssignmentMode};
pub use tree::{Ancestors, Children, DomTree, TreeIter};

/// Node ID in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
