//! Edge case tests for xsml-dom
//!
//! Boundary conditions around ids, names, shadow roots, cloning, character
//! data and detached subtrees.

use xsml_dom::{
    BoundaryPoint, CustomElementState, DefinitionOptions, Document, DocumentConfig, DocumentKind,
    DomError, MutationObserverInit, NodeId, ShadowRootInit, ShadowRootMode, SlotAssignmentMode,
};

// ============================================================================
// ID INDEX
// ============================================================================

#[test]
fn test_duplicate_ids_resolve_in_tree_order() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let late = doc.create_element("div").unwrap();
    let early = doc.create_element("div").unwrap();
    doc.set_attribute(late, "id", "dup").unwrap();
    doc.set_attribute(early, "id", "dup").unwrap();
    doc.append_child(body, late).unwrap();
    doc.insert_before(body, early, Some(late)).unwrap();

    assert_eq!(doc.get_element_by_id("dup"), Some(early));
    doc.remove_child(body, early).unwrap();
    assert_eq!(doc.get_element_by_id("dup"), Some(late));
    doc.set_attribute(late, "id", "renamed").unwrap();
    assert_eq!(doc.get_element_by_id("dup"), None);
    assert_eq!(doc.get_element_by_id("renamed"), Some(late));
    assert_eq!(doc.get_element_by_id(""), None);
}

#[test]
fn test_ids_inside_shadow_trees_are_not_document_ids() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let host = doc.create_element("div").unwrap();
    doc.append_child(body, host).unwrap();
    let shadow = doc.attach_shadow(host, ShadowRootInit::default()).unwrap();
    let hidden = doc.create_element("span").unwrap();
    doc.set_attribute(hidden, "id", "inner").unwrap();
    doc.append_child(shadow, hidden).unwrap();

    assert!(doc.node(hidden).is_connected());
    assert_eq!(doc.get_element_by_id("inner"), None);
}

// ============================================================================
// NAMES AND CREATION
// ============================================================================

#[test]
fn test_invalid_names_rejected() {
    let mut doc = Document::new("about:blank");
    assert!(matches!(doc.create_element(""), Err(DomError::InvalidCharacter(_))));
    assert!(matches!(doc.create_element("1abc"), Err(DomError::InvalidCharacter(_))));
    assert!(matches!(doc.create_attribute("a b"), Err(DomError::InvalidCharacter(_))));
    let body = doc.body().unwrap();
    assert!(matches!(doc.set_attribute(body, "=", "x"), Err(DomError::InvalidCharacter(_))));
}

#[test]
fn test_namespace_rules() {
    let mut doc = Document::new("about:blank");
    assert!(matches!(
        doc.create_element_ns(None, "svg:rect"),
        Err(DomError::NotSupported(_))
    ));
    let svg = doc
        .create_element_ns(Some("http://www.w3.org/2000/svg"), "svg:rect")
        .unwrap();
    let data = doc.node(svg).as_element().unwrap();
    assert_eq!(data.prefix.as_deref(), Some("svg"));
    assert_eq!(data.local_name, "rect");
    assert!(!data.is_html());
}

#[test]
fn test_xml_documents_keep_case() {
    let config = DocumentConfig {
        kind: DocumentKind::Xml,
        ..DocumentConfig::default()
    };
    let mut doc = Document::with_config(config);
    let el = doc.create_element("Entity").unwrap();
    assert_eq!(doc.node(el).as_element().unwrap().local_name, "Entity");
    assert!(!doc.is_html());
}

// ============================================================================
// SHADOW ROOTS
// ============================================================================

#[test]
fn test_attach_shadow_rejections() {
    let mut doc = Document::new("about:blank");
    let img = doc.create_element("img").unwrap();
    assert!(matches!(
        doc.attach_shadow(img, ShadowRootInit::default()),
        Err(DomError::NotSupported(_))
    ));

    let panel = doc.create_element("x-panel").unwrap();
    doc.attach_shadow(panel, ShadowRootInit::default()).unwrap();
    assert!(matches!(
        doc.attach_shadow(panel, ShadowRootInit::default()),
        Err(DomError::NotSupported(_))
    ));

    doc.define("x-flat", DefinitionOptions::new().disable_shadow()).unwrap();
    let flat = doc.create_element("x-flat").unwrap();
    assert!(doc.attach_shadow(flat, ShadowRootInit::default()).is_err());
}

#[test]
fn test_closed_shadow_root_and_composed_root() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let host = doc.create_element("section").unwrap();
    doc.append_child(body, host).unwrap();
    let init = ShadowRootInit {
        mode: ShadowRootMode::Closed,
        ..Default::default()
    };
    let shadow = doc.attach_shadow(host, init).unwrap();
    let inner = doc.create_element("div").unwrap();
    doc.append_child(shadow, inner).unwrap();

    assert_eq!(doc.shadow_root(host), None);
    assert_eq!(doc.get_root_node(inner, false), shadow);
    assert_eq!(doc.get_root_node(inner, true), doc.root());
    assert!(!doc.contains(body, inner));
}

#[test]
fn test_clone_rejects_shadow_root_and_document() {
    let mut doc = Document::new("about:blank");
    let host = doc.create_element("div").unwrap();
    let shadow = doc.attach_shadow(host, ShadowRootInit::default()).unwrap();
    assert!(matches!(doc.clone_node(shadow, true), Err(DomError::InvalidState(_))));
    let root = doc.root();
    assert!(matches!(doc.clone_node(root, false), Err(DomError::NotSupported(_))));
}

#[test]
fn test_manual_slot_assignment() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let host = doc.create_element("div").unwrap();
    doc.append_child(body, host).unwrap();
    let init = ShadowRootInit {
        slot_assignment: SlotAssignmentMode::Manual,
        ..Default::default()
    };
    let shadow = doc.attach_shadow(host, init).unwrap();
    let first_slot = doc.create_element("slot").unwrap();
    let second_slot = doc.create_element("slot").unwrap();
    doc.append(shadow, vec![first_slot.into(), second_slot.into()]).unwrap();

    let a = doc.create_element("span").unwrap();
    let b = doc.create_element("span").unwrap();
    doc.set_attribute(b, "slot", "ignored-in-manual-mode").unwrap();
    doc.append(host, vec![a.into(), b.into()]).unwrap();
    assert!(doc.assigned_nodes(first_slot).is_empty());

    doc.assign_slot_manually(first_slot, &[b, a]).unwrap();
    assert_eq!(doc.assigned_nodes(first_slot), vec![b, a]);

    doc.assign_slot_manually(second_slot, &[a]).unwrap();
    assert_eq!(doc.assigned_nodes(first_slot), vec![b]);
    assert_eq!(doc.assigned_nodes(second_slot), vec![a]);

    assert!(matches!(doc.assign_slot_manually(host, &[a]), Err(DomError::Type(_))));
}

// ============================================================================
// CLONING AND CONTENT
// ============================================================================

#[test]
fn test_deep_clone_copies_attributes_and_children() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let original = doc.create_element("div").unwrap();
    doc.set_attribute(original, "class", "card").unwrap();
    doc.set_attribute(original, "id", "orig").unwrap();
    doc.append(original, vec!["label".into()]).unwrap();
    doc.append_child(body, original).unwrap();

    let shallow = doc.clone_node(original, false).unwrap();
    assert!(doc.tree().children_vec(shallow).is_empty());

    let deep = doc.clone_node(original, true).unwrap();
    assert_eq!(doc.get_attribute(deep, "class").as_deref(), Some("card"));
    assert_eq!(doc.text_content(deep).as_deref(), Some("label"));
    assert_eq!(doc.node(deep).parent(), None);
    assert_eq!(doc.get_element_by_id("orig"), Some(original));

    let source_attr = doc.get_attribute_node(original, "class").unwrap();
    let cloned_attr = doc.get_attribute_node(deep, "class").unwrap();
    assert_ne!(source_attr, cloned_attr);
}

#[test]
fn test_clone_of_defined_custom_element_upgrades() {
    let mut doc = Document::new("about:blank");
    doc.define("x-orb", DefinitionOptions::new()).unwrap();
    let orb = doc.create_element("x-orb").unwrap();
    doc.run_deferred();
    let copy = doc.clone_node(orb, false).unwrap();
    doc.run_deferred();
    assert_eq!(
        doc.node(copy).as_element().unwrap().custom_state(),
        CustomElementState::Custom
    );
}

#[test]
fn test_set_text_content_replaces_children() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let div = doc.create_element("div").unwrap();
    doc.append(div, vec!["a".into(), "b".into()]).unwrap();
    doc.append_child(body, div).unwrap();
    assert_eq!(doc.text_content(div).as_deref(), Some("ab"));

    doc.set_text_content(div, Some("fresh")).unwrap();
    assert_eq!(doc.tree().children_vec(div).len(), 1);
    assert_eq!(doc.text_content(div).as_deref(), Some("fresh"));

    doc.set_text_content(div, None).unwrap();
    assert!(doc.tree().children_vec(div).is_empty());
    assert_eq!(doc.text_content(doc.root()), None);
}

// ============================================================================
// CHARACTER DATA AND RANGES
// ============================================================================

#[test]
fn test_splice_shifts_ranges_after_span() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let text = doc.create_text_node("0123456789");
    doc.append_child(body, text).unwrap();
    let range = doc
        .create_range_with(BoundaryPoint::new(text, 1), BoundaryPoint::new(text, 9))
        .unwrap();

    doc.insert_data(text, 4, "abc").unwrap();
    let bounds = doc.range_bounds(range).unwrap();
    assert_eq!((bounds.start.offset, bounds.end.offset), (1, 12));

    doc.delete_data(text, 0, 2).unwrap();
    let bounds = doc.range_bounds(range).unwrap();
    assert_eq!((bounds.start.offset, bounds.end.offset), (0, 10));

    assert!(matches!(doc.substring_data(text, 99, 1), Err(DomError::IndexSize)));
    assert!(matches!(doc.set_start(range, text, 99), Err(DomError::IndexSize)));
}

#[test]
fn test_character_data_records_only_reach_interested_observers() {
    let mut doc = Document::new("about:blank");
    let body = doc.body().unwrap();
    let text = doc.create_text_node("x");
    doc.append_child(body, text).unwrap();
    let structural = doc.create_mutation_observer(|_, _, _| Ok(()));
    let init = MutationObserverInit {
        child_list: true,
        subtree: true,
        ..Default::default()
    };
    doc.observe(structural, body, init).unwrap();

    doc.append_data(text, "y").unwrap();
    assert!(doc.take_records(structural).is_empty());
    assert_eq!(doc.data(text), Some("xy"));
}

// ============================================================================
// DETACHED SUBTREES
// ============================================================================

#[test]
fn test_detached_subtree_collections() {
    let mut doc = Document::new("about:blank");
    let orphan = doc.create_element("div").unwrap();
    let kids: Vec<NodeId> = (0..3).map(|_| doc.create_element("p").unwrap()).collect();
    doc.append(orphan, kids.iter().map(|&k| k.into()).collect()).unwrap();

    let ps = doc.get_elements_by_tag_name(orphan, "p").unwrap();
    assert_eq!(ps.length(&doc), 3);
    doc.remove_self(kids[1]);
    assert_eq!(ps.snapshot(&doc).to_vec(), vec![kids[0], kids[2]]);
    assert!(!doc.node(orphan).is_connected());
    assert_eq!(doc.query_selector(orphan, "p").unwrap(), Some(kids[0]));
}

#[test]
fn test_remove_parentless_node_is_noop() {
    let mut doc = Document::new("about:blank");
    let lone = doc.create_element("div").unwrap();
    let version = doc.node(lone).version();
    doc.remove_self(lone);
    assert_eq!(doc.node(lone).version(), version);
    assert!(doc.before(lone, vec!["ignored".into()]).is_ok());
}

#[test]
fn test_toggle_attribute_force() {
    let mut doc = Document::new("about:blank");
    let el = doc.create_element("div").unwrap();
    assert!(doc.toggle_attribute(el, "hidden", Some(true)).unwrap());
    assert!(doc.toggle_attribute(el, "hidden", Some(true)).unwrap());
    assert!(!doc.toggle_attribute(el, "hidden", None).unwrap());
    assert!(!doc.has_attribute(el, "hidden"));
    assert!(!doc.toggle_attribute(el, "hidden", Some(false)).unwrap());
}
