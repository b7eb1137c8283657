//! Selector matching capability
//!
//! The tree never matches selectors itself; `query_selector` and friends
//! delegate to whatever [`SelectorMatcher`] the host installs. The built-in
//! matcher understands compound selectors made of a tag, `#id`, `.class`
//! and `*`.

use crate::NodeId;
use crate::document::{Document, ensure_exists};
use crate::error::{DomError, DomResult};
use crate::tree::DomTree;

/// Selector engine consumed by the query helpers
pub trait SelectorMatcher {
    /// Check if element matches selector
    fn matches(&self, tree: &DomTree, element: NodeId, selector: &str) -> DomResult<bool>;

    /// Descendant elements of `root` matching selector, in tree order
    fn query(&self, tree: &DomTree, root: NodeId, selector: &str) -> DomResult<Vec<NodeId>> {
        let mut out = Vec::new();
        for id in tree.descendants(root) {
            if tree.node(id).is_element() && self.matches(tree, id, selector)? {
                out.push(id);
            }
        }
        Ok(out)
    }
}

/// Simple selector component
#[derive(Debug, Clone, PartialEq, Eq)]
enum SimpleSelector {
    Tag(String),
    Class(String),
    Id(String),
    Universal,
}

/// Split a compound selector such as `div.card#main`
fn parse_compound(selector: &str) -> DomResult<Vec<SimpleSelector>> {
    let s = selector.trim();
    let invalid = || DomError::Syntax(format!("unsupported selector '{}'", selector));
    if s.is_empty() || s.contains(|c: char| c.is_whitespace() || matches!(c, ',' | '>' | '+' | '~' | '[' | ':')) {
        return Err(invalid());
    }

    let mut parts = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        let (kind, body) = match rest.as_bytes()[0] {
            b'#' => ('#', &rest[1..]),
            b'.' => ('.', &rest[1..]),
            b'*' => ('*', &rest[1..]),
            _ => ('t', rest),
        };
        let end = body.find(['#', '.', '*']).unwrap_or(body.len());
        let name = &body[..end];
        let part = match kind {
            '*' => SimpleSelector::Universal,
            _ if name.is_empty() => return Err(invalid()),
            '#' => SimpleSelector::Id(name.to_string()),
            '.' => SimpleSelector::Class(name.to_string()),
            _ => SimpleSelector::Tag(name.to_ascii_lowercase()),
        };
        parts.push(part);
        rest = if kind == '*' { body } else { &body[end..] };
    }
    Ok(parts)
}

/// Built-in matcher for tag, `#id`, `.class` and `*`
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleSelectorMatcher;

impl SelectorMatcher for SimpleSelectorMatcher {
    fn matches(&self, tree: &DomTree, element: NodeId, selector: &str) -> DomResult<bool> {
        let parts = parse_compound(selector)?;
        let Some(data) = tree.get(element).and_then(|n| n.as_element()) else {
            return Ok(false);
        };
        Ok(parts.iter().all(|part| match part {
            SimpleSelector::Universal => true,
            SimpleSelector::Tag(tag) => data.local_name.eq_ignore_ascii_case(tag),
            SimpleSelector::Id(id) => tree.attribute_value(element, "id") == Some(id.as_str()),
            SimpleSelector::Class(class) => tree
                .attribute_value(element, "class")
                .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class)),
        }))
    }
}

impl Document {
    /// First descendant of `root` matching `selector`
    pub fn query_selector(&self, root: NodeId, selector: &str) -> DomResult<Option<NodeId>> {
        ensure_exists(self, root)?;
        Ok(self
            .selector_matcher
            .query(&self.tree, root, selector)?
            .into_iter()
            .next())
    }

    /// Static list of descendants of `root` matching `selector`
    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> DomResult<Vec<NodeId>> {
        ensure_exists(self, root)?;
        self.selector_matcher.query(&self.tree, root, selector)
    }

    pub fn matches(&self, element: NodeId, selector: &str) -> DomResult<bool> {
        ensure_exists(self, element)?;
        self.selector_matcher.matches(&self.tree, element, selector)
    }

    /// Nearest inclusive ancestor element matching `selector`
    pub fn closest(&self, element: NodeId, selector: &str) -> DomResult<Option<NodeId>> {
        ensure_exists(self, element)?;
        for id in self.tree.inclusive_ancestors(element) {
            if self.tree.node(id).is_element() && self.selector_matcher.matches(&self.tree, id, selector)? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse_compound("div").unwrap(), vec![SimpleSelector::Tag("div".to_string())]);
        assert_eq!(
            parse_compound("a-frame.box#main").unwrap(),
            vec![
                SimpleSelector::Tag("a-frame".to_string()),
                SimpleSelector::Class("box".to_string()),
                SimpleSelector::Id("main".to_string()),
            ]
        );
        assert_eq!(parse_compound("*").unwrap(), vec![SimpleSelector::Universal]);
        assert!(parse_compound("").is_err());
        assert!(parse_compound("div > p").is_err());
        assert!(parse_compound("#").is_err());
    }

    #[test]
    fn test_query_and_closest() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let outer = doc.create_element("section").unwrap();
        doc.set_attribute(outer, "class", "card wide").unwrap();
        let inner = doc.create_element("span").unwrap();
        doc.set_attribute(inner, "id", "label").unwrap();
        doc.append_child(outer, inner).unwrap();
        doc.append_child(body, outer).unwrap();

        assert_eq!(doc.query_selector(body, ".wide").unwrap(), Some(outer));
        assert_eq!(doc.query_selector(body, "span#label").unwrap(), Some(inner));
        assert_eq!(doc.query_selector_all(body, "*").unwrap(), vec![outer, inner]);
        assert_eq!(doc.closest(inner, ".card").unwrap(), Some(outer));
        assert!(doc.matches(inner, "#label").unwrap());
        assert!(matches!(doc.matches(inner, "a b"), Err(DomError::Syntax(_))));
    }
}
