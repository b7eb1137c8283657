//! Text and Comment payload editing
//!
//! Offsets and counts are UTF-16 code units. A splice that would cut a
//! surrogate pair in half stores U+FFFD in its place, since Rust strings
//! cannot hold a lone surrogate.

use crate::NodeId;
use crate::document::Document;
use crate::error::{DomError, DomResult};
use crate::node::utf16_len;

impl Document {
    /// Payload of a Text or Comment node
    pub fn data(&self, node: NodeId) -> Option<&str> {
        self.tree.get(node)?.character_data()
    }

    /// Replace `count` code units at `offset` with `data`
    pub fn replace_data(&mut self, node: NodeId, offset: usize, count: usize, data: &str) -> DomResult<()> {
        let old = self
            .tree
            .get(node)
            .and_then(|n| n.character_data())
            .ok_or_else(|| DomError::Type("not a character data node".to_string()))?
            .to_string();
        let length = utf16_len(&old);
        if offset > length {
            return Err(DomError::IndexSize);
        }
        let count = count.min(length - offset);

        self.queue_character_data_mutation_record(node, &old);

        let mut units: Vec<u16> = old.encode_utf16().collect();
        let inserted: Vec<u16> = data.encode_utf16().collect();
        let inserted_len = inserted.len();
        units.splice(offset..offset + count, inserted);
        let spliced = String::from_utf16_lossy(&units);
        if let Some(payload) = self.tree.node_mut(node).character_data_mut() {
            *payload = spliced;
        }

        self.ranges.adjust_for_splice(node, offset, count, inserted_len);
        tracing::trace!(node = node.index(), offset, count, inserted = inserted_len, "character data spliced");
        Ok(())
    }

    pub fn append_data(&mut self, node: NodeId, data: &str) -> DomResult<()> {
        let length = self.character_length(node)?;
        self.replace_data(node, length, 0, data)
    }

    pub fn insert_data(&mut self, node: NodeId, offset: usize, data: &str) -> DomResult<()> {
        self.replace_data(node, offset, 0, data)
    }

    pub fn delete_data(&mut self, node: NodeId, offset: usize, count: usize) -> DomResult<()> {
        self.replace_data(node, offset, count, "")
    }

    /// Replace the whole payload
    pub fn set_data(&mut self, node: NodeId, data: &str) -> DomResult<()> {
        let length = self.character_length(node)?;
        self.replace_data(node, 0, length, data)
    }

    pub fn substring_data(&self, node: NodeId, offset: usize, count: usize) -> DomResult<String> {
        let data = self
            .data(node)
            .ok_or_else(|| DomError::Type("not a character data node".to_string()))?;
        let units: Vec<u16> = data.encode_utf16().collect();
        if offset > units.len() {
            return Err(DomError::IndexSize);
        }
        let end = offset.saturating_add(count).min(units.len());
        Ok(String::from_utf16_lossy(&units[offset..end]))
    }

    fn character_length(&self, node: NodeId) -> DomResult<usize> {
        self.data(node)
            .map(utf16_len)
            .ok_or_else(|| DomError::Type("not a character data node".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{MutationObserverInit, MutationType};

    #[test]
    fn test_splice_operations() {
        let mut doc = Document::new("about:blank");
        let text = doc.create_text_node("hello world");
        doc.replace_data(text, 0, 5, "howdy").unwrap();
        assert_eq!(doc.data(text), Some("howdy world"));
        doc.delete_data(text, 5, 100).unwrap();
        assert_eq!(doc.data(text), Some("howdy"));
        doc.append_data(text, "!").unwrap();
        doc.insert_data(text, 0, ">").unwrap();
        assert_eq!(doc.data(text), Some(">howdy!"));
        assert_eq!(doc.substring_data(text, 1, 5).unwrap(), "howdy");
        assert_eq!(doc.replace_data(text, 8, 0, "x"), Err(DomError::IndexSize));
        doc.set_data(text, "").unwrap();
        assert_eq!(doc.data(text), Some(""));
    }

    #[test]
    fn test_offsets_are_utf16() {
        let mut doc = Document::new("about:blank");
        let text = doc.create_text_node("a\u{1F600}b");
        assert_eq!(doc.node(text).length(), 4);
        doc.delete_data(text, 1, 2).unwrap();
        assert_eq!(doc.data(text), Some("ab"));
    }

    #[test]
    fn test_rejects_elements() {
        let mut doc = Document::new("about:blank");
        let div = doc.create_element("div").unwrap();
        assert!(matches!(doc.append_data(div, "x"), Err(DomError::Type(_))));
    }

    #[test]
    fn test_record_carries_old_value() {
        let mut doc = Document::new("about:blank");
        let body = doc.body().unwrap();
        let text = doc.create_text_node("before");
        doc.append_child(body, text).unwrap();
        let observer = doc.create_mutation_observer(|_, _, _| Ok(()));
        let init = MutationObserverInit {
            character_data_old_value: true,
            subtree: true,
            ..Default::default()
        };
        doc.observe(observer, body, init).unwrap();

        doc.set_data(text, "after").unwrap();
        let records = doc.take_records(observer);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mutation_type, MutationType::CharacterData);
        assert_eq!(records[0].old_value.as_deref(), Some("before"));
    }

    #[test]
    fn test_range_collapses_into_deleted_span() {
        let mut doc = Document::new("about:blank");
        let text = doc.create_text_node("abcdefgh");
        let start = crate::range::BoundaryPoint::new(text, 3);
        let end = crate::range::BoundaryPoint::new(text, 7);
        let range = doc.create_range_with(start, end).unwrap();

        doc.replace_data(text, 2, 3, "X").unwrap();
        let bounds = doc.range_bounds(range).unwrap();
        assert_eq!(bounds.start.offset, 2);
        assert_eq!(bounds.end.offset, 5);
    }
}
