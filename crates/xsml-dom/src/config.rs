//! Document configuration

use serde::{Deserialize, Serialize};

/// Kind of document, controls name case folding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Html,
    Xml,
}

/// Options a host passes when creating a [`Document`](crate::Document)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Document URL
    pub url: String,
    /// HTML documents lowercase names given to name-based APIs
    pub kind: DocumentKind,
    /// When false, definitions are recorded but never upgrade elements
    pub scripting_enabled: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
            kind: DocumentKind::Html,
            scripting_enabled: true,
        }
    }
}

impl DocumentConfig {
    pub fn is_html(&self) -> bool {
        self.kind == DocumentKind::Html
    }
}
