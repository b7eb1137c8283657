//! XML name validation for element and attribute creation

use crate::error::{DomError, DomResult};
use crate::node::{XML_NS, XMLNS_NS};

fn is_name_start_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c) || c.is_ascii_digit() || c == '-' || c == '.'
}

/// Check `name` against the XML `Name` production
pub(crate) fn validate_name(name: &str) -> DomResult<()> {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) && chars.all(is_name_char) => Ok(()),
        _ => Err(DomError::InvalidCharacter(name.to_string())),
    }
}

/// `Name` with at most one colon that neither starts nor ends it
pub(crate) fn validate_qualified_name(name: &str) -> DomResult<()> {
    validate_name(name)?;
    let colons = name.matches(':').count();
    if colons > 1 || name.starts_with(':') || name.ends_with(':') {
        return Err(DomError::InvalidCharacter(name.to_string()));
    }
    Ok(())
}

/// Split a qualified name and check it against the namespace rules
pub(crate) fn validate_and_extract(
    namespace: Option<&str>,
    qualified_name: &str,
) -> DomResult<(Option<String>, Option<String>, String)> {
    let namespace = namespace.filter(|ns| !ns.is_empty());
    validate_qualified_name(qualified_name)?;

    let (prefix, local_name) = match qualified_name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qualified_name),
    };

    let namespace_error = || DomError::NotSupported(format!("namespace mismatch for {qualified_name}"));
    if prefix.is_some() && namespace.is_none() {
        return Err(namespace_error());
    }
    if prefix == Some("xml") && namespace != Some(XML_NS) {
        return Err(namespace_error());
    }
    let is_xmlns = qualified_name == "xmlns" || prefix == Some("xmlns");
    if is_xmlns != (namespace == Some(XMLNS_NS)) {
        return Err(namespace_error());
    }

    Ok((
        namespace.map(str::to_string),
        prefix.map(str::to_string),
        local_name.to_string(),
    ))
}
