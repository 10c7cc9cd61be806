//! The extension store: lossless capture of unrecognized markup.
//!
//! Anything a reader does not recognize lands here. Attributes go into a
//! name-keyed map; elements are captured as verbatim markup fragments. All
//! fragments captured for one entity share a single backing buffer under an
//! internal wrapper root, and each fragment stays independently addressable
//! by ordinal index through recorded byte ranges, so retrieval never
//! re-parses. The wrapper marker never appears in output.

use std::collections::BTreeMap;
use std::io;
use std::ops::Range;

use quick_xml::Writer;

use crate::error::{Error, Result};
use crate::xml::{write_raw, XmlCursor, XML_NS};

const EXTENSION_WRAPPER_OPEN: &str = "<extensionWrapper>";
const EXTENSION_WRAPPER_CLOSE: &str = "</extensionWrapper>";

/// A namespace-qualified XML name.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct XmlName {
    /// Local part of the name.
    pub local: String,
    /// Namespace URI, empty for no namespace.
    pub namespace: String,
}

impl XmlName {
    /// Builds a qualified name.
    pub fn new(local: impl Into<String>, namespace: impl Into<String>) -> Self {
        XmlName {
            local: local.into(),
            namespace: namespace.into(),
        }
    }
}

/// Unrecognized attributes of one entity, keyed by qualified name.
///
/// Never holds `xmlns` declarations or attributes a known field consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionAttributes {
    entries: BTreeMap<XmlName, String>,
}

impl ExtensionAttributes {
    /// Inserts an attribute, returning the previous value if any.
    pub fn insert(&mut self, name: XmlName, value: impl Into<String>) -> Option<String> {
        self.entries.insert(name, value.into())
    }

    /// Looks up an attribute value.
    pub fn get(&self, local: &str, namespace: &str) -> Option<&str> {
        self.entries
            .get(&XmlName::new(local, namespace))
            .map(String::as_str)
    }

    /// True when the attribute is present.
    pub fn contains(&self, local: &str, namespace: &str) -> bool {
        self.entries.contains_key(&XmlName::new(local, namespace))
    }

    /// Iterates attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&XmlName, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Number of stored attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no attributes are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FragmentEntry {
    name: XmlName,
    range: Range<usize>,
}

/// Unrecognized child elements of one entity, in document order.
#[derive(Debug, Clone, Default)]
pub struct ExtensionElements {
    buffer: String,
    entries: Vec<FragmentEntry>,
}

impl ExtensionElements {
    /// Number of stored fragments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no fragments are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fragment at `index`, if present.
    pub fn get(&self, index: usize) -> Option<ExtensionElement<'_>> {
        let entry = self.entries.get(index)?;
        Some(ExtensionElement {
            name: &entry.name,
            raw: &self.buffer[entry.range.clone()],
        })
    }

    /// Iterates fragments in document order.
    pub fn iter(&self) -> impl Iterator<Item = ExtensionElement<'_>> {
        self.entries.iter().map(|entry| ExtensionElement {
            name: &entry.name,
            raw: &self.buffer[entry.range.clone()],
        })
    }

    /// Appends a fragment built programmatically. The outer name and
    /// namespace are taken from the markup, which must hold exactly one
    /// well-formed element.
    pub fn push_fragment(&mut self, raw: &str) -> Result<()> {
        let mut cursor = XmlCursor::new(raw);
        let (local, namespace) = cursor.name()?;
        cursor.skip_element()?;
        let start = self.buffer.len();
        self.buffer.push_str(raw.trim());
        self.entries.push(FragmentEntry {
            name: XmlName::new(local, namespace),
            range: start..self.buffer.len(),
        });
        Ok(())
    }
}

// Buffers may differ by wrapper framing; fragments are what counts.
impl PartialEq for ExtensionElements {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.name == b.name && a.raw == b.raw)
    }
}

impl Eq for ExtensionElements {}

/// One opaque extension fragment: outer name plus verbatim markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionElement<'a> {
    name: &'a XmlName,
    raw: &'a str,
}

impl<'a> ExtensionElement<'a> {
    /// Local name of the fragment's outer element.
    pub fn local_name(&self) -> &'a str {
        &self.name.local
    }

    /// Namespace of the fragment's outer element.
    pub fn namespace(&self) -> &'a str {
        &self.name.namespace
    }

    /// The fragment markup, verbatim.
    pub fn raw(&self) -> &'a str {
        self.raw
    }
}

/// Scoped capture session for one entity's unrecognized children.
///
/// Opened lazily on the first capture; the backing buffer is released on
/// every exit path through ownership.
pub(crate) struct ExtensionCapture {
    buffer: Vec<u8>,
    entries: Vec<FragmentEntry>,
    limit: usize,
}

impl ExtensionCapture {
    pub(crate) fn new(limit: usize) -> Self {
        ExtensionCapture {
            buffer: Vec::new(),
            entries: Vec::new(),
            limit,
        }
    }

    /// Captures the subtree the cursor is positioned on.
    pub(crate) fn capture(&mut self, cursor: &mut XmlCursor<'_>) -> Result<()> {
        if self.buffer.is_empty() {
            self.buffer.extend_from_slice(EXTENSION_WRAPPER_OPEN.as_bytes());
        }
        let start = self.buffer.len();
        let (local, namespace) = cursor.capture_subtree(&mut self.buffer)?;
        if self.buffer.len() > self.limit {
            return Err(Error::ExtensionSizeExceeded { limit: self.limit });
        }
        self.entries.push(FragmentEntry {
            name: XmlName::new(local, namespace),
            range: start..self.buffer.len(),
        });
        Ok(())
    }

    /// Seals the session into an immutable store.
    pub(crate) fn finish(mut self) -> Result<ExtensionElements> {
        if self.entries.is_empty() {
            return Ok(ExtensionElements::default());
        }
        self.buffer.extend_from_slice(EXTENSION_WRAPPER_CLOSE.as_bytes());
        let buffer = String::from_utf8(self.buffer).map_err(|e| Error::Structural {
            message: format!("captured extension markup is not UTF-8: {e}"),
            position: 0,
        })?;
        Ok(ExtensionElements {
            buffer,
            entries: self.entries,
        })
    }
}

/// Emits extension attributes onto a start tag, generating `e1`, `e2`, ...
/// prefixes (with matching declarations) for namespaced names.
pub(crate) fn extend_with_extension_attributes(
    start: &mut quick_xml::events::BytesStart<'_>,
    attrs: &ExtensionAttributes,
) {
    let mut generated = 0usize;
    for (name, value) in attrs.iter() {
        if name.namespace.is_empty() {
            start.push_attribute((name.local.as_str(), value));
        } else if name.namespace == XML_NS {
            let key = format!("xml:{}", name.local);
            start.push_attribute((key.as_str(), value));
        } else {
            generated += 1;
            let decl = format!("xmlns:e{generated}");
            start.push_attribute((decl.as_str(), name.namespace.as_str()));
            let key = format!("e{generated}:{}", name.local);
            start.push_attribute((key.as_str(), value));
        }
    }
}

/// Re-emits stored fragments verbatim, wrapper excluded.
pub(crate) fn write_extension_elements<W: io::Write>(
    w: &mut Writer<W>,
    elements: &ExtensionElements,
) -> Result<()> {
    for fragment in elements.iter() {
        write_raw(w, fragment.raw())?;
    }
    Ok(())
}
