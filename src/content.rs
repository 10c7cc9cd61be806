//! Text constructs and entry content.
//!
//! Atom text constructs negotiate their shape through the `type` attribute:
//! `text` and `html` bodies are ordinary escaped character data, `xhtml`
//! bodies are embedded markup read and written verbatim. That asymmetry is
//! confined to this module. Entry content adds two more shapes: out-of-line
//! content referenced by `src`, and opaque inline XML of any other media
//! type.

use std::io;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Error, Result};
use crate::ext::{extend_with_extension_attributes, ExtensionAttributes, XmlName};
use crate::xml::{write_err, write_raw, XmlAttribute, XmlCursor};

/// How a text construct's body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextKind {
    /// Plain character data (`type="text"` or absent).
    #[default]
    Plain,
    /// Escaped HTML (`type="html"`).
    Html,
    /// Embedded XHTML markup (`type="xhtml"`).
    XHtml,
}

impl TextKind {
    /// The wire value of the `type` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            TextKind::Plain => "text",
            TextKind::Html => "html",
            TextKind::XHtml => "xhtml",
        }
    }

    fn from_type_attribute(value: &str, path: &str) -> Result<TextKind> {
        match value {
            "" | "text" => Ok(TextKind::Plain),
            "html" => Ok(TextKind::Html),
            "xhtml" => Ok(TextKind::XHtml),
            other => Err(Error::UnsupportedContentType {
                path: path.to_owned(),
                value: other.to_owned(),
            }),
        }
    }
}

/// An Atom text construct: title, subtitle, rights, summary.
///
/// For [`TextKind::XHtml`], `value` holds the verbatim inner markup; for the
/// other kinds it holds decoded character data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextContent {
    /// The body, decoded or verbatim depending on `kind`.
    pub value: String,
    /// Body encoding.
    pub kind: TextKind,
    /// Attributes other than `type` found on the construct.
    pub attribute_extensions: ExtensionAttributes,
}

impl TextContent {
    /// Plain-text construct.
    pub fn plain(value: impl Into<String>) -> Self {
        TextContent {
            value: value.into(),
            kind: TextKind::Plain,
            attribute_extensions: ExtensionAttributes::default(),
        }
    }

    /// Escaped-HTML construct.
    pub fn html(value: impl Into<String>) -> Self {
        TextContent {
            kind: TextKind::Html,
            ..TextContent::plain(value)
        }
    }

    /// Embedded-XHTML construct; `value` is raw markup.
    pub fn xhtml(value: impl Into<String>) -> Self {
        TextContent {
            kind: TextKind::XHtml,
            ..TextContent::plain(value)
        }
    }
}

/// The content of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Inline text construct.
    Text(TextContent),
    /// Out-of-line content addressed by `src`.
    Url {
        /// Value of the `src` attribute.
        url: String,
        /// Value of the `type` attribute (`text` when absent).
        media_type: String,
        /// Remaining attributes.
        attribute_extensions: ExtensionAttributes,
    },
    /// Opaque inline XML of a non-text media type.
    Xml {
        /// Value of the `type` attribute, if any.
        media_type: Option<String>,
        /// Verbatim inner markup.
        raw: String,
        /// Remaining attributes.
        attribute_extensions: ExtensionAttributes,
    },
}

fn is_plain_attr(attr: &XmlAttribute, local: &str) -> bool {
    attr.namespace.is_empty() && attr.local == local
}

/// Reads a text construct the cursor is positioned on. `path` names the
/// construct in `UnsupportedContentType` errors.
pub(crate) fn read_text_construct(
    cursor: &mut XmlCursor<'_>,
    path: &str,
    preserve_attribute_extensions: bool,
) -> Result<TextContent> {
    let attrs = cursor.attributes()?;
    text_construct_from(cursor, &attrs, path, preserve_attribute_extensions)
}

fn text_construct_from(
    cursor: &mut XmlCursor<'_>,
    attrs: &[XmlAttribute],
    path: &str,
    preserve_attribute_extensions: bool,
) -> Result<TextContent> {
    let mut kind = TextKind::Plain;
    let mut extensions = ExtensionAttributes::default();
    for attr in attrs {
        if is_plain_attr(attr, "type") {
            kind = TextKind::from_type_attribute(&attr.value, path)?;
        } else if preserve_attribute_extensions {
            extensions.insert(XmlName::new(&attr.local, &attr.namespace), &attr.value);
        }
    }
    let value = match kind {
        TextKind::XHtml => cursor.read_inner_xml()?,
        _ => cursor.read_element_text()?,
    };
    Ok(TextContent {
        value,
        kind,
        attribute_extensions: extensions,
    })
}

/// Reads an entry `content` element, resolving its shape: explicit `src`
/// wins, then the text-construct types, then opaque XML.
pub(crate) fn read_content(
    cursor: &mut XmlCursor<'_>,
    path: &str,
    preserve_attribute_extensions: bool,
) -> Result<Content> {
    let attrs = cursor.attributes()?;
    let type_attr = attrs
        .iter()
        .find(|a| is_plain_attr(a, "type"))
        .map(|a| a.value.clone());
    let src = attrs
        .iter()
        .find(|a| is_plain_attr(a, "src"))
        .map(|a| a.value.clone())
        .filter(|v| !v.is_empty());

    if let Some(url) = src {
        let mut extensions = ExtensionAttributes::default();
        if preserve_attribute_extensions {
            for attr in &attrs {
                if !is_plain_attr(attr, "type") && !is_plain_attr(attr, "src") {
                    extensions.insert(XmlName::new(&attr.local, &attr.namespace), &attr.value);
                }
            }
        }
        // Out-of-line content carries no body worth keeping.
        cursor.skip_element()?;
        return Ok(Content::Url {
            url,
            media_type: type_attr.unwrap_or_else(|| "text".to_owned()),
            attribute_extensions: extensions,
        });
    }

    match type_attr.as_deref().unwrap_or("") {
        "" | "text" | "html" | "xhtml" => {
            text_construct_from(cursor, &attrs, path, preserve_attribute_extensions)
                .map(Content::Text)
        }
        media_type => {
            let mut extensions = ExtensionAttributes::default();
            if preserve_attribute_extensions {
                for attr in &attrs {
                    if !is_plain_attr(attr, "type") {
                        extensions.insert(XmlName::new(&attr.local, &attr.namespace), &attr.value);
                    }
                }
            }
            let media_type = Some(media_type.to_owned());
            let raw = cursor.read_inner_xml()?;
            Ok(Content::Xml {
                media_type,
                raw,
                attribute_extensions: extensions,
            })
        }
    }
}

/// Writes a text construct under the given (possibly prefixed) tag name.
/// The `type` attribute is always written.
pub(crate) fn write_text_construct<W: io::Write>(
    w: &mut Writer<W>,
    name: &str,
    content: &TextContent,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    start.push_attribute(("type", content.kind.as_str()));
    extend_with_extension_attributes(&mut start, &content.attribute_extensions);
    w.write_event(Event::Start(start)).map_err(write_err)?;
    match content.kind {
        TextKind::XHtml => write_raw(w, &content.value)?,
        _ => w
            .write_event(Event::Text(BytesText::new(&content.value)))
            .map_err(write_err)?,
    }
    w.write_event(Event::End(BytesEnd::new(name))).map_err(write_err)?;
    Ok(())
}

/// Writes an entry `content` element in whichever shape it holds.
pub(crate) fn write_content<W: io::Write>(
    w: &mut Writer<W>,
    name: &str,
    content: &Content,
) -> Result<()> {
    match content {
        Content::Text(text) => write_text_construct(w, name, text),
        Content::Url {
            url,
            media_type,
            attribute_extensions,
        } => {
            let mut start = BytesStart::new(name);
            start.push_attribute(("type", media_type.as_str()));
            start.push_attribute(("src", url.as_str()));
            extend_with_extension_attributes(&mut start, attribute_extensions);
            w.write_event(Event::Empty(start)).map_err(write_err)
        }
        Content::Xml {
            media_type,
            raw,
            attribute_extensions,
        } => {
            let mut start = BytesStart::new(name);
            if let Some(media_type) = media_type {
                start.push_attribute(("type", media_type.as_str()));
            }
            extend_with_extension_attributes(&mut start, attribute_extensions);
            w.write_event(Event::Start(start)).map_err(write_err)?;
            write_raw(w, raw)?;
            w.write_event(Event::End(BytesEnd::new(name))).map_err(write_err)
        }
    }
}
