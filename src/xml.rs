//! Token-stream boundary over `quick-xml`.
//!
//! [`XmlCursor`] is a forward-only, namespace-aware cursor with one event of
//! lookahead. It owns the prefix scope stack (including the implicit `xml`
//! prefix), resolves element and attribute names against it, and offers the
//! operations the entity readers need: element text with entity resolution,
//! verbatim inner markup, subtree skip, and verbatim subtree capture for the
//! extension store. Write-side helpers wrap `quick_xml::Writer` for escaped
//! text and raw passthrough.

use std::io;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};

/// The Atom 1.0 namespace.
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
/// The Atom Publishing Protocol namespace.
pub const APP_NS: &str = "http://www.w3.org/2007/app";
/// The namespace of the built-in `xml:` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
/// XML Schema instance namespace; its `type` attributes are ignored.
pub(crate) const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// A resolved attribute: local name, namespace URI, unescaped value.
///
/// Namespace declarations (`xmlns`, `xmlns:*`) are consumed by the cursor's
/// scope stack and never surface here. Unprefixed attributes have an empty
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Local part of the attribute name.
    pub local: String,
    /// Resolved namespace URI, empty for unprefixed attributes.
    pub namespace: String,
    /// Decoded, entity-resolved value.
    pub value: String,
}

impl XmlAttribute {
    /// True for `type` attributes from the XML Schema instance namespace.
    pub(crate) fn is_schema_type(&self) -> bool {
        self.local == "type" && self.namespace == XSI_NS
    }
}

/// Namespace-aware pull cursor over an XML document held in memory.
pub struct XmlCursor<'a> {
    reader: Reader<&'a [u8]>,
    peeked: Option<Event<'a>>,
    // (prefix, uri) pairs; "" prefix is the default namespace. `marks`
    // records the binding count at each open element for popping.
    bindings: Vec<(String, String)>,
    marks: Vec<usize>,
}

impl<'a> XmlCursor<'a> {
    /// Creates a cursor positioned before the first event of `input`.
    pub fn new(input: &'a str) -> Self {
        XmlCursor {
            reader: Reader::from_str(input),
            peeked: None,
            bindings: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Byte offset of the cursor into the input.
    pub fn position(&self) -> u64 {
        self.reader.buffer_position()
    }

    fn xml_err(&self, e: impl std::fmt::Display) -> Error {
        Error::structural(format!("XML error: {e}"), self.position())
    }

    fn eof_err(&self) -> Error {
        Error::structural("unexpected end of document", self.position())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        self.reader
            .decoder()
            .decode(bytes)
            .map(|c| c.into_owned())
            .map_err(|e| self.xml_err(e))
    }

    fn fill(&mut self) -> Result<()> {
        if self.peeked.is_none() {
            let ev = self.reader.read_event().map_err(|e| self.xml_err(e))?;
            self.peeked = Some(ev);
        }
        Ok(())
    }

    /// Consumes and returns the next raw event, maintaining namespace scope.
    pub(crate) fn next_event(&mut self) -> Result<Event<'a>> {
        let ev = match self.peeked.take() {
            Some(ev) => ev,
            None => self.reader.read_event().map_err(|e| self.xml_err(e))?,
        };
        match &ev {
            Event::Start(e) => {
                let decls = self.decls_of(e)?;
                self.marks.push(self.bindings.len());
                self.bindings.extend(decls);
            }
            Event::End(_) => {
                if let Some(mark) = self.marks.pop() {
                    self.bindings.truncate(mark);
                }
            }
            _ => {}
        }
        Ok(ev)
    }

    /// Namespace declarations carried directly on a start tag.
    fn decls_of(&self, start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
        let mut decls = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.xml_err(e))?;
            let key = self.decode(attr.key.as_ref())?;
            let prefix = if key == "xmlns" {
                String::new()
            } else if let Some(p) = key.strip_prefix("xmlns:") {
                p.to_owned()
            } else {
                continue;
            };
            let raw = self.decode(&attr.value)?;
            let value = unescape(&raw).map_err(|e| self.xml_err(e))?.into_owned();
            decls.push((prefix, value));
        }
        Ok(decls)
    }

    fn resolve_prefix<'s>(&'s self, prefix: &str, extra: &'s [(String, String)]) -> Option<&'s str> {
        if prefix == "xml" {
            return Some(XML_NS);
        }
        for (p, uri) in extra.iter().rev() {
            if p == prefix {
                return Some(uri);
            }
        }
        for (p, uri) in self.bindings.iter().rev() {
            if p == prefix {
                return Some(uri);
            }
        }
        None
    }

    /// Skips declarations, processing instructions, comments, doctypes and
    /// whitespace-only text, stopping at the next content event.
    pub fn move_to_content(&mut self) -> Result<()> {
        loop {
            self.fill()?;
            let skip = match self.peeked.as_ref() {
                Some(Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_)) => true,
                Some(Event::Text(t)) => t.iter().all(|b| b.is_ascii_whitespace()),
                _ => false,
            };
            if !skip {
                return Ok(());
            }
            self.next_event()?;
        }
    }

    /// True when the next content event opens an element.
    pub fn is_start(&mut self) -> Result<bool> {
        self.move_to_content()?;
        Ok(matches!(
            self.peeked.as_ref(),
            Some(Event::Start(_) | Event::Empty(_))
        ))
    }

    /// True when the next content event opens the named element.
    pub fn is_start_of(&mut self, local: &str, namespace: &str) -> Result<bool> {
        if !self.is_start()? {
            return Ok(false);
        }
        let (l, ns) = self.name()?;
        Ok(l == local && ns == namespace)
    }

    /// Local name and resolved namespace of the pending start element.
    pub fn name(&mut self) -> Result<(String, String)> {
        self.move_to_content()?;
        match self.peeked.as_ref() {
            Some(Event::Start(e)) | Some(Event::Empty(e)) => {
                let qname = self.decode(e.name().as_ref())?;
                let decls = self.decls_of(e)?;
                let (prefix, local) = split_qname(&qname);
                let namespace = self
                    .resolve_prefix(prefix, &decls)
                    .unwrap_or_default()
                    .to_owned();
                Ok((local.to_owned(), namespace))
            }
            _ => Err(Error::structural("expected a start element", self.position())),
        }
    }

    /// Resolved attributes of the pending start element, namespace
    /// declarations excluded.
    pub fn attributes(&mut self) -> Result<Vec<XmlAttribute>> {
        self.move_to_content()?;
        let (start, decls) = match self.peeked.as_ref() {
            Some(Event::Start(e)) | Some(Event::Empty(e)) => (e, self.decls_of(e)?),
            _ => {
                return Err(Error::structural("expected a start element", self.position()));
            }
        };
        let mut out = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.xml_err(e))?;
            let key = self.decode(attr.key.as_ref())?;
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let (prefix, local) = split_qname(&key);
            let namespace = if prefix.is_empty() {
                String::new()
            } else {
                self.resolve_prefix(prefix, &decls)
                    .unwrap_or_default()
                    .to_owned()
            };
            let raw = self.decode(&attr.value)?;
            let value = unescape(&raw).map_err(|e| self.xml_err(e))?.into_owned();
            out.push(XmlAttribute {
                local: local.to_owned(),
                namespace,
                value,
            });
        }
        Ok(out)
    }

    /// Consumes the pending start tag. Returns `true` when the element has
    /// content to read, `false` for an empty (self-closing) element.
    pub fn enter(&mut self) -> Result<bool> {
        self.move_to_content()?;
        match self.next_event()? {
            Event::Start(_) => Ok(true),
            Event::Empty(_) => Ok(false),
            _ => Err(Error::structural("expected a start element", self.position())),
        }
    }

    /// Consumes the end tag of the element previously entered.
    pub fn leave(&mut self) -> Result<()> {
        self.move_to_content()?;
        match self.next_event()? {
            Event::End(_) => Ok(()),
            Event::Eof => Err(self.eof_err()),
            _ => Err(Error::structural("expected end of element", self.position())),
        }
    }

    /// Reads the element (tag and content) as a single string: text, CDATA
    /// and entity references concatenated. Child elements are an error.
    pub fn read_element_text(&mut self) -> Result<String> {
        if !self.enter()? {
            return Ok(String::new());
        }
        let mut out = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => {
                    let raw = self.decode(&t)?;
                    let text = unescape(&raw).map_err(|e| self.xml_err(e))?;
                    out.push_str(&text);
                }
                Event::CData(t) => out.push_str(&self.decode(&t)?),
                Event::GeneralRef(e) => {
                    let name = e.decode().map_err(|err| self.xml_err(err))?;
                    let reference = format!("&{name};");
                    match unescape(&reference) {
                        Ok(resolved) => out.push_str(&resolved),
                        // Unknown entity: keep the reference verbatim.
                        Err(_) => out.push_str(&reference),
                    }
                }
                Event::Comment(_) | Event::PI(_) => {}
                Event::End(_) => break,
                Event::Start(_) | Event::Empty(_) => {
                    return Err(Error::structural(
                        "unexpected child element in text-only element",
                        self.position(),
                    ));
                }
                Event::Eof => return Err(self.eof_err()),
                _ => {}
            }
        }
        Ok(out)
    }

    /// Consumes the element and returns its inner markup verbatim.
    pub fn read_inner_xml(&mut self) -> Result<String> {
        if !self.enter()? {
            return Ok(String::new());
        }
        let mut writer = Writer::new(Vec::new());
        let mut depth = 0usize;
        loop {
            match self.next_event()? {
                Event::End(e) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    writer.write_event(Event::End(e)).map_err(write_err)?;
                }
                Event::Start(e) => {
                    depth += 1;
                    writer.write_event(Event::Start(e)).map_err(write_err)?;
                }
                Event::Eof => return Err(self.eof_err()),
                other => writer.write_event(other).map_err(write_err)?,
            }
        }
        String::from_utf8(writer.into_inner()).map_err(|e| self.xml_err(e))
    }

    /// Consumes the element and everything inside it.
    pub fn skip_element(&mut self) -> Result<()> {
        if !self.enter()? {
            return Ok(());
        }
        let mut depth = 0usize;
        loop {
            match self.next_event()? {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                Event::Eof => return Err(self.eof_err()),
                _ => {}
            }
        }
    }

    /// Copies the pending element subtree verbatim into `out`, returning its
    /// outer (local name, namespace).
    ///
    /// Prefixes used inside the fragment but declared on an ancestor get
    /// their declarations added to the fragment root, so the stored markup
    /// stays self-contained when re-emitted under a different document.
    pub(crate) fn capture_subtree(&mut self, out: &mut Vec<u8>) -> Result<(String, String)> {
        let (local, namespace) = self.name()?;
        let mut events: Vec<Event<'static>> = Vec::new();
        let first = self.next_event()?;
        let has_children = match &first {
            Event::Start(_) => true,
            Event::Empty(_) => false,
            _ => return Err(Error::structural("expected a start element", self.position())),
        };
        events.push(first.into_owned());
        if has_children {
            let mut depth = 1usize;
            while depth > 0 {
                let ev = self.next_event()?;
                match &ev {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => depth -= 1,
                    Event::Eof => return Err(self.eof_err()),
                    _ => {}
                }
                events.push(ev.into_owned());
            }
        }

        let additions = self.missing_declarations(&events)?;
        if !additions.is_empty() {
            if let Some(Event::Start(root) | Event::Empty(root)) = events.first_mut() {
                for (key, value) in &additions {
                    root.push_attribute((key.as_str(), value.as_str()));
                }
            }
        }

        let mut writer = Writer::new(out);
        for ev in events {
            writer.write_event(ev).map_err(write_err)?;
        }
        Ok((local, namespace))
    }

    /// Declarations to add to a captured fragment root: prefixes (and the
    /// default namespace) used somewhere in the fragment with no in-fragment
    /// declaration in scope at that point, but bound in the enclosing scope.
    ///
    /// Declarations are tracked per element depth. A descendant's
    /// redeclaration covers only its own subtree and must not mask a use
    /// elsewhere in the fragment (the fragment root included).
    fn missing_declarations(&self, events: &[Event<'static>]) -> Result<Vec<(String, String)>> {
        let mut scopes: Vec<Vec<String>> = Vec::new();
        let mut needed: Vec<String> = Vec::new();
        let mut default_needed = false;
        for ev in events {
            let (start, is_empty) = match ev {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                Event::End(_) => {
                    scopes.pop();
                    continue;
                }
                _ => continue,
            };
            let mut declared_here: Vec<String> = Vec::new();
            for attr in start.attributes() {
                let attr = attr.map_err(|e| self.xml_err(e))?;
                let key = self.decode(attr.key.as_ref())?;
                if key == "xmlns" {
                    declared_here.push(String::new());
                } else if let Some(p) = key.strip_prefix("xmlns:") {
                    declared_here.push(p.to_owned());
                }
            }
            // Declarations on an element cover its own name and attributes.
            scopes.push(declared_here);

            let qname = self.decode(start.name().as_ref())?;
            let (prefix, _) = split_qname(&qname);
            if prefix.is_empty() {
                if !scopes.iter().flatten().any(|p| p.is_empty()) {
                    default_needed = true;
                }
            } else if !scopes.iter().flatten().any(|p| p == prefix)
                && !needed.contains(&prefix.to_owned())
            {
                needed.push(prefix.to_owned());
            }
            for attr in start.attributes() {
                let attr = attr.map_err(|e| self.xml_err(e))?;
                let key = self.decode(attr.key.as_ref())?;
                if key == "xmlns" || key.starts_with("xmlns:") {
                    continue;
                }
                let (prefix, _) = split_qname(&key);
                if !prefix.is_empty()
                    && !scopes.iter().flatten().any(|p| p == prefix)
                    && !needed.contains(&prefix.to_owned())
                {
                    needed.push(prefix.to_owned());
                }
            }
            if is_empty {
                scopes.pop();
            }
        }
        let mut additions = Vec::new();
        for prefix in needed {
            if prefix == "xml" {
                continue;
            }
            if let Some(uri) = self.resolve_prefix(&prefix, &[]) {
                if !uri.is_empty() {
                    additions.push((format!("xmlns:{prefix}"), uri.to_owned()));
                }
            }
        }
        if default_needed {
            if let Some(uri) = self.resolve_prefix("", &[]) {
                if !uri.is_empty() {
                    additions.push(("xmlns".to_owned(), uri.to_owned()));
                }
            }
        }
        Ok(additions)
    }

    /// Verifies the document root, consuming nothing.
    pub(crate) fn expect_root(&mut self, local: &str, namespace: &str, what: &str) -> Result<()> {
        self.move_to_content()?;
        let (l, ns) = self.name()?;
        if l == local && ns == namespace {
            Ok(())
        } else {
            Err(Error::structural(
                format!("unknown {what} XML: <{l}> in namespace {ns:?}"),
                self.position(),
            ))
        }
    }
}

fn split_qname(name: &str) -> (&str, &str) {
    match name.find(':') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => ("", name),
    }
}

/// Writes `<name>text</name>` with standard escaping.
pub(crate) fn write_text_element<W: io::Write>(
    w: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(write_err)?;
    w.write_event(Event::Text(BytesText::new(text)))
        .map_err(write_err)?;
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(write_err)?;
    Ok(())
}

/// Writes pre-escaped markup verbatim (XHTML bodies, stored fragments).
pub(crate) fn write_raw<W: io::Write>(w: &mut Writer<W>, raw: &str) -> Result<()> {
    w.write_event(Event::Text(BytesText::from_escaped(raw)))
        .map_err(write_err)
}

pub(crate) fn write_err(e: impl std::fmt::Display) -> Error {
    Error::Structural {
        message: format!("XML write error: {e}"),
        position: 0,
    }
}
