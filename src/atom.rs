//! The Atom 1.0 object model and its reader/writer.
//!
//! [`AtomFormatter`] converts between [`Feed`] / [`Entry`] and RFC 4287
//! documents. Reading dispatches every attribute and child element by
//! (local name, namespace): known fields are parsed, everything else is
//! offered to the optional hooks and then preserved verbatim in the
//! extension store. Unknown markup never fails a read; malformed known
//! fields do. Writing emits elements in the fixed order consumers expect
//! and synthesizes the required `title`, `id` and `updated` fields when
//! the model leaves them empty.

use std::io;

use chrono::{DateTime, FixedOffset, Utc};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::content::{
    read_content, read_text_construct, write_content, write_text_construct, Content, TextContent,
};
use crate::datetime::{format_date, parse_date};
use crate::error::{Error, Result};
use crate::ext::{
    extend_with_extension_attributes, write_extension_elements, ExtensionAttributes,
    ExtensionCapture, ExtensionElements, XmlName,
};
use crate::ident::{IdGenerator, RandomIdGenerator};
use crate::uri::{base_to_write, combine_xml_base};
use crate::xml::{write_err, write_text_element, XmlAttribute, XmlCursor, ATOM_NS, XML_NS};

const FEED_TITLE_PATH: &str = "//atom:feed/atom:title[@type]";
const FEED_SUBTITLE_PATH: &str = "//atom:feed/atom:subtitle[@type]";
const FEED_RIGHTS_PATH: &str = "//atom:feed/atom:rights[@type]";
const ENTRY_TITLE_PATH: &str = "//atom:feed/atom:entry/atom:title[@type]";
const ENTRY_SUMMARY_PATH: &str = "//atom:feed/atom:entry/atom:summary[@type]";
const ENTRY_RIGHTS_PATH: &str = "//atom:feed/atom:entry/atom:rights[@type]";
const ENTRY_CONTENT_PATH: &str = "//atom:feed/atom:entry/atom:content[@type]";

/// A syndication feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    /// Feed title text construct.
    pub title: Option<TextContent>,
    /// Feed subtitle text construct.
    pub subtitle: Option<TextContent>,
    /// Rights statement.
    pub rights: Option<TextContent>,
    /// Permanent opaque identifier.
    pub id: Option<String>,
    /// Generating agent, human readable.
    pub generator: Option<String>,
    /// Logo image URI.
    pub logo: Option<String>,
    /// Icon image URI.
    pub icon: Option<String>,
    /// `xml:lang` of the feed element.
    pub language: Option<String>,
    /// Effective base URI after `xml:base` combination.
    pub base_uri: Option<String>,
    /// Last significant modification.
    pub updated: Option<DateTime<FixedOffset>>,
    /// Feed authors.
    pub authors: Vec<Person>,
    /// Feed contributors.
    pub contributors: Vec<Person>,
    /// Feed categories.
    pub categories: Vec<Category>,
    /// Feed links.
    pub links: Vec<Link>,
    /// Entries, in document order.
    pub entries: Vec<Entry>,
    /// Unrecognized attributes.
    pub attribute_extensions: ExtensionAttributes,
    /// Unrecognized child elements, verbatim.
    pub element_extensions: ExtensionElements,
}

/// A single feed entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    /// Permanent opaque identifier.
    pub id: Option<String>,
    /// Entry title text construct.
    pub title: Option<TextContent>,
    /// Short summary text construct.
    pub summary: Option<TextContent>,
    /// Rights statement.
    pub rights: Option<TextContent>,
    /// Last significant modification.
    pub updated: Option<DateTime<FixedOffset>>,
    /// Initial publication time.
    pub published: Option<DateTime<FixedOffset>>,
    /// Entry authors.
    pub authors: Vec<Person>,
    /// Entry contributors.
    pub contributors: Vec<Person>,
    /// Entry categories.
    pub categories: Vec<Category>,
    /// Entry links.
    pub links: Vec<Link>,
    /// Entry content, in one of its three shapes.
    pub content: Option<Content>,
    /// Source feed metadata for republished entries. Parsed with relaxed
    /// rules: nothing is synthesized and nested `entry` elements are
    /// treated as extensions.
    pub source: Option<Box<Feed>>,
    /// Effective base URI after `xml:base` combination.
    pub base_uri: Option<String>,
    /// Unrecognized attributes.
    pub attribute_extensions: ExtensionAttributes,
    /// Unrecognized child elements, verbatim.
    pub element_extensions: ExtensionElements,
}

/// A related resource link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Link {
    /// Link target.
    pub href: Option<String>,
    /// Relationship type.
    pub rel: Option<String>,
    /// Advisory media type.
    pub media_type: Option<String>,
    /// Human-readable title.
    pub title: Option<String>,
    /// Advisory length in bytes; 0 means unknown and is not written.
    pub length: u64,
    /// Effective base URI after `xml:base` combination.
    pub base_uri: Option<String>,
    /// Unrecognized attributes.
    pub attribute_extensions: ExtensionAttributes,
    /// Unrecognized child elements, verbatim.
    pub element_extensions: ExtensionElements,
}

/// An author or contributor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    /// Human-readable name.
    pub name: Option<String>,
    /// Associated URI.
    pub uri: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Unrecognized attributes.
    pub attribute_extensions: ExtensionAttributes,
    /// Unrecognized child elements, verbatim.
    pub element_extensions: ExtensionElements,
}

/// A category term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Category {
    /// The term itself; written as an empty string when unset.
    pub term: String,
    /// Categorization scheme URI.
    pub scheme: Option<String>,
    /// Human-readable label.
    pub label: Option<String>,
    /// Unrecognized attributes.
    pub attribute_extensions: ExtensionAttributes,
    /// Unrecognized child elements, verbatim.
    pub element_extensions: ExtensionElements,
}

/// Preservation and resource options shared by all formatters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatterOptions {
    /// Keep unrecognized attributes (default `true`).
    pub preserve_attribute_extensions: bool,
    /// Keep unrecognized child elements (default `true`).
    pub preserve_element_extensions: bool,
    /// Cap, in bytes, on captured extension markup per entity
    /// (default unlimited).
    pub max_extension_size: usize,
}

impl Default for FormatterOptions {
    fn default() -> Self {
        FormatterOptions {
            preserve_attribute_extensions: true,
            preserve_element_extensions: true,
            max_extension_size: usize::MAX,
        }
    }
}

impl FormatterOptions {
    /// Full preservation with a byte cap on captured extension markup.
    pub fn bounded(max_extension_size: usize) -> Self {
        FormatterOptions {
            max_extension_size,
            ..FormatterOptions::default()
        }
    }

    /// Drop all unrecognized markup instead of preserving it.
    pub fn skip_extensions() -> Self {
        FormatterOptions {
            preserve_attribute_extensions: false,
            preserve_element_extensions: false,
            max_extension_size: usize::MAX,
        }
    }
}

/// Where one attribute or child element ended up during reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Consumed by a known model field.
    Known,
    /// Claimed by a caller-installed hook.
    Hooked,
    /// Preserved in the extension store.
    Extension,
    /// Dropped (`xsi:type`-style attributes, or preservation disabled).
    Ignored,
}

/// Hook offered unrecognized attributes before extension capture; returns
/// `true` to claim the attribute.
pub type AttributeHook = Box<dyn Fn(&XmlName, &str) -> bool + Send + Sync>;

/// Hook offered unrecognized child elements before extension capture; must
/// consume the element and return `true` to claim it, or leave the cursor
/// untouched and return `false`.
pub type ElementHook = Box<dyn Fn(&mut XmlCursor<'_>) -> Result<bool> + Send + Sync>;

/// Reader/writer for Atom 1.0 feed and entry documents.
pub struct AtomFormatter {
    options: FormatterOptions,
    id_generator: Box<dyn IdGenerator>,
    new_feed: Box<dyn Fn() -> Feed + Send + Sync>,
    new_entry: Box<dyn Fn() -> Entry + Send + Sync>,
    attribute_hook: Option<AttributeHook>,
    element_hook: Option<ElementHook>,
}

impl Default for AtomFormatter {
    fn default() -> Self {
        AtomFormatter::new(FormatterOptions::default())
    }
}

impl AtomFormatter {
    /// Creates a formatter with the given options and default capabilities.
    pub fn new(options: FormatterOptions) -> Self {
        AtomFormatter {
            options,
            id_generator: Box::new(RandomIdGenerator),
            new_feed: Box::new(Feed::default),
            new_entry: Box::new(Entry::default),
            attribute_hook: None,
            element_hook: None,
        }
    }

    /// The options this formatter was built with.
    pub fn options(&self) -> FormatterOptions {
        self.options
    }

    /// Replaces the identifier generator used for synthesized `id` values.
    pub fn with_id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Box::new(generator);
        self
    }

    /// Installs a factory for feed instances, validated once: factories may
    /// preset scalar defaults but must not carry entries or extensions.
    pub fn with_feed_factory(
        mut self,
        factory: impl Fn() -> Feed + Send + Sync + 'static,
    ) -> Result<Self> {
        let probe = factory();
        if !probe.entries.is_empty()
            || !probe.attribute_extensions.is_empty()
            || !probe.element_extensions.is_empty()
        {
            return Err(Error::InvalidConfiguration(
                "feed factory must produce instances without entries or extensions".into(),
            ));
        }
        self.new_feed = Box::new(factory);
        Ok(self)
    }

    /// Installs a factory for entry instances, validated once: factories may
    /// preset scalar defaults but must not carry a source feed or extensions.
    pub fn with_entry_factory(
        mut self,
        factory: impl Fn() -> Entry + Send + Sync + 'static,
    ) -> Result<Self> {
        let probe = factory();
        if probe.source.is_some()
            || !probe.attribute_extensions.is_empty()
            || !probe.element_extensions.is_empty()
        {
            return Err(Error::InvalidConfiguration(
                "entry factory must produce instances without a source feed or extensions".into(),
            ));
        }
        self.new_entry = Box::new(factory);
        Ok(self)
    }

    /// Installs the attribute hook.
    pub fn with_attribute_hook(
        mut self,
        hook: impl Fn(&XmlName, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.attribute_hook = Some(Box::new(hook));
        self
    }

    /// Installs the element hook.
    pub fn with_element_hook(
        mut self,
        hook: impl Fn(&mut XmlCursor<'_>) -> Result<bool> + Send + Sync + 'static,
    ) -> Self {
        self.element_hook = Some(Box::new(hook));
        self
    }

    // ---- reading ----

    /// Reads a feed document.
    pub fn read_feed(&self, xml: &str) -> Result<Feed> {
        let mut cursor = XmlCursor::new(xml);
        cursor.expect_root("feed", ATOM_NS, "feed")?;
        let mut feed = (self.new_feed)();
        self.read_feed_from(&mut cursor, &mut feed, false, None)?;
        Ok(feed)
    }

    /// Reads a standalone entry document.
    pub fn read_entry(&self, xml: &str) -> Result<Entry> {
        let mut cursor = XmlCursor::new(xml);
        cursor.expect_root("entry", ATOM_NS, "entry")?;
        self.read_entry_from(&mut cursor, None)
    }

    pub(crate) fn route_attribute(
        &self,
        attr: &XmlAttribute,
        extensions: &mut ExtensionAttributes,
    ) -> Dispatch {
        if attr.is_schema_type() {
            return Dispatch::Ignored;
        }
        let name = XmlName::new(&attr.local, &attr.namespace);
        if let Some(hook) = &self.attribute_hook {
            if hook(&name, &attr.value) {
                return Dispatch::Hooked;
            }
        }
        if self.options.preserve_attribute_extensions {
            extensions.insert(name, &attr.value);
            Dispatch::Extension
        } else {
            Dispatch::Ignored
        }
    }

    pub(crate) fn route_element(
        &self,
        cursor: &mut XmlCursor<'_>,
        capture: &mut ExtensionCapture,
    ) -> Result<Dispatch> {
        if let Some(hook) = &self.element_hook {
            if hook(cursor)? {
                return Ok(Dispatch::Hooked);
            }
        }
        if self.options.preserve_element_extensions {
            capture.capture(cursor)?;
            Ok(Dispatch::Extension)
        } else {
            let (local, ns) = cursor.name()?;
            log::debug!("dropping unrecognized element <{local}> in namespace {ns:?}");
            cursor.skip_element()?;
            Ok(Dispatch::Ignored)
        }
    }

    fn read_feed_from(
        &self,
        cursor: &mut XmlCursor<'_>,
        feed: &mut Feed,
        is_source: bool,
        inherited_base: Option<&str>,
    ) -> Result<()> {
        feed.base_uri = inherited_base.map(str::to_owned);
        for attr in &cursor.attributes()? {
            if attr.namespace == XML_NS && attr.local == "base" {
                feed.base_uri = combine_xml_base(feed.base_uri.as_deref(), &attr.value);
            } else if attr.namespace == XML_NS && attr.local == "lang" {
                feed.language = Some(attr.value.clone());
            } else {
                self.route_attribute(attr, &mut feed.attribute_extensions);
            }
        }

        let mut capture = ExtensionCapture::new(self.options.max_extension_size);
        let mut seen_entry = false;
        let mut gap_after_entries = false;
        let mut interleaved = false;
        if cursor.enter()? {
            while cursor.is_start()? {
                let (local, ns) = cursor.name()?;
                let base = feed.base_uri.clone();
                let handled = if ns == ATOM_NS {
                    match local.as_str() {
                        "title" => {
                            feed.title = Some(read_text_construct(
                                cursor,
                                FEED_TITLE_PATH,
                                self.options.preserve_attribute_extensions,
                            )?);
                            true
                        }
                        "subtitle" => {
                            feed.subtitle = Some(read_text_construct(
                                cursor,
                                FEED_SUBTITLE_PATH,
                                self.options.preserve_attribute_extensions,
                            )?);
                            true
                        }
                        "rights" => {
                            feed.rights = Some(read_text_construct(
                                cursor,
                                FEED_RIGHTS_PATH,
                                self.options.preserve_attribute_extensions,
                            )?);
                            true
                        }
                        "id" => {
                            feed.id = Some(cursor.read_element_text()?);
                            true
                        }
                        "generator" => {
                            feed.generator = Some(cursor.read_element_text()?);
                            true
                        }
                        "logo" => {
                            feed.logo = Some(cursor.read_element_text()?);
                            true
                        }
                        "icon" => {
                            feed.icon = Some(cursor.read_element_text()?);
                            true
                        }
                        "updated" => {
                            let position = cursor.position();
                            let text = cursor.read_element_text()?;
                            feed.updated = Some(parse_date(&text, position)?);
                            true
                        }
                        "author" => {
                            let position = cursor.position();
                            let person = self
                                .read_person(cursor)
                                .map_err(|e| Error::nested("author", position, e))?;
                            feed.authors.push(person);
                            true
                        }
                        "contributor" => {
                            let position = cursor.position();
                            let person = self
                                .read_person(cursor)
                                .map_err(|e| Error::nested("contributor", position, e))?;
                            feed.contributors.push(person);
                            true
                        }
                        "category" => {
                            let position = cursor.position();
                            let category = self
                                .read_category(cursor)
                                .map_err(|e| Error::nested("category", position, e))?;
                            feed.categories.push(category);
                            true
                        }
                        "link" => {
                            let position = cursor.position();
                            let link = self
                                .read_link(cursor, base.as_deref())
                                .map_err(|e| Error::nested("link", position, e))?;
                            feed.links.push(link);
                            true
                        }
                        "entry" if !is_source => {
                            if gap_after_entries {
                                interleaved = true;
                            }
                            let position = cursor.position();
                            let entry = self
                                .read_entry_from(cursor, base.as_deref())
                                .map_err(|e| Error::nested("entry", position, e))?;
                            feed.entries.push(entry);
                            seen_entry = true;
                            true
                        }
                        _ => false,
                    }
                } else {
                    false
                };
                if handled {
                    if seen_entry && local != "entry" {
                        gap_after_entries = true;
                    }
                } else {
                    self.route_element(cursor, &mut capture)?;
                    if seen_entry {
                        gap_after_entries = true;
                    }
                }
            }
            cursor.leave()?;
        }
        if interleaved {
            log::debug!("feed entries are not contiguous; preserving document order");
        }
        feed.element_extensions = capture.finish()?;
        Ok(())
    }

    fn read_entry_from(
        &self,
        cursor: &mut XmlCursor<'_>,
        inherited_base: Option<&str>,
    ) -> Result<Entry> {
        let mut entry = (self.new_entry)();
        entry.base_uri = inherited_base.map(str::to_owned);
        for attr in &cursor.attributes()? {
            if attr.namespace == XML_NS && attr.local == "base" {
                entry.base_uri = combine_xml_base(entry.base_uri.as_deref(), &attr.value);
            } else {
                self.route_attribute(attr, &mut entry.attribute_extensions);
            }
        }

        let mut capture = ExtensionCapture::new(self.options.max_extension_size);
        if cursor.enter()? {
            while cursor.is_start()? {
                let (local, ns) = cursor.name()?;
                let base = entry.base_uri.clone();
                let handled = if ns == ATOM_NS {
                    match local.as_str() {
                        "id" => {
                            entry.id = Some(cursor.read_element_text()?);
                            true
                        }
                        "title" => {
                            entry.title = Some(read_text_construct(
                                cursor,
                                ENTRY_TITLE_PATH,
                                self.options.preserve_attribute_extensions,
                            )?);
                            true
                        }
                        "summary" => {
                            entry.summary = Some(read_text_construct(
                                cursor,
                                ENTRY_SUMMARY_PATH,
                                self.options.preserve_attribute_extensions,
                            )?);
                            true
                        }
                        "rights" => {
                            entry.rights = Some(read_text_construct(
                                cursor,
                                ENTRY_RIGHTS_PATH,
                                self.options.preserve_attribute_extensions,
                            )?);
                            true
                        }
                        "updated" => {
                            let position = cursor.position();
                            let text = cursor.read_element_text()?;
                            entry.updated = Some(parse_date(&text, position)?);
                            true
                        }
                        "published" => {
                            let position = cursor.position();
                            let text = cursor.read_element_text()?;
                            entry.published = Some(parse_date(&text, position)?);
                            true
                        }
                        "author" => {
                            let position = cursor.position();
                            let person = self
                                .read_person(cursor)
                                .map_err(|e| Error::nested("author", position, e))?;
                            entry.authors.push(person);
                            true
                        }
                        "contributor" => {
                            let position = cursor.position();
                            let person = self
                                .read_person(cursor)
                                .map_err(|e| Error::nested("contributor", position, e))?;
                            entry.contributors.push(person);
                            true
                        }
                        "category" => {
                            let position = cursor.position();
                            let category = self
                                .read_category(cursor)
                                .map_err(|e| Error::nested("category", position, e))?;
                            entry.categories.push(category);
                            true
                        }
                        "link" => {
                            let position = cursor.position();
                            let link = self
                                .read_link(cursor, base.as_deref())
                                .map_err(|e| Error::nested("link", position, e))?;
                            entry.links.push(link);
                            true
                        }
                        "content" => {
                            entry.content = Some(read_content(
                                cursor,
                                ENTRY_CONTENT_PATH,
                                self.options.preserve_attribute_extensions,
                            )?);
                            true
                        }
                        "source" => {
                            let position = cursor.position();
                            let mut source = (self.new_feed)();
                            self.read_feed_from(cursor, &mut source, true, base.as_deref())
                                .map_err(|e| Error::nested("source feed", position, e))?;
                            entry.source = Some(Box::new(source));
                            true
                        }
                        _ => false,
                    }
                } else {
                    false
                };
                if !handled {
                    self.route_element(cursor, &mut capture)?;
                }
            }
            cursor.leave()?;
        }
        entry.element_extensions = capture.finish()?;
        Ok(entry)
    }

    fn read_person(&self, cursor: &mut XmlCursor<'_>) -> Result<Person> {
        let mut person = Person::default();
        for attr in &cursor.attributes()? {
            self.route_attribute(attr, &mut person.attribute_extensions);
        }
        let mut capture = ExtensionCapture::new(self.options.max_extension_size);
        if cursor.enter()? {
            while cursor.is_start()? {
                let (local, ns) = cursor.name()?;
                let handled = if ns == ATOM_NS {
                    match local.as_str() {
                        "name" => {
                            person.name = Some(cursor.read_element_text()?);
                            true
                        }
                        "uri" => {
                            person.uri = Some(cursor.read_element_text()?);
                            true
                        }
                        "email" => {
                            person.email = Some(cursor.read_element_text()?);
                            true
                        }
                        _ => false,
                    }
                } else {
                    false
                };
                if !handled {
                    self.route_element(cursor, &mut capture)?;
                }
            }
            cursor.leave()?;
        }
        person.element_extensions = capture.finish()?;
        Ok(person)
    }

    pub(crate) fn read_category(&self, cursor: &mut XmlCursor<'_>) -> Result<Category> {
        let mut category = Category::default();
        for attr in &cursor.attributes()? {
            if attr.namespace.is_empty() {
                match attr.local.as_str() {
                    "term" => {
                        category.term = attr.value.clone();
                        continue;
                    }
                    "scheme" => {
                        category.scheme = Some(attr.value.clone());
                        continue;
                    }
                    "label" => {
                        category.label = Some(attr.value.clone());
                        continue;
                    }
                    _ => {}
                }
            }
            self.route_attribute(attr, &mut category.attribute_extensions);
        }
        let mut capture = ExtensionCapture::new(self.options.max_extension_size);
        if cursor.enter()? {
            while cursor.is_start()? {
                self.route_element(cursor, &mut capture)?;
            }
            cursor.leave()?;
        }
        category.element_extensions = capture.finish()?;
        Ok(category)
    }

    fn read_link(&self, cursor: &mut XmlCursor<'_>, inherited_base: Option<&str>) -> Result<Link> {
        let mut link = Link {
            base_uri: inherited_base.map(str::to_owned),
            ..Link::default()
        };
        let position = cursor.position();
        for attr in &cursor.attributes()? {
            if attr.namespace == XML_NS && attr.local == "base" {
                link.base_uri = combine_xml_base(link.base_uri.as_deref(), &attr.value);
            } else if attr.namespace.is_empty() {
                match attr.local.as_str() {
                    "href" => link.href = Some(attr.value.clone()),
                    "rel" => link.rel = Some(attr.value.clone()),
                    "type" => link.media_type = Some(attr.value.clone()),
                    "title" => link.title = Some(attr.value.clone()),
                    "length" => {
                        link.length = attr.value.trim().parse().map_err(|_| {
                            Error::structural(
                                format!("invalid link length {:?}", attr.value),
                                position,
                            )
                        })?;
                    }
                    _ => {
                        self.route_attribute(attr, &mut link.attribute_extensions);
                    }
                }
            } else {
                self.route_attribute(attr, &mut link.attribute_extensions);
            }
        }
        let mut capture = ExtensionCapture::new(self.options.max_extension_size);
        if cursor.enter()? {
            while cursor.is_start()? {
                self.route_element(cursor, &mut capture)?;
            }
            cursor.leave()?;
        }
        link.element_extensions = capture.finish()?;
        Ok(link)
    }

    // ---- writing ----

    /// Writes a feed document.
    pub fn write_feed(&self, feed: &Feed) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_feed_element(&mut writer, feed, "feed", true, false, None)?;
        into_string(writer)
    }

    /// Writes a standalone entry document.
    pub fn write_entry(&self, entry: &Entry) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_entry_element(&mut writer, entry, true, None)?;
        into_string(writer)
    }

    fn write_feed_element<W: io::Write>(
        &self,
        w: &mut Writer<W>,
        feed: &Feed,
        name: &str,
        declare_namespace: bool,
        is_source: bool,
        inherited_base: Option<&str>,
    ) -> Result<()> {
        let mut start = BytesStart::new(name);
        if declare_namespace {
            start.push_attribute(("xmlns", ATOM_NS));
        }
        if let Some(language) = &feed.language {
            start.push_attribute(("xml:lang", language.as_str()));
        }
        if let Some(base) = base_to_write(inherited_base, feed.base_uri.as_deref()) {
            start.push_attribute(("xml:base", base));
        }
        extend_with_extension_attributes(&mut start, &feed.attribute_extensions);
        w.write_event(Event::Start(start)).map_err(write_err)?;

        match (&feed.title, is_source) {
            (Some(title), _) => write_text_construct(w, "title", title)?,
            (None, false) => write_text_construct(w, "title", &TextContent::plain(""))?,
            (None, true) => {}
        }
        if let Some(subtitle) = &feed.subtitle {
            write_text_construct(w, "subtitle", subtitle)?;
        }
        match (&feed.id, is_source) {
            (Some(id), _) => write_text_element(w, "id", id)?,
            (None, false) => write_text_element(w, "id", &self.id_generator.next_id())?,
            (None, true) => {}
        }
        if let Some(rights) = &feed.rights {
            write_text_construct(w, "rights", rights)?;
        }
        match (&feed.updated, is_source) {
            (Some(updated), _) => write_text_element(w, "updated", &format_date(updated))?,
            (None, false) => {
                write_text_element(w, "updated", &format_date(&Utc::now().fixed_offset()))?;
            }
            (None, true) => {}
        }
        for category in &feed.categories {
            write_category(w, "category", category)?;
        }
        if let Some(logo) = &feed.logo {
            write_text_element(w, "logo", logo)?;
        }
        if let Some(icon) = &feed.icon {
            write_text_element(w, "icon", icon)?;
        }
        for author in &feed.authors {
            self.write_person(w, "author", author)?;
        }
        for contributor in &feed.contributors {
            self.write_person(w, "contributor", contributor)?;
        }
        if let Some(generator) = &feed.generator {
            write_text_element(w, "generator", generator)?;
        }
        for link in &feed.links {
            self.write_link(w, link, feed.base_uri.as_deref())?;
        }
        write_extension_elements(w, &feed.element_extensions)?;
        if !is_source {
            for entry in &feed.entries {
                self.write_entry_element(w, entry, false, feed.base_uri.as_deref())?;
            }
        }
        w.write_event(Event::End(BytesEnd::new(name))).map_err(write_err)
    }

    fn write_entry_element<W: io::Write>(
        &self,
        w: &mut Writer<W>,
        entry: &Entry,
        declare_namespace: bool,
        inherited_base: Option<&str>,
    ) -> Result<()> {
        let mut start = BytesStart::new("entry");
        if declare_namespace {
            start.push_attribute(("xmlns", ATOM_NS));
        }
        if let Some(base) = base_to_write(inherited_base, entry.base_uri.as_deref()) {
            start.push_attribute(("xml:base", base));
        }
        extend_with_extension_attributes(&mut start, &entry.attribute_extensions);
        w.write_event(Event::Start(start)).map_err(write_err)?;

        match &entry.id {
            Some(id) => write_text_element(w, "id", id)?,
            None => write_text_element(w, "id", &self.id_generator.next_id())?,
        }
        match &entry.title {
            Some(title) => write_text_construct(w, "title", title)?,
            None => write_text_construct(w, "title", &TextContent::plain(""))?,
        }
        if let Some(summary) = &entry.summary {
            write_text_construct(w, "summary", summary)?;
        }
        if let Some(published) = &entry.published {
            write_text_element(w, "published", &format_date(published))?;
        }
        match &entry.updated {
            Some(updated) => write_text_element(w, "updated", &format_date(updated))?,
            None => write_text_element(w, "updated", &format_date(&Utc::now().fixed_offset()))?,
        }
        for author in &entry.authors {
            self.write_person(w, "author", author)?;
        }
        for contributor in &entry.contributors {
            self.write_person(w, "contributor", contributor)?;
        }
        for link in &entry.links {
            self.write_link(w, link, entry.base_uri.as_deref())?;
        }
        for category in &entry.categories {
            write_category(w, "category", category)?;
        }
        if let Some(content) = &entry.content {
            write_content(w, "content", content)?;
        }
        if let Some(rights) = &entry.rights {
            write_text_construct(w, "rights", rights)?;
        }
        if let Some(source) = &entry.source {
            self.write_feed_element(w, source, "source", false, true, entry.base_uri.as_deref())?;
        }
        write_extension_elements(w, &entry.element_extensions)?;
        w.write_event(Event::End(BytesEnd::new("entry"))).map_err(write_err)
    }

    fn write_person<W: io::Write>(
        &self,
        w: &mut Writer<W>,
        name: &str,
        person: &Person,
    ) -> Result<()> {
        let mut start = BytesStart::new(name);
        extend_with_extension_attributes(&mut start, &person.attribute_extensions);
        w.write_event(Event::Start(start)).map_err(write_err)?;
        if let Some(value) = &person.name {
            write_text_element(w, "name", value)?;
        }
        if let Some(uri) = &person.uri {
            write_text_element(w, "uri", uri)?;
        }
        if let Some(email) = &person.email {
            write_text_element(w, "email", email)?;
        }
        write_extension_elements(w, &person.element_extensions)?;
        w.write_event(Event::End(BytesEnd::new(name))).map_err(write_err)
    }

    fn write_link<W: io::Write>(
        &self,
        w: &mut Writer<W>,
        link: &Link,
        inherited_base: Option<&str>,
    ) -> Result<()> {
        let mut start = BytesStart::new("link");
        if let Some(base) = base_to_write(inherited_base, link.base_uri.as_deref()) {
            start.push_attribute(("xml:base", base));
        }
        extend_with_extension_attributes(&mut start, &link.attribute_extensions);
        let suppressed = |local: &str| link.attribute_extensions.contains(local, "");
        if let Some(rel) = &link.rel {
            if !suppressed("rel") {
                start.push_attribute(("rel", rel.as_str()));
            }
        }
        if let Some(media_type) = &link.media_type {
            if !suppressed("type") {
                start.push_attribute(("type", media_type.as_str()));
            }
        }
        if let Some(title) = &link.title {
            if !suppressed("title") {
                start.push_attribute(("title", title.as_str()));
            }
        }
        if link.length != 0 && !suppressed("length") {
            start.push_attribute(("length", link.length.to_string().as_str()));
        }
        if !suppressed("href") {
            start.push_attribute(("href", link.href.as_deref().unwrap_or("")));
        }
        if link.element_extensions.is_empty() {
            w.write_event(Event::Empty(start)).map_err(write_err)
        } else {
            w.write_event(Event::Start(start)).map_err(write_err)?;
            write_extension_elements(w, &link.element_extensions)?;
            w.write_event(Event::End(BytesEnd::new("link"))).map_err(write_err)
        }
    }
}

/// Writes a category under the given (possibly prefixed) tag name. Known
/// attributes already present as extensions are not written twice.
pub(crate) fn write_category<W: io::Write>(
    w: &mut Writer<W>,
    name: &str,
    category: &Category,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    extend_with_extension_attributes(&mut start, &category.attribute_extensions);
    let suppressed = |local: &str| category.attribute_extensions.contains(local, "");
    if !suppressed("term") {
        start.push_attribute(("term", category.term.as_str()));
    }
    if let Some(label) = &category.label {
        if !suppressed("label") {
            start.push_attribute(("label", label.as_str()));
        }
    }
    if let Some(scheme) = &category.scheme {
        if !suppressed("scheme") {
            start.push_attribute(("scheme", scheme.as_str()));
        }
    }
    if category.element_extensions.is_empty() {
        w.write_event(Event::Empty(start)).map_err(write_err)
    } else {
        w.write_event(Event::Start(start)).map_err(write_err)?;
        write_extension_elements(w, &category.element_extensions)?;
        w.write_event(Event::End(BytesEnd::new(name))).map_err(write_err)
    }
}

pub(crate) fn into_string(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(|e| Error::Structural {
        message: format!("produced document is not UTF-8: {e}"),
        position: 0,
    })
}

/// Reads a feed document with default options.
pub fn parse_feed(xml: &str) -> Result<Feed> {
    AtomFormatter::default().read_feed(xml)
}

/// Reads a standalone entry document with default options.
pub fn parse_entry(xml: &str) -> Result<Entry> {
    AtomFormatter::default().read_entry(xml)
}

/// Writes a feed document with default options.
pub fn write_feed(feed: &Feed) -> Result<String> {
    AtomFormatter::default().write_feed(feed)
}

/// Writes a standalone entry document with default options.
pub fn write_entry(entry: &Entry) -> Result<String> {
    AtomFormatter::default().write_entry(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::TextKind;

    const SIMPLE_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xml:lang="en" xml:base="http://example.org/">
  <title>Example Feed</title>
  <subtitle type="html">&lt;i&gt;nice&lt;/i&gt;</subtitle>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2003-12-13T18:30:02Z</updated>
  <author><name>John Doe</name><email>jd@example.org</email></author>
  <link rel="alternate" type="text/html" href="http://example.org/"/>
  <category term="tech" scheme="http://example.org/cats" label="Tech"/>
  <generator>Example Toolkit</generator>
  <logo>http://example.org/logo.png</logo>
  <icon>http://example.org/icon.png</icon>
  <entry>
    <id>urn:x:1</id>
    <title>First</title>
    <updated>2003-12-13T18:30:02Z</updated>
    <summary>Some text.</summary>
  </entry>
</feed>"#;

    #[test]
    fn reads_known_feed_fields() {
        let feed = parse_feed(SIMPLE_FEED).unwrap();
        assert_eq!(feed.title.as_ref().unwrap().value, "Example Feed");
        assert_eq!(feed.subtitle.as_ref().unwrap().kind, TextKind::Html);
        assert_eq!(feed.subtitle.as_ref().unwrap().value, "<i>nice</i>");
        assert_eq!(
            feed.id.as_deref(),
            Some("urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6")
        );
        assert_eq!(feed.language.as_deref(), Some("en"));
        assert_eq!(feed.base_uri.as_deref(), Some("http://example.org/"));
        assert_eq!(feed.generator.as_deref(), Some("Example Toolkit"));
        assert_eq!(feed.logo.as_deref(), Some("http://example.org/logo.png"));
        assert_eq!(feed.icon.as_deref(), Some("http://example.org/icon.png"));
        assert_eq!(feed.authors.len(), 1);
        assert_eq!(feed.authors[0].name.as_deref(), Some("John Doe"));
        assert_eq!(feed.links.len(), 1);
        assert_eq!(feed.links[0].rel.as_deref(), Some("alternate"));
        assert_eq!(feed.categories.len(), 1);
        assert_eq!(feed.categories[0].term, "tech");
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(
            feed.entries[0].summary.as_ref().unwrap().value,
            "Some text."
        );
        assert!(feed.element_extensions.is_empty());
        assert!(feed.attribute_extensions.is_empty());
    }

    #[test]
    fn rejects_foreign_root() {
        let err = parse_feed(r#"<rss version="2.0"><channel/></rss>"#).unwrap_err();
        assert!(matches!(err, Error::Structural { .. }));
    }

    #[test]
    fn unknown_children_become_extensions() {
        let feed = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:x">
                 <title>t</title>
                 <x:mine><x:deep>v</x:deep></x:mine>
               </feed>"#,
        )
        .unwrap();
        assert_eq!(feed.element_extensions.len(), 1);
        let fragment = feed.element_extensions.get(0).unwrap();
        assert_eq!(fragment.local_name(), "mine");
        assert_eq!(fragment.namespace(), "urn:x");
        assert_eq!(fragment.raw(), r#"<x:mine xmlns:x="urn:x"><x:deep>v</x:deep></x:mine>"#);
    }

    #[test]
    fn unknown_attributes_become_extensions() {
        let feed = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:x" x:mark="7"><title>t</title></feed>"#,
        )
        .unwrap();
        assert_eq!(feed.attribute_extensions.get("mark", "urn:x"), Some("7"));
    }

    #[test]
    fn entry_base_uri_combines_with_feed_base() {
        let feed = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom" xml:base="http://example.org/a/">
                 <entry xml:base="sub/"><id>urn:x:1</id></entry>
               </feed>"#,
        )
        .unwrap();
        assert_eq!(
            feed.entries[0].base_uri.as_deref(),
            Some("http://example.org/a/sub/")
        );
    }

    #[test]
    fn entries_inside_source_are_not_items() {
        let entry = parse_entry(
            r#"<entry xmlns="http://www.w3.org/2005/Atom">
                 <id>urn:x:1</id>
                 <source>
                   <title>Origin</title>
                   <entry><id>urn:x:nested</id></entry>
                 </source>
               </entry>"#,
        )
        .unwrap();
        let source = entry.source.unwrap();
        assert_eq!(source.title.as_ref().unwrap().value, "Origin");
        assert!(source.entries.is_empty());
        assert_eq!(source.element_extensions.len(), 1);
        assert_eq!(source.element_extensions.get(0).unwrap().local_name(), "entry");
    }

    #[test]
    fn malformed_updated_is_wrapped_with_entry_context() {
        let err = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                 <entry><updated>not a date</updated></entry>
               </feed>"#,
        )
        .unwrap_err();
        match err {
            Error::Nested { context, source, .. } => {
                assert_eq!(context, "entry");
                assert!(matches!(*source, Error::UnparsableDate { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_link_length_is_an_error() {
        let err = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                 <link href="http://e/" length="ten"/>
               </feed>"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Nested { context: "link", .. }));
    }

    #[test]
    fn write_synthesizes_required_fields() {
        let out = write_feed(&Feed::default()).unwrap();
        assert!(out.starts_with(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#));
        assert!(out.contains(r#"<title type="text"></title>"#));
        assert!(out.contains("<id>uuid:"));
        assert!(out.contains("<updated>"));
    }

    #[test]
    fn source_feed_is_written_without_synthesis() {
        let entry = Entry {
            id: Some("urn:x:1".into()),
            title: Some(TextContent::plain("t")),
            updated: Some(parse_date("2003-12-13T18:30:02Z", 0).unwrap()),
            source: Some(Box::new(Feed::default())),
            ..Entry::default()
        };
        let out = write_entry(&entry).unwrap();
        assert!(out.contains("<source></source>"));
    }

    #[test]
    fn zero_length_link_attribute_is_omitted() {
        let feed = Feed {
            links: vec![Link {
                href: Some("http://e/".into()),
                ..Link::default()
            }],
            ..Feed::default()
        };
        let out = write_feed(&feed).unwrap();
        assert!(out.contains(r#"<link href="http://e/"/>"#));
        assert!(!out.contains("length"));
    }

    #[test]
    fn attribute_hook_claims_before_extension_capture() {
        let formatter = AtomFormatter::default()
            .with_attribute_hook(|name, _| name.local == "claimed");
        let feed = formatter
            .read_feed(
                r#"<feed xmlns="http://www.w3.org/2005/Atom" claimed="1" kept="2"><title>t</title></feed>"#,
            )
            .unwrap();
        assert!(feed.attribute_extensions.get("claimed", "").is_none());
        assert_eq!(feed.attribute_extensions.get("kept", ""), Some("2"));
    }

    #[test]
    fn element_hook_consumes_claimed_children() {
        let formatter = AtomFormatter::default().with_element_hook(|cursor| {
            if cursor.is_start_of("claimed", "urn:x")? {
                cursor.skip_element()?;
                Ok(true)
            } else {
                Ok(false)
            }
        });
        let feed = formatter
            .read_feed(
                r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:x">
                     <title>t</title><x:claimed/><x:kept/>
                   </feed>"#,
            )
            .unwrap();
        assert_eq!(feed.element_extensions.len(), 1);
        assert_eq!(feed.element_extensions.get(0).unwrap().local_name(), "kept");
    }

    #[test]
    fn contaminated_factory_is_rejected() {
        let result = AtomFormatter::default().with_feed_factory(|| Feed {
            entries: vec![Entry::default()],
            ..Feed::default()
        });
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn factory_scalar_defaults_are_allowed() {
        let formatter = AtomFormatter::default()
            .with_feed_factory(|| Feed {
                generator: Some("preset".into()),
                ..Feed::default()
            })
            .unwrap();
        let feed = formatter
            .read_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>t</title></feed>"#)
            .unwrap();
        assert_eq!(feed.generator.as_deref(), Some("preset"));
    }

    #[test]
    fn skip_extensions_drops_unrecognized_markup() {
        let formatter = AtomFormatter::new(FormatterOptions::skip_extensions());
        let feed = formatter
            .read_feed(
                r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:x" x:a="1">
                     <title>t</title><x:e/>
                   </feed>"#,
            )
            .unwrap();
        assert!(feed.attribute_extensions.is_empty());
        assert!(feed.element_extensions.is_empty());
    }

    #[test]
    fn route_attribute_reports_dispatch() {
        let formatter = AtomFormatter::default().with_attribute_hook(|name, _| name.local == "h");
        let mut extensions = ExtensionAttributes::default();
        let hooked = XmlAttribute {
            local: "h".into(),
            namespace: String::new(),
            value: "1".into(),
        };
        let plain = XmlAttribute {
            local: "p".into(),
            namespace: String::new(),
            value: "2".into(),
        };
        let schema = XmlAttribute {
            local: "type".into(),
            namespace: "http://www.w3.org/2001/XMLSchema-instance".into(),
            value: "x:t".into(),
        };
        assert_eq!(formatter.route_attribute(&hooked, &mut extensions), Dispatch::Hooked);
        assert_eq!(formatter.route_attribute(&plain, &mut extensions), Dispatch::Extension);
        assert_eq!(formatter.route_attribute(&schema, &mut extensions), Dispatch::Ignored);
        assert_eq!(extensions.len(), 1);
    }
}
