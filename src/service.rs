//! AtomPub (RFC 5023) service and categories documents.
//!
//! A service document is a tree: service, workspaces, collections. Titles
//! are ordinary Atom text constructs, collections carry accepted media
//! types, an `href` link and category documents, and every level inherits
//! and combines `xml:base`. Categories documents come in two shapes,
//! decided by the `href` attribute: inline (categories listed in place,
//! with an optional default scheme and fixed flag) or referenced (just a
//! link, no categories). AtomPub elements are written with the `app`
//! prefix; the Atom prefix `a10` is declared up front on the root.

use std::io;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::atom::{into_string, write_category, AtomFormatter, Category, FormatterOptions};
use crate::content::{read_text_construct, write_text_construct, TextContent};
use crate::error::{Error, Result};
use crate::ext::{
    extend_with_extension_attributes, write_extension_elements, ExtensionAttributes,
    ExtensionCapture, ExtensionElements,
};
use crate::uri::{base_to_write, combine_xml_base};
use crate::xml::{write_err, write_text_element, XmlCursor, APP_NS, ATOM_NS, XML_NS};

const WORKSPACE_TITLE_PATH: &str = "//app:service/app:workspace/atom:title[@type]";
const COLLECTION_TITLE_PATH: &str = "//app:service/app:workspace/app:collection/atom:title[@type]";

/// An AtomPub service document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDocument {
    /// `xml:lang` of the service element.
    pub language: Option<String>,
    /// Effective base URI.
    pub base_uri: Option<String>,
    /// Workspaces, in document order.
    pub workspaces: Vec<Workspace>,
    /// Unrecognized attributes.
    pub attribute_extensions: ExtensionAttributes,
    /// Unrecognized child elements, verbatim.
    pub element_extensions: ExtensionElements,
}

/// A named group of collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workspace {
    /// Workspace title text construct.
    pub title: Option<TextContent>,
    /// Effective base URI.
    pub base_uri: Option<String>,
    /// Member collections.
    pub collections: Vec<Collection>,
    /// Unrecognized attributes.
    pub attribute_extensions: ExtensionAttributes,
    /// Unrecognized child elements, verbatim.
    pub element_extensions: ExtensionElements,
}

/// An editable collection within a workspace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    /// Collection title text construct.
    pub title: Option<TextContent>,
    /// The collection URI (`href` attribute).
    pub link: Option<String>,
    /// Effective base URI.
    pub base_uri: Option<String>,
    /// Accepted media types, one per `accept` element.
    pub accepts: Vec<String>,
    /// Category documents scoping what members may be tagged with.
    pub categories: Vec<CategoriesDocument>,
    /// Unrecognized attributes.
    pub attribute_extensions: ExtensionAttributes,
    /// Unrecognized child elements, verbatim.
    pub element_extensions: ExtensionElements,
}

/// A categories document, in one of its two wire shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoriesDocument {
    /// Categories listed in place.
    Inline(InlineCategories),
    /// Categories living at another URI.
    Referenced(ReferencedCategories),
}

/// Categories listed directly in the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineCategories {
    /// `xml:lang` of the categories element.
    pub language: Option<String>,
    /// Effective base URI.
    pub base_uri: Option<String>,
    /// True when the set is closed (`fixed="yes"`).
    pub is_fixed: bool,
    /// Default scheme, inherited by contained categories lacking their own.
    pub scheme: Option<String>,
    /// The categories.
    pub categories: Vec<Category>,
    /// Unrecognized attributes.
    pub attribute_extensions: ExtensionAttributes,
    /// Unrecognized child elements, verbatim.
    pub element_extensions: ExtensionElements,
}

/// A pointer to an out-of-line categories document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferencedCategories {
    /// `xml:lang` of the categories element.
    pub language: Option<String>,
    /// Effective base URI.
    pub base_uri: Option<String>,
    /// Where the categories live (`href` attribute).
    pub link: Option<String>,
    /// Unrecognized attributes.
    pub attribute_extensions: ExtensionAttributes,
    /// Unrecognized child elements, verbatim.
    pub element_extensions: ExtensionElements,
}

/// Reader/writer for standalone categories documents.
pub struct CategoriesFormatter {
    atom: AtomFormatter,
    new_inline: Box<dyn Fn() -> InlineCategories + Send + Sync>,
    new_referenced: Box<dyn Fn() -> ReferencedCategories + Send + Sync>,
}

impl Default for CategoriesFormatter {
    fn default() -> Self {
        CategoriesFormatter::new(FormatterOptions::default())
    }
}

impl CategoriesFormatter {
    /// Creates a formatter with the given options and default factories.
    pub fn new(options: FormatterOptions) -> Self {
        CategoriesFormatter {
            atom: AtomFormatter::new(options),
            new_inline: Box::new(InlineCategories::default),
            new_referenced: Box::new(ReferencedCategories::default),
        }
    }

    /// Installs a factory for inline documents, validated once: it may
    /// preset scalar defaults but must not carry categories or extensions.
    pub fn with_inline_factory(
        mut self,
        factory: impl Fn() -> InlineCategories + Send + Sync + 'static,
    ) -> Result<Self> {
        let probe = factory();
        if !probe.categories.is_empty()
            || !probe.attribute_extensions.is_empty()
            || !probe.element_extensions.is_empty()
        {
            return Err(Error::InvalidConfiguration(
                "inline categories factory must produce instances without categories or extensions"
                    .into(),
            ));
        }
        self.new_inline = Box::new(factory);
        Ok(self)
    }

    /// Installs a factory for referenced documents, validated once: it must
    /// not preset the link or carry extensions.
    pub fn with_referenced_factory(
        mut self,
        factory: impl Fn() -> ReferencedCategories + Send + Sync + 'static,
    ) -> Result<Self> {
        let probe = factory();
        if probe.link.is_some()
            || !probe.attribute_extensions.is_empty()
            || !probe.element_extensions.is_empty()
        {
            return Err(Error::InvalidConfiguration(
                "referenced categories factory must produce instances without a link or extensions"
                    .into(),
            ));
        }
        self.new_referenced = Box::new(factory);
        Ok(self)
    }

    /// Reads a standalone categories document.
    pub fn read_categories(&self, xml: &str) -> Result<CategoriesDocument> {
        let mut cursor = XmlCursor::new(xml);
        cursor.expect_root("categories", APP_NS, "categories document")?;
        self.read_document(&mut cursor, None)
    }

    /// Writes a standalone categories document.
    pub fn write_categories(&self, document: &CategoriesDocument) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_document(&mut writer, document, true, None)?;
        into_string(writer)
    }

    /// Reads an `app:categories` element, inline or referenced by `href`.
    pub(crate) fn read_document(
        &self,
        cursor: &mut XmlCursor<'_>,
        inherited_base: Option<&str>,
    ) -> Result<CategoriesDocument> {
        let attrs = cursor.attributes()?;
        let href = attrs
            .iter()
            .find(|a| a.namespace.is_empty() && a.local == "href")
            .map(|a| a.value.clone());

        if let Some(link) = href {
            let mut document = (self.new_referenced)();
            document.base_uri = inherited_base.map(str::to_owned);
            document.link = Some(link);
            for attr in &attrs {
                if attr.namespace == XML_NS && attr.local == "base" {
                    document.base_uri = combine_xml_base(document.base_uri.as_deref(), &attr.value);
                } else if attr.namespace == XML_NS && attr.local == "lang" {
                    document.language = Some(attr.value.clone());
                } else if attr.namespace.is_empty() && attr.local == "href" {
                    // consumed above
                } else {
                    self.atom
                        .route_attribute(attr, &mut document.attribute_extensions);
                }
            }
            let mut capture = ExtensionCapture::new(self.atom.options().max_extension_size);
            if cursor.enter()? {
                while cursor.is_start()? {
                    self.atom.route_element(cursor, &mut capture)?;
                }
                cursor.leave()?;
            }
            document.element_extensions = capture.finish()?;
            return Ok(CategoriesDocument::Referenced(document));
        }

        let mut document = (self.new_inline)();
        document.base_uri = inherited_base.map(str::to_owned);
        for attr in &attrs {
            if attr.namespace == XML_NS && attr.local == "base" {
                document.base_uri = combine_xml_base(document.base_uri.as_deref(), &attr.value);
            } else if attr.namespace == XML_NS && attr.local == "lang" {
                document.language = Some(attr.value.clone());
            } else if attr.namespace.is_empty() && attr.local == "fixed" {
                document.is_fixed = attr.value == "yes";
            } else if attr.namespace.is_empty() && attr.local == "scheme" {
                document.scheme = Some(attr.value.clone());
            } else {
                self.atom
                    .route_attribute(attr, &mut document.attribute_extensions);
            }
        }
        let mut capture = ExtensionCapture::new(self.atom.options().max_extension_size);
        if cursor.enter()? {
            while cursor.is_start()? {
                if cursor.is_start_of("category", ATOM_NS)? {
                    let position = cursor.position();
                    let mut category = self
                        .atom
                        .read_category(cursor)
                        .map_err(|e| Error::nested("category", position, e))?;
                    if category.scheme.is_none() {
                        category.scheme = document.scheme.clone();
                    }
                    document.categories.push(category);
                } else {
                    self.atom.route_element(cursor, &mut capture)?;
                }
            }
            cursor.leave()?;
        }
        document.element_extensions = capture.finish()?;
        Ok(CategoriesDocument::Inline(document))
    }

    pub(crate) fn write_document<W: io::Write>(
        &self,
        w: &mut Writer<W>,
        document: &CategoriesDocument,
        is_root: bool,
        inherited_base: Option<&str>,
    ) -> Result<()> {
        let mut start = BytesStart::new("app:categories");
        if is_root {
            start.push_attribute(("xmlns:app", APP_NS));
            start.push_attribute(("xmlns:a10", ATOM_NS));
        }
        match document {
            CategoriesDocument::Inline(inline) => {
                if let Some(language) = &inline.language {
                    start.push_attribute(("xml:lang", language.as_str()));
                }
                if let Some(base) = base_to_write(inherited_base, inline.base_uri.as_deref()) {
                    start.push_attribute(("xml:base", base));
                }
                if let Some(scheme) = &inline.scheme {
                    start.push_attribute(("scheme", scheme.as_str()));
                }
                // Absent means "no", so only "yes" is ever written.
                if inline.is_fixed {
                    start.push_attribute(("fixed", "yes"));
                }
                extend_with_extension_attributes(&mut start, &inline.attribute_extensions);
                w.write_event(Event::Start(start)).map_err(write_err)?;
                for category in &inline.categories {
                    write_category(w, "a10:category", category)?;
                }
                write_extension_elements(w, &inline.element_extensions)?;
                w.write_event(Event::End(BytesEnd::new("app:categories")))
                    .map_err(write_err)
            }
            CategoriesDocument::Referenced(referenced) => {
                if let Some(language) = &referenced.language {
                    start.push_attribute(("xml:lang", language.as_str()));
                }
                if let Some(base) = base_to_write(inherited_base, referenced.base_uri.as_deref()) {
                    start.push_attribute(("xml:base", base));
                }
                if let Some(link) = &referenced.link {
                    start.push_attribute(("href", link.as_str()));
                }
                extend_with_extension_attributes(&mut start, &referenced.attribute_extensions);
                if referenced.element_extensions.is_empty() {
                    w.write_event(Event::Empty(start)).map_err(write_err)
                } else {
                    w.write_event(Event::Start(start)).map_err(write_err)?;
                    write_extension_elements(w, &referenced.element_extensions)?;
                    w.write_event(Event::End(BytesEnd::new("app:categories")))
                        .map_err(write_err)
                }
            }
        }
    }
}

/// Reader/writer for AtomPub service documents.
pub struct ServiceFormatter {
    atom: AtomFormatter,
    categories: CategoriesFormatter,
    new_document: Box<dyn Fn() -> ServiceDocument + Send + Sync>,
}

impl Default for ServiceFormatter {
    fn default() -> Self {
        ServiceFormatter::new(FormatterOptions::default())
    }
}

impl ServiceFormatter {
    /// Creates a formatter with the given options and default factories.
    pub fn new(options: FormatterOptions) -> Self {
        ServiceFormatter {
            atom: AtomFormatter::new(options),
            categories: CategoriesFormatter::new(options),
            new_document: Box::new(ServiceDocument::default),
        }
    }

    /// Installs a factory for service documents, validated once: it may
    /// preset scalar defaults but must not carry workspaces or extensions.
    pub fn with_document_factory(
        mut self,
        factory: impl Fn() -> ServiceDocument + Send + Sync + 'static,
    ) -> Result<Self> {
        let probe = factory();
        if !probe.workspaces.is_empty()
            || !probe.attribute_extensions.is_empty()
            || !probe.element_extensions.is_empty()
        {
            return Err(Error::InvalidConfiguration(
                "service document factory must produce instances without workspaces or extensions"
                    .into(),
            ));
        }
        self.new_document = Box::new(factory);
        Ok(self)
    }

    /// Installs a factory for inline categories documents.
    pub fn with_inline_categories_factory(
        mut self,
        factory: impl Fn() -> InlineCategories + Send + Sync + 'static,
    ) -> Result<Self> {
        self.categories = self.categories.with_inline_factory(factory)?;
        Ok(self)
    }

    /// Installs a factory for referenced categories documents.
    pub fn with_referenced_categories_factory(
        mut self,
        factory: impl Fn() -> ReferencedCategories + Send + Sync + 'static,
    ) -> Result<Self> {
        self.categories = self.categories.with_referenced_factory(factory)?;
        Ok(self)
    }

    /// Reads a service document.
    pub fn read_service(&self, xml: &str) -> Result<ServiceDocument> {
        let mut cursor = XmlCursor::new(xml);
        cursor.expect_root("service", APP_NS, "service document")?;
        let mut document = (self.new_document)();
        for attr in &cursor.attributes()? {
            if attr.namespace == XML_NS && attr.local == "base" {
                document.base_uri = combine_xml_base(document.base_uri.as_deref(), &attr.value);
            } else if attr.namespace == XML_NS && attr.local == "lang" {
                document.language = Some(attr.value.clone());
            } else {
                self.atom
                    .route_attribute(attr, &mut document.attribute_extensions);
            }
        }
        let mut capture = ExtensionCapture::new(self.atom.options().max_extension_size);
        if cursor.enter()? {
            while cursor.is_start()? {
                if cursor.is_start_of("workspace", APP_NS)? {
                    let position = cursor.position();
                    let workspace = self
                        .read_workspace(&mut cursor, document.base_uri.as_deref())
                        .map_err(|e| Error::nested("workspace", position, e))?;
                    document.workspaces.push(workspace);
                } else {
                    self.atom.route_element(&mut cursor, &mut capture)?;
                }
            }
            cursor.leave()?;
        }
        document.element_extensions = capture.finish()?;
        Ok(document)
    }

    fn read_workspace(
        &self,
        cursor: &mut XmlCursor<'_>,
        inherited_base: Option<&str>,
    ) -> Result<Workspace> {
        let mut workspace = Workspace {
            base_uri: inherited_base.map(str::to_owned),
            ..Workspace::default()
        };
        for attr in &cursor.attributes()? {
            if attr.namespace == XML_NS && attr.local == "base" {
                workspace.base_uri = combine_xml_base(workspace.base_uri.as_deref(), &attr.value);
            } else {
                self.atom
                    .route_attribute(attr, &mut workspace.attribute_extensions);
            }
        }
        let mut capture = ExtensionCapture::new(self.atom.options().max_extension_size);
        if cursor.enter()? {
            while cursor.is_start()? {
                if cursor.is_start_of("title", ATOM_NS)? {
                    workspace.title = Some(read_text_construct(
                        cursor,
                        WORKSPACE_TITLE_PATH,
                        self.atom.options().preserve_attribute_extensions,
                    )?);
                } else if cursor.is_start_of("collection", APP_NS)? {
                    let position = cursor.position();
                    let collection = self
                        .read_collection(cursor, workspace.base_uri.as_deref())
                        .map_err(|e| Error::nested("collection", position, e))?;
                    workspace.collections.push(collection);
                } else {
                    self.atom.route_element(cursor, &mut capture)?;
                }
            }
            cursor.leave()?;
        }
        workspace.element_extensions = capture.finish()?;
        Ok(workspace)
    }

    fn read_collection(
        &self,
        cursor: &mut XmlCursor<'_>,
        inherited_base: Option<&str>,
    ) -> Result<Collection> {
        let mut collection = Collection {
            base_uri: inherited_base.map(str::to_owned),
            ..Collection::default()
        };
        for attr in &cursor.attributes()? {
            if attr.namespace == XML_NS && attr.local == "base" {
                collection.base_uri = combine_xml_base(collection.base_uri.as_deref(), &attr.value);
            } else if attr.namespace.is_empty() && attr.local == "href" {
                collection.link = Some(attr.value.clone());
            } else {
                self.atom
                    .route_attribute(attr, &mut collection.attribute_extensions);
            }
        }
        let mut capture = ExtensionCapture::new(self.atom.options().max_extension_size);
        if cursor.enter()? {
            while cursor.is_start()? {
                if cursor.is_start_of("title", ATOM_NS)? {
                    collection.title = Some(read_text_construct(
                        cursor,
                        COLLECTION_TITLE_PATH,
                        self.atom.options().preserve_attribute_extensions,
                    )?);
                } else if cursor.is_start_of("categories", APP_NS)? {
                    let position = cursor.position();
                    let document = self
                        .categories
                        .read_document(cursor, collection.base_uri.as_deref())
                        .map_err(|e| Error::nested("categories document", position, e))?;
                    collection.categories.push(document);
                } else if cursor.is_start_of("accept", APP_NS)? {
                    collection.accepts.push(cursor.read_element_text()?);
                } else {
                    self.atom.route_element(cursor, &mut capture)?;
                }
            }
            cursor.leave()?;
        }
        collection.element_extensions = capture.finish()?;
        Ok(collection)
    }

    /// Writes a service document.
    pub fn write_service(&self, document: &ServiceDocument) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        let mut start = BytesStart::new("app:service");
        start.push_attribute(("xmlns:app", APP_NS));
        start.push_attribute(("xmlns:a10", ATOM_NS));
        if let Some(language) = &document.language {
            start.push_attribute(("xml:lang", language.as_str()));
        }
        if let Some(base) = &document.base_uri {
            start.push_attribute(("xml:base", base.as_str()));
        }
        extend_with_extension_attributes(&mut start, &document.attribute_extensions);
        writer.write_event(Event::Start(start)).map_err(write_err)?;
        for workspace in &document.workspaces {
            self.write_workspace(&mut writer, workspace, document.base_uri.as_deref())?;
        }
        write_extension_elements(&mut writer, &document.element_extensions)?;
        writer
            .write_event(Event::End(BytesEnd::new("app:service")))
            .map_err(write_err)?;
        into_string(writer)
    }

    fn write_workspace<W: io::Write>(
        &self,
        w: &mut Writer<W>,
        workspace: &Workspace,
        inherited_base: Option<&str>,
    ) -> Result<()> {
        let mut start = BytesStart::new("app:workspace");
        if let Some(base) = base_to_write(inherited_base, workspace.base_uri.as_deref()) {
            start.push_attribute(("xml:base", base));
        }
        extend_with_extension_attributes(&mut start, &workspace.attribute_extensions);
        w.write_event(Event::Start(start)).map_err(write_err)?;
        if let Some(title) = &workspace.title {
            write_text_construct(w, "a10:title", title)?;
        }
        for collection in &workspace.collections {
            self.write_collection(w, collection, workspace.base_uri.as_deref())?;
        }
        write_extension_elements(w, &workspace.element_extensions)?;
        w.write_event(Event::End(BytesEnd::new("app:workspace")))
            .map_err(write_err)
    }

    fn write_collection<W: io::Write>(
        &self,
        w: &mut Writer<W>,
        collection: &Collection,
        inherited_base: Option<&str>,
    ) -> Result<()> {
        let mut start = BytesStart::new("app:collection");
        if let Some(base) = base_to_write(inherited_base, collection.base_uri.as_deref()) {
            start.push_attribute(("xml:base", base));
        }
        if let Some(link) = &collection.link {
            start.push_attribute(("href", link.as_str()));
        }
        extend_with_extension_attributes(&mut start, &collection.attribute_extensions);
        w.write_event(Event::Start(start)).map_err(write_err)?;
        if let Some(title) = &collection.title {
            write_text_construct(w, "a10:title", title)?;
        }
        for accept in &collection.accepts {
            write_text_element(w, "app:accept", accept)?;
        }
        for document in &collection.categories {
            self.categories
                .write_document(w, document, false, collection.base_uri.as_deref())?;
        }
        write_extension_elements(w, &collection.element_extensions)?;
        w.write_event(Event::End(BytesEnd::new("app:collection")))
            .map_err(write_err)
    }
}

/// Reads a service document with default options.
pub fn parse_service_document(xml: &str) -> Result<ServiceDocument> {
    ServiceFormatter::default().read_service(xml)
}

/// Writes a service document with default options.
pub fn write_service_document(document: &ServiceDocument) -> Result<String> {
    ServiceFormatter::default().write_service(document)
}

/// Reads a standalone categories document with default options.
pub fn parse_categories_document(xml: &str) -> Result<CategoriesDocument> {
    CategoriesFormatter::default().read_categories(xml)
}

/// Writes a standalone categories document with default options.
pub fn write_categories_document(document: &CategoriesDocument) -> Result<String> {
    CategoriesFormatter::default().write_categories(document)
}
