//! Lossless Atom 1.0 and AtomPub reader/writer.
//!
//! `atomio` converts between an in-memory syndication model and the Atom
//! 1.0 feed/entry vocabulary (RFC 4287) plus the AtomPub service and
//! categories documents (RFC 5023). Its distinguishing property is
//! losslessness: every element and attribute the object model does not
//! recognize is preserved verbatim in an extension store and re-emitted on
//! write, so documents survive round trips across systems with different
//! extension vocabularies.
//!
//! # Reading and writing feeds
//!
//! ```no_run
//! use atomio::{parse_feed, write_feed};
//!
//! let xml = std::fs::read_to_string("feed.xml")?;
//! let feed = parse_feed(&xml)?;
//! println!("{} entries", feed.entries.len());
//! let out = write_feed(&feed)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Configured formatters
//!
//! [`AtomFormatter`], [`ServiceFormatter`] and [`CategoriesFormatter`]
//! accept [`FormatterOptions`] (extension preservation flags and a byte cap
//! on captured extension markup), instance factories, an identifier
//! generator for synthesized `atom:id` values, and hooks that may claim
//! unrecognized markup before it reaches the extension store.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod atom;
mod content;
mod datetime;
mod error;
mod ext;
mod ident;
mod service;
mod uri;
mod xml;

pub use atom::{
    parse_entry, parse_feed, write_entry, write_feed, AtomFormatter, AttributeHook, Category,
    Dispatch, ElementHook, Entry, Feed, FormatterOptions, Link, Person,
};
pub use content::{Content, TextContent, TextKind};
pub use datetime::{format_date, parse_date};
pub use error::{Error, Result};
pub use ext::{ExtensionAttributes, ExtensionElement, ExtensionElements, XmlName};
pub use ident::{IdGenerator, RandomIdGenerator};
pub use service::{
    parse_categories_document, parse_service_document, write_categories_document,
    write_service_document, CategoriesDocument, CategoriesFormatter, Collection,
    InlineCategories, ReferencedCategories, ServiceDocument, ServiceFormatter, Workspace,
};
pub use uri::combine_xml_base;
pub use xml::{XmlAttribute, XmlCursor, APP_NS, ATOM_NS, XML_NS};
