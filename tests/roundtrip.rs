//! End-to-end round-trip properties over whole documents.

use pretty_assertions::assert_eq;

use atomio::{
    parse_categories_document, parse_entry, parse_feed, parse_service_document, write_entry,
    write_feed, write_service_document, AtomFormatter, CategoriesDocument, Category, Collection,
    Content, Entry, Error, Feed, FormatterOptions, InlineCategories, Link, Person,
    ReferencedCategories, ServiceDocument, TextContent, Workspace,
};

fn sample_feed() -> Feed {
    let mut feed = Feed {
        title: Some(TextContent::plain("Example Feed")),
        subtitle: Some(TextContent::html("<i>nice</i>")),
        rights: Some(TextContent::plain("CC0")),
        id: Some("urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6".into()),
        generator: Some("Example Toolkit".into()),
        logo: Some("http://example.org/logo.png".into()),
        icon: Some("http://example.org/icon.png".into()),
        language: Some("en".into()),
        updated: Some(atomio::parse_date("2003-12-13T18:30:02Z", 0).unwrap()),
        authors: vec![Person {
            name: Some("John Doe".into()),
            email: Some("jd@example.org".into()),
            uri: Some("http://example.org/john".into()),
            ..Person::default()
        }],
        contributors: vec![Person {
            name: Some("Jane Roe".into()),
            ..Person::default()
        }],
        categories: vec![Category {
            term: "tech".into(),
            scheme: Some("http://example.org/cats".into()),
            label: Some("Tech".into()),
            ..Category::default()
        }],
        links: vec![Link {
            href: Some("http://example.org/".into()),
            rel: Some("alternate".into()),
            media_type: Some("text/html".into()),
            title: Some("home".into()),
            length: 4096,
            ..Link::default()
        }],
        ..Feed::default()
    };
    feed.entries.push(Entry {
        id: Some("urn:x:1".into()),
        title: Some(TextContent::plain("First")),
        summary: Some(TextContent::plain("Some text.")),
        updated: Some(atomio::parse_date("2003-12-13T18:30:02Z", 0).unwrap()),
        published: Some(atomio::parse_date("2003-12-12T08:00:00+01:00", 0).unwrap()),
        content: Some(Content::Text(TextContent::plain("body"))),
        links: vec![Link {
            href: Some("http://example.org/1".into()),
            ..Link::default()
        }],
        ..Entry::default()
    });
    feed
}

#[test]
fn feed_round_trips_field_for_field() {
    let feed = sample_feed();
    let reread = parse_feed(&write_feed(&feed).unwrap()).unwrap();
    assert_eq!(reread, feed);
}

#[test]
fn written_feed_is_stable_across_a_round_trip() {
    let feed = sample_feed();
    let first = write_feed(&feed).unwrap();
    let second = write_feed(&parse_feed(&first).unwrap()).unwrap();
    assert_eq!(second, first);
}

#[test]
fn entry_document_round_trips() {
    let entry = Entry {
        id: Some("urn:x:9".into()),
        title: Some(TextContent::plain("Standalone")),
        updated: Some(atomio::parse_date("2017-07-06T20:25:00Z", 0).unwrap()),
        content: Some(Content::Url {
            url: "http://example.org/a.mp3".into(),
            media_type: "audio/mpeg".into(),
            attribute_extensions: Default::default(),
        }),
        ..Entry::default()
    };
    let reread = parse_entry(&write_entry(&entry).unwrap()).unwrap();
    assert_eq!(reread, entry);
}

#[test]
fn extensions_survive_a_round_trip() {
    let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:dc="http://purl.org/dc/elements/1.1/" dc:rights="reserved">
  <title>t</title>
  <id>urn:x:f</id>
  <updated>2003-12-13T18:30:02Z</updated>
  <dc:creator>Alice</dc:creator>
  <dc:subject><dc:topic>tests</dc:topic></dc:subject>
  <entry>
    <id>urn:x:1</id>
    <title>e</title>
    <updated>2003-12-13T18:30:02Z</updated>
    <dc:creator>Bob</dc:creator>
  </entry>
</feed>"#;
    let feed = parse_feed(xml).unwrap();
    assert_eq!(feed.element_extensions.len(), 2);
    assert_eq!(
        feed.attribute_extensions
            .get("rights", "http://purl.org/dc/elements/1.1/"),
        Some("reserved")
    );
    assert_eq!(feed.entries[0].element_extensions.len(), 1);

    let reread = parse_feed(&write_feed(&feed).unwrap()).unwrap();
    assert_eq!(reread.element_extensions, feed.element_extensions);
    assert_eq!(reread.attribute_extensions, feed.attribute_extensions);
    assert_eq!(
        reread.entries[0].element_extensions,
        feed.entries[0].element_extensions
    );
}

#[test]
fn many_extensions_keep_their_order_and_are_ordinally_addressable() {
    let mut feed = sample_feed();
    for i in 0..10 {
        feed.element_extensions
            .push_fragment(&format!(r#"<n:item xmlns:n="urn:n" seq="{i}"/>"#))
            .unwrap();
    }
    let reread = parse_feed(&write_feed(&feed).unwrap()).unwrap();
    assert_eq!(reread.element_extensions.len(), 10);
    for i in 0..10 {
        let fragment = reread.element_extensions.get(i).unwrap();
        assert_eq!(fragment.local_name(), "item");
        assert_eq!(fragment.namespace(), "urn:n");
        assert!(fragment.raw().contains(&format!(r#"seq="{i}""#)));
    }
}

#[test]
fn extension_namespace_survives_a_descendant_redeclaration() {
    let feed = parse_feed(
        r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:x">
             <x:a><x:b xmlns:x="urn:other"/></x:a>
           </feed>"#,
    )
    .unwrap();
    assert_eq!(feed.element_extensions.get(0).unwrap().namespace(), "urn:x");

    let reread = parse_feed(&write_feed(&feed).unwrap()).unwrap();
    let fragment = reread.element_extensions.get(0).unwrap();
    assert_eq!(fragment.local_name(), "a");
    assert_eq!(fragment.namespace(), "urn:x");
    assert!(fragment.raw().contains(r#"<x:b xmlns:x="urn:other"/>"#));
}

#[test]
fn fractional_and_zulu_dates_read_the_same() {
    let with_fraction = parse_feed(
        r#"<feed xmlns="http://www.w3.org/2005/Atom">
             <updated>2017-07-06T20:25:00.1234+00:00</updated>
           </feed>"#,
    )
    .unwrap();
    let zulu = parse_feed(
        r#"<feed xmlns="http://www.w3.org/2005/Atom">
             <updated>2017-07-06T20:25:00Z</updated>
           </feed>"#,
    )
    .unwrap();
    assert_eq!(with_fraction.updated, zulu.updated);
}

#[test]
fn xhtml_title_keeps_raw_markup() {
    let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml">A <b>big</b> day</div></title></feed>"#;
    let feed = parse_feed(xml).unwrap();
    let title = feed.title.as_ref().unwrap();
    assert_eq!(
        title.value,
        r#"<div xmlns="http://www.w3.org/1999/xhtml">A <b>big</b> day</div>"#
    );
    let out = write_feed(&feed).unwrap();
    assert!(out.contains(
        r#"<title type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml">A <b>big</b> day</div></title>"#
    ));
}

#[test]
fn non_contiguous_entries_are_all_read_in_document_order() {
    let feed = parse_feed(
        r#"<feed xmlns="http://www.w3.org/2005/Atom">
             <entry><id>urn:x:1</id></entry>
             <generator>gen</generator>
             <entry><id>urn:x:2</id></entry>
           </feed>"#,
    )
    .unwrap();
    assert_eq!(feed.entries.len(), 2);
    assert_eq!(feed.entries[0].id.as_deref(), Some("urn:x:1"));
    assert_eq!(feed.entries[1].id.as_deref(), Some("urn:x:2"));
    assert_eq!(feed.generator.as_deref(), Some("gen"));
}

#[test]
fn required_fields_are_synthesized_on_write_only() {
    let empty = Feed::default();
    let reread = parse_feed(&write_feed(&empty).unwrap()).unwrap();
    assert_eq!(reread.title, Some(TextContent::plain("")));
    assert!(reread.id.as_deref().unwrap().starts_with("uuid:"));
    assert!(reread.updated.is_some());

    // Reading never synthesizes.
    let bare = parse_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"/>"#).unwrap();
    assert!(bare.title.is_none());
    assert!(bare.id.is_none());
    assert!(bare.updated.is_none());
}

#[test]
fn extension_size_cap_aborts_the_read() {
    let formatter = AtomFormatter::new(FormatterOptions::bounded(32));
    let err = formatter
        .read_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:x">
                 <x:blob>0123456789012345678901234567890123456789</x:blob>
               </feed>"#,
        )
        .unwrap_err();
    assert!(matches!(err, Error::ExtensionSizeExceeded { limit: 32 }));
}

#[test]
fn service_document_round_trips() {
    let document = ServiceDocument {
        language: Some("en".into()),
        workspaces: vec![Workspace {
            title: Some(TextContent::plain("Main Site")),
            collections: vec![
                Collection {
                    title: Some(TextContent::plain("My Blog Entries")),
                    link: Some("http://example.org/blog/".into()),
                    accepts: vec!["application/atom+xml;type=entry".into()],
                    categories: vec![CategoriesDocument::Referenced(ReferencedCategories {
                        link: Some("http://example.org/cats".into()),
                        ..ReferencedCategories::default()
                    })],
                    ..Collection::default()
                },
                Collection {
                    title: Some(TextContent::plain("Pictures")),
                    link: Some("http://example.org/pic/".into()),
                    accepts: vec!["image/png".into(), "image/jpeg".into()],
                    categories: vec![CategoriesDocument::Inline(InlineCategories {
                        is_fixed: true,
                        scheme: Some("http://example.com/cats/big3".into()),
                        categories: vec![Category {
                            term: "animal".into(),
                            scheme: Some("http://example.com/cats/big3".into()),
                            ..Category::default()
                        }],
                        ..InlineCategories::default()
                    })],
                    ..Collection::default()
                },
            ],
            ..Workspace::default()
        }],
        ..ServiceDocument::default()
    };
    let written = write_service_document(&document).unwrap();
    let reread = parse_service_document(&written).unwrap();
    assert_eq!(reread, document);
}

#[test]
fn categories_bifurcate_on_href() {
    let referenced = parse_categories_document(
        r#"<categories xmlns="http://www.w3.org/2007/app" href="http://example.org/cats"/>"#,
    )
    .unwrap();
    assert!(matches!(referenced, CategoriesDocument::Referenced(_)));

    let inline = parse_categories_document(
        r#"<categories xmlns="http://www.w3.org/2007/app"
                       xmlns:atom="http://www.w3.org/2005/Atom">
             <atom:category term="animal"/>
           </categories>"#,
    )
    .unwrap();
    match inline {
        CategoriesDocument::Inline(inline) => {
            assert_eq!(inline.categories.len(), 1);
            assert_eq!(inline.categories[0].term, "animal");
        }
        other => panic!("expected an inline document, got {other:?}"),
    }
}

#[test]
fn source_feed_round_trips_inside_an_entry() {
    let entry = Entry {
        id: Some("urn:x:1".into()),
        title: Some(TextContent::plain("republished")),
        updated: Some(atomio::parse_date("2003-12-13T18:30:02Z", 0).unwrap()),
        source: Some(Box::new(Feed {
            title: Some(TextContent::plain("Origin")),
            id: Some("urn:x:origin".into()),
            ..Feed::default()
        })),
        ..Entry::default()
    };
    let reread = parse_entry(&write_entry(&entry).unwrap()).unwrap();
    assert_eq!(reread, entry);
}

#[test]
fn base_uri_inheritance_reaches_links() {
    let feed = parse_feed(
        r#"<feed xmlns="http://www.w3.org/2005/Atom" xml:base="http://example.org/a/">
             <link href="doc" xml:base="deep/"/>
           </feed>"#,
    )
    .unwrap();
    assert_eq!(
        feed.links[0].base_uri.as_deref(),
        Some("http://example.org/a/deep/")
    );
}
