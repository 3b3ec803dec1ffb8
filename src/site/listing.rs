//! Generated gemtext pages: directory listings and the tenant index.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::gemtext::{Document, Element};
use crate::site::lister::DirEntry;

/// Characters escaped inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub(crate) fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Absolute path for normalized segments, optionally with a trailing slash.
pub(crate) fn encode_path(segments: &[String], trailing_slash: bool) -> String {
    let mut path = String::from("/");
    path.push_str(&segments.iter().map(|s| encode_segment(s)).collect::<Vec<_>>().join("/"));
    if trailing_slash && !segments.is_empty() {
        path.push('/');
    }
    path
}

/// Listing of one directory: a relative link per entry, directories
/// suffixed with `/`. Entries named in `skip` are left out.
pub fn folder_listing(display_path: &str, entries: &[DirEntry], skip: &[&str]) -> Document {
    let mut elements = vec![
        Element::Heading { level: 1, content: format!("Index of {}", display_path) },
        Element::Text(String::new()),
    ];
    for entry in entries.iter().filter(|e| !skip.contains(&e.name.as_str())) {
        let (target, label) = if entry.is_directory {
            (format!("{}/", encode_segment(&entry.name)), format!("{}/", entry.name))
        } else {
            (encode_segment(&entry.name), entry.name.clone())
        };
        elements.push(Element::Link { target, label });
    }
    elements.into_iter().collect()
}

/// Index of the main host: one link per tenant site.
pub fn tenant_index(site_title: &str, tenants: &[String], link_base: impl Fn(&str) -> String) -> Document {
    let mut elements = vec![
        Element::Heading { level: 1, content: site_title.to_string() },
        Element::Text(String::new()),
    ];
    if tenants.is_empty() {
        elements.push(Element::Text("No sites yet.".to_string()));
    }
    for tenant in tenants {
        elements.push(Element::Link {
            target: link_base(tenant),
            label: tenant.clone(),
        });
    }
    elements.into_iter().collect()
}
