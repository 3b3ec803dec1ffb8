//! Gemlog feeds.
//!
//! # Responsibilities
//! - Collect the posts directly inside a gemlog directory
//! - Date each post from its `YYYY-MM-DD` filename prefix or its mtime
//! - Serialize the feed as Atom, or as a gemtext feed page
//!
//! # Design Decisions
//! - Rebuilt on every request; nothing is cached
//! - Newest first, ties broken by filename descending, undated posts last

use std::cmp::Ordering;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;
use url::Url;

use crate::gemtext::{self, Document, Element};
use crate::site::lister::DirectoryLister;

/// Media type of the serialized feed.
pub const ATOM_MIME: &str = "application/atom+xml";

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error: {0}")]
    Xml(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub published: Option<DateTime<Utc>>,
    /// Absolute address of the post.
    pub link: Url,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub title: String,
    /// Written as the feed-level author, so entries need none of their own.
    pub author: String,
    /// Address of the gemlog directory.
    pub link: Url,
    pub entries: Vec<FeedEntry>,
}

/// Build the feed for the posts in `post_dir`, linked relative to `base`.
///
/// A missing directory yields an empty feed. A post that cannot be read is
/// kept under its file stem.
pub fn build_feed(
    lister: &dyn DirectoryLister,
    post_dir: &Path,
    base: &Url,
    title: &str,
    author: &str,
) -> Result<Feed, FeedError> {
    let io_err = |source| FeedError::Io { path: post_dir.to_path_buf(), source };

    let listing = match lister.list(post_dir) {
        Ok(listing) => listing,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(io_err(e)),
    };

    let mut entries = Vec::new();
    for entry in listing {
        if entry.is_directory || entry.name == "index.gmi" || !is_gemtext_name(&entry.name) {
            continue;
        }

        let path = post_dir.join(&entry.name);
        let stem = entry
            .name
            .rsplit_once('.')
            .map_or(entry.name.as_str(), |(stem, _)| stem);
        let heading = match std::fs::read(&path) {
            Ok(bytes) => gemtext::parse(&bytes).title().map(str::to_string),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable post, titled by file name");
                None
            }
        };
        let title = heading.unwrap_or_else(|| stem.to_string());

        let published = date_prefix(&entry.name).or_else(|| entry.modified.map(DateTime::<Utc>::from));
        let Ok(link) = base.join(&entry.name) else {
            tracing::debug!(file = %entry.name, "Skipping post with unaddressable name");
            continue;
        };

        entries.push(FeedEntry {
            title,
            published,
            link,
            file_name: entry.name,
        });
    }

    entries.sort_by(newest_first);

    Ok(Feed {
        title: title.to_string(),
        author: author.to_string(),
        link: base.clone(),
        entries,
    })
}

fn newest_first(a: &FeedEntry, b: &FeedEntry) -> Ordering {
    let by_date = match (a.published, b.published) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date.then_with(|| b.file_name.cmp(&a.file_name))
}

fn is_gemtext_name(name: &str) -> bool {
    name.ends_with(".gmi") || name.ends_with(".gemini")
}

fn date_prefix(name: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(name.get(..10)?, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

impl Feed {
    /// Newest entry date, or the Unix epoch for an undated feed.
    pub fn updated(&self) -> DateTime<Utc> {
        self.entries
            .iter()
            .filter_map(|e| e.published)
            .max()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Serialize as an Atom document.
    pub fn to_atom(&self) -> Result<String, FeedError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        let mut feed = BytesStart::new("feed");
        feed.push_attribute(("xmlns", ATOM_NS));
        write(&mut writer, Event::Start(feed))?;

        let updated = self.updated();
        text_element(&mut writer, "title", &self.title)?;
        text_element(&mut writer, "id", self.link.as_str())?;
        link_element(&mut writer, self.link.as_str())?;
        text_element(&mut writer, "updated", &updated.to_rfc3339())?;
        write(&mut writer, Event::Start(BytesStart::new("author")))?;
        text_element(&mut writer, "name", &self.author)?;
        write(&mut writer, Event::End(BytesEnd::new("author")))?;

        for entry in &self.entries {
            write(&mut writer, Event::Start(BytesStart::new("entry")))?;
            text_element(&mut writer, "title", &entry.title)?;
            text_element(&mut writer, "id", entry.link.as_str())?;
            link_element(&mut writer, entry.link.as_str())?;
            // Undated posts take the feed's date; every entry needs one.
            let entry_updated = entry.published.unwrap_or(updated);
            text_element(&mut writer, "updated", &entry_updated.to_rfc3339())?;
            write(&mut writer, Event::End(BytesEnd::new("entry")))?;
        }

        write(&mut writer, Event::End(BytesEnd::new("feed")))?;

        String::from_utf8(writer.into_inner().into_inner()).map_err(|e| FeedError::Xml(e.to_string()))
    }

    /// The gemtext feed page: one dated link per entry.
    pub fn to_gemfeed(&self) -> Document {
        let mut elements = vec![
            Element::Heading { level: 1, content: self.title.clone() },
            Element::Text(String::new()),
        ];
        for entry in &self.entries {
            let label = match entry.published {
                Some(date) => format!("{} {}", date.format("%Y-%m-%d"), entry.title),
                None => entry.title.clone(),
            };
            elements.push(Element::Link {
                target: entry.link.to_string(),
                label,
            });
        }
        elements.push(Element::Text(String::new()));
        elements.push(Element::Link {
            target: "atom.xml".to_string(),
            label: "Atom feed".to_string(),
        });
        elements.into_iter().collect()
    }
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), FeedError> {
    writer.write_event(event).map_err(|e| FeedError::Xml(e.to_string()))
}

fn text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) -> Result<(), FeedError> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn link_element(writer: &mut Writer<Cursor<Vec<u8>>>, href: &str) -> Result<(), FeedError> {
    let mut link = BytesStart::new("link");
    link.push_attribute(("href", href));
    write(writer, Event::Empty(link))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::lister::FsLister;

    fn base() -> Url {
        Url::parse("gemini://alice.example/gemlog/").unwrap()
    }

    fn posts() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2023-01-01-a.gmi"), "# First post\nhello").unwrap();
        std::fs::write(dir.path().join("2023-06-01-b.gmi"), "# Second & last\n").unwrap();
        std::fs::write(dir.path().join("2022-12-31-c.gmi"), "no heading").unwrap();
        std::fs::write(dir.path().join("index.gmi"), "# Index").unwrap();
        std::fs::write(dir.path().join("photo.png"), [0u8; 4]).unwrap();
        dir
    }

    #[test]
    fn entries_sorted_newest_first() {
        let dir = posts();
        let feed = build_feed(&FsLister, dir.path(), &base(), "alice's gemlog", "alice").unwrap();
        let names: Vec<_> = feed.entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["2023-06-01-b.gmi", "2023-01-01-a.gmi", "2022-12-31-c.gmi"]);
    }

    #[test]
    fn titles_fall_back_to_stem() {
        let dir = posts();
        let feed = build_feed(&FsLister, dir.path(), &base(), "t", "alice").unwrap();
        assert_eq!(feed.entries[1].title, "First post");
        assert_eq!(feed.entries[2].title, "2022-12-31-c");
        assert_eq!(
            feed.entries[0].link.as_str(),
            "gemini://alice.example/gemlog/2023-06-01-b.gmi"
        );
    }

    #[test]
    fn undated_entries_sort_last() {
        let a = FeedEntry {
            title: "a".into(),
            published: None,
            link: base(),
            file_name: "z.gmi".into(),
        };
        let b = FeedEntry {
            title: "b".into(),
            published: date_prefix("2001-01-01"),
            link: base(),
            file_name: "a.gmi".into(),
        };
        assert_eq!(newest_first(&a, &b), Ordering::Greater);
    }

    #[test]
    fn missing_directory_is_empty_feed() {
        let dir = tempfile::tempdir().unwrap();
        let feed = build_feed(&FsLister, &dir.path().join("gemlog"), &base(), "t", "alice").unwrap();
        assert!(feed.entries.is_empty());
        assert_eq!(feed.updated(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn atom_output() {
        let dir = posts();
        let feed = build_feed(&FsLister, dir.path(), &base(), "alice's gemlog", "alice").unwrap();
        let atom = feed.to_atom().unwrap();

        assert!(atom.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(atom.contains("<feed xmlns=\"http://www.w3.org/2005/Atom\">"));
        assert!(atom.contains("<title>Second &amp; last</title>"));
        assert!(atom.contains("<updated>2023-06-01T00:00:00+00:00</updated>"));
        assert_eq!(atom.matches("<entry>").count(), 3);
        assert!(atom.find("Second").unwrap() < atom.find("First post").unwrap());
    }

    #[test]
    fn atom_has_author_and_dates_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2023-01-01-a.gmi"), "# Dated\n").unwrap();
        let mut feed = build_feed(&FsLister, dir.path(), &base(), "alice's gemlog", "alice").unwrap();
        feed.entries.push(FeedEntry {
            title: "Undated".into(),
            published: None,
            link: base().join("undated.gmi").unwrap(),
            file_name: "undated.gmi".into(),
        });

        let atom = feed.to_atom().unwrap();
        assert!(atom.contains("<author>"));
        assert!(atom.contains("<name>alice</name>"));
        assert_eq!(atom.matches("<entry>").count(), 2);
        // One feed-level date plus one per entry.
        assert_eq!(atom.matches("<updated>2023-01-01T00:00:00+00:00</updated>").count(), 3);
    }

    /// Lists a post that is not on disk.
    struct GhostLister;

    impl DirectoryLister for GhostLister {
        fn list(&self, _dir: &Path) -> std::io::Result<Vec<crate::site::lister::DirEntry>> {
            Ok(vec![crate::site::lister::DirEntry {
                name: "2024-02-03-ghost.gmi".into(),
                is_directory: false,
                modified: None,
            }])
        }

        fn stat(&self, _path: &Path) -> std::io::Result<Option<crate::site::lister::DirEntry>> {
            Ok(None)
        }
    }

    #[test]
    fn unreadable_post_keeps_feed_alive() {
        let dir = tempfile::tempdir().unwrap();
        let feed = build_feed(&GhostLister, dir.path(), &base(), "t", "alice").unwrap();
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].title, "2024-02-03-ghost");
        assert_eq!(feed.entries[0].published, date_prefix("2024-02-03"));
    }

    #[test]
    fn gemfeed_page_links_dated_entries() {
        let dir = posts();
        let feed = build_feed(&FsLister, dir.path(), &base(), "alice's gemlog", "alice").unwrap();
        let page = feed.to_gemfeed().to_gemtext();
        assert!(page.starts_with("# alice's gemlog\n"));
        assert!(page.contains(
            "=> gemini://alice.example/gemlog/2023-06-01-b.gmi 2023-06-01 Second & last\n"
        ));
    }
}
