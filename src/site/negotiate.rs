//! Content negotiation for gemtext and files.
//!
//! Gemtext goes out raw when the client asks for it (a `raw` query flag or
//! an `Accept` naming `text/gemini`) and as HTML otherwise. Everything else
//! passes through untouched.

use std::path::Path;

use crate::gemtext::GEMTEXT_MIME;

/// How a resource is delivered to an HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Gemtext source as `text/gemini`.
    Raw,
    /// Gemtext transcoded into an HTML page.
    Html,
    /// Bytes streamed with their own media type.
    Passthrough,
}

/// Pick a representation for a body of `media_type`.
pub fn negotiate(media_type: &str, accept: Option<&str>, raw: bool) -> Representation {
    if !is_gemtext(media_type) {
        return Representation::Passthrough;
    }
    if raw || accept.is_some_and(accepts_gemtext) {
        Representation::Raw
    } else {
        Representation::Html
    }
}

/// Whether a media type (parameters allowed) is gemtext.
pub fn is_gemtext(media_type: &str) -> bool {
    essence(media_type).eq_ignore_ascii_case(GEMTEXT_MIME)
}

fn accepts_gemtext(accept: &str) -> bool {
    accept.split(',').any(is_gemtext)
}

fn essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or_default().trim()
}

/// Whether a query string carries the `raw` flag, with or without a value.
pub fn wants_raw(query: Option<&str>) -> bool {
    query.is_some_and(|q| url::form_urlencoded::parse(q.as_bytes()).any(|(key, _)| key == "raw"))
}

/// Media type of a local file, from its extension.
pub fn media_type_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("gmi") || ext.eq_ignore_ascii_case("gemini") => {
            GEMTEXT_MIME.to_string()
        }
        _ => mime_guess::from_path(path).first_or_octet_stream().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemtext_defaults_to_html() {
        assert_eq!(negotiate("text/gemini", Some("text/html,*/*;q=0.8"), false), Representation::Html);
        assert_eq!(negotiate("text/gemini; lang=en", None, false), Representation::Html);
    }

    #[test]
    fn raw_flag_or_accept_selects_raw() {
        assert_eq!(negotiate("text/gemini", None, true), Representation::Raw);
        assert_eq!(
            negotiate("text/gemini", Some("text/gemini, text/html;q=0.5"), false),
            Representation::Raw
        );
    }

    #[test]
    fn other_types_pass_through() {
        assert_eq!(negotiate("image/png", Some("text/gemini"), true), Representation::Passthrough);
    }

    #[test]
    fn raw_query_flag() {
        assert!(wants_raw(Some("raw")));
        assert!(wants_raw(Some("a=1&raw=")));
        assert!(!wants_raw(Some("rawr=1")));
        assert!(!wants_raw(None));
    }

    #[test]
    fn extension_media_types() {
        assert_eq!(media_type_for(Path::new("/a/index.gmi")), "text/gemini");
        assert_eq!(media_type_for(Path::new("/a/post.GEMINI")), "text/gemini");
        assert_eq!(media_type_for(Path::new("/a/cat.png")), "image/png");
        assert_eq!(media_type_for(Path::new("/a/blob")), "application/octet-stream");
    }
}
