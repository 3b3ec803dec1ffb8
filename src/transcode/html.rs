//! HTML renderer for gemtext documents.

use std::fmt::Write;

use crate::gemtext::{Document, Element};
use crate::transcode::links::LinkResolver;

/// Result of transcoding a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodedPage {
    /// First heading, or the caller's fallback.
    pub title: String,
    /// HTML fragment, one block per element.
    pub body: String,
}

/// Render a document into an HTML fragment and extract its title.
pub fn render(document: &Document, links: &LinkResolver<'_>, fallback_title: &str) -> TranscodedPage {
    let mut out = String::new();
    let mut in_list = false;

    for element in document.elements() {
        let is_item = matches!(element, Element::ListItem(_));
        if in_list && !is_item {
            out.push_str("</ul>\n");
        } else if !in_list && is_item {
            out.push_str("<ul>\n");
        }
        in_list = is_item;

        render_element(&mut out, element, links);
    }
    if in_list {
        out.push_str("</ul>\n");
    }

    let title = document
        .title()
        .map(str::to_string)
        .unwrap_or_else(|| fallback_title.to_string());

    TranscodedPage { title, body: out }
}

fn render_element(out: &mut String, element: &Element, links: &LinkResolver<'_>) {
    // Writing into a String cannot fail.
    let _ = match element {
        Element::Text(content) if content.is_empty() => writeln!(out, "<br>"),
        Element::Text(content) => writeln!(out, "<p>{}</p>", escape_html(content)),
        Element::Link { target, label } => {
            let link = links.resolve(target);
            let class = if link.native { r#" class="gemini""# } else { "" };
            writeln!(
                out,
                r#"<p class="link"><a href="{}"{}>{}</a></p>"#,
                escape_html(&link.href),
                class,
                escape_html(label)
            )
        }
        Element::Heading { level, content } => {
            let level = (*level).clamp(1, 3);
            writeln!(out, "<h{0}>{1}</h{0}>", level, escape_html(content))
        }
        Element::Preformat { lines, alt } => {
            if alt.is_empty() {
                out.push_str("<pre>");
            } else {
                let _ = write!(out, r#"<pre aria-label="{}">"#, escape_html(alt));
            }
            for (i, line) in lines.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                out.push_str(&escape_html(line));
            }
            writeln!(out, "</pre>")
        }
        Element::ListItem(content) => writeln!(out, "<li>{}</li>", escape_html(content)),
        Element::Quote(content) => writeln!(out, "<blockquote>{}</blockquote>", escape_html(content)),
    };
}

/// Escape HTML special characters.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemtext::parse;
    use crate::transcode::links::NativeLinks;
    use url::Url;

    fn render_local(source: &str) -> TranscodedPage {
        render(&parse(source.as_bytes()), &LinkResolver::local(), "fallback")
    }

    fn strip_tags(html: &str) -> String {
        let mut out = String::new();
        let mut in_tag = false;
        for c in html.chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ if !in_tag => out.push(c),
                _ => {}
            }
        }
        out
    }

    #[test]
    fn text_only_round_trip() {
        let lines = ["first line", "", "third, with spaces  ", "last"];
        let document: Document = lines.iter().map(|l| Element::Text(l.to_string())).collect();
        let page = render(&document, &LinkResolver::local(), "t");
        let stripped: Vec<String> = page.body.lines().map(strip_tags).collect();
        assert_eq!(stripped, lines);
    }

    #[test]
    fn text_lines_not_merged() {
        let page = render_local("one\ntwo\n");
        assert_eq!(page.body, "<p>one</p>\n<p>two</p>\n");
    }

    #[test]
    fn escapes_everything() {
        let page = render_local("<script>alert('x')</script>\n=> javascript:\"><b> <i>label</i>\n");
        assert!(!page.body.contains("<script>"));
        assert!(!page.body.contains("<i>"));
        assert!(page.body.contains("&lt;script&gt;"));
        assert!(page.body.contains(r##"<a href="#">&lt;i&gt;label&lt;/i&gt;</a>"##));
    }

    #[test]
    fn title_from_first_heading() {
        assert_eq!(render_local("text\n## Sub  \n# Main\n").title, "Sub");
        assert_eq!(render_local("no heading\n").title, "fallback");
    }

    #[test]
    fn preformat_rendered_verbatim() {
        let page = render_local("```ascii art\n# not a heading\n  <indent>\n```\n");
        assert_eq!(
            page.body,
            "<pre aria-label=\"ascii art\"># not a heading\n  &lt;indent&gt;</pre>\n"
        );
        assert_eq!(page.title, "fallback");
    }

    #[test]
    fn list_items_grouped() {
        let page = render_local("* a\n* b\ntext\n* c\n");
        assert_eq!(
            page.body,
            "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n<p>text</p>\n<ul>\n<li>c</li>\n</ul>\n"
        );
    }

    #[test]
    fn native_links_annotated() {
        let base = Url::parse("gemini://a.example/x/y").unwrap();
        let resolver = LinkResolver::new(Some(&base), NativeLinks::Keep);
        let page = render(&parse(b"=> ../z Zed\n=> https://w.example Web\n"), &resolver, "t");
        assert_eq!(
            page.body,
            "<p class=\"link\"><a href=\"gemini://a.example/z\" class=\"gemini\">Zed</a></p>\n\
             <p class=\"link\"><a href=\"https://w.example\">Web</a></p>\n"
        );
    }

    #[test]
    fn quote_and_headings() {
        let page = render_local("> said\n### three\n");
        assert_eq!(page.body, "<blockquote>said</blockquote>\n<h3>three</h3>\n");
    }
}
