//! Line-oriented gemtext parser.
//!
//! # Responsibilities
//! - Classify each source line by its prefix
//! - Collect preformatted blocks between toggle lines
//! - Close a dangling preformatted block at end of input
//!
//! # Design Decisions
//! - Explicit two-state machine carried through the line loop
//! - No lookahead: each line is classified on its own
//! - Invalid UTF-8 is decoded lossily instead of rejected

use crate::gemtext::document::{Document, Element};

const PREFORMAT_TOGGLE: &str = "```";
const LINK_PREFIX: &str = "=>";
const HEADING_MARKER: u8 = b'#';
const QUOTE_PREFIX: &str = ">";
const LIST_PREFIX: &str = "* ";
const MAX_HEADING_LEVEL: usize = 3;

/// Parse a complete gemtext buffer.
pub fn parse(source: &[u8]) -> Document {
    let text = String::from_utf8_lossy(source);
    let mut parser = Parser::new();
    for line in text.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}

#[derive(Debug)]
enum State {
    Normal,
    Preformatting { alt: String, lines: Vec<String> },
}

/// Streaming gemtext parser.
#[derive(Debug)]
pub struct Parser {
    state: State,
    elements: Vec<Element>,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::Normal,
            elements: Vec::new(),
        }
    }

    /// Feed one line, without its line terminator.
    pub fn feed_line(&mut self, line: &str) {
        if line.starts_with(PREFORMAT_TOGGLE) {
            match self.state {
                State::Normal => {
                    self.state = State::Preformatting {
                        alt: line[PREFORMAT_TOGGLE.len()..].trim().to_string(),
                        lines: Vec::new(),
                    };
                }
                State::Preformatting { .. } => self.close_preformat(),
            }
            return;
        }

        match &mut self.state {
            State::Preformatting { lines, .. } => lines.push(line.to_string()),
            State::Normal => self.elements.push(classify(line)),
        }
    }

    /// Finish parsing. An open preformatted block is closed implicitly.
    pub fn finish(mut self) -> Document {
        self.close_preformat();
        Document::new(self.elements)
    }

    fn close_preformat(&mut self) {
        if let State::Preformatting { alt, lines } = std::mem::replace(&mut self.state, State::Normal) {
            self.elements.push(Element::Preformat { lines, alt });
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(line: &str) -> Element {
    if let Some(rest) = line.strip_prefix(LINK_PREFIX) {
        return parse_link(line, rest);
    }

    let hashes = line.bytes().take_while(|b| *b == HEADING_MARKER).count();
    if hashes > 0 {
        let level = hashes.min(MAX_HEADING_LEVEL);
        return Element::Heading {
            level: level as u8,
            content: line[level..].trim_start().to_string(),
        };
    }

    if let Some(rest) = line.strip_prefix(QUOTE_PREFIX) {
        return Element::Quote(rest.trim_start().to_string());
    }

    if let Some(rest) = line.strip_prefix(LIST_PREFIX) {
        return Element::ListItem(rest.to_string());
    }

    Element::Text(line.to_string())
}

fn parse_link(line: &str, rest: &str) -> Element {
    let rest = rest.trim_start();
    let (target, label) = match rest.split_once(char::is_whitespace) {
        Some((target, label)) => (target, label.trim()),
        None => (rest.trim_end(), ""),
    };

    if target.is_empty() {
        return Element::Text(line.to_string());
    }

    let label = if label.is_empty() { target } else { label };
    Element::Link {
        target: target.to_string(),
        label: label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(target: &str, label: &str) -> Element {
        Element::Link { target: target.into(), label: label.into() }
    }

    #[test]
    fn classifies_each_line_kind() {
        let doc = parse(b"# Title\n## Sub\n### Third\n=> gemini://a.example A\n* item\n> quoted\nplain\n");
        assert_eq!(
            doc.elements(),
            &[
                Element::Heading { level: 1, content: "Title".into() },
                Element::Heading { level: 2, content: "Sub".into() },
                Element::Heading { level: 3, content: "Third".into() },
                link("gemini://a.example", "A"),
                Element::ListItem("item".into()),
                Element::Quote("quoted".into()),
                Element::Text("plain".into()),
            ]
        );
    }

    #[test]
    fn link_label_falls_back_to_target() {
        let doc = parse(b"=>  /about.gmi   \n=>\tfoo.gmi \t Foo  bar \n");
        assert_eq!(doc.elements(), &[link("/about.gmi", "/about.gmi"), link("foo.gmi", "Foo  bar")]);
    }

    #[test]
    fn empty_link_degrades_to_text() {
        let doc = parse(b"=>   \n");
        assert_eq!(doc.elements(), &[Element::Text("=>   ".into())]);
    }

    #[test]
    fn heading_level_capped_at_three() {
        let doc = parse(b"####deep\n#tight\n");
        assert_eq!(
            doc.elements(),
            &[
                Element::Heading { level: 3, content: "#deep".into() },
                Element::Heading { level: 1, content: "tight".into() },
            ]
        );
    }

    #[test]
    fn blank_lines_are_kept() {
        let doc = parse(b"a\n\n\nb\n");
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.elements()[1], Element::Text(String::new()));
    }

    #[test]
    fn preformat_is_verbatim() {
        let doc = parse(b"```rust code\n# not a heading\n=> not a link\n```\n# heading\n");
        assert_eq!(
            doc.elements(),
            &[
                Element::Preformat {
                    lines: vec!["# not a heading".into(), "=> not a link".into()],
                    alt: "rust code".into(),
                },
                Element::Heading { level: 1, content: "heading".into() },
            ]
        );
    }

    #[test]
    fn unterminated_preformat_closed_at_eof() {
        let doc = parse(b"text\n```\nline one\nline two");
        assert_eq!(
            doc.elements(),
            &[
                Element::Text("text".into()),
                Element::Preformat { lines: vec!["line one".into(), "line two".into()], alt: String::new() },
            ]
        );
    }

    #[test]
    fn crlf_line_endings() {
        let doc = parse(b"# Hi\r\n* one\r\n");
        assert_eq!(
            doc.elements(),
            &[Element::Heading { level: 1, content: "Hi".into() }, Element::ListItem("one".into())]
        );
    }

    #[test]
    fn empty_and_invalid_input() {
        assert!(parse(b"").is_empty());
        let doc = parse(&[0xff, 0xfe, b'\n']);
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn parsing_is_idempotent() {
        let source = b"# A\n```\n## b\n```\n=> x y\n> q\n";
        assert_eq!(parse(source), parse(source));
    }

    #[test]
    fn list_requires_space() {
        let doc = parse(b"*bold*\n");
        assert_eq!(doc.elements(), &[Element::Text("*bold*".into())]);
    }
}
