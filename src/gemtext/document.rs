//! Parsed gemtext document model.

use std::fmt;

/// A single line-level element of a gemtext document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// Plain text line. Blank lines are kept as empty text.
    Text(String),
    /// `=> target label`
    Link { target: String, label: String },
    /// `#`, `##` or `###` heading.
    Heading { level: u8, content: String },
    /// Lines between two ``` toggles, verbatim.
    Preformat { lines: Vec<String>, alt: String },
    /// `* item`
    ListItem(String),
    /// `> quote`
    Quote(String),
}

/// An ordered sequence of elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    elements: Vec<Element>,
}

impl Document {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Content of the first heading, trimmed.
    pub fn title(&self) -> Option<&str> {
        self.elements.iter().find_map(|e| match e {
            Element::Heading { content, .. } => Some(content.trim()),
            _ => None,
        })
    }

    /// Serialize back to gemtext source.
    pub fn to_gemtext(&self) -> String {
        let mut out = String::new();
        for element in &self.elements {
            out.push_str(&element.to_string());
            out.push('\n');
        }
        out
    }
}

impl FromIterator<Element> for Document {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Document {
    type Item = Element;
    type IntoIter = std::vec::IntoIter<Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Text(content) => write!(f, "{}", content),
            Element::Link { target, label } if label.is_empty() || label == target => {
                write!(f, "=> {}", target)
            }
            Element::Link { target, label } => write!(f, "=> {} {}", target, label),
            Element::Heading { level, content } => {
                write!(f, "{} {}", "#".repeat(usize::from(*level)), content)
            }
            Element::Preformat { lines, alt } => {
                writeln!(f, "```{}", alt)?;
                for line in lines {
                    writeln!(f, "{}", line)?;
                }
                write!(f, "```")
            }
            Element::ListItem(content) => write!(f, "* {}", content),
            Element::Quote(content) => write!(f, "> {}", content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_first_heading() {
        let doc = Document::new(vec![
            Element::Text("intro".into()),
            Element::Heading { level: 2, content: "  Second  ".into() },
            Element::Heading { level: 1, content: "First".into() },
        ]);
        assert_eq!(doc.title(), Some("Second"));
    }

    #[test]
    fn no_heading_no_title() {
        let doc = Document::new(vec![Element::Text("hello".into())]);
        assert_eq!(doc.title(), None);
    }

    #[test]
    fn serializes_to_gemtext() {
        let doc = Document::new(vec![
            Element::Heading { level: 1, content: "Index".into() },
            Element::Link { target: "a.gmi".into(), label: "a.gmi".into() },
            Element::Link { target: "b/".into(), label: "Bee".into() },
            Element::Preformat { lines: vec!["x".into()], alt: "sh".into() },
        ]);
        assert_eq!(doc.to_gemtext(), "# Index\n=> a.gmi\n=> b/ Bee\n```sh\nx\n```\n");
    }
}
