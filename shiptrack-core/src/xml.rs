//! Owned XML element tree with namespace prefixes stripped.
//!
//! Carrier responses mix SOAP envelopes, default namespaces, and prefixed
//! elements. Every element and attribute is stored under its local name, so
//! `SOAP-ENV:Body`, `v9:Events`, and `Events` are all addressed the same way.

use std::borrow::Cow;
use std::str;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Deepest element nesting accepted by [`XmlDocument::parse`].
pub const MAX_DEPTH: usize = 256;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reasons a document could not be turned into a tree.
pub enum XmlError {
    /// The reader rejected the input.
    #[error("Malformed XML at byte {position}: {message}")]
    Malformed {
        /// Byte offset reported by the reader.
        position: u64,
        /// Reader error description.
        message: String,
    },
    /// The document ended while elements were still open.
    #[error("Unexpected end of document inside <{0}>")]
    UnclosedElement(String),
    /// A closing tag without a matching opening tag.
    #[error("Unexpected closing tag </{0}>")]
    UnexpectedClose(String),
    /// Character data or a second element outside the root element.
    #[error("Content outside the root element")]
    ContentOutsideRoot,
    /// No element at all.
    #[error("Document has no root element")]
    Empty,
    /// Elements nested deeper than [`MAX_DEPTH`].
    #[error("Elements nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// An element with its attributes, child elements, and text content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    /// Local name of the element.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct child elements in document order.
    #[must_use]
    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// Trimmed text content directly inside this element.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Value of an attribute looked up by local name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All elements matching `path`, in document order.
    ///
    /// Steps are separated by `/` and walk child elements. A leading `//`
    /// matches the first step against this element and all its descendants.
    /// A step may list alternatives as `TrackDetail|TrackSummary`.
    #[must_use]
    pub fn select(&self, path: &str) -> Vec<&XmlElement> {
        let (descendant, relative) = match path.strip_prefix("//") {
            Some(rest) => (true, rest),
            None => (false, path),
        };
        let mut steps = relative
            .split('/')
            .filter(|step| !step.is_empty() && *step != ".");

        let mut current = if descendant {
            let Some(first) = steps.next() else {
                return Vec::new();
            };
            let mut matches = Vec::new();
            self.collect_descendants(first, &mut matches);
            matches
        } else {
            vec![self]
        };

        for step in steps {
            current = current
                .into_iter()
                .flat_map(|element| element.children.iter())
                .filter(|child| step_matches(step, &child.name))
                .collect();
        }

        current
    }

    /// First element matching `path`.
    #[must_use]
    pub fn first(&self, path: &str) -> Option<&XmlElement> {
        self.select(path).into_iter().next()
    }

    /// Text of the first element matching `path`, if that element exists.
    #[must_use]
    pub fn text_at(&self, path: &str) -> Option<&str> {
        self.first(path).map(XmlElement::text)
    }

    /// Text of the first element matching `path`, if it exists and is not blank.
    #[must_use]
    pub fn non_empty_text_at(&self, path: &str) -> Option<&str> {
        self.text_at(path).filter(|text| !text.is_empty())
    }

    fn collect_descendants<'tree>(&'tree self, step: &str, out: &mut Vec<&'tree XmlElement>) {
        if step_matches(step, &self.name) {
            out.push(self);
        }
        for child in &self.children {
            child.collect_descendants(step, out);
        }
    }
}

fn step_matches(step: &str, name: &str) -> bool {
    step == "*" || step.split('|').any(|alternative| alternative == name)
}

/// Parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    /// Parse a complete document.
    ///
    /// # Errors
    ///
    /// Returns an [`XmlError`] when the input is not a single well-formed element tree.
    pub fn parse(input: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader.read_event().map_err(|err| XmlError::Malformed {
                position: reader.error_position(),
                message: err.to_string(),
            })?;

            match event {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err(XmlError::ContentOutsideRoot);
                    }
                    if stack.len() >= MAX_DEPTH {
                        return Err(XmlError::TooDeep);
                    }
                    stack.push(open_element(&start, &reader)?);
                }
                Event::Empty(start) => {
                    if root.is_some() {
                        return Err(XmlError::ContentOutsideRoot);
                    }
                    let element = open_element(&start, &reader)?;
                    close_element(element, &mut stack, &mut root);
                }
                Event::End(end) => {
                    let element = stack.pop().ok_or_else(|| {
                        XmlError::UnexpectedClose(String::from_utf8_lossy(end.local_name().as_ref()).into_owned())
                    })?;
                    close_element(element, &mut stack, &mut root);
                }
                Event::Text(text) => {
                    let unescaped = text.unescape().map_err(|err| XmlError::Malformed {
                        position: reader.buffer_position(),
                        message: err.to_string(),
                    })?;
                    push_text(&mut stack, &unescaped)?;
                }
                Event::CData(data) => {
                    let raw = data.into_inner();
                    let text = str::from_utf8(&raw).map_err(|err| XmlError::Malformed {
                        position: reader.buffer_position(),
                        message: err.to_string(),
                    })?;
                    push_text(&mut stack, text.trim())?;
                }
                Event::Eof => break,
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::UnclosedElement(open.name));
        }

        root.map(|root| Self { root }).ok_or(XmlError::Empty)
    }

    /// Root element.
    #[must_use]
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// Shorthand for [`XmlElement::select`] on the root element.
    #[must_use]
    pub fn select(&self, path: &str) -> Vec<&XmlElement> {
        self.root.select(path)
    }
}

fn open_element(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<XmlElement, XmlError> {
    let malformed = |message: String| XmlError::Malformed {
        position: reader.buffer_position(),
        message,
    };

    let name = utf8(start.local_name().as_ref()).map_err(&malformed)?.into_owned();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| malformed(err.to_string()))?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = utf8(attribute.key.local_name().as_ref()).map_err(&malformed)?.into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| malformed(err.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn close_element(element: XmlElement, stack: &mut [XmlElement], root: &mut Option<XmlElement>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn push_text(stack: &mut [XmlElement], text: &str) -> Result<(), XmlError> {
    if text.is_empty() {
        return Ok(());
    }
    let Some(current) = stack.last_mut() else {
        return Err(XmlError::ContentOutsideRoot);
    };
    current.text.push_str(text);
    Ok(())
}

fn utf8(bytes: &[u8]) -> Result<Cow<'_, str>, String> {
    str::from_utf8(bytes)
        .map(Cow::Borrowed)
        .map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body>
    <v9:TrackReply xmlns:v9="http://fedex.com/ws/track/v9">
      <v9:TrackDetails>
        <v9:Events><v9:EventType>DL</v9:EventType></v9:Events>
        <v9:Events><v9:EventType>OD</v9:EventType></v9:Events>
      </v9:TrackDetails>
    </v9:TrackReply>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

    #[test]
    fn strips_namespace_prefixes() {
        let doc = XmlDocument::parse(SOAP).expect("well-formed");

        assert_eq!(doc.root().name(), "Envelope", "prefix removed from root");
        let codes: Vec<_> = doc
            .select("//TrackDetails/Events")
            .into_iter()
            .filter_map(|event| event.text_at("EventType"))
            .collect();
        assert_eq!(codes, ["DL", "OD"], "events in document order");
    }

    #[test]
    fn relative_paths_and_alternatives() {
        let doc = XmlDocument::parse(
            r#"<TrackResponse><TrackInfo ID="A"><TrackSummary><Event>s</Event></TrackSummary><Other/><TrackDetail><Event>d</Event></TrackDetail></TrackInfo></TrackResponse>"#,
        )
        .expect("well-formed");

        let info = doc.root().first("TrackInfo").expect("track info");
        assert_eq!(info.attribute("ID"), Some("A"), "attribute lookup");
        let labels: Vec<_> = info
            .select("./TrackDetail|TrackSummary")
            .into_iter()
            .map(|node| node.text_at("Event").unwrap_or_default())
            .collect();
        assert_eq!(labels, ["s", "d"], "alternatives keep document order");
        assert_eq!(info.text_at("Missing"), None, "absent element");
    }

    #[test]
    fn unescapes_entities_and_cdata() {
        let doc = XmlDocument::parse("<a><b>Fish &amp; Chips</b><c><![CDATA[ <raw> ]]></c></a>").expect("well-formed");

        assert_eq!(doc.root().text_at("b"), Some("Fish & Chips"), "entity decoded");
        assert_eq!(doc.root().text_at("c"), Some("<raw>"), "cdata kept as text");
    }

    #[test]
    fn empty_elements_are_present_but_blank() {
        let doc = XmlDocument::parse("<a><b/></a>").expect("well-formed");

        assert_eq!(doc.root().text_at("b"), Some(""), "present");
        assert_eq!(doc.root().non_empty_text_at("b"), None, "blank");
    }

    #[test]
    fn nesting_is_capped() {
        let nested = |depth: usize| format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));

        XmlDocument::parse(&nested(MAX_DEPTH)).expect("limit itself is accepted");
        assert_eq!(XmlDocument::parse(&nested(MAX_DEPTH + 1)), Err(XmlError::TooDeep), "one level too deep");
    }

    #[test]
    fn rejects_malformed_documents() {
        for input in ["", "not xml", "<a><b></a>", "<a>", "<a></a><b></b>", "</a>"] {
            assert!(XmlDocument::parse(input).is_err(), "expected failure for {input:?}");
        }
    }
}
