//! AXI framing: every message is one XML element terminated by a NUL byte.

use crate::error::OmmError;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One AXI element with its attributes and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxiMessage {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<AxiMessage>,
}

impl AxiMessage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.attrs.push((key, value)),
        }
    }

    pub fn child(mut self, child: AxiMessage) -> Self {
        self.children.push(child);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, key: &str) -> Result<&str, OmmError> {
        self.get(key).ok_or_else(|| OmmError::MissingAttribute {
            element: self.name.clone(),
            attribute: key.to_string(),
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AxiMessage> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Serialize to XML (without the NUL terminator).
    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.write_to(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    /// Parse a single frame.
    pub fn decode(frame: &str) -> Result<Self, OmmError> {
        let mut reader = Reader::from_str(frame);
        reader.trim_text(true);

        let mut stack: Vec<AxiMessage> = Vec::new();
        loop {
            let event = reader
                .read_event()
                .map_err(|e| OmmError::Xml(e.to_string()))?;
            match event {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| OmmError::Xml("unbalanced end tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Eof => return Err(OmmError::Xml("unexpected end of frame".into())),
                _ => {}
            }
        }
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<AxiMessage, OmmError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| OmmError::Xml(e.to_string()))?
        .to_string();

    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| OmmError::Xml(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| OmmError::Xml(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| OmmError::Xml(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }

    Ok(AxiMessage {
        name,
        attrs,
        children: Vec::new(),
    })
}
