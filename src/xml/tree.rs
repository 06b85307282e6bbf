use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{error, warn};

use crate::error::{Result, UrdfError};

/// Plain element tree both parsing stages produce.
/// Comments and processing instructions never make it in here.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct XmlElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, tag: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn text(&self) -> &str {
        self.text.trim()
    }
}

/// Strict parse first; if the document is not well-formed, recover what an
/// event-based pass can.
pub(crate) fn parse_document(text: &str) -> Result<XmlElement> {
    match parse_strict(text) {
        Ok(root) => Ok(root),
        Err(e) => {
            error!("{e}");
            error!("using tolerant parsing approach");
            parse_tolerant(text)
        }
    }
}

fn parse_strict(text: &str) -> std::result::Result<XmlElement, roxmltree::Error> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(text, options)?;
    let root = doc.root_element();
    Ok(from_node(root, root.tag_name().namespace()))
}

// elements outside the root's namespace are dropped
fn from_node(node: roxmltree::Node<'_, '_>, namespace: Option<&str>) -> XmlElement {
    let mut element = XmlElement {
        tag: node.tag_name().name().to_string(),
        attributes: node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect(),
        ..Default::default()
    };
    for child in node.children() {
        if child.is_element() {
            if child.tag_name().namespace() == namespace {
                element.children.push(from_node(child, namespace));
            }
        } else if child.is_text() {
            element.text.push_str(child.text().unwrap_or_default());
        }
    }
    element
}

fn parse_tolerant(text: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut roots: Vec<XmlElement> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(start_element(e)),
            Ok(Event::Empty(ref e)) => close(start_element(e), &mut stack, &mut roots),
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    close(element, &mut stack, &mut roots);
                }
            }
            Ok(Event::Text(ref t)) => {
                if let Some(top) = stack.last_mut() {
                    match t.unescape() {
                        Ok(s) => top.text.push_str(&s),
                        Err(_) => top.text.push_str(&String::from_utf8_lossy(t)),
                    }
                }
            }
            Ok(Event::CData(ref c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(c));
                }
            }
            Ok(Event::Eof) => break,
            // comments, processing instructions, declarations
            Ok(_) => {}
            Err(e) => {
                warn!("stopping at position {}: {e}", reader.buffer_position());
                break;
            }
        }
    }

    // close whatever is still open
    while let Some(element) = stack.pop() {
        close(element, &mut stack, &mut roots);
    }

    roots
        .into_iter()
        .next()
        .ok_or_else(|| UrdfError::Malformed("document has no root element".to_string()))
}

fn start_element(e: &BytesStart<'_>) -> XmlElement {
    let attributes = e
        .attributes()
        .with_checks(false)
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            let value = match a.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
            };
            (key, value)
        })
        .collect();
    XmlElement {
        tag: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attributes,
        ..Default::default()
    }
}

// namespaced elements are removed together with their subtree
fn close(element: XmlElement, stack: &mut [XmlElement], roots: &mut Vec<XmlElement>) {
    if element.tag.contains(':') {
        return;
    }
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_strips_comments_test() {
        let root = parse_document(
            r#"<?xml version="1.0"?>
            <!-- comment -->
            <robot name="r">
                <?pi data?>
                <link name="a"><!-- inner --></link>
                <transmission name="t"><type>simple</type></transmission>
            </robot>"#,
        )
        .unwrap();
        assert_eq!(root.tag, "robot");
        assert_eq!(root.attr("name"), Some("r"));
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.child("link").unwrap().attr("name"), Some("a"));
        assert_eq!(
            root.child("transmission").unwrap().child("type").unwrap().text(),
            "simple"
        );
    }

    #[test]
    fn tolerant_drops_namespaced_elements_test() {
        // undeclared prefix: strict parsing fails
        let root = parse_document(
            r#"<robot name="r">
                <xacro:property name="w" value="1"><link name="hidden"/></xacro:property>
                <link name="a"/>
                <!-- comment -->
                <link name="b"/>
            </robot>"#,
        )
        .unwrap();
        let names = root
            .children_named("link")
            .filter_map(|l| l.attr("name"))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn tolerant_recovers_truncated_document_test() {
        let root = parse_document(r#"<robot name="r"><link name="a"/><link name="b">"#).unwrap();
        assert_eq!(root.tag, "robot");
        assert_eq!(root.children_named("link").count(), 2);
    }

    #[test]
    fn strict_keeps_default_namespace_test() {
        let root = parse_document(
            r#"<robot xmlns="http://example.com/robot" xmlns:g="http://example.com/g" name="r">
                <link name="a"/>
                <g:plugin/>
            </robot>"#,
        )
        .unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].tag, "link");
    }

    #[test]
    fn empty_document_test() {
        assert!(matches!(
            parse_document("   "),
            Err(UrdfError::Malformed(_))
        ));
    }
}
