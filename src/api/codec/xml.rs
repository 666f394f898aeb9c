//! Tree-to-markup and markup-to-tree for the XML dialects

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use roxmltree::{Document, Node};

use super::{CodecError, TagNotFound};
use crate::api::constants::namespaces;
use crate::api::tree::{Field, ObjectTree};

const ID_DOMAIN_ATTRIBUTE: &str = "idDomain";

/// Per-dialect knobs for the markup encoder
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Attributes on the root element, namespace declarations included
    pub root_attributes: Vec<(String, String)>,
    /// Field names that carry an `idDomain` attribute
    pub id_fields: Vec<String>,
    /// Domain used when an id value is not already domain-qualified
    pub id_domain: String,
}

impl EncodeOptions {
    pub fn new(id_domain: &str, id_fields: &[&str]) -> Self {
        Self {
            root_attributes: Vec::new(),
            id_fields: id_fields.iter().map(|name| name.to_string()).collect(),
            id_domain: id_domain.to_string(),
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.root_attributes.push((name.into(), value.into()));
        self
    }

    fn is_id_field(&self, name: &str) -> bool {
        self.id_fields.iter().any(|field| field == name)
    }
}

/// Encode `tree` as the children of a `root` element
pub fn encode(root: &str, tree: &ObjectTree, options: &EncodeOptions) -> Result<String, CodecError> {
    let mut writer = Writer::new(Vec::new());
    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut start = BytesStart::new(root);
    for (name, value) in &options.root_attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }
    write(&mut writer, Event::Start(start))?;
    write_fields(&mut writer, tree, options)?;
    write(&mut writer, Event::End(BytesEnd::new(root)))?;

    String::from_utf8(writer.into_inner()).map_err(|e| CodecError::Encode(e.to_string()))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), CodecError> {
    writer
        .write_event(event)
        .map_err(|e| CodecError::Encode(e.to_string()))
}

fn write_fields(writer: &mut Writer<Vec<u8>>, tree: &ObjectTree, options: &EncodeOptions) -> Result<(), CodecError> {
    for (name, field) in tree.iter() {
        write_field(writer, name, field, options)?;
    }
    Ok(())
}

fn write_field(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    field: &Field,
    options: &EncodeOptions,
) -> Result<(), CodecError> {
    match field {
        Field::Tree(child) => {
            write(writer, Event::Start(BytesStart::new(name)))?;
            write_fields(writer, child, options)?;
            write(writer, Event::End(BytesEnd::new(name)))
        }
        // repeated siblings share one tag
        Field::List(items) => {
            for item in items {
                write_field(writer, name, item, options)?;
            }
            Ok(())
        }
        Field::Null => write(writer, Event::Empty(BytesStart::new(name))),
        scalar => {
            let text = scalar.as_text().unwrap_or_default();
            let mut start = BytesStart::new(name);
            let text = if options.is_id_field(name) {
                let (domain, value) = split_id(&text, &options.id_domain);
                start.push_attribute((ID_DOMAIN_ATTRIBUTE, domain));
                value
            } else {
                text.as_str()
            };

            write(writer, Event::Start(start))?;
            write(writer, Event::Text(BytesText::new(text)))?;
            write(writer, Event::End(BytesEnd::new(name)))
        }
    }
}

/// Split `"QB:12"` into `("QB", "12")`; unqualified ids get `default_domain`
pub fn split_id<'a>(value: &'a str, default_domain: &'a str) -> (&'a str, &'a str) {
    match value.split_once(':') {
        Some((domain, id)) if !domain.is_empty() && domain.chars().all(|c| c.is_ascii_uppercase()) => (domain, id),
        _ => (default_domain, value),
    }
}

/// Parse a markup body into a tree with one field named after the root
pub fn decode(body: &str) -> Result<ObjectTree, CodecError> {
    let document = Document::parse(body).map_err(|e| CodecError::Malformed(e.to_string()))?;
    let root = document.root_element();
    Ok(ObjectTree::new().with(root.tag_name().name(), element_field(root)))
}

/// Decode one element. Leaves yield text, branches yield a nested tree;
/// namespace prefixes are dropped by using the local name. A leaf with an
/// `idDomain` attribute decodes to `"DOMAIN:text"` so [`split_id`] can
/// restore the attribute on the way back out.
pub fn element_field(node: Node<'_, '_>) -> Field {
    let mut children = node.children().filter(Node::is_element).peekable();
    if children.peek().is_none() {
        return Field::Text(qualified_text(node, node.text().unwrap_or_default()));
    }

    let mut tree = ObjectTree::new();
    for child in children {
        tree.append(child.tag_name().name(), element_field(child));
    }
    Field::Tree(tree)
}

/// First child element `tag` in the core namespace
pub fn find_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Result<Node<'a, 'input>, TagNotFound> {
    find_child_ns(node, tag, namespaces::CORE)
}

/// First child element `tag` in `namespace`; an empty namespace matches
/// unqualified elements.
pub fn find_child_ns<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
    namespace: &str,
) -> Result<Node<'a, 'input>, TagNotFound> {
    node.children()
        .find(|child| {
            child.is_element()
                && child.tag_name().name() == tag
                && child.tag_name().namespace().unwrap_or_default() == namespace
        })
        .ok_or_else(|| TagNotFound {
            tag: tag.to_string(),
            namespace: namespace.to_string(),
        })
}

/// Text of child `tag` in the core namespace. Ids carrying an `idDomain`
/// attribute come back domain-qualified, e.g. `"QB:12"`.
pub fn child_text(node: Node<'_, '_>, tag: &str) -> Result<String, TagNotFound> {
    child_text_ns(node, tag, namespaces::CORE)
}

pub fn child_text_ns(node: Node<'_, '_>, tag: &str, namespace: &str) -> Result<String, TagNotFound> {
    let child = find_child_ns(node, tag, namespace)?;
    Ok(qualified_text(child, child.text().unwrap_or_default().trim()))
}

fn qualified_text(node: Node<'_, '_>, text: &str) -> String {
    match node.attribute(ID_DOMAIN_ATTRIBUTE) {
        Some(domain) => format!("{}:{}", domain, text),
        None => text.to_string(),
    }
}

/// Like [`child_text_ns`] but absent tags fall back to `default`
pub fn child_text_or(node: Node<'_, '_>, tag: &str, namespace: &str, default: &str) -> String {
    child_text_ns(node, tag, namespace).unwrap_or_else(|_| default.to_string())
}
