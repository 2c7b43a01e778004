//! Minimal queryable XML documents.
//!
//! Entries, TEI headers and front matter are small XML fragments. The engine
//! needs three things from them: select nodes by a path, read their text,
//! and serialize a subtree back. Paths are a subset of XPath 1.0:
//!
//! - `/name` (child) and `//name` (descendant) steps, `*` matches any name
//! - one attribute predicate per step: `name[@attr="value"]`
//! - a trailing attribute step: `//ref/@target`
//!
//! Names match on their local part, so `//teiHeader` also finds
//! `tei:teiHeader`.

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use crate::error::{Result, WebdictError};

/// An XML node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its qualified name as written.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

impl Element {
    fn new(name: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
        }
    }

    /// Name without namespace prefix.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Value of the attribute with the given (qualified or local) name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name || local_part(key) == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Element>) {
        for child in self.child_elements() {
            out.push(child);
            child.collect_descendants(out);
        }
    }

    /// Serialize this element and its subtree.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
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
        for node in &self.children {
            match node {
                Node::Text(t) => out.push_str(&partial_escape(t.as_str())),
                Node::Element(e) => e.write_xml(out),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    fn matches(&self, step: &Step) -> bool {
        let name_ok = step.name == "*" || self.local_name() == step.name || self.name == step.name;
        let predicate_ok = match &step.predicate {
            Some((attr, value)) => self.attribute(attr) == Some(value.as_str()),
            None => true,
        };
        name_ok && predicate_ok
    }
}

/// A parsed, queryable XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    root: Element,
}

impl XmlDocument {
    /// Parse a well-formed XML document with a single root element.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(element_from_start(&e)?),
                Ok(Event::Empty(e)) => {
                    let element = element_from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack.pop().ok_or_else(|| WebdictError::Xml {
                        message: "unexpected closing tag".to_string(),
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(e)) => {
                    let text = match e.unescape() {
                        Ok(t) => t.into_owned(),
                        // unknown entities such as &nbsp; are kept verbatim
                        Err(_) => String::from_utf8_lossy(&e).into_owned(),
                    };
                    push_text(&mut stack, text);
                }
                Ok(Event::CData(e)) => {
                    push_text(&mut stack, String::from_utf8_lossy(&e.into_inner()).into_owned());
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(WebdictError::Xml {
                        message: format!(
                            "parse error at position {}: {}",
                            reader.buffer_position(),
                            e
                        ),
                    })
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(WebdictError::Xml {
                message: format!("unclosed element <{}>", stack[stack.len() - 1].name),
            });
        }
        root.map(|root| Self { root }).ok_or_else(|| WebdictError::Xml {
            message: "document has no root element".to_string(),
        })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Serialize the root element.
    pub fn root_xml(&self) -> String {
        self.root.to_xml()
    }

    /// Elements selected by `path`, in document order.
    ///
    /// A trailing attribute step is ignored here; see [`XmlDocument::values`].
    pub fn select(&self, path: &str) -> Vec<&Element> {
        match PathExpr::parse(path) {
            Some(expr) => self.evaluate(&expr),
            None => {
                warn!("Unsupported document path: {}", path);
                Vec::new()
            }
        }
    }

    /// String values selected by `path`: attribute values for a trailing
    /// attribute step, text content of the selected elements otherwise.
    pub fn values(&self, path: &str) -> Vec<String> {
        let Some(expr) = PathExpr::parse(path) else {
            warn!("Unsupported document path: {}", path);
            return Vec::new();
        };
        let elements = self.evaluate(&expr);
        match &expr.attribute {
            Some(attr) => elements
                .into_iter()
                .filter_map(|e| e.attribute(attr).map(str::to_string))
                .collect(),
            None => elements.into_iter().map(Element::text_content).collect(),
        }
    }

    /// XPath `string()` of `path`: the first value, or an empty string.
    pub fn string(&self, path: &str) -> String {
        self.values(path).into_iter().next().unwrap_or_default()
    }

    /// Concatenated text of every element selected by `path`.
    pub fn concat_text(&self, path: &str) -> String {
        self.select(path)
            .into_iter()
            .map(Element::text_content)
            .collect()
    }

    fn evaluate(&self, expr: &PathExpr) -> Vec<&Element> {
        // `None` stands for the document node above the root element.
        let mut context: Vec<Option<&Element>> = vec![None];
        for step in &expr.steps {
            let mut next: Vec<&Element> = Vec::new();
            for node in &context {
                let candidates = match (node, step.descendant) {
                    (None, false) => vec![&self.root],
                    (None, true) => {
                        let mut all = vec![&self.root];
                        self.root.collect_descendants(&mut all);
                        all
                    }
                    (Some(e), false) => e.child_elements().collect(),
                    (Some(e), true) => {
                        let mut all = Vec::new();
                        e.collect_descendants(&mut all);
                        all
                    }
                };
                for candidate in candidates {
                    if candidate.matches(step) && !next.iter().any(|n| std::ptr::eq(*n, candidate)) {
                        next.push(candidate);
                    }
                }
            }
            context = next.into_iter().map(Some).collect();
        }
        context.into_iter().flatten().collect()
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| WebdictError::Xml {
            message: format!("bad attribute in <{}>: {}", name, e),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attributes.push((key, value));
    }
    Ok(Element::new(name, attributes))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(WebdictError::Xml {
            message: format!("second root element <{}>", element.name),
        });
    }
    *root = Some(element);
    Ok(())
}

fn push_text(stack: &mut [Element], text: String) {
    // text outside the root element is insignificant
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Text(text));
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    descendant: bool,
    name: String,
    predicate: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
struct PathExpr {
    steps: Vec<Step>,
    attribute: Option<String>,
}

impl PathExpr {
    fn parse(path: &str) -> Option<Self> {
        let mut steps = Vec::new();
        let mut attribute = None;
        let mut rest = path.trim();

        while !rest.is_empty() {
            if attribute.is_some() {
                // the attribute step must be last
                return None;
            }
            let descendant = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                true
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                false
            } else if steps.is_empty() {
                false
            } else {
                return None;
            };

            let end = segment_end(rest);
            let segment = &rest[..end];
            rest = &rest[end..];

            if let Some(attr) = segment.strip_prefix('@') {
                if attr.is_empty() || steps.is_empty() {
                    return None;
                }
                attribute = Some(attr.to_string());
            } else {
                steps.push(parse_step(segment, descendant)?);
            }
        }

        if steps.is_empty() {
            None
        } else {
            Some(Self { steps, attribute })
        }
    }
}

/// Byte offset of the next `/` outside brackets and quotes.
fn segment_end(rest: &str) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in rest.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => return i,
            _ => {}
        }
    }
    rest.len()
}

fn parse_step(segment: &str, descendant: bool) -> Option<Step> {
    let (name, predicate) = match segment.find('[') {
        Some(open) => {
            let inner = segment[open..].strip_prefix('[')?.strip_suffix(']')?;
            (&segment[..open], Some(parse_predicate(inner)?))
        }
        None => (segment, None),
    };
    if name.is_empty() {
        return None;
    }
    Some(Step {
        descendant,
        name: name.to_string(),
        predicate,
    })
}

/// `@attr="value"` or `@attr='value'`.
fn parse_predicate(inner: &str) -> Option<(String, String)> {
    let (attr, value) = inner.trim().strip_prefix('@')?.split_once('=')?;
    let value = value.trim();
    let unquoted = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))?;
    Some((attr.trim().to_string(), unquoted.to_string()))
}
