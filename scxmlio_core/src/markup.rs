//! Foreign markup captured verbatim from a source document.
//!
//! The model never interprets foreign markup:
//! it is kept as the exact text that appeared in the source,
//! so that it can be played back unchanged on serialization.

/// A namespace declaration, i.e., an `xmlns` or `xmlns:prefix` attribute.
///
/// A binding with an empty `uri` and no prefix undeclares the default namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NsBinding {
    /// The declared prefix, or `None` for the default namespace.
    pub prefix: Option<String>,
    /// The namespace URI the prefix is bound to.
    pub uri: String,
}

impl NsBinding {
    /// Creates a new binding for the given prefix (`None` for the default namespace).
    pub fn new(prefix: Option<&str>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_owned),
            uri: uri.into(),
        }
    }

    /// The attribute name declaring this binding (`xmlns` or `xmlns:prefix`).
    pub fn attribute_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        }
    }
}

/// Looks up the namespace bound to `prefix` in a list of bindings,
/// where later bindings shadow earlier ones.
pub fn lookup_binding<'a>(bindings: &'a [NsBinding], prefix: Option<&str>) -> Option<&'a str> {
    bindings
        .iter()
        .rev()
        .find(|binding| binding.prefix.as_deref() == prefix)
        .map(|binding| binding.uri.as_str())
}

/// A single node of foreign markup, holding its raw (still escaped) source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ForeignNode {
    /// An element, from its start tag to its end tag included.
    Element(String),
    /// Character data that is not whitespace only.
    Text(String),
    /// A CDATA section, including its delimiters.
    CData(String),
    /// A comment, including its delimiters.
    Comment(String),
    /// A processing instruction, including its delimiters.
    ProcessingInstruction(String),
}

impl ForeignNode {
    /// The raw markup of the node, exactly as it appeared in the source.
    pub fn raw(&self) -> &str {
        match self {
            ForeignNode::Element(raw)
            | ForeignNode::Text(raw)
            | ForeignNode::CData(raw)
            | ForeignNode::Comment(raw)
            | ForeignNode::ProcessingInstruction(raw) => raw,
        }
    }
}

/// Inline foreign content of a `<data>`, `<content>` or `<assign>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup {
    /// Namespace bindings in scope at the holder element
    /// that are not already declared on the root element.
    pub namespaces: Vec<NsBinding>,
    /// The captured nodes, in document order.
    pub nodes: Vec<ForeignNode>,
}

impl Markup {
    /// Creates inline content from the given nodes, with no extra namespace bindings.
    pub fn new(nodes: Vec<ForeignNode>) -> Self {
        Self {
            namespaces: Vec::new(),
            nodes,
        }
    }

    /// Concatenation of the raw markup of all nodes.
    pub fn raw(&self) -> String {
        self.nodes.iter().map(ForeignNode::raw).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_bindings_shadow_earlier_ones() {
        let bindings = vec![
            NsBinding::new(None, "urn:a"),
            NsBinding::new(Some("x"), "urn:x"),
            NsBinding::new(None, "urn:b"),
        ];
        assert_eq!(lookup_binding(&bindings, None), Some("urn:b"));
        assert_eq!(lookup_binding(&bindings, Some("x")), Some("urn:x"));
        assert_eq!(lookup_binding(&bindings, Some("y")), None);
    }

    #[test]
    fn attribute_names() {
        assert_eq!(NsBinding::new(None, "urn:a").attribute_name(), "xmlns");
        assert_eq!(NsBinding::new(Some("p"), "urn:a").attribute_name(), "xmlns:p");
    }

    #[test]
    fn raw_concatenates_nodes() {
        let markup = Markup::new(vec![
            ForeignNode::Text("a ".to_string()),
            ForeignNode::Element("<b/>".to_string()),
        ]);
        assert_eq!(markup.raw(), "a <b/>");
    }
}
