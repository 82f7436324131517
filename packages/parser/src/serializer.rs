use crate::tree::{AttributeData, ElementData, NodeId, RawToken, RawTree};
use crate::visitor::{walk_attributes, walk_children, walk_node, Visitor};

/// Serializer converts a raw tree back to source text
///
/// Every node stores its own tokens, so an unmutated tree re-emits the parsed
/// source byte-for-byte. Mutated regions come out with whatever layout the
/// mutation stored (single spaces, double quotes).
pub struct Serializer {
    output: String,
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            output: String::new(),
        }
    }

    /// Serialize the whole document
    pub fn serialize(mut self, tree: &RawTree) -> String {
        walk_node(&mut self, tree, tree.document());
        self.output
    }

    /// Serialize one subtree (attached or detached)
    pub fn serialize_node(mut self, tree: &RawTree, id: NodeId) -> String {
        walk_node(&mut self, tree, id);
        self.output
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Visitor for Serializer {
    fn visit_element(&mut self, tree: &RawTree, id: NodeId, element: &ElementData) {
        self.output.push('<');
        self.output.push_str(&element.name);
        walk_attributes(self, tree, id);
        self.output.push_str(&element.tag_tail);

        if element.self_closing {
            self.output.push_str("/>");
            return;
        }

        self.output.push('>');
        walk_children(self, tree, id);
        self.output.push_str("</");
        self.output.push_str(&element.name);
        self.output.push_str(&element.end_tail);
        self.output.push('>');
    }

    fn visit_attribute(&mut self, _tree: &RawTree, _id: NodeId, attribute: &AttributeData) {
        self.output.push_str(&attribute.leading);
        self.output.push_str(&attribute.name);
        self.output.push_str(&attribute.separator);
        self.output.push(attribute.quote);
        self.output.push_str(&attribute.raw_value);
        self.output.push(attribute.quote);
    }

    fn visit_text(&mut self, _tree: &RawTree, _id: NodeId, text: &str) {
        self.output.push_str(text);
    }

    fn visit_token(&mut self, _tree: &RawTree, _id: NodeId, tokens: &[RawToken]) {
        for token in tokens {
            self.output.push_str(&token.text);
        }
    }
}

/// Serialize a whole tree
pub fn serialize(tree: &RawTree) -> String {
    Serializer::new().serialize(tree)
}

/// Serialize the subtree rooted at `id`
pub fn serialize_node(tree: &RawTree, id: NodeId) -> String {
    Serializer::new().serialize_node(tree, id)
}

/// Escape character data for use as element content
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape an attribute value for the given quote character
pub fn escape_attribute(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' if quote == '"' => out.push_str("&quot;"),
            '\'' if quote == '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Resolve predefined and numeric character references
///
/// Unknown references are kept verbatim.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find(';') else {
            out.push_str(after);
            return out;
        };
        let entity = &after[1..end];
        let resolved = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match resolved {
            Some(ch) => out.push(ch),
            None => out.push_str(&after[..=end]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}
