//! # Raw Tree
//!
//! Token-preserving parse tree of a document, stored as an arena keyed by
//! [`NodeId`]. Nodes never hold references to each other; parent and child
//! links are ids, so a whole tree can be cloned, swapped or restored as one
//! value.
//!
//! A node is *reachable* when its parent chain ends at the document node.
//! Nodes whose chain ends anywhere else belong to a detached (floating)
//! subtree: freshly constructed content, or content removed from the
//! document and still referenced by someone.

use crate::error::{ParseError, TreeError};
use crate::id_generator::IDGenerator;
use crate::serializer::unescape;
use crate::snapshot::{NodeSnapshot, SnapshotPair};
use crate::tokenizer::TokenKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Stable node identity within one document lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Token,
}

/// One lexical token with its exact source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawToken {
    pub kind: TokenKind,
    pub text: String,
}

impl RawToken {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Element layout: everything needed to re-emit both tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Qualified name (`prefix:local` or `local`)
    pub name: String,
    /// Whitespace between the last attribute and `>` / `/>`
    pub tag_tail: String,
    pub self_closing: bool,
    /// Whitespace between the end tag name and `>`
    pub end_tail: String,
}

impl ElementData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_tail: String::new(),
            self_closing: true,
            end_tail: String::new(),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }
}

/// Attribute layout: leading whitespace, name, `=` with its padding, quoted value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeData {
    pub leading: String,
    pub name: String,
    pub separator: String,
    pub quote: char,
    /// Escaped value without quotes
    pub raw_value: String,
}

impl AttributeData {
    pub fn new(name: impl Into<String>, value: &str) -> Self {
        Self {
            leading: " ".to_string(),
            name: name.into(),
            separator: "=".to_string(),
            quote: '"',
            raw_value: crate::serializer::escape_attribute(value, '"'),
        }
    }

    /// Unescaped value
    pub fn value(&self) -> String {
        unescape(&self.raw_value)
    }

    pub fn quoted_value(&self) -> String {
        format!("{}{}{}", self.quote, self.raw_value, self.quote)
    }

    /// Namespace prefix declared by this attribute, if it is an xmlns declaration
    pub fn declared_prefix(&self) -> Option<&str> {
        if self.name == "xmlns" {
            Some("")
        } else {
            self.name.strip_prefix("xmlns:")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Attribute(AttributeData),
    /// Raw character data, entity references kept verbatim
    Text(String),
    /// Comments, processing instructions, CDATA, declarations, salvage
    Token(Vec<RawToken>),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document => NodeKind::Document,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Attribute(_) => NodeKind::Attribute,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Token(_) => NodeKind::Token,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) data: NodeData,
    pub(crate) children: Vec<NodeId>,
    pub(crate) attributes: Vec<NodeId>,
}

impl RawNode {
    pub(crate) fn new(id: NodeId, data: NodeData) -> Self {
        Self {
            id,
            parent: None,
            data,
            children: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    /// Content children (elements, text, token nodes)
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Attribute nodes, in source order
    pub fn attributes(&self) -> &[NodeId] {
        &self.attributes
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_attribute(&self) -> Option<&AttributeData> {
        match &self.data {
            NodeData::Attribute(attribute) => Some(attribute),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Token-preserving document tree
#[derive(Debug, Clone)]
pub struct RawTree {
    pub(crate) nodes: HashMap<NodeId, RawNode>,
    pub(crate) document: NodeId,
    pub(crate) ids: IDGenerator,
    pub(crate) diagnostics: Vec<ParseError>,
    pub(crate) capture: Option<Vec<SnapshotPair>>,
}

impl RawTree {
    /// Empty document drawing ids from `ids`
    pub fn new(ids: IDGenerator) -> Self {
        let document = ids.new_id();
        let mut nodes = HashMap::new();
        nodes.insert(document, RawNode::new(document, NodeData::Document));
        Self {
            nodes,
            document,
            ids,
            diagnostics: Vec::new(),
            capture: None,
        }
    }

    /// Parse `source` into a fresh tree
    pub fn create_root(source: &str) -> Result<Self, ParseError> {
        crate::parser::parse(source)
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn ids(&self) -> &IDGenerator {
        &self.ids
    }

    /// Structural problems the parser recovered from
    pub fn diagnostics(&self) -> &[ParseError] {
        &self.diagnostics
    }

    pub fn is_well_formed(&self) -> bool {
        self.diagnostics.is_empty() && self.root_element().is_some()
    }

    /// The document element, if the document has one
    pub fn root_element(&self) -> Option<NodeId> {
        self.nodes.get(&self.document).and_then(|doc| {
            doc.children
                .iter()
                .copied()
                .find(|child| self.kind(*child) == Some(NodeKind::Element))
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&RawNode> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&RawNode, TreeError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| TreeError::invalid(id, "not part of this tree"))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut RawNode, TreeError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| TreeError::invalid(id, "not part of this tree"))
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(RawNode::kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.attributes.as_slice())
            .unwrap_or(&[])
    }

    pub fn element(&self, id: NodeId) -> Result<&ElementData, TreeError> {
        self.node(id)?
            .as_element()
            .ok_or_else(|| TreeError::invalid(id, "not an element"))
    }

    /// Attribute node of `element` named `name`
    pub fn attribute_node(&self, element: NodeId, name: &str) -> Option<NodeId> {
        self.attributes(element).iter().copied().find(|attr| {
            self.nodes
                .get(attr)
                .and_then(RawNode::as_attribute)
                .map_or(false, |data| data.name == name)
        })
    }

    /// Unescaped attribute value
    pub fn attribute(&self, element: NodeId, name: &str) -> Option<String> {
        self.attribute_node(element, name)
            .and_then(|attr| self.nodes.get(&attr))
            .and_then(RawNode::as_attribute)
            .map(AttributeData::value)
    }

    /// Unescaped character content of a subtree (text and CDATA)
    pub fn text_content(&self, id: NodeId) -> String {
        let mut collector = TextCollector::default();
        crate::visitor::walk_node(&mut collector, self, id);
        collector.text
    }

    /// Ancestors of `id` from its parent up to, but excluding, the document
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if parent == self.document {
                break;
            }
            ancestors.push(parent);
            current = self.parent(parent);
        }
        ancestors
    }

    /// `id` followed by its ancestors below the document
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        path.extend(self.ancestors(id));
        path
    }

    /// Whether `id` can be reached from the document node
    pub fn is_reachable(&self, id: NodeId) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        let mut current = id;
        loop {
            if current == self.document {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Whether `ancestor` is `id` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Topmost node of the subtree containing `id`
    pub fn subtree_root(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Roots of detached subtrees currently held in the arena
    pub fn detached_roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.parent.is_none() && node.id != self.document)
            .map(|node| node.id)
            .collect();
        roots.sort();
        roots
    }

    /// All ids of the subtree rooted at `id`, attributes included, pre-order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            for child in node.children.iter().rev() {
                stack.push(*child);
            }
            for attr in node.attributes.iter().rev() {
                stack.push(*attr);
            }
        }
        out
    }

    /// Namespace bindings in scope for a node path (node first, ancestors after)
    ///
    /// The empty prefix maps to the default namespace.
    pub fn namespace_bindings(&self, path: &[NodeId]) -> BTreeMap<String, String> {
        let mut bindings = BTreeMap::new();
        for id in path.iter().rev() {
            for attr in self.attributes(*id) {
                if let Some(data) = self.nodes.get(attr).and_then(RawNode::as_attribute) {
                    if let Some(prefix) = data.declared_prefix() {
                        bindings.insert(prefix.to_string(), data.value());
                    }
                }
            }
        }
        bindings
    }

    /// Namespace URI of an element, resolved through its current ancestors
    pub fn namespace_of(&self, element: NodeId) -> Option<String> {
        let data = self.nodes.get(&element)?.as_element()?;
        let bindings = self.namespace_bindings(&self.path_to_root(element));
        bindings.get(data.prefix().unwrap_or("")).cloned()
    }

    /// Tokens owned by the node itself, excluding children and attributes
    pub fn own_tokens(&self, id: NodeId) -> Vec<RawToken> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        match &node.data {
            NodeData::Document => Vec::new(),
            NodeData::Element(element) => {
                let mut tokens = vec![
                    RawToken::new(TokenKind::TagOpen, "<"),
                    RawToken::new(TokenKind::Name, element.name.clone()),
                ];
                if !element.tag_tail.is_empty() {
                    tokens.push(RawToken::new(TokenKind::Whitespace, element.tag_tail.clone()));
                }
                if element.self_closing {
                    tokens.push(RawToken::new(TokenKind::EmptyTagClose, "/>"));
                } else {
                    tokens.push(RawToken::new(TokenKind::TagClose, ">"));
                    tokens.push(RawToken::new(TokenKind::EndTagOpen, "</"));
                    tokens.push(RawToken::new(TokenKind::Name, element.name.clone()));
                    if !element.end_tail.is_empty() {
                        tokens.push(RawToken::new(TokenKind::Whitespace, element.end_tail.clone()));
                    }
                    tokens.push(RawToken::new(TokenKind::TagClose, ">"));
                }
                tokens
            }
            NodeData::Attribute(attribute) => vec![
                RawToken::new(TokenKind::Whitespace, attribute.leading.clone()),
                RawToken::new(TokenKind::Name, attribute.name.clone()),
                RawToken::new(TokenKind::Equals, attribute.separator.clone()),
                RawToken::new(TokenKind::Value, attribute.quoted_value()),
            ],
            NodeData::Text(text) => vec![RawToken::new(TokenKind::Text, text.clone())],
            NodeData::Token(tokens) => tokens.clone(),
        }
    }

    /// Identity first, then structural equivalence
    ///
    /// Structural equivalence means equal own tokens and equal attribute
    /// values matched by name. Children are not compared.
    pub fn same_node(&self, a: NodeId, other: &RawTree, b: NodeId) -> bool {
        if a == b && self.ids.same_lineage(&other.ids) {
            return true;
        }
        let (Some(left), Some(right)) = (self.nodes.get(&a), other.nodes.get(&b)) else {
            return false;
        };
        if left.kind() != right.kind() || self.own_tokens(a) != other.own_tokens(b) {
            return false;
        }
        if left.attributes.len() != right.attributes.len() {
            return false;
        }
        left.attributes.iter().all(|attr| {
            let Some(data) = self.nodes.get(attr).and_then(RawNode::as_attribute) else {
                return false;
            };
            other
                .attribute_node(b, &data.name)
                .map_or(false, |matched| self.own_tokens(*attr) == other.own_tokens(matched))
        })
    }

    // ----- construction -----

    /// Insert a detached node and return its id
    pub(crate) fn insert_node(&mut self, data: NodeData) -> NodeId {
        let id = self.ids.new_id();
        self.nodes.insert(id, RawNode::new(id, data));
        id
    }

    /// Link a detached node under `parent` at `index` (append when `None`)
    pub(crate) fn link_child(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) -> Result<(), TreeError> {
        self.node(parent)?;
        let is_attribute = self.kind(child) == Some(NodeKind::Attribute);
        self.node_mut(child)?.parent = Some(parent);
        let parent_node = self.node_mut(parent)?;
        let list = if is_attribute {
            &mut parent_node.attributes
        } else {
            &mut parent_node.children
        };
        match index {
            Some(index) => list.insert(index.min(list.len()), child),
            None => list.push(child),
        }
        Ok(())
    }

    /// Unlink `child` from its parent, leaving it detached in the arena
    pub(crate) fn unlink(&mut self, child: NodeId) -> Result<(), TreeError> {
        let Some(parent) = self.node(child)?.parent else {
            return Ok(());
        };
        let parent_node = self.node_mut(parent)?;
        parent_node.children.retain(|id| *id != child);
        parent_node.attributes.retain(|id| *id != child);
        self.node_mut(child)?.parent = None;
        Ok(())
    }

    /// New detached element
    pub fn create_element(&mut self, name: &str) -> Result<NodeId, TreeError> {
        if !is_valid_name(name) {
            return Err(TreeError::MalformedFragment(format!("invalid element name `{}`", name)));
        }
        Ok(self.insert_node(NodeData::Element(ElementData::new(name))))
    }

    /// New detached text node holding `text` (escaped)
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.insert_node(NodeData::Text(crate::serializer::escape_text(text)))
    }

    /// Copy the subtree at `id` as a new detached subtree with fresh ids
    pub fn deep_copy(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        let node = self.node(id)?.clone();
        if node.kind() == NodeKind::Document {
            return Err(TreeError::invalid(id, "the document node cannot be copied"));
        }
        let copy = self.insert_node(node.data.clone());
        for attr in node.attributes {
            let attr_copy = self.deep_copy(attr)?;
            self.link_child(copy, attr_copy, None)?;
        }
        for child in node.children {
            let child_copy = self.deep_copy(child)?;
            self.link_child(copy, child_copy, None)?;
        }
        Ok(copy)
    }

    /// Copy a subtree from another tree of the same lineage, keeping its ids
    ///
    /// The copied root is detached in `self`.
    pub fn transplant(&mut self, source: &RawTree, root: NodeId) -> Result<(), TreeError> {
        let ids = source.descendants(root);
        if ids.is_empty() {
            return Err(TreeError::invalid(root, "not part of the source tree"));
        }
        if let Some(clash) = ids.iter().find(|id| self.nodes.contains_key(id)) {
            return Err(TreeError::invalid(*clash, "id already present in target tree"));
        }
        for id in ids {
            let mut node = source.node(id)?.clone();
            if id == root {
                node.parent = None;
            }
            self.nodes.insert(id, node);
        }
        Ok(())
    }

    /// Drop detached subtrees whose root does not satisfy `keep`
    pub fn prune_detached(&mut self, keep: impl Fn(NodeId) -> bool) -> usize {
        let mut removed = 0;
        for root in self.detached_roots() {
            if keep(root) {
                continue;
            }
            for id in self.descendants(root) {
                self.nodes.remove(&id);
                removed += 1;
            }
        }
        removed
    }

    // ----- change tracking -----

    /// Start capturing snapshot pairs for every mutation
    pub fn begin_tracking(&mut self) {
        self.capture = Some(Vec::new());
    }

    /// Stop capturing and return what was captured
    pub fn end_tracking(&mut self) -> Vec<SnapshotPair> {
        self.capture.take().unwrap_or_default()
    }

    pub fn is_tracking(&self) -> bool {
        self.capture.is_some()
    }

    pub(crate) fn record(&mut self, pair: SnapshotPair) {
        if let Some(capture) = &mut self.capture {
            capture.push(pair);
        }
    }

    /// Snapshot of `id` with its current ancestors
    pub fn snapshot(&self, id: NodeId, added: bool) -> NodeSnapshot {
        NodeSnapshot {
            node: id,
            kind: self.kind(id).unwrap_or(NodeKind::Token),
            ancestors: self.ancestors(id),
            added,
        }
    }

    /// Rewrite node ids according to `mapping` (old id -> new id)
    pub(crate) fn remap_ids(&mut self, mapping: &HashMap<NodeId, NodeId>) {
        if mapping.is_empty() {
            return;
        }
        let map = |id: NodeId| mapping.get(&id).copied().unwrap_or(id);
        let nodes = std::mem::take(&mut self.nodes);
        self.nodes = nodes
            .into_values()
            .map(|mut node| {
                node.id = map(node.id);
                node.parent = node.parent.map(map);
                node.children.iter_mut().for_each(|id| *id = map(*id));
                node.attributes.iter_mut().for_each(|id| *id = map(*id));
                (node.id, node)
            })
            .collect();
        self.document = map(self.document);
    }

    /// Ids of every node in the arena
    pub fn node_ids(&self) -> HashSet<NodeId> {
        self.nodes.keys().copied().collect()
    }
}

/// Whether `name` is usable as an element or attribute name
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | ':' | '-'))
}

#[derive(Default)]
struct TextCollector {
    text: String,
}

impl crate::visitor::Visitor for TextCollector {
    fn visit_text(&mut self, _tree: &RawTree, _id: NodeId, text: &str) {
        self.text.push_str(&unescape(text));
    }

    fn visit_token(&mut self, _tree: &RawTree, _id: NodeId, tokens: &[RawToken]) {
        for token in tokens {
            if token.kind == TokenKind::CData {
                let inner = token
                    .text
                    .strip_prefix("<![CDATA[")
                    .and_then(|rest| rest.strip_suffix("]]>"))
                    .unwrap_or("");
                self.text.push_str(inner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn test_ancestors_exclude_document() {
        let tree = parse("<a><b><c/></b></a>").unwrap();
        let a = tree.root_element().unwrap();
        let b = tree.children(a)[0];
        let c = tree.children(b)[0];

        assert_eq!(tree.ancestors(c), vec![b, a]);
        assert_eq!(tree.path_to_root(c), vec![c, b, a]);
        assert!(tree.ancestors(a).is_empty());
    }

    #[test]
    fn test_reachability_of_detached_nodes() {
        let mut tree = parse("<a/>").unwrap();
        let a = tree.root_element().unwrap();
        let floating = tree.create_element("x").unwrap();

        assert!(tree.is_reachable(a));
        assert!(!tree.is_reachable(floating));
        assert_eq!(tree.detached_roots(), vec![floating]);
    }

    #[test]
    fn test_attribute_values_are_unescaped() {
        let tree = parse(r#"<a title="x &amp; y" other='&lt;b&gt;'/>"#).unwrap();
        let a = tree.root_element().unwrap();

        assert_eq!(tree.attribute(a, "title").as_deref(), Some("x & y"));
        assert_eq!(tree.attribute(a, "other").as_deref(), Some("<b>"));
        assert_eq!(tree.attribute(a, "missing"), None);
    }

    #[test]
    fn test_text_content_includes_cdata() {
        let tree = parse("<a>one <b>two</b><![CDATA[<three>]]></a>").unwrap();
        let a = tree.root_element().unwrap();
        assert_eq!(tree.text_content(a), "one two<three>");
    }

    #[test]
    fn test_namespace_resolution() {
        let tree = parse(r#"<r xmlns="urn:d" xmlns:p="urn:p"><p:x><y xmlns="urn:inner"/></p:x></r>"#).unwrap();
        let r = tree.root_element().unwrap();
        let x = tree.children(r)[0];
        let y = tree.children(x)[0];

        assert_eq!(tree.namespace_of(r).as_deref(), Some("urn:d"));
        assert_eq!(tree.namespace_of(x).as_deref(), Some("urn:p"));
        assert_eq!(tree.namespace_of(y).as_deref(), Some("urn:inner"));
    }

    #[test]
    fn test_same_node_structural_fallback() {
        let left = parse(r#"<a><b x="1" y="2">t</b></a>"#).unwrap();
        let right = parse(r#"<a><b x="1" y="2">other</b></a>"#).unwrap();
        let lb = left.children(left.root_element().unwrap())[0];
        let rb = right.children(right.root_element().unwrap())[0];

        // different lineages, so identity never applies
        assert!(left.same_node(lb, &right, rb));

        let changed = parse(r#"<a><b x="1" y="3"/></a>"#).unwrap();
        let cb = changed.children(changed.root_element().unwrap())[0];
        assert!(!left.same_node(lb, &changed, cb));
    }

    #[test]
    fn test_deep_copy_assigns_fresh_ids() {
        let mut tree = parse(r#"<a><b k="v">t</b></a>"#).unwrap();
        let b = tree.children(tree.root_element().unwrap())[0];
        let copy = tree.deep_copy(b).unwrap();

        assert_ne!(copy, b);
        assert!(!tree.is_reachable(copy));
        assert_eq!(tree.attribute(copy, "k").as_deref(), Some("v"));
        assert_eq!(tree.text_content(copy), "t");
        assert!(tree.same_node(b, &tree.clone(), copy));
    }

    #[test]
    fn test_prune_detached_keeps_selected_roots() {
        let mut tree = parse("<a/>").unwrap();
        let keep = tree.create_element("keep").unwrap();
        let drop = tree.create_element("drop").unwrap();

        let removed = tree.prune_detached(|root| root == keep);

        assert_eq!(removed, 1);
        assert!(tree.contains(keep));
        assert!(!tree.contains(drop));
    }
}
