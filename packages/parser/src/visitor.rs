use crate::tree::{AttributeData, ElementData, NodeData, NodeId, RawToken, RawTree};

/// Visitor pattern for traversing raw tree nodes immutably
///
/// Default implementations walk the entire subtree. Override specific
/// visit_* methods to act on nodes; call the matching walk_* function to
/// keep descending.
pub trait Visitor: Sized {
    fn visit_document(&mut self, tree: &RawTree, id: NodeId) {
        walk_children(self, tree, id);
    }

    fn visit_element(&mut self, tree: &RawTree, id: NodeId, _element: &ElementData) {
        walk_attributes(self, tree, id);
        walk_children(self, tree, id);
    }

    fn visit_attribute(&mut self, _tree: &RawTree, _id: NodeId, _attribute: &AttributeData) {
        // Leaf node, no children to walk
    }

    fn visit_text(&mut self, _tree: &RawTree, _id: NodeId, _text: &str) {
        // Leaf node, no children to walk
    }

    fn visit_token(&mut self, _tree: &RawTree, _id: NodeId, _tokens: &[RawToken]) {
        // Leaf node, no children to walk
    }
}

/// Dispatch `id` to the visitor method for its kind
pub fn walk_node<V: Visitor>(visitor: &mut V, tree: &RawTree, id: NodeId) {
    let Some(node) = tree.get(id) else {
        return;
    };
    match node.data() {
        NodeData::Document => visitor.visit_document(tree, id),
        NodeData::Element(element) => visitor.visit_element(tree, id, element),
        NodeData::Attribute(attribute) => visitor.visit_attribute(tree, id, attribute),
        NodeData::Text(text) => visitor.visit_text(tree, id, text),
        NodeData::Token(tokens) => visitor.visit_token(tree, id, tokens),
    }
}

pub fn walk_attributes<V: Visitor>(visitor: &mut V, tree: &RawTree, id: NodeId) {
    for attr in tree.attributes(id) {
        walk_node(visitor, tree, *attr);
    }
}

pub fn walk_children<V: Visitor>(visitor: &mut V, tree: &RawTree, id: NodeId) {
    for child in tree.children(id) {
        walk_node(visitor, tree, *child);
    }
}

/// Per-kind node counts, handy for diagnostics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeStats {
    pub elements: usize,
    pub attributes: usize,
    pub texts: usize,
    pub tokens: usize,
}

impl Visitor for NodeStats {
    fn visit_element(&mut self, tree: &RawTree, id: NodeId, _element: &ElementData) {
        self.elements += 1;
        walk_attributes(self, tree, id);
        walk_children(self, tree, id);
    }

    fn visit_attribute(&mut self, _tree: &RawTree, _id: NodeId, _attribute: &AttributeData) {
        self.attributes += 1;
    }

    fn visit_text(&mut self, _tree: &RawTree, _id: NodeId, _text: &str) {
        self.texts += 1;
    }

    fn visit_token(&mut self, _tree: &RawTree, _id: NodeId, _tokens: &[RawToken]) {
        self.tokens += 1;
    }
}

impl NodeStats {
    pub fn collect(tree: &RawTree) -> Self {
        let mut stats = Self::default();
        walk_node(&mut stats, tree, tree.document());
        stats
    }
}
