//! # Raw Tree Mutations
//!
//! Every mutation is validated before anything is touched, so a failed
//! mutation leaves the tree unchanged. When the tree is tracking, each
//! successful mutation records exactly one [`SnapshotPair`]:
//!
//! | Operation | Pre-image | Post-image |
//! |---|---|---|
//! | AppendChild, InsertBefore | - | inserted child |
//! | RemoveChild | removed child | - |
//! | ReplaceChild | old child | new child |
//! | everything else | changed node | changed node |

use crate::error::TreeError;
use crate::parser::parse_fragment;
use crate::serializer::{escape_attribute, escape_text};
use crate::snapshot::SnapshotPair;
use crate::tree::{is_valid_name, AttributeData, NodeData, NodeId, NodeKind, RawTree};
use serde::{Deserialize, Serialize};

/// Structural operations on a raw tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationOp {
    /// Add or overwrite an attribute value
    SetAttribute {
        element: NodeId,
        name: String,
        value: String,
    },

    RemoveAttribute { element: NodeId, name: String },

    /// Append a detached node as the last child
    AppendChild { parent: NodeId, child: NodeId },

    /// Insert a detached node before an existing child
    InsertBefore {
        parent: NodeId,
        child: NodeId,
        before: NodeId,
    },

    /// Detach a child; it stays in the arena as a floating subtree
    RemoveChild { parent: NodeId, child: NodeId },

    RemoveChildren { parent: NodeId, children: Vec<NodeId> },

    /// Swap an existing child for a detached node
    ReplaceChild {
        parent: NodeId,
        old: NodeId,
        new: NodeId,
    },

    /// Replace all content with a single text node (none for empty text)
    SetText { element: NodeId, text: String },

    /// Replace all content with parsed markup
    SetXmlFragment { element: NodeId, fragment: String },

    /// `new_children[i] = old_children[permutation[i]]`
    ReorderChildren {
        parent: NodeId,
        permutation: Vec<usize>,
    },

    /// Change (or drop) the namespace prefix of an element
    SetPrefix {
        element: NodeId,
        prefix: Option<String>,
    },
}

impl MutationOp {
    /// Get a debug name for this mutation
    pub fn name(&self) -> &'static str {
        match self {
            MutationOp::SetAttribute { .. } => "set_attribute",
            MutationOp::RemoveAttribute { .. } => "remove_attribute",
            MutationOp::AppendChild { .. } => "append_child",
            MutationOp::InsertBefore { .. } => "insert_before",
            MutationOp::RemoveChild { .. } => "remove_child",
            MutationOp::RemoveChildren { .. } => "remove_children",
            MutationOp::ReplaceChild { .. } => "replace_child",
            MutationOp::SetText { .. } => "set_text",
            MutationOp::SetXmlFragment { .. } => "set_xml_fragment",
            MutationOp::ReorderChildren { .. } => "reorder_children",
            MutationOp::SetPrefix { .. } => "set_prefix",
        }
    }

    /// The node whose content or child list the operation changes
    pub fn target(&self) -> NodeId {
        match self {
            MutationOp::SetAttribute { element, .. }
            | MutationOp::RemoveAttribute { element, .. }
            | MutationOp::SetText { element, .. }
            | MutationOp::SetXmlFragment { element, .. }
            | MutationOp::SetPrefix { element, .. } => *element,
            MutationOp::AppendChild { parent, .. }
            | MutationOp::InsertBefore { parent, .. }
            | MutationOp::RemoveChild { parent, .. }
            | MutationOp::RemoveChildren { parent, .. }
            | MutationOp::ReplaceChild { parent, .. }
            | MutationOp::ReorderChildren { parent, .. } => *parent,
        }
    }
}

impl RawTree {
    /// Apply a mutation and return the id of the node that changed
    ///
    /// Child insertions and removals report the parent; replacements that
    /// create new nodes (SetText, SetXmlFragment) report the element whose
    /// content was replaced.
    pub fn mutate(&mut self, op: MutationOp) -> Result<NodeId, TreeError> {
        match op {
            MutationOp::SetAttribute { element, name, value } => self.set_attribute(element, &name, &value),
            MutationOp::RemoveAttribute { element, name } => self.remove_attribute(element, &name),
            MutationOp::AppendChild { parent, child } => self.insert_child(parent, child, None),
            MutationOp::InsertBefore { parent, child, before } => self.insert_child(parent, child, Some(before)),
            MutationOp::RemoveChild { parent, child } => self.remove_child(parent, child),
            MutationOp::RemoveChildren { parent, children } => self.remove_children(parent, &children),
            MutationOp::ReplaceChild { parent, old, new } => self.replace_child(parent, old, new),
            MutationOp::SetText { element, text } => self.set_text(element, &text),
            MutationOp::SetXmlFragment { element, fragment } => self.set_xml_fragment(element, &fragment),
            MutationOp::ReorderChildren { parent, permutation } => self.reorder_children(parent, &permutation),
            MutationOp::SetPrefix { element, prefix } => self.set_prefix(element, prefix.as_deref()),
        }
    }

    fn require_element(&self, id: NodeId) -> Result<(), TreeError> {
        self.element(id).map(|_| ())
    }

    fn require_container(&self, id: NodeId) -> Result<(), TreeError> {
        match self.kind(id) {
            Some(NodeKind::Element) | Some(NodeKind::Document) => Ok(()),
            Some(_) => Err(TreeError::invalid(id, "cannot hold children")),
            None => Err(TreeError::invalid(id, "not part of this tree")),
        }
    }

    fn require_child_of(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if self.parent(child) != Some(parent) || !self.children(parent).contains(&child) {
            return Err(TreeError::invalid(child, format!("not a child of {}", parent)));
        }
        Ok(())
    }

    /// A node that may be linked under `parent`, possibly in place of `replacing`
    fn require_insertable(&self, parent: NodeId, child: NodeId, replacing: Option<NodeId>) -> Result<(), TreeError> {
        let node = self.node(child)?;
        match node.kind() {
            NodeKind::Document | NodeKind::Attribute => {
                return Err(TreeError::invalid(child, "cannot be inserted as content"));
            }
            _ => {}
        }
        if node.parent().is_some() {
            return Err(TreeError::invalid(child, "already has a parent"));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::invalid(child, "insertion would create a cycle"));
        }
        if parent == self.document
            && node.kind() == NodeKind::Element
            && self.root_element().map_or(false, |root| Some(root) != replacing)
        {
            return Err(TreeError::invalid(child, "document already has a root element"));
        }
        Ok(())
    }

    /// Snapshot pair for a node modified in place
    fn modified(&self, id: NodeId) -> SnapshotPair {
        SnapshotPair::modified(self.snapshot(id, false), self.snapshot(id, true))
    }

    fn open_element(&mut self, id: NodeId) -> Result<(), TreeError> {
        if let NodeData::Element(element) = &mut self.node_mut(id)?.data {
            element.self_closing = false;
        }
        Ok(())
    }

    fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> Result<NodeId, TreeError> {
        self.require_element(element)?;
        if !is_valid_name(name) {
            return Err(TreeError::invalid(element, format!("invalid attribute name `{}`", name)));
        }

        let before = self.snapshot(element, false);
        match self.attribute_node(element, name) {
            Some(attr) => {
                if let NodeData::Attribute(data) = &mut self.node_mut(attr)?.data {
                    data.raw_value = escape_attribute(value, data.quote);
                }
            }
            None => {
                let attr = self.insert_node(NodeData::Attribute(AttributeData::new(name, value)));
                self.link_child(element, attr, None)?;
            }
        }
        self.record(SnapshotPair::modified(before, self.snapshot(element, true)));
        Ok(element)
    }

    fn remove_attribute(&mut self, element: NodeId, name: &str) -> Result<NodeId, TreeError> {
        self.require_element(element)?;
        let Some(attr) = self.attribute_node(element, name) else {
            return Ok(element);
        };
        let before = self.snapshot(element, false);
        self.unlink(attr)?;
        self.nodes.remove(&attr);
        self.record(SnapshotPair::modified(before, self.snapshot(element, true)));
        Ok(element)
    }

    fn insert_child(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) -> Result<NodeId, TreeError> {
        self.require_container(parent)?;
        self.require_insertable(parent, child, None)?;
        let index = match before {
            Some(before) => {
                self.require_child_of(parent, before)?;
                self.children(parent).iter().position(|id| *id == before)
            }
            None => None,
        };

        self.open_element(parent)?;
        self.link_child(parent, child, index)?;
        self.record(SnapshotPair::inserted(self.snapshot(child, true)));
        Ok(parent)
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId, TreeError> {
        self.require_child_of(parent, child)?;
        let before = self.snapshot(child, false);
        self.unlink(child)?;
        self.record(SnapshotPair::removed(before));
        Ok(parent)
    }

    fn remove_children(&mut self, parent: NodeId, children: &[NodeId]) -> Result<NodeId, TreeError> {
        self.require_container(parent)?;
        for child in children {
            self.require_child_of(parent, *child)?;
        }
        let before = self.snapshot(parent, false);
        for child in children {
            self.unlink(*child)?;
        }
        self.record(SnapshotPair::modified(before, self.snapshot(parent, true)));
        Ok(parent)
    }

    fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> Result<NodeId, TreeError> {
        self.require_child_of(parent, old)?;
        self.require_insertable(parent, new, Some(old))?;

        let index = self.children(parent).iter().position(|id| *id == old);
        let before = self.snapshot(old, false);
        self.unlink(old)?;
        self.link_child(parent, new, index)?;
        self.record(SnapshotPair {
            before: Some(before),
            after: Some(self.snapshot(new, true)),
        });
        Ok(parent)
    }

    fn set_text(&mut self, element: NodeId, text: &str) -> Result<NodeId, TreeError> {
        self.require_element(element)?;
        let before = self.snapshot(element, false);

        for child in self.children(element).to_vec() {
            self.unlink(child)?;
        }
        if !text.is_empty() {
            let node = self.insert_node(NodeData::Text(escape_text(text)));
            self.link_child(element, node, None)?;
        }
        self.open_element(element)?;
        self.record(SnapshotPair::modified(before, self.snapshot(element, true)));
        Ok(element)
    }

    fn set_xml_fragment(&mut self, element: NodeId, fragment: &str) -> Result<NodeId, TreeError> {
        self.require_element(element)?;
        let parsed = parse_fragment(fragment, self.ids.clone())
            .map_err(|error| TreeError::MalformedFragment(error.to_string()))?;
        let before = self.snapshot(element, false);

        for child in self.children(element).to_vec() {
            self.unlink(child)?;
        }
        for child in parsed.children(parsed.document()).to_vec() {
            self.transplant(&parsed, child)?;
            self.link_child(element, child, None)?;
        }
        self.open_element(element)?;
        self.record(SnapshotPair::modified(before, self.snapshot(element, true)));
        Ok(element)
    }

    fn reorder_children(&mut self, parent: NodeId, permutation: &[usize]) -> Result<NodeId, TreeError> {
        self.require_container(parent)?;
        let children = self.children(parent).to_vec();
        let mut seen = vec![false; children.len()];
        let valid = permutation.len() == children.len()
            && permutation.iter().all(|index| {
                *index < seen.len() && !std::mem::replace(&mut seen[*index], true)
            });
        if !valid {
            return Err(TreeError::invalid(parent, "reorder argument is not a permutation of the children"));
        }

        let reordered = permutation.iter().map(|index| children[*index]).collect();
        self.node_mut(parent)?.children = reordered;
        self.record(self.modified(parent));
        Ok(parent)
    }

    fn set_prefix(&mut self, element: NodeId, prefix: Option<&str>) -> Result<NodeId, TreeError> {
        let local = self.element(element)?.local_name().to_string();
        let name = match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
            _ => local,
        };
        if !is_valid_name(&name) {
            return Err(TreeError::invalid(element, format!("invalid prefix for `{}`", name)));
        }

        let before = self.snapshot(element, false);
        if let NodeData::Element(data) = &mut self.node_mut(element)?.data {
            data.name = name;
        }
        self.record(SnapshotPair::modified(before, self.snapshot(element, true)));
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse, serialize};

    fn tree_and_root(source: &str) -> (RawTree, NodeId) {
        let tree = parse(source).unwrap();
        let root = tree.root_element().unwrap();
        (tree, root)
    }

    #[test]
    fn test_set_attribute_updates_in_place() {
        let (mut tree, a) = tree_and_root("<a x='1'  y=\"2\"/>");
        tree.mutate(MutationOp::SetAttribute {
            element: a,
            name: "x".into(),
            value: "it's".into(),
        })
        .unwrap();

        assert_eq!(serialize(&tree), "<a x='it&apos;s'  y=\"2\"/>");
    }

    #[test]
    fn test_set_attribute_appends_new() {
        let (mut tree, a) = tree_and_root("<a/>");
        tree.mutate(MutationOp::SetAttribute {
            element: a,
            name: "k".into(),
            value: "v".into(),
        })
        .unwrap();
        assert_eq!(serialize(&tree), "<a k=\"v\"/>");
    }

    #[test]
    fn test_remove_attribute() {
        let (mut tree, a) = tree_and_root("<a k=\"v\" z=\"1\"/>");
        tree.mutate(MutationOp::RemoveAttribute {
            element: a,
            name: "k".into(),
        })
        .unwrap();
        assert_eq!(serialize(&tree), "<a z=\"1\"/>");
    }

    #[test]
    fn test_append_child_opens_self_closing_parent() {
        let (mut tree, a) = tree_and_root("<a/>");
        let b = tree.create_element("b").unwrap();
        tree.mutate(MutationOp::AppendChild { parent: a, child: b }).unwrap();

        assert_eq!(serialize(&tree), "<a><b/></a>");
        assert!(tree.is_reachable(b));
    }

    #[test]
    fn test_insert_before() {
        let (mut tree, a) = tree_and_root("<a><c/></a>");
        let c = tree.children(a)[0];
        let b = tree.create_element("b").unwrap();
        tree.mutate(MutationOp::InsertBefore { parent: a, child: b, before: c }).unwrap();
        assert_eq!(serialize(&tree), "<a><b/><c/></a>");
    }

    #[test]
    fn test_cycle_detection() {
        let mut tree = parse("<a/>").unwrap();
        let x = tree.create_element("x").unwrap();
        let y = tree.create_element("y").unwrap();
        tree.mutate(MutationOp::AppendChild { parent: x, child: y }).unwrap();

        let result = tree.mutate(MutationOp::AppendChild { parent: y, child: x });
        assert!(matches!(result, Err(TreeError::InvalidNode { .. })));
    }

    #[test]
    fn test_remove_child_detaches() {
        let (mut tree, a) = tree_and_root("<a><b/><c/></a>");
        let b = tree.children(a)[0];
        let changed = tree.mutate(MutationOp::RemoveChild { parent: a, child: b }).unwrap();

        assert_eq!(changed, a);
        assert_eq!(serialize(&tree), "<a><c/></a>");
        assert!(tree.contains(b));
        assert!(!tree.is_reachable(b));
    }

    #[test]
    fn test_remove_child_rejects_foreign_node() {
        let (mut tree, a) = tree_and_root("<a><b><c/></b></a>");
        let b = tree.children(a)[0];
        let c = tree.children(b)[0];
        let before = serialize(&tree);

        assert!(tree.mutate(MutationOp::RemoveChild { parent: a, child: c }).is_err());
        assert!(tree.mutate(MutationOp::RemoveChild { parent: a, child: NodeId(9999) }).is_err());
        assert_eq!(serialize(&tree), before);
    }

    #[test]
    fn test_remove_children() {
        let (mut tree, a) = tree_and_root("<a><b/>t<c/></a>");
        let children = tree.children(a).to_vec();
        tree.mutate(MutationOp::RemoveChildren {
            parent: a,
            children: vec![children[0], children[2]],
        })
        .unwrap();
        assert_eq!(serialize(&tree), "<a>t</a>");
    }

    #[test]
    fn test_replace_child() {
        let (mut tree, a) = tree_and_root("<a><b/><c/></a>");
        let b = tree.children(a)[0];
        let x = tree.create_element("x").unwrap();
        tree.mutate(MutationOp::ReplaceChild { parent: a, old: b, new: x }).unwrap();
        assert_eq!(serialize(&tree), "<a><x/><c/></a>");
    }

    #[test]
    fn test_replace_document_element() {
        let (mut tree, a) = tree_and_root("<?pi?>\n<a/>");
        let document = tree.document();
        let z = tree.create_element("z").unwrap();
        tree.mutate(MutationOp::ReplaceChild { parent: document, old: a, new: z }).unwrap();

        assert_eq!(serialize(&tree), "<?pi?>\n<z/>");
        assert_eq!(tree.root_element(), Some(z));
    }

    #[test]
    fn test_set_text_replaces_children() {
        let (mut tree, a) = tree_and_root("<a><b/>old</a>");
        tree.mutate(MutationOp::SetText {
            element: a,
            text: "1 < 2".into(),
        })
        .unwrap();

        assert_eq!(serialize(&tree), "<a>1 &lt; 2</a>");
        assert_eq!(tree.text_content(a), "1 < 2");
        assert_eq!(tree.children(a).len(), 1);
    }

    #[test]
    fn test_set_xml_fragment() {
        let (mut tree, a) = tree_and_root("<a>old</a>");
        tree.mutate(MutationOp::SetXmlFragment {
            element: a,
            fragment: "<b k=\"1\"/>text<c/>".into(),
        })
        .unwrap();

        assert_eq!(serialize(&tree), "<a><b k=\"1\"/>text<c/></a>");
        assert!(tree.children(a).iter().all(|child| tree.is_reachable(*child)));
    }

    #[test]
    fn test_malformed_fragment_leaves_tree_unchanged() {
        let (mut tree, a) = tree_and_root("<a>old</a>");
        let result = tree.mutate(MutationOp::SetXmlFragment {
            element: a,
            fragment: "<b>".into(),
        });

        assert!(matches!(result, Err(TreeError::MalformedFragment(_))));
        assert_eq!(serialize(&tree), "<a>old</a>");
    }

    #[test]
    fn test_reorder_children() {
        let (mut tree, a) = tree_and_root("<a><b/><c/><d/></a>");
        tree.mutate(MutationOp::ReorderChildren {
            parent: a,
            permutation: vec![2, 0, 1],
        })
        .unwrap();
        assert_eq!(serialize(&tree), "<a><d/><b/><c/></a>");

        let bad = tree.mutate(MutationOp::ReorderChildren {
            parent: a,
            permutation: vec![0, 0, 1],
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_set_prefix_renames_both_tags() {
        let (mut tree, a) = tree_and_root("<a xmlns:p=\"urn:p\"><b>t</b></a>");
        let b = tree.children(a)[0];
        tree.mutate(MutationOp::SetPrefix {
            element: b,
            prefix: Some("p".into()),
        })
        .unwrap();
        assert_eq!(serialize(&tree), "<a xmlns:p=\"urn:p\"><p:b>t</p:b></a>");
        assert_eq!(tree.namespace_of(b).as_deref(), Some("urn:p"));

        tree.mutate(MutationOp::SetPrefix { element: b, prefix: None }).unwrap();
        assert_eq!(tree.element(b).unwrap().name, "b");
    }

    #[test]
    fn test_tracking_records_one_pair_per_mutation() {
        let (mut tree, a) = tree_and_root("<a><b/></a>");
        let b = tree.children(a)[0];
        tree.begin_tracking();

        tree.mutate(MutationOp::SetText {
            element: b,
            text: "hi".into(),
        })
        .unwrap();
        tree.mutate(MutationOp::RemoveChild { parent: a, child: b }).unwrap();

        let pairs = tree.end_tracking();
        assert_eq!(pairs.len(), 2);

        let modified = &pairs[0];
        assert_eq!(modified.before.as_ref().unwrap().node, b);
        assert_eq!(modified.after.as_ref().unwrap().ancestors, vec![a]);

        let removed = &pairs[1];
        assert!(removed.after.is_none());
        assert_eq!(removed.before.as_ref().unwrap().ancestors, vec![a]);
        assert!(!tree.is_tracking());
    }

    #[test]
    fn test_untracked_mutations_are_silent() {
        let (mut tree, a) = tree_and_root("<a/>");
        tree.mutate(MutationOp::SetText {
            element: a,
            text: "x".into(),
        })
        .unwrap();
        tree.begin_tracking();
        assert!(tree.end_tracking().is_empty());
    }
}
