/// Round-trip tests: every parse followed by serialize must reproduce the input
use crate::*;

fn assert_roundtrip(source: &str) {
    let tree = parse(source).unwrap_or_else(|e| panic!("Failed to parse {:?}: {}", source, e));
    assert_eq!(serialize(&tree), source, "round trip changed {:?}", source);
}

#[test]
fn test_roundtrip_whitespace_layout() {
    let sources = vec![
        "<a/>",
        "<a />",
        "<a\n  x = 'single'\n  y=\"double\"\n/>",
        "<a   k=\"v\"   ></a   >",
        "<a>\n\t<b>  text  </b>\n</a>\n",
        "\n\n<a/>\n\n",
    ];

    for source in sources {
        assert_roundtrip(source);
    }
}

#[test]
fn test_roundtrip_prolog_and_misc_tokens() {
    let sources = vec![
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a/>",
        "<!DOCTYPE a [\n  <!ENTITY e \"x\">\n]>\n<a>&e;</a>",
        "<!-- leading --><a><!-- inner --></a><!-- trailing -->",
        "<a><![CDATA[<not> & markup]]></a>",
        "<a><?target data?></a>",
    ];

    for source in sources {
        assert_roundtrip(source);
    }
}

#[test]
fn test_roundtrip_entities_kept_verbatim() {
    let sources = vec![
        "<a title=\"&quot;q&quot; &amp; &#65;\">&lt;b&gt; &unknown; &#x263A;</a>",
        "<a x='it&apos;s'/>",
    ];

    for source in sources {
        assert_roundtrip(source);
    }
}

#[test]
fn test_roundtrip_namespaces() {
    assert_roundtrip(
        "<r xmlns=\"urn:d\" xmlns:p=\"urn:p\">\n  <p:x p:attr=\"1\"><y/></p:x>\n</r>",
    );
}

#[test]
fn test_roundtrip_salvaged_document() {
    for source in ["<a><b></a>", "<a>", "text only", "<a/><b/>"] {
        let tree = parse(source).unwrap();
        assert!(!tree.is_well_formed());
        assert_eq!(serialize(&tree), source);
    }
}

#[test]
fn test_serialize_node_of_subtree() {
    let tree = parse("<a>\n  <b k=\"v\">t<c/></b>\n</a>").unwrap();
    let a = tree.root_element().unwrap();
    let b = tree
        .children(a)
        .iter()
        .copied()
        .find(|id| tree.kind(*id) == Some(NodeKind::Element))
        .unwrap();

    assert_eq!(serialize_node(&tree, b), "<b k=\"v\">t<c/></b>");
}

#[test]
fn test_mutation_leaves_untouched_regions_intact() {
    let source = "<a>\n  <b   k = 'v' />\n  <!-- keep -->\n  <c>old</c>\n</a>";
    let mut tree = parse(source).unwrap();
    let a = tree.root_element().unwrap();
    let c = tree
        .children(a)
        .iter()
        .copied()
        .filter(|id| tree.kind(*id) == Some(NodeKind::Element))
        .last()
        .unwrap();

    tree.mutate(MutationOp::SetText {
        element: c,
        text: "new".into(),
    })
    .unwrap();

    assert_eq!(
        serialize(&tree),
        "<a>\n  <b   k = 'v' />\n  <!-- keep -->\n  <c>new</c>\n</a>"
    );
}
