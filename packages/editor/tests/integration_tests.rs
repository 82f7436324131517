//! Integration tests for the sync engine

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use weft_editor::{
    ComponentId, EditorError, EngineConfig, MutationContext, MutationOutcome, Placement, SharedEngine, SyncEngine,
    SyncResult,
};

fn engine(source: &str) -> SyncEngine {
    let mut engine = SyncEngine::for_path("doc.xml", EngineConfig::default());
    assert_eq!(engine.sync(source).unwrap(), SyncResult::Valid);
    engine
}

fn root(engine: &SyncEngine) -> ComponentId {
    engine.root().expect("root component")
}

fn name(engine: &SyncEngine, component: ComponentId) -> String {
    engine.view(component).unwrap().as_element().unwrap().name.clone()
}

fn idle() -> MutationContext {
    MutationContext::idle()
}

#[test]
fn test_first_sync_builds_root() {
    let mut engine = engine("<a><b/></a>");
    let root = root(&engine);

    assert_eq!(name(&engine, root), "a");
    let children = engine.children(root).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(name(&engine, children[0]), "b");
    assert_eq!(engine.text(), "<a><b/></a>");
}

#[test]
fn test_text_edit_yields_one_unit() {
    let mut engine = engine("<a><b>one</b></a>");
    let root = root(&engine);
    let b = engine.children(root).unwrap()[0];
    let text = engine.children(b).unwrap()[0];

    assert_eq!(engine.sync("<a><b>two</b></a>").unwrap(), SyncResult::Valid);

    let report = engine.last_report().unwrap();
    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].anchor, b);

    // the text node was matched, so its component survives
    assert_eq!(engine.children(b).unwrap(), vec![text]);
    assert_eq!(engine.view(text).unwrap().as_text().unwrap().text, "two");
}

#[test]
fn test_broken_text_leaves_tree_unchanged() {
    let mut engine = engine("<a><b/></a>");
    let root = root(&engine);
    let before = engine.tree().node_ids();

    assert_eq!(engine.sync("<a><b>").unwrap(), SyncResult::NotWellFormed);

    assert_eq!(engine.text(), "<a><b/></a>");
    assert_eq!(engine.tree().node_ids(), before);
    assert_eq!(engine.root(), Some(root));
    assert!(!engine.is_syncing());
}

#[test]
fn test_removing_document_element_is_not_well_formed() {
    let mut engine = engine("<a/>");
    assert_eq!(engine.sync("<!-- nothing -->").unwrap(), SyncResult::NotWellFormed);
    assert_eq!(engine.text(), "<a/>");
}

#[test]
fn test_sibling_edits_get_separate_units() {
    let mut engine = engine("<a><b><x/></b><c><y/></c></a>");
    let root = root(&engine);
    let children = engine.children(root).unwrap();
    let (b, c) = (children[0], children[1]);

    engine.sync(r#"<a><b><x k="1"/></b><c><y k="2"/></c></a>"#).unwrap();
    let anchors: Vec<_> = engine.last_report().unwrap().units.iter().map(|u| u.anchor).collect();
    assert_eq!(anchors.len(), 2);
    assert!(anchors.contains(&b));
    assert!(anchors.contains(&c));
}

#[test]
fn test_renamed_siblings_under_different_parents() {
    let mut engine = engine("<a><b><x/></b><c><y/></c></a>");
    let root = root(&engine);
    let children = engine.children(root).unwrap();

    engine.sync("<a><b><x2/></b><c><y2/></c></a>").unwrap();

    let report = engine.last_report().unwrap();
    let mut anchors: Vec<_> = report.units.iter().map(|u| u.anchor).collect();
    anchors.sort();
    assert_eq!(anchors, children);
    assert!(report.units.iter().all(|u| u.len() == 2));
}

#[test]
fn test_renamed_siblings_under_same_parent() {
    let mut engine = engine("<a><b/><c/></a>");
    let root = root(&engine);
    engine.children(root).unwrap();

    engine.sync("<a><x/><y/></a>").unwrap();

    let report = engine.last_report().unwrap();
    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].anchor, root);
    assert_eq!(report.rebuild.created.len(), 2);
    assert_eq!(report.rebuild.destroyed.len(), 2);
}

#[test]
fn test_attach_existing_node() {
    let mut engine = engine("<a><b/></a>");
    let root = root(&engine);
    let peer = engine.components().peer(root).unwrap();
    assert_eq!(engine.attach(peer).unwrap(), root);
}

#[test]
fn test_ancestor_edit_absorbs_nested_units() {
    let mut engine = engine("<a><b><x/></b><c><y/></c></a>");
    let root = root(&engine);
    engine.children(root).unwrap();

    engine
        .sync(r#"<a z="1"><b><x k="1"/></b><c><y k="2"/></c></a>"#)
        .unwrap();
    let report = engine.last_report().unwrap();
    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].anchor, root);
}

#[test]
fn test_inserted_sibling_preserves_identity() {
    let mut engine = engine("<a><b/><c/></a>");
    let root = root(&engine);
    let before = engine.children(root).unwrap();

    engine.sync("<a><x/><b/><c/></a>").unwrap();

    let after = engine.children(root).unwrap();
    assert_eq!(after.len(), 3);
    assert_eq!(&after[1..], &before[..]);
    assert_eq!(name(&engine, after[0]), "x");
    assert_eq!(engine.last_report().unwrap().rebuild.created, vec![after[0]]);
}

#[test]
fn test_renamed_child_gets_new_component() {
    let mut engine = engine("<a><b/></a>");
    let root = root(&engine);
    let b = engine.children(root).unwrap()[0];

    engine.sync("<a><c/></a>").unwrap();

    let children = engine.children(root).unwrap();
    assert_eq!(children.len(), 1);
    assert_ne!(children[0], b);
    assert_eq!(name(&engine, children[0]), "c");
    assert!(engine.components().get(b).is_none());
}

#[test]
fn test_root_replacement() {
    let mut engine = engine("<a><b/></a>");
    let old_root = root(&engine);

    assert_eq!(engine.sync("<z/>").unwrap(), SyncResult::Valid);

    let report = engine.last_report().unwrap();
    assert!(report.root_replaced);
    let new_root = root(&engine);
    assert_ne!(new_root, old_root);
    assert_eq!(name(&engine, new_root), "z");
    assert!(engine.components().get(old_root).is_none());
}

#[test]
fn test_unexpected_root_is_rejected() {
    let mut engine = SyncEngine::new(EngineConfig::default().with_expected_root("project"));

    let error = engine.sync("<module/>").unwrap_err();
    assert!(matches!(
        error,
        EditorError::UnexpectedRoot { ref expected, ref found } if expected == "project" && found == "module"
    ));
    assert!(engine.root().is_none());

    engine.sync("<project/>").unwrap();
    assert!(engine.sync("<module/>").is_err());
    assert_eq!(engine.text(), "<project/>");
}

#[test]
fn test_sync_during_pass_is_rejected() {
    let mut engine = engine("<a/>");
    engine.start_sync().unwrap();
    assert!(matches!(engine.sync("<a/>"), Err(EditorError::AlreadySyncing)));
    assert!(engine.end_sync(false).unwrap().is_none());
}

#[test]
fn test_in_tree_mutation_produces_unit() -> anyhow::Result<()> {
    let mut engine = engine("<a><b/></a>");
    let root = root(&engine);
    let b = engine.children(root)?[0];

    let outcome = engine.set_attribute(&idle(), b, "k", "v")?;
    let MutationOutcome::InTree { unit, .. } = outcome else {
        panic!("expected an in-tree outcome, got {:?}", outcome);
    };
    assert_eq!(unit.anchor, b);
    assert!(!unit.is_mergeable());
    assert_eq!(engine.text(), r#"<a><b k="v"/></a>"#);
    assert_eq!(engine.view(b)?.as_element().unwrap().attribute("k"), Some("v"));
    Ok(())
}

#[test]
fn test_floating_mutation_then_insert() -> anyhow::Result<()> {
    let mut engine = engine("<a><b/></a>");
    let root = root(&engine);
    engine.children(root)?;

    let n = engine.create_element("n")?;
    assert!(matches!(engine.placement(n)?, Placement::Floating { .. }));

    let outcome = engine.set_attribute(&idle(), n, "k", "v")?;
    assert!(matches!(outcome, MutationOutcome::Floating { .. }));
    assert_eq!(engine.text(), "<a><b/></a>");

    let outcome = engine.append_child(&idle(), root, n)?;
    assert_eq!(outcome.unit().map(|unit| unit.anchor), Some(root));
    assert_eq!(engine.text(), r#"<a><b/><n k="v"/></a>"#);
    assert!(engine.is_in_tree(n));
    assert_eq!(engine.children(root)?.last(), Some(&n));
    Ok(())
}

#[test]
fn test_removed_child_floats() -> anyhow::Result<()> {
    let mut engine = engine("<a><b>t</b><c/></a>");
    let root = root(&engine);
    let children = engine.children(root)?;
    let b = children[0];

    engine.remove_child(&idle(), root, b)?;

    assert_eq!(engine.text(), "<a><c/></a>");
    assert_eq!(engine.children(root)?, vec![children[1]]);
    assert!(!engine.is_in_tree(b));
    assert_eq!(engine.component_text(b)?, "<b>t</b>");

    // a floating component can be put back
    engine.insert_before(&idle(), root, b, children[1])?;
    assert_eq!(engine.text(), "<a><b>t</b><c/></a>");
    assert!(engine.is_in_tree(b));
    Ok(())
}

#[test]
fn test_released_component_is_collected() -> anyhow::Result<()> {
    let mut engine = engine("<a><b/></a>");
    let root = root(&engine);
    let b = engine.children(root)?[0];
    let peer = engine.components().peer(b)?;

    engine.remove_child(&idle(), root, b)?;
    assert!(engine.tree().contains(peer));
    assert!(engine.release(root).is_err());

    engine.release(b)?;
    assert!(!engine.tree().contains(peer));
    assert!(engine.components().get(b).is_none());
    Ok(())
}

#[test]
fn test_set_text_rebinds_text_component() -> anyhow::Result<()> {
    let mut engine = engine("<a><b>old</b></a>");
    let root = root(&engine);
    let b = engine.children(root)?[0];
    let text = engine.children(b)?[0];

    engine.set_text(&idle(), b, "new")?;

    assert_eq!(engine.text(), "<a><b>new</b></a>");
    assert_eq!(engine.children(b)?, vec![text]);
    assert_eq!(engine.view(text)?.as_text().unwrap().text, "new");
    Ok(())
}

#[test]
fn test_set_xml_fragment() -> anyhow::Result<()> {
    let mut engine = engine("<a><b/></a>");
    let root = root(&engine);
    let b = engine.children(root)?[0];

    engine.set_xml_fragment(&idle(), b, "<c/><d/>")?;
    assert_eq!(engine.text(), "<a><b><c/><d/></b></a>");
    let names: Vec<_> = engine
        .children(b)?
        .into_iter()
        .map(|child| name(&engine, child))
        .collect();
    assert_eq!(names, vec!["c", "d"]);

    let result = engine.set_xml_fragment(&idle(), b, "<c>");
    assert!(matches!(result, Err(EditorError::Tree(_))));
    assert_eq!(engine.text(), "<a><b><c/><d/></b></a>");
    Ok(())
}

#[test]
fn test_reorder_children_keeps_layout_text() -> anyhow::Result<()> {
    let mut engine = engine("<a> <b/> <c/> </a>");
    let root = root(&engine);
    let children = engine.children(root)?;
    assert_eq!(children.len(), 2);

    engine.reorder_children(&idle(), root, &[1, 0])?;

    assert_eq!(engine.text(), "<a> <c/> <b/> </a>");
    assert_eq!(engine.children(root)?, vec![children[1], children[0]]);
    assert!(engine.reorder_children(&idle(), root, &[0]).is_err());
    Ok(())
}

#[test]
fn test_replace_and_prefix() -> anyhow::Result<()> {
    let mut engine = engine(r#"<a xmlns:p="urn:p"><b/></a>"#);
    let root = root(&engine);
    let b = engine.children(root)?[0];

    let z = engine.create_element("z")?;
    engine.replace_child(&idle(), root, b, z)?;
    assert_eq!(engine.text(), r#"<a xmlns:p="urn:p"><z/></a>"#);
    assert!(!engine.is_in_tree(b));

    engine.set_prefix(&idle(), z, Some("p"))?;
    let view = engine.view(z)?;
    let element = view.as_element().unwrap();
    assert_eq!(element.name, "p:z");
    assert_eq!(element.namespace.as_deref(), Some("urn:p"));
    Ok(())
}

#[test]
fn test_remove_children_and_duplicate() -> anyhow::Result<()> {
    let mut engine = engine(r#"<a><b k="1"/><c/><d/></a>"#);
    let root = root(&engine);
    let children = engine.children(root)?;

    let copy = engine.duplicate(children[0])?;
    engine.remove_children(&idle(), root, &children[1..])?;
    engine.append_child(&idle(), root, copy)?;

    assert_eq!(engine.text(), r#"<a><b k="1"/><b k="1"/></a>"#);
    assert_eq!(engine.children(root)?, vec![children[0], copy]);
    Ok(())
}

#[test]
fn test_document_element_cannot_be_removed_by_mutation() {
    let mut engine = engine("<a/>");
    let root = root(&engine);
    let z = engine.create_element("z").unwrap();

    // the document element is not a component child of anything, so go raw
    let document = engine.tree().document();
    let peer = engine.components().peer(root).unwrap();
    let result = engine.apply_with(
        &idle(),
        weft_editor::MutationOp::RemoveChild {
            parent: document,
            child: peer,
        },
        &mut weft_editor::Rebinder,
    );
    assert!(result.is_err());
    assert!(engine.is_in_tree(root));
    assert!(!engine.is_in_tree(z));
}

#[test]
fn test_undo_redo_round_trip() -> anyhow::Result<()> {
    let mut engine = engine("<a><b/></a>");
    let root = root(&engine);
    let b = engine.children(root)?[0];

    engine.set_attribute(&idle(), b, "k", "v")?;
    engine.set_attribute(&idle(), root, "n", "1")?;
    assert_eq!(engine.history().undo_levels(), 2);

    assert!(engine.undo()?);
    assert_eq!(engine.text(), r#"<a><b k="v"/></a>"#);
    assert!(engine.undo()?);
    assert_eq!(engine.text(), "<a><b/></a>");
    assert!(!engine.undo()?);
    assert!(engine.last_report().unwrap().replay);

    assert!(engine.redo()?);
    assert_eq!(engine.text(), r#"<a><b k="v"/></a>"#);
    assert_eq!(engine.root(), Some(root));
    assert_eq!(engine.children(root)?, vec![b]);
    assert!(!engine.is_replaying());
    Ok(())
}

#[test]
fn test_batch_is_one_undo_step() -> anyhow::Result<()> {
    let mut engine = engine("<a/>");
    let root = root(&engine);

    engine.begin_batch("Tag root");
    engine.set_attribute(&idle(), root, "x", "1")?;
    engine.set_attribute(&idle(), root, "y", "2")?;
    engine.end_batch();

    assert_eq!(engine.history().undo_levels(), 1);
    assert_eq!(engine.history().undo_description(), Some("Tag root"));
    engine.undo()?;
    assert_eq!(engine.text(), "<a/>");
    Ok(())
}

#[test]
fn test_external_edit_clears_history() -> anyhow::Result<()> {
    let mut engine = engine("<a/>");
    let root = root(&engine);
    engine.set_attribute(&idle(), root, "x", "1")?;
    assert!(engine.history().can_undo());

    engine.sync(r#"<a x="2"/>"#)?;
    assert!(!engine.history().can_undo());
    Ok(())
}

#[test]
fn test_listeners_see_syncs_and_mutations() -> anyhow::Result<()> {
    let mut engine = engine("<a/>");
    let root = root(&engine);
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    engine.add_reconciliation_listener(move |report| {
        assert!(!report.units.is_empty());
        seen.fetch_add(1, Ordering::SeqCst);
    });

    engine.sync(r#"<a x="1"/>"#)?;
    engine.set_attribute(&idle(), root, "x", "2")?;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // rolled back passes are not reported
    engine.sync("<a>")?;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_mutations_are_suppressed_for_the_whole_pass() -> anyhow::Result<()> {
    let mut engine = engine("<a/>");
    let root = root(&engine);

    engine.start_sync()?;
    assert!(engine.set_attribute(&idle(), root, "x", "1")?.is_suppressed());

    let started = MutationContext {
        pass_in_progress: true,
        events_started: true,
        replaying: false,
    };
    // the engine's own state still says events have not started
    assert!(engine.set_attribute(&started, root, "x", "1")?.is_suppressed());
    assert!(engine.end_sync(false)?.is_none());
    assert_eq!(engine.text(), "<a/>");

    let outcome = engine.set_attribute(&idle(), root, "x", "1")?;
    let unit = outcome.unit().expect("in-tree unit");
    assert_eq!(unit.anchor, root);
    assert!(!unit.is_mergeable());
    assert_eq!(engine.text(), r#"<a x="1"/>"#);
    Ok(())
}

#[test]
fn test_no_op_mutation_is_unchanged() -> anyhow::Result<()> {
    let mut engine = engine("<a k=\"v\"/>");
    let root = root(&engine);
    let peer = engine.components().peer(root)?;

    let outcome = engine.remove_attribute(&idle(), root, "missing")?;
    assert_eq!(outcome, MutationOutcome::Unchanged { changed: peer });
    assert_eq!(outcome.changed(), Some(peer));
    assert!(outcome.unit().is_none());
    assert_eq!(engine.placement(root)?, Placement::InTree);
    assert_eq!(engine.text(), "<a k=\"v\"/>");
    Ok(())
}

#[test]
fn test_unexpected_replacement_root_leaves_document_alone() {
    let mut engine = SyncEngine::new(EngineConfig::default().with_expected_root("project"));
    engine.sync("<project/>").unwrap();
    let root = root(&engine);
    let other = engine.create_element("other").unwrap();

    let document = engine.tree().document();
    let old = engine.components().peer(root).unwrap();
    let new = engine.components().peer(other).unwrap();
    let error = engine
        .apply_with(
            &idle(),
            weft_editor::MutationOp::ReplaceChild { parent: document, old, new },
            &mut weft_editor::Rebinder,
        )
        .unwrap_err();

    assert!(matches!(error, EditorError::UnexpectedRoot { ref found, .. } if found == "other"));
    assert_eq!(engine.text(), "<project/>");
    assert_eq!(engine.root(), Some(root));
    assert!(engine.is_in_tree(root));
    assert!(!engine.is_in_tree(other));
    assert!(!engine.history().can_undo());
}

#[test]
fn test_attached_component_dies_with_its_node() {
    let mut engine = engine("<a><b><c/></b></a>");
    let tree = engine.tree();
    let a = tree.root_element().unwrap();
    let b = tree.children(a)[0];
    let c_node = tree.children(b)[0];
    let c = engine.attach(c_node).unwrap();
    assert_eq!(engine.components().get(c).unwrap().parent(), Some(root(&engine)));

    assert_eq!(engine.sync("<a><b/></a>").unwrap(), SyncResult::Valid);

    assert!(engine.components().get(c).is_none());
    assert_eq!(engine.components().component_for(c_node), None);
    assert!(!engine.tree().contains(c_node));
    assert_eq!(engine.components().len(), 1);
}

#[test]
fn test_shared_engine() {
    let shared = SharedEngine::new(SyncEngine::new(EngineConfig::default()));
    assert_eq!(shared.sync("<a><b/></a>").unwrap(), SyncResult::Valid);

    let parsed = shared.parse_detached("<a><b/><c/></a>").unwrap();
    assert_eq!(shared.sync_parsed(parsed).unwrap(), SyncResult::Valid);
    assert_eq!(shared.read().text(), "<a><b/><c/></a>");
}
