/*!
 * Tests for checkbox reconciliation and the selection model
 */

use std::sync::Arc;
use std::time::Duration;

use captrack::app_config::Config;
use captrack::dom::{DocumentTree, MemoryTree, NewElement, Selector};
use captrack::reconciler::{ObserveScope, Reconciler, ReconcilerSelectors, CHECKBOX_CLASS, UNTITLED};
use captrack::selection::SelectionModel;

use crate::common;

const LISTING: &str = "https://www.youtube.com/results?search_query=rust";

fn reconciler(tree: &Arc<MemoryTree>, debounce: Duration) -> Reconciler {
    let config = Config::default();
    Reconciler::new(
        tree.clone(),
        ReconcilerSelectors::from_config(&config.selectors).unwrap(),
        config.base_url().unwrap(),
        "v",
        debounce,
    )
}

fn marker() -> Selector {
    Selector::parse(&format!(".{}", CHECKBOX_CLASS)).unwrap()
}

/// Test that a second pass without tree changes writes nothing
#[test]
fn test_run_pass_twice_withoutChanges_shouldBeIdempotent() {
    let tree = Arc::new(MemoryTree::new(LISTING));
    let content = tree.append(0, NewElement::new("div").with_id("content")).unwrap();
    for (id, title) in [("a1", "First"), ("b2", "Second"), ("c3", "Third")] {
        common::add_item(&tree, content, "ytd-video-renderer", id, title);
    }

    let mut reconciler = reconciler(&tree, Duration::from_millis(500));
    let mut selection = SelectionModel::new();
    let first = reconciler.activate(&selection);
    assert_eq!(first.injected, 3);
    for control in reconciler.controls() {
        reconciler.toggle(control, true, &mut selection);
    }

    let writes = tree.write_count();
    let second = reconciler.run_pass(&selection);
    assert_eq!(second.injected, 0);
    assert_eq!(tree.write_count(), writes);
    assert_eq!(reconciler.control_count(), 3);
    assert_eq!(tree.query_selector_all(tree.root(), &marker()).len(), 3);
    assert_eq!(selection.size(), 3);
}

/// Test toggling a checkbox on and then off
#[test]
fn test_toggle_onThenOff_shouldRestoreSelection() {
    let tree = Arc::new(MemoryTree::new(LISTING));
    let content = tree.append(0, NewElement::new("div").with_id("content")).unwrap();
    common::add_item(&tree, content, "ytd-video-renderer", "keep", "Keep me");
    common::add_item(&tree, content, "ytd-video-renderer", "flip", "  Flip me  ");

    let mut reconciler = reconciler(&tree, Duration::from_millis(500));
    reconciler.activate(&SelectionModel::new());
    let controls = reconciler.controls();
    let mut selection = SelectionModel::new();
    reconciler.toggle(controls[0], true, &mut selection);
    let before = selection.size();

    let id = reconciler.toggle(controls[1], true, &mut selection);
    assert_eq!(id.as_deref(), Some("flip"));
    assert_eq!(selection.get("flip").map(|r| r.title.as_str()), Some("Flip me"));

    reconciler.toggle(controls[1], false, &mut selection);
    assert_eq!(selection.size(), before);
    assert!(!selection.contains("flip"));
    assert!(selection.contains("keep"));
}

/// Test that the title is read when toggling, with a placeholder fallback
#[test]
fn test_toggle_withoutTitle_shouldUsePlaceholder() {
    let tree = Arc::new(MemoryTree::new(LISTING));
    let content = tree.append(0, NewElement::new("div").with_id("content")).unwrap();
    let element = tree.append(content, NewElement::new("ytd-video-renderer")).unwrap();
    tree.append(
        element,
        NewElement::new("a").with_id("thumbnail").with_attribute("href", "/watch?v=zz9"),
    )
    .unwrap();

    let mut reconciler = reconciler(&tree, Duration::from_millis(500));
    reconciler.activate(&SelectionModel::new());
    let mut selection = SelectionModel::new();
    let control = reconciler.controls()[0];
    reconciler.toggle(control, true, &mut selection);
    assert_eq!(selection.get("zz9").map(|r| r.title.as_str()), Some(UNTITLED));
}

/// Test select all and its reversal
#[test]
fn test_select_all_shouldCheckEveryControl() {
    let tree = Arc::new(MemoryTree::new(LISTING));
    let content = tree.append(0, NewElement::new("div").with_id("content")).unwrap();
    for id in ["a", "b", "c"] {
        common::add_item(&tree, content, "ytd-compact-video-renderer", id, id);
    }

    let mut reconciler = reconciler(&tree, Duration::from_millis(500));
    reconciler.activate(&SelectionModel::new());
    let mut selection = SelectionModel::new();

    assert_eq!(reconciler.select_all(true, &mut selection), 3);
    assert_eq!(selection.size(), 3);
    for control in reconciler.controls() {
        assert_eq!(tree.attribute(control, "checked").as_deref(), Some(""));
    }

    assert_eq!(reconciler.select_all(false, &mut selection), 3);
    assert!(selection.is_empty());
    assert!(tree.attribute(reconciler.controls()[0], "checked").is_none());
}

/// Test that items rendered later get a checkbox once the burst settles
#[tokio::test(start_paused = true)]
async fn test_wait_for_pass_withLateItems_shouldInjectAfterQuietWindow() {
    let tree = Arc::new(MemoryTree::new(LISTING));
    let content = tree.append(0, NewElement::new("div").with_id("content")).unwrap();
    common::add_item(&tree, content, "ytd-video-renderer", "a1", "First");

    let mut reconciler = reconciler(&tree, Duration::from_millis(100));
    reconciler.activate(&SelectionModel::new());
    assert_eq!(reconciler.scope(), &ObserveScope::Targets(vec![content]));

    common::add_item(&tree, content, "ytd-video-renderer", "b2", "Second");
    common::add_item(&tree, content, "ytd-video-renderer", "c3", "Third");

    let report = tokio::time::timeout(Duration::from_secs(1), reconciler.wait_for_pass(&SelectionModel::new()))
        .await
        .expect("pass should run once the burst is quiet");
    assert_eq!(report.injected, 2);
    assert_eq!(reconciler.control_count(), 3);
}

/// Test that checkboxes whose item was removed by the host are forgotten
#[test]
fn test_run_pass_withRemovedItem_shouldPruneControl() {
    let tree = Arc::new(MemoryTree::new(LISTING));
    let content = tree.append(0, NewElement::new("div").with_id("content")).unwrap();
    let gone = common::add_item(&tree, content, "ytd-video-renderer", "a1", "First");
    common::add_item(&tree, content, "ytd-video-renderer", "b2", "Second");

    let mut reconciler = reconciler(&tree, Duration::from_millis(500));
    reconciler.activate(&SelectionModel::new());
    tree.remove(gone);

    let report = reconciler.run_pass(&SelectionModel::new());
    assert_eq!(report.pruned, 1);
    assert_eq!(reconciler.control_count(), 1);
}

/// Test that a checkbox re-created after a host re-render keeps its item checked
#[test]
fn test_run_pass_withReinjectedCheckbox_shouldRestoreCheckedState() {
    let tree = Arc::new(MemoryTree::new(LISTING));
    let content = tree.append(0, NewElement::new("div").with_id("content")).unwrap();
    common::add_item(&tree, content, "ytd-video-renderer", "a1", "First");
    common::add_item(&tree, content, "ytd-video-renderer", "b2", "Second");

    let mut reconciler = reconciler(&tree, Duration::from_millis(500));
    let mut selection = SelectionModel::new();
    reconciler.activate(&selection);
    let first = reconciler.controls()[0];
    assert_eq!(reconciler.toggle(first, true, &mut selection).as_deref(), Some("a1"));

    tree.remove(first);
    let report = reconciler.run_pass(&selection);
    assert_eq!(report.injected, 1);
    assert_eq!(reconciler.control_count(), 2);

    let checked: Vec<_> = reconciler
        .controls()
        .into_iter()
        .filter(|&control| tree.attribute(control, "checked").is_some())
        .collect();
    assert_eq!(checked.len(), 1);
    assert_ne!(checked[0], first);
    assert!(selection.contains("a1"));
    assert!(!selection.contains("b2"));
}

/// Test that deactivation removes every injected checkbox
#[test]
fn test_deactivate_shouldRemoveCheckboxesAndObserver() {
    let tree = Arc::new(MemoryTree::new(LISTING));
    let content = tree.append(0, NewElement::new("div").with_id("content")).unwrap();
    common::add_item(&tree, content, "ytd-video-renderer", "a1", "First");

    let mut reconciler = reconciler(&tree, Duration::from_millis(500));
    reconciler.activate(&SelectionModel::new());
    assert_eq!(tree.observer_count(), 1);

    reconciler.deactivate();
    assert!(tree.query_selector_all(tree.root(), &marker()).is_empty());
    assert_eq!(tree.observer_count(), 0);
    assert_eq!(reconciler.scope(), &ObserveScope::Detached);
}
