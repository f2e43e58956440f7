/*!
 * Integration tests for the controller event loop
 */

use std::time::Duration;

use anyhow::Result;
use captrack::dom::{DocumentTree, NewElement, NodeId, Selector};
use captrack::modes::HostEvent;
use captrack::providers::MockFetcher;
use captrack::reconciler::CHECKBOX_CLASS;
use captrack::ui::{messages, DialogAction, BUTTON_CLASS};
use tokio::sync::mpsc;

use crate::common::{self, Harness};

fn find_all(harness: &Harness, pattern: &str) -> Vec<NodeId> {
    let selector = Selector::parse(pattern).unwrap();
    harness.tree.query_selector_all(harness.tree.root(), &selector)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

/// Test that a client-side navigation noticed through tree changes alone
/// brings up the watch page button, and uninstall removes everything
#[tokio::test(start_paused = true)]
async fn test_run_withMutationOnlyNavigation_shouldInstallButton() -> Result<()> {
    common::init_logging();
    let harness = Harness::new(&format!("{}/", common::BASE));
    let controller = harness.controller();
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(controller.run(host_rx));
    settle().await;

    // dormant bulk toggle only
    assert_eq!(find_all(&harness, &format!(".{}", BUTTON_CLASS)).len(), 1);

    harness.tree.set_location(common::watch_url("abc123"));
    let app = harness
        .tree
        .append(harness.tree.root(), NewElement::new("ytd-app"))
        .unwrap();
    let container = harness
        .tree
        .append(app, NewElement::new("div").with_id("above-the-fold"))
        .unwrap();
    settle().await;

    let installed = harness.tree.children(container);
    assert_eq!(installed.len(), 1);
    assert_eq!(
        harness.tree.text_content(installed[0]).as_deref(),
        Some(messages::DOWNLOAD_BUTTON)
    );

    host_tx.send(HostEvent::Uninstall)?;
    handle.await??;
    assert!(find_all(&harness, &format!(".{}", BUTTON_CLASS)).is_empty());
    assert_eq!(harness.tree.observer_count(), 0);
    Ok(())
}

/// Test the bulk flow end to end through the event loop, including items
/// the host renders after selection started
#[tokio::test(start_paused = true)]
async fn test_run_withBulkSelection_shouldDecorateLateItemsAndReview() -> Result<()> {
    common::init_logging();
    let fetcher = MockFetcher::new()
        .with_page(common::watch_url("a1"), common::player_page("a1", &[("en", "English")]))
        .with_page(common::watch_url("d4"), common::player_page("d4", &[("ja", "Japanese")]));
    let harness = Harness::with_fetcher(
        &format!("{}/results?search_query=rust", common::BASE),
        fetcher,
    );
    let content = harness
        .tree
        .append(harness.tree.root(), NewElement::new("div").with_id("content"))
        .unwrap();
    common::add_item(&harness.tree, content, "ytd-video-renderer", "a1", "Alpha");

    let controller = harness.controller();
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(controller.run(host_rx));
    settle().await;

    let toggle = find_all(&harness, ".yt-sub-bulk-btn")[0];
    host_tx.send(HostEvent::Clicked(toggle))?;
    settle().await;
    assert_eq!(find_all(&harness, &format!(".{}", CHECKBOX_CLASS)).len(), 1);

    common::add_item(&harness.tree, content, "ytd-compact-video-renderer", "d4", "Delta");
    settle().await;
    let boxes = find_all(&harness, &format!(".{}", CHECKBOX_CLASS));
    assert_eq!(boxes.len(), 2);

    for control in boxes {
        host_tx.send(HostEvent::Toggled {
            control,
            checked: true,
        })?;
    }
    host_tx.send(HostEvent::Clicked(toggle))?;
    settle().await;

    let (dialog, review) = harness.ui.last_dialog().expect("review dialog should open");
    assert_eq!(review.pickable_sections(), 2);
    assert!(harness.ui.active_loadings().is_empty());

    host_tx.send(HostEvent::Dialog {
        dialog,
        action: DialogAction::Close,
    })?;
    settle().await;
    assert!(find_all(&harness, &format!(".{}", CHECKBOX_CLASS)).is_empty());

    // dropping the host side stops the loop
    drop(host_tx);
    handle.await??;
    Ok(())
}
