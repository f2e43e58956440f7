/*!
 * Integration tests for the watch page flow
 */

use anyhow::Result;
use captrack::dom::{DocumentTree, MemoryTree, NewElement, NodeId};
use captrack::errors::FetchError;
use captrack::modes::{HostEvent, ModeState};
use captrack::providers::MockFetcher;
use captrack::subtitle_processor::SubtitleFormat;
use captrack::ui::{messages, DialogAction, TrackPick};

use crate::common::{self, Harness};

/// `body > ytd-app > #above-the-fold`, returning the container
fn watch_layout(tree: &MemoryTree) -> NodeId {
    let app = tree.append(tree.root(), NewElement::new("ytd-app")).unwrap();
    tree.append(app, NewElement::new("div").with_id("above-the-fold"))
        .unwrap()
}

fn fetcher_for_abc123() -> MockFetcher {
    MockFetcher::new()
        .with_page(
            common::watch_url("abc123"),
            common::player_page("abc123", &[("en", "English"), ("fr", "French")]),
        )
        .with_page(
            common::payload_url("abc123", "en"),
            common::timed_text(&[(0.0, 1.5, "Hello"), (1.5, 2.0, "there")]),
        )
        .with_page(
            common::payload_url("abc123", "fr"),
            common::timed_text(&[(0.0, 1.5, "Bonjour")]),
        )
}

/// Test entering a watch page creates exactly one flow and re-entry is a no-op
#[tokio::test]
async fn test_navigation_fromHomeToWatch_shouldInitializeSingleFlowOnce() -> Result<()> {
    let harness = Harness::new(&format!("{}/", common::BASE));
    let mut controller = harness.controller();
    assert!(controller.initialize()?);
    assert_eq!(controller.mode_states(), vec![ModeState::Idle]);
    assert!(controller.single().is_none());

    let container = watch_layout(&harness.tree);
    harness.tree.set_location(common::watch_url("abc123"));
    assert!(controller.handle_host_event(HostEvent::NavigationFinished)?);

    let single = controller.single().expect("single flow should be live");
    assert!(single.is_initialized());
    assert_eq!(single.identity().map(|i| i.item_id.as_str()), Some("abc123"));
    let button = single.button().expect("button should be installed");
    assert_eq!(harness.tree.children(container), vec![button]);
    assert_eq!(
        harness.tree.text_content(button).as_deref(),
        Some(messages::DOWNLOAD_BUTTON)
    );
    let epoch = single.epoch();
    let writes = harness.tree.write_count();

    // navigation signal and mutation signal racing each other
    controller.handle_host_event(HostEvent::NavigationFinished)?;
    assert!(!controller.initialize()?);

    let single = controller.single().unwrap();
    assert_eq!(single.epoch(), epoch);
    assert_eq!(single.button(), Some(button));
    assert_eq!(harness.tree.write_count(), writes);
    assert_eq!(controller.mode_states(), vec![ModeState::SingleActive]);
    Ok(())
}

/// Test leaving the watch page removes the button and the flow
#[tokio::test]
async fn test_navigation_fromWatchToSearch_shouldTearDownSingleFlow() -> Result<()> {
    let harness = Harness::new(&common::watch_url("abc123"));
    let container = watch_layout(&harness.tree);
    let mut controller = harness.controller();
    controller.initialize()?;
    let button = controller.single().and_then(|s| s.button()).unwrap();

    harness
        .tree
        .set_location(format!("{}/results?search_query=rust", common::BASE));
    controller.handle_host_event(HostEvent::NavigationFinished)?;

    assert!(controller.single().is_none());
    assert!(!harness.tree.is_connected(button));
    assert!(harness.tree.children(container).is_empty());
    assert!(controller.bulk().is_some());
    assert_eq!(controller.mode_states(), vec![ModeState::Idle]);
    Ok(())
}

/// Test the full click, review and download sequence
#[tokio::test]
async fn test_click_thenDownload_shouldEmitPickedTracks() -> Result<()> {
    let harness = Harness::with_fetcher(&common::watch_url("abc123"), fetcher_for_abc123());
    harness.tree.set_title("My/Video:Test?");
    watch_layout(&harness.tree);
    let mut controller = harness.controller();
    controller.initialize()?;
    let button = controller.single().and_then(|s| s.button()).unwrap();

    assert!(controller.handle_host_event(HostEvent::Clicked(button))?);
    assert_eq!(harness.ui.active_loadings(), vec![messages::LOADING.to_string()]);
    assert!(controller.process_flow_event().await);
    assert!(harness.ui.active_loadings().is_empty());

    let (dialog, review) = harness.ui.last_dialog().expect("review dialog should open");
    assert_eq!(review.heading, messages::HAVE_SUBTITLE);
    assert_eq!(review.sections.len(), 1);
    assert_eq!(review.sections[0].title, "My/Video:Test?");
    assert_eq!(review.sections[0].tracks.len(), 2);
    assert_eq!(controller.single().and_then(|s| s.tracks()).map(|t| t.len()), Some(2));

    let picks = vec![TrackPick::new("abc123", "en"), TrackPick::new("abc123", "fr")];
    controller.handle_host_event(HostEvent::Dialog {
        dialog,
        action: DialogAction::Download {
            picks,
            format: SubtitleFormat::Srt,
        },
    })?;
    assert_eq!(harness.ui.active_loadings(), vec![messages::DOWNLOADING.to_string()]);
    controller.process_flow_event().await;

    let files = harness.sink.files();
    let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["My_Video_Test__en.srt", "My_Video_Test__fr.srt"]);
    assert_eq!(
        files[0].1,
        "\u{feff}1\n00:00:00,000 --> 00:00:01,500\nHello\n\n2\n00:00:01,500 --> 00:00:03,500\nthere\n\n"
    );
    assert!(harness.ui.toasts().is_empty());
    assert!(harness.ui.active_loadings().is_empty());

    controller.handle_host_event(HostEvent::Dialog {
        dialog,
        action: DialogAction::Close,
    })?;
    assert!(harness.ui.open_dialogs().is_empty());
    assert!(controller.single().and_then(|s| s.tracks()).is_none());
    Ok(())
}

/// Test copying uses language headers and confirms with a toast
#[tokio::test]
async fn test_copy_withTwoTracks_shouldWriteHeadedPayload() -> Result<()> {
    let harness = Harness::with_fetcher(&common::watch_url("abc123"), fetcher_for_abc123());
    watch_layout(&harness.tree);
    let mut controller = harness.controller();
    controller.initialize()?;
    let button = controller.single().and_then(|s| s.button()).unwrap();
    controller.handle_host_event(HostEvent::Clicked(button))?;
    controller.process_flow_event().await;
    let (dialog, _) = harness.ui.last_dialog().unwrap();

    controller.handle_host_event(HostEvent::Dialog {
        dialog,
        action: DialogAction::Copy {
            picks: vec![TrackPick::new("abc123", "fr"), TrackPick::new("abc123", "en")],
            format: SubtitleFormat::Txt,
        },
    })?;
    controller.process_flow_event().await;

    assert_eq!(
        harness.sink.clipboard().as_deref(),
        Some("=== French ===\nBonjour\n\n=== English ===\nHello\nthere\n\n")
    );
    assert_eq!(harness.ui.toasts(), vec![messages::COPY_SUCCESS.to_string()]);
    Ok(())
}

/// Test a refused clipboard shows the copy error
#[tokio::test]
async fn test_copy_withDeniedClipboard_shouldShowCopyError() -> Result<()> {
    let harness = Harness::with_fetcher(&common::watch_url("abc123"), fetcher_for_abc123());
    harness.sink.deny_clipboard();
    watch_layout(&harness.tree);
    let mut controller = harness.controller();
    controller.initialize()?;
    let button = controller.single().and_then(|s| s.button()).unwrap();
    controller.handle_host_event(HostEvent::Clicked(button))?;
    controller.process_flow_event().await;
    let (dialog, _) = harness.ui.last_dialog().unwrap();

    controller.handle_host_event(HostEvent::Dialog {
        dialog,
        action: DialogAction::Copy {
            picks: vec![TrackPick::new("abc123", "en")],
            format: SubtitleFormat::Srt,
        },
    })?;
    controller.process_flow_event().await;

    assert_eq!(harness.ui.toasts(), vec![messages::ERROR_COPY.to_string()]);
    Ok(())
}

/// Test a copy whose payload cannot be fetched reports a copy error
#[tokio::test]
async fn test_copy_withMissingPayload_shouldShowCopyError() -> Result<()> {
    let fetcher = MockFetcher::new().with_page(
        common::watch_url("abc123"),
        common::player_page("abc123", &[("en", "English")]),
    );
    let harness = Harness::with_fetcher(&common::watch_url("abc123"), fetcher);
    watch_layout(&harness.tree);
    let mut controller = harness.controller();
    controller.initialize()?;
    let button = controller.single().and_then(|s| s.button()).unwrap();
    controller.handle_host_event(HostEvent::Clicked(button))?;
    controller.process_flow_event().await;
    let (dialog, _) = harness.ui.last_dialog().unwrap();

    controller.handle_host_event(HostEvent::Dialog {
        dialog,
        action: DialogAction::Copy {
            picks: vec![TrackPick::new("abc123", "en")],
            format: SubtitleFormat::Srt,
        },
    })?;
    controller.process_flow_event().await;

    assert_eq!(harness.ui.toasts(), vec![messages::ERROR_COPY.to_string()]);
    assert!(harness.sink.clipboard().is_none());
    Ok(())
}

/// Test an empty pick list asks for a selection instead of exporting
#[tokio::test]
async fn test_download_withoutPicks_shouldAskForSubtitle() -> Result<()> {
    let harness = Harness::with_fetcher(&common::watch_url("abc123"), fetcher_for_abc123());
    watch_layout(&harness.tree);
    let mut controller = harness.controller();
    controller.initialize()?;
    let button = controller.single().and_then(|s| s.button()).unwrap();
    controller.handle_host_event(HostEvent::Clicked(button))?;
    controller.process_flow_event().await;
    let (dialog, _) = harness.ui.last_dialog().unwrap();

    controller.handle_host_event(HostEvent::Dialog {
        dialog,
        action: DialogAction::Download {
            picks: Vec::new(),
            format: SubtitleFormat::Srt,
        },
    })?;

    assert_eq!(harness.ui.toasts(), vec![messages::SELECT_SUBTITLE.to_string()]);
    assert!(harness.ui.active_loadings().is_empty());
    assert!(harness.sink.files().is_empty());
    Ok(())
}

/// Test an item without tracks shows a notice and no dialog
#[tokio::test]
async fn test_click_withoutTracks_shouldShowNoSubtitleToast() -> Result<()> {
    let fetcher = MockFetcher::new().with_page(
        common::watch_url("bare"),
        common::page_without_captions("bare"),
    );
    let harness = Harness::with_fetcher(&common::watch_url("bare"), fetcher);
    watch_layout(&harness.tree);
    let mut controller = harness.controller();
    controller.initialize()?;
    let button = controller.single().and_then(|s| s.button()).unwrap();

    controller.handle_host_event(HostEvent::Clicked(button))?;
    controller.process_flow_event().await;

    assert_eq!(harness.ui.toasts(), vec![messages::NO_SUBTITLE.to_string()]);
    assert_eq!(harness.ui.dialog_count(), 0);
    Ok(())
}

/// Test a failing page request shows the fetch error
#[tokio::test]
async fn test_click_withFailingFetch_shouldShowFetchError() -> Result<()> {
    let fetcher = MockFetcher::new().with_failure(
        common::watch_url("abc123"),
        FetchError::Status {
            locator: common::watch_url("abc123"),
            status_code: 503,
        },
    );
    let harness = Harness::with_fetcher(&common::watch_url("abc123"), fetcher);
    watch_layout(&harness.tree);
    let mut controller = harness.controller();
    controller.initialize()?;
    let button = controller.single().and_then(|s| s.button()).unwrap();

    controller.handle_host_event(HostEvent::Clicked(button))?;
    controller.process_flow_event().await;

    assert_eq!(harness.ui.toasts(), vec![messages::ERROR_FETCH.to_string()]);
    assert!(harness.ui.active_loadings().is_empty());
    Ok(())
}

/// Test a result arriving after the item changed is dropped
#[tokio::test]
async fn test_discovery_afterItemChange_shouldBeDiscarded() -> Result<()> {
    let harness = Harness::with_fetcher(&common::watch_url("abc123"), fetcher_for_abc123());
    let container = watch_layout(&harness.tree);
    let mut controller = harness.controller();
    controller.initialize()?;
    let first_button = controller.single().and_then(|s| s.button()).unwrap();
    let first_epoch = controller.single().unwrap().epoch();

    controller.handle_host_event(HostEvent::Clicked(first_button))?;
    harness.tree.set_location(common::watch_url("xyz789"));
    controller.handle_host_event(HostEvent::NavigationFinished)?;

    let single = controller.single().unwrap();
    assert_ne!(single.epoch(), first_epoch);
    assert_eq!(single.identity().map(|i| i.item_id.as_str()), Some("xyz789"));
    let second_button = single.button().unwrap();
    assert_ne!(second_button, first_button);
    assert_eq!(harness.tree.children(container), vec![second_button]);

    controller.process_flow_event().await;
    assert_eq!(harness.ui.dialog_count(), 0);
    assert!(harness.ui.toasts().is_empty());
    assert!(harness.ui.active_loadings().is_empty());
    Ok(())
}

/// Test the button is installed once a late container appears, and
/// reinstalled when the page drops it
#[tokio::test]
async fn test_button_withLateContainer_shouldInstallOnNextChange() -> Result<()> {
    let harness = Harness::new(&common::watch_url("abc123"));
    let mut controller = harness.controller();
    controller.initialize()?;
    assert!(controller.single().and_then(|s| s.button()).is_none());

    let container = watch_layout(&harness.tree);
    controller.handle_page_change()?;
    let button = controller.single().and_then(|s| s.button()).unwrap();
    assert_eq!(harness.tree.children(container), vec![button]);

    harness.tree.remove(button);
    controller.handle_page_change()?;
    let reinstalled = controller.single().and_then(|s| s.button()).unwrap();
    assert_ne!(reinstalled, button);
    assert_eq!(harness.tree.children(container), vec![reinstalled]);
    Ok(())
}
