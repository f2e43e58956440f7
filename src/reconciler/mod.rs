/*!
 * Selection reconciler.
 *
 * Keeps one selection checkbox on every item element of the live tree and
 * keeps the selection model in step with those checkboxes, while code
 * outside the crate keeps rewriting the tree.
 *
 * A pass scans the tree and decorates only elements that do not carry a
 * checkbox yet, so running it again without a tree change writes nothing.
 * Passes run once on activation and then after each burst of changes that
 * inserted item elements has gone quiet.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use url::Url;

use crate::app_config::SelectorConfig;
use crate::dom::{batch_adds_match, query_param, DocumentTree, InsertPosition, NewElement, NodeId, Selector};
use crate::errors::SelectorError;
use crate::selection::{ItemRecord, SelectionModel};

pub mod watcher;

pub use watcher::{ChangeWatcher, Debouncer};

/// Class marking an injected selection checkbox
pub const CHECKBOX_CLASS: &str = "yt-sub-checkbox";

/// Title recorded when an item has no readable title
pub const UNTITLED: &str = "Untitled Video";

/// Parsed element patterns used by a reconciler
#[derive(Debug, Clone)]
pub struct ReconcilerSelectors {
    pub item_elements: Selector,
    pub item_scan: Selector,
    pub compact_item: Selector,
    pub checkbox_host: Selector,
    pub thumbnail: Selector,
    pub title: Selector,
    pub observe_targets: Vec<Selector>,
    pub marker: Selector,
}

impl ReconcilerSelectors {
    pub fn from_config(config: &SelectorConfig) -> Result<Self, SelectorError> {
        Ok(Self {
            item_elements: Selector::parse(&config.item_elements)?,
            item_scan: Selector::parse(&config.item_scan)?,
            compact_item: Selector::parse(&config.compact_item)?,
            checkbox_host: Selector::parse(&config.checkbox_host)?,
            thumbnail: Selector::parse(&config.thumbnail)?,
            title: Selector::parse(&config.title)?,
            observe_targets: config
                .observe_targets
                .iter()
                .map(|pattern| Selector::parse(pattern))
                .collect::<Result<Vec<_>, _>>()?,
            marker: Selector::parse(&format!(".{}", CHECKBOX_CLASS))?,
        })
    }
}

/// What the reconciler is subscribed to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ObserveScope {
    /// Not observing
    #[default]
    Detached,
    /// None of the designated containers exist yet; the whole document is
    /// observed until they appear
    Fallback,
    /// Observing the designated containers
    Targets(Vec<NodeId>),
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Checkboxes inserted
    pub injected: usize,
    /// Elements that already carried a checkbox
    pub already_marked: usize,
    /// Elements without a readable item id
    pub missing_id: usize,
    /// Tracked checkboxes found detached from the tree
    pub pruned: usize,
}

#[derive(Debug, Clone)]
struct InjectedControl {
    item: NodeId,
    host: NodeId,
    /// Inline position of the host before injection, when we changed it
    previous_position: Option<Option<String>>,
}

/// Keeps item checkboxes and the selection model in step with the tree
pub struct Reconciler {
    tree: Arc<dyn DocumentTree>,
    selectors: ReconcilerSelectors,
    base_url: Url,
    item_param: String,
    watcher: ChangeWatcher,
    scope: ObserveScope,
    controls: HashMap<NodeId, InjectedControl>,
    active: bool,
}

impl Reconciler {
    pub fn new(
        tree: Arc<dyn DocumentTree>,
        selectors: ReconcilerSelectors,
        base_url: Url,
        item_param: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        Self {
            tree,
            selectors,
            base_url,
            item_param: item_param.into(),
            watcher: ChangeWatcher::new(debounce),
            scope: ObserveScope::Detached,
            controls: HashMap::new(),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn scope(&self) -> &ObserveScope {
        &self.scope
    }

    pub fn control_count(&self) -> usize {
        self.controls.len()
    }

    /// Injected checkboxes, in creation order
    pub fn controls(&self) -> Vec<NodeId> {
        let mut controls: Vec<NodeId> = self.controls.keys().copied().collect();
        controls.sort_unstable();
        controls
    }

    /// Whether `control` is a checkbox injected by this reconciler
    pub fn owns(&self, control: NodeId) -> bool {
        self.controls.contains_key(&control)
    }

    /// Start observing and run the first pass right away
    pub fn activate(&mut self, selection: &SelectionModel) -> PassReport {
        if !self.active {
            debug!("Activating reconciler");
            self.active = true;
        }
        self.run_pass(selection)
    }

    /// One idempotent synchronization of checkboxes against the tree
    ///
    /// A checkbox injected for an item that is already in `selection` starts
    /// checked, so a host re-render never hides a selected item.
    pub fn run_pass(&mut self, selection: &SelectionModel) -> PassReport {
        let mut report = PassReport::default();
        if !self.active {
            return report;
        }

        self.ensure_observing();

        let tree = Arc::clone(&self.tree);
        let before = self.controls.len();
        self.controls.retain(|&control, _| tree.is_connected(control));
        report.pruned = before - self.controls.len();

        for element in tree.query_selector_all(tree.root(), &self.selectors.item_scan) {
            if tree.query_selector(element, &self.selectors.marker).is_some() {
                report.already_marked += 1;
                continue;
            }
            let Some(id) = self.item_id(element) else {
                report.missing_id += 1;
                continue;
            };
            match self.inject(element, selection.contains(&id)) {
                Ok(()) => report.injected += 1,
                Err(e) => warn!("Failed to add checkbox to element {}: {}", element, e),
            }
        }

        if report.injected > 0 || report.pruned > 0 {
            debug!(
                "Reconciliation pass: {} injected, {} pruned, {} tracked",
                report.injected,
                report.pruned,
                self.controls.len()
            );
        }
        report
    }

    /// Wait for a quiet burst that inserted item elements, then run a pass
    ///
    /// Pends forever while inactive.
    pub async fn wait_for_pass(&mut self, selection: &SelectionModel) -> PassReport {
        let tree = &self.tree;
        let item_elements = &self.selectors.item_elements;
        self.watcher
            .quiesced(|batch| batch_adds_match(tree.as_ref(), batch, item_elements))
            .await;
        self.run_pass(selection)
    }

    /// Apply a checkbox change to the selection
    ///
    /// Id and title are read from the item element now, not at injection.
    /// Returns the affected id, or `None` for unknown controls and items
    /// without a readable id.
    pub fn toggle(&self, control: NodeId, checked: bool, selection: &mut SelectionModel) -> Option<String> {
        let item = self.controls.get(&control)?.item;
        let id = self.item_id(item)?;
        if checked {
            let title = self.item_title(item);
            selection.set(id.clone(), ItemRecord::new(id.clone(), title));
        } else {
            selection.delete(&id);
        }
        debug!("Item {} {}; {} selected", id, if checked { "selected" } else { "deselected" }, selection.size());
        Some(id)
    }

    /// Check or uncheck every tracked checkbox and update the selection
    ///
    /// Returns the number of checkboxes changed.
    pub fn select_all(&self, checked: bool, selection: &mut SelectionModel) -> usize {
        let mut changed = 0;
        for control in self.controls() {
            if !self.tree.is_connected(control) {
                continue;
            }
            let value = if checked { Some("") } else { None };
            if let Err(e) = self.tree.set_attribute(control, "checked", value) {
                warn!("Failed to update checkbox {}: {}", control, e);
                continue;
            }
            if self.toggle(control, checked, selection).is_some() {
                changed += 1;
            }
        }
        changed
    }

    /// Remove every injected checkbox, restore host styles and stop observing
    pub fn deactivate(&mut self) {
        if !self.active && self.controls.is_empty() && self.scope == ObserveScope::Detached {
            return;
        }

        debug!("Deactivating reconciler, removing {} checkbox(es)", self.controls.len());
        self.watcher.detach();
        self.scope = ObserveScope::Detached;
        for (control, injected) in self.controls.drain() {
            self.tree.remove(control);
            if let Some(previous) = injected.previous_position {
                if let Err(e) = self.tree.set_style(injected.host, "position", previous.as_deref()) {
                    debug!("Checkbox host {} already gone: {}", injected.host, e);
                }
            }
        }
        self.active = false;
    }

    /// Subscribe to the designated containers present now, falling back to
    /// the whole document while none of them exist
    ///
    /// Containers are re-queried on every pass; the subscription is replaced
    /// whenever the set of present containers changes.
    fn ensure_observing(&mut self) {
        let root = self.tree.root();
        let targets: Vec<NodeId> = self
            .selectors
            .observe_targets
            .iter()
            .filter_map(|selector| self.tree.query_selector(root, selector))
            .collect();

        if targets.is_empty() {
            if self.scope != ObserveScope::Fallback || !self.watcher.is_attached() {
                debug!("No observe targets present yet, observing the document");
                self.watcher.attach(self.tree.observe(&[root]));
                self.scope = ObserveScope::Fallback;
            }
            return;
        }

        if self.watcher.is_attached() && self.scope == ObserveScope::Targets(targets.clone()) {
            return;
        }

        debug!("Observing {} container(s)", targets.len());
        self.watcher.attach(self.tree.observe(&targets));
        self.scope = ObserveScope::Targets(targets);
    }

    fn inject(&mut self, element: NodeId, checked: bool) -> Result<(), crate::errors::TreeError> {
        let host = self
            .tree
            .query_selector(element, &self.selectors.checkbox_host)
            .unwrap_or(element);
        let compact = self.tree.matches(element, &self.selectors.compact_item);

        let control = self
            .tree
            .insert(host, checkbox(compact), InsertPosition::Prepend)?;
        if checked {
            self.tree.set_attribute(control, "checked", Some(""))?;
        }

        let position = self.tree.style(host, "position");
        let previous_position = if position.as_deref() != Some("relative") {
            self.tree.set_style(host, "position", Some("relative"))?;
            Some(position)
        } else {
            None
        };

        self.controls.insert(
            control,
            InjectedControl {
                item: element,
                host,
                previous_position,
            },
        );
        Ok(())
    }

    fn item_id(&self, element: NodeId) -> Option<String> {
        let link = self.tree.query_selector(element, &self.selectors.thumbnail)?;
        let href = self.tree.attribute(link, "href")?;
        query_param(&self.base_url, &href, &self.item_param)
    }

    fn item_title(&self, element: NodeId) -> String {
        self.tree
            .query_selector(element, &self.selectors.title)
            .and_then(|node| self.tree.text_content(node))
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string())
    }
}

/// Selection checkbox overlaid left of its item without affecting layout
fn checkbox(compact: bool) -> NewElement {
    NewElement::new("input")
        .with_class(CHECKBOX_CLASS)
        .with_attribute("type", "checkbox")
        .with_style("position", "absolute")
        .with_style("left", "-25px")
        .with_style("top", if compact { "5px" } else { "20px" })
        .with_style("z-index", "9999")
        .with_style("cursor", "pointer")
        .with_style("width", "20px")
        .with_style("height", "20px")
}
