//! In-memory [`DocumentTree`] used by headless hosts and the test suite.
//!
//! Every write goes through one lock and is reported to the observers whose
//! targets contain the changed node, one batch per write.

use std::collections::BTreeMap;

use log::trace;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{DocumentTree, InsertPosition, MutationBatch, MutationRecord, MutationStream, NewElement, NodeId, Selector};
use crate::errors::TreeError;

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    connected: bool,
}

impl Node {
    fn from_element(element: NewElement, parent: Option<NodeId>) -> Self {
        Self {
            tag: element.tag.to_ascii_lowercase(),
            id: element.id,
            classes: element.classes,
            attributes: element.attributes.into_iter().collect(),
            styles: element.styles.into_iter().collect(),
            text: element.text.unwrap_or_default(),
            parent,
            children: Vec::new(),
            connected: true,
        }
    }
}

struct Observer {
    targets: Vec<NodeId>,
    sender: mpsc::UnboundedSender<MutationBatch>,
}

struct TreeState {
    nodes: Vec<Node>,
    location: String,
    title: String,
    observers: Vec<Observer>,
    writes: usize,
}

impl TreeState {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).filter(|node| node.connected)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes
            .get_mut(id)
            .filter(|node| node.connected)
            .ok_or(TreeError::Detached(id))
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn notify(&mut self, record: MutationRecord) {
        self.observers.retain(|observer| !observer.sender.is_closed());
        let target = record.target;
        for observer in &self.observers {
            if observer
                .targets
                .iter()
                .any(|&t| self.is_inclusive_ancestor(t, target))
            {
                let _ = observer.sender.send(vec![record.clone()]);
            }
        }
    }

    fn collect(&self, scope: NodeId, selector: &Selector, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(scope) else {
            return;
        };
        for &child in &node.children {
            if let Some(child_node) = self.node(child) {
                if selector.matches(&child_node.tag, child_node.id.as_deref(), &child_node.classes) {
                    out.push(child);
                }
                self.collect(child, selector, out);
            }
        }
    }

    fn text_of(&self, id: NodeId, out: &mut String) {
        if let Some(node) = self.node(id) {
            out.push_str(&node.text);
            for &child in &node.children {
                self.text_of(child, out);
            }
        }
    }

    fn disconnect(&mut self, id: NodeId) {
        let children = match self.nodes.get_mut(id) {
            Some(node) => {
                node.connected = false;
                node.children.clone()
            }
            None => return,
        };
        for child in children {
            self.disconnect(child);
        }
    }
}

/// Arena-backed document tree
pub struct MemoryTree {
    state: Mutex<TreeState>,
}

impl MemoryTree {
    /// Create a document with an empty `body` root at `location`
    pub fn new(location: impl Into<String>) -> Self {
        let root = Node::from_element(NewElement::new("body"), None);
        Self {
            state: Mutex::new(TreeState {
                nodes: vec![root],
                location: location.into(),
                title: String::new(),
                observers: Vec::new(),
                writes: 0,
            }),
        }
    }

    /// Change the navigation context; does not emit a mutation
    pub fn set_location(&self, location: impl Into<String>) {
        self.state.lock().location = location.into();
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.state.lock().title = title.into();
    }

    /// Append an element the way host code would
    pub fn append(&self, parent: NodeId, element: NewElement) -> Result<NodeId, TreeError> {
        self.insert(parent, element, InsertPosition::Append)
    }

    /// Number of writes performed so far
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    /// Number of live observers
    pub fn observer_count(&self) -> usize {
        let mut state = self.state.lock();
        state.observers.retain(|observer| !observer.sender.is_closed());
        state.observers.len()
    }

    /// Direct children of `node`
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let state = self.state.lock();
        state
            .node(node)
            .map(|n| n.children.iter().copied().filter(|&c| state.node(c).is_some()).collect())
            .unwrap_or_default()
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.state
            .lock()
            .node(node)
            .map(|n| n.classes.clone())
            .unwrap_or_default()
    }
}

impl DocumentTree for MemoryTree {
    fn location(&self) -> String {
        self.state.lock().location.clone()
    }

    fn title(&self) -> String {
        self.state.lock().title.clone()
    }

    fn root(&self) -> NodeId {
        0
    }

    fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let state = self.state.lock();
        let mut out = Vec::new();
        state.collect(scope, selector, &mut out);
        out
    }

    fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.state
            .lock()
            .node(node)
            .is_some_and(|n| selector.matches(&n.tag, n.id.as_deref(), &n.classes))
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.state.lock().node(node).map(|n| n.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.state
            .lock()
            .node(node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: Option<&str>) -> Result<(), TreeError> {
        let mut state = self.state.lock();
        let target = state.node_mut(node)?;
        match value {
            Some(value) => {
                target.attributes.insert(name.to_string(), value.to_string());
            }
            None => {
                target.attributes.remove(name);
            }
        }
        state.writes += 1;
        state.notify(MutationRecord {
            target: node,
            attribute: Some(name.to_string()),
            ..MutationRecord::default()
        });
        Ok(())
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.state
            .lock()
            .node(node)
            .and_then(|n| n.styles.get(property).cloned())
    }

    fn set_style(&self, node: NodeId, property: &str, value: Option<&str>) -> Result<(), TreeError> {
        let mut state = self.state.lock();
        let target = state.node_mut(node)?;
        match value {
            Some(value) => {
                target.styles.insert(property.to_string(), value.to_string());
            }
            None => {
                target.styles.remove(property);
            }
        }
        state.writes += 1;
        state.notify(MutationRecord {
            target: node,
            attribute: Some("style".to_string()),
            ..MutationRecord::default()
        });
        Ok(())
    }

    fn text_content(&self, node: NodeId) -> Option<String> {
        let state = self.state.lock();
        state.node(node)?;
        let mut out = String::new();
        state.text_of(node, &mut out);
        Some(out)
    }

    fn set_text(&self, node: NodeId, text: &str) -> Result<(), TreeError> {
        let mut state = self.state.lock();
        state.node_mut(node)?.text = text.to_string();
        state.writes += 1;
        state.notify(MutationRecord {
            target: node,
            ..MutationRecord::default()
        });
        Ok(())
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.state.lock().node(node).is_some()
    }

    fn insert(&self, parent: NodeId, element: NewElement, position: InsertPosition) -> Result<NodeId, TreeError> {
        let mut state = self.state.lock();
        state.node_mut(parent)?;

        let id = state.nodes.len();
        state.nodes.push(Node::from_element(element, Some(parent)));
        let parent_node = state.node_mut(parent)?;
        match position {
            InsertPosition::Prepend => parent_node.children.insert(0, id),
            InsertPosition::Append => parent_node.children.push(id),
        }

        state.writes += 1;
        trace!("Inserted node {} under {}", id, parent);
        state.notify(MutationRecord {
            target: parent,
            added: vec![id],
            ..MutationRecord::default()
        });
        Ok(id)
    }

    fn remove(&self, node: NodeId) {
        let mut state = self.state.lock();
        if node == 0 || state.node(node).is_none() {
            return;
        }

        let parent = state.nodes[node].parent;
        if let Some(parent) = parent {
            if let Some(parent_node) = state.nodes.get_mut(parent) {
                parent_node.children.retain(|&c| c != node);
            }
        }
        state.disconnect(node);
        state.writes += 1;

        if let Some(parent) = parent {
            state.notify(MutationRecord {
                target: parent,
                removed: vec![node],
                ..MutationRecord::default()
            });
        }
    }

    fn observe(&self, targets: &[NodeId]) -> MutationStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.state.lock().observers.push(Observer {
            targets: targets.to_vec(),
            sender,
        });
        receiver
    }
}
