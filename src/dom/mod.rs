/*!
 * Document tree seam.
 *
 * The catalog page is owned and rewritten by code outside this crate. The
 * engine only sees it through [`DocumentTree`]: structural queries, a small
 * set of writes for the controls it injects, and a batched change
 * subscription delivered over a channel.
 */

use tokio::sync::mpsc;

use crate::errors::TreeError;

pub mod memory;
pub mod selector;

pub use memory::MemoryTree;
pub use selector::Selector;

/// Opaque handle of a node in the host tree
pub type NodeId = usize;

/// One structural change reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationRecord {
    /// Node whose children or attributes changed
    pub target: NodeId,
    /// Nodes inserted under `target`
    pub added: Vec<NodeId>,
    /// Nodes removed from `target`
    pub removed: Vec<NodeId>,
    /// Attribute name for attribute changes
    pub attribute: Option<String>,
}

/// Changes delivered together in one notification
pub type MutationBatch = Vec<MutationRecord>;

/// Receiving end of an observation; dropping it disconnects the observer
pub type MutationStream = mpsc::UnboundedReceiver<MutationBatch>;

/// Where an inserted element lands among its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Prepend,
    Append,
}

/// Description of an element to create
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewElement {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub styles: Vec<(String, String)>,
    pub text: Option<String>,
}

impl NewElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.push((property.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Read and write access to the live host document
///
/// Implementations must be cheap to query repeatedly; the reconciler scans
/// on every pass. Queries on detached nodes return empty results rather than
/// errors.
pub trait DocumentTree: Send + Sync {
    /// Full location of the current navigation context
    fn location(&self) -> String;

    /// Document title
    fn title(&self) -> String;

    /// Root element of the document
    fn root(&self) -> NodeId;

    /// Connected descendants of `scope` matching `selector`, in document order
    fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId>;

    /// First connected descendant of `scope` matching `selector`
    fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.query_selector_all(scope, selector).into_iter().next()
    }

    /// Whether `node` itself matches `selector`
    fn matches(&self, node: NodeId, selector: &Selector) -> bool;

    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Set (`Some`) or remove (`None`) an attribute
    fn set_attribute(&self, node: NodeId, name: &str, value: Option<&str>) -> Result<(), TreeError>;

    fn style(&self, node: NodeId, property: &str) -> Option<String>;

    /// Set (`Some`) or clear (`None`) an inline style property
    fn set_style(&self, node: NodeId, property: &str, value: Option<&str>) -> Result<(), TreeError>;

    /// Concatenated text of the node and its descendants
    fn text_content(&self, node: NodeId) -> Option<String>;

    fn set_text(&self, node: NodeId, text: &str) -> Result<(), TreeError>;

    /// Whether the node is still attached to the document
    fn is_connected(&self, node: NodeId) -> bool;

    /// Create an element under `parent`
    fn insert(&self, parent: NodeId, element: NewElement, position: InsertPosition) -> Result<NodeId, TreeError>;

    /// Detach a node and its subtree; no-op for unknown or detached nodes
    fn remove(&self, node: NodeId);

    /// Subscribe to structural changes in the subtrees of `targets`
    fn observe(&self, targets: &[NodeId]) -> MutationStream;
}

/// Whether any node added in `batch` matches `selector` or contains a match
pub fn batch_adds_match(tree: &dyn DocumentTree, batch: &MutationBatch, selector: &Selector) -> bool {
    batch.iter().any(|record| {
        record.added.iter().any(|&node| {
            tree.matches(node, selector) || tree.query_selector(node, selector).is_some()
        })
    })
}

/// Value of `param` in the query string of `href`, resolved against `base`
pub fn query_param(base: &url::Url, href: &str, param: &str) -> Option<String> {
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
