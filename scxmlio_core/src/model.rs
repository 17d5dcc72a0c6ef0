//! The state-machine model of an SCXML document.
//!
//! A [`Document`] owns an arena of [`Node`]s.
//! Each node knows its parent and its children by [`NodeId`],
//! and transitions know their targets both by declared identifier and by resolved [`NodeId`].
//!
//! A [`Document`] can only be produced by [`DocumentBuilder::build`],
//! which resolves every reference and reports all errors it finds at once.
//! After that, the model cannot be altered anymore,
//! and it can be shared freely among threads.

mod builder;

use crate::{Actions, Data, DoneData, Executable, Invoke, NsBinding, Script};
pub use builder::*;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::fmt;
use std::ops::Index;
use thiserror::Error;

/// An indexing object for the nodes of a [`Document`].
///
/// These cannot be directly created or manipulated,
/// but have to be generated and/or provided by a [`DocumentBuilder`] or [`Document`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Position of the node in document order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Resolved targets of a reference.
pub type Targets = SmallVec<[NodeId; 2]>;

/// Data binding mode of the datamodel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Data is initialized when the document is loaded.
    #[default]
    Early,
    /// Data is initialized when its state is first entered.
    Late,
}

/// Whether a transition exits its source state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TransitionType {
    /// Does not exit the source state if all targets are its descendants.
    Internal,
    /// Always exits the source state.
    #[default]
    External,
}

/// What a history pseudo-state remembers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HistoryType {
    /// Only the immediate children of the parent state.
    #[default]
    Shallow,
    /// All the active descendants of the parent state.
    Deep,
}

/// A transition, owned by its source state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    events: Vec<String>,
    cond: Option<String>,
    r#type: TransitionType,
    targets: Vec<String>,
    actions: Actions,
    resolved: Targets,
}

impl Transition {
    /// Creates an eventless, unconditional, targetless external transition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event descriptors triggering the transition.
    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the guard condition.
    pub fn with_cond(mut self, cond: Option<String>) -> Self {
        self.cond = cond;
        self
    }

    /// Sets the transition type.
    pub fn with_type(mut self, r#type: TransitionType) -> Self {
        self.r#type = r#type;
        self
    }

    /// Sets the identifiers of the targets.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the actions executed when the transition is taken.
    pub fn with_actions(mut self, actions: Actions) -> Self {
        self.actions = actions;
        self
    }

    /// Appends an action to the transition.
    pub fn push_action(&mut self, action: Executable) {
        self.actions.push(action);
    }

    /// Event descriptors, in document order.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Whether the event list contains the given token.
    pub fn has_event(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event)
    }

    /// Guard condition.
    pub fn cond(&self) -> Option<&str> {
        self.cond.as_deref()
    }

    /// Transition type.
    pub fn r#type(&self) -> TransitionType {
        self.r#type
    }

    /// Declared identifiers of the targets.
    /// If empty, taking the transition does not change the state configuration.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Resolved targets, in the same order as [`Transition::targets`].
    pub fn target_nodes(&self) -> &[NodeId] {
        &self.resolved
    }

    /// Actions executed when the transition is taken.
    pub fn actions(&self) -> &[Executable] {
        &self.actions
    }
}

/// How the initial children of a compound state are specified.
#[derive(Debug, Clone, PartialEq)]
pub enum Initial {
    /// The `initial` attribute, listing target identifiers.
    Attribute(Vec<String>),
    /// The `<initial>` element, holding a targeting transition.
    Element(Transition),
}

/// A sequential (compound or atomic) state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    id: Option<String>,
    parent: Option<NodeId>,
    initial: Option<Initial>,
    children: Vec<NodeId>,
    transitions: Vec<Transition>,
    on_entry: Vec<Actions>,
    on_exit: Vec<Actions>,
    invokes: Vec<Invoke>,
    datamodel: Option<Vec<Data>>,
    initial_targets: Targets,
}

impl State {
    /// The declared initial specification, if any.
    pub fn initial(&self) -> Option<&Initial> {
        self.initial.as_ref()
    }

    /// Resolved initial children:
    /// the declared ones, or the first child in document order.
    pub fn initial_targets(&self) -> &[NodeId] {
        &self.initial_targets
    }
}

/// A parallel state, whose children are all active at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parallel {
    id: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    on_entry: Vec<Actions>,
    on_exit: Vec<Actions>,
    invokes: Vec<Invoke>,
    datamodel: Option<Vec<Data>>,
}

/// A final state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Final {
    id: Option<String>,
    parent: Option<NodeId>,
    on_entry: Vec<Actions>,
    on_exit: Vec<Actions>,
    done_data: Option<DoneData>,
}

impl Final {
    /// Data returned when the state is entered.
    pub fn done_data(&self) -> Option<&DoneData> {
        self.done_data.as_ref()
    }
}

/// A history pseudo-state, always a child of a [`State`].
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    id: Option<String>,
    parent: NodeId,
    r#type: HistoryType,
    default: Option<Transition>,
}

impl History {
    /// Whether the history is shallow or deep.
    pub fn r#type(&self) -> HistoryType {
        self.r#type
    }

    /// Transition taken if the parent state has never been visited.
    pub fn default_transition(&self) -> Option<&Transition> {
        self.default.as_ref()
    }
}

/// The kinds of state-like nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A [`State`].
    State,
    /// A [`Parallel`].
    Parallel,
    /// A [`Final`].
    Final,
    /// A [`History`].
    History,
}

impl NodeKind {
    /// The name of the element declaring nodes of this kind.
    pub fn tag(self) -> &'static str {
        match self {
            NodeKind::State => "state",
            NodeKind::Parallel => "parallel",
            NodeKind::Final => "final",
            NodeKind::History => "history",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A state-like node of the document.
///
/// The accessors give a uniform view over all kinds of nodes,
/// returning empty slices where a kind has no such content.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `<state>`
    State(State),
    /// `<parallel>`
    Parallel(Parallel),
    /// `<final>`
    Final(Final),
    /// `<history>`
    History(History),
}

impl Node {
    /// Kind of the node.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::State(_) => NodeKind::State,
            Node::Parallel(_) => NodeKind::Parallel,
            Node::Final(_) => NodeKind::Final,
            Node::History(_) => NodeKind::History,
        }
    }

    /// Declared identifier.
    pub fn id(&self) -> Option<&str> {
        match self {
            Node::State(State { id, .. })
            | Node::Parallel(Parallel { id, .. })
            | Node::Final(Final { id, .. })
            | Node::History(History { id, .. }) => id.as_deref(),
        }
    }

    /// Parent node, or `None` for top-level nodes.
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::State(State { parent, .. })
            | Node::Parallel(Parallel { parent, .. })
            | Node::Final(Final { parent, .. }) => *parent,
            Node::History(History { parent, .. }) => Some(*parent),
        }
    }

    /// Children nodes, in document order.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::State(State { children, .. }) | Node::Parallel(Parallel { children, .. }) => {
                children
            }
            Node::Final(_) | Node::History(_) => &[],
        }
    }

    /// Outgoing transitions, in document order.
    /// For a history, the default transition.
    pub fn transitions(&self) -> &[Transition] {
        match self {
            Node::State(State { transitions, .. }) => transitions,
            Node::History(History { default, .. }) => default.as_slice(),
            Node::Parallel(_) | Node::Final(_) => &[],
        }
    }

    /// Outgoing transitions whose event list contains the given token, in document order.
    pub fn transitions_for_event<'a>(
        &'a self,
        event: &'a str,
    ) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions()
            .iter()
            .filter(move |transition| transition.has_event(event))
    }

    /// The `<onentry>` blocks, in document order.
    pub fn on_entry(&self) -> &[Actions] {
        match self {
            Node::State(State { on_entry, .. })
            | Node::Parallel(Parallel { on_entry, .. })
            | Node::Final(Final { on_entry, .. }) => on_entry,
            Node::History(_) => &[],
        }
    }

    /// The `<onexit>` blocks, in document order.
    pub fn on_exit(&self) -> &[Actions] {
        match self {
            Node::State(State { on_exit, .. })
            | Node::Parallel(Parallel { on_exit, .. })
            | Node::Final(Final { on_exit, .. }) => on_exit,
            Node::History(_) => &[],
        }
    }

    /// Invoked services.
    pub fn invokes(&self) -> &[Invoke] {
        match self {
            Node::State(State { invokes, .. }) | Node::Parallel(Parallel { invokes, .. }) => {
                invokes
            }
            Node::Final(_) | Node::History(_) => &[],
        }
    }

    /// Local datamodel.
    pub fn datamodel(&self) -> Option<&[Data]> {
        match self {
            Node::State(State { datamodel, .. }) | Node::Parallel(Parallel { datamodel, .. }) => {
                datamodel.as_deref()
            }
            Node::Final(_) | Node::History(_) => None,
        }
    }

    /// Whether the node has no state children.
    pub fn is_atomic(&self) -> bool {
        self.children().is_empty()
    }

    /// The node as a [`State`], if it is one.
    pub fn as_state(&self) -> Option<&State> {
        match self {
            Node::State(state) => Some(state),
            _ => None,
        }
    }

    /// The node as a [`Parallel`], if it is one.
    pub fn as_parallel(&self) -> Option<&Parallel> {
        match self {
            Node::Parallel(parallel) => Some(parallel),
            _ => None,
        }
    }

    /// The node as a [`Final`], if it is one.
    pub fn as_final(&self) -> Option<&Final> {
        match self {
            Node::Final(r#final) => Some(r#final),
            _ => None,
        }
    }

    /// The node as a [`History`], if it is one.
    pub fn as_history(&self) -> Option<&History> {
        match self {
            Node::History(history) => Some(history),
            _ => None,
        }
    }
}

/// Which kind of reference failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    /// The target of a transition.
    Transition,
    /// The initial state of the document or of a state.
    Initial,
    /// The target of a history's default transition.
    HistoryDefault,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Transition => f.write_str("transition target"),
            Reference::Initial => f.write_str("initial state"),
            Reference::HistoryDefault => f.write_str("history default target"),
        }
    }
}

/// The error type for the construction of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The node does not belong to the document under construction.
    #[error("node {0:?} does not belong to this document")]
    MissingNode(NodeId),
    /// The identifier has been declared more than once.
    #[error("identifier `{0}` is declared more than once")]
    DuplicateIdentifier(String),
    /// The referenced identifier has not been declared.
    #[error("{reference} `{id}` has not been declared")]
    UnresolvedReference {
        /// What kind of reference failed.
        reference: Reference,
        /// The undeclared identifier.
        id: String,
    },
    /// The default transition of a history targets a node outside of the history's parent.
    #[error("history `{history}` targets `{target}`, which is not a descendant of its parent")]
    HistoryOutOfScope {
        /// The history (or `<history>` if it has no identifier).
        history: String,
        /// The offending target.
        target: String,
    },
    /// The element cannot appear where it does.
    #[error("`<{element}>` is not allowed inside `<{context}>`")]
    InvalidStructure {
        /// The misplaced element (`#text` for character data).
        element: String,
        /// The enclosing element.
        context: String,
    },
    /// The element can appear only once in its context.
    #[error("`<{element}>` occurs more than once inside `<{context}>`")]
    DuplicateElement {
        /// The repeated element.
        element: String,
        /// The enclosing element.
        context: String,
    },
    /// A mandatory child element is missing.
    #[error("`<{context}>` requires a `<{element}>` child")]
    MissingElement {
        /// The missing element.
        element: String,
        /// The enclosing element.
        context: String,
    },
    /// No extension is registered for a custom action.
    #[error("no custom action is registered for `<{name}>` in namespace `{namespace}`")]
    UnregisteredExtension {
        /// Namespace of the element (empty if none).
        namespace: String,
        /// Local name of the element.
        name: String,
    },
    /// A required attribute is missing.
    #[error("`<{element}>` is missing required attribute `{attribute}`")]
    MissingAttribute {
        /// The element.
        element: String,
        /// The missing attribute.
        attribute: String,
    },
    /// The attribute is not known for the element.
    #[error("unknown attribute `{attribute}` on `<{element}>`")]
    UnknownAttribute {
        /// The element.
        element: String,
        /// The unknown attribute.
        attribute: String,
    },
    /// The attribute value is not among the allowed ones.
    #[error("invalid value `{value}` for attribute `{attribute}` of `<{element}>`")]
    InvalidValue {
        /// The element.
        element: String,
        /// The attribute.
        attribute: String,
        /// The invalid value.
        value: String,
    },
    /// Two mutually exclusive attributes (or an attribute and a child) are both present.
    #[error("`<{element}>` cannot specify both `{first}` and `{second}`")]
    ConflictingAttributes {
        /// The element.
        element: String,
        /// The first specification.
        first: String,
        /// The second specification.
        second: String,
    },
}

/// All the errors found while building a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelErrors(Vec<ModelError>);

impl ModelErrors {
    /// Wraps the given errors.
    pub fn new(errors: Vec<ModelError>) -> Self {
        Self(errors)
    }

    /// Iterates over the errors, in the order they were found.
    pub fn iter(&self) -> std::slice::Iter<'_, ModelError> {
        self.0.iter()
    }

    /// Number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unwraps the errors.
    pub fn into_inner(self) -> Vec<ModelError> {
        self.0
    }
}

impl From<ModelError> for ModelErrors {
    fn from(error: ModelError) -> Self {
        Self(vec![error])
    }
}

impl IntoIterator for ModelErrors {
    type Item = ModelError;
    type IntoIter = std::vec::IntoIter<ModelError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ModelErrors {
    type Item = &'a ModelError;
    type IntoIter = std::slice::Iter<'a, ModelError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::error::Error for ModelErrors {}

impl fmt::Display for ModelErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} model error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

/// A resolved SCXML document.
///
/// The only way to produce a [`Document`] is through a [`DocumentBuilder`],
/// which guarantees that every identifier is unique and every reference is resolved.
/// A [`Document`] exposes no way to alter it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    name: Option<String>,
    version: String,
    datamodel_lang: Option<String>,
    binding: Option<Binding>,
    prefix: Option<String>,
    namespaces: Vec<NsBinding>,
    initial: Vec<String>,
    initial_targets: Targets,
    datamodel: Option<Vec<Data>>,
    script: Option<Script>,
    roots: Vec<NodeId>,
    nodes: Vec<Node>,
    ids: HashMap<String, NodeId>,
}

impl Document {
    /// Name of the state machine.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// SCXML version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Datamodel language, as declared by the `datamodel` attribute.
    pub fn datamodel_lang(&self) -> Option<&str> {
        self.datamodel_lang.as_deref()
    }

    /// Data binding mode, if declared.
    pub fn binding(&self) -> Option<Binding> {
        self.binding
    }

    /// Prefix of the SCXML elements.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Namespace declarations of the root element.
    pub fn namespaces(&self) -> &[NsBinding] {
        &self.namespaces
    }

    /// Declared identifiers of the initial states (empty if not declared).
    pub fn initial(&self) -> &[String] {
        &self.initial
    }

    /// Resolved initial states:
    /// the declared ones, or the first top-level node in document order.
    pub fn initial_targets(&self) -> &[NodeId] {
        &self.initial_targets
    }

    /// The first resolved initial state.
    pub fn initial_target(&self) -> Option<&Node> {
        self.initial_targets.first().map(|id| &self[*id])
    }

    /// Top-level datamodel.
    pub fn datamodel(&self) -> Option<&[Data]> {
        self.datamodel.as_deref()
    }

    /// Top-level script.
    pub fn script(&self) -> Option<&Script> {
        self.script.as_ref()
    }

    /// Top-level nodes, in document order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node with the given [`NodeId`], if it belongs to the document.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Iterates over all nodes, in document order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeId(idx as u32), node))
    }

    /// The [`NodeId`] of the node declaring the given identifier.
    pub fn lookup(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    /// The node declaring the given identifier.
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.lookup(id).map(|node| &self[node])
    }

    /// Child history pseudo-states of the given node.
    pub fn histories(&self, node: NodeId) -> impl Iterator<Item = (NodeId, &History)> {
        self[node]
            .children()
            .iter()
            .filter_map(|child| self[*child].as_history().map(|history| (*child, history)))
    }

    /// Whether `node` is a proper descendant of `ancestor`.
    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        is_descendant(&self.nodes, node, ancestor)
    }
}

impl Index<NodeId> for Document {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index.index()]
    }
}

fn is_descendant(nodes: &[Node], node: NodeId, ancestor: NodeId) -> bool {
    let mut current = nodes[node.index()].parent();
    while let Some(parent) = current {
        if parent == ancestor {
            return true;
        }
        current = nodes[parent.index()].parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn document_is_shareable() {
        assert_send_sync::<Document>();
        assert_send_sync::<crate::ExtensionRegistry>();
    }

    #[test]
    fn transitions_for_event() {
        let mut builder = DocumentBuilder::new();
        let ten = builder.add_state(None, Some("ten".to_string())).unwrap();
        let twenty = builder.add_state(None, Some("twenty".to_string())).unwrap();
        builder
            .add_transition(ten, Transition::new().with_events(["ten.done"]).with_targets(["twenty"]))
            .unwrap();
        builder
            .add_transition(ten, Transition::new().with_events(["other", "ten.done"]))
            .unwrap();
        builder
            .add_transition(ten, Transition::new().with_events(["other"]))
            .unwrap();
        let document = builder.build().unwrap();
        let ten_done = document[ten].transitions_for_event("ten.done").collect::<Vec<_>>();
        assert_eq!(ten_done.len(), 2);
        assert_eq!(ten_done[0].target_nodes(), &[twenty]);
        assert!(ten_done[1].target_nodes().is_empty());
        assert_eq!(document[twenty].transitions_for_event("ten.done").count(), 0);
    }

    #[test]
    fn navigation() {
        let mut builder = DocumentBuilder::new();
        let outer = builder.add_state(None, Some("outer".to_string())).unwrap();
        let inner = builder.add_state(Some(outer), Some("inner".to_string())).unwrap();
        let history = builder.add_history(outer, Some("h".to_string()), HistoryType::Deep).unwrap();
        builder
            .add_transition(history, Transition::new().with_targets(["inner"]))
            .unwrap();
        let document = builder.build().unwrap();
        assert_eq!(document.roots(), &[outer]);
        assert_eq!(document[outer].children(), &[inner, history]);
        assert_eq!(document[inner].parent(), Some(outer));
        assert_eq!(document.lookup("h"), Some(history));
        assert_eq!(document.get("inner").and_then(Node::id), Some("inner"));
        assert!(document.is_descendant(inner, outer));
        assert!(!document.is_descendant(outer, inner));
        let histories = document.histories(outer).collect::<Vec<_>>();
        assert_eq!(histories.len(), 1);
        assert_eq!(histories[0].1.r#type(), HistoryType::Deep);
        assert_eq!(document[history].transitions()[0].target_nodes(), &[inner]);
        assert_eq!(document.nodes().count(), 3);
    }

    #[test]
    fn errors_display() {
        let errors = ModelErrors::new(vec![
            ModelError::DuplicateIdentifier("x".to_string()),
            ModelError::UnresolvedReference {
                reference: Reference::Transition,
                id: "nosuchstate".to_string(),
            },
        ]);
        let text = errors.to_string();
        assert!(text.starts_with("2 model error(s)"));
        assert!(text.contains("identifier `x` is declared more than once"));
        assert!(text.contains("transition target `nosuchstate` has not been declared"));
    }
}
