use super::{
    is_descendant, Binding, Document, Final, History, HistoryType, Initial, ModelError,
    ModelErrors, Node, NodeId, NodeKind, Parallel, Reference, State, Targets, Transition,
};
use crate::{Actions, Data, DoneData, Invoke, NsBinding, Script, SCXML_NS};
use hashbrown::HashMap;
use log::{debug, info};

/// The object used to define and build a [`Document`].
///
/// Nodes are added in document order.
/// Every declared identifier is recorded as soon as its node is added,
/// so that references can be declared before their targets,
/// and are resolved only by [`DocumentBuilder::build`].
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    name: Option<String>,
    version: String,
    datamodel_lang: Option<String>,
    binding: Option<Binding>,
    prefix: Option<String>,
    namespaces: Vec<NsBinding>,
    initial: Vec<String>,
    datamodel: Option<Vec<Data>>,
    script: Option<Script>,
    roots: Vec<NodeId>,
    nodes: Vec<Node>,
    ids: HashMap<String, NodeId>,
    errors: Vec<ModelError>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self {
            name: None,
            version: "1.0".to_string(),
            datamodel_lang: None,
            binding: None,
            prefix: None,
            namespaces: vec![NsBinding::new(None, SCXML_NS)],
            initial: Vec::new(),
            datamodel: None,
            script: None,
            roots: Vec::new(),
            nodes: Vec::new(),
            ids: HashMap::new(),
            errors: Vec::new(),
        }
    }
}

impl DocumentBuilder {
    /// Creates a new [`DocumentBuilder`].
    /// At creation, the document has no nodes,
    /// version `1.0` and the SCXML namespace as default namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the state machine.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Sets the SCXML version.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Sets the datamodel language.
    pub fn set_datamodel_lang(&mut self, lang: impl Into<String>) {
        self.datamodel_lang = Some(lang.into());
    }

    /// Sets the data binding mode.
    pub fn set_binding(&mut self, binding: Binding) {
        self.binding = Some(binding);
    }

    /// Sets the prefix of the SCXML elements (`None` for the default namespace).
    pub fn set_prefix(&mut self, prefix: Option<String>) {
        self.prefix = prefix;
    }

    /// Sets the namespace declarations of the root element, replacing the default one.
    pub fn set_namespaces(&mut self, namespaces: Vec<NsBinding>) {
        self.namespaces = namespaces;
    }

    /// Sets the identifiers of the initial states of the document.
    pub fn set_initial(&mut self, initial: Vec<String>) {
        self.initial = initial;
    }

    /// Sets the top-level datamodel.
    ///
    /// Fails if it has already been set.
    pub fn set_datamodel(&mut self, datamodel: Vec<Data>) -> Result<(), ModelError> {
        if self.datamodel.is_some() {
            return Err(ModelError::DuplicateElement {
                element: "datamodel".to_string(),
                context: "scxml".to_string(),
            });
        }
        self.datamodel = Some(datamodel);
        Ok(())
    }

    /// Sets the top-level script.
    ///
    /// Fails if it has already been set.
    pub fn set_script(&mut self, script: Script) -> Result<(), ModelError> {
        if self.script.is_some() {
            return Err(ModelError::DuplicateElement {
                element: "script".to_string(),
                context: "scxml".to_string(),
            });
        }
        self.script = Some(script);
        Ok(())
    }

    /// The node with the given [`NodeId`], as built so far.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// The node declaring the given identifier, as built so far.
    pub fn lookup(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    /// Adds a new [`State`] under the given parent (`None` for a top-level state).
    ///
    /// Fails if the parent cannot contain states.
    pub fn add_state(
        &mut self,
        parent: Option<NodeId>,
        id: Option<String>,
    ) -> Result<NodeId, ModelError> {
        self.add_node(
            parent,
            Node::State(State {
                id,
                parent,
                ..Default::default()
            }),
        )
    }

    /// Adds a new [`Parallel`] under the given parent (`None` for a top-level parallel).
    ///
    /// Fails if the parent cannot contain parallel states.
    pub fn add_parallel(
        &mut self,
        parent: Option<NodeId>,
        id: Option<String>,
    ) -> Result<NodeId, ModelError> {
        self.add_node(
            parent,
            Node::Parallel(Parallel {
                id,
                parent,
                ..Default::default()
            }),
        )
    }

    /// Adds a new [`Final`] under the given parent (`None` for a top-level final state).
    ///
    /// Fails if the parent cannot contain final states.
    pub fn add_final(
        &mut self,
        parent: Option<NodeId>,
        id: Option<String>,
    ) -> Result<NodeId, ModelError> {
        self.add_node(
            parent,
            Node::Final(Final {
                id,
                parent,
                ..Default::default()
            }),
        )
    }

    /// Adds a new [`History`] under the given parent.
    ///
    /// Fails if the parent is not a [`State`].
    /// The default transition is added with [`DocumentBuilder::add_transition`].
    pub fn add_history(
        &mut self,
        parent: NodeId,
        id: Option<String>,
        r#type: HistoryType,
    ) -> Result<NodeId, ModelError> {
        self.add_node(
            Some(parent),
            Node::History(History {
                id,
                parent,
                r#type,
                default: None,
            }),
        )
    }

    fn add_node(&mut self, parent: Option<NodeId>, node: Node) -> Result<NodeId, ModelError> {
        let kind = node.kind();
        let context = match parent {
            Some(parent) => self.get(parent)?.kind(),
            None if kind == NodeKind::History => {
                return Err(ModelError::InvalidStructure {
                    element: kind.tag().to_string(),
                    context: "scxml".to_string(),
                });
            }
            None => NodeKind::State,
        };
        let allowed = match context {
            NodeKind::State => true,
            NodeKind::Parallel => matches!(kind, NodeKind::State | NodeKind::Parallel),
            NodeKind::Final | NodeKind::History => false,
        };
        if !allowed {
            return Err(ModelError::InvalidStructure {
                element: kind.tag().to_string(),
                context: context.tag().to_string(),
            });
        }

        let node_id = NodeId(self.nodes.len() as u32);
        if let Some(id) = node.id() {
            if self.ids.contains_key(id) {
                debug!(target: "builder", "duplicate identifier `{id}`");
                self.errors
                    .push(ModelError::DuplicateIdentifier(id.to_string()));
            } else {
                self.ids.insert(id.to_string(), node_id);
            }
        }
        self.nodes.push(node);
        match parent {
            Some(parent) => match &mut self.nodes[parent.index()] {
                Node::State(State { children, .. }) | Node::Parallel(Parallel { children, .. }) => {
                    children.push(node_id)
                }
                // Containment has already been checked.
                Node::Final(_) | Node::History(_) => {}
            },
            None => self.roots.push(node_id),
        }
        Ok(node_id)
    }

    fn get(&self, node: NodeId) -> Result<&Node, ModelError> {
        self.nodes
            .get(node.index())
            .ok_or(ModelError::MissingNode(node))
    }

    fn get_mut(&mut self, node: NodeId) -> Result<&mut Node, ModelError> {
        self.nodes
            .get_mut(node.index())
            .ok_or(ModelError::MissingNode(node))
    }

    /// Adds an outgoing transition to the given [`State`],
    /// or sets the default transition of the given [`History`].
    ///
    /// Fails if:
    ///
    /// - the node does not exist;
    /// - the node is a [`Parallel`] or a [`Final`];
    /// - the history already has a default transition.
    pub fn add_transition(
        &mut self,
        node: NodeId,
        transition: Transition,
    ) -> Result<(), ModelError> {
        match self.get_mut(node)? {
            Node::State(state) => {
                state.transitions.push(transition);
                Ok(())
            }
            Node::History(History { default: Some(_), .. }) => Err(ModelError::DuplicateElement {
                element: "transition".to_string(),
                context: NodeKind::History.tag().to_string(),
            }),
            Node::History(history) => {
                history.default = Some(transition);
                Ok(())
            }
            other => Err(ModelError::InvalidStructure {
                element: "transition".to_string(),
                context: other.kind().tag().to_string(),
            }),
        }
    }

    /// Adds an `<onentry>` block to the given node.
    ///
    /// Fails if the node is a [`History`].
    pub fn add_on_entry(&mut self, node: NodeId, actions: Actions) -> Result<(), ModelError> {
        match self.get_mut(node)? {
            Node::State(State { on_entry, .. })
            | Node::Parallel(Parallel { on_entry, .. })
            | Node::Final(Final { on_entry, .. }) => {
                on_entry.push(actions);
                Ok(())
            }
            Node::History(_) => Err(ModelError::InvalidStructure {
                element: "onentry".to_string(),
                context: NodeKind::History.tag().to_string(),
            }),
        }
    }

    /// Adds an `<onexit>` block to the given node.
    ///
    /// Fails if the node is a [`History`].
    pub fn add_on_exit(&mut self, node: NodeId, actions: Actions) -> Result<(), ModelError> {
        match self.get_mut(node)? {
            Node::State(State { on_exit, .. })
            | Node::Parallel(Parallel { on_exit, .. })
            | Node::Final(Final { on_exit, .. }) => {
                on_exit.push(actions);
                Ok(())
            }
            Node::History(_) => Err(ModelError::InvalidStructure {
                element: "onexit".to_string(),
                context: NodeKind::History.tag().to_string(),
            }),
        }
    }

    /// Adds an invocation to the given [`State`] or [`Parallel`].
    pub fn add_invoke(&mut self, node: NodeId, invoke: Invoke) -> Result<(), ModelError> {
        match self.get_mut(node)? {
            Node::State(State { invokes, .. }) | Node::Parallel(Parallel { invokes, .. }) => {
                invokes.push(invoke);
                Ok(())
            }
            other => Err(ModelError::InvalidStructure {
                element: "invoke".to_string(),
                context: other.kind().tag().to_string(),
            }),
        }
    }

    /// Sets the initial specification of the given [`State`].
    ///
    /// Fails if the node is not a [`State`],
    /// or if it already has an initial specification.
    pub fn set_state_initial(&mut self, node: NodeId, initial: Initial) -> Result<(), ModelError> {
        match self.get_mut(node)? {
            Node::State(state) => match (&state.initial, &initial) {
                (None, _) => {
                    state.initial = Some(initial);
                    Ok(())
                }
                (Some(Initial::Element(_)), Initial::Element(_)) => {
                    Err(ModelError::DuplicateElement {
                        element: "initial".to_string(),
                        context: NodeKind::State.tag().to_string(),
                    })
                }
                (Some(Initial::Attribute(_)), Initial::Attribute(_)) => {
                    Err(ModelError::DuplicateElement {
                        element: "initial".to_string(),
                        context: NodeKind::State.tag().to_string(),
                    })
                }
                (Some(_), _) => Err(ModelError::ConflictingAttributes {
                    element: NodeKind::State.tag().to_string(),
                    first: "initial".to_string(),
                    second: "<initial>".to_string(),
                }),
            },
            other => Err(ModelError::InvalidStructure {
                element: "initial".to_string(),
                context: other.kind().tag().to_string(),
            }),
        }
    }

    /// Sets the local datamodel of the given [`State`] or [`Parallel`].
    pub fn set_node_datamodel(
        &mut self,
        node: NodeId,
        data: Vec<Data>,
    ) -> Result<(), ModelError> {
        let context = self.get(node)?.kind();
        match self.get_mut(node)? {
            Node::State(State { datamodel, .. }) | Node::Parallel(Parallel { datamodel, .. })
                if datamodel.is_some() =>
            {
                Err(ModelError::DuplicateElement {
                    element: "datamodel".to_string(),
                    context: context.tag().to_string(),
                })
            }
            Node::State(State { datamodel, .. }) | Node::Parallel(Parallel { datamodel, .. }) => {
                *datamodel = Some(data);
                Ok(())
            }
            other => Err(ModelError::InvalidStructure {
                element: "datamodel".to_string(),
                context: other.kind().tag().to_string(),
            }),
        }
    }

    /// Sets the done data of the given [`Final`].
    pub fn set_done_data(&mut self, node: NodeId, done_data: DoneData) -> Result<(), ModelError> {
        match self.get_mut(node)? {
            Node::Final(Final { done_data: Some(_), .. }) => Err(ModelError::DuplicateElement {
                element: "donedata".to_string(),
                context: NodeKind::Final.tag().to_string(),
            }),
            Node::Final(r#final) => {
                r#final.done_data = Some(done_data);
                Ok(())
            }
            other => Err(ModelError::InvalidStructure {
                element: "donedata".to_string(),
                context: other.kind().tag().to_string(),
            }),
        }
    }

    /// Resolves every reference and produces the [`Document`].
    ///
    /// Resolution does not stop at the first failure:
    /// duplicate identifiers recorded while adding nodes,
    /// unresolved references and history defaults out of scope
    /// are all reported together.
    pub fn build(self) -> Result<Document, ModelErrors> {
        let Self {
            name,
            version,
            datamodel_lang,
            binding,
            prefix,
            namespaces,
            initial,
            datamodel,
            script,
            roots,
            mut nodes,
            ids,
            mut errors,
        } = self;

        for idx in 0..nodes.len() {
            let first_child = first_state_child(&nodes, idx);
            match &mut nodes[idx] {
                Node::State(state) => {
                    for transition in state.transitions.iter_mut() {
                        transition.resolved =
                            resolve(&ids, &transition.targets, Reference::Transition, &mut errors);
                    }
                    state.initial_targets = match &mut state.initial {
                        Some(Initial::Attribute(targets)) => {
                            resolve(&ids, targets, Reference::Initial, &mut errors)
                        }
                        Some(Initial::Element(transition)) => {
                            transition.resolved =
                                resolve(&ids, &transition.targets, Reference::Initial, &mut errors);
                            transition.resolved.clone()
                        }
                        None => first_child.into_iter().collect(),
                    };
                }
                Node::History(history) => match history.default.as_mut() {
                    Some(transition) => {
                        transition.resolved = resolve(
                            &ids,
                            &transition.targets,
                            Reference::HistoryDefault,
                            &mut errors,
                        );
                    }
                    None => errors.push(ModelError::MissingElement {
                        element: "transition".to_string(),
                        context: NodeKind::History.tag().to_string(),
                    }),
                },
                Node::Parallel(_) | Node::Final(_) => {}
            }
        }

        // History defaults can only be checked once every target is resolved.
        for node in nodes.iter() {
            if let Node::History(history) = node {
                let Some(default) = history.default.as_ref() else {
                    continue;
                };
                for target in default.resolved.iter() {
                    if !is_descendant(&nodes, *target, history.parent) {
                        errors.push(ModelError::HistoryOutOfScope {
                            history: history
                                .id
                                .clone()
                                .unwrap_or_else(|| "<history>".to_string()),
                            target: nodes[target.index()].id().unwrap_or_default().to_string(),
                        });
                    }
                }
            }
        }

        let initial_targets = if initial.is_empty() {
            roots.first().copied().into_iter().collect()
        } else {
            resolve(&ids, &initial, Reference::Initial, &mut errors)
        };

        if !errors.is_empty() {
            debug!(target: "builder", "resolution failed with {} error(s)", errors.len());
            return Err(ModelErrors::new(errors));
        }

        nodes.shrink_to_fit();
        info!(
            target: "builder",
            "resolved document with {} nodes and {} identifiers",
            nodes.len(),
            ids.len()
        );
        Ok(Document {
            name,
            version,
            datamodel_lang,
            binding,
            prefix,
            namespaces,
            initial,
            initial_targets,
            datamodel,
            script,
            roots,
            nodes,
            ids,
        })
    }
}

fn first_state_child(nodes: &[Node], idx: usize) -> Option<NodeId> {
    nodes[idx]
        .children()
        .iter()
        .copied()
        .find(|child| nodes[child.index()].kind() != NodeKind::History)
}

fn resolve(
    ids: &HashMap<String, NodeId>,
    targets: &[String],
    reference: Reference,
    errors: &mut Vec<ModelError>,
) -> Targets {
    let mut resolved = Targets::new();
    for target in targets {
        match ids.get(target) {
            Some(node) => resolved.push(*node),
            None => errors.push(ModelError::UnresolvedReference {
                reference,
                id: target.clone(),
            }),
        }
    }
    resolved
}
