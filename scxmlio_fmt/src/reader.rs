//! Streaming reader of SCXML documents.
//!
//! Reading happens in two passes.
//! The structural pass streams through the source with [`quick_xml::NsReader`],
//! building the tree of nodes through a [`DocumentBuilder`] which records every declared identifier.
//! The resolution pass ([`DocumentBuilder::build`]) then resolves every reference at once.

mod actions;
mod attributes;
mod capture;

use crate::vocabulary::*;
use attributes::{enumerated, exclusive, tokens};
use log::{error, info, trace};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use scxmlio_core::{
    Actions, Binding, Content, Data, Document, DocumentBuilder, DoneData, Executable,
    ExtensionRegistry, Foreach, HistoryType, If, Initial, Invoke, ModelError, ModelErrors,
    NodeId, NsBinding, Param, Transition, TransitionType, SCXML_NS,
};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Markup that is not a well-formed (namespace-aware) UTF-8 XML document.
#[derive(Debug, Error)]
pub enum SyntaxError {
    /// Error from the underlying XML reader.
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    /// The source is not valid UTF-8.
    #[error("invalid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    /// An element or attribute uses a prefix that has not been declared.
    #[error("namespace prefix `{0}` has not been declared")]
    UnknownPrefix(String),
    /// The source ended while some tags were still open.
    #[error("open tags have not been closed")]
    UnclosedTags,
    /// The source holds no element at all.
    #[error("document has no root element")]
    MissingRoot,
    /// Another element follows the root element.
    #[error("document has more than one root element")]
    MultipleRoots,
    /// Character data before or after the root element.
    #[error("text outside of the root element")]
    TextOutsideRoot,
    /// The source could not be read.
    #[error("could not read source")]
    Io(#[from] std::io::Error),
}

/// The error type for reading a [`Document`].
///
/// No partial [`Document`] is ever returned:
/// reading either succeeds completely or fails with one of these.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Malformed markup.
    /// Reading stopped at the first error.
    #[error("syntax error at byte {position}")]
    Syntax {
        /// Byte offset where the error was found.
        position: u64,
        /// The error.
        #[source]
        source: SyntaxError,
    },
    /// A structural error found during the structural pass
    /// (e.g., illegal nesting or an unregistered custom action).
    /// Reading stopped at the first error.
    #[error("invalid document at byte {position}")]
    Structure {
        /// Byte offset of the offending markup.
        position: u64,
        /// The error.
        #[source]
        source: ModelError,
    },
    /// All the errors found by the resolution pass.
    #[error("invalid document")]
    Model(#[from] ModelErrors),
}

impl ReadError {
    /// The model errors carried by the error, if any.
    pub fn model_errors(&self) -> Vec<&ModelError> {
        match self {
            ReadError::Syntax { .. } => Vec::new(),
            ReadError::Structure { source, .. } => vec![source],
            ReadError::Model(errors) => errors.iter().collect(),
        }
    }
}

#[derive(Debug, Error)]
enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<quick_xml::Error> for ParseError {
    fn from(err: quick_xml::Error) -> Self {
        ParseError::Syntax(SyntaxError::Xml(err))
    }
}

impl From<quick_xml::events::attributes::AttrError> for ParseError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ParseError::Syntax(SyntaxError::Xml(err.into()))
    }
}

impl From<std::str::Utf8Error> for ParseError {
    fn from(err: std::str::Utf8Error) -> Self {
        ParseError::Syntax(SyntaxError::Utf8(err))
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Reads a [`Document`] from the given source.
///
/// Custom actions are looked up in the given registry;
/// with no registry, any custom action is an [`ModelError::UnregisteredExtension`].
///
/// ```
/// # use scxmlio_fmt::parse;
/// let source = br#"<scxml xmlns="http://www.w3.org/2005/07/scxml" version="1.0">
///     <state id="a"><transition event="go" target="b"/></state>
///     <final id="b"/>
/// </scxml>"#;
/// let document = parse(source, None).expect("valid document");
/// assert_eq!(document.initial_target().and_then(|node| node.id()), Some("a"));
/// ```
pub fn parse(source: &[u8], registry: Option<&ExtensionRegistry>) -> Result<Document, ReadError> {
    info!(target: "parser", "parsing document ({} bytes)", source.len());
    let mut parser = Parser::new(source, registry);
    if let Err(err) = parser.run() {
        error!(target: "parser", "{err}");
        return Err(match err {
            ParseError::Syntax(cause @ SyntaxError::Xml(_)) => ReadError::Syntax {
                position: parser.reader.error_position(),
                source: cause,
            },
            ParseError::Syntax(cause) => ReadError::Syntax {
                position: parser.position,
                source: cause,
            },
            // Malformed markup past the structural error takes precedence
            ParseError::Model(cause) => match check_syntax(source) {
                Err((position, syntax)) => {
                    error!(target: "parser", "{syntax}");
                    ReadError::Syntax {
                        position,
                        source: syntax,
                    }
                }
                Ok(()) => ReadError::Structure {
                    position: parser.position,
                    source: cause,
                },
            },
        });
    }
    info!(target: "parser", "resolving references");
    let document = parser.builder.build().inspect_err(|errors| {
        error!(target: "parser", "{errors}");
    })?;
    info!(target: "parser", "parsed document with {} nodes", document.len());
    Ok(document)
}

/// Reads a [`Document`] from a string.
pub fn parse_str(source: &str, registry: Option<&ExtensionRegistry>) -> Result<Document, ReadError> {
    parse(source.as_bytes(), registry)
}

/// Reads a [`Document`] from any [`Read`] source, which is read to its end first.
pub fn parse_reader<R: Read>(
    mut reader: R,
    registry: Option<&ExtensionRegistry>,
) -> Result<Document, ReadError> {
    let mut source = Vec::new();
    reader
        .read_to_end(&mut source)
        .map_err(|err| ReadError::Syntax {
            position: source.len() as u64,
            source: SyntaxError::Io(err),
        })?;
    parse(&source, registry)
}

/// Reads a [`Document`] from the file at the given path.
pub fn parse_file(path: &Path, registry: Option<&ExtensionRegistry>) -> Result<Document, ReadError> {
    info!(target: "parser", "reading file '{}'", path.display());
    let file = std::fs::File::open(path).map_err(|err| ReadError::Syntax {
        position: 0,
        source: SyntaxError::Io(err),
    })?;
    parse_reader(std::io::BufReader::new(file), registry)
}

/// Elements that are still open, together with what has been collected of them so far.
#[derive(Debug)]
enum Frame {
    Scxml,
    State(NodeId),
    Parallel(NodeId),
    Final(NodeId),
    History(NodeId),
    Initial(NodeId, Option<Transition>),
    Datamodel(Option<NodeId>, Vec<Data>),
    Transition(Transition),
    OnEntry(Actions),
    OnExit(Actions),
    If(If),
    Foreach(Foreach),
    Send(scxmlio_core::Send),
    Invoke(Invoke, bool),
    Finalize(Actions),
    DoneData(DoneData),
}

impl From<&Frame> for &'static str {
    fn from(value: &Frame) -> Self {
        match value {
            Frame::Scxml => TAG_SCXML,
            Frame::State(_) => TAG_STATE,
            Frame::Parallel(_) => TAG_PARALLEL,
            Frame::Final(_) => TAG_FINAL,
            Frame::History(_) => TAG_HISTORY,
            Frame::Initial(..) => TAG_INITIAL,
            Frame::Datamodel(..) => TAG_DATAMODEL,
            Frame::Transition(_) => TAG_TRANSITION,
            Frame::OnEntry(_) => TAG_ONENTRY,
            Frame::OnExit(_) => TAG_ONEXIT,
            Frame::If(_) => TAG_IF,
            Frame::Foreach(_) => TAG_FOREACH,
            Frame::Send(_) => TAG_SEND,
            Frame::Invoke(..) => TAG_INVOKE,
            Frame::Finalize(_) => TAG_FINALIZE,
            Frame::DoneData(_) => TAG_DONEDATA,
        }
    }
}

impl Frame {
    /// Whether the element can contain executable content.
    fn is_executable(&self) -> bool {
        matches!(
            self,
            Frame::OnEntry(_)
                | Frame::OnExit(_)
                | Frame::Transition(_)
                | Frame::If(_)
                | Frame::Foreach(_)
                | Frame::Finalize(_)
        )
    }

    fn node(&self) -> Option<NodeId> {
        match self {
            Frame::State(node) | Frame::Parallel(node) | Frame::Final(node) | Frame::History(node) => {
                Some(*node)
            }
            _ => None,
        }
    }
}

struct Parser<'a> {
    source: &'a [u8],
    reader: NsReader<&'a [u8]>,
    registry: Option<&'a ExtensionRegistry>,
    builder: DocumentBuilder,
    stack: Vec<Frame>,
    // Namespace declarations of every open element, root first.
    scopes: Vec<Vec<NsBinding>>,
    // Whether SCXML elements are in the SCXML namespace or in no namespace at all.
    bound: bool,
    seen_root: bool,
    position: u64,
}

impl<'a> Parser<'a> {
    fn new(source: &'a [u8], registry: Option<&'a ExtensionRegistry>) -> Self {
        Self {
            source,
            reader: NsReader::from_reader(source),
            registry,
            builder: DocumentBuilder::new(),
            stack: Vec::new(),
            scopes: Vec::new(),
            bound: true,
            seen_root: false,
            position: 0,
        }
    }

    fn run(&mut self) -> ParseResult<()> {
        loop {
            self.position = self.reader.buffer_position();
            match self.reader.read_event()? {
                Event::Start(tag) => self.start(tag, false)?,
                Event::Empty(tag) => self.start(tag, true)?,
                Event::End(tag) => {
                    trace!(
                        target: "parser",
                        "'{}' close tag",
                        String::from_utf8_lossy(tag.name().as_ref())
                    );
                    self.close()?;
                }
                Event::Text(text) if capture::is_blank(&text) => continue,
                Event::Text(_) | Event::CData(_) if self.stack.is_empty() => {
                    return Err(SyntaxError::TextOutsideRoot.into());
                }
                Event::Text(_) => return Err(self.invalid(TAG_TEXT)),
                Event::CData(_) => return Err(self.invalid(TAG_CDATA)),
                // Comments and processing instructions are not part of the model
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => continue,
                Event::Eof => {
                    if !self.stack.is_empty() {
                        return Err(SyntaxError::UnclosedTags.into());
                    } else if !self.seen_root {
                        return Err(SyntaxError::MissingRoot.into());
                    }
                    return Ok(());
                }
            }
        }
    }

    /// The innermost open element.
    fn context(&self) -> &'static str {
        self.stack.last().map_or(TAG_DOCUMENT, |frame| frame.into())
    }

    fn invalid(&self, element: &str) -> ParseError {
        self.invalid_in(element, self.context())
    }

    fn invalid_in(&self, element: &str, context: &str) -> ParseError {
        error!(target: "parser", "unexpected '{element}' inside '{context}'");
        ModelError::InvalidStructure {
            element: element.to_string(),
            context: context.to_string(),
        }
        .into()
    }

    /// The node of the innermost open element, if it is a state-like node.
    fn current_node(&self) -> ParseResult<NodeId> {
        self.stack
            .last()
            .and_then(Frame::node)
            .ok_or_else(|| self.invalid(self.context()))
    }

    /// The parent of a state-like node opening now (`None` for top-level nodes).
    fn parent_node(&self) -> Option<NodeId> {
        self.stack.last().and_then(Frame::node)
    }

    fn element_name(&self, tag: &BytesStart<'_>) -> ParseResult<(Option<String>, String)> {
        let (resolved, local) = self.reader.resolve_element(tag.name());
        let local = std::str::from_utf8(local.as_ref())?.to_owned();
        let namespace = match resolved {
            ResolveResult::Bound(namespace) => Some(std::str::from_utf8(namespace.as_ref())?.to_owned()),
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                return Err(SyntaxError::UnknownPrefix(String::from_utf8_lossy(&prefix).into_owned()).into());
            }
        };
        Ok((namespace, local))
    }

    fn is_core(&self, namespace: Option<&str>) -> bool {
        if self.bound {
            namespace == Some(SCXML_NS)
        } else {
            namespace.is_none()
        }
    }

    fn start(&mut self, tag: BytesStart<'a>, empty: bool) -> ParseResult<()> {
        let (namespace, local) = self.element_name(&tag)?;
        trace!(target: "parser", "'{local}' open tag");
        self.scopes.push(attributes::bindings(&tag)?);
        let depth = self.stack.len();

        if self.stack.is_empty() {
            if self.seen_root {
                return Err(SyntaxError::MultipleRoots.into());
            } else if local != TAG_SCXML {
                return Err(self.invalid(&local));
            }
            match namespace.as_deref() {
                Some(SCXML_NS) => self.bound = true,
                None => self.bound = false,
                Some(_) => return Err(self.invalid(&local)),
            }
            self.parse_scxml(&tag)?;
        } else if self.is_core(namespace.as_deref()) {
            self.core_element(&tag, &local, empty)?;
        } else if self.stack.last().is_some_and(Frame::is_executable) {
            self.parse_custom_action(&tag, namespace, local, empty)?;
        } else {
            return Err(self.invalid(&local));
        }

        if self.stack.len() > depth {
            if empty {
                self.close()?;
            }
        } else {
            // The element has been consumed entirely
            self.scopes.pop();
        }
        Ok(())
    }

    fn core_element(&mut self, tag: &BytesStart<'a>, local: &str, empty: bool) -> ParseResult<()> {
        match local {
            TAG_STATE | TAG_PARALLEL | TAG_FINAL
                if matches!(
                    self.stack.last(),
                    Some(Frame::Scxml | Frame::State(_) | Frame::Parallel(_))
                ) =>
            {
                self.parse_node(tag, local)
            }
            TAG_HISTORY
                if matches!(
                    self.stack.last(),
                    Some(Frame::State(_) | Frame::Parallel(_) | Frame::Final(_))
                ) =>
            {
                self.parse_history(tag)
            }
            TAG_INITIAL if matches!(self.stack.last(), Some(Frame::State(_))) => {
                self.attrs(tag, TAG_INITIAL, &[], &[])?;
                let state = self.current_node()?;
                self.stack.push(Frame::Initial(state, None));
                Ok(())
            }
            TAG_TRANSITION
                if matches!(
                    self.stack.last(),
                    Some(
                        Frame::State(_)
                            | Frame::Parallel(_)
                            | Frame::Final(_)
                            | Frame::History(_)
                            | Frame::Initial(..)
                    )
                ) =>
            {
                self.parse_transition(tag)
            }
            TAG_ONENTRY | TAG_ONEXIT
                if matches!(
                    self.stack.last(),
                    Some(Frame::State(_) | Frame::Parallel(_) | Frame::Final(_))
                ) =>
            {
                self.attrs(tag, local, &[], &[])?;
                self.stack.push(if local == TAG_ONENTRY {
                    Frame::OnEntry(Vec::new())
                } else {
                    Frame::OnExit(Vec::new())
                });
                Ok(())
            }
            TAG_DATAMODEL
                if matches!(
                    self.stack.last(),
                    Some(Frame::Scxml | Frame::State(_) | Frame::Parallel(_))
                ) =>
            {
                self.attrs(tag, TAG_DATAMODEL, &[], &[])?;
                let owner = self.parent_node();
                self.stack.push(Frame::Datamodel(owner, Vec::new()));
                Ok(())
            }
            TAG_DATA if matches!(self.stack.last(), Some(Frame::Datamodel(..))) => {
                let data = self.parse_data(tag, empty)?;
                if let Some(Frame::Datamodel(_, datamodel)) = self.stack.last_mut() {
                    datamodel.push(data);
                }
                Ok(())
            }
            TAG_SCRIPT if matches!(self.stack.last(), Some(Frame::Scxml)) => {
                let script = self.parse_script(tag, empty)?;
                self.builder.set_script(script)?;
                Ok(())
            }
            TAG_INVOKE
                if matches!(self.stack.last(), Some(Frame::State(_) | Frame::Parallel(_))) =>
            {
                self.parse_invoke(tag)
            }
            TAG_FINALIZE if matches!(self.stack.last(), Some(Frame::Invoke(..))) => {
                self.attrs(tag, TAG_FINALIZE, &[], &[])?;
                if let Some(Frame::Invoke(_, true)) = self.stack.last() {
                    return Err(ModelError::DuplicateElement {
                        element: TAG_FINALIZE.to_string(),
                        context: TAG_INVOKE.to_string(),
                    }
                    .into());
                }
                self.stack.push(Frame::Finalize(Vec::new()));
                Ok(())
            }
            TAG_DONEDATA if matches!(self.stack.last(), Some(Frame::Final(_))) => {
                self.attrs(tag, TAG_DONEDATA, &[], &[])?;
                self.stack.push(Frame::DoneData(DoneData::default()));
                Ok(())
            }
            TAG_PARAM
                if matches!(
                    self.stack.last(),
                    Some(Frame::Send(_) | Frame::Invoke(..) | Frame::DoneData(_))
                ) =>
            {
                let param = self.parse_param(tag, empty)?;
                match self.stack.last_mut() {
                    Some(Frame::Send(send)) => send.params.push(param),
                    Some(Frame::Invoke(invoke, _)) => invoke.params.push(param),
                    Some(Frame::DoneData(done_data)) => done_data.params.push(param),
                    _ => {}
                }
                Ok(())
            }
            TAG_CONTENT
                if matches!(
                    self.stack.last(),
                    Some(Frame::Send(_) | Frame::Invoke(..) | Frame::DoneData(_))
                ) =>
            {
                let content = self.parse_content(tag, empty)?;
                let context = self.context();
                let slot = match self.stack.last_mut() {
                    Some(Frame::Send(send)) => &mut send.content,
                    Some(Frame::Invoke(invoke, _)) => &mut invoke.content,
                    Some(Frame::DoneData(done_data)) => &mut done_data.content,
                    _ => return Err(self.invalid(TAG_CONTENT)),
                };
                if slot.is_some() {
                    error!(target: "parser", "repeated 'content' inside '{context}'");
                    return Err(ModelError::DuplicateElement {
                        element: TAG_CONTENT.to_string(),
                        context: context.to_string(),
                    }
                    .into());
                }
                *slot = Some(content);
                Ok(())
            }
            _ if self.stack.last().is_some_and(Frame::is_executable) => {
                self.parse_action(tag, local, empty)
            }
            _ => Err(self.invalid(local)),
        }
    }

    fn close(&mut self) -> ParseResult<()> {
        self.scopes.pop();
        // Unmatched end tags are rejected by the XML reader itself
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        match frame {
            Frame::Scxml
            | Frame::State(_)
            | Frame::Parallel(_)
            | Frame::Final(_)
            | Frame::History(_) => {}
            Frame::Initial(state, transition) => {
                let transition = transition.ok_or_else(|| ModelError::MissingElement {
                    element: TAG_TRANSITION.to_string(),
                    context: TAG_INITIAL.to_string(),
                })?;
                self.builder
                    .set_state_initial(state, Initial::Element(transition))?;
            }
            Frame::Datamodel(None, data) => self.builder.set_datamodel(data)?,
            Frame::Datamodel(Some(node), data) => self.builder.set_node_datamodel(node, data)?,
            Frame::Transition(transition) => match self.stack.last_mut() {
                Some(Frame::Initial(_, slot)) => {
                    if slot.is_some() {
                        return Err(ModelError::DuplicateElement {
                            element: TAG_TRANSITION.to_string(),
                            context: TAG_INITIAL.to_string(),
                        }
                        .into());
                    }
                    *slot = Some(transition);
                }
                _ => {
                    let node = self.current_node()?;
                    self.builder.add_transition(node, transition)?;
                }
            },
            Frame::OnEntry(actions) => {
                let node = self.current_node()?;
                self.builder.add_on_entry(node, actions)?;
            }
            Frame::OnExit(actions) => {
                let node = self.current_node()?;
                self.builder.add_on_exit(node, actions)?;
            }
            Frame::If(r#if) => self.push_action(Executable::If(r#if))?,
            Frame::Foreach(foreach) => self.push_action(Executable::Foreach(foreach))?,
            Frame::Send(send) => self.push_action(Executable::Send(send))?,
            Frame::Invoke(invoke, _) => {
                let node = self.current_node()?;
                self.builder.add_invoke(node, invoke)?;
            }
            Frame::Finalize(actions) => {
                if let Some(Frame::Invoke(invoke, finalized)) = self.stack.last_mut() {
                    invoke.finalize = actions;
                    *finalized = true;
                }
            }
            Frame::DoneData(done_data) => {
                let node = self.current_node()?;
                self.builder.set_done_data(node, done_data)?;
            }
        }
        Ok(())
    }

    fn parse_scxml(&mut self, tag: &BytesStart<'a>) -> ParseResult<()> {
        let mut attrs = self.attrs(
            tag,
            TAG_SCXML,
            &[],
            &[ATTR_NAME, ATTR_VERSION, ATTR_INITIAL, ATTR_DATAMODEL, ATTR_BINDING],
        )?;
        if let Some(name) = attrs.remove(ATTR_NAME) {
            self.builder.set_name(name);
        }
        if let Some(version) = attrs.remove(ATTR_VERSION) {
            self.builder.set_version(version);
        }
        if let Some(initial) = attrs.remove(ATTR_INITIAL) {
            self.builder.set_initial(tokens(&initial));
        }
        if let Some(datamodel) = attrs.remove(ATTR_DATAMODEL) {
            self.builder.set_datamodel_lang(datamodel);
        }
        if let Some(binding) = enumerated(
            TAG_SCXML,
            ATTR_BINDING,
            attrs.remove(ATTR_BINDING),
            &[(VAL_EARLY, Binding::Early), (VAL_LATE, Binding::Late)],
        )? {
            self.builder.set_binding(binding);
        }
        let prefix = tag
            .name()
            .prefix()
            .map(|prefix| std::str::from_utf8(prefix.as_ref()).map(str::to_owned))
            .transpose()?;
        self.builder.set_prefix(prefix);
        self.builder
            .set_namespaces(self.scopes.last().cloned().unwrap_or_default());
        self.seen_root = true;
        self.stack.push(Frame::Scxml);
        Ok(())
    }

    fn parse_node(&mut self, tag: &BytesStart<'a>, local: &str) -> ParseResult<()> {
        let parent = self.parent_node();
        let frame = match local {
            TAG_STATE => {
                let mut attrs = self.attrs(tag, TAG_STATE, &[], &[ATTR_ID, ATTR_INITIAL])?;
                let state = self.builder.add_state(parent, attrs.remove(ATTR_ID))?;
                let initial = attrs.remove(ATTR_INITIAL).map(|initial| tokens(&initial));
                if let Some(initial) = initial.filter(|initial| !initial.is_empty()) {
                    self.builder
                        .set_state_initial(state, Initial::Attribute(initial))?;
                }
                Frame::State(state)
            }
            TAG_PARALLEL => {
                let mut attrs = self.attrs(tag, TAG_PARALLEL, &[], &[ATTR_ID])?;
                Frame::Parallel(self.builder.add_parallel(parent, attrs.remove(ATTR_ID))?)
            }
            _ => {
                let mut attrs = self.attrs(tag, TAG_FINAL, &[], &[ATTR_ID])?;
                Frame::Final(self.builder.add_final(parent, attrs.remove(ATTR_ID))?)
            }
        };
        self.stack.push(frame);
        Ok(())
    }

    fn parse_history(&mut self, tag: &BytesStart<'a>) -> ParseResult<()> {
        let mut attrs = self.attrs(tag, TAG_HISTORY, &[], &[ATTR_ID, ATTR_TYPE])?;
        let r#type = enumerated(
            TAG_HISTORY,
            ATTR_TYPE,
            attrs.remove(ATTR_TYPE),
            &[(VAL_SHALLOW, HistoryType::Shallow), (VAL_DEEP, HistoryType::Deep)],
        )?
        .unwrap_or_default();
        let parent = self.current_node()?;
        let history = self
            .builder
            .add_history(parent, attrs.remove(ATTR_ID), r#type)?;
        self.stack.push(Frame::History(history));
        Ok(())
    }

    fn parse_transition(&mut self, tag: &BytesStart<'a>) -> ParseResult<()> {
        if let Some(frame @ (Frame::Parallel(_) | Frame::Final(_))) = self.stack.last() {
            let context: &str = frame.into();
            error!(target: "parser", "'{context}' cannot have transitions");
            return Err(ModelError::InvalidStructure {
                element: TAG_TRANSITION.to_string(),
                context: context.to_string(),
            }
            .into());
        }
        let mut attrs = self.attrs(
            tag,
            TAG_TRANSITION,
            &[],
            &[ATTR_EVENT, ATTR_COND, ATTR_TARGET, ATTR_TYPE],
        )?;
        let r#type = enumerated(
            TAG_TRANSITION,
            ATTR_TYPE,
            attrs.remove(ATTR_TYPE),
            &[
                (VAL_EXTERNAL, TransitionType::External),
                (VAL_INTERNAL, TransitionType::Internal),
            ],
        )?
        .unwrap_or_default();
        let transition = Transition::new()
            .with_events(attrs.remove(ATTR_EVENT).as_deref().map(tokens).unwrap_or_default())
            .with_targets(attrs.remove(ATTR_TARGET).as_deref().map(tokens).unwrap_or_default())
            .with_cond(attrs.remove(ATTR_COND))
            .with_type(r#type);
        self.stack.push(Frame::Transition(transition));
        Ok(())
    }

    fn parse_data(&mut self, tag: &BytesStart<'a>, empty: bool) -> ParseResult<Data> {
        let mut attrs = self.attrs(tag, TAG_DATA, &[ATTR_ID], &[ATTR_SRC, ATTR_EXPR])?;
        let mut data = Data::new(attrs.remove(ATTR_ID).unwrap_or_default());
        data.src = attrs.remove(ATTR_SRC);
        data.expr = attrs.remove(ATTR_EXPR);
        exclusive(
            TAG_DATA,
            (ATTR_SRC, data.src.is_some()),
            (ATTR_EXPR, data.expr.is_some()),
        )?;
        if !empty {
            data.content = self.markup()?;
        }
        let source = if data.src.is_some() { ATTR_SRC } else { ATTR_EXPR };
        exclusive(
            TAG_DATA,
            (source, data.src.is_some() || data.expr.is_some()),
            (TAG_CONTENT, data.content.is_some()),
        )?;
        Ok(data)
    }

    fn parse_invoke(&mut self, tag: &BytesStart<'a>) -> ParseResult<()> {
        let mut attrs = self.attrs(
            tag,
            TAG_INVOKE,
            &[],
            &[
                ATTR_TYPE,
                ATTR_TYPEEXPR,
                ATTR_SRC,
                ATTR_SRCEXPR,
                ATTR_ID,
                ATTR_IDLOCATION,
                ATTR_NAMELIST,
                ATTR_AUTOFORWARD,
            ],
        )?;
        let invoke = Invoke {
            r#type: attributes::value(&mut attrs, TAG_INVOKE, ATTR_TYPE, ATTR_TYPEEXPR)?,
            src: attributes::value(&mut attrs, TAG_INVOKE, ATTR_SRC, ATTR_SRCEXPR)?,
            id: attrs.remove(ATTR_ID),
            id_location: attrs.remove(ATTR_IDLOCATION),
            namelist: attrs
                .remove(ATTR_NAMELIST)
                .as_deref()
                .map(tokens)
                .unwrap_or_default(),
            autoforward: enumerated(
                TAG_INVOKE,
                ATTR_AUTOFORWARD,
                attrs.remove(ATTR_AUTOFORWARD),
                &[(VAL_TRUE, true), (VAL_FALSE, false)],
            )?
            .unwrap_or_default(),
            ..Default::default()
        };
        exclusive(
            TAG_INVOKE,
            (ATTR_ID, invoke.id.is_some()),
            (ATTR_IDLOCATION, invoke.id_location.is_some()),
        )?;
        self.stack.push(Frame::Invoke(invoke, false));
        Ok(())
    }

    fn parse_param(&mut self, tag: &BytesStart<'a>, empty: bool) -> ParseResult<Param> {
        let mut attrs = self.attrs(tag, TAG_PARAM, &[ATTR_NAME], &[ATTR_EXPR, ATTR_LOCATION])?;
        let param = Param {
            name: attrs.remove(ATTR_NAME).unwrap_or_default(),
            expr: attrs.remove(ATTR_EXPR),
            location: attrs.remove(ATTR_LOCATION),
        };
        exclusive(
            TAG_PARAM,
            (ATTR_EXPR, param.expr.is_some()),
            (ATTR_LOCATION, param.location.is_some()),
        )?;
        if !empty {
            self.expect_end(TAG_PARAM)?;
        }
        Ok(param)
    }

    fn parse_content(&mut self, tag: &BytesStart<'a>, empty: bool) -> ParseResult<Content> {
        let mut attrs = self.attrs(tag, TAG_CONTENT, &[], &[ATTR_EXPR])?;
        let expr = attrs.remove(ATTR_EXPR);
        let body = if empty { None } else { self.markup()? };
        exclusive(
            TAG_CONTENT,
            (ATTR_EXPR, expr.is_some()),
            (TAG_TEXT, body.is_some()),
        )?;
        Ok(Content { expr, body })
    }
}

/// Checks that the whole source is well-formed, namespace-aware XML,
/// with no regard to what the elements mean.
/// On error, returns the byte offset of the malformed markup as well.
fn check_syntax(source: &[u8]) -> Result<(), (u64, SyntaxError)> {
    let mut reader = NsReader::from_reader(source);
    let mut depth = 0usize;
    let mut seen_root = false;
    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|err| (reader.error_position(), SyntaxError::Xml(err)))?;
        match event {
            Event::Start(ref tag) | Event::Empty(ref tag) => {
                if depth == 0 && seen_root {
                    return Err((position, SyntaxError::MultipleRoots));
                }
                seen_root = true;
                check_names(&reader, tag).map_err(|err| (position, err))?;
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            // End names are checked by the reader itself
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(ref text) if depth == 0 && !capture::is_blank(text) => {
                return Err((position, SyntaxError::TextOutsideRoot));
            }
            Event::CData(_) if depth == 0 => {
                return Err((position, SyntaxError::TextOutsideRoot));
            }
            Event::Eof if depth > 0 => return Err((position, SyntaxError::UnclosedTags)),
            Event::Eof if !seen_root => return Err((position, SyntaxError::MissingRoot)),
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

/// Checks that the prefixes of the element and of its attributes are declared,
/// and that its attributes are well-formed.
fn check_names(reader: &NsReader<&[u8]>, tag: &BytesStart<'_>) -> Result<(), SyntaxError> {
    if let (ResolveResult::Unknown(prefix), _) = reader.resolve_element(tag.name()) {
        return Err(SyntaxError::UnknownPrefix(String::from_utf8_lossy(&prefix).into_owned()));
    }
    for attr in tag.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        attr.unescape_value()?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        if let (ResolveResult::Unknown(prefix), _) = reader.resolve_attribute(attr.key) {
            return Err(SyntaxError::UnknownPrefix(String::from_utf8_lossy(&prefix).into_owned()));
        }
    }
    Ok(())
}
