//! Serializer of SCXML documents.
//!
//! The writer walks the model in document order and emits one element per node.
//! Attributes holding their default value are omitted,
//! and foreign content is played back verbatim, as it was captured from the source.

use crate::vocabulary::*;
use log::{info, trace};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use scxmlio_core::{
    lookup_binding, Binding, Content, CustomAction, Data, Document, DoneData, Executable,
    ForeignNode, HistoryType, Initial, Invoke, Markup, Node, NodeId, NsBinding, Param, Script,
    Send, Transition, TransitionType, Value,
};
use std::io::Write;
use thiserror::Error;

/// The error type for writing a [`Document`]:
/// the model itself can always be serialized, so only the sink can fail.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The sink failed.
    #[error("could not write to sink")]
    Io(#[from] std::io::Error),
    /// The XML writer failed.
    #[error("could not write XML")]
    Xml(#[from] quick_xml::Error),
}

/// Configuration of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Number of spaces per indentation level, or `None` to write everything on one line.
    pub indent: Option<usize>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { indent: Some(2) }
    }
}

/// Writes the document into a new buffer, with the default [`WriterConfig`].
pub fn write(document: &Document) -> Result<Vec<u8>, WriteError> {
    let mut buffer = Vec::new();
    write_to(document, &mut buffer)?;
    Ok(buffer)
}

/// Writes the document into the given sink, with the default [`WriterConfig`].
pub fn write_to<W: Write>(document: &Document, sink: W) -> Result<(), WriteError> {
    write_with(document, sink, &WriterConfig::default())
}

/// Writes the document into the given sink, with the given [`WriterConfig`].
pub fn write_with<W: Write>(
    document: &Document,
    sink: W,
    config: &WriterConfig,
) -> Result<(), WriteError> {
    info!(target: "writer", "writing document with {} nodes", document.len());
    let writer = match config.indent {
        Some(indent) => Writer::new_with_indent(sink, b' ', indent),
        None => Writer::new(sink),
    };
    let mut printer = Printer { writer, document };
    printer.write_document()?;
    info!(target: "writer", "document written");
    Ok(())
}

struct Printer<'a, W: Write> {
    writer: Writer<W>,
    document: &'a Document,
}

/// A pending step of the traversal.
enum Item<'a> {
    Node(NodeId),
    Transition(&'a Transition),
    Invoke(&'a Invoke),
    DoneData(&'a DoneData),
    /// An element holding executable content.
    Block(&'static str, &'a [Executable]),
    Action(&'a Executable),
    /// `<elseif>` with its condition, or `<else>`.
    Branch(Option<&'a str>),
    Close(&'static str),
}

impl<'a, W: Write> Printer<'a, W> {
    /// Qualified name of an SCXML element.
    fn name(&self, tag: &str) -> String {
        match self.document.prefix() {
            Some(prefix) => format!("{prefix}:{tag}"),
            None => tag.to_string(),
        }
    }

    fn start(&self, tag: &str) -> BytesStart<'static> {
        BytesStart::new(self.name(tag))
    }

    fn open(&mut self, start: BytesStart<'_>) -> Result<(), WriteError> {
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, tag: &str) -> Result<(), WriteError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(self.name(tag))))?;
        Ok(())
    }

    fn empty(&mut self, start: BytesStart<'_>) -> Result<(), WriteError> {
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    fn raw(&mut self, raw: &str) -> Result<(), WriteError> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(raw)))?;
        Ok(())
    }

    fn write_document(&mut self) -> Result<(), WriteError> {
        let document = self.document;
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut start = self.start(TAG_SCXML);
        push_bindings(&mut start, document.namespaces());
        start.push_attribute((ATTR_VERSION, document.version()));
        push_list(&mut start, ATTR_INITIAL, document.initial());
        push_opt(&mut start, ATTR_NAME, document.name());
        push_opt(&mut start, ATTR_DATAMODEL, document.datamodel_lang());
        if let Some(binding) = document.binding() {
            start.push_attribute((
                ATTR_BINDING,
                match binding {
                    Binding::Early => VAL_EARLY,
                    Binding::Late => VAL_LATE,
                },
            ));
        }
        if document.datamodel().is_none()
            && document.script().is_none()
            && document.roots().is_empty()
        {
            return self.empty(start);
        }
        self.open(start)?;
        if let Some(datamodel) = document.datamodel() {
            self.write_datamodel(datamodel)?;
        }
        if let Some(script) = document.script() {
            self.write_script(script)?;
        }
        let mut items: Vec<Item<'a>> = document
            .roots()
            .iter()
            .map(|root| Item::Node(*root))
            .collect();
        items.push(Item::Close(TAG_SCXML));
        self.write_items(items)
    }

    /// Writes the items in document order.
    /// Nested elements are kept on an explicit stack, so deep documents do not exhaust the call stack.
    fn write_items(&mut self, items: Vec<Item<'a>>) -> Result<(), WriteError> {
        let mut stack = items;
        stack.reverse();
        while let Some(item) = stack.pop() {
            let nested = self.write_item(item)?;
            stack.extend(nested.into_iter().rev());
        }
        Ok(())
    }

    /// Writes the opening of the item and returns what is left of it, in document order.
    fn write_item(&mut self, item: Item<'a>) -> Result<Vec<Item<'a>>, WriteError> {
        match item {
            Item::Node(id) => self.write_node(id),
            Item::Transition(transition) => self.write_transition(transition),
            Item::Invoke(invoke) => self.write_invoke(invoke),
            Item::DoneData(done_data) => {
                self.write_done_data(done_data)?;
                Ok(Vec::new())
            }
            Item::Block(tag, actions) => {
                let start = self.start(tag);
                self.write_block_with(start, tag, actions)
            }
            Item::Action(action) => self.write_action(action),
            Item::Branch(Some(cond)) => {
                let mut start = self.start(TAG_ELSEIF);
                start.push_attribute((ATTR_COND, cond));
                self.empty(start)?;
                Ok(Vec::new())
            }
            Item::Branch(None) => {
                self.empty(self.start(TAG_ELSE))?;
                Ok(Vec::new())
            }
            Item::Close(tag) => {
                self.close(tag)?;
                Ok(Vec::new())
            }
        }
    }

    fn write_node(&mut self, id: NodeId) -> Result<Vec<Item<'a>>, WriteError> {
        let document = self.document;
        let node = &document[id];
        trace!(target: "writer", "writing {} '{}'", node.kind(), node.id().unwrap_or_default());
        let mut items = Vec::new();
        match node {
            Node::State(state) => {
                let mut start = self.start(TAG_STATE);
                push_opt(&mut start, ATTR_ID, node.id());
                if let Some(Initial::Attribute(initial)) = state.initial() {
                    push_list(&mut start, ATTR_INITIAL, initial);
                }
                let initial = match state.initial() {
                    Some(Initial::Element(transition)) => Some(transition),
                    _ => None,
                };
                if initial.is_none() && is_bare(node) {
                    self.empty(start)?;
                    return Ok(items);
                }
                self.open(start)?;
                if let Some(datamodel) = node.datamodel() {
                    self.write_datamodel(datamodel)?;
                }
                if let Some(transition) = initial {
                    self.open(self.start(TAG_INITIAL))?;
                    items.extend([Item::Transition(transition), Item::Close(TAG_INITIAL)]);
                }
                items.extend(blocks(node));
                items.extend(node.transitions().iter().map(Item::Transition));
                items.extend(node.children().iter().map(|child| Item::Node(*child)));
                items.push(Item::Close(TAG_STATE));
            }
            Node::Parallel(_) => {
                let mut start = self.start(TAG_PARALLEL);
                push_opt(&mut start, ATTR_ID, node.id());
                if is_bare(node) {
                    self.empty(start)?;
                    return Ok(items);
                }
                self.open(start)?;
                if let Some(datamodel) = node.datamodel() {
                    self.write_datamodel(datamodel)?;
                }
                items.extend(blocks(node));
                items.extend(node.children().iter().map(|child| Item::Node(*child)));
                items.push(Item::Close(TAG_PARALLEL));
            }
            Node::Final(r#final) => {
                let mut start = self.start(TAG_FINAL);
                push_opt(&mut start, ATTR_ID, node.id());
                if r#final.done_data().is_none() && is_bare(node) {
                    self.empty(start)?;
                    return Ok(items);
                }
                self.open(start)?;
                items.extend(blocks(node));
                items.extend(r#final.done_data().map(Item::DoneData));
                items.push(Item::Close(TAG_FINAL));
            }
            Node::History(history) => {
                let mut start = self.start(TAG_HISTORY);
                push_opt(&mut start, ATTR_ID, node.id());
                if history.r#type() == HistoryType::Deep {
                    start.push_attribute((ATTR_TYPE, VAL_DEEP));
                }
                let Some(transition) = history.default_transition() else {
                    self.empty(start)?;
                    return Ok(items);
                };
                self.open(start)?;
                items.extend([Item::Transition(transition), Item::Close(TAG_HISTORY)]);
            }
        }
        Ok(items)
    }

    fn write_transition(
        &mut self,
        transition: &'a Transition,
    ) -> Result<Vec<Item<'a>>, WriteError> {
        let mut start = self.start(TAG_TRANSITION);
        push_list(&mut start, ATTR_EVENT, transition.events());
        push_opt(&mut start, ATTR_COND, transition.cond());
        push_list(&mut start, ATTR_TARGET, transition.targets());
        if transition.r#type() == TransitionType::Internal {
            start.push_attribute((ATTR_TYPE, VAL_INTERNAL));
        }
        self.write_block_with(start, TAG_TRANSITION, transition.actions())
    }

    /// Writes the start of an element holding executable content,
    /// or the whole element if it has none.
    fn write_block_with(
        &mut self,
        start: BytesStart<'_>,
        tag: &'static str,
        actions: &'a [Executable],
    ) -> Result<Vec<Item<'a>>, WriteError> {
        if actions.is_empty() {
            self.empty(start)?;
            return Ok(Vec::new());
        }
        self.open(start)?;
        Ok(actions
            .iter()
            .map(Item::Action)
            .chain([Item::Close(tag)])
            .collect())
    }

    fn write_datamodel(&mut self, datamodel: &[Data]) -> Result<(), WriteError> {
        let start = self.start(TAG_DATAMODEL);
        if datamodel.is_empty() {
            return self.empty(start);
        }
        self.open(start)?;
        for data in datamodel {
            let mut start = self.start(TAG_DATA);
            start.push_attribute((ATTR_ID, data.id.as_str()));
            push_opt(&mut start, ATTR_SRC, data.src.as_deref());
            push_opt(&mut start, ATTR_EXPR, data.expr.as_deref());
            self.write_markup(start, TAG_DATA, data.content.as_ref())?;
        }
        self.close(TAG_DATAMODEL)
    }

    fn write_script(&mut self, script: &Script) -> Result<(), WriteError> {
        let mut start = self.start(TAG_SCRIPT);
        push_opt(&mut start, ATTR_SRC, script.src.as_deref());
        if script.body.is_empty() {
            return self.empty(start);
        }
        self.open(start)?;
        self.writer
            .write_event(Event::Text(BytesText::new(&script.body)))?;
        self.close(TAG_SCRIPT)
    }

    /// Writes an element holding inline foreign content.
    fn write_markup(
        &mut self,
        mut start: BytesStart<'_>,
        tag: &str,
        markup: Option<&Markup>,
    ) -> Result<(), WriteError> {
        let Some(markup) = markup else {
            return self.empty(start);
        };
        push_bindings(&mut start, &markup.namespaces);
        self.open(start)?;
        self.write_foreign(&markup.nodes)?;
        self.close(tag)
    }

    fn write_foreign(&mut self, nodes: &[ForeignNode]) -> Result<(), WriteError> {
        for node in nodes {
            self.raw(node.raw())?;
        }
        Ok(())
    }

    /// Writes the action, or the start of it if it nests further actions.
    fn write_action(&mut self, action: &'a Executable) -> Result<Vec<Item<'a>>, WriteError> {
        match action {
            Executable::If(r#if) => {
                let mut branches = r#if.branches.iter();
                let mut start = self.start(TAG_IF);
                let mut items = Vec::new();
                if let Some(first) = branches.next() {
                    start.push_attribute((ATTR_COND, first.cond.as_str()));
                    items.extend(first.actions.iter().map(Item::Action));
                }
                self.open(start)?;
                for branch in branches {
                    items.push(Item::Branch(Some(branch.cond.as_str())));
                    items.extend(branch.actions.iter().map(Item::Action));
                }
                if let Some(r#else) = &r#if.r#else {
                    items.push(Item::Branch(None));
                    items.extend(r#else.iter().map(Item::Action));
                }
                items.push(Item::Close(TAG_IF));
                return Ok(items);
            }
            Executable::Foreach(foreach) => {
                let mut start = self.start(TAG_FOREACH);
                start.push_attribute((ATTR_ARRAY, foreach.array.as_str()));
                start.push_attribute((ATTR_ITEM, foreach.item.as_str()));
                push_opt(&mut start, ATTR_INDEX, foreach.index.as_deref());
                return self.write_block_with(start, TAG_FOREACH, &foreach.actions);
            }
            Executable::Raise(raise) => {
                let mut start = self.start(TAG_RAISE);
                start.push_attribute((ATTR_EVENT, raise.event.as_str()));
                self.empty(start)?;
            }
            Executable::Log(log) => {
                let mut start = self.start(TAG_LOG);
                push_opt(&mut start, ATTR_LABEL, log.label.as_deref());
                push_opt(&mut start, ATTR_EXPR, log.expr.as_deref());
                self.empty(start)?;
            }
            Executable::Assign(assign) => {
                let mut start = self.start(TAG_ASSIGN);
                start.push_attribute((ATTR_LOCATION, assign.location.as_str()));
                push_opt(&mut start, ATTR_EXPR, assign.expr.as_deref());
                self.write_markup(start, TAG_ASSIGN, assign.content.as_ref())?;
            }
            Executable::Var(var) => {
                let mut start = self.start(TAG_VAR);
                start.push_attribute((ATTR_NAME, var.name.as_str()));
                push_opt(&mut start, ATTR_EXPR, var.expr.as_deref());
                self.empty(start)?;
            }
            Executable::Script(script) => self.write_script(script)?,
            Executable::Send(send) => self.write_send(send)?,
            Executable::Cancel(cancel) => {
                let mut start = self.start(TAG_CANCEL);
                push_value(
                    &mut start,
                    ATTR_SENDID,
                    ATTR_SENDIDEXPR,
                    Some(&cancel.send_id),
                );
                self.empty(start)?;
            }
            Executable::Custom(action) => self.write_custom_action(action)?,
        }
        Ok(Vec::new())
    }

    fn write_send(&mut self, send: &Send) -> Result<(), WriteError> {
        let mut start = self.start(TAG_SEND);
        push_opt(&mut start, ATTR_ID, send.id.as_deref());
        push_opt(&mut start, ATTR_IDLOCATION, send.id_location.as_deref());
        push_value(&mut start, ATTR_EVENT, ATTR_EVENTEXPR, send.event.as_ref());
        push_value(&mut start, ATTR_TARGET, ATTR_TARGETEXPR, send.target.as_ref());
        push_value(&mut start, ATTR_TYPE, ATTR_TYPEEXPR, send.r#type.as_ref());
        push_value(&mut start, ATTR_DELAY, ATTR_DELAYEXPR, send.delay.as_ref());
        push_list(&mut start, ATTR_NAMELIST, &send.namelist);
        push_opt(&mut start, ATTR_HINTS, send.hints.as_deref());
        if send.params.is_empty() && send.content.is_none() {
            return self.empty(start);
        }
        self.open(start)?;
        self.write_params(&send.params)?;
        if let Some(content) = &send.content {
            self.write_content(content)?;
        }
        self.close(TAG_SEND)
    }

    fn write_invoke(&mut self, invoke: &'a Invoke) -> Result<Vec<Item<'a>>, WriteError> {
        let mut start = self.start(TAG_INVOKE);
        push_value(&mut start, ATTR_TYPE, ATTR_TYPEEXPR, invoke.r#type.as_ref());
        push_value(&mut start, ATTR_SRC, ATTR_SRCEXPR, invoke.src.as_ref());
        push_opt(&mut start, ATTR_ID, invoke.id.as_deref());
        push_opt(&mut start, ATTR_IDLOCATION, invoke.id_location.as_deref());
        push_list(&mut start, ATTR_NAMELIST, &invoke.namelist);
        if invoke.autoforward {
            start.push_attribute((ATTR_AUTOFORWARD, VAL_TRUE));
        }
        if invoke.params.is_empty() && invoke.content.is_none() && invoke.finalize.is_empty() {
            self.empty(start)?;
            return Ok(Vec::new());
        }
        self.open(start)?;
        self.write_params(&invoke.params)?;
        if let Some(content) = &invoke.content {
            self.write_content(content)?;
        }
        let mut items = Vec::new();
        if !invoke.finalize.is_empty() {
            items.push(Item::Block(TAG_FINALIZE, &invoke.finalize));
        }
        items.push(Item::Close(TAG_INVOKE));
        Ok(items)
    }

    fn write_done_data(&mut self, done_data: &DoneData) -> Result<(), WriteError> {
        let start = self.start(TAG_DONEDATA);
        if done_data.params.is_empty() && done_data.content.is_none() {
            return self.empty(start);
        }
        self.open(start)?;
        if let Some(content) = &done_data.content {
            self.write_content(content)?;
        }
        self.write_params(&done_data.params)?;
        self.close(TAG_DONEDATA)
    }

    fn write_params(&mut self, params: &[Param]) -> Result<(), WriteError> {
        for param in params {
            let mut start = self.start(TAG_PARAM);
            start.push_attribute((ATTR_NAME, param.name.as_str()));
            push_opt(&mut start, ATTR_EXPR, param.expr.as_deref());
            push_opt(&mut start, ATTR_LOCATION, param.location.as_deref());
            self.empty(start)?;
        }
        Ok(())
    }

    fn write_content(&mut self, content: &Content) -> Result<(), WriteError> {
        let mut start = self.start(TAG_CONTENT);
        push_opt(&mut start, ATTR_EXPR, content.expr.as_deref());
        self.write_markup(start, TAG_CONTENT, content.body.as_ref())
    }

    /// Writes a custom action as its original element, followed by its captured content.
    /// The implementation takes no part in it.
    fn write_custom_action(&mut self, action: &CustomAction) -> Result<(), WriteError> {
        let name = action.qualified_name();
        let mut start = BytesStart::new(name.as_str());
        push_bindings(&mut start, action.namespaces());
        // Declare the namespace of the element if it would not be in scope otherwise
        let resolved = lookup_binding(action.namespaces(), action.prefix())
            .or_else(|| lookup_binding(self.document.namespaces(), action.prefix()))
            .unwrap_or_default();
        if resolved != action.namespace() {
            let binding = NsBinding::new(action.prefix(), action.namespace());
            start.push_attribute((binding.attribute_name().as_str(), binding.uri.as_str()));
        }
        for (key, value) in action.attributes() {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if action.content().is_empty() {
            return self.empty(start);
        }
        self.open(start)?;
        self.write_foreign(action.content())?;
        self.writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))?;
        Ok(())
    }
}

/// Whether the node has no content at all.
fn is_bare(node: &Node) -> bool {
    node.datamodel().is_none()
        && node.on_entry().is_empty()
        && node.on_exit().is_empty()
        && node.invokes().is_empty()
        && node.transitions().is_empty()
        && node.children().is_empty()
}

/// The `<onentry>`, `<onexit>` and `<invoke>` elements of the node.
fn blocks(node: &Node) -> Vec<Item<'_>> {
    let mut items: Vec<Item<'_>> = node
        .on_entry()
        .iter()
        .map(|actions| Item::Block(TAG_ONENTRY, actions))
        .collect();
    items.extend(node.on_exit().iter().map(|actions| Item::Block(TAG_ONEXIT, actions)));
    items.extend(node.invokes().iter().map(Item::Invoke));
    items
}

fn push_bindings(start: &mut BytesStart<'_>, bindings: &[NsBinding]) {
    for binding in bindings {
        start.push_attribute((binding.attribute_name().as_str(), binding.uri.as_str()));
    }
}

fn push_opt(start: &mut BytesStart<'_>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        start.push_attribute((key, value));
    }
}

fn push_list(start: &mut BytesStart<'_>, key: &str, values: &[String]) {
    if !values.is_empty() {
        start.push_attribute((key, values.join(" ").as_str()));
    }
}

fn push_value(start: &mut BytesStart<'_>, literal: &str, expr: &str, value: Option<&Value>) {
    match value {
        Some(Value::Literal(value)) => start.push_attribute((literal, value.as_str())),
        Some(Value::Expr(value)) => start.push_attribute((expr, value.as_str())),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scxmlio_core::{DocumentBuilder, Raise};

    fn to_string(document: &Document, indent: Option<usize>) -> String {
        let mut buffer = Vec::new();
        write_with(document, &mut buffer, &WriterConfig { indent }).expect("write to buffer");
        String::from_utf8(buffer).expect("UTF-8 output")
    }

    #[test]
    fn defaults_are_omitted() {
        let mut builder = DocumentBuilder::new();
        let state = builder.add_state(None, Some("s".to_string())).unwrap();
        builder
            .add_transition(state, Transition::new().with_events(["e"]).with_targets(["s"]))
            .unwrap();
        let document = builder.build().unwrap();
        let output = to_string(&document, None);
        assert_eq!(
            output,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<scxml xmlns="http://www.w3.org/2005/07/scxml" version="1.0">"#,
                r#"<state id="s"><transition event="e" target="s"/></state>"#,
                r#"</scxml>"#,
            )
        );
    }

    #[test]
    fn opaque_strings_are_escaped() {
        let mut builder = DocumentBuilder::new();
        let state = builder.add_state(None, Some("s".to_string())).unwrap();
        builder
            .add_on_entry(
                state,
                vec![Executable::Raise(Raise {
                    event: "a<b".to_string(),
                })],
            )
            .unwrap();
        builder
            .add_transition(
                state,
                Transition::new()
                    .with_cond(Some("x > 1 && y".to_string()))
                    .with_type(TransitionType::Internal),
            )
            .unwrap();
        let document = builder.build().unwrap();
        let output = to_string(&document, Some(2));
        assert!(output.contains(r#"<raise event="a&lt;b"/>"#));
        assert!(output.contains(r#"cond="x &gt; 1 &amp;&amp; y""#));
        assert!(output.contains(r#"type="internal""#));
    }

    #[test]
    fn prefixed_document() {
        let mut builder = DocumentBuilder::new();
        builder.set_prefix(Some("sc".to_string()));
        builder.set_namespaces(vec![NsBinding::new(
            Some("sc"),
            scxmlio_core::SCXML_NS,
        )]);
        builder.add_final(None, Some("done".to_string())).unwrap();
        let document = builder.build().unwrap();
        let output = to_string(&document, None);
        assert!(output.contains(r#"<sc:scxml xmlns:sc="http://www.w3.org/2005/07/scxml""#));
        assert!(output.contains(r#"<sc:final id="done"/></sc:scxml>"#));
    }
}
