use super::attributes::{exclusive, tokens, value};
use super::{Frame, ParseResult, Parser};
use crate::vocabulary::*;
use log::{debug, error};
use quick_xml::events::BytesStart;
use scxmlio_core::{
    Assign, Branch, Cancel, CustomAction, Executable, Foreach, If, Log, ModelError, Raise, Script,
    Send, Var,
};

impl<'a> Parser<'a> {
    /// Appends an action to the innermost executable content.
    pub(super) fn push_action(&mut self, action: Executable) -> ParseResult<()> {
        match self.stack.last_mut() {
            Some(Frame::OnEntry(actions) | Frame::OnExit(actions) | Frame::Finalize(actions)) => {
                actions.push(action);
            }
            Some(Frame::Transition(transition)) => transition.push_action(action),
            Some(Frame::If(r#if)) => r#if.push(action),
            Some(Frame::Foreach(foreach)) => foreach.actions.push(action),
            _ => return Err(self.invalid("executable content")),
        }
        Ok(())
    }

    /// Parses an SCXML element inside executable content.
    pub(super) fn parse_action(
        &mut self,
        tag: &BytesStart<'a>,
        local: &str,
        empty: bool,
    ) -> ParseResult<()> {
        match local {
            TAG_RAISE => {
                let mut attrs = self.attrs(tag, TAG_RAISE, &[ATTR_EVENT], &[])?;
                if !empty {
                    self.expect_end(TAG_RAISE)?;
                }
                self.push_action(Executable::Raise(Raise {
                    event: attrs.remove(ATTR_EVENT).unwrap_or_default(),
                }))
            }
            TAG_LOG => {
                let mut attrs = self.attrs(tag, TAG_LOG, &[], &[ATTR_LABEL, ATTR_EXPR])?;
                if !empty {
                    self.expect_end(TAG_LOG)?;
                }
                self.push_action(Executable::Log(Log {
                    label: attrs.remove(ATTR_LABEL),
                    expr: attrs.remove(ATTR_EXPR),
                }))
            }
            TAG_ASSIGN => {
                let mut attrs = self.attrs(tag, TAG_ASSIGN, &[ATTR_LOCATION], &[ATTR_EXPR])?;
                let expr = attrs.remove(ATTR_EXPR);
                let content = if empty { None } else { self.markup()? };
                exclusive(
                    TAG_ASSIGN,
                    (ATTR_EXPR, expr.is_some()),
                    (TAG_TEXT, content.is_some()),
                )?;
                self.push_action(Executable::Assign(Assign {
                    location: attrs.remove(ATTR_LOCATION).unwrap_or_default(),
                    expr,
                    content,
                }))
            }
            TAG_VAR => {
                let mut attrs = self.attrs(tag, TAG_VAR, &[ATTR_NAME], &[ATTR_EXPR])?;
                if !empty {
                    self.expect_end(TAG_VAR)?;
                }
                self.push_action(Executable::Var(Var {
                    name: attrs.remove(ATTR_NAME).unwrap_or_default(),
                    expr: attrs.remove(ATTR_EXPR),
                }))
            }
            TAG_SCRIPT => {
                let script = self.parse_script(tag, empty)?;
                self.push_action(Executable::Script(script))
            }
            TAG_CANCEL => {
                let mut attrs = self.attrs(tag, TAG_CANCEL, &[], &[ATTR_SENDID, ATTR_SENDIDEXPR])?;
                if !empty {
                    self.expect_end(TAG_CANCEL)?;
                }
                let send_id = value(&mut attrs, TAG_CANCEL, ATTR_SENDID, ATTR_SENDIDEXPR)?
                    .ok_or_else(|| {
                        error!(target: "parser", "missing required attribute '{ATTR_SENDID}' of '{TAG_CANCEL}'");
                        ModelError::MissingAttribute {
                            element: TAG_CANCEL.to_string(),
                            attribute: ATTR_SENDID.to_string(),
                        }
                    })?;
                self.push_action(Executable::Cancel(Cancel { send_id }))
            }
            TAG_IF => {
                let mut attrs = self.attrs(tag, TAG_IF, &[ATTR_COND], &[])?;
                let cond = attrs.remove(ATTR_COND).unwrap_or_default();
                self.stack.push(Frame::If(If::new(cond)));
                Ok(())
            }
            TAG_ELSEIF if matches!(self.stack.last(), Some(Frame::If(_))) => {
                let mut attrs = self.attrs(tag, TAG_ELSEIF, &[ATTR_COND], &[])?;
                if !empty {
                    self.expect_end(TAG_ELSEIF)?;
                }
                if let Some(Frame::If(If { r#else: Some(_), .. })) = self.stack.last() {
                    return Err(self.invalid_in(TAG_ELSEIF, TAG_ELSE));
                }
                if let Some(Frame::If(r#if)) = self.stack.last_mut() {
                    r#if.branches.push(Branch {
                        cond: attrs.remove(ATTR_COND).unwrap_or_default(),
                        actions: Vec::new(),
                    });
                }
                Ok(())
            }
            TAG_ELSE if matches!(self.stack.last(), Some(Frame::If(_))) => {
                self.attrs(tag, TAG_ELSE, &[], &[])?;
                if !empty {
                    self.expect_end(TAG_ELSE)?;
                }
                if let Some(Frame::If(r#if)) = self.stack.last_mut() {
                    if r#if.r#else.is_some() {
                        error!(target: "parser", "repeated '{TAG_ELSE}' inside '{TAG_IF}'");
                        return Err(ModelError::DuplicateElement {
                            element: TAG_ELSE.to_string(),
                            context: TAG_IF.to_string(),
                        }
                        .into());
                    }
                    r#if.r#else = Some(Vec::new());
                }
                Ok(())
            }
            TAG_FOREACH => {
                let mut attrs =
                    self.attrs(tag, TAG_FOREACH, &[ATTR_ARRAY, ATTR_ITEM], &[ATTR_INDEX])?;
                self.stack.push(Frame::Foreach(Foreach {
                    array: attrs.remove(ATTR_ARRAY).unwrap_or_default(),
                    item: attrs.remove(ATTR_ITEM).unwrap_or_default(),
                    index: attrs.remove(ATTR_INDEX),
                    actions: Vec::new(),
                }));
                Ok(())
            }
            TAG_SEND => {
                let send = self.parse_send(tag)?;
                self.stack.push(Frame::Send(send));
                Ok(())
            }
            _ => Err(self.invalid(local)),
        }
    }

    pub(super) fn parse_script(&mut self, tag: &BytesStart<'a>, empty: bool) -> ParseResult<Script> {
        let mut attrs = self.attrs(tag, TAG_SCRIPT, &[], &[ATTR_SRC])?;
        let src = attrs.remove(ATTR_SRC);
        let body = if empty {
            String::new()
        } else {
            self.text(TAG_SCRIPT)?
        };
        exclusive(
            TAG_SCRIPT,
            (ATTR_SRC, src.is_some()),
            (TAG_TEXT, !body.trim().is_empty()),
        )?;
        Ok(Script { src, body })
    }

    fn parse_send(&mut self, tag: &BytesStart<'a>) -> ParseResult<Send> {
        let mut attrs = self.attrs(
            tag,
            TAG_SEND,
            &[],
            &[
                ATTR_EVENT,
                ATTR_EVENTEXPR,
                ATTR_TARGET,
                ATTR_TARGETEXPR,
                ATTR_TYPE,
                ATTR_TYPEEXPR,
                ATTR_ID,
                ATTR_SENDID,
                ATTR_IDLOCATION,
                ATTR_DELAY,
                ATTR_DELAYEXPR,
                ATTR_NAMELIST,
                ATTR_HINTS,
            ],
        )?;
        // `sendid` is a legacy spelling of `id`
        let (id, sendid) = (attrs.remove(ATTR_ID), attrs.remove(ATTR_SENDID));
        exclusive(
            TAG_SEND,
            (ATTR_ID, id.is_some()),
            (ATTR_SENDID, sendid.is_some()),
        )?;
        if sendid.is_some() {
            debug!(target: "parser", "reading legacy '{ATTR_SENDID}' attribute of '{TAG_SEND}' as '{ATTR_ID}'");
        }
        let id = id.or(sendid);
        let send = Send {
            id,
            id_location: attrs.remove(ATTR_IDLOCATION),
            event: value(&mut attrs, TAG_SEND, ATTR_EVENT, ATTR_EVENTEXPR)?,
            target: value(&mut attrs, TAG_SEND, ATTR_TARGET, ATTR_TARGETEXPR)?,
            r#type: value(&mut attrs, TAG_SEND, ATTR_TYPE, ATTR_TYPEEXPR)?,
            delay: value(&mut attrs, TAG_SEND, ATTR_DELAY, ATTR_DELAYEXPR)?,
            namelist: attrs
                .remove(ATTR_NAMELIST)
                .as_deref()
                .map(tokens)
                .unwrap_or_default(),
            hints: attrs.remove(ATTR_HINTS),
            ..Default::default()
        };
        exclusive(
            TAG_SEND,
            (ATTR_ID, send.id.is_some()),
            (ATTR_IDLOCATION, send.id_location.is_some()),
        )?;
        Ok(send)
    }

    /// Parses an element of a foreign namespace inside executable content
    /// as a custom action, through the registered extensions.
    pub(super) fn parse_custom_action(
        &mut self,
        tag: &BytesStart<'a>,
        namespace: Option<String>,
        local: String,
        empty: bool,
    ) -> ParseResult<()> {
        let namespace = namespace.unwrap_or_default();
        let Some(factory) = self
            .registry
            .and_then(|registry| registry.lookup(&namespace, &local))
        else {
            error!(target: "parser", "no custom action registered for '{{{namespace}}}{local}'");
            return Err(ModelError::UnregisteredExtension {
                namespace,
                name: local,
            }
            .into());
        };
        let implementation = factory();
        debug!(target: "parser", "custom action '{{{namespace}}}{local}'");
        let prefix = tag
            .name()
            .prefix()
            .map(|prefix| std::str::from_utf8(prefix.as_ref()).map(str::to_owned))
            .transpose()?;
        let attributes = self.raw_attrs(tag)?;
        let content = if empty {
            Vec::new()
        } else if implementation.accepts_foreign_content() {
            self.capture()?
        } else {
            self.skip(tag, &local)?;
            Vec::new()
        };
        let action = CustomAction::new(namespace, local, implementation)
            .with_prefix(prefix)
            .with_namespaces(self.extra_bindings())
            .with_attributes(attributes)
            .with_content(content);
        self.push_action(Executable::Custom(action))
    }
}

#[cfg(test)]
mod tests {
    use crate::parse_str;
    use scxmlio_core::{Executable, Value};

    fn on_entry(body: &str) -> Vec<Executable> {
        let source = format!(
            r#"<scxml xmlns="http://www.w3.org/2005/07/scxml"><state id="s"><onentry>{body}</onentry></state></scxml>"#
        );
        let document = parse_str(&source, None).expect("valid document");
        let state = document.lookup("s").expect("declared state");
        document[state].on_entry()[0].clone()
    }

    #[test]
    fn if_branches() {
        let actions = on_entry(
            r#"<if cond="a"><raise event="x"/><elseif cond="b"/><raise event="y"/><else/><raise event="z"/><raise event="w"/></if>"#,
        );
        let Executable::If(r#if) = &actions[0] else {
            panic!("expected <if>, found {:?}", actions[0]);
        };
        assert_eq!(r#if.branches.len(), 2);
        assert_eq!(r#if.branches[0].cond, "a");
        assert_eq!(r#if.branches[0].actions.len(), 1);
        assert_eq!(r#if.branches[1].cond, "b");
        assert_eq!(r#if.r#else.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn legacy_sendid() {
        let actions = on_entry(r#"<send sendid="timer" eventexpr="'tick'" delay="1s"/>"#);
        let Executable::Send(send) = &actions[0] else {
            panic!("expected <send>, found {:?}", actions[0]);
        };
        assert_eq!(send.id.as_deref(), Some("timer"));
        assert_eq!(send.event, Some(Value::Expr("'tick'".to_string())));
        assert_eq!(send.delay, Some(Value::Literal("1s".to_string())));
    }

    #[test]
    fn cancel_requires_sendid() {
        let source = r#"<scxml xmlns="http://www.w3.org/2005/07/scxml"><state><onexit><cancel/></onexit></state></scxml>"#;
        let err = parse_str(source, None).expect_err("missing sendid");
        assert_eq!(err.model_errors().len(), 1);
    }

    #[test]
    fn else_after_else() {
        let source = r#"<scxml xmlns="http://www.w3.org/2005/07/scxml"><state><onexit><if cond="a"><else/><else/></if></onexit></state></scxml>"#;
        assert!(parse_str(source, None).is_err());
        let source = r#"<scxml xmlns="http://www.w3.org/2005/07/scxml"><state><onexit><if cond="a"><else/><elseif cond="b"/></if></onexit></state></scxml>"#;
        assert!(parse_str(source, None).is_err());
    }
}
