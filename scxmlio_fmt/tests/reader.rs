use anyhow::Context;
use scxmlio_fmt::scxmlio_core::*;
use scxmlio_fmt::{parse_file, ReadError};
use std::path::PathBuf;

fn asset(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/assets")
        .join(name)
}

fn read(name: &str) -> anyhow::Result<Document> {
    let path = asset(name);
    parse_file(&path, None).with_context(|| format!("failed reading {}", path.display()))
}

fn model_errors(name: &str) -> Vec<ModelError> {
    match parse_file(&asset(name), None) {
        Ok(_) => panic!("{name} should not be read successfully"),
        Err(err) => err.model_errors().into_iter().cloned().collect(),
    }
}

fn node<'a>(document: &'a Document, id: &str) -> anyhow::Result<&'a Node> {
    document.get(id).with_context(|| format!("no node '{id}'"))
}

#[test]
fn microwave() -> anyhow::Result<()> {
    let document = read("microwave.scxml")?;
    assert_eq!(document.name(), Some("microwave"));
    assert_eq!(document.datamodel_lang(), Some("ecmascript"));
    assert_eq!(document.datamodel().map(<[Data]>::len), Some(3));
    assert!(document
        .script()
        .is_some_and(|script| script.body.contains("function reset()")));
    assert_eq!(document.len(), 4);
    assert_eq!(document.initial_target().and_then(Node::id), Some("off"));

    let on = document.lookup("on").context("state 'on'")?;
    let idle = document.lookup("idle").context("state 'idle'")?;
    assert_eq!(document[on].as_state().map(State::initial_targets), Some(&[idle][..]));
    assert_eq!(document[on].children().len(), 2);
    let eventless = &document[on].transitions()[1];
    assert!(eventless.events().is_empty());
    assert_eq!(eventless.cond(), Some("timer >= cook_time"));

    let cooking = node(&document, "cooking")?;
    let Executable::Send(send) = &cooking.on_entry()[0][0] else {
        panic!("expected <send>");
    };
    assert_eq!(send.id.as_deref(), Some("tick"));
    assert_eq!(send.delay, Some(Value::Literal("1s".to_string())));
    let Executable::Cancel(cancel) = &cooking.on_exit()[0][0] else {
        panic!("expected <cancel>");
    };
    assert_eq!(cancel.send_id, Value::Literal("tick".to_string()));

    let time = cooking
        .transitions_for_event("time")
        .next()
        .context("transition on 'time'")?;
    assert_eq!(time.r#type(), TransitionType::Internal);
    assert!(time.targets().is_empty());
    let Executable::If(r#if) = &time.actions()[1] else {
        panic!("expected <if>");
    };
    assert_eq!(r#if.branches.len(), 2);
    assert_eq!(r#if.branches[0].cond, "timer < cook_time");
    assert!(matches!(
        r#if.branches[1].actions.as_slice(),
        [Executable::Raise(Raise { event })] if event == "done"
    ));
    assert!(r#if.r#else.as_ref().is_some_and(|actions| actions.len() == 1));
    Ok(())
}

#[test]
fn forward_references() -> anyhow::Result<()> {
    let document = read("forward_refs.scxml")?;
    let a = document.lookup("A").context("state 'A'")?;
    let b = document.lookup("B").context("state 'B'")?;
    assert_eq!(document[a].transitions()[0].target_nodes(), &[b]);
    assert_eq!(document[b].transitions()[0].target_nodes(), &[a]);
    Ok(())
}

#[test]
fn explicit_initial_is_final() -> anyhow::Result<()> {
    let document = read("initial_final.scxml")?;
    let initial = document.initial_target().context("initial state")?;
    assert_eq!(initial.kind(), NodeKind::Final);
    assert_eq!(initial.id(), Some("end"));
    Ok(())
}

#[test]
fn default_initial_is_first_child() -> anyhow::Result<()> {
    let document = read("forward_refs.scxml")?;
    assert!(document.initial().is_empty());
    assert_eq!(document.initial_target().and_then(Node::id), Some("A"));
    Ok(())
}

#[test]
fn legacy_sendid() -> anyhow::Result<()> {
    let document = read("legacy_send.scxml")?;
    let waiting = node(&document, "waiting")?;
    let Executable::Send(send) = &waiting.on_entry()[0][0] else {
        panic!("expected <send>");
    };
    assert_eq!(send.id.as_deref(), Some("timeout"));
    assert_eq!(send.event, Some(Value::Literal("expired".to_string())));
    assert_eq!(send.params.len(), 1);
    assert_eq!(send.params[0].expr.as_deref(), Some("'timeout'"));
    let Executable::Cancel(cancel) = &waiting.on_exit()[0][0] else {
        panic!("expected <cancel>");
    };
    assert_eq!(cancel.send_id, Value::Expr("'timeout'".to_string()));
    Ok(())
}

#[test]
fn prefixed_document() -> anyhow::Result<()> {
    let document = read("prefixed.scxml")?;
    assert_eq!(document.prefix(), Some("sc"));
    assert_eq!(
        document.namespaces(),
        &[NsBinding::new(Some("sc"), SCXML_NS)]
    );
    let s1 = document.lookup("s1").context("state 's1'")?;
    let s11 = document.lookup("s11").context("state 's11'")?;
    assert_eq!(document.initial_targets(), &[s1]);
    assert_eq!(document[s1].as_state().map(State::initial_targets), Some(&[s11][..]));
    assert!(document.is_descendant(s11, s1));
    Ok(())
}

#[test]
fn history() -> anyhow::Result<()> {
    let document = read("history.scxml")?;
    let player = document.lookup("player").context("state 'player'")?;
    let resume = document.lookup("resume").context("history 'resume'")?;
    let stopped = document.lookup("stopped").context("state 'stopped'")?;
    let histories: Vec<_> = document.histories(player).collect();
    assert_eq!(histories.len(), 2);
    assert_eq!(histories[0].0, resume);
    assert_eq!(histories[0].1.r#type(), HistoryType::Shallow);
    assert_eq!(histories[1].1.r#type(), HistoryType::Deep);
    assert_eq!(
        histories[0].1.default_transition().map(Transition::target_nodes),
        Some(&[stopped][..])
    );
    // The initial transition targets the history pseudo-state
    assert_eq!(document[player].as_state().map(State::initial_targets), Some(&[resume][..]));
    let suspended = node(&document, "suspended")?;
    assert_eq!(suspended.transitions()[0].target_nodes(), &[resume]);
    Ok(())
}

#[test]
fn parallel() -> anyhow::Result<()> {
    let document = read("parallel.scxml")?;
    let system = node(&document, "system")?;
    assert_eq!(system.kind(), NodeKind::Parallel);
    assert_eq!(system.children().len(), 2);
    assert!(system.transitions().is_empty());
    assert_eq!(system.datamodel().map(<[Data]>::len), Some(1));
    let [Executable::Foreach(foreach), Executable::Var(var)] = system.on_entry()[0].as_slice() else {
        panic!("expected <foreach> and <var>");
    };
    assert_eq!(foreach.index.as_deref(), Some("i"));
    assert_eq!(foreach.actions.len(), 1);
    assert_eq!(var.name, "count");
    let r2 = document.lookup("r2").context("final 'r2'")?;
    assert!(document[r2].is_atomic());
    Ok(())
}

#[test]
fn invoke_and_done_data() -> anyhow::Result<()> {
    let document = read("invoke.scxml")?;
    let config = &document.datamodel().context("top-level datamodel")?[0];
    let markup = config.content.as_ref().context("inline data")?;
    assert_eq!(markup.nodes.len(), 1);
    assert!(markup.raw().starts_with(r#"<settings xmlns="urn:example:settings" mode="fast">"#));
    assert!(markup.raw().ends_with("</settings>"));

    let working = node(&document, "working")?;
    let [child, anonymous] = working.invokes() else {
        panic!("expected two invocations");
    };
    assert_eq!(child.id.as_deref(), Some("child"));
    assert!(child.autoforward);
    assert_eq!(child.src, Some(Value::Expr("'child.scxml'".to_string())));
    assert_eq!(child.params.len(), 1);
    assert_eq!(child.finalize.len(), 1);
    assert_eq!(anonymous.id_location.as_deref(), Some("handle"));
    assert_eq!(anonymous.namelist, vec!["a", "b"]);
    let content = anonymous
        .content
        .as_ref()
        .and_then(|content| content.body.as_ref())
        .context("inline content")?;
    assert_eq!(
        content.nodes,
        vec![
            ForeignNode::Text("payload &amp; ".to_string()),
            ForeignNode::CData("<![CDATA[raw <data>]]>".to_string()),
        ]
    );

    let done_data = node(&document, "finished")?
        .as_final()
        .and_then(Final::done_data)
        .context("done data")?;
    assert_eq!(done_data.params[0].location.as_deref(), Some("result"));
    Ok(())
}

#[test]
fn duplicate_and_unresolved() {
    let errors = model_errors("duplicate_unresolved.scxml");
    assert_eq!(
        errors,
        vec![
            ModelError::DuplicateIdentifier("s".to_string()),
            ModelError::UnresolvedReference {
                reference: Reference::Transition,
                id: "nowhere".to_string(),
            },
        ]
    );
}

#[test]
fn unregistered_extension() {
    let errors = model_errors("unregistered.scxml");
    assert_eq!(
        errors,
        vec![ModelError::UnregisteredExtension {
            namespace: "http://example/actions".to_string(),
            name: "action".to_string(),
        }]
    );
}

#[test]
fn history_out_of_scope() {
    let errors = model_errors("history_scope.scxml");
    assert_eq!(
        errors,
        vec![ModelError::HistoryOutOfScope {
            history: "h".to_string(),
            target: "b".to_string(),
        }]
    );
}

#[test]
fn history_outside_state() {
    let errors = model_errors("history_outside.scxml");
    assert_eq!(
        errors,
        vec![ModelError::InvalidStructure {
            element: "history".to_string(),
            context: "parallel".to_string(),
        }]
    );
}

#[test]
fn malformed_markup() {
    let source = r#"<scxml xmlns="http://www.w3.org/2005/07/scxml"><state id="s"></scxml>"#;
    let err = scxmlio_fmt::parse_str(source, None).expect_err("mismatched end tag");
    assert!(matches!(err, ReadError::Syntax { .. }));
    assert!(err.model_errors().is_empty());
}

fn syntax_error(source: &str) -> scxmlio_fmt::SyntaxError {
    match scxmlio_fmt::parse_str(source, None) {
        Err(ReadError::Syntax { source, .. }) => source,
        Err(err) => panic!("expected a syntax error, got: {err:?}"),
        Ok(_) => panic!("{source:?} should not be read successfully"),
    }
}

#[test]
fn missing_root() {
    assert!(matches!(syntax_error(""), scxmlio_fmt::SyntaxError::MissingRoot));
    assert!(matches!(
        syntax_error("<?xml version=\"1.0\"?>\n  <!-- nothing -->\n"),
        scxmlio_fmt::SyntaxError::MissingRoot
    ));
}

#[test]
fn multiple_roots() {
    let source = concat!(
        r#"<scxml xmlns="http://www.w3.org/2005/07/scxml" version="1.0"/>"#,
        r#"<scxml xmlns="http://www.w3.org/2005/07/scxml" version="1.0"/>"#,
    );
    assert!(matches!(syntax_error(source), scxmlio_fmt::SyntaxError::MultipleRoots));
}

#[test]
fn text_outside_root() {
    assert!(matches!(
        syntax_error("hello"),
        scxmlio_fmt::SyntaxError::TextOutsideRoot
    ));
    let source = r#"<scxml xmlns="http://www.w3.org/2005/07/scxml" version="1.0"/>trailing"#;
    assert!(matches!(syntax_error(source), scxmlio_fmt::SyntaxError::TextOutsideRoot));
}

#[test]
fn malformed_markup_after_structural_error() {
    // The unknown attribute comes first, the unterminated end tag is reported anyway
    let source = r#"<scxml xmlns="http://www.w3.org/2005/07/scxml"><state bogus="1"></scxml"#;
    assert!(matches!(syntax_error(source), scxmlio_fmt::SyntaxError::Xml(_)));

    let source = concat!(
        r#"<scxml xmlns="http://www.w3.org/2005/07/scxml" version="1.0">"#,
        r#"<state id="s"><bogus/></state></scxml><scxml/>"#,
    );
    assert!(matches!(syntax_error(source), scxmlio_fmt::SyntaxError::MultipleRoots));

    let source = concat!(
        r#"<scxml xmlns="http://www.w3.org/2005/07/scxml" version="1.0">"#,
        r#"<state id="s"><bogus/><state id="t">"#,
    );
    assert!(matches!(syntax_error(source), scxmlio_fmt::SyntaxError::UnclosedTags));
}

#[test]
fn structural_error_in_well_formed_markup() {
    let source = r#"<scxml xmlns="http://www.w3.org/2005/07/scxml"><state bogus="1"/></scxml>"#;
    let err = scxmlio_fmt::parse_str(source, None).expect_err("unknown attribute");
    assert!(matches!(err, ReadError::Structure { .. }));
    assert!(matches!(
        err.model_errors().as_slice(),
        [ModelError::UnknownAttribute { .. }]
    ));
}

#[test]
fn missing_file() {
    let err = parse_file(&asset("missing.scxml"), None).expect_err("no such file");
    assert!(matches!(
        err,
        ReadError::Syntax {
            source: scxmlio_fmt::SyntaxError::Io(_),
            ..
        }
    ));
}
