use anyhow::Context;
use scxmlio_fmt::scxmlio_core::*;
use scxmlio_fmt::{parse_file, parse_str, write};
use std::path::PathBuf;

const NS: &str = "http://example/actions";

/// Records its executions and captures its children.
#[derive(Debug, Default)]
struct Capturing;

impl CustomActionImpl for Capturing {
    fn execute(&self, action: &CustomAction, ctx: &mut dyn ActionContext) -> Result<(), ActionError> {
        let level = action
            .attribute("level")
            .ok_or_else(|| ActionError("missing level".to_string()))?;
        ctx.log(Some("level"), level);
        Ok(())
    }

    fn accepts_foreign_content(&self) -> bool {
        true
    }
}

/// Ignores its children.
#[derive(Debug, Default)]
struct Opaque;

impl CustomActionImpl for Opaque {
    fn execute(&self, _: &CustomAction, ctx: &mut dyn ActionContext) -> Result<(), ActionError> {
        ctx.raise("opaque");
        Ok(())
    }
}

#[derive(Default)]
struct Events(Vec<String>);

impl ActionContext for Events {
    fn raise(&mut self, event: &str) {
        self.0.push(event.to_string());
    }

    fn log(&mut self, label: Option<&str>, message: &str) {
        self.0.push(format!("{}: {message}", label.unwrap_or_default()));
    }
}

fn custom_actions(registry: &ExtensionRegistry) -> anyhow::Result<Vec<CustomAction>> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/assets/custom_action.scxml");
    let document = parse_file(&path, Some(registry))
        .with_context(|| format!("failed reading {}", path.display()))?;
    let state = document.get("s").context("state 's'")?;
    Ok(state.on_entry()[0]
        .iter()
        .filter_map(|action| match action {
            Executable::Custom(action) => Some(action.clone()),
            _ => None,
        })
        .collect())
}

#[test]
fn dispatch() -> anyhow::Result<()> {
    let mut registry = ExtensionRegistry::new();
    registry.register_default::<Capturing>(NS, "action");
    let actions = custom_actions(&registry)?;
    assert_eq!(actions.len(), 2);

    let first = &actions[0];
    assert!(first.implementation_as::<Capturing>().is_some());
    assert_eq!(first.namespace(), NS);
    assert_eq!(first.name(), "action");
    assert_eq!(first.prefix(), None);
    assert_eq!(first.namespaces(), &[NsBinding::new(None, NS)]);
    assert_eq!(
        first.content(),
        &[ForeignNode::Element(r#"<nested value="1"/>"#.to_string())]
    );
    let mut events = Events::default();
    first.execute(&mut events)?;
    assert_eq!(events.0, vec!["level: 2".to_string()]);

    let second = &actions[1];
    assert_eq!(second.qualified_name(), "ex:action");
    assert!(second.namespaces().is_empty());
    assert_eq!(second.attribute("ex:mode"), Some("quiet"));
    assert!(second.execute(&mut events).is_err());
    Ok(())
}

#[test]
fn single_action_with_one_nested_element() -> anyhow::Result<()> {
    let mut registry = ExtensionRegistry::new();
    registry.register_default::<Capturing>(NS, "action");
    let source = format!(
        r#"<scxml xmlns="http://www.w3.org/2005/07/scxml" version="1.0"><state id="s"><onentry><action xmlns="{NS}"><nested/></action></onentry></state></scxml>"#
    );
    let document = parse_str(&source, Some(&registry))?;
    let state = document.get("s").context("state 's'")?;
    assert_eq!(state.on_entry().len(), 1);
    assert_eq!(state.on_entry()[0].len(), 1);
    let Executable::Custom(action) = &state.on_entry()[0][0] else {
        panic!("expected a custom action");
    };
    assert!(action.implementation_as::<Capturing>().is_some());
    assert_eq!(
        action.content(),
        &[ForeignNode::Element("<nested/>".to_string())]
    );
    Ok(())
}

#[test]
fn content_is_skipped_unless_accepted() -> anyhow::Result<()> {
    let mut registry = ExtensionRegistry::new();
    registry.register_default::<Opaque>(NS, "action");
    let actions = custom_actions(&registry)?;
    assert!(actions[0].implementation_as::<Opaque>().is_some());
    assert!(actions[0].content().is_empty());
    let mut events = Events::default();
    actions[0].execute(&mut events)?;
    assert_eq!(events.0, vec!["opaque".to_string()]);
    Ok(())
}

#[test]
fn last_registration_wins() -> anyhow::Result<()> {
    let mut registry = ExtensionRegistry::new();
    registry.register_default::<Opaque>(NS, "action");
    assert!(registry.register_default::<Capturing>(NS, "action").is_some());
    let actions = custom_actions(&registry)?;
    assert!(actions
        .iter()
        .all(|action| action.implementation_as::<Capturing>().is_some()));
    Ok(())
}

#[test]
fn custom_action_outside_executable_content() {
    let mut registry = ExtensionRegistry::new();
    registry.register_default::<Opaque>(NS, "action");
    let source = format!(
        r#"<scxml xmlns="http://www.w3.org/2005/07/scxml"><state id="s"><action xmlns="{NS}"/></state></scxml>"#
    );
    let err = parse_str(&source, Some(&registry)).expect_err("misplaced custom action");
    assert_eq!(
        err.model_errors(),
        vec![&ModelError::InvalidStructure {
            element: "action".to_string(),
            context: "state".to_string(),
        }]
    );
}

#[test]
fn undeclared_namespace_is_written() -> anyhow::Result<()> {
    let mut builder = DocumentBuilder::new();
    let state = builder.add_state(None, Some("s".to_string()))?;
    let action = CustomAction::new(NS, "action", Box::new(Opaque))
        .with_prefix(Some("ex".to_string()))
        .with_attributes(vec![("ex:mode".to_string(), "a&b".to_string())]);
    builder.add_on_entry(state, vec![Executable::Custom(action)])?;
    let document = builder.build()?;
    let output = String::from_utf8(write(&document)?)?;
    assert!(output.contains(r#"<ex:action xmlns:ex="http://example/actions" ex:mode="a&amp;b"/>"#));
    Ok(())
}
