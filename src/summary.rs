//! Condensed view of a document, for the `inspect` command.

use scxmlio_fmt::scxmlio_core::{Document, Executable, NodeId};
use serde::Serialize;
use std::fmt;

/// The outline of a document: its metadata and its tree of nodes.
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    name: Option<&'a str>,
    version: &'a str,
    datamodel: Option<&'a str>,
    initial: Vec<&'a str>,
    nodes: Vec<NodeSummary<'a>>,
}

#[derive(Debug, Serialize)]
struct NodeSummary<'a> {
    id: Option<&'a str>,
    kind: &'static str,
    depth: usize,
    transitions: Vec<TransitionSummary<'a>>,
    custom_actions: usize,
}

#[derive(Debug, Serialize)]
struct TransitionSummary<'a> {
    events: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    cond: Option<&'a str>,
    targets: &'a [String],
}

impl<'a> Summary<'a> {
    /// Outlines the document, listing nodes in document order.
    pub fn new(document: &'a Document) -> Self {
        let mut nodes = Vec::with_capacity(document.len());
        let mut stack: Vec<(NodeId, usize)> =
            document.roots().iter().rev().map(|root| (*root, 0)).collect();
        while let Some((node_id, depth)) = stack.pop() {
            let node = &document[node_id];
            let custom_actions = node
                .on_entry()
                .iter()
                .chain(node.on_exit())
                .map(|actions| actions.as_slice())
                .chain(node.transitions().iter().map(|transition| transition.actions()))
                .map(count_custom)
                .sum();
            nodes.push(NodeSummary {
                id: node.id(),
                kind: node.kind().tag(),
                depth,
                transitions: node
                    .transitions()
                    .iter()
                    .map(|transition| TransitionSummary {
                        events: transition.events(),
                        cond: transition.cond(),
                        targets: transition.targets(),
                    })
                    .collect(),
                custom_actions,
            });
            stack.extend(node.children().iter().rev().map(|child| (*child, depth + 1)));
        }
        Self {
            name: document.name(),
            version: document.version(),
            datamodel: document.datamodel_lang(),
            initial: document
                .initial_targets()
                .iter()
                .filter_map(|node| document[*node].id())
                .collect(),
            nodes,
        }
    }
}

/// Counts custom actions, including those nested in `<if>` and `<foreach>`.
fn count_custom(actions: &[Executable]) -> usize {
    actions
        .iter()
        .map(|action| match action {
            Executable::Custom(_) => 1,
            Executable::If(r#if) => {
                r#if.branches
                    .iter()
                    .map(|branch| count_custom(&branch.actions))
                    .sum::<usize>()
                    + r#if.r#else.as_deref().map_or(0, count_custom)
            }
            Executable::Foreach(foreach) => count_custom(&foreach.actions),
            _ => 0,
        })
        .sum()
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "document '{}' (SCXML {}, datamodel {})",
            self.name.unwrap_or("<unnamed>"),
            self.version,
            self.datamodel.unwrap_or("null"),
        )?;
        writeln!(f, "initial: {}", self.initial.join(" "))?;
        for node in &self.nodes {
            write!(
                f,
                "{:indent$}{} '{}'",
                "",
                node.kind,
                node.id.unwrap_or("<anonymous>"),
                indent = 2 * (node.depth + 1)
            )?;
            if !node.transitions.is_empty() {
                write!(f, ", {} transition(s)", node.transitions.len())?;
            }
            if node.custom_actions > 0 {
                write!(f, ", {} custom action(s)", node.custom_actions)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"<scxml xmlns="http://www.w3.org/2005/07/scxml" name="door" version="1.0">
        <state id="closed" initial="locked">
            <state id="locked"><transition event="unlock" target="unlocked"/></state>
            <state id="unlocked"/>
            <transition event="open" cond="!locked" target="opened"/>
        </state>
        <final id="opened"/>
    </scxml>"#;

    #[test]
    fn outline() {
        let document = scxmlio_fmt::parse_str(SOURCE, None).expect("valid document");
        let summary = Summary::new(&document);
        let ids: Vec<_> = summary.nodes.iter().map(|node| (node.id, node.depth)).collect();
        assert_eq!(
            ids,
            vec![
                (Some("closed"), 0),
                (Some("locked"), 1),
                (Some("unlocked"), 1),
                (Some("opened"), 0),
            ]
        );
        assert_eq!(summary.initial, vec!["closed"]);
        let text = summary.to_string();
        assert!(text.starts_with("document 'door' (SCXML 1.0, datamodel null)\ninitial: closed\n"));
        assert!(text.contains("    state 'locked', 1 transition(s)\n"));
    }

    #[test]
    fn json() {
        let document = scxmlio_fmt::parse_str(SOURCE, None).expect("valid document");
        let json = serde_json::to_value(Summary::new(&document)).expect("serializable");
        assert_eq!(json["name"], "door");
        assert_eq!(json["nodes"][0]["transitions"][0]["cond"], "!locked");
        assert_eq!(json["nodes"][1]["transitions"][0]["targets"][0], "unlocked");
        assert!(json["nodes"][1]["transitions"][0].get("cond").is_none());
        assert_eq!(json["nodes"][3]["kind"], "final");
    }
}
