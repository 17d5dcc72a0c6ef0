//! Executable content, data and invocation declarations.
//!
//! Expressions, conditions and locations are kept as opaque strings:
//! evaluating them is the job of the execution engine's datamodel.

use crate::{CustomAction, Markup};

/// An ordered list of actions, as contained in
/// `<onentry>`, `<onexit>`, `<transition>`, `<finalize>` and the like.
pub type Actions = Vec<Executable>;

/// An attribute that is given either as a literal value
/// or as an expression to be evaluated at runtime (e.g., `event` vs. `eventexpr`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// The literal value of the plain attribute.
    Literal(String),
    /// The expression of the `*expr` attribute.
    Expr(String),
}

impl Value {
    /// The literal value or the expression, whichever it is.
    pub fn as_str(&self) -> &str {
        match self {
            Value::Literal(value) | Value::Expr(value) => value,
        }
    }
}

/// A single action of executable content.
#[derive(Debug, Clone, PartialEq)]
pub enum Executable {
    /// `<raise>`
    Raise(Raise),
    /// `<if>`, together with its `<elseif>` and `<else>` branches.
    If(If),
    /// `<foreach>`
    Foreach(Foreach),
    /// `<log>`
    Log(Log),
    /// `<assign>`
    Assign(Assign),
    /// `<var>`
    Var(Var),
    /// `<script>`
    Script(Script),
    /// `<send>`
    Send(Send),
    /// `<cancel>`
    Cancel(Cancel),
    /// A vendor-defined action, resolved through the [`ExtensionRegistry`](crate::ExtensionRegistry).
    Custom(CustomAction),
}

/// Raises an internal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raise {
    /// Name of the raised event.
    pub event: String,
}

/// A branch of an [`If`], guarded by an opaque condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// The condition guarding the branch.
    pub cond: String,
    /// Actions executed if the condition holds.
    pub actions: Actions,
}

/// Conditional execution.
///
/// The first branch comes from the `<if>` element itself,
/// the following ones from `<elseif>` elements, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    /// The `if` and `elseif` branches.
    pub branches: Vec<Branch>,
    /// The `else` branch, if any.
    pub r#else: Option<Actions>,
}

impl If {
    /// Creates a conditional with a single, empty, branch.
    pub fn new(cond: impl Into<String>) -> Self {
        Self {
            branches: vec![Branch {
                cond: cond.into(),
                actions: Vec::new(),
            }],
            r#else: None,
        }
    }

    /// Appends an action to the branch currently being filled,
    /// i.e., the `else` branch if there is one, or the last `elseif` branch otherwise.
    pub fn push(&mut self, action: Executable) {
        if let Some(r#else) = self.r#else.as_mut() {
            r#else.push(action);
        } else if let Some(branch) = self.branches.last_mut() {
            branch.actions.push(action);
        }
    }
}

/// Iterates over a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Foreach {
    /// Expression giving the collection to iterate on.
    pub array: String,
    /// Variable holding the current item.
    pub item: String,
    /// Variable holding the current index.
    pub index: Option<String>,
    /// Actions executed for each item.
    pub actions: Actions,
}

/// Logs a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    /// An optional label for the message.
    pub label: Option<String>,
    /// Expression giving the message.
    pub expr: Option<String>,
}

/// Assigns a value to a location of the datamodel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assign {
    /// The assigned location.
    pub location: String,
    /// Expression giving the assigned value.
    pub expr: Option<String>,
    /// Inline content giving the assigned value.
    pub content: Option<Markup>,
}

/// Declares a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    /// Name of the variable.
    pub name: String,
    /// Expression giving the initial value.
    pub expr: Option<String>,
}

/// A script, either loaded from `src` or given inline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    /// Location of the script source.
    pub src: Option<String>,
    /// Inline script body (unescaped text).
    pub body: String,
}

/// Sends an event to an external target, possibly with a delay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Send {
    /// Identifier of the send request, usable by `<cancel>`.
    pub id: Option<String>,
    /// Location where to store a generated identifier.
    pub id_location: Option<String>,
    /// Event to be sent.
    pub event: Option<Value>,
    /// Target of the event.
    pub target: Option<Value>,
    /// Event I/O processor to use.
    pub r#type: Option<Value>,
    /// Delay before dispatching the event.
    pub delay: Option<Value>,
    /// Datamodel locations whose values are sent with the event.
    pub namelist: Vec<String>,
    /// Implementation-specific hints.
    pub hints: Option<String>,
    /// Parameters sent with the event.
    pub params: Vec<Param>,
    /// Content sent with the event.
    pub content: Option<Content>,
}

/// Cancels a delayed `<send>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancel {
    /// Identifier of the send request to cancel.
    pub send_id: Value,
}

/// A named value passed to `<send>`, `<invoke>` or `<donedata>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Name of the parameter.
    pub name: String,
    /// Expression giving the value.
    pub expr: Option<String>,
    /// Location giving the value.
    pub location: Option<String>,
}

/// Payload of `<send>`, `<invoke>` or `<donedata>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    /// Expression giving the content.
    pub expr: Option<String>,
    /// Inline content.
    pub body: Option<Markup>,
}

/// A datamodel entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    /// Name of the data item.
    pub id: String,
    /// Location of the initial value.
    pub src: Option<String>,
    /// Expression giving the initial value.
    pub expr: Option<String>,
    /// Inline initial value.
    pub content: Option<Markup>,
}

impl Data {
    /// Creates a data item with no initial value.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            src: None,
            expr: None,
            content: None,
        }
    }
}

/// Invocation of an external service from a state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invoke {
    /// Identifier of the invocation.
    pub id: Option<String>,
    /// Location where to store a generated identifier.
    pub id_location: Option<String>,
    /// Type of the invoked service.
    pub r#type: Option<Value>,
    /// Location of the service definition.
    pub src: Option<Value>,
    /// Datamodel locations passed to the service.
    pub namelist: Vec<String>,
    /// Whether external events are forwarded to the service.
    pub autoforward: bool,
    /// Parameters passed to the service.
    pub params: Vec<Param>,
    /// Content passed to the service.
    pub content: Option<Content>,
    /// Actions executed on events returned by the service.
    pub finalize: Actions,
}

/// Data returned when a final state is entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoneData {
    /// Returned content.
    pub content: Option<Content>,
    /// Returned parameters.
    pub params: Vec<Param>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raise(event: &str) -> Executable {
        Executable::Raise(Raise {
            event: event.to_string(),
        })
    }

    #[test]
    fn if_push_fills_last_branch() {
        let mut r#if = If::new("x > 0");
        r#if.push(raise("a"));
        r#if.branches.push(Branch {
            cond: "x < 0".to_string(),
            actions: Vec::new(),
        });
        r#if.push(raise("b"));
        r#if.r#else = Some(Vec::new());
        r#if.push(raise("c"));
        assert_eq!(r#if.branches[0].actions, vec![raise("a")]);
        assert_eq!(r#if.branches[1].actions, vec![raise("b")]);
        assert_eq!(r#if.r#else, Some(vec![raise("c")]));
    }

    #[test]
    fn value_as_str() {
        assert_eq!(Value::Literal("go".to_string()).as_str(), "go");
        assert_eq!(Value::Expr("'go'".to_string()).as_str(), "'go'");
    }
}
