//! Vendor-defined executable content.
//!
//! An [`ExtensionRegistry`] maps the `(namespace, local name)` of an element
//! to a factory producing [`CustomActionImpl`] instances.
//! When the reader finds an element of a non-SCXML namespace inside executable content,
//! it looks it up in the registry and wraps a fresh instance in a [`CustomAction`].

use crate::{ForeignNode, NsBinding};
use hashbrown::HashMap;
use log::debug;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// Upcast to [`Any`], implemented for every `'static` type.
///
/// It allows recovering the concrete type of a `dyn` [`CustomActionImpl`].
pub trait AsAny {
    /// Returns `self` as [`Any`].
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Error raised by a custom action while executing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("custom action failed: {0}")]
pub struct ActionError(pub String);

/// The services an execution engine offers to custom actions.
pub trait ActionContext {
    /// Raises an internal event.
    fn raise(&mut self, event: &str);

    /// Logs a message.
    fn log(&mut self, label: Option<&str>, message: &str);
}

/// Implementation of a vendor-defined action.
///
/// Instances are shared by every execution of the model, so they must be [`Send`] and [`Sync`].
pub trait CustomActionImpl: AsAny + Debug + Send + Sync {
    /// Executes the action on behalf of an execution engine.
    fn execute(&self, action: &CustomAction, ctx: &mut dyn ActionContext) -> Result<(), ActionError>;

    /// Whether the children of the action element are to be captured
    /// as foreign content (see [`CustomAction::content`]).
    fn accepts_foreign_content(&self) -> bool {
        false
    }
}

/// A vendor-defined action in the model,
/// i.e., the implementation produced by the registry together with the element it was read from.
#[derive(Debug, Clone)]
pub struct CustomAction {
    namespace: String,
    name: String,
    prefix: Option<String>,
    namespaces: Vec<NsBinding>,
    attributes: Vec<(String, String)>,
    content: Vec<ForeignNode>,
    implementation: Arc<dyn CustomActionImpl>,
}

impl CustomAction {
    /// Creates a new custom action for the element `name` of the given namespace.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        implementation: Box<dyn CustomActionImpl>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            prefix: None,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            content: Vec::new(),
            implementation: Arc::from(implementation),
        }
    }

    /// Sets the prefix the element is written with.
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Sets the namespace bindings to be declared on the element.
    pub fn with_namespaces(mut self, namespaces: Vec<NsBinding>) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Sets the (qualified name, unescaped value) attributes of the element.
    pub fn with_attributes(mut self, attributes: Vec<(String, String)>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the foreign content of the element.
    pub fn with_content(mut self, content: Vec<ForeignNode>) -> Self {
        self.content = content;
        self
    }

    /// Namespace URI of the element (empty if the element has no namespace).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Local name of the element.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prefix of the element, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Qualified name of the element.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Namespace bindings declared on the element.
    pub fn namespaces(&self) -> &[NsBinding] {
        &self.namespaces
    }

    /// Attributes of the element, excluding namespace declarations.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Value of the attribute with the given qualified name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The captured child nodes, in document order.
    pub fn content(&self) -> &[ForeignNode] {
        &self.content
    }

    /// The implementation of the action.
    pub fn implementation(&self) -> &dyn CustomActionImpl {
        self.implementation.as_ref()
    }

    /// The implementation of the action, if it is of type `T`.
    pub fn implementation_as<T: CustomActionImpl + 'static>(&self) -> Option<&T> {
        self.implementation.as_ref().as_any().downcast_ref::<T>()
    }

    /// Executes the action through its implementation.
    pub fn execute(&self, ctx: &mut dyn ActionContext) -> Result<(), ActionError> {
        self.implementation.execute(self, ctx)
    }
}

impl PartialEq for CustomAction {
    // Implementations are compared by type only.
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace
            && self.name == other.name
            && self.prefix == other.prefix
            && self.namespaces == other.namespaces
            && self.attributes == other.attributes
            && self.content == other.content
            && self.implementation.as_ref().as_any().type_id()
                == other.implementation.as_ref().as_any().type_id()
    }
}

/// Produces a fresh implementation for every occurrence of a custom action.
pub type ActionFactory = Arc<dyn Fn() -> Box<dyn CustomActionImpl> + Send + Sync>;

/// Maps `(namespace, local name)` pairs to [`ActionFactory`]s.
///
/// Registering twice under the same key replaces the previous factory:
/// the last registration wins, with no error.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    factories: HashMap<String, HashMap<String, ActionFactory>>,
}

impl Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for the given element,
    /// returning the factory it replaces, if any.
    ///
    /// ```
    /// # use scxmlio_core::*;
    /// #[derive(Debug, Default)]
    /// struct Hello;
    ///
    /// impl CustomActionImpl for Hello {
    ///     fn execute(&self, _: &CustomAction, ctx: &mut dyn ActionContext) -> Result<(), ActionError> {
    ///         ctx.log(None, "hello");
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let mut registry = ExtensionRegistry::new();
    /// assert!(registry.register("http://my.custom-actions.domain", "hello", || Box::new(Hello)).is_none());
    /// assert!(registry.lookup("http://my.custom-actions.domain", "hello").is_some());
    /// assert!(registry.lookup("http://my.custom-actions.domain", "bye").is_none());
    /// ```
    pub fn register<F>(
        &mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        factory: F,
    ) -> Option<ActionFactory>
    where
        F: Fn() -> Box<dyn CustomActionImpl> + Send + Sync + 'static,
    {
        let namespace = namespace.into();
        let name = name.into();
        let previous = self
            .factories
            .entry(namespace.clone())
            .or_default()
            .insert(name.clone(), Arc::new(factory));
        if previous.is_some() {
            debug!(target: "registry", "replacing custom action '{{{namespace}}}{name}'");
        }
        previous
    }

    /// Registers `T::default` as the factory for the given element.
    pub fn register_default<T>(
        &mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Option<ActionFactory>
    where
        T: CustomActionImpl + Default + 'static,
    {
        self.register(namespace, name, || Box::new(T::default()))
    }

    /// Looks up the factory registered for the given element.
    pub fn lookup(&self, namespace: &str, name: &str) -> Option<&ActionFactory> {
        self.factories.get(namespace)?.get(name)
    }

    /// Number of registered elements.
    pub fn len(&self) -> usize {
        self.factories.values().map(HashMap::len).sum()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over the registered `(namespace, local name)` pairs.
    pub fn keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.factories.iter().flat_map(|(namespace, names)| {
            names
                .keys()
                .map(move |name| (namespace.as_str(), name.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://example/actions";

    #[derive(Debug, Default)]
    struct First;

    impl CustomActionImpl for First {
        fn execute(&self, _: &CustomAction, ctx: &mut dyn ActionContext) -> Result<(), ActionError> {
            ctx.raise("first");
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Second;

    impl CustomActionImpl for Second {
        fn execute(&self, _: &CustomAction, _: &mut dyn ActionContext) -> Result<(), ActionError> {
            Err(ActionError("second".to_string()))
        }

        fn accepts_foreign_content(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl ActionContext for Recorder {
        fn raise(&mut self, event: &str) {
            self.0.push(event.to_string());
        }

        fn log(&mut self, _label: Option<&str>, message: &str) {
            self.0.push(message.to_string());
        }
    }

    fn instantiate(registry: &ExtensionRegistry) -> Box<dyn CustomActionImpl> {
        registry.lookup(NS, "action").expect("registered")()
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = ExtensionRegistry::new();
        assert!(registry.register_default::<First>(NS, "action").is_none());
        assert!(registry.register_default::<Second>(NS, "action").is_some());
        assert_eq!(registry.len(), 1);
        let action = CustomAction::new(NS, "action", instantiate(&registry));
        assert!(action.implementation_as::<Second>().is_some());
        assert!(action.implementation_as::<First>().is_none());
        assert!(action.implementation().accepts_foreign_content());
    }

    #[test]
    fn lookup_is_keyed_on_namespace_and_name() {
        let mut registry = ExtensionRegistry::new();
        registry.register_default::<First>(NS, "action");
        assert!(registry.lookup(NS, "other").is_none());
        assert!(registry.lookup("http://example/other", "action").is_none());
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec![(NS, "action")]);
    }

    #[test]
    fn execute_dispatches_to_implementation() {
        let mut ctx = Recorder::default();
        let first = CustomAction::new(NS, "action", Box::new(First));
        first.execute(&mut ctx).expect("first succeeds");
        assert_eq!(ctx.0, vec!["first".to_string()]);
        let second = CustomAction::new(NS, "action", Box::new(Second));
        assert_eq!(
            second.execute(&mut ctx),
            Err(ActionError("second".to_string()))
        );
    }

    #[test]
    fn equality_compares_implementation_types() {
        let first = CustomAction::new(NS, "action", Box::new(First));
        assert_eq!(first, CustomAction::new(NS, "action", Box::new(First)));
        assert_ne!(first, CustomAction::new(NS, "action", Box::new(Second)));
        assert_ne!(
            first,
            CustomAction::new(NS, "action", Box::new(First))
                .with_attributes(vec![("id".to_string(), "a".to_string())])
        );
    }

    #[test]
    fn attributes_and_qualified_name() {
        let action = CustomAction::new(NS, "action", Box::new(First))
            .with_prefix(Some("my".to_string()))
            .with_attributes(vec![("name".to_string(), "x".to_string())]);
        assert_eq!(action.qualified_name(), "my:action");
        assert_eq!(action.attribute("name"), Some("x"));
        assert_eq!(action.attribute("other"), None);
    }
}
