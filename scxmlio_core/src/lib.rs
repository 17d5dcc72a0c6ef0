//! In-memory model of SCXML (State Chart XML) documents.
//!
//! A [`Document`] is an arena of state-like [`Node`]s addressed by [`NodeId`].
//! Parent/child relations are plain containment,
//! while every cross reference (transition targets, initial states, history defaults)
//! is declared by identifier and resolved into [`NodeId`]s by [`DocumentBuilder::build`].
//!
//! Vendor-defined executable content is supported through the [`ExtensionRegistry`],
//! which maps a `(namespace, local name)` pair to a factory of [`CustomActionImpl`]s.
//!
//! ```
//! # use scxmlio_core::*;
//! let mut builder = DocumentBuilder::new();
//! let idle = builder.add_state(None, Some("idle".to_string())).expect("top-level state");
//! let done = builder.add_final(None, Some("done".to_string())).expect("top-level final");
//! builder
//!     .add_transition(idle, Transition::new().with_events(["stop"]).with_targets(["done"]))
//!     .expect("states accept transitions");
//! let document = builder.build().expect("every reference resolves");
//!
//! assert_eq!(document.initial_targets(), &[idle]);
//! assert_eq!(document[idle].transitions()[0].target_nodes(), &[done]);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod executable;
mod extension;
mod markup;
mod model;

pub use executable::*;
pub use extension::*;
pub use markup::*;
pub use model::*;

/// Namespace of core SCXML elements.
pub const SCXML_NS: &str = "http://www.w3.org/2005/07/scxml";
