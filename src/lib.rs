//! `scxmlio` reads, validates and rewrites SCXML (State Chart XML) documents.
//!
//! The document model lives in [`scxmlio_fmt::scxmlio_core`],
//! the reader and the writer in [`scxmlio_fmt`];
//! this crate only provides the command line interface on top of them.

mod cli;
mod summary;

pub use cli::Cli;
pub use scxmlio_fmt;
pub use summary::Summary;
