//! Reader and writer of SCXML (State Chart XML) documents.
//!
//! ```
//! # use scxmlio_fmt::*;
//! let source = r#"<scxml xmlns="http://www.w3.org/2005/07/scxml" version="1.0">
//!     <state id="idle"><transition event="go" target="done"/></state>
//!     <final id="done"/>
//! </scxml>"#;
//! let document = parse_str(source, None).expect("valid document");
//! let output = write(&document).expect("write to buffer");
//! let reread = parse(&output, None).expect("valid document");
//! assert_eq!(document, reread);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod reader;
mod vocabulary;
mod writer;

pub use reader::{parse, parse_file, parse_reader, parse_str, ReadError, SyntaxError};
pub use scxmlio_core;
pub use writer::{write, write_to, write_with, WriteError, WriterConfig};
