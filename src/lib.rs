//! Wayland protocol XML scanner, validator and Rust-source emitter.
//!
//! ## Description
//!
//! - `scanner`: a streaming pushdown recognizer over a byte source, producing
//!   [`event::Event`]s with position information.
//! - `validator`: consumes those events to enforce the protocol schema and
//!   build a typed [`ir::Protocol`] tree.
//! - `emitter`: walks a finalized `ir::Protocol` and writes generated Rust
//!   source (namespaces, opcode enums, tagged unions, packed bitfields).
//!
//! ## Example
//!
//! ```rust
//! let xml = br#"<protocol name="demo">
//!     <interface name="greeter" version="1">
//!         <request name="hello"><arg name="who" type="string"/></request>
//!     </interface>
//! </protocol>"#;
//!
//! let mut out = Vec::new();
//! spark::generate(xml.as_slice(), &mut out).unwrap();
//! assert!(String::from_utf8(out).unwrap().contains("pub mod demo {"));
//! ```
#![forbid(unsafe_code)]
#![deny(missing_docs)]

use std::io::{Read, Write};

pub mod emitter;
pub mod error;
pub mod event;
pub mod ir;
pub mod position;
pub mod scanner;
pub mod tag;
pub mod validator;

pub use error::{Error, Result};

/// Runs the full pipeline: scan `reader`, validate and build the IR, then
/// emit generated Rust source to `writer`.
pub fn generate<W: Write + ?Sized>(reader: impl Read, writer: &mut W) -> Result<()> {
    let protocol = validator::build(reader)?;
    emitter::emit(&protocol, writer)
}
