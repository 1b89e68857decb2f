//! Schema-driven importer for COBOL-copybook-style fixed-width flat files.
//!
//! A YAML [`layout::Layout`] describes where each field sits on the line and
//! how its text decodes (dates, overpunch-signed numerics, implied decimal
//! places, trimmed strings, boolean flags). A [`parser::LineParser`] turns
//! one line into one entity, or in graph mode into a parent entity plus the
//! children of its repeating `OCCURS` groups. Entities are plain structs
//! wired in through the [`record::Record`] trait, most conveniently via the
//! [`flat_record!`] macro, and gated behind an [`record::EntityRegistry`]
//! allow-list so layouts can only instantiate what the host registered.
//!
//! Parsing one line is pure CPU and the parser borrows everything immutably,
//! so a single layout, registry and context can serve any number of worker
//! threads. File enumeration, batching and persistence belong to the caller.

#[macro_use]
extern crate lazy_static;

pub mod error;
pub mod field_parser;
pub mod layout;
pub mod manifest;
pub mod overpunch;
#[macro_use]
pub mod record;
pub mod slice;
pub mod source;
pub mod value;
pub mod parser;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::layout::{Layout, ParsingRules};
pub use crate::manifest::{ImportJob, ImportMode, Manifest};
pub use crate::parser::{ImportContext, LineParser};
pub use crate::record::{EntityRegistry, Record};
pub use crate::value::Value;
