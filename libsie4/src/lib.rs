//! libsie4 - a codec for the SIE4 accounting interchange format
//! ---
//!
//! SIE4 is the line-oriented, `#LABEL`-tagged text format Swedish
//! bookkeeping programs use to exchange charts of accounts, balances and
//! journal entries. This crate parses such files into a [`Document`],
//! validates them for either side of the interchange, and writes them
//! back in canonical form, optionally sealed with the trailing `#KSUMMA`
//! CRC-32 post.
//!
//! ```no_run
//! # fn run() -> libsie4::Result<()> {
//! use std::path::Path;
//!
//! let doc = libsie4::parse_file(Path::new("export.se"))?;
//! libsie4::validate_export(&doc)?;
//! let text = libsie4::write(&doc, true)?;
//! # let _ = text;
//! # Ok(())
//! # }
//! ```
//!
//! Parsing and writing are single-pass and keep all state in per-call
//! accumulators; independent documents can be processed concurrently.

extern crate pest;
#[macro_use]
extern crate pest_derive;

/// The chart of accounts: account records, their classes and SRU codes.
pub mod account;

/// Balance, result and period posts.
pub mod balance;

/// Dimensions, sub-dimensions and their coded objects.
pub mod dimension;

/// Typed wire posts and the field cursor.
mod directive;

/// The document graph and the identification block.
pub mod document;

/// CP437 transcoding at the file boundary.
pub mod encoding;

pub mod error;

/// Journal entries and their lines.
pub mod journal;

/// Our main parser entrypoints and the phase state machine.
pub mod parser;

/// Import/export validation rules.
pub mod validator;

/// The canonical writer and the KSUMMA accumulator.
pub mod writer;

pub use document::Document;
pub use error::{Result, SieError};
pub use parser::{parse, parse_bytes, parse_file};
pub use validator::{validate, validate_export, validate_import, Target};
pub use writer::{write, write_file};
