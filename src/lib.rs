//! wiretree - decode captured HTTP traffic into a queryable document tree.
//!
//! This crate is the command-line front end; the document model, the
//! conversion engine and the query languages live in [`wiretree_core`],
//! which is re-exported here.
//!
//! # Example
//!
//! ```no_run
//! use wiretree::cli::{OutputFormat, OutputFormatter, Session};
//! use wiretree::Converter;
//!
//! fn main() -> anyhow::Result<()> {
//!     let session = Session::new(Converter::new(), OutputFormatter::new(OutputFormat::Text));
//!     session.load("traffic.jsonl".as_ref())?;
//!     session.run_paths(&["$.header.Authorization.BearerToken.body.sub".to_string()], &mut std::io::stdout())?;
//!     Ok(())
//! }
//! ```

pub mod cli;

pub use wiretree_core::*;
