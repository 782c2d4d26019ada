//! `detok_core` is the core library for the detok token substitution tool.
//! It finds `$(Token)` placeholders in text files and replaces them with
//! build-time values, rewriting each file in place only when something
//! changed.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Target source (file list, directory, or directory tree)
//!   → Traversal (enumerates files, keeps processed/rewritten counters)
//!   → Encoding (sniffs the byte order mark, decodes, negotiates the write encoding)
//!   → Engine (finds tokens with the pattern, resolves keys, builds the new text)
//!   → Write-back (only when a token matched or force-write is set)
//! ```
//!
//! ## Modules
//!
//! - [`config`] — Configuration loading from `detok.toml`.
//! - [`encoding`] — Byte order mark detection, decoding, and write encodings.
//! - [`pattern`] — Token pattern compilation and matching.
//! - [`properties`] — Property stores used in external lookup mode.
//!
//! ## Resolution Modes
//!
//! A run resolves keys in exactly one way. When a [`ReplacementSet`] is
//! supplied, only its entries are consulted. Otherwise keys are looked up in
//! a [`PropertyStore`], such as build properties loaded from a JSON file.
//! Either way, a token that cannot be resolved stops the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use detok_core::Detokeniser;
//! use detok_core::ReplacementEntry;
//! use detok_core::ReplacementSet;
//! use detok_core::Resolver;
//! use detok_core::RunOptions;
//! use detok_core::TargetSource;
//! use detok_core::pattern::TokenPattern;
//!
//! let replacements = ReplacementSet::new([ReplacementEntry::new("Version", "1.2.3")]).unwrap();
//! let detokeniser = Detokeniser::new(
//! 	TokenPattern::default(),
//! 	Resolver::Explicit(&replacements),
//! 	RunOptions::default(),
//! );
//!
//! let result = detokeniser.run(&TargetSource::from_path("dist/*")).unwrap();
//! println!(
//! 	"{} processed, {} rewritten",
//! 	result.files_processed, result.files_rewritten
//! );
//! ```

pub use config::*;
pub use engine::*;
pub use error::*;
pub use resolver::*;
pub use traversal::*;

pub mod config;
pub mod encoding;
mod engine;
#[allow(unused_assignments)]
mod error;
pub mod pattern;
pub mod properties;
mod resolver;
mod traversal;
