//! supersede library for migrating callers of deprecated Python APIs.
//!
//! This library provides programmatic access to the migration
//! functionality. The core workflow involves three phases:
//!
//! 1. **Collection**: Find constructs carrying the `replace_me` marker and
//!    extract a replacement template from each deprecated body
//! 2. **Substitution**: Locate call sites of those constructs and bind the
//!    caller's argument texts into the template placeholders
//! 3. **Rewriting**: Splice the substituted texts back into the source,
//!    leaving everything else byte-for-byte intact
//!
//! # Example
//!
//! ```
//! use supersede::migrate;
//!
//! let source = "\
//! @replace_me(since=\"1.0\")
//! def old_func(x):
//!     return new_func(x * 2)
//!
//! result = old_func(21)
//! ";
//!
//! let outcome = migrate::migrate_source(source, None).unwrap();
//! assert!(outcome.text.contains("result = new_func(21 * 2)"));
//! ```

pub mod check;
pub mod cli;
pub mod collector;
pub mod interactive;
pub mod migrate;
pub mod model;
pub mod remover;
pub mod replacer;
pub mod resolver;
pub mod rewriter;
pub mod version;

// Re-export commonly used types at crate root
pub use model::{Construct, ConstructKind, ExtractionFailure, FailureReason, ReplacementTemplate};
pub use replacer::Candidate;
