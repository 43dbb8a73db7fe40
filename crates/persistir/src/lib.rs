//! Persistir: lexical rewriter for `$persist` call sites.
//!
//! Rewrites `$persist(initial, key, options?)` initializers into reactive
//! state that loads a persisted value on initialization and re-saves it on
//! change, producing rewritten text plus a v3 source map. The engine is a
//! single linear scan over raw source text, not a parser: malformed or
//! unresolvable occurrences are skipped, never fatal.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Preprocessor │──►│   Locator    │──►│   Planner    │──►│ Editor + Map │
//! │ (gate/entry) │   │ (call sites) │   │ (grouping,   │   │ (apply edits,│
//! │              │   │              │   │  anchors)    │   │  render map) │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Data flows one way; each transform call holds all its state on the stack,
//! so the host pipeline may run files concurrently.
//!
//! # Example
//!
//! ```
//! use persistir::prelude::*;
//!
//! let out = Preprocessor::new()
//!     .script("let name = $persist('John', 'name');", Some("store.svelte.js"))
//!     .unwrap();
//! assert!(out.code.contains("__persist.load('name', undefined) ?? 'John'"));
//! assert_eq!(out.map.unwrap().version, 3);
//! ```

#![warn(missing_docs)]

pub mod edit;
pub mod error;
pub mod locate;
pub mod plan;
pub mod scan;
pub mod sourcemap;
pub mod transform;

pub use error::{PersistirError, Result};
pub use locate::{CallSite, MARKER};
pub use sourcemap::SourceMap;
pub use transform::{
    is_persist_module_id, rewrite_module, transform, Preprocessor, Processed, Transformed,
    DEFAULT_FILENAME, IMPORT_STATEMENT,
};

/// Convenience re-exports for callers.
pub mod prelude {
    pub use crate::error::{PersistirError, Result};
    pub use crate::sourcemap::SourceMap;
    pub use crate::transform::{
        is_persist_module_id, rewrite_module, transform, Preprocessor, Processed, Transformed,
    };
}
