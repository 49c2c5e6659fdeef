//! Code coverage collection over CDP
//!
//! Records which parts of a page's JavaScript and CSS actually ran.
//!
//! ## Flow
//!
//! ```text
//! start ──► subscribe + enable domains
//!             │
//!   scriptParsed / styleSheetAdded ──► fetch text ──► SourceRegistry
//!   executionContextsCleared       ──► reset registry (optional)
//!             │
//! stop  ──► take usage, disable domains, unsubscribe
//!             │
//!   per source: registry text + usage ranges ──► reduce() ──► CoverageEntry
//! ```
//!
//! The output is raw: a URL, its text, and the disjoint spans that ran.
//! Percentages and reports are left to the caller.

pub mod css;
pub mod entry;
pub mod error;
pub mod events;
pub mod facade;
pub(crate) mod fetch;
pub mod js;
pub mod listeners;
pub mod protocol;
pub mod range;
pub mod registry;

#[cfg(test)]
mod mock;

pub use css::{CssCoverage, CssCoverageOptions};
pub use entry::CoverageEntry;
pub use error::{CoverageError, Result};
pub use facade::Coverage;
pub use js::{JsCoverage, JsCoverageOptions};
pub use range::{reduce, CoverageRange, UsedRange};
