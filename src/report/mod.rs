//! Report renderers for traversal results.
//!
//! - [`terminal`]: colored summary box, then tables of non-green packages
//!   (with the chain that pulled them in) and of packages that failed to check.
//!
//! JSON output is the serialized [`TraversalReport`](crate::models::TraversalReport).

pub mod terminal;
