//! License normalization and green/non-green classification.
//!
//! - [`spdx`]: SPDX identifier table and correction of free-form strings.
//! - [`expression`]: SPDX expression parser and the satisfaction check.
//! - [`classifier`]: [`RuleSet`](classifier::RuleSet) construction and
//!   the `normalize` / `is_green` entry points used by the traversal.

pub mod classifier;
pub mod expression;
pub mod spdx;

pub use classifier::{is_green, normalize, RuleSet, DEFAULT_GREEN_LICENSES};
