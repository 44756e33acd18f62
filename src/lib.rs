//! `green-licenses`: check that an npm package and its whole dependency tree
//! only use licenses from an approved ("green") list.
//!
//! The [`checker::LicenseChecker`] walks the tree from a published package, a
//! local directory (monorepos included) or a GitHub pull request, classifying
//! each package's declared license with [`license::is_green`].

pub mod checker;
pub mod config;
pub mod error;
pub mod license;
pub mod manifest;
pub mod models;
pub mod registry;
pub mod report;

pub use checker::{CheckObserver, CheckerOptions, LicenseChecker};
pub use error::CheckError;
pub use models::{Finding, PackageError, TraversalReport};

pub type Result<T> = std::result::Result<T, CheckError>;
