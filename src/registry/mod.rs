//! Where manifests come from.
//!
//! [`npm`] fetches published manifests from the registry, [`local`] reads
//! `package.json` files from disk, and [`github`] reads them from a repository
//! snapshot. All of them hand back raw `serde_json::Value`s; validation is the
//! checker's job.

pub mod github;
pub mod local;
pub mod npm;
pub mod range;
pub mod spec;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// A source of published package manifests.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Fetch the manifest of the version of `name` that `spec` selects.
    async fn fetch_manifest(&self, name: &str, spec: &str) -> Result<Value>;
}
