use std::path::PathBuf;

use thiserror::Error;

/// Every failure the checker can report.
///
/// Per-package failures (`InvalidManifest`, the fetch family) are caught by the
/// traversal and surfaced as [`PackageError`](crate::models::PackageError)
/// events. The remaining variants abort the entry point that raised them.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Invalid manifest for {package}: {reason}")]
    InvalidManifest { package: String, reason: String },

    #[error("Package {name} not found in the registry")]
    PackageNotFound { name: String },

    #[error("No version of {name} matches {spec}")]
    VersionNotFound { name: String, spec: String },

    #[error("Request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unsupported version specifier {spec} ({kind}); only tags, versions and ranges are supported")]
    UnsupportedSpec { spec: String, kind: String },

    #[error("Invalid package specifier {spec}: {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("Invalid config file {path}: {reason}")]
    ConfigInvalid { path: String, reason: String },

    #[error("Failed to read {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse JSON in {path}: {source}")]
    ParseJson {
        path: String,
        source: serde_json::Error,
    },

    #[error("Tried to confirm mergeability of the pull request, but gave up after {attempts} attempts")]
    MergeabilityUnknown { attempts: u32 },

    #[error("Pull request #{pr} is not mergeable")]
    PullRequestNotMergeable { pr: u64 },

    #[error("{field} not found for pull request #{pr}")]
    MissingCommitSha { pr: u64, field: &'static str },

    #[error("Content of {path} not found in the response")]
    ContentNotFound { path: String },

    #[error("GitHub request to {url} returned {status}")]
    GitHubStatus { url: String, status: u16 },

    #[error("Invalid pull request reference {reference}; expected owner/repo/pull/N")]
    InvalidPullRequest { reference: String },
}
