use serde::Serialize;

/// `name@version` of a resolved package.
pub fn package_key(name: &str, version: &str) -> String {
    format!("{}@{}", name, version)
}

/// A package whose license is not green.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub name: String,
    pub version: String,
    pub license: Option<String>,
    /// Resolved `name@version` of every ancestor, root first.
    pub ancestors: Vec<String>,
}

impl Finding {
    pub fn key(&self) -> String {
        package_key(&self.name, &self.version)
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.key(),
            self.license.as_deref().unwrap_or("(no license)")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageErrorKind {
    /// The manifest could not be fetched or read.
    Fetch,
    /// The manifest was fetched but failed validation.
    InvalidManifest,
}

impl std::fmt::Display for PackageErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageErrorKind::Fetch => write!(f, "fetch"),
            PackageErrorKind::InvalidManifest => write!(f, "invalid manifest"),
        }
    }
}

/// A per-package failure. It is reported and the traversal moves on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageError {
    pub kind: PackageErrorKind,
    pub message: String,
    pub package_name: String,
    /// The version specifier as requested by the parent, before resolution.
    pub requested_version: Option<String>,
    pub ancestors: Vec<String>,
}

impl std::fmt::Display for PackageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.requested_version {
            Some(spec) => write!(f, "{}@{}: {}", self.package_name, spec, self.message),
            None => write!(f, "{}: {}", self.package_name, self.message),
        }
    }
}

/// Everything one traversal produced, in emission order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraversalReport {
    pub findings: Vec<Finding>,
    pub errors: Vec<PackageError>,
    /// Manifest files checked as roots (local and pull request runs).
    pub visited: Vec<String>,
    /// `name@spec` of every manifest requested from the registry.
    pub requested: Vec<String>,
}

impl TraversalReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.errors.is_empty()
    }
}
