use std::fmt;

use crate::error::CheckError;
use crate::registry::range::{parse_exact, RangeSet};
use crate::Result;

/// Tag used when a package argument names no version.
pub const DEFAULT_TAG: &str = "latest";

/// What kind of version specifier a dependency edge uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecKind {
    Tag,
    Version,
    Range,
    File,
    Git,
    Remote,
    Alias,
}

impl SpecKind {
    /// Kinds the registry can resolve.
    pub fn is_registry(&self) -> bool {
        matches!(self, SpecKind::Tag | SpecKind::Version | SpecKind::Range)
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecKind::Tag => write!(f, "tag"),
            SpecKind::Version => write!(f, "version"),
            SpecKind::Range => write!(f, "range"),
            SpecKind::File => write!(f, "file"),
            SpecKind::Git => write!(f, "git"),
            SpecKind::Remote => write!(f, "remote"),
            SpecKind::Alias => write!(f, "alias"),
        }
    }
}

/// Whether `spec` points at a path on disk (`file:`, `./`, `../` or absolute).
pub fn is_file_spec(spec: &str) -> bool {
    spec.starts_with("file:")
        || spec.starts_with("./")
        || spec.starts_with("../")
        || spec.starts_with('/')
}

/// Classify a version specifier the way npm would.
pub fn classify_spec(spec: &str) -> Result<SpecKind> {
    let spec = spec.trim();

    if spec.starts_with("npm:") {
        return Ok(SpecKind::Alias);
    }
    if is_file_spec(spec) {
        return Ok(SpecKind::File);
    }
    if spec.starts_with("git+")
        || spec.starts_with("git:")
        || spec.starts_with("github:")
        || spec.starts_with("gitlab:")
        || spec.starts_with("bitbucket:")
        || spec.ends_with(".git")
    {
        return Ok(SpecKind::Git);
    }
    if spec.starts_with("http://") || spec.starts_with("https://") {
        return Ok(SpecKind::Remote);
    }
    // "user/repo" shorthand for a GitHub repository
    if spec.contains('/') {
        return Ok(SpecKind::Git);
    }
    if parse_exact(spec).is_some() {
        return Ok(SpecKind::Version);
    }
    if RangeSet::parse(spec).is_ok() {
        return Ok(SpecKind::Range);
    }
    if is_valid_tag(spec) {
        return Ok(SpecKind::Tag);
    }

    Err(CheckError::InvalidSpec {
        spec: spec.to_string(),
        reason: "not a tag, version or range".to_string(),
    })
}

/// Fail with `UnsupportedSpec` unless the registry can resolve `spec`.
pub fn ensure_registry_spec(spec: &str) -> Result<SpecKind> {
    let kind = classify_spec(spec)?;
    if kind.is_registry() {
        Ok(kind)
    } else {
        Err(CheckError::UnsupportedSpec {
            spec: spec.to_string(),
            kind: kind.to_string(),
        })
    }
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && !tag.chars().any(|c| c.is_whitespace() || c == '%' || c == '@')
        && urlencoding::encode(tag) == tag
}

/// A `name[@spec]` package argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub spec: String,
    pub kind: SpecKind,
}

impl PackageSpec {
    /// Parse `foo`, `foo@^1.2.0`, `@scope/foo@latest` and friends.
    ///
    /// Only registry specifiers are accepted; a git URL or path fails with
    /// `UnsupportedSpec`.
    pub fn parse(arg: &str) -> Result<Self> {
        let arg = arg.trim();
        let split_at = if let Some(rest) = arg.strip_prefix('@') {
            rest.find('@').map(|i| i + 1)
        } else {
            arg.find('@')
        };

        let (name, spec) = match split_at {
            Some(i) => (&arg[..i], &arg[i + 1..]),
            None => (arg, ""),
        };
        let spec = if spec.trim().is_empty() {
            DEFAULT_TAG
        } else {
            spec.trim()
        };

        validate_name(name).map_err(|reason| CheckError::InvalidSpec {
            spec: arg.to_string(),
            reason,
        })?;
        let kind = ensure_registry_spec(spec)?;

        Ok(PackageSpec {
            name: name.to_string(),
            spec: spec.to_string(),
            kind,
        })
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.spec)
    }
}

fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("package name is empty".into());
    }
    if name.starts_with('.') || name.starts_with('_') {
        return Err("package name cannot start with . or _".into());
    }
    if name.chars().any(char::is_whitespace) {
        return Err("package name cannot contain whitespace".into());
    }
    if let Some(scoped) = name.strip_prefix('@') {
        match scoped.split_once('/') {
            Some((scope, pkg)) if !scope.is_empty() && !pkg.is_empty() && !pkg.contains('/') => {}
            _ => return Err("scoped package name must look like @scope/name".into()),
        }
    } else if name.contains('/') {
        return Err("package name cannot contain /".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name_defaults_to_latest() {
        let spec = PackageSpec::parse("foo").unwrap();
        assert_eq!(spec.name, "foo");
        assert_eq!(spec.spec, "latest");
        assert_eq!(spec.kind, SpecKind::Tag);
        assert_eq!(spec.to_string(), "foo@latest");
    }

    #[test]
    fn test_parse_versions_and_ranges() {
        let spec = PackageSpec::parse("foo@1.2.3").unwrap();
        assert_eq!(spec.kind, SpecKind::Version);
        let spec = PackageSpec::parse("foo@^1.2.0").unwrap();
        assert_eq!(spec.kind, SpecKind::Range);
        let spec = PackageSpec::parse("foo@next").unwrap();
        assert_eq!(spec.kind, SpecKind::Tag);
    }

    #[test]
    fn test_parse_scoped() {
        let spec = PackageSpec::parse("@scope/pkg@~2.0.0").unwrap();
        assert_eq!(spec.name, "@scope/pkg");
        assert_eq!(spec.spec, "~2.0.0");

        let spec = PackageSpec::parse("@scope/pkg").unwrap();
        assert_eq!(spec.name, "@scope/pkg");
        assert_eq!(spec.spec, "latest");
    }

    #[test]
    fn test_rejects_unsupported_specs() {
        for arg in [
            "foo@git+https://github.com/a/b.git",
            "foo@file:../foo",
            "foo@https://example.com/foo.tgz",
            "foo@npm:bar@1.0.0",
            "foo@user/repo",
        ] {
            let err = PackageSpec::parse(arg).unwrap_err();
            assert!(
                matches!(err, CheckError::UnsupportedSpec { .. }),
                "{} gave {:?}",
                arg,
                err
            );
        }
    }

    #[test]
    fn test_rejects_invalid_names() {
        assert!(PackageSpec::parse("@scope").is_err());
        assert!(PackageSpec::parse(".hidden").is_err());
        assert!(PackageSpec::parse("a/b").is_err());
        assert!(PackageSpec::parse("@1.0.0").is_err());
    }

    #[test]
    fn test_classify_spec() {
        assert_eq!(classify_spec("file:../x").unwrap(), SpecKind::File);
        assert_eq!(classify_spec("./x").unwrap(), SpecKind::File);
        assert_eq!(classify_spec("github:a/b").unwrap(), SpecKind::Git);
        assert_eq!(classify_spec("*").unwrap(), SpecKind::Range);
        assert_eq!(classify_spec(">=1.0.0 <2.0.0").unwrap(), SpecKind::Range);
        assert!(classify_spec("not a tag").is_err());
    }
}
