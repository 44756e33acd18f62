//! Typed, validated view of a `package.json` manifest.

use serde_json::{Map, Value};

use crate::error::CheckError;
use crate::Result;

/// Version used for allow-listed packages whose manifest has no valid version.
pub const FALLBACK_VERSION: &str = "0.0.0";

/// Pseudo-license reported for private packages that declare none.
pub const PRIVATE_LICENSE: &str = "private";

/// One entry of the legacy `license`/`licenses` object form:
/// `{ "type": "MIT", "url": "..." }`.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyLicense {
    pub kind: Option<String>,
    pub url: Option<String>,
}

/// The shapes a `license` or `licenses` field can take.
#[derive(Debug, Clone, PartialEq)]
pub enum LicenseField {
    Expression(String),
    Legacy(LegacyLicense),
    LegacyList(Vec<LegacyLicense>),
}

/// A parsed manifest. Dependencies keep their declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub private: bool,
    pub license: Option<LicenseField>,
    pub licenses: Option<LicenseField>,
    pub dependencies: Vec<(String, String)>,
    pub dev_dependencies: Vec<(String, String)>,
}

impl Manifest {
    /// Validate `raw` and build a manifest from it.
    ///
    /// A non-private manifest must have string `name` and `version`. License
    /// fields must be a string, a legacy object or an array of legacy objects.
    /// Dependency maps must map every name to a string.
    pub fn parse(raw: &Value) -> Result<Self> {
        let label = raw
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();
        let invalid = |reason: String| CheckError::InvalidManifest {
            package: label.clone(),
            reason,
        };

        let object = raw
            .as_object()
            .ok_or_else(|| invalid("manifest is not a JSON object".into()))?;

        let private = match object.get("private") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(invalid("\"private\" must be a boolean".into())),
        };

        let name = optional_string(object, "name").map_err(&invalid)?;
        let version = optional_string(object, "version").map_err(&invalid)?;
        if !private {
            if name.is_none() {
                return Err(invalid("missing \"name\"".into()));
            }
            if version.is_none() {
                return Err(invalid("missing \"version\"".into()));
            }
        }

        Ok(Manifest {
            name,
            version,
            private,
            license: license_field(object, "license").map_err(&invalid)?,
            licenses: license_field(object, "licenses").map_err(&invalid)?,
            dependencies: dependency_map(object, "dependencies").map_err(&invalid)?,
            dev_dependencies: dependency_map(object, "devDependencies").map_err(&invalid)?,
        })
    }

    /// Build a manifest for an allow-listed package without validating it.
    ///
    /// Only the version is checked: a missing or non-semver version becomes
    /// [`FALLBACK_VERSION`]. License fields are dropped and dependency entries
    /// that are not strings are skipped.
    pub fn allowlisted(raw: &Value, name: &str) -> Self {
        let version = raw
            .get("version")
            .and_then(Value::as_str)
            .filter(|v| semver::Version::parse(v).is_ok())
            .unwrap_or(FALLBACK_VERSION)
            .to_string();

        let lenient = |key: &str| -> Vec<(String, String)> {
            raw.get(key)
                .and_then(Value::as_object)
                .map(|deps| {
                    deps.iter()
                        .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                        .collect()
                })
                .unwrap_or_default()
        };

        Manifest {
            name: Some(name.to_string()),
            version: Some(version),
            private: raw.get("private").and_then(Value::as_bool).unwrap_or(false),
            license: None,
            licenses: None,
            dependencies: lenient("dependencies"),
            dev_dependencies: lenient("devDependencies"),
        }
    }

    /// The declared license as a single string.
    ///
    /// `license` wins over `licenses`. A legacy list with one distinct type
    /// yields that type, several yield `(A OR B)`. A private manifest without
    /// either field yields `"private"`.
    pub fn license(&self) -> Option<String> {
        let declared = [&self.license, &self.licenses]
            .into_iter()
            .flatten()
            .find_map(LicenseField::as_license_string);

        match declared {
            Some(license) => Some(license),
            None if self.private && self.license.is_none() && self.licenses.is_none() => {
                Some(PRIVATE_LICENSE.to_string())
            }
            None => None,
        }
    }
}

impl LicenseField {
    fn as_license_string(&self) -> Option<String> {
        match self {
            LicenseField::Expression(s) => Some(s.clone()),
            LicenseField::Legacy(legacy) => legacy.kind.clone().filter(|k| !k.is_empty()),
            LicenseField::LegacyList(list) => {
                let mut kinds: Vec<&str> = Vec::new();
                for kind in list.iter().filter_map(|l| l.kind.as_deref()) {
                    if !kind.is_empty() && !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
                match kinds.as_slice() {
                    [] => None,
                    [single] => Some(single.to_string()),
                    many => Some(format!("({})", many.join(" OR "))),
                }
            }
        }
    }
}

fn optional_string(
    object: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<String>, String> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("\"{}\" must be a string", key)),
    }
}

fn license_field(
    object: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<LicenseField>, String> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(LicenseField::Expression(s.clone()))),
        Some(Value::Object(o)) => Ok(Some(LicenseField::Legacy(legacy_license(o, key)?))),
        Some(Value::Array(items)) if items.is_empty() => Ok(None),
        Some(Value::Array(items)) => {
            let list = items
                .iter()
                .map(|item| match item {
                    Value::Object(o) => legacy_license(o, key),
                    _ => Err(format!("\"{}\" entries must be objects", key)),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Some(LicenseField::LegacyList(list)))
        }
        Some(_) => Err(format!(
            "\"{}\" must be a string, an object or an array of objects",
            key
        )),
    }
}

fn legacy_license(
    object: &Map<String, Value>,
    key: &str,
) -> std::result::Result<LegacyLicense, String> {
    let field = |name: &str| optional_string(object, name).map_err(|e| format!("{}: {}", key, e));
    Ok(LegacyLicense {
        kind: field("type")?,
        url: field("url")?,
    })
}

fn dependency_map(
    object: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Vec<(String, String)>, String> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(deps)) => deps
            .iter()
            .map(|(name, spec)| match spec {
                Value::String(spec) => Ok((name.clone(), spec.clone())),
                _ => Err(format!("\"{}\" entry {} must be a string", key, name)),
            })
            .collect(),
        Some(_) => Err(format!("\"{}\" must be an object", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_keeps_dependency_order() {
        let manifest = Manifest::parse(&json!({
            "name": "app",
            "version": "1.0.0",
            "license": "MIT",
            "dependencies": { "zeta": "^1.0.0", "alpha": "~2.0.0", "mid": "3.0.0" },
            "devDependencies": { "jest": "^29.0.0" }
        }))
        .unwrap();
        let names: Vec<&str> = manifest.dependencies.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(manifest.dev_dependencies, vec![("jest".into(), "^29.0.0".into())]);
        assert_eq!(manifest.license().as_deref(), Some("MIT"));
    }

    #[test]
    fn test_parse_requires_name_and_version() {
        assert!(Manifest::parse(&json!({ "version": "1.0.0" })).is_err());
        assert!(Manifest::parse(&json!({ "name": "a" })).is_err());
        assert!(Manifest::parse(&json!({ "name": 3, "version": "1.0.0" })).is_err());
        assert!(Manifest::parse(&json!("not an object")).is_err());
    }

    #[test]
    fn test_private_manifest_needs_no_name() {
        let manifest = Manifest::parse(&json!({ "private": true })).unwrap();
        assert!(manifest.private);
        assert_eq!(manifest.license().as_deref(), Some(PRIVATE_LICENSE));
    }

    #[test]
    fn test_private_manifest_with_license_keeps_it() {
        let manifest = Manifest::parse(&json!({ "private": true, "license": "ISC" })).unwrap();
        assert_eq!(manifest.license().as_deref(), Some("ISC"));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let base = |extra: Value| {
            let mut raw = json!({ "name": "a", "version": "1.0.0" });
            for (k, v) in extra.as_object().unwrap() {
                raw[k] = v.clone();
            }
            Manifest::parse(&raw)
        };
        assert!(base(json!({ "license": 42 })).is_err());
        assert!(base(json!({ "licenses": ["MIT"] })).is_err());
        assert!(base(json!({ "dependencies": { "b": 1 } })).is_err());
        assert!(base(json!({ "dependencies": ["b"] })).is_err());
        assert!(base(json!({ "private": "yes" })).is_err());
    }

    #[test]
    fn test_legacy_license_forms() {
        let m = Manifest::parse(&json!({
            "name": "a", "version": "1.0.0",
            "license": { "type": "MIT", "url": "https://opensource.org/licenses/MIT" }
        }))
        .unwrap();
        assert_eq!(m.license().as_deref(), Some("MIT"));

        let m = Manifest::parse(&json!({
            "name": "a", "version": "1.0.0",
            "licenses": [{ "type": "MIT" }, { "type": "Apache-2.0" }, { "type": "MIT" }]
        }))
        .unwrap();
        assert_eq!(m.license().as_deref(), Some("(MIT OR Apache-2.0)"));

        let m = Manifest::parse(&json!({
            "name": "a", "version": "1.0.0",
            "licenses": [{ "type": "ISC" }]
        }))
        .unwrap();
        assert_eq!(m.license().as_deref(), Some("ISC"));
    }

    #[test]
    fn test_empty_or_typeless_license_list_is_absent() {
        let m = Manifest::parse(&json!({
            "name": "a", "version": "1.0.0", "license": [], "licenses": "BSD-2-Clause"
        }))
        .unwrap();
        assert_eq!(m.license().as_deref(), Some("BSD-2-Clause"));

        let m = Manifest::parse(&json!({
            "name": "a", "version": "1.0.0", "licenses": [{ "url": "x" }]
        }))
        .unwrap();
        assert_eq!(m.license(), None);
    }

    #[test]
    fn test_allowlisted_defaults_version() {
        let m = Manifest::allowlisted(
            &json!({ "licenses": "garbage", "version": "not-semver", "dependencies": { "b": "1.0.0", "c": 5 } }),
            "weird",
        );
        assert_eq!(m.name.as_deref(), Some("weird"));
        assert_eq!(m.version.as_deref(), Some(FALLBACK_VERSION));
        assert_eq!(m.dependencies, vec![("b".into(), "1.0.0".into())]);

        let m = Manifest::allowlisted(&json!({ "version": "2.1.0" }), "ok");
        assert_eq!(m.version.as_deref(), Some("2.1.0"));
    }
}
