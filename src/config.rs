use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::CheckError;
use crate::Result;

/// Name of the optional config file looked up in the checked directory.
pub const CONFIG_FILE_NAME: &str = "green-licenses.json";

/// Overrides read from `green-licenses.json`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Replaces the built-in green license list.
    #[serde(default)]
    pub green_licenses: Option<Vec<String>>,
    /// Packages exempt from license and manifest checks.
    #[serde(default, alias = "packageWhitelist")]
    pub package_allowlist: Option<Vec<String>>,
}

/// Parse config file content. `//` and `/* */` comments are allowed.
pub fn parse_config(content: &str, origin: &str) -> Result<Config> {
    let stripped = strip_json_comments(content);
    serde_json::from_str(&stripped).map_err(|e| CheckError::ConfigInvalid {
        path: origin.to_string(),
        reason: e.to_string(),
    })
}

/// Load `green-licenses.json` from `dir`.
///
/// A missing file is not an error. An unreadable or invalid file is logged
/// and treated as absent, so the built-in defaults apply.
pub fn load_config(dir: &Path) -> Option<Config> {
    let path = dir.join(CONFIG_FILE_NAME);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read config file");
            return None;
        }
    };
    config_or_warn(&content, &path.display().to_string())
}

/// Parse config content obtained elsewhere (e.g. a repository snapshot),
/// logging and discarding it when invalid.
pub fn config_or_warn(content: &str, origin: &str) -> Option<Config> {
    match parse_config(content, origin) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

/// Replace comments with whitespace, leaving string literals untouched.
fn strip_json_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    if next == '\n' {
                        out.push('\n');
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"{
  // licenses we accept
  "greenLicenses": ["MIT", "Public Domain"],
  /* internal packages */
  "packageAllowlist": ["internal-lib"]
}"#,
            "test",
        )
        .unwrap();
        assert_eq!(
            config.green_licenses,
            Some(vec!["MIT".to_string(), "Public Domain".to_string()])
        );
        assert_eq!(config.package_allowlist, Some(vec!["internal-lib".to_string()]));
    }

    #[test]
    fn test_comment_markers_inside_strings_are_kept() {
        let config = parse_config(r#"{"greenLicenses": ["http://x/*y*/"]}"#, "test").unwrap();
        assert_eq!(config.green_licenses, Some(vec!["http://x/*y*/".to_string()]));
    }

    #[test]
    fn test_legacy_allowlist_key() {
        let config = parse_config(r#"{"packageWhitelist": ["a"]}"#, "test").unwrap();
        assert_eq!(config.package_allowlist, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_invalid_shape_is_rejected() {
        let err = parse_config(r#"{"greenLicenses": "MIT"}"#, "test").unwrap_err();
        assert!(matches!(err, CheckError::ConfigInvalid { .. }));
        assert_eq!(config_or_warn(r#"{"packageAllowlist": [1]}"#, "test"), None);
    }

    #[test]
    fn test_load_config_missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(dir.path()), None);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        assert_eq!(load_config(dir.path()), None);

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"greenLicenses": ["ISC"]}"#,
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.green_licenses, Some(vec!["ISC".to_string()]));
        assert_eq!(config.package_allowlist, None);
    }
}
