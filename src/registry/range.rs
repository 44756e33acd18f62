//! npm-style version ranges on top of `semver::VersionReq`.
//!
//! npm ranges differ from Cargo's in a few places this module papers over:
//! a bare version means an exact match rather than a caret, comparators are
//! separated by spaces instead of commas, `||` joins alternatives, and
//! `a - b` is an inclusive hyphen range.

use semver::{Version, VersionReq};

#[derive(Debug, Clone)]
pub struct RangeSet {
    ranges: Vec<VersionReq>,
}

impl RangeSet {
    pub fn parse(spec: &str) -> Result<Self, semver::Error> {
        let mut s = spec.trim();
        if s.is_empty() {
            s = "*";
        }

        let mut ranges = Vec::new();
        for part in s.split("||") {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            ranges.push(VersionReq::parse(&normalize_and_part(part))?);
        }

        if ranges.is_empty() {
            ranges.push(VersionReq::STAR);
        }

        Ok(RangeSet { ranges })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.ranges.iter().any(|r| r.matches(version))
    }
}

/// Parse an exact version, tolerating npm's `v` and `=` prefixes.
pub fn parse_exact(spec: &str) -> Option<Version> {
    let trimmed = spec.trim().trim_start_matches('=').trim_start_matches('v');
    Version::parse(trimmed).ok()
}

fn normalize_and_part(part: &str) -> String {
    let tokens: Vec<&str> = part.split_whitespace().collect();

    if tokens.len() == 3 && tokens[1] == "-" {
        return format!(">={}, <={}", strip_v(tokens[0]), strip_v(tokens[2]));
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if matches!(token, "=" | ">" | ">=" | "<" | "<=" | "~" | "^") {
            pending_op = Some(token);
            continue;
        }
        let comparator = match pending_op.take() {
            Some(op) => format!("{}{}", op, strip_v(token)),
            None => with_default_op(token),
        };
        comparators.push(comparator);
    }

    comparators.join(", ")
}

/// npm treats a bare `1.2.3` as exact; `semver` would read it as `^1.2.3`.
fn with_default_op(token: &str) -> String {
    let token = strip_v(token);
    let has_wildcard = token.contains(['x', 'X', '*']);
    if token.starts_with(|c: char| c.is_ascii_digit()) && !has_wildcard {
        format!("={}", token)
    } else {
        token.to_string()
    }
}

fn strip_v(token: &str) -> &str {
    token.strip_prefix('v').unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn parses_caret_and_tilde() {
        let caret = RangeSet::parse("^4.5.0").unwrap();
        assert!(caret.matches(&v("4.5.6")));
        assert!(!caret.matches(&v("5.0.0")));

        let tilde = RangeSet::parse("~1.2.0").unwrap();
        assert!(tilde.matches(&v("1.2.9")));
        assert!(!tilde.matches(&v("1.3.0")));
    }

    #[test]
    fn bare_version_is_exact() {
        let set = RangeSet::parse("1.2.3").unwrap();
        assert!(set.matches(&v("1.2.3")));
        assert!(!set.matches(&v("1.2.4")));
    }

    #[test]
    fn space_separated_comparators() {
        let set = RangeSet::parse(">=1.0.0 <2.0.0").unwrap();
        assert!(set.matches(&v("1.9.9")));
        assert!(!set.matches(&v("2.0.0")));

        let set = RangeSet::parse(">= 4.21.0").unwrap();
        assert!(set.matches(&v("4.21.0")));
    }

    #[test]
    fn hyphen_and_or_ranges() {
        let set = RangeSet::parse("1.0.0 - 1.5.0").unwrap();
        assert!(set.matches(&v("1.5.0")));
        assert!(!set.matches(&v("1.5.1")));

        let set = RangeSet::parse("^1.0.0 || ^2.0.0").unwrap();
        assert!(set.matches(&v("2.3.0")));
        assert!(!set.matches(&v("3.0.0")));
    }

    #[test]
    fn wildcards() {
        assert!(RangeSet::parse("").unwrap().matches(&v("999.0.0")));
        assert!(RangeSet::parse("*").unwrap().matches(&v("0.1.0")));
        let set = RangeSet::parse("1.x").unwrap();
        assert!(set.matches(&v("1.4.0")));
        assert!(!set.matches(&v("2.0.0")));
    }

    #[test]
    fn rejects_tags() {
        assert!(RangeSet::parse("latest").is_err());
        assert!(RangeSet::parse("next").is_err());
    }

    #[test]
    fn exact_versions() {
        assert_eq!(parse_exact("v1.2.3"), Some(v("1.2.3")));
        assert_eq!(parse_exact("=1.2.3"), Some(v("1.2.3")));
        assert_eq!(parse_exact("^1.2.3"), None);
    }
}
