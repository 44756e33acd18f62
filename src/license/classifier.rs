use tracing::debug;

use crate::config::Config;
use crate::license::expression::{self, Expression, UNLICENSED};
use crate::license::spdx;

/// Licenses accepted when no config file overrides `greenLicenses`.
pub const DEFAULT_GREEN_LICENSES: &[&str] = &[
    "0BSD",
    "AFL-2.1",
    "AFL-3.0",
    "APSL-2.0",
    "Apache-1.1",
    "Apache-2.0",
    "Artistic-1.0",
    "Artistic-2.0",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "BSL-1.0",
    "CC-BY-1.0",
    "CC-BY-2.0",
    "CC-BY-2.5",
    "CC-BY-3.0",
    "CC-BY-4.0",
    "CC0-1.0",
    "CDDL-1.0",
    "CDDL-1.1",
    "CPL-1.0",
    "EPL-1.0",
    "FTL",
    "IPL-1.0",
    "ISC",
    "LGPL-2.0",
    "LGPL-2.1",
    "LGPL-3.0",
    "LPL-1.02",
    "MIT",
    "MPL-1.0",
    "MPL-1.1",
    "MPL-2.0",
    "MS-PL",
    "NCSA",
    "OpenSSL",
    "PHP-3.0",
    "Ruby",
    "Unlicense",
    "W3C",
    "Xnet",
    "ZPL-2.0",
    "Zend-2.0",
    "Zlib",
    "libtiff",
];

/// The classification rules active for one traversal.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Canonical identifiers; a license is green if it satisfies any of them.
    pub green: Vec<String>,
    /// Non-SPDX strings accepted verbatim, e.g. `"Public Domain"` or `"private"`.
    pub raw_allowlist: Vec<String>,
    /// Packages whose license and manifest shape are not checked.
    pub package_allowlist: Vec<String>,
}

impl RuleSet {
    /// Build the rules from an optional config override.
    ///
    /// Each green license entry that normalizes to an SPDX identifier joins the
    /// allow expression; anything else is kept as a raw allowlist string.
    pub fn build(config: Option<&Config>) -> Self {
        let entries: Vec<String> = match config.and_then(|c| c.green_licenses.as_ref()) {
            Some(list) => list.clone(),
            None => DEFAULT_GREEN_LICENSES.iter().map(|s| s.to_string()).collect(),
        };

        let mut rules = RuleSet {
            package_allowlist: config
                .and_then(|c| c.package_allowlist.clone())
                .unwrap_or_default(),
            ..RuleSet::default()
        };

        for entry in entries {
            match normalize(&entry) {
                Some(id) => rules.green.push(id),
                None => rules.raw_allowlist.push(entry),
            }
        }

        rules
    }

    /// The allow expression as an SPDX disjunction, e.g. `MIT OR ISC`.
    pub fn allow_expression(&self) -> String {
        self.green.join(" OR ")
    }

    pub fn is_package_allowed(&self, name: &str) -> bool {
        self.package_allowlist.iter().any(|p| p == name)
    }
}

/// Normalize a raw license string to its canonical SPDX form.
///
/// Any casing of `UNLICENSED` maps to `UNLICENSED`. Compound expressions are
/// corrected identifier by identifier. Returns `None` when the string cannot
/// be corrected.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case(UNLICENSED) {
        return Some(UNLICENSED.to_string());
    }

    let corrected = spdx::correct(trimmed).or_else(|| correct_expression(trimmed))?;
    if corrected != trimmed {
        debug!(from = trimmed, to = %corrected, "corrected license identifier");
    }
    Some(corrected)
}

fn correct_expression(raw: &str) -> Option<String> {
    let parsed = expression::parse(raw).ok()?;
    if !parsed.is_compound() {
        return None;
    }
    parsed
        .try_map_ids(&mut |id| {
            if id.eq_ignore_ascii_case(UNLICENSED) {
                Some(UNLICENSED.to_string())
            } else {
                spdx::correct(id)
            }
        })
        .map(|e| e.to_string())
}

/// Decide whether a declared license is green under `rules`.
pub fn is_green(license: Option<&str>, rules: &RuleSet) -> bool {
    let raw = match license.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return false,
    };

    let canonical = match normalize(raw) {
        Some(canonical) => canonical,
        None => return rules.raw_allowlist.iter().any(|allowed| allowed == raw),
    };

    let evaluated = expression::parse(&canonical)
        .and_then(|candidate: Expression| expression::satisfies(&candidate, &rules.green));

    match evaluated {
        Ok(green) => green,
        Err(err) => {
            debug!(license = raw, error = %err, "license expression could not be evaluated");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(green: &[&str], allowlist: &[&str]) -> Config {
        Config {
            green_licenses: Some(green.iter().map(|s| s.to_string()).collect()),
            package_allowlist: Some(allowlist.iter().map(|s| s.to_string()).collect()),
        }
    }

    #[test]
    fn test_default_rules() {
        let rules = RuleSet::build(None);
        assert_eq!(rules.green.len(), DEFAULT_GREEN_LICENSES.len());
        assert!(rules.raw_allowlist.is_empty());
        assert!(rules.package_allowlist.is_empty());
        assert!(rules.allow_expression().starts_with("0BSD OR AFL-2.1"));
    }

    #[test]
    fn test_classification_determinism() {
        let rules = RuleSet::build(None);
        assert!(is_green(Some("MIT"), &rules));
        assert!(!is_green(Some("EVIL-MADE-UP-LICENSE"), &rules));
        assert!(!is_green(None, &rules));
        assert!(!is_green(Some(""), &rules));
    }

    #[test]
    fn test_private_needs_raw_allowlist() {
        let rules = RuleSet::build(Some(&config(&["MIT", "private"], &[])));
        assert_eq!(rules.raw_allowlist, vec!["private".to_string()]);
        assert!(is_green(Some("private"), &rules));

        // A custom list that omits "private" rejects private packages.
        let rules = RuleSet::build(Some(&config(&["MIT"], &[])));
        assert!(!is_green(Some("private"), &rules));
        assert!(!is_green(Some("private"), &RuleSet::build(None)));
    }

    #[test]
    fn test_raw_allowlist_for_non_spdx_strings() {
        let rules = RuleSet::build(Some(&config(&["Public Domain"], &[])));
        assert!(rules.green.is_empty());
        assert!(is_green(Some("Public Domain"), &rules));
        assert!(!is_green(Some("public domain"), &rules));
    }

    #[test]
    fn test_corrected_spellings_are_green() {
        let rules = RuleSet::build(None);
        assert!(is_green(Some("MIT License"), &rules));
        assert!(is_green(Some("Apache 2.0"), &rules));
        assert!(is_green(Some("The MIT License (MIT)"), &rules));
        assert!(is_green(Some("Apache Software License"), &rules));
        assert!(is_green(Some("(MIT OR GPL-3.0)"), &rules));
        assert!(!is_green(Some("GPL-3.0"), &rules));
        assert!(!is_green(Some("MIT AND GPL-3.0"), &rules));
    }

    #[test]
    fn test_unlicensed() {
        assert_eq!(normalize("unlicensed").as_deref(), Some("UNLICENSED"));
        assert!(!is_green(Some("UNLICENSED"), &RuleSet::build(None)));
        let rules = RuleSet::build(Some(&config(&["UNLICENSED"], &[])));
        assert!(is_green(Some("Unlicensed"), &rules));
    }

    #[test]
    fn test_normalize_expression() {
        assert_eq!(
            normalize("(mit OR apache 2.0)").as_deref(),
            None,
            "free-form words inside an expression are not split further"
        );
        assert_eq!(
            normalize("(mit OR Apache-2.0)").as_deref(),
            Some("MIT OR Apache-2.0")
        );
        assert_eq!(normalize("MIT OR EVIL"), None);
    }

    #[test]
    fn test_package_allowlist() {
        let rules = RuleSet::build(Some(&config(&["MIT"], &["left-pad"])));
        assert!(rules.is_package_allowed("left-pad"));
        assert!(!rules.is_package_allowed("right-pad"));
    }
}
