//! SPDX identifier table and free-form license string correction.

/// SPDX license identifiers recognised by the checker, including the
/// deprecated bare GPL-family forms that older manifests still use.
const LICENSE_IDS: &[&str] = &[
    "0BSD",
    "AAL",
    "AFL-1.1",
    "AFL-1.2",
    "AFL-2.0",
    "AFL-2.1",
    "AFL-3.0",
    "AGPL-1.0",
    "AGPL-3.0",
    "AGPL-3.0-only",
    "AGPL-3.0-or-later",
    "Apache-1.0",
    "Apache-1.1",
    "Apache-2.0",
    "APSL-1.0",
    "APSL-1.1",
    "APSL-1.2",
    "APSL-2.0",
    "Artistic-1.0",
    "Artistic-1.0-Perl",
    "Artistic-2.0",
    "BlueOak-1.0.0",
    "BSD-1-Clause",
    "BSD-2-Clause",
    "BSD-2-Clause-Patent",
    "BSD-3-Clause",
    "BSD-3-Clause-Clear",
    "BSD-4-Clause",
    "BSL-1.0",
    "BUSL-1.1",
    "CAL-1.0",
    "CC-BY-1.0",
    "CC-BY-2.0",
    "CC-BY-2.5",
    "CC-BY-3.0",
    "CC-BY-4.0",
    "CC-BY-NC-4.0",
    "CC-BY-NC-SA-4.0",
    "CC-BY-ND-4.0",
    "CC-BY-SA-3.0",
    "CC-BY-SA-4.0",
    "CC0-1.0",
    "CDDL-1.0",
    "CDDL-1.1",
    "CECILL-2.1",
    "CPAL-1.0",
    "CPL-1.0",
    "ECL-2.0",
    "EFL-2.0",
    "EPL-1.0",
    "EPL-2.0",
    "EUPL-1.1",
    "EUPL-1.2",
    "FTL",
    "GFDL-1.3",
    "GPL-1.0",
    "GPL-2.0",
    "GPL-2.0-only",
    "GPL-2.0-or-later",
    "GPL-3.0",
    "GPL-3.0-only",
    "GPL-3.0-or-later",
    "HPND",
    "ICU",
    "IPA",
    "IPL-1.0",
    "ISC",
    "LGPL-2.0",
    "LGPL-2.0-only",
    "LGPL-2.0-or-later",
    "LGPL-2.1",
    "LGPL-2.1-only",
    "LGPL-2.1-or-later",
    "LGPL-3.0",
    "LGPL-3.0-only",
    "LGPL-3.0-or-later",
    "libtiff",
    "LPL-1.0",
    "LPL-1.02",
    "LPPL-1.3c",
    "MirOS",
    "MIT",
    "MIT-0",
    "MIT-CMU",
    "MPL-1.0",
    "MPL-1.1",
    "MPL-2.0",
    "MPL-2.0-no-copyleft-exception",
    "MS-PL",
    "MS-RL",
    "MulanPSL-2.0",
    "NCSA",
    "ODbL-1.0",
    "OFL-1.0",
    "OFL-1.1",
    "OpenSSL",
    "OSL-3.0",
    "PHP-3.0",
    "PHP-3.01",
    "PostgreSQL",
    "PSF-2.0",
    "Python-2.0",
    "QPL-1.0",
    "Ruby",
    "SISSL",
    "Sleepycat",
    "SSPL-1.0",
    "Unicode-3.0",
    "Unicode-DFS-2016",
    "Unlicense",
    "UPL-1.0",
    "Vim",
    "W3C",
    "WTFPL",
    "X11",
    "Xnet",
    "Zend-2.0",
    "Zlib",
    "ZPL-2.0",
    "ZPL-2.1",
];

/// SPDX exception identifiers accepted after `WITH`.
const EXCEPTION_IDS: &[&str] = &[
    "Autoconf-exception-3.0",
    "Bison-exception-2.2",
    "Classpath-exception-2.0",
    "GCC-exception-3.1",
    "LLVM-exception",
    "OpenJDK-assembly-exception-1.0",
    "Qt-LGPL-exception-1.1",
    "Universal-FOSS-exception-1.0",
];

/// Find the canonical spelling of a license identifier, ignoring case.
pub fn canonical_id(id: &str) -> Option<&'static str> {
    LICENSE_IDS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(id))
        .copied()
}

/// Find the canonical spelling of an exception identifier, ignoring case.
pub fn canonical_exception(id: &str) -> Option<&'static str> {
    EXCEPTION_IDS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(id))
        .copied()
}

/// Whether `id` is a license reference the expression evaluator understands:
/// a known identifier (optionally with a trailing `+`) or a `LicenseRef-`.
pub fn is_known_id(id: &str) -> bool {
    if id.starts_with("LicenseRef-") {
        return true;
    }
    let base = id.strip_suffix('+').unwrap_or(id);
    LICENSE_IDS.contains(&base)
}

/// Common non-SPDX spellings, compared case-insensitively.
fn alias(raw: &str) -> Option<&'static str> {
    let id = match raw.to_ascii_lowercase().as_str() {
        "apache 2" | "apache 2.0" | "apache license 2.0" | "apache license, version 2.0"
        | "apache license version 2.0" | "apache2" | "apache-2" | "asl 2.0" => "Apache-2.0",
        "mit license" | "the mit license" | "mit/x11" | "expat" => "MIT",
        "bsd" | "bsd license" | "new bsd" | "new bsd license" | "modified bsd" | "bsd 3-clause"
        | "bsd-3" | "revised bsd" => "BSD-3-Clause",
        "bsd 2-clause" | "simplified bsd" | "freebsd" | "bsd-2" => "BSD-2-Clause",
        "gnu gpl v2" | "gnu general public license v2" | "gpl v2" | "gplv2" | "gpl-2" => "GPL-2.0",
        "gnu gpl v3" | "gnu general public license v3" | "gpl v3" | "gplv3" | "gpl-3" => "GPL-3.0",
        "gnu lgpl v2.1" | "lgpl v2.1" | "lgplv2.1" => "LGPL-2.1",
        "gnu lgpl v3" | "lgpl v3" | "lgplv3" => "LGPL-3.0",
        "mozilla public license 2.0" | "mpl 2.0" | "mplv2" | "mpl2" => "MPL-2.0",
        "isc license" => "ISC",
        "cc0" | "cc-0" | "cc0 1.0" => "CC0-1.0",
        "agpl v3" | "agplv3" | "gnu agpl v3" => "AGPL-3.0",
        "wtf" | "wtfpl-2.0" => "WTFPL",
        "zlib license" | "zlib/libpng" => "Zlib",
        "unlicensed public domain" | "the unlicense" => "Unlicense",
        _ => return None,
    };
    Some(id)
}

/// Try to coerce a free-form license string into an SPDX identifier.
///
/// Tries, in order: the string itself, a case-insensitive match, the alias
/// table, and a handful of mechanical rewrites (`The X License`,
/// `GPLv3`, `Apache 2`, `GPL-2.0+`). Returns `None` when nothing matches.
pub fn correct(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(id) = lookup(trimmed) {
        return Some(id);
    }

    for candidate in rewrites(trimmed) {
        if let Some(id) = lookup(&candidate) {
            return Some(id);
        }
    }

    // "The MIT License (MIT)": the id in parentheses, then what precedes it.
    if let Some((head, inner)) = trailing_parenthesized(trimmed) {
        if let Some(id) = correct(inner).or_else(|| correct(head)) {
            return Some(id);
        }
    }

    last_resort(trimmed).map(str::to_string)
}

/// Well-known license family names, checked against the words of the
/// string in order. The first match wins.
const FAMILIES: &[(&str, &str)] = &[
    ("AFFERO", "AGPL-3.0"),
    ("AGPL", "AGPL-3.0"),
    ("LGPL", "LGPL-3.0"),
    ("LESSER", "LGPL-3.0"),
    ("GPL", "GPL-3.0"),
    ("GNU", "GPL-3.0"),
    ("APACHE", "Apache-2.0"),
    ("ARTISTIC", "Artistic-2.0"),
    ("BOOST", "BSL-1.0"),
    ("CDDL", "CDDL-1.1"),
    ("ECLIPSE", "EPL-1.0"),
    ("MOZILLA", "MPL-2.0"),
    ("MPL", "MPL-2.0"),
    ("WTF", "WTFPL"),
    ("ZLIB", "Zlib"),
];

/// Short names that must be a whole word, so `SUBMIT` is not `MIT`.
const WORDS: &[(&str, &str)] = &[("MIT", "MIT"), ("ISC", "ISC"), ("X11", "X11")];

/// Guess a license from the family name it mentions, e.g. `Apache Software
/// License` or `MIT Licensed`. Expressions are never guessed.
fn last_resort(raw: &str) -> Option<&'static str> {
    let upper = raw.to_ascii_uppercase();
    let words: Vec<&str> = upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.iter().any(|w| matches!(*w, "AND" | "OR" | "WITH")) {
        return None;
    }

    if words.iter().any(|w| w.starts_with("BSD")) {
        let three_clause = words
            .windows(2)
            .any(|pair| pair[0] == "3" && pair[1] == "CLAUSE")
            || words.contains(&"NEW")
            || words.contains(&"REVISED");
        return Some(if three_clause { "BSD-3-Clause" } else { "BSD-2-Clause" });
    }

    let family = FAMILIES
        .iter()
        .find(|(prefix, _)| words.iter().any(|w| w.starts_with(prefix)));
    let word = || WORDS.iter().find(|(word, _)| words.contains(word));
    family
        .or_else(word)
        .and_then(|(_, id)| canonical_id(id))
}

/// `Head (inner)` -> `("Head", "inner")`.
fn trailing_parenthesized(raw: &str) -> Option<(&str, &str)> {
    let body = raw.strip_suffix(')')?;
    let (head, inner) = body.rsplit_once('(')?;
    let (head, inner) = (head.trim(), inner.trim());
    if head.is_empty() || inner.is_empty() {
        None
    } else {
        Some((head, inner))
    }
}

/// Exact, case-insensitive or alias lookup, keeping a trailing `+`.
fn lookup(candidate: &str) -> Option<String> {
    if let Some(base) = candidate.strip_suffix('+') {
        return canonical_id(base.trim()).map(|id| format!("{}+", id));
    }
    canonical_id(candidate)
        .or_else(|| alias(candidate))
        .map(str::to_string)
}

fn rewrites(raw: &str) -> Vec<String> {
    let mut base = raw.to_string();
    for prefix in ["The ", "the "] {
        if let Some(rest) = base.strip_prefix(prefix) {
            base = rest.to_string();
        }
    }
    for suffix in [" License", " license", " LICENSE", " Licence", " licence"] {
        if let Some(rest) = base.strip_suffix(suffix) {
            base = rest.trim().to_string();
        }
    }

    let mut out = vec![base.clone()];

    let dashed = base.split_whitespace().collect::<Vec<_>>().join("-");
    out.push(dashed.clone());

    // "GPLv3" / "GPL-v3" -> "GPL-3"
    let unversioned = dashed.replace("-v", "-").replace("-V", "-");
    let unversioned = split_inline_version(&unversioned);
    out.push(unversioned.clone());

    // "Apache-2" -> "Apache-2.0"
    for candidate in [dashed, unversioned] {
        if let Some(with_minor) = append_minor_version(&candidate) {
            out.push(with_minor);
        }
    }

    out
}

/// `GPLv3` -> `GPL-3`, leaving strings without an inline `v<digit>` untouched.
fn split_inline_version(s: &str) -> String {
    let bytes = s.as_bytes();
    for i in 1..bytes.len().saturating_sub(1) {
        if (bytes[i] == b'v' || bytes[i] == b'V')
            && bytes[i - 1].is_ascii_alphabetic()
            && bytes[i + 1].is_ascii_digit()
        {
            return format!("{}-{}", &s[..i], &s[i + 1..]);
        }
    }
    s.to_string()
}

/// `X-2` -> `X-2.0`, `X-2+` -> `X-2.0+`.
fn append_minor_version(s: &str) -> Option<String> {
    let (body, plus) = match s.strip_suffix('+') {
        Some(body) => (body, "+"),
        None => (s, ""),
    };
    let (_, version) = body.rsplit_once('-')?;
    if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{}.0{}", body, plus))
    } else {
        None
    }
}
