use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::models::{Finding, PackageError, PackageErrorKind, TraversalReport};

/// Render a colored terminal report for one traversal of `target`.
pub fn render(report: &TraversalReport, target: &str, verbose: bool, quiet: bool) -> Result<()> {
    let finding_count = report.findings.len();
    let error_count = report.errors.len();

    if quiet {
        let findings = match finding_count {
            0 => "0".green(),
            n => n.to_string().red(),
        };
        let errors = match error_count {
            0 => "0".green(),
            n => n.to_string().yellow(),
        };
        println!("Findings: {}  Errors: {}", findings, errors);
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "green-licenses".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Checked: {}\n", target);

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(
        " │  {:<48} │",
        format!("Packages requested : {}", report.requested.len())
    );
    if !report.visited.is_empty() {
        println!(
            " │  {:<48} │",
            format!("Manifests checked  : {}", report.visited.len())
        );
    }
    println!(
        " │  {:<48} │",
        format!(
            "{}  Non-green      : {:>4}  {}",
            "✗".red(),
            finding_count,
            summarize_licenses(&report.findings)
        )
    );
    println!(
        " │  {:<48} │",
        format!("{}  Errors         : {:>4}", "⚠".yellow(), error_count)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    if finding_count > 0 {
        println!(" {} Packages with non-green licenses:\n", "[LICENSE]".red().bold());
        render_findings(&report.findings);
        println!();
    }

    if error_count > 0 {
        println!(" {} Packages that could not be checked:\n", "[ERROR]".yellow().bold());
        render_errors(&report.errors);
        println!();
    }

    if verbose && !report.visited.is_empty() {
        println!(" {} Manifests checked:\n", "[INFO]".cyan().bold());
        for path in &report.visited {
            println!("   {}", path);
        }
        println!();
    }

    if report.is_clean() {
        println!(" {} All licenses are green.\n", "✓".green().bold());
    }

    Ok(())
}

fn render_findings(findings: &[Finding]) {
    let mut table = new_table(&["Package", "Version", "License", "Required by"]);

    for finding in findings {
        let license = finding.license.as_deref().unwrap_or("(none)");
        table.add_row(vec![
            Cell::new(&finding.name),
            Cell::new(&finding.version),
            Cell::new(license).fg(Color::Red),
            Cell::new(ancestor_chain(&finding.ancestors)).fg(Color::DarkGrey),
        ]);
    }

    println!("{}", table);
}

fn render_errors(errors: &[PackageError]) {
    let mut table = new_table(&["Package", "Requested", "Kind", "Message", "Required by"]);

    for error in errors {
        let kind_color = match error.kind {
            PackageErrorKind::Fetch => Color::Yellow,
            PackageErrorKind::InvalidManifest => Color::Magenta,
        };
        table.add_row(vec![
            Cell::new(&error.package_name),
            Cell::new(error.requested_version.as_deref().unwrap_or("-")),
            Cell::new(error.kind.to_string()).fg(kind_color),
            Cell::new(&error.message),
            Cell::new(ancestor_chain(&error.ancestors)).fg(Color::DarkGrey),
        ]);
    }

    println!("{}", table);
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

/// `root@1.0.0 → a@2.0.0`, or `(root)` for a root manifest.
fn ancestor_chain(ancestors: &[String]) -> String {
    if ancestors.is_empty() {
        "(root)".to_string()
    } else {
        ancestors.join(" → ")
    }
}

/// The three most frequent non-green licenses, e.g. `[GPL-3.0 (2), EVIL (1)]`.
fn summarize_licenses(findings: &[Finding]) -> String {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for finding in findings {
        let license = finding.license.as_deref().unwrap_or("(none)");
        *counts.entry(license).or_insert(0) += 1;
    }

    let mut pairs: Vec<(&str, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let summary: Vec<String> = pairs
        .iter()
        .take(3)
        .map(|(license, count)| format!("{} ({})", license, count))
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(name: &str, license: Option<&str>) -> Finding {
        Finding {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            license: license.map(str::to_string),
            ancestors: Vec::new(),
        }
    }

    #[test]
    fn test_summarize_licenses_orders_by_count() {
        let findings = vec![
            finding("a", Some("GPL-3.0")),
            finding("b", Some("EVIL")),
            finding("c", Some("GPL-3.0")),
            finding("d", None),
        ];
        assert_eq!(
            summarize_licenses(&findings),
            "[GPL-3.0 (2), (none) (1), EVIL (1)]"
        );
        assert_eq!(summarize_licenses(&[]), "");
    }

    #[test]
    fn test_ancestor_chain() {
        assert_eq!(ancestor_chain(&[]), "(root)");
        assert_eq!(
            ancestor_chain(&["app@1.0.0".to_string(), "a@2.0.0".to_string()]),
            "app@1.0.0 → a@2.0.0"
        );
    }
}
