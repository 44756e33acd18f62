//! `green-licenses`: check the licenses of an npm dependency tree.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Install the `tracing` subscriber on stderr.
//! 3. Walk the dependency tree of the package, directory or pull request
//!    ([`green_licenses::LicenseChecker`]).
//! 4. Optionally post the result on the pull request (`--post-review`).
//! 5. Render the requested report.
//! 6. Exit `0` (clean) or `1` (at least one non-green license or error).

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use green_licenses::registry::github::{CommitState, GitHubRepository, PrCommits, PullRequestRef, ReviewEvent};
use green_licenses::registry::npm::NpmRegistry;
use green_licenses::report;
use green_licenses::{CheckObserver, CheckerOptions, Finding, LicenseChecker, PackageError, TraversalReport};

const STATUS_CONTEXT: &str = "green-licenses";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let registry = Arc::new(NpmRegistry::new()?);
    let mut checker = LicenseChecker::new(registry).with_options(CheckerOptions { dev: cli.dev });

    let show_progress = !cli.quiet && matches!(cli.format, ReportFormat::Terminal);
    if show_progress {
        checker = checker.with_observer(Box::new(SpinnerObserver::new()?));
    }

    let (target, report) = if let Some(package) = &cli.package {
        (package.clone(), checker.check_remote_package(package).await?)
    } else if let Some(dir) = &cli.local {
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.clone());
        let report = checker.check_local_directory(&dir).await?;
        (dir.display().to_string(), report)
    } else if let Some(reference) = &cli.pr {
        let pr = PullRequestRef::parse(reference)?;
        let token = std::env::var("GITHUB_TOKEN").ok();
        let repo = GitHubRepository::new(&pr.owner, &pr.repo, token)?;
        let (commits, report) = checker.check_pull_request(&repo, pr.number).await?;
        if cli.post_review {
            post_review(&repo, pr.number, &commits, &report).await?;
        }
        (reference.clone(), report)
    } else {
        bail!("nothing to check: pass a package, --local DIR or --pr REF");
    };

    match cli.format {
        ReportFormat::Terminal => {
            report::terminal::render(&report, &target, cli.verbose, cli.quiet)?;
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if !report.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}

/// Logs go to stderr so JSON output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Spinner that follows the traversal on stderr.
struct SpinnerObserver {
    bar: ProgressBar,
    findings: usize,
}

impl SpinnerObserver {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}")?);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("Resolving dependencies");
        Ok(SpinnerObserver { bar, findings: 0 })
    }
}

impl CheckObserver for SpinnerObserver {
    fn on_non_green_license(&mut self, finding: &Finding) {
        self.findings += 1;
        self.bar
            .set_message(format!("{} non-green, last: {}", self.findings, finding.key()));
    }

    fn on_manifest_visited(&mut self, path: &str) {
        self.bar.set_message(format!("Checking {}", path));
    }

    fn on_error(&mut self, error: &PackageError) {
        self.bar.println(format!("  ⚠ {}", error));
    }

    fn on_end(&mut self) {
        self.bar.finish_and_clear();
    }
}

async fn post_review(
    repo: &GitHubRepository,
    pr: u64,
    commits: &PrCommits,
    report: &TraversalReport,
) -> Result<()> {
    let (state, description) = if report.is_clean() {
        (CommitState::Success, "All licenses are green".to_string())
    } else {
        (
            CommitState::Failure,
            format!(
                "{} non-green licenses, {} errors",
                report.findings.len(),
                report.errors.len()
            ),
        )
    };

    if !report.is_clean() {
        repo.create_review(
            pr,
            &commits.head_commit_sha,
            &review_body(report),
            ReviewEvent::Comment,
        )
        .await?;
    }
    repo.set_commit_status(&commits.head_commit_sha, state, &description, STATUS_CONTEXT)
        .await?;
    Ok(())
}

fn review_body(report: &TraversalReport) -> String {
    let mut body = String::from("Some dependencies are not under green licenses.\n");
    for finding in &report.findings {
        body.push_str(&format!("\n- `{}`", finding));
        if !finding.ancestors.is_empty() {
            body.push_str(&format!(" (via {})", finding.ancestors.join(" → ")));
        }
    }
    for error in &report.errors {
        body.push_str(&format!("\n- could not check `{}`", error));
    }
    body
}
