use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "green-licenses",
    about = "Check that a package and its dependency tree only use green licenses",
    version
)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["package", "local", "pr"]),
))]
pub struct Cli {
    /// Published package to check, e.g. `express` or `@scope/pkg@^2.0.0`
    pub package: Option<String>,

    /// Check the package.json files of a local directory
    #[arg(long, short = 'l', value_name = "DIR")]
    pub local: Option<PathBuf>,

    /// Check a GitHub pull request (owner/repo/pull/N or its URL)
    #[arg(long, value_name = "REF")]
    pub pr: Option<String>,

    /// Also check devDependencies
    #[arg(long)]
    pub dev: bool,

    /// With --pr: post a review and a commit status on the pull request
    #[arg(long, requires = "pr")]
    pub post_review: bool,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub format: ReportFormat,

    /// Show debug logs and the list of checked manifests
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_exactly_one_target() {
        assert!(Cli::try_parse_from(["green-licenses"]).is_err());
        assert!(Cli::try_parse_from(["green-licenses", "foo", "--local", "."]).is_err());

        let cli = Cli::try_parse_from(["green-licenses", "foo@^1.0.0", "--dev"]).unwrap();
        assert_eq!(cli.package.as_deref(), Some("foo@^1.0.0"));
        assert!(cli.dev);

        let cli = Cli::try_parse_from(["green-licenses", "--local", "app"]).unwrap();
        assert_eq!(cli.local, Some(PathBuf::from("app")));
    }

    #[test]
    fn test_post_review_needs_pr() {
        assert!(Cli::try_parse_from(["green-licenses", "foo", "--post-review"]).is_err());
        let cli = Cli::try_parse_from([
            "green-licenses",
            "--pr",
            "acme/widgets/pull/3",
            "--post-review",
            "--format",
            "json",
        ])
        .unwrap();
        assert!(cli.post_review);
        assert!(matches!(cli.format, ReportFormat::Json));
    }
}
