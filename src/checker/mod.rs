//! Dependency tree traversal.
//!
//! A [`LicenseChecker`] walks the dependency graph depth-first, in declaration
//! order, starting from a published package, a local directory or a repository
//! snapshot. Every resolved `name@version` is classified once per run; the
//! first ancestor chain that reaches it is the one reported.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_recursion::async_recursion;
use semver::Version;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{config_or_warn, load_config, Config, CONFIG_FILE_NAME};
use crate::error::CheckError;
use crate::license::{is_green, RuleSet};
use crate::manifest::{Manifest, FALLBACK_VERSION};
use crate::models::{package_key, Finding, PackageError, PackageErrorKind, TraversalReport};
use crate::registry::github::{fetch_manifest_files, GitHubRepository, PrCommits, RepositoryContents};
use crate::registry::local::{discover_manifests, read_manifest_file, read_package_dir, resolve_file_spec};
use crate::registry::range::RangeSet;
use crate::registry::spec::{is_file_spec, PackageSpec};
use crate::registry::PackageRegistry;
use crate::Result;


/// Receives traversal events as they happen. Every method defaults to a no-op.
pub trait CheckObserver: Send {
    fn on_non_green_license(&mut self, _finding: &Finding) {}

    /// A root manifest is about to be checked.
    fn on_manifest_visited(&mut self, _path: &str) {}

    fn on_error(&mut self, _error: &PackageError) {}

    fn on_end(&mut self) {}
}

#[derive(Debug, Clone, Default)]
pub struct CheckerOptions {
    /// Also walk `devDependencies`, at every depth.
    pub dev: bool,
}

#[derive(Debug, Default)]
struct TraversalState {
    /// Resolved `name@version` keys already classified.
    processed: HashSet<String>,
    /// Requests that failed; never retried within a run. Registry requests
    /// are keyed `name@spec`, `file:` links `name@<resolved dir>`.
    failed: HashSet<String>,
    /// Requests already fetched, keyed like `failed`.
    fetched: HashSet<String>,
    /// `(name, version)` of the root manifests of the current run.
    local_packages: Vec<(String, String)>,
}

pub struct LicenseChecker {
    registry: Arc<dyn PackageRegistry>,
    options: CheckerOptions,
    observer: Option<Box<dyn CheckObserver>>,
    rules: RuleSet,
    state: TraversalState,
    report: TraversalReport,
}

impl LicenseChecker {
    pub fn new(registry: Arc<dyn PackageRegistry>) -> Self {
        LicenseChecker {
            registry,
            options: CheckerOptions::default(),
            observer: None,
            rules: RuleSet::default(),
            state: TraversalState::default(),
            report: TraversalReport::default(),
        }
    }

    pub fn with_options(mut self, options: CheckerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn CheckObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Check a published package, e.g. `foo`, `foo@1.2.3` or `@scope/foo@^2`.
    ///
    /// Configuration is read from the current directory.
    pub async fn check_remote_package(&mut self, arg: &str) -> Result<TraversalReport> {
        let walked = self.walk_remote_package(arg).await;
        self.complete(walked)
    }

    /// Check a directory holding `package.json` and, for monorepos,
    /// `packages/*/package.json`.
    pub async fn check_local_directory(&mut self, dir: &Path) -> Result<TraversalReport> {
        let walked = self.walk_local_directory(dir).await;
        self.complete(walked)
    }

    /// Check the manifests of a repository at `commit`. Dependencies are
    /// resolved against the registry; `file:` links are not followed.
    pub async fn check_repository_snapshot(
        &mut self,
        contents: &dyn RepositoryContents,
        commit: &str,
    ) -> Result<TraversalReport> {
        let walked = self.walk_repository_snapshot(contents, commit).await;
        self.complete(walked)
    }

    /// Check the merge commit of a pull request.
    pub async fn check_pull_request(
        &mut self,
        repo: &GitHubRepository,
        pr: u64,
    ) -> Result<(PrCommits, TraversalReport)> {
        let commits = match repo.get_pr_commits(pr).await {
            Ok(commits) => commits,
            Err(e) => {
                self.finish();
                return Err(e);
            }
        };
        let report = self
            .check_repository_snapshot(repo, &commits.merge_commit_sha)
            .await?;
        Ok((commits, report))
    }

    async fn walk_remote_package(&mut self, arg: &str) -> Result<()> {
        self.begin(None);
        let package = PackageSpec::parse(arg)?;
        let config = std::env::current_dir()
            .ok()
            .and_then(|dir| load_config(&dir));
        self.rules = RuleSet::build(config.as_ref());

        self.resolve(&package.name, &package.spec, None, &[]).await;
        Ok(())
    }

    async fn walk_local_directory(&mut self, dir: &Path) -> Result<()> {
        let config = load_config(dir);
        self.begin(config.as_ref());

        let mut roots = Vec::new();
        for path in discover_manifests(dir)? {
            let label = path.display().to_string();
            match read_manifest_file(&path) {
                Ok(raw) => {
                    self.register_local(&raw);
                    let base = path.parent().map(Path::to_path_buf);
                    roots.push((label, raw, base));
                }
                Err(e) => self.emit_root_error(&label, &e),
            }
        }

        for (label, raw, base) in roots {
            self.visit(&label);
            self.classify(&raw, None, None, base.as_deref(), &[]).await;
        }
        Ok(())
    }

    async fn walk_repository_snapshot(
        &mut self,
        contents: &dyn RepositoryContents,
        commit: &str,
    ) -> Result<()> {
        self.begin(None);
        let config = contents
            .file_content(commit, CONFIG_FILE_NAME)
            .await?
            .and_then(|content| config_or_warn(&content, CONFIG_FILE_NAME));
        self.rules = RuleSet::build(config.as_ref());

        let mut roots = Vec::new();
        for (path, content) in fetch_manifest_files(contents, commit).await? {
            match serde_json::from_str::<Value>(&content) {
                Ok(raw) => {
                    self.register_local(&raw);
                    roots.push((path, raw));
                }
                Err(source) => {
                    let e = CheckError::ParseJson {
                        path: path.clone(),
                        source,
                    };
                    self.emit_root_error(&path, &e);
                }
            }
        }

        for (path, raw) in roots {
            self.visit(&path);
            self.classify(&raw, None, None, None, &[]).await;
        }
        Ok(())
    }

    fn begin(&mut self, config: Option<&Config>) {
        self.state = TraversalState::default();
        self.report = TraversalReport::default();
        self.rules = RuleSet::build(config);
    }

    /// The end event is emitted whether or not the walk succeeded.
    fn complete(&mut self, walked: Result<()>) -> Result<TraversalReport> {
        let report = self.finish();
        walked.map(|()| report)
    }

    fn finish(&mut self) -> TraversalReport {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_end();
        }
        std::mem::take(&mut self.report)
    }

    fn register_local(&mut self, raw: &Value) {
        let name = raw.get("name").and_then(Value::as_str);
        let version = raw.get("version").and_then(Value::as_str);
        if let (Some(name), Some(version)) = (name, version) {
            self.state
                .local_packages
                .push((name.to_string(), version.to_string()));
        }
    }

    /// Whether the edge `name@spec` points at one of the run's root manifests.
    fn is_local_package(&self, name: &str, spec: &str) -> bool {
        let exact = spec.strip_prefix(['^', '~']).unwrap_or(spec);
        let range = RangeSet::parse(spec).ok();

        self.state.local_packages.iter().any(|(local_name, version)| {
            local_name == name
                && (version == exact
                    || match (&range, Version::parse(version)) {
                        (Some(range), Ok(version)) => range.matches(&version),
                        _ => false,
                    })
        })
    }

    #[async_recursion]
    async fn resolve(
        &mut self,
        name: &str,
        spec: &str,
        local_dir: Option<PathBuf>,
        ancestors: &[String],
    ) {
        // The same `file:` spec means a different package in every directory.
        let file_dir = match &local_dir {
            Some(base) if is_file_spec(spec) => Some(resolve_file_spec(base, spec)),
            _ => None,
        };
        let request = match &file_dir {
            Some(dir) => package_key(name, &dir.display().to_string()),
            None => package_key(name, spec),
        };
        if self.state.failed.contains(&request) || self.state.fetched.contains(&request) {
            return;
        }
        if self.is_local_package(name, spec) {
            debug!(package = %request, "dependency is a local package");
            return;
        }

        let fetched = match file_dir {
            Some(dir) => read_package_dir(&dir).map(|raw| (raw, Some(dir))),
            None => {
                self.report.requested.push(package_key(name, spec));
                self.registry
                    .fetch_manifest(name, spec)
                    .await
                    .map(|raw| (raw, local_dir))
            }
        };

        let (raw, child_dir) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                self.state.failed.insert(request);
                self.emit_error(PackageError {
                    kind: PackageErrorKind::Fetch,
                    message: e.to_string(),
                    package_name: name.to_string(),
                    requested_version: Some(spec.to_string()),
                    ancestors: ancestors.to_vec(),
                });
                return;
            }
        };

        self.state.fetched.insert(request);
        self.classify(&raw, Some(name), Some(spec), child_dir.as_deref(), ancestors)
            .await;
    }

    async fn classify(
        &mut self,
        raw: &Value,
        expected_name: Option<&str>,
        requested: Option<&str>,
        local_dir: Option<&Path>,
        ancestors: &[String],
    ) {
        let declared_name = raw.get("name").and_then(Value::as_str);
        let name = expected_name.or(declared_name).unwrap_or_default().to_string();

        let allowed = self.rules.is_package_allowed(&name);
        let manifest = if allowed {
            Manifest::allowlisted(raw, &name)
        } else {
            match Manifest::parse(raw) {
                Ok(manifest) => manifest,
                Err(e) => {
                    self.emit_error(PackageError {
                        kind: PackageErrorKind::InvalidManifest,
                        message: e.to_string(),
                        package_name: name,
                        requested_version: requested.map(str::to_string),
                        ancestors: ancestors.to_vec(),
                    });
                    return;
                }
            }
        };

        if let (Some(expected), Some(declared)) = (expected_name, declared_name) {
            if expected != declared {
                warn!(expected, declared, "package name does not match its manifest");
            }
        }

        let version = manifest
            .version
            .clone()
            .unwrap_or_else(|| FALLBACK_VERSION.to_string());
        let key = package_key(&name, &version);
        if !self.state.processed.insert(key.clone()) {
            return;
        }

        if allowed {
            info!(package = %key, "package is allow-listed, license not checked");
        } else {
            let license = manifest.license();
            if !is_green(license.as_deref(), &self.rules) {
                self.emit_finding(Finding {
                    name,
                    version,
                    license,
                    ancestors: ancestors.to_vec(),
                });
            }
        }

        let Manifest {
            dependencies,
            dev_dependencies,
            ..
        } = manifest;
        let dev_dependencies = if self.options.dev {
            dev_dependencies
        } else {
            Vec::new()
        };

        let mut chain = ancestors.to_vec();
        chain.push(key);
        let child_dir = local_dir.map(Path::to_path_buf);
        for (dep, spec) in dependencies.iter().chain(dev_dependencies.iter()) {
            self.resolve(dep, spec, child_dir.clone(), &chain).await;
        }
    }

    fn visit(&mut self, path: &str) {
        self.report.visited.push(path.to_string());
        if let Some(observer) = self.observer.as_mut() {
            observer.on_manifest_visited(path);
        }
    }

    fn emit_finding(&mut self, finding: Finding) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_non_green_license(&finding);
        }
        self.report.findings.push(finding);
    }

    fn emit_error(&mut self, error: PackageError) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_error(&error);
        }
        self.report.errors.push(error);
    }

    /// A root manifest that could not be read is a fetch error; one that is
    /// not JSON is an invalid manifest.
    fn emit_root_error(&mut self, path: &str, e: &CheckError) {
        let kind = match e {
            CheckError::ParseJson { .. } => PackageErrorKind::InvalidManifest,
            _ => PackageErrorKind::Fetch,
        };
        self.emit_error(PackageError {
            kind,
            message: e.to_string(),
            package_name: path.to_string(),
            requested_version: None,
            ancestors: Vec::new(),
        });
    }
}
