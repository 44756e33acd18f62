use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use semver::Version;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CheckError;
use crate::registry::range::{parse_exact, RangeSet};
use crate::registry::spec::{ensure_registry_spec, SpecKind, DEFAULT_TAG};
use crate::registry::PackageRegistry;
use crate::Result;

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// The registry document listing every published version of a package.
#[derive(Debug, Deserialize)]
pub struct Packument {
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub versions: Map<String, Value>,
}

/// Fetches manifests from an npm-compatible registry.
pub struct NpmRegistry {
    client: Client,
    base_url: String,
}

impl NpmRegistry {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_REGISTRY)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("green-licenses/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| CheckError::Http {
                url: base_url.to_string(),
                source,
            })?;
        Ok(NpmRegistry {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_packument(&self, name: &str) -> Result<Packument> {
        // Scoped packages need URL encoding: @scope/pkg -> %40scope%2Fpkg
        let url = format!("{}/{}", self.base_url, urlencoding::encode(name));
        debug!(%url, "fetching packument");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| CheckError::Http {
                url: url.clone(),
                source,
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CheckError::PackageNotFound {
                name: name.to_string(),
            });
        }

        response
            .error_for_status()
            .map_err(|source| CheckError::Http {
                url: url.clone(),
                source,
            })?
            .json::<Packument>()
            .await
            .map_err(|source| CheckError::Http { url, source })
    }
}

#[async_trait]
impl PackageRegistry for NpmRegistry {
    async fn fetch_manifest(&self, name: &str, spec: &str) -> Result<Value> {
        let kind = ensure_registry_spec(spec)?;
        let packument = self.fetch_packument(name).await?;
        select_version(name, spec, &kind, &packument).cloned()
    }
}

/// Pick the manifest `spec` refers to.
///
/// Tags go through `dist-tags`, exact versions must be published, and ranges
/// take the `latest` tag when it matches, else the highest matching version.
pub fn select_version<'a>(
    name: &str,
    spec: &str,
    kind: &SpecKind,
    packument: &'a Packument,
) -> Result<&'a Value> {
    let not_found = || CheckError::VersionNotFound {
        name: name.to_string(),
        spec: spec.to_string(),
    };

    let version = match kind {
        SpecKind::Tag => packument.dist_tags.get(spec.trim()).cloned(),
        SpecKind::Version => parse_exact(spec).map(|v| v.to_string()),
        SpecKind::Range => {
            let range = RangeSet::parse(spec).map_err(|e| CheckError::InvalidSpec {
                spec: format!("{}@{}", name, spec),
                reason: e.to_string(),
            })?;
            best_match(&range, packument)
        }
        other => {
            return Err(CheckError::UnsupportedSpec {
                spec: spec.to_string(),
                kind: other.to_string(),
            })
        }
    };

    version
        .and_then(|v| packument.versions.get(&v))
        .ok_or_else(not_found)
}

fn best_match(range: &RangeSet, packument: &Packument) -> Option<String> {
    if let Some(latest) = packument.dist_tags.get(DEFAULT_TAG) {
        if Version::parse(latest).is_ok_and(|v| range.matches(&v)) {
            return Some(latest.clone());
        }
    }

    packument
        .versions
        .keys()
        .filter_map(|key| Version::parse(key).ok().map(|v| (v, key)))
        .filter(|(v, _)| range.matches(v))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, key)| key.clone())
}
