//! Plugin reference parsing and the plugin schema registry
//!
//! Plugin references look like `docker#v5.13.0` or `mcncl/foo#v3.0.0`.
//! Each plugin publishes a `plugin.yml` in its GitHub repository; the
//! registry fetches those lazily, caches them with a TTL, and validates
//! step configuration blocks against the schema fragment they carry.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use jsonschema::JSONSchema;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Default GitHub organization for unprefixed plugin references.
const DEFAULT_ORG: &str = "buildkite-plugins";

/// Version used when a reference carries no `#version` part.
const LATEST: &str = "latest";

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const MAX_FETCH_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid plugin reference: {0}")]
    InvalidReference(String),
    #[error("failed to fetch plugin schema for {reference} (org: {org}, name: {name}, version: {version}): {detail}")]
    Fetch {
        reference: String,
        org: String,
        name: String,
        version: String,
        detail: String,
    },
    #[error("Plugin '{plugin}' config serialization failed: {detail}")]
    Serialize { plugin: String, detail: String },
    #[error("Plugin '{plugin}' configuration error: {detail}")]
    Config { plugin: String, detail: String },
}

/// A parsed plugin reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRef {
    /// GitHub organization (e.g. "buildkite-plugins", "mcncl")
    pub org: String,
    /// Plugin name without the repository suffix (e.g. "docker")
    pub name: String,
    /// Version tag, or "latest" when the reference carries none
    pub version: String,
    /// The reference exactly as written
    full_ref: String,
}

impl PluginRef {
    /// Parse `[org/]name[#version]`. Returns `None` for empty input.
    pub fn parse(reference: &str) -> Option<Self> {
        if reference.is_empty() {
            return None;
        }

        let (plugin_part, version) = match reference.split_once('#') {
            Some((plugin, version)) => (plugin, version.to_string()),
            None => (reference, LATEST.to_string()),
        };

        let (org, name) = match plugin_part.split_once('/') {
            Some((org, name)) => (org.to_string(), name.to_string()),
            None => (DEFAULT_ORG.to_string(), plugin_part.to_string()),
        };

        Some(Self {
            org,
            name,
            version,
            full_ref: reference.to_string(),
        })
    }

    /// GitHub repository URL for this plugin.
    pub fn repository_url(&self) -> String {
        format!(
            "https://github.com/{}/{}-buildkite-plugin",
            self.org, self.name
        )
    }

    /// Candidate `plugin.yml` URLs, most specific first: version-pinned,
    /// then the `main` branch, then `master`.
    pub fn schema_urls(&self) -> Vec<String> {
        [self.version.as_str(), "main", "master"]
            .iter()
            .map(|branch| {
                format!(
                    "https://raw.githubusercontent.com/{}/{}-buildkite-plugin/{}/plugin.yml",
                    self.org, self.name, branch
                )
            })
            .collect()
    }
}

impl fmt::Display for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_ref)
    }
}

/// Schema published in a plugin's `plugin.yml`.
#[derive(Debug, Clone)]
pub struct PluginSchema {
    pub name: String,
    pub description: String,
    pub author: String,
    pub requirements: Vec<String>,
    /// JSON Schema fragment for the plugin configuration, if declared
    pub configuration: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default)]
    configuration: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone)]
struct CachedPluginSchema {
    schema: Arc<PluginSchema>,
    #[allow(dead_code)]
    cached_at: Instant,
    expires_at: Instant,
}

impl CachedPluginSchema {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Cache statistics: total entries and how many of them have expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
}

/// Fetches and caches plugin schemas keyed by reference string.
pub struct PluginRegistry {
    http: reqwest::Client,
    cache: RwLock<HashMap<String, CachedPluginSchema>>,
    cache_ttl: Duration,
    max_retries: u32,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }

    /// Create a registry with a custom cache TTL.
    pub fn with_ttl(cache_ttl: Duration) -> Self {
        Self {
            http: crate::http_client(),
            cache: RwLock::new(HashMap::new()),
            cache_ttl,
            max_retries: MAX_FETCH_RETRIES,
        }
    }

    /// Resolve the schema for a plugin reference, fetching it when the
    /// cache has no fresh entry. The fetch happens under the write lock,
    /// so at most one fetch per key is in flight; a failed fetch stores
    /// nothing.
    pub async fn get(&self, reference: &str) -> Result<Arc<PluginSchema>, RegistryError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(reference) {
                if !cached.is_expired() {
                    return Ok(cached.schema.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.get(reference) {
            if !cached.is_expired() {
                return Ok(cached.schema.clone());
            }
        }

        let schema = Arc::new(self.fetch_schema(reference).await?);

        let now = Instant::now();
        cache.insert(
            reference.to_string(),
            CachedPluginSchema {
                schema: schema.clone(),
                cached_at: now,
                expires_at: now + self.cache_ttl,
            },
        );

        Ok(schema)
    }

    async fn fetch_schema(&self, reference: &str) -> Result<PluginSchema, RegistryError> {
        let parsed = PluginRef::parse(reference)
            .ok_or_else(|| RegistryError::InvalidReference(reference.to_string()))?;

        let mut last_error = String::from("no candidate URLs");

        for url in parsed.schema_urls() {
            match self.fetch_manifest(&url).await {
                Ok(manifest) => match manifest_to_schema(reference, manifest) {
                    Ok(schema) => return Ok(schema),
                    Err(error) => last_error = error.to_string(),
                },
                Err(detail) => last_error = detail,
            }
        }

        Err(RegistryError::Fetch {
            reference: reference.to_string(),
            org: parsed.org,
            name: parsed.name,
            version: parsed.version,
            detail: last_error,
        })
    }

    /// One candidate URL: transient transport errors are retried, a
    /// non-200 status or undecodable body moves on to the next candidate.
    async fn fetch_manifest(&self, url: &str) -> Result<RawManifest, String> {
        let mut last_error = String::new();

        for _ in 0..self.max_retries {
            let response = match self.http.get(url).send().await {
                Ok(response) => response,
                Err(error) => {
                    last_error = error.to_string();
                    continue;
                }
            };

            if !response.status().is_success() {
                return Err(format!("HTTP {} from {}", response.status().as_u16(), url));
            }

            let body = response.text().await.map_err(|error| error.to_string())?;
            return serde_yaml::from_str(&body).map_err(|error| error.to_string());
        }

        Err(last_error)
    }

    /// Validate a plugin configuration block. Plugins without a declared
    /// configuration schema are trusted.
    pub async fn validate_config(
        &self,
        reference: &str,
        config: &JsonValue,
    ) -> Result<(), RegistryError> {
        let schema = self.get(reference).await?;

        let Some(fragment) = &schema.configuration else {
            return Ok(());
        };

        let compiled = JSONSchema::compile(fragment).map_err(|error| RegistryError::Config {
            plugin: reference.to_string(),
            detail: error.to_string(),
        })?;

        if let Err(mut errors) = compiled.validate(config) {
            if let Some(first) = errors.next() {
                return Err(RegistryError::Config {
                    plugin: reference.to_string(),
                    detail: first.to_string(),
                });
            }
            return Err(RegistryError::Config {
                plugin: reference.to_string(),
                detail: "configuration is invalid".to_string(),
            });
        }

        Ok(())
    }

    /// Remove a single cache entry.
    pub async fn invalidate(&self, reference: &str) {
        self.cache.write().await.remove(reference);
    }

    /// Sweep expired entries.
    pub async fn clear_expired(&self) {
        self.cache
            .write()
            .await
            .retain(|_, cached| !cached.is_expired());
    }

    pub async fn stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        let expired = cache.values().filter(|cached| cached.is_expired()).count();
        CacheStats {
            total: cache.len(),
            expired,
        }
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, reference: &str, schema: PluginSchema, ttl: Duration) {
        let now = Instant::now();
        self.cache.write().await.insert(
            reference.to_string(),
            CachedPluginSchema {
                schema: Arc::new(schema),
                cached_at: now,
                expires_at: now + ttl,
            },
        );
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn manifest_to_schema(reference: &str, manifest: RawManifest) -> Result<PluginSchema, RegistryError> {
    let configuration = match manifest.configuration {
        Some(yaml) => Some(serde_json::to_value(yaml).map_err(|error| RegistryError::Serialize {
            plugin: reference.to_string(),
            detail: error.to_string(),
        })?),
        None => None,
    };

    Ok(PluginSchema {
        name: manifest.name,
        description: manifest.description,
        author: manifest.author,
        requirements: manifest.requirements,
        configuration,
    })
}

/// Extract `(reference, configuration)` pairs from a step's `plugins`
/// list in the JSON projection.
pub fn plugin_refs_from_step(step: &JsonValue) -> Vec<(String, JsonValue)> {
    let mut refs = Vec::new();

    let Some(plugins) = step.get("plugins").and_then(JsonValue::as_array) else {
        return refs;
    };

    for item in plugins {
        match item {
            JsonValue::Object(map) => {
                for (name, config) in map {
                    refs.push((name.clone(), config.clone()));
                }
            }
            // Bare string entries carry no configuration to validate.
            _ => {}
        }
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_official_plugin_reference() {
        let parsed = PluginRef::parse("docker#v5.13.0").unwrap();
        assert_eq!(parsed.org, "buildkite-plugins");
        assert_eq!(parsed.name, "docker");
        assert_eq!(parsed.version, "v5.13.0");
    }

    #[test]
    fn parses_org_reference_without_version() {
        let parsed = PluginRef::parse("mcncl/foo").unwrap();
        assert_eq!(parsed.org, "mcncl");
        assert_eq!(parsed.name, "foo");
        assert_eq!(parsed.version, "latest");
    }

    #[test]
    fn display_round_trips_the_reference() {
        for reference in ["docker#v5.13.0", "mcncl/foo#v3.0.0", "company/internal", "cache"] {
            let parsed = PluginRef::parse(reference).unwrap();
            assert_eq!(parsed.to_string(), reference);
        }
    }

    #[test]
    fn rejects_empty_reference() {
        assert!(PluginRef::parse("").is_none());
    }

    #[test]
    fn repository_and_schema_urls() {
        let parsed = PluginRef::parse("mcncl/foo#v3.0.0").unwrap();
        assert_eq!(
            parsed.repository_url(),
            "https://github.com/mcncl/foo-buildkite-plugin"
        );
        assert_eq!(
            parsed.schema_urls(),
            vec![
                "https://raw.githubusercontent.com/mcncl/foo-buildkite-plugin/v3.0.0/plugin.yml",
                "https://raw.githubusercontent.com/mcncl/foo-buildkite-plugin/main/plugin.yml",
                "https://raw.githubusercontent.com/mcncl/foo-buildkite-plugin/master/plugin.yml",
            ]
        );
    }

    #[test]
    fn plugin_refs_from_step_extracts_pairs() {
        let step = json!({
            "command": "echo",
            "plugins": [
                {"docker#v5.13.0": {"image": "node:18"}},
                {"cache#v1.7.0": {"key": "v1"}},
                "artifacts#v1.9.4"
            ]
        });

        let refs = plugin_refs_from_step(&step);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].0, "docker#v5.13.0");
        assert_eq!(refs[0].1, json!({"image": "node:18"}));
        assert_eq!(refs[1].0, "cache#v1.7.0");
    }

    #[test]
    fn plugin_refs_from_step_without_plugins() {
        assert!(plugin_refs_from_step(&json!({"command": "echo"})).is_empty());
    }

    fn test_schema(configuration: Option<JsonValue>) -> PluginSchema {
        PluginSchema {
            name: "docker".to_string(),
            description: "Run build steps in Docker containers".to_string(),
            author: "Buildkite".to_string(),
            requirements: vec![],
            configuration,
        }
    }

    #[tokio::test]
    async fn cache_hit_returns_without_fetching() {
        let registry = PluginRegistry::new();
        registry
            .seed("docker#v5.13.0", test_schema(None), Duration::from_secs(60))
            .await;

        let schema = registry.get("docker#v5.13.0").await.unwrap();
        assert_eq!(schema.name, "docker");
    }

    #[tokio::test]
    async fn stats_count_expired_entries() {
        let registry = PluginRegistry::new();
        registry
            .seed("fresh#v1.0.0", test_schema(None), Duration::from_secs(3600))
            .await;
        registry
            .seed("stale#v1.0.0", test_schema(None), Duration::ZERO)
            .await;

        // A zero TTL entry expires as soon as any time passes.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let stats = registry.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.expired, 1);

        registry.clear_expired().await;
        let stats = registry.stats().await;
        assert_eq!(stats, CacheStats { total: 1, expired: 0 });
    }

    #[tokio::test]
    async fn invalidate_removes_the_entry() {
        let registry = PluginRegistry::new();
        registry
            .seed("docker#v5.13.0", test_schema(None), Duration::from_secs(60))
            .await;

        registry.invalidate("docker#v5.13.0").await;
        assert_eq!(registry.stats().await.total, 0);
    }

    #[tokio::test]
    async fn validate_config_trusts_schemaless_plugins() {
        let registry = PluginRegistry::new();
        registry
            .seed("docker#v5.13.0", test_schema(None), Duration::from_secs(60))
            .await;

        let result = registry
            .validate_config("docker#v5.13.0", &json!({"anything": "goes"}))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn validate_config_reports_the_first_error() {
        let fragment = json!({
            "type": "object",
            "properties": {"image": {"type": "string"}},
            "required": ["image"],
            "additionalProperties": false
        });
        let registry = PluginRegistry::new();
        registry
            .seed(
                "docker#v5.13.0",
                test_schema(Some(fragment)),
                Duration::from_secs(60),
            )
            .await;

        let err = registry
            .validate_config("docker#v5.13.0", &json!({"imaeg": "node:18"}))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Plugin 'docker#v5.13.0'"), "{message}");
    }
}
