//! DockerHub registry lookups used by the docker-image rules.

use crate::config::DockerSettings;
use crate::model::version_key;
use crate::{ContentError, ContentResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use ureq::Agent;

pub const DEFAULT_REGISTRY: &str = "https://registry-1.docker.io/v2";
pub const TOKEN_URL: &str = "https://auth.docker.io/token";
pub const TOKEN_SERVICE: &str = "registry.docker.io";
pub const DEFAULT_PROXY_HOST: &str = "docker.io";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_DEFAULT_LIFETIME: i64 = 300;
const TOKEN_EXPIRY_MARGIN: i64 = 60;

pub trait DockerHubClient: Send + Sync {
    /// Every tag published for `image` (`demisto/python3`).
    fn image_tags(&self, image: &str) -> ContentResult<Vec<String>>;

    /// The highest numeric tag of `image`.
    fn latest_tag(&self, image: &str) -> ContentResult<String> {
        let tags = self.image_tags(image)?;
        latest_numeric_tag(&tags)
            .ok_or_else(|| ContentError::Docker(format!("The docker image {image} does not have any tags")))
    }
}

/// Splits `demisto/python3:3.10.13.1` into its repository and tag.
pub fn split_image(image: &str) -> (&str, Option<&str>) {
    match image.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => (repository, Some(tag)),
        _ => (image, None),
    }
}

/// Tags made only of dot-separated numbers, compared numerically.
pub fn is_numeric_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

pub fn latest_numeric_tag(tags: &[String]) -> Option<String> {
    tags.iter()
        .filter(|tag| is_numeric_tag(tag))
        .max_by_key(|tag| version_key(tag))
        .cloned()
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    issued_at: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Expiry of a token: `issued_at + expires_in - 60s`. A missing or unreadable
/// `issued_at` counts from `now`.
fn token_expiry(issued_at: Option<&str>, expires_in: Option<i64>, now: DateTime<Utc>) -> DateTime<Utc> {
    let issued = issued_at
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc))
        .unwrap_or(now);
    issued + ChronoDuration::seconds(expires_in.unwrap_or(TOKEN_DEFAULT_LIFETIME) - TOKEN_EXPIRY_MARGIN)
}

/// Registry v2 client with a per `(repository, scope)` token cache.
pub struct RegistryClient {
    agent: Agent,
    settings: DockerSettings,
    tokens: RwLock<HashMap<String, CachedToken>>,
}

impl RegistryClient {
    pub fn new(settings: DockerSettings) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            agent: config.into(),
            settings,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    fn registry_url(&self) -> String {
        if !self.settings.use_proxy {
            return DEFAULT_REGISTRY.to_string();
        }
        let host = self
            .settings
            .registry_proxy
            .as_deref()
            .unwrap_or(DEFAULT_PROXY_HOST)
            .trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/v2")
        } else {
            format!("https://{host}/v2")
        }
    }

    fn token(&self, repository: &str, scope: &str) -> ContentResult<String> {
        let key = format!("{repository}:{scope}");
        if let Some(cached) = self.tokens.read().get(&key) {
            if cached.expires_at > Utc::now() {
                return Ok(cached.token.clone());
            }
        }

        let url = format!("{TOKEN_URL}?service={TOKEN_SERVICE}&scope=repository:{repository}:{scope}");
        let credentials = match (&self.settings.user, &self.settings.password) {
            (Some(user), Some(password)) => Some(STANDARD.encode(format!("{user}:{password}"))),
            _ => None,
        };
        let response = match credentials {
            Some(credentials) => self.request_token(&url, Some(&credentials)).or_else(|error| {
                debug!(%error, "token request with credentials failed, retrying anonymously");
                self.request_token(&url, None)
            })?,
            None => self.request_token(&url, None)?,
        };
        let expires_at = token_expiry(response.issued_at.as_deref(), response.expires_in, Utc::now());
        self.tokens.write().insert(
            key,
            CachedToken {
                token: response.token.clone(),
                expires_at,
            },
        );
        Ok(response.token)
    }

    fn request_token(&self, url: &str, credentials: Option<&str>) -> ContentResult<TokenResponse> {
        let mut request = self.agent.get(url);
        if let Some(credentials) = credentials {
            request = request.header("Authorization", &format!("Basic {credentials}"));
        }
        let mut response = request
            .call()
            .map_err(|error| ContentError::Docker(format!("Failed to get docker hub token: {error}")))?;
        response
            .body_mut()
            .read_json::<TokenResponse>()
            .map_err(|error| ContentError::Docker(format!("Failed to get docker hub token: {error}")))
    }
}

impl DockerHubClient for RegistryClient {
    fn image_tags(&self, image: &str) -> ContentResult<Vec<String>> {
        let (repository, _) = split_image(image);
        let url = format!("{}/{repository}/tags/list", self.registry_url());
        debug!(url = %url, "registry read");
        let mut request = self.agent.get(&url);
        if !self.settings.use_proxy {
            let token = self.token(repository, "pull")?;
            request = request.header("Authorization", &format!("Bearer {token}"));
        }
        let failed = |error: String| {
            ContentError::Docker(format!("Failed to retrieve image tags of docker-image {repository}: {error}"))
        };
        let mut response = request.call().map_err(|error| failed(error.to_string()))?;
        let listed = response
            .body_mut()
            .read_json::<TagList>()
            .map_err(|error| failed(error.to_string()))?;
        let tags = listed.tags.unwrap_or_default();
        if tags.is_empty() {
            warn!(image = repository, "registry returned no tags");
        }
        Ok(tags)
    }
}

/// A fixed tag table, for offline runs and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticDockerHub {
    tags: HashMap<String, Vec<String>>,
}

impl StaticDockerHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(mut self, repository: &str, tags: &[&str]) -> Self {
        self.tags
            .insert(repository.to_string(), tags.iter().map(|tag| tag.to_string()).collect());
        self
    }
}

impl DockerHubClient for StaticDockerHub {
    fn image_tags(&self, image: &str) -> ContentResult<Vec<String>> {
        let (repository, _) = split_image(image);
        self.tags
            .get(repository)
            .cloned()
            .ok_or_else(|| ContentError::Docker(format!("unknown docker image {repository}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_split_into_repository_and_tag() {
        assert_eq!(split_image("demisto/python3:3.10.13.1"), ("demisto/python3", Some("3.10.13.1")));
        assert_eq!(split_image("demisto/python3"), ("demisto/python3", None));
        assert_eq!(split_image("localhost:5000/img"), ("localhost:5000/img", None));
    }

    #[test]
    fn latest_tag_ignores_non_numeric_tags() {
        let tags = ["latest", "3.9.1.100", "3.10.13.2", "3.10.13.10", "1.0.0-rc"]
            .iter()
            .map(|tag| tag.to_string())
            .collect::<Vec<_>>();
        assert_eq!(latest_numeric_tag(&tags).as_deref(), Some("3.10.13.10"));
        assert_eq!(latest_numeric_tag(&["latest".to_string()]), None);
    }

    #[test]
    fn token_expiry_keeps_a_minute_of_margin() {
        let now = Utc::now();
        let expiry = token_expiry(Some("2024-01-01T00:00:00Z"), Some(300), now);
        assert_eq!(expiry.to_rfc3339(), "2024-01-01T00:04:00+00:00");
        assert_eq!(token_expiry(None, Some(120), now), now + ChronoDuration::seconds(60));
    }

    #[test]
    fn proxy_mode_targets_the_proxy_host() {
        let client = RegistryClient::new(DockerSettings {
            use_proxy: true,
            registry_proxy: Some("docker-io.example.com".to_string()),
            ..DockerSettings::default()
        });
        assert_eq!(client.registry_url(), "https://docker-io.example.com/v2");
        assert_eq!(
            RegistryClient::new(DockerSettings::default()).registry_url(),
            DEFAULT_REGISTRY
        );
    }

    #[test]
    fn static_hub_answers_latest_tag() {
        let hub = StaticDockerHub::new().with_tags("demisto/python3", &["3.10.13.1", "3.11.1.5", "latest"]);
        assert_eq!(hub.latest_tag("demisto/python3:latest").expect("tag"), "3.11.1.5");
        assert!(hub.latest_tag("demisto/unknown:1.0").is_err());
    }
}
