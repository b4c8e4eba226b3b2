use super::error::{FileError, FileResult};
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_GITHUB_HOST: &str = "githubusercontent.com";
pub const DEFAULT_GITLAB_HOST: &str = "gitlab.com";
pub const DEFAULT_REPOSITORY: &str = "demisto/content";

/// Where and how to reach the hosted copies of the content repository.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub github_host: String,
    pub github_repository: String,
    pub github_token: Option<String>,
    pub gitlab_host: String,
    pub gitlab_project_id: Option<u64>,
    pub gitlab_token: Option<String>,
    pub timeout: Duration,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            github_host: DEFAULT_GITHUB_HOST.to_string(),
            github_repository: DEFAULT_REPOSITORY.to_string(),
            github_token: None,
            gitlab_host: DEFAULT_GITLAB_HOST.to_string(),
            gitlab_project_id: None,
            gitlab_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct RemoteClient {
    agent: Agent,
    settings: RemoteSettings,
}

impl RemoteClient {
    pub fn new(settings: RemoteSettings) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(settings.timeout))
            .build();
        Self {
            agent: config.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    pub fn github_raw_url(&self, path: &str, tag: &str) -> String {
        format!(
            "https://raw.{}/{}/{}/{}",
            self.settings.github_host.trim_end_matches('/'),
            self.settings.github_repository.trim_matches('/'),
            tag,
            path.trim_start_matches('/')
        )
    }

    pub fn gitlab_raw_url(&self, path: &str, tag: &str, project_id: u64) -> String {
        format!(
            "https://{}/api/v4/projects/{}/repository/files/{}/raw?ref={}",
            self.settings.gitlab_host.trim_end_matches('/'),
            project_id,
            url_encode(path.trim_start_matches('/')),
            url_encode(tag)
        )
    }

    /// Fetches a raw GitHub file. A 4xx answer to a bearer-authenticated request
    /// is retried once with the token passed as a query parameter instead.
    pub fn fetch_github(&self, path: &str, tag: &str) -> FileResult<Vec<u8>> {
        let url = self.github_raw_url(path, tag);
        let token = self.settings.github_token.as_deref();
        let bearer = token.map(|token| format!("Bearer {token}"));
        match self.get(&url, bearer.as_deref().map(|value| ("Authorization", value))) {
            Err(FileError::HttpFileRead { message, .. })
                if token.is_some() && message.starts_with("status code 4") =>
            {
                debug!(url = %url, "retrying GitHub read with token query parameter");
                let retry_url = format!("{url}?token={}", url_encode(token.unwrap_or_default()));
                self.get(&retry_url, None).map_err(|error| match error {
                    FileError::HttpFileRead { message, .. } => FileError::HttpFileRead {
                        url: url.clone(),
                        message,
                    },
                    other => other,
                })
            }
            other => other,
        }
    }

    pub fn fetch_gitlab(&self, path: &str, tag: &str, project_id: u64) -> FileResult<Vec<u8>> {
        let url = self.gitlab_raw_url(path, tag, project_id);
        let token = self.settings.gitlab_token.as_deref();
        self.get(&url, token.map(|token| ("PRIVATE-TOKEN", token)))
    }

    pub fn fetch_url(&self, url: &str) -> FileResult<Vec<u8>> {
        self.get(url, None)
    }

    fn get(&self, url: &str, header: Option<(&str, &str)>) -> FileResult<Vec<u8>> {
        debug!(url = %url, "http read");
        let mut request = self.agent.get(url).header("User-Agent", "content-validate");
        if let Some((name, value)) = header {
            request = request.header(name, value);
        }
        let mut response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(status)) => {
                return Err(FileError::HttpFileRead {
                    url: url.to_string(),
                    message: format!("status code {status}"),
                });
            }
            Err(error) => {
                return Err(FileError::HttpFileRead {
                    url: url.to_string(),
                    message: error.to_string(),
                });
            }
        };
        response
            .body_mut()
            .read_to_vec()
            .map_err(|error| FileError::HttpFileRead {
                url: url.to_string(),
                message: error.to_string(),
            })
    }
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
pub fn url_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gitlab_url_encodes_path_separators() {
        let client = RemoteClient::new(RemoteSettings {
            gitlab_host: "gitlab.example.com".to_string(),
            ..RemoteSettings::default()
        });
        assert_eq!(
            client.gitlab_raw_url("Packs/A B/pack_metadata.json", "master", 7),
            "https://gitlab.example.com/api/v4/projects/7/repository/files/Packs%2FA%20B%2Fpack_metadata.json/raw?ref=master"
        );
    }

    #[test]
    fn github_url_uses_raw_host() {
        let client = RemoteClient::new(RemoteSettings::default());
        assert_eq!(
            client.github_raw_url("Packs/A/pack_metadata.json", "master"),
            "https://raw.githubusercontent.com/demisto/content/master/Packs/A/pack_metadata.json"
        );
    }
}
