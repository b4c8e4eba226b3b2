use crate::constants::{ExecutionMode, DEFAULT_REMOTE};
use crate::files::RemoteSettings;
use crate::{ContentError, ContentResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".content-validate.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub validate: ValidateSection,
    #[serde(default)]
    pub git: GitSection,
    #[serde(default)]
    pub remote: RemoteSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ValidateSection {
    pub select: Option<Vec<String>>,
    pub ignore: Option<Vec<String>>,
    pub warning: Option<Vec<String>>,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GitSection {
    pub base: Option<String>,
    pub remote: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RemoteSection {
    pub github_host: Option<String>,
    pub github_repository: Option<String>,
    pub gitlab_host: Option<String>,
    pub gitlab_project_id: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerSettings {
    pub user: Option<String>,
    pub password: Option<String>,
    /// Route registry calls through the artifact-registry proxy.
    pub use_proxy: bool,
    /// Proxy host taken from `DOCKER_IO`.
    pub registry_proxy: Option<String>,
}

/// Every tunable of a validation run. Built once and passed by reference.
#[derive(Debug, Clone)]
pub struct ValidateConfig {
    pub content_root: PathBuf,
    pub execution_mode: ExecutionMode,
    pub file_paths: Vec<PathBuf>,
    pub select: Vec<String>,
    pub ignore: Vec<String>,
    pub warning: Vec<String>,
    pub fix: bool,
    pub base: Option<String>,
    pub git_remote: String,
    pub committed_only: bool,
    pub staged_only: bool,
    pub include_untracked: bool,
    pub docker_checks: bool,
    pub docker: DockerSettings,
    pub remote: RemoteSettings,
    pub workers: usize,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("."),
            execution_mode: ExecutionMode::AllFiles,
            file_paths: Vec::new(),
            select: Vec::new(),
            ignore: Vec::new(),
            warning: Vec::new(),
            fix: false,
            base: None,
            git_remote: DEFAULT_REMOTE.to_string(),
            committed_only: false,
            staged_only: false,
            include_untracked: true,
            docker_checks: true,
            docker: DockerSettings::default(),
            remote: RemoteSettings::default(),
            workers: default_workers(),
        }
    }
}

impl ValidateConfig {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: root.into(),
            ..Self::default()
        }
    }

    pub fn is_warning(&self, code: &str) -> bool {
        code_matches(&self.warning, code)
    }

    /// Overlays a parsed config file. Values already set stay untouched only
    /// where the file is silent.
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(select) = file.validate.select {
            self.select = normalize_codes(select);
        }
        if let Some(ignore) = file.validate.ignore {
            self.ignore = normalize_codes(ignore);
        }
        if let Some(warning) = file.validate.warning {
            self.warning = normalize_codes(warning);
        }
        if let Some(workers) = file.validate.workers.filter(|workers| *workers > 0) {
            self.workers = workers;
        }
        if let Some(base) = file.git.base {
            self.base = Some(base);
        }
        if let Some(remote) = file.git.remote {
            self.git_remote = remote;
        }
        if let Some(host) = file.remote.github_host {
            self.remote.github_host = host;
        }
        if let Some(repository) = file.remote.github_repository {
            self.remote.github_repository = repository;
        }
        if let Some(host) = file.remote.gitlab_host {
            self.remote.gitlab_host = host;
        }
        if let Some(project_id) = file.remote.gitlab_project_id {
            self.remote.gitlab_project_id = Some(project_id);
        }
    }

    /// Overlays environment variables, looked up through `lookup` so the caller
    /// decides where they come from.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ContentResult<()> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(root) = get("DEMISTO_SDK_CONTENT_PATH") {
            self.content_root = PathBuf::from(root);
        }
        if let Some(token) = get("DEMISTO_SDK_GITHUB_TOKEN") {
            self.remote.github_token = Some(token);
        }
        if let Some(token) = get("DEMISTO_SDK_GITLAB_TOKEN") {
            self.remote.gitlab_token = Some(token);
        }
        if let Some(host) = get("DEMISTO_SDK_REPO_HOSTNAME") {
            if host.contains("gitlab") || self.remote.gitlab_project_id.is_some() {
                self.remote.gitlab_host = host;
            } else {
                self.remote.github_host = host;
            }
        }
        if let Some(project_id) = get("CI_PROJECT_ID") {
            let parsed = project_id.trim().parse::<u64>().map_err(|_| {
                ContentError::InvalidConfig(format!("CI_PROJECT_ID is not a number: {project_id}"))
            })?;
            self.remote.gitlab_project_id = Some(parsed);
        }
        self.docker.user = get("DOCKERHUB_USER").or(self.docker.user.take());
        self.docker.password = get("DOCKERHUB_PASSWORD").or(self.docker.password.take());
        if let Some(proxy) = get("DOCKER_IO") {
            self.docker.registry_proxy = Some(proxy);
            self.docker.use_proxy = true;
        }
        if get("CONTENT_GITLAB_CI").is_some() {
            self.docker.use_proxy = true;
        }
        Ok(())
    }
}

pub fn load_config_file(path: &Path) -> ContentResult<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Splits a comma separated list of error codes or family prefixes.
pub fn parse_code_list(value: &str) -> Vec<String> {
    normalize_codes(value.split(',').map(str::to_string))
}

fn normalize_codes(codes: impl IntoIterator<Item = String>) -> Vec<String> {
    codes
        .into_iter()
        .map(|code| code.trim().to_ascii_uppercase())
        .filter(|code| !code.is_empty())
        .collect()
}

/// True when `code` is listed outright or its family prefix is listed.
pub fn code_matches(list: &[String], code: &str) -> bool {
    list.iter()
        .any(|entry| entry.eq_ignore_ascii_case(code) || (entry.len() < code.len() && code.starts_with(entry.as_str())))
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn file_values_overlay_defaults() {
        let file: ConfigFile = toml::from_str(
            r#"
[validate]
select = ["ba", " IN100 "]
warning = ["RN"]

[git]
base = "origin/main"

[remote]
gitlab_project_id = 1234
"#,
        )
        .expect("parse");
        let mut config = ValidateConfig::default();
        config.apply_file(file);
        assert_eq!(config.select, vec!["BA", "IN100"]);
        assert!(config.is_warning("RN106"));
        assert_eq!(config.base.as_deref(), Some("origin/main"));
        assert_eq!(config.remote.gitlab_project_id, Some(1234));
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(toml::from_str::<ConfigFile>("[nope]\nvalue = 1\n").is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let env = HashMap::from([
            ("DEMISTO_SDK_GITHUB_TOKEN", "gh-token"),
            ("DEMISTO_SDK_REPO_HOSTNAME", "github.example.com"),
            ("DOCKER_IO", "1"),
            ("DOCKERHUB_USER", "bot"),
        ]);
        let mut config = ValidateConfig::default();
        config
            .apply_env(|key| env.get(key).map(|value| value.to_string()))
            .expect("env");
        assert_eq!(config.remote.github_token.as_deref(), Some("gh-token"));
        assert_eq!(config.remote.github_host, "github.example.com");
        assert!(config.docker.use_proxy);
        assert_eq!(config.docker.user.as_deref(), Some("bot"));
    }

    #[test]
    fn code_lists_accept_prefixes() {
        let list = parse_code_list("BA, in100,,");
        assert_eq!(list, vec!["BA", "IN100"]);
        assert!(code_matches(&list, "BA108"));
        assert!(code_matches(&list, "IN100"));
        assert!(!code_matches(&list, "IN102"));
    }
}
