pub mod config;
pub mod constants;
pub mod docker;
pub mod files;
pub mod git;
pub mod graph;
pub mod model;
pub mod parsers;
pub mod schema;
pub mod validate;
pub mod validators;

pub use crate::config::{load_config_file, parse_code_list, ConfigFile, ValidateConfig};
pub use crate::constants::{ExecutionMode, GitStatus, MarketplaceVersion, SupportLevel};
pub use crate::files::{FileError, FileReader, FileResult};
pub use crate::git::GitUtil;
pub use crate::graph::ContentGraph;
pub use crate::model::{ContentItem, ContentType};
pub use crate::validate::{
    run_validation, FixResult, RunOutcome, ValidationResult, Validator, ValidatorRegistry,
};

pub type ContentResult<T> = Result<T, ContentError>;

#[derive(thiserror::Error, Debug)]
pub enum ContentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    File(#[from] FileError),
    #[error("git error: {0}")]
    Git(String),
    #[error("Duplicate error code: {0}")]
    DuplicateErrorCode(String),
    #[error("Unknown error code: {0}")]
    UnknownErrorCode(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("DockerHub error: {0}")]
    Docker(String),
}

impl ContentError {
    /// Configuration errors abort the run; everything else degrades to results.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ContentError::DuplicateErrorCode(_)
                | ContentError::UnknownErrorCode(_)
                | ContentError::InvalidConfig(_)
                | ContentError::Toml(_)
        )
    }
}
