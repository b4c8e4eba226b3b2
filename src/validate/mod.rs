//! Validator contract, selection, execution, the fix protocol and reporting.

mod context;
mod registry;
mod report;
mod runner;

pub use context::ValidationContext;
pub use registry::ValidatorRegistry;
pub use report::{render, render_human, render_json, OutputFormat};
pub use runner::{run_validation, RunOutcome};

use crate::constants::{ExecutionMode, GitStatus, FRAMEWORK_ERROR_CODE};
use crate::model::{ContentItem, ContentType};
use crate::ContentResult;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Fixed metadata every validator declares.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorInfo {
    pub error_code: &'static str,
    pub description: &'static str,
    pub rationale: &'static str,
    pub error_message: &'static str,
    pub fix_message: Option<&'static str>,
    pub related_field: &'static str,
    /// Content types the validator consumes; empty means every type.
    pub content_types: &'static [ContentType],
    /// Empty means every item regardless of git status.
    pub expected_git_statuses: &'static [GitStatus],
    /// Empty means every execution mode.
    pub expected_execution_mode: &'static [ExecutionMode],
    pub is_auto_fixable: bool,
    pub run_on_deprecated: bool,
    /// Needs the content graph.
    pub uses_graph: bool,
}

impl ValidatorInfo {
    pub const DEFAULT: ValidatorInfo = ValidatorInfo {
        error_code: "",
        description: "",
        rationale: "",
        error_message: "",
        fix_message: None,
        related_field: "",
        content_types: &[],
        expected_git_statuses: &[],
        expected_execution_mode: &[],
        is_auto_fixable: false,
        run_on_deprecated: false,
        uses_graph: false,
    };

    pub fn family(&self) -> &'static str {
        self.error_code.get(..2).unwrap_or(self.error_code)
    }

    /// Whether `item` is in this validator's input set.
    pub fn accepts(&self, item: &ContentItem) -> bool {
        if !self.content_types.is_empty() && !self.content_types.contains(&item.content_type) {
            return false;
        }
        if !self.expected_git_statuses.is_empty()
            && !item
                .git_status
                .is_some_and(|status| self.expected_git_statuses.contains(&status))
        {
            return false;
        }
        self.run_on_deprecated || !item.deprecated
    }

    pub fn runs_in(&self, mode: ExecutionMode) -> bool {
        self.expected_execution_mode.is_empty() || self.expected_execution_mode.contains(&mode)
    }
}

/// A pluggable rule.
///
/// Validators are stateless: `obtain_invalid_content_items` sees the whole
/// filtered item set once per run, and `fix` recomputes whatever it needs from
/// the item it is handed.
pub trait Validator: Send + Sync {
    fn info(&self) -> &'static ValidatorInfo;

    fn error_code(&self) -> &'static str {
        self.info().error_code
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult>;

    /// Mutates `item.data` so it no longer violates the rule.
    fn fix(&self, item: &mut ContentItem, ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        let _ = (item, ctx);
        Err(crate::ContentError::InvalidConfig(format!(
            "{} is not auto-fixable",
            self.error_code()
        )))
    }

    /// A violation of this rule on `item`.
    fn result(&self, item: &ContentItem, message: impl Into<String>) -> ValidationResult
    where
        Self: Sized,
    {
        ValidationResult::violation(self.info(), &item.path, message)
    }

    fn fixed(&self, item: &ContentItem, message: impl Into<String>) -> FixResult
    where
        Self: Sized,
    {
        FixResult {
            error_code: self.error_code().to_string(),
            path: item.path.clone(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Violation,
    Fixed,
    FixFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub error_code: String,
    pub path: PathBuf,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_field: Option<String>,
    pub outcome: Outcome,
}

impl ValidationResult {
    pub fn violation(info: &ValidatorInfo, path: &Path, message: impl Into<String>) -> Self {
        Self {
            error_code: info.error_code.to_string(),
            path: path.to_path_buf(),
            message: message.into(),
            related_field: (!info.related_field.is_empty()).then(|| info.related_field.to_string()),
            outcome: Outcome::Violation,
        }
    }

    /// The synthetic result standing in for a crashed validator or an
    /// unparseable path.
    pub fn framework_error(path: &Path, message: impl Into<String>) -> Self {
        Self {
            error_code: FRAMEWORK_ERROR_CODE.to_string(),
            path: path.to_path_buf(),
            message: message.into(),
            related_field: None,
            outcome: Outcome::Violation,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome != Outcome::Fixed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixResult {
    pub error_code: String,
    pub path: PathBuf,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemDetails, PackRef};
    use serde_json::json;
    use std::sync::Arc;

    const INFO: ValidatorInfo = ValidatorInfo {
        error_code: "BC100",
        content_types: &[ContentType::Integration],
        expected_git_statuses: &[GitStatus::Modified],
        ..ValidatorInfo::DEFAULT
    };

    fn item(status: Option<GitStatus>, deprecated: bool) -> ContentItem {
        let mut item = ContentItem::new(
            ContentType::Integration,
            PathBuf::from("Packs/A/Integrations/A/A.yml"),
            Arc::new(PackRef::default()),
            json!({}),
            ItemDetails::Generic,
        );
        item.git_status = status;
        item.deprecated = deprecated;
        item
    }

    #[test]
    fn acceptance_checks_type_status_and_deprecation() {
        assert!(INFO.accepts(&item(Some(GitStatus::Modified), false)));
        assert!(!INFO.accepts(&item(Some(GitStatus::Added), false)));
        assert!(!INFO.accepts(&item(None, false)));
        assert!(!INFO.accepts(&item(Some(GitStatus::Modified), true)));
        assert_eq!(INFO.family(), "BC");
        assert!(INFO.runs_in(ExecutionMode::AllFiles));
    }
}
