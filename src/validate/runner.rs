use super::{Outcome, ValidationContext, ValidationResult, Validator, ValidatorRegistry};
use crate::config::{code_matches, ValidateConfig};
use crate::constants::{ExecutionMode, COMPLIANT_POLICIES, DEFAULT_BRANCH};
use crate::docker::{DockerHubClient, RegistryClient};
use crate::files::FileReader;
use crate::git::{ChangedFiles, DiffOptions, GitUtil};
use crate::graph::ContentGraph;
use crate::model::{BaseSource, CompliantPolicies, ContentItem, ContentType};
use crate::parsers::{resolve_descriptor, ContentParser, GitBaseLoader};
use crate::{ContentError, ContentResult};
use rayon::prelude::*;
use serde::Serialize;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Everything a run produced, sorted by `(error_code, path)`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    pub results: Vec<ValidationResult>,
    pub items_checked: usize,
    pub validators_run: usize,
    pub fixes_applied: usize,
    /// Codes reported as warnings.
    #[serde(skip)]
    pub warning_codes: Vec<String>,
}

impl RunOutcome {
    /// Results of codes configured as warnings never fail the run.
    pub fn is_warning(&self, result: &ValidationResult) -> bool {
        code_matches(&self.warning_codes, &result.error_code)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results
            .iter()
            .filter(|result| result.is_failure() && !self.is_warning(result))
    }

    pub fn is_valid(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_valid() {
            0
        } else {
            1
        }
    }
}

/// Runs every selected validator of `registry` over the paths the execution
/// mode selects. Only configuration problems surface as `Err`.
pub fn run_validation(
    config: &ValidateConfig,
    registry: &ValidatorRegistry,
    docker: Option<Arc<dyn DockerHubClient>>,
) -> ContentResult<RunOutcome> {
    let validators = registry.select(config)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()
        .map_err(|error| ContentError::InvalidConfig(format!("cannot start the worker pool: {error}")))?;
    pool.install(|| execute(config, validators, docker))
}

fn execute(
    config: &ValidateConfig,
    validators: Vec<Arc<dyn Validator>>,
    docker: Option<Arc<dyn DockerHubClient>>,
) -> ContentResult<RunOutcome> {
    let reader = Arc::new(FileReader::new(config.content_root.clone(), config.remote.clone()));
    let selection = collect_paths(config, &reader)?;
    let parser = selection.parser;
    let (items, invalid) = parser.parse_paths(&selection.paths);
    info!(
        mode = config.execution_mode.as_str(),
        items = items.len(),
        invalid = invalid.len(),
        validators = validators.len(),
        "validation started"
    );

    let mut results = invalid
        .into_iter()
        .map(|invalid| ValidationResult::framework_error(&invalid.path, invalid.message))
        .collect::<Vec<_>>();

    let mut ctx = ValidationContext::new(config, &reader, config.execution_mode)
        .with_scope(items.iter().map(|item| item.path.clone()).collect())
        .with_deleted_files(selection.deleted);
    if validators.iter().any(|validator| validator.info().uses_graph) {
        ctx = ctx.with_graph(Arc::new(build_graph(config, &parser, &items, &reader)));
    }
    if config.docker_checks {
        let client = docker.unwrap_or_else(|| Arc::new(RegistryClient::new(config.docker.clone())));
        ctx = ctx.with_docker(client);
    }
    match CompliantPolicies::load(&reader, Path::new(COMPLIANT_POLICIES)) {
        Ok(Some(policies)) => ctx = ctx.with_policies(policies),
        Ok(None) => debug!("no compliant policies registry"),
        Err(error) => warn!(%error, "unreadable compliant policies registry"),
    }

    let mut violations = validators
        .par_iter()
        .flat_map_iter(|validator| run_validator(validator.as_ref(), &items, &ctx))
        .collect::<Vec<_>>();

    let mut fixes_applied = 0;
    if config.fix {
        let by_code = validators
            .iter()
            .map(|validator| (validator.error_code(), validator.clone()))
            .collect::<HashMap<_, _>>();
        let (fixed, failed) = apply_fixes(&violations, &by_code, &parser, &ctx);
        fixes_applied = fixed.len();
        for result in &mut violations {
            if let Some(message) = fixed.get(&(result.error_code.clone(), result.path.clone())) {
                result.outcome = Outcome::Fixed;
                result.message = message.clone();
            }
        }
        violations.extend(failed);
    }

    results.extend(violations);
    results.sort_by(|left, right| {
        (&left.error_code, &left.path, left.outcome, &left.message).cmp(&(
            &right.error_code,
            &right.path,
            right.outcome,
            &right.message,
        ))
    });
    results.dedup();
    info!(results = results.len(), fixed = fixes_applied, "validation finished");

    Ok(RunOutcome {
        results,
        items_checked: items.len(),
        validators_run: validators.len(),
        fixes_applied,
        warning_codes: config.warning.clone(),
    })
}

struct PathSelection {
    parser: ContentParser,
    paths: Vec<PathBuf>,
    deleted: Vec<PathBuf>,
}

fn diff_options(config: &ValidateConfig) -> DiffOptions {
    DiffOptions {
        committed_only: config.committed_only,
        staged_only: config.staged_only,
        include_untracked: config.include_untracked,
    }
}

fn collect_paths(config: &ValidateConfig, reader: &Arc<FileReader>) -> ContentResult<PathSelection> {
    let parser = ContentParser::new(reader.clone());
    match config.execution_mode {
        ExecutionMode::AllFiles => {
            let paths = parser.discover_all();
            Ok(PathSelection {
                parser,
                paths,
                deleted: Vec::new(),
            })
        }
        ExecutionMode::SpecificFiles => {
            let paths = config.file_paths.clone();
            let Some(git) = reader.git() else {
                return Ok(PathSelection {
                    parser,
                    paths,
                    deleted: Vec::new(),
                });
            };
            let base = base_branch(config, git);
            match diff_against(config, git, &base, reader) {
                Ok((source, changes)) => Ok(PathSelection {
                    parser: parser.with_base(source, changes),
                    paths,
                    deleted: Vec::new(),
                }),
                Err(error) => {
                    warn!(base, %error, "no base revision, git statuses unavailable");
                    Ok(PathSelection {
                        parser,
                        paths,
                        deleted: Vec::new(),
                    })
                }
            }
        }
        ExecutionMode::UseGit => {
            let git = reader.git().ok_or_else(|| {
                ContentError::InvalidConfig(format!(
                    "{} is not inside a git repository",
                    config.content_root.display()
                ))
            })?;
            let base = base_branch(config, git);
            let (source, changes) = diff_against(config, git, &base, reader)?;
            let paths = changes.all_changed().into_iter().collect::<Vec<_>>();
            let deleted = changes.deleted.iter().cloned().collect::<Vec<_>>();
            info!(base, changed = paths.len(), deleted = deleted.len(), "git changes collected");
            Ok(PathSelection {
                parser: parser.with_base(source, changes),
                paths,
                deleted,
            })
        }
    }
}

fn base_branch(config: &ValidateConfig, git: &GitUtil) -> String {
    config
        .base
        .clone()
        .or_else(|| git.find_primary_branch())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string())
}

fn diff_against(
    config: &ValidateConfig,
    git: &GitUtil,
    base: &str,
    reader: &Arc<FileReader>,
) -> ContentResult<(BaseSource, ChangedFiles)> {
    let changes = git.changed_files(base, diff_options(config))?;
    let reference = if git.current_branch().ok().as_deref() == Some(base) {
        "HEAD~1".to_string()
    } else {
        git.resolve_base(base)?
    };
    debug!(base, reference, "base revision resolved");
    let source = BaseSource(Arc::new(GitBaseLoader::new(reader.clone(), reference)));
    Ok((source, descriptor_changes(reader.root(), changes)))
}

/// A changed companion file (code, README, image) marks its descriptor as
/// modified unless git already classified the descriptor itself.
fn descriptor_changes(root: &Path, mut changes: ChangedFiles) -> ChangedFiles {
    let touched = changes
        .modified
        .iter()
        .chain(changes.added.iter())
        .chain(changes.renamed.iter().map(|(_, new)| new))
        .filter_map(|path| resolve_descriptor(root, path))
        .map(|descriptor| descriptor.path)
        .collect::<BTreeSet<_>>();
    for descriptor in touched {
        if changes.status_of(&descriptor).is_none() {
            changes.modified.insert(descriptor);
        }
    }
    changes
}

/// The graph always spans the whole content tree, whatever the mode.
fn build_graph(config: &ValidateConfig, parser: &ContentParser, items: &[ContentItem], reader: &FileReader) -> ContentGraph {
    let all_items = if config.execution_mode == ExecutionMode::AllFiles {
        items.to_vec()
    } else {
        let (all_items, invalid) = parser.parse_paths(&parser.discover_all());
        if !invalid.is_empty() {
            debug!(skipped = invalid.len(), "unparseable items left out of the graph");
        }
        all_items
    };
    ContentGraph::build(all_items, Some(reader))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn run_validator(validator: &dyn Validator, items: &[ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
    let info = validator.info();
    let accepted = items.iter().filter(|item| info.accepts(item)).collect::<Vec<_>>();
    debug!(code = info.error_code, items = accepted.len(), "running validator");
    match catch_unwind(AssertUnwindSafe(|| validator.obtain_invalid_content_items(&accepted, ctx))) {
        Ok(results) => results,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!(code = info.error_code, reason, "validator crashed");
            let path = accepted
                .first()
                .map(|item| item.path.clone())
                .unwrap_or_else(|| ctx.reader.root().to_path_buf());
            vec![ValidationResult::framework_error(
                &path,
                format!("{} failed to run: {reason}", info.error_code),
            )]
        }
    }
}

type FixKey = (String, PathBuf);

/// Applies every fixable violation. Paths are handled in parallel; the codes of
/// one path run in order, each on a fresh parse of the file.
fn apply_fixes(
    violations: &[ValidationResult],
    validators: &HashMap<&'static str, Arc<dyn Validator>>,
    parser: &ContentParser,
    ctx: &ValidationContext<'_>,
) -> (HashMap<FixKey, String>, Vec<ValidationResult>) {
    let mut by_path: BTreeMap<PathBuf, BTreeSet<&'static str>> = BTreeMap::new();
    for result in violations.iter().filter(|result| result.outcome == Outcome::Violation) {
        if let Some(validator) = validators.get(result.error_code.as_str()) {
            if validator.info().is_auto_fixable {
                by_path
                    .entry(result.path.clone())
                    .or_default()
                    .insert(validator.error_code());
            }
        }
    }

    let attempts = by_path
        .into_par_iter()
        .flat_map_iter(|(path, codes)| {
            codes
                .into_iter()
                .filter_map(|code| validators.get(code))
                .map(|validator| (validator.error_code(), path.clone(), fix_one(validator.as_ref(), &path, parser, ctx)))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut fixed = HashMap::new();
    let mut failed = Vec::new();
    for (code, path, attempt) in attempts {
        match attempt {
            Ok(message) => {
                fixed.insert((code.to_string(), path), message);
            }
            Err(message) => {
                warn!(code, path = %path.display(), reason = %message, "fix failed");
                failed.push(ValidationResult {
                    error_code: code.to_string(),
                    path,
                    message,
                    related_field: None,
                    outcome: Outcome::FixFailed,
                });
            }
        }
    }
    (fixed, failed)
}

fn fix_one(validator: &dyn Validator, path: &Path, parser: &ContentParser, ctx: &ValidationContext<'_>) -> Result<String, String> {
    let mut item = parser.parse_path(path).map_err(|invalid| invalid.message)?;
    let fixed = catch_unwind(AssertUnwindSafe(|| validator.fix(&mut item, ctx)))
        .map_err(|payload| panic_message(payload.as_ref()))?
        .map_err(|error| error.to_string())?;
    ctx.reader
        .write_value(&item.path, &item.data)
        .map_err(|error| error.to_string())?;
    if item.content_type == ContentType::Pack {
        parser.forget_pack(item.pack_name());
    }
    debug!(code = validator.error_code(), path = %path.display(), "fix written");

    let reparsed = parser.parse_path(path).map_err(|invalid| invalid.message)?;
    let still_failing = catch_unwind(AssertUnwindSafe(|| validator.obtain_invalid_content_items(&[&reparsed], ctx)))
        .map_err(|payload| panic_message(payload.as_ref()))?
        .iter()
        .any(|result| result.path == reparsed.path);
    if still_failing {
        return Err(format!(
            "The fix of {} did not resolve the violation",
            validator.error_code()
        ));
    }
    Ok(fixed.message)
}
