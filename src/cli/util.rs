use super::args::{ValidateArgs, ValidateFormat};
use anyhow::{anyhow, Context};
use content_validate::config::CONFIG_FILE_NAME;
use content_validate::model::ALL_CONTENT_TYPES;
use content_validate::validate::OutputFormat;
use content_validate::{load_config_file, parse_code_list, ContentType, ExecutionMode, GitUtil, ValidateConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const CONTENT_PATH_ENV: &str = "DEMISTO_SDK_CONTENT_PATH";

/// `RUST_LOG` wins over `-v`.
pub(super) fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Flag, then `DEMISTO_SDK_CONTENT_PATH`, then the enclosing git repository,
/// then the working directory.
pub(super) fn resolve_content_root(flag: Option<&Path>) -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let root = flag
        .map(Path::to_path_buf)
        .or_else(|| env_value(CONTENT_PATH_ENV).map(PathBuf::from))
        .or_else(|| GitUtil::open(&cwd).ok().map(|git| git.root().to_path_buf()))
        .unwrap_or_else(|| cwd.clone());
    let root = if root.is_absolute() { root } else { cwd.join(root) };
    if !root.is_dir() {
        return Err(anyhow!("content root {} is not a directory", root.display()));
    }
    Ok(root.canonicalize().unwrap_or(root))
}

/// Defaults < config file < environment < flags.
pub(super) fn build_config(args: &ValidateArgs) -> anyhow::Result<ValidateConfig> {
    let root = resolve_content_root(args.content_root.as_deref())?;
    let mut config = ValidateConfig::for_root(root.clone());
    let config_path = root.join(CONFIG_FILE_NAME);
    if let Some(file) =
        load_config_file(&config_path).with_context(|| format!("failed to load {}", config_path.display()))?
    {
        config.apply_file(file);
    }
    config.apply_env(|key| std::env::var(key).ok())?;
    config.content_root = root;
    apply_flags(&mut config, args);
    Ok(config)
}

fn apply_flags(config: &mut ValidateConfig, args: &ValidateArgs) {
    config.execution_mode = execution_mode(args);
    config.file_paths = args.file_paths.iter().map(|path| absolute_path(path)).collect();
    if let Some(select) = &args.select {
        config.select = parse_code_list(select);
    }
    if let Some(ignore) = &args.ignore {
        config.ignore = parse_code_list(ignore);
    }
    if let Some(warning) = &args.warning {
        config.warning = parse_code_list(warning);
    }
    if let Some(base) = &args.base {
        config.base = Some(base.clone());
    }
    if let Some(workers) = args.workers.filter(|workers| *workers > 0) {
        config.workers = workers;
    }
    config.staged_only = args.staged;
    config.committed_only = args.committed_only;
    config.docker_checks = !args.no_docker_checks;
    config.fix = args.fix;
}

pub(super) fn execution_mode(args: &ValidateArgs) -> ExecutionMode {
    if args.use_git {
        ExecutionMode::UseGit
    } else if !args.file_paths.is_empty() {
        ExecutionMode::SpecificFiles
    } else {
        ExecutionMode::AllFiles
    }
}

/// Relative paths are taken from the working directory.
fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

pub(super) fn output_format(format: Option<ValidateFormat>) -> OutputFormat {
    match format {
        Some(ValidateFormat::Json) => OutputFormat::Json,
        Some(ValidateFormat::Human) | None => OutputFormat::Human,
    }
}

pub(super) fn parse_content_type(value: &str) -> Option<ContentType> {
    ALL_CONTENT_TYPES
        .iter()
        .copied()
        .find(|content_type| content_type.as_str().eq_ignore_ascii_case(value.trim()))
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use clap::Parser;

    fn validate_args(argv: &[&str]) -> ValidateArgs {
        let cli = Cli::try_parse_from(argv).expect("parse");
        match cli.command {
            Commands::Validate(args) => args,
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn flags_pick_the_execution_mode() {
        assert_eq!(execution_mode(&validate_args(&["content-validate", "validate", "-g"])), ExecutionMode::UseGit);
        assert_eq!(
            execution_mode(&validate_args(&["content-validate", "validate", "-i", "Packs/A/pack_metadata.json"])),
            ExecutionMode::SpecificFiles
        );
        assert_eq!(execution_mode(&validate_args(&["content-validate", "validate", "-a"])), ExecutionMode::AllFiles);
    }

    #[test]
    fn git_mode_conflicts_with_file_paths() {
        assert!(Cli::try_parse_from(["content-validate", "validate", "-g", "-i", "a.yml"]).is_err());
    }

    #[test]
    fn flags_override_code_lists() {
        let args = validate_args(&[
            "content-validate",
            "validate",
            "--select",
            "ba,IN100",
            "--warning",
            "RN",
            "--no-docker-checks",
            "--fix",
        ]);
        let mut config = ValidateConfig {
            ignore: vec!["DO".to_string()],
            ..ValidateConfig::default()
        };
        apply_flags(&mut config, &args);
        assert_eq!(config.select, vec!["BA", "IN100"]);
        assert_eq!(config.ignore, vec!["DO"]);
        assert!(config.is_warning("RN106"));
        assert!(!config.docker_checks);
        assert!(config.fix);
    }

    #[test]
    fn content_types_parse_case_insensitively() {
        assert_eq!(parse_content_type("integration"), Some(ContentType::Integration));
        assert_eq!(parse_content_type("AIPrompt"), Some(ContentType::AiPrompt));
        assert_eq!(parse_content_type("nope"), None);
    }
}
