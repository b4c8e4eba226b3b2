use super::args::{Cli, Commands, ListArgs, SchemaArgs, ValidateArgs, ValidateFormat};
use super::output::{print_outcome, print_schema, print_validators_human, print_validators_json};
use super::util::{build_config, init_logging, output_format, parse_content_type};
use anyhow::Context;
use content_validate::config::code_matches;
use content_validate::schema::schema_for;
use content_validate::{parse_code_list, run_validation, ValidatorRegistry};
use tracing::debug;

pub(super) fn run(cli: Cli) -> anyhow::Result<i32> {
    init_logging(cli.verbose);
    match cli.command {
        Commands::Validate(args) => run_validate(args),
        Commands::List(args) => run_list(args),
        Commands::Schema(args) => run_schema(args),
    }
}

fn run_validate(args: ValidateArgs) -> anyhow::Result<i32> {
    let config = build_config(&args)?;
    debug!(
        root = %config.content_root.display(),
        mode = config.execution_mode.as_str(),
        workers = config.workers,
        "configuration resolved"
    );
    let registry = ValidatorRegistry::with_defaults().context("failed to build the validator registry")?;
    let outcome = run_validation(&config, &registry, None).context("validation aborted")?;
    print_outcome(&outcome, output_format(args.format), args.quiet)?;
    Ok(outcome.exit_code())
}

fn run_list(args: ListArgs) -> anyhow::Result<i32> {
    let registry = ValidatorRegistry::with_defaults().context("failed to build the validator registry")?;
    let select = args.select.as_deref().map(parse_code_list).unwrap_or_default();
    let infos = registry
        .codes()
        .into_iter()
        .filter(|code| select.is_empty() || code_matches(&select, code))
        .filter_map(|code| registry.get(code).map(|validator| validator.info()))
        .collect::<Vec<_>>();
    match args.format.unwrap_or(ValidateFormat::Human) {
        ValidateFormat::Human => print_validators_human(&infos),
        ValidateFormat::Json => print_validators_json(&infos)?,
    }
    Ok(0)
}

fn run_schema(args: SchemaArgs) -> anyhow::Result<i32> {
    let Some(content_type) = parse_content_type(&args.content_type) else {
        eprintln!("unknown content type: {}", args.content_type);
        return Ok(2);
    };
    match schema_for(content_type) {
        Some(schema) => {
            print_schema(&schema)?;
            Ok(0)
        }
        None => {
            eprintln!("{content_type} items have no structure schema");
            Ok(1)
        }
    }
}
