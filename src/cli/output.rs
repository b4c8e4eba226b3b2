use content_validate::validate::{render, OutputFormat, ValidatorInfo};
use content_validate::RunOutcome;

pub(super) fn print_outcome(outcome: &RunOutcome, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    if quiet && outcome.is_valid() && format == OutputFormat::Human {
        return Ok(());
    }
    println!("{}", render(outcome, format)?);
    Ok(())
}

pub(super) fn print_validators_human(infos: &[&ValidatorInfo]) {
    for info in infos {
        let fixable = if info.is_auto_fixable { " (fixable)" } else { "" };
        println!("{}{fixable}: {}", info.error_code, info.description);
        if !info.content_types.is_empty() {
            let types = info
                .content_types
                .iter()
                .map(|content_type| content_type.as_str())
                .collect::<Vec<_>>();
            println!("  types: {}", types.join(", "));
        }
    }
    println!("{} validators", infos.len());
}

pub(super) fn print_validators_json(infos: &[&ValidatorInfo]) -> anyhow::Result<()> {
    let validators = infos
        .iter()
        .map(|info| {
            serde_json::json!({
                "error code": info.error_code,
                "description": info.description,
                "rationale": info.rationale,
                "related field": info.related_field,
                "content types": info.content_types,
                "auto fixable": info.is_auto_fixable,
                "uses graph": info.uses_graph,
            })
        })
        .collect::<Vec<_>>();
    println!("{}", serde_json::to_string_pretty(&validators)?);
    Ok(())
}

pub(super) fn print_schema(schema: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(schema)?);
    Ok(())
}
