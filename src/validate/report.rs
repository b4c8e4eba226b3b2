use super::{Outcome, RunOutcome, ValidationResult};
use crate::ContentResult;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

pub fn render(outcome: &RunOutcome, format: OutputFormat) -> ContentResult<String> {
    match format {
        OutputFormat::Human => Ok(render_human(outcome)),
        OutputFormat::Json => render_json(outcome),
    }
}

fn line(result: &ValidationResult) -> String {
    let path = result.path.display();
    match result.outcome {
        Outcome::Violation => format!("{}: {path}: {}", result.error_code, result.message),
        Outcome::Fixed => format!("{}: {path}: FIXED: {}", result.error_code, result.message),
        Outcome::FixFailed => format!("{}: {path}: FIX FAILED: {}", result.error_code, result.message),
    }
}

/// One line per result grouped by path, then by code, and a summary line.
pub fn render_human(outcome: &RunOutcome) -> String {
    let mut grouped: BTreeMap<&PathBuf, BTreeMap<&str, Vec<&ValidationResult>>> = BTreeMap::new();
    for result in &outcome.results {
        grouped
            .entry(&result.path)
            .or_default()
            .entry(result.error_code.as_str())
            .or_default()
            .push(result);
    }

    let mut output = String::new();
    for codes in grouped.values() {
        for results in codes.values() {
            for result in results {
                let prefix = if outcome.is_warning(result) && result.is_failure() {
                    "[WARNING] "
                } else {
                    ""
                };
                let _ = writeln!(output, "{prefix}{}", line(result));
            }
        }
    }

    let errors = outcome.failures().count();
    let warnings = outcome
        .results
        .iter()
        .filter(|result| result.is_failure() && outcome.is_warning(result))
        .count();
    let fixed = outcome
        .results
        .iter()
        .filter(|result| result.outcome == Outcome::Fixed)
        .count();
    let _ = writeln!(
        output,
        "Validated {} items, {} errors, {} warnings, {} fixed",
        outcome.items_checked, errors, warnings, fixed
    );
    output
}

pub fn render_json(outcome: &RunOutcome) -> ContentResult<String> {
    let results = outcome
        .results
        .iter()
        .map(|result| {
            json!({
                "file path": result.path.display().to_string(),
                "error code": result.error_code,
                "message": result.message,
                "fixed": result.outcome == Outcome::Fixed,
                "warning": outcome.is_warning(result),
            })
        })
        .collect::<Vec<_>>();
    let output = json!({
        "valid": outcome.is_valid(),
        "results": results,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(code: &str, path: &str, message: &str, outcome: Outcome) -> ValidationResult {
        ValidationResult {
            error_code: code.to_string(),
            path: PathBuf::from(path),
            message: message.to_string(),
            related_field: None,
            outcome,
        }
    }

    fn outcome(results: Vec<ValidationResult>) -> RunOutcome {
        RunOutcome {
            results,
            items_checked: 2,
            ..RunOutcome::default()
        }
    }

    #[test]
    fn human_lines_follow_the_result_format() {
        let outcome = outcome(vec![
            result("BC100", "Packs/A/Integrations/A/A.yml", "Changing subtype back to (python3).", Outcome::Fixed),
            result("BA108", "Packs/A/Integrations/A_B/A_B.yml", "bad folder", Outcome::Violation),
        ]);
        let rendered = render_human(&outcome);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "BC100: Packs/A/Integrations/A/A.yml: FIXED: Changing subtype back to (python3).",
                "BA108: Packs/A/Integrations/A_B/A_B.yml: bad folder",
                "Validated 2 items, 1 errors, 0 warnings, 1 fixed",
            ]
        );
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn json_output_marks_fixed_results() {
        let outcome = outcome(vec![result("IN102", "Packs/A/Integrations/A/A.yml", "fixed", Outcome::Fixed)]);
        let rendered: serde_json::Value = serde_json::from_str(&render_json(&outcome).expect("json")).expect("parse");
        assert_eq!(rendered["valid"], json!(true));
        assert_eq!(rendered["results"][0]["error code"], json!("IN102"));
        assert_eq!(rendered["results"][0]["fixed"], json!(true));
        assert_eq!(outcome.exit_code(), 0);
    }
}
