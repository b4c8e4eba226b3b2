use regex::{Captures, Regex};
use std::sync::OnceLock;

fn alert_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)alert").unwrap_or_else(|_| unreachable!()))
}

fn incident_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)incident").unwrap_or_else(|_| unreachable!()))
}

/// Spells `replacement` in the case style of `original`.
fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().all(|c| c.is_ascii_uppercase()) {
        replacement.to_ascii_uppercase()
    } else if original.starts_with(|c: char| c.is_ascii_uppercase()) {
        let mut chars = replacement.chars();
        chars
            .next()
            .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
            .unwrap_or_default()
    } else {
        replacement.to_string()
    }
}

/// `getAlerts` becomes `getIncidents`; case of each occurrence is kept.
pub fn replace_alert_to_incident(value: &str) -> String {
    alert_pattern()
        .replace_all(value, |captures: &Captures<'_>| match_case(&captures[0], "incident"))
        .into_owned()
}

/// `getIncidents` becomes `getAlerts`; case of each occurrence is kept.
pub fn replace_incident_to_alert(value: &str) -> String {
    incident_pattern()
        .replace_all(value, |captures: &Captures<'_>| match_case(&captures[0], "alert"))
        .into_owned()
}
