use super::graph::duplicate_name_message;
use crate::constants::MarketplaceVersion;
use crate::graph::{replace_alert_to_incident, SKIP_INCIDENT_TO_ALERT};
use crate::model::{ContentItem, ContentType};
use crate::validate::{ValidationContext, ValidationResult, Validator, ValidatorInfo};

pub struct DuplicateScriptNameIncidentAlert;

const SC109: ValidatorInfo = ValidatorInfo {
    error_code: "SC109",
    description: "Validate that no two validated scripts collide once Incident is converted to Alert.",
    rationale: "Script names are rewritten from Incident to Alert on upload to marketplacev2.",
    error_message: "Cannot create a script with the name {0}, because a script with the name {1} already exists.\n(it will not be possible to create a new script whose name includes the word Alert/Alerts because of the conversion of Incident to Alert)",
    related_field: "name",
    content_types: &[ContentType::Script],
    ..ValidatorInfo::DEFAULT
};

fn renamed_on_upload(item: &ContentItem) -> bool {
    item.in_marketplace(MarketplaceVersion::MarketplaceV2)
        && !item.as_script().is_some_and(|script| script.skips(SKIP_INCIDENT_TO_ALERT))
}

impl Validator for DuplicateScriptNameIncidentAlert {
    fn info(&self) -> &'static ValidatorInfo {
        &SC109
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter(|item| {
                item.name.to_lowercase().contains("alert") && item.in_marketplace(MarketplaceVersion::MarketplaceV2)
            })
            .filter_map(|alert| {
                let incident_name = replace_alert_to_incident(&alert.name);
                let incident = items
                    .iter()
                    .find(|other| other.name == incident_name && renamed_on_upload(other))?;
                Some(self.result(alert, duplicate_name_message(&alert.name, &incident.name)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::testing::{item_in, messages, pack, run, Harness};

    fn script(name: &str, marketplaces: &[MarketplaceVersion], extra: &str) -> ContentItem {
        item_in(
            pack("Alerts", marketplaces),
            ContentType::Script,
            &format!("Packs/Alerts/Scripts/{name}/{name}.yml"),
            &format!("commonfields:\n  id: {name}\nname: {name}\ntype: python\n{extra}"),
        )
    }

    #[test]
    fn colliding_scripts_are_reported_on_the_alert_side() {
        let harness = Harness::new();
        let v2 = [MarketplaceVersion::MarketplaceV2];
        let items = vec![script("getIncidents", &v2, ""), script("getAlerts", &v2, "")];
        let results = run(&DuplicateScriptNameIncidentAlert, &items, &harness.ctx());
        assert_eq!(messages(&results), vec![duplicate_name_message("getAlerts", "getIncidents")]);
        assert_eq!(results[0].path, items[1].path);
    }

    #[test]
    fn skipped_or_foreign_scripts_do_not_collide() {
        let harness = Harness::new();
        let v2 = [MarketplaceVersion::MarketplaceV2];
        let skipped = vec![
            script("getIncidents", &v2, "skipprepare: [script-name-incident-to-alert]\n"),
            script("getAlerts", &v2, ""),
        ];
        assert!(run(&DuplicateScriptNameIncidentAlert, &skipped, &harness.ctx()).is_empty());

        let xsoar_only = vec![
            script("getIncidents", &[MarketplaceVersion::Xsoar], ""),
            script("getAlerts", &[MarketplaceVersion::Xsoar], ""),
        ];
        assert!(run(&DuplicateScriptNameIncidentAlert, &xsoar_only, &harness.ctx()).is_empty());
    }
}
