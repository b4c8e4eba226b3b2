use crate::constants::GitStatus;
use crate::model::{data_set, ContentItem, ContentType};
use crate::validate::{FixResult, ValidationContext, ValidationResult, Validator, ValidatorInfo};
use crate::{ContentError, ContentResult};
use serde_json::Value;

const CHANGED: &[GitStatus] = &[GitStatus::Modified, GitStatus::Renamed];

pub struct SubtypeChanged;

const BC100: ValidatorInfo = ValidatorInfo {
    error_code: "BC100",
    description: "Validate that the pack name subtype of the new file matches the old one.",
    rationale: "Changing the subtype can break existing playbooks running the item.",
    error_message: "Possible backwards compatibility break, You've changed the {0} subtype from {1} to {2}, please undo.",
    fix_message: Some("Changing subtype back to ({0})."),
    related_field: "subtype",
    content_types: &[ContentType::Integration, ContentType::Script],
    expected_git_statuses: CHANGED,
    is_auto_fixable: true,
    ..ValidatorInfo::DEFAULT
};

/// `(old, new)` when both revisions declare a subtype and they differ.
fn changed_subtype(item: &ContentItem) -> Option<(String, String)> {
    let old = item.old_base()?.subtype()?.to_string();
    let new = item.subtype()?.to_string();
    (old != new).then_some((old, new))
}

impl Validator for SubtypeChanged {
    fn info(&self) -> &'static ValidatorInfo {
        &BC100
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let (old, new) = changed_subtype(item)?;
                Some(self.result(
                    item,
                    format!(
                        "Possible backwards compatibility break, You've changed the {} subtype from {old} to {new}, please undo.",
                        item.content_type
                    ),
                ))
            })
            .collect()
    }

    fn fix(&self, item: &mut ContentItem, _ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        let (old, _) = changed_subtype(item)
            .ok_or_else(|| ContentError::InvalidConfig(format!("{} has no subtype change", item.path.display())))?;
        let path = item.subtype_path();
        data_set(&mut item.data, path, Value::String(old.clone()));
        Ok(self.fixed(item, format!("Changing subtype back to ({old}).")))
    }
}

pub struct IdChanged;

const BC105: ValidatorInfo = ValidatorInfo {
    error_code: "BC105",
    description: "Validate that the ID of the content item was not changed.",
    rationale: "Changing the ID breaks every item and customer configuration referencing it.",
    error_message: "ID of content item was changed from {0} to {1}, please undo.",
    fix_message: Some("Changing ID back to {0}."),
    related_field: "commonfields.id",
    content_types: &[
        ContentType::Integration,
        ContentType::Script,
        ContentType::Playbook,
        ContentType::TestPlaybook,
        ContentType::AgentixAgent,
        ContentType::AgentixAction,
        ContentType::AiPrompt,
        ContentType::Layout,
        ContentType::Dashboard,
        ContentType::IncidentField,
        ContentType::IncidentType,
        ContentType::Classifier,
        ContentType::Widget,
        ContentType::List,
    ],
    expected_git_statuses: CHANGED,
    is_auto_fixable: true,
    ..ValidatorInfo::DEFAULT
};

fn changed_id(item: &ContentItem) -> Option<String> {
    let old = item.old_base()?;
    (!old.object_id.is_empty() && old.object_id != item.object_id).then(|| old.object_id.clone())
}

impl Validator for IdChanged {
    fn info(&self) -> &'static ValidatorInfo {
        &BC105
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let old = changed_id(item)?;
                Some(self.result(
                    item,
                    format!("ID of content item was changed from {old} to {}, please undo.", item.object_id),
                ))
            })
            .collect()
    }

    fn fix(&self, item: &mut ContentItem, _ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        let old = changed_id(item)
            .ok_or_else(|| ContentError::InvalidConfig(format!("{} has no id change", item.path.display())))?;
        let path = item.id_path();
        data_set(&mut item.data, path, Value::String(old.clone()));
        item.object_id = old.clone();
        Ok(self.fixed(item, format!("Changing ID back to {old}.")))
    }
}

pub struct RemovedIntegrationParameters;

const BC112: ValidatorInfo = ValidatorInfo {
    error_code: "BC112",
    description: "Validate that no integration parameters were removed.",
    rationale: "Removing a parameter breaks configured instances of the integration.",
    error_message: "Parameters have been removed from the integration, the removed parameters are: {0}.",
    related_field: "configuration",
    content_types: &[ContentType::Integration],
    expected_git_statuses: CHANGED,
    ..ValidatorInfo::DEFAULT
};

impl Validator for RemovedIntegrationParameters {
    fn info(&self) -> &'static ValidatorInfo {
        &BC112
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let current = item.as_integration()?;
                let old = item.old_base()?.as_integration()?;
                let removed = old
                    .params
                    .iter()
                    .map(|param| param.name.as_str())
                    .filter(|name| current.param(name).is_none())
                    .collect::<Vec<_>>();
                (!removed.is_empty()).then(|| {
                    self.result(
                        item,
                        format!(
                            "Parameters have been removed from the integration, the removed parameters are: {}.",
                            removed.join(", ")
                        ),
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value_str;
    use crate::validators::testing::{integration, messages, modified, run, script, Harness};

    const INTEGRATION: &str = "commonfields:\n  id: id_2\nname: TestIntegration\nscript:\n  type: python\n  subtype: python2\n";
    const OLD_INTEGRATION: &str = "commonfields:\n  id: id_1\nname: TestIntegration\nscript:\n  type: python\n  subtype: python3\n";

    #[test]
    fn subtype_change_is_reported_and_reverted() {
        let harness = Harness::new();
        let items = vec![
            modified(integration(INTEGRATION), OLD_INTEGRATION),
            modified(
                script("commonfields:\n  id: s\nname: s\ntype: python\nsubtype: python2\n"),
                "commonfields:\n  id: s\nname: s\ntype: python\nsubtype: python3\n",
            ),
            modified(integration(OLD_INTEGRATION), OLD_INTEGRATION),
        ];
        let results = run(&SubtypeChanged, &items, &harness.ctx());
        assert_eq!(
            messages(&results),
            vec![
                "Possible backwards compatibility break, You've changed the Integration subtype from python3 to python2, please undo.",
                "Possible backwards compatibility break, You've changed the Script subtype from python3 to python2, please undo.",
            ]
        );

        let mut item = items[0].clone();
        let fixed = SubtypeChanged.fix(&mut item, &harness.ctx()).expect("fix");
        assert_eq!(fixed.message, "Changing subtype back to (python3).");
        assert_eq!(value_str(&item.data, &["script", "subtype"]).as_deref(), Some("python3"));
    }

    #[test]
    fn added_items_are_not_compared() {
        let harness = Harness::new();
        let mut item = integration(INTEGRATION);
        item.git_status = Some(GitStatus::Added);
        assert!(run(&SubtypeChanged, &[item.clone()], &harness.ctx()).is_empty());
        assert!(run(&IdChanged, &[item], &harness.ctx()).is_empty());
    }

    #[test]
    fn id_change_is_reported_and_reverted() {
        let harness = Harness::new();
        let mut item = modified(integration(INTEGRATION), OLD_INTEGRATION);
        let results = run(&IdChanged, &[item.clone()], &harness.ctx());
        assert_eq!(messages(&results), vec!["ID of content item was changed from id_1 to id_2, please undo."]);

        let fixed = IdChanged.fix(&mut item, &harness.ctx()).expect("fix");
        assert_eq!(fixed.message, "Changing ID back to id_1.");
        assert_eq!(value_str(&item.data, &["commonfields", "id"]).as_deref(), Some("id_1"));
    }

    #[test]
    fn removed_parameters_are_listed() {
        let harness = Harness::new();
        let item = modified(
            integration("commonfields:\n  id: A\nname: A\nconfiguration:\n- name: url\n"),
            "commonfields:\n  id: A\nname: A\nconfiguration:\n- name: url\n- name: proxy\n- name: insecure\n",
        );
        let results = run(&RemovedIntegrationParameters, &[item], &harness.ctx());
        assert_eq!(
            messages(&results),
            vec!["Parameters have been removed from the integration, the removed parameters are: proxy, insecure."]
        );
    }
}
