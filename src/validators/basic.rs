use super::quoted_list;
use crate::constants::{ExecutionMode, GitStatus, PACKS_DIR, PACK_METADATA, RELEASE_NOTES_DIR};
use crate::model::{data_set, release_note_version, value_str, version_key, Argument, CompliantPolicies, ContentItem, ContentType};
use crate::parsers::resolve_descriptor;
use crate::validate::{FixResult, ValidationContext, ValidationResult, Validator, ValidatorInfo};
use crate::ContentResult;
use serde_json::Value;
use std::path::{Component, Path};

const ITEM_TYPES: &[ContentType] = &[
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
];

pub struct CompliantPoliciesOfCommands;

const BA102: ValidatorInfo = ValidatorInfo {
    error_code: "BA102",
    description: "Validate that every compliant policy of a command is registered.",
    rationale: "Unregistered policies are silently ignored by the platform.",
    error_message: "The following compliant policies of the command {0} are not defined in Config/compliant_policies.json: {1}.",
    related_field: "script.commands.compliantpolicies",
    content_types: &[ContentType::Integration],
    ..ValidatorInfo::DEFAULT
};

fn unknown_policies<'a>(declared: &'a [String], registry: &CompliantPolicies) -> Vec<&'a str> {
    declared
        .iter()
        .filter(|policy| !registry.contains(policy))
        .map(String::as_str)
        .collect()
}

impl Validator for CompliantPoliciesOfCommands {
    fn info(&self) -> &'static ValidatorInfo {
        &BA102
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        let Some(registry) = ctx.policies() else {
            return Vec::new();
        };
        let mut results = Vec::new();
        for item in items {
            let Some(integration) = item.as_integration() else {
                continue;
            };
            for command in &integration.commands {
                let unknown = unknown_policies(&command.compliantpolicies, registry);
                if !unknown.is_empty() {
                    results.push(self.result(
                        item,
                        format!(
                            "The following compliant policies of the command {} are not defined in Config/compliant_policies.json: {}.",
                            command.name,
                            unknown.join(", ")
                        ),
                    ));
                }
            }
        }
        results
    }
}

pub struct FolderNameHasSeparators;

const BA108: ValidatorInfo = ValidatorInfo {
    error_code: "BA108",
    description: "Validate that the content item folder name contains no separators.",
    rationale: "Folder names are used to derive file names and ids.",
    error_message: "The folder name '{0}' should not contain the separators '_' or '-'. Rename it to '{1}'.",
    related_field: "file path",
    content_types: &[ContentType::Integration, ContentType::Script],
    expected_git_statuses: &[GitStatus::Added, GitStatus::Renamed],
    ..ValidatorInfo::DEFAULT
};

const SEPARATORS: [char; 2] = ['_', '-'];

impl Validator for FolderNameHasSeparators {
    fn info(&self) -> &'static ValidatorInfo {
        &BA108
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let folder = item.path.parent()?.file_name()?.to_string_lossy().to_string();
                if !folder.contains(SEPARATORS) {
                    return None;
                }
                let suggested = folder.replace(SEPARATORS, "");
                Some(self.result(
                    item,
                    format!(
                        "The folder name '{folder}' should not contain the separators '_' or '-'. Rename it to '{suggested}'."
                    ),
                ))
            })
            .collect()
    }
}

pub struct CompliantPoliciesOfScripts;

const BA112: ValidatorInfo = ValidatorInfo {
    error_code: "BA112",
    description: "Validate that every compliant policy of a script is registered.",
    rationale: "Unregistered policies are silently ignored by the platform.",
    error_message: "The following compliant policies of the script are not defined in Config/compliant_policies.json: {0}.",
    related_field: "compliantpolicies",
    content_types: &[ContentType::Script],
    ..ValidatorInfo::DEFAULT
};

impl Validator for CompliantPoliciesOfScripts {
    fn info(&self) -> &'static ValidatorInfo {
        &BA112
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        let Some(registry) = ctx.policies() else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let script = item.as_script()?;
                let unknown = unknown_policies(&script.compliantpolicies, registry);
                (!unknown.is_empty()).then(|| {
                    self.result(
                        item,
                        format!(
                            "The following compliant policies of the script are not defined in Config/compliant_policies.json: {}.",
                            unknown.join(", ")
                        ),
                    )
                })
            })
            .collect()
    }
}

pub struct NameHasTrailingSpaces;

const BA113: ValidatorInfo = ValidatorInfo {
    error_code: "BA113",
    description: "Checks for content item names with trailing spaces.",
    rationale: "Ensures accurate referencing.",
    error_message: "The following fields have a trailing spaces: {0} \nContent item fields can not have trailing spaces.",
    fix_message: Some("Removed trailing spaces from the following content item {0} fields: '{1}'."),
    related_field: "name, commonfields.id",
    content_types: ITEM_TYPES,
    is_auto_fixable: true,
    ..ValidatorInfo::DEFAULT
};

/// `(label, data path)` of every field with trailing whitespace.
fn trailing_fields(item: &ContentItem) -> Vec<(&'static str, &'static [&'static str])> {
    [("name", &["name"][..]), ("id", item.id_path())]
        .into_iter()
        .filter(|(_, path)| {
            value_str(&item.data, path).is_some_and(|value| value.trim_end() != value)
        })
        .collect()
}

impl Validator for NameHasTrailingSpaces {
    fn info(&self) -> &'static ValidatorInfo {
        &BA113
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let fields = trailing_fields(item);
                (!fields.is_empty()).then(|| {
                    let labels = fields.iter().map(|(label, _)| *label).collect::<Vec<_>>();
                    self.result(
                        item,
                        format!(
                            "The following fields have a trailing spaces: {} \nContent item fields can not have trailing spaces.",
                            labels.join(", ")
                        ),
                    )
                })
            })
            .collect()
    }

    fn fix(&self, item: &mut ContentItem, _ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        let fields = trailing_fields(item);
        for (_, path) in &fields {
            if let Some(value) = value_str(&item.data, path) {
                data_set(&mut item.data, path, Value::String(value.trim_end().to_string()));
            }
        }
        item.name = item.name.trim_end().to_string();
        item.object_id = item.object_id.trim_end().to_string();
        let labels = fields.iter().map(|(label, _)| *label).collect::<Vec<_>>();
        Ok(self.fixed(
            item,
            format!(
                "Removed trailing spaces from the following content item {} fields: '{}'.",
                item.name,
                labels.join(", ")
            ),
        ))
    }
}

pub struct ForbiddenDeletedFiles;

const BA115: ValidatorInfo = ValidatorInfo {
    error_code: "BA115",
    description: "Validate that no protected file was deleted.",
    rationale: "Deleted content items break installed packs and their dependents.",
    error_message: "The file {0} cannot be deleted. Please restore the file.",
    related_field: "file path",
    expected_execution_mode: &[ExecutionMode::UseGit],
    run_on_deprecated: true,
    ..ValidatorInfo::DEFAULT
};

const DOC_IMAGE_FOLDERS: [&str; 2] = ["doc_files", "doc_imgs"];
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "svg"];

impl ForbiddenDeletedFiles {
    fn deletion_allowed(path: &Path, ctx: &ValidationContext<'_>) -> bool {
        let parts = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                _ => None,
            })
            .collect::<Vec<_>>();
        if parts.first().map(String::as_str) != Some(PACKS_DIR) {
            return false;
        }
        if parts.iter().any(|part| part == "TestPlaybooks") {
            return true;
        }
        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if parts.iter().any(|part| DOC_IMAGE_FOLDERS.contains(&part.as_str()))
            && IMAGE_EXTENSIONS.contains(&extension.as_str())
        {
            return true;
        }
        if parts.len() == 4 && parts[2] == RELEASE_NOTES_DIR {
            return Self::is_unreleased_note(&parts[1], path, ctx);
        }
        resolve_descriptor(ctx.reader.root(), path).is_none()
    }

    /// A release note newer than the pack's current version was never shipped.
    fn is_unreleased_note(pack: &str, path: &Path, ctx: &ValidationContext<'_>) -> bool {
        let Some(version) = path
            .file_stem()
            .and_then(|stem| release_note_version(&stem.to_string_lossy()))
        else {
            return true;
        };
        let metadata = Path::new(PACKS_DIR).join(pack).join(PACK_METADATA);
        let current = ctx
            .reader
            .read_value(&metadata)
            .ok()
            .and_then(|value| value_str(&value, &["currentVersion"]));
        current.is_some_and(|current| version_key(&version) > version_key(&current))
    }
}

impl Validator for ForbiddenDeletedFiles {
    fn info(&self) -> &'static ValidatorInfo {
        &BA115
    }

    fn obtain_invalid_content_items(&self, _items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        ctx.deleted_files()
            .iter()
            .filter(|path| !Self::deletion_allowed(path, ctx))
            .map(|path| {
                ValidationResult::violation(
                    &BA115,
                    path,
                    format!("The file {} cannot be deleted. Please restore the file.", path.display()),
                )
            })
            .collect()
    }
}

pub struct NameStartsWithDigit;

const BA128: ValidatorInfo = ValidatorInfo {
    error_code: "BA128",
    description: "Validate that command and script names do not begin with a digit.",
    rationale: "Names starting with a digit cannot be invoked from the war room.",
    error_message: "The following names start with a digit: {0}. Command and script names must not begin with a digit.",
    related_field: "name",
    content_types: &[ContentType::Integration, ContentType::Script],
    ..ValidatorInfo::DEFAULT
};

fn starts_with_digit(name: &str) -> bool {
    name.chars().next().is_some_and(|first| first.is_ascii_digit())
}

impl Validator for NameStartsWithDigit {
    fn info(&self) -> &'static ValidatorInfo {
        &BA128
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let invalid = match item.as_integration() {
                    Some(integration) => integration
                        .commands
                        .iter()
                        .map(|command| command.name.as_str())
                        .filter(|name| starts_with_digit(name))
                        .collect::<Vec<_>>(),
                    None if starts_with_digit(&item.name) => vec![item.name.as_str()],
                    None => Vec::new(),
                };
                (!invalid.is_empty()).then(|| {
                    self.result(
                        item,
                        format!(
                            "The following names start with a digit: {}. Command and script names must not begin with a digit.",
                            invalid.join(", ")
                        ),
                    )
                })
            })
            .collect()
    }
}

pub struct ArgumentsHaveCompliantPolicy;

const BA129: ValidatorInfo = ValidatorInfo {
    error_code: "BA129",
    description: "Validate that arguments tied to compliant policies are covered by one of them.",
    rationale: "An argument tied to a policy has no effect unless the policy is declared.",
    error_message: "The argument {0} of {1} is associated with the compliant policies {2} but none of them is declared under compliantpolicies.",
    related_field: "compliantpolicies",
    content_types: &[ContentType::Integration, ContentType::Script],
    ..ValidatorInfo::DEFAULT
};

impl ArgumentsHaveCompliantPolicy {
    fn uncovered(owner: &str, args: &[Argument], declared: &[String], registry: &CompliantPolicies) -> Vec<String> {
        args.iter()
            .filter_map(|arg| {
                let policies = registry.policies_for_argument(&arg.name);
                let covered = policies.is_empty() || policies.iter().any(|policy| declared.iter().any(|name| name == policy));
                (!covered).then(|| {
                    format!(
                        "The argument {} of {owner} is associated with the compliant policies {} but none of them is declared under compliantpolicies.",
                        arg.name,
                        quoted_list(&policies)
                    )
                })
            })
            .collect()
    }
}

impl Validator for ArgumentsHaveCompliantPolicy {
    fn info(&self) -> &'static ValidatorInfo {
        &BA129
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        let Some(registry) = ctx.policies() else {
            return Vec::new();
        };
        let mut results = Vec::new();
        for item in items {
            let mut messages = Vec::new();
            if let Some(integration) = item.as_integration() {
                for command in &integration.commands {
                    messages.extend(Self::uncovered(&command.name, &command.args, &command.compliantpolicies, registry));
                }
            } else if let Some(script) = item.as_script() {
                messages.extend(Self::uncovered(&item.name, &script.args, &script.compliantpolicies, registry));
            }
            if !messages.is_empty() {
                results.push(self.result(item, messages.join("\n")));
            }
        }
        results
    }
}

pub struct FromVersionAboveToVersion;

const BA118: ValidatorInfo = ValidatorInfo {
    error_code: "BA118",
    description: "Validate that the fromversion of a content item is not higher than its toversion.",
    rationale: "An item whose version range is empty is never installed on any server version.",
    error_message: "The fromversion {0} of the content item is higher than its toversion {1}. fromversion can not be higher than toversion.",
    related_field: "fromversion, toversion",
    run_on_deprecated: true,
    ..ValidatorInfo::DEFAULT
};

impl Validator for FromVersionAboveToVersion {
    fn info(&self) -> &'static ValidatorInfo {
        &BA118
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let from = item.fromversion.as_deref()?;
                let to = item.toversion.as_deref()?;
                (version_key(from) > version_key(to)).then(|| {
                    self.result(
                        item,
                        format!(
                            "The fromversion {from} of the content item is higher than its toversion {to}. fromversion can not be higher than toversion."
                        ),
                    )
                })
            })
            .collect()
    }
}
