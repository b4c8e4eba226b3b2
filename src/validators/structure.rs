use super::quoted_list;
use crate::constants::{PLATFORM_SUPPORTED_MODULES, SECTIONS};
use crate::model::{ContentItem, ContentType};
use crate::validate::{ValidationContext, ValidationResult, Validator, ValidatorInfo};
use std::collections::BTreeSet;

pub struct SchemaErrors;

const ST110: ValidatorInfo = ValidatorInfo {
    error_code: "ST110",
    description: "Validate that the content item follows the structure schema.",
    rationale: "Malformed items fail to upload or behave unexpectedly on the platform.",
    error_message: "Structure error ({0}) in field {1} of {2}: {3}",
    related_field: "",
    run_on_deprecated: true,
    ..ValidatorInfo::DEFAULT
};

impl Validator for SchemaErrors {
    fn info(&self) -> &'static ValidatorInfo {
        &ST110
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .flat_map(|item| {
                let file_name = item.file_name();
                item.structure_errors.iter().map(move |error| {
                    self.result(
                        item,
                        format!(
                            "Structure error ({}) in field {} of {file_name}: {}",
                            error.error_type, error.field, error.message
                        ),
                    )
                })
            })
            .collect()
    }
}

pub struct SectionOrder;

const ST111: ValidatorInfo = ValidatorInfo {
    error_code: "ST111",
    description: "Validate that the integration declares its sections and every param belongs to one.",
    rationale: "Sections drive the layout of the integration instance settings.",
    error_message: "Missing sectionorder key. Add sectionorder to the top of your YAML file and specify the order of the Connect, Collect, Optimize, Mirroring sections (at least one is required).",
    related_field: "sectionorder, configuration.section",
    content_types: &[ContentType::Integration],
    ..ValidatorInfo::DEFAULT
};

impl Validator for SectionOrder {
    fn info(&self) -> &'static ValidatorInfo {
        &ST111
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        for item in items {
            let Some(integration) = item.as_integration() else {
                continue;
            };
            let Some(order) = &integration.section_order else {
                results.push(self.result(item, ST111.error_message));
                continue;
            };

            let missing = integration
                .params
                .iter()
                .filter(|param| param.section.as_deref().unwrap_or_default().is_empty())
                .map(|param| param.name.as_str())
                .collect::<Vec<_>>();
            if !missing.is_empty() {
                results.push(self.result(
                    item,
                    format!(
                        "Missing section for the following parameters: {} Please specify the section for these parameters.",
                        quoted_list(&missing)
                    ),
                ));
            }

            for param in &integration.params {
                let Some(section) = param.section.as_deref().filter(|section| !section.is_empty()) else {
                    continue;
                };
                if !SECTIONS.contains(&section) || !order.iter().any(|declared| declared == section) {
                    results.push(self.result(
                        item,
                        format!(
                            "The section {section} of the param {} is not present in sectionorder {}.",
                            param.name,
                            quoted_list(order)
                        ),
                    ));
                }
            }
        }
        results
    }
}

pub struct QuickActionsSupported;

const ST112: ValidatorInfo = ValidatorInfo {
    error_code: "ST112",
    description: "Validate that integrations with quick action commands declare quick action support.",
    rationale: "Quick action commands are only exposed when the integration opts in.",
    error_message: "The following commands are marked as quick actions but the integration does not declare supportsquickactions: {0}. Add supportsquickactions: true to the integration.",
    related_field: "supportsquickactions, script.commands.quickaction",
    content_types: &[ContentType::Integration],
    ..ValidatorInfo::DEFAULT
};

impl Validator for QuickActionsSupported {
    fn info(&self) -> &'static ValidatorInfo {
        &ST112
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let integration = item.as_integration()?;
                if integration.supports_quick_actions {
                    return None;
                }
                let commands = integration
                    .commands
                    .iter()
                    .filter(|command| command.quickaction)
                    .map(|command| command.name.as_str())
                    .collect::<Vec<_>>();
                (!commands.is_empty()).then(|| {
                    self.result(
                        item,
                        format!(
                            "The following commands are marked as quick actions but the integration does not declare supportsquickactions: {}. Add supportsquickactions: true to the integration.",
                            commands.join(", ")
                        ),
                    )
                })
            })
            .collect()
    }
}

pub struct SupportedModulesSubsetOfPack;

const ST114: ValidatorInfo = ValidatorInfo {
    error_code: "ST114",
    description: "Ensure that all supported modules of a content item are a subset of its pack's supported modules.",
    rationale: "Declaring supported modules that are not allowed by the pack can lead to unsupported behavior.",
    error_message: "The following supported modules are defined for the item but not allowed by its pack: {0}. Please ensure the item's supportedModules are a subset of the pack's supportedModules.",
    related_field: "supportedModules",
    content_types: &[
        ContentType::Integration,
        ContentType::Script,
        ContentType::Playbook,
        ContentType::TestPlaybook,
        ContentType::Layout,
        ContentType::Dashboard,
        ContentType::IncidentField,
        ContentType::IncidentType,
        ContentType::Classifier,
        ContentType::Widget,
    ],
    ..ValidatorInfo::DEFAULT
};

impl Validator for SupportedModulesSubsetOfPack {
    fn info(&self) -> &'static ValidatorInfo {
        &ST114
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let declared = item.supported_modules.as_ref()?;
                let allowed = match &item.pack.supported_modules {
                    Some(modules) if !modules.is_empty() => modules.iter().map(String::as_str).collect::<BTreeSet<_>>(),
                    _ => PLATFORM_SUPPORTED_MODULES.into_iter().collect(),
                };
                let extra = declared
                    .iter()
                    .map(String::as_str)
                    .filter(|module| !allowed.contains(module))
                    .collect::<BTreeSet<_>>();
                (!extra.is_empty()).then(|| {
                    let listed = extra.iter().map(|module| format!("'{module}'")).collect::<Vec<_>>();
                    self.result(
                        item,
                        format!(
                            "The following supported modules are defined for the item but not allowed by its pack: {}. Please ensure the item's supportedModules are a subset of the pack's supportedModules.",
                            listed.join(", ")
                        ),
                    )
                })
            })
            .collect()
    }
}
