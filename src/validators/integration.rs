use crate::constants::{
    param_type, GitStatus, MarketplaceVersion, RequiredParam, ALERT_FETCH_REQUIRED_PARAMS, ALLOWED_HIDDEN_PARAMS,
    CONNECTION_PARAMS, INCIDENT_FETCH_REQUIRED_PARAMS, MAX_FETCH_DEFAULT_VALUE, MAX_FETCH_PARAM_NAME,
    REQUIRED_BOOLEAN_ALLOWED,
};
use crate::model::{data_set, named_entry_mut, ContentItem, ContentType, Integration, Parameter};
use crate::validate::{FixResult, ValidationContext, ValidationResult, Validator, ValidatorInfo};
use crate::{ContentError, ContentResult};
use serde_json::{json, Value};

const INTEGRATION: &[ContentType] = &[ContentType::Integration];

fn not_fixable(item: &ContentItem, code: &str) -> ContentError {
    ContentError::InvalidConfig(format!("{code}: nothing to fix in {}", item.path.display()))
}

/// Applies `edit` to the `configuration` entry named `name`.
fn edit_param(item: &mut ContentItem, name: &str, edit: impl FnOnce(&mut serde_json::Map<String, Value>)) {
    if let Some(entry) = item
        .data
        .get_mut("configuration")
        .and_then(|configuration| named_entry_mut(configuration, name))
    {
        edit(entry);
    }
}

fn integration_of<'a>(item: &'a ContentItem, code: &str) -> ContentResult<&'a Integration> {
    item.as_integration().ok_or_else(|| not_fixable(item, code))
}

pub struct ConnectionParamsFormat;

const IN100: ValidatorInfo = ValidatorInfo {
    error_code: "IN100",
    description: "Validate that the proxy and insecure params are configured correctly.",
    rationale: "Connection params must behave the same way across integrations.",
    error_message: "The following params are invalid:\n{0}",
    fix_message: Some("Corrected the following params: {0}."),
    related_field: "configuration",
    content_types: INTEGRATION,
    is_auto_fixable: true,
    ..ValidatorInfo::DEFAULT
};

impl ConnectionParamsFormat {
    /// `(name, canonical display)` of every malformed connection param.
    fn invalid(integration: &Integration) -> Vec<(&str, &'static str)> {
        integration
            .params
            .iter()
            .filter_map(|param| {
                let (_, display) = CONNECTION_PARAMS.iter().find(|(name, _)| *name == param.name)?;
                let default_ok = match &param.defaultvalue {
                    None | Some(Value::Null) => true,
                    Some(Value::Bool(flag)) => !flag,
                    Some(Value::String(text)) => text == "false",
                    Some(_) => false,
                };
                let valid = param.display.as_deref() == Some(*display)
                    && param.param_type == Some(param_type::BOOLEAN)
                    && !param.is_required()
                    && default_ok;
                (!valid).then_some((param.name.as_str(), *display))
            })
            .collect()
    }
}

impl Validator for ConnectionParamsFormat {
    fn info(&self) -> &'static ValidatorInfo {
        &IN100
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let invalid = Self::invalid(item.as_integration()?);
                (!invalid.is_empty()).then(|| {
                    let lines = invalid
                        .iter()
                        .map(|(name, display)| {
                            format!(
                                "The {name} param display name should be '{display}', the 'defaultvalue' field should be 'false', the 'required' field should be 'False', and the 'type' field should be 8."
                            )
                        })
                        .collect::<Vec<_>>();
                    self.result(item, format!("The following params are invalid:\n{}", lines.join("\n")))
                })
            })
            .collect()
    }

    fn fix(&self, item: &mut ContentItem, _ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        let invalid = Self::invalid(integration_of(item, "IN100")?)
            .into_iter()
            .map(|(name, display)| (name.to_string(), display))
            .collect::<Vec<_>>();
        for (name, display) in &invalid {
            edit_param(item, name, |entry| {
                entry.insert("display".to_string(), json!(display));
                entry.insert("type".to_string(), json!(param_type::BOOLEAN));
                entry.insert("required".to_string(), json!(false));
                entry.insert("defaultvalue".to_string(), json!("false"));
            });
        }
        let mut names = invalid.into_iter().map(|(name, _)| name).collect::<Vec<_>>();
        names.sort();
        Ok(self.fixed(item, format!("Corrected the following params: {}.", names.join(", "))))
    }
}

pub struct RequiredBooleanParams;

const IN102: ValidatorInfo = ValidatorInfo {
    error_code: "IN102",
    description: "Validate that checkbox params are not required.",
    rationale: "A required checkbox cannot be left unchecked, so the instance can never be saved unchecked.",
    error_message: "The following checkbox params required field is set to True: {0}.\nMake sure to change it to False/remove the field.",
    fix_message: Some("Set required field of the following params was set to False: {0}."),
    related_field: "configuration",
    content_types: INTEGRATION,
    is_auto_fixable: true,
    ..ValidatorInfo::DEFAULT
};

fn required_checkboxes(integration: &Integration) -> Vec<String> {
    integration
        .params
        .iter()
        .filter(|param| {
            param.is_boolean() && param.is_required() && !REQUIRED_BOOLEAN_ALLOWED.contains(&param.name.as_str())
        })
        .map(|param| param.name.clone())
        .collect()
}

impl Validator for RequiredBooleanParams {
    fn info(&self) -> &'static ValidatorInfo {
        &IN102
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let names = required_checkboxes(item.as_integration()?);
                (!names.is_empty()).then(|| {
                    self.result(
                        item,
                        format!(
                            "The following checkbox params required field is set to True: {}.\nMake sure to change it to False/remove the field.",
                            names.join(", ")
                        ),
                    )
                })
            })
            .collect()
    }

    fn fix(&self, item: &mut ContentItem, _ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        let names = required_checkboxes(integration_of(item, "IN102")?);
        for name in &names {
            edit_param(item, name, |entry| {
                entry.insert("required".to_string(), json!(false));
            });
        }
        Ok(self.fixed(
            item,
            format!("Set required field of the following params was set to False: {}.", names.join(", ")),
        ))
    }
}

pub struct FetchRequiredParams;

const IN121: ValidatorInfo = ValidatorInfo {
    error_code: "IN121",
    description: "Validate that a fetch integration is not missing the required fetch params.",
    rationale: "The platform relies on these params to configure fetching.",
    error_message: "The integration is a fetch integration and is missing/containing malformed required params:\n{0}",
    related_field: "configuration",
    content_types: INTEGRATION,
    ..ValidatorInfo::DEFAULT
};

impl FetchRequiredParams {
    /// The incident variant applies when any incident-terminology marketplace
    /// receives the item.
    fn expected(item: &ContentItem) -> &'static [RequiredParam] {
        if item
            .effective_marketplaces()
            .iter()
            .any(|marketplace| marketplace.is_xsoar_family())
        {
            &INCIDENT_FETCH_REQUIRED_PARAMS
        } else {
            &ALERT_FETCH_REQUIRED_PARAMS
        }
    }

    fn matches(param: Option<&Parameter>, expected: &RequiredParam) -> bool {
        param.is_some_and(|param| {
            param.display.as_deref() == Some(expected.display) && param.param_type == Some(expected.param_type)
        })
    }
}

impl Validator for FetchRequiredParams {
    fn info(&self) -> &'static ValidatorInfo {
        &IN121
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let integration = item.as_integration()?;
                if !integration.is_fetch {
                    return None;
                }
                let lines = Self::expected(item)
                    .iter()
                    .filter(|expected| !Self::matches(integration.param(expected.name), expected))
                    .map(|expected| {
                        format!(
                            "The param {0} is missing/malformed, it should be in the following format: {{'display': '{1}', 'name': '{0}', 'type': {2}}}",
                            expected.name, expected.display, expected.param_type
                        )
                    })
                    .collect::<Vec<_>>();
                (!lines.is_empty()).then(|| {
                    self.result(
                        item,
                        format!(
                            "The integration is a fetch integration and is missing/containing malformed required params:\n{}",
                            lines.join("\n")
                        ),
                    )
                })
            })
            .collect()
    }
}

pub struct UnhiddenableParams;

const IN124: ValidatorInfo = ValidatorInfo {
    error_code: "IN124",
    description: "Validate that a param is not hidden if it can not be hidden.",
    rationale: "Hiding these parameters can prevent the integration from working as expected.",
    error_message: "The following fields are hidden and cannot be hidden, please unhide them: {0}.",
    fix_message: Some("Unhiddened the following params {0}."),
    related_field: "configuration, hidden",
    content_types: INTEGRATION,
    expected_git_statuses: &[GitStatus::Modified, GitStatus::Renamed],
    is_auto_fixable: true,
    ..ValidatorInfo::DEFAULT
};

const CREDENTIAL_REPLACEABLE_TYPES: [i64; 4] = [
    param_type::SHORT_TEXT,
    param_type::ENCRYPTED,
    param_type::TEXT_AREA,
    param_type::TEXT_AREA_ENCRYPTED,
];

impl UnhiddenableParams {
    /// A hidden text param is fine when a credentials param carries its display.
    fn replaced_by_credentials(param: &Parameter, params: &[Parameter]) -> bool {
        if !param.param_type.is_some_and(|kind| CREDENTIAL_REPLACEABLE_TYPES.contains(&kind)) {
            return false;
        }
        let display = param.display.as_deref().unwrap_or_default().to_lowercase();
        params.iter().any(|other| {
            other.param_type == Some(param_type::AUTH)
                && (other.display.as_deref().unwrap_or_default().to_lowercase() == display
                    || other.displaypassword.as_deref().unwrap_or_default().to_lowercase() == display)
        })
    }

    fn already_hidden(item: &ContentItem, param: &Parameter) -> bool {
        item.old_base()
            .and_then(ContentItem::as_integration)
            .and_then(|old| old.param(&param.name))
            .is_some_and(|old| old.hidden == param.hidden)
    }

    fn invalid(item: &ContentItem) -> Vec<String> {
        let Some(integration) = item.as_integration() else {
            return Vec::new();
        };
        integration
            .params
            .iter()
            .filter(|param| {
                param.hidden_everywhere()
                    && !ALLOWED_HIDDEN_PARAMS.contains(&param.name.as_str())
                    && !Self::replaced_by_credentials(param, &integration.params)
                    && !Self::already_hidden(item, param)
            })
            .map(|param| param.name.clone())
            .collect()
    }
}

impl Validator for UnhiddenableParams {
    fn info(&self) -> &'static ValidatorInfo {
        &IN124
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let names = Self::invalid(item);
                (!names.is_empty()).then(|| {
                    self.result(
                        item,
                        format!(
                            "The following fields are hidden and cannot be hidden, please unhide them: {}.",
                            names.join(", ")
                        ),
                    )
                })
            })
            .collect()
    }

    fn fix(&self, item: &mut ContentItem, _ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        let names = Self::invalid(item);
        if names.is_empty() {
            return Err(not_fixable(item, "IN124"));
        }
        for name in &names {
            edit_param(item, name, |entry| {
                entry.insert("hidden".to_string(), json!(false));
            });
        }
        Ok(self.fixed(item, format!("Unhiddened the following params {}.", names.join(", "))))
    }
}

pub struct MaxFetchHasDefault;

const IN125: ValidatorInfo = ValidatorInfo {
    error_code: "IN125",
    description: "Validate that the max_fetch param has a default value.",
    rationale: "Without a default the first fetch pulls an unbounded amount of data.",
    error_message: "The integration is a fetch integration with max_fetch param, please make sure the max_fetch param has a default value.",
    fix_message: Some("Added a 'defaultvalue = 50' to the max_fetch param."),
    related_field: "configuration",
    content_types: INTEGRATION,
    is_auto_fixable: true,
    ..ValidatorInfo::DEFAULT
};

fn max_fetch_missing_default(integration: &Integration) -> bool {
    integration.is_fetch
        && integration.param(MAX_FETCH_PARAM_NAME).is_some_and(|param| match &param.defaultvalue {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.is_empty(),
            Some(_) => false,
        })
}

impl Validator for MaxFetchHasDefault {
    fn info(&self) -> &'static ValidatorInfo {
        &IN125
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter(|item| item.as_integration().is_some_and(max_fetch_missing_default))
            .map(|item| self.result(item, IN125.error_message))
            .collect()
    }

    fn fix(&self, item: &mut ContentItem, _ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        if !max_fetch_missing_default(integration_of(item, "IN125")?) {
            return Err(not_fixable(item, "IN125"));
        }
        edit_param(item, MAX_FETCH_PARAM_NAME, |entry| {
            entry.insert("defaultvalue".to_string(), json!(MAX_FETCH_DEFAULT_VALUE));
        });
        Ok(self.fixed(item, format!("Added a 'defaultvalue = {MAX_FETCH_DEFAULT_VALUE}' to the max_fetch param.")))
    }
}

pub struct HasRunnableCommand;

const IN130: ValidatorInfo = ValidatorInfo {
    error_code: "IN130",
    description: "Validate that the integration has at least one runnable command.",
    rationale: "An integration with nothing to run cannot be used.",
    error_message: "Could not find any runnable command in the integration.\nMust have at least one of: a command under the `commands` section, `isFetch: true`, `feed: true`, or `longRunning: true`.",
    related_field: "commands, isfetch, feed, longRunning",
    content_types: INTEGRATION,
    ..ValidatorInfo::DEFAULT
};

impl Validator for HasRunnableCommand {
    fn info(&self) -> &'static ValidatorInfo {
        &IN130
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter(|item| {
                item.as_integration().is_some_and(|integration| {
                    integration.commands.is_empty()
                        && !integration.is_fetch
                        && !integration.is_feed
                        && !integration.long_running
                })
            })
            .map(|item| self.result(item, IN130.error_message))
            .collect()
    }
}

pub struct HiddenValueIsValid;

const IN156: ValidatorInfo = ValidatorInfo {
    error_code: "IN156",
    description: "Validate that the hidden field value contains only valid values.",
    rationale: "The platform only understands booleans and marketplace lists for hidden.",
    error_message: "The following params contain invalid hidden field values:\n{0}\nThe valid values must be either a boolean, or a list of marketplace values.\n(Possible marketplace values: {1}). Note that this param is not required, and may be omitted.",
    related_field: "configuration, hidden",
    content_types: INTEGRATION,
    ..ValidatorInfo::DEFAULT
};

/// Python-style rendering, matching how the values are written in YAML docs.
fn repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(text) => format!("'{text}'"),
        Value::Array(values) => format!("[{}]", values.iter().map(repr).collect::<Vec<_>>().join(", ")),
        other => other.to_string(),
    }
}

impl HiddenValueIsValid {
    /// The offending part of `hidden`, rendered for the message.
    fn invalid_value(hidden: &Value) -> Option<String> {
        match hidden {
            Value::Null | Value::Bool(_) => None,
            Value::String(text) if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") => None,
            Value::String(text) => Some(text.clone()),
            Value::Array(values) => {
                let invalid = values
                    .iter()
                    .filter(|value| {
                        !value
                            .as_str()
                            .is_some_and(|marketplace| marketplace.parse::<MarketplaceVersion>().is_ok())
                    })
                    .cloned()
                    .collect::<Vec<_>>();
                (!invalid.is_empty()).then(|| repr(&Value::Array(invalid)))
            }
            other => Some(other.to_string()),
        }
    }
}

impl Validator for HiddenValueIsValid {
    fn info(&self) -> &'static ValidatorInfo {
        &IN156
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        let possible = MarketplaceVersion::ALL
            .iter()
            .map(|marketplace| marketplace.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        items
            .iter()
            .filter_map(|item| {
                let lines = item
                    .as_integration()?
                    .params
                    .iter()
                    .filter_map(|param| {
                        let invalid = Self::invalid_value(param.hidden.as_ref()?)?;
                        Some(format!(
                            "The param {} contains the following invalid hidden value: {invalid}",
                            param.name
                        ))
                    })
                    .collect::<Vec<_>>();
                (!lines.is_empty()).then(|| {
                    self.result(
                        item,
                        format!(
                            "The following params contain invalid hidden field values:\n{}\nThe valid values must be either a boolean, or a list of marketplace values.\n(Possible marketplace values: {possible}). Note that this param is not required, and may be omitted.",
                            lines.join("\n")
                        ),
                    )
                })
            })
            .collect()
    }
}

pub struct McpPlatformOnly;

const IN168: ValidatorInfo = ValidatorInfo {
    error_code: "IN168",
    description: "Validate that MCP integrations are uploaded to the platform marketplace only.",
    rationale: "MCP integrations are only supported on the platform.",
    error_message: "The integration is an MCP integration and should be uploaded to platform only, but it ships to: {0}. Please specify only platform under marketplaces.",
    fix_message: Some("Set the marketplaces of the MCP integration to platform."),
    related_field: "marketplaces, ismcp",
    content_types: INTEGRATION,
    is_auto_fixable: true,
    ..ValidatorInfo::DEFAULT
};

fn ships_beyond_platform(item: &ContentItem) -> Option<Vec<MarketplaceVersion>> {
    let marketplaces = item.effective_marketplaces();
    (item.is_mcp_item() && marketplaces != [MarketplaceVersion::Platform]).then_some(marketplaces)
}

impl Validator for McpPlatformOnly {
    fn info(&self) -> &'static ValidatorInfo {
        &IN168
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let marketplaces = ships_beyond_platform(item)?;
                let listed = marketplaces.iter().map(|marketplace| marketplace.as_str()).collect::<Vec<_>>();
                Some(self.result(
                    item,
                    format!(
                        "The integration is an MCP integration and should be uploaded to platform only, but it ships to: {}. Please specify only platform under marketplaces.",
                        listed.join(", ")
                    ),
                ))
            })
            .collect()
    }

    fn fix(&self, item: &mut ContentItem, _ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        if ships_beyond_platform(item).is_none() {
            return Err(not_fixable(item, "IN168"));
        }
        let path = item.marketplaces_path();
        data_set(&mut item.data, path, json!([MarketplaceVersion::Platform.as_str()]));
        item.marketplaces = vec![MarketplaceVersion::Platform];
        Ok(self.fixed(item, "Set the marketplaces of the MCP integration to platform."))
    }
}

pub struct CheckboxDefaultValue;

const IN153: ValidatorInfo = ValidatorInfo {
    error_code: "IN153",
    description: "Validate that checkbox params default to true, false or nothing.",
    rationale: "The platform can only render a checkbox default that is a boolean.",
    error_message: "The following checkbox params have an invalid defaultvalue: {0}.\nThe defaultvalue of a checkbox param must be true, false or empty.",
    related_field: "configuration.defaultvalue",
    content_types: INTEGRATION,
    ..ValidatorInfo::DEFAULT
};

fn valid_checkbox_default(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null | Value::Bool(_)) => true,
        Some(Value::String(text)) => text == "true" || text == "false",
        Some(_) => false,
    }
}

impl Validator for CheckboxDefaultValue {
    fn info(&self) -> &'static ValidatorInfo {
        &IN153
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let names = item
                    .as_integration()?
                    .params
                    .iter()
                    .filter(|param| param.is_boolean() && !valid_checkbox_default(param.defaultvalue.as_ref()))
                    .map(|param| param.name.as_str())
                    .collect::<Vec<_>>();
                (!names.is_empty()).then(|| {
                    self.result(
                        item,
                        format!(
                            "The following checkbox params have an invalid defaultvalue: {}.\nThe defaultvalue of a checkbox param must be true, false or empty.",
                            names.join(", ")
                        ),
                    )
                })
            })
            .collect()
    }
}

pub struct FetchEventsMarketplace;

const IN161: ValidatorInfo = ValidatorInfo {
    error_code: "IN161",
    description: "Validate that event collectors ship to marketplacev2.",
    rationale: "Fetched events are only ingested by the marketplacev2 platform.",
    error_message: "The integration fetches events but does not ship to marketplacev2. Add marketplacev2 to the marketplaces of the integration.",
    related_field: "script.isfetchevents, marketplaces",
    content_types: INTEGRATION,
    ..ValidatorInfo::DEFAULT
};

impl Validator for FetchEventsMarketplace {
    fn info(&self) -> &'static ValidatorInfo {
        &IN161
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter(|item| {
                item.as_integration().is_some_and(|integration| integration.is_fetch_events)
                    && !item.in_marketplace(MarketplaceVersion::MarketplaceV2)
            })
            .map(|item| self.result(item, IN161.error_message))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::data_get;
    use crate::validators::testing::{integration, item_in, messages, modified, pack, run, Harness};

    const PROXY_MESSAGE: &str = "The following params are invalid:\nThe proxy param display name should be 'Use system proxy settings', the 'defaultvalue' field should be 'false', the 'required' field should be 'False', and the 'type' field should be 8.";

    fn with_config(config: &str) -> ContentItem {
        integration(&format!("commonfields:\n  id: A\nname: A\nconfiguration:\n{config}"))
    }

    #[test]
    fn connection_params_must_match_the_canonical_shape() {
        let harness = Harness::new();
        let valid = vec![
            with_config("- name: insecure\n  type: 8\n  required: false\n  display: Trust any certificate (not secure)\n"),
            with_config("- name: proxy\n  type: 8\n  display: Use system proxy settings\n"),
        ];
        assert!(run(&ConnectionParamsFormat, &valid, &harness.ctx()).is_empty());

        let invalid = vec![
            with_config("- name: proxy\n  display: a\n  type: 1\n"),
            with_config("- name: proxy\n  display: Use system proxy settings\n  type: 8\n  required: true\n"),
        ];
        let results = run(&ConnectionParamsFormat, &invalid, &harness.ctx());
        assert_eq!(messages(&results), vec![PROXY_MESSAGE, PROXY_MESSAGE]);

        let mut item = with_config("- name: proxy\n  display: a\n  type: 1\n- name: insecure\n  display: b\n  type: 8\n");
        let fixed = ConnectionParamsFormat.fix(&mut item, &harness.ctx()).expect("fix");
        assert_eq!(fixed.message, "Corrected the following params: insecure, proxy.");
        assert_eq!(
            data_get(&item.data, &["configuration"]).and_then(|list| list.get(0)).and_then(|proxy| proxy.get("display")),
            Some(&json!("Use system proxy settings"))
        );
    }

    #[test]
    fn required_checkboxes_are_reported_and_fixed() {
        let harness = Harness::new();
        let mut item = with_config(
            "- name: insecure\n  type: 8\n  required: true\n- name: test_param_4\n  type: 8\n  required: true\n- name: url\n  type: 0\n  required: true\n",
        );
        let results = run(&RequiredBooleanParams, &[item.clone()], &harness.ctx());
        assert_eq!(
            messages(&results),
            vec!["The following checkbox params required field is set to True: test_param_4.\nMake sure to change it to False/remove the field."]
        );
        let fixed = RequiredBooleanParams.fix(&mut item, &harness.ctx()).expect("fix");
        assert_eq!(fixed.message, "Set required field of the following params was set to False: test_param_4.");
        assert_eq!(
            data_get(&item.data, &["configuration"]).and_then(|list| list.get(1)).and_then(|param| param.get("required")),
            Some(&json!(false))
        );
    }

    #[test]
    fn fetch_params_follow_the_marketplace_variant() {
        let harness = Harness::new();
        let alert = integration(
            "commonfields:\n  id: A\nname: A\nmarketplaces: [marketplacev2]\nscript:\n  isfetch: true\nconfiguration:\n- display: Alert\n  name: incidentType\n  type: 13\n- display: Fetch alerts\n  name: isFetch\n  type: 1\n",
        );
        let incident = integration(
            "commonfields:\n  id: B\nname: B\nmarketplaces: [xsoar]\nscript:\n  isfetch: true\nconfiguration:\n- display: Incident type\n  name: incidentType\n  type: 13\n- name: isFetch\n  type: 8\n",
        );
        let valid = integration(
            "commonfields:\n  id: C\nname: C\nmarketplaces: [xsoar]\nscript:\n  isfetch: true\nconfiguration:\n- display: Incident type\n  name: incidentType\n  type: 13\n- display: Fetch incidents\n  name: isFetch\n  type: 8\n",
        );
        let results = run(&FetchRequiredParams, &[alert, incident, valid], &harness.ctx());
        assert_eq!(
            messages(&results),
            vec![
                "The integration is a fetch integration and is missing/containing malformed required params:\nThe param incidentType is missing/malformed, it should be in the following format: {'display': 'Alert type', 'name': 'incidentType', 'type': 13}\nThe param isFetch is missing/malformed, it should be in the following format: {'display': 'Fetch alerts', 'name': 'isFetch', 'type': 8}",
                "The integration is a fetch integration and is missing/containing malformed required params:\nThe param isFetch is missing/malformed, it should be in the following format: {'display': 'Fetch incidents', 'name': 'isFetch', 'type': 8}",
            ]
        );
    }

    #[test]
    fn hidden_params_need_an_exemption() {
        let harness = Harness::new();
        let base = "commonfields:\n  id: A\nname: A\nconfiguration:\n- name: url\n  type: 0\n- name: longRunning\n  type: 8\n";
        let mut item = modified(
            integration(
                "commonfields:\n  id: A\nname: A\nconfiguration:\n- name: url\n  type: 0\n  hidden: true\n- name: longRunning\n  type: 8\n  hidden: true\n- name: partial\n  type: 0\n  hidden: [xsoar]\n",
            ),
            base,
        );
        let results = run(&UnhiddenableParams, &[item.clone()], &harness.ctx());
        assert_eq!(
            messages(&results),
            vec!["The following fields are hidden and cannot be hidden, please unhide them: url."]
        );
        let fixed = UnhiddenableParams.fix(&mut item, &harness.ctx()).expect("fix");
        assert_eq!(fixed.message, "Unhiddened the following params url.");

        let unchanged = modified(
            integration("commonfields:\n  id: A\nname: A\nconfiguration:\n- name: url\n  type: 0\n  hidden: true\n"),
            "commonfields:\n  id: A\nname: A\nconfiguration:\n- name: url\n  type: 0\n  hidden: true\n",
        );
        assert!(run(&UnhiddenableParams, &[unchanged], &harness.ctx()).is_empty());
    }

    #[test]
    fn max_fetch_gets_a_default() {
        let harness = Harness::new();
        let mut item = integration(
            "commonfields:\n  id: A\nname: A\nscript:\n  isfetch: true\nconfiguration:\n- name: max_fetch\n  type: 0\n",
        );
        let results = run(&MaxFetchHasDefault, &[item.clone()], &harness.ctx());
        assert_eq!(results.len(), 1);
        let fixed = MaxFetchHasDefault.fix(&mut item, &harness.ctx()).expect("fix");
        assert_eq!(fixed.message, "Added a 'defaultvalue = 50' to the max_fetch param.");
        assert_eq!(
            data_get(&item.data, &["configuration"]).and_then(|list| list.get(0)).and_then(|param| param.get("defaultvalue")),
            Some(&json!("50"))
        );
    }

    #[test]
    fn integration_needs_something_to_run() {
        let harness = Harness::new();
        let items = vec![
            integration("commonfields:\n  id: A\nname: A\nscript:\n  commands: []\n"),
            integration("commonfields:\n  id: B\nname: B\nscript:\n  feed: true\n"),
            integration("commonfields:\n  id: C\nname: C\nscript:\n  commands:\n  - name: c-run\n"),
        ];
        let results = run(&HasRunnableCommand, &items, &harness.ctx());
        assert_eq!(results.len(), 1);
        assert!(results[0].message.starts_with("Could not find any runnable command in the integration."));
    }

    #[test]
    fn hidden_values_must_be_booleans_or_marketplaces() {
        let harness = Harness::new();
        let valid = with_config(
            "- name: a\n  hidden: [xsoar_on_prem]\n- name: b\n  hidden: [xsoar_saas]\n- name: c\n  hidden: 'false'\n- name: d\n  hidden: true\n",
        );
        assert!(run(&HiddenValueIsValid, &[valid], &harness.ctx()).is_empty());

        let invalid = with_config("- name: a\n  hidden: maybe\n- name: b\n  hidden: [false]\n- name: c\n  hidden: ['some comment', xsoar]\n");
        let results = run(&HiddenValueIsValid, &[invalid], &harness.ctx());
        assert_eq!(
            messages(&results),
            vec!["The following params contain invalid hidden field values:\nThe param a contains the following invalid hidden value: maybe\nThe param b contains the following invalid hidden value: [False]\nThe param c contains the following invalid hidden value: ['some comment']\nThe valid values must be either a boolean, or a list of marketplace values.\n(Possible marketplace values: xsoar, xsoar_saas, xsoar_on_prem, marketplacev2, platform). Note that this param is not required, and may be omitted."]
        );
    }

    #[test]
    fn mcp_integrations_ship_to_platform_only() {
        let harness = Harness::new();
        let pack = pack("Mcp", &[MarketplaceVersion::Platform, MarketplaceVersion::Xsoar]);
        let path = "Packs/Mcp/Integrations/Mcp/Mcp.yml";
        let mut item = item_in(pack.clone(), ContentType::Integration, path, "commonfields:\n  id: Mcp\nname: Mcp\nismcp: true\n");
        let results = run(&McpPlatformOnly, &[item.clone()], &harness.ctx());
        assert_eq!(results.len(), 1);
        assert!(results[0].message.contains("xsoar"));

        McpPlatformOnly.fix(&mut item, &harness.ctx()).expect("fix");
        assert_eq!(data_get(&item.data, &["marketplaces"]), Some(&json!(["platform"])));
        assert!(run(&McpPlatformOnly, &[item], &harness.ctx()).is_empty());

        let overridden = item_in(
            pack,
            ContentType::Integration,
            path,
            "commonfields:\n  id: Mcp\nname: Mcp\nismcp: true\nmarketplaces: [platform]\n",
        );
        assert!(run(&McpPlatformOnly, &[overridden], &harness.ctx()).is_empty());
    }

    #[test]
    fn checkbox_defaults_must_be_boolean() {
        let harness = Harness::new();
        let valid = with_config(
            "- name: a\n  type: 8\n  defaultvalue: 'true'\n- name: b\n  type: 8\n  defaultvalue: false\n- name: c\n  type: 8\n- name: d\n  type: 0\n  defaultvalue: maybe\n",
        );
        assert!(run(&CheckboxDefaultValue, &[valid], &harness.ctx()).is_empty());

        let invalid = with_config("- name: a\n  type: 8\n  defaultvalue: maybe\n- name: b\n  type: 8\n  defaultvalue: 1\n");
        let results = run(&CheckboxDefaultValue, &[invalid], &harness.ctx());
        assert_eq!(
            messages(&results),
            vec!["The following checkbox params have an invalid defaultvalue: a, b.\nThe defaultvalue of a checkbox param must be true, false or empty."]
        );
    }

    #[test]
    fn event_collectors_ship_to_marketplacev2() {
        let harness = Harness::new();
        let pack = pack("Events", &[]);
        let path = "Packs/Events/Integrations/Events/Events.yml";
        let collector = |extra: &str| {
            item_in(
                pack.clone(),
                ContentType::Integration,
                path,
                &format!("commonfields:\n  id: Events\nname: Events\nscript:\n  isfetchevents: true\n{extra}"),
            )
        };
        let results = run(&FetchEventsMarketplace, &[collector("marketplaces: [xsoar]\n")], &harness.ctx());
        assert_eq!(messages(&results), vec![IN161.error_message]);

        assert!(run(&FetchEventsMarketplace, &[collector("marketplaces: [marketplacev2]\n")], &harness.ctx()).is_empty());
        assert!(run(&FetchEventsMarketplace, &[collector("")], &harness.ctx()).is_empty());
    }
}
