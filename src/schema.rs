//! Structural schemas per content type and the mapping of schema violations
//! to structure errors.

use crate::constants::{MarketplaceVersion, SECTIONS};
use crate::model::{ContentType, StructureError};
use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::primitive_type::PrimitiveType;
use jsonschema::JSONSchema;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::error;

fn marketplaces() -> Value {
    let names = MarketplaceVersion::ALL
        .iter()
        .map(|marketplace| marketplace.as_str())
        .collect::<Vec<_>>();
    json!({"type": "array", "items": {"enum": names}})
}

fn string_list() -> Value {
    json!({"type": "array", "items": {"type": "string"}})
}

fn flag() -> Value {
    json!({"type": ["boolean", "string"]})
}

fn common_fields() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {"type": "string"},
            "version": {"type": "integer"},
            "sortvalues": {},
        },
        "required": ["id"],
        "additionalProperties": false,
    })
}

fn argument() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "description": {"type": "string"},
            "default": flag(),
            "isArray": flag(),
            "required": flag(),
            "secret": flag(),
            "defaultValue": {},
            "defaultvalue": {},
            "deprecated": flag(),
            "auto": {"type": "string"},
            "predefined": string_list(),
            "execution": flag(),
            "prettyname": {"type": "string"},
            "type": {"type": "string"},
            "hidden": flag(),
        },
        "required": ["name"],
        "additionalProperties": false,
    })
}

fn output() -> Value {
    json!({
        "type": "object",
        "properties": {
            "contextPath": {"type": "string"},
            "description": {"type": "string"},
            "type": {},
            "important": flag(),
            "importantDescription": {"type": "string"},
        },
        "required": ["contextPath"],
        "additionalProperties": false,
    })
}

fn parameter() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "display": {"type": "string"},
            "type": {"type": "integer"},
            "required": flag(),
            "defaultvalue": {},
            "hidden": {},
            "additionalinfo": {"type": "string"},
            "options": string_list(),
            "displaypassword": {"type": "string"},
            "hiddenusername": flag(),
            "hiddenpassword": flag(),
            "fromlicense": {"type": "string"},
            "section": {"type": "string"},
            "advanced": flag(),
        },
        "required": ["name"],
        "additionalProperties": false,
    })
}

fn command() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "description": {"type": "string"},
            "deprecated": flag(),
            "execution": flag(),
            "arguments": {"type": "array", "items": argument()},
            "outputs": {"type": "array", "items": output()},
            "quickaction": flag(),
            "compliantpolicies": string_list(),
            "hidden": flag(),
            "polling": flag(),
            "timeout": {"type": "integer"},
            "prettyname": {"type": "string"},
            "important": {},
        },
        "required": ["name"],
        "additionalProperties": false,
    })
}

fn integration_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "commonfields": common_fields(),
            "name": {"type": "string"},
            "display": {"type": "string"},
            "category": {"type": "string"},
            "description": {"type": "string"},
            "detaileddescription": {"type": "string"},
            "image": {"type": "string"},
            "sectionorder": {"type": "array", "items": {"enum": SECTIONS}},
            "configuration": {"type": "array", "items": parameter()},
            "script": {
                "type": "object",
                "properties": {
                    "script": {"type": "string"},
                    "type": {"enum": ["python", "powershell", "javascript"]},
                    "subtype": {"enum": ["python2", "python3"]},
                    "dockerimage": {"type": "string"},
                    "alt_dockerimages": string_list(),
                    "nativeimage": string_list(),
                    "commands": {"type": "array", "items": command()},
                    "isfetch": flag(),
                    "isfetchevents": flag(),
                    "isfetcheventsandassets": flag(),
                    "isFetchSamples": flag(),
                    "feed": flag(),
                    "longRunning": flag(),
                    "longRunningPort": flag(),
                    "ismappable": flag(),
                    "isremotesyncin": flag(),
                    "isremotesyncout": flag(),
                    "runonce": flag(),
                    "resetContext": flag(),
                },
                "required": ["type"],
                "additionalProperties": false,
            },
            "fromversion": {"type": "string"},
            "toversion": {"type": "string"},
            "deprecated": flag(),
            "beta": flag(),
            "hidden": flag(),
            "system": flag(),
            "marketplaces": marketplaces(),
            "supportedModules": string_list(),
            "ismcp": flag(),
            "supportsquickactions": flag(),
            "tests": string_list(),
            "defaultmapperin": {"type": "string"},
            "defaultmapperout": {"type": "string"},
            "defaultclassifier": {"type": "string"},
            "autoUpdateDockerImage": flag(),
            "videos": string_list(),
            "triggers": {"type": "array"},
        },
        "required": ["commonfields", "name", "display", "category", "script"],
        "additionalProperties": false,
    })
}

fn script_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "commonfields": common_fields(),
            "name": {"type": "string"},
            "script": {"type": "string"},
            "type": {"enum": ["python", "powershell", "javascript"]},
            "subtype": {"enum": ["python2", "python3"]},
            "comment": {"type": "string"},
            "tags": string_list(),
            "enabled": flag(),
            "args": {"type": "array", "items": argument()},
            "outputs": {"type": "array", "items": output()},
            "scripttarget": {"type": "integer"},
            "timeout": {},
            "runas": {"type": "string"},
            "dockerimage": {"type": "string"},
            "alt_dockerimages": string_list(),
            "nativeimage": string_list(),
            "dependson": {"type": "object"},
            "deprecated": flag(),
            "fromversion": {"type": "string"},
            "toversion": {"type": "string"},
            "tests": string_list(),
            "marketplaces": marketplaces(),
            "supportedModules": string_list(),
            "isllm": flag(),
            "compliantpolicies": string_list(),
            "skipprepare": string_list(),
            "runonce": flag(),
            "sensitive": flag(),
            "system": flag(),
            "polling": flag(),
            "prettyname": {"type": "string"},
            "autoUpdateDockerImage": flag(),
            "contentitemexportablefields": {"type": "object"},
        },
        "required": ["commonfields", "name", "type"],
        "additionalProperties": false,
    })
}

fn playbook_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {"type": "string"},
            "name": {"type": "string"},
            "version": {"type": "integer"},
            "description": {"type": "string"},
            "starttaskid": {"type": "string"},
            "tasks": {"type": "object"},
            "view": {},
            "inputs": {"type": "array"},
            "outputs": {"type": "array"},
            "inputSections": {"type": "array"},
            "outputSections": {"type": "array"},
            "fromversion": {"type": "string"},
            "toversion": {"type": "string"},
            "deprecated": flag(),
            "hidden": flag(),
            "tests": string_list(),
            "marketplaces": marketplaces(),
            "supportedModules": string_list(),
            "quiet": flag(),
            "sourceplaybookid": {"type": "string"},
            "contentitemexportablefields": {"type": "object"},
            "system": flag(),
            "isTopLevel": flag(),
        },
        "required": ["id", "name"],
        "additionalProperties": false,
    })
}

fn pack_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "description": {"type": "string"},
            "support": {"enum": ["xsoar", "partner", "community", "developer"]},
            "currentVersion": {"type": "string"},
            "author": {"type": "string"},
            "url": {"type": "string"},
            "email": {"type": "string"},
            "created": {"type": "string"},
            "categories": string_list(),
            "tags": string_list(),
            "useCases": string_list(),
            "keywords": string_list(),
            "marketplaces": marketplaces(),
            "supportedModules": string_list(),
            "defaultDataSource": {"type": "string"},
            "hidden": flag(),
            "ismcp": flag(),
            "dependencies": {"type": "object"},
            "excludedDependencies": string_list(),
            "githubUser": string_list(),
            "devEmail": string_list(),
            "certification": {"type": "string"},
            "itemPrefix": string_list(),
            "videos": string_list(),
            "modules": string_list(),
            "integrations": string_list(),
            "displayedImages": string_list(),
            "price": {},
            "premium": flag(),
            "vendorId": {"type": "string"},
            "vendorName": {"type": "string"},
            "preview": flag(),
            "disableMonthly": flag(),
            "contentCommitHash": {"type": "string"},
            "serverMinVersion": {"type": "string"},
        },
        "required": ["name", "currentVersion"],
        "additionalProperties": false,
    })
}

fn agentix_action_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {"type": "string"},
            "name": {"type": "string"},
            "display": {"type": "string"},
            "description": {"type": "string"},
            "color": {"type": "string"},
            "agentid": {"type": "string"},
            "underlyingcontentitem": {
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "name": {"type": "string"},
                    "type": {"enum": ["command", "script", "playbook"]},
                    "command": {"type": "string"},
                    "version": {},
                },
                "required": ["id", "type"],
                "additionalProperties": false,
            },
            "args": {"type": "array"},
            "outputs": {"type": "array"},
            "requiresuserapproval": flag(),
            "fewshots": string_list(),
            "fromversion": {"type": "string"},
            "toversion": {"type": "string"},
            "deprecated": flag(),
            "marketplaces": marketplaces(),
            "supportedModules": string_list(),
        },
        "required": ["id", "name", "underlyingcontentitem"],
        "additionalProperties": false,
    })
}

fn agentix_agent_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {"type": "string"},
            "name": {"type": "string"},
            "display": {"type": "string"},
            "description": {"type": "string"},
            "color": {"type": "string"},
            "actionids": string_list(),
            "systeminstructions": {"type": "string"},
            "conversationstarters": string_list(),
            "builtinactions": string_list(),
            "autoenablenewactions": flag(),
            "roles": string_list(),
            "sharedwithroles": string_list(),
            "fromversion": {"type": "string"},
            "toversion": {"type": "string"},
            "deprecated": flag(),
            "marketplaces": marketplaces(),
            "supportedModules": string_list(),
        },
        "required": ["id", "name"],
        "additionalProperties": false,
    })
}

/// Schema source for a content type; `None` when the type is not checked.
pub fn schema_for(content_type: ContentType) -> Option<Value> {
    match content_type {
        ContentType::Integration => Some(integration_schema()),
        ContentType::Script => Some(script_schema()),
        ContentType::Playbook | ContentType::TestPlaybook => Some(playbook_schema()),
        ContentType::Pack => Some(pack_schema()),
        ContentType::AgentixAction => Some(agentix_action_schema()),
        ContentType::AgentixAgent => Some(agentix_agent_schema()),
        _ => None,
    }
}

fn compiled(content_type: ContentType) -> Option<&'static JSONSchema> {
    static SCHEMAS: OnceLock<HashMap<ContentType, JSONSchema>> = OnceLock::new();
    SCHEMAS
        .get_or_init(|| {
            crate::model::ALL_CONTENT_TYPES
                .iter()
                .filter_map(|content_type| {
                    let schema = schema_for(*content_type)?;
                    match JSONSchema::compile(&schema) {
                        Ok(compiled) => Some((*content_type, compiled)),
                        Err(compile_error) => {
                            error!(content_type = %content_type, error = %compile_error, "schema does not compile");
                            None
                        }
                    }
                })
                .collect()
        })
        .get(&content_type)
}

/// Checks `data` against the schema of `content_type`.
pub fn structure_errors(content_type: ContentType, data: &Value) -> Vec<StructureError> {
    let Some(schema) = compiled(content_type) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    if let Err(errors) = schema.validate(data) {
        for violation in errors {
            let location = pointer_to_field(&violation.instance_path.to_string());
            match &violation.kind {
                ValidationErrorKind::AdditionalProperties { unexpected } => {
                    for key in unexpected {
                        let field = join_field(&location, key);
                        found.push(StructureError {
                            error_type: "value_error.extra".to_string(),
                            message: format!("The field {field} is extra and extra fields not permitted"),
                            field,
                        });
                    }
                }
                ValidationErrorKind::Required { property } => {
                    let key = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
                    let field = join_field(&location, &key);
                    found.push(StructureError {
                        error_type: "value_error.missing".to_string(),
                        message: format!("The field {field} is required but missing"),
                        field,
                    });
                }
                ValidationErrorKind::Enum { options } => {
                    let permitted = options
                        .as_array()
                        .map(|values| {
                            values
                                .iter()
                                .map(|value| format!("'{}'", value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string())))
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default();
                    found.push(StructureError {
                        error_type: "type_error.enum".to_string(),
                        message: format!("value is not a valid enumeration member; permitted: {permitted}"),
                        field: location,
                    });
                }
                ValidationErrorKind::Type { kind } if violation.instance.is_null() => {
                    let _ = kind;
                    found.push(StructureError {
                        error_type: "assertion_error".to_string(),
                        message: format!(
                            "The field {location} is not required, but should not be None if it exists"
                        ),
                        field: location,
                    });
                }
                ValidationErrorKind::Type { kind } => {
                    let (suffix, message) = type_error(kind);
                    found.push(StructureError {
                        error_type: format!("type_error{suffix}"),
                        message: message.to_string(),
                        field: location,
                    });
                }
                _ => found.push(StructureError {
                    error_type: "value_error".to_string(),
                    message: violation.to_string(),
                    field: location,
                }),
            }
        }
    }
    found.sort();
    found.dedup();
    found
}

fn type_error(kind: &TypeKind) -> (&'static str, &'static str) {
    match kind {
        TypeKind::Single(PrimitiveType::Boolean) => (".bool", "value could not be parsed to a boolean"),
        TypeKind::Single(PrimitiveType::Integer) => (".integer", "value is not a valid integer"),
        TypeKind::Single(PrimitiveType::Number) => (".float", "value is not a valid float"),
        TypeKind::Single(PrimitiveType::String) => (".str", "str type expected"),
        TypeKind::Single(PrimitiveType::Array) => (".list", "value is not a valid list"),
        TypeKind::Single(PrimitiveType::Object) => (".dict", "value is not a valid dict"),
        _ => ("", "value has an invalid type"),
    }
}

fn pointer_to_field(pointer: &str) -> String {
    pointer
        .trim_start_matches('/')
        .split('/')
        .filter(|part| !part.is_empty())
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(",")
}

fn join_field(location: &str, key: &str) -> String {
    if location.is_empty() {
        key.to_string()
    } else {
        format!("{location},{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integration() -> Value {
        json!({
            "commonfields": {"id": "HelloWorld", "version": -1},
            "name": "HelloWorld",
            "display": "Hello World",
            "category": "Utilities",
            "sectionorder": ["Connect", "Collect"],
            "configuration": [{"name": "url", "type": 0, "section": "Connect"}],
            "script": {"type": "python", "subtype": "python3", "commands": []},
        })
    }

    #[test]
    fn every_schema_compiles() {
        for content_type in crate::model::ALL_CONTENT_TYPES {
            if let Some(schema) = schema_for(content_type) {
                assert!(JSONSchema::compile(&schema).is_ok(), "{content_type}");
            }
        }
    }

    #[test]
    fn valid_integration_has_no_errors() {
        assert!(structure_errors(ContentType::Integration, &integration()).is_empty());
    }

    #[test]
    fn extra_missing_null_and_enum_errors() {
        let mut data = integration();
        data["EXTRA_FIELD"] = json!("x");
        data["display"] = Value::Null;
        data["sectionorder"] = json!(["Connect", "Run"]);
        data.as_object_mut().expect("object").remove("category");
        let errors = structure_errors(ContentType::Integration, &data);
        let kinds = errors
            .iter()
            .map(|error| (error.error_type.as_str(), error.field.as_str()))
            .collect::<Vec<_>>();
        assert!(kinds.contains(&("value_error.extra", "EXTRA_FIELD")));
        assert!(kinds.contains(&("value_error.missing", "category")));
        assert!(kinds.contains(&("assertion_error", "display")));
        assert!(kinds.contains(&("type_error.enum", "sectionorder,1")));
    }
}
