//! Typed extraction from a raw descriptor document.

use crate::model::{
    data_get, lenient_list, parse_marketplaces, value_bool, value_str, value_strings, AgentixAction,
    AgentixAgent, AiPrompt, ContentItem, ContentType, Integration, ItemDetails, Pack, PackRef,
    Playbook, Script, UnderlyingItem,
};
use crate::constants::SupportLevel;
use crate::schema;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Builds the content object for `data`. Never fails: shape defects end up in
/// `structure_errors` and the typed fields fall back to their defaults.
pub fn build_item(content_type: ContentType, path: PathBuf, pack: Arc<PackRef>, data: Value) -> ContentItem {
    let details = details_for(content_type, &data);
    let mut item = ContentItem::new(content_type, path, pack, data, details);
    let data = &item.data;

    item.object_id = match content_type {
        ContentType::Pack => item.pack.name.clone(),
        _ => value_str(data, item.id_path()).unwrap_or_default(),
    };
    item.name = value_str(data, &["name"]).unwrap_or_default();
    item.display_name = value_str(data, &["display"]).unwrap_or_else(|| item.name.clone());
    item.fromversion = value_str(data, &["fromversion"]).or_else(|| value_str(data, &["fromVersion"]));
    item.toversion = value_str(data, &["toversion"]).or_else(|| value_str(data, &["toVersion"]));
    item.marketplaces = parse_marketplaces(&value_strings(data, &["marketplaces"]));
    item.deprecated = value_bool(data, &["deprecated"]);
    item.support = value_str(data, &["support"]).and_then(|support| support.parse().ok());
    item.supported_modules = match data_get(data, &["supportedModules"]) {
        Some(Value::Array(_)) => Some(value_strings(data, &["supportedModules"])),
        _ => None,
    };
    item.is_mcp = value_bool(data, &["ismcp"]);
    item.structure_errors = schema::structure_errors(content_type, data);
    item
}

fn details_for(content_type: ContentType, data: &Value) -> ItemDetails {
    match content_type {
        ContentType::Integration => ItemDetails::Integration(integration(data)),
        ContentType::Script => ItemDetails::Script(script(data)),
        ContentType::Playbook | ContentType::TestPlaybook => {
            ItemDetails::Playbook(playbook(data, content_type == ContentType::TestPlaybook))
        }
        ContentType::Pack => ItemDetails::Pack(pack(data)),
        ContentType::AgentixAction => ItemDetails::AgentixAction(AgentixAction {
            underlying: data_get(data, &["underlyingcontentitem"])
                .and_then(|value| serde_json::from_value::<UnderlyingItem>(value.clone()).ok()),
            agent_id: value_str(data, &["agentid"]),
            args: lenient_list(data.get("args")),
            outputs: lenient_list(data.get("outputs")),
        }),
        ContentType::AgentixAgent => ItemDetails::AgentixAgent(AgentixAgent {
            action_ids: value_strings(data, &["actionids"]),
            color: value_str(data, &["color"]),
        }),
        ContentType::AiPrompt => ItemDetails::AiPrompt(AiPrompt {
            user_prompt: value_str(data, &["userprompt"]),
        }),
        _ => ItemDetails::Generic,
    }
}

fn integration(data: &Value) -> Integration {
    Integration {
        category: value_str(data, &["category"]),
        params: lenient_list(data.get("configuration")),
        commands: lenient_list(data_get(data, &["script", "commands"])),
        is_fetch: value_bool(data, &["script", "isfetch"]),
        is_feed: value_bool(data, &["script", "feed"]),
        is_fetch_events: value_bool(data, &["script", "isfetchevents"]) || value_bool(data, &["isfetchevents"]),
        is_fetch_events_and_assets: value_bool(data, &["script", "isfetcheventsandassets"]),
        is_mappable: value_bool(data, &["script", "ismappable"]),
        long_running: value_bool(data, &["script", "longRunning"]),
        is_beta: value_bool(data, &["beta"]),
        supports_quick_actions: value_bool(data, &["supportsquickactions"]),
        section_order: match data.get("sectionorder") {
            Some(Value::Array(_)) => Some(value_strings(data, &["sectionorder"])),
            _ => None,
        },
        docker_image: value_str(data, &["script", "dockerimage"]),
        script_type: value_str(data, &["script", "type"]),
        subtype: value_str(data, &["script", "subtype"]),
    }
}

fn script(data: &Value) -> Script {
    Script {
        script_type: value_str(data, &["type"]),
        subtype: value_str(data, &["subtype"]),
        docker_image: value_str(data, &["dockerimage"]),
        args: lenient_list(data.get("args")),
        outputs: lenient_list(data.get("outputs")),
        runas: value_str(data, &["runas"]),
        tags: value_strings(data, &["tags"]),
        is_llm: value_bool(data, &["isllm"]),
        compliantpolicies: value_strings(data, &["compliantpolicies"]),
        skip_prepare: value_strings(data, &["skipprepare"]),
    }
}

fn playbook(data: &Value, is_test: bool) -> Playbook {
    let mut task_references = Vec::new();
    let mut command_references = Vec::new();
    if let Some(Value::Object(tasks)) = data.get("tasks") {
        for task in tasks.values() {
            let Some(body) = task.get("task") else {
                continue;
            };
            for key in ["scriptName", "playbookName", "playbookId"] {
                if let Some(reference) = body.get(key).and_then(Value::as_str) {
                    task_references.push(reference.to_string());
                }
            }
            if let Some(script) = body.get("script").and_then(Value::as_str) {
                match script.split_once("|||") {
                    Some((_, command)) => command_references.push(command.to_string()),
                    None => task_references.push(script.to_string()),
                }
            }
        }
    }
    task_references.sort();
    task_references.dedup();
    command_references.sort();
    command_references.dedup();
    Playbook {
        inputs: lenient_list(data.get("inputs")),
        outputs: lenient_list(data.get("outputs")),
        is_test,
        task_references,
        command_references,
    }
}

fn pack(data: &Value) -> Pack {
    Pack {
        name: value_str(data, &["name"]).unwrap_or_default(),
        support: value_str(data, &["support"]).and_then(|support| support.parse().ok()),
        current_version: value_str(data, &["currentVersion"]),
        tags: value_strings(data, &["tags"]),
        categories: value_strings(data, &["categories"]),
        default_datasource: value_str(data, &["defaultDataSource"]),
        hidden: value_bool(data, &["hidden"]),
        release_notes: Default::default(),
    }
}

/// Pack-level facts read from `pack_metadata.json`.
pub fn pack_ref(name: &str, path: PathBuf, metadata: Option<&Value>) -> PackRef {
    let Some(metadata) = metadata else {
        return PackRef {
            name: name.to_string(),
            path,
            ..PackRef::default()
        };
    };
    PackRef {
        name: name.to_string(),
        path,
        marketplaces: parse_marketplaces(&value_strings(metadata, &["marketplaces"])),
        support: value_str(metadata, &["support"])
            .and_then(|support| support.parse().ok())
            .unwrap_or(SupportLevel::Xsoar),
        supported_modules: match metadata.get("supportedModules") {
            Some(Value::Array(_)) => Some(value_strings(metadata, &["supportedModules"])),
            _ => None,
        },
        is_mcp: value_bool(metadata, &["ismcp"]),
        current_version: value_str(metadata, &["currentVersion"]),
    }
}
