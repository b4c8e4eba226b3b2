use super::{lenient_bool, lenient_opt_bool};
use crate::constants::{param_type, MarketplaceVersion};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An integration configuration entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub name: String,
    pub display: Option<String>,
    #[serde(rename = "type")]
    pub param_type: Option<i64>,
    #[serde(deserialize_with = "lenient_opt_bool")]
    pub required: Option<bool>,
    pub defaultvalue: Option<Value>,
    pub hidden: Option<Value>,
    pub additionalinfo: Option<String>,
    pub options: Option<Vec<String>>,
    pub displaypassword: Option<String>,
    pub fromlicense: Option<String>,
    pub section: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Parameter {
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    pub fn is_boolean(&self) -> bool {
        self.param_type == Some(param_type::BOOLEAN)
    }

    /// Whether the parameter is hidden when installed in `marketplace`.
    pub fn hidden_in(&self, marketplace: MarketplaceVersion) -> bool {
        match &self.hidden {
            Some(Value::Bool(hidden)) => *hidden,
            Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
            Some(Value::Array(values)) => values
                .iter()
                .any(|value| value.as_str() == Some(marketplace.as_str())),
            _ => false,
        }
    }

    /// Hidden everywhere: `true`, `"true"` or a list naming every marketplace.
    pub fn hidden_everywhere(&self) -> bool {
        MarketplaceVersion::ALL
            .iter()
            .all(|marketplace| self.hidden_in(*marketplace))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Argument {
    pub name: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub default: bool,
    #[serde(rename = "isArray", deserialize_with = "lenient_bool")]
    pub is_array: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub required: bool,
    pub defaultvalue: Option<Value>,
    #[serde(deserialize_with = "lenient_bool")]
    pub deprecated: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    #[serde(rename = "contextPath")]
    pub context_path: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub output_type: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub deprecated: bool,
    #[serde(rename = "arguments")]
    pub args: Vec<Argument>,
    pub outputs: Vec<Output>,
    #[serde(deserialize_with = "lenient_bool")]
    pub quickaction: bool,
    pub compliantpolicies: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Integration {
    pub category: Option<String>,
    pub params: Vec<Parameter>,
    pub commands: Vec<Command>,
    pub is_fetch: bool,
    pub is_feed: bool,
    pub is_fetch_events: bool,
    pub is_fetch_events_and_assets: bool,
    pub is_mappable: bool,
    pub long_running: bool,
    pub is_beta: bool,
    pub supports_quick_actions: bool,
    pub section_order: Option<Vec<String>>,
    pub docker_image: Option<String>,
    pub script_type: Option<String>,
    pub subtype: Option<String>,
}

impl Integration {
    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|command| command.name == name)
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetch || self.is_fetch_events || self.is_fetch_events_and_assets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hidden_list_applies_per_marketplace() {
        let param: Parameter = serde_json::from_value(json!({
            "name": "url",
            "hidden": ["xsoar_saas"]
        }))
        .expect("param");
        assert!(param.hidden_in(MarketplaceVersion::XsoarSaas));
        assert!(!param.hidden_in(MarketplaceVersion::Xsoar));
        assert!(!param.hidden_everywhere());
    }

    #[test]
    fn string_booleans_are_accepted() {
        let command: Command = serde_json::from_value(json!({
            "name": "test-module",
            "deprecated": "true",
            "arguments": [{"name": "limit", "isArray": "false"}]
        }))
        .expect("command");
        assert!(command.deprecated);
        assert!(!command.args[0].is_array);
    }

    #[test]
    fn unknown_parameter_keys_survive_in_extra() {
        let param: Parameter =
            serde_json::from_value(json!({"name": "url", "advanced": true})).expect("param");
        assert_eq!(param.extra.get("advanced"), Some(&json!(true)));
    }
}
