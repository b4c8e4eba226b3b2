use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The content item an action wraps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderlyingItem {
    pub id: String,
    pub name: Option<String>,
    /// `command`, `script` or `playbook`.
    #[serde(rename = "type")]
    pub item_type: String,
    /// Owning integration id when `item_type` is `command`.
    pub command: Option<String>,
    pub version: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionArgument {
    pub name: String,
    pub underlyingargname: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionOutput {
    pub name: String,
    pub underlyingoutputcontextpath: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentixAction {
    pub underlying: Option<UnderlyingItem>,
    pub agent_id: Option<String>,
    pub args: Vec<ActionArgument>,
    pub outputs: Vec<ActionOutput>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentixAgent {
    pub action_ids: Vec<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiPrompt {
    pub user_prompt: Option<String>,
}
