use super::lenient_bool;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybookInput {
    pub key: String,
    pub value: Option<Value>,
    #[serde(deserialize_with = "lenient_bool")]
    pub required: bool,
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybookOutput {
    #[serde(rename = "contextPath")]
    pub context_path: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playbook {
    pub inputs: Vec<PlaybookInput>,
    pub outputs: Vec<PlaybookOutput>,
    pub is_test: bool,
    /// Ids of scripts and playbooks referenced from tasks.
    pub task_references: Vec<String>,
    /// Integration commands referenced from tasks (`brand|||command` resolved to the command).
    pub command_references: Vec<String>,
}
