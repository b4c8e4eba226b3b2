//! Typed content objects produced by the parsers.

mod agentix;
mod integration;
mod pack;
mod playbook;
mod policy;
mod script;

pub use agentix::{ActionArgument, ActionOutput, AgentixAction, AgentixAgent, AiPrompt, UnderlyingItem};
pub use integration::{Argument, Command, Integration, Output, Parameter};
pub use pack::{release_note_version, version_key, Pack, PackRef, DEFAULT_MARKETPLACES};
pub use playbook::{Playbook, PlaybookInput, PlaybookOutput};
pub use policy::{CompliantPolicies, CompliantPolicy};
pub use script::Script;

use crate::constants::{GitStatus, MarketplaceVersion, SupportLevel};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentType {
    Integration,
    Script,
    Playbook,
    TestPlaybook,
    Pack,
    Command,
    AgentixAgent,
    AgentixAction,
    #[serde(rename = "AIPrompt")]
    AiPrompt,
    Layout,
    Dashboard,
    IncidentField,
    IncidentType,
    Classifier,
    Widget,
    List,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Integration => "Integration",
            ContentType::Script => "Script",
            ContentType::Playbook => "Playbook",
            ContentType::TestPlaybook => "TestPlaybook",
            ContentType::Pack => "Pack",
            ContentType::Command => "Command",
            ContentType::AgentixAgent => "AgentixAgent",
            ContentType::AgentixAction => "AgentixAction",
            ContentType::AiPrompt => "AIPrompt",
            ContentType::Layout => "Layout",
            ContentType::Dashboard => "Dashboard",
            ContentType::IncidentField => "IncidentField",
            ContentType::IncidentType => "IncidentType",
            ContentType::Classifier => "Classifier",
            ContentType::Widget => "Widget",
            ContentType::List => "List",
        }
    }

    /// The pack sub-folder holding items of this type.
    pub fn folder(self) -> Option<&'static str> {
        match self {
            ContentType::Integration => Some("Integrations"),
            ContentType::Script => Some("Scripts"),
            ContentType::Playbook => Some("Playbooks"),
            ContentType::TestPlaybook => Some("TestPlaybooks"),
            ContentType::AgentixAgent => Some("AgentixAgents"),
            ContentType::AgentixAction => Some("AgentixActions"),
            ContentType::AiPrompt => Some("AIPrompts"),
            ContentType::Layout => Some("Layouts"),
            ContentType::Dashboard => Some("Dashboards"),
            ContentType::IncidentField => Some("IncidentFields"),
            ContentType::IncidentType => Some("IncidentTypes"),
            ContentType::Classifier => Some("Classifiers"),
            ContentType::Widget => Some("Widgets"),
            ContentType::List => Some("Lists"),
            ContentType::Pack | ContentType::Command => None,
        }
    }

    pub fn from_folder(folder: &str) -> Option<Self> {
        ALL_CONTENT_TYPES
            .iter()
            .copied()
            .find(|content_type| content_type.folder() == Some(folder))
    }

    /// Types whose descriptor lives in its own folder next to code and docs.
    pub fn has_item_folder(self) -> bool {
        matches!(self, ContentType::Integration | ContentType::Script)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const ALL_CONTENT_TYPES: [ContentType; 16] = [
    ContentType::Integration,
    ContentType::Script,
    ContentType::Playbook,
    ContentType::TestPlaybook,
    ContentType::Pack,
    ContentType::Command,
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

/// A shape defect found while parsing, surfaced later by ST110.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct StructureError {
    pub error_type: String,
    pub field: String,
    pub message: String,
}

/// Companion files discovered next to an item's descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelatedFiles {
    pub code: Option<PathBuf>,
    pub description: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub readme: Option<PathBuf>,
    pub unit_test: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemDetails {
    Integration(Integration),
    Script(Script),
    Playbook(Playbook),
    Pack(Pack),
    AgentixAgent(AgentixAgent),
    AgentixAction(AgentixAction),
    AiPrompt(AiPrompt),
    Generic,
}

/// Loads the base-revision version of an item, if it existed there.
pub trait BaseLoader: Send + Sync {
    fn load_base(&self, item: &ContentItem) -> Option<ContentItem>;
}

#[derive(Clone)]
pub struct BaseSource(pub Arc<dyn BaseLoader>);

impl fmt::Debug for BaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BaseSource")
    }
}

#[derive(Debug, Clone)]
pub struct ContentItem {
    pub object_id: String,
    pub name: String,
    pub display_name: String,
    pub content_type: ContentType,
    /// Descriptor path relative to the content root.
    pub path: PathBuf,
    pub fromversion: Option<String>,
    pub toversion: Option<String>,
    /// Marketplaces declared on the item itself.
    pub marketplaces: Vec<MarketplaceVersion>,
    pub deprecated: bool,
    pub support: Option<SupportLevel>,
    pub supported_modules: Option<Vec<String>>,
    pub is_mcp: bool,
    pub pack: Arc<PackRef>,
    pub structure_errors: Vec<StructureError>,
    pub git_status: Option<GitStatus>,
    pub old_path: Option<PathBuf>,
    pub related_files: RelatedFiles,
    pub details: ItemDetails,
    /// The raw document the item was parsed from; fixes edit it and the
    /// serializer writes it back.
    pub data: Value,
    old_base: OnceLock<Option<Box<ContentItem>>>,
    base_source: Option<BaseSource>,
}

impl ContentItem {
    pub fn new(
        content_type: ContentType,
        path: PathBuf,
        pack: Arc<PackRef>,
        data: Value,
        details: ItemDetails,
    ) -> Self {
        Self {
            object_id: String::new(),
            name: String::new(),
            display_name: String::new(),
            content_type,
            path,
            fromversion: None,
            toversion: None,
            marketplaces: Vec::new(),
            deprecated: false,
            support: None,
            supported_modules: None,
            is_mcp: false,
            pack,
            structure_errors: Vec::new(),
            git_status: None,
            old_path: None,
            related_files: RelatedFiles::default(),
            details,
            data,
            old_base: OnceLock::new(),
            base_source: None,
        }
    }

    pub fn pack_name(&self) -> &str {
        &self.pack.name
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Item support level, falling back to the containing pack.
    pub fn support_level(&self) -> SupportLevel {
        self.support.unwrap_or(self.pack.support)
    }

    /// Marketplaces the item actually ships to: its own list narrowed to the
    /// pack's, or the pack's list when the item declares none.
    pub fn effective_marketplaces(&self) -> Vec<MarketplaceVersion> {
        let pack_marketplaces = self.pack.effective_marketplaces();
        if self.marketplaces.is_empty() {
            return pack_marketplaces;
        }
        if self.pack.marketplaces.is_empty() {
            return self.marketplaces.clone();
        }
        self.marketplaces
            .iter()
            .copied()
            .filter(|marketplace| pack_marketplaces.contains(marketplace))
            .collect()
    }

    pub fn in_marketplace(&self, marketplace: MarketplaceVersion) -> bool {
        self.effective_marketplaces().contains(&marketplace)
    }

    pub fn is_mcp_item(&self) -> bool {
        self.is_mcp || self.pack.is_mcp
    }

    pub fn set_base_source(&mut self, source: BaseSource) {
        self.base_source = Some(source);
    }

    /// Pins the base-revision object, bypassing the lazy loader.
    pub fn set_old_base(&mut self, old: Option<ContentItem>) {
        self.old_base = OnceLock::new();
        let _ = self.old_base.set(old.map(Box::new));
    }

    /// The same item as it was in the base revision; `None` for added files or
    /// when no base revision is in play.
    pub fn old_base(&self) -> Option<&ContentItem> {
        if self.git_status == Some(GitStatus::Added) {
            return None;
        }
        self.old_base
            .get_or_init(|| {
                self.base_source
                    .as_ref()
                    .and_then(|source| source.0.load_base(self))
                    .map(Box::new)
            })
            .as_deref()
    }

    pub fn as_integration(&self) -> Option<&Integration> {
        match &self.details {
            ItemDetails::Integration(integration) => Some(integration),
            _ => None,
        }
    }

    pub fn as_script(&self) -> Option<&Script> {
        match &self.details {
            ItemDetails::Script(script) => Some(script),
            _ => None,
        }
    }

    pub fn as_playbook(&self) -> Option<&Playbook> {
        match &self.details {
            ItemDetails::Playbook(playbook) => Some(playbook),
            _ => None,
        }
    }

    pub fn as_pack(&self) -> Option<&Pack> {
        match &self.details {
            ItemDetails::Pack(pack) => Some(pack),
            _ => None,
        }
    }

    pub fn as_agentix_agent(&self) -> Option<&AgentixAgent> {
        match &self.details {
            ItemDetails::AgentixAgent(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn as_agentix_action(&self) -> Option<&AgentixAction> {
        match &self.details {
            ItemDetails::AgentixAction(action) => Some(action),
            _ => None,
        }
    }

    pub fn docker_image(&self) -> Option<&str> {
        match &self.details {
            ItemDetails::Integration(integration) => integration.docker_image.as_deref(),
            ItemDetails::Script(script) => script.docker_image.as_deref(),
            _ => None,
        }
    }

    pub fn code_type(&self) -> Option<&str> {
        match &self.details {
            ItemDetails::Integration(integration) => integration.script_type.as_deref(),
            ItemDetails::Script(script) => script.script_type.as_deref(),
            _ => None,
        }
    }

    pub fn subtype(&self) -> Option<&str> {
        match &self.details {
            ItemDetails::Integration(integration) => integration.subtype.as_deref(),
            ItemDetails::Script(script) => script.subtype.as_deref(),
            _ => None,
        }
    }

    pub fn is_javascript(&self) -> bool {
        self.code_type() == Some("javascript")
    }

    /// Data key holding the object id: `commonfields.id` for code items, `id`
    /// for everything else.
    pub fn id_path(&self) -> &'static [&'static str] {
        match self.content_type {
            ContentType::Integration | ContentType::Script => &["commonfields", "id"],
            _ => &["id"],
        }
    }

    /// Data key holding the subtype.
    pub fn subtype_path(&self) -> &'static [&'static str] {
        match self.content_type {
            ContentType::Integration => &["script", "subtype"],
            _ => &["subtype"],
        }
    }

    pub fn docker_image_path(&self) -> &'static [&'static str] {
        match self.content_type {
            ContentType::Integration => &["script", "dockerimage"],
            _ => &["dockerimage"],
        }
    }

    pub fn marketplaces_path(&self) -> &'static [&'static str] {
        &["marketplaces"]
    }
}

pub fn data_get<'a>(data: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(data, |current, key| current.get(*key))
}

/// Sets `path` inside `data`, creating intermediate objects as needed.
pub fn data_set(data: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *data = value;
        return;
    };
    let mut current = data;
    for key in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), value);
    }
}

pub fn data_remove(data: &mut Value, path: &[&str]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    let mut current = data;
    for key in parents {
        current = current.get_mut(*key)?;
    }
    current.as_object_mut()?.remove(*last)
}

/// Finds the list entry whose `name` equals `name`.
pub fn named_entry_mut<'a>(list: &'a mut Value, name: &str) -> Option<&'a mut Map<String, Value>> {
    list.as_array_mut()?
        .iter_mut()
        .filter_map(Value::as_object_mut)
        .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name))
}

pub fn value_str(data: &Value, path: &[&str]) -> Option<String> {
    data_get(data, path).and_then(|value| match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

pub fn value_bool(data: &Value, path: &[&str]) -> bool {
    data_get(data, path).map(truthy).unwrap_or(false)
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.eq_ignore_ascii_case("true"),
        Value::Number(number) => number.as_i64().is_some_and(|number| number != 0),
        _ => false,
    }
}

pub fn value_strings(data: &Value, path: &[&str]) -> Vec<String> {
    match data_get(data, path) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(text)) if !text.is_empty() => vec![text.clone()],
        _ => Vec::new(),
    }
}

/// Marketplace strings that parse; unknown values are dropped here and
/// reported through the structure schema.
pub fn parse_marketplaces(values: &[String]) -> Vec<MarketplaceVersion> {
    let mut parsed = values
        .iter()
        .filter_map(|value| value.parse::<MarketplaceVersion>().ok())
        .collect::<Vec<_>>();
    parsed.dedup();
    parsed
}

/// Deserializes every element of a list on its own so one malformed entry
/// does not drop its siblings.
pub fn lenient_list<T: DeserializeOwned + Default>(value: Option<&Value>) -> Vec<T> {
    match value {
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| serde_json::from_value(value.clone()).unwrap_or_else(|_| fallback_named(value)))
            .collect(),
        _ => Vec::new(),
    }
}

fn fallback_named<T: DeserializeOwned + Default>(value: &Value) -> T {
    value
        .get("name")
        .map(|name| serde_json::json!({ "name": name }))
        .and_then(|named| serde_json::from_value(named).ok())
        .unwrap_or_default()
}

/// Accepts YAML booleans as well as their string spellings.
pub fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(false),
        Value::Bool(_) | Value::String(_) | Value::Number(_) => Ok(truthy(&value)),
        other => Err(de::Error::custom(format!("expected a boolean, found {other}"))),
    }
}

pub fn lenient_opt_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::Bool(_) | Value::String(_) | Value::Number(_) => Ok(Some(truthy(&value))),
        other => Err(de::Error::custom(format!("expected a boolean, found {other}"))),
    }
}

/// Path helper for item folders: `Packs/<pack>/<folder>/<item>/<file>`.
pub fn item_folder_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pack(marketplaces: Vec<MarketplaceVersion>) -> Arc<PackRef> {
        Arc::new(PackRef {
            name: "HelloWorld".to_string(),
            marketplaces,
            ..PackRef::default()
        })
    }

    fn item(pack: Arc<PackRef>, marketplaces: Vec<MarketplaceVersion>) -> ContentItem {
        let mut item = ContentItem::new(
            ContentType::Script,
            PathBuf::from("Packs/HelloWorld/Scripts/Hello/Hello.yml"),
            pack,
            json!({}),
            ItemDetails::Generic,
        );
        item.marketplaces = marketplaces;
        item
    }

    #[test]
    fn items_without_marketplaces_inherit_the_pack() {
        let item = item(pack(vec![MarketplaceVersion::Platform]), Vec::new());
        assert_eq!(item.effective_marketplaces(), vec![MarketplaceVersion::Platform]);
    }

    #[test]
    fn item_marketplaces_are_narrowed_to_the_pack() {
        let item = item(
            pack(vec![MarketplaceVersion::Xsoar]),
            vec![MarketplaceVersion::Xsoar, MarketplaceVersion::Platform],
        );
        assert_eq!(item.effective_marketplaces(), vec![MarketplaceVersion::Xsoar]);
    }

    #[test]
    fn old_base_is_absent_for_added_items() {
        let mut item = item(pack(Vec::new()), Vec::new());
        item.set_old_base(Some(item.clone()));
        assert!(item.old_base().is_some());
        item.git_status = Some(GitStatus::Added);
        assert!(item.old_base().is_none());
    }

    #[test]
    fn data_set_creates_parents() {
        let mut data = json!({"name": "x"});
        data_set(&mut data, &["script", "subtype"], json!("python3"));
        assert_eq!(value_str(&data, &["script", "subtype"]).as_deref(), Some("python3"));
        assert_eq!(data_remove(&mut data, &["script", "subtype"]), Some(json!("python3")));
    }

    #[test]
    fn lenient_list_keeps_malformed_entries_by_name() {
        let params: Vec<Parameter> = lenient_list(Some(&json!([
            {"name": "ok", "type": 8},
            {"name": "broken", "type": "not a number"}
        ])));
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].name, "broken");
        assert_eq!(params[1].param_type, None);
    }
}
