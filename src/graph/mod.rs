//! In-memory relationship graph over every parsed content item.

mod names;

pub use names::{replace_alert_to_incident, replace_incident_to_alert};

use crate::constants::{MarketplaceVersion, PACKS_DIR, PACK_METADATA};
use crate::files::FileReader;
use crate::model::{ContentItem, ContentType};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// The skip-prepare flag that opts a script out of incident-to-alert renaming.
pub const SKIP_INCIDENT_TO_ALERT: &str = "script-name-incident-to-alert";

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub content_type: ContentType,
    pub object_id: String,
    pub name: String,
    /// `None` for integration commands, which have no file of their own.
    pub path: Option<PathBuf>,
    pub pack: String,
    pub marketplaces: Vec<MarketplaceVersion>,
    pub item: Option<Arc<ContentItem>>,
}

impl GraphNode {
    pub fn in_marketplace(&self, marketplace: MarketplaceVersion) -> bool {
        self.marketplaces.contains(&marketplace)
    }

    fn skips(&self, preparation: &str) -> bool {
        self.item
            .as_ref()
            .and_then(|item| item.as_script())
            .is_some_and(|script| script.skips(preparation))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relationship {
    HasCommand { deprecated: bool, description: Option<String> },
    Imports,
    Uses,
    DependsOn,
    InPack,
}

impl Relationship {
    fn is_dependency(&self) -> bool {
        matches!(
            self,
            Relationship::HasCommand { .. } | Relationship::Imports | Relationship::Uses | Relationship::DependsOn
        )
    }
}

/// A command reached through `HAS_COMMAND`, with the edge's attributes.
#[derive(Debug, Clone)]
pub struct CommandEdge<'a> {
    pub command: &'a GraphNode,
    pub deprecated: bool,
    pub description: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct ContentGraph {
    graph: DiGraph<GraphNode, Relationship>,
    by_key: HashMap<(ContentType, String), Vec<NodeIndex>>,
    by_id: HashMap<String, Vec<NodeIndex>>,
    by_name: HashMap<String, Vec<NodeIndex>>,
    by_type: HashMap<ContentType, Vec<NodeIndex>>,
    packs: HashMap<String, NodeIndex>,
    duplicates: BTreeSet<(ContentType, String)>,
}

fn api_module_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(\w+ApiModule)\b").unwrap_or_else(|_| unreachable!()))
}

fn execute_command_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?:execute_command|executeCommand)\(\s*["']([\w\-]+)["']"#).unwrap_or_else(|_| unreachable!())
    })
}

impl ContentGraph {
    /// Builds the graph: every item becomes a node first, then relationships
    /// are attached by id. `reader` supplies code files for import scanning.
    pub fn build(items: Vec<ContentItem>, reader: Option<&FileReader>) -> Self {
        let mut graph = ContentGraph::default();
        let items = items.into_iter().map(Arc::new).collect::<Vec<_>>();

        for item in &items {
            if item.content_type == ContentType::Pack {
                graph.add_pack(item.pack_name(), Some(item.clone()));
            } else {
                graph.add_item(item.clone());
            }
        }
        for item in &items {
            graph.link(item, reader);
        }
        info!(
            nodes = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            duplicates = graph.duplicates.len(),
            "content graph built"
        );
        graph
    }

    fn insert(&mut self, node: GraphNode) -> NodeIndex {
        let key = (node.content_type, node.object_id.clone());
        let id = node.object_id.clone();
        let name = node.name.to_lowercase();
        let content_type = node.content_type;
        let index = self.graph.add_node(node);
        let same_key = self.by_key.entry(key.clone()).or_default();
        same_key.push(index);
        if same_key.len() > 1 && content_type != ContentType::Command {
            debug!(content_type = %key.0, id = %key.1, "duplicate id");
            self.duplicates.insert(key);
        }
        self.by_id.entry(id).or_default().push(index);
        if !name.is_empty() {
            self.by_name.entry(name).or_default().push(index);
        }
        self.by_type.entry(content_type).or_default().push(index);
        index
    }

    fn add_pack(&mut self, name: &str, item: Option<Arc<ContentItem>>) -> NodeIndex {
        if let Some(index) = self.packs.get(name) {
            if item.is_some() && self.graph[*index].item.is_none() {
                self.graph[*index].item = item;
            }
            return *index;
        }
        let node = GraphNode {
            content_type: ContentType::Pack,
            object_id: name.to_string(),
            name: item.as_ref().map(|item| item.name.clone()).unwrap_or_else(|| name.to_string()),
            path: Some(PathBuf::from(PACKS_DIR).join(name).join(PACK_METADATA)),
            pack: name.to_string(),
            marketplaces: item
                .as_ref()
                .map(|item| item.effective_marketplaces())
                .unwrap_or_default(),
            item,
        };
        let index = self.insert(node);
        self.packs.insert(name.to_string(), index);
        index
    }

    fn add_item(&mut self, item: Arc<ContentItem>) -> NodeIndex {
        let node = GraphNode {
            content_type: item.content_type,
            object_id: item.object_id.clone(),
            name: item.name.clone(),
            path: Some(item.path.clone()),
            pack: item.pack_name().to_string(),
            marketplaces: item.effective_marketplaces(),
            item: Some(item),
        };
        self.insert(node)
    }

    fn command_node(&mut self, name: &str, pack: &str, marketplaces: &[MarketplaceVersion]) -> NodeIndex {
        if let Some(index) = self
            .by_key
            .get(&(ContentType::Command, name.to_string()))
            .and_then(|indexes| indexes.first())
        {
            let node = &mut self.graph[*index];
            for marketplace in marketplaces {
                if !node.marketplaces.contains(marketplace) {
                    node.marketplaces.push(*marketplace);
                }
            }
            return *index;
        }
        self.insert(GraphNode {
            content_type: ContentType::Command,
            object_id: name.to_string(),
            name: name.to_string(),
            path: None,
            pack: pack.to_string(),
            marketplaces: marketplaces.to_vec(),
            item: None,
        })
    }

    fn item_index(&self, item: &ContentItem) -> Option<NodeIndex> {
        self.by_key
            .get(&(item.content_type, item.object_id.clone()))?
            .iter()
            .copied()
            .find(|index| self.graph[*index].path.as_deref() == Some(item.path.as_path()))
    }

    fn first_of(&self, types: &[ContentType], id: &str) -> Option<NodeIndex> {
        types.iter().find_map(|content_type| {
            self.by_key
                .get(&(*content_type, id.to_string()))
                .and_then(|indexes| indexes.first().copied())
        })
    }

    fn link(&mut self, item: &ContentItem, reader: Option<&FileReader>) {
        if item.content_type == ContentType::Pack {
            return;
        }
        let Some(source) = self.item_index(item) else {
            return;
        };
        let pack = self.add_pack(item.pack_name(), None);
        self.graph.add_edge(source, pack, Relationship::InPack);

        if let Some(integration) = item.as_integration() {
            let marketplaces = item.effective_marketplaces();
            for command in &integration.commands {
                let target = self.command_node(&command.name, item.pack_name(), &marketplaces);
                self.graph.add_edge(
                    source,
                    target,
                    Relationship::HasCommand {
                        deprecated: command.deprecated,
                        description: command.description.clone(),
                    },
                );
            }
        }

        if matches!(item.content_type, ContentType::Integration | ContentType::Script) {
            let code = code_of(item, reader);
            let imports = api_module_pattern()
                .captures_iter(&code)
                .map(|captures| captures[1].to_string())
                .filter(|module| *module != item.object_id)
                .collect::<BTreeSet<_>>();
            for module in imports {
                if let Some(target) = self.first_of(&[ContentType::Script], &module) {
                    self.graph.add_edge(source, target, Relationship::Imports);
                }
            }
            if item.content_type == ContentType::Script {
                let used = execute_command_pattern()
                    .captures_iter(&code)
                    .map(|captures| captures[1].to_string())
                    .collect::<BTreeSet<_>>();
                for name in used {
                    if let Some(target) = self.first_of(&[ContentType::Command, ContentType::Script], &name) {
                        self.graph.add_edge(source, target, Relationship::Uses);
                    }
                }
            }
        }

        if let Some(playbook) = item.as_playbook() {
            for reference in &playbook.task_references {
                if let Some(target) = self.first_of(&[ContentType::Script, ContentType::Playbook], reference) {
                    self.graph.add_edge(source, target, Relationship::Uses);
                }
            }
            for command in &playbook.command_references {
                if let Some(target) = self.first_of(&[ContentType::Command], command) {
                    self.graph.add_edge(source, target, Relationship::Uses);
                }
            }
        }

        if let Some(action) = item.as_agentix_action() {
            if let Some(underlying) = &action.underlying {
                let types: &[ContentType] = match underlying.item_type.as_str() {
                    "command" => &[ContentType::Command],
                    "script" => &[ContentType::Script],
                    "playbook" => &[ContentType::Playbook],
                    _ => &[],
                };
                let id = match underlying.item_type.as_str() {
                    "command" => underlying.name.clone().unwrap_or_else(|| underlying.id.clone()),
                    _ => underlying.id.clone(),
                };
                if let Some(target) = self.first_of(types, &id) {
                    self.graph.add_edge(source, target, Relationship::DependsOn);
                }
            }
        }

        if let Some(agent) = item.as_agentix_agent() {
            for action in &agent.action_ids {
                if let Some(target) = self.first_of(&[ContentType::AgentixAction], action) {
                    self.graph.add_edge(source, target, Relationship::Uses);
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every node with `object_id`, across content types.
    pub fn search(&self, object_id: &str) -> Vec<&GraphNode> {
        self.nodes(self.by_id.get(object_id))
    }

    pub fn get(&self, content_type: ContentType, object_id: &str) -> Option<&GraphNode> {
        self.by_key
            .get(&(content_type, object_id.to_string()))
            .and_then(|indexes| indexes.first())
            .map(|index| &self.graph[*index])
    }

    /// Case-insensitive name lookup.
    pub fn by_name(&self, name: &str) -> Vec<&GraphNode> {
        self.nodes(self.by_name.get(&name.to_lowercase()))
    }

    pub fn of_type(&self, content_type: ContentType) -> Vec<&GraphNode> {
        self.nodes(self.by_type.get(&content_type))
    }

    pub fn node_for_path(&self, path: &Path) -> Option<&GraphNode> {
        self.graph
            .node_weights()
            .find(|node| node.path.as_deref() == Some(path))
    }

    fn nodes(&self, indexes: Option<&Vec<NodeIndex>>) -> Vec<&GraphNode> {
        indexes
            .map(|indexes| indexes.iter().map(|index| &self.graph[*index]).collect())
            .unwrap_or_default()
    }

    /// Commands of an integration, with the `HAS_COMMAND` edge attributes.
    pub fn commands_of(&self, integration_id: &str) -> Vec<CommandEdge<'_>> {
        let Some(indexes) = self.by_key.get(&(ContentType::Integration, integration_id.to_string())) else {
            return Vec::new();
        };
        let mut commands = indexes
            .iter()
            .flat_map(|index| self.graph.edges_directed(*index, Direction::Outgoing))
            .filter_map(|edge| match edge.weight() {
                Relationship::HasCommand { deprecated, description } => Some(CommandEdge {
                    command: &self.graph[edge.target()],
                    deprecated: *deprecated,
                    description: description.as_deref(),
                }),
                _ => None,
            })
            .collect::<Vec<_>>();
        commands.sort_by(|left, right| left.command.object_id.cmp(&right.command.object_id));
        commands
    }

    /// Integrations declaring `command` (reverse `HAS_COMMAND`).
    pub fn integrations_with_command(&self, command: &str) -> Vec<&GraphNode> {
        self.neighbors(ContentType::Command, command, Direction::Incoming, |relationship| {
            matches!(relationship, Relationship::HasCommand { .. })
        })
    }

    pub fn imports_of(&self, content_type: ContentType, object_id: &str) -> Vec<&GraphNode> {
        self.neighbors(content_type, object_id, Direction::Outgoing, |relationship| {
            *relationship == Relationship::Imports
        })
    }

    pub fn imported_by(&self, module_id: &str) -> Vec<&GraphNode> {
        self.neighbors(ContentType::Script, module_id, Direction::Incoming, |relationship| {
            *relationship == Relationship::Imports
        })
    }

    fn neighbors(
        &self,
        content_type: ContentType,
        object_id: &str,
        direction: Direction,
        keep: impl Fn(&Relationship) -> bool,
    ) -> Vec<&GraphNode> {
        let Some(indexes) = self.by_key.get(&(content_type, object_id.to_string())) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        indexes
            .iter()
            .flat_map(|index| self.graph.edges_directed(*index, direction))
            .filter(|edge| keep(edge.weight()))
            .map(|edge| match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            })
            .filter(|index| seen.insert(*index))
            .map(|index| &self.graph[index])
            .collect()
    }

    /// Items of a pack, following `IN_PACK` edges backwards.
    pub fn items_in_pack(&self, pack: &str) -> Vec<&GraphNode> {
        let Some(index) = self.packs.get(pack) else {
            return Vec::new();
        };
        let mut items = self
            .graph
            .edges_directed(*index, Direction::Incoming)
            .filter(|edge| *edge.weight() == Relationship::InPack)
            .map(|edge| &self.graph[edge.source()])
            .collect::<Vec<_>>();
        items.sort_by(|left, right| left.path.cmp(&right.path));
        items
    }

    /// Everything reachable from an item through dependency edges. Cycles are
    /// walked once.
    pub fn dependencies_of(&self, content_type: ContentType, object_id: &str) -> Vec<&GraphNode> {
        let Some(starts) = self.by_key.get(&(content_type, object_id.to_string())) else {
            return Vec::new();
        };
        let mut visited = starts.iter().copied().collect::<HashSet<_>>();
        let mut queue = starts.iter().copied().collect::<VecDeque<_>>();
        let mut found = Vec::new();
        while let Some(current) = queue.pop_front() {
            for edge in self.graph.edges_directed(current, Direction::Outgoing) {
                if !edge.weight().is_dependency() {
                    continue;
                }
                if visited.insert(edge.target()) {
                    found.push(edge.target());
                    queue.push_back(edge.target());
                }
            }
        }
        found.into_iter().map(|index| &self.graph[index]).collect()
    }

    /// Pairs `(node, duplicate)` sharing a content type and id. With a scope,
    /// only nodes whose path is in scope appear on the left.
    pub fn validate_duplicate_ids(&self, scope: Option<&[PathBuf]>) -> Vec<(&GraphNode, &GraphNode)> {
        let mut pairs = Vec::new();
        for key in &self.duplicates {
            let Some(indexes) = self.by_key.get(key) else {
                continue;
            };
            for left in indexes {
                let node = &self.graph[*left];
                if !in_scope(node, scope) {
                    continue;
                }
                for right in indexes.iter().filter(|right| *right != left) {
                    pairs.push((node, &self.graph[*right]));
                }
            }
        }
        pairs
    }

    /// Scripts in `marketplacev2` whose name contains "alert" and whose
    /// incident spelling names another `marketplacev2` script that would be
    /// renamed onto them. Returns `incident name -> alert script path`.
    pub fn get_duplicate_script_name_included_incident(&self, scope: Option<&[PathBuf]>) -> BTreeMap<String, PathBuf> {
        let candidates = self
            .of_type(ContentType::Script)
            .into_iter()
            .filter(|node| node.name.to_lowercase().contains("alert"))
            .filter(|node| node.in_marketplace(MarketplaceVersion::MarketplaceV2))
            .filter(|node| in_scope(node, scope))
            .filter_map(|node| Some((replace_alert_to_incident(&node.name), node.path.clone()?)))
            .collect::<BTreeMap<_, _>>();

        self.of_type(ContentType::Script)
            .into_iter()
            .filter(|node| node.in_marketplace(MarketplaceVersion::MarketplaceV2))
            .filter(|node| !node.skips(SKIP_INCIDENT_TO_ALERT))
            .filter_map(|node| {
                let alert_path = candidates.get(&node.name)?;
                Some((node.name.clone(), alert_path.clone()))
            })
            .collect()
    }
}

fn in_scope(node: &GraphNode, scope: Option<&[PathBuf]>) -> bool {
    match scope {
        None => true,
        Some(paths) => node.path.as_ref().is_some_and(|path| paths.contains(path)),
    }
}

/// Inline script body plus the companion code file, when there is one.
fn code_of(item: &ContentItem, reader: Option<&FileReader>) -> String {
    let inline = match item.content_type {
        ContentType::Integration => crate::model::value_str(&item.data, &["script", "script"]),
        _ => crate::model::value_str(&item.data, &["script"]),
    }
    .unwrap_or_default();
    let companion = item
        .related_files
        .code
        .as_ref()
        .zip(reader)
        .and_then(|(path, reader)| reader.read_from_local_path(path).ok())
        .and_then(|loaded| loaded.content.as_text().map(str::to_string))
        .unwrap_or_default();
    format!("{inline}\n{companion}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackRef;
    use crate::parsers::build_item;
    use serde_json::json;

    fn pack(name: &str, marketplaces: Vec<MarketplaceVersion>) -> Arc<PackRef> {
        Arc::new(PackRef {
            name: name.to_string(),
            path: PathBuf::from(format!("Packs/{name}")),
            marketplaces,
            ..PackRef::default()
        })
    }

    fn script(pack_name: &str, name: &str, extra: serde_json::Value) -> ContentItem {
        let mut data = json!({"commonfields": {"id": name}, "name": name, "type": "python"});
        if let (Some(target), Some(source)) = (data.as_object_mut(), extra.as_object()) {
            target.extend(source.clone());
        }
        build_item(
            ContentType::Script,
            PathBuf::from(format!("Packs/{pack_name}/Scripts/{name}/{name}.yml")),
            pack(pack_name, Vec::new()),
            data,
        )
    }

    fn integration(name: &str, commands: serde_json::Value, code: &str) -> ContentItem {
        build_item(
            ContentType::Integration,
            PathBuf::from(format!("Packs/{name}/Integrations/{name}/{name}.yml")),
            pack(name, Vec::new()),
            json!({
                "commonfields": {"id": name},
                "name": name,
                "display": name,
                "category": "Utilities",
                "script": {"type": "python", "script": code, "commands": commands}
            }),
        )
    }

    #[test]
    fn duplicate_ids_pair_both_ways_and_respect_scope() {
        let first = script("A", "Same", json!({}));
        let second = script("B", "Same", json!({}));
        let first_path = first.path.clone();
        let graph = ContentGraph::build(vec![first, second, script("A", "Other", json!({}))], None);
        assert_eq!(graph.validate_duplicate_ids(None).len(), 2);
        let scoped = graph.validate_duplicate_ids(Some(&[first_path.clone()]));
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].0.path.as_ref(), Some(&first_path));
        assert_eq!(scoped[0].1.pack, "B");
    }

    #[test]
    fn alert_scripts_colliding_with_incident_scripts() {
        let graph = ContentGraph::build(
            vec![script("A", "getIncident", json!({})), script("A", "getAlert", json!({}))],
            None,
        );
        let found = graph.get_duplicate_script_name_included_incident(None);
        assert_eq!(
            found.get("getIncident"),
            Some(&PathBuf::from("Packs/A/Scripts/getAlert/getAlert.yml"))
        );

        let skipped = ContentGraph::build(
            vec![
                script("A", "getIncident", json!({"skipprepare": [SKIP_INCIDENT_TO_ALERT]})),
                script("A", "getAlert", json!({})),
            ],
            None,
        );
        assert!(skipped.get_duplicate_script_name_included_incident(None).is_empty());

        let alone = ContentGraph::build(vec![script("A", "getIncident", json!({}))], None);
        assert!(alone.get_duplicate_script_name_included_incident(None).is_empty());
    }

    #[test]
    fn relationships_are_walkable() {
        let module = script("Base", "HTTPApiModule", json!({}));
        let tool = integration(
            "Tool",
            json!([{"name": "tool-run", "deprecated": true, "description": "Runs."}]),
            "from HTTPApiModule import *",
        );
        let caller = script("Tool", "Caller", json!({"script": "demisto.executeCommand('tool-run', {})"}));
        let graph = ContentGraph::build(vec![module, tool, caller], None);

        let commands = graph.commands_of("Tool");
        assert_eq!(commands.len(), 1);
        assert!(commands[0].deprecated);
        assert_eq!(commands[0].description, Some("Runs."));
        assert_eq!(graph.integrations_with_command("tool-run")[0].object_id, "Tool");
        assert_eq!(graph.imported_by("HTTPApiModule")[0].object_id, "Tool");

        let dependencies = graph
            .dependencies_of(ContentType::Script, "Caller")
            .iter()
            .map(|node| node.object_id.clone())
            .collect::<Vec<_>>();
        assert_eq!(dependencies, vec!["tool-run"]);

        let in_pack = graph
            .items_in_pack("Tool")
            .iter()
            .map(|node| node.object_id.clone())
            .collect::<Vec<_>>();
        assert_eq!(in_pack, vec!["Tool", "Caller"]);
        // the integration and its pack share the id
        assert_eq!(graph.search("Tool").len(), 2);
        assert!(graph
            .get(ContentType::Pack, "Tool")
            .is_some_and(|node| node.item.is_none()));
    }
}
