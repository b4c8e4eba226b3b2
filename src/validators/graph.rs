use super::quoted_list;
use crate::graph::{ContentGraph, GraphNode};
use crate::model::{AgentixAction, ContentItem, ContentType, UnderlyingItem};
use crate::validate::{ValidationContext, ValidationResult, Validator, ValidatorInfo};
use std::path::PathBuf;

/// Graph queries only report nodes for items the rule accepted in this run.
fn accepted_paths(items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<PathBuf> {
    items
        .iter()
        .filter(|item| ctx.in_scope(&item.path))
        .map(|item| item.path.clone())
        .collect()
}

pub struct DuplicateIds;

const GR105: ValidatorInfo = ValidatorInfo {
    error_code: "GR105",
    description: "Validate that content item ids are unique.",
    rationale: "Duplicate ids make the platform overwrite one item with another on upload.",
    error_message: "The {0} id '{1}' is also used by {2}. Content item ids must be unique.",
    related_field: "id",
    uses_graph: true,
    run_on_deprecated: true,
    ..ValidatorInfo::DEFAULT
};

impl Validator for DuplicateIds {
    fn info(&self) -> &'static ValidatorInfo {
        &GR105
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        let Some(graph) = ctx.graph() else {
            return Vec::new();
        };
        let scope = accepted_paths(items, ctx);
        graph
            .validate_duplicate_ids(Some(scope.as_slice()))
            .into_iter()
            .filter_map(|(node, duplicate)| {
                let path = node.path.as_ref()?;
                let other = duplicate
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| duplicate.pack.clone());
                Some(ValidationResult::violation(
                    &GR105,
                    path,
                    format!(
                        "The {} id '{}' is also used by {other}. Content item ids must be unique.",
                        node.content_type, node.object_id
                    ),
                ))
            })
            .collect()
    }
}

/// The message shared by the graph-wide and the script-scoped duplicate name rules.
pub(crate) fn duplicate_name_message(alert_name: &str, incident_name: &str) -> String {
    format!(
        "Cannot create a script with the name {alert_name}, because a script with the name {incident_name} already exists.\n(it will not be possible to create a new script whose name includes the word Alert/Alerts because of the conversion of Incident to Alert)"
    )
}

pub struct DuplicateScriptNameIncidentAlert;

const GR106: ValidatorInfo = ValidatorInfo {
    error_code: "GR106",
    description: "Validate that there are no scripts whose names collide once Incident is converted to Alert.",
    rationale: "Script names are rewritten from Incident to Alert on upload to marketplacev2.",
    error_message: "Cannot create a script with the name {0}, because a script with the name {1} already exists.\n(it will not be possible to create a new script whose name includes the word Alert/Alerts because of the conversion of Incident to Alert)",
    related_field: "name",
    content_types: &[ContentType::Script],
    uses_graph: true,
    ..ValidatorInfo::DEFAULT
};

impl Validator for DuplicateScriptNameIncidentAlert {
    fn info(&self) -> &'static ValidatorInfo {
        &GR106
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        let Some(graph) = ctx.graph() else {
            return Vec::new();
        };
        let scope = accepted_paths(items, ctx);
        graph
            .get_duplicate_script_name_included_incident(Some(scope.as_slice()))
            .into_iter()
            .map(|(incident_name, alert_path)| {
                let alert_name = graph
                    .node_for_path(&alert_path)
                    .map(|node| node.name.clone())
                    .unwrap_or_default();
                ValidationResult::violation(&GR106, &alert_path, duplicate_name_message(&alert_name, &incident_name))
            })
            .collect()
    }
}

pub struct AgentixActionUnderlyingItem;

const GR110: ValidatorInfo = ValidatorInfo {
    error_code: "GR110",
    description: "Validate that an AgentixAction wraps an existing content item and aliases it correctly.",
    rationale: "An action pointing at a missing command, script or playbook cannot run.",
    error_message: "The underlying {0} '{1}' of the action {2} was not found in the content graph.",
    related_field: "underlyingcontentitem, args, outputs",
    content_types: &[ContentType::AgentixAction],
    uses_graph: true,
    ..ValidatorInfo::DEFAULT
};

/// Argument names and output context paths an action may alias.
struct Underlying {
    arguments: Vec<String>,
    outputs: Vec<String>,
}

impl AgentixActionUnderlyingItem {
    fn underlying(graph: &ContentGraph, target: &UnderlyingItem) -> Option<Option<Underlying>> {
        let item_of = |node: &GraphNode| node.item.clone();
        match target.item_type.as_str() {
            "command" => {
                let integration_id = target.command.as_deref().unwrap_or_default();
                if !graph
                    .commands_of(integration_id)
                    .iter()
                    .any(|edge| edge.command.object_id == target.id)
                {
                    return None;
                }
                let item = graph.get(ContentType::Integration, integration_id).and_then(item_of);
                let command = item
                    .as_deref()
                    .and_then(ContentItem::as_integration)
                    .and_then(|integration| integration.command(&target.id));
                Some(command.map(|command| Underlying {
                    arguments: command.args.iter().map(|arg| arg.name.clone()).collect(),
                    outputs: command.outputs.iter().filter_map(|output| output.context_path.clone()).collect(),
                }))
            }
            "script" => {
                let item = graph.get(ContentType::Script, &target.id)?.item.clone();
                Some(item.as_deref().and_then(ContentItem::as_script).map(|script| Underlying {
                    arguments: script.args.iter().map(|arg| arg.name.clone()).collect(),
                    outputs: script.outputs.iter().filter_map(|output| output.context_path.clone()).collect(),
                }))
            }
            "playbook" => {
                let item = graph.get(ContentType::Playbook, &target.id)?.item.clone();
                Some(item.as_deref().and_then(ContentItem::as_playbook).map(|playbook| Underlying {
                    arguments: playbook.inputs.iter().map(|input| input.key.clone()).collect(),
                    outputs: playbook.outputs.iter().map(|output| output.context_path.clone()).collect(),
                }))
            }
            _ => None,
        }
    }

    fn problems(graph: &ContentGraph, name: &str, action: &AgentixAction) -> Vec<String> {
        let Some(target) = &action.underlying else {
            return vec![format!("The action {name} does not declare an underlying content item.")];
        };
        let Some(underlying) = Self::underlying(graph, target) else {
            return vec![format!(
                "The underlying {} '{}' of the action {name} was not found in the content graph.",
                target.item_type, target.id
            )];
        };
        let Some(underlying) = underlying else {
            return Vec::new();
        };

        let mut problems = Vec::new();
        let unknown_args = action
            .args
            .iter()
            .map(|arg| arg.underlyingargname.as_deref().unwrap_or(&arg.name))
            .filter(|alias| !underlying.arguments.iter().any(|name| name == alias))
            .collect::<Vec<_>>();
        if !unknown_args.is_empty() {
            problems.push(format!(
                "The action {name} arguments {} do not match any argument of its underlying {} '{}'.",
                quoted_list(&unknown_args),
                target.item_type,
                target.id
            ));
        }
        let unknown_outputs = action
            .outputs
            .iter()
            .filter_map(|output| output.underlyingoutputcontextpath.as_deref())
            .filter(|path| !underlying.outputs.iter().any(|known| known == path))
            .collect::<Vec<_>>();
        if !unknown_outputs.is_empty() {
            problems.push(format!(
                "The action {name} outputs {} do not match any output context path of its underlying {} '{}'.",
                quoted_list(&unknown_outputs),
                target.item_type,
                target.id
            ));
        }
        problems
    }
}

impl Validator for AgentixActionUnderlyingItem {
    fn info(&self) -> &'static ValidatorInfo {
        &GR110
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        let Some(graph) = ctx.graph() else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let problems = Self::problems(graph, &item.name, item.as_agentix_action()?);
                (!problems.is_empty()).then(|| self.result(item, problems.join("\n")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MarketplaceVersion;
    use crate::validators::testing::{item, item_in, messages, pack, run, Harness};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn script(name: &str, extra: &str) -> ContentItem {
        item_in(
            pack("Alerts", &[MarketplaceVersion::MarketplaceV2]),
            ContentType::Script,
            &format!("Packs/Alerts/Scripts/{name}/{name}.yml"),
            &format!("commonfields:\n  id: {name}\nname: {name}\ntype: python\n{extra}"),
        )
    }

    #[test]
    fn duplicate_ids_are_reported_on_each_side() {
        let harness = Harness::new();
        let first = item(ContentType::Playbook, "Packs/HelloWorld/Playbooks/one.yml", "id: same\nname: one\n");
        let second = item(ContentType::Playbook, "Packs/HelloWorld/Playbooks/two.yml", "id: same\nname: two\n");
        let graph = Arc::new(ContentGraph::build(vec![first.clone(), second.clone()], None));
        let ctx = harness.ctx().with_graph(graph);
        let results = run(&DuplicateIds, &[first.clone(), second], &ctx);
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|result| {
            result.path == PathBuf::from("Packs/HelloWorld/Playbooks/one.yml")
                && result.message
                    == "The Playbook id 'same' is also used by Packs/HelloWorld/Playbooks/two.yml. Content item ids must be unique."
        }));

        let only_first = run(&DuplicateIds, &[first], &ctx);
        assert_eq!(only_first.len(), 1);
        assert_eq!(only_first[0].path, PathBuf::from("Packs/HelloWorld/Playbooks/one.yml"));
    }

    #[test]
    fn incident_and_alert_script_names_collide() {
        let harness = Harness::new();
        let items = vec![script("getIncident", ""), script("getAlert", "")];
        let graph = Arc::new(ContentGraph::build(items.clone(), None));
        let ctx = harness.ctx().with_graph(graph);
        let results = run(&DuplicateScriptNameIncidentAlert, &items, &ctx);
        assert_eq!(messages(&results), vec![duplicate_name_message("getAlert", "getIncident")]);
        assert_eq!(results[0].path, PathBuf::from("Packs/Alerts/Scripts/getAlert/getAlert.yml"));
        assert!(run(&DuplicateScriptNameIncidentAlert, &items[..1], &ctx).is_empty());

        let alone = vec![script("getIncident", "")];
        let graph = Arc::new(ContentGraph::build(alone.clone(), None));
        assert!(run(&DuplicateScriptNameIncidentAlert, &alone, &harness.ctx().with_graph(graph)).is_empty());
    }

    #[test]
    fn deprecated_alert_scripts_are_not_reported() {
        let harness = Harness::new();
        let items = vec![script("getIncident", ""), script("getAlert", "deprecated: true\n")];
        let graph = Arc::new(ContentGraph::build(items.clone(), None));
        assert!(run(&DuplicateScriptNameIncidentAlert, &items, &harness.ctx().with_graph(graph)).is_empty());
    }

    fn action(underlying: &str, args: &str, outputs: &str) -> ContentItem {
        item(
            ContentType::AgentixAction,
            "Packs/HelloWorld/AgentixActions/say.yml",
            &format!("id: say\nname: say\nunderlyingcontentitem:\n{underlying}args:\n{args}outputs:\n{outputs}"),
        )
    }

    #[test]
    fn actions_must_wrap_existing_items() {
        let harness = Harness::new();
        let integration = item(
            ContentType::Integration,
            "Packs/HelloWorld/Integrations/HelloWorld/HelloWorld.yml",
            "commonfields:\n  id: HelloWorld\nname: HelloWorld\nscript:\n  commands:\n  - name: helloworld-say-hello\n    arguments:\n    - name: name\n    outputs:\n    - contextPath: HelloWorld.hello\n",
        );
        let valid = action(
            "  id: helloworld-say-hello\n  type: command\n  command: HelloWorld\n",
            "- name: who\n  underlyingargname: name\n",
            "- name: greeting\n  underlyingoutputcontextpath: HelloWorld.hello\n",
        );
        let broken = action(
            "  id: helloworld-say-hello\n  type: command\n  command: HelloWorld\n",
            "- name: whom\n",
            "- name: greeting\n  underlyingoutputcontextpath: HelloWorld.bye\n",
        );
        let missing = action("  id: Missing\n  type: script\n", "  []\n", "  []\n");
        let graph = Arc::new(ContentGraph::build(vec![integration, valid.clone()], None));
        let ctx = harness.ctx().with_graph(graph);

        assert!(run(&AgentixActionUnderlyingItem, &[valid], &ctx).is_empty());
        assert_eq!(
            messages(&run(&AgentixActionUnderlyingItem, &[broken], &ctx)),
            vec!["The action say arguments ['whom'] do not match any argument of its underlying command 'helloworld-say-hello'.\nThe action say outputs ['HelloWorld.bye'] do not match any output context path of its underlying command 'helloworld-say-hello'."]
        );
        assert_eq!(
            messages(&run(&AgentixActionUnderlyingItem, &[missing], &ctx)),
            vec!["The underlying script 'Missing' of the action say was not found in the content graph."]
        );
    }
}
