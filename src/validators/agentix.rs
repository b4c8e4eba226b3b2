use crate::constants::MarketplaceVersion;
use crate::model::{ContentItem, ContentType};
use crate::validate::{ValidationContext, ValidationResult, Validator, ValidatorInfo};

pub struct LlmItemsPlatformOnly;

const AG101: ValidatorInfo = ValidatorInfo {
    error_code: "AG101",
    description: "Validate that Agentix items and LLM scripts are uploaded to the platform marketplace only.",
    rationale: "Agentix items and LLM scripts are only supported on the platform.",
    error_message: "The items AgentixAgent, AgentixAction and Script with isllm=true should be uploaded to platform only. Please specify only platform under marketplaces.",
    related_field: "marketplaces",
    content_types: &[ContentType::AgentixAgent, ContentType::AgentixAction, ContentType::Script],
    ..ValidatorInfo::DEFAULT
};

impl Validator for LlmItemsPlatformOnly {
    fn info(&self) -> &'static ValidatorInfo {
        &AG101
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter(|item| match item.content_type {
                ContentType::Script => item.as_script().is_some_and(|script| script.is_llm),
                _ => true,
            })
            .filter(|item| item.effective_marketplaces() != [MarketplaceVersion::Platform])
            .map(|item| self.result(item, AG101.error_message))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::testing::{item, item_in, messages, pack, run, script, Harness};

    #[test]
    fn agentix_items_ship_to_platform_only() {
        let harness = Harness::new();
        let items = vec![
            item(ContentType::AgentixAgent, "Packs/HelloWorld/AgentixAgents/agent.yml", "id: agent\nname: agent\n"),
            item(
                ContentType::AgentixAction,
                "Packs/HelloWorld/AgentixActions/action.yml",
                "id: action\nname: action\nmarketplaces: [platform]\n",
            ),
            script("commonfields:\n  id: S\nname: S\ntype: python\nisllm: true\nmarketplaces: [xsoar, platform]\n"),
            script("commonfields:\n  id: T\nname: T\ntype: python\n"),
        ];
        let results = run(&LlmItemsPlatformOnly, &items, &harness.ctx());
        assert_eq!(messages(&results), vec![AG101.error_message, AG101.error_message]);
        assert_eq!(results[0].path, items[0].path);
        assert_eq!(results[1].path, items[2].path);
    }

    #[test]
    fn platform_packs_satisfy_the_rule() {
        let harness = Harness::new();
        let agent = item_in(
            pack("Agents", &[MarketplaceVersion::Platform]),
            ContentType::AgentixAgent,
            "Packs/Agents/AgentixAgents/agent.yml",
            "id: agent\nname: agent\n",
        );
        assert!(run(&LlmItemsPlatformOnly, &[agent], &harness.ctx()).is_empty());
    }
}
