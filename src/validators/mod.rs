//! The rule catalogue, one module per error-code family.

mod agentix;
mod backwards;
mod basic;
mod docker;
mod graph;
mod integration;
mod release_notes;
mod script;
mod structure;
#[cfg(test)]
pub(crate) mod testing;

use crate::validate::Validator;
use std::sync::Arc;

/// Every built-in validator, in registration order.
pub fn all() -> Vec<Arc<dyn Validator>> {
    vec![
        Arc::new(basic::CompliantPoliciesOfCommands),
        Arc::new(basic::FolderNameHasSeparators),
        Arc::new(basic::CompliantPoliciesOfScripts),
        Arc::new(basic::NameHasTrailingSpaces),
        Arc::new(basic::ForbiddenDeletedFiles),
        Arc::new(basic::NameStartsWithDigit),
        Arc::new(basic::ArgumentsHaveCompliantPolicy),
        Arc::new(basic::FromVersionAboveToVersion),
        Arc::new(backwards::SubtypeChanged),
        Arc::new(backwards::IdChanged),
        Arc::new(backwards::RemovedIntegrationParameters),
        Arc::new(integration::ConnectionParamsFormat),
        Arc::new(integration::RequiredBooleanParams),
        Arc::new(integration::FetchRequiredParams),
        Arc::new(integration::UnhiddenableParams),
        Arc::new(integration::MaxFetchHasDefault),
        Arc::new(integration::HasRunnableCommand),
        Arc::new(integration::HiddenValueIsValid),
        Arc::new(integration::CheckboxDefaultValue),
        Arc::new(integration::McpPlatformOnly),
        Arc::new(integration::FetchEventsMarketplace),
        Arc::new(structure::SchemaErrors),
        Arc::new(structure::SectionOrder),
        Arc::new(structure::QuickActionsSupported),
        Arc::new(structure::SupportedModulesSubsetOfPack),
        Arc::new(graph::DuplicateIds),
        Arc::new(graph::DuplicateScriptNameIncidentAlert),
        Arc::new(graph::AgentixActionUnderlyingItem),
        Arc::new(script::DuplicateScriptNameIncidentAlert),
        Arc::new(docker::LatestTagForbidden),
        Arc::new(docker::NotLatestNumericTag),
        Arc::new(agentix::LlmItemsPlatformOnly),
        Arc::new(release_notes::MissingReleaseNotes),
    ]
}

/// `['a', 'b']`, the way lists are printed in rule messages.
pub(crate) fn quoted_list<S: AsRef<str>>(values: &[S]) -> String {
    let inner = values
        .iter()
        .map(|value| format!("'{}'", value.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{inner}]")
}
