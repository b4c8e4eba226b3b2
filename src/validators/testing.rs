//! Builders shared by the rule tests.

use crate::config::ValidateConfig;
use crate::constants::{ExecutionMode, GitStatus, MarketplaceVersion};
use crate::files::FileReader;
use crate::model::{ContentItem, ContentType, PackRef};
use crate::parsers::build_item;
use crate::validate::{ValidationContext, ValidationResult, Validator};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) fn pack(name: &str, marketplaces: &[MarketplaceVersion]) -> Arc<PackRef> {
    Arc::new(PackRef {
        name: name.to_string(),
        path: PathBuf::from("Packs").join(name),
        marketplaces: marketplaces.to_vec(),
        current_version: Some("1.0.0".to_string()),
        ..PackRef::default()
    })
}

pub(crate) fn yaml(source: &str) -> Value {
    serde_yaml::from_str(source).expect("test yaml")
}

pub(crate) fn item_in(pack: Arc<PackRef>, content_type: ContentType, path: &str, source: &str) -> ContentItem {
    build_item(content_type, PathBuf::from(path), pack, yaml(source))
}

pub(crate) fn item(content_type: ContentType, path: &str, source: &str) -> ContentItem {
    item_in(pack("HelloWorld", &[]), content_type, path, source)
}

pub(crate) fn integration(source: &str) -> ContentItem {
    item(
        ContentType::Integration,
        "Packs/HelloWorld/Integrations/HelloWorld/HelloWorld.yml",
        source,
    )
}

pub(crate) fn script(source: &str) -> ContentItem {
    item(ContentType::Script, "Packs/HelloWorld/Scripts/Hello/Hello.yml", source)
}

/// Marks `item` modified against `base`.
pub(crate) fn modified(mut item: ContentItem, base: &str) -> ContentItem {
    let old = build_item(item.content_type, item.path.clone(), item.pack.clone(), yaml(base));
    item.git_status = Some(GitStatus::Modified);
    item.set_old_base(Some(old));
    item
}

pub(crate) struct Harness {
    pub config: ValidateConfig,
    pub reader: FileReader,
    pub mode: ExecutionMode,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_root(".")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config: ValidateConfig::for_root(root.clone()),
            reader: FileReader::local(root),
            mode: ExecutionMode::AllFiles,
        }
    }

    pub fn ctx(&self) -> ValidationContext<'_> {
        ValidationContext::new(&self.config, &self.reader, self.mode)
    }
}

/// Runs `validator` over the items it accepts, like the runner does.
pub(crate) fn run(validator: &dyn Validator, items: &[ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
    let accepted = items
        .iter()
        .filter(|item| validator.info().accepts(item))
        .collect::<Vec<_>>();
    validator.obtain_invalid_content_items(&accepted, ctx)
}

pub(crate) fn messages(results: &[ValidationResult]) -> Vec<&str> {
    results.iter().map(|result| result.message.as_str()).collect()
}
