use crate::docker::{is_numeric_tag, split_image, DockerHubClient};
use crate::model::{data_set, ContentItem, ContentType};
use crate::validate::{FixResult, ValidationContext, ValidationResult, Validator, ValidatorInfo};
use crate::{ContentError, ContentResult};
use serde_json::Value;
use tracing::warn;

const CODE_ITEMS: &[ContentType] = &[ContentType::Integration, ContentType::Script];

/// `(repository, tag)` of a non-javascript item's docker image.
fn image_of(item: &ContentItem) -> Option<(&str, &str)> {
    if item.is_javascript() {
        return None;
    }
    let (repository, tag) = split_image(item.docker_image()?);
    Some((repository, tag?))
}

fn docker<'a>(ctx: &'a ValidationContext<'_>) -> ContentResult<&'a dyn DockerHubClient> {
    ctx.docker()
        .ok_or_else(|| ContentError::Docker("docker checks are disabled".to_string()))
}

fn set_image(item: &mut ContentItem, image: &str) {
    let path = item.docker_image_path();
    data_set(&mut item.data, path, Value::String(image.to_string()));
}

pub struct LatestTagForbidden;

const DO100: ValidatorInfo = ValidatorInfo {
    error_code: "DO100",
    description: "Validate that the docker image does not use the latest tag.",
    rationale: "The latest tag moves under the item, so runs are not reproducible.",
    error_message: "\"latest\" tag is not allowed,\nPlease create or update to an updated versioned image\nYou can check for the most updated version of {0} here: https://hub.docker.com/r/{1}/tags",
    fix_message: Some("docker image {0} has been updated to {1}"),
    related_field: "dockerimage",
    content_types: CODE_ITEMS,
    is_auto_fixable: true,
    ..ValidatorInfo::DEFAULT
};

impl Validator for LatestTagForbidden {
    fn info(&self) -> &'static ValidatorInfo {
        &DO100
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], _ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        items
            .iter()
            .filter_map(|item| {
                let (repository, tag) = image_of(item)?;
                (tag == "latest").then(|| {
                    self.result(
                        item,
                        format!(
                            "\"latest\" tag is not allowed,\nPlease create or update to an updated versioned image\nYou can check for the most updated version of {repository}:{tag} here: https://hub.docker.com/r/{repository}/tags"
                        ),
                    )
                })
            })
            .collect()
    }

    fn fix(&self, item: &mut ContentItem, ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        let repository = match image_of(item) {
            Some((repository, "latest")) => repository.to_string(),
            _ => return Err(ContentError::Docker(format!("{} has no latest tag", item.path.display()))),
        };
        let latest = docker(ctx)?.latest_tag(&repository)?;
        let image = format!("{repository}:{latest}");
        set_image(item, &image);
        Ok(self.fixed(item, format!("docker image {repository} has been updated to {image}")))
    }
}

pub struct NotLatestNumericTag;

const DO106: ValidatorInfo = ValidatorInfo {
    error_code: "DO106",
    description: "Validate that the docker image tag is the latest numeric tag.",
    rationale: "Outdated images miss security and dependency updates.",
    error_message: "docker image {0}'s tag {1} is not the latest tag, the latest tag is {2}",
    fix_message: Some("docker image {0} has been updated to {1}"),
    related_field: "dockerimage",
    content_types: CODE_ITEMS,
    is_auto_fixable: true,
    ..ValidatorInfo::DEFAULT
};

impl NotLatestNumericTag {
    /// `(repository, latest tag)` when the item's numeric tag is behind.
    fn outdated(item: &ContentItem, docker: &dyn DockerHubClient) -> Option<(String, String, String)> {
        let (repository, tag) = image_of(item)?;
        if !is_numeric_tag(tag) {
            return None;
        }
        match docker.latest_tag(repository) {
            Ok(latest) if latest != tag => Some((repository.to_string(), tag.to_string(), latest)),
            Ok(_) => None,
            Err(error) => {
                warn!(image = repository, %error, "could not fetch the latest docker tag");
                None
            }
        }
    }
}

impl Validator for NotLatestNumericTag {
    fn info(&self) -> &'static ValidatorInfo {
        &DO106
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        let Some(docker) = ctx.docker() else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let (repository, tag, latest) = Self::outdated(item, docker)?;
                Some(self.result(
                    item,
                    format!("docker image {repository}'s tag {tag} is not the latest tag, the latest tag is {latest}"),
                ))
            })
            .collect()
    }

    fn fix(&self, item: &mut ContentItem, ctx: &ValidationContext<'_>) -> ContentResult<FixResult> {
        let (repository, _, latest) = Self::outdated(item, docker(ctx)?)
            .ok_or_else(|| ContentError::Docker(format!("{} already uses the latest tag", item.path.display())))?;
        let image = format!("{repository}:{latest}");
        set_image(item, &image);
        Ok(self.fixed(item, format!("docker image {repository} has been updated to {image}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::StaticDockerHub;
    use crate::model::value_str;
    use crate::validators::testing::{integration, messages, run, script, Harness};
    use std::sync::Arc;

    fn hub() -> Arc<dyn DockerHubClient> {
        Arc::new(StaticDockerHub::new().with_tags("demisto/python3", &["3.10.13.1", "3.11.1.5", "latest"]))
    }

    fn with_image(image: &str, kind: &str) -> ContentItem {
        integration(&format!(
            "commonfields:\n  id: A\nname: A\nscript:\n  type: {kind}\n  dockerimage: {image}\n"
        ))
    }

    #[test]
    fn latest_tag_is_rejected_and_replaced() {
        let harness = Harness::new();
        let ctx = harness.ctx().with_docker(hub());
        let mut item = with_image("demisto/python3:latest", "python");
        let javascript = with_image("demisto/python3:latest", "javascript");
        let results = run(&LatestTagForbidden, &[item.clone(), javascript], &ctx);
        assert_eq!(
            messages(&results),
            vec!["\"latest\" tag is not allowed,\nPlease create or update to an updated versioned image\nYou can check for the most updated version of demisto/python3:latest here: https://hub.docker.com/r/demisto/python3/tags"]
        );

        let fixed = LatestTagForbidden.fix(&mut item, &ctx).expect("fix");
        assert_eq!(fixed.message, "docker image demisto/python3 has been updated to demisto/python3:3.11.1.5");
        assert_eq!(
            value_str(&item.data, &["script", "dockerimage"]).as_deref(),
            Some("demisto/python3:3.11.1.5")
        );
    }

    #[test]
    fn latest_fix_needs_docker_access() {
        let harness = Harness::new();
        let mut item = with_image("demisto/python3:latest", "python");
        assert!(LatestTagForbidden.fix(&mut item, &harness.ctx()).is_err());
    }

    #[test]
    fn outdated_numeric_tags_are_reported() {
        let harness = Harness::new();
        let ctx = harness.ctx().with_docker(hub());
        let scripted = script("commonfields:\n  id: S\nname: S\ntype: python\ndockerimage: demisto/python3:3.10.13.1\n");
        let items = vec![
            with_image("demisto/python3:3.11.1.5", "python"),
            scripted.clone(),
            with_image("demisto/unknown:1.0.0", "python"),
        ];
        let results = run(&NotLatestNumericTag, &items, &ctx);
        assert_eq!(
            messages(&results),
            vec!["docker image demisto/python3's tag 3.10.13.1 is not the latest tag, the latest tag is 3.11.1.5"]
        );

        let mut scripted = scripted;
        let fixed = NotLatestNumericTag.fix(&mut scripted, &ctx).expect("fix");
        assert_eq!(fixed.message, "docker image demisto/python3 has been updated to demisto/python3:3.11.1.5");
        assert_eq!(value_str(&scripted.data, &["dockerimage"]).as_deref(), Some("demisto/python3:3.11.1.5"));

        assert!(run(&NotLatestNumericTag, &items, &harness.ctx()).is_empty());
    }
}
