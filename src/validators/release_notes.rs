use crate::constants::{ExecutionMode, GitStatus, PACKS_DIR, PACK_METADATA, RELEASE_NOTES_DIR};
use crate::model::{version_key, ContentItem, ContentType};
use crate::validate::{ValidationContext, ValidationResult, Validator, ValidatorInfo};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const FIRST_VERSION: &str = "1.0.0";

pub struct MissingReleaseNotes;

const RN106: ValidatorInfo = ValidatorInfo {
    error_code: "RN106",
    description: "Validate that a changed pack carries release notes for its current version.",
    rationale: "Release notes tell users what changed in every pack version.",
    error_message: "Release notes were not found. Please run `demisto-sdk update-release-notes -i Packs/{0} -u (major|minor|revision|documentation)` to generate release notes according to the new standard. You can refer to the documentation found here: https://xsoar.pan.dev/docs/integrations/changelog for more information.",
    related_field: "",
    expected_git_statuses: &[GitStatus::Added, GitStatus::Modified, GitStatus::Renamed],
    expected_execution_mode: &[ExecutionMode::UseGit],
    run_on_deprecated: true,
    ..ValidatorInfo::DEFAULT
};

/// `Packs/<pack>/ReleaseNotes/1_2_3.md` for version `1.2.3`.
pub(crate) fn release_note_path(pack: &str, version: &str) -> PathBuf {
    Path::new(PACKS_DIR)
        .join(pack)
        .join(RELEASE_NOTES_DIR)
        .join(format!("{}.md", version.replace('.', "_")))
}

impl Validator for MissingReleaseNotes {
    fn info(&self) -> &'static ValidatorInfo {
        &RN106
    }

    fn obtain_invalid_content_items(&self, items: &[&ContentItem], ctx: &ValidationContext<'_>) -> Vec<ValidationResult> {
        let mut packs = BTreeMap::new();
        for item in items.iter().filter(|item| item.content_type != ContentType::TestPlaybook) {
            let Some(version) = item.pack.current_version.as_deref() else {
                continue;
            };
            if version_key(version) <= version_key(FIRST_VERSION) {
                continue;
            }
            packs.entry(item.pack_name().to_string()).or_insert_with(|| version.to_string());
        }

        packs
            .into_iter()
            .filter(|(pack, version)| !ctx.reader.resolve(&release_note_path(pack, version)).is_file())
            .map(|(pack, _)| {
                ValidationResult::violation(
                    &RN106,
                    &Path::new(PACKS_DIR).join(&pack).join(PACK_METADATA),
                    format!(
                        "Release notes were not found. Please run `demisto-sdk update-release-notes -i Packs/{pack} -u (major|minor|revision|documentation)` to generate release notes according to the new standard. You can refer to the documentation found here: https://xsoar.pan.dev/docs/integrations/changelog for more information."
                    ),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackRef;
    use crate::validators::testing::{item_in, run, Harness};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn changed(pack: &Arc<PackRef>, content_type: ContentType, path: &str) -> ContentItem {
        let mut item = item_in(pack.clone(), content_type, path, "id: a\nname: a\n");
        item.git_status = Some(GitStatus::Modified);
        item
    }

    fn pack(name: &str, version: &str) -> Arc<PackRef> {
        Arc::new(PackRef {
            name: name.to_string(),
            path: PathBuf::from("Packs").join(name),
            current_version: Some(version.to_string()),
            ..PackRef::default()
        })
    }

    #[test]
    fn one_result_per_pack_without_notes() {
        let temp = TempDir::new().expect("tempdir");
        let notes = temp.path().join("Packs/Documented/ReleaseNotes");
        fs::create_dir_all(&notes).expect("mkdir");
        fs::write(notes.join("1_0_4.md"), "#### Scripts\n").expect("write");

        let mut harness = Harness::with_root(temp.path());
        harness.mode = ExecutionMode::UseGit;
        let missing = pack("Missing", "1.2.0");
        let documented = pack("Documented", "1.0.4");
        let fresh = pack("Fresh", "1.0.0");
        let items = vec![
            changed(&missing, ContentType::Playbook, "Packs/Missing/Playbooks/a.yml"),
            changed(&missing, ContentType::Playbook, "Packs/Missing/Playbooks/b.yml"),
            changed(&documented, ContentType::Playbook, "Packs/Documented/Playbooks/a.yml"),
            changed(&fresh, ContentType::Playbook, "Packs/Fresh/Playbooks/a.yml"),
            changed(&pack("Tests", "2.0.0"), ContentType::TestPlaybook, "Packs/Tests/TestPlaybooks/a.yml"),
        ];
        let results = run(&MissingReleaseNotes, &items, &harness.ctx());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, PathBuf::from("Packs/Missing/pack_metadata.json"));
        assert!(results[0].message.contains("-i Packs/Missing -u"));
    }

    #[test]
    fn notes_are_named_after_the_version() {
        assert_eq!(
            release_note_path("Hello", "1.10.2"),
            PathBuf::from("Packs/Hello/ReleaseNotes/1_10_2.md")
        );
    }
}
