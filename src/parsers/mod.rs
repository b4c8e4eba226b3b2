//! Turns repository paths into content objects.

mod base;
mod items;

pub use base::GitBaseLoader;
pub use items::{build_item, pack_ref};

use crate::constants::{PACKS_DIR, PACK_METADATA, RELEASE_NOTES_DIR};
use crate::files::{normalize_path, FileReader};
use crate::git::ChangedFiles;
use crate::model::{release_note_version, BaseSource, ContentItem, ContentType, ItemDetails, PackRef, RelatedFiles};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

const DESCRIPTOR_EXTENSIONS: [&str; 3] = ["yml", "yaml", "json"];

/// A path the parsers could not turn into a content object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidContentItem {
    pub path: PathBuf,
    pub message: String,
}

/// Where a path belongs: the content type and the descriptor that defines it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Descriptor {
    pub content_type: ContentType,
    pub path: PathBuf,
    pub pack: String,
}

/// Maps any file inside a pack to the descriptor of the item it belongs to.
/// `root` is consulted to find the descriptor of item folders.
pub fn resolve_descriptor(root: &Path, path: &Path) -> Option<Descriptor> {
    let parts = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>();
    let start = parts.iter().position(|part| part == PACKS_DIR)?;
    let parts = &parts[start..];
    let pack = parts.get(1)?.clone();
    let pack_dir = PathBuf::from(PACKS_DIR).join(&pack);
    let rest = &parts[2..];

    let pack_descriptor = || Descriptor {
        content_type: ContentType::Pack,
        path: pack_dir.join(PACK_METADATA),
        pack: pack.clone(),
    };
    match rest {
        [] | [_] => return Some(pack_descriptor()),
        [folder, ..] if folder == RELEASE_NOTES_DIR => return Some(pack_descriptor()),
        _ => {}
    }

    let content_type = ContentType::from_folder(&rest[0])?;
    let folder = pack_dir.join(&rest[0]);
    if rest.len() >= 3 {
        let item_dir = folder.join(&rest[1]);
        let direct_file = (rest.len() == 3).then(|| rest[2].as_str());
        let descriptor = find_folder_descriptor(root, &item_dir, &rest[1], direct_file)?;
        return Some(Descriptor {
            content_type,
            path: descriptor,
            pack,
        });
    }

    let file_name = &rest[1];
    let candidate = folder.join(file_name);
    if has_descriptor_extension(&candidate) {
        return Some(Descriptor {
            content_type,
            path: candidate,
            pack,
        });
    }
    companion_descriptor(root, &folder, file_name).map(|path| Descriptor {
        content_type,
        path,
        pack,
    })
}

fn has_descriptor_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| DESCRIPTOR_EXTENSIONS.contains(&extension))
}

/// `Integrations/Foo/<anything>` belongs to `Integrations/Foo/Foo.yml`, or to
/// the single YAML file of the folder. A YAML file directly inside the item
/// folder is its own descriptor even when it no longer exists on disk.
fn find_folder_descriptor(root: &Path, item_dir: &Path, item_name: &str, direct_file: Option<&str>) -> Option<PathBuf> {
    let preferred = item_dir.join(format!("{item_name}.yml"));
    if root.join(&preferred).is_file() {
        return Some(preferred);
    }
    if let Some(file_name) = direct_file.filter(|name| name.ends_with(".yml") && !name.ends_with("_unified.yml")) {
        return Some(item_dir.join(file_name));
    }
    let Ok(entries) = std::fs::read_dir(root.join(item_dir)) else {
        // the whole item folder is gone
        return Some(preferred);
    };
    let mut yamls = entries
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".yml") && !name.ends_with("_unified.yml"))
        .collect::<Vec<_>>();
    yamls.sort();
    match yamls.as_slice() {
        [only] => Some(item_dir.join(only)),
        _ => None,
    }
}

/// `Playbooks/foo_README.md` belongs to `Playbooks/foo.yml`.
fn companion_descriptor(root: &Path, folder: &Path, file_name: &str) -> Option<PathBuf> {
    let stem = Path::new(file_name).file_stem()?.to_string_lossy().to_string();
    let base = ["_README", "_CHANGELOG", "_image", "_description"]
        .iter()
        .find_map(|suffix| stem.strip_suffix(suffix))
        .unwrap_or(&stem);
    DESCRIPTOR_EXTENSIONS
        .iter()
        .map(|extension| folder.join(format!("{base}.{extension}")))
        .find(|candidate| root.join(candidate).is_file())
}

/// Stateful parser for one content root. Pack metadata is read once per pack.
pub struct ContentParser {
    reader: Arc<FileReader>,
    packs: Mutex<HashMap<String, Arc<PackRef>>>,
    base: Option<BaseSource>,
    changes: Option<ChangedFiles>,
}

impl ContentParser {
    pub fn new(reader: Arc<FileReader>) -> Self {
        Self {
            reader,
            packs: Mutex::new(HashMap::new()),
            base: None,
            changes: None,
        }
    }

    /// Attaches a base revision: items learn their git status and can load
    /// their old version lazily.
    pub fn with_base(mut self, source: BaseSource, changes: ChangedFiles) -> Self {
        self.base = Some(source);
        self.changes = Some(changes);
        self
    }

    pub fn reader(&self) -> &FileReader {
        &self.reader
    }

    /// Relative form of `path` under the content root.
    pub fn relative(&self, path: &Path) -> PathBuf {
        let path = normalize_path(path);
        let root = normalize_path(self.reader.root());
        path.strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or(path)
    }

    pub fn pack_ref(&self, pack: &str) -> Arc<PackRef> {
        if let Some(known) = self.packs.lock().get(pack) {
            return known.clone();
        }
        let pack_dir = PathBuf::from(PACKS_DIR).join(pack);
        let metadata_path = pack_dir.join(PACK_METADATA);
        let metadata = if self.reader.resolve(&metadata_path).is_file() {
            match self.reader.read_value(&metadata_path) {
                Ok(value) => Some(value),
                Err(error) => {
                    warn!(pack, %error, "unreadable pack metadata");
                    None
                }
            }
        } else {
            None
        };
        let parsed = Arc::new(pack_ref(pack, pack_dir, metadata.as_ref()));
        self.packs.lock().entry(pack.to_string()).or_insert(parsed).clone()
    }

    /// Forgets cached pack facts, e.g. after a fix rewrote pack metadata.
    pub fn forget_pack(&self, pack: &str) {
        self.packs.lock().remove(pack);
    }

    /// Parses the item owning `path`.
    pub fn parse_path(&self, path: &Path) -> Result<ContentItem, InvalidContentItem> {
        let relative = self.relative(path);
        let descriptor = resolve_descriptor(self.reader.root(), &relative).ok_or_else(|| InvalidContentItem {
            path: relative.clone(),
            message: "could not determine the content type of this file".to_string(),
        })?;
        self.parse_descriptor(&descriptor)
    }

    pub fn parse_descriptor(&self, descriptor: &Descriptor) -> Result<ContentItem, InvalidContentItem> {
        let value = self
            .reader
            .read_value(&descriptor.path)
            .map_err(|error| InvalidContentItem {
                path: descriptor.path.clone(),
                message: error.to_string(),
            })?;
        if !value.is_object() {
            return Err(InvalidContentItem {
                path: descriptor.path.clone(),
                message: "the descriptor is not a mapping".to_string(),
            });
        }
        let pack = self.pack_ref(&descriptor.pack);
        let mut item = build_item(descriptor.content_type, descriptor.path.clone(), pack, value);
        if let ItemDetails::Pack(pack) = &mut item.details {
            pack.release_notes = self.release_notes(&descriptor.pack);
        }
        if descriptor.content_type.has_item_folder() {
            item.related_files = self.related_files(&descriptor.path);
        }
        if let Some(changes) = &self.changes {
            item.git_status = changes.status_of(&descriptor.path);
            item.old_path = changes.old_path_of(&descriptor.path).map(Path::to_path_buf);
        }
        if let Some(base) = &self.base {
            item.set_base_source(base.clone());
        }
        debug!(path = %descriptor.path.display(), content_type = %descriptor.content_type, "parsed");
        Ok(item)
    }

    /// Parses every item owning one of `paths`; several paths of one item
    /// yield a single object.
    pub fn parse_paths(&self, paths: &[PathBuf]) -> (Vec<ContentItem>, Vec<InvalidContentItem>) {
        let mut descriptors = BTreeSet::new();
        let mut invalid = Vec::new();
        for path in paths {
            let relative = self.relative(path);
            match resolve_descriptor(self.reader.root(), &relative) {
                Some(descriptor) => {
                    descriptors.insert(descriptor);
                }
                None if relative.starts_with(PACKS_DIR) => invalid.push(InvalidContentItem {
                    path: relative,
                    message: "could not determine the content type of this file".to_string(),
                }),
                None => debug!(path = %relative.display(), "outside the pack tree, skipped"),
            }
        }
        let descriptors = descriptors.into_iter().collect::<Vec<_>>();
        let parsed = descriptors
            .par_iter()
            .map(|descriptor| self.parse_descriptor(descriptor))
            .collect::<Vec<_>>();
        let mut items = Vec::with_capacity(parsed.len());
        for result in parsed {
            match result {
                Ok(item) => items.push(item),
                Err(error) => invalid.push(error),
            }
        }
        (items, invalid)
    }

    /// Every descriptor under `Packs/`.
    pub fn discover_all(&self) -> Vec<PathBuf> {
        let packs_root = self.reader.root().join(PACKS_DIR);
        let mut found = BTreeSet::new();
        for entry in WalkDir::new(&packs_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
        {
            let relative = self.relative(entry.path());
            if let Some(descriptor) = resolve_descriptor(self.reader.root(), &relative) {
                if self.reader.resolve(&descriptor.path).is_file() {
                    found.insert(descriptor.path);
                }
            }
        }
        found.into_iter().collect()
    }

    fn release_notes(&self, pack: &str) -> std::collections::BTreeMap<String, PathBuf> {
        let directory = PathBuf::from(PACKS_DIR).join(pack).join(RELEASE_NOTES_DIR);
        let Ok(entries) = std::fs::read_dir(self.reader.resolve(&directory)) else {
            return Default::default();
        };
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let stem = name.strip_suffix(".md")?;
                Some((release_note_version(stem)?, directory.join(&name)))
            })
            .collect()
    }

    fn related_files(&self, descriptor: &Path) -> RelatedFiles {
        let Some(folder) = descriptor.parent() else {
            return RelatedFiles::default();
        };
        let stem = folder
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let existing = |name: String| {
            let candidate = folder.join(name);
            self.reader.resolve(&candidate).is_file().then_some(candidate)
        };
        RelatedFiles {
            code: ["py", "ps1", "js"]
                .iter()
                .find_map(|extension| existing(format!("{stem}.{extension}"))),
            description: existing(format!("{stem}_description.md")),
            image: existing(format!("{stem}_image.png")),
            readme: existing("README.md".to_string()),
            unit_test: existing(format!("{stem}_test.py")).or_else(|| existing(format!("{stem}.Tests.ps1"))),
        }
    }
}
