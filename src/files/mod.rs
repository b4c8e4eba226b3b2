//! File Abstraction Layer: one way to load any content file from the working
//! tree, a git revision, the GitHub/GitLab APIs or a plain URL.

pub mod encoding;
pub mod error;
pub mod formats;
pub mod remote;

pub use encoding::Encoding;
pub use error::{FileError, FileResult, LoadFailure};
pub use formats::{Archive, FileContent, FileKind, IniDocument, LoadedFile};
pub use remote::{RemoteClient, RemoteSettings};

use crate::git::GitUtil;
use moka::sync::Cache;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const CACHE_CAPACITY: u64 = 4096;

/// Where a file lives. Every form normalizes to a canonical cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileLocator {
    Local(PathBuf),
    Git {
        tag: String,
        path: PathBuf,
    },
    Github {
        tag: String,
        path: PathBuf,
    },
    Gitlab {
        tag: String,
        path: PathBuf,
        project_id: u64,
    },
    Url(String),
}

impl FileLocator {
    /// Parses a user supplied locator: URLs, `<ref>:<relpath>` git locators and
    /// plain paths.
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            return FileLocator::Url(value.to_string());
        }
        if let Some((tag, path)) = value.split_once(':') {
            let looks_like_drive = tag.len() == 1 && tag.chars().all(|c| c.is_ascii_alphabetic());
            if !tag.is_empty() && !path.is_empty() && !looks_like_drive {
                return FileLocator::Git {
                    tag: tag.to_string(),
                    path: PathBuf::from(path),
                };
            }
        }
        FileLocator::Local(PathBuf::from(value))
    }

    /// The path part used for type dispatch.
    pub fn file_path(&self) -> PathBuf {
        match self {
            FileLocator::Local(path)
            | FileLocator::Git { path, .. }
            | FileLocator::Github { path, .. }
            | FileLocator::Gitlab { path, .. } => path.clone(),
            FileLocator::Url(url) => {
                let trimmed = url.split(['?', '#']).next().unwrap_or(url);
                PathBuf::from(trimmed.rsplit('/').next().unwrap_or(trimmed))
            }
        }
    }

    pub fn canonical_key(&self, root: &Path) -> String {
        match self {
            FileLocator::Local(path) => {
                let absolute = if path.is_absolute() {
                    path.clone()
                } else {
                    root.join(path)
                };
                normalize_path(&absolute).to_string_lossy().replace('\\', "/")
            }
            FileLocator::Git { tag, path } => {
                format!("git:{tag}:{}", relative_key(path))
            }
            FileLocator::Github { tag, path } => {
                format!("github:{tag}:{}", relative_key(path))
            }
            FileLocator::Gitlab {
                tag,
                path,
                project_id,
            } => format!("gitlab:{project_id}:{tag}:{}", relative_key(path)),
            FileLocator::Url(url) => url.clone(),
        }
    }
}

impl fmt::Display for FileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileLocator::Local(path) => write!(f, "{}", path.display()),
            FileLocator::Git { tag, path } => write!(f, "{tag}:{}", path.display()),
            FileLocator::Github { tag, path } => write!(f, "github:{tag}:{}", path.display()),
            FileLocator::Gitlab { tag, path, .. } => write!(f, "gitlab:{tag}:{}", path.display()),
            FileLocator::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Memoizing reader/writer shared by parsers, validators and the fix protocol.
pub struct FileReader {
    root: PathBuf,
    cache: Cache<(FileKind, String), Arc<LoadedFile>>,
    remote: RemoteClient,
    git: Option<GitUtil>,
}

impl fmt::Debug for FileReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReader")
            .field("root", &self.root)
            .field("cached", &self.cache.entry_count())
            .field("git", &self.git.is_some())
            .finish()
    }
}

impl FileReader {
    pub fn new(root: impl Into<PathBuf>, settings: RemoteSettings) -> Self {
        let root = root.into();
        let git = GitUtil::open(&root).ok();
        Self {
            root,
            cache: Cache::new(CACHE_CAPACITY),
            remote: RemoteClient::new(settings),
            git,
        }
    }

    /// A reader over a plain directory, without git or remote access configured.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::new(root, RemoteSettings::default())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git(&self) -> Option<&GitUtil> {
        self.git.as_ref()
    }

    pub fn remote(&self) -> &RemoteClient {
        &self.remote
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn read(&self, locator: &FileLocator) -> FileResult<Arc<LoadedFile>> {
        self.read_with(locator, true)
    }

    /// Reads through the cache unless `use_cache` is false, in which case the
    /// entry is refreshed.
    pub fn read_with(&self, locator: &FileLocator, use_cache: bool) -> FileResult<Arc<LoadedFile>> {
        let kind = FileKind::from_path(&locator.file_path())?;
        let key = (kind, locator.canonical_key(&self.root));
        if use_cache {
            if let Some(hit) = self.cache.get(&key) {
                return Ok(hit);
            }
        }
        let loaded = Arc::new(self.load_uncached(kind, locator)?);
        self.cache.insert(key, loaded.clone());
        Ok(loaded)
    }

    pub fn read_from_local_path(&self, path: &Path) -> FileResult<Arc<LoadedFile>> {
        self.read(&FileLocator::Local(path.to_path_buf()))
    }

    pub fn read_from_git(&self, path: &Path, tag: &str, from_remote: bool) -> FileResult<Arc<LoadedFile>> {
        let tag = match &self.git {
            Some(git) => git.file_ref(tag, from_remote),
            None => tag.to_string(),
        };
        let path = self.relative(path);
        self.read(&FileLocator::Git { tag, path })
    }

    pub fn read_from_github_api(&self, path: &Path, tag: &str) -> FileResult<Arc<LoadedFile>> {
        self.read(&FileLocator::Github {
            tag: tag.to_string(),
            path: self.relative(path),
        })
    }

    pub fn read_from_gitlab_api(&self, path: &Path, tag: &str, project_id: u64) -> FileResult<Arc<LoadedFile>> {
        self.read(&FileLocator::Gitlab {
            tag: tag.to_string(),
            path: self.relative(path),
            project_id,
        })
    }

    pub fn read_from_http(&self, url: &str) -> FileResult<Arc<LoadedFile>> {
        self.read(&FileLocator::Url(url.to_string()))
    }

    /// Loads bytes that never touched the filesystem.
    pub fn read_from_memory(&self, name: &str, bytes: Vec<u8>) -> FileResult<LoadedFile> {
        let kind = FileKind::from_path(Path::new(name))?;
        formats::load_bytes(kind, name, bytes).map_err(|error| match error {
            FileError::FileLoad { source, .. } if matches!(*source, LoadFailure::Decode(_)) => {
                FileError::MemoryFileRead {
                    name: name.to_string(),
                    message: source.to_string(),
                }
            }
            other => other,
        })
    }

    /// Convenience for structured files: the decoded JSON/YAML value.
    pub fn read_value(&self, path: &Path) -> FileResult<Value> {
        let loaded = self.read_from_local_path(path)?;
        loaded.content.as_value().cloned().ok_or_else(|| {
            FileError::load(
                path.display().to_string(),
                loaded.kind.name(),
                LoadFailure::Decode("file does not hold a structured document".to_string()),
            )
        })
    }

    pub fn encoding_of(&self, path: &Path) -> FileResult<Option<Encoding>> {
        Ok(self.read_from_local_path(path)?.encoding)
    }

    pub fn invalidate(&self, locator: &FileLocator) {
        if let Ok(kind) = FileKind::from_path(&locator.file_path()) {
            self.cache.invalidate(&(kind, locator.canonical_key(&self.root)));
        }
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Writes `content` to `path`. Without an explicit encoding the file is
    /// written as UTF-8; an existing file in another encoding is removed and
    /// recreated as UTF-8. The cache entry is replaced with what was written.
    pub fn write(&self, path: &Path, content: &FileContent, encoding: Option<Encoding>) -> FileResult<()> {
        let kind = FileKind::from_path(path)?;
        let target = self.resolve(path);
        let write_error = |message: String| FileError::FileWrite {
            path: target.clone(),
            message,
        };
        let bytes = match content {
            FileContent::Binary(bytes) => bytes.as_ref().clone(),
            FileContent::Archive(archive) => archive.bytes().to_vec(),
            _ => {
                let text = formats::dump(kind, content).map_err(write_error)?;
                match encoding {
                    Some(encoding) => encoding::encode(&text, encoding).map_err(write_error)?,
                    None => {
                        if let Ok(existing) = std::fs::read(&target) {
                            if std::str::from_utf8(&existing).is_err() {
                                debug!(path = %target.display(), "recreating non-UTF-8 file as UTF-8");
                                std::fs::remove_file(&target)
                                    .map_err(|error| write_error(error.to_string()))?;
                            }
                        }
                        text.into_bytes()
                    }
                }
            }
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|error| write_error(error.to_string()))?;
        }
        std::fs::write(&target, &bytes).map_err(|error| write_error(error.to_string()))?;
        debug!(path = %target.display(), bytes = bytes.len(), "wrote file");

        let key = (kind, FileLocator::Local(target.clone()).canonical_key(&self.root));
        let written = LoadedFile {
            kind,
            content: content.clone(),
            encoding: Some(encoding.unwrap_or(Encoding::Utf8)),
        };
        self.cache.insert(key, Arc::new(written));
        Ok(())
    }

    pub fn write_value(&self, path: &Path, value: &Value) -> FileResult<()> {
        let encoding = self
            .encoding_of(path)
            .ok()
            .flatten()
            .filter(|encoding| encoding.is_utf8());
        self.write(path, &FileContent::Structured(value.clone()), encoding)
    }

    fn load_uncached(&self, kind: FileKind, locator: &FileLocator) -> FileResult<LoadedFile> {
        match locator {
            FileLocator::Local(path) => self.load_local(kind, &self.resolve(path)),
            FileLocator::Git { tag, path } => {
                let git = self.git.as_ref().ok_or_else(|| FileError::GitFileRead {
                    path: path.clone(),
                    tag: tag.clone(),
                    message: format!("{} is not inside a git repository", self.root.display()),
                })?;
                if !git.file_exists_in_revision(path, tag) {
                    return Err(FileError::GitFileNotFound {
                        path: path.clone(),
                        tag: tag.clone(),
                    });
                }
                let bytes = git.read_file_bytes(path, tag).map_err(|error| FileError::GitFileRead {
                    path: path.clone(),
                    tag: tag.clone(),
                    message: error.to_string(),
                })?;
                formats::load_bytes(kind, &locator.to_string(), bytes)
            }
            FileLocator::Github { tag, path } => {
                let bytes = self.remote.fetch_github(&relative_key(path), tag)?;
                self.load_via_temp_file(kind, path, bytes)
            }
            FileLocator::Gitlab {
                tag,
                path,
                project_id,
            } => {
                let bytes = self.remote.fetch_gitlab(&relative_key(path), tag, *project_id)?;
                self.load_via_temp_file(kind, path, bytes)
            }
            FileLocator::Url(url) => {
                let bytes = self.remote.fetch_url(url)?;
                self.load_via_temp_file(kind, &locator.file_path(), bytes)
            }
        }
    }

    fn load_local(&self, kind: FileKind, path: &Path) -> FileResult<LoadedFile> {
        debug!(path = %path.display(), kind = kind.name(), "local read");
        let bytes = std::fs::read(path).map_err(|source| FileError::LocalFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        formats::load_bytes(kind, &path.display().to_string(), bytes)
    }

    /// Remote bytes go through a temporary file so every transport shares the
    /// local decode path.
    fn load_via_temp_file(&self, kind: FileKind, path: &Path, bytes: Vec<u8>) -> FileResult<LoadedFile> {
        let suffix = path
            .file_name()
            .map(|name| format!("-{}", name.to_string_lossy()))
            .unwrap_or_default();
        let temp_error = |error: std::io::Error| FileError::LocalFileRead {
            path: path.to_path_buf(),
            source: error,
        };
        let mut temp = tempfile::Builder::new()
            .prefix("content-validate")
            .suffix(&suffix)
            .tempfile()
            .map_err(temp_error)?;
        temp.write_all(&bytes).map_err(temp_error)?;
        temp.flush().map_err(temp_error)?;
        self.load_local(kind, temp.path())
    }

    fn relative(&self, path: &Path) -> PathBuf {
        match &self.git {
            Some(git) => git.path_from_git_root(path),
            None => path
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.to_path_buf()),
        }
    }
}

fn relative_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").trim_start_matches("./").to_string()
}

/// Lexically resolves `.` and `..` without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn locator_forms_normalize_to_one_key() {
        let root = Path::new("/repo");
        let absolute = FileLocator::Local(PathBuf::from("/repo/Packs/A/pack_metadata.json"));
        let relative = FileLocator::Local(PathBuf::from("Packs/./A/pack_metadata.json"));
        assert_eq!(absolute.canonical_key(root), relative.canonical_key(root));
        assert_eq!(
            FileLocator::parse("origin/master:Packs/A/pack_metadata.json").canonical_key(root),
            "git:origin/master:Packs/A/pack_metadata.json"
        );
        assert!(matches!(FileLocator::parse("https://x.io/a.json"), FileLocator::Url(_)));
    }

    #[test]
    fn url_locator_dispatches_on_last_segment() {
        let locator = FileLocator::Url("https://example.com/raw/conf.json?ref=master".to_string());
        assert_eq!(locator.file_path(), PathBuf::from("conf.json"));
    }

    #[test]
    fn reads_are_memoized_until_invalidated() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("conf.json");
        std::fs::write(&path, r#"{"tests": []}"#).expect("write");
        let reader = FileReader::local(dir.path());

        let first = reader.read_value(&path).expect("read");
        std::fs::write(&path, r#"{"tests": [1]}"#).expect("rewrite");
        assert_eq!(reader.read_value(&path).expect("cached"), first);

        reader.invalidate(&FileLocator::Local(path.clone()));
        assert_eq!(
            reader.read_value(&path).expect("fresh"),
            serde_json::json!({"tests": [1]})
        );
    }

    #[test]
    fn write_recreates_non_utf8_file_as_utf8() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("README.md");
        std::fs::write(&path, [b'c', b'a', b'f', 0xE9]).expect("write");
        let reader = FileReader::local(dir.path());
        assert_eq!(reader.encoding_of(&path).expect("encoding"), Some(Encoding::Latin1));

        reader
            .write(&path, &FileContent::Text("café".to_string()), None)
            .expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "café");
    }

    #[test]
    fn missing_local_file_is_a_read_error() {
        let dir = tempdir().expect("tempdir");
        let reader = FileReader::local(dir.path());
        let error = reader
            .read_from_local_path(Path::new("missing.yml"))
            .expect_err("missing");
        assert!(error.is_not_found());
    }

    #[test]
    fn memory_reads_report_decode_failures() {
        let reader = FileReader::local(".");
        let loaded = reader
            .read_from_memory("script.yml", b"name: test\n".to_vec())
            .expect("yaml");
        assert_eq!(loaded.content.as_value(), Some(&serde_json::json!({"name": "test"})));
        assert!(matches!(
            reader.read_from_memory("bad.unknownext", Vec::new()),
            Err(FileError::UnknownFile(_))
        ));
    }
}
