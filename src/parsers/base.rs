use super::items::build_item;
use crate::files::FileReader;
use crate::model::{BaseLoader, ContentItem};
use std::sync::Arc;
use tracing::debug;

/// Reads the base-revision descriptor of an item through git.
pub struct GitBaseLoader {
    reader: Arc<FileReader>,
    reference: String,
}

impl GitBaseLoader {
    /// `reference` is a ref git can resolve as is (`origin/main`, a SHA).
    pub fn new(reader: Arc<FileReader>, reference: impl Into<String>) -> Self {
        Self {
            reader,
            reference: reference.into(),
        }
    }
}

impl BaseLoader for GitBaseLoader {
    fn load_base(&self, item: &ContentItem) -> Option<ContentItem> {
        let path = item.old_path.as_ref().unwrap_or(&item.path);
        match self.reader.read_from_git(path, &self.reference, false) {
            Ok(loaded) => {
                let value = loaded.content.as_value()?.clone();
                Some(build_item(item.content_type, path.clone(), item.pack.clone(), value))
            }
            Err(error) => {
                debug!(path = %path.display(), reference = %self.reference, %error, "no base version");
                None
            }
        }
    }
}
