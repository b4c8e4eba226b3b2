use std::path::PathBuf;

pub type FileResult<T> = Result<T, FileError>;

#[derive(thiserror::Error, Debug)]
pub enum FileError {
    #[error("could not read local file {path}: {source}")]
    LocalFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read {path} from git revision {tag}: {message}")]
    GitFileRead {
        path: PathBuf,
        tag: String,
        message: String,
    },
    #[error("file {path} does not exist in git revision {tag}")]
    GitFileNotFound { path: PathBuf, tag: String },
    #[error("could not read {url}: {message}")]
    HttpFileRead { url: String, message: String },
    #[error("could not decode in-memory content of {name}: {message}")]
    MemoryFileRead { name: String, message: String },
    #[error("could not load {path} as {kind}: {source}")]
    FileLoad {
        path: String,
        kind: &'static str,
        #[source]
        source: Box<LoadFailure>,
    },
    #[error("no file type claims {0}")]
    UnknownFile(PathBuf),
    #[error("could not write {path}: {message}")]
    FileWrite { path: PathBuf, message: String },
}

/// The lower-level failure wrapped by [`FileError::FileLoad`].
#[derive(thiserror::Error, Debug)]
pub enum LoadFailure {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0}")]
    Decode(String),
    #[error(transparent)]
    Read(Box<FileError>),
}

impl FileError {
    pub fn load(path: impl Into<String>, kind: &'static str, source: impl Into<LoadFailure>) -> Self {
        FileError::FileLoad {
            path: path.into(),
            kind,
            source: Box::new(source.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            FileError::GitFileNotFound { .. } => true,
            FileError::LocalFileRead { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

impl From<FileError> for LoadFailure {
    fn from(error: FileError) -> Self {
        LoadFailure::Read(Box::new(error))
    }
}
