use super::encoding::{self, Encoding};
use super::error::{FileError, FileResult, LoadFailure};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Text,
    Json,
    Json5,
    Yaml,
    Ini,
    Binary,
    Zip,
    Tar,
}

impl FileKind {
    pub fn name(self) -> &'static str {
        match self {
            FileKind::Text => "text",
            FileKind::Json => "json",
            FileKind::Json5 => "json5",
            FileKind::Yaml => "yaml",
            FileKind::Ini => "ini",
            FileKind::Binary => "binary",
            FileKind::Zip => "zip",
            FileKind::Tar => "tar",
        }
    }

    /// Returns the first file type claiming `path`, searching the type tree depth-first.
    pub fn from_path(path: &Path) -> FileResult<FileKind> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = extension_of(&name);
        find_kind(FILE_TYPES, &name, &extension)
            .ok_or_else(|| FileError::UnknownFile(path.to_path_buf()))
    }

    pub fn is_structured(self) -> bool {
        matches!(self, FileKind::Json | FileKind::Json5 | FileKind::Yaml)
    }
}

struct FileTypeNode {
    kind: FileKind,
    known_files: &'static [&'static str],
    known_extensions: &'static [&'static str],
    children: &'static [FileTypeNode],
}

const FILE_TYPES: &[FileTypeNode] = &[
    FileTypeNode {
        kind: FileKind::Text,
        known_files: &["CODEOWNERS", "LICENSE", "CommonServerUserPython", ".gitignore"],
        known_extensions: &[
            ".md", ".txt", ".py", ".ps1", ".js", ".xif", ".sh", ".html", ".css", ".svg", ".yar",
            ".csv",
        ],
        children: &[
            FileTypeNode {
                kind: FileKind::Json,
                known_files: &["pack_metadata.json", "conf.json", "compliant_policies.json"],
                known_extensions: &[".json"],
                children: &[],
            },
            FileTypeNode {
                kind: FileKind::Json5,
                known_files: &[],
                known_extensions: &[".json5"],
                children: &[],
            },
            FileTypeNode {
                kind: FileKind::Yaml,
                known_files: &[],
                known_extensions: &[".yml", ".yaml"],
                children: &[],
            },
            FileTypeNode {
                kind: FileKind::Ini,
                known_files: &[".pack-ignore", ".secrets-ignore"],
                known_extensions: &[".ini", ".cfg"],
                children: &[],
            },
        ],
    },
    FileTypeNode {
        kind: FileKind::Binary,
        known_files: &[],
        known_extensions: &[".png", ".jpg", ".jpeg", ".gif", ".ico", ".bin", ".pdf"],
        children: &[],
    },
    FileTypeNode {
        kind: FileKind::Zip,
        known_files: &[],
        known_extensions: &[".zip"],
        children: &[],
    },
    FileTypeNode {
        kind: FileKind::Tar,
        known_files: &[],
        known_extensions: &[".tar", ".gz", ".tgz"],
        children: &[],
    },
];

fn find_kind(nodes: &[FileTypeNode], name: &str, extension: &str) -> Option<FileKind> {
    for node in nodes {
        if node.known_files.contains(&name) || node.known_extensions.contains(&extension) {
            return Some(node.kind);
        }
        if let Some(kind) = find_kind(node.children, name, extension) {
            return Some(kind);
        }
    }
    None
}

fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(index) if index > 0 => name[index..].to_lowercase(),
        _ => String::new(),
    }
}

/// Decoded file content. Structured formats are normalized to a JSON value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    Structured(Value),
    Text(String),
    Ini(IniDocument),
    Binary(Arc<Vec<u8>>),
    Archive(Archive),
}

impl FileContent {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FileContent::Structured(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A loaded file together with the encoding its bytes were stored in.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFile {
    pub kind: FileKind,
    pub content: FileContent,
    pub encoding: Option<Encoding>,
}

pub fn load_bytes(kind: FileKind, label: &str, bytes: Vec<u8>) -> FileResult<LoadedFile> {
    match kind {
        FileKind::Binary => Ok(LoadedFile {
            kind,
            content: FileContent::Binary(Arc::new(bytes)),
            encoding: None,
        }),
        FileKind::Zip | FileKind::Tar => {
            let archive = Archive::new(kind, label, bytes);
            archive.names()?;
            Ok(LoadedFile {
                kind,
                content: FileContent::Archive(archive),
                encoding: None,
            })
        }
        _ => {
            let (text, encoding) = encoding::decode_detected(&bytes)
                .map_err(|message| FileError::load(label, kind.name(), LoadFailure::Decode(message)))?;
            let content = load_text(kind, label, &text)?;
            Ok(LoadedFile {
                kind,
                content,
                encoding: Some(encoding),
            })
        }
    }
}

pub fn load_text(kind: FileKind, label: &str, text: &str) -> FileResult<FileContent> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    match kind {
        FileKind::Text => Ok(FileContent::Text(text.to_string())),
        FileKind::Json => serde_json::from_str::<Value>(text)
            .map(FileContent::Structured)
            .map_err(|error| FileError::load(label, kind.name(), error)),
        FileKind::Json5 => serde_json::from_str::<Value>(&strip_json5(text))
            .map(FileContent::Structured)
            .map_err(|error| FileError::load(label, kind.name(), error)),
        FileKind::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(text)
                .map_err(|error| FileError::load(label, kind.name(), error))?;
            serde_json::to_value(yaml)
                .map(FileContent::Structured)
                .map_err(|error| FileError::load(label, kind.name(), error))
        }
        FileKind::Ini => IniDocument::parse(text)
            .map(FileContent::Ini)
            .map_err(|message| FileError::load(label, kind.name(), LoadFailure::Decode(message))),
        FileKind::Binary | FileKind::Zip | FileKind::Tar => Err(FileError::load(
            label,
            kind.name(),
            LoadFailure::Decode("binary content cannot be loaded from text".to_string()),
        )),
    }
}

/// Serializes structured or text content for writing back to disk.
pub fn dump(kind: FileKind, content: &FileContent) -> Result<String, String> {
    match (kind, content) {
        (FileKind::Yaml, FileContent::Structured(value)) => {
            serde_yaml::to_string(value).map_err(|error| error.to_string())
        }
        (FileKind::Json | FileKind::Json5, FileContent::Structured(value)) => {
            let mut buffer = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
            serde::Serialize::serialize(value, &mut serializer).map_err(|error| error.to_string())?;
            let mut text = String::from_utf8(buffer).map_err(|error| error.to_string())?;
            text.push('\n');
            Ok(text)
        }
        (_, FileContent::Text(text)) => Ok(text.clone()),
        (FileKind::Ini, FileContent::Ini(document)) => Ok(document.render()),
        (kind, _) => Err(format!("cannot serialize {} content as text", kind.name())),
    }
}

/// Removes comments and trailing commas so JSON5 documents parse as JSON.
fn strip_json5(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let chars = text.chars().collect::<Vec<_>>();
    let mut index = 0;
    let mut in_string: Option<char> = None;
    while index < chars.len() {
        let current = chars[index];
        if let Some(quote) = in_string {
            output.push(if current == '\'' && quote == '\'' { '"' } else { current });
            if current == '\\' && index + 1 < chars.len() {
                output.push(chars[index + 1]);
                index += 2;
                continue;
            }
            if current == quote {
                in_string = None;
            }
            index += 1;
            continue;
        }
        match current {
            '"' | '\'' => {
                in_string = Some(current);
                output.push('"');
            }
            '/' if chars.get(index + 1) == Some(&'/') => {
                while index < chars.len() && chars[index] != '\n' {
                    index += 1;
                }
                continue;
            }
            '/' if chars.get(index + 1) == Some(&'*') => {
                index += 2;
                while index + 1 < chars.len() && !(chars[index] == '*' && chars[index + 1] == '/') {
                    index += 1;
                }
                index += 2;
                continue;
            }
            ',' => {
                let next = chars[index + 1..]
                    .iter()
                    .find(|character| !character.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    output.push(current);
                }
            }
            _ => output.push(current),
        }
        index += 1;
    }
    output
}

/// Section tree of an INI file. Keys outside any section live under `""`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    pub sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut document = IniDocument::default();
        let mut current = String::new();
        let mut last_key: Option<String> = None;
        for (number, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim_end();
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if trimmed.starts_with('[') {
                let name = trimmed
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .ok_or_else(|| format!("line {}: malformed section header", number + 1))?;
                current = name.trim().to_string();
                document.sections.entry(current.clone()).or_default();
                last_key = None;
                continue;
            }
            if line.starts_with(char::is_whitespace) {
                if let Some(key) = &last_key {
                    let section = document.sections.entry(current.clone()).or_default();
                    if let Some(value) = section.get_mut(key) {
                        if !value.is_empty() {
                            value.push('\n');
                        }
                        value.push_str(trimmed);
                        continue;
                    }
                }
            }
            let (key, value) = match trimmed.find(['=', ':']) {
                Some(index) => (trimmed[..index].trim(), trimmed[index + 1..].trim()),
                None => (trimmed, ""),
            };
            document
                .sections
                .entry(current.clone())
                .or_default()
                .insert(key.to_string(), value.to_string());
            last_key = Some(key.to_string());
        }
        Ok(document)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    pub fn render(&self) -> String {
        let mut output = String::new();
        for (section, entries) in &self.sections {
            if !section.is_empty() {
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&format!("[{section}]\n"));
            }
            for (key, value) in entries {
                if value.is_empty() {
                    output.push_str(&format!("{key}\n"));
                } else {
                    output.push_str(&format!("{key}={}\n", value.replace('\n', "\n\t")));
                }
            }
        }
        output
    }
}

/// In-memory handle to a compressed archive.
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    kind: FileKind,
    label: String,
    bytes: Arc<Vec<u8>>,
}

impl Archive {
    fn new(kind: FileKind, label: &str, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            label: label.to_string(),
            bytes: Arc::new(bytes),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lists the member names stored in the archive.
    pub fn names(&self) -> FileResult<Vec<String>> {
        let result = match self.kind {
            FileKind::Zip => zip_names(&self.bytes),
            _ => tar_names(&self.bytes),
        };
        result.map_err(|message| FileError::load(&self.label, self.kind.name(), LoadFailure::Decode(message)))
    }
}

fn zip_names(bytes: &[u8]) -> Result<Vec<String>, String> {
    const END_OF_DIRECTORY: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
    const DIRECTORY_ENTRY: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];
    if bytes.len() < 22 {
        return Err("zip archive is truncated".to_string());
    }
    let search_start = bytes.len().saturating_sub(22 + u16::MAX as usize);
    let end = (search_start..=bytes.len() - 22)
        .rev()
        .find(|index| bytes[*index..*index + 4] == END_OF_DIRECTORY)
        .ok_or_else(|| "zip end of central directory not found".to_string())?;
    let entries = u16::from_le_bytes([bytes[end + 10], bytes[end + 11]]) as usize;
    let mut offset = u32::from_le_bytes([
        bytes[end + 16],
        bytes[end + 17],
        bytes[end + 18],
        bytes[end + 19],
    ]) as usize;
    let mut names = Vec::with_capacity(entries);
    for _ in 0..entries {
        if offset + 46 > bytes.len() || bytes[offset..offset + 4] != DIRECTORY_ENTRY {
            return Err("zip central directory is corrupt".to_string());
        }
        let name_length = u16::from_le_bytes([bytes[offset + 28], bytes[offset + 29]]) as usize;
        let extra_length = u16::from_le_bytes([bytes[offset + 30], bytes[offset + 31]]) as usize;
        let comment_length = u16::from_le_bytes([bytes[offset + 32], bytes[offset + 33]]) as usize;
        let start = offset + 46;
        let name = bytes
            .get(start..start + name_length)
            .ok_or_else(|| "zip entry name is truncated".to_string())?;
        names.push(String::from_utf8_lossy(name).to_string());
        offset = start + name_length + extra_length + comment_length;
    }
    Ok(names)
}

fn tar_names(bytes: &[u8]) -> Result<Vec<String>, String> {
    if bytes.starts_with(&[0x1F, 0x8B]) {
        member_names(tar::Archive::new(GzDecoder::new(bytes)))
    } else {
        member_names(tar::Archive::new(bytes))
    }
}

fn member_names<R: Read>(mut archive: tar::Archive<R>) -> Result<Vec<String>, String> {
    let mut names = Vec::new();
    for entry in archive.entries().map_err(|error| error.to_string())? {
        let entry = entry.map_err(|error| error.to_string())?;
        let path = entry.path().map_err(|error| error.to_string())?;
        names.push(path.to_string_lossy().to_string());
    }
    Ok(names)
}
