use crate::constants::{MarketplaceVersion, SupportLevel};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Pack facts every item of the pack inherits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRef {
    /// Folder name under `Packs/`.
    pub name: String,
    pub path: PathBuf,
    /// Declared marketplaces; empty means the pack ships everywhere by default.
    pub marketplaces: Vec<MarketplaceVersion>,
    pub support: SupportLevel,
    pub supported_modules: Option<Vec<String>>,
    pub is_mcp: bool,
    pub current_version: Option<String>,
}

impl Default for PackRef {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: PathBuf::new(),
            marketplaces: Vec::new(),
            support: SupportLevel::Xsoar,
            supported_modules: None,
            is_mcp: false,
            current_version: None,
        }
    }
}

impl PackRef {
    /// Declared marketplaces, or the default set when the pack declares none.
    pub fn effective_marketplaces(&self) -> Vec<MarketplaceVersion> {
        if self.marketplaces.is_empty() {
            DEFAULT_MARKETPLACES.to_vec()
        } else {
            self.marketplaces.clone()
        }
    }
}

/// Marketplaces a pack ships to when its metadata is silent.
pub const DEFAULT_MARKETPLACES: [MarketplaceVersion; 4] = [
    MarketplaceVersion::Xsoar,
    MarketplaceVersion::XsoarSaas,
    MarketplaceVersion::XsoarOnPrem,
    MarketplaceVersion::MarketplaceV2,
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pack {
    pub name: String,
    pub support: Option<SupportLevel>,
    pub current_version: Option<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub default_datasource: Option<String>,
    pub hidden: bool,
    /// Release notes keyed by `major.minor.patch`.
    pub release_notes: BTreeMap<String, PathBuf>,
}

impl Pack {
    pub fn release_note_for(&self, version: &str) -> Option<&PathBuf> {
        self.release_notes.get(version)
    }
}

/// Converts a release-note file stem (`1_0_3`) to its version (`1.0.3`).
pub fn release_note_version(stem: &str) -> Option<String> {
    let parts = stem.split('_').collect::<Vec<_>>();
    if parts.len() == 3 && parts.iter().all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit())) {
        Some(parts.join("."))
    } else {
        None
    }
}

/// Numeric `major.minor.patch` comparison key; missing parts count as zero.
pub fn version_key(version: &str) -> Vec<u64> {
    let mut key = version
        .split('.')
        .map(|part| {
            part.chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
                .parse::<u64>()
                .unwrap_or(0)
        })
        .collect::<Vec<_>>();
    if key.len() < 3 {
        key.resize(3, 0);
    }
    while key.len() > 3 && key.last() == Some(&0) {
        key.pop();
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_versions_compare_as_padded() {
        assert_eq!(version_key("1.0"), version_key("1.0.0"));
        assert_eq!(version_key("2"), vec![2, 0, 0]);
        assert_eq!(version_key("3.11.1.0"), version_key("3.11.1"));
        assert!(version_key("1.0") < version_key("1.0.1"));
        assert!(version_key("3.11.1.5") > version_key("3.11.1"));
    }

    #[test]
    fn release_note_stems_become_versions() {
        assert_eq!(release_note_version("1_0_3").as_deref(), Some("1.0.3"));
        assert_eq!(release_note_version("1_0"), None);
        assert_eq!(release_note_version("notes"), None);
    }

    #[test]
    fn versions_compare_numerically() {
        assert!(version_key("6.10.0") > version_key("6.9.0"));
        assert_eq!(version_key("6.5"), vec![6, 5]);
    }
}
