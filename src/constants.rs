use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PACKS_DIR: &str = "Packs";
pub const PACK_METADATA: &str = "pack_metadata.json";
pub const RELEASE_NOTES_DIR: &str = "ReleaseNotes";
pub const CONF_JSON: &str = "Tests/conf.json";
pub const COMPLIANT_POLICIES: &str = "Config/compliant_policies.json";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BRANCH: &str = "master";
pub const FRAMEWORK_ERROR_CODE: &str = "framework-error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketplaceVersion {
    #[serde(rename = "xsoar")]
    Xsoar,
    #[serde(rename = "xsoar_saas")]
    XsoarSaas,
    #[serde(rename = "xsoar_on_prem")]
    XsoarOnPrem,
    #[serde(rename = "marketplacev2")]
    MarketplaceV2,
    #[serde(rename = "platform")]
    Platform,
}

impl MarketplaceVersion {
    pub const ALL: [MarketplaceVersion; 5] = [
        MarketplaceVersion::Xsoar,
        MarketplaceVersion::XsoarSaas,
        MarketplaceVersion::XsoarOnPrem,
        MarketplaceVersion::MarketplaceV2,
        MarketplaceVersion::Platform,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MarketplaceVersion::Xsoar => "xsoar",
            MarketplaceVersion::XsoarSaas => "xsoar_saas",
            MarketplaceVersion::XsoarOnPrem => "xsoar_on_prem",
            MarketplaceVersion::MarketplaceV2 => "marketplacev2",
            MarketplaceVersion::Platform => "platform",
        }
    }

    /// Marketplaces that render incident terminology rather than alerts.
    pub fn is_xsoar_family(self) -> bool {
        matches!(
            self,
            MarketplaceVersion::Xsoar
                | MarketplaceVersion::XsoarSaas
                | MarketplaceVersion::XsoarOnPrem
        )
    }
}

impl FromStr for MarketplaceVersion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MarketplaceVersion::ALL
            .into_iter()
            .find(|marketplace| marketplace.as_str() == value)
            .ok_or_else(|| format!("unknown marketplace: {value}"))
    }
}

impl fmt::Display for MarketplaceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    Xsoar,
    Partner,
    Community,
    Developer,
}

impl SupportLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SupportLevel::Xsoar => "xsoar",
            SupportLevel::Partner => "partner",
            SupportLevel::Community => "community",
            SupportLevel::Developer => "developer",
        }
    }
}

impl FromStr for SupportLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "xsoar" => Ok(SupportLevel::Xsoar),
            "partner" => Ok(SupportLevel::Partner),
            "community" => Ok(SupportLevel::Community),
            "developer" => Ok(SupportLevel::Developer),
            other => Err(format!("unknown support level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GitStatus {
    Added,
    Modified,
    Renamed,
    Deleted,
}

impl GitStatus {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'A' | 'C' => Some(GitStatus::Added),
            'M' | 'T' => Some(GitStatus::Modified),
            'R' => Some(GitStatus::Renamed),
            'D' => Some(GitStatus::Deleted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GitStatus::Added => "A",
            GitStatus::Modified => "M",
            GitStatus::Renamed => "R",
            GitStatus::Deleted => "D",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    AllFiles,
    SpecificFiles,
    UseGit,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::AllFiles => "all_files",
            ExecutionMode::SpecificFiles => "specific_files",
            ExecutionMode::UseGit => "use_git",
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all_files" | "all" => Ok(ExecutionMode::AllFiles),
            "specific_files" | "files" => Ok(ExecutionMode::SpecificFiles),
            "use_git" | "git" => Ok(ExecutionMode::UseGit),
            other => Err(format!("unknown execution mode: {other}")),
        }
    }
}

/// Integration configuration parameter type codes.
pub mod param_type {
    pub const SHORT_TEXT: i64 = 0;
    pub const NUMBER: i64 = 1;
    pub const ENCRYPTED: i64 = 4;
    pub const BOOLEAN: i64 = 8;
    pub const AUTH: i64 = 9;
    pub const TEXT_AREA: i64 = 12;
    pub const INCIDENT_TYPE: i64 = 13;
    pub const TEXT_AREA_ENCRYPTED: i64 = 14;
    pub const SINGLE_SELECT: i64 = 15;
    pub const MULTI_SELECT: i64 = 16;
    pub const EXPIRATION: i64 = 17;
}

pub const PROXY_PARAM_DISPLAY: &str = "Use system proxy settings";
pub const INSECURE_PARAM_DISPLAY: &str = "Trust any certificate (not secure)";

/// Display names enforced on the connection parameters, keyed by parameter name.
pub const CONNECTION_PARAMS: [(&str, &str); 3] = [
    ("proxy", PROXY_PARAM_DISPLAY),
    ("insecure", INSECURE_PARAM_DISPLAY),
    ("unsecure", INSECURE_PARAM_DISPLAY),
];

/// Boolean parameters that may be declared `required: true`.
pub const REQUIRED_BOOLEAN_ALLOWED: [&str; 4] = ["insecure", "unsecure", "proxy", "isFetch"];

pub const ALLOWED_HIDDEN_PARAMS: [&str; 5] = [
    "longRunning",
    "feedIncremental",
    "feedReputation",
    "feedExpirationPolicy",
    "feedExpirationInterval",
];

pub const SECTIONS: [&str; 5] = ["Connect", "Collect", "Optimize", "Mirroring", "Result"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredParam {
    pub name: &'static str,
    pub display: &'static str,
    pub param_type: i64,
    pub required: bool,
}

pub const INCIDENT_FETCH_REQUIRED_PARAMS: [RequiredParam; 2] = [
    RequiredParam {
        name: "incidentType",
        display: "Incident type",
        param_type: param_type::INCIDENT_TYPE,
        required: false,
    },
    RequiredParam {
        name: "isFetch",
        display: "Fetch incidents",
        param_type: param_type::BOOLEAN,
        required: false,
    },
];

pub const ALERT_FETCH_REQUIRED_PARAMS: [RequiredParam; 2] = [
    RequiredParam {
        name: "incidentType",
        display: "Alert type",
        param_type: param_type::INCIDENT_TYPE,
        required: false,
    },
    RequiredParam {
        name: "isFetch",
        display: "Fetch alerts",
        param_type: param_type::BOOLEAN,
        required: false,
    },
];

pub const MAX_FETCH_PARAM_NAME: &str = "max_fetch";
pub const MAX_FETCH_DEFAULT_VALUE: &str = "50";

/// Platform modules a pack may declare when it does not restrict them.
pub const PLATFORM_SUPPORTED_MODULES: [&str; 8] = [
    "C1",
    "C3",
    "X0",
    "X1",
    "X3",
    "X5",
    "ENT_PLUS",
    "agentix",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marketplace_round_trips_through_str() {
        for marketplace in MarketplaceVersion::ALL {
            let parsed: MarketplaceVersion = marketplace.as_str().parse().expect("parse");
            assert_eq!(parsed, marketplace);
        }
        assert!("xpanse".parse::<MarketplaceVersion>().is_err());
    }

    #[test]
    fn git_status_letters() {
        assert_eq!(GitStatus::from_letter('R'), Some(GitStatus::Renamed));
        assert_eq!(GitStatus::from_letter('C'), Some(GitStatus::Added));
        assert_eq!(GitStatus::from_letter('X'), None);
    }
}
