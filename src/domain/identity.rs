//! Owner identifiers and resource kinds.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::SyncError;

const RESERVED_ACCOUNT: &str = "root";

static ACCOUNT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]+$").expect("ACCOUNT_REGEX is a valid regex pattern")
});

/// A validated repository owner identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    /// Validate a raw owner name.
    ///
    /// Rejects empty names, the reserved `root` account (any casing) and anything
    /// outside `[a-zA-Z0-9_-]`.
    pub fn new(raw: impl Into<String>) -> Result<Self, SyncError> {
        let raw = raw.into();

        if raw.is_empty()
            || raw.eq_ignore_ascii_case(RESERVED_ACCOUNT)
            || !ACCOUNT_REGEX.is_match(&raw)
        {
            return Err(SyncError::InvalidIdentity(raw));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Account {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Kind of repository being mirrored. Each kind has its own sync table and key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Project,
    Model,
    Dataset,
}

impl ResourceType {
    /// Match order for [`ResourceType::parse_repo_name`].
    pub const ALL: [ResourceType; 3] = [
        ResourceType::Project,
        ResourceType::Model,
        ResourceType::Dataset,
    ];

    /// Classify a repository by the tag its name starts with (case-sensitive).
    pub fn parse_repo_name(repo_name: &str) -> Result<Self, SyncError> {
        Self::ALL
            .into_iter()
            .find(|kind| repo_name.starts_with(kind.as_str()))
            .ok_or_else(|| SyncError::UnknownRepoType(repo_name.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Project => "project",
            ResourceType::Model => "model",
            ResourceType::Dataset => "dataset",
        }
    }

    /// Table holding sync records of this kind.
    pub fn table_name(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SyncError::UnknownRepoType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_accepts_allowed_characters() {
        for raw in ["alice", "Bob_42", "team-ml", "_"] {
            let account = Account::new(raw).unwrap();
            assert_eq!(account.as_str(), raw);
        }
    }

    #[test]
    fn test_account_rejects_invalid_names() {
        for raw in ["", "root", "ROOT", "Root", "alice bob", "alice/bob", "ünïcode", "a.b"] {
            assert!(
                matches!(Account::new(raw), Err(SyncError::InvalidIdentity(_))),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_account_allows_names_containing_root() {
        assert!(Account::new("rooted").is_ok());
        assert!(Account::new("groot").is_ok());
    }

    #[test]
    fn test_parse_repo_name_by_prefix() {
        assert_eq!(
            ResourceType::parse_repo_name("project-demo").unwrap(),
            ResourceType::Project
        );
        assert_eq!(
            ResourceType::parse_repo_name("model_resnet").unwrap(),
            ResourceType::Model
        );
        assert_eq!(
            ResourceType::parse_repo_name("dataset").unwrap(),
            ResourceType::Dataset
        );
    }

    #[test]
    fn test_parse_repo_name_is_case_sensitive() {
        for name in ["Project-demo", "MODEL-x", "my-dataset", "widget", ""] {
            assert!(matches!(
                ResourceType::parse_repo_name(name),
                Err(SyncError::UnknownRepoType(_))
            ));
        }
    }

    #[test]
    fn test_from_str_requires_exact_name() {
        assert_eq!("model".parse::<ResourceType>().unwrap(), ResourceType::Model);
        assert!("models".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_table_name_dispatch() {
        let tables: Vec<_> = ResourceType::ALL.iter().map(|t| t.table_name()).collect();
        assert_eq!(tables, migration::REPO_SYNC_TABLES);
    }
}
