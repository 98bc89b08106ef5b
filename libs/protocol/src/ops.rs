//! Shared operation request types
//!
//! The enumerations and JSON bodies both peers agree on: the client
//! assembles them, the service consumes them.

use serde::{Deserialize, Serialize};

/// Policy for reconciling an incoming item with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    Merge,
    Clear,
    Append,
    Skip,
    Overwrite,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Merge => "merge",
            MergeMode::Clear => "clear",
            MergeMode::Append => "append",
            MergeMode::Skip => "skip",
            MergeMode::Overwrite => "overwrite",
        }
    }
}

impl std::str::FromStr for MergeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merge" => Ok(MergeMode::Merge),
            "clear" => Ok(MergeMode::Clear),
            "append" => Ok(MergeMode::Append),
            "skip" => Ok(MergeMode::Skip),
            "overwrite" => Ok(MergeMode::Overwrite),
            _ => Err(format!(
                "Merge mode wrong. Accepted modes: merge, clear, append, overwrite, skip. Got '{}'",
                s
            )),
        }
    }
}

/// Publish scope/strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    Full,
    Incremental,
    SingleItem,
    Smart,
}

impl PublishMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishMode::Full => "Full",
            PublishMode::Incremental => "Incremental",
            PublishMode::SingleItem => "SingleItem",
            PublishMode::Smart => "Smart",
        }
    }
}

impl std::str::FromStr for PublishMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(PublishMode::Full),
            "incremental" => Ok(PublishMode::Incremental),
            "singleitem" => Ok(PublishMode::SingleItem),
            "smart" => Ok(PublishMode::Smart),
            _ => Err(format!(
                "The publishing mode must be one of: Full, Incremental, SingleItem, Smart. Got '{}'",
                s
            )),
        }
    }
}

/// JSON body of the structured install call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInstallBody {
    /// Path or bare name of the package, resolved server-side
    pub package_path: String,

    /// Reconciliation policy; absent means the service default (overwrite)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_mode: Option<MergeMode>,
}

/// JSON body of the publish call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishBody {
    pub mode: PublishMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,

    /// Publish children of the root item as well
    pub recursive: bool,

    pub source_db: String,

    pub target_db: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_item: Option<String>,
}
