//! Request and response shapes exchanged with the pipeline over stdin/stdout.

use crate::error::{Result, StorageError};
use crate::storage::Version;
use serde::{Deserialize, Serialize};

/// The resource's `source` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Source {
    #[serde(default)]
    pub bucket: String,
    /// Pins `check` to a single environment.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub iaas: String,
    #[serde(default)]
    pub gcp_region: String,
    #[serde(default)]
    pub gcp_service_account_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lb_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lb_domain: String,
}

impl Source {
    /// Checks the fields needed to reach the bucket at all.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(StorageError::Config("source.bucket is required".to_string()));
        }
        if self.gcp_service_account_key.is_empty() {
            return Err(StorageError::Config(
                "source.gcp-service-account-key is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    pub source: Source,
    #[serde(default)]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InRequest {
    pub source: Source,
    #[serde(default)]
    pub version: Version,
}

impl InRequest {
    /// Environment to fetch: the version's name, else the source's.
    pub fn name(&self) -> Result<&str> {
        if !self.version.name.is_empty() {
            Ok(&self.version.name)
        } else if !self.source.name.is_empty() {
            Ok(&self.source.name)
        } else {
            Err(StorageError::Config(
                "no name in version or source; nothing to fetch".to_string(),
            ))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutRequest {
    pub source: Source,
    #[serde(default)]
    pub params: OutParams,
}

/// Step parameters for `out`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OutParams {
    /// The bbl subcommand, e.g. `up` or `down`.
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub name: String,
    /// Path, relative to the sources directory, of a file holding the name.
    #[serde(default)]
    pub name_file: String,
    #[serde(default)]
    pub state_dir: String,
    /// Directories copied over the state directory before running bbl.
    #[serde(default)]
    pub plan_patches: Vec<String>,
    #[serde(default)]
    pub args: BblArgs,
}

pub const DEFAULT_STATE_DIR: &str = "bbl-state";

impl OutParams {
    pub fn state_dir_or_default(&self) -> &str {
        if self.state_dir.is_empty() {
            DEFAULT_STATE_DIR
        } else {
            &self.state_dir
        }
    }
}

/// Flags passed through to bbl on top of those derived from the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BblArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub no_director: bool,
    /// Anything bbl accepts that has no named field, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<ExtraFlag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraFlag {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Response for `in` and `out`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionResponse {
    pub version: Version,
}
