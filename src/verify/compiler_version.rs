use std::collections::HashMap;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

pub const COMPILER_LIST_URL: &str =
    "https://binaries.soliditylang.org/bin/list.json";

/// Separates the release from the build metadata in `v0.8.18+commit.87f61d96`
pub const COMMIT_DELIMITER: char = '+';

const FILENAME_PREFIX: &str = "soljson-";
const FILENAME_SUFFIX: &str = ".js";

#[derive(Debug, Error)]
pub enum CompilerVersionLookupError {
    #[error("failed to fetch the compiler list to resolve {version}")]
    Request {
        version: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("compiler list returned {status} while resolving {version}")]
    Status { version: String, status: StatusCode },

    #[error("compiler version {version} is not in the compiler list")]
    Missing { version: String },
}

#[derive(Debug, Deserialize)]
struct CompilerList {
    releases: HashMap<String, String>,
}

/// Both spellings of a compiler version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerVersions {
    /// e.g. `v0.8.18`
    pub short: String,
    /// e.g. `v0.8.18+commit.87f61d96`
    pub long: String,
}

/// Truncates a long version at the commit delimiter, `None` if `version`
/// is already short.
pub fn short_version(version: &str) -> Option<&str> {
    version
        .split_once(COMMIT_DELIMITER)
        .map(|(short, _commit)| short)
}

/// Resolves short compiler versions through the public compiler list.
///
/// Nothing is cached, every lookup downloads the list again.
#[derive(Debug, Clone)]
pub struct CompilerVersionResolver {
    client: Client,
    list_url: String,
}

impl Default for CompilerVersionResolver {
    fn default() -> Self {
        Self::new(COMPILER_LIST_URL)
    }
}

impl CompilerVersionResolver {
    pub fn new(list_url: impl ToString) -> Self {
        Self {
            client: Client::new(),
            list_url: list_url.to_string(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Derives whichever of the short and long forms is missing.
    pub async fn resolve(
        &self,
        version: &str,
    ) -> Result<CompilerVersions, CompilerVersionLookupError> {
        if let Some(short) = short_version(version) {
            return Ok(CompilerVersions {
                short: short.to_string(),
                long: version.to_string(),
            });
        }

        let long = self.resolve_long_version(version).await?;

        // Both forms follow the list's spelling, whatever the caller wrote
        let short = short_version(&long).unwrap_or(&long).to_string();

        Ok(CompilerVersions { short, long })
    }

    #[instrument(skip(self), fields(list_url = %self.list_url))]
    pub async fn resolve_long_version(
        &self,
        short_version: &str,
    ) -> Result<String, CompilerVersionLookupError> {
        let request_error =
            |source: reqwest::Error| CompilerVersionLookupError::Request {
                version: short_version.to_string(),
                source,
            };

        let response = self
            .client
            .get(&self.list_url)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();

        if !status.is_success() {
            return Err(CompilerVersionLookupError::Status {
                version: short_version.to_string(),
                status,
            });
        }

        let list: CompilerList =
            response.json().await.map_err(request_error)?;

        let long = lookup(&list, short_version).ok_or_else(|| {
            CompilerVersionLookupError::Missing {
                version: short_version.to_string(),
            }
        })?;

        debug!("Resolved {short_version} to {long}");

        Ok(long)
    }
}

/// The list keys releases as `0.8.18`, callers usually write `v0.8.18`.
fn lookup(list: &CompilerList, short_version: &str) -> Option<String> {
    let alternative = match short_version.strip_prefix('v') {
        Some(bare) => bare.to_string(),
        None => format!("v{short_version}"),
    };

    let filename = list
        .releases
        .get(short_version)
        .or_else(|| list.releases.get(&alternative))?;

    let long = filename.strip_prefix(FILENAME_PREFIX).unwrap_or(filename);
    let long = long.strip_suffix(FILENAME_SUFFIX).unwrap_or(long);

    if long.is_empty() {
        None
    } else {
        Some(long.to_string())
    }
}
