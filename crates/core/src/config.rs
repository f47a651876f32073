//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the store. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::DEFAULT_DATA_FILE;
use crate::{StoreError, StoreResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What [`UserStore::open`](crate::UserStore::open) does when the data file exists but cannot
/// be read as a user collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CorruptDataPolicy {
    /// Refuse to start. The file is left untouched.
    #[default]
    Fail,
    /// Move the file aside with a timestamped name, log a warning and start with no users.
    StartEmpty,
}

impl FromStr for CorruptDataPolicy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "start-empty" | "start_empty" => Ok(Self::StartEmpty),
            other => Err(StoreError::InvalidInput(format!(
                "unknown corrupt data policy '{}' (expected 'fail' or 'start-empty')",
                other
            ))),
        }
    }
}

impl fmt::Display for CorruptDataPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => f.write_str("fail"),
            Self::StartEmpty => f.write_str("start-empty"),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_file: PathBuf,
    corrupt_data_policy: CorruptDataPolicy,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] if `data_file` does not name a file (empty, or
    /// ending in `..`) or points at an existing directory.
    pub fn new(data_file: PathBuf, corrupt_data_policy: CorruptDataPolicy) -> StoreResult<Self> {
        if data_file.file_name().is_none() {
            return Err(StoreError::InvalidInput(format!(
                "data file path must name a file, got '{}'",
                data_file.display()
            )));
        }

        if data_file.is_dir() {
            return Err(StoreError::InvalidInput(format!(
                "data file path is a directory: {}",
                data_file.display()
            )));
        }

        Ok(Self {
            data_file,
            corrupt_data_policy,
        })
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn corrupt_data_policy(&self) -> CorruptDataPolicy {
        self.corrupt_data_policy
    }
}

/// Resolve the data file path from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DATA_FILE`].
pub fn data_file_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE))
}

/// Parse the corrupt data policy from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`CorruptDataPolicy::Fail`].
pub fn corrupt_data_policy_from_env_value(value: Option<String>) -> StoreResult<CorruptDataPolicy> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value.map(|v| v.parse::<CorruptDataPolicy>()).transpose()?;

    Ok(parsed.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_data_file_defaults_when_unset_or_blank() {
        assert_eq!(
            data_file_from_env_value(None),
            PathBuf::from(DEFAULT_DATA_FILE)
        );
        assert_eq!(
            data_file_from_env_value(Some("   ".into())),
            PathBuf::from(DEFAULT_DATA_FILE)
        );
        assert_eq!(
            data_file_from_env_value(Some(" /srv/users.json ".into())),
            PathBuf::from("/srv/users.json")
        );
    }

    #[test]
    fn test_corrupt_data_policy_parsing() {
        assert_eq!(
            corrupt_data_policy_from_env_value(None).unwrap(),
            CorruptDataPolicy::Fail
        );
        assert_eq!(
            corrupt_data_policy_from_env_value(Some("START-EMPTY".into())).unwrap(),
            CorruptDataPolicy::StartEmpty
        );
        assert_eq!(
            corrupt_data_policy_from_env_value(Some("fail".into())).unwrap(),
            CorruptDataPolicy::Fail
        );
        assert!(matches!(
            corrupt_data_policy_from_env_value(Some("ignore".into())),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_policy_display_parses_back() {
        for policy in [CorruptDataPolicy::Fail, CorruptDataPolicy::StartEmpty] {
            assert_eq!(policy.to_string().parse::<CorruptDataPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_config_rejects_directory_and_nameless_paths() {
        let temp = TempDir::new().unwrap();

        let result = CoreConfig::new(temp.path().to_path_buf(), CorruptDataPolicy::Fail);
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));

        let result = CoreConfig::new(PathBuf::from(".."), CorruptDataPolicy::Fail);
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn test_config_accepts_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("users.json");

        let cfg = CoreConfig::new(path.clone(), CorruptDataPolicy::StartEmpty).unwrap();
        assert_eq!(cfg.data_file(), path.as_path());
        assert_eq!(cfg.corrupt_data_policy(), CorruptDataPolicy::StartEmpty);
    }
}
