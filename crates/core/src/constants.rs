//! Constants used throughout the usuarios core crate.
//!
//! This module contains path, filename and validation constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default location of the user collection when no explicit file is configured.
pub const DEFAULT_DATA_FILE: &str = "data/users.json";

/// Suffix of the sibling file each write goes through before it is renamed into place.
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Marker inserted into the name of an unreadable data file when it is moved aside.
pub const CORRUPT_FILE_MARKER: &str = ".corrupt-";

/// Timestamp format used when naming moved-aside data files.
pub const CORRUPT_FILE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// Youngest accepted age.
pub const EDAD_MIN: i64 = 0;

/// Oldest accepted age.
pub const EDAD_MAX: i64 = 150;

/// Service name reported by health checks.
pub const SERVICE_NAME: &str = "User Management API";
