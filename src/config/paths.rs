use std::{env, path::PathBuf};

/// Environment variable overriding the directory modules are resolved in.
pub const DIR_ENV: &str = "CDBCONF_DIR";

/// Environment variable overriding the default module file extension.
pub const EXTENSION_ENV: &str = "CDBCONF_EXTENSION";

/// Directory used when neither the caller nor the environment names one.
pub const DEFAULT_DIR: &str = "/usr/local/etc/onlineconf";

/// Extension appended to module names that carry none.
pub const DEFAULT_EXTENSION: &str = "cdb";

/// Locates module files.
///
/// Each value is read from the environment first and falls back to a
/// hard-coded default.
pub struct ConfigPaths;

impl ConfigPaths {
    /// Returns the base directory for name-only module lookups
    ///
    /// - First checks `CDBCONF_DIR`
    /// - Falls back to `/usr/local/etc/onlineconf`
    pub fn module_dir() -> PathBuf {
        env::var_os(DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_DIR), PathBuf::from)
    }

    /// Returns the default module file extension, without a leading dot
    pub fn module_extension() -> String {
        env::var(EXTENSION_ENV)
            .ok()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }
}
