//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The single place where INI key names map to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Start from defaults and overlay every value present in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache]
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("namespace") {
            let v = v.trim();
            if v.is_empty() || v.contains(['/', '\\']) {
                return Err(invalid(
                    "cache",
                    "namespace",
                    v,
                    "must be a non-empty name without path separators",
                ));
            }
            config.cache.namespace = v.to_string();
        }
        if let Some(v) = section.get("memory_cost") {
            config.cache.memory_cost = size_value("cache", "memory_cost", v)?;
        }
        if let Some(v) = section.get("memory_count") {
            config.cache.memory_count = integer_value("cache", "memory_count", v)?;
        }
        if let Some(v) = section.get("disk_size") {
            config.cache.disk_size = size_value("cache", "disk_size", v)?;
        }
        if let Some(v) = section.get("disk_age_days") {
            config.cache.disk_age_days = integer_value("cache", "disk_age_days", v)?;
        }
        if let Some(v) = section.get("in_memory") {
            config.cache.in_memory = parse_bool(v);
        }
        if let Some(v) = section.get("decompress") {
            config.cache.decompress = parse_bool(v);
        }
        if let Some(v) = section.get("gc_interval") {
            config.cache.gc_interval = integer_value("cache", "gc_interval", v)?;
        }
    }

    // [download]
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("timeout") {
            let timeout = integer_value("download", "timeout", v)?;
            if timeout == 0 {
                return Err(invalid(
                    "download",
                    "timeout",
                    v,
                    "must be a positive integer (seconds)",
                ));
            }
            config.download.timeout = timeout;
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn size_value(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    parse_size(value).map_err(|_| {
        invalid(
            section,
            key,
            value,
            "expected format like '1GB', '256MB', or '512KB'",
        )
    })
}

fn integer_value(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

/// Parse a boolean value. Anything but a true-ish word is false.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
