use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One seeded booster: a stable sequence number plus the handle it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoosterEntry {
    pub number: i64,
    pub username: String,
}

impl BoosterEntry {
    /// The handle as it will be sent upstream.
    #[must_use]
    pub fn handle(&self) -> String {
        normalize_username(&self.username)
    }
}

#[derive(Debug, Deserialize)]
pub struct BoostersFile {
    pub boosters: Vec<BoosterEntry>,
}

/// Normalize a user-supplied handle into the form the upstream accepts.
///
/// Trims whitespace, drops a leading `@`, cuts everything from the first
/// query-string character (`?`, `&`, `=`) onward, keeps only ASCII
/// alphanumerics and `_`, then lowercases.
#[must_use]
pub fn normalize_username(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_at = trimmed.strip_prefix('@').unwrap_or(trimmed);
    let head = without_at
        .split(['?', '&', '='])
        .next()
        .unwrap_or_default();

    head.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

/// Load and validate the booster seed list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_boosters(path: &Path) -> Result<BoostersFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::BoostersFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let boosters_file: BoostersFile =
        serde_yaml::from_str(&content).map_err(ConfigError::BoostersFileParse)?;

    validate_boosters(&boosters_file)?;

    Ok(boosters_file)
}

fn validate_boosters(boosters_file: &BoostersFile) -> Result<(), ConfigError> {
    let mut seen_numbers = HashSet::new();
    let mut seen_handles = HashSet::new();

    for entry in &boosters_file.boosters {
        if entry.number < 1 {
            return Err(ConfigError::Validation(format!(
                "booster '{}' has invalid number {}; must be positive",
                entry.username, entry.number
            )));
        }

        let handle = entry.handle();
        if handle.is_empty() {
            return Err(ConfigError::Validation(format!(
                "booster #{} has an empty username after normalization",
                entry.number
            )));
        }

        if !seen_numbers.insert(entry.number) {
            return Err(ConfigError::Validation(format!(
                "duplicate booster number: {}",
                entry.number
            )));
        }

        if !seen_handles.insert(handle.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate booster username: '{}' (from '{}')",
                handle, entry.username
            )));
        }
    }

    Ok(())
}
