//! Name and path syntax rules applied before a request reaches the engine.

use thiserror::Error;

pub const MAX_NAME_CHARS: usize = 255;
pub const MAX_PATH_CHARS: usize = 4096;

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let reject = |reason: &str| Err(ValidationError::InvalidName(reason.to_string()));

    if name.trim().is_empty() {
        return reject("name is empty");
    }
    if name == "." || name == ".." {
        return reject("name is a relative path component");
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return reject("name is longer than 255 characters");
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(ValidationError::InvalidName(format!(
            "name contains forbidden character {c:?}"
        )));
    }

    let upper = name.to_uppercase();
    let base_name = upper.split('.').next().unwrap_or("");
    if RESERVED_NAMES.contains(&base_name) {
        return reject("name is reserved");
    }

    Ok(())
}

pub fn validate_path(path: &str) -> Result<(), ValidationError> {
    let reject = |reason: &str| Err(ValidationError::InvalidPath(reason.to_string()));

    if path.trim().is_empty() {
        return reject("path is empty");
    }
    if path.contains("..") {
        return reject("path contains '..'");
    }
    if path.chars().count() > MAX_PATH_CHARS {
        return reject("path is longer than 4096 characters");
    }
    if path.chars().any(char::is_control) {
        return reject("path contains control characters");
    }

    Ok(())
}

/// Like [`validate_path`], but accepts the root sentinel `""`.
pub fn validate_target_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Ok(());
    }
    validate_path(path)
}
