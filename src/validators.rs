//! Validation functions for configuration values and command-line paths.

use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::render::OutputFormat;

/// Longest phrase accepted as a configured affirmative, in words.
const MAX_AFFIRMATIVE_WORDS: usize = 4;

/// Validate a log level or filter directive (`info`, `asktag=debug`, ...).
/// Returns an error message if validation fails, None if valid.
pub fn validate_log_level(level: &str) -> Option<String> {
    let level = level.trim();
    if level.is_empty() {
        return Some("Log level cannot be empty".to_string());
    }

    let is_plain_level = matches!(
        level.to_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    );
    if is_plain_level || (level.contains('=') && EnvFilter::try_new(level).is_ok()) {
        None
    } else {
        Some(format!("Unknown log level: {}", level))
    }
}

/// Validate an output format name.
/// Returns an error message if validation fails, None if valid.
pub fn validate_output_format(format: &str) -> Option<String> {
    match OutputFormat::from_str(format) {
        Some(_) => None,
        None => Some(format!("Unknown output format: {} (expected markdown or json)", format.trim())),
    }
}

/// Validate a configured confirmation phrase.
/// Returns an error message if validation fails, None if valid.
pub fn validate_affirmative(phrase: &str) -> Option<String> {
    let words = phrase.split_whitespace().count();
    if words == 0 {
        Some("Phrase cannot be empty".to_string())
    } else if words > MAX_AFFIRMATIVE_WORDS {
        Some(format!("Phrase is longer than {} words", MAX_AFFIRMATIVE_WORDS))
    } else {
        None
    }
}

/// Check if metadata indicates a valid file (pure function).
/// Returns an error message if validation fails, None if valid.
fn check_file_metadata(is_file: bool) -> Option<String> {
    if !is_file {
        Some("Path is not a file".to_string())
    } else {
        None
    }
}

/// Convert an I/O error to an appropriate error message for file validation.
fn file_error_message(error: &std::io::Error) -> String {
    match error.kind() {
        std::io::ErrorKind::NotFound => "File not found".to_string(),
        std::io::ErrorKind::PermissionDenied => "Cannot access file".to_string(),
        _ => "Invalid path".to_string(),
    }
}

/// Validate that a path points to an existing file.
/// Returns an error message if validation fails, None if valid.
pub fn validate_file_exists(path: &Path) -> Option<String> {
    if path.as_os_str().is_empty() {
        return Some("Path cannot be empty".to_string());
    }

    match std::fs::metadata(path) {
        Ok(metadata) => check_file_metadata(metadata.is_file()),
        Err(e) => Some(file_error_message(&e)),
    }
}

/// Check whether a file may be written (pure function).
fn check_writable_target(exists: bool, force: bool) -> Option<String> {
    if exists && !force {
        Some("File already exists (use --force to overwrite)".to_string())
    } else {
        None
    }
}

/// Validate that a file can be written: its parent directory exists and the
/// file itself does not, unless `force` is set.
pub fn validate_output_path(path: &Path, force: bool) -> Option<String> {
    if path.as_os_str().is_empty() {
        return Some("Path cannot be empty".to_string());
    }

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent
        && !parent.is_dir()
    {
        return Some("Directory not found".to_string());
    }

    check_writable_target(path.exists(), force)
}
