//! Output file naming.
//!
//! Each result gets its own directory named like the file stem:
//! `<output_dir>/<date>__<model>__<title>/<date>__<model>__<title>`.
//! Callers append the extension.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("invalid regex"));

/// Filename-safe form of `title`. Missing or blank titles become `None`.
#[must_use]
pub fn sanitize_title(title: Option<&str>) -> String {
    let Some(title) = title else {
        return "None".to_string();
    };
    let replaced = title.trim().replace(std::path::MAIN_SEPARATOR, "_");
    let sanitized = UNSAFE_CHARS.replace_all(&replaced, "_");
    if sanitized.is_empty() {
        "None".to_string()
    } else {
        sanitized.into_owned()
    }
}

/// Timestamp used in output names.
#[must_use]
pub fn date_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Base path (without extension) for one result.
#[must_use]
pub fn base_filename(title: Option<&str>, output_dir: &Path, model: &str, date: &str) -> PathBuf {
    let base = format!("{date}__{model}__{}", sanitize_title(title));
    output_dir.join(&base).join(base)
}

/// [`base_filename`], creating its directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn create_base_filename(
    title: Option<&str>,
    output_dir: &Path,
    model: &str,
    date: &str,
) -> std::io::Result<PathBuf> {
    let path = base_filename(title, output_dir, model, date);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(path)
}
