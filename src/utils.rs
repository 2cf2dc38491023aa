//! Utility functions for filenames, diagnostics and form values

use rand::RngCore;
use std::path::{Path, PathBuf};

/// Generate `n_bytes` of OS randomness rendered as lowercase hex
pub fn random_hex(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Reduce a client-supplied filename to a safe base name
///
/// Backslashes are treated as separators, only the last path component is
/// kept, and every character outside `[A-Za-z0-9._- ]` is dropped. Returns
/// an empty string when nothing usable is left.
///
/// # Examples
///
/// ```
/// use artifact_broker::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("C:\\Users\\ana\\Diário 03.xlsx"), "Dirio 03.xlsx");
/// assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
/// assert_eq!(sanitize_filename("///"), "");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let normalized = name.replace('\\', "/");
    let base = normalized.rsplit('/').next().unwrap_or_default();

    let kept: String = base
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect();
    let kept = kept.trim();

    // "." and ".." are path components, not filenames
    if kept.chars().all(|c| c == '.') {
        return String::new();
    }

    kept.to_string()
}

/// Append `.{extension}` unless `name` already ends with it (case-insensitive)
pub fn ensure_extension(name: &str, extension: &str) -> String {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    if name.to_lowercase().ends_with(&suffix.to_lowercase()) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}

/// Default location of the backup copy the tool writes next to its input
///
/// `report.xlsx` with suffix `.backup` becomes `report.backup.xlsx`.
pub fn default_backup_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    input.with_file_name(name)
}

/// Trim `s` and keep at most its last `max` characters
///
/// Used to bound the diagnostics kept from an external tool's output. A
/// `max` of zero disables the bound.
pub fn tail_chars(s: &str, max: usize) -> String {
    let s = s.trim();
    if max == 0 {
        return s.to_string();
    }

    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }

    match s.char_indices().nth(count - max) {
        Some((offset, _)) => s[offset..].to_string(),
        None => s.to_string(),
    }
}

/// Parse a form flag that defaults to `true`
///
/// Empty values, unknown words and non-zero integers are `true`; `0`,
/// `false`, `no` and `n` (any case) are `false`.
///
/// # Examples
///
/// ```
/// use artifact_broker::utils::parse_bool_default_true;
///
/// assert!(parse_bool_default_true(""));
/// assert!(parse_bool_default_true("Yes"));
/// assert!(!parse_bool_default_true(" false "));
/// assert!(!parse_bool_default_true("0"));
/// assert!(parse_bool_default_true("-1"));
/// ```
pub fn parse_bool_default_true(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    match value.as_str() {
        "" => true,
        "0" | "false" | "no" | "n" => false,
        "1" | "true" | "yes" | "y" => true,
        other => other.parse::<i64>().map(|n| n != 0).unwrap_or(true),
    }
}

/// `Content-Disposition` value offering `path`'s base name as an attachment
pub fn attachment_disposition(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| sanitize_filename(&n.to_string_lossy()))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "download".to_string());
    format!("attachment; filename=\"{name}\"")
}
