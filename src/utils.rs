//! Utility functions for log previews, filenames, and file system checks.

use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a char boundary at or below `max` bytes, with the
/// number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Turn a title into a filesystem-safe base name.
///
/// Whitespace and comma runs become `_`, characters forbidden on common
/// filesystems are dropped, leading/trailing underscores are trimmed, and the
/// result is capped at 100 characters. May return an empty string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(safe_filename("Messi, Suárez: reunion?"), "Messi_Suárez_reunion");
/// ```
pub fn safe_filename(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut in_sep = false;
    for c in title.trim().chars() {
        if c.is_whitespace() || c == ',' {
            if !in_sep {
                out.push('_');
                in_sep = true;
            }
            continue;
        }
        in_sep = false;
        if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '\'') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').chars().take(100).collect()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let check_path = format!("{}/..__write_check__", path.trim_end_matches('/'));
    stdfs::File::create(&check_path)?;
    let _ = stdfs::remove_file(&check_path);
    info!("Directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        // 'é' is two bytes; byte 3 falls inside the second one.
        let result = truncate_for_log("éééé", 3);
        assert_eq!(result, "é…(+6 bytes)");
    }

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("Messi, Suárez: reunion?"), "Messi_Suárez_reunion");
        assert_eq!(safe_filename("  Hello   World  "), "Hello_World");
        assert_eq!(safe_filename("a/b\\c|d*e\"f'g"), "abcdefg");
        assert_eq!(safe_filename("Batch Update #3"), "Batch_Update_#3");
    }

    #[test]
    fn test_safe_filename_empty() {
        assert_eq!(safe_filename(""), "");
        assert_eq!(safe_filename(" ,, ? "), "");
    }

    #[test]
    fn test_safe_filename_caps_length() {
        assert_eq!(safe_filename(&"x".repeat(300)).chars().count(), 100);
    }

    #[tokio::test]
    async fn test_ensure_writable_dir() {
        let dir = std::env::temp_dir().join(format!("asd_writable_{}", std::process::id()));
        let path = dir.to_str().unwrap().to_string();
        ensure_writable_dir(&path).await.unwrap();
        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
