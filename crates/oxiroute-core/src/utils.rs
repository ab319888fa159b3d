//! Utility helpers: path resolution and key masking.

use std::path::PathBuf;

/// Get the Oxiroute data directory (e.g. `~/.oxiroute/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".oxiroute")
}

/// Mask an API key for logs and status output.
///
/// Keeps the first four and last four characters of keys longer than
/// twelve characters; shorter keys are fully masked.
pub fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 12 {
        return "*".repeat(count.max(3));
    }
    let head: String = key.chars().take(4).collect();
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{head}…{tail}")
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(rest)
    } else if path == "~" {
        home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else {
        PathBuf::from(path)
    }
}

fn home_dir() -> Option<PathBuf> {
    dirs_next::home_dir()
}
