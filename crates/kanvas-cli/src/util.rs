//! Shared helpers for CLI commands

use std::path::Path;

/// Format a byte size as a human-readable string
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = None;
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = Some(next);
    }
    match unit {
        Some(unit) => format!("{:.2} {}", value, unit),
        None => format!("{} B", bytes),
    }
}

/// Bundle name derived from a snapshot path: `shop.graph.yaml` → `shop`
#[must_use]
pub fn bundle_name(snapshot: &Path) -> String {
    snapshot
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .filter(|n| !n.is_empty())
        .unwrap_or("kanvas")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn test_bundle_name() {
        assert_eq!(bundle_name(Path::new("graphs/shop.graph.yaml")), "shop");
        assert_eq!(bundle_name(Path::new("web.json")), "web");
        assert_eq!(bundle_name(Path::new(".hidden")), "kanvas");
    }
}
