//! Key extraction from dism's line-oriented output.
//!
//! dism prints `Key : Value` lines. Nothing here validates a schema; each
//! helper pulls one kind of value by prefix match.

/// Language assumed when detection fails.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Value of the first `Key : Value` line whose key matches.
pub fn extract_field(output: &str, key: &str) -> Option<String> {
    let prefix = format!("{} :", key);
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(&prefix))
        .map(|v| v.trim().to_string())
}

/// All `Index : N` values in order.
pub fn extract_indices(output: &str) -> Vec<u32> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("Index :"))
        .filter_map(|v| v.trim().parse().ok())
        .collect()
}

/// Default UI language from `/Get-Intl` output.
pub fn extract_language(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| {
            let rest = line.strip_prefix("Default system UI language")?;
            let value = rest.trim_start().strip_prefix(':')?.trim();
            // Value looks like "en-US" or "zh-CN (Chinese)"
            value.split_whitespace().next().map(str::to_string)
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

/// Parse "12,345,678 bytes" into a byte count.
pub fn parse_size(value: &str) -> u64 {
    let digits: String = value
        .replace(" bytes", "")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// `PackageName :` values, skipping names dism truncated with "...".
pub fn parse_package_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("PackageName :"))
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.contains("..."))
        .map(str::to_string)
        .collect()
}

/// First column of table rows matching `pattern`.
///
/// A pattern wrapped in `*` matches case-insensitively anywhere in the row;
/// any other pattern is a case-sensitive substring.
pub fn table_package_ids(table: &str, pattern: &str) -> Vec<String> {
    let wildcard = pattern.contains('*');
    let needle = pattern.trim_matches('*').to_lowercase();
    table
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            if wildcard {
                line.to_lowercase().contains(&needle)
            } else {
                line.contains(pattern)
            }
        })
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Short display name of a provisioned package
/// (`Microsoft.BingNews_4.2.27001.0_neutral_~_8wekyb3d8bbwe` → `Microsoft.BingNews`).
pub fn short_package_name(full: &str) -> &str {
    full.split('_').next().unwrap_or(full)
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0usize;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < 4 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let units = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    format!("{:.2} {}", bytes as f64 / div as f64, units[exp])
}
