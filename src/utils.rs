//! Utility helpers used across the crate.
//!
//! Human-readable byte formatting, output filename extraction and reading
//! the newline-delimited URL list.
use percent_encoding::percent_decode_str;
use sanitize_filename::sanitize;
use std::io;
use std::path::Path;
use url::Url;

/// Formats a byte count using binary units, e.g. `1536` becomes `"1.5 KiB"`.
///
/// Values below 1024 are printed as plain bytes (`"512 B"`).
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}iB", bytes as f64 / div as f64, PREFIXES[exp])
}

/// Name used when a URL has no usable path segment.
pub const FALLBACK_FILENAME: &str = "output.bin";

/// Basename of the URL's path, used as the output filename.
///
/// Empty trailing segments are skipped, so `https://host/dir/` gives `dir`.
/// Query and fragment never take part. The segment is percent-decoded and
/// sanitized so the result always stays inside the output directory.
pub fn filename_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return FALLBACK_FILENAME.to_string();
    };

    parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
        .map(|segment| sanitize(percent_decode_str(segment).decode_utf8_lossy()))
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Reads a newline-delimited list of URLs, trimming whitespace and skipping blank lines.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid UTF-8.
pub async fn read_url_list(path: &Path) -> io::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}
