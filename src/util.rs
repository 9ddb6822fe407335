/// Compute download progress as a whole percentage, truncated like the
/// status lines render it.
#[must_use]
pub fn percent_complete(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (((downloaded as f64 / total as f64) * 100.0) as u64).min(100) as u8
}

/// Render a byte count as a short human-readable size.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let bytes = bytes as f64;
    if bytes < KIB {
        format!("{bytes:.0} B")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes / KIB)
    } else {
        format!("{:.1} MB", bytes / MIB)
    }
}
