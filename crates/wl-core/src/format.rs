//! Duration formatting.

/// Formats whole seconds as a compact duration string.
///
/// Returns "Xh Ym Zs" if >= 1 hour, "Ym Zs" if >= 1 minute, "Zs" otherwise.
/// No zero-padding.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
