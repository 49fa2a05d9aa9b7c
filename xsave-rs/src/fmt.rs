//! Provides formatting helpers for the log output of an extraction.
use std::fmt::Write;
use std::time::Duration;

const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

/// Formats a given size in bytes, like the size of a savegame or fragment.
///
/// # Examples
///
/// ```
/// assert_eq!(xsave::fmt::format_size(0), "0 bytes");
/// assert_eq!(xsave::fmt::format_size(1), "1 byte");
/// assert_eq!(xsave::fmt::format_size(1023), "1023 bytes");
/// assert_eq!(xsave::fmt::format_size(8_734), "8.53 KiB");
/// assert_eq!(xsave::fmt::format_size(873_400), "853 KiB");
/// assert_eq!(xsave::fmt::format_size(87_340_000), "83.3 MiB");
/// assert_eq!(xsave::fmt::format_size(8_734_000_000), "8.13 GiB");
/// ```
pub fn format_size(size_in_bytes: u64) -> String {
    match size_in_bytes {
        1 => return "1 byte".to_owned(),
        0..=1023 => return format!("{} bytes", size_in_bytes),
        _ => (),
    }

    let mut size = size_in_bytes as f64 / 1024.;
    let mut unit = 0;
    while size > 1024. && unit < UNITS.len() - 1 {
        size /= 1024.;
        unit += 1;
    }

    if size <= 10. {
        format!("{:.2} {}", size, UNITS[unit])
    } else if size <= 100. {
        format!("{:.1} {}", size, UNITS[unit])
    } else {
        format!("{:.0} {}", size, UNITS[unit])
    }
}

/// Formats a duration into a string like "1h 3m 12s".
///
/// Milliseconds are only shown for durations below one minute, as an extraction usually takes
/// several seconds or even minutes.
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// assert_eq!(xsave::fmt::format_duration(Duration::from_millis(0)), "0ms");
/// assert_eq!(xsave::fmt::format_duration(Duration::from_millis(13)), "13ms");
/// assert_eq!(xsave::fmt::format_duration(Duration::from_millis(1013)), "1s 13ms");
/// assert_eq!(xsave::fmt::format_duration(Duration::from_millis(62_013)), "1m 2s");
/// assert_eq!(xsave::fmt::format_duration(Duration::from_secs(60 * 61)), "1h 1m");
/// assert_eq!(xsave::fmt::format_duration(Duration::from_secs(4 * 60 * 60 + 5)), "4h 5s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let parts = [
        (millis / 3_600_000, "h"),
        (millis / 60_000 % 60, "m"),
        (millis / 1000 % 60, "s"),
        (
            if millis < 60_000 { millis % 1000 } else { 0 },
            "ms",
        ),
    ];

    let mut result = String::new();
    for (value, unit) in parts.iter().filter(|(value, _)| *value > 0) {
        if !result.is_empty() {
            result.push(' ');
        }
        let _ = write!(result, "{}{}", value, unit);
    }

    if result.is_empty() {
        result.push_str("0ms");
    }

    result
}
