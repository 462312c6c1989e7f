//! Human-readable byte sizes and durations.

use std::time::Duration;

/// Bytes in a kibibyte.
pub const KIB: u64 = 1024;
/// Bytes in a mebibyte.
pub const MIB: u64 = KIB * 1024;
/// Bytes in a gibibyte.
pub const GIB: u64 = MIB * 1024;

const UNITS: [(u64, &str); 3] = [(GIB, "GB"), (MIB, "MB"), (KIB, "KB")];

/// Formats a byte count using the largest fitting binary unit, e.g. `1.50 KB`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    UNITS
        .iter()
        .find(|(size, _)| bytes >= *size)
        .map_or_else(
            || format!("{bytes} B"),
            |(size, unit)| format!("{:.2} {unit}", bytes as f64 / *size as f64),
        )
}

/// Formats a duration as `4.2s`, `3m 07s` or `1h 02m 03s`.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}.{}s", d.subsec_millis() / 100),
        (0, _) => format!("{minutes}m {seconds:02}s"),
        _ => format!("{hours}h {minutes:02}m {seconds:02}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_pick_largest_unit() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(10 * MIB), "10.00 MB");
        assert_eq!(format_bytes(GIB + GIB / 4), "1.25 GB");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::ZERO), "0.0s");
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(187)), "3m 07s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn format_bytes_never_panics(bytes in 0u64..u64::MAX) {
                let _ = format_bytes(bytes);
            }

            #[test]
            fn format_duration_never_panics(millis in 0u64..1_000_000_000) {
                let _ = format_duration(Duration::from_millis(millis));
            }
        }
    }
}
