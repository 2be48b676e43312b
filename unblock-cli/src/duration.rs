use anyhow::{bail, Result};
use unblock_types::Microseconds;

/// Suffix to microseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("µs", 1.0),
    ("us", 1.0),
    ("ms", 1_000.0),
    ("s", 1_000_000.0),
    ("m", 60_000_000.0),
];

/// Parse threshold strings like "250ms", "1.5s", "800us" or "2m".
///
/// A bare number is taken as milliseconds, matching the `*_ms` settings.
pub fn parse_duration(s: &str) -> Result<Microseconds> {
    let s = s.trim();

    if let Ok(millis) = s.parse::<u64>() {
        return Ok(Microseconds::from_millis(millis));
    }
    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str.trim().parse()?;
            if !val.is_finite() || val < 0.0 {
                bail!("Duration must be a positive number: {}", s);
            }
            return Ok(Microseconds::from_micros((val * multiplier) as u64));
        }
    }

    bail!("Unknown duration format: {}", s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_numbers_are_milliseconds() {
        assert_eq!(parse_duration("250").unwrap(), Microseconds::from_millis(250));
    }

    #[test]
    fn test_parses_units() {
        assert_eq!(parse_duration("1.5s").unwrap(), Microseconds::from_millis(1_500));
        assert_eq!(parse_duration("40ms").unwrap(), Microseconds::from_millis(40));
        assert_eq!(parse_duration("800us").unwrap(), Microseconds::from_micros(800));
        assert_eq!(parse_duration("12µs").unwrap(), Microseconds::from_micros(12));
        assert_eq!(parse_duration("2m").unwrap(), Microseconds::from_millis(120_000));
    }

    #[test]
    fn test_huge_numbers_clamp_instead_of_overflowing() {
        let clamped = Microseconds::from_micros(u64::MAX);
        assert_eq!(parse_duration("20000000000000000").unwrap(), clamped);
        assert_eq!(parse_duration("1e30s").unwrap(), clamped);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-5ms").is_err());
        assert!(parse_duration("ms").is_err());
    }
}
