use crate::{Error, Result};
use core::fmt;
use core::str::FromStr;

/// Widest display whose every value still fits in a `u64`.
pub const MAX_DISPLAY_DIGITS: usize = 19;

/// A non-negative counter reading; the sole key used by queues and caches.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Value(pub u64);

impl Value {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Largest value a display of `width` tubes can show.
    pub fn max_for_width(width: usize) -> Self {
        let max = u32::try_from(width)
            .ok()
            .and_then(|w| 10_u64.checked_pow(w))
            .map_or(u64::MAX, |p| p - 1);
        Self(max)
    }

    /// Zero-padded digit string for a display of `width` tubes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if the value has more digits than the
    /// display has tubes.
    pub fn digits(self, width: usize) -> Result<String> {
        let digits = format!("{:0width$}", self.0, width = width);
        if digits.len() > width {
            return Err(Error::InvalidValue {
                reason: format!("{} has more than {width} digits", self.0),
            });
        }
        Ok(digits)
    }

    /// The inclusive window `[self, self + lookahead]`, clamped to `max`.
    pub fn window(self, lookahead: u64, max: Value) -> impl Iterator<Item = Value> {
        let end = self.0.saturating_add(lookahead).min(max.0);
        (self.0..=end).map(Value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Value {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Priority class of a queued render job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Priority {
    /// First-time values; always drained before refresh work.
    Fresh,
    /// Re-renders of values that are already cached.
    Refresh,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => f.write_str("fresh"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

/// Container format of the encoded animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AssetFormat {
    #[default]
    Gif,
    Webp,
    Apng,
}

impl AssetFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Apng => "png",
        }
    }

    pub const fn media_type(self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Apng => "image/apng",
        }
    }

    /// Name of the ffmpeg muxer producing this format.
    pub const fn muxer(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Apng => "apng",
        }
    }
}

impl FromStr for AssetFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gif" => Ok(Self::Gif),
            "webp" => Ok(Self::Webp),
            "apng" => Ok(Self::Apng),
            other => Err(Error::invalid_config(format!(
                "unknown asset format '{other}' (expected gif, webp or apng)"
            ))),
        }
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.muxer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_are_zero_padded() {
        assert_eq!(Value(42).digits(8).unwrap(), "00000042");
        assert_eq!(Value(0).digits(1).unwrap(), "0");
        assert_eq!(Value(12_345_678).digits(8).unwrap(), "12345678");
    }

    #[test]
    fn digits_reject_values_wider_than_display() {
        let err = Value(123_456_789).digits(8).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
    }

    #[test]
    fn max_for_width_matches_digit_count() {
        assert_eq!(Value::max_for_width(1), Value(9));
        assert_eq!(Value::max_for_width(8), Value(99_999_999));
        assert_eq!(
            Value::max_for_width(MAX_DISPLAY_DIGITS),
            Value(9_999_999_999_999_999_999)
        );
        assert_eq!(Value::max_for_width(40), Value(u64::MAX));
    }

    #[test]
    fn window_is_inclusive_and_clamped() {
        let window: Vec<_> = Value(10).window(5, Value(99)).collect();
        assert_eq!(window, (10..=15).map(Value).collect::<Vec<_>>());

        let clamped: Vec<_> = Value(97).window(5, Value(99)).collect();
        assert_eq!(clamped, vec![Value(97), Value(98), Value(99)]);

        let single: Vec<_> = Value(3).window(0, Value(99)).collect();
        assert_eq!(single, vec![Value(3)]);
    }

    #[test]
    fn asset_format_parses_case_insensitively() {
        assert_eq!("GIF".parse::<AssetFormat>().unwrap(), AssetFormat::Gif);
        assert_eq!("webp".parse::<AssetFormat>().unwrap(), AssetFormat::Webp);
        assert_eq!("apng".parse::<AssetFormat>().unwrap().extension(), "png");
        assert!("mp4".parse::<AssetFormat>().is_err());
    }
}
