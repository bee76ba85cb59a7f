use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use snafu::{OptionExt as _, ResultExt as _, Snafu};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Point in time, in microseconds since the UNIX epoch
///
/// Encoded as fixed-size big-endian in storage, so byte order of keys
/// matches time order. Rendered as RFC 3339 in text.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u64::MAX);

    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros())
            .unwrap_or_default();
        Self(u64::try_from(micros).unwrap_or(u64::MAX))
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }

    pub fn to_offset_date_time(self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1000).ok()
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u64 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self
            .to_offset_date_time()
            .and_then(|t| t.format(&Rfc3339).ok())
        {
            Some(s) => f.write_str(&s),
            // Outside the range `time` can represent
            None => write!(f, "@{}", self.0),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum TimestampParseError {
    #[snafu(display("Invalid RFC 3339 timestamp"))]
    Format { source: time::error::Parse },
    #[snafu(display("Timestamp before the UNIX epoch"))]
    OutOfRange,
}

impl FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = OffsetDateTime::parse(s, &Rfc3339).context(FormatSnafu)?;
        let micros = u64::try_from(t.unix_timestamp_nanos() / 1000)
            .ok()
            .context(OutOfRangeSnafu)?;
        Ok(Self(micros))
    }
}

crate::impl_serde_via_str!(Timestamp);
