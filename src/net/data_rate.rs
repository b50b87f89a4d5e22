use crate::time::Duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{error::Error, fmt::Display, str::FromStr};

///
/// A transmission rate in bit/s.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataRate(u64);

impl DataRate {
    /// Creates a data rate from bits per second.
    #[must_use]
    pub const fn from_bps(bps: u64) -> Self {
        Self(bps)
    }

    /// The rate in bits per second.
    #[must_use]
    pub const fn bps(&self) -> u64 {
        self.0
    }

    ///
    /// The time required to serialize `bytes` onto a medium
    /// with this rate.
    ///
    /// A rate of zero is treated as infinitely fast.
    ///
    #[must_use]
    pub fn tx_time(&self, bytes: usize) -> Duration {
        if self.0 == 0 {
            return Duration::ZERO;
        }
        let bits = bytes as u128 * 8;
        let nanos = bits * 1_000_000_000 / u128::from(self.0);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl Default for DataRate {
    fn default() -> Self {
        Self(0xffff_ffff)
    }
}

impl Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

/// An error returned when parsing a [`DataRate`] fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseDataRateError {
    /// The numeric part could not be parsed.
    InvalidNumber(String),
    /// The unit suffix is not known.
    UnknownUnit(String),
}

impl Display for ParseDataRateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber(s) => write!(f, "invalid data rate value: '{s}'"),
            Self::UnknownUnit(s) => write!(f, "unknown data rate unit: '{s}'"),
        }
    }
}

impl Error for ParseDataRateError {}

impl FromStr for DataRate {
    type Err = ParseDataRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (value, unit) = s.split_at(split);

        let value = value
            .parse::<f64>()
            .map_err(|_| ParseDataRateError::InvalidNumber(value.to_string()))?;

        let factor = match unit.trim() {
            "bps" | "b/s" => 1.0,
            "Bps" | "B/s" => 8.0,
            "kbps" | "kb/s" | "Kbps" => 1e3,
            "kBps" | "kB/s" | "KBps" => 8e3,
            "Mbps" | "Mb/s" => 1e6,
            "MBps" | "MB/s" => 8e6,
            "Gbps" | "Gb/s" => 1e9,
            "GBps" | "GB/s" => 8e9,
            other => return Err(ParseDataRateError::UnknownUnit(other.to_string())),
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Self((value * factor).round() as u64))
    }
}

impl Serialize for DataRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units() {
        assert_eq!("100Mbps".parse(), Ok(DataRate::from_bps(100_000_000)));
        assert_eq!("1.5 Gbps".parse(), Ok(DataRate::from_bps(1_500_000_000)));
        assert_eq!("10kB/s".parse(), Ok(DataRate::from_bps(80_000)));
        assert_eq!("800bps".parse(), Ok(DataRate::from_bps(800)));

        assert_eq!(
            "10 furlongs".parse::<DataRate>(),
            Err(ParseDataRateError::UnknownUnit("furlongs".to_string()))
        );
        assert!(matches!(
            "Mbps".parse::<DataRate>(),
            Err(ParseDataRateError::InvalidNumber(_))
        ));
    }

    #[test]
    fn display_roundtrips() {
        let rate = DataRate::from_bps(12_345);
        assert_eq!(rate.to_string().parse(), Ok(rate));
    }

    #[test]
    fn serialization_time() {
        let rate = DataRate::from_bps(8_000);
        assert_eq!(rate.tx_time(1), Duration::from_millis(1));
        assert_eq!(rate.tx_time(1000), Duration::from_secs(1));
        assert_eq!(DataRate::from_bps(0).tx_time(1000), Duration::ZERO);
    }
}
