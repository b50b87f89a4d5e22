use crate::{
    net::{csma::DEFAULT_MTU, DataRate, EncapsulationMode, QueueLimit},
    time::Duration,
};
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt::Display, path::Path};

///
/// The construction-time attributes of a full-duplex link and its endpoints.
///
/// All fields have defaults, so partial documents are valid:
///
/// ```
/// # use des_ethernet::net::{EthernetConfig, DataRate};
/// let config = EthernetConfig::from_yaml("channel: { data-rate: 100Mbps, delay: 0.002 }").unwrap();
/// assert_eq!(config.channel.data_rate, DataRate::from_bps(100_000_000));
/// assert_eq!(config.device.mtu, 1500);
/// ```
///
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EthernetConfig {
    /// The transmit queue of each endpoint.
    pub queue: QueueConfig,
    /// The endpoint attributes.
    pub device: DeviceConfig,
    /// The link attributes.
    pub channel: ChannelConfig,
}

/// The transmit queue attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QueueConfig {
    /// The bound of the drop-tail queue.
    pub limit: QueueLimit,
}

/// The endpoint attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DeviceConfig {
    /// The MAC-level maximum transmission unit.
    pub mtu: u16,
    /// The encapsulation of outgoing frames.
    pub encapsulation: EncapsulationMode,
    /// The idle time between two transmissions, in seconds.
    #[serde(with = "secs")]
    pub interframe_gap: Duration,
    /// The probability of a received packet being corrupt.
    pub receive_error_rate: Option<f64>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            encapsulation: EncapsulationMode::Dix,
            interframe_gap: Duration::ZERO,
            receive_error_rate: None,
        }
    }
}

/// The link attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChannelConfig {
    /// The data rate of both directions.
    pub data_rate: DataRate,
    /// The propagation delay of both directions, in seconds.
    #[serde(with = "secs")]
    pub delay: Duration,
}

impl EthernetConfig {
    ///
    /// Parses and validates a configuration from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or contains
    /// invalid values.
    ///
    pub fn from_yaml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    ///
    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or
    /// [`EthernetConfig::from_yaml`] fails.
    ///
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_yaml(&s)
    }

    ///
    /// Serializes the configuration to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    ///
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }

    ///
    /// Checks the value ranges of all attributes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first invalid attribute.
    ///
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.mtu == 0 {
            return Err(ConfigError::Invalid("device.mtu must not be zero".to_string()));
        }
        if let Some(rate) = self.device.receive_error_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "device.receive-error-rate must be within [0, 1], got {rate}"
                )));
            }
        }
        Ok(())
    }
}

/// An error returned when loading an [`EthernetConfig`] fails.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(std::io::Error),
    /// The document is not valid YAML, or does not match the schema.
    Yaml(serde_yml::Error),
    /// An attribute has an invalid value.
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config: {e}"),
            Self::Yaml(e) => write!(f, "failed to parse config: {e}"),
            Self::Invalid(s) => write!(f, "invalid config: {s}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Yaml(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_yml::Error> for ConfigError {
    fn from(value: serde_yml::Error) -> Self {
        Self::Yaml(value)
    }
}

// Durations as fractional seconds.
mod secs {
    use crate::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
