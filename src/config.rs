//!
//! Simulation parameters, loaded from YAML.
//!
//! Every field carries the default of the reference model, so an empty
//! document (or no document at all) describes a valid run:
//!
//! ```
//! # use wsnsim::config::*;
//! let cfg = CsmaConfig::from_yaml_str("num_nodes: 2\nmac_max_be: 6").unwrap();
//! assert_eq!(cfg.num_nodes, 2);
//! assert_eq!(cfg.mac_min_be, 3);
//! assert_eq!(cfg.mac_max_be, 6);
//! ```

use crate::time::Duration;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    error::Error,
    fmt::{Debug, Display},
    path::Path,
};

/// An error raised while loading or validating a configuration.
pub struct ConfigError {
    kind: ConfigErrorKind,
    internal: String,
}

impl ConfigError {
    fn new(kind: ConfigErrorKind, internal: impl Into<String>) -> Self {
        Self {
            kind,
            internal: internal.into(),
        }
    }

    fn invalid(internal: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Invalid, internal)
    }

    /// Returns the kind of the error.
    #[must_use]
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.internal
    }
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.internal, self.kind)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.internal, self.kind)
    }
}

impl Error for ConfigError {}

/// The kind of configuration errors that can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigErrorKind {
    /// The configuration file could not be read.
    Io,
    /// The document is not valid YAML, or does not match the expected layout.
    Parse,
    /// The document parsed, but a parameter is out of range.
    Invalid,
}

impl Display for ConfigErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Io => "EIO",
                Self::Parse => "EPARSE",
                Self::Invalid => "EINVAL",
            }
        )
    }
}

fn load_str<T: DeserializeOwned>(s: &str) -> Result<T, ConfigError> {
    // An empty document is the null value, which is not a mapping.
    if s.trim().is_empty() {
        return serde_yml::from_str("{}")
            .map_err(|e| ConfigError::new(ConfigErrorKind::Parse, e.to_string()));
    }
    serde_yml::from_str(s).map_err(|e| ConfigError::new(ConfigErrorKind::Parse, e.to_string()))
}

fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::new(
            ConfigErrorKind::Io,
            format!("failed to read '{}': {e}", path.display()),
        )
    })?;
    load_str(&raw)
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(format!(
            "{name} must be a positive, finite number (got {value})"
        )))
    }
}

// Rounded to whole nanoseconds, so that 0.00032 is exactly 320µs.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn secs(value: f64) -> Duration {
    Duration::from_nanos((value * 1e9).round() as u64)
}

///
/// Parameters of the slotted CSMA/CA model.
///
/// Durations are given in seconds, powers in mW, so energies are in mJ.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsmaConfig {
    /// Number of sensor nodes sharing the channel.
    pub num_nodes: usize,
    /// Packets each node sends before it stops.
    pub packets_to_send: u32,
    pub mac_min_be: u32,
    pub mac_max_be: u32,
    pub mac_max_csma_backoffs: u32,
    /// `D_bp`, the length of one backoff period.
    pub backoff_period: f64,
    /// `Dp`, the airtime of one data frame.
    pub packet_duration: f64,
    /// Time a clear channel assessment keeps the receiver on.
    pub cca_duration: f64,
    pub p_rx: f64,
    pub p_tx: f64,
    /// Distance between two packet creation times.
    pub inter_packet_gap: f64,
    /// The small offset separating the steps of a transmission.
    pub epsilon: f64,
}

impl Default for CsmaConfig {
    fn default() -> Self {
        let backoff_period = 0.00032;
        Self {
            num_nodes: 5,
            packets_to_send: 100,
            mac_min_be: 3,
            mac_max_be: 5,
            mac_max_csma_backoffs: 4,
            backoff_period,
            packet_duration: 0.004_256,
            cca_duration: backoff_period / 20.0 * 8.0,
            p_rx: 56.4,
            p_tx: 49.5,
            inter_packet_gap: 5.0,
            epsilon: 0.000_001,
        }
    }
}

impl CsmaConfig {
    /// Parses and validates a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or a parameter is out of range.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = load_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads, parses and validates a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed or a parameter is out of range.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let cfg: Self = load_file(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks all parameters.
    ///
    /// # Errors
    ///
    /// Returns an [`ConfigErrorKind::Invalid`] error naming the first offending parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_nodes == 0 {
            return Err(ConfigError::invalid("num_nodes must be at least 1"));
        }
        if self.mac_min_be > self.mac_max_be {
            return Err(ConfigError::invalid(format!(
                "mac_min_be ({}) must not exceed mac_max_be ({})",
                self.mac_min_be, self.mac_max_be
            )));
        }
        if self.mac_max_be > 16 {
            return Err(ConfigError::invalid(format!(
                "mac_max_be must be at most 16 (got {})",
                self.mac_max_be
            )));
        }

        positive("backoff_period", self.backoff_period)?;
        positive("packet_duration", self.packet_duration)?;
        positive("cca_duration", self.cca_duration)?;
        positive("inter_packet_gap", self.inter_packet_gap)?;
        positive("epsilon", self.epsilon)?;
        if self.p_rx < 0.0 || self.p_tx < 0.0 {
            return Err(ConfigError::invalid("powers must not be negative"));
        }

        if self.epsilon >= self.backoff_period {
            return Err(ConfigError::invalid(format!(
                "epsilon ({}) must be smaller than backoff_period ({})",
                self.epsilon, self.backoff_period
            )));
        }
        Ok(())
    }

    /// `D_bp` as a duration.
    #[must_use]
    pub fn backoff_period(&self) -> Duration {
        secs(self.backoff_period)
    }

    /// `Dp` as a duration.
    #[must_use]
    pub fn packet_duration(&self) -> Duration {
        secs(self.packet_duration)
    }

    #[must_use]
    pub fn inter_packet_gap(&self) -> Duration {
        secs(self.inter_packet_gap)
    }

    #[must_use]
    pub fn epsilon(&self) -> Duration {
        secs(self.epsilon)
    }
}

/// How the wireless channel decides whether a frame is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLoss {
    /// Loss grows linearly with the distance to the mobile sink.
    #[default]
    Distance,
    /// Only the phase gates apply, nothing is lost at random.
    None,
}

///
/// Parameters of the mobile sink dual-beacon model.
///
/// Distances are in m, durations in s, powers in mW.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DualBeaconConfig {
    /// `R`, the range in which long-range beacons are heard.
    pub discovery_range: f64,
    /// `r`, the range in which short-range beacons, data and acks are heard.
    pub communication_range: f64,
    pub sensor_x: f64,
    pub sensor_y: f64,
    /// The lane the mobile sink drives on.
    pub sink_y: f64,
    pub speed: f64,
    /// Position update interval.
    pub delta: f64,
    /// `T_bi`, the beacon interval.
    pub beacon_interval: f64,
    pub duty_low: f64,
    pub duty_high: f64,
    pub packet_duration: f64,
    pub ack_duration: f64,
    /// Propagation and processing slack, counted twice in the transmission timeout.
    pub sigma: f64,
    /// Bytes per data packet.
    pub packet_length: u32,
    pub p_rx: f64,
    pub p_tx: f64,
    pub total_passages: u32,
    pub max_ack_misses: u32,
    pub loss: ChannelLoss,
}

impl Default for DualBeaconConfig {
    fn default() -> Self {
        Self {
            discovery_range: 100.0,
            communication_range: 50.0,
            sensor_x: 0.0,
            sensor_y: 0.0,
            sink_y: 15.0,
            speed: 11.111,
            delta: 0.001,
            beacon_interval: 0.1,
            duty_low: 0.01,
            duty_high: 0.1,
            packet_duration: 0.004_256,
            ack_duration: 0.000_352,
            sigma: 0.0001,
            packet_length: 127,
            p_rx: 56.4,
            p_tx: 49.5,
            total_passages: 10,
            max_ack_misses: 3,
            loss: ChannelLoss::Distance,
        }
    }
}

impl DualBeaconConfig {
    /// Parses and validates a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or a parameter is out of range.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = load_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads, parses and validates a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed or a parameter is out of range.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let cfg: Self = load_file(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks all parameters.
    ///
    /// # Errors
    ///
    /// Returns an [`ConfigErrorKind::Invalid`] error naming the first offending parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("communication_range", self.communication_range)?;
        if self.communication_range > self.discovery_range {
            return Err(ConfigError::invalid(format!(
                "communication_range ({}) must not exceed discovery_range ({})",
                self.communication_range, self.discovery_range
            )));
        }

        positive("duty_low", self.duty_low)?;
        if self.duty_low > self.duty_high || self.duty_high > 1.0 {
            return Err(ConfigError::invalid(format!(
                "duty cycles must satisfy 0 < duty_low ({}) <= duty_high ({}) <= 1",
                self.duty_low, self.duty_high
            )));
        }

        positive("speed", self.speed)?;
        positive("delta", self.delta)?;
        positive("beacon_interval", self.beacon_interval)?;
        positive("packet_duration", self.packet_duration)?;
        positive("ack_duration", self.ack_duration)?;
        positive("sigma", self.sigma)?;
        if self.p_rx < 0.0 || self.p_tx < 0.0 {
            return Err(ConfigError::invalid("powers must not be negative"));
        }

        if self.total_passages == 0 {
            return Err(ConfigError::invalid("total_passages must be at least 1"));
        }
        if self.max_ack_misses == 0 {
            return Err(ConfigError::invalid("max_ack_misses must be at least 1"));
        }
        Ok(())
    }

    /// `T_on`, the length of one radio-on window.
    #[must_use]
    pub fn t_on(&self) -> f64 {
        2.0 * self.beacon_interval
    }

    /// Radio-off time in low duty mode.
    #[must_use]
    pub fn t_off_low(&self) -> f64 {
        self.t_on() * (1.0 - self.duty_low) / self.duty_low
    }

    /// Radio-off time in high duty mode.
    #[must_use]
    pub fn t_off_high(&self) -> f64 {
        self.t_on() * (1.0 - self.duty_high) / self.duty_high
    }

    /// Time a sender waits for an ack before it retransmits.
    #[must_use]
    pub fn tx_timeout(&self) -> f64 {
        2.0 * self.sigma + self.ack_duration + self.packet_duration
    }

    /// The point where every passage begins, just outside the discovery range.
    #[must_use]
    pub fn start_position(&self) -> (f64, f64) {
        (-(self.discovery_range + 1.0), self.sink_y)
    }

    /// The point where every passage ends.
    #[must_use]
    pub fn end_position(&self) -> (f64, f64) {
        (self.discovery_range + 1.0, self.sink_y)
    }
}
