//! Host-side view of DHT11/DHT22 sensors hanging off a Firmata board.
//!
//! The board samples each configured pin on its own and keeps the most
//! recent reading cached. Readings that move by at least the pin's
//! differential are additionally pushed to the host as a [`PushReport`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

mod simulated;

pub use simulated::{SAMPLE_PERIOD, SimulatedBoard};

/// Pin mode tag carried by every DHT push report.
pub const PIN_MODE_DHT: u8 = 0x0f;

/// Differential applied when a configuration does not carry one.
pub const DEFAULT_DIFFERENTIAL: f64 = 0.1;

#[derive(Error, Clone, Debug, PartialEq)]
pub enum Error {
    #[error("pin {0} is not configured for DHT sampling")]
    PinNotConfigured(u8),
    #[error("invalid differential {0}")]
    InvalidDifferential(f64),
    #[error("unknown DHT sensor type {0}")]
    UnknownSensorType(u8),
    #[error("board connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Supported members of the DHT sensor family.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SensorType {
    Dht11,
    Dht22,
}

impl SensorType {
    /// Numeric tag used on the wire and in reports.
    pub fn tag(self) -> u8 {
        match self {
            SensorType::Dht11 => 11,
            SensorType::Dht22 => 22,
        }
    }

    /// Measurable relative humidity, in %RH.
    pub fn humidity_range(self) -> (f64, f64) {
        match self {
            SensorType::Dht11 => (20.0, 90.0),
            SensorType::Dht22 => (0.0, 100.0),
        }
    }

    /// Measurable temperature, in °C.
    pub fn temperature_range(self) -> (f64, f64) {
        match self {
            SensorType::Dht11 => (0.0, 50.0),
            SensorType::Dht22 => (-40.0, 80.0),
        }
    }

    /// Round `value` to the sensor's resolution.
    pub fn quantize(self, value: f64) -> f64 {
        let scale = match self {
            SensorType::Dht11 => 1.0,
            SensorType::Dht22 => 10.0,
        };

        (value * scale).round() / scale
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl TryFrom<u8> for SensorType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            11 => Ok(SensorType::Dht11),
            22 => Ok(SensorType::Dht22),
            other => Err(Error::UnknownSensorType(other)),
        }
    }
}

/// Change threshold for push reports.
///
/// Always finite and non-negative.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Differential(f64);

impl Differential {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && value >= 0.0 {
            Ok(Self(value))
        } else {
            Err(Error::InvalidDifferential(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether moving from `previous` to `current` is large enough to
    /// be reported.
    pub fn is_crossed_by(self, previous: f64, current: f64) -> bool {
        (current - previous).abs() >= self.0
    }
}

impl Default for Differential {
    fn default() -> Self {
        Self(DEFAULT_DIFFERENTIAL)
    }
}

/// DHT sampling configuration for a single pin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinConfig {
    pub pin: u8,
    pub sensor_type: SensorType,
    /// `None` leaves the choice to the board, see [`DEFAULT_DIFFERENTIAL`].
    pub differential: Option<Differential>,
}

impl PinConfig {
    pub fn new(pin: u8, sensor_type: SensorType) -> Self {
        Self {
            pin,
            sensor_type,
            differential: None,
        }
    }

    pub fn with_differential(mut self, differential: Differential) -> Self {
        self.differential = Some(differential);
        self
    }

    /// The differential the board actually applies.
    pub fn effective_differential(&self) -> Differential {
        self.differential.unwrap_or_default()
    }
}

/// Most recent reading cached by the board for a pin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Relative humidity, in %RH.
    pub humidity: f64,
    /// Temperature, in °C.
    pub temperature: f64,
    /// Seconds since the Unix epoch.
    pub last_update: i64,
}

/// Unsolicited report pushed by the board when a reading crosses the
/// pin's differential.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PushReport {
    pub pin_mode: u8,
    pub pin: u8,
    pub sensor_type: SensorType,
    pub humidity: f64,
    pub temperature: f64,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

/// Callback invoked by the board client for each [`PushReport`].
pub type ReportCallback = Arc<dyn Fn(&PushReport) + Send + Sync>;

/// Operations a DHT-capable board client offers.
pub trait DhtBoard {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Put `config.pin` into DHT mode, replacing any earlier settings for
    /// that pin. Push reports are delivered to `callback`, if any.
    fn configure_dht(
        &self,
        config: &PinConfig,
        callback: Option<ReportCallback>,
    ) -> impl Future<Output = std::result::Result<(), Self::Error>>;

    /// Last sample cached for `pin`, or `None` if the sensor hasn't
    /// produced one yet.
    fn read_cached_dht(&self, pin: u8) -> impl Future<Output = std::result::Result<Option<Sample>, Self::Error>>;

    /// Close the connection to the board.
    fn shutdown(&self) -> impl Future<Output = std::result::Result<(), Self::Error>>;
}
