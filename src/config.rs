use crate::error::{PhyError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Send clock 100 Hz, listen clock 1 kHz. tokio timers resolve to 1 ms.
const DEFAULT_SEND_CLOCK_PERIOD_US: u64 = 10_000;
const DEFAULT_LISTEN_CLOCK_PERIOD_US: u64 = 1_000;
pub const DEFAULT_MINIMUM_PREAMBLE_BIT_COUNT: u32 = 8;

/// Smallest accepted ratio of send period to listen period.
///
/// The decoder only sees transitions between consecutive samples, so a listen
/// clock close to the line rate aliases transitions away. The decoding
/// algorithm itself does not enforce any ratio.
pub const MIN_OVERSAMPLING_RATIO: u64 = 4;

/// Clock and decoder parameters for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub send_clock_period_us: u64,
    pub listen_clock_period_us: u64,
    pub minimum_preamble_bit_count: u32,
}

impl DeviceConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// `ConfigParse` for malformed JSON, `InvalidConfig` if validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DeviceConfig =
            serde_json::from_str(json).map_err(|e| PhyError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `InvalidConfig` for a zero period, an oversampling ratio below
    /// [`MIN_OVERSAMPLING_RATIO`], or a zero minimum preamble length.
    pub fn validate(&self) -> Result<()> {
        if self.send_clock_period_us == 0 || self.listen_clock_period_us == 0 {
            return Err(PhyError::InvalidConfig(
                "clock periods must be non-zero".to_string(),
            ));
        }

        let ratio = self.send_clock_period_us / self.listen_clock_period_us;
        if ratio < MIN_OVERSAMPLING_RATIO {
            return Err(PhyError::InvalidConfig(format!(
                "oversampling ratio {ratio} below minimum {MIN_OVERSAMPLING_RATIO}"
            )));
        }

        if self.minimum_preamble_bit_count == 0 {
            return Err(PhyError::InvalidConfig(
                "minimum preamble bit count must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn send_clock_period(&self) -> Duration {
        Duration::from_micros(self.send_clock_period_us)
    }

    #[must_use]
    pub fn listen_clock_period(&self) -> Duration {
        Duration::from_micros(self.listen_clock_period_us)
    }

    #[must_use]
    pub fn oversampling_ratio(&self) -> u64 {
        self.send_clock_period_us / self.listen_clock_period_us.max(1)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            send_clock_period_us: DEFAULT_SEND_CLOCK_PERIOD_US,
            listen_clock_period_us: DEFAULT_LISTEN_CLOCK_PERIOD_US,
            minimum_preamble_bit_count: DEFAULT_MINIMUM_PREAMBLE_BIT_COUNT,
        }
    }
}
