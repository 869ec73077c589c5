use crate::error::{ModemError, Result};
use crate::framing::{LENGTH_FIELD_BITS, PREAMBLE, CRC_BITS};
use std::time::Duration;

/// Default OOK carrier (Hz). Sits above most speech energy and well inside
/// what phone speakers and laptop microphones reproduce.
pub const DEFAULT_CARRIER_HZ: f32 = 2400.0;
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 48000;
/// 100 baud = 10 ms bit slots
pub const DEFAULT_BAUD: u32 = 100;
pub const DEFAULT_REPETITION: usize = 3;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 128;
pub const DEFAULT_AMPLITUDE: f32 = 0.8;
/// Half width of the decode band-pass: 2000-2800 Hz around the default carrier.
pub const DEFAULT_BANDPASS_HALF_WIDTH_HZ: f32 = 400.0;
pub const DEFAULT_SYNC_STEPS_PER_SLOT: usize = 4;
pub const DEFAULT_MIN_SYNC_SCORE: f32 = 0.8;

/// Shortest slot the detector can resolve a carrier in.
const MIN_SAMPLES_PER_SLOT: usize = 16;

/// The length field is a single byte.
pub const MAX_LENGTH_FIELD_VALUE: usize = (1 << LENGTH_FIELD_BITS) - 1;

/// Modem configuration, passed by value or reference into every call.
///
/// Encoder and decoder must agree on `carrier_hz`, `sample_rate_hz`, `baud`
/// and `repetition`. The remaining fields tune one side only.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModemConfig {
    pub carrier_hz: f32,
    pub sample_rate_hz: u32,
    /// Bit slots per second
    pub baud: u32,
    /// Copies of every frame bit (and preamble chip)
    pub repetition: usize,
    pub max_payload_bytes: usize,
    pub amplitude: f32,
    /// `None` skips the decode pre-filter
    pub bandpass_half_width_hz: Option<f32>,
    /// Candidate start offsets tried per slot while searching for the preamble
    pub sync_steps_per_slot: usize,
    /// Minimum preamble correlation (0, 1] accepted as a frame
    pub min_sync_score: f32,
    /// Silence emitted before and after the burst
    pub guard_ms: u32,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            carrier_hz: DEFAULT_CARRIER_HZ,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            baud: DEFAULT_BAUD,
            repetition: DEFAULT_REPETITION,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            amplitude: DEFAULT_AMPLITUDE,
            bandpass_half_width_hz: Some(DEFAULT_BANDPASS_HALF_WIDTH_HZ),
            sync_steps_per_slot: DEFAULT_SYNC_STEPS_PER_SLOT,
            min_sync_score: DEFAULT_MIN_SYNC_SCORE,
            guard_ms: 0,
        }
    }
}

impl ModemConfig {
    pub fn with_carrier_hz(mut self, carrier_hz: f32) -> Self {
        self.carrier_hz = carrier_hz;
        self
    }

    pub fn with_sample_rate_hz(mut self, sample_rate_hz: u32) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self
    }

    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn with_repetition(mut self, repetition: usize) -> Self {
        self.repetition = repetition;
        self
    }

    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    pub fn with_guard_ms(mut self, guard_ms: u32) -> Self {
        self.guard_ms = guard_ms;
        self
    }

    pub fn with_bandpass(mut self, half_width_hz: Option<f32>) -> Self {
        self.bandpass_half_width_hz = half_width_hz;
        self
    }

    pub fn nyquist_hz(&self) -> f32 {
        self.sample_rate_hz as f32 / 2.0
    }

    pub fn samples_per_slot(&self) -> usize {
        if self.baud == 0 {
            return 0;
        }
        (self.sample_rate_hz / self.baud) as usize
    }

    /// Slots taken by the preamble (every chip is repeated like a data bit)
    pub fn preamble_slots(&self) -> usize {
        PREAMBLE.len() * self.repetition
    }

    /// Slots taken by a whole frame carrying `payload_len` bytes
    pub fn frame_slots(&self, payload_len: usize) -> usize {
        self.preamble_slots() + (LENGTH_FIELD_BITS + 8 * payload_len + CRC_BITS) * self.repetition
    }

    pub fn guard_samples(&self) -> usize {
        (self.sample_rate_hz as u64 * self.guard_ms as u64 / 1000) as usize
    }

    /// Burst duration for a payload, guard silence included.
    pub fn airtime(&self, payload_len: usize) -> Duration {
        if self.sample_rate_hz == 0 {
            return Duration::ZERO;
        }
        let samples =
            self.frame_slots(payload_len) * self.samples_per_slot() + 2 * self.guard_samples();
        Duration::from_secs_f64(samples as f64 / self.sample_rate_hz as f64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz == 0 {
            return Err(invalid("sample_rate_hz must be positive"));
        }
        if self.baud == 0 {
            return Err(invalid("baud must be positive"));
        }
        if self.sample_rate_hz % self.baud != 0 {
            return Err(ModemError::InvalidConfig(format!(
                "baud {} does not divide sample rate {} Hz into whole-sample slots",
                self.baud, self.sample_rate_hz
            )));
        }
        let samples_per_slot = self.samples_per_slot();
        if samples_per_slot < MIN_SAMPLES_PER_SLOT {
            return Err(ModemError::InvalidConfig(format!(
                "{} samples per slot is too short (baud {} at {} Hz, minimum {})",
                samples_per_slot, self.baud, self.sample_rate_hz, MIN_SAMPLES_PER_SLOT
            )));
        }
        let nyquist = self.nyquist_hz();
        if !(self.carrier_hz > 0.0 && self.carrier_hz < nyquist) {
            return Err(ModemError::InvalidConfig(format!(
                "carrier {} Hz must lie in (0, {}) Hz",
                self.carrier_hz, nyquist
            )));
        }
        if self.repetition == 0 {
            return Err(invalid("repetition must be at least 1"));
        }
        if self.max_payload_bytes > MAX_LENGTH_FIELD_VALUE {
            return Err(ModemError::InvalidConfig(format!(
                "max_payload_bytes {} exceeds the {}-bit length field",
                self.max_payload_bytes, LENGTH_FIELD_BITS
            )));
        }
        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(invalid("amplitude must lie in (0, 1]"));
        }
        if let Some(half_width) = self.bandpass_half_width_hz {
            if !(half_width > 0.0)
                || self.carrier_hz - half_width <= 0.0
                || self.carrier_hz + half_width >= nyquist
            {
                return Err(ModemError::InvalidConfig(format!(
                    "band-pass {}±{} Hz must lie inside (0, {}) Hz",
                    self.carrier_hz, half_width, nyquist
                )));
            }
        }
        if self.sync_steps_per_slot == 0 || self.sync_steps_per_slot > samples_per_slot {
            return Err(invalid("sync_steps_per_slot must lie in 1..=samples_per_slot"));
        }
        if !(self.min_sync_score > 0.0 && self.min_sync_score <= 1.0) {
            return Err(invalid("min_sync_score must lie in (0, 1]"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ModemError {
    ModemError::InvalidConfig(reason.to_string())
}
