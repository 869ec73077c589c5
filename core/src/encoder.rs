use crate::config::ModemConfig;
use crate::error::Result;
use crate::framing::Framer;
use crate::modulator::ToneModulator;
use log::debug;

/// Turns payloads into OOK tone bursts.
///
/// Output: `guard silence | preamble | length | payload | crc16 | guard silence`,
/// where the guard is `config.guard_ms` long (zero by default).
pub struct Encoder {
    config: ModemConfig,
    framer: Framer,
    modulator: ToneModulator,
}

impl Encoder {
    pub fn new(config: ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_validated(config))
    }

    fn with_validated(config: ModemConfig) -> Self {
        Self {
            framer: Framer::from_config(&config),
            modulator: ToneModulator::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Encode a payload into audio samples at `config.sample_rate_hz`.
    ///
    /// Fails with `PayloadTooLarge` before doing any work when the payload is
    /// over `config.max_payload_bytes`.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<f32>> {
        let slots = self.framer.frame(payload)?;
        let burst = self.modulator.modulate(&slots);

        let guard = self.config.guard_samples();
        let mut samples = Vec::with_capacity(burst.len() + 2 * guard);
        samples.resize(guard, 0.0);
        samples.extend_from_slice(&burst);
        samples.resize(samples.len() + guard, 0.0);

        debug!(
            "Encoded {} bytes into {} slots ({} samples, {:.2} s)",
            payload.len(),
            slots.len(),
            samples.len(),
            samples.len() as f32 / self.config.sample_rate_hz as f32
        );
        Ok(samples)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::with_validated(ModemConfig::default())
    }
}
