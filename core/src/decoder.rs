use crate::config::ModemConfig;
use crate::detector::{classify, threshold, ToneDetector};
use crate::error::{ModemError, Result};
use crate::filter::BandPass;
use crate::framing::Framer;
use crate::sync::{FrameSynchronizer, SyncPoint};
use log::debug;
use std::borrow::Cow;

/// Recovers payloads from captured audio.
///
/// Pipeline: band-pass (optional) → preamble search → per-slot carrier energy
/// → adaptive threshold → majority vote and CRC check.
pub struct Decoder {
    config: ModemConfig,
    framer: Framer,
    detector: ToneDetector,
    synchronizer: FrameSynchronizer,
    bandpass: Option<BandPass>,
}

impl Decoder {
    pub fn new(config: ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_validated(config))
    }

    fn with_validated(config: ModemConfig) -> Self {
        let bandpass = config.bandpass_half_width_hz.map(|half_width| {
            BandPass::new(config.carrier_hz, half_width, config.sample_rate_hz as f32)
        });
        Self {
            framer: Framer::from_config(&config),
            detector: ToneDetector::new(&config),
            synchronizer: FrameSynchronizer::new(&config),
            bandpass,
            config,
        }
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Decode the first frame found in `samples` that passes its CRC.
    ///
    /// Preamble alignments are tried earliest first. One that leads to a bad
    /// length field, a short capture or a CRC mismatch is skipped and the search
    /// resumes after it, so noise that happens to look like a preamble cannot
    /// hide a real frame behind it. When nothing decodes, the error from the
    /// earliest alignment is returned (`NotFound` if there was none). Bytes are
    /// only returned after the CRC matches.
    pub fn decode(&self, samples: &[f32]) -> Result<Vec<u8>> {
        let conditioned: Cow<[f32]> = match &self.bandpass {
            Some(filter) => Cow::Owned(filter.apply(samples)),
            None => Cow::Borrowed(samples),
        };

        let mut first_error = None;
        for sync in self.synchronizer.search(&conditioned) {
            match self.decode_at(&conditioned, sync) {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    debug!("Rejected frame at sample {}: {}", sync.start_offset, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error.unwrap_or(ModemError::NotFound))
    }

    fn decode_at(&self, samples: &[f32], sync: SyncPoint) -> Result<Vec<u8>> {
        let max_slots = self.config.frame_slots(self.config.max_payload_bytes);
        let energies = self.detector.slot_energies(
            samples,
            sync.start_offset,
            max_slots.min(sync.slot_count),
        );

        let preamble_slots = self.framer.preamble_slots();
        let preamble = energies.get(..preamble_slots).ok_or(ModemError::NotFound)?;
        let level = threshold(preamble);
        debug!(
            "Decision level {:.3e} from {} preamble slots, {} slots read",
            level,
            preamble_slots,
            energies.len()
        );

        let slots = classify(&energies, level);
        let payload = self.framer.deframe(&slots)?;
        debug!("Decoded {} byte payload", payload.len());
        Ok(payload)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::with_validated(ModemConfig::default())
    }
}
