use crate::config::ModemConfig;
use std::f32::consts::PI;

/// Fraction of a slot spent ramping the carrier up or down at on/off edges
const EDGE_RAMP_RATIO: f32 = 1.0 / 16.0;

/// On-off keying modulator: one slot of carrier for `1`, one slot of silence for `0`.
///
/// The carrier phase runs continuously from the first sample of the burst, so
/// back-to-back `1` slots form one unbroken tone. Where the carrier switches on
/// or off, a raised-cosine ramp inside the `1` slot softens the edge. There is
/// no gap between slots.
pub struct ToneModulator {
    sample_rate: f32,
    carrier_hz: f32,
    amplitude: f32,
    samples_per_slot: usize,
    ramp: Vec<f32>,
}

impl ToneModulator {
    pub fn new(config: &ModemConfig) -> Self {
        let samples_per_slot = config.samples_per_slot();
        let ramp_len = ((samples_per_slot as f32 * EDGE_RAMP_RATIO).round() as usize)
            .max(1)
            .min(samples_per_slot / 2);
        Self {
            sample_rate: config.sample_rate_hz as f32,
            carrier_hz: config.carrier_hz,
            amplitude: config.amplitude,
            samples_per_slot,
            ramp: raised_cosine_ramp(ramp_len),
        }
    }

    pub fn samples_per_slot(&self) -> usize {
        self.samples_per_slot
    }

    /// Modulate a slot sequence. Output length is `bits.len() * samples_per_slot`.
    pub fn modulate(&self, bits: &[bool]) -> Vec<f32> {
        let mut samples = vec![0.0f32; bits.len() * self.samples_per_slot];
        // f64 phase keeps long bursts from drifting
        let omega = 2.0 * std::f64::consts::PI * self.carrier_hz as f64 / self.sample_rate as f64;

        for (slot, &bit) in bits.iter().enumerate() {
            if !bit {
                continue;
            }
            let start = slot * self.samples_per_slot;
            let window = &mut samples[start..start + self.samples_per_slot];
            for (i, sample) in window.iter_mut().enumerate() {
                let phase = (omega * (start + i) as f64) % (2.0 * std::f64::consts::PI);
                *sample = self.amplitude * (phase as f32).sin();
            }

            let rising = slot == 0 || !bits[slot - 1];
            let falling = slot + 1 == bits.len() || !bits[slot + 1];
            self.shape_edges(window, rising, falling);
        }

        samples
    }

    fn shape_edges(&self, window: &mut [f32], rising: bool, falling: bool) {
        let len = window.len();
        for (i, &gain) in self.ramp.iter().enumerate() {
            if rising {
                window[i] *= gain;
            }
            if falling {
                window[len - 1 - i] *= gain;
            }
        }
    }
}

/// Sine-squared ramp from near 0 up to near 1, excluding both endpoints
fn raised_cosine_ramp(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let progress = (i as f32 + 0.5) / len as f32;
            (PI * progress / 2.0).sin().powi(2)
        })
        .collect()
}
