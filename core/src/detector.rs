use crate::config::ModemConfig;
use std::f32::consts::PI;

/// Lower percentile used to estimate the "tone absent" energy level
const LOW_PERCENTILE: f32 = 0.15;

/// Upper percentile used to estimate the "tone present" energy level
const HIGH_PERCENTILE: f32 = 0.85;

/// Single-frequency energy detector (Goertzel) tuned to the carrier.
///
/// Energy is normalized by the squared window length, so a tone of amplitude
/// `A` filling the whole window scores roughly `A² / 4` regardless of slot size.
#[derive(Debug, Clone)]
pub struct ToneDetector {
    coeff: f32,
    samples_per_slot: usize,
}

impl ToneDetector {
    pub fn new(config: &ModemConfig) -> Self {
        // Exact carrier frequency, not the nearest DFT bin: slot lengths need not
        // hold a whole number of carrier cycles.
        let omega = 2.0 * PI * config.carrier_hz / config.sample_rate_hz as f32;
        Self {
            coeff: 2.0 * omega.cos(),
            samples_per_slot: config.samples_per_slot(),
        }
    }

    pub fn samples_per_slot(&self) -> usize {
        self.samples_per_slot
    }

    /// Carrier energy in `window`, with the window's DC offset removed first.
    pub fn energy(&self, window: &[f32]) -> f32 {
        let n = window.len();
        if n == 0 {
            return 0.0;
        }
        let mean = window.iter().sum::<f32>() / n as f32;

        let mut s1 = 0.0f32;
        let mut s2 = 0.0f32;
        for &sample in window {
            let s0 = (sample - mean) + self.coeff * s1 - s2;
            s2 = s1;
            s1 = s0;
        }

        let power = s1 * s1 + s2 * s2 - self.coeff * s1 * s2;
        (power / (n as f32 * n as f32)).max(0.0)
    }

    /// Energies of up to `count` consecutive slots beginning at sample `start`.
    /// Stops early at the first slot that would run past the end of `samples`.
    pub fn slot_energies(&self, samples: &[f32], start: usize, count: usize) -> Vec<f32> {
        let sps = self.samples_per_slot;
        let mut energies = Vec::with_capacity(count);
        for k in 0..count {
            let begin = start + k * sps;
            let Some(window) = samples.get(begin..begin + sps) else {
                break;
            };
            energies.push(self.energy(window));
        }
        energies
    }
}

/// Adaptive on/off decision level for a set of slot energies.
///
/// Returns the midpoint between the 15th and 85th percentile energies. The
/// percentiles pick the position `round(p * (n - 1))` of a sorted copy, so an
/// empty input gives `0.0`, a single slot gives its own energy and identical
/// energies give that common value. Combined with the strict comparison in
/// [`classify`], equal energies therefore all read as tone absent.
pub fn threshold(energies: &[f32]) -> f32 {
    if energies.is_empty() {
        return 0.0;
    }
    let mut sorted = energies.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let low = percentile(&sorted, LOW_PERCENTILE);
    let high = percentile(&sorted, HIGH_PERCENTILE);
    low + (high - low) / 2.0
}

fn percentile(sorted: &[f32], p: f32) -> f32 {
    let index = (p * (sorted.len() - 1) as f32).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// A slot carries the tone when its energy is strictly above `level`.
pub fn classify(energies: &[f32], level: f32) -> Vec<bool> {
    energies.iter().map(|&e| e > level).collect()
}
