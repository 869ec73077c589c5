use crate::config::ModemConfig;
use crate::detector::ToneDetector;
use crate::error::{ModemError, Result};
use crate::framing::Framer;
use log::{debug, trace};

/// Candidate alignments whose loudest preamble slot is below this energy are
/// treated as silence rather than correlated.
const MIN_PREAMBLE_ENERGY: f32 = 1e-12;

/// Minimum relative drop from "on" to "off" preamble slots. Rejects steady
/// tones, whose tiny slot-to-slot ripple can still correlate with the pattern.
const MIN_CONTRAST: f32 = 0.5;

/// Width, in preamble chips, of the window searched for the best alignment
/// once a candidate first clears the score threshold.
const REFINE_CHIPS: usize = 2;

/// Where a frame starts inside a capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncPoint {
    /// Sample index of the first preamble slot
    pub start_offset: usize,
    /// Whole slots available from `start_offset` to the end of the capture
    pub slot_count: usize,
    /// Preamble correlation at `start_offset`, in (0, 1]
    pub score: f32,
}

/// Locates the preamble in a capture whose start is not aligned to slot boundaries.
///
/// Candidate start offsets are spaced about `samples_per_slot / sync_steps_per_slot`
/// apart. Each candidate is scored by the Pearson correlation between its
/// preamble slot energies and the known on/off chip pattern, which makes the
/// score independent of playback and microphone gain.
pub struct FrameSynchronizer {
    detector: ToneDetector,
    pattern: Vec<bool>,
    samples_per_slot: usize,
    step: usize,
    repetition: usize,
    min_score: f32,
}

impl FrameSynchronizer {
    pub fn new(config: &ModemConfig) -> Self {
        let samples_per_slot = config.samples_per_slot();
        Self {
            detector: ToneDetector::new(config),
            pattern: Framer::from_config(config).preamble_pattern(),
            samples_per_slot,
            step: candidate_step(samples_per_slot, config.sync_steps_per_slot),
            repetition: config.repetition.max(1),
            min_score: config.min_sync_score,
        }
    }

    /// Spacing between candidate start offsets, in samples
    pub fn step(&self) -> usize {
        self.step
    }

    /// Find the first frame in `samples`.
    ///
    /// The first candidate scoring at least `min_sync_score` opens a refinement
    /// window two preamble chips wide. The best score inside it wins, with ties
    /// going to the earlier offset. Later frames in the same capture are ignored.
    pub fn synchronize(&self, samples: &[f32]) -> Result<SyncPoint> {
        self.search(samples).next().ok_or_else(|| {
            debug!("No preamble alignment reached score {:.2}", self.min_score);
            ModemError::NotFound
        })
    }

    /// Every preamble alignment in `samples`, earliest first.
    ///
    /// Each item is chosen the way [`synchronize`](Self::synchronize) chooses
    /// the first, and the next search resumes one candidate after it. A caller
    /// that rejects a sync point (bad CRC, impossible length) can keep pulling
    /// until a frame checks out.
    pub fn search(&self, samples: &[f32]) -> SyncSearch<'_> {
        let sps = self.samples_per_slot;
        let span = self.pattern.len() * sps;
        if sps == 0 || samples.len() < span {
            debug!(
                "Capture of {} samples is shorter than a preamble ({} samples)",
                samples.len(),
                span
            );
            return SyncSearch {
                synchronizer: self,
                grid: Vec::new(),
                slot_offsets: Vec::new(),
                capture_len: samples.len(),
                next: 0,
            };
        }

        // One energy per candidate offset, shared by all candidates. Slot k of
        // candidate j reads grid[j + slot_offsets[k]].
        let grid_len = (samples.len() - sps) / self.step + 1;
        let grid = (0..grid_len)
            .map(|g| {
                let begin = g * self.step;
                self.detector.energy(&samples[begin..begin + sps])
            })
            .collect();
        let slot_offsets = (0..self.pattern.len())
            .map(|k| ((k * sps) as f64 / self.step as f64).round() as usize)
            .collect();

        SyncSearch {
            synchronizer: self,
            grid,
            slot_offsets,
            capture_len: samples.len(),
            next: 0,
        }
    }

    /// Pearson correlation between slot energies and the preamble pattern.
    /// Flat, silent or low-contrast energy sequences score 0.
    pub fn score(&self, energies: &[f32]) -> f32 {
        if on_off_contrast(energies, &self.pattern) < MIN_CONTRAST {
            return 0.0;
        }
        preamble_correlation(energies, &self.pattern)
    }
}

/// Iterator over preamble alignments, produced by [`FrameSynchronizer::search`].
pub struct SyncSearch<'a> {
    synchronizer: &'a FrameSynchronizer,
    grid: Vec<f32>,
    slot_offsets: Vec<usize>,
    capture_len: usize,
    next: usize,
}

impl Iterator for SyncSearch<'_> {
    type Item = SyncPoint;

    fn next(&mut self) -> Option<SyncPoint> {
        let sync = self.synchronizer;
        let span = sync.pattern.len() * sync.samples_per_slot;
        let last_offset = self.slot_offsets.last().copied().unwrap_or(0);
        let refine_window = REFINE_CHIPS * sync.repetition * sync.samples_per_slot / sync.step;

        let mut energies = vec![0.0f32; sync.pattern.len()];
        let mut best: Option<(usize, f32)> = None;
        let mut stop_after = usize::MAX;

        let mut j = self.next;
        while j + last_offset < self.grid.len() && j * sync.step + span <= self.capture_len {
            if j > stop_after {
                break;
            }
            for (energy, &offset) in energies.iter_mut().zip(&self.slot_offsets) {
                *energy = self.grid[j + offset];
            }
            let score = sync.score(&energies);
            trace!("sync candidate {} (sample {}): score {:.3}", j, j * sync.step, score);

            match best {
                None if score >= sync.min_score => {
                    best = Some((j, score));
                    stop_after = j + refine_window;
                }
                Some((_, best_score)) if score > best_score => best = Some((j, score)),
                _ => {}
            }
            j += 1;
        }

        let Some((candidate, score)) = best else {
            self.next = self.grid.len();
            return None;
        };
        self.next = candidate + 1;

        let start_offset = candidate * sync.step;
        let slot_count = (self.capture_len - start_offset) / sync.samples_per_slot;
        debug!(
            "Preamble found at sample {} (score {:.3}, {} slots available)",
            start_offset, score, slot_count
        );
        Some(SyncPoint {
            start_offset,
            slot_count,
            score,
        })
    }
}

/// Largest divisor of the slot length that gives at least `steps_per_slot`
/// candidates per slot, so every candidate's slots land exactly on the energy
/// grid. When no divisor is at least half the requested spacing, the requested
/// spacing is used and slots snap to the nearest grid point.
fn candidate_step(samples_per_slot: usize, steps_per_slot: usize) -> usize {
    let coarsest = (samples_per_slot / steps_per_slot.max(1)).max(1);
    (1..=coarsest)
        .rev()
        .find(|d| samples_per_slot % d == 0)
        .filter(|&d| d * 2 >= coarsest)
        .unwrap_or(coarsest)
}

/// `(mean_on - mean_off) / mean_on` over the slots the pattern marks on and off.
fn on_off_contrast(energies: &[f32], pattern: &[bool]) -> f32 {
    let (mut on_sum, mut on_count, mut off_sum, mut off_count) = (0.0f64, 0usize, 0.0f64, 0usize);
    for (&e, &p) in energies.iter().zip(pattern) {
        if p {
            on_sum += e as f64;
            on_count += 1;
        } else {
            off_sum += e as f64;
            off_count += 1;
        }
    }
    if on_count == 0 || off_count == 0 || on_sum <= 0.0 {
        return 0.0;
    }
    let mean_on = on_sum / on_count as f64;
    let mean_off = off_sum / off_count as f64;
    ((mean_on - mean_off) / mean_on) as f32
}

/// Pearson correlation between slot energies and an on/off pattern of the same length.
pub fn preamble_correlation(energies: &[f32], pattern: &[bool]) -> f32 {
    let n = energies.len().min(pattern.len());
    if n == 0 {
        return 0.0;
    }
    let peak = energies[..n].iter().fold(0.0f32, |m, &e| m.max(e));
    if peak < MIN_PREAMBLE_ENERGY {
        return 0.0;
    }

    let mean_e = energies[..n].iter().map(|&e| e as f64).sum::<f64>() / n as f64;
    let mean_p = pattern[..n].iter().filter(|&&p| p).count() as f64 / n as f64;

    let mut cov = 0.0f64;
    let mut var_e = 0.0f64;
    let mut var_p = 0.0f64;
    for (&e, &p) in energies[..n].iter().zip(&pattern[..n]) {
        let de = e as f64 - mean_e;
        let dp = f64::from(u8::from(p)) - mean_p;
        cov += de * dp;
        var_e += de * de;
        var_p += dp * dp;
    }

    if var_e <= 0.0 || var_p <= 0.0 {
        return 0.0;
    }
    (cov / (var_e * var_p).sqrt()) as f32
}
