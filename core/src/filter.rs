use std::f64::consts::PI;

/// Number of cascaded biquad sections. Run forward and backward this gives an
/// 8-pole magnitude response with zero phase.
const SECTIONS: usize = 2;

/// Second-order IIR section, transposed direct form II.
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// RBJ cookbook band-pass with 0 dB gain at `center_hz`
    pub fn band_pass(center_hz: f32, q: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * center_hz as f64 / sample_rate as f64;
        let alpha = w0.sin() / (2.0 * q as f64);
        let a0 = 1.0 + alpha;
        Self {
            b0: alpha / a0,
            b1: 0.0,
            b2: -alpha / a0,
            a1: -2.0 * w0.cos() / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Filter in place, starting from rest
    pub fn process(&self, samples: &mut [f32]) {
        let mut z1 = 0.0f64;
        let mut z2 = 0.0f64;
        for sample in samples.iter_mut() {
            let x = *sample as f64;
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            *sample = y as f32;
        }
    }
}

/// Zero-phase band-pass centred on the carrier, used to strip out-of-band
/// energy (speech, hum, hiss) before tone detection.
#[derive(Debug, Clone)]
pub struct BandPass {
    sections: [Biquad; SECTIONS],
}

impl BandPass {
    pub fn new(center_hz: f32, half_width_hz: f32, sample_rate: f32) -> Self {
        let q = center_hz / (2.0 * half_width_hz);
        let section = Biquad::band_pass(center_hz, q, sample_rate);
        Self {
            sections: [section; SECTIONS],
        }
    }

    /// Filter forward then backward. Slot timing is preserved because the
    /// backward pass cancels the forward pass's group delay.
    pub fn apply(&self, samples: &[f32]) -> Vec<f32> {
        let mut filtered = samples.to_vec();
        for section in &self.sections {
            section.process(&mut filtered);
        }
        filtered.reverse();
        for section in &self.sections {
            section.process(&mut filtered);
        }
        filtered.reverse();
        filtered
    }
}
