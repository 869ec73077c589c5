//! Acoustic data link for short binary payloads
//!
//! On-off keys a single carrier (2400 Hz by default): a tone-filled slot is a
//! `1`, a silent slot a `0`. Frames carry a Barker preamble, a length byte, the
//! payload and a CRC-16, with every bit repeated for majority-vote decoding.
//! Detection uses Goertzel energy at the carrier behind an optional zero-phase
//! band-pass, and the preamble is located by correlation over sub-slot offsets.
//!
//! Everything here is a pure function of its inputs. Audio capture and playback
//! are left to the caller.

pub mod config;
pub mod decoder;
pub mod detector;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod framing;
pub mod modulator;
pub mod sync;

pub use config::ModemConfig;
pub use decoder::Decoder;
pub use detector::{threshold, ToneDetector};
pub use encoder::Encoder;
pub use error::{ModemError, Result};
pub use framing::{crc16, Framer, PREAMBLE};
pub use modulator::ToneModulator;
pub use sync::{FrameSynchronizer, SyncPoint, SyncSearch};

use std::time::Duration;

/// Encode `payload` into a tone burst using `config`.
pub fn encode(payload: &[u8], config: &ModemConfig) -> Result<Vec<f32>> {
    Encoder::new(config.clone())?.encode(payload)
}

/// Decode the first frame in `samples` using `config`.
pub fn decode(samples: &[f32], config: &ModemConfig) -> Result<Vec<u8>> {
    Decoder::new(config.clone())?.decode(samples)
}

/// Length of the burst [`encode`] produces for a `payload_len`-byte payload,
/// guard silence included. Useful for sizing a capture window.
pub fn airtime(payload_len: usize, config: &ModemConfig) -> Duration {
    config.airtime(payload_len)
}
