use crate::config::{ModemConfig, MAX_LENGTH_FIELD_VALUE};
use crate::error::{ModemError, Result};

/// 13-chip Barker sequence. Its aperiodic autocorrelation sidelobes never exceed
/// one chip, so a shifted alignment scores far below the true one.
pub const PREAMBLE: [bool; 13] = [
    true, true, true, true, true, false, false, true, true, false, true, false, true,
];

/// Width of the length field in bits
pub const LENGTH_FIELD_BITS: usize = 8;

/// Width of the checksum in bits
pub const CRC_BITS: usize = 16;

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u32 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u32) << 8;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x10000 != 0 {
                crc ^= 0x1021;
            }
        }
    }
    (crc & 0xFFFF) as u16
}

/// Expand bytes into bits, most significant bit first
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    bits
}

/// Pack up to 8 bits (MSB first) into a byte
pub fn bits_to_byte(bits: &[bool]) -> u8 {
    let mut byte = 0u8;
    for (i, &bit) in bits.iter().take(8).enumerate() {
        if bit {
            byte |= 1 << (7 - i);
        }
    }
    byte
}

/// Majority vote over the redundant copies of one bit.
///
/// A bit is `1` only with strictly more `1` votes than `0` votes. An exact tie,
/// possible only with an even repetition factor, resolves to `0` (tone absent).
pub fn majority(votes: &[bool]) -> bool {
    let ones = votes.iter().filter(|&&v| v).count();
    ones * 2 > votes.len()
}

/// Turns payloads into repetition-coded, checksummed slot sequences and back.
///
/// Frame layout, before repetition: `length (8) | payload (8 * length) | crc16 (16)`,
/// with the CRC covering the length byte and the payload. Every bit is sent
/// `repetition` times and the whole thing is preceded by [`PREAMBLE`], whose
/// chips are stretched by the same factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framer {
    repetition: usize,
    max_payload_bytes: usize,
}

impl Framer {
    /// `max_payload_bytes` is capped at what the 8-bit length field can carry.
    pub fn new(repetition: usize, max_payload_bytes: usize) -> Self {
        Self {
            repetition: repetition.max(1),
            max_payload_bytes: max_payload_bytes.min(MAX_LENGTH_FIELD_VALUE),
        }
    }

    pub fn from_config(config: &ModemConfig) -> Self {
        Self::new(config.repetition, config.max_payload_bytes)
    }

    pub fn repetition(&self) -> usize {
        self.repetition
    }

    pub fn preamble_slots(&self) -> usize {
        PREAMBLE.len() * self.repetition
    }

    /// Preamble expanded to one entry per slot
    pub fn preamble_pattern(&self) -> Vec<bool> {
        self.repeat(&PREAMBLE)
    }

    /// Build the slot sequence for a payload
    pub fn frame(&self, payload: &[u8]) -> Result<Vec<bool>> {
        if payload.len() > self.max_payload_bytes {
            return Err(ModemError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_payload_bytes,
            });
        }

        let mut body = Vec::with_capacity(payload.len() + 3);
        body.push(payload.len() as u8);
        body.extend_from_slice(payload);
        let crc = crc16(&body);
        body.extend_from_slice(&crc.to_be_bytes());

        let mut slots = self.preamble_pattern();
        slots.extend(self.repeat(&bytes_to_bits(&body)));
        Ok(slots)
    }

    /// Recover the payload from a slot sequence that starts at the first preamble slot.
    ///
    /// The preamble itself is not checked here; the synchronizer already matched it.
    pub fn deframe(&self, slots: &[bool]) -> Result<Vec<u8>> {
        let mut cursor = self.preamble_slots();
        let byte_slots = 8 * self.repetition;

        let needed_for_length = cursor + byte_slots;
        if slots.len() < needed_for_length {
            return Err(ModemError::Truncated {
                needed: needed_for_length,
                available: slots.len(),
            });
        }

        let length = self.read_byte(&slots[cursor..cursor + byte_slots]) as usize;
        cursor += byte_slots;
        if length > self.max_payload_bytes {
            return Err(ModemError::InvalidLength {
                len: length,
                max: self.max_payload_bytes,
            });
        }

        let needed = cursor + (length + 2) * byte_slots;
        if slots.len() < needed {
            return Err(ModemError::Truncated {
                needed,
                available: slots.len(),
            });
        }

        let mut body = Vec::with_capacity(length + 1);
        body.push(length as u8);
        for _ in 0..length {
            body.push(self.read_byte(&slots[cursor..cursor + byte_slots]));
            cursor += byte_slots;
        }

        let hi = self.read_byte(&slots[cursor..cursor + byte_slots]);
        let lo = self.read_byte(&slots[cursor + byte_slots..cursor + 2 * byte_slots]);
        let expected = u16::from_be_bytes([hi, lo]);
        let computed = crc16(&body);
        if expected != computed {
            return Err(ModemError::ChecksumMismatch { expected, computed });
        }

        body.remove(0);
        Ok(body)
    }

    fn repeat(&self, bits: &[bool]) -> Vec<bool> {
        let mut slots = Vec::with_capacity(bits.len() * self.repetition);
        for &bit in bits {
            slots.extend(std::iter::repeat(bit).take(self.repetition));
        }
        slots
    }

    /// `slots` holds exactly 8 repetition groups
    fn read_byte(&self, slots: &[bool]) -> u8 {
        let mut bits = [false; 8];
        for (bit, group) in bits.iter_mut().zip(slots.chunks(self.repetition)) {
            *bit = majority(group);
        }
        bits_to_byte(&bits)
    }
}
