use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModemError {
    #[error("Payload of {len} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("No frame preamble found in capture")]
    NotFound,

    #[error("CRC mismatch: frame carries {expected:#06x}, payload hashes to {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    #[error("Invalid length field {len} (maximum {max})")]
    InvalidLength { len: usize, max: usize },

    #[error("Capture ends early: frame needs {needed} slots, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ModemError {
    /// True for failures caused by the acoustic channel rather than by the caller.
    /// These are worth a fresh capture or a rebroadcast.
    pub fn is_channel_error(&self) -> bool {
        !matches!(
            self,
            ModemError::PayloadTooLarge { .. } | ModemError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ModemError>;
