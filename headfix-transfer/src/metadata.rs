use headfix_core::SessionConfig;

use crate::error::{DecodeError, EncodeError};

/// Scalar session parameters sent as packet 0.
///
/// Layout, little-endian, 12 bytes:
///
/// | offset | width | field |
/// |---|---|---|
/// | 0 | 1 | `total_trials` |
/// | 1 | 2 | `reward_tone_hz` |
/// | 3 | 2 | `punish_tone_hz` |
/// | 5 | 2 | `reward_delivery_ms` |
/// | 7 | 2 | `punish_delivery_ms` |
/// | 9 | 2 | `consumption_ms` |
/// | 11 | 1 | `stim_enabled` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub total_trials: u8,
    pub reward_tone_hz: u16,
    pub punish_tone_hz: u16,
    pub reward_delivery_ms: u16,
    pub punish_delivery_ms: u16,
    pub consumption_ms: u16,
    pub stim_enabled: bool,
}

impl Metadata {
    pub const SIZE: usize = 12;

    /// Narrow the session parameters to their wire widths.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::FieldOverflow`] naming the first field that does
    /// not fit.
    pub fn from_config(config: &SessionConfig) -> Result<Self, EncodeError> {
        let outcome = &config.outcome;
        Ok(Self {
            total_trials: narrow("total_trials", config.total_trials)?,
            reward_tone_hz: narrow("reward_tone_hz", outcome.reward_tone_hz)?,
            punish_tone_hz: narrow("punish_tone_hz", outcome.punish_tone_hz)?,
            reward_delivery_ms: narrow("reward_delivery_ms", outcome.reward_delivery_ms)?,
            punish_delivery_ms: narrow("punish_delivery_ms", outcome.punish_delivery_ms)?,
            consumption_ms: narrow("consumption_ms", outcome.consumption_ms)?,
            stim_enabled: config.stim.enabled,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0] = self.total_trials;
        out[1..3].copy_from_slice(&self.reward_tone_hz.to_le_bytes());
        out[3..5].copy_from_slice(&self.punish_tone_hz.to_le_bytes());
        out[5..7].copy_from_slice(&self.reward_delivery_ms.to_le_bytes());
        out[7..9].copy_from_slice(&self.punish_delivery_ms.to_le_bytes());
        out[9..11].copy_from_slice(&self.consumption_ms.to_le_bytes());
        out[11] = u8::from(self.stim_enabled);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != Self::SIZE {
            return Err(DecodeError::Truncated {
                received: bytes.len(),
                expected: Self::SIZE,
            });
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let stim_enabled = match bytes[11] {
            0 => false,
            1 => true,
            value => {
                return Err(DecodeError::InvalidFlag {
                    field: "stim_enabled",
                    value,
                });
            }
        };
        Ok(Self {
            total_trials: bytes[0],
            reward_tone_hz: u16_at(1),
            punish_tone_hz: u16_at(3),
            reward_delivery_ms: u16_at(5),
            punish_delivery_ms: u16_at(7),
            consumption_ms: u16_at(9),
            stim_enabled,
        })
    }

    /// Field-by-field differences against an echoed copy.
    pub fn mismatches(&self, echoed: &Metadata) -> Vec<String> {
        let mut out = Vec::new();
        let mut check = |field: &str, sent: u64, got: u64| {
            if sent != got {
                out.push(format!("{field}: sent {sent}, echoed {got}"));
            }
        };
        check("total_trials", self.total_trials.into(), echoed.total_trials.into());
        check("reward_tone_hz", self.reward_tone_hz.into(), echoed.reward_tone_hz.into());
        check("punish_tone_hz", self.punish_tone_hz.into(), echoed.punish_tone_hz.into());
        check(
            "reward_delivery_ms",
            self.reward_delivery_ms.into(),
            echoed.reward_delivery_ms.into(),
        );
        check(
            "punish_delivery_ms",
            self.punish_delivery_ms.into(),
            echoed.punish_delivery_ms.into(),
        );
        check("consumption_ms", self.consumption_ms.into(), echoed.consumption_ms.into());
        check("stim_enabled", self.stim_enabled.into(), echoed.stim_enabled.into());
        out
    }
}

fn narrow<T: TryFrom<u32>>(field: &'static str, value: u32) -> Result<T, EncodeError> {
    T::try_from(value).map_err(|_| EncodeError::FieldOverflow {
        field,
        value: value.into(),
        width: std::mem::size_of::<T>(),
    })
}
