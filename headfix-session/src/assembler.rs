use std::collections::BTreeMap;

use headfix_core::{ArrayKind, ItiArray, LedArray, SessionConfig, ToneArray, TrialArray, TrialType};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// The four per-session arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionArrays {
    pub trials: TrialArray,
    pub iti: ItiArray,
    pub tone: ToneArray,
    pub led: LedArray,
}

/// Arrays checked for mutual consistency, ready for upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledSession {
    pub arrays: SessionArrays,
    pub session_length_s: f64,
    pub stim_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_trials: usize,
    pub counts: BTreeMap<String, usize>,
    pub longest_punish_run: usize,
    pub longest_reward_run: usize,
    pub session_length_s: f64,
}

impl AssembledSession {
    /// Arrays in transmission order as signed 32-bit payloads. The LED array
    /// is only included when stimulation is enabled.
    pub fn wire_arrays(&self) -> Result<Vec<(ArrayKind, Vec<i32>)>, SessionError> {
        let mut arrays = vec![
            (ArrayKind::Trial, self.arrays.trials.wire_codes()),
            (ArrayKind::Iti, to_wire(ArrayKind::Iti, &self.arrays.iti)?),
            (ArrayKind::Tone, to_wire(ArrayKind::Tone, &self.arrays.tone)?),
        ];
        if self.stim_enabled {
            arrays.push((ArrayKind::Led, self.arrays.led.clone()));
        }
        Ok(arrays)
    }

    pub fn summary(&self) -> SessionSummary {
        let trials = &self.arrays.trials;
        let counts = TrialType::ALL
            .into_iter()
            .map(|t| (format!("{t:?}"), trials.count(t)))
            .filter(|(_, n)| *n > 0)
            .collect();
        SessionSummary {
            total_trials: trials.len(),
            counts,
            longest_punish_run: trials.longest_run(TrialType::is_punish_like),
            longest_reward_run: trials.longest_run(TrialType::is_reward_like),
            session_length_s: self.session_length_s,
        }
    }
}

fn to_wire(array: ArrayKind, values: &[u32]) -> Result<Vec<i32>, SessionError> {
    values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            i32::try_from(value).map_err(|_| SessionError::ValueOutOfRange {
                array,
                index,
                value,
            })
        })
        .collect()
}

/// Checks array lengths against the config and computes the session length.
pub fn assemble(
    config: &SessionConfig,
    trials: TrialArray,
    iti: ItiArray,
    tone: ToneArray,
    led: LedArray,
) -> Result<AssembledSession, SessionError> {
    let total = config.total_trials as usize;
    for (array, actual) in [
        (ArrayKind::Trial, trials.len()),
        (ArrayKind::Iti, iti.len()),
        (ArrayKind::Tone, tone.len()),
    ] {
        if actual != total {
            return Err(SessionError::ArrayLengthMismatch {
                array,
                expected: total,
                actual,
            });
        }
    }
    if led.len() != config.led_len() {
        return Err(SessionError::ArrayLengthMismatch {
            array: ArrayKind::Led,
            expected: config.led_len(),
            actual: led.len(),
        });
    }

    let total_ms: u64 = iti.iter().chain(tone.iter()).map(|ms| u64::from(*ms)).sum();
    Ok(AssembledSession {
        arrays: SessionArrays {
            trials,
            iti,
            tone,
            led,
        },
        session_length_s: total_ms as f64 / 1000.0,
        stim_enabled: config.stim.enabled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(total: u32) -> SessionConfig {
        SessionConfig {
            total_trials: total,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_session_length() {
        let session = assemble(
            &config(4),
            TrialArray::filled(4, TrialType::Reward),
            vec![1000, 2000, 3000, 4000],
            vec![500; 4],
            vec![0],
        )
        .unwrap();
        assert_eq!(session.session_length_s, 12.0);
    }

    #[test]
    fn test_tone_length_mismatch() {
        let err = assemble(
            &config(4),
            TrialArray::filled(4, TrialType::Reward),
            vec![1000; 4],
            vec![500; 3],
            vec![0],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SessionError::ArrayLengthMismatch {
                array: ArrayKind::Tone,
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_led_must_be_sentinel_without_stim() {
        let err = assemble(
            &config(2),
            TrialArray::filled(2, TrialType::Reward),
            vec![1000; 2],
            vec![500; 2],
            vec![0, 0],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SessionError::ArrayLengthMismatch {
                array: ArrayKind::Led,
                ..
            }
        ));
    }

    #[test]
    fn test_wire_arrays_skip_led_without_stim() {
        let session = assemble(
            &config(3),
            TrialArray::new(vec![TrialType::Reward, TrialType::Punish, TrialType::RewardCatch]),
            vec![1000; 3],
            vec![500; 3],
            vec![0],
        )
        .unwrap();
        let arrays = session.wire_arrays().unwrap();
        let kinds: Vec<ArrayKind> = arrays.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![ArrayKind::Trial, ArrayKind::Iti, ArrayKind::Tone]);
        assert_eq!(arrays[0].1, vec![1, 0, 3]);

        let summary = session.summary();
        assert_eq!(summary.counts.get("Reward"), Some(&1));
        assert_eq!(summary.counts.get("Punish"), Some(&1));
        assert_eq!(summary.counts.get("StimAlone"), None);
        assert_eq!(summary.longest_reward_run, 1);
    }

    #[test]
    fn test_wire_arrays_reject_values_past_i32() {
        let session = assemble(
            &config(2),
            TrialArray::filled(2, TrialType::Reward),
            vec![1000, u32::MAX],
            vec![500; 2],
            vec![0],
        )
        .unwrap();
        assert!(matches!(
            session.wire_arrays(),
            Err(SessionError::ValueOutOfRange {
                array: ArrayKind::Iti,
                index: 1,
                value: u32::MAX
            })
        ));
    }
}
