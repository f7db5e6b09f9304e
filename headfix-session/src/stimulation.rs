use headfix_core::{ArrayKind, ItiArray, LedArray, SessionConfig, TrialArray};

use crate::error::SessionError;

/// LED trigger offsets for the stimulation block.
///
/// Returns the single sentinel `[0]` when stimulation is disabled; otherwise one
/// offset per block trial, the block trial's ITI minus the configured lead.
pub fn schedule_led(
    config: &SessionConfig,
    trials: &TrialArray,
    iti: &ItiArray,
) -> Result<LedArray, SessionError> {
    if !config.stim.enabled {
        return Ok(vec![0]);
    }

    let total = config.total_trials as usize;
    if trials.len() != total {
        return Err(SessionError::ArrayLengthMismatch {
            array: ArrayKind::Trial,
            expected: total,
            actual: trials.len(),
        });
    }
    if iti.len() != total {
        return Err(SessionError::ArrayLengthMismatch {
            array: ArrayKind::Iti,
            expected: total,
            actual: iti.len(),
        });
    }

    let lead = i64::from(config.stim.lead_ms);
    let block = config.stim.block();
    let Some(block_iti) = iti.get(block.clone()) else {
        return Err(SessionError::ArrayLengthMismatch {
            array: ArrayKind::Iti,
            expected: block.end,
            actual: iti.len(),
        });
    };
    let led = block_iti
        .iter()
        .map(|ms| (i64::from(*ms) - lead).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
        .collect();
    Ok(led)
}
