use headfix_core::{IntervalConfig, ItiArray, SessionConfig, ToneArray};

use crate::random::RandomSource;

/// Inter-trial intervals, one per trial.
pub fn generate_iti(config: &SessionConfig, rng: &mut RandomSource) -> ItiArray {
    durations(&config.iti, config.total_trials as usize, rng)
}

/// Cue tone durations, one per trial.
pub fn generate_tone(config: &SessionConfig, rng: &mut RandomSource) -> ToneArray {
    durations(&config.tone, config.total_trials as usize, rng)
}

fn durations(interval: &IntervalConfig, len: usize, rng: &mut RandomSource) -> Vec<u32> {
    if interval.jitter {
        (0..len)
            .map(|_| rng.uniform_inclusive(interval.min_ms, interval.max_ms))
            .collect()
    } else {
        vec![interval.base_ms; len]
    }
}
