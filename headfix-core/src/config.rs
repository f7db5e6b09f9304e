use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected session parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("total_trials must be at least 1")]
    ZeroTrials,

    #[error("{field} must lie in [0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: f64 },

    #[error("starting_reward {starting_reward} exceeds total_trials {total_trials}")]
    StartingRewardOutOfRange {
        starting_reward: u32,
        total_trials: u32,
    },

    #[error("{field} must be at least 1")]
    ZeroRunLimit { field: &'static str },

    #[error("{field} interval is inverted: min {min_ms} ms > max {max_ms} ms")]
    InvertedInterval {
        field: &'static str,
        min_ms: u32,
        max_ms: u32,
    },

    #[error("{field} interval of {value_ms} ms exceeds the wire limit of {max_ms} ms")]
    IntervalTooLong {
        field: &'static str,
        value_ms: u32,
        max_ms: u32,
    },

    #[error("stimulation block [{start}, {start}+{len}) does not fit in {total_trials} trials")]
    StimBlockOutOfRange {
        start: u32,
        len: u64,
        total_trials: u32,
    },

    #[error("malformed session config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Catch-trial placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchConfig {
    pub enabled: bool,
    pub num_catch_reward: u32,
    pub num_catch_punish: u32,
    /// Fraction of the session tail in which catch trials may be placed.
    pub catch_offset: f64,
}

impl Default for CatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            num_catch_reward: 3,
            num_catch_punish: 3,
            catch_offset: 0.2,
        }
    }
}

/// Optogenetic stimulation block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimConfig {
    pub enabled: bool,
    pub num_stim_reward: u32,
    pub num_stim_punish: u32,
    pub num_stim_alone: u32,
    pub stim_start_position: u32,
    pub max_sequential_stim_alone: u32,
    /// LED trigger lead before trial onset, subtracted from the ITI.
    pub lead_ms: u32,
}

impl StimConfig {
    pub fn total(&self) -> u64 {
        u64::from(self.num_stim_reward)
            + u64::from(self.num_stim_punish)
            + u64::from(self.num_stim_alone)
    }

    /// Index range covered by the stimulation block.
    pub fn block(&self) -> std::ops::Range<usize> {
        let start = u64::from(self.stim_start_position);
        let end = start.saturating_add(self.total());
        start as usize..usize::try_from(end).unwrap_or(usize::MAX)
    }
}

impl Default for StimConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            num_stim_reward: 0,
            num_stim_punish: 0,
            num_stim_alone: 0,
            stim_start_position: 0,
            max_sequential_stim_alone: 2,
            lead_ms: 500,
        }
    }
}

/// Durations travel as signed 32-bit integers.
pub const MAX_INTERVAL_MS: u32 = i32::MAX as u32;

/// Duration of a per-trial interval, fixed or jittered uniformly in `[min_ms, max_ms]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub base_ms: u32,
    pub min_ms: u32,
    pub max_ms: u32,
    pub jitter: bool,
}

impl IntervalConfig {
    pub fn fixed(base_ms: u32) -> Self {
        Self {
            base_ms,
            min_ms: base_ms,
            max_ms: base_ms,
            jitter: false,
        }
    }

    pub fn jittered(min_ms: u32, max_ms: u32) -> Self {
        Self {
            base_ms: min_ms,
            min_ms,
            max_ms,
            jitter: true,
        }
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self::fixed(1000)
    }
}

/// Reinforcement parameters the firmware needs before the arrays arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeConfig {
    pub reward_tone_hz: u32,
    pub punish_tone_hz: u32,
    /// Solenoid open time for a sucrose reward.
    pub reward_delivery_ms: u32,
    /// Air-puff duration for a punish trial.
    pub punish_delivery_ms: u32,
    /// Window after delivery in which the reward can be consumed.
    pub consumption_ms: u32,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            reward_tone_hz: 12000,
            punish_tone_hz: 4000,
            reward_delivery_ms: 50,
            punish_delivery_ms: 100,
            consumption_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub total_trials: u32,
    pub percent_punish: f64,
    /// No punish-like trial may occur before this index.
    pub starting_reward: u32,
    pub max_sequential_punish: u32,
    pub max_sequential_reward: u32,
    pub catch_trials: CatchConfig,
    pub stim: StimConfig,
    pub iti: IntervalConfig,
    pub tone: IntervalConfig,
    pub outcome: OutcomeConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_trials: 90,
            percent_punish: 0.5,
            starting_reward: 5,
            max_sequential_punish: 3,
            max_sequential_reward: 3,
            catch_trials: CatchConfig::default(),
            stim: StimConfig::default(),
            iti: IntervalConfig::jittered(20000, 40000),
            tone: IntervalConfig::fixed(2000),
            outcome: OutcomeConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON session description.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_trials == 0 {
            return Err(ConfigError::ZeroTrials);
        }
        check_fraction("percent_punish", self.percent_punish)?;
        check_fraction("catch_offset", self.catch_trials.catch_offset)?;
        if self.starting_reward > self.total_trials {
            return Err(ConfigError::StartingRewardOutOfRange {
                starting_reward: self.starting_reward,
                total_trials: self.total_trials,
            });
        }
        if self.max_sequential_punish == 0 {
            return Err(ConfigError::ZeroRunLimit {
                field: "max_sequential_punish",
            });
        }
        if self.max_sequential_reward == 0 {
            return Err(ConfigError::ZeroRunLimit {
                field: "max_sequential_reward",
            });
        }
        check_interval("iti", &self.iti)?;
        check_interval("tone", &self.tone)?;

        if self.stim.enabled {
            if self.stim.max_sequential_stim_alone == 0 {
                return Err(ConfigError::ZeroRunLimit {
                    field: "max_sequential_stim_alone",
                });
            }
            let end = u64::from(self.stim.stim_start_position) + self.stim.total();
            if end > self.total_trials as u64 {
                return Err(ConfigError::StimBlockOutOfRange {
                    start: self.stim.stim_start_position,
                    len: self.stim.total(),
                    total_trials: self.total_trials,
                });
            }
        }
        Ok(())
    }

    /// Number of punish-like trials, rounding half to even.
    pub fn num_punish(&self) -> u32 {
        (self.percent_punish * self.total_trials as f64).round_ties_even() as u32
    }

    /// First index of the tail window eligible for catch trials.
    pub fn catch_window_start(&self) -> usize {
        let len = self.total_trials as f64;
        let start = (len - len * self.catch_trials.catch_offset).round_ties_even();
        (start.max(0.0) as usize).min(self.total_trials as usize)
    }

    /// Number of LED triggers the firmware receives.
    pub fn led_len(&self) -> usize {
        if self.stim.enabled {
            self.stim.total() as usize
        } else {
            1
        }
    }
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::FractionOutOfRange { field, value })
    }
}

fn check_interval(field: &'static str, interval: &IntervalConfig) -> Result<(), ConfigError> {
    if interval.jitter && interval.min_ms > interval.max_ms {
        return Err(ConfigError::InvertedInterval {
            field,
            min_ms: interval.min_ms,
            max_ms: interval.max_ms,
        });
    }
    let longest = if interval.jitter {
        interval.max_ms
    } else {
        interval.base_ms
    };
    if longest > MAX_INTERVAL_MS {
        return Err(ConfigError::IntervalTooLong {
            field,
            value_ms: longest,
            max_ms: MAX_INTERVAL_MS,
        });
    }
    Ok(())
}
