pub mod config;
pub mod trial;

pub use config::{
    CatchConfig, ConfigError, IntervalConfig, OutcomeConfig, SessionConfig, StimConfig,
    MAX_INTERVAL_MS,
};
pub use trial::{ArrayKind, ItiArray, LedArray, ToneArray, TrialArray, TrialType};
