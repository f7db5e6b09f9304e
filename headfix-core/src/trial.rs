use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

/// Outcome class of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialType {
    Reward,
    Punish,
    RewardCatch,
    PunishCatch,
    StimPunish,
    StimReward,
    StimAlone,
}

impl TrialType {
    pub const ALL: [TrialType; 7] = [
        TrialType::Reward,
        TrialType::Punish,
        TrialType::RewardCatch,
        TrialType::PunishCatch,
        TrialType::StimPunish,
        TrialType::StimReward,
        TrialType::StimAlone,
    ];

    pub fn is_reward_like(self) -> bool {
        matches!(
            self,
            TrialType::Reward | TrialType::RewardCatch | TrialType::StimReward
        )
    }

    pub fn is_punish_like(self) -> bool {
        matches!(
            self,
            TrialType::Punish | TrialType::PunishCatch | TrialType::StimPunish
        )
    }

    pub fn is_catch(self) -> bool {
        matches!(self, TrialType::RewardCatch | TrialType::PunishCatch)
    }

    pub fn is_stim(self) -> bool {
        matches!(
            self,
            TrialType::StimPunish | TrialType::StimReward | TrialType::StimAlone
        )
    }

    /// Code the firmware uses for this trial type in the trial array packet.
    pub fn wire_code(self) -> i32 {
        match self {
            TrialType::Punish => 0,
            TrialType::Reward => 1,
            TrialType::PunishCatch => 2,
            TrialType::RewardCatch => 3,
            TrialType::StimPunish => 4,
            TrialType::StimReward => 5,
            TrialType::StimAlone => 6,
        }
    }
}

/// Per-trial inter-trial intervals in milliseconds.
pub type ItiArray = Vec<u32>;
/// Per-trial tone durations in milliseconds.
pub type ToneArray = Vec<u32>;
/// LED trigger offsets in milliseconds, or `[0]` when stimulation is off.
pub type LedArray = Vec<i32>;

/// The arrays shipped to the microcontroller, in transmission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayKind {
    Trial,
    Iti,
    Tone,
    Led,
}

impl ArrayKind {
    pub fn name(self) -> &'static str {
        match self {
            ArrayKind::Trial => "trial",
            ArrayKind::Iti => "iti",
            ArrayKind::Tone => "tone",
            ArrayKind::Led => "led",
        }
    }
}

impl std::fmt::Display for ArrayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered trial types for one session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialArray(Vec<TrialType>);

impl TrialArray {
    pub fn new(trials: Vec<TrialType>) -> Self {
        Self(trials)
    }

    pub fn filled(len: usize, trial: TrialType) -> Self {
        Self(vec![trial; len])
    }

    pub fn count(&self, trial: TrialType) -> usize {
        self.0.iter().filter(|t| **t == trial).count()
    }

    /// Longest run of consecutive trials matching `pred`, looking only at
    /// positions `start..`.
    pub fn longest_run_from(&self, start: usize, pred: impl Fn(TrialType) -> bool) -> usize {
        let mut longest = 0;
        let mut current = 0;
        for trial in self.0.iter().skip(start) {
            if pred(*trial) {
                current += 1;
                longest = longest.max(current);
            } else {
                current = 0;
            }
        }
        longest
    }

    pub fn longest_run(&self, pred: impl Fn(TrialType) -> bool) -> usize {
        self.longest_run_from(0, pred)
    }

    pub fn first_index(&self, pred: impl Fn(TrialType) -> bool) -> Option<usize> {
        self.0.iter().position(|t| pred(*t))
    }

    pub fn wire_codes(&self) -> Vec<i32> {
        self.0.iter().map(|t| t.wire_code()).collect()
    }
}

impl Deref for TrialArray {
    type Target = [TrialType];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for TrialArray {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<TrialType>> for TrialArray {
    fn from(trials: Vec<TrialType>) -> Self {
        Self(trials)
    }
}
