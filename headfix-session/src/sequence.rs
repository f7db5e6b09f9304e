//! Trial-type sequence generation.
//!
//! Candidates are drawn by rejection sampling: punish positions are placed
//! uniformly among the eligible indices, the array is checked against the
//! run-length limits, and catch trials are relabelled inside the tail window.
//! A candidate failing any step is discarded and a fresh one is drawn.

use std::fmt;
use std::ops::Range;

use headfix_core::{SessionConfig, TrialArray, TrialType};
use tracing::{debug, warn};

use crate::config::PlannerOptions;
use crate::error::SessionError;
use crate::random::RandomSource;

/// Why a candidate array was discarded.
#[derive(Debug, Clone, PartialEq)]
enum Rejection {
    PunishRun(usize),
    RewardRun(usize),
    StimAloneRun(usize),
    CatchCandidates {
        reward: usize,
        punish: usize,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::PunishRun(len) => write!(f, "punish run of {len} exceeds the limit"),
            Rejection::RewardRun(len) => write!(f, "reward run of {len} exceeds the limit"),
            Rejection::StimAloneRun(len) => {
                write!(f, "stim-alone run of {len} exceeds the limit")
            }
            Rejection::CatchCandidates { reward, punish } => write!(
                f,
                "insufficient catch candidates ({reward} reward, {punish} punish in window)"
            ),
        }
    }
}

/// Stimulation block already laid into a base array.
struct StimBlock {
    base: TrialArray,
    range: Range<usize>,
    punish_placed: u32,
}

pub struct SequencePlanner<'a> {
    config: &'a SessionConfig,
    options: PlannerOptions,
}

impl<'a> SequencePlanner<'a> {
    pub fn new(config: &'a SessionConfig) -> Self {
        Self {
            config,
            options: PlannerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PlannerOptions) -> Self {
        self.options = options;
        self
    }

    /// Draws a trial array satisfying every quota and run-length limit.
    pub fn generate(&self, rng: &mut RandomSource) -> Result<TrialArray, SessionError> {
        let config = self.config;
        let total = config.total_trials as usize;
        let start = config.starting_reward as usize;
        let mut attempts = 0;
        self.check_catch_window()?;

        let block = if config.stim.enabled {
            self.plan_stim_block(rng, &mut attempts)?
        } else {
            StimBlock {
                base: TrialArray::filled(total, TrialType::Reward),
                range: 0..0,
                punish_placed: 0,
            }
        };

        let num_punish = config.num_punish().saturating_sub(block.punish_placed) as usize;
        let candidates: Vec<usize> = (start..total)
            .filter(|i| !block.range.contains(i))
            .collect();
        if num_punish > candidates.len() {
            return Err(SessionError::infeasible(
                attempts,
                format!(
                    "{num_punish} punish trials requested but only {} eligible positions",
                    candidates.len()
                ),
            ));
        }

        let mut last = None;
        while attempts < self.options.max_attempts {
            attempts += 1;
            let mut trials = block.base.clone();
            let picks = rng
                .sample_without_replacement(&candidates, num_punish)
                .ok_or_else(|| SessionError::infeasible(attempts, "punish sample failed"))?;
            for i in picks {
                trials[i] = TrialType::Punish;
            }

            match self
                .check_runs(&trials)
                .and_then(|()| self.place_catch(&mut trials, rng))
            {
                Ok(()) => {
                    debug!(attempts, total, num_punish, "trial sequence accepted");
                    return Ok(trials);
                }
                Err(rejection) => last = Some(rejection),
            }
        }

        let reason = last.map_or_else(|| "no attempts allowed".to_string(), |r| r.to_string());
        warn!(attempts, %reason, "trial sequence search exhausted");
        Err(SessionError::infeasible(attempts, reason))
    }

    /// Lays the contiguous stimulation block: stim-punish first, then stim-alone,
    /// the remainder stim-reward.
    fn plan_stim_block(
        &self,
        rng: &mut RandomSource,
        attempts: &mut u32,
    ) -> Result<StimBlock, SessionError> {
        let config = self.config;
        let stim = &config.stim;
        let total = config.total_trials as usize;
        let range = stim.block();
        let start = config.starting_reward as usize;
        if range.end > total {
            return Err(SessionError::infeasible(
                *attempts,
                format!("stimulation block {range:?} does not fit in {total} trials"),
            ));
        }

        let mut base = TrialArray::filled(total, TrialType::Reward);
        for i in range.clone() {
            base[i] = TrialType::StimReward;
        }

        let punish_slots: Vec<usize> = range.clone().filter(|i| *i >= start).collect();
        let num_stim_punish = stim.num_stim_punish as usize;
        let num_stim_alone = stim.num_stim_alone as usize;
        if num_stim_punish > punish_slots.len() {
            return Err(SessionError::infeasible(
                *attempts,
                format!(
                    "{num_stim_punish} stim-punish trials requested but only {} block positions follow starting_reward",
                    punish_slots.len()
                ),
            ));
        }

        let mut last = None;
        while *attempts < self.options.max_attempts {
            *attempts += 1;
            let mut trials = base.clone();
            let picks = rng
                .sample_without_replacement(&punish_slots, num_stim_punish)
                .ok_or_else(|| SessionError::infeasible(*attempts, "stim-punish sample failed"))?;
            for i in picks {
                trials[i] = TrialType::StimPunish;
            }
            let punish_run = trials.longest_run(TrialType::is_punish_like);
            if punish_run > config.max_sequential_punish as usize {
                last = Some(Rejection::PunishRun(punish_run));
                continue;
            }

            let alone_slots: Vec<usize> = range
                .clone()
                .filter(|i| trials[*i] == TrialType::StimReward)
                .collect();
            let picks = rng
                .sample_without_replacement(&alone_slots, num_stim_alone)
                .ok_or_else(|| SessionError::infeasible(*attempts, "stim-alone sample failed"))?;
            for i in picks {
                trials[i] = TrialType::StimAlone;
            }
            let alone_run = trials.longest_run(|t| t == TrialType::StimAlone);
            if alone_run > stim.max_sequential_stim_alone as usize {
                last = Some(Rejection::StimAloneRun(alone_run));
                continue;
            }

            debug!(attempts = *attempts, ?range, "stimulation block placed");
            return Ok(StimBlock {
                base: trials,
                range,
                punish_placed: stim.num_stim_punish,
            });
        }

        let reason = last.map_or_else(|| "no attempts allowed".to_string(), |r| r.to_string());
        warn!(attempts = *attempts, %reason, "stimulation block search exhausted");
        Err(SessionError::infeasible(*attempts, reason))
    }

    /// The warm-up prefix before `starting_reward` is exempt: it is all reward
    /// by construction.
    fn check_runs(&self, trials: &TrialArray) -> Result<(), Rejection> {
        let config = self.config;
        let start = config.starting_reward as usize;

        let punish_run = trials.longest_run_from(start, TrialType::is_punish_like);
        if punish_run > config.max_sequential_punish as usize {
            return Err(Rejection::PunishRun(punish_run));
        }
        // Sparse punish schedules make long reward runs unavoidable.
        if config.percent_punish >= 0.5 {
            let reward_run = trials.longest_run_from(start, TrialType::is_reward_like);
            if reward_run > config.max_sequential_reward as usize {
                return Err(Rejection::RewardRun(reward_run));
            }
        }
        Ok(())
    }

    fn place_catch(&self, trials: &mut TrialArray, rng: &mut RandomSource) -> Result<(), Rejection> {
        let catch = &self.config.catch_trials;
        if !catch.enabled {
            return Ok(());
        }
        let window = self.config.catch_window_start()..trials.len();
        let punish: Vec<usize> = window
            .clone()
            .filter(|i| trials[*i] == TrialType::Punish)
            .collect();
        let reward: Vec<usize> = window
            .filter(|i| trials[*i] == TrialType::Reward)
            .collect();

        let (Some(punish_picks), Some(reward_picks)) = (
            rng.sample_without_replacement(&punish, catch.num_catch_punish as usize),
            rng.sample_without_replacement(&reward, catch.num_catch_reward as usize),
        ) else {
            return Err(Rejection::CatchCandidates {
                reward: reward.len(),
                punish: punish.len(),
            });
        };

        for i in punish_picks {
            trials[i] = TrialType::PunishCatch;
        }
        for i in reward_picks {
            trials[i] = TrialType::RewardCatch;
        }
        Ok(())
    }

    fn check_catch_window(&self) -> Result<(), SessionError> {
        let catch = &self.config.catch_trials;
        if !catch.enabled {
            return Ok(());
        }
        let window = self.config.total_trials as usize - self.config.catch_window_start();
        let wanted = catch.num_catch_reward as usize + catch.num_catch_punish as usize;
        if wanted > window {
            return Err(SessionError::infeasible(
                0,
                format!("{wanted} catch trials requested but the tail window holds {window}"),
            ));
        }
        Ok(())
    }
}
