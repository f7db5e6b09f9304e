pub mod assembler;
pub mod config;
pub mod error;
pub mod random;
pub mod sequence;
pub mod stimulation;
pub mod timing;

pub use assembler::{assemble, AssembledSession, SessionArrays, SessionSummary};
pub use config::PlannerOptions;
pub use error::SessionError;
pub use random::RandomSource;
pub use sequence::SequencePlanner;
pub use stimulation::schedule_led;
pub use timing::{generate_iti, generate_tone};

use headfix_core::SessionConfig;
use tracing::info;

/// Validates `config` and produces every array for one session.
pub fn generate_session(
    config: &SessionConfig,
    rng: &mut RandomSource,
    options: PlannerOptions,
) -> Result<AssembledSession, SessionError> {
    config.validate()?;
    info!(seed = rng.seed(), total_trials = config.total_trials, "generating session");

    let trials = SequencePlanner::new(config)
        .with_options(options)
        .generate(rng)?;
    let iti = generate_iti(config, rng);
    let tone = generate_tone(config, rng);
    let led = schedule_led(config, &trials, &iti)?;
    let session = assemble(config, trials, iti, tone, led)?;

    let summary = session.summary();
    info!(
        session_length_s = summary.session_length_s,
        longest_punish_run = summary.longest_punish_run,
        longest_reward_run = summary.longest_reward_run,
        counts = ?summary.counts,
        "session assembled"
    );
    Ok(session)
}
