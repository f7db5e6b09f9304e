use std::time::Duration;

use anyhow::{Context, Result};
use headfix_session::{generate_session, AssembledSession, RandomSource, SessionSummary};
use headfix_timing::Timer;
use headfix_transfer::{
    LinkError, Metadata, SerialChannel, TransferError, TransferProtocol, TransferReport,
};
use serde::Serialize;
use tracing::info;

use crate::settings::Settings;

/// A generated session with the seed that reproduces it.
#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub seed: u64,
    pub summary: SessionSummary,
    pub session: AssembledSession,
}

pub fn generate(settings: &Settings, seed: Option<u64>) -> Result<Generated> {
    let mut rng = match seed {
        Some(seed) => RandomSource::from_seed(seed),
        None => RandomSource::from_entropy(),
    };
    let session = generate_session(&settings.session, &mut rng, settings.planner.clone())
        .context("generating session")?;
    Ok(Generated {
        seed: rng.seed(),
        summary: session.summary(),
        session,
    })
}

/// Uploads `generated`, reconnecting through `connect` for every attempt.
///
/// The same arrays are resent on each attempt. Only timeouts and link faults
/// are retried; a verification mismatch ends the upload.
pub fn upload<C, T, F>(
    settings: &Settings,
    generated: &Generated,
    timer: &T,
    mut connect: F,
) -> Result<TransferReport>
where
    C: SerialChannel,
    T: Timer,
    F: FnMut() -> Result<C, LinkError>,
{
    let metadata = Metadata::from_config(&settings.session)
        .context("session does not fit the metadata packet")?;
    let arrays = generated
        .session
        .wire_arrays()
        .context("session arrays do not fit the wire format")?;
    let link = &settings.link;

    let report = link
        .session_retry
        .run(timer, TransferError::is_retryable, |attempt| {
            info!(attempt, seed = generated.seed, "starting upload");
            let channel = connect()?;
            timer.sleep(Duration::from_millis(link.settle_ms));
            TransferProtocol::new(channel, timer.clone(), link.transfer.clone())
                .run(&metadata, &arrays)
        })
        .context("uploading session")?;
    Ok(report)
}
