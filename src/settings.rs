use std::path::Path;

use anyhow::{Context, Result};
use headfix_core::SessionConfig;
use headfix_session::PlannerOptions;
use headfix_transfer::{RetryPolicy, TransferOptions};
use serde::{Deserialize, Serialize};

/// Contents of the settings file: what to generate and how to reach the rig.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub session: SessionConfig,
    pub link: LinkSettings,
    pub planner: PlannerOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub port: Option<String>,
    pub baud: u32,
    /// The board resets when the port opens; nothing is sent before this.
    pub settle_ms: u64,
    pub transfer: TransferOptions,
    /// Retries for opening the port.
    pub open_retry: RetryPolicy,
    /// Retries of the whole upload after a timeout or link fault.
    pub session_retry: RetryPolicy,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud: 115_200,
            settle_ms: 2000,
            transfer: TransferOptions::default(),
            open_retry: RetryPolicy::default(),
            session_retry: RetryPolicy::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, or defaults when no path is given.
    /// The session config is validated either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading settings from {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing settings in {}", path.display()))?
            }
            None => Settings::default(),
        };
        settings.session.validate().context("invalid session config")?;
        Ok(settings)
    }

    /// Apply command-line overrides.
    pub fn with_link_overrides(mut self, port: Option<String>, baud: Option<u32>) -> Self {
        if port.is_some() {
            self.link.port = port;
        }
        if let Some(baud) = baud {
            self.link.baud = baud;
        }
        self
    }
}
