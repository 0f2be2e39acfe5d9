// Usage source backed by an external command.
// The command prints one JSON usage payload on stdout; exit codes map onto
// the fetch-error taxonomy. Networking and credentials stay its problem.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use quotawatch_core::domain::{UsageReading, UsageWindow};
use quotawatch_core::port::time_provider::TimeProvider;
use quotawatch_core::port::usage_source::{FetchError, UsageSource};
use std::sync::Arc;

/// Exit code the command uses for missing/rejected credentials
const EXIT_NOT_AUTHENTICATED: i32 = 2;

/// Exit code the command uses for a server-side throttle; stderr carries
/// `retry-after: <seconds>`
const EXIT_RATE_LIMITED: i32 = 3;

/// Fallback retry delay when a throttled command omits the header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

// Wire format of the command's stdout payload

#[derive(Debug, Deserialize)]
struct WireWindow {
    utilization: f64,
    #[serde(default)]
    resets_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireSubquota {
    id: String,
    label: String,
    #[serde(flatten)]
    window: WireWindow,
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    session: WireWindow,
    weekly: WireWindow,
    #[serde(default)]
    subquotas: Vec<WireSubquota>,
}

impl WireWindow {
    fn into_domain(self) -> UsageWindow {
        UsageWindow::new(self.utilization, self.resets_at)
    }
}

/// Spawns the configured usage command with an environment allowlist and
/// converts its output into a [`UsageReading`].
pub struct CommandUsageSource {
    command: String,
    args: Vec<String>,
    env_allowlist: Vec<String>,
    time: Arc<dyn TimeProvider>,
}

impl CommandUsageSource {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            env_allowlist: vec![
                "PATH".to_string(),
                "HOME".to_string(),
                "USER".to_string(),
            ],
            time,
        }
    }

    fn parse_payload(&self, stdout: &[u8]) -> Result<UsageReading, FetchError> {
        let payload: WirePayload =
            serde_json::from_slice(stdout).map_err(|e| FetchError::Decode(e.to_string()))?;

        let mut reading = UsageReading::new(
            payload.session.into_domain(),
            payload.weekly.into_domain(),
            self.time.now_millis(),
        );
        for sq in payload.subquotas {
            reading = reading.with_subquota(sq.id, sq.label, sq.window.into_domain());
        }
        Ok(reading)
    }
}

#[async_trait]
impl UsageSource for CommandUsageSource {
    async fn fetch_usage(&self) -> Result<UsageReading, FetchError> {
        debug!(command = %self.command, "Spawning usage command");

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear();
        for key in &self.env_allowlist {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| FetchError::Network(format!("failed to run {}: {}", self.command, e)))?;

        if output.status.success() {
            return self.parse_payload(&output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_failure(output.status.code(), &stderr))
    }
}

fn classify_failure(code: Option<i32>, stderr: &str) -> FetchError {
    match code {
        Some(EXIT_NOT_AUTHENTICATED) => FetchError::NotAuthenticated,
        Some(EXIT_RATE_LIMITED) => FetchError::RateLimited {
            retry_after_secs: parse_retry_after(stderr).unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        Some(code) => FetchError::Api {
            status: code as u16,
            message: stderr.to_string(),
        },
        // Killed by signal: treat like any other transient failure
        None => FetchError::Network(format!("usage command terminated: {}", stderr)),
    }
}

/// Extract the delay from a `retry-after: <seconds>` stderr line
fn parse_retry_after(stderr: &str) -> Option<u64> {
    stderr.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("retry-after:")?;
        rest.trim().parse().ok()
    })
}
