// Desktop notification sink backed by notify-send, plus a log-based announcer

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use quotawatch_core::port::announcer::Announcer;
use quotawatch_core::port::notification_sink::{NotificationSink, SinkError};

/// Delivers notifications through the freedesktop `notify-send` helper.
pub struct NotifySendSink {
    app_name: String,
}

impl NotifySendSink {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Default for NotifySendSink {
    fn default() -> Self {
        Self::new("Quotawatch")
    }
}

#[async_trait]
impl NotificationSink for NotifySendSink {
    async fn send(&self, title: &str, body: &str, identifier: &str) -> Result<(), SinkError> {
        debug!(identifier = %identifier, "Delivering desktop notification");

        let output = Command::new("notify-send")
            .arg("--app-name")
            .arg(&self.app_name)
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(SinkError::SendFailed(stderr))
        }
    }
}

/// Announcer that speaks through the structured log stream.
///
/// Headless stand-in for a screen-reader bridge: every announcement is
/// emitted at info level under the `announce` target so log followers
/// (or an assistive relay tailing the JSON stream) can surface it.
pub struct TracingAnnouncer;

impl Announcer for TracingAnnouncer {
    fn announce(&self, message: &str) {
        info!(target: "quotawatch::announce", "{}", message);
    }
}
