mod slack;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::config::{NotificationChannelType, NotificationConfig};
use crate::core::models::RunReport;

/// Most failing items listed in a single notification
const MAX_LISTED_FAILURES: usize = 10;

/// Events that trigger notifications
#[derive(Debug, Clone)]
pub enum RunEvent {
    Succeeded {
        run_id: String,
        host: String,
        items: usize,
        duration_secs: u64,
    },
    Failed {
        run_id: String,
        host: String,
        failed: usize,
        total: usize,
        /// "item: error" lines, truncated to the first few failures
        failures: Vec<String>,
    },
}

impl RunEvent {
    pub fn from_report(report: &RunReport) -> Self {
        let run_id = report.run_id.to_string();
        let host = report.host.clone();

        if !report.has_failures() {
            return Self::Succeeded {
                run_id,
                host,
                items: report.entries.len(),
                duration_secs: report.duration_secs(),
            };
        }

        let failures = report
            .failures()
            .take(MAX_LISTED_FAILURES)
            .map(|entry| {
                format!(
                    "{}: {}",
                    entry.artifact_identifier,
                    entry.error_detail.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();

        Self::Failed {
            run_id,
            host,
            failed: report.failure_count(),
            total: report.entries.len(),
            failures,
        }
    }
}

/// Trait for notification channel implementations (Slack, Discord, etc.)
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, event: RunEvent) -> Result<()>;
}

/// Notifier for the configured channel, or None when notifications are off.
pub fn create_notifier(config: &NotificationConfig) -> Option<Arc<dyn NotificationChannel>> {
    match &config.channel {
        NotificationChannelType::None => None,
        NotificationChannelType::Slack => {
            let webhook = config.slack_webhook.as_ref()?;
            if webhook.is_empty() {
                return None;
            }
            match slack::SlackNotifier::new(webhook.clone()) {
                Ok(notifier) => Some(Arc::new(notifier)),
                Err(e) => {
                    warn!(error = %e, "Slack notifications disabled");
                    None
                }
            }
        }
    }
}
