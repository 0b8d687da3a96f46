use super::{NotificationChannel, RunEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// A stalled webhook must not hold back the run's exit status
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Slack rejects section text longer than 3000 characters
const SECTION_TEXT_LIMIT: usize = 3000;
const FAILURE_LINE_LIMIT: usize = 280;

pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build Slack HTTP client")?;
        Ok(Self {
            webhook_url,
            client,
        })
    }

    fn format_message(&self, event: &RunEvent) -> serde_json::Value {
        match event {
            RunEvent::Succeeded {
                run_id,
                host,
                items,
                duration_secs,
            } => {
                let short_id = &run_id[..8.min(run_id.len())];
                json!({
                    "blocks": [
                        {
                            "type": "header",
                            "text": {
                                "type": "plain_text",
                                "text": "Backup Complete",
                                "emoji": true
                            }
                        },
                        {
                            "type": "section",
                            "fields": [
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Host:*\n{}", host)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Run ID:*\n`{}`", short_id)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Items:*\n{}", items)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Duration:*\n{}s", duration_secs)
                                }
                            ]
                        }
                    ]
                })
            }
            RunEvent::Failed {
                run_id,
                host,
                failed,
                total,
                failures,
            } => {
                let short_id = &run_id[..8.min(run_id.len())];
                json!({
                    "blocks": [
                        {
                            "type": "header",
                            "text": {
                                "type": "plain_text",
                                "text": "Backup Failed",
                                "emoji": true
                            }
                        },
                        {
                            "type": "section",
                            "fields": [
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Host:*\n{}", host)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Run ID:*\n`{}`", short_id)
                                },
                                {
                                    "type": "mrkdwn",
                                    "text": format!("*Failed:*\n{} of {}", failed, total)
                                }
                            ]
                        },
                        {
                            "type": "section",
                            "text": {
                                "type": "mrkdwn",
                                "text": errors_text(failures)
                            }
                        }
                    ]
                })
            }
        }
    }
}

/// Errors section body, shortened per line and overall to fit one section.
fn errors_text(failures: &[String]) -> String {
    const PREFIX: &str = "*Errors:*\n```";
    const SUFFIX: &str = "```";
    let budget = SECTION_TEXT_LIMIT - PREFIX.len() - SUFFIX.len();

    let joined = failures
        .iter()
        .map(|line| truncate(line, FAILURE_LINE_LIMIT))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}{}{}", PREFIX, truncate(&joined, budget), SUFFIX)
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[async_trait]
impl NotificationChannel for SlackNotifier {
    async fn notify(&self, event: RunEvent) -> Result<()> {
        let payload = self.format_message(&event);
        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
