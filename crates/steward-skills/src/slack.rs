//! Slack messenger: proactive notifications via `chat.postMessage`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use steward_core::Messenger;

const LOG_TARGET: &str = "steward::slack";
pub const ENV_SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
const DEFAULT_API_URL: &str = "https://slack.com/api";

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct SlackReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackMessenger {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl SlackMessenger {
    /// Reads `SLACK_BOT_TOKEN`. Without it every post is logged and reported as failed.
    pub fn from_env() -> Self {
        let token = std::env::var(ENV_SLACK_BOT_TOKEN)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self::with_endpoint(DEFAULT_API_URL, token)
    }

    pub fn with_endpoint(base_url: impl Into<String>, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }
}

/// Slack answers 200 with `ok: false` for most failures.
fn accepted(reply: &SlackReply) -> Result<(), String> {
    if reply.ok {
        Ok(())
    } else {
        Err(reply.error.clone().unwrap_or_else(|| "unknown_error".to_string()))
    }
}

#[async_trait]
impl Messenger for SlackMessenger {
    async fn post_message(&self, channel: &str, text: &str) -> bool {
        let Some(token) = self.token.as_deref() else {
            tracing::warn!(target: LOG_TARGET, "no {} set; message dropped", ENV_SLACK_BOT_TOKEN);
            return false;
        };
        if channel.is_empty() {
            tracing::warn!(target: LOG_TARGET, "no owner channel configured; message dropped");
            return false;
        }

        let res = self
            .client
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(token)
            .json(&PostMessage { channel, text })
            .send()
            .await;
        let res = match res {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, channel, error = %e, "chat.postMessage transport failure");
                return false;
            }
        };
        if !res.status().is_success() {
            tracing::warn!(target: LOG_TARGET, channel, status = %res.status(), "chat.postMessage HTTP failure");
            return false;
        }
        match res.json::<SlackReply>().await.map_err(|e| e.to_string()).and_then(|r| accepted(&r)) {
            Ok(()) => {
                tracing::debug!(target: LOG_TARGET, channel, len = text.len(), "message posted");
                true
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, channel, error = %e, "chat.postMessage rejected");
                false
            }
        }
    }
}
