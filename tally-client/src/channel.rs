//! Chat channel client (Slack Web API).
//!
//! Two operations: post the batch message to the channel and post a reply
//! into an existing thread. Receiving user replies is the platform's side;
//! the CLI consumes extracted reply text.

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::retry::{with_retry, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

pub struct ChannelClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    channel: String,
    policy: RetryPolicy,
}

impl ChannelClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        channel: impl Into<String>,
        policy: RetryPolicy,
    ) -> AnyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(policy.request_timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            channel: channel.into(),
            policy,
        })
    }

    /// Post `text` to the configured channel. Returns the message timestamp,
    /// which becomes the pending-batch id so replies can be paired up.
    pub async fn post_message(&self, text: &str) -> Result<String> {
        self.post(text, None).await
    }

    /// Post into an existing thread (the approval outcome summary).
    pub async fn post_reply(&self, thread_ts: &str, text: &str) -> Result<String> {
        self.post(text, Some(thread_ts)).await
    }

    async fn post(&self, text: &str, thread_ts: Option<&str>) -> Result<String> {
        #[derive(Serialize)]
        struct Req<'a> {
            channel: &'a str,
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            thread_ts: Option<&'a str>,
            unfurl_links: bool,
            unfurl_media: bool,
        }
        #[derive(Deserialize)]
        struct Resp {
            ok: bool,
            ts: Option<String>,
            error: Option<String>,
        }

        let body = Req {
            channel: &self.channel,
            text,
            thread_ts,
            unfurl_links: false,
            unfurl_media: false,
        };

        let url = format!("{}/chat.postMessage", self.base_url);
        let http = &self.http;
        let token = self.token.as_str();
        let url = url.as_str();
        let body = &body;
        let resp: Resp = with_retry(&self.policy, || async move {
            let resp = http
                .post(url)
                .bearer_auth(token)
                .json(body)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(format!("{status} {text}"));
            }
            resp.json::<Resp>().await.map_err(|e| e.to_string())
        })
        .await
        .map_err(ClientError::NotifyFailed)?;

        // Slack reports API-level failures inside a 200 response.
        if !resp.ok {
            return Err(ClientError::NotifyFailed(
                resp.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        resp.ts
            .ok_or_else(|| ClientError::NotifyFailed("response missing ts".to_string()))
    }
}
