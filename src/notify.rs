//! Discord webhook publishing.
//!
//! One embed per digest, posted with `wait=true` so the webhook returns the
//! message id, then edited in place for the rest of the effective day.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

/// Embed accent color for digest messages.
pub const EMBED_COLOR: u32 = 0xFF57CF;

pub struct Webhook {
    client: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

impl Webhook {
    /// Bind to a webhook endpoint. Any query string on the configured URL
    /// is stripped before use.
    pub fn new(raw_url: &str) -> Result<Webhook> {
        let mut url = Url::parse(raw_url).context("DISCORD_WEBHOOK_URL is not a valid URL")?;
        url.set_query(None);

        Ok(Webhook {
            client: reqwest::Client::new(),
            url: url.to_string(),
        })
    }

    /// Post a new message and return its id.
    pub async fn post(&self, payload: &Value) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("wait", "true")])
            .json(payload)
            .send()
            .await
            .context("Webhook post failed")?;
        let response = check_response(response).await?;

        let message: MessageRef = response
            .json()
            .await
            .context("Webhook returned an unreadable message")?;
        Ok(message.id)
    }

    /// Edit an existing message in place.
    pub async fn edit(&self, message_id: &str, payload: &Value) -> Result<()> {
        let url = format!("{}/messages/{}", self.url.trim_end_matches('/'), message_id);
        let response = self
            .client
            .patch(&url)
            .json(payload)
            .send()
            .await
            .context("Webhook edit failed")?;
        check_response(response).await?;
        Ok(())
    }
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("Webhook responded HTTP {status}: {body}")
}

/// The webhook payload for a rendered digest body.
pub fn digest_payload(description: &str) -> Value {
    json!({
        "embeds": [{
            "description": description,
            "color": EMBED_COLOR,
        }]
    })
}
