use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the external conversational agent. The bot forwards anything
/// it cannot route itself and relays the reply; all memory and prompting
/// live on the agent's side, keyed by the thread id.
#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
    token: String,
}

impl AgentClient {
    pub fn new(base_url: String, token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build agent HTTP client")?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub async fn generate(&self, prompt: &str, thread_id: &str) -> Result<String> {
        #[derive(Serialize)]
        struct GenerateReq<'a> {
            prompt: &'a str,
            thread_id: &'a str,
        }
        #[derive(Deserialize)]
        struct GenerateResp {
            text: String,
        }

        let url = format!("{}/generate", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&GenerateReq { prompt, thread_id })
            .send()
            .await
            .context("Agent request failed")?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("Agent request failed: {}", resp.status()));
        }

        let body: GenerateResp = resp.json().await.context("Malformed agent response")?;
        Ok(body.text)
    }
}

/// Stable per-user conversation key so multi-turn context survives across
/// invocations.
pub fn thread_id_for(tg_id: i64) -> String {
    format!("telegram-user-{tg_id}")
}
