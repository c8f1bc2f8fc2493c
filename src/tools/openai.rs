use crate::capabilities::LanguageModel;
use crate::tools::checked;
use anyhow::Result;
use async_trait::async_trait;
use log::info;
use serde_json::Value;

/// Single-turn chat completion against any OpenAI-compatible endpoint.
pub struct OpenAiChat {
    client: reqwest::Client,
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
}

impl OpenAiChat {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }
}

fn completion_text(body: &Value) -> Option<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        info!("Requesting completion from {}", self.model);
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = checked("llm", req.send().await?)?;
        let json: Value = resp.json().await?;
        completion_text(&json).ok_or_else(|| anyhow::anyhow!("Completion response carried no message content"))
    }
}
