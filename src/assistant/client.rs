use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    models::{ChatRole, WaterQualityRecord},
    settings::AssistantSettings,
};

use super::prompt::{build_prompt, APOLOGY_MESSAGE, NOT_CONFIGURED_MESSAGE, SYSTEM_INSTRUCTION};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: RequestContent<'a>,
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Bridge to the hosted language model.
pub struct AssistantClient {
    settings: AssistantSettings,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl AssistantClient {
    /// A blank or missing key leaves the client unconfigured; it then answers
    /// with a fixed notice instead of calling out.
    pub fn new(settings: AssistantSettings, api_key: Option<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                log_warn!("assistant HTTP client setup failed, using defaults without timeout: {err}");
                reqwest::Client::new()
            });

        Self {
            settings,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            http_client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Free-text answer to `prompt` over `records`. Never fails.
    pub async fn respond(&self, prompt: &str, records: &[WaterQualityRecord]) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return NOT_CONFIGURED_MESSAGE.to_string();
        };

        let result = match build_prompt(prompt, records, self.settings.recent_records) {
            Ok(full_prompt) => self.generate(api_key, &full_prompt).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(text) => text,
            Err(err) => {
                log_error!("assistant call failed: {err:?}");
                APOLOGY_MESSAGE.to_string()
            }
        }
    }

    async fn generate(&self, api_key: &str, full_prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        );
        let body = GenerateRequest {
            system_instruction: RequestContent {
                role: None,
                parts: [RequestPart {
                    text: SYSTEM_INSTRUCTION,
                }],
            },
            contents: [RequestContent {
                role: Some(ChatRole::User.as_str()),
                parts: [RequestPart { text: full_prompt }],
            }],
        };

        log_debug!("calling {} ({} prompt chars)", self.settings.model, full_prompt.len());

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .context("model request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("model returned {status}: {detail}");
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .context("failed to decode model response")?;

        let text: String = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(anyhow!("model returned no text"));
        }
        Ok(text)
    }
}
