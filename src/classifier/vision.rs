use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use super::api::{ClassifierError, SignalClassifier};
use super::prompt::{response_schema, strategy_prompt};
use crate::capture::Frame;
use crate::config::ClassifierConfig;
use crate::signal::{AnalysisResult, Signal};

/// Vision model behind an OpenAI-compatible chat-completions endpoint
/// (OpenRouter by default).
pub struct VisionClassifier {
    http_client: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    allow_sell: bool,
}

impl VisionClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
            allow_sell: config.allow_sell,
        }
    }

    fn build_payload(&self, frame: &Frame) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "image_url", "image_url": { "url": frame.data_url() } },
                        { "type": "text", "text": strategy_prompt(self.allow_sell) }
                    ]
                }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "chart_analysis",
                    "strict": true,
                    "schema": response_schema()
                }
            }
        })
    }

    fn extract_text_content(body: &Value) -> Result<&str, ClassifierError> {
        body.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.pointer("/message/content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| {
                ClassifierError::Schema("missing choices[0].message.content".into())
            })
    }
}

/// Turn the model's text into a validated result.
///
/// The JSON object is cut out of the text, so code fences or a stray
/// sentence around it are tolerated.
pub fn parse_analysis(
    text: &str,
    allow_sell: bool,
    timestamp: i64,
) -> Result<AnalysisResult, ClassifierError> {
    let start = text
        .find('{')
        .ok_or_else(|| ClassifierError::Schema("no JSON object in response".into()))?;
    let end = text
        .rfind('}')
        .map(|i| i + 1)
        .filter(|end| *end > start)
        .ok_or_else(|| ClassifierError::Schema("unterminated JSON object".into()))?;

    let mut result: AnalysisResult = serde_json::from_str(&text[start..end])?;

    if !result.confidence.is_finite() || !(0.0..=100.0).contains(&result.confidence) {
        return Err(ClassifierError::Schema(format!(
            "confidence {} outside 0..=100",
            result.confidence
        )));
    }

    if result.signal == Signal::Sell && !allow_sell {
        debug!("Sell signal downgraded to WAIT (buy-only protocol)");
        result.signal = Signal::Wait;
    }

    result.timestamp = timestamp;
    Ok(result)
}

#[async_trait]
impl SignalClassifier for VisionClassifier {
    #[instrument(skip(self, frame), fields(model = %self.model, bytes = frame.bytes.len()))]
    async fn classify(&self, frame: &Frame) -> Result<AnalysisResult, ClassifierError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ClassifierError::MissingCredential)?;

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&self.build_payload(frame))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout
                } else {
                    ClassifierError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::HttpStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::Http(e.to_string()))?;
        let text = Self::extract_text_content(&body)?;

        parse_analysis(text, self.allow_sell, frame.captured_at.timestamp_millis())
    }

    fn configuration_warning(&self) -> Option<String> {
        if self.api_key.is_none() {
            Some("VISION_API_KEY is not set: every analysis will fail until it is configured".into())
        } else {
            None
        }
    }
}
