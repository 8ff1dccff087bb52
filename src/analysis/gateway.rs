//! Outbound LLM boundary.
//!
//! All network calls and their prompt/response contracts live here. The
//! controller only ever sees typed verdicts or typed errors; a malformed
//! model response is a recoverable [`AnalysisError::MalformedResponse`],
//! never a panic.

use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::models::{DistractionReason, Interruption, Reflection};
use crate::settings::SettingsStore;

use super::prompts::{
    classification_context, classification_schema, CLASSIFIER_SYSTEM_PROMPT,
    SUMMARY_SYSTEM_PROMPT,
};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("no images provided for analysis")]
    NoImages,

    #[error("analysis request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analysis endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model returned a malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusStatus {
    Focused,
    Distracted,
}

/// Schema-constrained classification of a recent screenshot batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistractionVerdict {
    pub status: FocusStatus,
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
}

/// Everything the end-of-session narrative folds in.
#[derive(Debug, Clone, Default)]
pub struct SummaryContext {
    pub focus_goal: String,
    pub summaries: Vec<String>,
    pub interruptions: Vec<Interruption>,
    pub distractions: Vec<DistractionReason>,
    pub reflections: Vec<Reflection>,
}

/// Seam for the controller so tests can stand in a fake model.
#[async_trait]
pub trait FocusAnalyzer: Send + Sync {
    async fn analyze_screenshots(
        &self,
        images: &[String],
        focus_goal: &str,
        tasks: Option<&[String]>,
    ) -> Result<DistractionVerdict, AnalysisError>;

    /// `None` means "nothing to synthesize" — no summaries, no credential,
    /// or a failed/empty model response. Callers treat absence as fine.
    async fn generate_final_summary(&self, context: &SummaryContext) -> Option<String>;
}

pub struct AnalysisGateway {
    client: Client,
    settings: Arc<SettingsStore>,
}

impl AnalysisGateway {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    async fn post_chat(&self, api_key: &str, body: &Value) -> Result<Value, AnalysisError> {
        let base_url = self.settings.analysis().base_url;
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl FocusAnalyzer for AnalysisGateway {
    async fn analyze_screenshots(
        &self,
        images: &[String],
        focus_goal: &str,
        tasks: Option<&[String]>,
    ) -> Result<DistractionVerdict, AnalysisError> {
        if images.is_empty() {
            return Err(AnalysisError::NoImages);
        }

        let settings = self.settings.analysis();
        let api_key = settings
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or(AnalysisError::MissingApiKey)?;

        let mut content = vec![json!({
            "type": "text",
            "text": classification_context(focus_goal, tasks),
        })];
        for image in images {
            // Low detail keeps token cost bounded per frame.
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": image, "detail": "low" },
            }));
        }

        let body = json!({
            "model": settings.model,
            "messages": [
                { "role": "system", "content": CLASSIFIER_SYSTEM_PROMPT },
                { "role": "user", "content": content },
            ],
            "response_format": classification_schema(),
        });

        let response = self.post_chat(&api_key, &body).await?;
        let message = extract_message_content(&response)?;
        parse_verdict(&message)
    }

    async fn generate_final_summary(&self, context: &SummaryContext) -> Option<String> {
        if context.summaries.is_empty() {
            return None;
        }

        let settings = self.settings.analysis();
        let Some(api_key) = settings.api_key.filter(|key| !key.is_empty()) else {
            info!("skipping final summary: no API key configured");
            return None;
        };

        let system_prompt = settings
            .summary_prompt
            .unwrap_or_else(|| SUMMARY_SYSTEM_PROMPT.to_string());

        let body = json!({
            "model": settings.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": summary_sections(context) },
            ],
        });

        let response = match self.post_chat(&api_key, &body).await {
            Ok(response) => response,
            Err(err) => {
                warn!("final summary request failed: {err}");
                return None;
            }
        };

        match extract_message_content(&response) {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(err) => {
                warn!("final summary response unusable: {err}");
                None
            }
        }
    }
}

fn extract_message_content(response: &Value) -> Result<String, AnalysisError> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            AnalysisError::MalformedResponse("response contained no message content".into())
        })
}

fn parse_verdict(content: &str) -> Result<DistractionVerdict, AnalysisError> {
    serde_json::from_str(content).map_err(|err| AnalysisError::MalformedResponse(err.to_string()))
}

/// Folds all session artifacts into plain-text sections for the narrative
/// request.
fn summary_sections(context: &SummaryContext) -> String {
    let mut text = format!("Focus goal: {}\n", context.focus_goal);

    text.push_str("\nInterim activity analyses:\n");
    for summary in &context.summaries {
        text.push_str(&format!("- {summary}\n"));
    }

    if !context.interruptions.is_empty() {
        text.push_str("\nInterruptions (system sleep / screen lock):\n");
        for interruption in &context.interruptions {
            let minutes = interruption.duration_ms.unwrap_or(0) as f64 / 60_000.0;
            match &interruption.user_reflection {
                Some(reflection) => text.push_str(&format!(
                    "- paused {minutes:.1} min: {reflection}\n"
                )),
                None => text.push_str(&format!("- paused {minutes:.1} min\n")),
            }
        }
    }

    if !context.distractions.is_empty() {
        text.push_str("\nDistractions the user noted:\n");
        for distraction in &context.distractions {
            text.push_str(&format!("- {}\n", distraction.content));
        }
    }

    if !context.reflections.is_empty() {
        text.push_str("\nUser reflections:\n");
        for reflection in &context.reflections {
            text.push_str(&format!("- {}\n", reflection.content));
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn gateway_with_key(api_key: Option<&str>) -> AnalysisGateway {
        let dir = tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("settings.json")).expect("settings");
        let mut settings = store.current();
        settings.analysis.api_key = api_key.map(ToOwned::to_owned);
        store.update(settings).expect("update");
        AnalysisGateway::new(Arc::new(store))
    }

    #[tokio::test]
    async fn empty_image_list_fails_before_any_network_call() {
        let gateway = gateway_with_key(Some("sk-test"));
        let err = gateway
            .analyze_screenshots(&[], "goal", None)
            .await
            .expect_err("no images");
        assert!(matches!(err, AnalysisError::NoImages));
    }

    #[tokio::test]
    async fn missing_api_key_is_a_typed_failure() {
        let gateway = gateway_with_key(None);
        let images = vec!["data:image/png;base64,AAAA".to_string()];
        let err = gateway
            .analyze_screenshots(&images, "goal", None)
            .await
            .expect_err("no key");
        assert!(matches!(err, AnalysisError::MissingApiKey));
    }

    #[tokio::test]
    async fn empty_summaries_skip_the_final_summary_call() {
        let gateway = gateway_with_key(Some("sk-test"));
        let context = SummaryContext {
            focus_goal: "goal".into(),
            ..Default::default()
        };
        assert!(gateway.generate_final_summary(&context).await.is_none());
    }

    #[tokio::test]
    async fn missing_key_skips_the_final_summary_call() {
        let gateway = gateway_with_key(None);
        let context = SummaryContext {
            focus_goal: "goal".into(),
            summaries: vec!["worked on the draft".into()],
            ..Default::default()
        };
        assert!(gateway.generate_final_summary(&context).await.is_none());
    }

    #[test]
    fn verdict_parses_schema_constrained_content() {
        let verdict = parse_verdict(
            r#"{"status":"distracted","analysis":"browsing videos","suggestion":"close the tab"}"#,
        )
        .expect("parse");
        assert_eq!(verdict.status, FocusStatus::Distracted);
        assert_eq!(verdict.analysis.as_deref(), Some("browsing videos"));
    }

    #[test]
    fn malformed_content_is_a_typed_error_not_a_panic() {
        let err = parse_verdict("I am not JSON").expect_err("malformed");
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[test]
    fn message_extraction_rejects_shapeless_responses() {
        let err = extract_message_content(&json!({"choices": []})).expect_err("no content");
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));

        let ok = extract_message_content(&json!({
            "choices": [{"message": {"content": "{\"status\":\"focused\"}"}}]
        }))
        .expect("content");
        assert!(ok.contains("focused"));
    }

    #[test]
    fn summary_sections_fold_in_all_artifacts() {
        let now = Utc::now();
        let mut interruption = Interruption::open(now);
        interruption.resolve(now + chrono::Duration::milliseconds(90_000));
        interruption.user_reflection = Some("stepped out".into());

        let context = SummaryContext {
            focus_goal: "write report".into(),
            summaries: vec!["drafting section 2".into()],
            interruptions: vec![interruption],
            distractions: vec![DistractionReason {
                timestamp: now,
                content: "checked messages".into(),
            }],
            reflections: vec![Reflection {
                timestamp: now,
                content: "good momentum".into(),
            }],
        };

        let text = summary_sections(&context);
        assert!(text.contains("write report"));
        assert!(text.contains("drafting section 2"));
        assert!(text.contains("paused 1.5 min: stepped out"));
        assert!(text.contains("checked messages"));
        assert!(text.contains("good momentum"));
    }
}
