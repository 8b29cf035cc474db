//! Content rewriter adapter.
//!
//! Talks to any OpenAI-compatible chat completion endpoint. The service is
//! treated as opaque text-in/text-out; the pipeline never trusts its output
//! to keep markup intact, which is why references and scripts are tokenized
//! before anything is sent.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::Rewriter;
use crate::domain::{Difficulty, Tag, TagSet};

/// Default instructions for prose rewriting
pub const REWRITE_INSTRUCTIONS: &str = "Rewrite the human-readable text in the following HTML \
fragment so it reads naturally. Return only HTML. Keep every tag, attribute and HTML comment \
exactly as given. Never change, remove or reorder tokens of the form __LFREF_000000__ or \
<!--__LFBLOCK_000000__-->.";

/// OpenAI-compatible chat completion client
pub struct ChatRewriter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatRewriter {
    /// Create a client for `endpoint` (base URL, `/chat/completions` is appended)
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl Rewriter for ChatRewriter {
    fn name(&self) -> &str {
        "chat"
    }

    async fn rewrite(&self, text: &str, instructions: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": instructions },
                { "role": "user", "content": text },
            ],
        });

        let mut request = self.client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach rewriter endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Rewriter returned HTTP {}: {}", status, text.trim());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse rewriter response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("Rewriter response has no content")?;

        debug!(
            model = %self.model,
            input_bytes = text.len(),
            output_bytes = content.len(),
            "Rewriter call completed"
        );

        Ok(content)
    }
}

/// Tags and difficulty derived from a document
#[derive(Debug, Clone, Default)]
pub struct TagAnalysis {
    pub tags: TagSet,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    difficulty: Option<String>,
}

fn tagging_instructions() -> String {
    let vocabulary: Vec<&str> = Tag::ALL.iter().map(|t| t.as_str()).collect();
    format!(
        "Classify the phishing cues in the following content. Answer with JSON only, shaped as \
{{\"tags\": [...], \"difficulty\": \"easy|medium|hard\"}}. Use only these tags: {}.",
        vocabulary.join(", ")
    )
}

/// Parse the JSON object in a tagging answer, tolerating code fences and chatter
pub fn parse_analysis(answer: &str) -> Result<TagAnalysis> {
    let start = answer.find('{').context("No JSON object in tagging answer")?;
    let end = answer.rfind('}').context("No JSON object in tagging answer")?;
    if end < start {
        anyhow::bail!("Malformed JSON object in tagging answer");
    }

    let raw: RawAnalysis =
        serde_json::from_str(&answer[start..=end]).context("Failed to parse tagging JSON")?;

    let mut tags = TagSet::new();
    let dropped = tags.extend_labels(raw.tags.iter().map(String::as_str));
    if dropped > 0 {
        debug!(dropped, "Dropped tags outside the vocabulary");
    }

    Ok(TagAnalysis {
        tags,
        difficulty: raw.difficulty.as_deref().and_then(Difficulty::parse_label),
    })
}

/// Ask the rewriter to tag `text` with the controlled vocabulary
pub async fn analyze_tags(rewriter: &dyn Rewriter, text: &str) -> Result<TagAnalysis> {
    let answer = rewriter
        .rewrite(text, &tagging_instructions())
        .await
        .context("Tagging call failed")?;
    parse_analysis(&answer)
}
