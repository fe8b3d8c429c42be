use crate::{HarvestConfig, HarvestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Output of the translator collaborator.
///
/// `language` is the detected source language, set only when the text was
/// actually translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub title: String,
    pub snippet: String,
    pub language: Option<String>,
}

impl Translation {
    /// The input strings with no language: what every failure path returns.
    pub fn unchanged(title: &str, snippet: &str) -> Self {
        Self {
            title: title.to_string(),
            snippet: snippet.to_string(),
            language: None,
        }
    }
}

/// Reduces a language tag to its lowercase primary subtag: `en-US` and `EN`
/// both become `en`.
pub fn primary_language(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Detects a title's language and, when it differs from the target language,
/// translates title and snippet.
///
/// Implementations never fail: on any internal error they return
/// [`Translation::unchanged`].
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, title: &str, snippet: &str) -> Translation;
}

/// A translator that leaves every result as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, title: &str, snippet: &str) -> Translation {
        Translation::unchanged(title, snippet)
    }
}

/// Translator backed by a LibreTranslate-compatible HTTP service.
pub struct LibreTranslator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    target: String,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct Detection {
    language: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: [&'a str; 2],
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: Vec<String>,
}

impl LibreTranslator {
    /// Creates a new `LibreTranslator`.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Base URL of the service, without the `/detect` or `/translate` path.
    /// * `api_key` - Optional key sent with every request.
    /// * `config` - Supplies the target language and the request timeout.
    pub fn new(endpoint: &str, api_key: Option<String>, config: &HarvestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.recovery_timeout())
            .build()
            .map_err(HarvestError::Request)?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            target: primary_language(&config.target_language),
        })
    }

    async fn detect(&self, text: &str) -> Result<Option<String>> {
        let response = self
            .client
            .post(format!("{}/detect", self.endpoint))
            .json(&DetectRequest {
                q: text,
                api_key: self.api_key.as_deref(),
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HarvestError::Http(response.status().as_u16()));
        }

        let detections: Vec<Detection> = response.json().await?;
        Ok(detections
            .into_iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|d| primary_language(&d.language)))
    }

    async fn translate_pair(&self, title: &str, snippet: &str) -> Result<(String, String)> {
        let response = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .json(&TranslateRequest {
                q: [title, snippet],
                source: "auto",
                target: &self.target,
                format: "text",
                api_key: self.api_key.as_deref(),
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HarvestError::Http(response.status().as_u16()));
        }

        let mut body: TranslateResponse = response.json().await?;
        let snippet = body.translated_text.pop().unwrap_or_default();
        let title = body.translated_text.pop().unwrap_or_default();
        Ok((title, snippet))
    }

    async fn try_translate(&self, title: &str, snippet: &str) -> Result<Translation> {
        let language = match self.detect(title).await? {
            Some(language) if language != self.target => language,
            _ => return Ok(Translation::unchanged(title, snippet)),
        };

        let (translated_title, translated_snippet) = self.translate_pair(title, snippet).await?;
        if translated_title.trim().is_empty() {
            return Ok(Translation::unchanged(title, snippet));
        }

        debug!(%language, "Translated result");
        Ok(Translation {
            title: translated_title,
            snippet: translated_snippet,
            language: Some(language),
        })
    }
}

#[async_trait]
impl Translator for LibreTranslator {
    async fn translate(&self, title: &str, snippet: &str) -> Translation {
        if title.trim().is_empty() {
            return Translation::unchanged(title, snippet);
        }

        match self.try_translate(title, snippet).await {
            Ok(translation) => translation,
            Err(e) => {
                warn!(error = %e, %title, "Translation failed; keeping original text");
                Translation::unchanged(title, snippet)
            }
        }
    }
}

/// Builds the translator the configuration asks for.
pub fn from_config(config: &HarvestConfig) -> Result<Box<dyn Translator>> {
    match &config.translator.endpoint {
        Some(endpoint) => Ok(Box::new(LibreTranslator::new(
            endpoint,
            config.translator.api_key.clone(),
            config,
        )?)),
        None => Ok(Box::new(PassthroughTranslator)),
    }
}
