//! Translation through a local Ollama server.

use crate::defaults;
use crate::error::{RedubError, Result};
use crate::stages::translator::{Translation, Translator};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for the Ollama translator.
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    /// Base URL, e.g. `http://localhost:11434`
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: defaults::OLLAMA_URL.to_string(),
            model: defaults::OLLAMA_MODEL.to_string(),
            temperature: defaults::TRANSLATION_TEMPERATURE,
            timeout: Duration::from_secs(defaults::TRANSLATION_TIMEOUT_SECS),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// What the model is asked to answer with.
#[derive(Debug, Deserialize, PartialEq)]
struct TranslationReply {
    translation: String,
    #[serde(default)]
    tts_instruction: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

/// Translator backed by Ollama's `/api/generate` endpoint.
#[derive(Debug)]
pub struct OllamaTranslator {
    config: OllamaConfig,
    client: reqwest::blocking::Client,
}

impl OllamaTranslator {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RedubError::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.config.url.trim_end_matches('/'))
    }

    fn request(&self, prompt: &str) -> std::result::Result<String, String> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .map_err(|e| format!("request failed: {}", e))?
            .error_for_status()
            .map_err(|e| format!("server error: {}", e))?;
        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| format!("invalid response body: {}", e))?;
        Ok(parsed.response)
    }
}

impl Translator for OllamaTranslator {
    fn translate(&self, text: &str, target_label: &str, target_duration: Option<f64>) -> Translation {
        if text.trim().is_empty() {
            return Translation::translated("");
        }

        info!(
            "Translating {} chars to {} with {}",
            text.chars().count(),
            target_label,
            self.config.model
        );
        let prompt = build_prompt(text, target_label, target_duration);
        match self.request(&prompt) {
            Ok(raw) => {
                let translation = parse_response(&raw);
                if translation.text.is_empty() {
                    warn!("Translator returned an empty answer, keeping the original text");
                    return Translation::degraded(text, "empty translation");
                }
                debug!("Translation: {}", translation.text);
                translation
            }
            Err(reason) => {
                warn!("Ollama translation failed, keeping the original text: {}", reason);
                Translation::degraded(text, reason)
            }
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Prompt asking for a JSON answer with translation and delivery hints.
pub fn build_prompt(text: &str, target_label: &str, target_duration: Option<f64>) -> String {
    let timing = match target_duration {
        Some(secs) if secs > 0.0 => format!(
            "The original line is spoken in about {:.1} seconds. Prefer a translation that can be spoken naturally in the same time.\n",
            secs
        ),
        _ => String::new(),
    };

    format!(
        "Translate the following dialogue into {target}.\n\
         Keep the speaker's tone, emotion and any specific terminology.\n\
         {timing}\
         Answer with a JSON object and nothing else:\n\
         {{\"translation\": \"<the translated line>\", \
         \"tts_instruction\": \"<short description of how the line should be delivered>\", \
         \"language\": \"<the target language name in English, lower case>\"}}\n\n\
         Text to translate:\n###\n{text}\n###\n",
        target = target_label,
        timing = timing,
        text = text
    )
}

/// Turn the model's answer into a `Translation`.
///
/// Anything that is not the requested JSON object is taken as the translation itself.
pub fn parse_response(raw: &str) -> Translation {
    let trimmed = raw.trim();
    match serde_json::from_str::<TranslationReply>(trimmed) {
        Ok(reply) => {
            let mut translation = Translation::translated(reply.translation.trim());
            translation.tts_instruction = non_blank(reply.tts_instruction);
            translation.target_language = non_blank(reply.language);
            translation
        }
        Err(_) => Translation::translated(trimmed.trim_matches('"').trim()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
