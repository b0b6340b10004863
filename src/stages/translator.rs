//! Transcript translation.

use crate::stages::CallLog;
use std::sync::Arc;
use tracing::warn;

/// Whether the translator actually translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated,
    /// The backend failed; `Translation::text` is the untranslated input.
    DegradedToOriginal { reason: String },
}

/// Translated text plus optional synthesis hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    /// Delivery/style hint for the synthesizer ("whispering, tense").
    pub tts_instruction: Option<String>,
    /// Language name resolved by the translator, preferred for synthesis.
    pub target_language: Option<String>,
    pub outcome: TranslationOutcome,
}

impl Translation {
    pub fn translated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tts_instruction: None,
            target_language: None,
            outcome: TranslationOutcome::Translated,
        }
    }

    /// Fallback result carrying the original text.
    pub fn degraded(original: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            text: original.into(),
            tts_instruction: None,
            target_language: None,
            outcome: TranslationOutcome::DegradedToOriginal {
                reason: reason.into(),
            },
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.tts_instruction = Some(instruction.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = Some(language.into());
        self
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, TranslationOutcome::DegradedToOriginal { .. })
    }
}

/// Trait for text translation.
///
/// Translators never fail outright: when the backend is unavailable they hand back the
/// original text tagged as `DegradedToOriginal`, and the caller decides what to do.
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_label` ("Brazilian Portuguese").
    ///
    /// `target_duration` is the length in seconds of the speech being replaced, a hint
    /// for producing a translation of similar spoken length.
    fn translate(&self, text: &str, target_label: &str, target_duration: Option<f64>) -> Translation;

    fn name(&self) -> &str;
}

impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(&self, text: &str, target_label: &str, target_duration: Option<f64>) -> Translation {
        (**self).translate(text, target_label, target_duration)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Language to synthesize in.
///
/// The translator's resolved language wins; otherwise the last word of the configured
/// label, lower-cased ("Brazilian Portuguese" -> "portuguese").
pub fn synthesis_language(translation: &Translation, target_label: &str) -> String {
    if let Some(language) = translation
        .target_language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
    {
        return language.to_string();
    }

    let guess = target_label
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_lowercase();
    warn!(
        "Translator did not resolve a language, guessing '{}' from '{}'",
        guess, target_label
    );
    guess
}

/// Mock translator for testing
#[derive(Debug, Clone)]
pub struct MockTranslator {
    response: Option<String>,
    instruction: Option<String>,
    language: Option<String>,
    degraded_reason: Option<String>,
    calls: CallLog,
}

impl MockTranslator {
    /// Mock that prefixes the input with `[translated] `
    pub fn new() -> Self {
        Self {
            response: None,
            instruction: None,
            language: None,
            degraded_reason: None,
            calls: CallLog::default(),
        }
    }

    /// Configure the mock to return a specific translation
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = Some(response.to_string());
        self
    }

    pub fn with_instruction(mut self, instruction: &str) -> Self {
        self.instruction = Some(instruction.to_string());
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// Configure the mock to fall back to the original text
    pub fn degraded(mut self, reason: &str) -> Self {
        self.degraded_reason = Some(reason.to_string());
        self
    }

    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator for MockTranslator {
    fn translate(&self, text: &str, target_label: &str, target_duration: Option<f64>) -> Translation {
        self.calls.record(match target_duration {
            Some(secs) => format!("translate {} {:.2}", target_label, secs),
            None => format!("translate {}", target_label),
        });
        if let Some(reason) = &self.degraded_reason {
            return Translation::degraded(text, reason.clone());
        }

        let mut translation = Translation::translated(
            self.response
                .clone()
                .unwrap_or_else(|| format!("[translated] {}", text)),
        );
        translation.tts_instruction = self.instruction.clone();
        translation.target_language = self.language.clone();
        translation
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_language_wins() {
        let translation = Translation::translated("oi").with_language("portuguese");
        assert_eq!(synthesis_language(&translation, "Brazilian Portuguese"), "portuguese");
    }

    #[test]
    fn falls_back_to_last_word_of_label() {
        let translation = Translation::translated("oi");
        assert_eq!(synthesis_language(&translation, "Brazilian Portuguese"), "portuguese");
        assert_eq!(synthesis_language(&translation, "  Spanish "), "spanish");
    }

    #[test]
    fn blank_resolved_language_is_ignored() {
        let translation = Translation::translated("hola").with_language("  ");
        assert_eq!(synthesis_language(&translation, "Latin American Spanish"), "spanish");
    }

    #[test]
    fn degraded_keeps_original_text() {
        let translation = Translation::degraded("hello", "connection refused");
        assert!(translation.is_degraded());
        assert_eq!(translation.text, "hello");
        assert_eq!(
            translation.outcome,
            TranslationOutcome::DegradedToOriginal {
                reason: "connection refused".to_string()
            }
        );
    }

    #[test]
    fn mock_records_duration_hint() {
        let log = CallLog::default();
        let translator = MockTranslator::new().with_call_log(log.clone());

        let translation = translator.translate("hi", "French", Some(1.5));
        assert_eq!(translation.text, "[translated] hi");
        assert!(!translation.is_degraded());
        assert_eq!(log.entries(), vec!["translate French 1.50"]);
    }

    #[test]
    fn mock_hints_are_passed_through() {
        let translation = MockTranslator::new()
            .with_response("salut")
            .with_instruction("calm")
            .with_language("french")
            .translate("hi", "French", None);

        assert_eq!(translation.text, "salut");
        assert_eq!(translation.tts_instruction.as_deref(), Some("calm"));
        assert_eq!(translation.target_language.as_deref(), Some("french"));
    }

    #[test]
    fn translator_trait_is_object_safe() {
        let translator: Box<dyn Translator> = Box::new(MockTranslator::new().degraded("offline"));
        assert!(translator.translate("x", "German", None).is_degraded());
    }
}
