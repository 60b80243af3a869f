// Mock generator for running the web UI without downloading or loading a model

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::sys_info;
use crate::web::chat::{GenerationParams, JinjaChatTemplate, Responder, TextGenerator};
use crate::web::config::AppConfig;
use crate::web::models::{ModelInfo, TemplateSource};

/// Canned replies, picked by keyword in the rendered prompt.
pub struct MockGenerator {
    delay: Duration,
}

impl MockGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        // Simulate some processing time
        Self::new(Duration::from_millis(500))
    }
}

impl TextGenerator for MockGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        if params.verbose {
            sys_info!("[MOCK] Prompt:\n{}", prompt);
        }
        std::thread::sleep(self.delay);

        // Only look at the user turn, the system text is always there
        let user_turn = prompt
            .rsplit("<|im_start|>user\n")
            .next()
            .unwrap_or(prompt)
            .to_lowercase();

        let response = match user_turn.as_str() {
            msg if msg.contains("2+2") => "4",
            msg if has_word(msg, "hello") || has_word(msg, "hi") => {
                "Hello! I'm a mock assistant. How can I help you today?"
            }
            msg if has_word(msg, "help") => {
                "I'm running in mock mode: no model is loaded, so replies are canned."
            }
            _ => "This is a mock response. Start the server without the `mock` feature to talk to the model.",
        };

        Ok(response.to_string())
    }
}

/// Whole-word match, so "hi" doesn't fire on "this" or "which".
fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

/// Responder wired to ChatML and the mock generator, plus matching status info.
pub fn mock_responder(config: &AppConfig) -> (Responder, ModelInfo) {
    let template = JinjaChatTemplate::chatml();
    let info = ModelInfo {
        model_path: "(mock)".to_string(),
        model_id: config.model_id.clone(),
        hub: config.hub,
        architecture: "mock".to_string(),
        name: Some("Mock model".to_string()),
        context_size: config.context_size,
        gpu_layers: 0,
        template_source: TemplateSource::Mock,
        eos_token: Some(template.eos_token().to_string()),
        max_tokens: crate::web::chat::MAX_TOKENS,
    };
    let responder = Responder::new(Arc::new(template), Arc::new(MockGenerator::default()));
    (responder, info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_answers_arithmetic() {
        let responder = Responder::new(
            Arc::new(JinjaChatTemplate::chatml()),
            Arc::new(MockGenerator::new(Duration::ZERO)),
        );
        assert_eq!(responder.respond("2+2=").unwrap(), "4");
    }

    #[test]
    fn test_mock_ignores_system_text() {
        // "helpful" in the system prompt must not trigger the help reply
        let responder = Responder::new(
            Arc::new(JinjaChatTemplate::chatml()),
            Arc::new(MockGenerator::new(Duration::ZERO)),
        );
        let out = responder.respond("what is rust").unwrap();
        assert!(out.starts_with("This is a mock response"));
    }

    #[test]
    fn test_mock_greets_on_whole_words_only() {
        let responder = Responder::new(
            Arc::new(JinjaChatTemplate::chatml()),
            Arc::new(MockGenerator::new(Duration::ZERO)),
        );
        assert!(responder.respond("Hi there!").unwrap().starts_with("Hello!"));
        assert!(responder.respond("hello").unwrap().starts_with("Hello!"));

        let out = responder.respond("which of this thing").unwrap();
        assert!(out.starts_with("This is a mock response"));
    }

    #[test]
    fn test_has_word() {
        assert!(has_word("oh, hi.", "hi"));
        assert!(!has_word("this which", "hi"));
        assert!(!has_word("helpful", "help"));
    }
}
