//! Prompt formatter + responder.
//!
//! Wraps a free-text prompt in the fixed system/user conversation, renders it
//! through a chat template and hands the text to a generator. The template and
//! the generator are trait objects so the web layer can be exercised with
//! fakes and the real model only exists in the binary.

use std::sync::Arc;

use super::conversation::{ChatMessage, Conversation};
use crate::error::Result;

/// Upper bound on generated tokens for every request.
pub const MAX_TOKENS: u32 = 512;

/// Options passed to [`ChatTemplate::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Append the marker that opens the assistant's turn.
    pub add_generation_prompt: bool,
}

impl RenderOptions {
    pub fn for_generation() -> Self {
        Self {
            add_generation_prompt: true,
        }
    }
}

/// Parameters passed to [`TextGenerator::generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    /// Log the prompt, the streamed text and throughput while generating.
    pub verbose: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: MAX_TOKENS,
            verbose: true,
        }
    }
}

/// Renders role-tagged messages into the single string a model expects.
///
/// Returns text, never tokens; tokenization belongs to the generator.
pub trait ChatTemplate: Send + Sync {
    fn apply(&self, messages: &[ChatMessage], options: RenderOptions) -> Result<String>;
}

/// Produces a completion for an already rendered prompt. Blocking.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Formats a prompt and returns the generator's output untouched.
#[derive(Clone)]
pub struct Responder {
    template: Arc<dyn ChatTemplate>,
    generator: Arc<dyn TextGenerator>,
}

impl Responder {
    pub fn new(template: Arc<dyn ChatTemplate>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            template,
            generator,
        }
    }

    /// Render the fixed conversation for `prompt` without generating.
    pub fn render(&self, prompt: &str) -> Result<String> {
        let conversation = Conversation::new(prompt);
        self.template
            .apply(conversation.messages(), RenderOptions::for_generation())
    }

    /// One full request: format, generate, pass the result through.
    pub fn respond(&self, prompt: &str) -> Result<String> {
        let rendered = self.render(prompt)?;
        self.generator
            .generate(&rendered, &GenerationParams::default())
    }
}
