use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::config::UiConfig;
use super::generation_queue::GenerationQueue;
use super::hub::HubBackend;

/// Where the active chat template came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateSource {
    /// `tokenizer.chat_template` from the GGUF file.
    Gguf,
    /// Built-in ChatML fallback.
    Chatml,
    /// No model loaded (mock build).
    Mock,
}

/// What was loaded at startup, reported by `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_path: String,
    pub model_id: String,
    pub hub: HubBackend,
    pub architecture: String,
    pub name: Option<String>,
    pub context_size: u32,
    pub gpu_layers: u32,
    pub template_source: TemplateSource,
    pub eos_token: Option<String>,
    pub max_tokens: u32,
}

// Request/Response structures
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Everything request handlers need, built once in `main`.
pub struct AppContext {
    pub queue: GenerationQueue,
    pub ui: UiConfig,
    pub model: ModelInfo,
}

pub type SharedContext = Arc<AppContext>;
