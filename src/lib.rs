// Prompt formatter + responder around a local llama.cpp model, served over HTTP

pub mod error;
pub mod web;

// Canned generator for running the server without a model
#[cfg(feature = "mock")]
pub mod chat_mock;

// Used by the sys_* logging macros
#[doc(hidden)]
pub use log as __log;

pub use error::{ResponderError, Result};
pub use web::chat::{
    ChatMessage, ChatTemplate, Conversation, GenerationParams, JinjaChatTemplate, RenderOptions,
    Responder, Role, TextGenerator, DEFAULT_SYSTEM_PROMPT, MAX_TOKENS,
};
