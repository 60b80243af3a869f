// Web server modules for the llama.cpp responder

pub mod chat;
pub mod config;
pub mod generation_queue;
pub mod gguf_utils;
pub mod hub;
pub mod logger;
pub mod model_manager;
pub mod models;
pub mod request_parsing;
pub mod response_helpers;
pub mod routes;

// Re-export commonly used types
pub use config::{AppConfig, UiConfig};
pub use generation_queue::GenerationQueue;
pub use hub::HubBackend;
pub use models::{AppContext, ModelInfo, SharedContext, TemplateSource};
pub use routes::handle_request;
