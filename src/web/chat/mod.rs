// Chat module: prompt formatting and generation
//
// - conversation.rs: the fixed system + user message pair
// - jinja_templates.rs: chat template rendering (native GGUF template or ChatML)
// - responder.rs: format-then-generate pipeline behind the template/generator traits
// - generation.rs: token generation on a loaded llama.cpp model
// - sampler.rs: sampler chain construction
// - stop_conditions.rs: stop string detection

mod conversation;
mod generation;
mod jinja_templates;
mod responder;
mod sampler;
mod stop_conditions;

pub use conversation::{ChatMessage, Conversation, Role, DEFAULT_SYSTEM_PROMPT};
pub use generation::{GenerationOutput, LlamaGenerator, StopReason};
pub use jinja_templates::{JinjaChatTemplate, CHATML_TEMPLATE};
pub use responder::{
    ChatTemplate, GenerationParams, RenderOptions, Responder, TextGenerator, MAX_TOKENS,
};
pub use sampler::SamplingConfig;
pub use stop_conditions::{check_stop_conditions, StopConditionResult};
