// Configuration: assets/config.json (optional) with environment overrides

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::hub::HubBackend;

pub const CONFIG_PATH: &str = "assets/config.json";

/// Text shown on the single chat page.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub title: String,
    pub description: String,
    pub placeholder: String,
    pub output_label: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            title: "QwQ-32B Chatbot (llama.cpp)".to_string(),
            description: "Powered by a quantized GGUF model running locally".to_string(),
            placeholder: "Enter your question, e.g., provide C++ code for the Fibonacci sequence"
                .to_string(),
            output_label: "QwQ-32B Response".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub hub: HubBackend,
    pub model_id: String,
    /// GGUF file inside the repo. `None` picks the first `.gguf` listed.
    pub model_file: Option<String>,
    /// Local model file; skips the hub entirely when set.
    pub model_path: Option<String>,
    pub cache_dir: String,
    /// Replaces the tokenizer's end-of-sequence text, also used as a stop string.
    pub eos_token: Option<String>,
    pub context_size: u32,
    pub gpu_layers: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub seed: u32,
    pub host: String,
    pub port: u16,
    pub log_file: String,
    pub log_level: String,
    pub ui: UiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hub: HubBackend::HuggingFace,
            model_id: "bartowski/QwQ-32B-Preview-GGUF".to_string(),
            model_file: Some("QwQ-32B-Preview-Q8_0.gguf".to_string()),
            model_path: None,
            cache_dir: "models".to_string(),
            eos_token: Some("<|im_end|>".to_string()),
            context_size: 8192,
            gpu_layers: 999,
            temperature: 0.0,
            top_p: 0.95,
            seed: 1234,
            host: "127.0.0.1".to_string(),
            port: 7860,
            log_file: "logs/llama_responder.log".to_string(),
            log_level: "info".to_string(),
            ui: UiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the default config path, then apply environment overrides.
    ///
    /// Runs before the logger exists, so problems come back as warning lines
    /// for the caller to log once logging is up.
    pub fn load() -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        let mut config = load_config_file(Path::new(CONFIG_PATH), &mut warnings);
        warnings.extend(config.apply_env(|key| env::var(key).ok()));
        (config, warnings)
    }

    /// Apply overrides from a variable lookup, returning a warning per ignored
    /// value. Split out so tests can feed a map instead of touching the
    /// process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        if let Some(hub) = lookup("MODEL_HUB") {
            match hub.parse::<HubBackend>() {
                Ok(backend) => self.hub = backend,
                Err(e) => warnings.push(format!("[CONFIG] Ignoring MODEL_HUB: {e}")),
            }
        }
        if let Some(id) = lookup("MODEL_ID") {
            self.model_id = id;
        }
        if let Some(file) = lookup("MODEL_FILE") {
            self.model_file = non_empty(file);
        }
        if let Some(path) = lookup("MODEL_PATH") {
            self.model_path = non_empty(path);
        }
        if let Some(dir) = lookup("MODEL_CACHE_DIR") {
            self.cache_dir = dir;
        }
        if let Some(eos) = lookup("MODEL_EOS_TOKEN") {
            self.eos_token = non_empty(eos);
        }
        if let Some(host) = lookup("LLAMA_RESPONDER_HOST") {
            self.host = host;
        }
        if let Some(path) = lookup("LLAMA_RESPONDER_LOG") {
            self.log_file = path;
        }
        if let Some(level) = lookup("LLAMA_RESPONDER_LOG_LEVEL") {
            self.log_level = level;
        }

        let numeric = [
            override_parsed(&lookup, "LLAMA_CONTEXT_SIZE", &mut self.context_size),
            override_parsed(&lookup, "LLAMA_GPU_LAYERS", &mut self.gpu_layers),
            override_parsed(&lookup, "LLAMA_TEMPERATURE", &mut self.temperature),
            override_parsed(&lookup, "LLAMA_TOP_P", &mut self.top_p),
            override_parsed(&lookup, "LLAMA_SEED", &mut self.seed),
            override_parsed(&lookup, "LLAMA_RESPONDER_PORT", &mut self.port),
        ];
        warnings.extend(numeric.into_iter().flatten());
        warnings
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read a config file, falling back to defaults when it is missing or invalid.
/// A file that exists but doesn't parse adds a line to `warnings`.
pub fn load_config_file(path: &Path, warnings: &mut Vec<String>) -> AppConfig {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                warnings.push(format!(
                    "[CONFIG] Failed to parse {}: {e}, using defaults",
                    path.display()
                ));
                AppConfig::default()
            }
        },
        // Config file doesn't exist, use defaults
        Err(_) => AppConfig::default(),
    }
}

/// Parse `key` into `slot`; an unparsable value leaves `slot` alone and
/// comes back as a warning.
fn override_parsed<T, F>(lookup: &F, key: &str, slot: &mut T) -> Option<String>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => {
            *slot = value;
            None
        }
        Err(_) => Some(format!("[CONFIG] Ignoring {key}={raw:?}: not a valid number")),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
