// Model loading: resolve the GGUF file, read its metadata, load it into llama.cpp
// and build the responder around it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use llama_cpp_2::{
    llama_backend::LlamaBackend,
    model::{params::LlamaModelParams, LlamaModel, Special},
    token::LlamaToken,
};

use super::chat::{
    ChatTemplate, JinjaChatTemplate, LlamaGenerator, Responder, SamplingConfig, MAX_TOKENS,
};
use super::config::AppConfig;
use super::gguf_utils::{read_model_info, GgufModelInfo};
use super::hub::snapshot_download;
use super::models::{ModelInfo, TemplateSource};
use crate::error::{ResponderError, Result};
use crate::{sys_debug, sys_info, sys_warn};

/// A ready-to-serve responder plus what was loaded.
pub struct LoadedModel {
    pub responder: Responder,
    pub info: ModelInfo,
}

/// Local file to load: the configured path, or a hub download into the cache.
pub fn resolve_model_path(config: &AppConfig) -> Result<PathBuf> {
    if let Some(path) = &config.model_path {
        let path = PathBuf::from(path);
        if !path.is_file() {
            return Err(ResponderError::ModelLoad(format!(
                "model file not found: {}",
                path.display()
            )));
        }
        sys_info!("[MODEL] Using local model file {}", path.display());
        return Ok(path);
    }

    snapshot_download(
        config.hub,
        &config.model_id,
        config.model_file.as_deref(),
        Path::new(&config.cache_dir),
    )
}

/// Context size to run with: the configured size, capped to what the model was trained on.
pub fn effective_context_size(configured: u32, trained: Option<u32>) -> u32 {
    match trained {
        Some(trained) if trained > 0 && trained < configured => {
            sys_warn!(
                "[MODEL] Capping context size from {} to {} (model context_length)",
                configured,
                trained
            );
            trained
        }
        _ => configured,
    }
}

/// Stop strings: the EOS override, then the model's own EOS text, deduplicated.
pub fn stop_strings(eos_override: Option<&str>, model_eos: Option<&str>) -> Vec<String> {
    let mut stops: Vec<String> = Vec::new();
    for candidate in [eos_override, model_eos].into_iter().flatten() {
        if !candidate.is_empty() && !stops.iter().any(|s| s == candidate) {
            stops.push(candidate.to_string());
        }
    }
    stops
}

/// Compare a special-token id from GGUF metadata with the one llama.cpp
/// reports. Returns false, after a warning, when both are known and differ.
pub fn token_ids_agree(label: &str, gguf_id: Option<u32>, model_id: i32) -> bool {
    let Some(gguf_id) = gguf_id else {
        return true;
    };
    if i64::from(gguf_id) == i64::from(model_id) {
        sys_debug!(
            "[MODEL] {} token validation passed: GGUF and model agree on token {}",
            label,
            gguf_id
        );
        true
    } else {
        sys_warn!(
            "[MODEL] GGUF {} token ({}) doesn't match the model's ({})",
            label,
            gguf_id,
            model_id
        );
        false
    }
}

/// Chat template for the model: its native GGUF template, or ChatML when the
/// file has none or the native one doesn't compile.
pub fn build_chat_template(
    gguf: &GgufModelInfo,
    bos_token: &str,
    eos_token: &str,
) -> (JinjaChatTemplate, TemplateSource) {
    if let Some(source) = &gguf.chat_template {
        match JinjaChatTemplate::new(source, bos_token, eos_token) {
            Ok(template) => return (template, TemplateSource::Gguf),
            Err(e) => sys_warn!(
                "[MODEL] Native chat template rejected ({}), falling back to ChatML",
                e
            ),
        }
    } else {
        sys_info!("[MODEL] No chat template in GGUF metadata, using ChatML");
    }

    let template = if eos_token.is_empty() {
        JinjaChatTemplate::chatml()
    } else {
        JinjaChatTemplate::chatml_with_tokens(bos_token, eos_token)
    };
    (template, TemplateSource::Chatml)
}

/// Download (if needed) and load the configured model. Blocking.
pub fn load_model(config: &AppConfig) -> Result<LoadedModel> {
    let model_path = resolve_model_path(config)?;
    let gguf = read_model_info(&model_path)?;
    sys_info!(
        "[MODEL] GGUF metadata: architecture={}, name={:?}, context_length={:?}, chat_template={}",
        gguf.architecture,
        gguf.name,
        gguf.context_length,
        if gguf.chat_template.is_some() { "yes" } else { "no" }
    );

    let context_size = effective_context_size(config.context_size, gguf.context_length);

    let backend = LlamaBackend::init()
        .map_err(|e| ResponderError::ModelLoad(format!("Failed to init backend: {e}")))?;

    let model_params = LlamaModelParams::default().with_n_gpu_layers(config.gpu_layers);

    sys_info!("[MODEL] Loading model from: {}", model_path.display());
    sys_info!(
        "[MODEL] GPU layers configured: {} layers will be offloaded to GPU",
        config.gpu_layers
    );

    let model = LlamaModel::load_from_file(&backend, &model_path, &model_params)
        .map_err(|e| ResponderError::ModelLoad(format!("{}: {e}", model_path.display())))?;

    sys_info!("[MODEL] Model loaded successfully!");

    token_ids_agree("BOS", gguf.bos_token_id, model.token_bos().0);
    token_ids_agree("EOS", gguf.eos_token_id, model.token_eos().0);

    let bos_token = token_text(&model, model.token_bos());
    let model_eos = token_text(&model, model.token_eos());
    let eos_token = config
        .eos_token
        .clone()
        .or_else(|| model_eos.clone())
        .unwrap_or_default();

    let (template, template_source) =
        build_chat_template(&gguf, bos_token.as_deref().unwrap_or_default(), &eos_token);
    sys_info!("[MODEL] Chat template: {:?}", template_source);

    let stops = stop_strings(config.eos_token.as_deref(), model_eos.as_deref());

    let sampling = SamplingConfig {
        temperature: config.temperature,
        top_p: config.top_p,
        seed: config.seed,
    };
    let generator = LlamaGenerator::new(backend, model, context_size, sampling, stops);

    let template: Arc<dyn ChatTemplate> = Arc::new(template);
    let responder = Responder::new(template, Arc::new(generator));

    let info = ModelInfo {
        model_path: model_path.display().to_string(),
        model_id: config.model_id.clone(),
        hub: config.hub,
        architecture: gguf.architecture,
        name: gguf.name,
        context_size,
        gpu_layers: config.gpu_layers,
        template_source,
        eos_token: if eos_token.is_empty() {
            None
        } else {
            Some(eos_token)
        },
        max_tokens: MAX_TOKENS,
    };

    Ok(LoadedModel { responder, info })
}

#[allow(deprecated)]
fn token_text(model: &LlamaModel, token: LlamaToken) -> Option<String> {
    model
        .token_to_bytes(token, Special::Tokenize)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::chat::{ChatMessage, RenderOptions};

    fn render(template: &JinjaChatTemplate) -> String {
        template
            .apply(
                &[ChatMessage::system("sys"), ChatMessage::user("hi")],
                RenderOptions::for_generation(),
            )
            .unwrap()
    }

    #[test]
    fn test_effective_context_size() {
        assert_eq!(effective_context_size(8192, Some(32768)), 8192);
        assert_eq!(effective_context_size(8192, Some(4096)), 4096);
        assert_eq!(effective_context_size(8192, None), 8192);
        assert_eq!(effective_context_size(8192, Some(0)), 8192);
    }

    #[test]
    fn test_stop_strings_dedup_and_order() {
        assert_eq!(
            stop_strings(Some("<|im_end|>"), Some("<|endoftext|>")),
            vec!["<|im_end|>", "<|endoftext|>"]
        );
        assert_eq!(
            stop_strings(Some("<|im_end|>"), Some("<|im_end|>")),
            vec!["<|im_end|>"]
        );
        assert_eq!(stop_strings(None, Some("")), Vec::<String>::new());
    }

    #[test]
    fn test_token_ids_agree() {
        // Qwen2.5: <|im_end|> is 151645 in both places
        assert!(token_ids_agree("EOS", Some(151645), 151645));
        assert!(!token_ids_agree("EOS", Some(151643), 151645));
        assert!(token_ids_agree("BOS", None, 151643));
        assert!(!token_ids_agree("BOS", Some(1), -1));
    }

    #[test]
    fn test_native_template_is_preferred() {
        let gguf = GgufModelInfo {
            chat_template: Some(
                "{% for m in messages %}<{{ m.role }}>{{ m.content }}{% endfor %}{{ eos_token }}"
                    .to_string(),
            ),
            ..Default::default()
        };
        let (template, source) = build_chat_template(&gguf, "", "<|im_end|>");
        assert_eq!(source, TemplateSource::Gguf);
        assert_eq!(render(&template), "<system>sys<user>hi<|im_end|>");
    }

    #[test]
    fn test_missing_or_broken_template_falls_back_to_chatml() {
        let (template, source) = build_chat_template(&GgufModelInfo::default(), "", "");
        assert_eq!(source, TemplateSource::Chatml);
        assert_eq!(template.eos_token(), "<|im_end|>");
        assert!(render(&template).ends_with("<|im_start|>assistant\n"));

        let broken = GgufModelInfo {
            chat_template: Some("{% if %}".to_string()),
            ..Default::default()
        };
        let (_, source) = build_chat_template(&broken, "", "<|im_end|>");
        assert_eq!(source, TemplateSource::Chatml);
    }

    #[test]
    fn test_missing_local_model_path_is_an_error() {
        let config = AppConfig {
            model_path: Some("/nonexistent/model.gguf".to_string()),
            ..AppConfig::default()
        };
        let err = resolve_model_path(&config).unwrap_err();
        assert!(matches!(err, ResponderError::ModelLoad(_)));
    }

    #[test]
    fn test_local_model_path_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.gguf");
        std::fs::write(&path, b"GGUF").unwrap();

        let config = AppConfig {
            model_path: Some(path.display().to_string()),
            ..AppConfig::default()
        };
        assert_eq!(resolve_model_path(&config).unwrap(), path);
    }
}
