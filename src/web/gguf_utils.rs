// GGUF metadata utilities
//
// Reads the header key/value section of a model file with the gguf_llms crate,
// before the model itself is handed to llama.cpp.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use gguf_llms::{GgufHeader, GgufReader, Value};
use serde::Serialize;

use crate::error::{ResponderError, Result};

/// Model facts the responder needs from the GGUF header.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GgufModelInfo {
    pub architecture: String,
    pub name: Option<String>,
    /// Training context length, if the file declares one.
    pub context_length: Option<u32>,
    /// Jinja2 source from `tokenizer.chat_template`.
    pub chat_template: Option<String>,
    pub bos_token_id: Option<u32>,
    pub eos_token_id: Option<u32>,
}

/// Convert a GGUF Value to an Option<String>
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Uint8(n) => Some(n.to_string()),
        Value::Uint16(n) => Some(n.to_string()),
        Value::Uint32(n) => Some(n.to_string()),
        Value::Uint64(n) => Some(n.to_string()),
        Value::Int8(n) => Some(n.to_string()),
        Value::Int16(n) => Some(n.to_string()),
        Value::Int32(n) => Some(n.to_string()),
        Value::Int64(n) => Some(n.to_string()),
        Value::Float32(f) => Some(f.to_string()),
        Value::Float64(f) => Some(f.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_, _) => None,
    }
}

/// Integer metadata as `u32`; negative or oversized values are dropped.
pub fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Uint8(n) => Some(u32::from(*n)),
        Value::Uint16(n) => Some(u32::from(*n)),
        Value::Uint32(n) => Some(*n),
        Value::Uint64(n) => u32::try_from(*n).ok(),
        Value::Int8(n) => u32::try_from(*n).ok(),
        Value::Int16(n) => u32::try_from(*n).ok(),
        Value::Int32(n) => u32::try_from(*n).ok(),
        Value::Int64(n) => u32::try_from(*n).ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read GGUF metadata from a file.
/// Returns the raw metadata HashMap for full access.
pub fn read_gguf_metadata_raw(file_path: &Path) -> Result<HashMap<String, Value>> {
    let file = File::open(file_path).map_err(|e| {
        ResponderError::Metadata(format!("Failed to open {}: {e}", file_path.display()))
    })?;

    let mut reader = BufReader::new(file);

    let header = GgufHeader::parse(&mut reader)
        .map_err(|e| ResponderError::Metadata(format!("Failed to parse GGUF header: {e}")))?;

    GgufReader::read_metadata(&mut reader, header.n_kv)
        .map_err(|e| ResponderError::Metadata(format!("Failed to read GGUF metadata: {e}")))
}

pub fn read_model_info(file_path: &Path) -> Result<GgufModelInfo> {
    let metadata = read_gguf_metadata_raw(file_path)?;
    Ok(model_info_from_metadata(&metadata))
}

pub fn model_info_from_metadata(metadata: &HashMap<String, Value>) -> GgufModelInfo {
    let get_string = |key: &str| -> Option<String> { metadata.get(key).and_then(value_to_string) };
    let get_u32 = |key: &str| -> Option<u32> { metadata.get(key).and_then(value_to_u32) };

    let architecture = get_string("general.architecture")
        .or_else(|| get_string("general.arch"))
        .unwrap_or_else(|| "Unknown".to_string());

    // Architecture-specific key first
    let context_length = get_u32(&format!("{architecture}.context_length"))
        .or_else(|| get_u32("llama.context_length"))
        .or_else(|| get_u32("context_length"));

    let chat_template = get_string("tokenizer.chat_template").filter(|t| !t.trim().is_empty());

    GgufModelInfo {
        name: get_string("general.name"),
        context_length,
        chat_template,
        bos_token_id: get_u32("tokenizer.ggml.bos_token_id"),
        eos_token_id: get_u32("tokenizer.ggml.eos_token_id"),
        architecture,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_model_info_reads_architecture_specific_context() {
        let info = model_info_from_metadata(&metadata(vec![
            ("general.architecture", Value::String("qwen2".to_string())),
            ("general.name", Value::String("QwQ 32B Preview".to_string())),
            ("qwen2.context_length", Value::Uint32(32768)),
            ("llama.context_length", Value::Uint32(4096)),
            (
                "tokenizer.chat_template",
                Value::String("{{ messages }}".to_string()),
            ),
            ("tokenizer.ggml.bos_token_id", Value::Uint32(151643)),
            ("tokenizer.ggml.eos_token_id", Value::Int32(151645)),
        ]));

        assert_eq!(info.architecture, "qwen2");
        assert_eq!(info.name.as_deref(), Some("QwQ 32B Preview"));
        assert_eq!(info.context_length, Some(32768));
        assert_eq!(info.chat_template.as_deref(), Some("{{ messages }}"));
        assert_eq!(info.bos_token_id, Some(151643));
        assert_eq!(info.eos_token_id, Some(151645));
    }

    #[test]
    fn test_model_info_defaults_when_keys_missing() {
        let info = model_info_from_metadata(&HashMap::new());
        assert_eq!(info.architecture, "Unknown");
        assert_eq!(info.context_length, None);
        assert_eq!(info.chat_template, None);
    }

    #[test]
    fn test_blank_chat_template_is_ignored() {
        let info = model_info_from_metadata(&metadata(vec![(
            "tokenizer.chat_template",
            Value::String("   ".to_string()),
        )]));
        assert_eq!(info.chat_template, None);
    }

    #[test]
    fn test_value_to_u32_rejects_negative() {
        assert_eq!(value_to_u32(&Value::Int64(-1)), None);
        assert_eq!(value_to_u32(&Value::Uint64(u64::MAX)), None);
        assert_eq!(value_to_u32(&Value::String(" 42 ".to_string())), Some(42));
        assert_eq!(value_to_u32(&Value::Bool(true)), None);
    }

    #[test]
    fn test_read_model_info_missing_file() {
        let err = read_model_info(Path::new("/nonexistent/model.gguf")).unwrap_err();
        assert!(matches!(err, ResponderError::Metadata(_)));
    }
}
