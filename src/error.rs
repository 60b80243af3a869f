// Error type shared by the responder, model loading and the hub downloader

use thiserror::Error;

/// Failures surfaced at the boundary of an external collaborator.
///
/// Each variant carries the collaborator's own message so the web layer can
/// show it without knowing which library produced it.
#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("failed to add chat template: {0}")]
    TemplateAdd(String),
    #[error("failed to render chat template: {0}")]
    TemplateRender(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("failed to read GGUF metadata: {0}")]
    Metadata(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("generation queue closed")]
    QueueClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ResponderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_source_text() {
        let err = ResponderError::TemplateRender("undefined value".to_string());
        assert_eq!(err.to_string(), "failed to render chat template: undefined value");

        let err = ResponderError::QueueClosed;
        assert_eq!(err.to_string(), "generation queue closed");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.gguf");
        let err: ResponderError = io.into();
        assert!(matches!(err, ResponderError::Io(_)));
        assert!(err.to_string().contains("missing.gguf"));
    }
}
