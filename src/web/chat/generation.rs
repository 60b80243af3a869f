use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use llama_cpp_2::{
    context::params::LlamaContextParams,
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{AddBos, LlamaModel, Special},
    token::LlamaToken,
};

use super::responder::{GenerationParams, TextGenerator};
use super::sampler::{create_sampler, SamplingConfig};
use super::stop_conditions::check_stop_conditions;
use crate::error::{ResponderError, Result};
use crate::{sys_debug, sys_info, sys_warn};

/// Prompt tokens decoded per batch
const PROMPT_BATCH_CAP: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model emitted its end-of-sequence token.
    EndOfSequence,
    /// A configured stop string showed up in the output.
    StopString,
    /// `max_tokens` reached.
    MaxTokens,
    /// The context window is full.
    ContextFull,
}

/// Output from a generation run, including timing metrics.
#[derive(Debug)]
pub struct GenerationOutput {
    pub text: String,
    pub prompt_tokens: usize,
    pub generated_tokens: usize,
    pub stop_reason: StopReason,
    /// Prompt evaluation speed in tokens/second.
    pub prompt_tok_per_sec: Option<f64>,
    /// Generation speed in tokens/second.
    pub gen_tok_per_sec: Option<f64>,
}

/// Tokens per second, `None` when nothing was measured.
pub fn tokens_per_sec(tokens: usize, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if tokens == 0 || secs <= 0.0 {
        None
    } else {
        Some(tokens as f64 / secs)
    }
}

/// Context window for one request: room for the prompt plus `max_tokens`,
/// never more than the configured size.
pub fn context_window(prompt_tokens: usize, max_tokens: u32, context_size: u32) -> Result<u32> {
    let prompt = u32::try_from(prompt_tokens).unwrap_or(u32::MAX);
    if prompt >= context_size {
        return Err(ResponderError::Generation(format!(
            "prompt is {prompt_tokens} tokens but the context holds {context_size}"
        )));
    }
    Ok(prompt.saturating_add(max_tokens).min(context_size))
}

/// Text generation on a llama.cpp model loaded once at startup.
///
/// Every call builds a fresh context, so nothing leaks between requests.
pub struct LlamaGenerator {
    backend: LlamaBackend,
    model: LlamaModel,
    context_size: u32,
    sampling: SamplingConfig,
    stop_strings: Vec<String>,
}

impl LlamaGenerator {
    pub fn new(
        backend: LlamaBackend,
        model: LlamaModel,
        context_size: u32,
        sampling: SamplingConfig,
        stop_strings: Vec<String>,
    ) -> Self {
        Self {
            backend,
            model,
            context_size,
            sampling,
            stop_strings,
        }
    }

    /// Run one generation and report timing alongside the text.
    pub fn run(&self, prompt: &str, params: &GenerationParams) -> Result<GenerationOutput> {
        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Never)
            .map_err(|e| ResponderError::Generation(format!("Tokenization failed: {e}")))?;
        if tokens.is_empty() {
            return Err(ResponderError::Generation(
                "prompt tokenized to nothing".to_string(),
            ));
        }

        let n_ctx = context_window(tokens.len(), params.max_tokens, self.context_size)?;
        sys_debug!(
            "[GENERATION] Prompt tokens: {}, context window: {}, max tokens: {}",
            tokens.len(),
            n_ctx,
            params.max_tokens
        );

        let ctx_params = LlamaContextParams::default().with_n_ctx(NonZeroU32::new(n_ctx));
        let mut context = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| ResponderError::Generation(format!("Context creation failed: {e}")))?;

        // Decode the prompt in chunks; only the last prompt token needs logits
        let prompt_eval_start = Instant::now();
        let mut batch = LlamaBatch::new(PROMPT_BATCH_CAP, 1);
        let last_index = tokens.len() - 1;
        for (chunk_idx, chunk) in tokens.chunks(PROMPT_BATCH_CAP).enumerate() {
            batch.clear();
            for (offset, &token) in chunk.iter().enumerate() {
                let pos = chunk_idx * PROMPT_BATCH_CAP + offset;
                batch
                    .add(token, pos as i32, &[0], pos == last_index)
                    .map_err(|e| {
                        ResponderError::Generation(format!(
                            "Batch add failed at prompt token {pos}: {e}"
                        ))
                    })?;
            }
            context.decode(&mut batch).map_err(|e| {
                ResponderError::Generation(format!("Prompt decode failed (chunk {}): {e}", chunk_idx + 1))
            })?;
        }
        let prompt_elapsed = prompt_eval_start.elapsed();

        let mut sampler = create_sampler(&self.sampling);
        let gen_start = Instant::now();
        let mut bytes: Vec<u8> = Vec::new();
        let mut scanned = 0usize;
        let mut generated = 0usize;
        let mut token_pos = tokens.len() as i32;
        let mut truncate_at: Option<usize> = None;
        let mut stop_reason = StopReason::MaxTokens;

        while generated < params.max_tokens as usize {
            if token_pos as u32 >= n_ctx {
                stop_reason = StopReason::ContextFull;
                break;
            }

            let next_token = sampler.sample(&context, -1);

            // Check for end-of-sequence token
            if next_token == self.model.token_eos() {
                stop_reason = StopReason::EndOfSequence;
                break;
            }
            generated += 1;

            match self.token_bytes(next_token) {
                Ok(piece) => bytes.extend_from_slice(&piece),
                Err(e) => sys_warn!(
                    "[GENERATION] Token {:?} can't be converted: {}. Continuing generation.",
                    next_token,
                    e
                ),
            }

            let text = String::from_utf8_lossy(&bytes);
            let stop = check_stop_conditions(&text, scanned, &self.stop_strings);
            if stop.should_stop {
                sys_debug!(
                    "[GENERATION] Stop string {:?} after {} tokens",
                    stop.matched_token,
                    generated
                );
                truncate_at = stop.truncate_at;
                stop_reason = StopReason::StopString;
                break;
            }
            scanned = text.len();

            if params.verbose && generated % 50 == 0 {
                sys_debug!("[GENERATION] Generated {} tokens so far...", generated);
            }

            batch.clear();
            batch
                .add(next_token, token_pos, &[0], true)
                .map_err(|e| {
                    ResponderError::Generation(format!("Batch add failed at token {generated}: {e}"))
                })?;
            context.decode(&mut batch).map_err(|e| {
                ResponderError::Generation(format!("Decode failed at token {generated}: {e}"))
            })?;
            token_pos += 1;
        }

        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if let Some(index) = truncate_at {
            text.truncate(index);
        }

        Ok(GenerationOutput {
            text,
            prompt_tokens: tokens.len(),
            generated_tokens: generated,
            stop_reason,
            prompt_tok_per_sec: tokens_per_sec(tokens.len(), prompt_elapsed),
            gen_tok_per_sec: tokens_per_sec(generated, gen_start.elapsed()),
        })
    }

    #[allow(deprecated)]
    fn token_bytes(&self, token: LlamaToken) -> std::result::Result<Vec<u8>, String> {
        self.model
            .token_to_bytes(token, Special::Tokenize)
            .map_err(|e| e.to_string())
    }
}

impl TextGenerator for LlamaGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        if params.verbose {
            sys_info!("[GENERATION] ==========");
            sys_info!("[GENERATION] Prompt:\n{}", prompt);
        }

        let output = self.run(prompt, params)?;

        if params.verbose {
            sys_info!("[GENERATION] Response:\n{}", output.text);
            sys_info!("[GENERATION] ==========");
            sys_info!(
                "[GENERATION] Prompt: {} tokens, {:.3} tokens-per-sec",
                output.prompt_tokens,
                output.prompt_tok_per_sec.unwrap_or(0.0)
            );
            sys_info!(
                "[GENERATION] Generation: {} tokens, {:.3} tokens-per-sec ({:?})",
                output.generated_tokens,
                output.gen_tok_per_sec.unwrap_or(0.0),
                output.stop_reason
            );
        }

        Ok(output.text)
    }
}
