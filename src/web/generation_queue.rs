//! Generation request queue.
//!
//! Route handlers submit prompts to a bounded MPSC channel.
//! A single worker task processes them sequentially via `spawn_blocking`,
//! so only one generation runs at a time and the async runtime never blocks
//! on the model.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::chat::Responder;
use crate::error::{ResponderError, Result};
use crate::{sys_debug, sys_error};

/// Everything needed to run one generation call.
struct GenerationRequest {
    prompt: String,
    /// One-shot channel to deliver the final result back to the caller.
    result_sender: oneshot::Sender<Result<String>>,
}

/// Cloneable handle that route handlers use to submit generation work.
#[derive(Clone)]
pub struct GenerationQueue {
    tx: mpsc::Sender<GenerationRequest>,
}

impl GenerationQueue {
    /// Create the queue and spawn the background worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(responder: Arc<Responder>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<GenerationRequest>(capacity.max(1));

        tokio::spawn(generation_worker(rx, responder));

        Self { tx }
    }

    /// Submit a prompt and wait for its response. Waits if the queue is full.
    pub async fn respond(&self, prompt: String) -> Result<String> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.tx
            .send(GenerationRequest {
                prompt,
                result_sender,
            })
            .await
            .map_err(|_| ResponderError::QueueClosed)?;

        result_receiver
            .await
            .map_err(|_| ResponderError::QueueClosed)?
    }
}

/// Long-lived task that pulls requests off the channel one at a time.
async fn generation_worker(mut rx: mpsc::Receiver<GenerationRequest>, responder: Arc<Responder>) {
    while let Some(req) = rx.recv().await {
        let responder = responder.clone();
        let prompt = req.prompt;
        sys_debug!("[QUEUE] Starting generation ({} prompt bytes)", prompt.len());

        // Heavy work goes on the blocking thread pool.
        let join_result = tokio::task::spawn_blocking(move || responder.respond(&prompt)).await;

        let final_result = match join_result {
            Ok(inner) => inner,
            Err(e) => {
                sys_error!("[QUEUE] Generation task panicked: {}", e);
                Err(ResponderError::Generation(format!(
                    "Generation task panicked: {e}"
                )))
            }
        };

        // Caller may have dropped the receiver (disconnected), ignore error.
        let _ = req.result_sender.send(final_result);
    }
    sys_debug!("[QUEUE] Generation worker stopped");
}
