// Web server: load the model once, then serve the single-page responder UI
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;

use llama_cpp_responder::web::logger::{init_logging, parse_level};
use llama_cpp_responder::web::{handle_request, AppConfig, AppContext, GenerationQueue};
use llama_cpp_responder::{sys_error, sys_info, sys_warn, Responder};

/// Requests waiting for the generation worker before callers start to block.
const QUEUE_CAPACITY: usize = 16;

#[cfg(not(feature = "mock"))]
async fn build_responder(
    config: &AppConfig,
) -> anyhow::Result<(Responder, llama_cpp_responder::web::ModelInfo)> {
    use llama_cpp_responder::web::model_manager::load_model;

    // Download and load are blocking; keep them off the async workers
    let config = config.clone();
    let loaded = tokio::task::spawn_blocking(move || load_model(&config))
        .await
        .context("model loading task failed")??;
    Ok((loaded.responder, loaded.info))
}

#[cfg(feature = "mock")]
async fn build_responder(
    config: &AppConfig,
) -> anyhow::Result<(Responder, llama_cpp_responder::web::ModelInfo)> {
    sys_info!("[STARTUP] Mock mode: no model will be downloaded or loaded");
    Ok(llama_cpp_responder::chat_mock::mock_responder(config))
}

fn resolve_address(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    let bind = config.bind_address();
    bind.to_socket_addrs()
        .with_context(|| format!("invalid bind address {bind}"))?
        .next()
        .ok_or_else(|| anyhow!("bind address {bind} resolved to nothing"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        sys_error!("[SERVER] Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    sys_info!("[SERVER] Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, config_warnings) = AppConfig::load();
    init_logging(&config.log_file, parse_level(&config.log_level))?;
    for warning in &config_warnings {
        sys_warn!("{}", warning);
    }

    sys_info!(
        "[STARTUP] Model {} from {} (file: {})",
        config.model_id,
        config.hub,
        config.model_file.as_deref().unwrap_or("first .gguf in repo")
    );

    let (responder, model) = build_responder(&config).await?;
    sys_info!(
        "[STARTUP] Ready: {} ({:?} template, context {})",
        model.model_path,
        model.template_source,
        model.context_size
    );

    let queue = GenerationQueue::spawn(Arc::new(responder), QUEUE_CAPACITY);
    let context = Arc::new(AppContext {
        queue,
        ui: config.ui.clone(),
        model,
    });

    // Create HTTP service
    let make_svc = make_service_fn(move |_conn| {
        let context = context.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle_request(req, context.clone())))
        }
    });

    // Start server
    let addr = resolve_address(&config)?;
    let server = Server::try_bind(&addr)
        .with_context(|| format!("failed to bind {addr}"))?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown_signal());

    sys_info!("🦙 llama.cpp responder starting on http://{}", addr);
    sys_info!("Available endpoints:");
    sys_info!("  GET  /            - Web interface");
    sys_info!("  POST /api/chat    - {{\"prompt\": ...}} -> {{\"response\": ...}}");
    sys_info!("  GET  /api/status  - Loaded model information");
    sys_info!("  GET  /health      - Health check");

    server.await.context("server error")?;

    Ok(())
}
