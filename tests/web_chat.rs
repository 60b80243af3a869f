// End-to-end tests through the HTTP dispatcher, with a fake generator in place of the model

use std::sync::{Arc, Mutex};

use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::Value;

use llama_cpp_responder::web::{
    handle_request, AppConfig, AppContext, GenerationQueue, ModelInfo, TemplateSource, UiConfig,
};
use llama_cpp_responder::{
    GenerationParams, JinjaChatTemplate, Responder, ResponderError, Result, TextGenerator,
};

/// Records every prompt and answers from a fixed reply.
struct ScriptedGenerator {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<(String, GenerationParams)>>,
}

impl ScriptedGenerator {
    fn ok(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), *params));
        self.reply
            .clone()
            .map_err(ResponderError::Generation)
    }
}

fn context_with(generator: Arc<ScriptedGenerator>) -> Arc<AppContext> {
    let config = AppConfig::default();
    let responder = Responder::new(Arc::new(JinjaChatTemplate::chatml()), generator);
    Arc::new(AppContext {
        queue: GenerationQueue::spawn(Arc::new(responder), 4),
        ui: UiConfig {
            title: "Test <Chatbot>".to_string(),
            ..UiConfig::default()
        },
        model: ModelInfo {
            model_path: "models/test.gguf".to_string(),
            model_id: config.model_id,
            hub: config.hub,
            architecture: "qwen2".to_string(),
            name: None,
            context_size: 8192,
            gpu_layers: 0,
            template_source: TemplateSource::Chatml,
            eos_token: Some("<|im_end|>".to_string()),
            max_tokens: 512,
        },
    })
}

async fn send(context: &Arc<AppContext>, method: Method, uri: &str, body: &str) -> Response<Body> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    handle_request(req, context.clone()).await.unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn test_chat_returns_generator_output() {
    let generator = ScriptedGenerator::ok("4");
    let context = context_with(generator.clone());

    let response = send(&context, Method::POST, "/api/chat", r#"{"prompt":"2+2="}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["response"], "4");

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let (prompt, params) = &prompts[0];
    assert_eq!(
        prompt,
        "<|im_start|>system\nYou are a helpful assistant.<|im_end|>\n\
         <|im_start|>user\n2+2=<|im_end|>\n\
         <|im_start|>assistant\n"
    );
    assert_eq!(params.max_tokens, 512);
    assert!(params.verbose);
}

#[tokio::test]
async fn test_chat_passes_output_through_unchanged() {
    let reply = "  <b>bold</b> \"quoted\"\n\ttrailing  ";
    let context = context_with(ScriptedGenerator::ok(reply));

    let response = send(&context, Method::POST, "/api/chat", r#"{"prompt":""}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["response"], reply);
}

#[tokio::test]
async fn test_chat_rejects_invalid_json() {
    let generator = ScriptedGenerator::ok("unused");
    let context = context_with(generator.clone());

    let response = send(&context, Method::POST, "/api/chat", "not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
    assert!(generator.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_generation_failure_is_a_500() {
    let context = context_with(ScriptedGenerator::failing("KV cache full"));

    let response = send(&context, Method::POST, "/api/chat", r#"{"prompt":"hi"}"#).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = body_json(response).await["error"].as_str().unwrap().to_string();
    assert!(error.contains("KV cache full"));
}

#[tokio::test]
async fn test_index_page_renders_escaped_ui_text() {
    let context = context_with(ScriptedGenerator::ok(""));

    let response = send(&context, Method::GET, "/", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Test &lt;Chatbot&gt;"));
    assert!(html.contains(r#"rows="4""#));
    assert!(html.contains(&UiConfig::default().output_label));
    assert!(html.contains("/api/chat"));
}

#[tokio::test]
async fn test_health_and_status() {
    let context = context_with(ScriptedGenerator::ok(""));

    let health = body_json(send(&context, Method::GET, "/health", "").await).await;
    assert_eq!(health["status"], "ok");

    let status = body_json(send(&context, Method::GET, "/api/status", "").await).await;
    assert_eq!(status["template_source"], "chatml");
    assert_eq!(status["hub"], "huggingface");
    assert_eq!(status["max_tokens"], 512);
}

#[tokio::test]
async fn test_unknown_route_and_preflight() {
    let context = context_with(ScriptedGenerator::ok(""));

    let response = send(&context, Method::GET, "/api/nope", "").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&context, Method::OPTIONS, "/api/chat", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}
