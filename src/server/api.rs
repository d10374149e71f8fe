use crate::config::prompt::{ build_chat_prompt, reload_prompts_if_changed, PromptConfig };
use crate::llm::chat::{ ChatClient, CompletionResponse };
use crate::models::chat::{ ChatReply, ChatRequest, ErrorBody };
use crate::models::prediction::PredictionForm;
use crate::prediction::PredictionClient;
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ State, rejection::JsonRejection },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use governor::{ DefaultDirectRateLimiter, Quota, RateLimiter };
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use uuid::Uuid;
use log::{ info, warn, error };

pub const FALLBACK_RESPONSE: &str = "Sorry, I couldn't generate a response.";

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
    details: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct AppState {
    chat_client: Arc<dyn ChatClient>,
    prompts: Arc<RwLock<Arc<PromptConfig>>>,
    prompts_path: Option<String>,
    prediction: Arc<PredictionClient>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl AppState {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        prompt_config: Arc<PromptConfig>,
        prompts_path: Option<String>,
        prediction: PredictionClient,
        rate_limit_per_second: u32
    ) -> Self {
        let limiter = NonZeroU32::new(rate_limit_per_second).map(|rate|
            Arc::new(RateLimiter::direct(Quota::per_second(rate)))
        );
        Self {
            chat_client,
            prompts: Arc::new(RwLock::new(prompt_config)),
            prompts_path,
            prediction: Arc::new(prediction),
            limiter,
        }
    }

    fn rate_limited(&self) -> bool {
        self.limiter.as_ref().is_some_and(|limiter| limiter.check().is_err())
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/rag", post(chat_handler))
        .route("/api/predict", post(predict_handler))
        .route("/api/reload-prompts", get(reload_prompts_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    addr: SocketAddr,
    state: AppState,
    tls: Option<(String, String)>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let app = router(state);

    if let Some((cert_path, key_path)) = tls {
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            &cert_path,
            &key_path
        ).await?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
        });

        info!("HTTPS server listening on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            e
        })?;
        info!("HTTP server listening on: http://{}", addr);
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal()).await?;
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Response {
    let request_id = Uuid::new_v4();

    if state.rate_limited() {
        warn!("[{}] Chat request rejected by rate limit", request_id);
        return error_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests");
    }

    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            error!("[{}] Error in chat API: {}", request_id, rejection.body_text());
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, rejection.body_text());
        }
    };

    if req.message.trim().is_empty() {
        warn!("[{}] Chat request with an empty message", request_id);
    }
    info!("[{}] Chat request with {} history turns", request_id, req.history.len());

    let prompts = state.prompts.read().await.clone();
    let model = state.chat_client.get_model();
    let prompt = build_chat_prompt(&prompts, &model, &req.history, &req.message);

    match state.chat_client.complete(&prompt).await {
        Ok(CompletionResponse { response: Some(response) }) => {
            info!("[{}] Chat response generated ({} chars)", request_id, response.len());
            Json(ChatReply { response }).into_response()
        }
        Ok(CompletionResponse { response: None }) => {
            warn!("[{}] Provider returned no content, using fallback", request_id);
            Json(ChatReply { response: FALLBACK_RESPONSE.to_string() }).into_response()
        }
        Err(e) => {
            error!("[{}] Error in chat API: {}", request_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn predict_handler(
    State(state): State<AppState>,
    payload: Result<Json<PredictionForm>, JsonRejection>
) -> Response {
    if state.rate_limited() {
        warn!("Prediction request rejected by rate limit");
        return error_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests");
    }

    let Json(form) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let missing = form.missing_fields();
    if !missing.is_empty() {
        warn!("Prediction request missing fields: {:?}", missing);
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {}", missing.join(", "))
        );
    }

    match state.prediction.predict(&form).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            error!("Prediction failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, "Failed to get prediction")
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(
        json!({
            "status": "healthy",
            "model": state.chat_client.get_model(),
            "prediction_service": state.prediction.base_url(),
        })
    )
}

async fn reload_prompts_handler(State(state): State<AppState>) -> impl IntoResponse {
    let Some(path) = state.prompts_path.as_deref() else {
        return (StatusCode::OK, Json(ReloadResponse {
            success: true,
            message: "No prompts file configured".into(),
            details: Some(vec!["Built-in prompts in use".into()]),
        }));
    };

    let current = state.prompts.read().await.clone();
    match reload_prompts_if_changed(path, &current) {
        Ok(Some(new_config)) => {
            *state.prompts.write().await = new_config;
            (StatusCode::OK, Json(ReloadResponse {
                success: true,
                message: "Reload complete".into(),
                details: Some(vec![format!("Reloaded {}", path)]),
            }))
        }
        Ok(None) => (StatusCode::OK, Json(ReloadResponse {
            success: true,
            message: "Reload complete".into(),
            details: Some(vec![format!("Unchanged {}", path)]),
        })),
        Err(e) => {
            error!("Failed to reload prompts from '{}': {}", path, e);
            (StatusCode::BAD_REQUEST, Json(ReloadResponse {
                success: false,
                message: "Reload errors".into(),
                details: Some(vec![e.to_string()]),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompt::DEFAULT_PREAMBLE;
    use crate::llm::LlmError;
    use crate::models::chat::ChatMessage;
    use async_trait::async_trait;
    use axum::body::{ to_bytes, Body };
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Mutex;
    use tower::ServiceExt;

    enum Reply {
        Text(&'static str),
        Empty,
        Fail(&'static str),
    }

    struct MockChatClient {
        reply: Reply,
        prompts: Mutex<Vec<String>>,
    }

    impl MockChatClient {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self { reply, prompts: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl ChatClient for MockChatClient {
        async fn complete(&self, prompt: &str) -> Result<CompletionResponse, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.reply {
                Reply::Text(text) => Ok(CompletionResponse { response: Some(text.to_string()) }),
                Reply::Empty => Ok(CompletionResponse { response: None }),
                Reply::Fail(message) =>
                    Err(LlmError::Api { status: 503, message: message.to_string() }),
            }
        }

        fn get_model(&self) -> String {
            "test-model".into()
        }

        fn get_base_url(&self) -> String {
            "http://provider.test/v1".into()
        }
    }

    fn state_with(client: Arc<MockChatClient>, rate: u32) -> AppState {
        AppState::new(
            client,
            Arc::new(PromptConfig::default()),
            None,
            PredictionClient::new("http://127.0.0.1:5000").unwrap(),
            rate
        )
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn chat_body(message: &str, history: &[ChatMessage]) -> String {
        serde_json::to_string(&ChatRequest {
            message: message.to_string(),
            history: history.to_vec(),
        }).unwrap()
    }

    #[tokio::test]
    async fn chat_returns_completion_text() {
        let client = MockChatClient::new(Reply::Text("DRI stands for Disease Risk Index."));
        let app = router(state_with(client.clone(), 0));
        let history = vec![ChatMessage::assistant("Hi, how can I assist you today?")];

        let resp = app.oneshot(post_json("/api/rag", &chat_body("What is DRI score?", &history))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await, json!({ "response": "DRI stands for Disease Risk Index." }));

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Your model is test-model"));
        assert!(prompts[0].contains(DEFAULT_PREAMBLE));
        assert!(prompts[0].contains("assistant: Hi, how can I assist you today?"));
        assert!(prompts[0].contains("Question: What is DRI score?"));
    }

    #[tokio::test]
    async fn chat_without_content_returns_fallback() {
        let app = router(state_with(MockChatClient::new(Reply::Empty), 0));

        let resp = app.oneshot(post_json("/api/rag", &chat_body("hello", &[]))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await, json!({ "response": FALLBACK_RESPONSE }));
    }

    #[tokio::test]
    async fn provider_failure_is_a_500_with_error() {
        let app = router(state_with(MockChatClient::new(Reply::Fail("upstream down")), 0));

        let resp = app.oneshot(post_json("/api/rag", &chat_body("hello", &[]))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_json(resp).await, json!({ "error": "503 upstream down" }));
    }

    #[tokio::test]
    async fn malformed_body_is_a_500_with_error() {
        let client = MockChatClient::new(Reply::Text("unused"));
        let app = router(state_with(client.clone(), 0));

        let resp = app.oneshot(post_json("/api/rag", r#"{"history": 3}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(resp).await;
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_message_is_still_forwarded() {
        let client = MockChatClient::new(Reply::Text("ok"));
        let app = router(state_with(client.clone(), 0));

        let resp = app.oneshot(post_json("/api/rag", &chat_body("", &[]))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(client.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rate_limit_rejects_burst() {
        let app = router(state_with(MockChatClient::new(Reply::Text("ok")), 1));

        let first = app.clone().oneshot(post_json("/api/rag", &chat_body("a", &[]))).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(post_json("/api/rag", &chat_body("b", &[]))).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(read_json(second).await, json!({ "error": "Too many requests" }));
    }

    #[tokio::test]
    async fn predict_rejects_missing_fields() {
        let app = router(state_with(MockChatClient::new(Reply::Text("ok")), 0));

        let resp = app.oneshot(post_json("/api/predict", r#"{"donor_age":"35"}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = read_json(resp).await;
        let error = body["error"].as_str().unwrap();
        assert!(error.starts_with("Missing required fields: age_at_hct"));
        assert!(!error.contains("donor_age"));
    }

    #[tokio::test]
    async fn predict_upstream_failure_is_a_502() {
        let service = Router::new().route(
            "/predict",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Model not loaded" }))) })
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, service).await.unwrap();
        });

        let state = AppState::new(
            MockChatClient::new(Reply::Text("ok")),
            Arc::new(PromptConfig::default()),
            None,
            PredictionClient::new(&format!("http://{}", addr)).unwrap(),
            0
        );
        let form = json!({
            "donor_age": "35", "age_at_hct": "45", "prim_disease_hct": "aml", "year_hct": "2024",
            "dri_score": "low", "comorbidity_score": "0", "gvhd_proph": "other",
            "karnofsky_score": "80", "race_group": "asian", "cyto_score": "favorable"
        });

        let resp = router(state).oneshot(post_json("/api/predict", &form.to_string())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(read_json(resp).await, json!({ "error": "Failed to get prediction" }));
    }

    #[tokio::test]
    async fn health_reports_model() {
        let app = router(state_with(MockChatClient::new(Reply::Text("ok")), 0));

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model"], "test-model");
    }

    #[tokio::test]
    async fn reload_without_prompts_file_is_a_no_op() {
        let app = router(state_with(MockChatClient::new(Reply::Text("ok")), 0));

        let req = Request::builder().uri("/api/reload-prompts").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await["success"], true);
    }
}
