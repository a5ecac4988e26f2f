use crate::assistant::pdf::PdfInput;
use crate::assistant::Assistant;
use crate::history::HistoryStore;
use crate::models::study_plan::StudyPlanRequest;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::Bytes,
    routing::{ get, post },
    Router,
    extract::{ DefaultBodyLimit, Path, State },
    response::IntoResponse,
    http::StatusCode,
    Json,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

const MAX_PDF_BYTES: usize = 32 * 1024 * 1024;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ContentResponse {
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub history: Arc<dyn HistoryStore>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/study-plan", post(study_plan_handler))
        .route("/api/pdf", post(pdf_handler))
        .route("/api/conversations/{id}", get(conversation_handler))
        .layer(DefaultBodyLimit::max(MAX_PDF_BYTES))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    state: AppState
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!("HTTP server started");
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn study_plan_handler(
    State(state): State<AppState>,
    Json(req): Json<StudyPlanRequest>
) -> Json<ContentResponse> {
    let content = state.assistant.generate_study_plan(&req).await;
    Json(ContentResponse { content })
}

/// Body is the raw PDF; an empty body counts as no upload.
async fn pdf_handler(State(state): State<AppState>, body: Bytes) -> Json<ContentResponse> {
    let input = if body.is_empty() { None } else { Some(PdfInput::Bytes(body.to_vec())) };
    let content = state.assistant.preview_pdf(input).await;
    Json(ContentResponse { content })
}

async fn conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> impl IntoResponse {
    match state.history.get_conversation(&id).await {
        Some(conversation) => (StatusCode::OK, Json(conversation.snapshot())).into_response(),
        None =>
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    message: format!("Conversation '{}' not found", id),
                }),
            ).into_response(),
    }
}
