use crate::agent::SymptomAgent;
use crate::analyzer::AnalysisSummary;
use crate::cli::Args;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    extract::State,
    response::IntoResponse,
    http::StatusCode,
    Json,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub analysis: AnalysisSummary,
    pub response: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    symptoms: usize,
}

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<SymptomAgent>,
}

pub fn router(agent: Arc<SymptomAgent>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/reload-knowledge", get(reload_knowledge_handler))
        .layer(cors)
        .with_state(AppState { agent })
}

pub async fn start_http_server(
    http_port: u16,
    agent: Arc<SymptomAgent>,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(agent);

    if let (true, Some(cert_path), Some(key_path)) = (
        args.tls_enabled(),
        args.tls_cert_path.as_ref(),
        args.tls_key_path.as_ref(),
    ) {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let tls_config = axum_server::tls_rustls::RustlsConfig
            ::from_pem_file(cert_path, key_path).await
            .map_err(|e| format!("Failed to load HTTPS certificate/key: {}", e))?;

        tokio::spawn(async move {
            let result = axum_server
                ::bind_rustls(addr, tls_config)
                .serve(app.into_make_service()).await;

            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });

        info!("HTTPS server started with TLS enabled");
    } else {
        let listener = tokio::net::TcpListener
            ::bind(addr).await
            .map_err(|e| format!("Failed to bind HTTP server to {}: {}", addr, e))?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!("HTTP server error: {}", e);
            }
        });

        info!("HTTP server started");
    }

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let symptoms = state.agent.knowledge().await.len();
    Json(HealthResponse { status: "ok", symptoms })
}

async fn analyze_handler(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>
) -> impl IntoResponse {
    let (analysis, response) = state.agent.analyze_summary(&req.content).await;
    Json(AnalyzeResponse { analysis, response })
}

async fn reload_knowledge_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.agent.reload_knowledge_if_changed().await {
        Ok(true) =>
            (
                StatusCode::OK,
                Json(ReloadResponse { success: true, message: "Knowledge reloaded".into() }),
            ),
        Ok(false) =>
            (
                StatusCode::OK,
                Json(ReloadResponse { success: true, message: "Knowledge unchanged".into() }),
            ),
        Err(e) => {
            error!("Knowledge reload failed: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ReloadResponse { success: false, message: format!("Reload error: {}", e) }),
            )
        }
    }
}
