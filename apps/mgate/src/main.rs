use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Json;
use mgate_engine::{GatewayBuilder, RequestContext, RequestEngine};
use mgate_provider::{GatewayRequest, RequestInput, RequestParams};
use serde::Deserialize;

#[derive(Clone)]
struct AppState {
    engine: Arc<RequestEngine>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    provider: Option<String>,
    model: String,
    prompt: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mgate_engine::bootstrap::init_tracing();
    let config = mgate_engine::bootstrap_from_env().await?;
    let host = config.host.clone();
    let port = config.port;

    // Demonstration wiring only: no concrete provider adapters or tool
    // sources are registered here. An embedding application supplies its
    // own `ProviderAdapter`/`ToolSource` implementations and calls
    // `GatewayBuilder::with_adapter`/`with_tool_source` before `build()`.
    let engine = GatewayBuilder::new()
        .with_config(config)
        .build()
        .map_err(|e| anyhow::anyhow!("build gateway: {e}"))?;

    let state = AppState {
        engine: Arc::new(engine),
    };

    let app = axum::Router::new()
        .route("/v1/chat", post(chat))
        .with_state(state);

    let bind = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(event = "listening", %bind);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatRequest>) -> impl IntoResponse {
    let request = GatewayRequest {
        provider_hint: body.provider,
        model: body.model,
        input: RequestInput::Prompt(body.prompt),
        params: RequestParams::default(),
        fallback_chain: Vec::new(),
    };
    let ctx = RequestContext::new(tokio::time::Instant::now() + std::time::Duration::from_secs(60));

    match state.engine.handle(request, ctx).await {
        Ok(response) => {
            let text = response
                .choices
                .first()
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default();
            Json(serde_json::json!({
                "id": response.id,
                "model": response.model,
                "content": text,
                "tool_rounds_used": response.meta.tool_rounds_used,
            }))
            .into_response()
        }
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({
                "error": {
                    "kind": err.kind.as_str(),
                    "message": err.message,
                }
            })),
        )
            .into_response(),
    }
}
