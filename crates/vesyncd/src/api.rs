use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::engine::EngineError;
use crate::engine::EntityCommand;
use crate::engine::Service;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

/// Response for accepted commands and service calls
#[derive(Serialize)]
struct AcceptedResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    integrations: Option<usize>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            engine,
        }
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

/// Handler for GET /v1/state
#[tracing::instrument(skip(state))]
async fn entity_states(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.state_snapshot();
    (StatusCode::OK, Json(snapshot.as_ref().clone()))
}

/// Handler for POST /v1/entities/:entity_id/command
#[tracing::instrument(skip(state))]
async fn entity_command(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(command): Json<EntityCommand>,
) -> Response {
    match state.engine.send_command(&entity_id, command) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(AcceptedResponse {
                status: "accepted",
                integrations: None,
            }),
        )
            .into_response(),
        Err(e) => {
            let status = match e {
                EngineError::UnknownEntity(_) => StatusCode::NOT_FOUND,
                EngineError::UnknownIntegration(_) | EngineError::IntegrationStopped(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            };
            tracing::warn!("Rejected command for {}: {}", entity_id, e);
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// Handler for POST /v1/services/update_devices
#[tracing::instrument(skip(state))]
async fn update_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let delivered = state.engine.call_service(Service::UpdateDevices);
    (
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted",
            integrations: Some(delivered),
        }),
    )
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/state", get(entity_states))
        .route("/v1/entities/:entity_id/command", post(entity_command))
        .route("/v1/services/update_devices", post(update_devices))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves until `shutdown_rx` fires.
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(Arc::new(AppState::new(engine)));

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        create_router(Arc::new(AppState::new(Arc::new(Engine::new()))))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let response = router()
            .oneshot(Request::get("/v1/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_info_reports_version() {
        let response = router()
            .oneshot(Request::get("/v1/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
        assert!(body["hostname"].is_string());
    }

    #[tokio::test]
    async fn test_empty_state() {
        let response = router()
            .oneshot(Request::get("/v1/state").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"entities": {}}));
    }

    #[tokio::test]
    async fn test_command_for_unknown_entity() {
        let request = Request::post("/v1/entities/switch.nope/command")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"command": "turn_off"}"#))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("switch.nope"));
    }

    #[tokio::test]
    async fn test_malformed_command_rejected() {
        let request = Request::post("/v1/entities/switch.nope/command")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"command": "explode"}"#))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_update_devices_with_no_integrations() {
        let request = Request::post("/v1/services/update_devices")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            body_json(response).await,
            json!({"status": "accepted", "integrations": 0})
        );
    }
}
