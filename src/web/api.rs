//! Defines the Axum API routes and handlers.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, TryStreamExt};
use tokio_util::io::StreamReader;

use crate::run::{RunController, RunError};
use crate::web::models::{StatusResponse, StopResponse};

pub type AppState = RunController;

/// Helper to create a JSON error response with a message and status code
fn json_error(message: &str, status: StatusCode) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Peer address when the server was started with connect info.
fn requester(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Creates the Axum router with all the API endpoints.
pub fn create_router(controller: AppState) -> Router {
    Router::new()
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/run", post(run_handler))
        .route("/api/v1/stop", post(stop_handler))
        .route("/api/v1/log", get(log_handler))
        .with_state(controller)
}

async fn get_status(State(controller): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: controller.state(),
        run: controller.active_run(),
        log_subscribers: controller.log().subscriber_count(),
    })
}

/// Streams the request body into a run as it arrives; replies once the run ends.
async fn run_handler(State(controller): State<AppState>, request: Request) -> Response {
    let from = requester(&request);
    let body = request.into_body().into_data_stream().map_err(std::io::Error::other);
    match controller.start(StreamReader::new(body), &from).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e @ RunError::AlreadyRunning) => json_error(&e.to_string(), StatusCode::CONFLICT),
    }
}

async fn stop_handler(State(controller): State<AppState>, request: Request) -> Json<StopResponse> {
    let stopping = controller.stop(&requester(&request));
    Json(StopResponse { stopping })
}

/// Server-sent events, one JSON log event per message, until the client goes away.
async fn log_handler(State(controller): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = controller.subscribe();
    let stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            match Event::default().json_data(&event) {
                Ok(sse) => yield Ok(sse),
                Err(e) => tracing::warn!("couldn't encode log event: {}", e),
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}
