//! HTTP surface for the graph generator.
//!
//! `GET /v1/nodes` returns a one-shot snapshot for a namespace;
//! `GET /v1/ws` upgrades to the streaming surface. Requests get a UUID
//! request id and an access-log line; CORS is wide open for the
//! visualization front-end.

mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::errors::GraphError;
use crate::graph::builder::GraphBuilder;
use crate::graph::health::{default_health_factory, HealthEvaluatorFactory};
use crate::graph::node::GraphNode;
use crate::k8s::lister::Lister;

/// Shared state for the HTTP handlers.
pub struct ServerState {
    lister: Arc<dyn Lister>,
    health_factory: HealthEvaluatorFactory,
}

impl ServerState {
    pub fn new(lister: Arc<dyn Lister>, health_factory: Option<HealthEvaluatorFactory>) -> Self {
        Self {
            lister,
            health_factory: health_factory.unwrap_or_else(default_health_factory),
        }
    }

    fn builder(&self) -> GraphBuilder {
        GraphBuilder::new(self.lister.clone()).with_health_factory(self.health_factory.clone())
    }
}

#[derive(Serialize)]
struct NodesResponse {
    nodes: Vec<GraphNode>,
}

#[derive(Deserialize)]
struct NodesQuery {
    #[serde(default = "default_namespace")]
    namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Build the application router.
pub fn router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/nodes", get(nodes_handler))
        .route("/v1/ws", get(ws::ws_handler))
        .layer(middleware::from_fn(access_log))
        .layer(cors)
        .with_state(state)
}

/// Serve until the shutdown signal fires.
pub async fn serve(addr: SocketAddr, state: Arc<ServerState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server starting");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let interrupt = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("install SIGTERM handler");
        tokio::select! {
            _ = interrupt => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = interrupt.await;
    }
    info!("HTTP server stopping");
}

async fn nodes_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<NodesQuery>,
) -> Response {
    let cancel = CancellationToken::new();
    match state.builder().build(&cancel, &query.namespace) {
        Ok(nodes) => Json(NodesResponse { nodes }).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err),
    }
}

fn error_response(status: StatusCode, err: &GraphError) -> Response {
    let body = json!({
        "error": {
            "message": err.to_string(),
            "status": status.as_u16(),
        }
    });
    (status, Json(body)).into_response()
}

async fn access_log(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        status = response.status().as_u16(),
        %uri,
        latency_ms = start.elapsed().as_millis() as u64,
        request_id = %request_id,
        "HTTP"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_shape() {
        let err = GraphError::Cancelled;
        let response = error_response(StatusCode::INTERNAL_SERVER_ERROR, &err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn nodes_query_defaults_namespace() {
        let query: NodesQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(query.namespace, "default");

        let query: NodesQuery =
            serde_json::from_value(serde_json::json!({"namespace": "prod"})).unwrap();
        assert_eq!(query.namespace, "prod");
    }
}
