//! HTTP side API: Prometheus metrics, health and game lookup.
//!
//! Runs on a separate tokio task next to the WebSocket gateway. Game
//! lookups require the same identity token the gateway accepts.

use crate::auth::{Authenticator, token_from_headers};
use crate::state::HubHandle;
use crate::store::{RecordStore, StoreError};
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use duet_proto::Identity;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared handles for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub store: Arc<dyn RecordStore>,
    pub auth: Arc<dyn Authenticator>,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    let games = Router::new()
        .route("/games/:id", get(game_handler))
        .route("/games/:id/moves", get(moves_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .merge(games)
        .with_state(state)
}

/// Reject requests without a valid `token` cookie or bearer token.
async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = token_from_headers(request.headers()) else {
        return unauthorized();
    };
    match state.auth.authenticate(&token) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            tracing::info!(error = %e, "HTTP token rejected");
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unauthorized" })),
    )
        .into_response()
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn health_handler(State(state): State<AppState>) -> Response {
    match state.hub.stats().await {
        Some(stats) => Json(json!({ "status": "ok", "rooms": stats.rooms })).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
            .into_response(),
    }
}

async fn game_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Response {
    tracing::debug!(session = %id, participant = identity.id, "Game lookup");
    match state.store.get_session(&id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => store_failure(e),
    }
}

async fn moves_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Response {
    tracing::debug!(session = %id, participant = identity.id, "Move log lookup");
    if let Err(e) = state.store.get_session(&id).await {
        return store_failure(e);
    }
    match state.store.list_moves(&id).await {
        Ok(moves) => Json(moves).into_response(),
        Err(e) => store_failure(e),
    }
}

fn store_failure(err: StoreError) -> Response {
    let status = match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => {
            tracing::warn!(code = err.error_code(), error = %err, "Lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

/// Run the HTTP server.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background.
pub async fn run_http_server(port: u16, state: AppState) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, router(state)).await {
        tracing::error!("HTTP server error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtAuthenticator, default_token_ttl};
    use crate::state::Hub;
    use crate::store::memory::MemoryStore;
    use crate::store::{NewMove, RecordStore};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret-0123456789";

    async fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let hub = Hub::spawn(store.clone(), 16);
        let state = AppState {
            hub,
            store: store.clone(),
            auth: Arc::new(JwtAuthenticator::new(SECRET)),
        };
        (router(state), store)
    }

    fn bearer(secret: &str) -> String {
        let token = JwtAuthenticator::new(secret)
            .mint(&Identity::new(1, "alice"), default_token_ttl())
            .unwrap();
        format!("Bearer {token}")
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let auth = bearer(SECRET);
        get_with(app, uri, &[("Authorization", auth.as_str())]).await
    }

    async fn get_with(
        app: Router,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_room_count() {
        let (app, _) = app().await;
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["rooms"], 0);
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let (app, _) = app().await;
        let (status, _) = get_json(app.clone(), "/games/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_json(app, "/games/nope/moves").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn game_and_moves_are_served() {
        let (app, store) = app().await;
        store.create_session("g1", 1).await.unwrap();
        store
            .append_move(NewMove {
                session_id: "g1".into(),
                participant_id: 1,
                from: "e2".into(),
                to: "e4".into(),
                piece: "p".into(),
                state_after: String::new(),
                move_number: 1,
            })
            .await
            .unwrap();

        let (status, body) = get_json(app.clone(), "/games/g1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["white_player_id"], 1);

        let (status, body) = get_json(app, "/games/g1/moves").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn game_routes_require_a_token() {
        let (app, store) = app().await;
        store.create_session("g1", 1).await.unwrap();

        for uri in ["/games/g1", "/games/g1/moves"] {
            let (status, body) = get_with(app.clone(), uri, &[]).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "Unauthorized");
        }
    }

    #[tokio::test]
    async fn game_routes_reject_bad_tokens() {
        let (app, store) = app().await;
        store.create_session("g1", 1).await.unwrap();

        let forged = bearer("some-other-secret-0000");
        let expired = format!(
            "Bearer {}",
            JwtAuthenticator::new(SECRET)
                .mint(&Identity::new(1, "alice"), chrono::Duration::hours(-2))
                .unwrap()
        );
        for auth in ["Bearer garbage", forged.as_str(), expired.as_str()] {
            for uri in ["/games/g1", "/games/g1/moves"] {
                let (status, _) = get_with(app.clone(), uri, &[("Authorization", auth)]).await;
                assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri} with {auth}");
            }
        }
    }

    #[tokio::test]
    async fn game_routes_accept_token_cookie() {
        let (app, store) = app().await;
        store.create_session("g1", 1).await.unwrap();
        let token = JwtAuthenticator::new(SECRET)
            .mint(&Identity::new(2, "bob"), default_token_ttl())
            .unwrap();
        let cookie = format!("token={token}");

        let (status, body) = get_with(app.clone(), "/games/g1", &[("Cookie", cookie.as_str())]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["white_player_id"], 1);

        let (status, body) = get_with(app, "/games/g1/moves", &[("Cookie", cookie.as_str())]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn health_and_metrics_stay_open() {
        let (app, _) = app().await;
        let (status, _) = get_with(app.clone(), "/health", &[]).await;
        assert_eq!(status, StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
