use axum::{middleware, routing::get, routing::post, Router};

use crate::auth::accounts;
use crate::auth::middleware::JwtSecret;
use crate::dm::{conversations, messages};
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Authenticated routes (JWT required, Claims extractor validates token)
    let message_routes = Router::new()
        .route("/api/messages/send", post(messages::send_message))
        .route(
            "/api/messages/history/{other_user_id}",
            get(messages::get_history),
        )
        .route(
            "/api/messages/conversations",
            get(conversations::list_conversations),
        )
        .route("/api/messages/unread/count", get(messages::get_unread_count));

    // Public auth routes (mint the bearer token used everywhere else)
    let auth_routes = Router::new()
        .route("/api/auth/register", post(accounts::register))
        .route("/api/auth/login", post(accounts::login));

    // WebSocket endpoint (auth happens in-band after the upgrade)
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(message_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
