use std::env;

use axum::{
    Json, Router,
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    subscribers, words,
    web::{AppState, ApiMessage},
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .nest(
            "/api/v1",
            Router::new()
                .merge(words::router())
                .merge(subscribers::router()),
        )
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);

    match env::var("CORS_ALLOW_ORIGINS") {
        Ok(raw) => {
            let origins: Vec<HeaderValue> = raw
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin, "ignoring unparsable CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(origins))
        }
        Err(_) => layer.allow_origin(Any),
    }
}

async fn root() -> impl IntoResponse {
    Json(ApiMessage::new("Welcome to AI Word Daily API"))
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
