use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::web::{ApiError, ApiMessage, AppState};

pub mod store;

pub use store::SubscriberRow;

use store::{SubscriberCreate, SubscriberPatch};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscribers", post(create_subscriber).get(list_subscribers))
        .route("/subscribers/stats/summary", get(subscriber_stats))
        .route(
            "/subscribers/:id",
            get(get_subscriber)
                .put(update_subscriber)
                .delete(delete_subscriber),
        )
}

async fn create_subscriber(
    State(state): State<AppState>,
    Json(data): Json<SubscriberCreate>,
) -> Result<Json<SubscriberRow>, ApiError> {
    let subscriber = store::create(state.pool_ref(), data).await?;
    Ok(Json(subscriber))
}

#[derive(Debug, Deserialize)]
struct SubscriberListQuery {
    search: Option<String>,
    #[serde(default)]
    skip: i64,
    limit: Option<i64>,
}

async fn list_subscribers(
    State(state): State<AppState>,
    Query(query): Query<SubscriberListQuery>,
) -> Result<Json<Vec<SubscriberRow>>, ApiError> {
    if query.skip < 0 {
        return Err(ApiError::validation("Skip must not be negative"));
    }
    let limit = query.limit.unwrap_or(100);
    if !(1..=1000).contains(&limit) {
        return Err(ApiError::validation("Limit must be between 1 and 1000"));
    }

    let subscribers =
        store::list(state.pool_ref(), query.search.as_deref(), query.skip, limit).await?;
    Ok(Json(subscribers))
}

async fn get_subscriber(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SubscriberRow>, ApiError> {
    let subscriber = store::get(state.pool_ref(), id).await?;
    Ok(Json(subscriber))
}

async fn update_subscriber(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<SubscriberPatch>,
) -> Result<Json<SubscriberRow>, ApiError> {
    let subscriber = store::update(state.pool_ref(), id, patch).await?;
    Ok(Json(subscriber))
}

async fn delete_subscriber(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiMessage>, ApiError> {
    let subscriber = store::delete(state.pool_ref(), id).await?;
    Ok(Json(ApiMessage::new(format!(
        "Subscriber '{}' deleted successfully",
        subscriber.name
    ))))
}

#[derive(Debug, Serialize)]
struct SubscriberStats {
    total_subscribers: i64,
}

async fn subscriber_stats(
    State(state): State<AppState>,
) -> Result<Json<SubscriberStats>, ApiError> {
    let total_subscribers = store::count(state.pool_ref()).await?;
    Ok(Json(SubscriberStats { total_subscribers }))
}
