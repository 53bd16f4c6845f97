use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{NewReview, Review, ReviewPatch};

use super::AppState;

const DEFAULT_REVIEW_COUNT: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsQuery {
    pub film_id: Option<i64>,
    pub count: Option<i64>,
}

/// Create a review and record it in the feed
pub async fn create_review(
    State(state): State<AppState>,
    Json(request): Json<NewReview>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = state.reviews.create(request).await?;
    state
        .feed
        .record(review.user_id, review.review_id, "REVIEW", "ADD", "REVIEW")
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Update a review's content or polarity; the feed entry is attributed to
/// the review's author
pub async fn update_review(
    State(state): State<AppState>,
    Json(request): Json<ReviewPatch>,
) -> AppResult<Json<Review>> {
    let review = state.reviews.update(request).await?;
    state
        .feed
        .record(
            review.user_id,
            review.review_id,
            "REVIEW",
            "UPDATE",
            "REVIEW",
        )
        .await?;
    Ok(Json(review))
}

/// Delete a review along with its rating edges
pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let review = state.reviews.delete(id).await?;
    state
        .feed
        .record(review.user_id, id, "REVIEW", "REMOVE", "REVIEW")
        .await?;
    Ok(StatusCode::OK)
}

/// Get one review by id
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Review>> {
    Ok(Json(state.reviews.get(id).await?))
}

/// Reviews ordered by usefulness, optionally for one film
pub async fn get_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewsQuery>,
) -> AppResult<Json<Vec<Review>>> {
    let limit = query.count.unwrap_or(DEFAULT_REVIEW_COUNT);
    Ok(Json(state.reviews.list(query.film_id, limit).await?))
}

/// Vote a review useful (+1); a repeat vote replaces the old one
pub async fn like_review(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.reviews.set_rating(user_id, id, 1).await?;
    Ok(StatusCode::OK)
}

/// Vote a review not useful (-1)
pub async fn dislike_review(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.reviews.set_rating(user_id, id, -1).await?;
    Ok(StatusCode::OK)
}

/// Withdraw a +1 vote; a stored -1 stays put
pub async fn unlike_review(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.reviews.clear_rating(user_id, id, 1).await?;
    Ok(StatusCode::OK)
}

/// Withdraw a -1 vote; a stored +1 stays put
pub async fn undislike_review(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.reviews.clear_rating(user_id, id, -1).await?;
    Ok(StatusCode::OK)
}
