use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::models::{Event, Film, NewUser, User, UserPatch};

use super::AppState;

/// Create a new user
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<NewUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.identity.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Update an existing user in place
pub async fn update_user(
    State(state): State<AppState>,
    Json(request): Json<UserPatch>,
) -> AppResult<Json<User>> {
    let user = state.identity.update_user(request).await?;
    Ok(Json(user))
}

/// Get all users
pub async fn get_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.identity.list_users().await?))
}

/// Get one user by id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    Ok(Json(state.identity.get_user(id).await?))
}

/// Add a directed friendship edge and record it in the feed
pub async fn add_friend(
    State(state): State<AppState>,
    Path((id, friend_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.friendships.add_friend(id, friend_id).await?;
    state
        .feed
        .record(id, friend_id, "USER", "ADD", "FRIEND")
        .await?;
    Ok(StatusCode::OK)
}

/// Remove a friendship edge (idempotent) and record it in the feed
pub async fn delete_friend(
    State(state): State<AppState>,
    Path((id, friend_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.friendships.delete_friend(id, friend_id).await?;
    state
        .feed
        .record(id, friend_id, "USER", "REMOVE", "FRIEND")
        .await?;
    Ok(StatusCode::OK)
}

/// Friends of a user, ordered by id
pub async fn get_friends(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.friendships.friends(id).await?))
}

/// Friends two users have in common
pub async fn get_common_friends(
    State(state): State<AppState>,
    Path((id, other_id)): Path<(i64, i64)>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.friendships.common_friends(id, other_id).await?))
}

/// The user's activity feed, newest first
pub async fn get_feed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Event>>> {
    Ok(Json(state.feed.for_user(id).await?))
}

/// Films the most similar peer liked that this user has not
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Film>>> {
    Ok(Json(state.recommendations.recommend(id).await?))
}
