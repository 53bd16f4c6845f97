use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{Director, Genre, Mpa};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDirectorRequest {
    pub name: String,
}

/// All genres, by id
pub async fn get_genres(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    Ok(Json(state.identity.list_genres().await?))
}

/// One genre by id
pub async fn get_genre(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Genre>> {
    Ok(Json(state.identity.get_genre(id).await?))
}

/// All MPA ratings, by id
pub async fn get_mpa_ratings(State(state): State<AppState>) -> AppResult<Json<Vec<Mpa>>> {
    Ok(Json(state.identity.list_mpa().await?))
}

/// One MPA rating by id
pub async fn get_mpa_rating(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Mpa>> {
    Ok(Json(state.identity.get_mpa(id).await?))
}

/// Register a director so films can reference them
pub async fn create_director(
    State(state): State<AppState>,
    Json(request): Json<CreateDirectorRequest>,
) -> AppResult<(StatusCode, Json<Director>)> {
    let director = state.identity.create_director(&request.name).await?;
    Ok((StatusCode::CREATED, Json(director)))
}

/// All registered directors
pub async fn get_directors(State(state): State<AppState>) -> AppResult<Json<Vec<Director>>> {
    Ok(Json(state.identity.list_directors().await?))
}
