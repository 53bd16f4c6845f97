use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{Film, FilmPatch, NewFilm};

use super::AppState;

const DEFAULT_POPULAR_COUNT: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularQuery {
    pub count: Option<i64>,
    pub genre_id: Option<i64>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonFilmsQuery {
    pub user_id: i64,
    pub friend_id: i64,
}

/// Create a new film
pub async fn create_film(
    State(state): State<AppState>,
    Json(request): Json<NewFilm>,
) -> AppResult<(StatusCode, Json<Film>)> {
    let film = state.identity.create_film(request).await?;
    Ok((StatusCode::CREATED, Json(film)))
}

/// Update an existing film in place
pub async fn update_film(
    State(state): State<AppState>,
    Json(request): Json<FilmPatch>,
) -> AppResult<Json<Film>> {
    let film = state.identity.update_film(request).await?;
    Ok(Json(film))
}

/// Get all films
pub async fn get_films(State(state): State<AppState>) -> AppResult<Json<Vec<Film>>> {
    Ok(Json(state.identity.list_films().await?))
}

/// Get one film by id
pub async fn get_film(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Film>> {
    Ok(Json(state.identity.get_film(id).await?))
}

/// Like a film and record it in the feed
pub async fn like_film(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.likes.like(id, user_id).await?;
    state.feed.record(user_id, id, "FILM", "ADD", "LIKE").await?;
    Ok(StatusCode::OK)
}

/// Remove a like and record it in the feed
pub async fn unlike_film(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.likes.remove_like(id, user_id).await?;
    state
        .feed
        .record(user_id, id, "FILM", "REMOVE", "LIKE")
        .await?;
    Ok(StatusCode::OK)
}

/// Most liked films, optionally narrowed to a genre and/or release year
pub async fn get_popular_films(
    State(state): State<AppState>,
    Query(query): Query<PopularQuery>,
) -> AppResult<Json<Vec<Film>>> {
    let limit = query.count.unwrap_or(DEFAULT_POPULAR_COUNT);
    let films = state
        .likes
        .top_films(query.genre_id, query.year, limit)
        .await?;
    Ok(Json(films))
}

/// Films two users both like, most liked overall first
pub async fn get_common_films(
    State(state): State<AppState>,
    Query(query): Query<CommonFilmsQuery>,
) -> AppResult<Json<Vec<Film>>> {
    let films = state
        .likes
        .common_popular_films(query.user_id, query.friend_id)
        .await?;
    Ok(Json(films))
}
