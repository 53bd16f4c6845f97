use axum::{
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

use super::{films, reference, reviews, users, AppState};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Users and the friendship graph
        .route("/users", get(users::get_users))
        .route("/users", post(users::create_user))
        .route("/users", put(users::update_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/friends", get(users::get_friends))
        .route("/users/:id/friends/:friend_id", put(users::add_friend))
        .route("/users/:id/friends/:friend_id", delete(users::delete_friend))
        .route(
            "/users/:id/friends/common/:other_id",
            get(users::get_common_friends),
        )
        .route("/users/:id/feed", get(users::get_feed))
        .route("/users/:id/recommendations", get(users::get_recommendations))
        // Films and the like ledger
        .route("/films", get(films::get_films))
        .route("/films", post(films::create_film))
        .route("/films", put(films::update_film))
        .route("/films/popular", get(films::get_popular_films))
        .route("/films/common", get(films::get_common_films))
        .route("/films/:id", get(films::get_film))
        .route("/films/:id/like/:user_id", put(films::like_film))
        .route("/films/:id/like/:user_id", delete(films::unlike_film))
        // Reviews and usefulness votes
        .route("/reviews", get(reviews::get_reviews))
        .route("/reviews", post(reviews::create_review))
        .route("/reviews", put(reviews::update_review))
        .route("/reviews/:id", get(reviews::get_review))
        .route("/reviews/:id", delete(reviews::delete_review))
        .route("/reviews/:id/like/:user_id", put(reviews::like_review))
        .route("/reviews/:id/like/:user_id", delete(reviews::unlike_review))
        .route("/reviews/:id/dislike/:user_id", put(reviews::dislike_review))
        .route(
            "/reviews/:id/dislike/:user_id",
            delete(reviews::undislike_review),
        )
        // Reference data
        .route("/genres", get(reference::get_genres))
        .route("/genres/:id", get(reference::get_genre))
        .route("/mpa", get(reference::get_mpa_ratings))
        .route("/mpa/:id", get(reference::get_mpa_rating))
        .route("/directors", get(reference::get_directors))
        .route("/directors", post(reference::create_director))
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> StatusCode {
    StatusCode::OK
}
