//! Core components of the social catalog.
//!
//! Each service is a small stateless struct over the injected storage; the
//! HTTP layer calls exactly one of them per operation and writes the
//! activity feed itself where a mutation calls for it.

pub mod feed;
pub mod friendships;
pub mod identity;
pub mod likes;
pub mod recommendations;
pub mod reviews;

pub use feed::FeedService;
pub use friendships::FriendshipService;
pub use identity::IdentityService;
pub use likes::LikeService;
pub use recommendations::RecommendationService;
pub use reviews::ReviewService;

use crate::error::{AppError, AppResult};
use crate::models::{Film, Review, User};
use crate::storage::Storage;

pub(crate) async fn require_user(storage: &dyn Storage, id: i64) -> AppResult<User> {
    storage
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user with id = {id} not found")))
}

pub(crate) async fn require_film(storage: &dyn Storage, id: i64) -> AppResult<Film> {
    storage
        .get_film(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("film with id = {id} not found")))
}

pub(crate) async fn require_review(storage: &dyn Storage, id: i64) -> AppResult<Review> {
    storage
        .get_review(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("review with id = {id} not found")))
}
