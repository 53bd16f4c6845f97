use std::sync::Arc;

use sqlx::PgPool;

use crate::services::{
    FeedService, FriendshipService, IdentityService, LikeService, RecommendationService,
    ReviewService,
};
use crate::storage::memory::MemoryStorage;
use crate::storage::postgres::PgStorage;
use crate::storage::Storage;

/// Shared application state: one service per core component, all over the
/// same injected storage
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
    pub friendships: FriendshipService,
    pub likes: LikeService,
    pub reviews: ReviewService,
    pub feed: FeedService,
    pub recommendations: RecommendationService,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            identity: IdentityService::new(Arc::clone(&storage)),
            friendships: FriendshipService::new(Arc::clone(&storage)),
            likes: LikeService::new(Arc::clone(&storage)),
            reviews: ReviewService::new(Arc::clone(&storage)),
            feed: FeedService::new(Arc::clone(&storage)),
            recommendations: RecommendationService::new(storage),
        }
    }

    /// State over the map-backed store; what the tests run against
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// State over Postgres
    pub fn postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(PgStorage::new(pool)))
    }
}
