//! Storage abstraction for the social catalog.
//!
//! Each core component talks to its own narrow trait; `Storage` bundles them
//! so the application can hand a single `Arc<dyn Storage>` around. Two
//! implementations exist: [`postgres::PgStorage`] for the real backing store
//! and [`memory::MemoryStorage`], which the tests run against.
//!
//! The traits carry no business rules: existence checks, duplicate-edge
//! rejection and validation all live in the service layer, so both backends
//! behave identically under test.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    Director, EntityType, Event, EventType, Film, FilmPatch, Genre, Mpa, NewFilm, NewUser,
    Operation, Review, ReviewPatch, User, UserPatch,
};

/// User/film identity and reference data
#[async_trait]
pub trait IdentityStorage: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> AppResult<User>;
    /// Applies the patch; absent fields keep their stored values.
    /// The caller has already checked that the user exists.
    async fn update_user(&self, patch: &UserPatch) -> AppResult<User>;
    async fn get_user(&self, id: i64) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    /// True when another user (not `exclude_user`) already holds `email`
    async fn email_in_use(&self, email: &str, exclude_user: Option<i64>) -> AppResult<bool>;

    async fn create_film(&self, film: &NewFilm) -> AppResult<Film>;
    async fn update_film(&self, patch: &FilmPatch) -> AppResult<Film>;
    async fn get_film(&self, id: i64) -> AppResult<Option<Film>>;
    async fn list_films(&self) -> AppResult<Vec<Film>>;

    async fn get_mpa(&self, id: i64) -> AppResult<Option<Mpa>>;
    async fn list_mpa(&self) -> AppResult<Vec<Mpa>>;
    async fn get_genre(&self, id: i64) -> AppResult<Option<Genre>>;
    async fn list_genres(&self) -> AppResult<Vec<Genre>>;
    async fn create_director(&self, name: &str) -> AppResult<Director>;
    async fn list_directors(&self) -> AppResult<Vec<Director>>;
    async fn director_exists(&self, id: i64) -> AppResult<bool>;
}

/// Directed friendship edges
#[async_trait]
pub trait FriendStorage: Send + Sync {
    async fn insert_friend(&self, user_id: i64, friend_id: i64) -> AppResult<()>;
    /// Removing an absent edge is a no-op
    async fn delete_friend(&self, user_id: i64, friend_id: i64) -> AppResult<()>;
    async fn friend_exists(&self, user_id: i64, friend_id: i64) -> AppResult<bool>;
    /// Users `user_id` points to, ordered by id ascending
    async fn friends_of(&self, user_id: i64) -> AppResult<Vec<User>>;
    /// Intersection of both users' friend lists, ordered by id ascending
    async fn common_friends(&self, user_id: i64, other_id: i64) -> AppResult<Vec<User>>;
}

/// (film, user) like edges and the queries ranked over them
#[async_trait]
pub trait LikeStorage: Send + Sync {
    async fn insert_like(&self, film_id: i64, user_id: i64) -> AppResult<()>;
    async fn delete_like(&self, film_id: i64, user_id: i64) -> AppResult<()>;
    async fn like_exists(&self, film_id: i64, user_id: i64) -> AppResult<bool>;
    /// Films ranked by distinct-liker count descending, ties by id ascending,
    /// optionally filtered by genre and release year. `limit` is positive.
    async fn top_films(
        &self,
        genre_id: Option<i64>,
        year: Option<i32>,
        limit: i64,
    ) -> AppResult<Vec<Film>>;
    /// Films liked by both users, ranked by total like count descending,
    /// ties by id ascending
    async fn common_liked_films(&self, user_id: i64, other_id: i64) -> AppResult<Vec<Film>>;
    /// Ids of films the user liked, ascending
    async fn liked_film_ids(&self, user_id: i64) -> AppResult<Vec<i64>>;
    /// Other users sharing at least one liked film with `user_id`,
    /// ordered by user id ascending
    async fn co_likers(&self, user_id: i64) -> AppResult<Vec<i64>>;
    /// Films for the given ids, in the order the ids are given
    async fn films_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Film>>;
}

/// Reviews and their per-user rating edges
#[async_trait]
pub trait ReviewStorage: Send + Sync {
    async fn insert_review(
        &self,
        content: &str,
        is_positive: bool,
        user_id: i64,
        film_id: i64,
    ) -> AppResult<Review>;
    async fn update_review(&self, patch: &ReviewPatch) -> AppResult<Review>;
    async fn get_review(&self, id: i64) -> AppResult<Option<Review>>;
    /// Removes the review together with its rating edges
    async fn delete_review(&self, id: i64) -> AppResult<()>;
    /// Ordered by usefulness descending, ties by review id ascending
    async fn list_reviews(&self, film_id: Option<i64>, limit: i64) -> AppResult<Vec<Review>>;
    /// Replaces any prior vote by the same user on the same review
    async fn upsert_review_rating(&self, user_id: i64, review_id: i64, rating: i32)
        -> AppResult<()>;
    /// Deletes the vote only when its stored value equals `rating`
    async fn delete_review_rating(&self, user_id: i64, review_id: i64, rating: i32)
        -> AppResult<()>;
}

/// Append-only event log
#[async_trait]
pub trait EventStorage: Send + Sync {
    /// Appends with a server-assigned epoch-millis timestamp
    async fn append_event(
        &self,
        user_id: i64,
        entity_id: i64,
        entity_type: EntityType,
        operation: Operation,
        event_type: EventType,
    ) -> AppResult<Event>;
    /// Events whose actor is `user_id`, newest first
    async fn events_for_user(&self, user_id: i64) -> AppResult<Vec<Event>>;
}

/// The full backing store one application instance runs against
pub trait Storage:
    IdentityStorage + FriendStorage + LikeStorage + ReviewStorage + EventStorage
{
}

impl<T> Storage for T where
    T: IdentityStorage + FriendStorage + LikeStorage + ReviewStorage + EventStorage
{
}
