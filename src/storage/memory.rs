//! In-memory backing store.
//!
//! Keeps the whole catalog in maps behind a single `RwLock`. This is what
//! the unit and API tests run against; it mirrors the Postgres
//! implementation's observable behavior query for query.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::{
    Director, EntityType, Event, EventType, Film, FilmPatch, Genre, Mpa, NewFilm, NewUser,
    Operation, Review, ReviewPatch, User, UserPatch,
};
use crate::storage::{EventStorage, FriendStorage, IdentityStorage, LikeStorage, ReviewStorage};

#[derive(Debug, Clone)]
struct ReviewRecord {
    content: String,
    is_positive: bool,
    user_id: i64,
    film_id: i64,
}

#[derive(Default)]
struct Inner {
    next_user_id: i64,
    next_film_id: i64,
    next_director_id: i64,
    next_review_id: i64,
    next_event_id: i64,
    users: BTreeMap<i64, User>,
    films: BTreeMap<i64, Film>,
    mpa: BTreeMap<i64, Mpa>,
    genres: BTreeMap<i64, Genre>,
    directors: BTreeMap<i64, Director>,
    /// (user_id, friend_id), directed
    friends: BTreeSet<(i64, i64)>,
    /// (film_id, user_id)
    likes: BTreeSet<(i64, i64)>,
    reviews: BTreeMap<i64, ReviewRecord>,
    /// (user_id, review_id) -> rating
    review_ratings: BTreeMap<(i64, i64), i32>,
    events: Vec<Event>,
}

impl Inner {
    fn useful(&self, review_id: i64) -> i64 {
        self.review_ratings
            .iter()
            .filter(|((_, rid), _)| *rid == review_id)
            .map(|(_, rating)| i64::from(*rating))
            .sum()
    }

    fn review(&self, id: i64) -> Option<Review> {
        self.reviews.get(&id).map(|record| Review {
            review_id: id,
            content: record.content.clone(),
            is_positive: record.is_positive,
            user_id: record.user_id,
            film_id: record.film_id,
            useful: self.useful(id),
        })
    }

    fn distinct_likers(&self, film_id: i64) -> usize {
        self.likes.range((film_id, i64::MIN)..=(film_id, i64::MAX)).count()
    }
}

/// Map-backed [`crate::storage::Storage`] implementation
pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Creates an empty store with the same seeded reference data as the
    /// Postgres migration
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for (id, name) in [(1, "G"), (2, "PG"), (3, "PG-13"), (4, "R"), (5, "NC-17")] {
            inner.mpa.insert(
                id,
                Mpa {
                    id,
                    name: name.to_string(),
                },
            );
        }
        for (id, name) in [
            (1, "Comedy"),
            (2, "Drama"),
            (3, "Animation"),
            (4, "Thriller"),
            (5, "Documentary"),
            (6, "Action"),
        ] {
            inner.genres.insert(
                id,
                Genre {
                    id,
                    name: name.to_string(),
                },
            );
        }
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    fn assemble_film(inner: &Inner, id: i64, film: &NewFilm) -> AppResult<Film> {
        let mpa = inner
            .mpa
            .get(&film.mpa_id)
            .cloned()
            .ok_or_else(|| AppError::InvalidArgument(format!("MPA rating {} not found", film.mpa_id)))?;
        let mut genre_ids: Vec<i64> = film.genre_ids.clone();
        genre_ids.sort_unstable();
        genre_ids.dedup();
        let genres = genre_ids
            .iter()
            .map(|gid| {
                inner
                    .genres
                    .get(gid)
                    .cloned()
                    .ok_or_else(|| AppError::InvalidArgument(format!("genre {gid} not found")))
            })
            .collect::<AppResult<Vec<_>>>()?;
        let mut director_ids: Vec<i64> = film.director_ids.clone();
        director_ids.sort_unstable();
        director_ids.dedup();
        let directors = director_ids
            .iter()
            .map(|did| {
                inner
                    .directors
                    .get(did)
                    .cloned()
                    .ok_or_else(|| AppError::InvalidArgument(format!("director {did} not found")))
            })
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Film {
            id,
            name: film.name.clone(),
            description: film.description.clone(),
            release_date: film.release_date,
            duration: film.duration,
            mpa,
            genres,
            directors,
        })
    }

    fn rank_films(inner: &Inner, mut scored: Vec<(usize, i64)>) -> Vec<Film> {
        // count descending, film id ascending
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .filter_map(|(_, id)| inner.films.get(&id).cloned())
            .collect()
    }
}

#[async_trait]
impl IdentityStorage for MemoryStorage {
    async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        inner.next_user_id += 1;
        let id = inner.next_user_id;
        let created = User {
            id,
            email: user.email.clone(),
            login: user.login.clone(),
            name: user.display_name(),
            birthday: user.birthday,
        };
        inner.users.insert(id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, patch: &UserPatch) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&patch.id)
            .ok_or_else(|| AppError::NotFound(format!("user with id = {} not found", patch.id)))?;
        if let Some(email) = &patch.email {
            user.email = email.clone();
        }
        if let Some(login) = &patch.login {
            user.login = login.clone();
        }
        if let Some(name) = &patch.name {
            if !name.trim().is_empty() {
                user.name = name.clone();
            }
        }
        if let Some(birthday) = patch.birthday {
            user.birthday = birthday;
        }
        Ok(user.clone())
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.inner.read().await.users.values().cloned().collect())
    }

    async fn email_in_use(&self, email: &str, exclude_user: Option<i64>) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .any(|u| u.email == email && Some(u.id) != exclude_user))
    }

    async fn create_film(&self, film: &NewFilm) -> AppResult<Film> {
        let mut inner = self.inner.write().await;
        inner.next_film_id += 1;
        let id = inner.next_film_id;
        let created = Self::assemble_film(&inner, id, film)?;
        inner.films.insert(id, created.clone());
        Ok(created)
    }

    async fn update_film(&self, patch: &FilmPatch) -> AppResult<Film> {
        let mut inner = self.inner.write().await;
        let current = inner
            .films
            .get(&patch.id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("film with id = {} not found", patch.id)))?;
        let merged = NewFilm {
            name: patch.name.clone().unwrap_or(current.name),
            description: patch.description.clone().unwrap_or(current.description),
            release_date: patch.release_date.unwrap_or(current.release_date),
            duration: patch.duration.unwrap_or(current.duration),
            mpa_id: patch.mpa_id.unwrap_or(current.mpa.id),
            genre_ids: patch
                .genre_ids
                .clone()
                .unwrap_or_else(|| current.genres.iter().map(|g| g.id).collect()),
            director_ids: patch
                .director_ids
                .clone()
                .unwrap_or_else(|| current.directors.iter().map(|d| d.id).collect()),
        };
        let updated = Self::assemble_film(&inner, patch.id, &merged)?;
        inner.films.insert(patch.id, updated.clone());
        Ok(updated)
    }

    async fn get_film(&self, id: i64) -> AppResult<Option<Film>> {
        Ok(self.inner.read().await.films.get(&id).cloned())
    }

    async fn list_films(&self) -> AppResult<Vec<Film>> {
        Ok(self.inner.read().await.films.values().cloned().collect())
    }

    async fn get_mpa(&self, id: i64) -> AppResult<Option<Mpa>> {
        Ok(self.inner.read().await.mpa.get(&id).cloned())
    }

    async fn list_mpa(&self) -> AppResult<Vec<Mpa>> {
        Ok(self.inner.read().await.mpa.values().cloned().collect())
    }

    async fn get_genre(&self, id: i64) -> AppResult<Option<Genre>> {
        Ok(self.inner.read().await.genres.get(&id).cloned())
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        Ok(self.inner.read().await.genres.values().cloned().collect())
    }

    async fn create_director(&self, name: &str) -> AppResult<Director> {
        let mut inner = self.inner.write().await;
        inner.next_director_id += 1;
        let id = inner.next_director_id;
        let director = Director {
            id,
            name: name.to_string(),
        };
        inner.directors.insert(id, director.clone());
        Ok(director)
    }

    async fn list_directors(&self) -> AppResult<Vec<Director>> {
        Ok(self.inner.read().await.directors.values().cloned().collect())
    }

    async fn director_exists(&self, id: i64) -> AppResult<bool> {
        Ok(self.inner.read().await.directors.contains_key(&id))
    }
}

#[async_trait]
impl FriendStorage for MemoryStorage {
    async fn insert_friend(&self, user_id: i64, friend_id: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.friends.insert((user_id, friend_id)) {
            return Err(AppError::Conflict(format!(
                "users {user_id} and {friend_id} are already friends"
            )));
        }
        Ok(())
    }

    async fn delete_friend(&self, user_id: i64, friend_id: i64) -> AppResult<()> {
        self.inner.write().await.friends.remove(&(user_id, friend_id));
        Ok(())
    }

    async fn friend_exists(&self, user_id: i64, friend_id: i64) -> AppResult<bool> {
        Ok(self.inner.read().await.friends.contains(&(user_id, friend_id)))
    }

    async fn friends_of(&self, user_id: i64) -> AppResult<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .friends
            .range((user_id, i64::MIN)..=(user_id, i64::MAX))
            .filter_map(|(_, friend_id)| inner.users.get(friend_id).cloned())
            .collect())
    }

    async fn common_friends(&self, user_id: i64, other_id: i64) -> AppResult<Vec<User>> {
        let inner = self.inner.read().await;
        let mine: BTreeSet<i64> = inner
            .friends
            .range((user_id, i64::MIN)..=(user_id, i64::MAX))
            .map(|(_, friend_id)| *friend_id)
            .collect();
        Ok(inner
            .friends
            .range((other_id, i64::MIN)..=(other_id, i64::MAX))
            .map(|(_, friend_id)| *friend_id)
            .filter(|friend_id| mine.contains(friend_id))
            .filter_map(|friend_id| inner.users.get(&friend_id).cloned())
            .collect())
    }
}

#[async_trait]
impl LikeStorage for MemoryStorage {
    async fn insert_like(&self, film_id: i64, user_id: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.likes.insert((film_id, user_id)) {
            return Err(AppError::Conflict(format!(
                "user {user_id} already likes film {film_id}"
            )));
        }
        Ok(())
    }

    async fn delete_like(&self, film_id: i64, user_id: i64) -> AppResult<()> {
        self.inner.write().await.likes.remove(&(film_id, user_id));
        Ok(())
    }

    async fn like_exists(&self, film_id: i64, user_id: i64) -> AppResult<bool> {
        Ok(self.inner.read().await.likes.contains(&(film_id, user_id)))
    }

    async fn top_films(
        &self,
        genre_id: Option<i64>,
        year: Option<i32>,
        limit: i64,
    ) -> AppResult<Vec<Film>> {
        let inner = self.inner.read().await;
        let liked_film_ids: BTreeSet<i64> = inner.likes.iter().map(|(fid, _)| *fid).collect();
        let scored: Vec<(usize, i64)> = liked_film_ids
            .into_iter()
            .filter_map(|fid| inner.films.get(&fid))
            .filter(|film| match genre_id {
                Some(gid) => film.genres.iter().any(|g| g.id == gid),
                None => true,
            })
            .filter(|film| match year {
                Some(y) => film.release_date.year() == y,
                None => true,
            })
            .map(|film| (inner.distinct_likers(film.id), film.id))
            .collect();
        let mut ranked = Self::rank_films(&inner, scored);
        ranked.truncate(limit as usize);
        Ok(ranked)
    }

    async fn common_liked_films(&self, user_id: i64, other_id: i64) -> AppResult<Vec<Film>> {
        let inner = self.inner.read().await;
        let mine: BTreeSet<i64> = inner
            .likes
            .iter()
            .filter(|(_, uid)| *uid == user_id)
            .map(|(fid, _)| *fid)
            .collect();
        let scored: Vec<(usize, i64)> = inner
            .likes
            .iter()
            .filter(|(fid, uid)| *uid == other_id && mine.contains(fid))
            .map(|(fid, _)| (inner.distinct_likers(*fid), *fid))
            .collect();
        Ok(Self::rank_films(&inner, scored))
    }

    async fn liked_film_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let inner = self.inner.read().await;
        Ok(inner
            .likes
            .iter()
            .filter(|(_, uid)| *uid == user_id)
            .map(|(fid, _)| *fid)
            .collect())
    }

    async fn co_likers(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let inner = self.inner.read().await;
        let mine: BTreeSet<i64> = inner
            .likes
            .iter()
            .filter(|(_, uid)| *uid == user_id)
            .map(|(fid, _)| *fid)
            .collect();
        let peers: BTreeSet<i64> = inner
            .likes
            .iter()
            .filter(|(fid, uid)| *uid != user_id && mine.contains(fid))
            .map(|(_, uid)| *uid)
            .collect();
        Ok(peers.into_iter().collect())
    }

    async fn films_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Film>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.films.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl ReviewStorage for MemoryStorage {
    async fn insert_review(
        &self,
        content: &str,
        is_positive: bool,
        user_id: i64,
        film_id: i64,
    ) -> AppResult<Review> {
        let mut inner = self.inner.write().await;
        inner.next_review_id += 1;
        let id = inner.next_review_id;
        inner.reviews.insert(
            id,
            ReviewRecord {
                content: content.to_string(),
                is_positive,
                user_id,
                film_id,
            },
        );
        Ok(Review {
            review_id: id,
            content: content.to_string(),
            is_positive,
            user_id,
            film_id,
            useful: 0,
        })
    }

    async fn update_review(&self, patch: &ReviewPatch) -> AppResult<Review> {
        let mut inner = self.inner.write().await;
        let record = inner.reviews.get_mut(&patch.review_id).ok_or_else(|| {
            AppError::NotFound(format!("review with id = {} not found", patch.review_id))
        })?;
        if let Some(content) = &patch.content {
            record.content = content.clone();
        }
        if let Some(is_positive) = patch.is_positive {
            record.is_positive = is_positive;
        }
        inner
            .review(patch.review_id)
            .ok_or_else(|| AppError::Internal("review vanished during update".to_string()))
    }

    async fn get_review(&self, id: i64) -> AppResult<Option<Review>> {
        Ok(self.inner.read().await.review(id))
    }

    async fn delete_review(&self, id: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.reviews.remove(&id);
        inner.review_ratings.retain(|(_, rid), _| *rid != id);
        Ok(())
    }

    async fn list_reviews(&self, film_id: Option<i64>, limit: i64) -> AppResult<Vec<Review>> {
        let inner = self.inner.read().await;
        let mut reviews: Vec<Review> = inner
            .reviews
            .keys()
            .filter_map(|id| inner.review(*id))
            .filter(|review| match film_id {
                Some(fid) => review.film_id == fid,
                None => true,
            })
            .collect();
        reviews.sort_by(|a, b| b.useful.cmp(&a.useful).then(a.review_id.cmp(&b.review_id)));
        reviews.truncate(limit as usize);
        Ok(reviews)
    }

    async fn upsert_review_rating(
        &self,
        user_id: i64,
        review_id: i64,
        rating: i32,
    ) -> AppResult<()> {
        self.inner
            .write()
            .await
            .review_ratings
            .insert((user_id, review_id), rating);
        Ok(())
    }

    async fn delete_review_rating(
        &self,
        user_id: i64,
        review_id: i64,
        rating: i32,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.review_ratings.get(&(user_id, review_id)) == Some(&rating) {
            inner.review_ratings.remove(&(user_id, review_id));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStorage for MemoryStorage {
    async fn append_event(
        &self,
        user_id: i64,
        entity_id: i64,
        entity_type: EntityType,
        operation: Operation,
        event_type: EventType,
    ) -> AppResult<Event> {
        let mut inner = self.inner.write().await;
        inner.next_event_id += 1;
        let event = Event {
            event_id: inner.next_event_id,
            timestamp: Utc::now().timestamp_millis(),
            user_id,
            entity_id,
            entity_type,
            operation,
            event_type,
        };
        inner.events.push(event.clone());
        Ok(event)
    }

    async fn events_for_user(&self, user_id: i64) -> AppResult<Vec<Event>> {
        let inner = self.inner.read().await;
        let mut events: Vec<Event> = inner
            .events
            .iter()
            .filter(|event| event.user_id == user_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.event_id.cmp(&a.event_id))
        });
        Ok(events)
    }
}
