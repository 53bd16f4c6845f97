//! Postgres backing store.
//!
//! Plain `sqlx` queries over the schema in `migrations/`. The pair primary
//! keys on the edge tables are the concurrency guard: a racing duplicate
//! insert fails on the constraint and surfaces as `Conflict` instead of
//! silently losing an update.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{
    Director, EntityType, Event, EventType, Film, FilmPatch, Genre, Mpa, NewFilm, NewUser,
    Operation, Review, ReviewPatch, User, UserPatch,
};
use crate::storage::{EventStorage, FriendStorage, IdentityStorage, LikeStorage, ReviewStorage};

/// `sqlx`-backed [`crate::storage::Storage`] implementation
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unique_violation_as_conflict(err: sqlx::Error, message: String) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message),
        _ => AppError::Database(err),
    }
}

#[derive(sqlx::FromRow)]
struct FilmRow {
    id: i64,
    name: String,
    description: String,
    release: NaiveDate,
    duration: i32,
    mpa_id: i64,
    mpa_name: String,
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: i64,
    timestamp: i64,
    user_id: i64,
    entity_id: i64,
    entity_type: String,
    operation: String,
    event_type: String,
}

impl TryFrom<EventRow> for Event {
    type Error = AppError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        // The lookup tables are seeded alongside the enums; a name that no
        // longer parses means the store and the code have diverged.
        let bad_row = |e: AppError| AppError::Internal(format!("corrupt event row: {e}"));
        Ok(Event {
            event_id: row.event_id,
            timestamp: row.timestamp,
            user_id: row.user_id,
            entity_id: row.entity_id,
            entity_type: row.entity_type.parse().map_err(bad_row)?,
            operation: row.operation.parse().map_err(bad_row)?,
            event_type: row.event_type.parse().map_err(bad_row)?,
        })
    }
}

const FILM_SELECT: &str = "SELECT f.id, f.name, f.description, f.release, f.duration, \
     m.id AS mpa_id, m.name AS mpa_name \
     FROM films f JOIN mpa m ON m.id = f.rating_id";

impl PgStorage {
    async fn film_genres(&self, film_id: i64) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(
            "SELECT g.id, g.name FROM genres g \
             JOIN film_genres fg ON fg.genre_id = g.id \
             WHERE fg.film_id = $1 ORDER BY g.id",
        )
        .bind(film_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    async fn film_directors(&self, film_id: i64) -> AppResult<Vec<Director>> {
        let directors = sqlx::query_as::<_, Director>(
            "SELECT d.id, d.name FROM directors d \
             JOIN film_directors fd ON fd.director_id = d.id \
             WHERE fd.film_id = $1 ORDER BY d.id",
        )
        .bind(film_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(directors)
    }

    async fn hydrate_film(&self, row: FilmRow) -> AppResult<Film> {
        let genres = self.film_genres(row.id).await?;
        let directors = self.film_directors(row.id).await?;
        Ok(Film {
            id: row.id,
            name: row.name,
            description: row.description,
            release_date: row.release,
            duration: row.duration,
            mpa: Mpa {
                id: row.mpa_id,
                name: row.mpa_name,
            },
            genres,
            directors,
        })
    }

    async fn hydrate_films(&self, rows: Vec<FilmRow>) -> AppResult<Vec<Film>> {
        let mut films = Vec::with_capacity(rows.len());
        for row in rows {
            films.push(self.hydrate_film(row).await?);
        }
        Ok(films)
    }

    async fn films_for_ids(&self, ids: &[i64]) -> AppResult<Vec<Film>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, FilmRow>(&format!("{FILM_SELECT} WHERE f.id = ANY($1)"))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        let mut films = self.hydrate_films(rows).await?;
        // ANY() does not preserve the requested order
        films.sort_by_key(|film| ids.iter().position(|id| *id == film.id));
        Ok(films)
    }
}

#[async_trait]
impl IdentityStorage for PgStorage {
    async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, login, name, birthday) VALUES ($1, $2, $3, $4) \
             RETURNING id, email, login, name, birthday",
        )
        .bind(&user.email)
        .bind(&user.login)
        .bind(user.display_name())
        .bind(user.birthday)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            unique_violation_as_conflict(e, format!("email '{}' is already in use", user.email))
        })?;
        Ok(created)
    }

    async fn update_user(&self, patch: &UserPatch) -> AppResult<User> {
        // A blank display name keeps the stored one
        let name = patch
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty());
        let updated = sqlx::query_as::<_, User>(
            "UPDATE users SET email = COALESCE($2, email), login = COALESCE($3, login), \
             name = COALESCE($4, name), birthday = COALESCE($5, birthday) \
             WHERE id = $1 RETURNING id, email, login, name, birthday",
        )
        .bind(patch.id)
        .bind(&patch.email)
        .bind(&patch.login)
        .bind(name)
        .bind(patch.birthday)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            // a racing insert can take the email between the service's
            // pre-check and this statement
            let email = patch.email.as_deref().unwrap_or_default();
            unique_violation_as_conflict(e, format!("email '{email}' is already in use"))
        })?
        .ok_or_else(|| AppError::NotFound(format!("user with id = {} not found", patch.id)))?;
        Ok(updated)
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, login, name, birthday FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, login, name, birthday FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn email_in_use(&self, email: &str, exclude_user: Option<i64>) -> AppResult<bool> {
        let in_use = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 \
             AND ($2::bigint IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude_user)
        .fetch_one(&self.pool)
        .await?;
        Ok(in_use)
    }

    async fn create_film(&self, film: &NewFilm) -> AppResult<Film> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO films (name, description, release, duration, rating_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&film.name)
        .bind(&film.description)
        .bind(film.release_date)
        .bind(film.duration)
        .bind(film.mpa_id)
        .fetch_one(&mut *tx)
        .await?;
        for genre_id in &film.genre_ids {
            sqlx::query(
                "INSERT INTO film_genres (film_id, genre_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(genre_id)
            .execute(&mut *tx)
            .await?;
        }
        for director_id in &film.director_ids {
            sqlx::query(
                "INSERT INTO film_directors (film_id, director_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(director_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        self.get_film(id)
            .await?
            .ok_or_else(|| AppError::Internal("film vanished after insert".to_string()))
    }

    async fn update_film(&self, patch: &FilmPatch) -> AppResult<Film> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_scalar::<_, i64>(
            "UPDATE films SET name = COALESCE($2, name), \
             description = COALESCE($3, description), \
             release = COALESCE($4, release), \
             duration = COALESCE($5, duration), \
             rating_id = COALESCE($6, rating_id) \
             WHERE id = $1 RETURNING id",
        )
        .bind(patch.id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(patch.release_date)
        .bind(patch.duration)
        .bind(patch.mpa_id)
        .fetch_optional(&mut *tx)
        .await?;
        if updated.is_none() {
            return Err(AppError::NotFound(format!(
                "film with id = {} not found",
                patch.id
            )));
        }
        if let Some(genre_ids) = &patch.genre_ids {
            sqlx::query("DELETE FROM film_genres WHERE film_id = $1")
                .bind(patch.id)
                .execute(&mut *tx)
                .await?;
            for genre_id in genre_ids {
                sqlx::query(
                    "INSERT INTO film_genres (film_id, genre_id) VALUES ($1, $2) \
                     ON CONFLICT DO NOTHING",
                )
                .bind(patch.id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
            }
        }
        if let Some(director_ids) = &patch.director_ids {
            sqlx::query("DELETE FROM film_directors WHERE film_id = $1")
                .bind(patch.id)
                .execute(&mut *tx)
                .await?;
            for director_id in director_ids {
                sqlx::query(
                    "INSERT INTO film_directors (film_id, director_id) VALUES ($1, $2) \
                     ON CONFLICT DO NOTHING",
                )
                .bind(patch.id)
                .bind(director_id)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        self.get_film(patch.id)
            .await?
            .ok_or_else(|| AppError::Internal("film vanished after update".to_string()))
    }

    async fn get_film(&self, id: i64) -> AppResult<Option<Film>> {
        let row = sqlx::query_as::<_, FilmRow>(&format!("{FILM_SELECT} WHERE f.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_film(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_films(&self) -> AppResult<Vec<Film>> {
        let rows = sqlx::query_as::<_, FilmRow>(&format!("{FILM_SELECT} ORDER BY f.id"))
            .fetch_all(&self.pool)
            .await?;
        self.hydrate_films(rows).await
    }

    async fn get_mpa(&self, id: i64) -> AppResult<Option<Mpa>> {
        let mpa = sqlx::query_as::<_, Mpa>("SELECT id, name FROM mpa WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(mpa)
    }

    async fn list_mpa(&self) -> AppResult<Vec<Mpa>> {
        let mpa = sqlx::query_as::<_, Mpa>("SELECT id, name FROM mpa ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(mpa)
    }

    async fn get_genre(&self, id: i64) -> AppResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(genre)
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(genres)
    }

    async fn create_director(&self, name: &str) -> AppResult<Director> {
        let director = sqlx::query_as::<_, Director>(
            "INSERT INTO directors (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(director)
    }

    async fn list_directors(&self) -> AppResult<Vec<Director>> {
        let directors = sqlx::query_as::<_, Director>("SELECT id, name FROM directors ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(directors)
    }

    async fn director_exists(&self, id: i64) -> AppResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM directors WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl FriendStorage for PgStorage {
    async fn insert_friend(&self, user_id: i64, friend_id: i64) -> AppResult<()> {
        sqlx::query("INSERT INTO friends (user_id, friend_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(friend_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                unique_violation_as_conflict(
                    e,
                    format!("users {user_id} and {friend_id} are already friends"),
                )
            })?;
        Ok(())
    }

    async fn delete_friend(&self, user_id: i64, friend_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM friends WHERE user_id = $1 AND friend_id = $2")
            .bind(user_id)
            .bind(friend_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn friend_exists(&self, user_id: i64, friend_id: i64) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM friends WHERE user_id = $1 AND friend_id = $2)",
        )
        .bind(user_id)
        .bind(friend_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn friends_of(&self, user_id: i64) -> AppResult<Vec<User>> {
        let friends = sqlx::query_as::<_, User>(
            "SELECT u.id, u.email, u.login, u.name, u.birthday \
             FROM users u JOIN friends f ON f.friend_id = u.id \
             WHERE f.user_id = $1 ORDER BY u.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(friends)
    }

    async fn common_friends(&self, user_id: i64, other_id: i64) -> AppResult<Vec<User>> {
        let friends = sqlx::query_as::<_, User>(
            "SELECT u.id, u.email, u.login, u.name, u.birthday \
             FROM users u \
             JOIN friends f1 ON f1.friend_id = u.id \
             JOIN friends f2 ON f2.friend_id = u.id \
             WHERE f1.user_id = $1 AND f2.user_id = $2 ORDER BY u.id",
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(friends)
    }
}

#[async_trait]
impl LikeStorage for PgStorage {
    async fn insert_like(&self, film_id: i64, user_id: i64) -> AppResult<()> {
        sqlx::query("INSERT INTO likes (film_id, user_id) VALUES ($1, $2)")
            .bind(film_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                unique_violation_as_conflict(
                    e,
                    format!("user {user_id} already likes film {film_id}"),
                )
            })?;
        Ok(())
    }

    async fn delete_like(&self, film_id: i64, user_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM likes WHERE film_id = $1 AND user_id = $2")
            .bind(film_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn like_exists(&self, film_id: i64, user_id: i64) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE film_id = $1 AND user_id = $2)",
        )
        .bind(film_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn top_films(
        &self,
        genre_id: Option<i64>,
        year: Option<i32>,
        limit: i64,
    ) -> AppResult<Vec<Film>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT f.id FROM films f JOIN likes l ON l.film_id = f.id \
             WHERE ($1::bigint IS NULL OR EXISTS (SELECT 1 FROM film_genres fg \
                    WHERE fg.film_id = f.id AND fg.genre_id = $1)) \
               AND ($2::int IS NULL OR date_part('year', f.release)::int = $2) \
             GROUP BY f.id \
             ORDER BY COUNT(DISTINCT l.user_id) DESC, f.id \
             LIMIT $3",
        )
        .bind(genre_id)
        .bind(year)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        self.films_for_ids(&ids).await
    }

    async fn common_liked_films(&self, user_id: i64, other_id: i64) -> AppResult<Vec<Film>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT film_id FROM likes GROUP BY film_id \
             HAVING bool_or(user_id = $1) AND bool_or(user_id = $2) \
             ORDER BY COUNT(*) DESC, film_id",
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_all(&self.pool)
        .await?;
        self.films_for_ids(&ids).await
    }

    async fn liked_film_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT film_id FROM likes WHERE user_id = $1 ORDER BY film_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn co_likers(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT l2.user_id FROM likes l1 \
             JOIN likes l2 ON l2.film_id = l1.film_id AND l2.user_id <> $1 \
             WHERE l1.user_id = $1 ORDER BY l2.user_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn films_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Film>> {
        self.films_for_ids(ids).await
    }
}

const REVIEW_SELECT: &str =
    "SELECT r.id AS review_id, r.content, r.is_positive, r.user_id, r.film_id, \
     COALESCE(SUM(rl.rating), 0)::bigint AS useful \
     FROM reviews r LEFT JOIN review_likes rl ON rl.review_id = r.id";

#[async_trait]
impl ReviewStorage for PgStorage {
    async fn insert_review(
        &self,
        content: &str,
        is_positive: bool,
        user_id: i64,
        film_id: i64,
    ) -> AppResult<Review> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO reviews (content, user_id, film_id, is_positive) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(content)
        .bind(user_id)
        .bind(film_id)
        .bind(is_positive)
        .fetch_one(&self.pool)
        .await?;
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
        sqlx::query(
            "UPDATE reviews SET content = COALESCE($2, content), \
             is_positive = COALESCE($3, is_positive) WHERE id = $1",
        )
        .bind(patch.review_id)
        .bind(&patch.content)
        .bind(patch.is_positive)
        .execute(&self.pool)
        .await?;
        self.get_review(patch.review_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("review with id = {} not found", patch.review_id))
        })
    }

    async fn get_review(&self, id: i64) -> AppResult<Option<Review>> {
        let review =
            sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE r.id = $1 GROUP BY r.id"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(review)
    }

    async fn delete_review(&self, id: i64) -> AppResult<()> {
        // review_likes rows go with it via ON DELETE CASCADE, one statement,
        // one transaction
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_reviews(&self, film_id: Option<i64>, limit: i64) -> AppResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE ($1::bigint IS NULL OR r.film_id = $1) \
             GROUP BY r.id ORDER BY useful DESC, r.id LIMIT $2"
        ))
        .bind(film_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn upsert_review_rating(
        &self,
        user_id: i64,
        review_id: i64,
        rating: i32,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO review_likes (user_id, review_id, rating) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, review_id) DO UPDATE SET rating = EXCLUDED.rating",
        )
        .bind(user_id)
        .bind(review_id)
        .bind(rating)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_review_rating(
        &self,
        user_id: i64,
        review_id: i64,
        rating: i32,
    ) -> AppResult<()> {
        sqlx::query(
            "DELETE FROM review_likes WHERE user_id = $1 AND review_id = $2 AND rating = $3",
        )
        .bind(user_id)
        .bind(review_id)
        .bind(rating)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EventStorage for PgStorage {
    async fn append_event(
        &self,
        user_id: i64,
        entity_id: i64,
        entity_type: EntityType,
        operation: Operation,
        event_type: EventType,
    ) -> AppResult<Event> {
        let timestamp = Utc::now().timestamp_millis();
        let event_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events (user_id, entity_id, entity_type_id, operation_id, \
             event_type_id, datetime) \
             VALUES ($1, $2, \
             (SELECT id FROM entity_types WHERE name = $3), \
             (SELECT id FROM operations WHERE name = $4), \
             (SELECT id FROM event_types WHERE name = $5), $6) \
             RETURNING id",
        )
        .bind(user_id)
        .bind(entity_id)
        .bind(entity_type.to_string())
        .bind(operation.to_string())
        .bind(event_type.to_string())
        .bind(timestamp)
        .fetch_one(&self.pool)
        .await?;
        Ok(Event {
            event_id,
            timestamp,
            user_id,
            entity_id,
            entity_type,
            operation,
            event_type,
        })
    }

    async fn events_for_user(&self, user_id: i64) -> AppResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT e.id AS event_id, e.datetime AS timestamp, e.user_id, e.entity_id, \
             et.name AS entity_type, o.name AS operation, evt.name AS event_type \
             FROM events e \
             JOIN entity_types et ON et.id = e.entity_type_id \
             JOIN operations o ON o.id = e.operation_id \
             JOIN event_types evt ON evt.id = e.event_type_id \
             WHERE e.user_id = $1 ORDER BY e.datetime DESC, e.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Event::try_from).collect()
    }
}
