use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::Film;
use crate::services::{require_film, require_user};
use crate::storage::Storage;

/// The like ledger: (film, user) endorsement edges and the queries ranked
/// over them.
///
/// Unlike friendship deletion, removing a like that is not there is an
/// error; the asymmetry is part of the contract.
#[derive(Clone)]
pub struct LikeService {
    storage: Arc<dyn Storage>,
}

impl LikeService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn check_pair(&self, film_id: i64, user_id: i64) -> AppResult<()> {
        require_film(self.storage.as_ref(), film_id).await?;
        require_user(self.storage.as_ref(), user_id).await?;
        Ok(())
    }

    pub async fn like(&self, film_id: i64, user_id: i64) -> AppResult<()> {
        self.check_pair(film_id, user_id).await?;
        if self.storage.like_exists(film_id, user_id).await? {
            return Err(AppError::Conflict(format!(
                "user {user_id} already likes film {film_id}"
            )));
        }
        self.storage.insert_like(film_id, user_id).await?;
        info!(film_id, user_id, "like added");
        Ok(())
    }

    pub async fn remove_like(&self, film_id: i64, user_id: i64) -> AppResult<()> {
        self.check_pair(film_id, user_id).await?;
        if !self.storage.like_exists(film_id, user_id).await? {
            return Err(AppError::Conflict(format!(
                "user {user_id} has no like on film {film_id} to remove"
            )));
        }
        self.storage.delete_like(film_id, user_id).await?;
        info!(film_id, user_id, "like removed");
        Ok(())
    }

    /// Films ranked by distinct-liker count descending, ties by film id
    /// ascending; optional genre and release-year filters
    pub async fn top_films(
        &self,
        genre_id: Option<i64>,
        year: Option<i32>,
        limit: i64,
    ) -> AppResult<Vec<Film>> {
        if limit < 1 {
            return Err(AppError::InvalidArgument(
                "requested film count must be at least 1".to_string(),
            ));
        }
        self.storage.top_films(genre_id, year, limit).await
    }

    /// Films both users liked, ranked by total like count descending
    pub async fn common_popular_films(&self, user_id: i64, other_id: i64) -> AppResult<Vec<Film>> {
        require_user(self.storage.as_ref(), user_id).await?;
        require_user(self.storage.as_ref(), other_id).await?;
        self.storage.common_liked_films(user_id, other_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil;

    struct Fixture {
        likes: LikeService,
        users: Vec<i64>,
        films: Vec<i64>,
    }

    async fn setup(user_count: usize, film_count: usize) -> Fixture {
        let storage = testutil::storage();
        let mut users = Vec::new();
        for i in 0..user_count {
            users.push(testutil::seed_user(storage.as_ref(), &format!("user{i}")).await);
        }
        let mut films = Vec::new();
        for i in 0..film_count {
            films.push(testutil::seed_film(storage.as_ref(), &format!("Film {i}")).await);
        }
        Fixture {
            likes: LikeService::new(storage),
            users,
            films,
        }
    }

    #[tokio::test]
    async fn double_like_is_a_conflict() {
        let fx = setup(1, 1).await;
        fx.likes.like(fx.films[0], fx.users[0]).await.unwrap();
        assert!(matches!(
            fx.likes.like(fx.films[0], fx.users[0]).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn removing_an_absent_like_is_rejected() {
        let fx = setup(1, 1).await;
        assert!(matches!(
            fx.likes.remove_like(fx.films[0], fx.users[0]).await,
            Err(AppError::Conflict(_))
        ));
        fx.likes.like(fx.films[0], fx.users[0]).await.unwrap();
        fx.likes.remove_like(fx.films[0], fx.users[0]).await.unwrap();
        assert!(fx.likes.remove_like(fx.films[0], fx.users[0]).await.is_err());
    }

    #[tokio::test]
    async fn like_requires_existing_film_and_user() {
        let fx = setup(1, 1).await;
        assert!(matches!(
            fx.likes.like(99, fx.users[0]).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fx.likes.like(fx.films[0], 99).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn top_films_ranks_by_distinct_likers_with_id_tiebreak() {
        let fx = setup(3, 3).await;
        // film[1] gets two likes, film[0] and film[2] one each
        fx.likes.like(fx.films[1], fx.users[0]).await.unwrap();
        fx.likes.like(fx.films[1], fx.users[1]).await.unwrap();
        fx.likes.like(fx.films[2], fx.users[0]).await.unwrap();
        fx.likes.like(fx.films[0], fx.users[2]).await.unwrap();

        let top = fx.likes.top_films(None, None, 5).await.unwrap();
        let ids: Vec<i64> = top.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![fx.films[1], fx.films[0], fx.films[2]]);

        let top2 = fx.likes.top_films(None, None, 2).await.unwrap();
        assert_eq!(top2.len(), 2);
    }

    #[tokio::test]
    async fn top_films_filters_by_genre_and_year() {
        let storage = testutil::storage();
        let user = testutil::seed_user(storage.as_ref(), "u").await;
        let comedy_old =
            testutil::seed_film_with(storage.as_ref(), "Comedy Old", vec![1], 1990).await;
        let drama_new =
            testutil::seed_film_with(storage.as_ref(), "Drama New", vec![2], 2020).await;
        let likes = LikeService::new(Arc::clone(&storage));
        likes.like(comedy_old, user).await.unwrap();
        likes.like(drama_new, user).await.unwrap();

        let comedies = likes.top_films(Some(1), None, 10).await.unwrap();
        assert_eq!(comedies.iter().map(|f| f.id).collect::<Vec<_>>(), vec![comedy_old]);

        let from_2020 = likes.top_films(None, Some(2020), 10).await.unwrap();
        assert_eq!(from_2020.iter().map(|f| f.id).collect::<Vec<_>>(), vec![drama_new]);

        let both = likes.top_films(Some(2), Some(1990), 10).await.unwrap();
        assert!(both.is_empty());
    }

    #[tokio::test]
    async fn top_films_rejects_non_positive_limit() {
        let fx = setup(0, 0).await;
        assert!(matches!(
            fx.likes.top_films(None, None, 0).await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn common_popular_films_ranks_by_total_likes() {
        let fx = setup(3, 3).await;
        let (a, b, c) = (fx.users[0], fx.users[1], fx.users[2]);
        // both a and b like films 0 and 1; film 1 is liked by c as well
        fx.likes.like(fx.films[0], a).await.unwrap();
        fx.likes.like(fx.films[0], b).await.unwrap();
        fx.likes.like(fx.films[1], a).await.unwrap();
        fx.likes.like(fx.films[1], b).await.unwrap();
        fx.likes.like(fx.films[1], c).await.unwrap();
        // film 2 only a likes; must not appear
        fx.likes.like(fx.films[2], a).await.unwrap();

        let common = fx.likes.common_popular_films(a, b).await.unwrap();
        let ids: Vec<i64> = common.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![fx.films[1], fx.films[0]]);
    }
}
