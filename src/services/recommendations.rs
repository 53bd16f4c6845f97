use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::AppResult;
use crate::models::Film;
use crate::services::require_user;
use crate::storage::Storage;

/// Recommends films from the single most similar peer.
///
/// Similarity is the count of films both users liked. This deliberately
/// ignores everyone but the top peer; it is a one-pass heuristic, not
/// collaborative filtering.
#[derive(Clone)]
pub struct RecommendationService {
    storage: Arc<dyn Storage>,
}

impl RecommendationService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Films the most similar peer liked that `user_id` has not, ordered by
    /// film id. Empty when nobody shares a like with the user.
    pub async fn recommend(&self, user_id: i64) -> AppResult<Vec<Film>> {
        require_user(self.storage.as_ref(), user_id).await?;

        let mine: HashSet<i64> = self
            .storage
            .liked_film_ids(user_id)
            .await?
            .into_iter()
            .collect();

        // Candidates arrive in ascending user-id order; keeping only a
        // strictly larger overlap makes the lowest id win ties.
        let mut best_peer: Option<i64> = None;
        let mut best_overlap = 0usize;
        for peer in self.storage.co_likers(user_id).await? {
            let theirs = self.storage.liked_film_ids(peer).await?;
            let overlap = theirs.iter().filter(|id| mine.contains(id)).count();
            if overlap > best_overlap {
                best_overlap = overlap;
                best_peer = Some(peer);
            }
        }

        let Some(peer) = best_peer else {
            return Ok(Vec::new());
        };
        debug!(user_id, peer, best_overlap, "picked recommendation peer");

        let mut suggested: Vec<i64> = self
            .storage
            .liked_film_ids(peer)
            .await?
            .into_iter()
            .filter(|id| !mine.contains(id))
            .collect();
        suggested.sort_unstable();
        self.storage.films_by_ids(&suggested).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::testutil;
    use crate::storage::{LikeStorage, Storage};

    async fn setup(user_count: usize, film_count: usize) -> (RecommendationService, Arc<dyn Storage>, Vec<i64>, Vec<i64>) {
        let storage = testutil::storage();
        let mut users = Vec::new();
        for i in 0..user_count {
            users.push(testutil::seed_user(storage.as_ref(), &format!("user{i}")).await);
        }
        let mut films = Vec::new();
        for i in 0..film_count {
            films.push(testutil::seed_film(storage.as_ref(), &format!("Film {i}")).await);
        }
        (
            RecommendationService::new(Arc::clone(&storage)),
            storage,
            users,
            films,
        )
    }

    #[tokio::test]
    async fn recommends_what_the_peer_liked_and_the_user_did_not() {
        let (recs, storage, users, films) = setup(2, 3).await;
        let (a, b) = (users[0], users[1]);
        let (f, g, h) = (films[0], films[1], films[2]);
        // A and B both like F; A also likes G; B likes H
        storage.insert_like(f, a).await.unwrap();
        storage.insert_like(f, b).await.unwrap();
        storage.insert_like(g, a).await.unwrap();
        storage.insert_like(h, b).await.unwrap();

        let suggested = recs.recommend(a).await.unwrap();
        let ids: Vec<i64> = suggested.iter().map(|film| film.id).collect();
        assert_eq!(ids, vec![h]);
    }

    #[tokio::test]
    async fn no_shared_likes_means_empty_not_error() {
        let (recs, storage, users, films) = setup(2, 2).await;
        storage.insert_like(films[0], users[0]).await.unwrap();
        storage.insert_like(films[1], users[1]).await.unwrap();
        assert!(recs.recommend(users[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_with_no_likes_gets_nothing() {
        let (recs, storage, users, films) = setup(2, 1).await;
        storage.insert_like(films[0], users[1]).await.unwrap();
        assert!(recs.recommend(users[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn the_most_overlapping_peer_wins() {
        let (recs, storage, users, films) = setup(3, 4).await;
        let (a, b, c) = (users[0], users[1], users[2]);
        // b shares one like with a, c shares two
        storage.insert_like(films[0], a).await.unwrap();
        storage.insert_like(films[1], a).await.unwrap();
        storage.insert_like(films[0], b).await.unwrap();
        storage.insert_like(films[2], b).await.unwrap();
        storage.insert_like(films[0], c).await.unwrap();
        storage.insert_like(films[1], c).await.unwrap();
        storage.insert_like(films[3], c).await.unwrap();

        let suggested = recs.recommend(a).await.unwrap();
        let ids: Vec<i64> = suggested.iter().map(|film| film.id).collect();
        assert_eq!(ids, vec![films[3]]);
    }

    #[tokio::test]
    async fn overlap_tie_goes_to_the_lowest_user_id() {
        let (recs, storage, users, films) = setup(3, 3).await;
        let (a, b, c) = (users[0], users[1], users[2]);
        // b and c each share exactly one like with a
        storage.insert_like(films[0], a).await.unwrap();
        storage.insert_like(films[0], b).await.unwrap();
        storage.insert_like(films[1], b).await.unwrap();
        storage.insert_like(films[0], c).await.unwrap();
        storage.insert_like(films[2], c).await.unwrap();

        let suggested = recs.recommend(a).await.unwrap();
        let ids: Vec<i64> = suggested.iter().map(|film| film.id).collect();
        assert_eq!(ids, vec![films[1]], "peer with the lower id should win the tie");
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (recs, _, _, _) = setup(0, 0).await;
        assert!(matches!(
            recs.recommend(42).await,
            Err(AppError::NotFound(_))
        ));
    }
}
