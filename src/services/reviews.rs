use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{NewReview, Review, ReviewPatch};
use crate::services::{require_film, require_review, require_user};
use crate::storage::Storage;

/// Reviews with their per-user usefulness votes.
///
/// A vote is an upsert: voting again replaces the previous vote. Clearing a
/// vote requires naming its value, so clearing a dislike can never take out
/// a like.
#[derive(Clone)]
pub struct ReviewService {
    storage: Arc<dyn Storage>,
}

fn check_rating(rating: i32) -> AppResult<()> {
    if rating != 1 && rating != -1 {
        return Err(AppError::InvalidArgument(format!(
            "rating must be +1 or -1, got {rating}"
        )));
    }
    Ok(())
}

impl ReviewService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn create(&self, review: NewReview) -> AppResult<Review> {
        let (content, is_positive, user_id, film_id) = review.validate()?;
        require_user(self.storage.as_ref(), user_id).await?;
        require_film(self.storage.as_ref(), film_id).await?;
        let created = self
            .storage
            .insert_review(&content, is_positive, user_id, film_id)
            .await?;
        info!(review_id = created.review_id, user_id, film_id, "created review");
        Ok(created)
    }

    /// Only content and polarity are mutable; author and film stay as
    /// created
    pub async fn update(&self, patch: ReviewPatch) -> AppResult<Review> {
        patch.validate()?;
        require_review(self.storage.as_ref(), patch.review_id).await?;
        let updated = self.storage.update_review(&patch).await?;
        info!(review_id = updated.review_id, "updated review");
        Ok(updated)
    }

    /// Removes the review and its rating edges; returns the removed review
    /// so the caller can attribute the feed entry
    pub async fn delete(&self, id: i64) -> AppResult<Review> {
        let review = require_review(self.storage.as_ref(), id).await?;
        self.storage.delete_review(id).await?;
        info!(review_id = id, "deleted review");
        Ok(review)
    }

    pub async fn get(&self, id: i64) -> AppResult<Review> {
        require_review(self.storage.as_ref(), id).await
    }

    pub async fn list(&self, film_id: Option<i64>, limit: i64) -> AppResult<Vec<Review>> {
        if limit < 1 {
            return Err(AppError::InvalidArgument(
                "requested review count must be at least 1".to_string(),
            ));
        }
        if let Some(film_id) = film_id {
            require_film(self.storage.as_ref(), film_id).await?;
        }
        self.storage.list_reviews(film_id, limit).await
    }

    pub async fn set_rating(&self, user_id: i64, review_id: i64, rating: i32) -> AppResult<()> {
        check_rating(rating)?;
        require_user(self.storage.as_ref(), user_id).await?;
        require_review(self.storage.as_ref(), review_id).await?;
        self.storage
            .upsert_review_rating(user_id, review_id, rating)
            .await?;
        info!(user_id, review_id, rating, "review rating set");
        Ok(())
    }

    pub async fn clear_rating(&self, user_id: i64, review_id: i64, rating: i32) -> AppResult<()> {
        check_rating(rating)?;
        require_user(self.storage.as_ref(), user_id).await?;
        require_review(self.storage.as_ref(), review_id).await?;
        self.storage
            .delete_review_rating(user_id, review_id, rating)
            .await?;
        info!(user_id, review_id, rating, "review rating cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil;

    struct Fixture {
        reviews: ReviewService,
        author: i64,
        voter: i64,
        film: i64,
    }

    async fn setup() -> Fixture {
        let storage = testutil::storage();
        let author = testutil::seed_user(storage.as_ref(), "author").await;
        let voter = testutil::seed_user(storage.as_ref(), "voter").await;
        let film = testutil::seed_film(storage.as_ref(), "Film").await;
        Fixture {
            reviews: ReviewService::new(storage),
            author,
            voter,
            film,
        }
    }

    fn new_review(fx: &Fixture, content: &str) -> NewReview {
        NewReview {
            content: Some(content.to_string()),
            is_positive: Some(true),
            user_id: Some(fx.author),
            film_id: Some(fx.film),
        }
    }

    #[tokio::test]
    async fn create_starts_at_zero_usefulness() {
        let fx = setup().await;
        let review = fx.reviews.create(new_review(&fx, "Solid")).await.unwrap();
        assert_eq!(review.useful, 0);
        assert_eq!(fx.reviews.get(review.review_id).await.unwrap().useful, 0);
    }

    #[tokio::test]
    async fn create_checks_author_and_film_existence() {
        let fx = setup().await;
        let mut review = new_review(&fx, "Solid");
        review.user_id = Some(99);
        assert!(matches!(
            fx.reviews.create(review).await,
            Err(AppError::NotFound(_))
        ));
        let mut review = new_review(&fx, "Solid");
        review.film_id = Some(99);
        assert!(matches!(
            fx.reviews.create(review).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rating_is_an_upsert_not_an_accumulator() {
        let fx = setup().await;
        let review = fx.reviews.create(new_review(&fx, "Solid")).await.unwrap();
        fx.reviews
            .set_rating(fx.voter, review.review_id, 1)
            .await
            .unwrap();
        assert_eq!(fx.reviews.get(review.review_id).await.unwrap().useful, 1);
        fx.reviews
            .set_rating(fx.voter, review.review_id, -1)
            .await
            .unwrap();
        // one edge with value -1, not 1 + (-1)
        assert_eq!(fx.reviews.get(review.review_id).await.unwrap().useful, -1);
    }

    #[tokio::test]
    async fn clearing_a_mismatched_rating_leaves_the_vote() {
        let fx = setup().await;
        let review = fx.reviews.create(new_review(&fx, "Solid")).await.unwrap();
        fx.reviews
            .set_rating(fx.voter, review.review_id, -1)
            .await
            .unwrap();
        // attempting to clear a like must not remove the stored dislike
        fx.reviews
            .clear_rating(fx.voter, review.review_id, 1)
            .await
            .unwrap();
        assert_eq!(fx.reviews.get(review.review_id).await.unwrap().useful, -1);
        fx.reviews
            .clear_rating(fx.voter, review.review_id, -1)
            .await
            .unwrap();
        assert_eq!(fx.reviews.get(review.review_id).await.unwrap().useful, 0);
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected() {
        let fx = setup().await;
        let review = fx.reviews.create(new_review(&fx, "Solid")).await.unwrap();
        assert!(matches!(
            fx.reviews.set_rating(fx.voter, review.review_id, 2).await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn update_touches_only_content_and_polarity() {
        let fx = setup().await;
        let review = fx.reviews.create(new_review(&fx, "Solid")).await.unwrap();
        let updated = fx
            .reviews
            .update(ReviewPatch {
                review_id: review.review_id,
                content: Some("Changed my mind".to_string()),
                is_positive: Some(false),
            })
            .await
            .unwrap();
        assert_eq!(updated.content, "Changed my mind");
        assert!(!updated.is_positive);
        assert_eq!(updated.user_id, review.user_id);
        assert_eq!(updated.film_id, review.film_id);
    }

    #[tokio::test]
    async fn delete_takes_rating_edges_with_it() {
        let fx = setup().await;
        let review = fx.reviews.create(new_review(&fx, "Solid")).await.unwrap();
        fx.reviews
            .set_rating(fx.voter, review.review_id, 1)
            .await
            .unwrap();
        fx.reviews.delete(review.review_id).await.unwrap();
        assert!(matches!(
            fx.reviews.get(review.review_id).await,
            Err(AppError::NotFound(_))
        ));
        // a new review must not inherit stale votes
        let fresh = fx.reviews.create(new_review(&fx, "Again")).await.unwrap();
        assert_eq!(fresh.useful, 0);
    }

    #[tokio::test]
    async fn list_orders_by_usefulness_then_id() {
        let fx = setup().await;
        let first = fx.reviews.create(new_review(&fx, "First")).await.unwrap();
        let second = fx.reviews.create(new_review(&fx, "Second")).await.unwrap();
        let third = fx.reviews.create(new_review(&fx, "Third")).await.unwrap();
        fx.reviews
            .set_rating(fx.voter, second.review_id, 1)
            .await
            .unwrap();
        fx.reviews
            .set_rating(fx.author, third.review_id, -1)
            .await
            .unwrap();
        let listed = fx.reviews.list(Some(fx.film), 10).await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|r| r.review_id).collect();
        assert_eq!(ids, vec![second.review_id, first.review_id, third.review_id]);

        let limited = fx.reviews.list(Some(fx.film), 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn list_for_unknown_film_is_not_found() {
        let fx = setup().await;
        assert!(matches!(
            fx.reviews.list(Some(99), 10).await,
            Err(AppError::NotFound(_))
        ));
    }
}
