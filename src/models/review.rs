use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// A text review of a film
///
/// `useful` is never stored directly: it is the sum of the +1/-1 votes cast
/// on the review, computed at read time, 0 when nobody has voted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub review_id: i64,
    pub content: String,
    pub is_positive: bool,
    /// Author; immutable after creation
    pub user_id: i64,
    /// Reviewed film; immutable after creation
    pub film_id: i64,
    pub useful: i64,
}

/// Fields for review creation
///
/// Everything is optional at the wire level so that a missing field can be
/// rejected as `InvalidArgument` rather than a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub content: Option<String>,
    pub is_positive: Option<bool>,
    pub user_id: Option<i64>,
    pub film_id: Option<i64>,
}

/// Partial update; only content and polarity are mutable
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPatch {
    pub review_id: i64,
    pub content: Option<String>,
    pub is_positive: Option<bool>,
}

impl NewReview {
    /// Checks field presence and shape; existence of author and film is the
    /// caller's concern.
    pub fn validate(&self) -> AppResult<(String, bool, i64, i64)> {
        let content = match &self.content {
            Some(content) if !content.trim().is_empty() => content.clone(),
            _ => {
                return Err(AppError::InvalidArgument(
                    "review content must not be blank".to_string(),
                ))
            }
        };
        let is_positive = self.is_positive.ok_or_else(|| {
            AppError::InvalidArgument("review polarity (isPositive) is required".to_string())
        })?;
        let user_id = self
            .user_id
            .ok_or_else(|| AppError::InvalidArgument("review author id is required".to_string()))?;
        let film_id = self
            .film_id
            .ok_or_else(|| AppError::InvalidArgument("review film id is required".to_string()))?;
        Ok((content, is_positive, user_id, film_id))
    }
}

impl ReviewPatch {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(content) = &self.content {
            if content.trim().is_empty() {
                return Err(AppError::InvalidArgument(
                    "review content must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_review() -> NewReview {
        NewReview {
            content: Some("Worth a watch".to_string()),
            is_positive: Some(true),
            user_id: Some(1),
            film_id: Some(2),
        }
    }

    #[test]
    fn complete_review_passes() {
        let (content, is_positive, user_id, film_id) = new_review().validate().unwrap();
        assert_eq!(content, "Worth a watch");
        assert!(is_positive);
        assert_eq!((user_id, film_id), (1, 2));
    }

    #[test]
    fn blank_content_is_rejected() {
        let mut review = new_review();
        review.content = Some("  ".to_string());
        assert!(review.validate().is_err());
        review.content = None;
        assert!(review.validate().is_err());
    }

    #[test]
    fn missing_polarity_is_rejected() {
        let mut review = new_review();
        review.is_positive = None;
        assert!(matches!(
            review.validate(),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_ids_are_rejected() {
        let mut review = new_review();
        review.user_id = None;
        assert!(review.validate().is_err());

        let mut review = new_review();
        review.film_id = None;
        assert!(review.validate().is_err());
    }
}
