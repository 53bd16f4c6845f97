use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::services::require_user;
use crate::storage::Storage;

/// Friendship graph over directed (user, friend) edges.
///
/// One `add_friend` call inserts exactly one directed edge; A following B
/// does not make B follow A. Duplicate adds are rejected, while deleting an
/// edge that is not there succeeds — the two behaviors are deliberately
/// asymmetric.
#[derive(Clone)]
pub struct FriendshipService {
    storage: Arc<dyn Storage>,
}

impl FriendshipService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn check_pair(&self, user_id: i64, friend_id: i64, verb: &str) -> AppResult<()> {
        if user_id == friend_id {
            return Err(AppError::InvalidArgument(format!(
                "cannot {verb} yourself"
            )));
        }
        require_user(self.storage.as_ref(), user_id).await?;
        require_user(self.storage.as_ref(), friend_id).await?;
        Ok(())
    }

    pub async fn add_friend(&self, user_id: i64, friend_id: i64) -> AppResult<()> {
        self.check_pair(user_id, friend_id, "befriend").await?;
        if self.storage.friend_exists(user_id, friend_id).await? {
            return Err(AppError::Conflict(format!(
                "users {user_id} and {friend_id} are already friends"
            )));
        }
        self.storage.insert_friend(user_id, friend_id).await?;
        info!(user_id, friend_id, "friendship added");
        Ok(())
    }

    pub async fn delete_friend(&self, user_id: i64, friend_id: i64) -> AppResult<()> {
        self.check_pair(user_id, friend_id, "unfriend").await?;
        self.storage.delete_friend(user_id, friend_id).await?;
        info!(user_id, friend_id, "friendship removed");
        Ok(())
    }

    pub async fn friends(&self, user_id: i64) -> AppResult<Vec<User>> {
        require_user(self.storage.as_ref(), user_id).await?;
        self.storage.friends_of(user_id).await
    }

    pub async fn common_friends(&self, user_id: i64, other_id: i64) -> AppResult<Vec<User>> {
        require_user(self.storage.as_ref(), user_id).await?;
        require_user(self.storage.as_ref(), other_id).await?;
        self.storage.common_friends(user_id, other_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil;
    use crate::storage::Storage;

    async fn setup() -> (FriendshipService, Arc<dyn Storage>, i64, i64, i64) {
        let storage = testutil::storage();
        let a = testutil::seed_user(storage.as_ref(), "a").await;
        let b = testutil::seed_user(storage.as_ref(), "b").await;
        let c = testutil::seed_user(storage.as_ref(), "c").await;
        (
            FriendshipService::new(Arc::clone(&storage)),
            storage,
            a,
            b,
            c,
        )
    }

    #[tokio::test]
    async fn self_friendship_is_invalid() {
        let (friendships, _, a, _, _) = setup().await;
        let err = friendships.add_friend(a, a).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (friendships, _, a, _, _) = setup().await;
        assert!(matches!(
            friendships.add_friend(a, 99).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            friendships.add_friend(99, a).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_add_conflicts_but_delete_is_idempotent() {
        let (friendships, _, a, b, _) = setup().await;
        friendships.add_friend(a, b).await.unwrap();
        assert!(matches!(
            friendships.add_friend(a, b).await,
            Err(AppError::Conflict(_))
        ));
        friendships.delete_friend(a, b).await.unwrap();
        // second delete of the same edge also succeeds
        friendships.delete_friend(a, b).await.unwrap();
    }

    #[tokio::test]
    async fn edges_are_directional() {
        let (friendships, _, a, b, _) = setup().await;
        friendships.add_friend(a, b).await.unwrap();
        let of_a: Vec<i64> = friendships.friends(a).await.unwrap().iter().map(|u| u.id).collect();
        let of_b = friendships.friends(b).await.unwrap();
        assert_eq!(of_a, vec![b]);
        assert!(of_b.is_empty());
    }

    #[tokio::test]
    async fn friends_are_ordered_by_id() {
        let (friendships, _, a, b, c) = setup().await;
        friendships.add_friend(a, c).await.unwrap();
        friendships.add_friend(a, b).await.unwrap();
        let ids: Vec<i64> = friendships.friends(a).await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![b, c]);
    }

    #[tokio::test]
    async fn common_friends_is_symmetric() {
        let (friendships, _, a, b, c) = setup().await;
        friendships.add_friend(a, c).await.unwrap();
        friendships.add_friend(b, c).await.unwrap();
        let ab = friendships.common_friends(a, b).await.unwrap();
        let ba = friendships.common_friends(b, a).await.unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.iter().map(|u| u.id).collect::<Vec<_>>(), vec![c]);
    }
}
