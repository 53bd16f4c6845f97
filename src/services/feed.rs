use std::sync::Arc;

use tracing::debug;

use crate::error::AppResult;
use crate::models::Event;
use crate::services::require_user;
use crate::storage::Storage;

/// Append-only activity feed.
///
/// Callers record an entry after each social mutation; the feed write and
/// the mutation are two sequential calls, not one transaction, so a crash
/// between them can leave a mutation without its event. That gap is
/// accepted and not retried.
#[derive(Clone)]
pub struct FeedService {
    storage: Arc<dyn Storage>,
}

impl FeedService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Appends one event. The discriminators arrive as names and must be
    /// recognized members of their enumerations; an unknown name is
    /// `NotFound`, just as a lookup-table miss would be.
    pub async fn record(
        &self,
        actor_user_id: i64,
        entity_id: i64,
        entity_type: &str,
        operation: &str,
        event_type: &str,
    ) -> AppResult<Event> {
        let entity_type = entity_type.parse()?;
        let operation = operation.parse()?;
        let event_type = event_type.parse()?;
        let event = self
            .storage
            .append_event(actor_user_id, entity_id, entity_type, operation, event_type)
            .await?;
        debug!(
            event_id = event.event_id,
            actor_user_id, entity_id, "event recorded"
        );
        Ok(event)
    }

    /// Events acted by `user_id`, most recent first
    pub async fn for_user(&self, user_id: i64) -> AppResult<Vec<Event>> {
        require_user(self.storage.as_ref(), user_id).await?;
        self.storage.events_for_user(user_id).await
    }
}
