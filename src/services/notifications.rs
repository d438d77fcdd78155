use crate::db::DbPool;
use crate::entities::notification;
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Inserts a notification row on the caller's connection. Order-state
/// transitions call this with their open transaction so the row is part of
/// the same atomic unit as the status change.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    order_id: Option<Uuid>,
    title: &str,
    content: &str,
) -> Result<notification::Model, ServiceError> {
    let model = notification::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        order_id: Set(order_id),
        title: Set(title.to_string()),
        content: Set(content.to_string()),
        is_read: Set(false),
        created_at: Set(Utc::now()),
    };
    Ok(model.insert(conn).await?)
}

/// Read-side access to the notification store.
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DbPool>,
}

impl NotificationService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Lists a user's notifications, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<notification::Model>, ServiceError> {
        Ok(notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}
