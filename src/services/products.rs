use crate::db::DbPool;
use crate::entities::product;
use crate::errors::ServiceError;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Product catalog collaborator: the order core only reads products and
/// persists them through `save`; stock mutations driven by orders go
/// through the order transactions instead.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        title: &str,
        sale_price: Decimal,
        quantity: i32,
    ) -> Result<product::Model, ServiceError> {
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            sale_price: Set(sale_price),
            quantity: Set(quantity),
            deleted: Set(false),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        Ok(model.insert(&*self.db).await?)
    }

    #[instrument(skip(self, product))]
    pub async fn save(&self, product: product::ActiveModel) -> Result<product::Model, ServiceError> {
        let mut product = product;
        product.updated_at = Set(Some(Utc::now()));
        Ok(product.update(&*self.db).await?)
    }
}
