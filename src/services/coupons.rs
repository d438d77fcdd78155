use crate::db::DbPool;
use crate::entities::coupon;
use crate::errors::ServiceError;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::instrument;

/// Redeems a coupon for the order being created. Must be called with the
/// enclosing order transaction's connection so the decrement commits or
/// rolls back together with the order.
///
/// The `quantity > 0` filter on the decrement is the concurrency guard: two
/// racing redemptions of a one-use coupon serialize on the row and exactly
/// one observes a positive counter.
pub async fn redeem<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> Result<coupon::Model, ServiceError> {
    let coupon = coupon::Entity::find_by_id(code.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", code)))?;

    if coupon.quantity <= 0 {
        return Err(ServiceError::InvalidInput(format!(
            "Coupon {} has no remaining uses",
            code
        )));
    }

    let result = coupon::Entity::update_many()
        .col_expr(
            coupon::Column::Quantity,
            Expr::col(coupon::Column::Quantity).sub(1),
        )
        .filter(coupon::Column::Code.eq(code))
        .filter(coupon::Column::Quantity.gt(0))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::InvalidInput(format!(
            "Coupon {} has no remaining uses",
            code
        )));
    }

    Ok(coupon)
}

/// Read-side access to coupons.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DbPool>,
}

impl CouponService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn get_coupon(&self, code: &str) -> Result<coupon::Model, ServiceError> {
        coupon::Entity::find_by_id(code.to_string())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", code)))
    }
}
