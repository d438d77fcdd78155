use crate::{
    db::DbPool,
    entities::{order, order_item, product, OrderStatus},
    errors::ServiceError,
};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WeeklyRevenue {
    pub iso_year: i32,
    pub week: u32,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductSales {
    pub product_id: Uuid,
    pub title: String,
    pub quantity_sold: i64,
    pub revenue: Decimal,
}

/// Read-only revenue and product-sales reporting over shipped orders.
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    async fn shipped_orders_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::Shipped))
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::CreatedAt.lte(end))
            .all(&*self.db)
            .await?)
    }

    /// Monthly revenue for a calendar year. Always returns exactly 12
    /// entries in month order; months without shipped orders are
    /// synthesized with a zero total because downstream charts rely on a
    /// fixed-length series. Year 0 means the current calendar year.
    #[instrument(skip(self))]
    pub async fn revenue_for_year(&self, year: i32) -> Result<Vec<MonthlyRevenue>, ServiceError> {
        let year = if year == 0 { Utc::now().year() } else { year };
        let start = Utc
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| ServiceError::InvalidInput(format!("Invalid year {}", year)))?;
        let end = Utc
            .with_ymd_and_hms(year, 12, 31, 23, 59, 59)
            .single()
            .ok_or_else(|| ServiceError::InvalidInput(format!("Invalid year {}", year)))?;

        let orders = self.shipped_orders_between(start, end).await?;
        let mut buckets: BTreeMap<u32, Decimal> = BTreeMap::new();
        for order in &orders {
            *buckets
                .entry(order.created_at.month())
                .or_insert(Decimal::ZERO) += order.total_money;
        }

        Ok((1..=12)
            .map(|month| MonthlyRevenue {
                year,
                month,
                total: buckets.get(&month).copied().unwrap_or(Decimal::ZERO),
            })
            .collect())
    }

    /// Sparse month buckets over an arbitrary range.
    #[instrument(skip(self))]
    pub async fn revenue_by_month(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MonthlyRevenue>, ServiceError> {
        let orders = self.shipped_orders_between(start, end).await?;
        let mut buckets: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();
        for order in &orders {
            let key = (order.created_at.year(), order.created_at.month());
            *buckets.entry(key).or_insert(Decimal::ZERO) += order.total_money;
        }
        Ok(buckets
            .into_iter()
            .map(|((year, month), total)| MonthlyRevenue { year, month, total })
            .collect())
    }

    /// Sparse calendar-day buckets over an arbitrary range.
    #[instrument(skip(self))]
    pub async fn revenue_by_day(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailyRevenue>, ServiceError> {
        let orders = self.shipped_orders_between(start, end).await?;
        let mut buckets: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for order in &orders {
            *buckets
                .entry(order.created_at.date_naive())
                .or_insert(Decimal::ZERO) += order.total_money;
        }
        Ok(buckets
            .into_iter()
            .map(|(date, total)| DailyRevenue { date, total })
            .collect())
    }

    /// Sparse ISO-week buckets over an arbitrary range.
    #[instrument(skip(self))]
    pub async fn revenue_by_week(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeeklyRevenue>, ServiceError> {
        let orders = self.shipped_orders_between(start, end).await?;
        let mut buckets: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();
        for order in &orders {
            let iso = order.created_at.iso_week();
            *buckets
                .entry((iso.year(), iso.week()))
                .or_insert(Decimal::ZERO) += order.total_money;
        }
        Ok(buckets
            .into_iter()
            .map(|((iso_year, week), total)| WeeklyRevenue {
                iso_year,
                week,
                total,
            })
            .collect())
    }

    /// Per-product quantity and revenue totals from line items of shipped
    /// orders, best sellers first.
    #[instrument(skip(self))]
    pub async fn product_sales(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProductSales>, ServiceError> {
        let orders = self.shipped_orders_between(start, end).await?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(&*self.db)
            .await?;

        let mut totals: BTreeMap<Uuid, (i64, Decimal)> = BTreeMap::new();
        for item in &items {
            let entry = totals
                .entry(item.product_id)
                .or_insert((0, Decimal::ZERO));
            entry.0 += i64::from(item.quantity);
            entry.1 += item.total_money;
        }

        let product_ids: Vec<Uuid> = totals.keys().copied().collect();
        let titles: BTreeMap<Uuid, String> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.title))
            .collect();

        let mut sales: Vec<ProductSales> = totals
            .into_iter()
            .map(|(product_id, (quantity_sold, revenue))| ProductSales {
                title: titles
                    .get(&product_id)
                    .cloned()
                    .unwrap_or_else(|| product_id.to_string()),
                product_id,
                quantity_sold,
                revenue,
            })
            .collect();
        sales.sort_by(|a, b| b.quantity_sold.cmp(&a.quantity_sold));
        Ok(sales)
    }
}
