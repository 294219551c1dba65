//! 门店仓储
//!
//! 门店及积分合作方配置对积分流程只读，写入只发生在数据导入时。

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::traits::StoreRepositoryTrait;
use crate::error::Result;
use crate::models::{DiscountType, LoyaltyPartner, Store, ValidationRules};

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    store_id: String,
    name: String,
    restaurant_id: Option<String>,
    active: bool,
    loyalty_enabled: Option<bool>,
    partner_id: Option<String>,
    reward_rate: Option<f64>,
    discount_type: DiscountType,
    allowed_discounts: Vec<i64>,
    min_orders: Option<i32>,
    max_points_expiry_days: Option<i32>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        let validation_rules = if row.min_orders.is_some() || row.max_points_expiry_days.is_some()
        {
            Some(ValidationRules {
                min_orders: row.min_orders,
                max_points_expiry_days: row.max_points_expiry_days,
            })
        } else {
            None
        };

        // loyalty_enabled 为 NULL 表示门店没有积分配置
        let loyalty_partner = row.loyalty_enabled.map(|enabled| LoyaltyPartner {
            enabled,
            partner_id: row.partner_id,
            reward_rate: row.reward_rate,
            discount_type: row.discount_type,
            allowed_discounts: row.allowed_discounts,
            validation_rules,
        });

        Store {
            store_id: row.store_id,
            name: row.name,
            restaurant_id: row.restaurant_id,
            active: row.active,
            loyalty_partner,
        }
    }
}

/// 门店仓储
pub struct StoreRepository {
    pool: PgPool,
}

impl StoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按 ID 获取门店配置
    pub async fn get_store(&self, store_id: &str) -> Result<Option<Store>> {
        let row = sqlx::query_as::<_, StoreRow>(
            r#"
            SELECT store_id, name, restaurant_id, active, loyalty_enabled, partner_id,
                   reward_rate, discount_type, allowed_discounts, min_orders,
                   max_points_expiry_days
            FROM stores
            WHERE store_id = $1
            "#,
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Store::from))
    }

    /// 在事务中写入或覆盖门店配置（用于数据导入）
    pub async fn upsert_in_tx(conn: &mut PgConnection, store: &Store) -> Result<()> {
        let partner = store.loyalty_partner.as_ref();
        let rules = partner.and_then(|p| p.validation_rules.as_ref());

        sqlx::query(
            r#"
            INSERT INTO stores (store_id, name, restaurant_id, active, loyalty_enabled, partner_id,
                                reward_rate, discount_type, allowed_discounts, min_orders,
                                max_points_expiry_days)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (store_id) DO UPDATE SET
                name = EXCLUDED.name,
                restaurant_id = EXCLUDED.restaurant_id,
                active = EXCLUDED.active,
                loyalty_enabled = EXCLUDED.loyalty_enabled,
                partner_id = EXCLUDED.partner_id,
                reward_rate = EXCLUDED.reward_rate,
                discount_type = EXCLUDED.discount_type,
                allowed_discounts = EXCLUDED.allowed_discounts,
                min_orders = EXCLUDED.min_orders,
                max_points_expiry_days = EXCLUDED.max_points_expiry_days,
                updated_at = NOW()
            "#,
        )
        .bind(&store.store_id)
        .bind(&store.name)
        .bind(&store.restaurant_id)
        .bind(store.active)
        .bind(partner.map(|p| p.enabled))
        .bind(partner.and_then(|p| p.partner_id.clone()))
        .bind(partner.and_then(|p| p.reward_rate))
        .bind(partner.map(|p| p.discount_type).unwrap_or_default())
        .bind(partner.map(|p| p.allowed_discounts.clone()).unwrap_or_default())
        .bind(rules.and_then(|r| r.min_orders))
        .bind(rules.and_then(|r| r.max_points_expiry_days))
        .execute(conn)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl StoreRepositoryTrait for StoreRepository {
    async fn get_store(&self, store_id: &str) -> Result<Option<Store>> {
        self.get_store(store_id).await
    }
}
