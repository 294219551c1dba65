//! 购物篮仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use super::traits::BasketRepositoryTrait;
use crate::error::{LoyaltyError, Result};
use crate::models::{Basket, BasketItem, BasketPatch};

const BASKET_COLUMNS: &str = "basket_id, customer_id, restaurant_id, store_id, items, subtotal, \
     delivery_fee, total, original_total, updated_total, points_discount, redeemed_at, \
     completed_at";

#[derive(Debug, sqlx::FromRow)]
struct BasketRow {
    basket_id: String,
    customer_id: i64,
    restaurant_id: Option<String>,
    store_id: String,
    items: Json<Vec<BasketItem>>,
    subtotal: f64,
    delivery_fee: f64,
    total: f64,
    original_total: Option<f64>,
    updated_total: Option<f64>,
    points_discount: Option<i64>,
    redeemed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<BasketRow> for Basket {
    fn from(row: BasketRow) -> Self {
        Basket {
            basket_id: row.basket_id,
            customer_id: row.customer_id,
            restaurant_id: row.restaurant_id,
            store_id: row.store_id,
            items: row.items.0,
            subtotal: row.subtotal,
            delivery_fee: row.delivery_fee,
            total: row.total,
            original_total: row.original_total,
            updated_total: row.updated_total,
            points_discount: row.points_discount,
            redeemed_at: row.redeemed_at,
            completed_at: row.completed_at,
        }
    }
}

/// 购物篮仓储
pub struct BasketRepository {
    pool: PgPool,
}

impl BasketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按 ID 获取购物篮
    pub async fn get_basket(&self, basket_id: &str) -> Result<Option<Basket>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_in_tx(&mut *conn, basket_id, false).await
    }

    /// 在事务中获取购物篮，`for_update` 为 true 时锁定行直到事务结束
    pub async fn find_in_tx(
        conn: &mut PgConnection,
        basket_id: &str,
        for_update: bool,
    ) -> Result<Option<Basket>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let row = sqlx::query_as::<_, BasketRow>(&format!(
            "SELECT {} FROM baskets WHERE basket_id = $1{}",
            BASKET_COLUMNS, lock
        ))
        .bind(basket_id)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(Basket::from))
    }

    /// 在事务中更新购物篮，只覆盖 patch 中给出的字段
    pub async fn apply_patch_in_tx(
        conn: &mut PgConnection,
        basket_id: &str,
        patch: &BasketPatch,
    ) -> Result<Basket> {
        let row = sqlx::query_as::<_, BasketRow>(&format!(
            r#"
            UPDATE baskets
            SET original_total = COALESCE($2, original_total),
                updated_total = COALESCE($3, updated_total),
                points_discount = COALESCE($4, points_discount),
                redeemed_at = COALESCE($5, redeemed_at),
                completed_at = COALESCE($6, completed_at),
                updated_at = NOW()
            WHERE basket_id = $1
            RETURNING {}
            "#,
            BASKET_COLUMNS
        ))
        .bind(basket_id)
        .bind(patch.original_total)
        .bind(patch.updated_total)
        .bind(patch.points_discount)
        .bind(patch.redeemed_at)
        .bind(patch.completed_at)
        .fetch_optional(conn)
        .await?;

        row.map(Basket::from)
            .ok_or_else(|| LoyaltyError::BasketNotFound(basket_id.to_string()))
    }

    /// 在事务中导入购物篮，已存在的购物篮保持不变
    ///
    /// 已兑换或已结单的购物篮不能被导入数据重置，返回是否实际写入
    pub async fn insert_if_absent_in_tx(
        conn: &mut PgConnection,
        basket: &Basket,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO baskets (basket_id, customer_id, restaurant_id, store_id, items, subtotal,
                                 delivery_fee, total, original_total, updated_total,
                                 points_discount, redeemed_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (basket_id) DO NOTHING
            "#,
        )
        .bind(&basket.basket_id)
        .bind(basket.customer_id)
        .bind(&basket.restaurant_id)
        .bind(&basket.store_id)
        .bind(Json(&basket.items))
        .bind(basket.subtotal)
        .bind(basket.delivery_fee)
        .bind(basket.total)
        .bind(basket.original_total)
        .bind(basket.updated_total)
        .bind(basket.points_discount)
        .bind(basket.redeemed_at)
        .bind(basket.completed_at)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl BasketRepositoryTrait for BasketRepository {
    async fn get_basket(&self, basket_id: &str) -> Result<Option<Basket>> {
        self.get_basket(basket_id).await
    }
}
