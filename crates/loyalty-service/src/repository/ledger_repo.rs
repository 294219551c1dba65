//! 积分流水仓储
//!
//! 提供流水的追加、查询和流水号计数器访问。流水只追加，不提供修改和删除。

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::traits::LedgerRepositoryTrait;
use crate::error::Result;
use crate::models::LedgerEntry;

/// 积分流水仓储
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 列出顾客的全部流水
    ///
    /// 按流水序号升序排列，即操作被接受的先后顺序
    pub async fn list_by_customer(&self, customer_id: i64) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT ledger_id, seq, customer_id, phone, basket_id, store_id, entry_type, points,
                   order_amount, tier, multiplier, reward_rate, discount_type, reason, created_at
            FROM points_ledger
            WHERE customer_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// 在事务中递增流水号计数器
    ///
    /// 计数器行在事务提交前保持锁定，并发写入者按提交顺序拿到递增的序号
    pub async fn next_counter_in_tx(conn: &mut PgConnection, counter_name: &str) -> Result<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO ledger_counters (name, value)
            VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE SET value = ledger_counters.value + 1
            RETURNING value
            "#,
        )
        .bind(counter_name)
        .fetch_one(conn)
        .await?;

        Ok(value)
    }

    /// 在事务中检查流水号是否已被占用
    pub async fn exists_in_tx(conn: &mut PgConnection, ledger_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM points_ledger WHERE ledger_id = $1)",
        )
        .bind(ledger_id)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    /// 在事务中写入流水
    pub async fn insert_in_tx(conn: &mut PgConnection, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO points_ledger (ledger_id, seq, customer_id, phone, basket_id, store_id,
                                       entry_type, points, order_amount, tier, multiplier,
                                       reward_rate, discount_type, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&entry.ledger_id)
        .bind(entry.seq)
        .bind(entry.customer_id)
        .bind(&entry.phone)
        .bind(&entry.basket_id)
        .bind(&entry.store_id)
        .bind(entry.entry_type)
        .bind(entry.points)
        .bind(entry.order_amount)
        .bind(entry.tier)
        .bind(entry.multiplier)
        .bind(entry.reward_rate)
        .bind(entry.discount_type)
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LedgerRepositoryTrait for LedgerRepository {
    async fn list_by_customer(&self, customer_id: i64) -> Result<Vec<LedgerEntry>> {
        self.list_by_customer(customer_id).await
    }
}
