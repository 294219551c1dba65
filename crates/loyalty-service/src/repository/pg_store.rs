//! PostgreSQL 事务实现
//!
//! 每个写事务持有一个 sqlx 事务：顾客和购物篮行用 FOR UPDATE 锁定，
//! 积分扣减是条件更新，流水号计数器与流水写入处于同一事务。
//! 事务对象被丢弃而未提交时，sqlx 会自动回滚。

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

use super::basket_repo::BasketRepository;
use super::customer_repo::CustomerRepository;
use super::ledger_repo::LedgerRepository;
use super::traits::{LoyaltyStore, LoyaltyTransaction};
use crate::error::Result;
use crate::ledger_id::{LedgerIdGenerator, LedgerSequence};
use crate::models::{Basket, BasketPatch, Customer, CustomerPatch, LedgerEntry, NewLedgerEntry};

/// PostgreSQL 写事务入口
pub struct PgLoyaltyStore {
    pool: PgPool,
    id_generator: LedgerIdGenerator,
    counter_name: String,
}

impl PgLoyaltyStore {
    pub fn new(
        pool: PgPool,
        id_generator: LedgerIdGenerator,
        counter_name: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            id_generator,
            counter_name: counter_name.into(),
        }
    }
}

#[async_trait]
impl LoyaltyStore for PgLoyaltyStore {
    async fn begin(&self) -> Result<Box<dyn LoyaltyTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLoyaltyTransaction {
            tx,
            id_generator: self.id_generator.clone(),
            counter_name: self.counter_name.clone(),
        }))
    }
}

/// PostgreSQL 写事务
pub struct PgLoyaltyTransaction {
    tx: Transaction<'static, Postgres>,
    id_generator: LedgerIdGenerator,
    counter_name: String,
}

/// 事务内的流水号计数器
struct PgLedgerSequence<'a> {
    conn: &'a mut PgConnection,
    counter_name: &'a str,
}

#[async_trait]
impl LedgerSequence for PgLedgerSequence<'_> {
    async fn next_value(&mut self) -> Result<i64> {
        LedgerRepository::next_counter_in_tx(self.conn, self.counter_name).await
    }

    async fn id_exists(&mut self, ledger_id: &str) -> Result<bool> {
        LedgerRepository::exists_in_tx(self.conn, ledger_id).await
    }
}

#[async_trait]
impl LoyaltyTransaction for PgLoyaltyTransaction {
    async fn lock_customer(&mut self, customer_id: i64) -> Result<Option<Customer>> {
        CustomerRepository::find_in_tx(&mut *self.tx, customer_id, true).await
    }

    async fn lock_basket(&mut self, basket_id: &str) -> Result<Option<Basket>> {
        BasketRepository::find_in_tx(&mut *self.tx, basket_id, true).await
    }

    async fn update_customer(
        &mut self,
        customer_id: i64,
        patch: &CustomerPatch,
    ) -> Result<Option<Customer>> {
        CustomerRepository::apply_patch_in_tx(&mut *self.tx, customer_id, patch).await
    }

    async fn update_basket(&mut self, basket_id: &str, patch: &BasketPatch) -> Result<Basket> {
        BasketRepository::apply_patch_in_tx(&mut *self.tx, basket_id, patch).await
    }

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let (seq, ledger_id) = {
            let mut sequence = PgLedgerSequence {
                conn: &mut *self.tx,
                counter_name: &self.counter_name,
            };
            self.id_generator.generate(&mut sequence).await?
        };

        let entry = entry.into_entry(ledger_id, seq);
        LedgerRepository::insert_in_tx(&mut *self.tx, &entry).await?;

        debug!(ledger_id = %entry.ledger_id, seq, "流水已写入事务");
        Ok(entry)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
