//! 初始数据导入
//!
//! 从 JSON 文档导入门店、顾客（含会员资格）和购物篮，
//! 可写入 PostgreSQL（单个事务内完成）或进程内存储。
//! 顾客等级在导入时按累计消费重新推导，不信任文档中的值。
//!
//! 门店配置按导入文档覆盖；顾客和购物篮只插入不存在的记录，
//! 已有的余额、兑换和结单状态只能由积分流程改变，重复导入不会重置。

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use crate::error::Result;
use crate::models::{Basket, Customer, Store};
use crate::repository::{BasketRepository, CustomerRepository, InMemoryStore, StoreRepository};
use crate::tier::tier_for_spend;

/// 导入文档
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    #[serde(default)]
    pub stores: Vec<Store>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub baskets: Vec<Basket>,
}

/// 导入数量统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedStats {
    pub stores: usize,
    pub customers: usize,
    pub baskets: usize,
    /// 已存在而跳过的顾客
    pub skipped_customers: usize,
    /// 已存在而跳过的购物篮
    pub skipped_baskets: usize,
}

impl SeedStats {
    fn count_customer(&mut self, inserted: bool) {
        if inserted {
            self.customers += 1;
        } else {
            self.skipped_customers += 1;
        }
    }

    fn count_basket(&mut self, inserted: bool) {
        if inserted {
            self.baskets += 1;
        } else {
            self.skipped_baskets += 1;
        }
    }
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut data: Self = serde_json::from_str(json)?;
        for customer in &mut data.customers {
            customer.tier = tier_for_spend(customer.total_spent);
        }
        Ok(data)
    }

    /// 文档中的记录数
    pub fn stats(&self) -> SeedStats {
        SeedStats {
            stores: self.stores.len(),
            customers: self.customers.len(),
            baskets: self.baskets.len(),
            ..Default::default()
        }
    }

    /// 写入进程内存储
    pub fn load_into_memory(&self, store: &InMemoryStore) -> SeedStats {
        let mut stats = SeedStats::default();

        for s in &self.stores {
            store.insert_store(s.clone());
            stats.stores += 1;
        }
        for c in &self.customers {
            stats.count_customer(store.insert_customer_if_absent(c.clone()));
        }
        for b in &self.baskets {
            stats.count_basket(store.insert_basket_if_absent(b.clone()));
        }

        log_stats(&stats);
        stats
    }

    /// 在一个事务内写入 PostgreSQL
    pub async fn load_into_postgres(&self, pool: &PgPool) -> Result<SeedStats> {
        let mut stats = SeedStats::default();
        let mut tx = pool.begin().await?;

        for s in &self.stores {
            StoreRepository::upsert_in_tx(&mut tx, s).await?;
            stats.stores += 1;
        }
        for c in &self.customers {
            let inserted = CustomerRepository::insert_if_absent_in_tx(&mut tx, c).await?;
            stats.count_customer(inserted);
        }
        for b in &self.baskets {
            let inserted = BasketRepository::insert_if_absent_in_tx(&mut tx, b).await?;
            stats.count_basket(inserted);
        }

        tx.commit().await?;

        log_stats(&stats);
        Ok(stats)
    }
}

fn log_stats(stats: &SeedStats) {
    info!(
        stores = stats.stores,
        customers = stats.customers,
        baskets = stats.baskets,
        skipped_customers = stats.skipped_customers,
        skipped_baskets = stats.skipped_baskets,
        "初始数据导入完成"
    );
}
