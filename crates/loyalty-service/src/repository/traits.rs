//! 仓储 Trait 定义
//!
//! 服务层只依赖这些接口，不假设底层是关系型数据库还是进程内存储。
//! 读接口用于资格检查等只读流程；写操作必须通过 `LoyaltyStore::begin`
//! 开启的事务完成，保证顾客余额、购物篮和流水三者一起生效或一起回滚。

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Basket, BasketPatch, Customer, CustomerPatch, LedgerEntry, NewLedgerEntry, Store,
};

/// 顾客仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerRepositoryTrait: Send + Sync {
    async fn get_customer(&self, customer_id: i64) -> Result<Option<Customer>>;
    async fn get_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>>;
}

/// 购物篮仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BasketRepositoryTrait: Send + Sync {
    async fn get_basket(&self, basket_id: &str) -> Result<Option<Basket>>;
}

/// 门店仓储接口（只读）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreRepositoryTrait: Send + Sync {
    async fn get_store(&self, store_id: &str) -> Result<Option<Store>>;
}

/// 积分流水仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepositoryTrait: Send + Sync {
    /// 按流水序号升序返回顾客的全部流水
    async fn list_by_customer(&self, customer_id: i64) -> Result<Vec<LedgerEntry>>;
}

/// 事务入口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LoyaltyTransaction>>;
}

/// 一次兑换/结单的写事务
///
/// 未提交就被丢弃（包括超时取消）时，所有写入都会被回滚。
#[async_trait]
pub trait LoyaltyTransaction: Send {
    /// 读取并锁定顾客记录，直到事务结束
    async fn lock_customer(&mut self, customer_id: i64) -> Result<Option<Customer>>;

    /// 读取并锁定购物篮记录，直到事务结束
    async fn lock_basket(&mut self, basket_id: &str) -> Result<Option<Basket>>;

    /// 条件更新顾客：只有 `points + points_delta >= 0` 时才写入
    ///
    /// 条件不满足返回 Ok(None)，顾客不存在同样返回 Ok(None)
    async fn update_customer(
        &mut self,
        customer_id: i64,
        patch: &CustomerPatch,
    ) -> Result<Option<Customer>>;

    async fn update_basket(&mut self, basket_id: &str, patch: &BasketPatch) -> Result<Basket>;

    /// 追加流水，流水号在事务内生成
    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
