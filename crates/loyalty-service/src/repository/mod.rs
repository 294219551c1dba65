//! 数据库仓储层
//!
//! 提供顾客、门店、购物篮和积分流水的数据访问接口。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 写操作只通过 `LoyaltyStore::begin` 开启的事务进行
//! - PostgreSQL 实现与进程内实现共用同一组 trait 接口

mod basket_repo;
mod customer_repo;
mod ledger_repo;
mod memory;
mod pg_store;
mod store_repo;
mod traits;

pub use basket_repo::BasketRepository;
pub use customer_repo::CustomerRepository;
pub use ledger_repo::LedgerRepository;
pub use memory::{InMemoryStore, MemoryTransaction};
pub use pg_store::{PgLoyaltyStore, PgLoyaltyTransaction};
pub use store_repo::StoreRepository;
pub use traits::*;
