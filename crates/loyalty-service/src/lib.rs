//! 门店积分服务
//!
//! 顾客在合作门店消费累计积分，下次下单时用积分抵扣订单金额。
//!
//! ## 核心功能
//!
//! - **等级倍率**：按累计消费划分等级，生日当天额外加倍
//! - **资格检查**：按固定顺序校验门店配置、会员资格和可用档位，给出确定的拒绝原因
//! - **积分兑换**：条件扣减积分、改写购物篮金额、写兑换流水，三者原子生效
//! - **结单累计**：按实付金额、返还比例和倍率累计积分，写获得流水
//! - **积分流水**：只追加的流水记录，流水号来自持久化计数器
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `tier`: 等级与倍率计算
//! - `eligibility`: 兑换资格校验
//! - `ledger_id`: 流水号生成
//! - `executor`: 兑换与结单的写事务
//! - `repository`: 仓储层（PostgreSQL 与进程内实现）
//! - `service`: 业务服务层
//! - `seed`: 初始数据导入
//! - `cli`: 命令行接口

pub mod cli;
pub mod eligibility;
pub mod error;
pub mod executor;
pub mod fixtures;
pub mod ledger_id;
pub mod models;
pub mod repository;
pub mod seed;
pub mod service;
pub mod tier;

pub use error::{LoyaltyError, Result};
pub use service::{LoyaltyService, MemoryLoyaltyService, PgLoyaltyService};
