//! CLI 模块
//!
//! 提供命令行接口，支持以下功能：
//!
//! - `check` / `redeem` / `complete` - 兑换资格检查、积分兑换、结单
//! - `ledger` / `customer` / `basket` - 流水、顾客、购物篮查询
//! - `migrate` - 执行数据库迁移
//! - `seed` - 导入初始数据
//!
//! # 使用示例
//!
//! ```bash
//! # 检查购物篮能否兑换
//! loyalty check basket_001
//!
//! # 兑换 200 积分
//! loyalty redeem basket_001 200
//!
//! # 不连接数据库，用示例数据演示完整流程
//! loyalty --in-memory --data data/seed.json redeem basket_001 200
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::{CommandRunner, ErrorBody};
