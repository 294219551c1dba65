//! 服务层
//!
//! 实现积分业务流程，协调仓储层与执行器。
//!
//! ## 模块结构
//!
//! - `dto`: 数据传输对象定义
//! - `loyalty_service`: 资格检查、兑换、结单及查询

pub mod dto;
pub mod loyalty_service;

pub use dto::*;
pub use loyalty_service::{LoyaltyService, MemoryLoyaltyService, PgLoyaltyService};
