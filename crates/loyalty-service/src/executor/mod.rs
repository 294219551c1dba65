//! 写事务执行器
//!
//! 兑换与结单各自在一个事务内完成全部写入，失败时整体回滚。

pub mod accrual;
pub mod redemption;

pub use accrual::{AccrualExecutor, AccrualOutcome, AccrualPlan};
pub use redemption::{RedemptionExecutor, RedemptionOutcome, RedemptionPlan, max_redeemable};
