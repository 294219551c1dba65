//! 积分服务领域模型
//!
//! 包含顾客、门店配置、购物篮、积分流水及资格判定结果的定义

pub mod basket;
pub mod customer;
pub mod enums;
pub mod ledger;
pub mod store;
pub mod verdict;

// 重新导出常用类型
pub use basket::{Basket, BasketItem, BasketPatch};
pub use customer::{Customer, CustomerPatch, Enrollment, Membership};
pub use enums::{CustomerStatus, DiscountType, LedgerEntryType, MembershipStatus, Tier};
pub use ledger::{LedgerEntry, NewLedgerEntry, ledger_balance};
pub use store::{LoyaltyPartner, Store, ValidationRules};
pub use verdict::{Denial, DenialDetails, ErrorCategory, ReasonCode, Verdict};
