//! 积分服务枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化，
//! 序列化值与历史数据保持一致（全小写）。

use serde::{Deserialize, Serialize};

/// 会员等级
///
/// 由累计消费金额推导，决定积分倍率。顺序与等级高低一致。
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Copper,
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Copper => "copper",
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 积分流水类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum LedgerEntryType {
    /// 结单获得积分
    Earn,
    /// 兑换扣减积分
    Redeem,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earn => "earn",
            Self::Redeem => "redeem",
        }
    }
}

/// 抵扣类型
///
/// 只影响展示文案和流水说明，抵扣金额的计算方式相同
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum DiscountType {
    /// 现金抵扣
    #[default]
    Cash,
    /// 百分比折扣
    Percentage,
}

impl DiscountType {
    /// 抵扣档位的展示文案，如 "200 OFF" / "10% OFF"
    pub fn label(&self, denomination: i64) -> String {
        match self {
            Self::Cash => format!("{} OFF", denomination),
            Self::Percentage => format!("{}% OFF", denomination),
        }
    }
}

/// 会员资格状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum MembershipStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    Cancelled,
}

/// 顾客账户状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
    Blocked,
}
