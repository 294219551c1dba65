//! 顾客与会员资格模型

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{CustomerStatus, MembershipStatus, Tier};

/// 顾客
///
/// `tier` 是 `total_spent` 的缓存推导值，每次写入都必须重新计算。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_id: i64,
    pub phone: String,
    pub name: String,
    /// 积分余额，永不为负
    pub points: i64,
    /// 累计消费金额
    pub total_spent: f64,
    pub order_count: i32,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub status: CustomerStatus,
    /// 各合作方的会员资格，每个合作方至多一条
    #[serde(default)]
    pub loyalty_info: Vec<Enrollment>,
}

impl Customer {
    /// 查找与指定合作方匹配的会员资格
    pub fn enrollment_for(&self, partner_id: &str) -> Option<&Enrollment> {
        self.loyalty_info
            .iter()
            .find(|e| e.partner_id.as_deref() == Some(partner_id))
    }
}

/// 会员资格（loyaltyInfo 条目）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub partner_id: Option<String>,
    /// 在该合作方累计的有效订单数
    #[serde(rename = "noOrders", default)]
    pub qualifying_orders: i32,
    pub membership: Membership,
}

/// 会员资格状态与有效期
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub status: MembershipStatus,
    #[serde(default)]
    pub joined_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// 有效期严格早于 now 才算过期，未设置有效期视为长期有效
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < now)
    }
}

/// 顾客积分变更
///
/// 以增量表达，由存储层以条件更新的方式落库：
/// 只有 `points + points_delta >= 0` 时才会生效。
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerPatch {
    pub points_delta: i64,
    pub spend_delta: f64,
    pub order_count_delta: i32,
    /// 写入后的等级，由调用方根据写入后的累计消费计算
    pub tier: Tier,
}

impl CustomerPatch {
    /// 兑换扣减：消费金额不变，等级按原累计消费重算
    pub fn redeem(points: i64, tier: Tier) -> Self {
        Self {
            points_delta: -points,
            spend_delta: 0.0,
            order_count_delta: 0,
            tier,
        }
    }

    /// 结单累加：积分、消费、订单数一并增加
    pub fn accrue(points: i64, order_total: f64, tier: Tier) -> Self {
        Self {
            points_delta: points,
            spend_delta: order_total,
            order_count_delta: 1,
            tier,
        }
    }

    /// 将变更应用到顾客上；条件不满足（积分不足）时返回 None
    pub fn apply(&self, customer: &Customer) -> Option<Customer> {
        let points = customer.points + self.points_delta;
        if points < 0 {
            return None;
        }
        let mut updated = customer.clone();
        updated.points = points;
        updated.total_spent += self.spend_delta;
        updated.order_count += self.order_count_delta;
        updated.tier = self.tier;
        Some(updated)
    }
}
