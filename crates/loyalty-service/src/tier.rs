//! 等级与积分倍率计算
//!
//! 纯函数：根据累计消费和当天日期计算等级倍率、生日倍率和总倍率。
//! 生日按服务器本地日历的月日比较，忽略年份。

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{Customer, Tier};

/// 等级门槛表：(等级, 累计消费下限（含）, 倍率)，从高到低匹配
pub const TIER_TABLE: [(Tier, f64, f64); 4] = [
    (Tier::Gold, 25_000.0, 2.0),
    (Tier::Silver, 2_500.0, 1.5),
    (Tier::Bronze, 250.0, 1.0),
    (Tier::Copper, 0.0, 0.2),
];

/// 生日当天的额外倍率
pub const BIRTHDAY_MULTIPLIER: f64 = 1.5;

/// 根据累计消费推导等级
pub fn tier_for_spend(total_spent: f64) -> Tier {
    TIER_TABLE
        .iter()
        .find(|(_, threshold, _)| total_spent >= *threshold)
        .map(|(tier, _, _)| *tier)
        .unwrap_or(Tier::Copper)
}

/// 等级对应的倍率
pub fn tier_multiplier(tier: Tier) -> f64 {
    TIER_TABLE
        .iter()
        .find(|(t, _, _)| *t == tier)
        .map(|(_, _, m)| *m)
        .unwrap_or(1.0)
}

/// 生日倍率：月日相同即生效，未登记生日为 1.0
pub fn birthday_multiplier(birthday: Option<NaiveDate>, today: NaiveDate) -> f64 {
    match birthday {
        Some(b) if b.month() == today.month() && b.day() == today.day() => BIRTHDAY_MULTIPLIER,
        _ => 1.0,
    }
}

/// 倍率计算结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Multipliers {
    pub tier_name: Tier,
    pub tier_multiplier: f64,
    pub birthday_multiplier: f64,
    pub total_multiplier: f64,
}

impl Multipliers {
    /// 计算顾客在指定日期的倍率
    pub fn for_customer(customer: &Customer, today: NaiveDate) -> Self {
        Self::calculate(customer.total_spent, customer.birthday, today)
    }

    pub fn calculate(total_spent: f64, birthday: Option<NaiveDate>, today: NaiveDate) -> Self {
        let tier_name = tier_for_spend(total_spent);
        let tier_multiplier = tier_multiplier(tier_name);
        let birthday_multiplier = birthday_multiplier(birthday, today);
        Self {
            tier_name,
            tier_multiplier,
            birthday_multiplier,
            total_multiplier: tier_multiplier * birthday_multiplier,
        }
    }

    pub fn is_birthday(&self) -> bool {
        self.birthday_multiplier > 1.0
    }
}

/// 积分取整（向下），容忍浮点乘法产生的微小误差
pub fn floor_points(value: f64) -> i64 {
    if value <= 0.0 {
        return 0;
    }
    (value + 1e-9).floor() as i64
}

/// 按金额、返还比例和倍率计算积分
pub fn points_for(amount: f64, reward_rate: f64, multiplier: f64) -> i64 {
    floor_points(amount * reward_rate * multiplier)
}
