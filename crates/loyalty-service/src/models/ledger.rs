//! 积分流水模型
//!
//! 流水只追加、不修改、不删除。单个顾客全部流水的积分增量之和
//! 始终等于当前余额减去初始余额。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{DiscountType, LedgerEntryType, Tier};

/// 积分流水记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub ledger_id: String,
    /// 流水序号，取自流水号计数器，决定同一顾客流水的先后顺序
    pub seq: i64,
    pub customer_id: i64,
    pub phone: Option<String>,
    pub basket_id: String,
    pub store_id: String,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    /// 带符号的积分增量
    pub points: i64,
    pub order_amount: f64,
    pub tier: Tier,
    pub multiplier: Option<f64>,
    pub reward_rate: Option<f64>,
    pub discount_type: Option<DiscountType>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// 待写入的流水（ID 和序号由流水号生成器分配）
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub customer_id: i64,
    pub phone: Option<String>,
    pub basket_id: String,
    pub store_id: String,
    pub entry_type: LedgerEntryType,
    pub points: i64,
    pub order_amount: f64,
    pub tier: Tier,
    pub multiplier: Option<f64>,
    pub reward_rate: Option<f64>,
    pub discount_type: Option<DiscountType>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    pub fn into_entry(self, ledger_id: String, seq: i64) -> LedgerEntry {
        LedgerEntry {
            ledger_id,
            seq,
            customer_id: self.customer_id,
            phone: self.phone,
            basket_id: self.basket_id,
            store_id: self.store_id,
            entry_type: self.entry_type,
            points: self.points,
            order_amount: self.order_amount,
            tier: self.tier,
            multiplier: self.multiplier,
            reward_rate: self.reward_rate,
            discount_type: self.discount_type,
            reason: self.reason,
            created_at: self.created_at,
        }
    }
}

/// 顾客流水的积分增量之和
pub fn ledger_balance(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(|e| e.points).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_balance() {
        let now = Utc::now();
        let base = NewLedgerEntry {
            customer_id: 1,
            phone: None,
            basket_id: "b1".to_string(),
            store_id: "s1".to_string(),
            entry_type: LedgerEntryType::Earn,
            points: 75,
            order_amount: 500.0,
            tier: Tier::Silver,
            multiplier: Some(1.5),
            reward_rate: Some(0.1),
            discount_type: None,
            reason: "结单获得积分".to_string(),
            created_at: now,
        };
        let redeem = NewLedgerEntry {
            entry_type: LedgerEntryType::Redeem,
            points: -50,
            ..base.clone()
        };
        let entries = vec![
            base.into_entry("ledger_1".to_string(), 1),
            redeem.into_entry("ledger_2".to_string(), 2),
        ];
        assert_eq!(ledger_balance(&entries), 25);
    }

    #[test]
    fn test_entry_type_serialized_as_type() {
        let entry = NewLedgerEntry {
            customer_id: 1,
            phone: None,
            basket_id: "b1".to_string(),
            store_id: "s1".to_string(),
            entry_type: LedgerEntryType::Redeem,
            points: -200,
            order_amount: 200.0,
            tier: Tier::Bronze,
            multiplier: None,
            reward_rate: None,
            discount_type: Some(DiscountType::Cash),
            reason: "积分抵扣".to_string(),
            created_at: Utc::now(),
        }
        .into_entry("ledger_7".to_string(), 7);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "redeem");
        assert_eq!(json["ledgerId"], "ledger_7");
        assert_eq!(json["points"], -200);
    }
}
