//! 购物篮模型
//!
//! 购物篮由上游下单系统创建，`total` 定价后不再变化。
//! 生命周期：创建 → 最多兑换一次 → 结单一次。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 购物篮
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    pub basket_id: String,
    pub customer_id: i64,
    #[serde(default)]
    pub restaurant_id: Option<String>,
    pub store_id: String,
    #[serde(default)]
    pub items: Vec<BasketItem>,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub delivery_fee: f64,
    pub total: f64,
    /// 兑换前的总额，仅由兑换写入
    #[serde(default)]
    pub original_total: Option<f64>,
    /// 兑换后的应付金额，仅由兑换写入
    #[serde(default)]
    pub updated_total: Option<f64>,
    #[serde(default)]
    pub points_discount: Option<i64>,
    #[serde(default)]
    pub redeemed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// 购物篮商品行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketItem {
    pub name: String,
    pub price: f64,
}

impl Basket {
    /// 实际应付金额：兑换过则取兑换后金额
    pub fn payable_total(&self) -> f64 {
        self.updated_total.unwrap_or(self.total)
    }

    pub fn is_redeemed(&self) -> bool {
        self.redeemed_at.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// 购物篮变更
///
/// 只覆盖 Some 的字段，其余保持不变
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasketPatch {
    pub original_total: Option<f64>,
    pub updated_total: Option<f64>,
    pub points_discount: Option<i64>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BasketPatch {
    /// 兑换写入：记录原价、抵扣后金额和抵扣积分
    pub fn redemption(total: f64, discount: i64, now: DateTime<Utc>) -> Self {
        Self {
            original_total: Some(total),
            updated_total: Some(total - discount as f64),
            points_discount: Some(discount),
            redeemed_at: Some(now),
            completed_at: None,
        }
    }

    pub fn completion(now: DateTime<Utc>) -> Self {
        Self {
            completed_at: Some(now),
            ..Default::default()
        }
    }

    pub fn apply(&self, basket: &Basket) -> Basket {
        let mut updated = basket.clone();
        if let Some(v) = self.original_total {
            updated.original_total = Some(v);
        }
        if let Some(v) = self.updated_total {
            updated.updated_total = Some(v);
        }
        if let Some(v) = self.points_discount {
            updated.points_discount = Some(v);
        }
        if let Some(v) = self.redeemed_at {
            updated.redeemed_at = Some(v);
        }
        if let Some(v) = self.completed_at {
            updated.completed_at = Some(v);
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basket() -> Basket {
        Basket {
            basket_id: "basket_001".to_string(),
            customer_id: 1,
            restaurant_id: Some("rest_001".to_string()),
            store_id: "store_001".to_string(),
            items: vec![BasketItem {
                name: "Margherita".to_string(),
                price: 450.0,
            }],
            subtotal: 450.0,
            delivery_fee: 50.0,
            total: 500.0,
            original_total: None,
            updated_total: None,
            points_discount: None,
            redeemed_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_payable_total() {
        let mut b = basket();
        assert_eq!(b.payable_total(), 500.0);
        b.updated_total = Some(300.0);
        assert_eq!(b.payable_total(), 300.0);
    }

    #[test]
    fn test_redemption_patch() {
        let now = Utc::now();
        let b = BasketPatch::redemption(500.0, 200, now).apply(&basket());
        assert_eq!(b.original_total, Some(500.0));
        assert_eq!(b.updated_total, Some(300.0));
        assert_eq!(b.points_discount, Some(200));
        assert_eq!(b.total, 500.0);
        assert!(b.is_redeemed());
        assert!(!b.is_completed());
    }

    #[test]
    fn test_completion_patch_keeps_redemption_fields() {
        let now = Utc::now();
        let redeemed = BasketPatch::redemption(500.0, 200, now).apply(&basket());
        let completed = BasketPatch::completion(now).apply(&redeemed);
        assert!(completed.is_completed());
        assert_eq!(completed.updated_total, Some(300.0));
    }
}
