//! 服务层数据传输对象
//!
//! 定义服务层对外返回的 DTO，与内部领域模型解耦

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    BasketItem, DenialDetails, DiscountType, Enrollment, LedgerEntry, ReasonCode, Tier, Verdict,
};
use crate::tier::Multipliers;

/// 可兑换档位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemOption {
    pub points: i64,
    /// 展示文案，如 "200 OFF"
    pub discount: String,
}

impl RedeemOption {
    pub fn new(points: i64, discount_type: DiscountType) -> Self {
        Self {
            points,
            discount: discount_type.label(points),
        }
    }
}

/// 兑换资格检查结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub basket_id: String,
    pub customer_id: i64,
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<DenialDetails>,
    pub redeem_options: Vec<RedeemOption>,
    pub multipliers: Multipliers,
    /// 按当前订单金额结单预计可获得的积分
    pub estimated_points: i64,
    pub available_points: i64,
    pub tier: Tier,
}

impl CheckResponse {
    /// 由校验结果填充资格相关字段
    pub fn apply_verdict(&mut self, verdict: &Verdict, discount_type: DiscountType) {
        match verdict {
            Verdict::Eligible { redeem_options } => {
                self.eligible = true;
                self.redeem_options = redeem_options
                    .iter()
                    .map(|&p| RedeemOption::new(p, discount_type))
                    .collect();
            }
            Verdict::Denied(denial) => {
                self.eligible = false;
                self.reason_code = Some(denial.code);
                self.message = Some(denial.message().to_string());
                self.details = denial.details.clone();
            }
        }
    }
}

/// 兑换结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    pub basket_id: String,
    pub customer_id: i64,
    pub points_used: i64,
    pub remaining_points: i64,
    pub original_total: f64,
    pub updated_total: f64,
    pub points_discount: i64,
    pub discount: String,
    pub ledger_id: String,
}

/// 结单结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    pub basket_id: String,
    pub customer_id: i64,
    pub loyalty_applied: bool,
    pub points_earned: i64,
    pub remaining_points: i64,
    pub tier: Tier,
    pub order_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multipliers: Option<Multipliers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_id: Option<String>,
}

/// 顾客积分概览（按手机号查询）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub customer_id: i64,
    pub phone: String,
    pub name: String,
    pub points: i64,
    pub tier: Tier,
    pub total_spent: f64,
    pub order_count: i32,
    /// 今天的倍率
    pub multipliers: Multipliers,
    pub enrollments: Vec<Enrollment>,
}

/// 顾客积分流水
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerHistory {
    pub customer_id: i64,
    /// 全部流水积分增量之和
    pub net_points: i64,
    pub entries: Vec<LedgerEntry>,
}

/// 购物篮视图
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketView {
    pub basket_id: String,
    pub customer_id: i64,
    pub store_id: String,
    pub items: Vec<BasketItem>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_discount: Option<i64>,
    /// 实际应付金额
    pub payable_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Denial;
    use chrono::NaiveDate;

    fn empty_check() -> CheckResponse {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        CheckResponse {
            basket_id: "b1".to_string(),
            customer_id: 1,
            eligible: false,
            reason_code: None,
            message: None,
            details: None,
            redeem_options: Vec::new(),
            multipliers: Multipliers::calculate(0.0, None, today),
            estimated_points: 0,
            available_points: 30,
            tier: Tier::Copper,
        }
    }

    #[test]
    fn test_redeem_option_labels() {
        assert_eq!(RedeemOption::new(200, DiscountType::Cash).discount, "200 OFF");
        assert_eq!(
            RedeemOption::new(10, DiscountType::Percentage).discount,
            "10% OFF"
        );
    }

    #[test]
    fn test_denied_check_serialization() {
        let mut response = empty_check();
        response.apply_verdict(
            &Verdict::Denied(Denial::insufficient_points(50, 30)),
            DiscountType::Cash,
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["eligible"], false);
        assert_eq!(json["reasonCode"], "INSUFFICIENT_POINTS");
        assert_eq!(json["details"]["required"], 50);
        assert_eq!(json["details"]["available"], 30);
        assert_eq!(json["availablePoints"], 30);
    }

    #[test]
    fn test_eligible_check_omits_reason() {
        let mut response = empty_check();
        response.apply_verdict(
            &Verdict::Eligible {
                redeem_options: vec![50, 100],
            },
            DiscountType::Cash,
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["eligible"], true);
        assert!(json.get("reasonCode").is_none());
        assert_eq!(json["redeemOptions"][1]["discount"], "100 OFF");
    }
}
