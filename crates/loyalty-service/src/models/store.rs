//! 门店与积分合作方配置
//!
//! 对积分核心而言是只读配置。

use serde::{Deserialize, Serialize};

use super::enums::DiscountType;

/// 门店
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub store_id: String,
    pub name: String,
    #[serde(default)]
    pub restaurant_id: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub loyalty_partner: Option<LoyaltyPartner>,
}

fn default_true() -> bool {
    true
}

impl Store {
    /// 积分计划是否开启
    pub fn loyalty_enabled(&self) -> bool {
        self.loyalty_partner.as_ref().is_some_and(|p| p.enabled)
    }

    /// 已开启且配置了合作方的积分计划
    pub fn active_partner(&self) -> Option<&LoyaltyPartner> {
        self.loyalty_partner
            .as_ref()
            .filter(|p| p.enabled && p.partner_id().is_some())
    }
}

/// 积分合作方配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyPartner {
    pub enabled: bool,
    #[serde(default)]
    pub partner_id: Option<String>,
    /// 每单位消费返还的积分比例
    #[serde(default)]
    pub reward_rate: Option<f64>,
    #[serde(default)]
    pub discount_type: DiscountType,
    /// 可兑换的抵扣档位，按配置顺序
    #[serde(default)]
    pub allowed_discounts: Vec<i64>,
    #[serde(default)]
    pub validation_rules: Option<ValidationRules>,
}

impl LoyaltyPartner {
    /// 合作方 ID，空字符串视为未配置
    pub fn partner_id(&self) -> Option<&str> {
        self.partner_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn reward_rate_or(&self, default_rate: f64) -> f64 {
        self.reward_rate.unwrap_or(default_rate)
    }

    pub fn min_orders(&self) -> i32 {
        self.validation_rules
            .as_ref()
            .and_then(|r| r.min_orders)
            .unwrap_or(0)
    }

    pub fn smallest_discount(&self) -> Option<i64> {
        self.allowed_discounts.iter().copied().min()
    }

    pub fn allows(&self, denomination: i64) -> bool {
        self.allowed_discounts.contains(&denomination)
    }
}

/// 兑换校验规则
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default)]
    pub min_orders: Option<i32>,
    /// 会员资格最长有效天数，目前只作为配置数据保存
    #[serde(default)]
    pub max_points_expiry_days: Option<i32>,
}
