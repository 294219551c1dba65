//! 兑换资格判定结果
//!
//! 拒绝原因码和详情结构是对外的持久契约：文案可以本地化，
//! 但原因码和详情字段不能悄悄变化。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 错误/拒绝分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// 门店配置问题，调用方可修复，不自动重试
    Configuration,
    /// 资格不满足，属于正常业务结果
    Eligibility,
    /// 客户端输入错误
    Input,
    /// 一致性/系统故障
    System,
}

/// 拒绝原因码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    StoreNoLoyalty,
    StoreNoPartner,
    CustomerNotEnrolled,
    MembershipInactive,
    MembershipExpired,
    MinOrdersNotMet,
    NoDiscountsAvailable,
    InsufficientPoints,
    BasketTotalTooLow,
    InvalidDiscountAmount,
    BasketAlreadyRedeemed,
    BasketAlreadyCompleted,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StoreNoLoyalty => "STORE_NO_LOYALTY",
            Self::StoreNoPartner => "STORE_NO_PARTNER",
            Self::CustomerNotEnrolled => "CUSTOMER_NOT_ENROLLED",
            Self::MembershipInactive => "MEMBERSHIP_INACTIVE",
            Self::MembershipExpired => "MEMBERSHIP_EXPIRED",
            Self::MinOrdersNotMet => "MIN_ORDERS_NOT_MET",
            Self::NoDiscountsAvailable => "NO_DISCOUNTS_AVAILABLE",
            Self::InsufficientPoints => "INSUFFICIENT_POINTS",
            Self::BasketTotalTooLow => "BASKET_TOTAL_TOO_LOW",
            Self::InvalidDiscountAmount => "INVALID_DISCOUNT_AMOUNT",
            Self::BasketAlreadyRedeemed => "BASKET_ALREADY_REDEEMED",
            Self::BasketAlreadyCompleted => "BASKET_ALREADY_COMPLETED",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StoreNoLoyalty | Self::StoreNoPartner => ErrorCategory::Configuration,
            Self::InvalidDiscountAmount => ErrorCategory::Input,
            _ => ErrorCategory::Eligibility,
        }
    }

    /// 默认提示文案
    pub fn message(&self) -> &'static str {
        match self {
            Self::StoreNoLoyalty => "门店未开启积分计划",
            Self::StoreNoPartner => "门店未配置积分合作方",
            Self::CustomerNotEnrolled => "顾客未加入该门店的积分计划",
            Self::MembershipInactive => "会员资格未激活",
            Self::MembershipExpired => "会员资格已过期",
            Self::MinOrdersNotMet => "有效订单数未达到兑换要求",
            Self::NoDiscountsAvailable => "门店没有可兑换的抵扣档位",
            Self::InsufficientPoints => "积分不足",
            Self::BasketTotalTooLow => "订单金额低于最小抵扣档位",
            Self::InvalidDiscountAmount => "兑换积分不在允许的档位内",
            Self::BasketAlreadyRedeemed => "该购物篮已兑换过积分",
            Self::BasketAlreadyCompleted => "该购物篮已结单",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 拒绝详情
///
/// 每个原因码对应固定的字段结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum DenialDetails {
    Points { required: i64, available: i64 },
    Orders { required: i32, actual: i32 },
    Expiry { expiry_date: DateTime<Utc> },
    BasketTotal { minimum_required: i64, basket_total: f64 },
    Amount { allowed: Vec<i64>, requested: i64 },
}

/// 一次拒绝：原因码 + 可选详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Denial {
    pub code: ReasonCode,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<DenialDetails>,
}

impl Denial {
    pub fn new(code: ReasonCode) -> Self {
        Self {
            code,
            details: None,
        }
    }

    pub fn with_details(code: ReasonCode, details: DenialDetails) -> Self {
        Self {
            code,
            details: Some(details),
        }
    }

    pub fn insufficient_points(required: i64, available: i64) -> Self {
        Self::with_details(
            ReasonCode::InsufficientPoints,
            DenialDetails::Points {
                required,
                available,
            },
        )
    }

    pub fn invalid_amount(allowed: &[i64], requested: i64) -> Self {
        Self::with_details(
            ReasonCode::InvalidDiscountAmount,
            DenialDetails::Amount {
                allowed: allowed.to_vec(),
                requested,
            },
        )
    }

    pub fn message(&self) -> &'static str {
        self.code.message()
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code.message(), self.code.as_str())
    }
}

/// 资格判定结果
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// 可兑换，携带当前可选的抵扣档位（保持门店配置顺序）
    Eligible { redeem_options: Vec<i64> },
    Denied(Denial),
}

impl Verdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible { .. })
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Denied(d) => Some(d),
            Self::Eligible { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reason_code_serialization() {
        assert_eq!(
            serde_json::to_string(&ReasonCode::StoreNoLoyalty).unwrap(),
            "\"STORE_NO_LOYALTY\""
        );
        assert_eq!(
            serde_json::to_string(&ReasonCode::BasketTotalTooLow).unwrap(),
            format!("\"{}\"", ReasonCode::BasketTotalTooLow.as_str())
        );
    }

    #[test]
    fn test_reason_code_category() {
        assert_eq!(
            ReasonCode::StoreNoPartner.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ReasonCode::InvalidDiscountAmount.category(),
            ErrorCategory::Input
        );
        assert_eq!(
            ReasonCode::InsufficientPoints.category(),
            ErrorCategory::Eligibility
        );
    }

    #[test]
    fn test_details_shape() {
        let d = Denial::invalid_amount(&[50, 100, 200], 75);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["code"], "INVALID_DISCOUNT_AMOUNT");
        assert_eq!(json["details"]["allowed"], serde_json::json!([50, 100, 200]));
        assert_eq!(json["details"]["requested"], 75);

        let d = Denial::with_details(
            ReasonCode::BasketTotalTooLow,
            DenialDetails::BasketTotal {
                minimum_required: 200,
                basket_total: 150.0,
            },
        );
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["details"]["minimumRequired"], 200);
        assert_eq!(json["details"]["basketTotal"], 150.0);

        let expiry = Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap();
        let d = Denial::with_details(
            ReasonCode::MembershipExpired,
            DenialDetails::Expiry {
                expiry_date: expiry,
            },
        );
        let json = serde_json::to_value(&d).unwrap();
        assert!(json["details"]["expiryDate"].is_string());
    }

    #[test]
    fn test_denial_without_details_omits_field() {
        let json = serde_json::to_value(Denial::new(ReasonCode::CustomerNotEnrolled)).unwrap();
        assert!(json.get("details").is_none());
    }
}
