//! 兑换资格校验
//!
//! 按固定顺序逐项校验，第一个不满足的条件决定拒绝原因。
//! 顺序本身是对外契约，调用方依赖它得到确定的错误信息：
//!
//! 1. 门店未开启积分计划 → STORE_NO_LOYALTY
//! 2. 门店未配置合作方 → STORE_NO_PARTNER
//! 3. 顾客没有该合作方的会员资格 → CUSTOMER_NOT_ENROLLED
//! 4. 会员资格未激活 → MEMBERSHIP_INACTIVE
//! 5. 会员资格已过期 → MEMBERSHIP_EXPIRED
//! 6. 有效订单数不足 → MIN_ORDERS_NOT_MET
//! 7. 没有可用的抵扣档位 → NO_DISCOUNTS_AVAILABLE / INSUFFICIENT_POINTS / BASKET_TOTAL_TOO_LOW

use chrono::{DateTime, Utc};

use crate::models::{
    Basket, Customer, Denial, DenialDetails, Enrollment, LoyaltyPartner, ReasonCode, Store,
    Verdict,
};

/// 门店与会员资格校验通过后的上下文
#[derive(Debug, Clone, Copy)]
pub struct EnrollmentContext<'a> {
    pub partner: &'a LoyaltyPartner,
    pub partner_id: &'a str,
    pub enrollment: &'a Enrollment,
}

/// 校验 1-6：门店配置和会员资格
pub fn check_enrollment<'a>(
    customer: &'a Customer,
    store: &'a Store,
    now: DateTime<Utc>,
) -> Result<EnrollmentContext<'a>, Denial> {
    // 1. 积分计划开关
    let partner = match store.loyalty_partner.as_ref() {
        Some(p) if p.enabled => p,
        _ => return Err(Denial::new(ReasonCode::StoreNoLoyalty)),
    };

    // 2. 合作方
    let partner_id = partner
        .partner_id()
        .ok_or_else(|| Denial::new(ReasonCode::StoreNoPartner))?;

    // 3. 会员资格
    let enrollment = customer
        .enrollment_for(partner_id)
        .ok_or_else(|| Denial::new(ReasonCode::CustomerNotEnrolled))?;

    // 4. 激活状态
    if !enrollment.membership.is_active() {
        return Err(Denial::new(ReasonCode::MembershipInactive));
    }

    // 5. 有效期
    if let Some(expiry_date) = enrollment.membership.expiry_date.filter(|e| *e < now) {
        return Err(Denial::with_details(
            ReasonCode::MembershipExpired,
            DenialDetails::Expiry { expiry_date },
        ));
    }

    // 6. 有效订单数
    let required = partner.min_orders();
    if enrollment.qualifying_orders < required {
        return Err(Denial::with_details(
            ReasonCode::MinOrdersNotMet,
            DenialDetails::Orders {
                required,
                actual: enrollment.qualifying_orders,
            },
        ));
    }

    Ok(EnrollmentContext {
        partner,
        partner_id,
        enrollment,
    })
}

/// 顾客当前可用的抵扣档位（积分够且不超过订单金额），保持门店配置顺序
pub fn redeem_options(partner: &LoyaltyPartner, points: i64, basket_total: f64) -> Vec<i64> {
    partner
        .allowed_discounts
        .iter()
        .copied()
        .filter(|&d| points >= d && d as f64 <= basket_total)
        .collect()
}

/// 校验 7：没有可用档位时判断具体原因
fn denomination_denial(partner: &LoyaltyPartner, points: i64, basket_total: f64) -> Denial {
    let Some(smallest) = partner.smallest_discount() else {
        return Denial::new(ReasonCode::NoDiscountsAvailable);
    };

    if points < smallest {
        return Denial::insufficient_points(smallest, points);
    }

    Denial::with_details(
        ReasonCode::BasketTotalTooLow,
        DenialDetails::BasketTotal {
            minimum_required: smallest,
            basket_total,
        },
    )
}

/// 完整的资格校验（1-7）
pub fn validate(
    customer: &Customer,
    basket: &Basket,
    store: &Store,
    now: DateTime<Utc>,
) -> Verdict {
    let ctx = match check_enrollment(customer, store, now) {
        Ok(ctx) => ctx,
        Err(denial) => return Verdict::Denied(denial),
    };

    let options = redeem_options(ctx.partner, customer.points, basket.total);
    if options.is_empty() {
        return Verdict::Denied(denomination_denial(ctx.partner, customer.points, basket.total));
    }

    Verdict::Eligible {
        redeem_options: options,
    }
}

/// 购物篮生命周期校验：已结单或已兑换的购物篮不能再兑换
pub fn check_redeemable(basket: &Basket) -> Result<(), Denial> {
    if basket.is_completed() {
        return Err(Denial::new(ReasonCode::BasketAlreadyCompleted));
    }
    if basket.is_redeemed() {
        return Err(Denial::new(ReasonCode::BasketAlreadyRedeemed));
    }
    Ok(())
}

/// 购物篮生命周期校验：结单只能发生一次
pub fn check_completable(basket: &Basket) -> Result<(), Denial> {
    if basket.is_completed() {
        return Err(Denial::new(ReasonCode::BasketAlreadyCompleted));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::models::MembershipStatus;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn code(verdict: &Verdict) -> Option<ReasonCode> {
        verdict.denial().map(|d| d.code)
    }

    #[test]
    fn test_eligible_returns_options_in_store_order() {
        let store = fixtures::store_with_discounts("store_1", "lp_1", &[200, 50, 100]);
        let customer = fixtures::enrolled_customer(1, "lp_1", 500, 5000.0);
        let basket = fixtures::basket("b1", 1, "store_1", 500.0);

        let verdict = validate(&customer, &basket, &store, now());
        assert_eq!(
            verdict,
            Verdict::Eligible {
                redeem_options: vec![200, 50, 100]
            }
        );
    }

    #[test]
    fn test_options_filtered_by_points_and_total() {
        let store = fixtures::store_with_discounts("store_1", "lp_1", &[50, 100, 200]);
        let customer = fixtures::enrolled_customer(1, "lp_1", 150, 5000.0);
        let basket = fixtures::basket("b1", 1, "store_1", 80.0);

        let verdict = validate(&customer, &basket, &store, now());
        assert_eq!(
            verdict,
            Verdict::Eligible {
                redeem_options: vec![50]
            }
        );
    }

    #[test]
    fn test_store_gates_come_first() {
        let mut store = fixtures::store_with_discounts("store_1", "lp_1", &[50]);
        // 顾客同样不满足资格，但门店原因优先
        let customer = fixtures::customer(1, 0, 0.0);
        let basket = fixtures::basket("b1", 1, "store_1", 100.0);

        store.loyalty_partner.as_mut().unwrap().partner_id = None;
        assert_eq!(
            code(&validate(&customer, &basket, &store, now())),
            Some(ReasonCode::StoreNoPartner)
        );

        store.loyalty_partner.as_mut().unwrap().enabled = false;
        assert_eq!(
            code(&validate(&customer, &basket, &store, now())),
            Some(ReasonCode::StoreNoLoyalty)
        );

        store.loyalty_partner = None;
        assert_eq!(
            code(&validate(&customer, &basket, &store, now())),
            Some(ReasonCode::StoreNoLoyalty)
        );
    }

    #[test]
    fn test_not_enrolled_for_other_partner() {
        let store = fixtures::store_with_discounts("store_1", "lp_1", &[50]);
        let customer = fixtures::enrolled_customer(1, "lp_other", 500, 0.0);
        let basket = fixtures::basket("b1", 1, "store_1", 100.0);

        assert_eq!(
            code(&validate(&customer, &basket, &store, now())),
            Some(ReasonCode::CustomerNotEnrolled)
        );
    }

    #[test]
    fn test_inactive_before_expired() {
        let store = fixtures::store_with_discounts("store_1", "lp_1", &[50]);
        let mut customer = fixtures::enrolled_customer(1, "lp_1", 500, 0.0);
        let basket = fixtures::basket("b1", 1, "store_1", 100.0);
        {
            let membership = &mut customer.loyalty_info[0].membership;
            membership.status = MembershipStatus::Suspended;
            membership.expiry_date = Some(now() - Duration::days(1));
        }

        assert_eq!(
            code(&validate(&customer, &basket, &store, now())),
            Some(ReasonCode::MembershipInactive)
        );
    }

    #[test]
    fn test_expired_membership_carries_expiry_date() {
        let store = fixtures::store_with_discounts("store_1", "lp_1", &[50]);
        let mut customer = fixtures::enrolled_customer(1, "lp_1", 500, 0.0);
        let basket = fixtures::basket("b1", 1, "store_1", 100.0);
        let expiry = now() - Duration::seconds(1);
        customer.loyalty_info[0].membership.expiry_date = Some(expiry);

        let verdict = validate(&customer, &basket, &store, now());
        let denial = verdict.denial().unwrap();
        assert_eq!(denial.code, ReasonCode::MembershipExpired);
        assert_eq!(
            denial.details,
            Some(DenialDetails::Expiry {
                expiry_date: expiry
            })
        );

        // 恰好等于 now 不算过期
        customer.loyalty_info[0].membership.expiry_date = Some(now());
        assert!(validate(&customer, &basket, &store, now()).is_eligible());
    }

    #[test]
    fn test_min_orders_not_met() {
        let mut store = fixtures::store_with_discounts("store_1", "lp_1", &[50]);
        store
            .loyalty_partner
            .as_mut()
            .unwrap()
            .validation_rules
            .as_mut()
            .unwrap()
            .min_orders = Some(10);
        let customer = fixtures::enrolled_customer(1, "lp_1", 500, 0.0);
        let basket = fixtures::basket("b1", 1, "store_1", 100.0);

        let verdict = validate(&customer, &basket, &store, now());
        let denial = verdict.denial().unwrap();
        assert_eq!(denial.code, ReasonCode::MinOrdersNotMet);
        assert_eq!(
            denial.details,
            Some(DenialDetails::Orders {
                required: 10,
                actual: customer.loyalty_info[0].qualifying_orders
            })
        );
    }

    #[test]
    fn test_no_discounts_available() {
        let store = fixtures::store_with_discounts("store_1", "lp_1", &[]);
        let customer = fixtures::enrolled_customer(1, "lp_1", 500, 0.0);
        let basket = fixtures::basket("b1", 1, "store_1", 100.0);

        assert_eq!(
            code(&validate(&customer, &basket, &store, now())),
            Some(ReasonCode::NoDiscountsAvailable)
        );
    }

    #[test]
    fn test_insufficient_points_uses_smallest_denomination() {
        let store = fixtures::store_with_discounts("store_1", "lp_1", &[200, 50, 100]);
        let customer = fixtures::enrolled_customer(1, "lp_1", 30, 0.0);
        let basket = fixtures::basket("b1", 1, "store_1", 500.0);

        let verdict = validate(&customer, &basket, &store, now());
        assert_eq!(
            verdict.denial().unwrap(),
            &Denial::insufficient_points(50, 30)
        );
    }

    #[test]
    fn test_basket_total_too_low() {
        let store = fixtures::store_with_discounts("store_1", "lp_1", &[200, 400]);
        let customer = fixtures::enrolled_customer(1, "lp_1", 1000, 0.0);
        let basket = fixtures::basket("b1", 1, "store_1", 150.0);

        let verdict = validate(&customer, &basket, &store, now());
        let denial = verdict.denial().unwrap();
        assert_eq!(denial.code, ReasonCode::BasketTotalTooLow);
        assert_eq!(
            denial.details,
            Some(DenialDetails::BasketTotal {
                minimum_required: 200,
                basket_total: 150.0
            })
        );
    }

    #[test]
    fn test_lifecycle_checks() {
        let mut basket = fixtures::basket("b1", 1, "store_1", 150.0);
        assert!(check_redeemable(&basket).is_ok());
        assert!(check_completable(&basket).is_ok());

        basket.redeemed_at = Some(now());
        assert_eq!(
            check_redeemable(&basket).unwrap_err().code,
            ReasonCode::BasketAlreadyRedeemed
        );
        assert!(check_completable(&basket).is_ok());

        basket.completed_at = Some(now());
        assert_eq!(
            check_redeemable(&basket).unwrap_err().code,
            ReasonCode::BasketAlreadyCompleted
        );
        assert_eq!(
            check_completable(&basket).unwrap_err().code,
            ReasonCode::BasketAlreadyCompleted
        );
    }
}
