//! 积分兑换执行器
//!
//! 在一个写事务内完成积分扣减、购物篮改价和兑换流水。
//! 调用方负责事先校验兑换档位和积分余额；执行器在锁定数据后重新确认
//! 购物篮金额未变、购物篮未兑换未结单，扣减本身是条件更新。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::eligibility::check_redeemable;
use crate::error::{LoyaltyError, Result};
use crate::models::{
    Basket, BasketPatch, Customer, CustomerPatch, Denial, LedgerEntry, LedgerEntryType,
    LoyaltyPartner, NewLedgerEntry,
};
use crate::repository::{LoyaltyStore, LoyaltyTransaction};
use crate::tier::{floor_points, tier_for_spend};

/// 一次兑换所需的已校验数据
#[derive(Debug, Clone, Copy)]
pub struct RedemptionPlan<'a> {
    pub customer: &'a Customer,
    /// 校验时读到的购物篮
    pub basket: &'a Basket,
    pub partner: &'a LoyaltyPartner,
    pub to_redeem: i64,
    pub now: DateTime<Utc>,
}

/// 兑换结果
#[derive(Debug, Clone)]
pub struct RedemptionOutcome {
    pub points_used: i64,
    pub remaining_points: i64,
    pub basket: Basket,
    pub ledger_entry: LedgerEntry,
}

/// 实际可抵扣的积分：不超过订单金额（向下取整）
pub fn max_redeemable(to_redeem: i64, basket_total: f64) -> i64 {
    to_redeem.min(floor_points(basket_total)).max(0)
}

/// 积分兑换执行器
pub struct RedemptionExecutor {
    store: Arc<dyn LoyaltyStore>,
}

impl RedemptionExecutor {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self { store }
    }

    /// 执行兑换，任一步失败都回滚整个事务
    pub async fn execute(&self, plan: RedemptionPlan<'_>) -> Result<RedemptionOutcome> {
        let mut tx = self.store.begin().await?;

        match Self::run(tx.as_mut(), &plan).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "兑换事务回滚失败");
                }
                Err(e)
            }
        }
    }

    async fn run(
        tx: &mut dyn LoyaltyTransaction,
        plan: &RedemptionPlan<'_>,
    ) -> Result<RedemptionOutcome> {
        let customer_id = plan.customer.customer_id;
        let basket_id = plan.basket.basket_id.as_str();

        // 1. 锁定顾客和购物篮（固定顺序：先顾客后购物篮）
        let customer = tx
            .lock_customer(customer_id)
            .await?
            .ok_or_else(|| LoyaltyError::CustomerNotFound(customer_id.to_string()))?;
        let basket = tx
            .lock_basket(basket_id)
            .await?
            .ok_or_else(|| LoyaltyError::BasketNotFound(basket_id.to_string()))?;

        // 2. 购物篮金额必须与校验时一致
        if basket.total != plan.basket.total {
            return Err(LoyaltyError::ConcurrencyConflict {
                basket_id: basket_id.to_string(),
                expected: plan.basket.total,
                actual: basket.total,
            });
        }

        // 3. 生命周期
        check_redeemable(&basket)?;

        // 4. 条件扣减积分，等级按未变化的累计消费重算
        let points = max_redeemable(plan.to_redeem, basket.total);
        let patch = CustomerPatch::redeem(points, tier_for_spend(customer.total_spent));
        let updated = tx
            .update_customer(customer_id, &patch)
            .await?
            .ok_or_else(|| Denial::insufficient_points(points, customer.points))?;

        // 5. 购物篮改价
        let basket = tx
            .update_basket(basket_id, &BasketPatch::redemption(basket.total, points, plan.now))
            .await?;

        // 6. 兑换流水
        let discount_type = plan.partner.discount_type;
        let ledger_entry = tx
            .append_ledger(NewLedgerEntry {
                customer_id,
                phone: Some(updated.phone.clone()),
                basket_id: basket.basket_id.clone(),
                store_id: basket.store_id.clone(),
                entry_type: LedgerEntryType::Redeem,
                points: -points,
                order_amount: points as f64,
                tier: updated.tier,
                multiplier: None,
                reward_rate: None,
                discount_type: Some(discount_type),
                reason: format!("积分抵扣 {}", discount_type.label(points)),
                created_at: plan.now,
            })
            .await?;

        debug!(
            basket_id = %basket_id,
            points,
            remaining = updated.points,
            "兑换写入完成，等待提交"
        );

        Ok(RedemptionOutcome {
            points_used: points,
            remaining_points: updated.points,
            basket,
            ledger_entry,
        })
    }
}
