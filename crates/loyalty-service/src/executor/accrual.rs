//! 结单积分累计执行器
//!
//! 结单时按实际应付金额、门店返还比例和当天倍率计算获得积分，
//! 在一个写事务内更新顾客、标记购物篮结单并写入获得流水。
//! 门店没有开启的积分合作方时只标记结单，不动积分也不写流水。

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::eligibility::check_completable;
use crate::error::{LoyaltyError, Result};
use crate::models::{
    Basket, BasketPatch, Customer, CustomerPatch, LedgerEntry, LedgerEntryType, NewLedgerEntry,
    Store,
};
use crate::repository::{LoyaltyStore, LoyaltyTransaction};
use crate::tier::{Multipliers, points_for, tier_for_spend};

/// 一次结单所需的数据
#[derive(Debug, Clone, Copy)]
pub struct AccrualPlan<'a> {
    pub customer_id: i64,
    pub basket_id: &'a str,
    /// 门店不存在时为 None，按未开启积分计划处理
    pub store: Option<&'a Store>,
    /// 合作方未配置返还比例时使用
    pub default_reward_rate: f64,
    pub now: DateTime<Utc>,
    /// 计算生日倍率用的本地日期
    pub today: NaiveDate,
}

/// 结单结果
#[derive(Debug, Clone)]
pub struct AccrualOutcome {
    pub loyalty_applied: bool,
    pub points_earned: i64,
    pub order_total: f64,
    /// 结单后的顾客
    pub customer: Customer,
    pub basket: Basket,
    pub multipliers: Option<Multipliers>,
    pub ledger_entry: Option<LedgerEntry>,
}

/// 结单积分累计执行器
pub struct AccrualExecutor {
    store: Arc<dyn LoyaltyStore>,
}

impl AccrualExecutor {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self { store }
    }

    /// 执行结单，任一步失败都回滚整个事务
    pub async fn execute(&self, plan: AccrualPlan<'_>) -> Result<AccrualOutcome> {
        let mut tx = self.store.begin().await?;

        match Self::run(tx.as_mut(), &plan).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "结单事务回滚失败");
                }
                Err(e)
            }
        }
    }

    async fn run(
        tx: &mut dyn LoyaltyTransaction,
        plan: &AccrualPlan<'_>,
    ) -> Result<AccrualOutcome> {
        // 1. 锁定顾客和购物篮（与兑换相同的加锁顺序）
        let customer = tx
            .lock_customer(plan.customer_id)
            .await?
            .ok_or_else(|| LoyaltyError::CustomerNotFound(plan.customer_id.to_string()))?;
        let basket = tx
            .lock_basket(plan.basket_id)
            .await?
            .ok_or_else(|| LoyaltyError::BasketNotFound(plan.basket_id.to_string()))?;

        // 2. 生命周期：只能结单一次
        check_completable(&basket)?;

        let order_total = basket.payable_total();
        let completion = BasketPatch::completion(plan.now);

        // 3. 没有开启的积分合作方：只标记结单
        let Some(partner) = plan.store.and_then(|s| s.active_partner()) else {
            let basket = tx.update_basket(plan.basket_id, &completion).await?;
            debug!(basket_id = %plan.basket_id, "门店未开启积分计划，仅标记结单");
            return Ok(AccrualOutcome {
                loyalty_applied: false,
                points_earned: 0,
                order_total,
                customer,
                basket,
                multipliers: None,
                ledger_entry: None,
            });
        };

        // 4. 按结单时的累计消费和日期计算倍率
        let multipliers = Multipliers::for_customer(&customer, plan.today);
        let reward_rate = partner.reward_rate_or(plan.default_reward_rate);
        let points_earned = points_for(order_total, reward_rate, multipliers.total_multiplier);

        // 5. 更新顾客：积分、消费、订单数，等级按新的累计消费重算
        let new_tier = tier_for_spend(customer.total_spent + order_total);
        let patch = CustomerPatch::accrue(points_earned, order_total, new_tier);
        let updated = tx
            .update_customer(customer.customer_id, &patch)
            .await?
            .ok_or_else(|| LoyaltyError::CustomerNotFound(customer.customer_id.to_string()))?;

        // 6. 标记结单
        let basket = tx.update_basket(plan.basket_id, &completion).await?;

        // 7. 获得流水，记录结单时的等级、倍率和返还比例
        let ledger_entry = tx
            .append_ledger(NewLedgerEntry {
                customer_id: customer.customer_id,
                phone: Some(customer.phone.clone()),
                basket_id: basket.basket_id.clone(),
                store_id: basket.store_id.clone(),
                entry_type: LedgerEntryType::Earn,
                points: points_earned,
                order_amount: order_total,
                tier: multipliers.tier_name,
                multiplier: Some(multipliers.total_multiplier),
                reward_rate: Some(reward_rate),
                discount_type: None,
                reason: format!("订单 {:.2} 结单获得积分", order_total),
                created_at: plan.now,
            })
            .await?;

        debug!(
            basket_id = %plan.basket_id,
            points_earned,
            multiplier = multipliers.total_multiplier,
            "结单写入完成，等待提交"
        );

        Ok(AccrualOutcome {
            loyalty_applied: true,
            points_earned,
            order_total,
            customer: updated,
            basket,
            multipliers: Some(multipliers),
            ledger_entry: Some(ledger_entry),
        })
    }
}
