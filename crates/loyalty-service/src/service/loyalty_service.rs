//! 积分服务
//!
//! 对外提供资格检查、积分兑换和结单三个核心操作，以及顾客、流水、购物篮查询。
//!
//! ## 兑换流程
//!
//! 1. 读取购物篮、门店、顾客 -> 2. 购物篮生命周期 -> 3. 门店与会员资格
//!    -> 4. 兑换档位 -> 5. 积分余额 -> 6. 事务内扣减、改价、写流水
//!
//! 资格检查只读，不开启写事务；兑换和结单在超时控制下执行，
//! 超时后事务被丢弃并回滚。

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, Utc};
use sqlx::PgPool;
use tracing::{error, info, instrument};

use loyalty_shared::config::{LedgerConfig, LoyaltyConfig};
use loyalty_shared::observability::metrics;

use crate::eligibility::{check_enrollment, check_redeemable, validate};
use crate::error::{LoyaltyError, Result};
use crate::executor::{AccrualExecutor, AccrualPlan, RedemptionExecutor, RedemptionPlan};
use crate::ledger_id::LedgerIdGenerator;
use crate::models::{Basket, Customer, Denial, Store, Verdict, ledger_balance};
use crate::repository::{
    BasketRepository, BasketRepositoryTrait, CustomerRepository, CustomerRepositoryTrait,
    InMemoryStore, LedgerRepository, LedgerRepositoryTrait, LoyaltyStore, PgLoyaltyStore,
    StoreRepository, StoreRepositoryTrait,
};
use crate::service::dto::{
    BasketView, CheckResponse, CompleteResponse, CustomerSummary, LedgerHistory, RedeemResponse,
};
use crate::tier::{Multipliers, points_for};

/// 积分服务
pub struct LoyaltyService<BR, CR, SR, LR>
where
    BR: BasketRepositoryTrait,
    CR: CustomerRepositoryTrait,
    SR: StoreRepositoryTrait,
    LR: LedgerRepositoryTrait,
{
    basket_repo: Arc<BR>,
    customer_repo: Arc<CR>,
    store_repo: Arc<SR>,
    ledger_repo: Arc<LR>,
    redemption: RedemptionExecutor,
    accrual: AccrualExecutor,
    config: LoyaltyConfig,
}

/// PostgreSQL 后端的积分服务
pub type PgLoyaltyService =
    LoyaltyService<BasketRepository, CustomerRepository, StoreRepository, LedgerRepository>;

/// 进程内后端的积分服务
pub type MemoryLoyaltyService =
    LoyaltyService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;

impl PgLoyaltyService {
    pub fn with_pool(pool: PgPool, loyalty: LoyaltyConfig, ledger: &LedgerConfig) -> Self {
        let store = PgLoyaltyStore::new(
            pool.clone(),
            LedgerIdGenerator::from_config(ledger),
            ledger.counter_name.clone(),
        );

        Self::new(
            Arc::new(BasketRepository::new(pool.clone())),
            Arc::new(CustomerRepository::new(pool.clone())),
            Arc::new(StoreRepository::new(pool.clone())),
            Arc::new(LedgerRepository::new(pool)),
            Arc::new(store),
            loyalty,
        )
    }
}

impl MemoryLoyaltyService {
    pub fn in_memory(store: InMemoryStore, loyalty: LoyaltyConfig) -> Self {
        let store = Arc::new(store);
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            loyalty,
        )
    }
}

impl<BR, CR, SR, LR> LoyaltyService<BR, CR, SR, LR>
where
    BR: BasketRepositoryTrait,
    CR: CustomerRepositoryTrait,
    SR: StoreRepositoryTrait,
    LR: LedgerRepositoryTrait,
{
    pub fn new(
        basket_repo: Arc<BR>,
        customer_repo: Arc<CR>,
        store_repo: Arc<SR>,
        ledger_repo: Arc<LR>,
        store: Arc<dyn LoyaltyStore>,
        config: LoyaltyConfig,
    ) -> Self {
        Self {
            basket_repo,
            customer_repo,
            store_repo,
            ledger_repo,
            redemption: RedemptionExecutor::new(store.clone()),
            accrual: AccrualExecutor::new(store),
            config,
        }
    }

    // ==================== 核心操作 ====================

    /// 兑换资格检查
    ///
    /// 只读操作，重复调用结果一致。门店或会员资格不满足时返回 eligible=false
    /// 及原因码，而不是错误。
    #[instrument(skip(self))]
    pub async fn check(&self, basket_id: &str) -> Result<CheckResponse> {
        let started = Instant::now();
        let (basket, store, customer) = self.load_context(basket_id).await?;

        let multipliers = Multipliers::for_customer(&customer, Local::now().date_naive());
        let partner = store.loyalty_partner.as_ref();
        let reward_rate = partner
            .map(|p| p.reward_rate_or(self.config.default_reward_rate))
            .unwrap_or(self.config.default_reward_rate);
        let discount_type = partner.map(|p| p.discount_type).unwrap_or_default();

        // 已兑换或已结单的购物篮先于资格校验被拒绝
        let verdict = match check_redeemable(&basket) {
            Ok(()) => validate(&customer, &basket, &store, Utc::now()),
            Err(denial) => Verdict::Denied(denial),
        };

        let mut response = CheckResponse {
            basket_id: basket.basket_id.clone(),
            customer_id: customer.customer_id,
            eligible: false,
            reason_code: None,
            message: None,
            details: None,
            redeem_options: Vec::new(),
            multipliers,
            estimated_points: points_for(
                basket.payable_total(),
                reward_rate,
                multipliers.total_multiplier,
            ),
            available_points: customer.points,
            tier: multipliers.tier_name,
        };
        response.apply_verdict(&verdict, discount_type);

        match verdict.denial() {
            Some(denial) => info!(
                basket_id = %basket_id,
                reason = %denial.code,
                "顾客暂不满足兑换条件"
            ),
            None => info!(
                basket_id = %basket_id,
                options = response.redeem_options.len(),
                "顾客可兑换积分"
            ),
        }

        metrics::record_check(response.eligible, started.elapsed().as_secs_f64());
        Ok(response)
    }

    /// 积分兑换
    ///
    /// 兑换积分必须是门店允许的档位且不超过顾客余额；
    /// 实际抵扣不超过订单金额，超出部分不扣除。
    #[instrument(skip(self))]
    pub async fn redeem(&self, basket_id: &str, to_redeem: i64) -> Result<RedeemResponse> {
        let started = Instant::now();
        let result = self.redeem_inner(basket_id, to_redeem).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(response) => {
                info!(
                    basket_id = %basket_id,
                    points_used = response.points_used,
                    remaining_points = response.remaining_points,
                    ledger_id = %response.ledger_id,
                    "积分兑换成功"
                );
                metrics::record_redemption("success", response.points_used, elapsed);
            }
            Err(e) => {
                log_failure("redeem", basket_id, e);
                metrics::record_redemption(e.error_code(), 0, elapsed);
            }
        }

        result
    }

    /// 结单并累计积分
    ///
    /// 门店未开启积分计划时只标记结单，loyalty_applied=false
    #[instrument(skip(self))]
    pub async fn complete(&self, basket_id: &str) -> Result<CompleteResponse> {
        let started = Instant::now();
        let result = self.complete_inner(basket_id).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(response) => {
                info!(
                    basket_id = %basket_id,
                    loyalty_applied = response.loyalty_applied,
                    points_earned = response.points_earned,
                    order_total = response.order_total,
                    "结单完成"
                );
                metrics::record_completion(
                    "success",
                    response.loyalty_applied,
                    response.points_earned,
                    elapsed,
                );
            }
            Err(e) => {
                log_failure("complete", basket_id, e);
                metrics::record_completion(e.error_code(), false, 0, elapsed);
            }
        }

        result
    }

    // ==================== 查询操作 ====================

    /// 按手机号查询顾客积分概览
    #[instrument(skip(self))]
    pub async fn customer_summary(&self, phone: &str) -> Result<CustomerSummary> {
        let customer = self
            .customer_repo
            .get_customer_by_phone(phone)
            .await?
            .ok_or_else(|| LoyaltyError::CustomerNotFound(phone.to_string()))?;

        let multipliers = Multipliers::for_customer(&customer, Local::now().date_naive());

        Ok(CustomerSummary {
            customer_id: customer.customer_id,
            phone: customer.phone,
            name: customer.name,
            points: customer.points,
            tier: customer.tier,
            total_spent: customer.total_spent,
            order_count: customer.order_count,
            multipliers,
            enrollments: customer.loyalty_info,
        })
    }

    /// 查询顾客积分流水，按流水序号升序
    #[instrument(skip(self))]
    pub async fn ledger_history(&self, customer_id: i64) -> Result<LedgerHistory> {
        if self.customer_repo.get_customer(customer_id).await?.is_none() {
            return Err(LoyaltyError::CustomerNotFound(customer_id.to_string()));
        }

        let entries = self.ledger_repo.list_by_customer(customer_id).await?;
        Ok(LedgerHistory {
            customer_id,
            net_points: ledger_balance(&entries),
            entries,
        })
    }

    /// 查询购物篮当前金额及兑换状态
    #[instrument(skip(self))]
    pub async fn basket_view(&self, basket_id: &str) -> Result<BasketView> {
        let basket = self.get_basket(basket_id).await?;
        let payable_total = basket.payable_total();

        Ok(BasketView {
            basket_id: basket.basket_id,
            customer_id: basket.customer_id,
            store_id: basket.store_id,
            items: basket.items,
            subtotal: basket.subtotal,
            delivery_fee: basket.delivery_fee,
            total: basket.total,
            original_total: basket.original_total,
            updated_total: basket.updated_total,
            points_discount: basket.points_discount,
            payable_total,
            redeemed_at: basket.redeemed_at,
            completed_at: basket.completed_at,
        })
    }

    // ==================== 私有方法 ====================

    async fn redeem_inner(&self, basket_id: &str, to_redeem: i64) -> Result<RedeemResponse> {
        // 1. 读取购物篮、门店、顾客
        let (basket, store, customer) = self.load_context(basket_id).await?;

        // 2. 购物篮生命周期
        check_redeemable(&basket)?;

        // 3. 门店与会员资格
        let now = Utc::now();
        let ctx = check_enrollment(&customer, &store, now)?;

        // 4. 兑换档位
        if !ctx.partner.allows(to_redeem) {
            return Err(Denial::invalid_amount(&ctx.partner.allowed_discounts, to_redeem).into());
        }

        // 5. 积分余额
        if customer.points < to_redeem {
            return Err(Denial::insufficient_points(to_redeem, customer.points).into());
        }

        // 6. 事务内执行
        let plan = RedemptionPlan {
            customer: &customer,
            basket: &basket,
            partner: ctx.partner,
            to_redeem,
            now,
        };
        let outcome = self
            .with_timeout("redeem", self.redemption.execute(plan))
            .await?;

        let discount_type = ctx.partner.discount_type;
        Ok(RedeemResponse {
            basket_id: outcome.basket.basket_id.clone(),
            customer_id: customer.customer_id,
            points_used: outcome.points_used,
            remaining_points: outcome.remaining_points,
            original_total: outcome.basket.original_total.unwrap_or(outcome.basket.total),
            updated_total: outcome.basket.payable_total(),
            points_discount: outcome.basket.points_discount.unwrap_or(outcome.points_used),
            discount: discount_type.label(outcome.points_used),
            ledger_id: outcome.ledger_entry.ledger_id,
        })
    }

    async fn complete_inner(&self, basket_id: &str) -> Result<CompleteResponse> {
        let basket = self.get_basket(basket_id).await?;
        // 门店不存在按未开启积分计划处理
        let store = self.store_repo.get_store(&basket.store_id).await?;

        let plan = AccrualPlan {
            customer_id: basket.customer_id,
            basket_id,
            store: store.as_ref(),
            default_reward_rate: self.config.default_reward_rate,
            now: Utc::now(),
            today: Local::now().date_naive(),
        };
        let outcome = self
            .with_timeout("complete", self.accrual.execute(plan))
            .await?;

        Ok(CompleteResponse {
            basket_id: outcome.basket.basket_id,
            customer_id: outcome.customer.customer_id,
            loyalty_applied: outcome.loyalty_applied,
            points_earned: outcome.points_earned,
            remaining_points: outcome.customer.points,
            tier: outcome.customer.tier,
            order_total: outcome.order_total,
            multipliers: outcome.multipliers,
            ledger_id: outcome.ledger_entry.map(|e| e.ledger_id),
        })
    }

    async fn get_basket(&self, basket_id: &str) -> Result<Basket> {
        self.basket_repo
            .get_basket(basket_id)
            .await?
            .ok_or_else(|| LoyaltyError::BasketNotFound(basket_id.to_string()))
    }

    /// 读取购物篮及其门店和顾客
    async fn load_context(&self, basket_id: &str) -> Result<(Basket, Store, Customer)> {
        let basket = self.get_basket(basket_id).await?;

        let store = self
            .store_repo
            .get_store(&basket.store_id)
            .await?
            .ok_or_else(|| LoyaltyError::StoreNotFound(basket.store_id.clone()))?;

        let customer = self
            .customer_repo
            .get_customer(basket.customer_id)
            .await?
            .ok_or_else(|| LoyaltyError::CustomerNotFound(basket.customer_id.to_string()))?;

        Ok((basket, store, customer))
    }

    /// 在事务超时控制下执行，超时后丢弃事务即回滚
    async fn with_timeout<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.transaction_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(LoyaltyError::TransactionTimeout {
                operation,
                timeout_ms: self.config.transaction_timeout_ms,
            }),
        }
    }
}

/// 业务拒绝记 info，系统错误记 error
fn log_failure(operation: &str, basket_id: &str, err: &LoyaltyError) {
    if err.is_business_error() {
        info!(
            operation,
            basket_id = %basket_id,
            code = err.error_code(),
            "请求被拒绝: {}",
            err
        );
    } else {
        error!(
            operation,
            basket_id = %basket_id,
            code = err.error_code(),
            retryable = err.is_retryable(),
            error = %err,
            "请求处理失败，事务已回滚"
        );
    }
}
