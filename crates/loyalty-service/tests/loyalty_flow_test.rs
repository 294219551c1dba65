//! 积分兑换与累计流程集成测试
//!
//! 使用进程内存储跑完整的 检查 -> 兑换 -> 结单 流程，无需外部依赖

use std::sync::Arc;

use chrono::Utc;
use fake::Fake;
use fake::faker::name::en::Name;
use futures::future::join_all;
use metrics_exporter_prometheus::PrometheusBuilder;

use loyalty::executor::{RedemptionExecutor, RedemptionPlan};
use loyalty::fixtures;
use loyalty::models::{LedgerEntryType, ReasonCode, Tier};
use loyalty::repository::{InMemoryStore, LoyaltyStore};
use loyalty::{LoyaltyError, MemoryLoyaltyService};
use loyalty_shared::config::LoyaltyConfig;

// ==================== 测试辅助 ====================

const STORE: &str = "store_001";
const PARTNER: &str = "lp_anna_001";

/// 门店档位 50/100/200；顾客 120 分、累计消费 300（bronze）；购物篮 400
fn setup() -> (InMemoryStore, MemoryLoyaltyService) {
    let store = InMemoryStore::default();
    store.insert_store(fixtures::store_with_discounts(STORE, PARTNER, &[50, 100, 200]));
    store.insert_customer(fixtures::enrolled_customer(1, PARTNER, 120, 300.0));
    store.insert_basket(fixtures::basket("basket_001", 1, STORE, 400.0));

    let service = MemoryLoyaltyService::in_memory(store.clone(), LoyaltyConfig::default());
    (store, service)
}

fn reason_of(err: &LoyaltyError) -> ReasonCode {
    match err.reason_code() {
        Some(code) => code,
        None => panic!("预期业务拒绝，实际为 {:?}", err),
    }
}

// ==================== 资格检查 ====================

#[tokio::test]
async fn test_check_lists_affordable_options() {
    let (_, service) = setup();

    let response = service.check("basket_001").await.unwrap();

    assert!(response.eligible);
    assert!(response.reason_code.is_none());
    let points: Vec<i64> = response.redeem_options.iter().map(|o| o.points).collect();
    assert_eq!(points, vec![50, 100]);
    assert_eq!(response.redeem_options[0].discount, "50 OFF");
    assert_eq!(response.tier, Tier::Bronze);
    assert_eq!(response.available_points, 120);
    // 400 * 0.1 * 1.0
    assert_eq!(response.estimated_points, 40);
}

#[tokio::test]
async fn test_check_is_read_only() {
    let (store, service) = setup();

    let first = service.check("basket_001").await.unwrap();
    let second = service.check("basket_001").await.unwrap();

    assert_eq!(first.eligible, second.eligible);
    assert_eq!(first.redeem_options, second.redeem_options);
    assert_eq!(store.customer(1).unwrap().points, 120);
    assert!(store.ledger_entries().is_empty());
}

#[tokio::test]
async fn test_check_reports_denial_instead_of_error() {
    let (store, service) = setup();
    store.insert_customer(fixtures::customer(2, 500, 0.0));
    store.insert_basket(fixtures::basket("basket_002", 2, STORE, 400.0));

    let response = service.check("basket_002").await.unwrap();

    assert!(!response.eligible);
    assert_eq!(response.reason_code, Some(ReasonCode::CustomerNotEnrolled));
    assert!(response.redeem_options.is_empty());
}

#[tokio::test]
async fn test_missing_entities_are_errors() {
    let (store, service) = setup();
    store.insert_basket(fixtures::basket("orphan_store", 1, "store_404", 100.0));
    store.insert_basket(fixtures::basket("orphan_customer", 404, STORE, 100.0));

    let err = service.check("basket_404").await.unwrap_err();
    assert_eq!(err.error_code(), "BASKET_NOT_FOUND");

    let err = service.check("orphan_store").await.unwrap_err();
    assert_eq!(err.error_code(), "STORE_NOT_FOUND");

    let err = service.redeem("orphan_customer", 50).await.unwrap_err();
    assert_eq!(err.error_code(), "CUSTOMER_NOT_FOUND");
}

// ==================== 兑换 ====================

#[tokio::test]
async fn test_redeem_updates_balance_basket_and_ledger() {
    let (store, service) = setup();

    let response = service.redeem("basket_001", 100).await.unwrap();

    assert_eq!(response.points_used, 100);
    assert_eq!(response.remaining_points, 20);
    assert_eq!(response.original_total, 400.0);
    assert_eq!(response.updated_total, 300.0);
    assert_eq!(response.discount, "100 OFF");
    assert_eq!(response.ledger_id, "ledger_1");

    let basket = store.basket("basket_001").unwrap();
    assert_eq!(basket.total, 400.0);
    assert_eq!(basket.updated_total, Some(300.0));
    assert!(basket.redeemed_at.is_some());

    let entries = store.ledger_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, LedgerEntryType::Redeem);
    assert_eq!(entries[0].points, -100);
    assert_eq!(entries[0].order_amount, 100.0);
}

#[tokio::test]
async fn test_redeem_rejects_amount_outside_allowed_set() {
    let (store, service) = setup();

    let err = service.redeem("basket_001", 75).await.unwrap_err();

    assert_eq!(reason_of(&err), ReasonCode::InvalidDiscountAmount);
    assert_eq!(store.customer(1).unwrap().points, 120);
    assert!(store.basket("basket_001").unwrap().redeemed_at.is_none());
    assert!(store.ledger_entries().is_empty());
    assert_eq!(store.ledger_counter(), 0);
}

#[tokio::test]
async fn test_redeem_rejects_more_than_balance() {
    let (store, service) = setup();

    let err = service.redeem("basket_001", 200).await.unwrap_err();

    assert_eq!(reason_of(&err), ReasonCode::InsufficientPoints);
    assert_eq!(store.customer(1).unwrap().points, 120);
}

#[tokio::test]
async fn test_basket_redeems_only_once() {
    let (store, service) = setup();

    service.redeem("basket_001", 50).await.unwrap();
    let err = service.redeem("basket_001", 50).await.unwrap_err();

    assert_eq!(reason_of(&err), ReasonCode::BasketAlreadyRedeemed);
    assert_eq!(store.customer(1).unwrap().points, 70);
    assert_eq!(store.ledger_entries().len(), 1);

    let check = service.check("basket_001").await.unwrap();
    assert!(!check.eligible);
    assert_eq!(check.reason_code, Some(ReasonCode::BasketAlreadyRedeemed));
}

#[tokio::test]
async fn test_redemption_capped_at_basket_total() {
    let store = InMemoryStore::default();
    let shop = fixtures::store_with_discounts(STORE, PARTNER, &[200, 400, 600]);
    let customer = fixtures::enrolled_customer(1, PARTNER, 1000, 300.0);
    let basket = fixtures::basket("basket_001", 1, STORE, 500.0);
    store.insert_store(shop.clone());
    store.insert_customer(customer.clone());
    store.insert_basket(basket.clone());

    let executor = RedemptionExecutor::new(Arc::new(store.clone()) as Arc<dyn LoyaltyStore>);
    let outcome = executor
        .execute(RedemptionPlan {
            customer: &customer,
            basket: &basket,
            partner: shop.loyalty_partner.as_ref().unwrap(),
            to_redeem: 600,
            now: Utc::now(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.points_used, 500);
    assert_eq!(outcome.remaining_points, 500);
    assert_eq!(outcome.basket.updated_total, Some(0.0));
    assert_eq!(outcome.ledger_entry.points, -500);
    assert_eq!(store.customer(1).unwrap().points, 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redeem_never_overdraws() {
    let store = InMemoryStore::default();
    store.insert_store(fixtures::store_with_discounts(STORE, PARTNER, &[100]));
    store.insert_customer(fixtures::enrolled_customer(1, PARTNER, 200, 300.0));
    let basket_ids: Vec<String> = (0..4).map(|i| format!("basket_{}", i)).collect();
    for id in &basket_ids {
        store.insert_basket(fixtures::basket(id, 1, STORE, 400.0));
    }
    let service = Arc::new(MemoryLoyaltyService::in_memory(
        store.clone(),
        LoyaltyConfig::default(),
    ));

    let tasks = basket_ids.iter().cloned().map(|id| {
        let service = service.clone();
        tokio::spawn(async move { service.redeem(&id, 100).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(reason_of(err), ReasonCode::InsufficientPoints);
    }

    assert_eq!(store.customer(1).unwrap().points, 0);
    assert_eq!(store.ledger_entries().len(), 2);
}

// ==================== 结单 ====================

#[tokio::test]
async fn test_complete_after_redeem_earns_on_payable_total() {
    let (store, service) = setup();

    service.redeem("basket_001", 100).await.unwrap();
    let response = service.complete("basket_001").await.unwrap();

    assert!(response.loyalty_applied);
    // (400 - 100) * 0.1 * 1.0
    assert_eq!(response.points_earned, 30);
    assert_eq!(response.order_total, 300.0);
    assert_eq!(response.remaining_points, 50);
    assert_eq!(response.ledger_id.as_deref(), Some("ledger_2"));

    let customer = store.customer(1).unwrap();
    assert_eq!(customer.points, 50);
    assert_eq!(customer.total_spent, 600.0);
    assert_eq!(customer.order_count, 1);
    assert!(store.basket("basket_001").unwrap().completed_at.is_some());

    let history = service.ledger_history(1).await.unwrap();
    let kinds: Vec<LedgerEntryType> = history.entries.iter().map(|e| e.entry_type).collect();
    assert_eq!(kinds, vec![LedgerEntryType::Redeem, LedgerEntryType::Earn]);
    assert_eq!(history.net_points, 50 - 120);
}

#[tokio::test]
async fn test_complete_promotes_tier() {
    let (store, service) = setup();
    store.insert_customer(fixtures::enrolled_customer(3, PARTNER, 0, 2_000.0));
    store.insert_basket(fixtures::basket("basket_big", 3, STORE, 600.0));

    let response = service.complete("basket_big").await.unwrap();

    // 结单前为 bronze，倍率 1.0
    assert_eq!(response.points_earned, 60);
    assert_eq!(response.tier, Tier::Silver);
    assert_eq!(store.customer(3).unwrap().tier, Tier::Silver);
}

#[tokio::test]
async fn test_complete_without_loyalty_only_marks_completed() {
    let (store, service) = setup();
    store.insert_store(fixtures::store_without_loyalty("store_002"));
    store.insert_basket(fixtures::basket("basket_plain", 1, "store_002", 250.0));

    let response = service.complete("basket_plain").await.unwrap();

    assert!(!response.loyalty_applied);
    assert_eq!(response.points_earned, 0);
    assert!(response.ledger_id.is_none());
    assert_eq!(store.customer(1).unwrap().points, 120);
    assert!(store.basket("basket_plain").unwrap().completed_at.is_some());
    assert!(store.ledger_entries().is_empty());

    let err = service.complete("basket_plain").await.unwrap_err();
    assert_eq!(reason_of(&err), ReasonCode::BasketAlreadyCompleted);
}

#[tokio::test]
async fn test_completed_basket_cannot_redeem() {
    let (store, service) = setup();

    service.complete("basket_001").await.unwrap();
    let err = service.redeem("basket_001", 50).await.unwrap_err();

    assert_eq!(reason_of(&err), ReasonCode::BasketAlreadyCompleted);
    assert_eq!(store.ledger_entries().len(), 1);
}

// ==================== 查询 ====================

#[tokio::test]
async fn test_customer_summary_by_phone() {
    let (store, service) = setup();
    let mut customer = fixtures::enrolled_customer(7, PARTNER, 295, 9_450.0);
    customer.name = Name().fake();
    store.insert_customer(customer.clone());

    let summary = service.customer_summary(&customer.phone).await.unwrap();

    assert_eq!(summary.customer_id, 7);
    assert_eq!(summary.name, customer.name);
    assert_eq!(summary.tier, Tier::Silver);
    assert_eq!(summary.enrollments.len(), 1);

    let err = service.customer_summary("+910000000000").await.unwrap_err();
    assert_eq!(err.error_code(), "CUSTOMER_NOT_FOUND");
}

#[tokio::test]
async fn test_basket_view_tracks_lifecycle() {
    let (_, service) = setup();

    let view = service.basket_view("basket_001").await.unwrap();
    assert_eq!(view.payable_total, 400.0);
    assert!(view.redeemed_at.is_none());

    service.redeem("basket_001", 50).await.unwrap();
    service.complete("basket_001").await.unwrap();

    let view = service.basket_view("basket_001").await.unwrap();
    assert_eq!(view.payable_total, 350.0);
    assert_eq!(view.points_discount, Some(50));
    assert!(view.redeemed_at.is_some());
    assert!(view.completed_at.is_some());
}

#[tokio::test]
async fn test_ledger_history_unknown_customer() {
    let (_, service) = setup();

    let err = service.ledger_history(404).await.unwrap_err();
    assert_eq!(err.error_code(), "CUSTOMER_NOT_FOUND");
}

// ==================== 超时与指标 ====================

#[tokio::test]
async fn test_timeout_while_writer_busy_leaves_state_untouched() {
    let (store, _) = setup();
    let service = MemoryLoyaltyService::in_memory(
        store.clone(),
        LoyaltyConfig {
            transaction_timeout_ms: 20,
            ..Default::default()
        },
    );

    // 另一个写事务占住存储，兑换和结单都等不到事务开始
    let held = store.begin().await.unwrap();

    let err = service.redeem("basket_001", 100).await.unwrap_err();
    assert_eq!(err.error_code(), "TRANSACTION_TIMEOUT");
    assert!(err.is_retryable());

    let err = service.complete("basket_001").await.unwrap_err();
    assert_eq!(err.error_code(), "TRANSACTION_TIMEOUT");

    drop(held);

    let customer = store.customer(1).unwrap();
    assert_eq!(customer.points, 120);
    assert_eq!(customer.total_spent, 300.0);
    assert_eq!(customer.order_count, 0);
    let basket = store.basket("basket_001").unwrap();
    assert!(basket.redeemed_at.is_none());
    assert!(basket.completed_at.is_none());
    assert!(basket.updated_total.is_none());
    assert!(store.ledger_entries().is_empty());
    assert_eq!(store.ledger_counter(), 0);

    // 写锁释放后同一请求可以重试成功
    let response = service.redeem("basket_001", 100).await.unwrap();
    assert_eq!(response.ledger_id, "ledger_1");
}

#[test]
fn test_failed_completion_is_counted() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let (_, service) = setup();

    metrics::with_local_recorder(&recorder, || {
        tokio_test::block_on(async {
            service.complete("basket_001").await.unwrap();
            let err = service.complete("basket_001").await.unwrap_err();
            assert_eq!(err.error_code(), "BASKET_ALREADY_COMPLETED");
        })
    });

    let rendered = handle.render();
    let completions: Vec<&str> = rendered
        .lines()
        .filter(|l| l.starts_with("loyalty_completions_total"))
        .collect();
    assert!(completions.iter().any(|l| l.contains("outcome=\"success\"")));
    assert!(
        completions
            .iter()
            .any(|l| l.contains("outcome=\"BASKET_ALREADY_COMPLETED\""))
    );

    let complete_timings = rendered
        .lines()
        .filter(|l| l.starts_with("loyalty_operation_duration_seconds_count"))
        .find(|l| l.contains("operation=\"complete\""));
    assert!(matches!(complete_timings, Some(line) if line.ends_with(" 2")));
}
