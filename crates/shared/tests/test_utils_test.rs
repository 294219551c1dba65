//! test_utils 与配置模块的集成测试
//!
//! 验证测试工具生成的 ID 互不冲突，以及配置校验的取值范围

use std::collections::HashSet;
use std::thread;

use loyalty_shared::config::AppConfig;
use loyalty_shared::test_utils::*;

// ==================== 唯一 ID ====================

#[test]
fn test_customer_ids_unique_across_threads() {
    let handles: Vec<_> = (0..4)
        .map(|_| thread::spawn(|| (0..250).map(|_| test_customer_id()).collect::<Vec<_>>()))
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "重复的顾客 ID: {}", id);
        }
    }
    assert_eq!(seen.len(), 1000);
}

#[test]
fn test_string_ids_unique() {
    let baskets: HashSet<_> = (0..100).map(|_| test_basket_id()).collect();
    let stores: HashSet<_> = (0..100).map(|_| test_store_id()).collect();
    assert_eq!(baskets.len(), 100);
    assert_eq!(stores.len(), 100);
}

// ==================== 配置 ====================

#[test]
fn test_test_config_is_valid() {
    let config = test_app_config();
    assert!(config.validate().is_ok());
    assert!(!config.is_production());
    assert!(config.database.url.starts_with("postgres://"));
}

#[test]
fn test_validate_rejects_out_of_range_values() {
    let mut config = AppConfig::default();
    config.ledger.max_id_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.ledger.id_prefix = String::new();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.loyalty.default_reward_rate = 1.5;
    assert!(config.validate().is_err());
}

#[test]
fn test_production_flag() {
    let config = AppConfig {
        environment: "production".to_string(),
        ..Default::default()
    };
    assert!(config.is_production());
}
