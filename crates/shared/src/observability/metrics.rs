//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集。
//! 业务代码只调用这里的记录函数，未安装 recorder 时所有记录都是空操作。

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use crate::error::{InfraError, Result};

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 安装 Prometheus recorder 并注册指标描述
pub fn init(service_name: &str) -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| InfraError::Observability(e.to_string()))?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_loyalty_metrics(service_name);

    Ok(handle)
}

/// 注册积分业务指标
fn register_loyalty_metrics(service_name: &str) {
    metrics::describe_counter!("loyalty_checks_total", "Total number of eligibility checks");
    metrics::describe_counter!("loyalty_redemptions_total", "Total number of redemptions");
    metrics::describe_counter!("loyalty_completions_total", "Total number of order completions");
    metrics::describe_counter!(
        "loyalty_points_redeemed_total",
        "Total points deducted by redemptions"
    );
    metrics::describe_counter!(
        "loyalty_points_earned_total",
        "Total points credited by completions"
    );
    metrics::describe_histogram!(
        "loyalty_operation_duration_seconds",
        "Loyalty operation duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录资格检查
#[inline]
pub fn record_check(eligible: bool, duration_secs: f64) {
    metrics::counter!("loyalty_checks_total", "eligible" => eligible.to_string()).increment(1);
    metrics::histogram!("loyalty_operation_duration_seconds", "operation" => "check")
        .record(duration_secs);
}

/// 记录兑换结果
///
/// outcome 为 success 或拒绝/错误码
#[inline]
pub fn record_redemption(outcome: &str, points: i64, duration_secs: f64) {
    metrics::counter!("loyalty_redemptions_total", "outcome" => outcome.to_string()).increment(1);
    if points > 0 {
        metrics::counter!("loyalty_points_redeemed_total").increment(points as u64);
    }
    metrics::histogram!("loyalty_operation_duration_seconds", "operation" => "redeem")
        .record(duration_secs);
}

/// 记录结单结果
///
/// outcome 同兑换；失败的结单 loyalty_applied 为 false
#[inline]
pub fn record_completion(outcome: &str, loyalty_applied: bool, points: i64, duration_secs: f64) {
    metrics::counter!(
        "loyalty_completions_total",
        "outcome" => outcome.to_string(),
        "loyalty_applied" => loyalty_applied.to_string()
    )
    .increment(1);
    if points > 0 {
        metrics::counter!("loyalty_points_earned_total").increment(points as u64);
    }
    metrics::histogram!("loyalty_operation_duration_seconds", "operation" => "complete")
        .record(duration_secs);
}
