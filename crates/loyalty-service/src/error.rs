//! 积分服务错误类型
//!
//! 定义服务层的配置错误、资格拒绝、输入错误和系统错误

use loyalty_shared::error::InfraError;
use thiserror::Error;

use crate::models::{Denial, ErrorCategory, ReasonCode};

/// 积分服务错误类型
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // === 配置错误 ===
    #[error("门店不存在: {0}")]
    StoreNotFound(String),

    // === 资格拒绝（含兑换档位不合法） ===
    #[error("{0}")]
    Denied(Denial),

    // === 输入错误 ===
    #[error("购物篮不存在: {0}")]
    BasketNotFound(String),

    #[error("顾客不存在: {0}")]
    CustomerNotFound(String),

    // === 一致性错误 ===
    #[error("并发冲突: 购物篮 {basket_id} 金额已变化 (校验时 {expected}, 当前 {actual})")]
    ConcurrencyConflict {
        basket_id: String,
        expected: f64,
        actual: f64,
    },

    #[error("流水号生成失败: 连续 {attempts} 次冲突")]
    LedgerIdExhausted { attempts: u32 },

    #[error("事务超时: {operation} 超过 {timeout_ms}ms 已回滚")]
    TransactionTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("基础设施错误: {0}")]
    Infra(#[from] InfraError),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 积分服务 Result 类型别名
pub type Result<T> = std::result::Result<T, LoyaltyError>;

impl From<Denial> for LoyaltyError {
    fn from(denial: Denial) -> Self {
        Self::Denied(denial)
    }
}

impl LoyaltyError {
    /// 错误分类
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StoreNotFound(_) => ErrorCategory::Configuration,
            Self::Denied(denial) => denial.code.category(),
            Self::BasketNotFound(_) | Self::CustomerNotFound(_) => ErrorCategory::Input,
            _ => ErrorCategory::System,
        }
    }

    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::ConcurrencyConflict { .. } | Self::TransactionTimeout { .. }
        )
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        self.category() != ErrorCategory::System
    }

    /// 拒绝原因码（仅资格拒绝有）
    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            Self::Denied(denial) => Some(denial.code),
            _ => None,
        }
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::StoreNotFound(_) => "STORE_NOT_FOUND",
            Self::Denied(denial) => denial.code.as_str(),
            Self::BasketNotFound(_) => "BASKET_NOT_FOUND",
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::LedgerIdExhausted { .. } => "LEDGER_ID_EXHAUSTED",
            Self::TransactionTimeout { .. } => "TRANSACTION_TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Infra(_) => "INFRASTRUCTURE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 兼容旧版 API 的数字错误码
    pub fn numeric_code(&self) -> u16 {
        match self {
            Self::BasketNotFound(_) => 2001,
            Self::StoreNotFound(_) => 2002,
            Self::CustomerNotFound(_) => 3001,
            Self::Denied(denial) => match denial.code {
                ReasonCode::InsufficientPoints => 3002,
                ReasonCode::InvalidDiscountAmount => 4001,
                ReasonCode::StoreNoLoyalty | ReasonCode::StoreNoPartner => 2002,
                _ => 4002,
            },
            Self::Database(_) => 5002,
            _ => 5001,
        }
    }

    /// 对外展示的错误信息
    ///
    /// 系统错误统一返回通用提示，详细上下文只进日志
    pub fn public_message(&self) -> String {
        if self.is_business_error() {
            self.to_string()
        } else {
            "服务器内部错误，请稍后重试".to_string()
        }
    }
}
