//! 基础设施错误处理模块
//!
//! 定义配置加载、数据库连接、迁移和可观测性初始化中共享的错误类型。
//! 业务错误由各服务自行定义，这里只覆盖与领域无关的部分。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum InfraError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // ==================== 配置错误 ====================
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 可观测性错误 ====================
    #[error("可观测性初始化失败: {0}")]
    Observability(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, InfraError>;

impl InfraError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Observability(_) => "OBSERVABILITY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 只有连接池耗尽或网络类故障值得重试，配置错误重试没有意义。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolTimedOut)
                | Self::Database(sqlx::Error::Io(_))
                | Self::Database(sqlx::Error::PoolClosed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = InfraError::Observability("recorder already installed".to_string());
        assert_eq!(err.code(), "OBSERVABILITY_ERROR");

        let err = InfraError::Config(config::ConfigError::NotFound("database.url".to_string()));
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = InfraError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let row_err = InfraError::Database(sqlx::Error::RowNotFound);
        assert!(!row_err.is_retryable());

        let internal = InfraError::Internal("boom".to_string());
        assert!(!internal.is_retryable());
    }
}
