//! 积分流水号生成
//!
//! 流水号格式为 `{prefix}{N}`，N 取自持久化的单调计数器。
//! 计数器递增后先检查该流水号是否已被占用，占用则取下一个值，
//! 重试次数有上限，超过上限直接失败。

use async_trait::async_trait;
use loyalty_shared::config::LedgerConfig;
use tracing::warn;

use crate::error::{LoyaltyError, Result};

/// 流水号计数器
///
/// 由存储层在写事务内实现：计数器递增与流水写入处于同一事务时，
/// 计数器行锁保证序号顺序与事务提交顺序一致。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerSequence: Send {
    /// 递增计数器并返回新值
    async fn next_value(&mut self) -> Result<i64>;

    /// 流水号是否已存在
    async fn id_exists(&mut self, ledger_id: &str) -> Result<bool>;
}

/// 流水号生成器
#[derive(Debug, Clone)]
pub struct LedgerIdGenerator {
    prefix: String,
    max_attempts: u32,
}

impl LedgerIdGenerator {
    pub fn new(prefix: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            prefix: prefix.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.id_prefix.clone(), config.max_id_attempts)
    }

    pub fn format(&self, value: i64) -> String {
        format!("{}{}", self.prefix, value)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 生成下一个未被占用的流水号，返回 (序号, 流水号)
    pub async fn generate<S>(&self, sequence: &mut S) -> Result<(i64, String)>
    where
        S: LedgerSequence + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let value = sequence.next_value().await?;
            let ledger_id = self.format(value);

            if !sequence.id_exists(&ledger_id).await? {
                return Ok((value, ledger_id));
            }

            warn!(
                ledger_id = %ledger_id,
                attempt,
                max_attempts = self.max_attempts,
                "流水号已存在，顺延重试"
            );
        }

        Err(LoyaltyError::LedgerIdExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for LedgerIdGenerator {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}
