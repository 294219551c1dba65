//! 命令执行器
//!
//! 把业务子命令转成服务调用，结果统一输出为 JSON。
//! 迁移和导入依赖具体存储后端，由入口函数处理。

use serde::Serialize;

use crate::cli::commands::Commands;
use crate::error::{LoyaltyError, Result};
use crate::models::DenialDetails;
use crate::repository::{
    BasketRepositoryTrait, CustomerRepositoryTrait, LedgerRepositoryTrait, StoreRepositoryTrait,
};
use crate::service::LoyaltyService;

/// 错误输出
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub numeric_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<DenialDetails>,
}

impl From<&LoyaltyError> for ErrorBody {
    fn from(err: &LoyaltyError) -> Self {
        let details = match err {
            LoyaltyError::Denied(denial) => denial.details.clone(),
            _ => None,
        };
        Self {
            code: err.error_code(),
            numeric_code: err.numeric_code(),
            message: err.public_message(),
            details,
        }
    }
}

/// 命令执行器
pub struct CommandRunner<BR, CR, SR, LR>
where
    BR: BasketRepositoryTrait,
    CR: CustomerRepositoryTrait,
    SR: StoreRepositoryTrait,
    LR: LedgerRepositoryTrait,
{
    service: LoyaltyService<BR, CR, SR, LR>,
}

impl<BR, CR, SR, LR> CommandRunner<BR, CR, SR, LR>
where
    BR: BasketRepositoryTrait,
    CR: CustomerRepositoryTrait,
    SR: StoreRepositoryTrait,
    LR: LedgerRepositoryTrait,
{
    pub fn new(service: LoyaltyService<BR, CR, SR, LR>) -> Self {
        Self { service }
    }

    /// 执行业务子命令，返回 JSON 结果
    pub async fn run(&self, command: &Commands) -> Result<serde_json::Value> {
        let value = match command {
            Commands::Check { basket_id } => {
                serde_json::to_value(self.service.check(basket_id).await?)?
            }
            Commands::Redeem { basket_id, points } => {
                serde_json::to_value(self.service.redeem(basket_id, *points).await?)?
            }
            Commands::Complete { basket_id } => {
                serde_json::to_value(self.service.complete(basket_id).await?)?
            }
            Commands::Ledger { customer_id } => {
                serde_json::to_value(self.service.ledger_history(*customer_id).await?)?
            }
            Commands::Customer { phone } => {
                serde_json::to_value(self.service.customer_summary(phone).await?)?
            }
            Commands::Basket { basket_id } => {
                serde_json::to_value(self.service.basket_view(basket_id).await?)?
            }
            Commands::Migrate | Commands::Seed { .. } => {
                return Err(LoyaltyError::Internal(
                    "迁移和导入命令不经过积分服务执行".to_string(),
                ));
            }
        };

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::repository::InMemoryStore;
    use loyalty_shared::config::LoyaltyConfig;

    fn runner() -> CommandRunner<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore> {
        let store = InMemoryStore::default();
        store.insert_store(fixtures::store_with_discounts("store_1", "lp_1", &[50, 100]));
        store.insert_customer(fixtures::enrolled_customer(1, "lp_1", 120, 300.0));
        store.insert_basket(fixtures::basket("b1", 1, "store_1", 400.0));
        CommandRunner::new(LoyaltyService::in_memory(store, LoyaltyConfig::default()))
    }

    #[tokio::test]
    async fn test_run_redeem_then_view_basket() {
        let runner = runner();

        let redeemed = runner
            .run(&Commands::Redeem {
                basket_id: "b1".to_string(),
                points: 100,
            })
            .await
            .unwrap();
        assert_eq!(redeemed["pointsUsed"], 100);
        assert_eq!(redeemed["remainingPoints"], 20);
        assert_eq!(redeemed["ledgerId"], "ledger_1");

        let basket = runner
            .run(&Commands::Basket {
                basket_id: "b1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(basket["payableTotal"], 300.0);
        assert_eq!(basket["pointsDiscount"], 100);
    }

    #[tokio::test]
    async fn test_error_body_for_denial() {
        let runner = runner();

        let err = runner
            .run(&Commands::Redeem {
                basket_id: "b1".to_string(),
                points: 75,
            })
            .await
            .unwrap_err();
        let body = serde_json::to_value(ErrorBody::from(&err)).unwrap();

        assert_eq!(body["code"], "INVALID_DISCOUNT_AMOUNT");
        assert_eq!(body["numericCode"], 4001);
        assert_eq!(body["details"]["requested"], 75);
    }

    #[test]
    fn test_error_body_hides_system_details() {
        let err = LoyaltyError::Internal("连接串 postgres://secret".to_string());
        let body = ErrorBody::from(&err);
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert_eq!(body.numeric_code, 5001);
        assert!(!body.message.contains("secret"));
    }

    #[tokio::test]
    async fn test_admin_command_rejected() {
        let err = runner().run(&Commands::Migrate).await.unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }
}
