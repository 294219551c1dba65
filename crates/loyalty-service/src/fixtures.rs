//! 测试与基准共用的数据构造
//!
//! 构造的对象都是最小可用的：顾客没有生日，会员资格长期有效，
//! 门店返还比例 0.1、最少订单数 5。

use crate::models::{
    Basket, BasketItem, Customer, CustomerStatus, DiscountType, Enrollment, LoyaltyPartner,
    Membership, MembershipStatus, Store, ValidationRules,
};
use crate::tier::tier_for_spend;

/// 开启积分计划的门店
pub fn store_with_discounts(store_id: &str, partner_id: &str, discounts: &[i64]) -> Store {
    Store {
        store_id: store_id.to_string(),
        name: format!("Store {}", store_id),
        restaurant_id: Some("rest_001".to_string()),
        active: true,
        loyalty_partner: Some(LoyaltyPartner {
            enabled: true,
            partner_id: Some(partner_id.to_string()),
            reward_rate: Some(0.1),
            discount_type: DiscountType::Cash,
            allowed_discounts: discounts.to_vec(),
            validation_rules: Some(ValidationRules {
                min_orders: Some(5),
                max_points_expiry_days: Some(365),
            }),
        }),
    }
}

/// 未开启积分计划的门店
pub fn store_without_loyalty(store_id: &str) -> Store {
    Store {
        store_id: store_id.to_string(),
        name: format!("Store {}", store_id),
        restaurant_id: None,
        active: true,
        loyalty_partner: Some(LoyaltyPartner {
            enabled: false,
            partner_id: None,
            reward_rate: None,
            discount_type: DiscountType::Cash,
            allowed_discounts: Vec::new(),
            validation_rules: None,
        }),
    }
}

/// 没有任何会员资格的顾客
pub fn customer(customer_id: i64, points: i64, total_spent: f64) -> Customer {
    Customer {
        customer_id,
        phone: format!("+9198{:08}", customer_id),
        name: format!("Customer {}", customer_id),
        points,
        total_spent,
        order_count: 0,
        birthday: None,
        tier: tier_for_spend(total_spent),
        status: CustomerStatus::Active,
        loyalty_info: Vec::new(),
    }
}

/// 已加入指定合作方且满足最少订单数的顾客
pub fn enrolled_customer(
    customer_id: i64,
    partner_id: &str,
    points: i64,
    total_spent: f64,
) -> Customer {
    let mut c = customer(customer_id, points, total_spent);
    c.loyalty_info.push(Enrollment {
        store_id: None,
        partner_id: Some(partner_id.to_string()),
        qualifying_orders: 6,
        membership: Membership {
            status: MembershipStatus::Active,
            joined_date: None,
            expiry_date: None,
        },
    });
    c
}

/// 尚未兑换和结单的购物篮，金额全部计入一个商品行
pub fn basket(basket_id: &str, customer_id: i64, store_id: &str, total: f64) -> Basket {
    Basket {
        basket_id: basket_id.to_string(),
        customer_id,
        restaurant_id: Some("rest_001".to_string()),
        store_id: store_id.to_string(),
        items: vec![BasketItem {
            name: "Combo".to_string(),
            price: total,
        }],
        subtotal: total,
        delivery_fee: 0.0,
        total,
        original_total: None,
        updated_total: None,
        points_discount: None,
        redeemed_at: None,
        completed_at: None,
    }
}
