//! 顾客仓储
//!
//! 顾客主表与会员资格表分开存储，读取时组装为完整的 Customer。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use super::traits::CustomerRepositoryTrait;
use crate::error::Result;
use crate::models::{
    Customer, CustomerPatch, CustomerStatus, Enrollment, Membership, MembershipStatus, Tier,
};

const CUSTOMER_COLUMNS: &str =
    "customer_id, phone, name, points, total_spent, order_count, birthday, tier, status";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    customer_id: i64,
    phone: String,
    name: String,
    points: i64,
    total_spent: f64,
    order_count: i32,
    birthday: Option<NaiveDate>,
    tier: Tier,
    status: CustomerStatus,
}

#[derive(Debug, sqlx::FromRow)]
struct EnrollmentRow {
    store_id: Option<String>,
    partner_id: Option<String>,
    qualifying_orders: i32,
    membership_status: MembershipStatus,
    joined_date: Option<DateTime<Utc>>,
    expiry_date: Option<DateTime<Utc>>,
}

impl CustomerRow {
    fn into_customer(self, enrollments: Vec<EnrollmentRow>) -> Customer {
        Customer {
            customer_id: self.customer_id,
            phone: self.phone,
            name: self.name,
            points: self.points,
            total_spent: self.total_spent,
            order_count: self.order_count,
            birthday: self.birthday,
            tier: self.tier,
            status: self.status,
            loyalty_info: enrollments.into_iter().map(Enrollment::from).collect(),
        }
    }
}

impl From<EnrollmentRow> for Enrollment {
    fn from(row: EnrollmentRow) -> Self {
        Enrollment {
            store_id: row.store_id,
            partner_id: row.partner_id,
            qualifying_orders: row.qualifying_orders,
            membership: Membership {
                status: row.membership_status,
                joined_date: row.joined_date,
                expiry_date: row.expiry_date,
            },
        }
    }
}

/// 顾客仓储
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 按 ID 获取顾客（含会员资格）
    pub async fn get_customer(&self, customer_id: i64) -> Result<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_in_tx(&mut *conn, customer_id, false).await
    }

    /// 按手机号获取顾客
    pub async fn get_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE phone = $1",
            CUSTOMER_COLUMNS
        ))
        .bind(phone)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let enrollments = Self::load_enrollments(&mut *conn, row.customer_id).await?;
                Ok(Some(row.into_customer(enrollments)))
            }
            None => Ok(None),
        }
    }

    /// 在事务中获取顾客，`for_update` 为 true 时锁定顾客行直到事务结束
    pub async fn find_in_tx(
        conn: &mut PgConnection,
        customer_id: i64,
        for_update: bool,
    ) -> Result<Option<Customer>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE customer_id = $1{}",
            CUSTOMER_COLUMNS, lock
        ))
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let enrollments = Self::load_enrollments(conn, customer_id).await?;
                Ok(Some(row.into_customer(enrollments)))
            }
            None => Ok(None),
        }
    }

    async fn load_enrollments(
        conn: &mut PgConnection,
        customer_id: i64,
    ) -> Result<Vec<EnrollmentRow>> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT store_id, partner_id, qualifying_orders, membership_status,
                   joined_date, expiry_date
            FROM customer_loyalty_info
            WHERE customer_id = $1
            ORDER BY id
            "#,
        )
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    // ==================== 写入操作 ====================

    /// 在事务中条件更新顾客积分
    ///
    /// 扣减通过 `WHERE points + delta >= 0` 在数据库内原子判断，
    /// 余额不足时不更新任何行并返回 None。
    pub async fn apply_patch_in_tx(
        conn: &mut PgConnection,
        customer_id: i64,
        patch: &CustomerPatch,
    ) -> Result<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            UPDATE customers
            SET points = points + $2,
                total_spent = total_spent + $3,
                order_count = order_count + $4,
                tier = $5,
                updated_at = NOW()
            WHERE customer_id = $1 AND points + $2 >= 0
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(customer_id)
        .bind(patch.points_delta)
        .bind(patch.spend_delta)
        .bind(patch.order_count_delta)
        .bind(patch.tier)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let enrollments = Self::load_enrollments(conn, customer_id).await?;
                Ok(Some(row.into_customer(enrollments)))
            }
            None => Ok(None),
        }
    }

    /// 在事务中导入顾客及其会员资格，已存在的顾客保持不变
    ///
    /// 余额、累计消费只能由兑换和结单改变，导入不覆盖；返回是否实际写入
    pub async fn insert_if_absent_in_tx(
        conn: &mut PgConnection,
        customer: &Customer,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO customers (customer_id, phone, name, points, total_spent, order_count,
                                   birthday, tier, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (customer_id) DO NOTHING
            "#,
        )
        .bind(customer.customer_id)
        .bind(&customer.phone)
        .bind(&customer.name)
        .bind(customer.points)
        .bind(customer.total_spent)
        .bind(customer.order_count)
        .bind(customer.birthday)
        .bind(customer.tier)
        .bind(customer.status)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        for enrollment in &customer.loyalty_info {
            sqlx::query(
                r#"
                INSERT INTO customer_loyalty_info (customer_id, store_id, partner_id,
                    qualifying_orders, membership_status, joined_date, expiry_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(customer.customer_id)
            .bind(&enrollment.store_id)
            .bind(&enrollment.partner_id)
            .bind(enrollment.qualifying_orders)
            .bind(enrollment.membership.status)
            .bind(enrollment.membership.joined_date)
            .bind(enrollment.membership.expiry_date)
            .execute(&mut *conn)
            .await?;
        }

        Ok(true)
    }
}

#[async_trait]
impl CustomerRepositoryTrait for CustomerRepository {
    async fn get_customer(&self, customer_id: i64) -> Result<Option<Customer>> {
        self.get_customer(customer_id).await
    }

    async fn get_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>> {
        self.get_customer_by_phone(phone).await
    }
}
