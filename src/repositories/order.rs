use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};

const ORDER_COLUMNS: &str = "id, user_id, items, shipping_address, payment_method, items_price, shipping_price, total_price, status, is_paid, paid_at, is_delivered, delivered_at, created_at, updated_at";

/// 新規注文の内容
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub items_price: f64,
    pub shipping_price: f64,
    pub total_price: f64,
}

#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: Uuid, order: &NewOrder) -> Result<Order, sqlx::Error> {
        sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (
                user_id, items, shipping_address, payment_method,
                items_price, shipping_price, total_price
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(Json(&order.items))
        .bind(Json(&order.shipping_address))
        .bind(order.payment_method)
        .bind(order.items_price)
        .bind(order.shipping_price)
        .bind(order.total_price)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, sqlx::Error> {
        sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// ユーザーの注文一覧（新しい順）
    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, sqlx::Error> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// 全注文一覧（管理者用）
    pub async fn list_all(&self) -> Result<Vec<Order>, sqlx::Error> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    /// ステータスを更新（delivered の場合は配達済みフラグと日時も設定）
    pub async fn update_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Option<Order>, sqlx::Error> {
        sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = $2,
                is_delivered = CASE WHEN $2 = 'delivered'::order_status THEN TRUE ELSE is_delivered END,
                delivered_at = CASE WHEN $2 = 'delivered'::order_status THEN NOW() ELSE delivered_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
    }
}
