use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::extract::{AdminUser, AuthUser};
use crate::models::{Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress, User};
use crate::repositories::NewOrder;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub items_price: f64,
    #[serde(default)]
    pub shipping_price: f64,
    #[serde(default)]
    pub total_price: f64,
}

/// POST /api/orders
pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    validate_create_order_request(&request)?;

    let new_order = NewOrder {
        items: request.items,
        shipping_address: request.shipping_address,
        payment_method: request.payment_method,
        items_price: request.items_price,
        shipping_price: request.shipping_price,
        total_price: request.total_price,
    };
    let order = state.order_repo.create(user.id, &new_order).await?;

    tracing::info!(order_id = %order.id, user_id = %user.id, "注文作成");
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/my-orders
pub async fn my_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.order_repo.list_by_user(user.id).await?))
}

/// GET /api/orders/{id}
///
/// 注文者本人または管理者のみ
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .order_repo
        .find_by_id(order_id)
        .await?
        .ok_or_else(order_not_found)?;

    if !can_view(&order, &user) {
        tracing::warn!(order_id = %order.id, user_id = %user.id, "他人の注文へのアクセス");
        return Err(AppError::Forbidden(
            "この注文を閲覧する権限がありません".to_string(),
        ));
    }

    Ok(Json(order))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.order_repo.list_all().await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// PUT /api/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .order_repo
        .update_status(order_id, request.status)
        .await?
        .ok_or_else(order_not_found)?;

    tracing::info!(
        order_id = %order.id,
        admin_id = %admin.id,
        status = ?order.status,
        "注文ステータス更新"
    );
    Ok(Json(order))
}

fn order_not_found() -> AppError {
    AppError::NotFound("注文が見つかりません".to_string())
}

fn can_view(order: &Order, user: &User) -> bool {
    order.user_id == user.id || user.is_admin()
}

fn validate_create_order_request(request: &CreateOrderRequest) -> Result<(), AppError> {
    if request.items.is_empty() {
        return Err(AppError::Validation("注文商品がありません".to_string()));
    }
    if request.items.iter().any(|item| item.quantity < 1) {
        return Err(AppError::Validation(
            "数量は1以上で入力してください".to_string(),
        ));
    }
    if request.items.iter().any(|item| item.price < 0.0)
        || [request.items_price, request.shipping_price, request.total_price]
            .iter()
            .any(|price| *price < 0.0)
    {
        return Err(AppError::Validation(
            "金額は0以上で入力してください".to_string(),
        ));
    }
    let address = &request.shipping_address;
    if [&address.street, &address.city, &address.state]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(AppError::Validation("配送先住所は必須です".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::types::Json;
    use time::macros::datetime;

    use super::*;
    use crate::models::Role;

    fn request(items: Vec<OrderItem>) -> CreateOrderRequest {
        CreateOrderRequest {
            items,
            shipping_address: ShippingAddress {
                street: "Av. Siempre Viva 742".to_string(),
                city: "Lima".to_string(),
                state: "Lima".to_string(),
                postal_code: None,
            },
            payment_method: PaymentMethod::default(),
            items_price: 50.0,
            shipping_price: 10.0,
            total_price: 60.0,
        }
    }

    fn item(quantity: i32) -> OrderItem {
        OrderItem {
            product_id: Uuid::new_v4(),
            name: Some("Vestido".to_string()),
            quantity,
            price: 25.0,
        }
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: String::new(),
            phone: None,
            role,
            address: None,
            created_at: datetime!(2025-01-01 00:00 UTC),
            updated_at: datetime!(2025-01-01 00:00 UTC),
        }
    }

    fn order_for(user_id: Uuid) -> Order {
        let request = request(vec![item(2)]);
        Order {
            id: Uuid::new_v4(),
            user_id,
            items: Json(request.items),
            shipping_address: Json(request.shipping_address),
            payment_method: PaymentMethod::Whatsapp,
            items_price: 50.0,
            shipping_price: 10.0,
            total_price: 60.0,
            status: OrderStatus::Pending,
            is_paid: false,
            paid_at: None,
            is_delivered: false,
            delivered_at: None,
            created_at: datetime!(2025-01-01 00:00 UTC),
            updated_at: datetime!(2025-01-01 00:00 UTC),
        }
    }

    #[test]
    fn test_validate_empty_items() {
        assert!(validate_create_order_request(&request(vec![])).is_err());
    }

    #[test]
    fn test_validate_zero_quantity() {
        assert!(validate_create_order_request(&request(vec![item(0)])).is_err());
    }

    #[test]
    fn test_validate_valid_order() {
        assert!(validate_create_order_request(&request(vec![item(2)])).is_ok());
    }

    #[test]
    fn test_payment_method_defaults_to_whatsapp() {
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [{ "product_id": Uuid::new_v4(), "quantity": 1, "price": 10.0 }],
            "shipping_address": { "street": "a", "city": "b", "state": "c" }
        }))
        .unwrap();
        assert_eq!(request.payment_method, PaymentMethod::Whatsapp);
    }

    #[test]
    fn test_owner_and_admin_can_view() {
        let owner = user(Role::User);
        let order = order_for(owner.id);

        assert!(can_view(&order, &owner));
        assert!(can_view(&order, &user(Role::Admin)));
        assert!(!can_view(&order, &user(Role::User)));
    }
}
