use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::extract::{AdminUser, AuthUser};
use crate::models::{Category, Product, Review};
use crate::services::ProductInput;
use crate::state::AppState;

/// GET /api/products
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.product_repo.list_active().await?))
}

/// GET /api/products/all（非公開商品を含む）
pub async fn list_all_products(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.product_repo.list_all().await?))
}

/// GET /api/products/featured
pub async fn featured_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.product_repo.list_featured().await?))
}

/// GET /api/products/promotions
pub async fn promotions(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.product_repo.list_on_sale().await?))
}

/// GET /api/products/category/{category}
pub async fn products_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<Product>>, AppError> {
    let category = category
        .parse::<Category>()
        .map_err(|_| AppError::Validation(format!("無効なカテゴリです: {}", category)))?;

    Ok(Json(state.product_repo.list_by_category(category).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// GET /api/products/search?q=
pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(AppError::Validation("検索語は必須です".to_string()));
    }

    Ok(Json(state.product_repo.search(q).await?))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = find_product(&state, product_id).await?;
    Ok(Json(product))
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let draft = input.into_draft()?;
    let product = state
        .product_repo
        .create(&draft)
        .await
        .map_err(sku_conflict)?;

    tracing::info!(product_id = %product.id, admin_id = %admin.id, "商品作成");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    let existing = find_product(&state, product_id).await?;
    let draft = input.apply_to(&existing)?;

    let product = state
        .product_repo
        .update(product_id, &draft)
        .await
        .map_err(sku_conflict)?
        .ok_or_else(product_not_found)?;

    tracing::info!(product_id = %product.id, admin_id = %admin.id, "商品更新");
    Ok(Json(product))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// DELETE /api/products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.product_repo.delete(product_id).await? {
        return Err(product_not_found());
    }

    tracing::info!(product_id = %product_id, admin_id = %admin.id, "商品削除");
    Ok(Json(MessageResponse {
        message: "商品を削除しました".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub rating: f64,
    pub reviews_count: i32,
    pub user_review: Review,
}

/// POST /api/products/{id}/reviews
///
/// ユーザーごとに1件（再投稿は上書き）
pub async fn review_product(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    validate_rating(request.rating)?;
    find_product(&state, product_id).await?;

    let comment = request
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let (review, product) = state
        .product_repo
        .upsert_review(product_id, user.id, request.rating, comment)
        .await?;

    Ok(Json(ReviewResponse {
        rating: product.rating,
        reviews_count: product.reviews_count,
        user_review: review,
    }))
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub favorited: bool,
}

/// POST /api/products/{id}/favorite
pub async fn toggle_favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<FavoriteResponse>, AppError> {
    find_product(&state, product_id).await?;

    let favorited = state
        .product_repo
        .toggle_favorite(user.id, product_id)
        .await?;

    Ok(Json(FavoriteResponse { favorited }))
}

async fn find_product(state: &AppState, product_id: Uuid) -> Result<Product, AppError> {
    state
        .product_repo
        .find_by_id(product_id)
        .await?
        .ok_or_else(product_not_found)
}

fn product_not_found() -> AppError {
    AppError::NotFound("商品が見つかりません".to_string())
}

/// SKU の一意制約違反を変換
fn sku_conflict(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.constraint() == Some("products_sku_key")
    {
        return AppError::SkuAlreadyExists;
    }
    AppError::Database(e)
}

fn validate_rating(rating: i16) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation(
            "評価は1から5の間で入力してください".to_string(),
        ));
    }
    Ok(())
}
