use serde::Deserialize;

use crate::error::AppError;
use crate::models::product::{BADGES, PLACEHOLDER_IMAGE, SIZES};
use crate::models::{Category, Product, ProductDetails, Variant};
use crate::repositories::ProductDraft;

/// 商品の作成・更新リクエスト
///
/// 作成時は name / price / category が必須。更新時は指定した項目のみ上書きする。
#[derive(Debug, Default, Deserialize)]
pub struct ProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub category: Option<Category>,
    pub image: Option<String>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i32>,
    pub sku: Option<String>,
    pub badge: Option<String>,
    pub featured: Option<bool>,
    pub on_sale: Option<bool>,
    pub sizes: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub variants: Option<Vec<Variant>>,
    pub details: Option<ProductDetails>,
    pub active: Option<bool>,
}

impl ProductInput {
    /// 新規作成用の下書きに変換
    pub fn into_draft(self) -> Result<ProductDraft, AppError> {
        let variants_supplied = self.variants.is_some();

        let name = self
            .name
            .ok_or_else(|| AppError::Validation("商品名は必須です".to_string()))?;
        let price = self
            .price
            .ok_or_else(|| AppError::Validation("価格は必須です".to_string()))?;
        let category = self
            .category
            .ok_or_else(|| AppError::Validation("カテゴリは必須です".to_string()))?;

        let draft = ProductDraft {
            name,
            description: self.description,
            price,
            original_price: self.original_price,
            category,
            image: self.image.unwrap_or_default(),
            images: self.images.unwrap_or_default(),
            stock: self.stock.unwrap_or(0),
            sku: self.sku,
            badge: self.badge.unwrap_or_default(),
            featured: self.featured.unwrap_or(false),
            on_sale: self.on_sale.unwrap_or(false),
            sizes: self.sizes.unwrap_or_default(),
            colors: self.colors.unwrap_or_default(),
            variants: self.variants.unwrap_or_default(),
            details: self.details.unwrap_or_default(),
            active: self.active.unwrap_or(true),
        };

        normalize(draft, variants_supplied)
    }

    /// 既存商品に変更を重ねた下書きを作成
    pub fn apply_to(self, existing: &Product) -> Result<ProductDraft, AppError> {
        let variants_supplied = self.variants.is_some();

        let draft = ProductDraft {
            name: self.name.unwrap_or_else(|| existing.name.clone()),
            description: self.description.or_else(|| existing.description.clone()),
            price: self.price.unwrap_or(existing.price),
            original_price: self.original_price.or(existing.original_price),
            category: self.category.unwrap_or(existing.category),
            image: self.image.unwrap_or_else(|| existing.image.clone()),
            images: self.images.unwrap_or_else(|| existing.images.clone()),
            stock: self.stock.unwrap_or(existing.stock),
            sku: self.sku.or_else(|| existing.sku.clone()),
            badge: self.badge.unwrap_or_else(|| existing.badge.clone()),
            featured: self.featured.unwrap_or(existing.featured),
            on_sale: self.on_sale.unwrap_or(existing.on_sale),
            sizes: self.sizes.unwrap_or_else(|| existing.sizes.clone()),
            colors: self.colors.unwrap_or_else(|| existing.colors.clone()),
            variants: self.variants.unwrap_or_else(|| existing.variants.0.clone()),
            details: self.details.unwrap_or_else(|| existing.details.0.clone()),
            active: self.active.unwrap_or(existing.active),
        };

        normalize(draft, variants_supplied)
    }
}

/// 下書きを検証し、在庫・メイン画像を導出する
///
/// - バリアント指定時: 在庫 = Σ max(0, バリアント在庫)
/// - メイン画像が未指定または既定画像で images がある場合: 先頭画像を採用
fn normalize(mut draft: ProductDraft, variants_supplied: bool) -> Result<ProductDraft, AppError> {
    draft.name = draft.name.trim().to_string();
    if draft.name.is_empty() {
        return Err(AppError::Validation("商品名は必須です".to_string()));
    }
    if !draft.price.is_finite() || draft.price < 0.0 {
        return Err(AppError::Validation(
            "価格は0以上で入力してください".to_string(),
        ));
    }
    if draft
        .original_price
        .is_some_and(|p| !p.is_finite() || p < 0.0)
    {
        return Err(AppError::Validation(
            "元の価格は0以上で入力してください".to_string(),
        ));
    }
    if !BADGES.contains(&draft.badge.as_str()) {
        return Err(AppError::Validation(format!(
            "無効なバッジです: {}",
            draft.badge
        )));
    }
    if let Some(size) = draft.sizes.iter().find(|s| !SIZES.contains(&s.as_str())) {
        return Err(AppError::Validation(format!("無効なサイズです: {}", size)));
    }

    if variants_supplied {
        draft.stock = total_stock(&draft.variants)?;
    }
    if draft.stock < 0 {
        return Err(AppError::Validation(
            "在庫は0以上で入力してください".to_string(),
        ));
    }

    if draft.image.trim().is_empty() || draft.image == PLACEHOLDER_IMAGE {
        draft.image = draft
            .images
            .first()
            .cloned()
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string());
    }

    // 空文字のSKUは一意制約の対象外にする
    draft.sku = draft.sku.filter(|sku| !sku.trim().is_empty());

    Ok(draft)
}

/// バリアント在庫の合計（負数は0とみなす）
pub fn total_stock(variants: &[Variant]) -> Result<i32, AppError> {
    variants
        .iter()
        .try_fold(0i32, |total, v| total.checked_add(v.stock.max(0)))
        .ok_or_else(|| AppError::Validation("在庫の合計が上限を超えています".to_string()))
}
