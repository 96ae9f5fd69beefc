use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

/// 画像未指定時の既定画像
pub const PLACEHOLDER_IMAGE: &str = "/images/placeholder.jpg";

/// 取り扱いサイズ
pub const SIZES: [&str; 6] = ["XS", "S", "M", "L", "XL", "XXL"];

/// 商品バッジ（空文字はバッジなし）
pub const BADGES: [&str; 4] = ["", "new", "trending", "sale"];

/// 商品カテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Women,
    Men,
    Accessories,
}

impl FromStr for Category {
    type Err = ();

    /// 大文字小文字を区別しない
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "women" => Ok(Self::Women),
            "men" => Ok(Self::Men),
            "accessories" => Ok(Self::Accessories),
            _ => Err(()),
        }
    }
}

/// サイズ・色ごとの在庫
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variant {
    pub size: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub stock: i32,
    pub sku: Option<String>,
}

/// 商品の詳細情報
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductDetails {
    pub materials: Option<String>,
    pub care: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub fit: Option<String>,
}

#[derive(Debug, FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub original_price: Option<f64>,
    pub category: Category,
    pub image: String,
    pub images: Vec<String>,
    pub stock: i32,
    pub sku: Option<String>,
    pub rating: f64,
    pub reviews_count: i32,
    pub badge: String,
    pub featured: bool,
    pub on_sale: bool,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub variants: Json<Vec<Variant>>,
    pub details: Json<ProductDetails>,
    pub active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// 商品レビュー（ユーザーごとに1件）
#[derive(Debug, FromRow, Serialize)]
pub struct Review {
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_str_ignores_case() {
        assert_eq!("Women".parse::<Category>(), Ok(Category::Women));
        assert_eq!(" ACCESSORIES ".parse::<Category>(), Ok(Category::Accessories));
        assert!("kids".parse::<Category>().is_err());
    }
}
