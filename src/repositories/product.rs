use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::models::{Category, Product, ProductDetails, Review, Variant};

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, description, price, original_price, category, image, images, stock, sku, rating, reviews_count, badge, featured, on_sale, sizes, colors, variants, details, active, created_at, updated_at";

/// 商品の書き込み内容（正規化済み）
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub original_price: Option<f64>,
    pub category: Category,
    pub image: String,
    pub images: Vec<String>,
    pub stock: i32,
    pub sku: Option<String>,
    pub badge: String,
    pub featured: bool,
    pub on_sale: bool,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub variants: Vec<Variant>,
    pub details: ProductDetails,
    pub active: bool,
}

#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, condition: &str) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {condition} ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    /// 公開中の商品一覧
    pub async fn list_active(&self) -> Result<Vec<Product>, sqlx::Error> {
        self.fetch_where("active").await
    }

    /// 全商品一覧（管理者用）
    pub async fn list_all(&self) -> Result<Vec<Product>, sqlx::Error> {
        self.fetch_where("TRUE").await
    }

    pub async fn list_featured(&self) -> Result<Vec<Product>, sqlx::Error> {
        self.fetch_where("active AND featured").await
    }

    pub async fn list_on_sale(&self) -> Result<Vec<Product>, sqlx::Error> {
        self.fetch_where("active AND on_sale").await
    }

    pub async fn list_by_category(&self, category: Category) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE active AND category = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await
    }

    /// 商品名・説明の全文検索
    pub async fn search(&self, query: &str) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE active
              AND to_tsvector('simple', name || ' ' || COALESCE(description, ''))
                  @@ plainto_tsquery('simple', $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, product_id: Uuid) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// 商品を作成
    ///
    /// # Errors
    /// - SKU重複時: `sqlx::Error::Database` (constraint = "products_sku_key")
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (
                name, description, price, original_price, category, image, images,
                stock, sku, badge, featured, on_sale, sizes, colors, variants, details, active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.original_price)
        .bind(draft.category)
        .bind(&draft.image)
        .bind(&draft.images)
        .bind(draft.stock)
        .bind(&draft.sku)
        .bind(&draft.badge)
        .bind(draft.featured)
        .bind(draft.on_sale)
        .bind(&draft.sizes)
        .bind(&draft.colors)
        .bind(Json(&draft.variants))
        .bind(Json(&draft.details))
        .bind(draft.active)
        .fetch_one(&self.pool)
        .await
    }

    /// 商品を更新（評価・レビュー数は変更しない）
    pub async fn update(
        &self,
        product_id: Uuid,
        draft: &ProductDraft,
    ) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = $2, description = $3, price = $4, original_price = $5, category = $6,
                image = $7, images = $8, stock = $9, sku = $10, badge = $11, featured = $12,
                on_sale = $13, sizes = $14, colors = $15, variants = $16, details = $17,
                active = $18, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.original_price)
        .bind(draft.category)
        .bind(&draft.image)
        .bind(&draft.images)
        .bind(draft.stock)
        .bind(&draft.sku)
        .bind(&draft.badge)
        .bind(draft.featured)
        .bind(draft.on_sale)
        .bind(&draft.sizes)
        .bind(&draft.colors)
        .bind(Json(&draft.variants))
        .bind(Json(&draft.details))
        .bind(draft.active)
        .fetch_optional(&self.pool)
        .await
    }

    /// 商品を削除し、削除できたかを返す
    pub async fn delete(&self, product_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// SKU をキーに商品を一括取り込みし、書き込んだ件数を返す
    ///
    /// 既存 SKU は overwrite が true のときだけ更新する（評価・レビュー数は保持）。
    pub async fn import_by_sku(
        &self,
        drafts: &[ProductDraft],
        overwrite: bool,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let written = insert_drafts(&mut tx, drafts, overwrite).await?;
        tx.commit().await?;

        Ok(written)
    }

    /// 全商品を削除してから取り込む（同一トランザクション）
    pub async fn replace_catalog(&self, drafts: &[ProductDraft]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM products").execute(&mut *tx).await?;
        let written = insert_drafts(&mut tx, drafts, false).await?;
        tx.commit().await?;

        Ok(written)
    }

    /// レビューを登録（ユーザーごとに上書き）し、平均評価と件数を再計算する
    ///
    /// comment が None の場合は既存のコメントを残す
    pub async fn upsert_review(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<(Review, Product), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO product_reviews (product_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id, user_id)
            DO UPDATE SET rating = EXCLUDED.rating,
                          comment = COALESCE(EXCLUDED.comment, product_reviews.comment),
                          created_at = NOW()
            RETURNING product_id, user_id, rating, comment, created_at
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET rating = stats.average, reviews_count = stats.total, updated_at = NOW()
            FROM (
                SELECT COALESCE(AVG(rating), 0)::DOUBLE PRECISION AS average,
                       COUNT(*)::INTEGER AS total
                FROM product_reviews
                WHERE product_id = $1
            ) AS stats
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((review, product))
    }

    /// お気に入りを切り替え、切り替え後に登録されているかを返す
    pub async fn toggle_favorite(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query("INSERT INTO user_favorites (user_id, product_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(!removed)
    }
}

const SKU_UPDATE_SET: &str = "name = EXCLUDED.name, description = EXCLUDED.description, \
    price = EXCLUDED.price, original_price = EXCLUDED.original_price, category = EXCLUDED.category, \
    image = EXCLUDED.image, images = EXCLUDED.images, stock = EXCLUDED.stock, badge = EXCLUDED.badge, \
    featured = EXCLUDED.featured, on_sale = EXCLUDED.on_sale, sizes = EXCLUDED.sizes, \
    colors = EXCLUDED.colors, variants = EXCLUDED.variants, details = EXCLUDED.details, \
    active = EXCLUDED.active, updated_at = NOW()";

async fn insert_drafts(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    drafts: &[ProductDraft],
    overwrite: bool,
) -> Result<u64, sqlx::Error> {
    let on_conflict = if overwrite {
        format!("DO UPDATE SET {SKU_UPDATE_SET}")
    } else {
        "DO NOTHING".to_string()
    };
    let sql = format!(
        r#"
        INSERT INTO products (
            name, description, price, original_price, category, image, images,
            stock, sku, badge, featured, on_sale, sizes, colors, variants, details, active
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        ON CONFLICT (sku) {on_conflict}
        "#
    );

    let mut written = 0;
    for draft in drafts {
        let result = bind_draft(sqlx::query(&sql), draft)
            .execute(&mut **tx)
            .await?;
        written += result.rows_affected();
    }

    Ok(written)
}

fn bind_draft<'q>(
    query: Query<'q, Postgres, PgArguments>,
    draft: &'q ProductDraft,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.original_price)
        .bind(draft.category)
        .bind(&draft.image)
        .bind(&draft.images)
        .bind(draft.stock)
        .bind(&draft.sku)
        .bind(&draft.badge)
        .bind(draft.featured)
        .bind(draft.on_sale)
        .bind(&draft.sizes)
        .bind(&draft.colors)
        .bind(Json(&draft.variants))
        .bind(Json(&draft.details))
        .bind(draft.active)
}
