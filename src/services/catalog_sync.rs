use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{Category, Product, ProductDetails, Variant};
use crate::repositories::{ProductDraft, ProductRepository};
use crate::services::catalog::ProductInput;

pub const DEFAULT_SEED_PATH: &str = "seeds/products.json";

/// 取り込みモード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// 未登録の SKU のみ追加
    Additive,
    /// SKU 単位で上書き（未登録なら追加）
    Overwrite,
    /// 全商品を削除してから追加
    Reset,
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "additive" => Ok(SyncMode::Additive),
            "overwrite" => Ok(SyncMode::Overwrite),
            "reset" => Ok(SyncMode::Reset),
            other => Err(format!(
                "不明なモードです: {} (additive / overwrite / reset)",
                other
            )),
        }
    }
}

/// catalog-sync のサブコマンド
#[derive(Debug, PartialEq, Eq)]
pub enum SyncCommand {
    Export { path: String },
    Import { mode: SyncMode, path: String },
}

impl SyncCommand {
    /// `export [path]` / `import <mode> [path]`
    pub fn parse<I>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        match args.next().as_deref() {
            Some("export") => Ok(SyncCommand::Export {
                path: args.next().unwrap_or_else(|| DEFAULT_SEED_PATH.to_string()),
            }),
            Some("import") => {
                let mode = args
                    .next()
                    .ok_or_else(|| "モードを指定してください".to_string())?
                    .parse()?;
                Ok(SyncCommand::Import {
                    mode,
                    path: args.next().unwrap_or_else(|| DEFAULT_SEED_PATH.to_string()),
                })
            }
            _ => Err("使い方: catalog-sync export [path] | import <additive|overwrite|reset> [path]"
                .to_string()),
        }
    }
}

/// シードファイルの1商品（ID・日時・評価は含めない）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    pub category: Category,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub badge: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub on_sale: bool,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub details: ProductDetails,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl From<Product> for ProductSeed {
    fn from(product: Product) -> Self {
        Self {
            name: product.name,
            description: product.description,
            price: product.price,
            original_price: product.original_price,
            category: product.category,
            image: product.image,
            images: product.images,
            stock: product.stock,
            sku: product.sku,
            badge: product.badge,
            featured: product.featured,
            on_sale: product.on_sale,
            sizes: product.sizes,
            colors: product.colors,
            variants: product.variants.0,
            details: product.details.0,
            active: product.active,
        }
    }
}

impl ProductSeed {
    fn into_draft(self) -> Result<ProductDraft, AppError> {
        ProductInput {
            name: Some(self.name),
            description: self.description,
            price: Some(self.price),
            original_price: self.original_price,
            category: Some(self.category),
            image: Some(self.image),
            images: Some(self.images),
            stock: Some(self.stock),
            sku: self.sku,
            badge: Some(self.badge),
            featured: Some(self.featured),
            on_sale: Some(self.on_sale),
            sizes: Some(self.sizes),
            colors: Some(self.colors),
            variants: (!self.variants.is_empty()).then_some(self.variants),
            details: Some(self.details),
            active: Some(self.active),
        }
        .into_draft()
    }
}

/// 商品をシード形式に変換し、SKU 順に並べる（SKU なしは末尾）
pub fn export_seeds(products: Vec<Product>) -> Vec<ProductSeed> {
    let mut seeds: Vec<ProductSeed> = products.into_iter().map(ProductSeed::from).collect();
    seeds.sort_by(|a, b| match (&a.sku, &b.sku) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    });
    seeds
}

/// 取り込み対象の下書き
#[derive(Debug)]
pub struct ImportPlan {
    pub drafts: Vec<ProductDraft>,
    /// SKU がないため取り込まない件数
    pub skipped: usize,
}

/// シードを検証して下書きに変換する
///
/// SKU のない行は照合できないので取り込まない。検証に失敗した行があれば
/// 何も書き込まずにエラーを返す。
pub fn plan_import(seeds: Vec<ProductSeed>) -> Result<ImportPlan, AppError> {
    let mut drafts = Vec::with_capacity(seeds.len());
    let mut skipped = 0;

    for seed in seeds {
        let name = seed.name.clone();
        let draft = seed.into_draft().map_err(|e| match e {
            AppError::Validation(msg) => AppError::Validation(format!("{}: {}", name, msg)),
            other => other,
        })?;
        if draft.sku.is_none() {
            tracing::warn!(product = %name, "SKUがないため取り込みません");
            skipped += 1;
            continue;
        }
        drafts.push(draft);
    }

    Ok(ImportPlan { drafts, skipped })
}

/// 取り込み結果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub written: u64,
    pub unchanged: u64,
    pub skipped: usize,
}

/// シードをモードに従って DB へ取り込む
pub async fn import_seeds(
    product_repo: &ProductRepository,
    mode: SyncMode,
    seeds: Vec<ProductSeed>,
) -> Result<ImportReport, AppError> {
    let plan = plan_import(seeds)?;
    let written = match mode {
        SyncMode::Additive => product_repo.import_by_sku(&plan.drafts, false).await?,
        SyncMode::Overwrite => product_repo.import_by_sku(&plan.drafts, true).await?,
        SyncMode::Reset => product_repo.replace_catalog(&plan.drafts).await?,
    };

    let report = ImportReport {
        written,
        unchanged: (plan.drafts.len() as u64).saturating_sub(written),
        skipped: plan.skipped,
    };
    tracing::info!(
        mode = ?mode,
        written = report.written,
        unchanged = report.unchanged,
        skipped = report.skipped,
        "商品データ取り込み完了"
    );

    Ok(report)
}
