//! 商品データのエクスポート・インポートツール
//!
//! 使い方:
//! - `catalog-sync export [path]`: 全商品を SKU 順に JSON へ書き出す
//! - `catalog-sync import <additive|overwrite|reset> [path]`: JSON から取り込む
//!
//! path の既定値は `seeds/products.json`。

use std::path::Path;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use aurea::config::Config;
use aurea::repositories::ProductRepository;
use aurea::services::catalog_sync::{self, ProductSeed, SyncCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = SyncCommand::parse(std::env::args().skip(1)).map_err(|e| anyhow::anyhow!(e))?;

    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    let db_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(config.database_url.expose_secret())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    let product_repo = ProductRepository::new(db_pool);

    match command {
        SyncCommand::Export { path } => {
            let seeds = catalog_sync::export_seeds(product_repo.list_all().await?);
            if let Some(dir) = Path::new(&path).parent()
                && !dir.as_os_str().is_empty()
            {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(&path, serde_json::to_string_pretty(&seeds)?)?;
            println!("{} 件を書き出しました: {}", seeds.len(), path);
        }
        SyncCommand::Import { mode, path } => {
            let seeds: Vec<ProductSeed> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
            let report = catalog_sync::import_seeds(&product_repo, mode, seeds)
                .await
                .map_err(|e| anyhow::anyhow!("取り込みに失敗: {}", e))?;
            println!(
                "書き込み {} 件 / 変更なし {} 件 / SKUなし {} 件",
                report.written, report.unchanged, report.skipped
            );
        }
    }

    Ok(())
}
