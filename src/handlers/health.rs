use axum::Json;
use serde::Serialize;

const SERVICE_NAME: &str = "aurea";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// GET /api/health
///
/// プロセスの生存確認のみ。DB やメール経路は見ない（後者は /api/contact/health）。
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub message: &'static str,
    pub version: &'static str,
}

/// GET /api
pub async fn api_banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "Áurea Virtual Shop API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_identifies_service() {
        let Json(response) = health_check().await;
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "status": "ok",
                "service": "aurea",
                "version": env!("CARGO_PKG_VERSION"),
            })
        );
    }

    #[tokio::test]
    async fn test_api_banner() {
        let response = api_banner().await;
        assert!(response.message.contains("API"));
    }
}
