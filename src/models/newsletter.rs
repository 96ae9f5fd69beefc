use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ニュースレター購読者
#[derive(Debug, FromRow, Serialize)]
pub struct NewsletterSubscriber {
    pub id: Uuid,
    pub email: String,
    pub active: bool,
    pub subscribed_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
