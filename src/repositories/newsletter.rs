use sqlx::PgPool;

use crate::models::NewsletterSubscriber;

const SUBSCRIBER_COLUMNS: &str = "id, email, active, subscribed_at, created_at, updated_at";

#[derive(Clone)]
pub struct NewsletterRepository {
    pool: PgPool,
}

impl NewsletterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<NewsletterSubscriber>, sqlx::Error> {
        sqlx::query_as::<_, NewsletterSubscriber>(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM newsletter_subscribers WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// 購読者を登録
    ///
    /// # Errors
    /// - UNIQUE制約違反時: constraint = "newsletter_subscribers_email_key"
    pub async fn create(&self, email: &str) -> Result<NewsletterSubscriber, sqlx::Error> {
        sqlx::query_as::<_, NewsletterSubscriber>(&format!(
            "INSERT INTO newsletter_subscribers (email) VALUES ($1) RETURNING {SUBSCRIBER_COLUMNS}"
        ))
        .bind(email)
        .fetch_one(&self.pool)
        .await
    }

    /// 購読状態を切り替え（再購読時は購読日時を更新）
    pub async fn set_active(
        &self,
        email: &str,
        active: bool,
    ) -> Result<Option<NewsletterSubscriber>, sqlx::Error> {
        sqlx::query_as::<_, NewsletterSubscriber>(&format!(
            r#"
            UPDATE newsletter_subscribers
            SET active = $2,
                subscribed_at = CASE WHEN $2 THEN NOW() ELSE subscribed_at END,
                updated_at = NOW()
            WHERE email = $1
            RETURNING {SUBSCRIBER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(active)
        .fetch_optional(&self.pool)
        .await
    }

    /// 有効な購読者一覧（新しい順）
    pub async fn list_active(&self) -> Result<Vec<NewsletterSubscriber>, sqlx::Error> {
        sqlx::query_as::<_, NewsletterSubscriber>(&format!(
            r#"
            SELECT {SUBSCRIBER_COLUMNS}
            FROM newsletter_subscribers
            WHERE active
            ORDER BY subscribed_at DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await
    }
}
