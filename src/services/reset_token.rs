use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppError;

/// 時刻の取得元（テストでは手動で進める）
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// システム時刻（UTC）
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// ユーザーごとのリセットトークン保存先
///
/// ハッシュと有効期限は常に同時に設定・消去する。
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 保留中のトークンを上書き保存（ユーザーごとに最大1件）
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error>;

    /// ハッシュが一致し `expires_at > now` のレコードを探して消去し、ユーザーIDを返す
    ///
    /// 検索と消去は不可分に行うこと。
    async fn take_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Uuid>, sqlx::Error>;

    /// 保留中のトークンが `token_hash` のままなら消去する
    async fn clear_reset_token(&self, user_id: Uuid, token_hash: &str) -> Result<(), sqlx::Error>;
}

/// 32バイトのランダムトークンを生成（URL-safe Base64）
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// トークンをSHA256でハッシュ化（16進小文字）
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// パスワードリセットトークンのライフサイクル
///
/// `NONE → PENDING → NONE`。期限切れは検証時にのみ判定し、能動的な削除は行わない。
///
/// # Security
/// - トークン平文は保存もログ出力もしない
/// - 不一致・期限切れ・使用済みは同一のエラーを返す
#[derive(Clone)]
pub struct ResetTokenLifecycle {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ResetTokenLifecycle {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// トークンを発行し平文を返す（以前の保留中トークンは無効になる）
    pub async fn mint(&self, user_id: Uuid) -> Result<String, AppError> {
        let token = generate_token();
        let expires_at = self.clock.now() + self.ttl;

        self.store
            .set_reset_token(user_id, &hash_token(&token), expires_at)
            .await?;

        tracing::info!(user_id = %user_id, expires_at = %expires_at, "リセットトークン発行");
        Ok(token)
    }

    /// トークンを検証して消費し、ユーザーIDを返す（1回限り）
    pub async fn consume(&self, token: &str) -> Result<Uuid, AppError> {
        let user_id = self
            .store
            .take_reset_token(&hash_token(token), self.clock.now())
            .await?
            .ok_or_else(|| {
                tracing::warn!("無効・期限切れ・使用済みのリセットトークン");
                AppError::TokenInvalid
            })?;

        tracing::info!(user_id = %user_id, "リセットトークン消費");
        Ok(user_id)
    }

    /// 発行済みトークンを取り消す（より新しいトークンは残す）
    pub async fn revoke(&self, user_id: Uuid, token: &str) -> Result<(), AppError> {
        self.store
            .clear_reset_token(user_id, &hash_token(token))
            .await?;
        tracing::info!(user_id = %user_id, "リセットトークン取り消し");
        Ok(())
    }

    /// トークンを発行して配信し、配信失敗時は発行を取り消す
    pub async fn issue_and_deliver<T, E, F, Fut>(
        &self,
        user_id: Uuid,
        deliver: F,
    ) -> Result<T, AppError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        AppError: From<E>,
    {
        let token = self.mint(user_id).await?;

        match deliver(token.clone()).await {
            Ok(delivered) => Ok(delivered),
            Err(e) => {
                tracing::warn!(user_id = %user_id, "配信失敗のためリセットトークンを取り消し");
                self.revoke(user_id, &token).await?;
                Err(AppError::from(e))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use time::macros::datetime;

    use super::*;

    /// メモリ上の CredentialStore
    #[derive(Default)]
    pub(crate) struct MemoryCredentialStore {
        records: Mutex<HashMap<Uuid, (String, OffsetDateTime)>>,
    }

    impl MemoryCredentialStore {
        pub(crate) fn pending(&self, user_id: Uuid) -> Option<(String, OffsetDateTime)> {
            self.records.lock().unwrap().get(&user_id).cloned()
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn set_reset_token(
            &self,
            user_id: Uuid,
            token_hash: &str,
            expires_at: OffsetDateTime,
        ) -> Result<(), sqlx::Error> {
            self.records
                .lock()
                .unwrap()
                .insert(user_id, (token_hash.to_string(), expires_at));
            Ok(())
        }

        async fn take_reset_token(
            &self,
            token_hash: &str,
            now: OffsetDateTime,
        ) -> Result<Option<Uuid>, sqlx::Error> {
            let mut records = self.records.lock().unwrap();
            let user_id = records
                .iter()
                .find(|(_, (hash, expires_at))| hash == token_hash && *expires_at > now)
                .map(|(user_id, _)| *user_id);
            if let Some(user_id) = user_id {
                records.remove(&user_id);
            }
            Ok(user_id)
        }

        async fn clear_reset_token(
            &self,
            user_id: Uuid,
            token_hash: &str,
        ) -> Result<(), sqlx::Error> {
            let mut records = self.records.lock().unwrap();
            if records.get(&user_id).is_some_and(|(hash, _)| hash == token_hash) {
                records.remove(&user_id);
            }
            Ok(())
        }
    }

    /// 手動で進める時計
    pub(crate) struct ManualClock(Mutex<OffsetDateTime>);

    impl ManualClock {
        pub(crate) fn new(start: OffsetDateTime) -> Self {
            Self(Mutex::new(start))
        }

        pub(crate) fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }

    pub(crate) fn lifecycle() -> (ResetTokenLifecycle, Arc<MemoryCredentialStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryCredentialStore::default());
        let clock = Arc::new(ManualClock::new(datetime!(2025-01-01 00:00 UTC)));
        let lifecycle = ResetTokenLifecycle::new(
            Arc::clone(&store) as Arc<dyn CredentialStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Duration::minutes(10),
        );
        (lifecycle, store, clock)
    }

    #[test]
    fn test_generate_token_has_256_bits() {
        let token = generate_token();
        assert_eq!(URL_SAFE_NO_PAD.decode(&token).unwrap().len(), 32);
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_hash_token_is_deterministic_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token("token"), hash_token("token"));
        assert_ne!(hash_token("token"), hash_token("token2"));
    }

    #[tokio::test]
    async fn test_mint_stores_hash_not_plaintext() {
        let (lifecycle, store, clock) = lifecycle();
        let user_id = Uuid::new_v4();

        let token = lifecycle.mint(user_id).await.unwrap();

        let (hash, expires_at) = store.pending(user_id).unwrap();
        assert_eq!(hash, hash_token(&token));
        assert_ne!(hash, token);
        assert_eq!(expires_at, clock.now() + Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_consume_succeeds_exactly_once() {
        let (lifecycle, store, _) = lifecycle();
        let user_id = Uuid::new_v4();
        let token = lifecycle.mint(user_id).await.unwrap();

        assert_eq!(lifecycle.consume(&token).await.unwrap(), user_id);
        assert!(store.pending(user_id).is_none());
        assert!(matches!(
            lifecycle.consume(&token).await,
            Err(AppError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_consume_after_expiry_fails() {
        let (lifecycle, _, clock) = lifecycle();
        let token = lifecycle.mint(Uuid::new_v4()).await.unwrap();

        clock.advance(Duration::minutes(10));

        // 有効期限ちょうどは無効（expires_at > now のみ有効）
        assert!(matches!(
            lifecycle.consume(&token).await,
            Err(AppError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_consume_just_before_expiry_succeeds() {
        let (lifecycle, _, clock) = lifecycle();
        let user_id = Uuid::new_v4();
        let token = lifecycle.mint(user_id).await.unwrap();

        clock.advance(Duration::minutes(10) - Duration::seconds(1));

        assert_eq!(lifecycle.consume(&token).await.unwrap(), user_id);
    }

    #[tokio::test]
    async fn test_second_mint_invalidates_first() {
        let (lifecycle, _, _) = lifecycle();
        let user_id = Uuid::new_v4();

        let first = lifecycle.mint(user_id).await.unwrap();
        let second = lifecycle.mint(user_id).await.unwrap();

        assert!(matches!(
            lifecycle.consume(&first).await,
            Err(AppError::TokenInvalid)
        ));
        assert_eq!(lifecycle.consume(&second).await.unwrap(), user_id);
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let (lifecycle, _, _) = lifecycle();
        lifecycle.mint(Uuid::new_v4()).await.unwrap();

        assert!(matches!(
            lifecycle.consume("not-a-real-token").await,
            Err(AppError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_revoke_keeps_newer_token() {
        let (lifecycle, store, _) = lifecycle();
        let user_id = Uuid::new_v4();

        let stale = lifecycle.mint(user_id).await.unwrap();
        let current = lifecycle.mint(user_id).await.unwrap();
        lifecycle.revoke(user_id, &stale).await.unwrap();

        assert_eq!(store.pending(user_id).unwrap().0, hash_token(&current));
    }

    #[tokio::test]
    async fn test_failed_delivery_rolls_back_mint() {
        let (lifecycle, store, _) = lifecycle();
        let user_id = Uuid::new_v4();

        let result: Result<(), AppError> = lifecycle
            .issue_and_deliver(user_id, |_token| async {
                Err::<(), AppError>(AppError::Mail(crate::services::email::MailError::Configuration))
            })
            .await;

        assert!(matches!(result, Err(AppError::Mail(_))));
        assert!(store.pending(user_id).is_none());
    }

    #[tokio::test]
    async fn test_successful_delivery_keeps_pending_token() {
        let (lifecycle, store, _) = lifecycle();
        let user_id = Uuid::new_v4();

        let delivered = lifecycle
            .issue_and_deliver(user_id, |token| async move { Ok::<_, AppError>(token) })
            .await
            .unwrap();

        assert_eq!(store.pending(user_id).unwrap().0, hash_token(&delivered));
        assert_eq!(lifecycle.consume(&delivered).await.unwrap(), user_id);
    }
}
