use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::extract::AuthUser;
use crate::models::{Address, Product, User};
use crate::repositories::ProfileChanges;
use crate::services::AuthService;
use crate::services::auth::{hash_password, normalize_email};
use crate::state::AppState;

/// パスワードの最小文字数
pub(crate) const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String, // SecretBox不要（Deserialize後すぐハッシュ化）
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// ユーザー情報とセッショントークン
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
}

/// ユーザー登録ハンドラー
///
/// POST /api/auth/register
///
/// # Security
/// - パスワードはログに出力しない
/// - パスワードは即座にハッシュ化
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    validate_register_request(&request)?;

    let email = normalize_email(&request.email);
    let password_hash = hash_password(&request.password)?;

    let user = state
        .user_repo
        .create_user(
            request.name.trim(),
            &email,
            &password_hash,
            request.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()),
        )
        .await
        .map_err(email_conflict)?;

    tracing::info!(user_id = %user.id, "ユーザー登録成功");

    // ウェルカムメールの失敗は登録を失敗させない
    if let Err(e) = state
        .email_service
        .send_welcome_email(&user.email, &user.name)
        .await
    {
        tracing::warn!(user_id = %user.id, error = %e, "ウェルカムメール送信失敗");
    }

    let token = state.jwt.issue(user.id)?;
    Ok((StatusCode::CREATED, Json(SessionResponse { user, token })))
}

/// ログインハンドラー
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    validate_login_request(&request)?;

    let auth_service = AuthService::new(state.user_repo.clone());
    let user = auth_service
        .authenticate(&request.email, &request.password)
        .await?;

    let token = state.jwt.issue(user.id)?;
    Ok(Json(SessionResponse { user, token }))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub password: Option<String>,
}

/// プロフィール更新ハンドラー
///
/// PUT /api/auth/profile
///
/// 空文字の項目は変更しない
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let changes = profile_changes(request)?;

    let updated = state
        .user_repo
        .update_profile(user.id, changes)
        .await
        .map_err(email_conflict)?
        .ok_or_else(|| AppError::NotFound("ユーザーが見つかりません".to_string()))?;

    tracing::info!(user_id = %updated.id, "プロフィール更新");
    Ok(Json(updated))
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub favorites: Vec<Product>,
}

/// GET /api/auth/favorites
pub async fn favorites(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<FavoritesResponse>, AppError> {
    let favorites = state.user_repo.favorites(user.id).await?;
    Ok(Json(FavoritesResponse { favorites }))
}

/// メールアドレスの一意制約違反を変換
fn email_conflict(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.constraint() == Some("users_email_key")
    {
        return AppError::EmailAlreadyExists;
    }
    AppError::Database(e)
}

/// メールアドレスのバリデーション
pub(crate) fn validate_email(email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() {
        return Err(AppError::Validation("メールアドレスは必須です".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }
    Ok(())
}

/// パスワードのバリデーション
pub(crate) fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "パスワードは{}文字以上で入力してください",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// 登録リクエストのバリデーション
fn validate_register_request(request: &RegisterRequest) -> Result<(), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("名前は必須です".to_string()));
    }
    validate_email(&request.email)?;
    validate_password(&request.password)
}

fn validate_login_request(request: &LoginRequest) -> Result<(), AppError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "メールアドレスとパスワードは必須です".to_string(),
        ));
    }
    Ok(())
}

/// 更新リクエストを変更内容に変換（空文字は未指定扱い）
fn profile_changes(request: UpdateProfileRequest) -> Result<ProfileChanges, AppError> {
    fn present(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    let email = present(request.email);
    if let Some(email) = &email {
        validate_email(email)?;
    }

    let password_hash = match request.password.filter(|p| !p.is_empty()) {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&password)?)
        }
        None => None,
    };

    Ok(ProfileChanges {
        name: present(request.name),
        email: email.as_deref().map(normalize_email),
        phone: present(request.phone),
        address: request.address,
        password_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ana".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_validate_empty_email() {
        let result = validate_register_request(&register_request("", "password123"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_invalid_email() {
        let result = validate_register_request(&register_request("invalid-email", "password123"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_short_password() {
        let result = validate_register_request(&register_request("test@example.com", "12345"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_requires_name() {
        let mut request = register_request("test@example.com", "123456");
        request.name = "  ".to_string();
        assert!(validate_register_request(&request).is_err());
    }

    #[test]
    fn test_validate_valid_request() {
        let result = validate_register_request(&register_request("test@example.com", "123456"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_profile_changes_ignores_blank_fields() {
        let changes = profile_changes(UpdateProfileRequest {
            name: Some(" ".to_string()),
            email: Some(" Ana@Example.com ".to_string()),
            phone: None,
            address: None,
            password: Some(String::new()),
        })
        .unwrap();

        assert!(changes.name.is_none());
        assert_eq!(changes.email.as_deref(), Some("ana@example.com"));
        assert!(changes.password_hash.is_none());
    }

    #[test]
    fn test_profile_changes_hashes_password() {
        let changes = profile_changes(UpdateProfileRequest {
            name: None,
            email: None,
            phone: None,
            address: None,
            password: Some("nueva-clave".to_string()),
        })
        .unwrap();

        let hash = changes.password_hash.unwrap();
        assert_ne!(hash, "nueva-clave");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_profile_changes_rejects_short_password() {
        let result = profile_changes(UpdateProfileRequest {
            name: None,
            email: None,
            phone: None,
            address: None,
            password: Some("abc".to_string()),
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
