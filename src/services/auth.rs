use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::{AuthTokenRepository, CreateUser, Role, TokenKind, User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::services::email;
use crate::services::settings::SettingsService;
use crate::services::users::UserService;
use crate::AppState;

/// Length of the random part of emailed one-time tokens.
const ONE_TIME_TOKEN_LENGTH: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: i64,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub lang: Option<String>,
}

pub struct AuthService;

impl AuthService {
    /// Create a signed JWT for a user id. Returns the token and its expiry (unix seconds).
    pub fn create_jwt(state: &Arc<AppState>, user_id: &str) -> AppResult<(String, i64)> {
        let now = Utc::now();
        let exp = now + Duration::hours(state.config.jwt.expiration_hours);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        )?;
        Ok((token, exp.timestamp()))
    }

    /// Decode and validate a JWT, returning the claims
    pub fn decode_jwt(state: &Arc<AppState>, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Get user from JWT token
    pub async fn get_user_from_token(state: &Arc<AppState>, token: &str) -> AppResult<User> {
        let claims = Self::decode_jwt(state, token)?;
        let user = UserRepository::find_by_id(&state.db, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(user)
    }

    pub async fn hash_password(state: &Arc<AppState>, password: &str) -> AppResult<String> {
        let cost = state.config.tokens.bcrypt_cost;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing task failed: {}", e)))?
            .map_err(AppError::PasswordHash)
    }

    pub async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Password check task failed: {}", e)))?
            .map_err(AppError::PasswordHash)
    }

    fn session_for(state: &Arc<AppState>, user: User) -> AppResult<SessionResponse> {
        let (access_token, expires_at) = Self::create_jwt(state, &user.id)?;
        Ok(SessionResponse {
            access_token,
            token_type: "Bearer",
            expires_at,
            user,
        })
    }

    pub async fn login(
        state: &Arc<AppState>,
        email: &str,
        password: &str,
    ) -> AppResult<SessionResponse> {
        let email = UserService::normalize_email(email)?;

        let Some(user) = UserRepository::find_by_email(&state.db, &email).await? else {
            tracing::debug!("Login attempt for unknown email");
            return Err(AppError::InvalidCredentials(i18n::t("auth.invalid_credentials")));
        };

        if !Self::verify_password(password, &user.password_hash).await? {
            tracing::warn!("Failed login for user {}", user.id);
            return Err(AppError::InvalidCredentials(i18n::t("auth.invalid_credentials")));
        }

        // Only reported after a correct password, so it does not reveal which
        // addresses have accounts. The owner can always sign in.
        let providers = SettingsService::auth_providers(state).await?;
        if !providers.email_password_enabled && user.role != Role::Owner {
            tracing::debug!("Email/password login disabled for user {}", user.id);
            return Err(AppError::InvalidCredentials(i18n::tr(
                user.lang.as_deref(),
                "auth.email_password_disabled",
                None,
            )));
        }

        tracing::info!("User {} logged in", user.id);
        Self::session_for(state, user)
    }

    pub async fn register(
        state: &Arc<AppState>,
        request: RegisterRequest,
    ) -> AppResult<SessionResponse> {
        let lang = request.lang.as_deref().map(i18n::normalize_language);
        let lang = lang.filter(|l| i18n::is_supported_language(l));

        let providers = SettingsService::auth_providers(state).await?;
        if !providers.signup_enabled || !providers.email_password_enabled {
            return Err(AppError::Forbidden);
        }

        let email = UserService::normalize_email(&request.email)?;
        let name = UserService::normalize_name(&request.name)?;
        SettingsService::check_new_password(state, &request.password, lang.as_deref()).await?;

        let password_hash = Self::hash_password(state, &request.password).await?;
        let mut user = UserRepository::create(
            &state.db,
            CreateUser {
                email,
                name,
                role: Role::User,
                password_hash,
                email_verified: false,
            },
        )
        .await?;

        if let Some(lang) = lang {
            UserRepository::update_profile(&state.db, &user.id, &user.name, Some(&lang)).await?;
            user.lang = Some(lang);
        }

        tracing::info!("Registered user {}", user.id);
        Self::send_verification(state, &user).await?;
        Self::session_for(state, user)
    }

    /// Generate random string
    pub fn generate_random_string(length: usize) -> String {
        use rand::Rng;
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    /// Stored form of a one-time token.
    pub fn hash_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// Create a one-time token of `kind`, replacing any outstanding one.
    /// Returns the raw token; only its hash is persisted.
    pub async fn issue_token(
        state: &Arc<AppState>,
        user_id: &str,
        kind: TokenKind,
    ) -> AppResult<String> {
        let ttl = match kind {
            TokenKind::VerifyEmail => Duration::hours(state.config.tokens.verify_email_ttl_hours),
            TokenKind::ResetPassword => {
                Duration::minutes(state.config.tokens.reset_password_ttl_minutes)
            }
        };

        AuthTokenRepository::delete_for_user(&state.db, user_id, kind).await?;

        let token = Self::generate_random_string(ONE_TIME_TOKEN_LENGTH);
        let expires_at = (Utc::now() + ttl).naive_utc();
        AuthTokenRepository::create(&state.db, user_id, kind, &Self::hash_token(&token), expires_at)
            .await?;

        Ok(token)
    }

    /// Resolve a one-time token to its user and delete it.
    async fn consume_token(state: &Arc<AppState>, kind: TokenKind, token: &str) -> AppResult<User> {
        let invalid = || AppError::BadRequest(i18n::t("auth.invalid_or_expired_token"));

        let record = AuthTokenRepository::find_by_hash(&state.db, kind, &Self::hash_token(token))
            .await?
            .ok_or_else(invalid)?;

        AuthTokenRepository::delete(&state.db, &record.id).await?;

        if record.is_expired(Utc::now().naive_utc()) {
            tracing::debug!("Expired {} token for user {}", kind.as_str(), record.user_id);
            return Err(invalid());
        }

        UserRepository::find_by_id(&state.db, &record.user_id)
            .await?
            .ok_or_else(invalid)
    }

    pub async fn send_verification(state: &Arc<AppState>, user: &User) -> AppResult<()> {
        let token = Self::issue_token(state, &user.id, TokenKind::VerifyEmail).await?;
        let message = email::verification_email(state, user, &token).await;
        email::dispatch(state, message);
        Ok(())
    }

    pub async fn verify_email(state: &Arc<AppState>, token: &str) -> AppResult<User> {
        let mut user = Self::consume_token(state, TokenKind::VerifyEmail, token).await?;
        UserRepository::set_email_verified(&state.db, &user.id).await?;
        user.email_verified = true;
        tracing::info!("Verified email for user {}", user.id);
        Ok(user)
    }

    /// Always succeeds from the caller's point of view so the response does
    /// not reveal which addresses have accounts.
    pub async fn request_password_reset(state: &Arc<AppState>, email: &str) -> AppResult<()> {
        let Ok(email) = UserService::normalize_email(email) else {
            return Ok(());
        };

        let Some(user) = UserRepository::find_by_email(&state.db, &email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = Self::issue_token(state, &user.id, TokenKind::ResetPassword).await?;
        let message = email::password_reset_email(state, &user, &token).await;
        email::dispatch(state, message);
        tracing::info!("Password reset requested for user {}", user.id);
        Ok(())
    }

    pub async fn reset_password(
        state: &Arc<AppState>,
        token: &str,
        new_password: &str,
        lang: Option<&str>,
    ) -> AppResult<()> {
        // Check the policy first so a rejected password does not burn the token.
        SettingsService::check_new_password(state, new_password, lang).await?;

        let user = Self::consume_token(state, TokenKind::ResetPassword, token).await?;
        let hash = Self::hash_password(state, new_password).await?;
        UserRepository::update_password_hash(&state.db, &user.id, &hash).await?;
        AuthTokenRepository::delete_for_user(&state.db, &user.id, TokenKind::ResetPassword).await?;

        tracing::info!("Password reset for user {}", user.id);
        Ok(())
    }

    pub async fn change_password(
        state: &Arc<AppState>,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let lang = user.lang.as_deref();

        if !Self::verify_password(current_password, &user.password_hash).await? {
            tracing::warn!("Password change with wrong current password for user {}", user.id);
            return Err(AppError::InvalidInput(i18n::tr(
                lang,
                "auth.current_password_incorrect",
                None,
            )));
        }

        SettingsService::check_new_password(state, new_password, lang).await?;

        let hash = Self::hash_password(state, new_password).await?;
        UserRepository::update_password_hash(&state.db, &user.id, &hash).await?;
        tracing::info!("Password changed for user {}", user.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SettingRepository, SettingValue};
    use crate::services::settings::{AUTH_EMAIL_PASSWORD_ENABLED, AUTH_SIGNUP_ENABLED};
    use crate::test_support::{seed_user, test_state, SEED_PASSWORD};

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            name: "New User".to_string(),
            password: password.to_string(),
            lang: None,
        }
    }

    #[tokio::test]
    async fn jwt_round_trip() {
        let state = test_state().await;
        let user = seed_user(&state, "jwt@example.com", Role::User).await;

        let (token, expires_at) = AuthService::create_jwt(&state, &user.id).unwrap();
        assert!(expires_at > Utc::now().timestamp());

        let found = AuthService::get_user_from_token(&state, &token).await.unwrap();
        assert_eq!(found.id, user.id);
        assert!(AuthService::decode_jwt(&state, "not-a-token").is_err());
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let hash = AuthService::hash_token("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(AuthService::generate_random_string(32).len(), 32);
    }

    #[tokio::test]
    async fn login_checks_password_and_normalizes_email() {
        let state = test_state().await;
        let user = seed_user(&state, "login@example.com", Role::User).await;

        let session = AuthService::login(&state, " Login@Example.com ", SEED_PASSWORD)
            .await
            .unwrap();
        assert_eq!(session.user.id, user.id);
        assert_eq!(session.token_type, "Bearer");

        assert!(matches!(
            AuthService::login(&state, "login@example.com", "wrong").await,
            Err(AppError::InvalidCredentials(_))
        ));
        assert!(matches!(
            AuthService::login(&state, "nobody@example.com", SEED_PASSWORD).await,
            Err(AppError::InvalidCredentials(_))
        ));
    }

    #[tokio::test]
    async fn disabled_email_login_still_admits_owner() {
        let state = test_state().await;
        seed_user(&state, "owner@example.com", Role::Owner).await;
        seed_user(&state, "user@example.com", Role::User).await;
        SettingRepository::upsert(
            &state.db,
            AUTH_EMAIL_PASSWORD_ENABLED,
            &SettingValue::Boolean(false),
            None,
        )
        .await
        .unwrap();

        assert!(AuthService::login(&state, "owner@example.com", SEED_PASSWORD)
            .await
            .is_ok());
        assert!(AuthService::login(&state, "user@example.com", SEED_PASSWORD)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn disabled_login_does_not_reveal_known_accounts() {
        let state = test_state().await;
        seed_user(&state, "known@example.com", Role::User).await;
        SettingRepository::upsert(
            &state.db,
            AUTH_EMAIL_PASSWORD_ENABLED,
            &SettingValue::Boolean(false),
            None,
        )
        .await
        .unwrap();

        let known = match AuthService::login(&state, "known@example.com", "wrong").await {
            Err(AppError::InvalidCredentials(message)) => message,
            other => panic!("unexpected login result: {:?}", other.map(|s| s.user.id)),
        };
        let ghost = match AuthService::login(&state, "ghost@example.com", "wrong").await {
            Err(AppError::InvalidCredentials(message)) => message,
            other => panic!("unexpected login result: {:?}", other.map(|s| s.user.id)),
        };
        assert_eq!(known, ghost);
        assert_eq!(known, i18n::t("auth.invalid_credentials"));

        // A correct password learns that the provider is off.
        let disabled = match AuthService::login(&state, "known@example.com", SEED_PASSWORD).await {
            Err(AppError::InvalidCredentials(message)) => message,
            other => panic!("unexpected login result: {:?}", other.map(|s| s.user.id)),
        };
        assert_eq!(disabled, i18n::t("auth.email_password_disabled"));
    }

    #[tokio::test]
    async fn register_requires_signup_and_policy() {
        let state = test_state().await;

        assert!(matches!(
            AuthService::register(&state, register_request("new@example.com", "Password1")).await,
            Err(AppError::Forbidden)
        ));

        SettingRepository::upsert(&state.db, AUTH_SIGNUP_ENABLED, &SettingValue::Boolean(true), None)
            .await
            .unwrap();

        assert!(matches!(
            AuthService::register(&state, register_request("new@example.com", "short")).await,
            Err(AppError::PasswordPolicy { .. })
        ));

        let session = AuthService::register(&state, register_request("new@example.com", "Password1"))
            .await
            .unwrap();
        assert_eq!(session.user.role, Role::User);
        assert!(!session.user.email_verified);

        assert!(matches!(
            AuthService::register(&state, register_request("NEW@example.com", "Password1")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn verify_email_consumes_token_once() {
        let state = test_state().await;
        let user = seed_user(&state, "verify@example.com", Role::User).await;

        let token = AuthService::issue_token(&state, &user.id, TokenKind::VerifyEmail)
            .await
            .unwrap();
        let verified = AuthService::verify_email(&state, &token).await.unwrap();
        assert!(verified.email_verified);

        assert!(matches!(
            AuthService::verify_email(&state, &token).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn reissuing_a_token_invalidates_the_previous_one() {
        let state = test_state().await;
        let user = seed_user(&state, "again@example.com", Role::User).await;

        let first = AuthService::issue_token(&state, &user.id, TokenKind::ResetPassword)
            .await
            .unwrap();
        let second = AuthService::issue_token(&state, &user.id, TokenKind::ResetPassword)
            .await
            .unwrap();

        assert!(AuthService::reset_password(&state, &first, "Another1pass", None)
            .await
            .is_err());
        assert!(AuthService::reset_password(&state, &second, "Another1pass", None)
            .await
            .is_ok());
        assert!(AuthService::login(&state, "again@example.com", "Another1pass")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let state = test_state().await;
        let user = seed_user(&state, "late@example.com", Role::User).await;

        let token = "expiredtoken";
        AuthTokenRepository::create(
            &state.db,
            &user.id,
            TokenKind::ResetPassword,
            &AuthService::hash_token(token),
            (Utc::now() - Duration::minutes(1)).naive_utc(),
        )
        .await
        .unwrap();

        assert!(matches!(
            AuthService::reset_password(&state, token, "Another1pass", None).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn weak_reset_password_keeps_token_usable() {
        let state = test_state().await;
        let user = seed_user(&state, "weak@example.com", Role::User).await;
        let token = AuthService::issue_token(&state, &user.id, TokenKind::ResetPassword)
            .await
            .unwrap();

        assert!(matches!(
            AuthService::reset_password(&state, &token, "short", None).await,
            Err(AppError::PasswordPolicy { .. })
        ));
        assert!(AuthService::reset_password(&state, &token, "long enough", None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn password_reset_request_is_silent_for_unknown_email() {
        let state = test_state().await;
        assert!(AuthService::request_password_reset(&state, "ghost@example.com")
            .await
            .is_ok());
        assert!(AuthService::request_password_reset(&state, "not an email")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn change_password_requires_current_password() {
        let state = test_state().await;
        let user = seed_user(&state, "change@example.com", Role::User).await;

        assert!(matches!(
            AuthService::change_password(&state, &user, "wrong", "Another1pass").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            AuthService::change_password(&state, &user, SEED_PASSWORD, "short").await,
            Err(AppError::PasswordPolicy { .. })
        ));
        AuthService::change_password(&state, &user, SEED_PASSWORD, "Another1pass")
            .await
            .unwrap();
        assert!(AuthService::login(&state, "change@example.com", "Another1pass")
            .await
            .is_ok());
    }
}
