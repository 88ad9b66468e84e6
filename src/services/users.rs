use std::sync::Arc;

use serde::Deserialize;

use crate::db::{CreateUser, Role, User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::services::access_policy::can_manage_user;
use crate::services::auth::AuthService;
use crate::services::settings::SettingsService;
use crate::AppState;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
}

pub struct UserService;

impl UserService {
    /// Trimmed, lowercased email. Rejects anything without a local part and a domain.
    pub fn normalize_email(email: &str) -> AppResult<String> {
        let email = email.trim().to_lowercase();
        match email.split_once('@') {
            Some((local, domain))
                if !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !email.chars().any(char::is_whitespace) =>
            {
                Ok(email)
            }
            _ => Err(AppError::InvalidInput(i18n::t("validation.invalid_email"))),
        }
    }

    pub fn normalize_name(name: &str) -> AppResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput(i18n::t("validation.name_required")));
        }
        Ok(name.to_string())
    }

    fn ensure_can_manage(actor: &User, target_role: Role) -> AppResult<()> {
        if can_manage_user(actor, target_role) {
            return Ok(());
        }
        tracing::warn!(
            "User {} ({}) may not manage {} accounts",
            actor.id,
            actor.role,
            target_role
        );
        Err(AppError::Forbidden)
    }

    /// Only the owner and admins see the user directory.
    fn ensure_staff(actor: &User) -> AppResult<()> {
        match actor.role {
            Role::Owner | Role::Admin => Ok(()),
            Role::User => Err(AppError::Forbidden),
        }
    }

    pub async fn list(
        state: &Arc<AppState>,
        actor: &User,
        query: Option<&str>,
        limit: Option<i64>,
    ) -> AppResult<Vec<User>> {
        Self::ensure_staff(actor)?;
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        UserRepository::search(&state.db, query.unwrap_or("").trim(), limit).await
    }

    pub async fn get(state: &Arc<AppState>, actor: &User, user_id: &str) -> AppResult<User> {
        Self::ensure_staff(actor)?;
        UserRepository::find_by_id(&state.db, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.user")))
    }

    pub async fn create(
        state: &Arc<AppState>,
        actor: &User,
        request: CreateUserRequest,
    ) -> AppResult<User> {
        Self::ensure_can_manage(actor, request.role)?;

        let email = Self::normalize_email(&request.email)?;
        let name = Self::normalize_name(&request.name)?;
        SettingsService::check_new_password(state, &request.password, actor.lang.as_deref())
            .await?;

        let password_hash = AuthService::hash_password(state, &request.password).await?;
        let user = UserRepository::create(
            &state.db,
            CreateUser {
                email,
                name,
                role: request.role,
                password_hash,
                email_verified: false,
            },
        )
        .await?;

        tracing::info!("User {} created {} account {}", actor.id, user.role, user.id);
        AuthService::send_verification(state, &user).await?;
        Ok(user)
    }

    pub async fn update(
        state: &Arc<AppState>,
        actor: &User,
        user_id: &str,
        request: UpdateUserRequest,
    ) -> AppResult<User> {
        let target = Self::get(state, actor, user_id).await?;
        Self::ensure_can_manage(actor, target.role)?;

        if let Some(role) = request.role {
            Self::ensure_can_manage(actor, role)?;
            if role != target.role {
                UserRepository::update_role(&state.db, &target.id, role).await?;
                tracing::info!(
                    "User {} changed role of {} from {} to {}",
                    actor.id,
                    target.id,
                    target.role,
                    role
                );
            }
        }

        if let Some(name) = request.name {
            let name = Self::normalize_name(&name)?;
            UserRepository::update_profile(&state.db, &target.id, &name, target.lang.as_deref())
                .await?;
        }

        Self::get(state, actor, user_id).await
    }

    pub async fn delete(state: &Arc<AppState>, actor: &User, user_id: &str) -> AppResult<()> {
        if actor.id == user_id {
            return Err(AppError::BadRequest(i18n::tr(
                actor.lang.as_deref(),
                "errors.cannot_delete_self",
                None,
            )));
        }

        let target = Self::get(state, actor, user_id).await?;
        Self::ensure_can_manage(actor, target.role)?;

        UserRepository::delete(&state.db, &target.id).await?;
        tracing::info!("User {} deleted account {}", actor.id, target.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, test_state};

    fn create_request(email: &str, role: Role) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            name: "Someone".to_string(),
            password: "Password1".to_string(),
            role,
        }
    }

    #[test]
    fn email_normalization() {
        assert_eq!(
            UserService::normalize_email("  Jane.Doe@Example.COM ").unwrap(),
            "jane.doe@example.com"
        );
        assert!(UserService::normalize_email("no-at-sign").is_err());
        assert!(UserService::normalize_email("@example.com").is_err());
        assert!(UserService::normalize_email("jane@").is_err());
        assert!(UserService::normalize_email("a@b@c").is_err());
        assert!(UserService::normalize_email("jane doe@example.com").is_err());
    }

    #[tokio::test]
    async fn admins_create_users_but_not_admins() {
        let state = test_state().await;
        let admin = seed_user(&state, "admin@example.com", Role::Admin).await;

        let created = UserService::create(&state, &admin, create_request("u@example.com", Role::User))
            .await
            .unwrap();
        assert_eq!(created.role, Role::User);

        assert!(matches!(
            UserService::create(&state, &admin, create_request("a2@example.com", Role::Admin)).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn nobody_creates_an_owner() {
        let state = test_state().await;
        let owner = seed_user(&state, "owner@example.com", Role::Owner).await;
        assert!(matches!(
            UserService::create(&state, &owner, create_request("o2@example.com", Role::Owner)).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn created_password_must_meet_policy() {
        let state = test_state().await;
        let owner = seed_user(&state, "owner@example.com", Role::Owner).await;
        let mut request = create_request("weak@example.com", Role::User);
        request.password = "short".to_string();

        assert!(matches!(
            UserService::create(&state, &owner, request).await,
            Err(AppError::PasswordPolicy { .. })
        ));
    }

    #[tokio::test]
    async fn admin_cannot_promote_user() {
        let state = test_state().await;
        let admin = seed_user(&state, "admin@example.com", Role::Admin).await;
        let user = seed_user(&state, "user@example.com", Role::User).await;

        let result = UserService::update(
            &state,
            &admin,
            &user.id,
            UpdateUserRequest {
                role: Some(Role::Admin),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden)));

        let renamed = UserService::update(
            &state,
            &admin,
            &user.id,
            UpdateUserRequest {
                name: Some(" Renamed ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, "Renamed");
        assert_eq!(renamed.role, Role::User);
    }

    #[tokio::test]
    async fn owner_promotes_and_demotes() {
        let state = test_state().await;
        let owner = seed_user(&state, "owner@example.com", Role::Owner).await;
        let user = seed_user(&state, "user@example.com", Role::User).await;

        let promoted = UserService::update(
            &state,
            &owner,
            &user.id,
            UpdateUserRequest {
                role: Some(Role::Admin),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }

    #[tokio::test]
    async fn delete_rules() {
        let state = test_state().await;
        let owner = seed_user(&state, "owner@example.com", Role::Owner).await;
        let admin = seed_user(&state, "admin@example.com", Role::Admin).await;
        let user = seed_user(&state, "user@example.com", Role::User).await;

        assert!(matches!(
            UserService::delete(&state, &admin, &admin.id).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            UserService::delete(&state, &admin, &owner.id).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            UserService::delete(&state, &user, &admin.id).await,
            Err(AppError::Forbidden)
        ));

        UserService::delete(&state, &admin, &user.id).await.unwrap();
        assert!(matches!(
            UserService::get(&state, &owner, &user.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn plain_users_cannot_list() {
        let state = test_state().await;
        let user = seed_user(&state, "user@example.com", Role::User).await;
        let owner = seed_user(&state, "owner@example.com", Role::Owner).await;

        assert!(matches!(
            UserService::list(&state, &user, None, None).await,
            Err(AppError::Forbidden)
        ));
        let all = UserService::list(&state, &owner, Some("user@"), None).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
