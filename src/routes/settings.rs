use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::Role;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::routes::request_lang;
use crate::services::access_policy::ShareConfig;
use crate::services::password_policy::{validate_password, PasswordRules, PasswordValidationResult};
use crate::services::settings::{
    AuthProviders, Branding, PasswordPolicyView, SettingsService, UpdateAuthProviders,
    UpdateBranding, UpdatePasswordRules, UpdateSharing,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Public: clients need the policy before anyone is signed in
        .route("/password-policy", get(get_password_policy))
        .route("/password-policy/check", post(check_password))
        // Owner, or admins the owner shared settings with
        .route(
            "/password-policy/rules",
            get(get_password_rules).put(update_password_rules),
        )
        .route("/branding", get(get_branding).put(update_branding))
        .route(
            "/auth-providers",
            get(get_auth_providers).put(update_auth_providers),
        )
        // Owner only
        .route("/sharing", get(get_sharing).put(update_sharing))
}

#[derive(Debug, Deserialize)]
pub struct CheckPasswordRequest {
    pub password: String,
}

// ============================================================================
// Password policy
// ============================================================================

async fn get_password_policy(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<PasswordPolicyView>> {
    let lang = request_lang(&headers);
    let view = SettingsService::password_policy_view(&state, lang.as_deref()).await?;
    Ok(Json(view))
}

async fn check_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckPasswordRequest>,
) -> AppResult<Json<PasswordValidationResult>> {
    let rules = SettingsService::password_rules(&state).await?;
    Ok(Json(validate_password(&request.password, &rules)))
}

async fn get_password_rules(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<PasswordRules>> {
    SettingsService::ensure_settings_access(&state, &user).await?;
    Ok(Json(SettingsService::password_rules(&state).await?))
}

async fn update_password_rules(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdatePasswordRules>,
) -> AppResult<Json<PasswordRules>> {
    SettingsService::ensure_settings_access(&state, &user).await?;
    let rules = SettingsService::update_password_rules(&state, &user, request).await?;
    Ok(Json(rules))
}

// ============================================================================
// Branding / auth providers
// ============================================================================

async fn get_branding(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Branding>> {
    SettingsService::ensure_settings_access(&state, &user).await?;
    Ok(Json(SettingsService::branding(&state).await?))
}

async fn update_branding(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateBranding>,
) -> AppResult<Json<Branding>> {
    SettingsService::ensure_settings_access(&state, &user).await?;
    Ok(Json(
        SettingsService::update_branding(&state, &user, request).await?,
    ))
}

async fn get_auth_providers(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<AuthProviders>> {
    SettingsService::ensure_settings_access(&state, &user).await?;
    Ok(Json(SettingsService::auth_providers(&state).await?))
}

async fn update_auth_providers(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateAuthProviders>,
) -> AppResult<Json<AuthProviders>> {
    SettingsService::ensure_settings_access(&state, &user).await?;
    Ok(Json(
        SettingsService::update_auth_providers(&state, &user, request).await?,
    ))
}

// ============================================================================
// Sharing
// ============================================================================

async fn get_sharing(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<ShareConfig>> {
    if user.role != Role::Owner {
        return Err(AppError::Forbidden);
    }
    Ok(Json(SettingsService::share_config(&state).await?))
}

async fn update_sharing(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateSharing>,
) -> AppResult<Json<ShareConfig>> {
    Ok(Json(
        SettingsService::update_sharing(&state, &user, request).await?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::db::{Role, SettingRepository, SettingValue};
    use crate::services::settings::{
        PASSWORD_MIN_LENGTH, PASSWORD_NUMBERS_MIN, PASSWORD_UPPERCASE_MIN,
    };
    use crate::test_support::{bearer, call, json_request, seed_user, test_app, test_state};

    #[tokio::test]
    async fn public_policy_exposes_pattern_and_message() {
        let state = test_state().await;
        SettingRepository::upsert(&state.db, PASSWORD_UPPERCASE_MIN, &SettingValue::Number(2), None)
            .await
            .unwrap();
        SettingRepository::upsert(&state.db, PASSWORD_NUMBERS_MIN, &SettingValue::Number(1), None)
            .await
            .unwrap();
        let app = test_app(state);

        let (status, body) =
            call(&app, json_request("GET", "/api/settings/password-policy", None, json!(null))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["pattern"],
            "^(?=(?:[^A-Z]*[A-Z]){2})(?=(?:[^0-9]*[0-9]){1})[\\s\\S]{8,}$"
        );
        assert_eq!(
            body["message"],
            "Must contain at least 2 uppercase letters, 1 number, 8 characters."
        );
        assert_eq!(body["rules"]["uppercase_min"], 2);
        assert_eq!(body["has_rules"], true);
    }

    #[tokio::test]
    async fn policy_without_thresholds_has_no_rules_or_message() {
        let state = test_state().await;
        SettingRepository::upsert(&state.db, PASSWORD_MIN_LENGTH, &SettingValue::Number(0), None)
            .await
            .unwrap();
        let app = test_app(state);

        let (status, body) =
            call(&app, json_request("GET", "/api/settings/password-policy", None, json!(null))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["has_rules"], false);
        assert_eq!(body["message"], "");
        assert_eq!(body["pattern"], "^[\\s\\S]{0,}$");
    }

    #[tokio::test]
    async fn check_reports_each_rule() {
        let state = test_state().await;
        SettingRepository::upsert(&state.db, PASSWORD_MIN_LENGTH, &SettingValue::Number(8), None)
            .await
            .unwrap();
        SettingRepository::upsert(&state.db, PASSWORD_UPPERCASE_MIN, &SettingValue::Number(1), None)
            .await
            .unwrap();
        let app = test_app(state);

        let (status, body) = call(
            &app,
            json_request(
                "POST",
                "/api/settings/password-policy/check",
                None,
                json!({ "password": "Password1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_length_valid"], true);
        assert_eq!(body["is_uppercase_valid"], true);

        let (_, body) = call(
            &app,
            json_request(
                "POST",
                "/api/settings/password-policy/check",
                None,
                json!({ "password": "short" }),
            ),
        )
        .await;
        assert_eq!(body["is_length_valid"], false);
        assert_eq!(body["is_uppercase_valid"], false);
    }

    #[tokio::test]
    async fn selected_admin_gets_access_others_do_not() {
        let state = test_state().await;
        let owner = seed_user(&state, "owner@example.com", Role::Owner).await;
        let admin_a = seed_user(&state, "a@example.com", Role::Admin).await;
        let admin_b = seed_user(&state, "b@example.com", Role::Admin).await;
        let app = test_app(state.clone());

        // Sharing disabled by default.
        let (status, _) = call(
            &app,
            json_request("GET", "/api/settings/branding", Some(&bearer(&state, &admin_a)), json!(null)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            json_request(
                "PUT",
                "/api/settings/sharing",
                Some(&bearer(&state, &owner)),
                json!({ "share": "share_admin_selection", "admin_ids": [admin_a.id] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["share"], "share_admin_selection");

        let (status, _) = call(
            &app,
            json_request(
                "PUT",
                "/api/settings/password-policy/rules",
                Some(&bearer(&state, &admin_a)),
                json!({ "numbers_min": 2 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            json_request(
                "GET",
                "/api/settings/password-policy/rules",
                Some(&bearer(&state, &admin_b)),
                json!(null),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");
    }

    #[tokio::test]
    async fn sharing_is_owner_only() {
        let state = test_state().await;
        let admin = seed_user(&state, "a@example.com", Role::Admin).await;
        let app = test_app(state.clone());
        let token = bearer(&state, &admin);

        let (status, _) =
            call(&app, json_request("GET", "/api/settings/sharing", Some(&token), json!(null))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            json_request(
                "PUT",
                "/api/settings/sharing",
                Some(&token),
                json!({ "share": "share_all_admin" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn out_of_range_rule_is_invalid_input() {
        let state = test_state().await;
        let owner = seed_user(&state, "owner@example.com", Role::Owner).await;
        let app = test_app(state.clone());

        let (status, body) = call(
            &app,
            json_request(
                "PUT",
                "/api/settings/password-policy/rules",
                Some(&bearer(&state, &owner)),
                json!({ "min_length": 1000 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "invalid-input");
        assert_eq!(
            body["error"]["message"],
            "password_min_length must be between 0 and 256"
        );
    }

    #[tokio::test]
    async fn plain_user_never_reaches_settings() {
        let state = test_state().await;
        let user = seed_user(&state, "u@example.com", Role::User).await;
        let app = test_app(state.clone());

        let (status, _) = call(
            &app,
            json_request(
                "GET",
                "/api/settings/auth-providers",
                Some(&bearer(&state, &user)),
                json!(null),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
