use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{Role, SettingRepository, SettingValue, User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::services::access_policy::{ShareConfig, ShareSetting};
use crate::services::password_policy::{
    self, build_password_error_message, build_password_regex, PasswordPattern, PasswordRules,
    MAX_RULE_VALUE,
};
use crate::AppState;

// Stored setting names.
pub const BRANDING_APP_NAME: &str = "branding_app_name";
pub const BRANDING_PRIMARY_COLOR: &str = "branding_primary_color";
pub const BRANDING_LOGO: &str = "branding_logo";
pub const AUTH_EMAIL_PASSWORD_ENABLED: &str = "auth_email_password_enabled";
pub const AUTH_SIGNUP_ENABLED: &str = "auth_signup_enabled";
pub const PASSWORD_MIN_LENGTH: &str = "password_min_length";
pub const PASSWORD_UPPERCASE_MIN: &str = "password_uppercase_min";
pub const PASSWORD_LOWERCASE_MIN: &str = "password_lowercase_min";
pub const PASSWORD_NUMBERS_MIN: &str = "password_numbers_min";
pub const PASSWORD_SYMBOLS_MIN: &str = "password_symbols_min";
pub const PASSWORD_UNIQUE_CHARS: &str = "password_unique_chars";
pub const SETTINGS_SHARE: &str = "settings_share";
pub const SETTINGS_SHARE_ADMINS: &str = "settings_share_admins";

pub const DEFAULT_APP_NAME: &str = "Lodge";
pub const DEFAULT_PRIMARY_COLOR: &str = "#2563eb";

const PASSWORD_SETTINGS: [&str; 6] = [
    PASSWORD_MIN_LENGTH,
    PASSWORD_UPPERCASE_MIN,
    PASSWORD_LOWERCASE_MIN,
    PASSWORD_NUMBERS_MIN,
    PASSWORD_SYMBOLS_MIN,
    PASSWORD_UNIQUE_CHARS,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branding {
    pub app_name: String,
    pub primary_color: String,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBranding {
    pub app_name: Option<String>,
    pub primary_color: Option<String>,
    /// Object key of an uploaded image; an empty string removes the logo.
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProviders {
    pub email_password_enabled: bool,
    pub signup_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAuthProviders {
    pub email_password_enabled: Option<bool>,
    pub signup_enabled: Option<bool>,
}

/// Partial rule update. Values are signed so that negative input can be
/// rejected with a message instead of a deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePasswordRules {
    pub min_length: Option<i64>,
    pub uppercase_min: Option<i64>,
    pub lowercase_min: Option<i64>,
    pub numbers_min: Option<i64>,
    pub symbols_min: Option<i64>,
    pub should_contain_unique_chars: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSharing {
    pub share: serde_json::Value,
    #[serde(default)]
    pub admin_ids: Vec<String>,
}

/// Everything a client needs to validate a new password locally.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordPolicyView {
    pub rules: PasswordRules,
    /// False when no threshold is active; `message` is then empty.
    pub has_rules: bool,
    pub pattern: PasswordPattern,
    pub message: String,
}

/// A stored threshold, or `default` when absent, mistyped or negative.
fn threshold(values: &HashMap<String, SettingValue>, name: &str, default: u32) -> u32 {
    match values.get(name) {
        Some(SettingValue::Number(n)) if *n >= 0 => (*n).min(MAX_RULE_VALUE as i64) as u32,
        Some(SettingValue::Number(n)) => {
            tracing::warn!("Ignoring negative value {} for setting '{}'", n, name);
            default
        }
        _ => default,
    }
}

fn flag(values: &HashMap<String, SettingValue>, name: &str, default: bool) -> bool {
    match values.get(name) {
        Some(SettingValue::Boolean(b)) => *b,
        _ => default,
    }
}

fn text(values: &HashMap<String, SettingValue>, name: &str, default: &str) -> String {
    match values.get(name) {
        Some(SettingValue::String(s)) => s.clone(),
        _ => default.to_string(),
    }
}

fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

fn checked_threshold(name: &str, value: i64) -> AppResult<SettingValue> {
    if !(0..=MAX_RULE_VALUE as i64).contains(&value) {
        let max = MAX_RULE_VALUE.to_string();
        return Err(AppError::InvalidInput(i18n::t_with(
            "validation.rule_out_of_range",
            &[("name", name), ("max", max.as_str())],
        )));
    }
    Ok(SettingValue::Number(value))
}

pub struct SettingsService;

impl SettingsService {
    /// Current password rule-set. Missing or invalid settings fall back to defaults.
    pub async fn password_rules(state: &Arc<AppState>) -> AppResult<PasswordRules> {
        let values = SettingRepository::get_many(&state.db, &PASSWORD_SETTINGS).await?;
        let defaults = PasswordRules::default();

        Ok(PasswordRules {
            min_length: threshold(&values, PASSWORD_MIN_LENGTH, defaults.min_length),
            uppercase_min: threshold(&values, PASSWORD_UPPERCASE_MIN, defaults.uppercase_min),
            lowercase_min: threshold(&values, PASSWORD_LOWERCASE_MIN, defaults.lowercase_min),
            numbers_min: threshold(&values, PASSWORD_NUMBERS_MIN, defaults.numbers_min),
            symbols_min: threshold(&values, PASSWORD_SYMBOLS_MIN, defaults.symbols_min),
            should_contain_unique_chars: flag(
                &values,
                PASSWORD_UNIQUE_CHARS,
                defaults.should_contain_unique_chars,
            ),
        })
    }

    pub async fn password_policy_view(
        state: &Arc<AppState>,
        lang: Option<&str>,
    ) -> AppResult<PasswordPolicyView> {
        let rules = Self::password_rules(state).await?;
        Ok(PasswordPolicyView {
            rules,
            has_rules: rules.has_rules(),
            pattern: build_password_regex(&rules),
            message: build_password_error_message(&rules, lang),
        })
    }

    /// Enforce the stored rule-set on a password that is about to be hashed.
    pub async fn check_new_password(
        state: &Arc<AppState>,
        password: &str,
        lang: Option<&str>,
    ) -> AppResult<()> {
        let rules = Self::password_rules(state).await?;
        password_policy::enforce(password, &rules, lang)
    }

    pub async fn update_password_rules(
        state: &Arc<AppState>,
        actor: &User,
        update: UpdatePasswordRules,
    ) -> AppResult<PasswordRules> {
        let numeric = [
            (PASSWORD_MIN_LENGTH, update.min_length),
            (PASSWORD_UPPERCASE_MIN, update.uppercase_min),
            (PASSWORD_LOWERCASE_MIN, update.lowercase_min),
            (PASSWORD_NUMBERS_MIN, update.numbers_min),
            (PASSWORD_SYMBOLS_MIN, update.symbols_min),
        ];

        // Validate everything before writing anything.
        let mut writes = Vec::new();
        for (name, value) in numeric {
            if let Some(value) = value {
                writes.push((name, checked_threshold(name, value)?));
            }
        }
        if let Some(unique) = update.should_contain_unique_chars {
            writes.push((PASSWORD_UNIQUE_CHARS, SettingValue::Boolean(unique)));
        }

        let mut tx = state.db.begin().await?;
        for (name, value) in &writes {
            SettingRepository::upsert(&mut *tx, name, value, Some(&actor.id)).await?;
        }
        tx.commit().await?;

        let rules = Self::password_rules(state).await?;
        tracing::info!("Password rules updated by {}: {:?}", actor.id, rules);
        Ok(rules)
    }

    /// Sharing configuration as stored; unknown values disable sharing.
    pub async fn share_config(state: &Arc<AppState>) -> AppResult<ShareConfig> {
        let values =
            SettingRepository::get_many(&state.db, &[SETTINGS_SHARE, SETTINGS_SHARE_ADMINS])
                .await?;

        let setting = ShareSetting::from_setting(values.get(SETTINGS_SHARE));
        let admin_ids = match values.get(SETTINGS_SHARE_ADMINS) {
            Some(SettingValue::ObjectIds(ids)) => ids.clone(),
            _ => Vec::new(),
        };

        Ok(ShareConfig { setting, admin_ids })
    }

    /// Fetch the sharing configuration and fail with 403 unless `user` may
    /// access owner-restricted settings.
    pub async fn ensure_settings_access(state: &Arc<AppState>, user: &User) -> AppResult<()> {
        let share = Self::share_config(state).await?;
        if share.allows(user) {
            return Ok(());
        }

        tracing::warn!(
            "Settings access denied for user {} (role {})",
            user.id,
            user.role
        );
        Err(AppError::Forbidden)
    }

    /// Replace the sharing configuration. Only the owner may call this.
    pub async fn update_sharing(
        state: &Arc<AppState>,
        actor: &User,
        update: UpdateSharing,
    ) -> AppResult<ShareConfig> {
        if actor.role != Role::Owner {
            tracing::warn!("User {} attempted to change settings sharing", actor.id);
            return Err(AppError::Forbidden);
        }

        let setting = ShareSetting::from_json(&update.share)
            .ok_or_else(|| AppError::InvalidInput(i18n::t("validation.invalid_share_value")))?;

        let mut admin_ids: Vec<String> = Vec::new();
        for id in update.admin_ids {
            if admin_ids.contains(&id) {
                continue;
            }
            let is_admin = UserRepository::find_by_id(&state.db, &id)
                .await?
                .is_some_and(|u| u.role == Role::Admin);
            if !is_admin {
                return Err(AppError::InvalidInput(i18n::t_with(
                    "validation.share_admin_not_admin",
                    &[("id", id.as_str())],
                )));
            }
            admin_ids.push(id);
        }

        // Mode and admin list only make sense together.
        let mut tx = state.db.begin().await?;
        SettingRepository::upsert(&mut *tx, SETTINGS_SHARE, &setting.to_setting(), Some(&actor.id))
            .await?;
        SettingRepository::upsert(
            &mut *tx,
            SETTINGS_SHARE_ADMINS,
            &SettingValue::ObjectIds(admin_ids.clone()),
            Some(&actor.id),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            "Settings sharing set to {:?} with {} selected admins",
            setting,
            admin_ids.len()
        );

        Ok(ShareConfig { setting, admin_ids })
    }

    pub async fn branding(state: &Arc<AppState>) -> AppResult<Branding> {
        let values = SettingRepository::get_many(
            &state.db,
            &[BRANDING_APP_NAME, BRANDING_PRIMARY_COLOR, BRANDING_LOGO],
        )
        .await?;

        Ok(Branding {
            app_name: text(&values, BRANDING_APP_NAME, DEFAULT_APP_NAME),
            primary_color: text(&values, BRANDING_PRIMARY_COLOR, DEFAULT_PRIMARY_COLOR),
            logo: match values.get(BRANDING_LOGO) {
                Some(SettingValue::Image(key)) => Some(key.clone()),
                _ => None,
            },
        })
    }

    pub async fn update_branding(
        state: &Arc<AppState>,
        actor: &User,
        update: UpdateBranding,
    ) -> AppResult<Branding> {
        let app_name = match update.app_name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(AppError::InvalidInput(i18n::t("validation.app_name_required")));
                }
                Some(name)
            }
            None => None,
        };

        let primary_color = match update.primary_color {
            Some(color) if is_hex_color(&color) => Some(color.to_lowercase()),
            Some(_) => return Err(AppError::InvalidInput(i18n::t("validation.invalid_color"))),
            None => None,
        };

        let mut tx = state.db.begin().await?;
        if let Some(name) = app_name {
            SettingRepository::upsert(
                &mut *tx,
                BRANDING_APP_NAME,
                &SettingValue::String(name),
                Some(&actor.id),
            )
            .await?;
        }
        if let Some(color) = primary_color {
            SettingRepository::upsert(
                &mut *tx,
                BRANDING_PRIMARY_COLOR,
                &SettingValue::String(color),
                Some(&actor.id),
            )
            .await?;
        }
        match update.logo {
            Some(key) if key.is_empty() => {
                SettingRepository::delete(&mut *tx, BRANDING_LOGO).await?;
            }
            Some(key) => {
                SettingRepository::upsert(
                    &mut *tx,
                    BRANDING_LOGO,
                    &SettingValue::Image(key),
                    Some(&actor.id),
                )
                .await?;
            }
            None => {}
        }
        tx.commit().await?;

        Self::branding(state).await
    }

    pub async fn auth_providers(state: &Arc<AppState>) -> AppResult<AuthProviders> {
        let values = SettingRepository::get_many(
            &state.db,
            &[AUTH_EMAIL_PASSWORD_ENABLED, AUTH_SIGNUP_ENABLED],
        )
        .await?;

        Ok(AuthProviders {
            email_password_enabled: flag(&values, AUTH_EMAIL_PASSWORD_ENABLED, true),
            signup_enabled: flag(&values, AUTH_SIGNUP_ENABLED, false),
        })
    }

    pub async fn update_auth_providers(
        state: &Arc<AppState>,
        actor: &User,
        update: UpdateAuthProviders,
    ) -> AppResult<AuthProviders> {
        let mut tx = state.db.begin().await?;
        if let Some(enabled) = update.email_password_enabled {
            SettingRepository::upsert(
                &mut *tx,
                AUTH_EMAIL_PASSWORD_ENABLED,
                &SettingValue::Boolean(enabled),
                Some(&actor.id),
            )
            .await?;
        }
        if let Some(enabled) = update.signup_enabled {
            SettingRepository::upsert(
                &mut *tx,
                AUTH_SIGNUP_ENABLED,
                &SettingValue::Boolean(enabled),
                Some(&actor.id),
            )
            .await?;
        }
        tx.commit().await?;

        Self::auth_providers(state).await
    }
}
