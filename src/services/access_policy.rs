//! Access decisions for owner-restricted settings and user management.
//!
//! Every function here is a pure decision over values the caller has already
//! fetched for the current request; handlers turn `false` into `403 forbidden`.

use serde::Serialize;

use crate::db::{Role, SettingValue, User};

pub const SHARE_ALL_ADMIN: &str = "share_all_admin";
pub const SHARE_ADMIN_SELECTION: &str = "share_admin_selection";

/// Stored value of the `settings_share` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareSetting {
    #[default]
    Disabled,
    ShareAllAdmin,
    ShareAdminSelection,
}

impl ShareSetting {
    /// Interpret a stored value. Anything unrecognized disables sharing.
    pub fn from_setting(value: Option<&SettingValue>) -> Self {
        match value {
            Some(SettingValue::String(s)) if s == SHARE_ALL_ADMIN => ShareSetting::ShareAllAdmin,
            Some(SettingValue::String(s)) if s == SHARE_ADMIN_SELECTION => {
                ShareSetting::ShareAdminSelection
            }
            _ => ShareSetting::Disabled,
        }
    }

    pub fn to_setting(self) -> SettingValue {
        match self {
            ShareSetting::Disabled => SettingValue::Boolean(false),
            ShareSetting::ShareAllAdmin => SettingValue::String(SHARE_ALL_ADMIN.to_string()),
            ShareSetting::ShareAdminSelection => {
                SettingValue::String(SHARE_ADMIN_SELECTION.to_string())
            }
        }
    }

    /// Parse the API representation: `false`, `"share_all_admin"` or
    /// `"share_admin_selection"`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(false) => Some(ShareSetting::Disabled),
            serde_json::Value::String(s) if s == SHARE_ALL_ADMIN => {
                Some(ShareSetting::ShareAllAdmin)
            }
            serde_json::Value::String(s) if s == SHARE_ADMIN_SELECTION => {
                Some(ShareSetting::ShareAdminSelection)
            }
            _ => None,
        }
    }

    pub fn to_json(self) -> serde_json::Value {
        match self {
            ShareSetting::Disabled => serde_json::Value::Bool(false),
            ShareSetting::ShareAllAdmin => serde_json::Value::from(SHARE_ALL_ADMIN),
            ShareSetting::ShareAdminSelection => serde_json::Value::from(SHARE_ADMIN_SELECTION),
        }
    }
}

impl Serialize for ShareSetting {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Sharing configuration fetched once per request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShareConfig {
    #[serde(rename = "share")]
    pub setting: ShareSetting,
    pub admin_ids: Vec<String>,
}

impl ShareConfig {
    pub fn allows(&self, user: &User) -> bool {
        has_settings_access(user, self.setting, &self.admin_ids)
    }
}

/// Whether `user` may view and modify settings normally reserved for the owner.
pub fn has_settings_access(
    user: &User,
    share_setting: ShareSetting,
    selected_admin_ids: &[String],
) -> bool {
    match user.role {
        Role::Owner => true,
        Role::User => false,
        Role::Admin => match share_setting {
            ShareSetting::ShareAllAdmin => true,
            ShareSetting::ShareAdminSelection => {
                selected_admin_ids.iter().any(|id| *id == user.id)
            }
            ShareSetting::Disabled => false,
        },
    }
}

/// Whether `actor` may create, edit or delete accounts with `target_role`.
///
/// The owner account is never managed through the API.
pub fn can_manage_user(actor: &User, target_role: Role) -> bool {
    match (actor.role, target_role) {
        (_, Role::Owner) => false,
        (Role::Owner, _) => true,
        (Role::Admin, Role::User) => true,
        _ => false,
    }
}
