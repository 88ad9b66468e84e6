/*
Simple i18n helper for the backend.

This module provides:
- A tiny embedded translations store for EN/DE (compile-time embedded JSON).
- A simple `tr` function to lookup translations by key + optional params.
- `tr_count` for messages with a singular/plural form (`<key>.one` / `<key>.other`).
- A `t` convenience wrapper using the default language (DEFAULT_LANG).

Usage:
    use crate::i18n;
    let msg = i18n::t("errors.settings_access_denied");
    let clause = i18n::tr_count(Some("de"), "password.clause.numbers", 2);

Notes:
- Placeholders in translation strings use single-brace format: `{name}`.
- Default language is `en`. If a key is missing for the requested language,
  the fallback language will be used.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANG: &str = "en";

static TRANSLATIONS: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();

const EN_JSON: &str = r#"
{
  "password.must_contain": "Must contain at least {clauses}.",
  "password.clause.uppercase.one": "{count} uppercase letter",
  "password.clause.uppercase.other": "{count} uppercase letters",
  "password.clause.lowercase.one": "{count} lowercase letter",
  "password.clause.lowercase.other": "{count} lowercase letters",
  "password.clause.numbers.one": "{count} number",
  "password.clause.numbers.other": "{count} numbers",
  "password.clause.symbols.one": "{count} symbol",
  "password.clause.symbols.other": "{count} symbols",
  "password.clause.length.one": "{count} character",
  "password.clause.length.other": "{count} characters",
  "password.unique_chars": "Must not contain any repeated characters.",
  "password.required": "Password is required.",
  "errors.settings_access_denied": "You do not have access to these settings",
  "errors.owner_only": "Only the owner can change this setting",
  "errors.cannot_manage_user": "You are not allowed to manage this account",
  "errors.cannot_delete_self": "You cannot delete your own account",
  "not_found.user": "User not found",
  "conflict.email_taken": "An account with this email already exists",
  "validation.invalid_email": "Invalid email address",
  "validation.name_required": "Name is required",
  "validation.invalid_role": "Role must be 'admin' or 'user'",
  "validation.app_name_required": "Application name cannot be empty",
  "validation.invalid_color": "Primary color must be a hex color like #2563eb",
  "validation.rule_out_of_range": "{name} must be between 0 and {max}",
  "validation.invalid_share_value": "Sharing must be false, 'share_all_admin' or 'share_admin_selection'",
  "validation.share_admin_not_admin": "User {id} is not an admin",
  "auth.invalid_credentials": "Invalid email or password",
  "auth.email_password_disabled": "Email and password sign-in is disabled",
  "auth.signup_disabled": "Sign-up is disabled",
  "auth.invalid_or_expired_token": "This link is invalid or has expired",
  "auth.current_password_incorrect": "Current password is incorrect",
  "auth.logged_out": "Logged out",
  "auth.reset_email_sent": "If an account exists for this email, a reset link has been sent",
  "auth.email_verified": "Email address verified",
  "auth.password_reset": "Password has been reset",
  "account.already_verified": "Email address is already verified",
  "account.verification_sent": "Verification email sent",
  "account.password_changed": "Password changed",
  "user.deleted": "User deleted",
  "error.unsupported_language": "Unsupported language: {lang}",
  "email.verify.subject": "{app}: confirm your email address",
  "email.verify.body": "Hello {name},\n\nplease confirm your email address by opening the link below:\n\n{link}\n\nThe link is valid for {hours} hours.",
  "email.reset.subject": "{app}: reset your password",
  "email.reset.body": "Hello {name},\n\nsomeone requested a password reset for your account. Open the link below to choose a new password:\n\n{link}\n\nThe link is valid for {minutes} minutes. If you did not request this, ignore this email.",
  "app.name": "Lodge"
}
"#;

const DE_JSON: &str = r#"
{
  "password.must_contain": "Muss mindestens {clauses} enthalten.",
  "password.clause.uppercase.one": "{count} Großbuchstaben",
  "password.clause.uppercase.other": "{count} Großbuchstaben",
  "password.clause.lowercase.one": "{count} Kleinbuchstaben",
  "password.clause.lowercase.other": "{count} Kleinbuchstaben",
  "password.clause.numbers.one": "{count} Ziffer",
  "password.clause.numbers.other": "{count} Ziffern",
  "password.clause.symbols.one": "{count} Sonderzeichen",
  "password.clause.symbols.other": "{count} Sonderzeichen",
  "password.clause.length.one": "{count} Zeichen",
  "password.clause.length.other": "{count} Zeichen",
  "password.unique_chars": "Darf keine Zeichen mehrfach enthalten.",
  "password.required": "Passwort ist erforderlich.",
  "errors.settings_access_denied": "Sie haben keinen Zugriff auf diese Einstellungen",
  "errors.owner_only": "Nur der Eigentümer kann diese Einstellung ändern",
  "errors.cannot_manage_user": "Sie dürfen dieses Konto nicht verwalten",
  "errors.cannot_delete_self": "Sie können Ihr eigenes Konto nicht löschen",
  "not_found.user": "Benutzer nicht gefunden",
  "conflict.email_taken": "Es existiert bereits ein Konto mit dieser E-Mail-Adresse",
  "validation.invalid_email": "Ungültige E-Mail-Adresse",
  "validation.name_required": "Name ist erforderlich",
  "validation.invalid_role": "Rolle muss 'admin' oder 'user' sein",
  "validation.app_name_required": "Der Anwendungsname darf nicht leer sein",
  "validation.invalid_color": "Die Primärfarbe muss eine Hex-Farbe wie #2563eb sein",
  "validation.rule_out_of_range": "{name} muss zwischen 0 und {max} liegen",
  "validation.invalid_share_value": "Freigabe muss false, 'share_all_admin' oder 'share_admin_selection' sein",
  "validation.share_admin_not_admin": "Benutzer {id} ist kein Administrator",
  "auth.invalid_credentials": "Ungültige E-Mail-Adresse oder ungültiges Passwort",
  "auth.email_password_disabled": "Die Anmeldung mit E-Mail und Passwort ist deaktiviert",
  "auth.signup_disabled": "Die Registrierung ist deaktiviert",
  "auth.invalid_or_expired_token": "Dieser Link ist ungültig oder abgelaufen",
  "auth.current_password_incorrect": "Das aktuelle Passwort ist falsch",
  "auth.logged_out": "Abgemeldet",
  "auth.reset_email_sent": "Falls ein Konto mit dieser E-Mail-Adresse existiert, wurde ein Link zum Zurücksetzen gesendet",
  "auth.email_verified": "E-Mail-Adresse bestätigt",
  "auth.password_reset": "Das Passwort wurde zurückgesetzt",
  "account.already_verified": "Die E-Mail-Adresse ist bereits bestätigt",
  "account.verification_sent": "Bestätigungs-E-Mail gesendet",
  "account.password_changed": "Passwort geändert",
  "user.deleted": "Benutzer gelöscht",
  "error.unsupported_language": "Nicht unterstützte Sprache: {lang}",
  "email.verify.subject": "{app}: Bestätigen Sie Ihre E-Mail-Adresse",
  "email.verify.body": "Hallo {name},\n\nbitte bestätigen Sie Ihre E-Mail-Adresse über den folgenden Link:\n\n{link}\n\nDer Link ist {hours} Stunden gültig.",
  "email.reset.subject": "{app}: Passwort zurücksetzen",
  "email.reset.body": "Hallo {name},\n\nfür Ihr Konto wurde das Zurücksetzen des Passworts angefordert. Über den folgenden Link können Sie ein neues Passwort wählen:\n\n{link}\n\nDer Link ist {minutes} Minuten gültig. Falls Sie dies nicht angefordert haben, ignorieren Sie diese E-Mail.",
  "app.name": "Lodge"
}
"#;

/// Initialize translations map (lazy).
fn build_translations() -> HashMap<String, HashMap<String, String>> {
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();

    // Parse EN
    let en_map: HashMap<String, String> = serde_json::from_str(EN_JSON).unwrap_or_else(|e| {
        panic!("failed to parse EN_JSON in i18n module: {}", e);
    });
    out.insert("en".to_string(), en_map);

    // Parse DE
    let de_map: HashMap<String, String> = serde_json::from_str(DE_JSON).unwrap_or_else(|e| {
        panic!("failed to parse DE_JSON in i18n module: {}", e);
    });
    out.insert("de".to_string(), de_map);

    out
}

/// Returns the global translations map (lang -> (key -> message)).
fn translations() -> &'static HashMap<String, HashMap<String, String>> {
    TRANSLATIONS.get_or_init(build_translations)
}

/// Normalize a language tag into a short, lowercase code (e.g. "en-US" -> "en").
pub fn normalize_language(lang: &str) -> String {
    lang.split('-').next().unwrap_or(lang).to_lowercase()
}

/// Returns true if the given language code is supported by the backend i18n
/// translations (e.g. "en", "de").
pub fn is_supported_language(lang: &str) -> bool {
    translations().contains_key(lang)
}

/// Translate a key using an explicit language (or default if None).
///
/// - `lang`: optional language code (`"en"`, `"de"`, ...). If None, DEFAULT_LANG is used.
/// - `key`: translation key (flat string, e.g. "errors.owner_only").
/// - `params`: optional slice of (name, value) for placeholder replacement.
///
/// Returns the translated and parameter-substituted string. If no translation is found,
/// returns a sensible fallback (default language value or the key itself).
pub fn tr(lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    let map = translations();

    let desired = lang.unwrap_or(DEFAULT_LANG);

    let val = map
        .get(desired)
        .and_then(|m| m.get(key))
        .cloned()
        .or_else(|| map.get(DEFAULT_LANG).and_then(|m| m.get(key)).cloned())
        // If still missing, return the key itself (useful in logs)
        .unwrap_or_else(|| key.to_string());

    if let Some(params) = params {
        let mut s = val;
        for (k, v) in params {
            s = s.replace(&format!("{{{}}}", k), v);
        }
        s
    } else {
        val
    }
}

/// Translate a counted message: picks `<key>.one` for 1 and `<key>.other`
/// otherwise, substituting `{count}`.
pub fn tr_count(lang: Option<&str>, key: &str, count: u32) -> String {
    let form = if count == 1 { "one" } else { "other" };
    let count = count.to_string();
    tr(
        lang,
        &format!("{}.{}", key, form),
        Some(&[("count", count.as_str())]),
    )
}

/// Convenience wrapper: translate using default language (DEFAULT_LANG).
pub fn t(key: &str) -> String {
    tr(None, key, None)
}

/// Convenience wrapper with params (default language).
pub fn t_with(key: &str, params: &[(&str, &str)]) -> String {
    tr(None, key, Some(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tr_basic() {
        let s = tr(Some("de"), "errors.owner_only", None);
        assert!(s.contains("Eigentümer"));
    }

    #[test]
    fn test_t_with_params() {
        let s = t_with("error.unsupported_language", &[("lang", "fr")]);
        assert_eq!(s, "Unsupported language: fr");
    }

    #[test]
    fn test_fallback_to_default() {
        // Unknown language falls back to default (en)
        let s = tr(Some("fr"), "errors.owner_only", None);
        assert_eq!(s, "Only the owner can change this setting");
    }

    #[test]
    fn missing_key_returns_key() {
        let k = "non.existent.key";
        let s = t(k);
        assert_eq!(s, k.to_string());
    }

    #[test]
    fn counted_messages_pick_plural_form() {
        assert_eq!(tr_count(None, "password.clause.numbers", 1), "1 number");
        assert_eq!(tr_count(None, "password.clause.numbers", 3), "3 numbers");
        assert_eq!(tr_count(Some("de"), "password.clause.numbers", 2), "2 Ziffern");
    }

    #[test]
    fn both_tables_define_the_same_keys() {
        let map = translations();
        let mut en: Vec<_> = map["en"].keys().collect();
        let mut de: Vec<_> = map["de"].keys().collect();
        en.sort();
        de.sort();
        assert_eq!(en, de);
    }

    #[test]
    fn test_is_supported_language() {
        assert!(is_supported_language("en"));
        assert!(is_supported_language("de"));
        assert!(!is_supported_language("fr"));
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("en-US"), "en");
        assert_eq!(normalize_language("de"), "de");
        assert_eq!(normalize_language("DE-at"), "de");
    }
}
