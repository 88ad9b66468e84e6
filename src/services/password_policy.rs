//! Password policy engine.
//!
//! A [`PasswordRules`] value is assembled from stored settings once per request
//! (see `SettingsService::password_rules`). From it this module derives:
//!
//! - a per-rule [`PasswordValidationResult`] for live feedback,
//! - a [`PasswordPattern`] whose ECMAScript source is served to the browser and
//!   which is evaluated server-side with lookahead-free `regex` checks,
//! - a localized one-sentence error message listing the active rules.
//!
//! Nothing here fails: out-of-range thresholds are clamped by
//! [`PasswordRules::normalized`] before any evaluation.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{AppError, AppResult};
use crate::i18n;

/// Characters counted by the symbols rule.
pub const SYMBOLS: &str = "!@#$%^&*()-_=+[]{};:,.<>/?";

/// Upper bound for every threshold. Larger stored values are clamped.
pub const MAX_RULE_VALUE: u32 = 256;

pub const DEFAULT_MIN_LENGTH: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordRules {
    pub uppercase_min: u32,
    pub lowercase_min: u32,
    pub numbers_min: u32,
    pub symbols_min: u32,
    pub min_length: u32,
    pub should_contain_unique_chars: bool,
}

impl Default for PasswordRules {
    fn default() -> Self {
        PasswordRules {
            uppercase_min: 0,
            lowercase_min: 0,
            numbers_min: 0,
            symbols_min: 0,
            min_length: DEFAULT_MIN_LENGTH,
            should_contain_unique_chars: false,
        }
    }
}

impl PasswordRules {
    pub fn normalized(self) -> Self {
        PasswordRules {
            uppercase_min: self.uppercase_min.min(MAX_RULE_VALUE),
            lowercase_min: self.lowercase_min.min(MAX_RULE_VALUE),
            numbers_min: self.numbers_min.min(MAX_RULE_VALUE),
            symbols_min: self.symbols_min.min(MAX_RULE_VALUE),
            min_length: self.min_length.min(MAX_RULE_VALUE),
            should_contain_unique_chars: self.should_contain_unique_chars,
        }
    }

    /// True when at least one threshold would reject some password.
    pub fn has_rules(&self) -> bool {
        self.uppercase_min > 0
            || self.lowercase_min > 0
            || self.numbers_min > 0
            || self.symbols_min > 0
            || self.min_length > 0
    }

    fn class_thresholds(&self) -> [(CharClass, u32); 4] {
        [
            (CharClass::Uppercase, self.uppercase_min),
            (CharClass::Lowercase, self.lowercase_min),
            (CharClass::Number, self.numbers_min),
            (CharClass::Symbol, self.symbols_min),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Uppercase,
    Lowercase,
    Number,
    Symbol,
}

impl CharClass {
    fn matches(self, c: char) -> bool {
        match self {
            CharClass::Uppercase => c.is_ascii_uppercase(),
            CharClass::Lowercase => c.is_ascii_lowercase(),
            CharClass::Number => c.is_ascii_digit(),
            CharClass::Symbol => SYMBOLS.contains(c),
        }
    }

    fn count(self, candidate: &str) -> usize {
        candidate.chars().filter(|c| self.matches(*c)).count()
    }

    /// Bracket-expression body for the `regex` crate.
    fn regex_body(self) -> String {
        match self {
            CharClass::Uppercase => "A-Z".to_string(),
            CharClass::Lowercase => "a-z".to_string(),
            CharClass::Number => "0-9".to_string(),
            CharClass::Symbol => SYMBOLS
                .chars()
                .map(|c| regex::escape(c.encode_utf8(&mut [0; 4])))
                .collect(),
        }
    }

    /// Bracket-expression body for ECMAScript (valid with and without the `u`/`v` flags).
    fn ecma_body(self) -> String {
        match self {
            CharClass::Uppercase => "A-Z".to_string(),
            CharClass::Lowercase => "a-z".to_string(),
            CharClass::Number => "0-9".to_string(),
            CharClass::Symbol => {
                let mut out = String::new();
                for c in SYMBOLS.chars() {
                    if matches!(c, '\\' | ']' | '[' | '^' | '-' | '/' | '(' | ')' | '{' | '}' | '|') {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordValidationResult {
    pub is_uppercase_valid: bool,
    pub is_lowercase_valid: bool,
    pub is_numbers_valid: bool,
    pub is_symbols_valid: bool,
    pub is_length_valid: bool,
    pub is_unique_chars_valid: bool,
}

impl PasswordValidationResult {
    /// The checks covered by [`PasswordPattern`] (everything but uniqueness).
    pub fn meets_pattern_rules(&self) -> bool {
        self.is_uppercase_valid
            && self.is_lowercase_valid
            && self.is_numbers_valid
            && self.is_symbols_valid
            && self.is_length_valid
    }
}

pub fn validate_password(candidate: &str, rules: &PasswordRules) -> PasswordValidationResult {
    let rules = rules.normalized();
    let length = candidate.chars().count();

    let mut seen = HashSet::new();
    let all_unique = candidate.chars().all(|c| seen.insert(c));

    PasswordValidationResult {
        is_uppercase_valid: CharClass::Uppercase.count(candidate) >= rules.uppercase_min as usize,
        is_lowercase_valid: CharClass::Lowercase.count(candidate) >= rules.lowercase_min as usize,
        is_numbers_valid: CharClass::Number.count(candidate) >= rules.numbers_min as usize,
        is_symbols_valid: CharClass::Symbol.count(candidate) >= rules.symbols_min as usize,
        is_length_valid: length >= rules.min_length as usize,
        is_unique_chars_valid: length > 0 && all_unique,
    }
}

#[derive(Debug, Clone, Copy)]
enum Check {
    Class(CharClass),
    Length,
}

#[derive(Debug, Clone)]
struct Requirement {
    check: Check,
    min: usize,
    regex: Option<Regex>,
}

impl Requirement {
    fn new(check: Check, min: usize) -> Self {
        let source = match check {
            Check::Class(class) => {
                let body = class.regex_body();
                format!("^(?:[^{body}]*[{body}]){{{min}}}")
            }
            Check::Length => format!("(?s)^.{{{min},}}$"),
        };

        let regex = match Regex::new(&source) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::error!("Failed to compile password check '{}': {}", source, e);
                None
            }
        };

        Requirement { check, min, regex }
    }

    fn is_met(&self, candidate: &str) -> bool {
        if let Some(regex) = &self.regex {
            return regex.is_match(candidate);
        }
        match self.check {
            Check::Class(class) => class.count(candidate) >= self.min,
            Check::Length => candidate.chars().count() >= self.min,
        }
    }
}

/// A compiled password pattern. Serializes as its ECMAScript source.
#[derive(Debug, Clone)]
pub struct PasswordPattern {
    source: String,
    requirements: Vec<Requirement>,
}

impl PasswordPattern {
    /// ECMAScript source, usable as an HTML `pattern` attribute or `new RegExp(.., "u")`.
    ///
    /// Compile it with the `u` (or `v`) flag. Without it `[\s\S]{n,}` counts
    /// UTF-16 code units, while the server counts Unicode scalar values.
    /// HTML `pattern` attributes already use `v`.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.requirements.iter().all(|r| r.is_met(candidate))
    }
}

impl Serialize for PasswordPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

pub fn build_password_regex(rules: &PasswordRules) -> PasswordPattern {
    let rules = rules.normalized();

    let mut source = String::from("^");
    let mut requirements = Vec::new();

    for (class, min) in rules.class_thresholds() {
        if min == 0 {
            continue;
        }
        let body = class.ecma_body();
        source.push_str(&format!("(?=(?:[^{body}]*[{body}]){{{min}}})"));
        requirements.push(Requirement::new(Check::Class(class), min as usize));
    }

    source.push_str(&format!("[\\s\\S]{{{},}}$", rules.min_length));
    if rules.min_length > 0 {
        requirements.push(Requirement::new(Check::Length, rules.min_length as usize));
    }

    PasswordPattern {
        source,
        requirements,
    }
}

/// One sentence listing every active threshold in the order uppercase,
/// lowercase, numbers, symbols, length. Empty when no threshold is active.
pub fn build_password_error_message(rules: &PasswordRules, lang: Option<&str>) -> String {
    let rules = rules.normalized();

    if !rules.has_rules() {
        return String::new();
    }

    let clauses: Vec<String> = [
        ("password.clause.uppercase", rules.uppercase_min),
        ("password.clause.lowercase", rules.lowercase_min),
        ("password.clause.numbers", rules.numbers_min),
        ("password.clause.symbols", rules.symbols_min),
        ("password.clause.length", rules.min_length),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .map(|(key, count)| i18n::tr_count(lang, key, count))
    .collect();

    i18n::tr(
        lang,
        "password.must_contain",
        Some(&[("clauses", clauses.join(", ").as_str())]),
    )
}

/// Server-side enforcement used before any password is hashed or stored.
///
/// An empty password is always rejected, independent of the configured rules.
pub fn enforce(candidate: &str, rules: &PasswordRules, lang: Option<&str>) -> AppResult<()> {
    if candidate.is_empty() {
        return Err(AppError::InvalidInput(i18n::tr(lang, "password.required", None)));
    }

    let result = validate_password(candidate, rules);

    if !build_password_regex(rules).is_match(candidate) {
        return Err(AppError::PasswordPolicy {
            message: build_password_error_message(rules, lang),
            result,
        });
    }

    if rules.should_contain_unique_chars && !result.is_unique_chars_valid {
        return Err(AppError::PasswordPolicy {
            message: i18n::tr(lang, "password.unique_chars", None),
            result,
        });
    }

    Ok(())
}
