// SPDX-License-Identifier: MIT

//! Locale handling for user-visible messages.
//!
//! The UI sets a `NEXT_LOCALE` cookie; anything unknown falls back to
//! English. Only the handful of engine-facing messages live here, full
//! message bundles belong to the frontend.

use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

/// Name of the locale cookie set by the frontend.
pub const LOCALE_COOKIE: &str = "NEXT_LOCALE";

/// Supported locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Fr,
    Es,
    Ja,
}

impl Locale {
    pub fn parse(s: &str) -> Self {
        match s {
            "fr" => Locale::Fr,
            "es" => Locale::Es,
            "ja" => Locale::Ja,
            _ => Locale::En,
        }
    }

    /// Extract the locale from the request cookies, defaulting to English.
    pub fn from_cookies(jar: &CookieJar) -> Self {
        jar.get(LOCALE_COOKIE)
            .map(|c| Locale::parse(c.value()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Fr => "fr",
            Locale::Es => "es",
            Locale::Ja => "ja",
        }
    }
}

/// A text value localized into all supported languages.
///
/// Stored as a flat `{en, fr, es, ja}` map on FAQ documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub fr: String,
    #[serde(default)]
    pub es: String,
    #[serde(default)]
    pub ja: String,
}

impl LocalizedText {
    /// Resolve for a locale, falling back to English when empty.
    pub fn get(&self, locale: Locale) -> &str {
        let text = match locale {
            Locale::En => &self.en,
            Locale::Fr => &self.fr,
            Locale::Es => &self.es,
            Locale::Ja => &self.ja,
        };
        if text.is_empty() {
            &self.en
        } else {
            text
        }
    }
}

/// User-facing message for a validation failure kind.
pub fn validation_message(kind: &str, locale: Locale) -> &'static str {
    match (kind, locale) {
        ("invalid_token", Locale::En) => "This QR code does not match the activity.",
        ("invalid_token", Locale::Fr) => "Ce code QR ne correspond pas à l'activité.",
        ("invalid_token", Locale::Es) => "Este código QR no corresponde a la actividad.",
        ("invalid_token", Locale::Ja) => "このQRコードはアクティビティと一致しません。",
        ("out_of_window", Locale::En) => "This activity cannot be validated today.",
        ("out_of_window", Locale::Fr) => "Cette activité ne peut pas être validée aujourd'hui.",
        ("out_of_window", Locale::Es) => "Esta actividad no puede validarse hoy.",
        ("out_of_window", Locale::Ja) => "このアクティビティは本日検証できません。",
        ("already_validated", Locale::En) => "You have already validated this activity.",
        ("already_validated", Locale::Fr) => "Vous avez déjà validé cette activité.",
        ("already_validated", Locale::Es) => "Ya has validado esta actividad.",
        ("already_validated", Locale::Ja) => "このアクティビティはすでに検証済みです。",
        ("not_found", Locale::En) => "Activity not found.",
        ("not_found", Locale::Fr) => "Activité introuvable.",
        ("not_found", Locale::Es) => "Actividad no encontrada.",
        ("not_found", Locale::Ja) => "アクティビティが見つかりません。",
        ("transient", Locale::En) => "Something went wrong, please try again.",
        ("transient", Locale::Fr) => "Une erreur est survenue, veuillez réessayer.",
        ("transient", Locale::Es) => "Algo salió mal, inténtalo de nuevo.",
        ("transient", Locale::Ja) => "エラーが発生しました。もう一度お試しください。",
        (_, _) => "Something went wrong.",
    }
}
