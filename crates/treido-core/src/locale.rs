//! # Locale
//!
//! The storefront ships in English and Bulgarian. Anything else collapses to
//! English, so a locale value is always safe to put into a URL.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// A supported storefront locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Locale {
    #[default]
    En,
    Bg,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Bg];

    /// Maps any input to a supported locale, defaulting to English.
    ///
    /// ```rust
    /// use treido_core::Locale;
    ///
    /// assert_eq!(Locale::normalize(Some("bg")), Locale::Bg);
    /// assert_eq!(Locale::normalize(Some("de")), Locale::En);
    /// assert_eq!(Locale::normalize(None), Locale::En);
    /// ```
    pub fn normalize(value: Option<&str>) -> Locale {
        match value {
            Some("bg") => Locale::Bg,
            _ => Locale::En,
        }
    }

    /// Parses only exact supported codes.
    pub fn parse_exact(value: &str) -> Option<Locale> {
        match value {
            "en" => Some(Locale::En),
            "bg" => Some(Locale::Bg),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Bg => "bg",
        }
    }

    /// Picks the localized name: Bulgarian when requested and present.
    pub fn display_name<'a>(&self, name: &'a str, name_bg: Option<&'a str>) -> &'a str {
        match (self, name_bg) {
            (Locale::Bg, Some(bg)) if !bg.is_empty() => bg,
            _ => name,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strips a leading `/en` or `/bg` path segment.
///
/// ```rust
/// use treido_core::locale::strip_locale_prefix;
///
/// assert_eq!(strip_locale_prefix("/bg/categories/phones"), "/categories/phones");
/// assert_eq!(strip_locale_prefix("/en"), "");
/// assert_eq!(strip_locale_prefix("/english/x"), "/english/x");
/// ```
pub fn strip_locale_prefix(path: &str) -> &str {
    for locale in Locale::ALL {
        if let Some(rest) = path
            .strip_prefix('/')
            .and_then(|p| p.strip_prefix(locale.as_str()))
        {
            if rest.is_empty() || rest.starts_with('/') {
                return rest;
            }
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_defaults_to_english() {
        assert_eq!(Locale::normalize(Some("bg")), Locale::Bg);
        assert_eq!(Locale::normalize(Some("en")), Locale::En);
        assert_eq!(Locale::normalize(Some("fr")), Locale::En);
        assert_eq!(Locale::normalize(Some("")), Locale::En);
        assert_eq!(Locale::normalize(None), Locale::En);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(Locale::Bg.display_name("Phones", Some("Телефони")), "Телефони");
        assert_eq!(Locale::Bg.display_name("Phones", None), "Phones");
        assert_eq!(Locale::Bg.display_name("Phones", Some("")), "Phones");
        assert_eq!(Locale::En.display_name("Phones", Some("Телефони")), "Phones");
    }

    #[test]
    fn test_strip_locale_prefix() {
        assert_eq!(strip_locale_prefix("/en/categories/a/b"), "/categories/a/b");
        assert_eq!(strip_locale_prefix("/bg"), "");
        assert_eq!(strip_locale_prefix("/categories/a"), "/categories/a");
        assert_eq!(strip_locale_prefix("/bgx/categories"), "/bgx/categories");
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Locale::Bg).unwrap(), r#""bg""#);
    }
}
