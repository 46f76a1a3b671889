//! # Request Locale
//!
//! Works out which storefront locale a request came from and builds
//! locale-prefixed storefront URLs (checkout return pages, category paths).
//!
//! ## Inference Order
//! ```text
//! explicit "locale" in the body  ──► bg / en
//!          │ missing or unsupported
//!          ▼
//! x-next-intl-locale header      ──► bg / en
//!          │
//!          ▼
//! Referer: https://treido.eu/bg/cart  ──► first path segment
//!          │
//!          ▼
//!         en
//! ```

use treido_core::Locale;
use url::Url;

/// Header the storefront's i18n middleware sets on every request.
pub const LOCALE_HEADER: &str = "x-next-intl-locale";

/// Picks the locale for a request. See the module docs for the order.
pub fn infer_locale(
    explicit: Option<&str>,
    locale_header: Option<&str>,
    referer: Option<&str>,
) -> Locale {
    if let Some(locale) = explicit.and_then(Locale::parse_exact) {
        return locale;
    }
    if let Some(locale) = locale_header.and_then(Locale::parse_exact) {
        return locale;
    }
    referer
        .and_then(|raw| Url::parse(raw).ok())
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next().and_then(Locale::parse_exact))
        })
        .unwrap_or_default()
}

/// Builds `{app_url}/{locale}/{path}` with an optional raw query string.
///
/// ```rust
/// use treido_core::Locale;
/// use treido_market::locale::build_locale_url;
///
/// assert_eq!(
///     build_locale_url("https://treido.eu/", "/cart", Locale::Bg, None),
///     "https://treido.eu/bg/cart"
/// );
/// assert_eq!(
///     build_locale_url("https://treido.eu", "checkout/success", Locale::En, Some("session_id=x")),
///     "https://treido.eu/en/checkout/success?session_id=x"
/// );
/// ```
pub fn build_locale_url(app_url: &str, path: &str, locale: Locale, query: Option<&str>) -> String {
    let base = app_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    let mut url = if path.is_empty() {
        format!("{}/{}", base, locale)
    } else {
        format!("{}/{}/{}", base, locale, path)
    };
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query.trim_start_matches('?'));
    }
    url
}
