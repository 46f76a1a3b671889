//! # Validation Module
//!
//! Input validation for values that arrive from the storefront or from the
//! payment provider's redirect.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (axum extractors)                               │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Session ids, slugs, search text                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0, quantity > 0)                                  │
//! │  └── UNIQUE (stripe_payment_intent_id)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::MIN_SEARCH_QUERY_CHARS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Prefix every hosted checkout session id carries.
pub const CHECKOUT_SESSION_PREFIX: &str = "cs_";

// =============================================================================
// String Validators
// =============================================================================

/// Validates a checkout session id from the success redirect.
///
/// The id becomes a URL path segment, so only ASCII letters, digits and `_`
/// are accepted.
///
/// ## Returns
/// The trimmed id.
///
/// ## Example
/// ```rust
/// use treido_core::validation::validate_checkout_session_id;
///
/// assert_eq!(validate_checkout_session_id("  cs_test_123 ").unwrap(), "cs_test_123");
/// assert!(validate_checkout_session_id("pi_123").is_err());
/// assert!(validate_checkout_session_id("   ").is_err());
/// assert!(validate_checkout_session_id("cs_/../v1/customers").is_err());
/// ```
pub fn validate_checkout_session_id(session_id: &str) -> ValidationResult<String> {
    let session_id = session_id.trim();

    if session_id.is_empty() {
        return Err(ValidationError::Required {
            field: "session_id".to_string(),
        });
    }

    if !session_id.starts_with(CHECKOUT_SESSION_PREFIX) {
        return Err(ValidationError::InvalidFormat {
            field: "session_id".to_string(),
            reason: format!("must start with {CHECKOUT_SESSION_PREFIX}"),
        });
    }

    if let Some(bad) = session_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "session_id".to_string(),
            reason: format!("unexpected character {bad:?}"),
        });
    }

    Ok(session_id.to_string())
}

/// Validates a category or product slug.
///
/// ## Rules
/// - Must not be empty
/// - At most 120 characters
/// - No `/`, `?`, `#` or whitespace
pub fn validate_slug(slug: &str) -> ValidationResult<()> {
    if slug.is_empty() {
        return Err(ValidationError::Required {
            field: "slug".to_string(),
        });
    }

    if slug.chars().count() > 120 {
        return Err(ValidationError::TooLong {
            field: "slug".to_string(),
            max: 120,
        });
    }

    if let Some(bad) = slug
        .chars()
        .find(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace())
    {
        return Err(ValidationError::InvalidFormat {
            field: "slug".to_string(),
            reason: format!("unexpected character {bad:?}"),
        });
    }

    Ok(())
}

/// Validates free-text search.
///
/// ## Returns
/// - `Ok(None)` when the trimmed query is shorter than
///   [`MIN_SEARCH_QUERY_CHARS`]; callers answer with an empty page
/// - `Ok(Some(query))` with the trimmed query otherwise
///
/// Queries over 100 characters are rejected.
pub fn validate_search_query(query: &str) -> ValidationResult<Option<String>> {
    let query = query.trim();
    let chars = query.chars().count();

    if chars > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    if chars < MIN_SEARCH_QUERY_CHARS {
        return Ok(None);
    }

    Ok(Some(query.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_checkout_session_id() {
        assert_eq!(validate_checkout_session_id("cs_live_a1").unwrap(), "cs_live_a1");
        assert!(matches!(
            validate_checkout_session_id(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_checkout_session_id("sess_1"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        for id in [" cs_/../../../../v1/customers ", "cs_a.b", "cs_a%2F", "cs_a?expand=x"] {
            assert!(validate_checkout_session_id(id).is_err(), "{id}");
        }
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("smartphones").is_ok());
        assert!(validate_slug("телефони").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("a/b").is_err());
        assert!(validate_slug("a b").is_err());
        assert!(validate_slug(&"x".repeat(121)).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  iphone ").unwrap().as_deref(), Some("iphone"));
        assert_eq!(validate_search_query("tv").unwrap().as_deref(), Some("tv"));
        assert_eq!(validate_search_query(" a ").unwrap(), None);
        assert_eq!(validate_search_query("").unwrap(), None);
        assert!(validate_search_query(&"q".repeat(101)).is_err());
    }
}
