//! Identifier validation
//!
//! Identifiers always reach SQL through an [`Escaper`](crate::backends::Escaper),
//! on top of that every schema, table, column and procedure name must be a
//! C-like identifier so escaped SQL stays portable between dialects.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::QueryError;

static C_LIKE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Check that a name is a C-like identifier
///
/// # Examples
/// ```
/// use tabula_orm::security::is_c_like;
///
/// assert!(is_c_like("parent_table"));
/// assert!(is_c_like("_Child2"));
/// assert!(!is_c_like("2fast"));
/// assert!(!is_c_like("drop table;"));
/// ```
pub fn is_c_like(identifier: &str) -> bool {
    C_LIKE_IDENTIFIER.is_match(identifier)
}

/// Validate that an identifier is safe for use in generated SQL
pub fn validate_identifier(identifier: &str) -> Result<(), QueryError> {
    if is_c_like(identifier) {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_injection_attempts() {
        let attempts = [
            "users; DROP TABLE users; --",
            "name\"",
            "a.b",
            "",
            "tbl name",
            "naïve",
        ];
        for attempt in attempts {
            assert!(validate_identifier(attempt).is_err(), "accepted {:?}", attempt);
        }
    }

    #[test]
    fn test_accepts_plain_names() {
        for name in ["main", "Parent", "child_2", "_hidden", "A"] {
            assert!(validate_identifier(name).is_ok(), "rejected {:?}", name);
        }
    }
}
