//! URL handle (slug) type for products and collections.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Handle`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// The input string is empty.
    #[error("handle cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("handle must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9-]`.
    #[error("handle may only contain lowercase letters, digits and dashes (found {0:?})")]
    InvalidCharacter(char),
    /// The input starts or ends with a dash, or contains `--`.
    #[error("handle cannot start or end with a dash or contain consecutive dashes")]
    MisplacedDash,
}

/// A URL-safe, unique slug identifying a product or collection on the storefront.
///
/// ## Constraints
///
/// - Length: 1-96 characters
/// - Only `a-z`, `0-9` and `-`
/// - No leading, trailing, or consecutive dashes
///
/// ## Examples
///
/// ```
/// use bangle_core::Handle;
///
/// assert!(Handle::parse("rose-gold-cuff").is_ok());
/// assert!(Handle::parse("Rose Gold").is_err());
///
/// let handle = Handle::from_name("Rosé Gold  Cuff (18k)").unwrap();
/// assert_eq!(handle.as_str(), "ros-gold-cuff-18k");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// Maximum length of a handle.
    pub const MAX_LENGTH: usize = 96;

    /// Parse a `Handle`, rejecting anything that is not already a valid slug.
    ///
    /// # Errors
    ///
    /// Returns a [`HandleError`] describing the first violated constraint.
    pub fn parse(s: &str) -> Result<Self, HandleError> {
        if s.is_empty() {
            return Err(HandleError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(HandleError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(HandleError::InvalidCharacter(c));
        }

        if s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(HandleError::MisplacedDash);
        }

        Ok(Self(s.to_owned()))
    }

    /// Derive a handle from a display name.
    ///
    /// ASCII letters and digits are kept (lowercased), every other run of
    /// characters collapses into a single dash, and the result is truncated
    /// to [`Handle::MAX_LENGTH`].
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Empty`] if the name contains no ASCII
    /// alphanumeric characters.
    pub fn from_name(name: &str) -> Result<Self, HandleError> {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c.to_ascii_lowercase());
            } else if c.is_whitespace() || c == '-' || c == '_' || c.is_ascii_punctuation() {
                pending_dash = true;
            }
        }

        slug.truncate(Self::MAX_LENGTH);
        while slug.ends_with('-') {
            slug.pop();
        }

        Self::parse(&slug)
    }

    /// Returns the handle as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Handle` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Handle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Handle {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Handle {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Handle {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Handle::parse("a").is_ok());
        assert!(Handle::parse("silver-charm-2").is_ok());
        assert!(Handle::parse("2024-summer").is_ok());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(Handle::parse(""), Err(HandleError::Empty));
        assert_eq!(
            Handle::parse("Silver"),
            Err(HandleError::InvalidCharacter('S'))
        );
        assert_eq!(
            Handle::parse("silver charm"),
            Err(HandleError::InvalidCharacter(' '))
        );
        assert_eq!(Handle::parse("-silver"), Err(HandleError::MisplacedDash));
        assert_eq!(Handle::parse("silver-"), Err(HandleError::MisplacedDash));
        assert_eq!(Handle::parse("sil--ver"), Err(HandleError::MisplacedDash));
        assert!(matches!(
            Handle::parse(&"a".repeat(97)),
            Err(HandleError::TooLong { max: 96 })
        ));
    }

    #[test]
    fn test_from_name_collapses_separators() {
        let handle = Handle::from_name("  Beaded -- Friendship_Bracelet!! ").unwrap();
        assert_eq!(handle.as_str(), "beaded-friendship-bracelet");
    }

    #[test]
    fn test_from_name_drops_non_ascii() {
        let handle = Handle::from_name("Café Noir").unwrap();
        assert_eq!(handle.as_str(), "caf-noir");
    }

    #[test]
    fn test_from_name_truncates_without_trailing_dash() {
        let name = format!("{} b", "a".repeat(95));
        let handle = Handle::from_name(&name).unwrap();
        assert_eq!(handle.as_str().len(), 95);
        assert!(!handle.as_str().ends_with('-'));
    }

    #[test]
    fn test_from_name_without_alphanumerics() {
        assert_eq!(Handle::from_name("!!! ---"), Err(HandleError::Empty));
        assert_eq!(Handle::from_name("日本"), Err(HandleError::Empty));
    }
}
