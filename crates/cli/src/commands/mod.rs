//! CLI subcommand implementations.

pub mod admin;
pub mod migrate;

/// Preferred database URL variable.
pub const DATABASE_URL_VAR: &str = "BANGLE_DATABASE_URL";

/// Database URL from `BANGLE_DATABASE_URL`, falling back to `DATABASE_URL`
/// the same way the API server does.
#[must_use]
pub fn database_url() -> Option<String> {
    choose_database_url(
        std::env::var(DATABASE_URL_VAR).ok(),
        std::env::var("DATABASE_URL").ok(),
    )
}

fn choose_database_url(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary.or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_fallback() {
        let url = |s: &str| Some(s.to_owned());

        assert_eq!(
            choose_database_url(url("postgres://primary"), url("postgres://generic")),
            url("postgres://primary")
        );
        assert_eq!(
            choose_database_url(None, url("postgres://generic")),
            url("postgres://generic")
        );
        assert_eq!(choose_database_url(None, None), None);
    }
}
