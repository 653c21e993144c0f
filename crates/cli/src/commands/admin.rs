//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! BANGLE_ADMIN_PASSWORD='...' bangle-cli admin create -e ops@example.com -n "Ops" -r super_admin
//! ```
//!
//! # Environment Variables
//!
//! - `BANGLE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `BANGLE_ADMIN_PASSWORD` - Password for the new admin, if `--password` is not given

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;

use bangle_api::db::{AdminRepository, RepositoryError};
use bangle_api::services::auth::{AuthError, hash_password, validate_password};
use bangle_core::{AdminId, AdminRole, Email};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository error.
    #[error(transparent)]
    Repository(RepositoryError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin, viewer")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Name is blank.
    #[error("Name cannot be empty")]
    EmptyName,

    /// Password rejected or could not be hashed.
    #[error(transparent)]
    Password(#[from] AuthError),

    /// User already exists.
    #[error("Admin user already exists with email: {0}")]
    UserExists(String),
}

/// Create a new admin user with a password.
///
/// # Arguments
///
/// * `email` - Admin's email address
/// * `name` - Admin's display name
/// * `role` - Admin's role (`super_admin`, `admin`, or `viewer`)
/// * `password` - Plain-text password, hashed before storage
///
/// # Errors
///
/// Returns `AdminError` if any input is invalid, the email is taken, or the
/// database cannot be reached.
pub async fn create_user(
    email: &str,
    name: &str,
    role: &str,
    password: &SecretString,
) -> Result<AdminId, AdminError> {
    dotenvy::dotenv().ok();

    let role: AdminRole = role
        .parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(AdminError::EmptyName);
    }

    validate_password(password.expose_secret())?;
    let password_hash = hash_password(password.expose_secret())?;

    let database_url =
        super::database_url().ok_or(AdminError::MissingEnvVar(super::DATABASE_URL_VAR))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;
    let admins = AdminRepository::new(&pool);

    let existing = admins.count().await.map_err(AdminError::Repository)?;
    if existing == 0 && role != AdminRole::SuperAdmin {
        tracing::warn!("No admins exist yet; consider making the first one a super_admin");
    }

    tracing::info!("Creating admin user: {} ({})", email, role);

    let admin = admins
        .create(&email, name, role, &password_hash)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.as_str().to_owned()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Role: {}",
        admin.id,
        admin.email,
        admin.role
    );

    Ok(admin.id)
}
