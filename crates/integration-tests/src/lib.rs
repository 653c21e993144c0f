//! Integration tests for the Bangle API.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database, migrate, create an admin, and run the server
//! cargo run -p bangle-cli -- migrate
//! BANGLE_ADMIN_PASSWORD=... cargo run -p bangle-cli -- admin create -e ops@bangle.test -n Ops -r admin
//! cargo run -p bangle-api
//!
//! # Run the ignored server tests
//! BANGLE_TEST_ADMIN_EMAIL=ops@bangle.test BANGLE_TEST_ADMIN_PASSWORD=... \
//!     cargo test -p bangle-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `BANGLE_API_URL` - Base URL of the server (default `http://localhost:4000`)
//! - `BANGLE_TEST_ADMIN_EMAIL` / `BANGLE_TEST_ADMIN_PASSWORD` - A non-viewer admin

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use reqwest::{Client, Response, StatusCode, multipart};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Admin logins are rate limited, so each test binary logs in once.
static ADMIN_TOKEN: OnceCell<String> = OnceCell::const_new();

/// A 1x1 transparent PNG.
pub const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("BANGLE_API_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

/// A client pointed at the running server.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: base_url(),
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a JSON request, optionally authenticated.
    pub async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Response {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.expect("request failed")
    }

    /// Register a fresh customer and return `(token, email)`.
    pub async fn register_customer(&self) -> (String, String) {
        let email = format!("it-{}@example.com", Uuid::new_v4());
        let resp = self
            .send(
                reqwest::Method::POST,
                "/api/auth/register",
                None,
                Some(&json!({
                    "email": email,
                    "name": "Integration Tester",
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        (body["token"].as_str().unwrap().to_owned(), email)
    }

    /// Log in as the configured test admin, once per test binary.
    pub async fn admin_token(&self) -> String {
        ADMIN_TOKEN
            .get_or_init(|| self.admin_login())
            .await
            .clone()
    }

    async fn admin_login(&self) -> String {
        let email = std::env::var("BANGLE_TEST_ADMIN_EMAIL").expect("BANGLE_TEST_ADMIN_EMAIL");
        let password =
            std::env::var("BANGLE_TEST_ADMIN_PASSWORD").expect("BANGLE_TEST_ADMIN_PASSWORD");

        let resp = self
            .send(
                reqwest::Method::POST,
                "/api/admin/auth/login",
                None,
                Some(&json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_owned()
    }

    /// Create an active product with one image and return its JSON.
    pub async fn create_product(&self, admin_token: &str, name: &str, stock: u32) -> Value {
        let image = multipart::Part::bytes(PIXEL_PNG.to_vec())
            .file_name("pixel.png")
            .mime_str("image/png")
            .unwrap();
        let form = multipart::Form::new()
            .text("name", name.to_owned())
            .text("handle", format!("it-{}", Uuid::new_v4()))
            .text("price", "19.50")
            .text("stock", stock.to_string())
            .text("status", "active")
            .part("images", image);

        let resp = self
            .client
            .post(self.url("/api/admin/product/new"))
            .bearer_auth(admin_token)
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        resp.json().await.unwrap()
    }

    /// Delete a product, ignoring the outcome.
    pub async fn delete_product(&self, admin_token: &str, id: i64) {
        let _ = self
            .send(
                reqwest::Method::DELETE,
                &format!("/api/admin/products/{id}"),
                Some(admin_token),
                None,
            )
            .await;
    }
}
