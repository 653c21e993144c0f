//! Bangle Core - Shared domain types.
//!
//! This crate provides common types used across all Bangle components:
//! - `api` - REST backend for the storefront and the admin dashboard
//! - `cli` - Command-line tools for migrations and admin bootstrap
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, handles, and statuses
//! - [`cart`] - Cart line rules (quantity limits, guest cart merge)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use types::*;
