//! Business logic services.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod media;
pub mod token;
