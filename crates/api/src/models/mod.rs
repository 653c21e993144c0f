//! Domain models for the API.
//!
//! These types represent validated domain objects separate from database row
//! types. Row types live next to the queries in [`crate::db`].

pub mod account;
pub mod cart;
pub mod catalog;

pub use account::{Admin, Customer};
pub use cart::{CartItem, CartView};
pub use catalog::{Collection, Image, Product, ProductImage};
