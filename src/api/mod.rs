//! REST clients for the storefront backend
pub mod auth;
pub mod cart;
pub mod client;
pub mod envelope;
pub mod orders;
pub mod products;
pub mod wishlist;

pub use auth::{RefreshPhase, TokenRefresher};
pub use client::{ApiClient, ApiRequest};
pub use envelope::{Page, Reply};
