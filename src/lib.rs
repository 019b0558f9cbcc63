//! Storefront client core
//!
//! Client-side state and REST plumbing shared by the storefront and the admin
//! dashboard. Pricing, discounts, inventory and the order state machine live in
//! the backend; this crate keeps an optimistic local copy and reconciles it.
//!
//! ## Features
//! - Order status lookup and advisory transitions
//! - Cart and wishlist reconciliation against the server copy
//! - Single-flight bearer token refresh
//! - Persisted session storage (`token`, `user`, `cartItems`)

pub mod api;
pub mod config;
pub mod domain;
pub mod session;
pub mod storage;

use thiserror::Error;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use domain::aggregates::{Cart, OrderStatus, RawStatus, StatusView, Wishlist};
pub use domain::value_objects::{Money, ProductId, VariantKey};
pub use session::ShopSession;
pub use storage::{FileStorage, MemoryStorage, SessionStorage};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{0}")]
    Validation(String),

    #[error("Item with this size and color is already in cart")]
    AlreadyInCart,

    #[error("Please log in first")]
    NotLoggedIn,

    #[error("No variant found for size {size} of product {product_id}")]
    VariantNotFound { product_id: ProductId, size: String },

    #[error("Status {from} cannot be changed to {to}")]
    TransitionNotOffered { from: OrderStatus, to: OrderStatus },

    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("Session expired, please log in again")]
    Unauthorized,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<validator::ValidationErrors> for StorefrontError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<domain::value_objects::VariantKeyError> for StorefrontError {
    fn from(error: domain::value_objects::VariantKeyError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<domain::aggregates::CartError> for StorefrontError {
    fn from(_: domain::aggregates::CartError) -> Self { Self::AlreadyInCart }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
