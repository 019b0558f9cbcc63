//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod wishlist;

pub use product::{Catalog, ProductSnapshot, Variant};
pub use order::{BadgeColor, OrderStatus, RawStatus, StatusView};
pub use cart::{Cart, CartError, CartLine, CartLineView};
pub use wishlist::{Wishlist, WishlistItem};
