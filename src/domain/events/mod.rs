//! Shop actions
//!
//! Every change to the session state goes through one of these.
use serde_json::Value;
use crate::domain::aggregates::{Cart, ProductSnapshot, WishlistItem};
use crate::domain::value_objects::{ProductId, Quantity, VariantKey};

#[derive(Clone, Debug)]
pub enum ShopAction {
    Session(SessionAction),
    Cart(CartAction),
    Wishlist(WishlistAction),
    CatalogLoaded(Vec<ProductSnapshot>),
}

#[derive(Clone, Debug)]
pub enum SessionAction {
    LoggedIn { token: String, user: Option<Value> },
    TokenRefreshed { token: String },
    LoggedOut,
}

#[derive(Clone, Debug)]
pub enum CartAction {
    LineStaged { product_id: ProductId, key: VariantKey, quantity: Quantity },
    QuantitySet { product_id: ProductId, key: VariantKey, quantity: u32 },
    LineRemoved { product_id: ProductId, key: VariantKey },
    Replaced { cart: Cart, server_cart: Option<Value> },
    Cleared,
}

#[derive(Clone, Debug)]
pub enum WishlistAction {
    Added(WishlistItem),
    Removed(ProductId),
    Replaced(Vec<WishlistItem>),
    Cleared,
}

impl From<SessionAction> for ShopAction {
    fn from(action: SessionAction) -> Self { Self::Session(action) }
}

impl From<CartAction> for ShopAction {
    fn from(action: CartAction) -> Self { Self::Cart(action) }
}

impl From<WishlistAction> for ShopAction {
    fn from(action: WishlistAction) -> Self { Self::Wishlist(action) }
}
