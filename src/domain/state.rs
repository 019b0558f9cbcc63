//! Session state store
//!
//! `ShopState` is only changed by [`ShopState::apply`]. Applying an action that
//! would break a cart invariant fails and leaves the state untouched.

use serde_json::Value;
use crate::domain::aggregates::{Cart, CartError, Catalog, Wishlist};
use crate::domain::events::{CartAction, SessionAction, ShopAction, WishlistAction};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Default)]
pub struct ShopState {
    pub token: Option<String>,
    pub user: Option<Value>,
    pub cart: Cart,
    /// Last full cart payload from the backend, kept for display.
    pub server_cart: Option<Value>,
    pub wishlist: Wishlist,
    pub catalog: Catalog,
}

impl ShopState {
    pub fn is_logged_in(&self) -> bool { self.token.is_some() }

    pub fn cart_count(&self) -> u32 { self.cart.item_count() }
    pub fn cart_amount(&self) -> Money { self.cart.amount(&self.catalog) }
    pub fn wishlist_count(&self) -> usize { self.wishlist.len() }

    pub fn apply(&mut self, action: impl Into<ShopAction>) -> Result<(), CartError> {
        match action.into() {
            ShopAction::Session(action) => self.apply_session(action),
            ShopAction::Cart(action) => return self.apply_cart(action),
            ShopAction::Wishlist(action) => self.apply_wishlist(action),
            ShopAction::CatalogLoaded(products) => self.catalog = Catalog::new(products),
        }
        Ok(())
    }

    fn apply_session(&mut self, action: SessionAction) {
        match action {
            SessionAction::LoggedIn { token, user } => {
                self.token = Some(token);
                self.user = user;
            }
            SessionAction::TokenRefreshed { token } => self.token = Some(token),
            SessionAction::LoggedOut => {
                self.token = None;
                self.user = None;
                self.cart.clear();
                self.server_cart = None;
                self.wishlist.clear();
            }
        }
    }

    fn apply_cart(&mut self, action: CartAction) -> Result<(), CartError> {
        match action {
            CartAction::LineStaged { product_id, key, quantity } => self.cart.insert_line(product_id, key, quantity)?,
            CartAction::QuantitySet { product_id, key, quantity } => { self.cart.set_quantity(product_id, key, quantity); }
            CartAction::LineRemoved { product_id, key } => { self.cart.remove_line(product_id, &key); }
            CartAction::Replaced { cart, server_cart } => {
                self.cart = cart;
                self.server_cart = server_cart;
            }
            CartAction::Cleared => {
                self.cart.clear();
                self.server_cart = None;
            }
        }
        Ok(())
    }

    fn apply_wishlist(&mut self, action: WishlistAction) {
        match action {
            WishlistAction::Added(item) => { self.wishlist.insert(item); }
            WishlistAction::Removed(product_id) => { self.wishlist.remove(product_id); }
            WishlistAction::Replaced(items) => self.wishlist = items.into_iter().collect(),
            WishlistAction::Cleared => self.wishlist.clear(),
        }
    }
}
