//! Shop session
//!
//! Wraps [`ShopState`] and an [`ApiClient`]. Cart and wishlist changes are
//! written locally first and then sent to the backend; when the backend rejects
//! a change the local write is rolled back and the error returned. Guest
//! sessions keep the cart locally under `cartItems`.
//!
//! The state mutex is never held across an `.await`.

use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use crate::api::cart::AddCartItemRequest;
use crate::api::envelope::{self, Reply};
use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::domain::aggregates::product::resolve_variant;
use crate::domain::aggregates::{Cart, CartLineView, WishlistItem};
use crate::domain::events::{CartAction, SessionAction, ShopAction, WishlistAction};
use crate::domain::state::ShopState;
use crate::domain::value_objects::{Money, ProductId, Quantity, VariantKey};
use crate::storage::{self, SessionStorage, CART_KEY, MIN_TOKEN_LEN, TOKEN_KEY, USER_KEY};
use crate::{Result, StorefrontError};

const WISHLIST_PAGE_SIZE: u32 = 100;

pub struct ShopSession {
    client: Arc<ApiClient>,
    state: Mutex<ShopState>,
}

impl ShopSession {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_storage(config, config.storage())
    }

    /// Builds a session over `storage`, restoring the token, the user and (for
    /// guests) the persisted cart. A restored login starts with an empty cart
    /// and wishlist; call [`ShopSession::resume`] to load them.
    pub fn with_storage(config: &ClientConfig, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        let client = Arc::new(ApiClient::new(config, storage)?);
        let session = Self { client, state: Mutex::new(ShopState::default()) };
        session.restore()?;
        Ok(session)
    }

    fn restore(&self) -> Result<()> {
        let storage = self.storage();
        if storage::has_valid_token(storage.as_ref()) {
            let token = storage.get(TOKEN_KEY)?.unwrap_or_default();
            let user = storage::load_json::<Value>(storage.as_ref(), USER_KEY).unwrap_or_else(|e| {
                warn!(error = %e, "stored user is not valid JSON, ignoring it");
                None
            });
            info!("restored logged-in session");
            self.dispatch(SessionAction::LoggedIn { token, user })?;
            return Ok(());
        }

        match storage::load_json::<Cart>(storage.as_ref(), CART_KEY) {
            Ok(Some(cart)) => {
                debug!(lines = cart.line_count(), "restored guest cart");
                self.dispatch(CartAction::Replaced { cart, server_cart: None })?;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "stored cart is unreadable, starting empty"),
        }
        Ok(())
    }

    pub fn client(&self) -> &ApiClient { &self.client }
    pub fn storage(&self) -> Arc<dyn SessionStorage> { self.client.storage().clone() }

    /// A copy of the current state.
    pub fn state(&self) -> ShopState { self.lock().clone() }

    pub fn is_logged_in(&self) -> bool { self.lock().is_logged_in() }

    fn lock(&self) -> MutexGuard<'_, ShopState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn dispatch(&self, action: impl Into<ShopAction>) -> Result<()> {
        Ok(self.lock().apply(action)?)
    }

    fn require_login(&self) -> Result<()> {
        if self.is_logged_in() { Ok(()) } else { Err(StorefrontError::NotLoggedIn) }
    }

    /// Runs a backend call, then picks up any token change the client made
    /// while handling it.
    async fn call<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        let result = request.await;
        self.sync_auth();
        result
    }

    fn sync_auth(&self) {
        let stored = self.client.current_token().ok().flatten();
        let known = self.lock().token.clone();
        let action = match (stored, known) {
            (None, Some(_)) => {
                warn!("credentials were cleared, ending session");
                SessionAction::LoggedOut
            }
            (Some(stored), Some(known)) if stored != known => {
                debug!("picked up refreshed token");
                SessionAction::TokenRefreshed { token: stored }
            }
            _ => return,
        };
        let _ = self.dispatch(action);
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Stores the credentials and loads the server cart and wishlist. Loading
    /// failures are logged; the login itself still stands.
    pub async fn login(&self, token: &str, user: Option<Value>) -> Result<()> {
        let token = token.trim();
        if token.len() <= MIN_TOKEN_LEN {
            return Err(StorefrontError::Validation("Invalid access token".to_string()));
        }
        let storage = self.storage();
        storage.set(TOKEN_KEY, token)?;
        match &user {
            Some(user) => storage::save_json(storage.as_ref(), USER_KEY, user)?,
            None => storage.remove(USER_KEY)?,
        }
        storage.remove(CART_KEY)?;
        self.dispatch(SessionAction::LoggedIn { token: token.to_string(), user })?;
        info!("logged in");

        if let Err(e) = self.fetch_user_cart().await {
            warn!(error = %e, "could not load cart after login");
        }
        if let Err(e) = self.fetch_wishlist().await {
            warn!(error = %e, "could not load wishlist after login");
        }
        Ok(())
    }

    /// Loads the server cart and wishlist for a session restored from storage.
    /// Does nothing for guests. Failures are logged.
    pub async fn resume(&self) {
        if !self.is_logged_in() { return; }
        if let Err(e) = self.fetch_user_cart().await {
            warn!(error = %e, "could not load cart for restored session");
        }
        if let Err(e) = self.fetch_wishlist().await {
            warn!(error = %e, "could not load wishlist for restored session");
        }
    }

    pub fn logout(&self) -> Result<()> {
        self.client.logout()?;
        self.storage().remove(CART_KEY)?;
        self.dispatch(SessionAction::LoggedOut)?;
        info!("logged out");
        Ok(())
    }

    /// Loads a page of active products into the catalog used for pricing.
    pub async fn load_products(&self, page: u32, page_size: u32) -> Result<usize> {
        let page = self.call(self.client.products().list(page, page_size)).await.map_err(|e| {
            error!(error = %e, "failed to load products");
            e
        })?;
        let count = page.items.len();
        self.dispatch(ShopAction::CatalogLoaded(page.items))?;
        debug!(count, "catalog loaded");
        Ok(count)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Adds a new line. Returns the backend's message (or a local one for
    /// guests).
    pub async fn add_to_cart(&self, product_id: ProductId, size: &str, color: &str, quantity: u32) -> Result<String> {
        let key = VariantKey::new(size, color).map_err(|e| {
            warn!(%product_id, error = %e, "add to cart rejected");
            StorefrontError::from(e)
        })?;
        let quantity = Quantity::new(quantity)
            .ok_or_else(|| StorefrontError::Validation("Quantity must be at least 1".to_string()))?;

        self.dispatch(CartAction::LineStaged { product_id, key: key.clone(), quantity }).map_err(|e| {
            warn!(%product_id, %key, "variant already in cart");
            e
        })?;

        if !self.is_logged_in() {
            self.persist_guest_cart()?;
            info!(%product_id, %key, "added to guest cart");
            return Ok("Added to cart".to_string());
        }

        match self.push_line(product_id, &key, quantity).await {
            Ok(reply) => {
                info!(%product_id, %key, quantity = quantity.value(), "added to cart");
                if let Err(e) = self.fetch_user_cart().await {
                    warn!(error = %e, "cart refetch after add failed, keeping local copy");
                }
                Ok(reply.message_or("Product added to cart successfully"))
            }
            Err(e) => {
                error!(%product_id, %key, error = %e, "add to cart failed, rolling back");
                let _ = self.dispatch(CartAction::LineRemoved { product_id, key });
                Err(e)
            }
        }
    }

    async fn push_line(&self, product_id: ProductId, key: &VariantKey, quantity: Quantity) -> Result<Reply> {
        let variants = self.call(self.client.products().variants(product_id)).await?;
        let variant = resolve_variant(&variants, key.size()).ok_or_else(|| StorefrontError::VariantNotFound {
            product_id,
            size: key.size().to_string(),
        })?;
        let request = AddCartItemRequest {
            product_id: product_id.value(),
            quantity: quantity.value(),
            product_variant_id: variant.id,
        };
        self.call(self.client.cart().add_item(&request)).await
    }

    /// Variant id of an existing line: taken from the last server cart when it
    /// lists the line, otherwise resolved from the product's variants.
    async fn variant_id(&self, product_id: ProductId, key: &VariantKey) -> Result<i64> {
        let cached = self.lock().server_cart.as_ref().and_then(|raw| variant_id_in_server_cart(raw, product_id, key));
        if let Some(id) = cached {
            return Ok(id);
        }
        let variants = self.call(self.client.products().variants(product_id)).await?;
        resolve_variant(&variants, key.size())
            .map(|v| v.id)
            .ok_or_else(|| StorefrontError::VariantNotFound { product_id, size: key.size().to_string() })
    }

    async fn push_quantity(&self, product_id: ProductId, key: &VariantKey, quantity: u32) -> Result<Reply> {
        let variant_id = self.variant_id(product_id, key).await?;
        self.call(self.client.cart().update_quantity(product_id, variant_id, quantity)).await
    }

    async fn push_removal(&self, product_id: ProductId, key: &VariantKey) -> Result<Reply> {
        let variant_id = self.variant_id(product_id, key).await?;
        self.call(self.client.cart().remove_item(product_id, variant_id)).await
    }

    /// Sets a line's quantity; zero removes the line. Rolled back when the
    /// backend rejects it.
    pub async fn update_quantity(&self, product_id: ProductId, size: &str, color: &str, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return self.remove_item(product_id, size, color).await;
        }
        let key = VariantKey::new(size, color)?;
        let previous = self.lock().cart.quantity(product_id, &key);
        self.dispatch(CartAction::QuantitySet { product_id, key: key.clone(), quantity })?;

        if !self.is_logged_in() {
            return self.persist_guest_cart();
        }

        let result = self.push_quantity(product_id, &key, quantity).await;

        match result {
            Ok(_) => {
                debug!(%product_id, %key, quantity, "quantity updated");
                Ok(())
            }
            Err(e) => {
                error!(%product_id, %key, error = %e, "quantity update failed, rolling back");
                let rollback = match previous {
                    Some(q) => CartAction::QuantitySet { product_id, key, quantity: q.value() },
                    None => CartAction::LineRemoved { product_id, key },
                };
                let _ = self.dispatch(rollback);
                Err(e)
            }
        }
    }

    /// Drops a line. Restored when the backend rejects the removal.
    pub async fn remove_item(&self, product_id: ProductId, size: &str, color: &str) -> Result<()> {
        let key = VariantKey::new(size, color)?;
        let previous = self.lock().cart.quantity(product_id, &key);
        self.dispatch(CartAction::LineRemoved { product_id, key: key.clone() })?;

        if !self.is_logged_in() {
            return self.persist_guest_cart();
        }

        let result = self.push_removal(product_id, &key).await;

        match result {
            Ok(_) => {
                info!(%product_id, %key, "removed from cart");
                Ok(())
            }
            Err(e) => {
                error!(%product_id, %key, error = %e, "remove from cart failed, restoring line");
                if let Some(quantity) = previous {
                    let _ = self.dispatch(CartAction::LineStaged { product_id, key, quantity });
                }
                Err(e)
            }
        }
    }

    pub async fn clear_cart(&self) -> Result<()> {
        if self.is_logged_in() {
            self.call(self.client.cart().clear()).await.map_err(|e| {
                error!(error = %e, "clear cart failed");
                e
            })?;
        }
        self.dispatch(CartAction::Cleared)?;
        self.storage().remove(CART_KEY)?;
        info!("cart cleared");
        Ok(())
    }

    /// Replaces the local cart with the server's.
    pub async fn fetch_user_cart(&self) -> Result<Cart> {
        self.require_login()?;
        let server = self.call(self.client.cart().fetch()).await.map_err(|e| {
            error!(error = %e, "failed to fetch cart");
            e
        })?;
        debug!(lines = server.cart.line_count(), "server cart loaded");
        self.dispatch(CartAction::Replaced { cart: server.cart.clone(), server_cart: Some(server.raw) })?;
        Ok(server.cart)
    }

    pub async fn checkout(&self) -> Result<Reply> {
        self.require_login()?;
        let reply = self.call(self.client.cart().checkout()).await.map_err(|e| {
            error!(error = %e, "checkout failed");
            e
        })?;
        info!("checkout submitted");
        if let Err(e) = self.fetch_user_cart().await {
            warn!(error = %e, "cart refetch after checkout failed");
        }
        Ok(reply)
    }

    pub fn cart_count(&self) -> u32 { self.lock().cart_count() }
    pub fn cart_amount(&self) -> Money { self.lock().cart_amount() }

    pub fn cart_view(&self) -> Vec<CartLineView> {
        let state = self.lock();
        state.cart.view(&state.catalog)
    }

    fn persist_guest_cart(&self) -> Result<()> {
        let cart = self.lock().cart.clone();
        storage::save_json(self.storage().as_ref(), CART_KEY, &cart)
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    pub async fn add_to_wishlist(&self, product_id: ProductId) -> Result<String> {
        self.require_login()?;
        let staged = !self.lock().wishlist.contains(product_id);
        if staged {
            self.dispatch(WishlistAction::Added(WishlistItem::bare(product_id)))?;
        }
        match self.call(self.client.wishlist().add(product_id)).await {
            Ok(reply) => {
                info!(%product_id, "added to wishlist");
                if let Err(e) = self.fetch_wishlist().await {
                    warn!(error = %e, "wishlist refetch after add failed");
                }
                Ok(reply.message_or("Added to wishlist"))
            }
            Err(e) => {
                error!(%product_id, error = %e, "add to wishlist failed, rolling back");
                if staged {
                    let _ = self.dispatch(WishlistAction::Removed(product_id));
                }
                Err(e)
            }
        }
    }

    pub async fn remove_from_wishlist(&self, product_id: ProductId) -> Result<String> {
        self.require_login()?;
        let previous = self.lock().wishlist.items().iter().find(|i| i.product_id == product_id).cloned();
        self.dispatch(WishlistAction::Removed(product_id))?;
        match self.call(self.client.wishlist().remove(product_id)).await {
            Ok(reply) => {
                info!(%product_id, "removed from wishlist");
                if let Err(e) = self.fetch_wishlist().await {
                    warn!(error = %e, "wishlist refetch after remove failed");
                }
                Ok(reply.message_or("Removed from wishlist"))
            }
            Err(e) => {
                error!(%product_id, error = %e, "remove from wishlist failed, restoring item");
                if let Some(item) = previous {
                    let _ = self.dispatch(WishlistAction::Added(item));
                }
                Err(e)
            }
        }
    }

    pub async fn fetch_wishlist(&self) -> Result<Vec<WishlistItem>> {
        self.require_login()?;
        let items = self.call(self.client.wishlist().list(1, WISHLIST_PAGE_SIZE, false)).await.map_err(|e| {
            error!(error = %e, "failed to fetch wishlist");
            e
        })?;
        debug!(count = items.len(), "wishlist loaded");
        self.dispatch(WishlistAction::Replaced(items.clone()))?;
        Ok(items)
    }

    /// Asks the backend about one product. False when logged out or when the
    /// check fails.
    pub async fn is_in_wishlist(&self, product_id: ProductId) -> bool {
        if !self.is_logged_in() { return false; }
        match self.call(self.client.wishlist().contains(product_id)).await {
            Ok(found) => found,
            Err(e) => {
                debug!(%product_id, error = %e, "wishlist check failed");
                false
            }
        }
    }

    /// One DELETE for the whole list.
    pub async fn clear_wishlist(&self) -> Result<()> {
        self.require_login()?;
        self.call(self.client.wishlist().clear()).await.map_err(|e| {
            error!(error = %e, "clear wishlist failed");
            e
        })?;
        self.dispatch(WishlistAction::Cleared)?;
        info!("wishlist cleared");
        Ok(())
    }

    pub fn wishlist_count(&self) -> usize { self.lock().wishlist_count() }
}

/// Looks up the variant id of a cart line in a raw server cart payload.
fn variant_id_in_server_cart(raw: &Value, product_id: ProductId, key: &VariantKey) -> Option<i64> {
    envelope::items(raw).iter().find_map(|item| {
        let id = envelope::field_i64(item, &["productId", "product.id"])?;
        let size = envelope::field_str(item, &["productVariant.size", "size"]).unwrap_or_else(|| "default".into());
        let color = envelope::field_str(item, &["productVariant.color", "color"]).unwrap_or_else(|| "default".into());
        if id != product_id.value() || size.trim() != key.size() || color.trim() != key.color() {
            return None;
        }
        envelope::field_i64(item, &["productVariantId", "productVariant.id", "variantId"])
    })
}
