//! `/api/Wishlist` endpoints

use rust_decimal::Decimal;
use serde_json::Value;
use crate::api::client::{ApiClient, ApiRequest};
use crate::api::envelope::{self, Reply};
use crate::domain::aggregates::WishlistItem;
use crate::domain::value_objects::{Money, ProductId};
use crate::Result;

pub struct WishlistApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn wishlist(&self) -> WishlistApi<'_> { WishlistApi { client: self } }
}

impl WishlistApi<'_> {
    pub async fn add(&self, product_id: ProductId) -> Result<Reply> {
        self.client.send(&ApiRequest::post(format!("/api/Wishlist/{}", product_id))).await
    }

    pub async fn remove(&self, product_id: ProductId) -> Result<Reply> {
        self.client.send(&ApiRequest::delete(format!("/api/Wishlist/{}", product_id))).await
    }

    pub async fn list(&self, page: u32, page_size: u32, all: bool) -> Result<Vec<WishlistItem>> {
        let request = ApiRequest::get("/api/Wishlist")
            .query("all", all)
            .query("page", page)
            .query("pageSize", page_size);
        let reply = self.client.send(&request).await?;
        Ok(normalize_wishlist(&reply.data))
    }

    /// Single-product membership check against the backend.
    pub async fn contains(&self, product_id: ProductId) -> Result<bool> {
        let reply = self.client.send(&ApiRequest::get(format!("/api/Wishlist/{}", product_id))).await?;
        Ok(membership(&reply.data))
    }

    pub async fn clear(&self) -> Result<Reply> {
        self.client.send(&ApiRequest::delete("/api/Wishlist")).await
    }
}

/// Wishlist entries arrive as bare ids, as `{productId, ...}` or as
/// `{product: {...}}`.
pub fn normalize_wishlist(data: &Value) -> Vec<WishlistItem> {
    envelope::items(data).iter().filter_map(wishlist_item).collect()
}

fn wishlist_item(entry: &Value) -> Option<WishlistItem> {
    if let Some(id) = entry.as_i64() {
        return Some(WishlistItem::bare(ProductId::new(id)));
    }
    let product_id = envelope::field_i64(entry, &["productId", "product.id", "id"])?;
    let price = envelope::field(entry, &["product.finalPrice", "finalPrice", "product.price", "price"])
        .and_then(|v| serde_json::from_value::<Decimal>(v.clone()).ok())
        .map(Money::store);
    Some(WishlistItem {
        product_id: ProductId::new(product_id),
        name: envelope::field_str(entry, &["productName", "product.name", "name"]),
        image: envelope::field_str(entry, &["mainImageUrl", "product.mainImageUrl", "imageUrl", "product.imageUrl"]),
        price,
    })
}

fn membership(data: &Value) -> bool {
    match data {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Object(map) => ["isInWishlist", "inWishlist", "exists"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_bool))
            .unwrap_or(true),
        _ => true,
    }
}
