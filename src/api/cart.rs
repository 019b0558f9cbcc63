//! `/api/Cart` endpoints

use serde::Serialize;
use serde_json::Value;
use validator::Validate;
use crate::api::client::{ApiClient, ApiRequest, JSON_PATCH};
use crate::api::envelope::{self, Reply};
use crate::domain::aggregates::{Cart, CartLine};
use crate::domain::value_objects::{ProductId, Quantity, VariantKey};
use crate::Result;

#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product_id: i64,
    #[validate(range(min = 1))]
    pub quantity: u32,
    pub product_variant_id: i64,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1))]
    pub quantity: u32,
}

/// Server cart normalized into the local shape, plus the raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerCart {
    pub cart: Cart,
    pub raw: Value,
}

pub struct CartApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn cart(&self) -> CartApi<'_> { CartApi { client: self } }
}

impl CartApi<'_> {
    pub async fn fetch(&self) -> Result<ServerCart> {
        let reply = self.client.send(&ApiRequest::get("/api/Cart")).await?;
        Ok(ServerCart { cart: normalize_cart(&reply.data), raw: reply.data })
    }

    pub async fn add_item(&self, request: &AddCartItemRequest) -> Result<Reply> {
        request.validate()?;
        let request = ApiRequest::post("/api/Cart/items").json(request)?.content_type(JSON_PATCH);
        self.client.send(&request).await
    }

    pub async fn update_quantity(&self, product_id: ProductId, variant_id: i64, quantity: u32) -> Result<Reply> {
        let body = UpdateQuantityRequest { quantity };
        body.validate()?;
        let request = ApiRequest::put(format!("/api/Cart/items/{}/{}", product_id, variant_id)).json(&body)?;
        self.client.send(&request).await
    }

    pub async fn remove_item(&self, product_id: ProductId, variant_id: i64) -> Result<Reply> {
        self.client.send(&ApiRequest::delete(format!("/api/Cart/items/{}/{}", product_id, variant_id))).await
    }

    pub async fn clear(&self) -> Result<Reply> {
        self.client.send(&ApiRequest::delete("/api/Cart/clear")).await
    }

    pub async fn checkout(&self) -> Result<Reply> {
        self.client.send(&ApiRequest::post("/api/Cart/checkout")).await
    }
}

/// Maps a server cart (an array, or an object holding `items`) into the local
/// nested map. Items without a product id are skipped.
pub fn normalize_cart(data: &Value) -> Cart {
    envelope::items(data)
        .iter()
        .filter_map(|item| {
            let product_id = envelope::field_i64(item, &["productId", "product.id"])?;
            let size = envelope::field_str(item, &["productVariant.size", "size"]).unwrap_or_else(|| "default".into());
            let color = envelope::field_str(item, &["productVariant.color", "color"]).unwrap_or_else(|| "default".into());
            let quantity = envelope::field_i64(item, &["quantity"])
                .and_then(|q| u32::try_from(q).ok())
                .and_then(Quantity::new)
                .or_else(|| Quantity::new(1))?;
            let key = VariantKey::new(&size, &color).ok()?;
            Some(CartLine { product_id: ProductId::new(product_id), key, quantity })
        })
        .collect()
}
