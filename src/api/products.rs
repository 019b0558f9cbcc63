//! `/api/Products` endpoints

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use crate::api::client::{ApiClient, ApiRequest};
use crate::api::envelope::{self, Page};
use crate::domain::aggregates::{ProductSnapshot, Variant};
use crate::domain::value_objects::{Money, ProductId};
use crate::Result;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProductDto {
    id: i64,
    name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    final_price: Option<Decimal>,
    images: Option<Vec<ImageDto>>,
    main_image_url: Option<String>,
    is_active: Option<bool>,
    category_name: Option<String>,
    category: Option<NamedDto>,
    sub_category_name: Option<String>,
    sub_category: Option<NamedDto>,
    variants: Option<Vec<VariantDto>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ImageDto {
    #[serde(alias = "imageUrl", alias = "Url")]
    url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct NamedDto {
    name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VariantDto {
    id: i64,
    #[serde(deserialize_with = "envelope::string_or_number")]
    size: Option<String>,
    color: Option<String>,
    quantity: Option<i64>,
}

impl From<ProductDto> for ProductSnapshot {
    fn from(dto: ProductDto) -> Self {
        let price = dto.price.unwrap_or(Decimal::ZERO);
        let final_price = dto.final_price.unwrap_or(Decimal::ZERO);
        let variants = dto.variants.unwrap_or_default();
        let images = match dto.images {
            Some(images) => images.into_iter().filter_map(|i| i.url).filter(|u| !u.is_empty()).collect(),
            None => dto.main_image_url.into_iter().collect(),
        };
        Self {
            id: ProductId::new(dto.id),
            name: dto.name.unwrap_or_default(),
            description: dto.description,
            price: Money::store(price),
            final_price: Money::store(final_price),
            images,
            category: dto.category_name.or(dto.category.and_then(|c| c.name)),
            sub_category: dto.sub_category_name.or(dto.sub_category.and_then(|c| c.name)),
            sizes: variants.iter().filter_map(|v| v.size.clone()).collect(),
            is_active: dto.is_active.unwrap_or(true),
        }
    }
}

impl From<VariantDto> for Variant {
    fn from(dto: VariantDto) -> Self {
        Self { id: dto.id, size: dto.size, color: dto.color, quantity: dto.quantity.unwrap_or(0) }
    }
}

pub struct ProductsApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn products(&self) -> ProductsApi<'_> { ProductsApi { client: self } }
}

impl ProductsApi<'_> {
    pub async fn list(&self, page: u32, page_size: u32) -> Result<Page<ProductSnapshot>> {
        let request = ApiRequest::get("/api/Products")
            .query("isActive", true)
            .query("includeDeleted", false)
            .query("page", page)
            .query("pageSize", page_size);
        let reply = self.client.send(&request).await?;
        let items = parse_products(&reply.data)?;
        let total_count = reply.total_count.unwrap_or(items.len() as u64);
        Ok(Page { items, total_count })
    }

    pub async fn variants(&self, product_id: ProductId) -> Result<Vec<Variant>> {
        let request = ApiRequest::get(format!("/api/Products/{}/Variants", product_id))
            .query("isActive", true)
            .query("includeDeleted", false);
        let reply = self.client.send(&request).await?;
        parse_variants(&reply.data)
    }
}

pub fn parse_products(data: &Value) -> Result<Vec<ProductSnapshot>> {
    envelope::items(data)
        .into_iter()
        .map(|item| Ok(serde_json::from_value::<ProductDto>(item)?.into()))
        .collect()
}

pub fn parse_variants(data: &Value) -> Result<Vec<Variant>> {
    envelope::items(data)
        .into_iter()
        .map(|item| Ok(serde_json::from_value::<VariantDto>(item)?.into()))
        .collect()
}
