//! Product catalog snapshot
//!
//! The client keeps a denormalized copy of each product for display and for
//! pricing the local cart without refetching.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use crate::domain::value_objects::{Money, ProductId};

#[derive(Clone, Debug, PartialEq)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    /// Price after the active discount; what the cart is charged.
    pub final_price: Money,
    pub images: Vec<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub sizes: Vec<String>,
    pub is_active: bool,
}

impl ProductSnapshot {
    pub fn main_image(&self) -> Option<&str> { self.images.first().map(String::as_str) }

    /// Whole-percent discount derived from the list and final price.
    pub fn discount_percent(&self) -> u32 {
        let price = self.price.amount();
        let final_price = self.final_price.amount();
        if price <= Decimal::ZERO || final_price >= price { return 0; }
        let pct = ((price - final_price) / price * Decimal::ONE_HUNDRED).round();
        pct.to_u32().unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Variant {
    pub id: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: i64,
}

/// Numeric size band that a letter size covers.
pub fn size_range(label: &str) -> Option<RangeInclusive<u32>> {
    match label.trim().to_uppercase().as_str() {
        "S" => Some(30..=32),
        "M" => Some(33..=35),
        "L" => Some(36..=38),
        "XL" => Some(39..=41),
        "XXL" => Some(42..=44),
        _ => None,
    }
}

/// Picks the backend variant for a size label: exact size match first, then a
/// numeric size inside the letter band, then the first variant in stock, then
/// the first variant at all.
pub fn resolve_variant<'a>(variants: &'a [Variant], size_label: &str) -> Option<&'a Variant> {
    let wanted = size_label.trim();
    if wanted.is_empty() { return None; }

    variants
        .iter()
        .find(|v| v.size.as_deref().is_some_and(|s| s.trim().eq_ignore_ascii_case(wanted)))
        .or_else(|| {
            let range = size_range(wanted)?;
            variants.iter().find(|v| {
                v.size.as_deref().and_then(|s| s.trim().parse::<u32>().ok()).is_some_and(|n| range.contains(&n))
            })
        })
        .or_else(|| {
            tracing::warn!(size = wanted, "no variant matches size, falling back to first available");
            variants.iter().find(|v| v.quantity > 0).or_else(|| variants.first())
        })
}

/// Products by id, as last loaded from the backend.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: BTreeMap<ProductId, ProductSnapshot>,
}

impl Catalog {
    pub fn new(products: impl IntoIterator<Item = ProductSnapshot>) -> Self {
        Self { products: products.into_iter().map(|p| (p.id, p)).collect() }
    }

    pub fn get(&self, id: ProductId) -> Option<&ProductSnapshot> { self.products.get(&id) }
    pub fn len(&self) -> usize { self.products.len() }
    pub fn is_empty(&self) -> bool { self.products.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &ProductSnapshot> { self.products.values() }

    pub fn final_price(&self, id: ProductId) -> Option<&Money> {
        self.products.get(&id).map(|p| &p.final_price)
    }
}

#[cfg(test)]
pub(crate) fn snapshot(id: i64, final_price: i64) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::new(id),
        name: format!("Product {}", id),
        description: None,
        price: Money::store(Decimal::new(final_price, 0)),
        final_price: Money::store(Decimal::new(final_price, 0)),
        images: vec![format!("https://cdn.example/{}.jpg", id)],
        category: None,
        sub_category: None,
        sizes: vec!["M".into()],
        is_active: true,
    }
}
