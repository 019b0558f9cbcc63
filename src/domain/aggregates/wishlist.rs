//! Wishlist Aggregate

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{Money, ProductId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub product_id: ProductId,
    pub name: Option<String>,
    pub image: Option<String>,
    pub price: Option<Money>,
}

impl WishlistItem {
    pub fn bare(product_id: ProductId) -> Self {
        Self { product_id, name: None, image: None, price: None }
    }
}

/// Flat product list with set semantics on the product id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Wishlist {
    items: Vec<WishlistItem>,
}

impl Wishlist {
    pub fn new() -> Self { Self::default() }

    pub fn items(&self) -> &[WishlistItem] { &self.items }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }

    /// Returns false when the product is already listed.
    pub fn insert(&mut self, item: WishlistItem) -> bool {
        if self.contains(item.product_id) { return false; }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, product_id: ProductId) -> Option<WishlistItem> {
        let pos = self.items.iter().position(|i| i.product_id == product_id)?;
        Some(self.items.remove(pos))
    }

    pub fn clear(&mut self) { self.items.clear(); }
}

impl FromIterator<WishlistItem> for Wishlist {
    /// Keeps the first occurrence of each product.
    fn from_iter<I: IntoIterator<Item = WishlistItem>>(iter: I) -> Self {
        let mut wishlist = Wishlist::new();
        for item in iter { wishlist.insert(item); }
        wishlist
    }
}
