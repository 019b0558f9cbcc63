//! Cart Aggregate
//!
//! Client-local cart as a nested map `{product_id: {"size_color": quantity}}`.
//! One line per (product, size, color); lines never hold a zero quantity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::domain::aggregates::product::Catalog;
use crate::domain::value_objects::{Money, ProductId, Quantity, VariantKey};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: BTreeMap<ProductId, BTreeMap<VariantKey, Quantity>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub key: VariantKey,
    pub quantity: Quantity,
}

/// A cart line joined with its catalog snapshot for display.
#[derive(Clone, Debug, PartialEq)]
pub struct CartLineView {
    pub line: CartLine,
    pub name: Option<String>,
    pub image: Option<String>,
    pub unit_price: Option<Money>,
    pub line_total: Money,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line_count(&self) -> usize { self.lines.values().map(BTreeMap::len).sum() }

    pub fn contains(&self, product_id: ProductId, key: &VariantKey) -> bool {
        self.quantity(product_id, key).is_some()
    }

    pub fn quantity(&self, product_id: ProductId, key: &VariantKey) -> Option<Quantity> {
        self.lines.get(&product_id).and_then(|variants| variants.get(key)).copied()
    }

    pub fn lines(&self) -> impl Iterator<Item = CartLine> + '_ {
        self.lines.iter().flat_map(|(product_id, variants)| {
            variants.iter().map(move |(key, quantity)| CartLine { product_id: *product_id, key: key.clone(), quantity: *quantity })
        })
    }

    /// Adds a new line. An existing line for the same variant is left untouched.
    pub fn insert_line(&mut self, product_id: ProductId, key: VariantKey, quantity: Quantity) -> Result<(), CartError> {
        let variants = self.lines.entry(product_id).or_default();
        if variants.contains_key(&key) { return Err(CartError::AlreadyInCart); }
        variants.insert(key, quantity);
        Ok(())
    }

    /// Overwrites a line's quantity, inserting the line if absent. Zero removes it.
    /// Returns the previous quantity.
    pub fn set_quantity(&mut self, product_id: ProductId, key: VariantKey, quantity: u32) -> Option<Quantity> {
        match Quantity::new(quantity) {
            Some(quantity) => self.lines.entry(product_id).or_default().insert(key, quantity),
            None => self.remove_line(product_id, &key),
        }
    }

    pub fn remove_line(&mut self, product_id: ProductId, key: &VariantKey) -> Option<Quantity> {
        let variants = self.lines.get_mut(&product_id)?;
        let removed = variants.remove(key);
        if variants.is_empty() { self.lines.remove(&product_id); }
        removed
    }

    pub fn clear(&mut self) { self.lines.clear(); }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines.values().flat_map(BTreeMap::values).map(Quantity::value).sum()
    }

    /// Sum of `final_price * quantity`; products missing from the catalog count as zero.
    pub fn amount(&self, catalog: &Catalog) -> Money {
        self.lines().fold(Money::default(), |acc, line| {
            match catalog.final_price(line.product_id) {
                Some(price) => acc.add(&price.multiply(line.quantity.value())).unwrap_or(acc),
                None => acc,
            }
        })
    }

    pub fn view(&self, catalog: &Catalog) -> Vec<CartLineView> {
        self.lines()
            .map(|line| {
                let product = catalog.get(line.product_id);
                let unit_price = product.map(|p| p.final_price.clone());
                let line_total = unit_price.as_ref().map(|p| p.multiply(line.quantity.value())).unwrap_or_default();
                CartLineView {
                    name: product.map(|p| p.name.clone()),
                    image: product.and_then(|p| p.main_image()).map(str::to_string),
                    unit_price,
                    line_total,
                    line,
                }
            })
            .collect()
    }
}

impl FromIterator<CartLine> for Cart {
    /// Later lines for the same variant overwrite earlier ones.
    fn from_iter<I: IntoIterator<Item = CartLine>>(iter: I) -> Self {
        let mut cart = Cart::new();
        for line in iter {
            cart.lines.entry(line.product_id).or_default().insert(line.key, line.quantity);
        }
        cart
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { AlreadyInCart }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Item with this size and color is already in cart") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::snapshot;
    use rust_decimal::Decimal;

    fn key(size: &str, color: &str) -> VariantKey { VariantKey::new(size, color).unwrap() }
    fn qty(n: u32) -> Quantity { Quantity::new(n).unwrap() }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new();
        let p1 = ProductId::new(1);
        cart.insert_line(p1, key("M", "Black"), qty(2)).unwrap();
        cart.insert_line(p1, key("L", "Black"), qty(1)).unwrap();
        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.set_quantity(p1, key("M", "Black"), 5), Some(qty(2)));
        assert_eq!(cart.item_count(), 6);
        cart.set_quantity(p1, key("M", "Black"), 0);
        assert!(!cart.contains(p1, &key("M", "Black")));
        cart.remove_line(p1, &key("L", "Black"));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_duplicate_variant_rejected() {
        let mut cart = Cart::new();
        let p1 = ProductId::new(1);
        cart.insert_line(p1, key("M", "Red"), qty(1)).unwrap();
        let before = cart.clone();
        assert_eq!(cart.insert_line(p1, key("M", "Red"), qty(3)), Err(CartError::AlreadyInCart));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_amount_uses_final_price() {
        let catalog = Catalog::new(vec![snapshot(1, 100), snapshot(2, 50)]);
        let mut cart = Cart::new();
        cart.insert_line(ProductId::new(1), key("M", "Black"), qty(2)).unwrap();
        cart.insert_line(ProductId::new(2), key("S", "White"), qty(1)).unwrap();
        assert_eq!(cart.amount(&catalog).amount(), Decimal::new(250, 0));

        cart.insert_line(ProductId::new(3), key("S", "White"), qty(4)).unwrap();
        assert_eq!(cart.amount(&catalog).amount(), Decimal::new(250, 0));
        let view = cart.view(&catalog);
        assert_eq!(view.len(), 3);
        assert!(view.iter().any(|v| v.name.is_none() && v.line_total.is_zero()));
    }

    #[test]
    fn test_persisted_shape() {
        let mut cart = Cart::new();
        cart.insert_line(ProductId::new(7), key("M", "Black"), qty(2)).unwrap();
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json, serde_json::json!({"7": {"M_Black": 2}}));
        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
