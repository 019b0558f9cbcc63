//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Store currency used when the backend does not say otherwise.
pub const DEFAULT_CURRENCY: &str = "EGP";

/// Backend product identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    pub fn new(value: i64) -> Self { Self(value) }
    pub fn value(&self) -> i64 { self.0 }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self { Self(value) }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Size/color combination of a product, keyed as `size_color`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariantKey {
    size: String,
    color: String,
}

impl VariantKey {
    pub fn new(size: &str, color: &str) -> Result<Self, VariantKeyError> {
        let size = size.trim();
        let color = color.trim();
        if size.is_empty() { return Err(VariantKeyError::MissingSize); }
        if color.is_empty() { return Err(VariantKeyError::MissingColor); }
        Ok(Self { size: size.to_string(), color: color.to_string() })
    }

    pub fn size(&self) -> &str { &self.size }
    pub fn color(&self) -> &str { &self.color }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}_{}", self.size, self.color) }
}

impl FromStr for VariantKey {
    type Err = VariantKeyError;

    // Keys written before colors existed hold only the size.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('_') {
            Some((size, color)) => Self::new(size, color),
            None => Self::new(s, "default"),
        }
    }
}

impl Serialize for VariantKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VariantKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum VariantKeyError { MissingSize, MissingColor }
impl std::error::Error for VariantKeyError {}
impl fmt::Display for VariantKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::MissingSize => write!(f, "Please select a size"), Self::MissingColor => write!(f, "Please select a color") }
    }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn store(amount: Decimal) -> Self { Self::new(amount, DEFAULT_CURRENCY) }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }
}

impl Default for Money { fn default() -> Self { Self::zero(DEFAULT_CURRENCY) } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2}", self.currency, self.amount.round_dp(2))
    }
}

#[derive(Debug, Clone)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// Quantity of a cart line. Never zero: a zero quantity removes the line instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
}

impl TryFrom<u32> for Quantity {
    type Error = String;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "quantity must be a positive integer".to_string())
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}
