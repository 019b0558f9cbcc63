//! Order status model
//!
//! Static table of the backend's order status codes with their display label,
//! badge color and the statuses an admin may pick next. The transition table is
//! a display hint for the status dropdown; the backend decides whether a change
//! is accepted.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OrderStatus {
    PendingPayment = 0,
    Confirmed = 1,
    Processing = 2,
    Shipped = 3,
    Delivered = 4,
    CancelledByUser = 5,
    Refunded = 6,
    Returned = 7,
    PaymentExpired = 8,
    CancelledByAdmin = 9,
    Complete = 10,
}

use OrderStatus::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor { Green, Red, Blue, Gray }

impl BadgeColor {
    pub fn as_str(self) -> &'static str {
        match self { Self::Green => "green", Self::Red => "red", Self::Blue => "blue", Self::Gray => "gray" }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Self::Green => "bg-green-50 text-green-600 border-green-100",
            Self::Red => "bg-rose-50 text-rose-600 border-rose-100",
            Self::Blue => "bg-blue-50 text-blue-600 border-blue-100",
            Self::Gray => "bg-gray-50 text-gray-500 border-gray-100",
        }
    }
}

impl fmt::Display for BadgeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Labels the admin and storefront screens used before the table was unified.
const LABEL_ALIASES: &[(&str, OrderStatus)] = &[
    ("pending", PendingPayment),
    ("cancelleduser", CancelledByUser),
    ("cancelledu", CancelledByUser),
    ("expired", PaymentExpired),
    ("canceladmin", CancelledByAdmin),
    ("cancelledadmin", CancelledByAdmin),
    ("cancelleda", CancelledByAdmin),
    ("completed", Complete),
];

impl OrderStatus {
    pub const ALL: [OrderStatus; 11] = [
        PendingPayment, Confirmed, Processing, Shipped, Delivered, CancelledByUser,
        Refunded, Returned, PaymentExpired, CancelledByAdmin, Complete,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| i64::from(s.code()) == code)
    }

    pub fn code(self) -> u8 { self as u8 }

    pub fn label(self) -> &'static str {
        match self {
            PendingPayment => "Pending Payment",
            Confirmed => "Confirmed",
            Processing => "Processing",
            Shipped => "Shipped",
            Delivered => "Delivered",
            CancelledByUser => "Cancelled by User",
            Refunded => "Refunded",
            Returned => "Returned",
            PaymentExpired => "Payment Expired",
            CancelledByAdmin => "Cancelled by Admin",
            Complete => "Complete",
        }
    }

    pub fn badge(self) -> BadgeColor {
        match self {
            Delivered | Complete => BadgeColor::Green,
            CancelledByUser | PaymentExpired | CancelledByAdmin => BadgeColor::Red,
            Confirmed | Processing | Shipped => BadgeColor::Blue,
            PendingPayment | Refunded | Returned => BadgeColor::Gray,
        }
    }

    pub fn allowed_next(self) -> &'static [OrderStatus] {
        match self {
            PendingPayment => &[Confirmed, PaymentExpired, CancelledByAdmin],
            Confirmed => &[Processing, CancelledByAdmin],
            Processing => &[Shipped, CancelledByAdmin],
            Shipped => &[Delivered],
            Delivered => &[Complete, Returned],
            Returned => &[Refunded],
            CancelledByUser | Refunded | PaymentExpired | CancelledByAdmin | Complete => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(self) -> bool { self.allowed_next().is_empty() }

    /// Case-insensitive label lookup; spaces, `_`, `-` and parentheses are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = fold_label(label);
        if wanted.is_empty() { return None; }
        Self::ALL
            .iter()
            .copied()
            .find(|s| fold_label(s.label()) == wanted || fold_label(&format!("{:?}", s)) == wanted)
            .or_else(|| LABEL_ALIASES.iter().find(|(alias, _)| *alias == wanted).map(|(_, s)| *s))
    }

    /// Fraction of the Pending → Confirmed → Shipped → Delivered tracker that is filled.
    pub fn progress(self) -> f32 {
        f32::from(self.code().min(4)) / 4.0
    }
}

impl TryFrom<u8> for OrderStatus {
    type Error = String;
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(i64::from(code)).ok_or_else(|| format!("unknown order status code {}", code))
    }
}

impl From<OrderStatus> for u8 {
    fn from(status: OrderStatus) -> Self { status.code() }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

fn fold_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '_' | '-' | '(' | ')'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Status as the backend sends it: sometimes a code, sometimes a numeric string,
/// sometimes a label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawStatus {
    Code(i64),
    Text(String),
}

impl RawStatus {
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Self::Code),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Numeric code if the raw value is, or parses as, a number.
    pub fn numeric(&self) -> Option<i64> {
        match self {
            Self::Code(code) => Some(*code),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }

    pub fn resolve(&self) -> Option<OrderStatus> {
        match (self.numeric(), self) {
            (Some(code), _) => OrderStatus::from_code(code),
            (None, Self::Text(text)) => OrderStatus::from_label(text),
            (None, Self::Code(_)) => None,
        }
    }
}

impl From<OrderStatus> for RawStatus {
    fn from(status: OrderStatus) -> Self { Self::Code(i64::from(status.code())) }
}

impl From<&str> for RawStatus {
    fn from(text: &str) -> Self { Self::Text(text.to_string()) }
}

impl fmt::Display for RawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Code(code) => write!(f, "{}", code), Self::Text(text) => f.write_str(text) }
    }
}

/// Everything a status badge and its follow-up dropdown need.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub code: Option<i64>,
    pub status: Option<OrderStatus>,
    pub label: String,
    pub badge: BadgeColor,
    pub badge_class: &'static str,
    pub allowed_next: Vec<u8>,
}

impl StatusView {
    pub fn describe(raw: &RawStatus) -> Self {
        match raw.resolve() {
            Some(status) => Self {
                code: Some(i64::from(status.code())),
                status: Some(status),
                label: status.label().to_string(),
                badge: status.badge(),
                badge_class: status.badge().css_class(),
                allowed_next: status.allowed_next().iter().map(|s| s.code()).collect(),
            },
            None => Self {
                code: raw.numeric(),
                status: None,
                label: format!("Status {}", raw),
                badge: BadgeColor::Gray,
                badge_class: BadgeColor::Gray.css_class(),
                allowed_next: Vec::new(),
            },
        }
    }

    /// Options for the status dropdown: the current status first, then the allowed next ones.
    pub fn dropdown_options(&self) -> Vec<(Option<i64>, String)> {
        let mut options = vec![(self.code, self.label.clone())];
        options.extend(self.allowed_next.iter().filter_map(|code| {
            OrderStatus::from_code(i64::from(*code)).map(|s| (Some(i64::from(s.code())), s.label().to_string()))
        }));
        options
    }

    pub fn progress(&self) -> f32 {
        self.status.map(OrderStatus::progress).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_code_has_label_and_badge() {
        for code in 0..=10 {
            let view = StatusView::describe(&RawStatus::Code(code));
            assert!(!view.label.is_empty());
            assert!(["green", "red", "blue", "gray"].contains(&view.badge.as_str()));
            assert_eq!(view.code, Some(code));
        }
    }

    #[test]
    fn test_pending_payment_transitions() {
        let view = StatusView::describe(&RawStatus::Code(0));
        assert_eq!(view.allowed_next, vec![1, 8, 9]);
        assert_eq!(view.label, "Pending Payment");
    }

    #[test]
    fn test_shipped_only_goes_to_delivered() {
        assert_eq!(OrderStatus::Shipped.allowed_next(), &[OrderStatus::Delivered]);
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::CancelledByAdmin));
    }

    #[test]
    fn test_label_normalization() {
        assert_eq!(RawStatus::Text("Confirmed".into()).resolve(), Some(Confirmed));
        assert_eq!(RawStatus::Text("cancelled BY admin".into()).resolve(), Some(CancelledByAdmin));
        assert_eq!(RawStatus::Text("PaymentExpired".into()).resolve(), Some(PaymentExpired));
        assert_eq!(RawStatus::Text("Cancelled (User)".into()).resolve(), Some(CancelledByUser));
        assert_eq!(RawStatus::Text(" 3 ".into()).resolve(), Some(Shipped));
        assert_eq!(RawStatus::Text("pending".into()).resolve(), Some(PendingPayment));
    }

    #[test]
    fn test_unknown_status_is_neutral() {
        let view = StatusView::describe(&RawStatus::Code(42));
        assert_eq!(view.badge, BadgeColor::Gray);
        assert!(view.allowed_next.is_empty());
        assert_eq!(view.label, "Status 42");
        assert_eq!(view.dropdown_options().len(), 1);

        let view = StatusView::describe(&RawStatus::Text("On Hold".into()));
        assert_eq!(view.code, None);
        assert_eq!(view.badge_class, BadgeColor::Gray.css_class());
    }

    #[test]
    fn test_badges() {
        assert_eq!(Complete.badge(), BadgeColor::Green);
        assert_eq!(PaymentExpired.badge(), BadgeColor::Red);
        assert_eq!(Processing.badge(), BadgeColor::Blue);
        assert_eq!(Refunded.badge(), BadgeColor::Gray);
    }

    #[test]
    fn test_raw_status_from_json() {
        let raw: RawStatus = serde_json::from_str("4").unwrap();
        assert_eq!(raw.resolve(), Some(Delivered));
        let raw: RawStatus = serde_json::from_str("\"Shipped\"").unwrap();
        assert_eq!(StatusView::describe(&raw).allowed_next, vec![4]);
        assert_eq!(Shipped.progress(), 0.75);
        assert_eq!(Complete.progress(), 1.0);
    }
}
