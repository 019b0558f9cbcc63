//! `/api/Order` endpoints used by the admin order screens

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use validator::Validate;
use crate::api::client::{ApiClient, ApiRequest};
use crate::api::envelope::{self, Page, Reply};
use crate::domain::aggregates::{OrderStatus, RawStatus, StatusView};
use crate::{Result, StorefrontError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: i64,
    #[serde(default, deserialize_with = "envelope::string_or_number")]
    pub order_number: Option<String>,
    #[serde(default, deserialize_with = "envelope::string_or_number")]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status: Option<RawStatus>,
    #[serde(default, alias = "totalAmount")]
    pub total: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderSummary {
    pub fn status_view(&self) -> StatusView {
        StatusView::describe(self.status.as_ref().unwrap_or(&RawStatus::Text("N/A".to_string())))
    }
}

/// Filters for the paginated order list.
#[derive(Debug, Clone, Validate)]
pub struct OrderQuery {
    #[validate(range(min = 1))]
    pub page: u32,
    #[validate(range(min = 1, max = 100))]
    pub page_size: u32,
    pub status: Option<OrderStatus>,
    pub search_term: Option<String>,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self { page: 1, page_size: 10, status: None, search_term: None }
    }
}

#[derive(Debug, Serialize)]
struct StatusUpdate {
    status: u8,
}

pub struct OrdersApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn orders(&self) -> OrdersApi<'_> { OrdersApi { client: self } }
}

impl OrdersApi<'_> {
    pub async fn list(&self, query: &OrderQuery) -> Result<Page<OrderSummary>> {
        query.validate()?;
        let mut request = ApiRequest::get("/api/Order").query("page", query.page).query("pageSize", query.page_size);
        if let Some(status) = query.status {
            request = request.query("status", status.code());
        }
        if let Some(term) = query.search_term.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            request = request.query("searchTerm", term);
        }
        let reply = self.client.send(&request).await?;
        let items = envelope::items(&reply.data)
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(StorefrontError::from))
            .collect::<Result<Vec<OrderSummary>>>()?;
        Ok(Page { total_count: reply.total_count.unwrap_or(0), items })
    }

    /// Looks an order up by its order number, then by its database id.
    pub async fn find(&self, number_or_id: &str) -> Result<Value> {
        let key = number_or_id.trim();
        match self.client.send(&ApiRequest::get(format!("/api/Order/number/{}", key))).await {
            Ok(reply) if !reply.data.is_null() => return Ok(reply.data),
            Ok(_) => debug!(key, "no order with that number, trying id"),
            Err(StorefrontError::Api { status, .. }) => debug!(key, status, "order number lookup failed, trying id"),
            Err(e) => return Err(e),
        }
        Ok(self.client.send(&ApiRequest::get(format!("/api/Order/{}", key))).await?.data)
    }

    /// Moves an order to `next` if the transition table offers it. The backend
    /// has the final word.
    pub async fn update_status(&self, order: &OrderSummary, next: OrderStatus) -> Result<Reply> {
        let view = order.status_view();
        if let Some(current) = view.status {
            if !current.can_transition_to(next) {
                warn!(order_id = order.id, from = %current, to = %next, "status change not offered");
                return Err(StorefrontError::TransitionNotOffered { from: current, to: next });
            }
        }
        let request = ApiRequest::put(format!("/api/Order/{}/status", order.id)).json(&StatusUpdate { status: next.code() })?;
        self.client.send(&request).await
    }
}

/// RFC 3339, or a naive timestamp taken as UTC. Anything else reads as absent.
fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f").ok().map(|n| n.and_utc()))
    }))
}
