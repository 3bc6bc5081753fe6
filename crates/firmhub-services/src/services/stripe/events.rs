use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::StripeError;

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
pub const EVENT_SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const EVENT_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const EVENT_INVOICE_PAID: &str = "invoice.paid";
pub const EVENT_INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";

/// Envelope of a webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// Decode `data.object` into the type matching the event.
    pub fn object<T: for<'de> Deserialize<'de>>(&self) -> Result<T, StripeError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| StripeError::Payload(format!("{} ({})", e, self.event_type)))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    pub firm_id: Option<String>,
}

impl Metadata {
    pub fn firm_id(&self) -> Option<Uuid> {
        self.firm_id.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl StripeCheckoutSession {
    pub fn firm_id(&self) -> Option<Uuid> {
        self.metadata.firm_id().or_else(|| {
            self.client_reference_id
                .as_deref()
                .and_then(|s| s.parse().ok())
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: Metadata,
    pub items: Option<SubscriptionItems>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItems {
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
}

impl StripeSubscription {
    /// Price of the first subscription item.
    pub fn price_id(&self) -> Option<&str> {
        self.items
            .as_ref()
            .and_then(|items| items.data.first())
            .map(|item| item.price.id.as_str())
    }

    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end.and_then(unix_to_datetime)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub customer: String,
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: String,
    pub status: Option<String>,
    pub status_transitions: Option<StatusTransitions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusTransitions {
    pub paid_at: Option<i64>,
}

impl StripeInvoice {
    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.status_transitions
            .as_ref()
            .and_then(|t| t.paid_at)
            .and_then(unix_to_datetime)
    }
}

fn unix_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_event_decodes() {
        let firm_id = Uuid::new_v4();
        let event: StripeEvent = serde_json::from_value(json!({
            "id": "evt_1",
            "type": EVENT_SUBSCRIPTION_UPDATED,
            "created": 1_700_000_000,
            "data": {"object": {
                "id": "sub_1",
                "customer": "cus_1",
                "status": "active",
                "current_period_end": 1_702_592_000,
                "cancel_at_period_end": false,
                "metadata": {"firm_id": firm_id.to_string()},
                "items": {"data": [{"price": {"id": "price_pro"}}]}
            }}
        }))
        .unwrap();

        let sub: StripeSubscription = event.object().unwrap();
        assert_eq!(sub.price_id(), Some("price_pro"));
        assert_eq!(sub.metadata.firm_id(), Some(firm_id));
        assert!(sub.period_end().is_some());
    }

    #[test]
    fn test_checkout_session_falls_back_to_reference_id() {
        let firm_id = Uuid::new_v4();
        let session: StripeCheckoutSession = serde_json::from_value(json!({
            "id": "cs_1",
            "customer": "cus_1",
            "subscription": "sub_1",
            "client_reference_id": firm_id.to_string()
        }))
        .unwrap();
        assert_eq!(session.firm_id(), Some(firm_id));
    }

    #[test]
    fn test_wrong_object_type_is_payload_error() {
        let event: StripeEvent = serde_json::from_value(json!({
            "id": "evt_2",
            "type": EVENT_INVOICE_PAID,
            "created": 1,
            "data": {"object": {"unexpected": true}}
        }))
        .unwrap();
        assert!(matches!(
            event.object::<StripeInvoice>(),
            Err(StripeError::Payload(_))
        ));
    }
}
