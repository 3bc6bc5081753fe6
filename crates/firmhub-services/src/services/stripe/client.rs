use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use uuid::Uuid;

use super::events::StripeSubscription;
use super::StripeError;

/// Hosted checkout session returned to the client for redirect.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Thin Stripe REST client (form-encoded requests, bearer secret key).
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Result<Self, StripeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(20))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| StripeError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    #[tracing::instrument(skip(self, email), fields(stripe.operation = "create_customer"))]
    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
        firm_id: Uuid,
    ) -> Result<String, StripeError> {
        let firm = firm_id.to_string();
        let params = [
            ("email", email),
            ("name", name),
            ("metadata[firm_id]", firm.as_str()),
        ];
        let customer: Customer = self.post("/v1/customers", &params).await?;
        tracing::info!(customer_id = %customer.id, firm_id = %firm_id, "Stripe customer created");
        Ok(customer.id)
    }

    #[tracing::instrument(skip(self, success_url, cancel_url), fields(stripe.operation = "create_checkout_session"))]
    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        firm_id: Uuid,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let firm = firm_id.to_string();
        let params = [
            ("mode", "subscription"),
            ("customer", customer_id),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("client_reference_id", firm.as_str()),
            ("metadata[firm_id]", firm.as_str()),
            ("subscription_data[metadata][firm_id]", firm.as_str()),
        ];
        self.post("/v1/checkout/sessions", &params).await
    }

    #[tracing::instrument(skip(self), fields(stripe.operation = "update_subscription"))]
    pub async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> Result<StripeSubscription, StripeError> {
        let flag = if cancel { "true" } else { "false" };
        self.post(
            &format!("/v1/subscriptions/{}", subscription_id),
            &[("cancel_at_period_end", flag)],
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(stripe.operation = "retrieve_subscription"))]
    pub async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, StripeError> {
        let response = self
            .http
            .get(format!("{}/v1/subscriptions/{}", self.api_base, subscription_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| StripeError::Transport(e.to_string()))?;
        decode(response).await
    }

    async fn post<T>(&self, path: &str, params: &[(&str, &str)]) -> Result<T, StripeError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await
            .map_err(|e| StripeError::Transport(e.to_string()))?;
        decode(response).await
    }
}

async fn decode<T>(response: Response) -> Result<T, StripeError>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| StripeError::Payload(e.to_string()));
    }

    let message = response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error.message)
        .unwrap_or_else(|| status.to_string());
    tracing::warn!(status = status.as_u16(), error = %message, "Stripe API call failed");
    Err(StripeError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_trailing_slash_is_trimmed() {
        let client = StripeClient::new("sk_test", "https://api.stripe.com/").unwrap();
        assert_eq!(client.api_base, "https://api.stripe.com");
    }
}
