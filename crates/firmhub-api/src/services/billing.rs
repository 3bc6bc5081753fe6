//! Subscriptions and payments.
//!
//! Stripe stays the source of truth: checkout and cancellation call the Stripe API, and the
//! local rows only change when the matching webhook arrives.

use crate::auth::AuthUser;
use crate::services::firms;
use crate::state::AppState;
use firmhub_core::constants::STRIPE_WEBHOOK_TOLERANCE_SECS;
use firmhub_core::models::{
    CheckoutRequest, CheckoutResponse, Firm, FirmAction, FirmStatus, FirmSubscription, PaymentRecord,
    SubscriptionPlan, SubscriptionStatus,
};
use firmhub_core::AppError;
use firmhub_db::SubscriptionSync;
use firmhub_services::services::stripe::{
    EVENT_CHECKOUT_COMPLETED, EVENT_INVOICE_PAID, EVENT_INVOICE_PAYMENT_FAILED,
    EVENT_SUBSCRIPTION_CREATED, EVENT_SUBSCRIPTION_DELETED, EVENT_SUBSCRIPTION_UPDATED,
};
use firmhub_services::{
    verify_webhook_signature, StripeCheckoutSession, StripeEvent, StripeInvoice,
    StripeSubscription,
};
use uuid::Uuid;

#[cfg(feature = "stripe")]
use firmhub_services::StripeClient;

/// Outcome of a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Ignored,
}

fn billing_disabled() -> AppError {
    AppError::ServiceUnavailable("Billing is not enabled".to_string())
}

#[cfg(feature = "stripe")]
fn stripe(state: &AppState) -> Result<&StripeClient, AppError> {
    state.billing.stripe.as_ref().ok_or_else(billing_disabled)
}

pub async fn list_plans(state: &AppState) -> Result<Vec<SubscriptionPlan>, AppError> {
    state.db.subscriptions.list_active_plans().await
}

/// Owner or administrator.
async fn check_billing_access(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
) -> Result<(), AppError> {
    let firm = firms::load_firm(state, firm_id).await?;
    if firm.owner_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the owner can manage billing for this firm".to_string(),
        ));
    }
    Ok(())
}

pub async fn get_subscription(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
) -> Result<FirmSubscription, AppError> {
    check_billing_access(state, user, firm_id).await?;
    state
        .db
        .subscriptions
        .get_by_firm(firm_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Firm has no subscription".to_string()))
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
) -> Result<Vec<PaymentRecord>, AppError> {
    check_billing_access(state, user, firm_id).await?;
    state.db.subscriptions.list_payments(firm_id).await
}

fn return_urls(frontend_url: Option<&str>, firm_id: Uuid) -> Result<(String, String), AppError> {
    let base = frontend_url
        .map(|u| u.trim_end_matches('/'))
        .ok_or_else(|| AppError::Internal("FRONTEND_URL is required for checkout".to_string()))?;
    let page = format!("{}/firms/{}/billing", base, firm_id);
    Ok((
        format!("{}?checkout=success", page),
        format!("{}?checkout=cancel", page),
    ))
}

/// Start a Stripe checkout session for `plan_code`. The subscription itself is recorded
/// when `checkout.session.completed` arrives.
#[cfg(feature = "stripe")]
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
    request: CheckoutRequest,
) -> Result<CheckoutResponse, AppError> {
    let client = stripe(state)?;
    let firm = firms::load_owned_firm(state, user, firm_id).await?;
    let plan = state
        .db
        .subscriptions
        .get_plan_by_code(request.plan_code.trim())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Plan '{}' not found", request.plan_code)))?;
    let (success_url, cancel_url) = return_urls(state.billing.frontend_url.as_deref(), firm_id)?;

    let existing = state
        .db
        .subscriptions
        .get_by_firm(firm_id)
        .await?
        .and_then(|s| s.stripe_customer_id);
    let customer_id = match existing {
        Some(id) => id,
        None => {
            let owner = state
                .db
                .users
                .get_by_id(firm.owner_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Firm owner not found".to_string()))?;
            let id = client.create_customer(&owner.email, &firm.name, firm_id).await?;
            state
                .db
                .subscriptions
                .attach_customer(firm_id, plan.id, &id)
                .await?;
            id
        }
    };

    let session = client
        .create_checkout_session(
            &customer_id,
            &plan.stripe_price_id,
            firm_id,
            &success_url,
            &cancel_url,
        )
        .await?;
    let url = session.url.ok_or_else(|| {
        AppError::StripeError("Checkout session was created without a URL".to_string())
    })?;

    tracing::info!(firm_id = %firm_id, plan = %plan.code, session_id = %session.id, "Checkout session created");
    Ok(CheckoutResponse {
        session_id: session.id,
        url,
    })
}

#[cfg(not(feature = "stripe"))]
pub async fn checkout(
    _state: &AppState,
    _user: &AuthUser,
    _firm_id: Uuid,
    _request: CheckoutRequest,
) -> Result<CheckoutResponse, AppError> {
    Err(billing_disabled())
}

/// Cancel at the end of the paid period.
#[cfg(feature = "stripe")]
pub async fn cancel(
    state: &AppState,
    user: &AuthUser,
    firm_id: Uuid,
) -> Result<FirmSubscription, AppError> {
    let client = stripe(state)?;
    firms::load_owned_firm(state, user, firm_id).await?;
    let subscription_id = state
        .db
        .subscriptions
        .get_by_firm(firm_id)
        .await?
        .and_then(|s| s.stripe_subscription_id)
        .ok_or_else(|| AppError::NotFound("Firm has no active subscription".to_string()))?;

    client.set_cancel_at_period_end(&subscription_id, true).await?;
    tracing::info!(firm_id = %firm_id, subscription_id = %subscription_id, "Subscription set to cancel at period end");

    state
        .db
        .subscriptions
        .set_cancel_at_period_end(firm_id, true)
        .await?
        .ok_or_else(|| AppError::NotFound("Firm has no subscription".to_string()))
}

#[cfg(not(feature = "stripe"))]
pub async fn cancel(
    _state: &AppState,
    _user: &AuthUser,
    _firm_id: Uuid,
) -> Result<FirmSubscription, AppError> {
    Err(billing_disabled())
}

/// Verify, de-duplicate and apply a Stripe webhook delivery.
///
/// A failed event is forgotten again so the retry Stripe sends is processed.
pub async fn handle_webhook(
    state: &AppState,
    payload: &[u8],
    signature: Option<&str>,
) -> Result<WebhookOutcome, AppError> {
    if !state.billing.enabled() {
        return Err(billing_disabled());
    }
    let secret = state
        .billing
        .webhook_secret
        .as_deref()
        .ok_or_else(billing_disabled)?;
    verify_webhook_signature(
        payload,
        signature,
        secret,
        STRIPE_WEBHOOK_TOLERANCE_SECS,
        chrono::Utc::now().timestamp(),
    )?;

    let event: StripeEvent = serde_json::from_slice(payload)
        .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

    if !state
        .db
        .subscriptions
        .record_event(&event.id, &event.event_type)
        .await?
    {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Duplicate webhook ignored");
        return Ok(WebhookOutcome::Duplicate);
    }

    match apply_event(state, &event).await {
        Ok(outcome) => {
            tracing::info!(event_id = %event.id, event_type = %event.event_type, ?outcome, "Webhook processed");
            Ok(outcome)
        }
        Err(e) => {
            if let Err(forget) = state.db.subscriptions.forget_event(&event.id).await {
                tracing::error!(error = %forget, event_id = %event.id, "Failed to release webhook event");
            }
            Err(e)
        }
    }
}

async fn apply_event(state: &AppState, event: &StripeEvent) -> Result<WebhookOutcome, AppError> {
    match event.event_type.as_str() {
        EVENT_CHECKOUT_COMPLETED => {
            let session: StripeCheckoutSession = event.object()?;
            checkout_completed(state, &session).await
        }
        EVENT_SUBSCRIPTION_CREATED | EVENT_SUBSCRIPTION_UPDATED | EVENT_SUBSCRIPTION_DELETED => {
            let subscription: StripeSubscription = event.object()?;
            sync_subscription(state, &subscription, None).await
        }
        EVENT_INVOICE_PAID => {
            let invoice: StripeInvoice = event.object()?;
            record_invoice(state, &invoice, true).await
        }
        EVENT_INVOICE_PAYMENT_FAILED => {
            let invoice: StripeInvoice = event.object()?;
            record_invoice(state, &invoice, false).await
        }
        _ => Ok(WebhookOutcome::Ignored),
    }
}

#[cfg(feature = "stripe")]
async fn checkout_completed(
    state: &AppState,
    session: &StripeCheckoutSession,
) -> Result<WebhookOutcome, AppError> {
    let Some(subscription_id) = session.subscription.as_deref() else {
        tracing::debug!(session_id = %session.id, "Checkout session without subscription");
        return Ok(WebhookOutcome::Ignored);
    };
    let subscription = stripe(state)?.retrieve_subscription(subscription_id).await?;
    sync_subscription(state, &subscription, session.firm_id()).await
}

#[cfg(not(feature = "stripe"))]
async fn checkout_completed(
    _state: &AppState,
    _session: &StripeCheckoutSession,
) -> Result<WebhookOutcome, AppError> {
    Err(billing_disabled())
}

async fn resolve_firm(
    state: &AppState,
    hint: Option<Uuid>,
    customer_id: &str,
) -> Result<Option<Uuid>, AppError> {
    if hint.is_some() {
        return Ok(hint);
    }
    state.db.subscriptions.firm_id_by_customer(customer_id).await
}

async fn sync_subscription(
    state: &AppState,
    subscription: &StripeSubscription,
    firm_hint: Option<Uuid>,
) -> Result<WebhookOutcome, AppError> {
    let hint = firm_hint.or_else(|| subscription.metadata.firm_id());
    let Some(firm_id) = resolve_firm(state, hint, &subscription.customer).await? else {
        tracing::warn!(subscription_id = %subscription.id, customer = %subscription.customer, "Subscription for unknown firm");
        return Ok(WebhookOutcome::Ignored);
    };

    let status: SubscriptionStatus = subscription.status.parse().map_err(|_| {
        AppError::StripeError(format!("Unknown subscription status '{}'", subscription.status))
    })?;
    let plan_id = match subscription.price_id() {
        Some(price) => state
            .db
            .subscriptions
            .get_plan_by_price_id(price)
            .await?
            .map(|p| p.id),
        None => None,
    };

    let synced = state
        .db
        .subscriptions
        .sync(SubscriptionSync {
            firm_id,
            plan_id,
            stripe_customer_id: &subscription.customer,
            stripe_subscription_id: &subscription.id,
            status,
            current_period_end: subscription.period_end(),
            cancel_at_period_end: subscription.cancel_at_period_end,
        })
        .await?;

    let firm = firms::load_firm(state, firm_id).await?;
    if let Err(e) = align_firm(state, firm, synced.status).await {
        tracing::warn!(error = %e, firm_id = %firm_id, "Billing status change not applied");
    }
    Ok(WebhookOutcome::Processed)
}

/// Firm status change implied by a subscription status.
///
/// A paid subscription publishes an approved firm; a subscription that ended or went
/// unpaid suspends a published firm. Reinstating a suspended firm stays an admin decision.
pub fn firm_action_for(subscription: SubscriptionStatus, firm: FirmStatus) -> Option<FirmAction> {
    if subscription.grants_access() && firm == FirmStatus::Approved {
        return Some(FirmAction::Activate);
    }
    let lapsed = subscription.is_terminal() || subscription == SubscriptionStatus::Unpaid;
    if lapsed && firm.is_public() {
        return Some(FirmAction::Suspend);
    }
    None
}

async fn align_firm(
    state: &AppState,
    firm: Firm,
    subscription: SubscriptionStatus,
) -> Result<Firm, AppError> {
    let Some(action) = firm_action_for(subscription, firm.status) else {
        return Ok(firm);
    };
    let updated = firms::transition(state, firm.id, action, None, None).await?;
    tracing::info!(firm_id = %firm.id, action = %action, subscription = %subscription, "Firm status follows subscription");
    Ok(updated)
}

/// Apply the stored subscription to `firm`, e.g. right after an approval.
pub async fn follow_subscription(state: &AppState, firm: Firm) -> Result<Firm, AppError> {
    match state.db.subscriptions.get_by_firm(firm.id).await? {
        Some(subscription) => align_firm(state, firm, subscription.status).await,
        None => Ok(firm),
    }
}

async fn record_invoice(
    state: &AppState,
    invoice: &StripeInvoice,
    paid: bool,
) -> Result<WebhookOutcome, AppError> {
    let Some(firm_id) = state
        .db
        .subscriptions
        .firm_id_by_customer(&invoice.customer)
        .await?
    else {
        tracing::warn!(invoice_id = %invoice.id, customer = %invoice.customer, "Invoice for unknown customer");
        return Ok(WebhookOutcome::Ignored);
    };

    let (status, amount, paid_at) = if paid {
        ("paid", invoice.amount_paid, invoice.paid_at())
    } else {
        ("failed", invoice.amount_due, None)
    };
    state
        .db
        .subscriptions
        .record_payment(firm_id, &invoice.id, amount, &invoice.currency, status, paid_at)
        .await?;
    Ok(WebhookOutcome::Processed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_subscription_publishes_approved_firm() {
        assert_eq!(
            firm_action_for(SubscriptionStatus::Active, FirmStatus::Approved),
            Some(FirmAction::Activate)
        );
        assert_eq!(
            firm_action_for(SubscriptionStatus::Trialing, FirmStatus::Approved),
            Some(FirmAction::Activate)
        );
        assert_eq!(firm_action_for(SubscriptionStatus::Active, FirmStatus::Active), None);
        assert_eq!(firm_action_for(SubscriptionStatus::Active, FirmStatus::Draft), None);
    }

    #[test]
    fn test_lapsed_subscription_suspends_active_firm() {
        assert_eq!(
            firm_action_for(SubscriptionStatus::Canceled, FirmStatus::Active),
            Some(FirmAction::Suspend)
        );
        assert_eq!(
            firm_action_for(SubscriptionStatus::Unpaid, FirmStatus::Active),
            Some(FirmAction::Suspend)
        );
        assert_eq!(firm_action_for(SubscriptionStatus::PastDue, FirmStatus::Active), None);
    }

    #[test]
    fn test_lapsed_subscription_suspends_approved_firm() {
        assert_eq!(
            firm_action_for(SubscriptionStatus::Canceled, FirmStatus::Approved),
            Some(FirmAction::Suspend)
        );
        assert_eq!(
            firm_action_for(SubscriptionStatus::Unpaid, FirmStatus::Approved),
            Some(FirmAction::Suspend)
        );
        assert_eq!(firm_action_for(SubscriptionStatus::Canceled, FirmStatus::AwaitingReview), None);
    }

    #[test]
    fn test_suspended_firm_is_not_reinstated_by_billing() {
        assert_eq!(firm_action_for(SubscriptionStatus::Active, FirmStatus::Suspended), None);
    }

    #[test]
    fn test_return_urls() {
        let firm = Uuid::new_v4();
        let (success, cancel) = return_urls(Some("https://app.example.com/"), firm).unwrap();
        assert_eq!(
            success,
            format!("https://app.example.com/firms/{}/billing?checkout=success", firm)
        );
        assert!(cancel.ends_with("?checkout=cancel"));
        assert!(return_urls(None, firm).is_err());
    }
}
