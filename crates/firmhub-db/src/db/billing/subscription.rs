use chrono::{DateTime, Utc};
use firmhub_core::models::{FirmSubscription, PaymentRecord, SubscriptionPlan, SubscriptionStatus};
use firmhub_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Subscription state mirrored from Stripe.
#[derive(Debug, Clone)]
pub struct SubscriptionSync<'a> {
    pub firm_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub stripe_customer_id: &'a str,
    pub stripe_subscription_id: &'a str,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

/// Plans, firm subscriptions, payments and processed webhook events.
#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "subscription_plans", db.operation = "select"))]
    pub async fn list_active_plans(&self) -> Result<Vec<SubscriptionPlan>, AppError> {
        let plans = sqlx::query_as::<Postgres, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE is_active = true ORDER BY amount_cents",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(plans)
    }

    #[tracing::instrument(skip(self), fields(db.table = "subscription_plans", db.operation = "select"))]
    pub async fn get_plan_by_code(&self, code: &str) -> Result<Option<SubscriptionPlan>, AppError> {
        let plan = sqlx::query_as::<Postgres, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE code = $1 AND is_active = true",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    #[tracing::instrument(skip(self), fields(db.table = "subscription_plans", db.operation = "select"))]
    pub async fn get_plan_by_price_id(
        &self,
        stripe_price_id: &str,
    ) -> Result<Option<SubscriptionPlan>, AppError> {
        let plan = sqlx::query_as::<Postgres, SubscriptionPlan>(
            "SELECT * FROM subscription_plans WHERE stripe_price_id = $1",
        )
        .bind(stripe_price_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    #[tracing::instrument(skip(self), fields(db.table = "firm_subscriptions", db.operation = "select"))]
    pub async fn get_by_firm(&self, firm_id: Uuid) -> Result<Option<FirmSubscription>, AppError> {
        let subscription = sqlx::query_as::<Postgres, FirmSubscription>(
            "SELECT * FROM firm_subscriptions WHERE firm_id = $1",
        )
        .bind(firm_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    #[tracing::instrument(skip(self), fields(db.table = "firm_subscriptions", db.operation = "select"))]
    pub async fn firm_id_by_customer(&self, customer_id: &str) -> Result<Option<Uuid>, AppError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT firm_id FROM firm_subscriptions WHERE stripe_customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }

    /// Remember the Stripe customer created for a firm at checkout.
    #[tracing::instrument(skip(self), fields(db.table = "firm_subscriptions", db.operation = "upsert"))]
    pub async fn attach_customer(
        &self,
        firm_id: Uuid,
        plan_id: Uuid,
        customer_id: &str,
    ) -> Result<FirmSubscription, AppError> {
        let subscription = sqlx::query_as::<Postgres, FirmSubscription>(
            r#"
            INSERT INTO firm_subscriptions (firm_id, plan_id, stripe_customer_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (firm_id) DO UPDATE
            SET plan_id = EXCLUDED.plan_id,
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(firm_id)
        .bind(plan_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscription)
    }

    /// Store the subscription as Stripe reports it.
    #[tracing::instrument(skip(self, sync), fields(db.table = "firm_subscriptions", db.operation = "upsert", firm_id = %sync.firm_id))]
    pub async fn sync(&self, sync: SubscriptionSync<'_>) -> Result<FirmSubscription, AppError> {
        let subscription = sqlx::query_as::<Postgres, FirmSubscription>(
            r#"
            INSERT INTO firm_subscriptions (
                firm_id, plan_id, stripe_customer_id, stripe_subscription_id, status,
                current_period_end, cancel_at_period_end
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (firm_id) DO UPDATE
            SET plan_id = COALESCE(EXCLUDED.plan_id, firm_subscriptions.plan_id),
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                stripe_subscription_id = EXCLUDED.stripe_subscription_id,
                status = EXCLUDED.status,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(sync.firm_id)
        .bind(sync.plan_id)
        .bind(sync.stripe_customer_id)
        .bind(sync.stripe_subscription_id)
        .bind(sync.status)
        .bind(sync.current_period_end)
        .bind(sync.cancel_at_period_end)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            firm_id = %subscription.firm_id,
            status = %subscription.status,
            "Subscription synchronized"
        );

        Ok(subscription)
    }

    #[tracing::instrument(skip(self), fields(db.table = "firm_subscriptions", db.operation = "update"))]
    pub async fn set_cancel_at_period_end(
        &self,
        firm_id: Uuid,
        cancel: bool,
    ) -> Result<Option<FirmSubscription>, AppError> {
        let subscription = sqlx::query_as::<Postgres, FirmSubscription>(
            r#"
            UPDATE firm_subscriptions
            SET cancel_at_period_end = $2, updated_at = NOW()
            WHERE firm_id = $1
            RETURNING *
            "#,
        )
        .bind(firm_id)
        .bind(cancel)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    /// Insert or refresh a payment by invoice id.
    #[tracing::instrument(skip(self), fields(db.table = "payments", db.operation = "upsert"))]
    pub async fn record_payment(
        &self,
        firm_id: Uuid,
        stripe_invoice_id: &str,
        amount_cents: i64,
        currency: &str,
        status: &str,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<PaymentRecord, AppError> {
        let payment = sqlx::query_as::<Postgres, PaymentRecord>(
            r#"
            INSERT INTO payments (firm_id, stripe_invoice_id, amount_cents, currency, status, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (stripe_invoice_id) DO UPDATE
            SET status = EXCLUDED.status, paid_at = COALESCE(EXCLUDED.paid_at, payments.paid_at)
            RETURNING *
            "#,
        )
        .bind(firm_id)
        .bind(stripe_invoice_id)
        .bind(amount_cents)
        .bind(currency)
        .bind(status)
        .bind(paid_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }

    #[tracing::instrument(skip(self), fields(db.table = "payments", db.operation = "select"))]
    pub async fn list_payments(&self, firm_id: Uuid) -> Result<Vec<PaymentRecord>, AppError> {
        let payments = sqlx::query_as::<Postgres, PaymentRecord>(
            "SELECT * FROM payments WHERE firm_id = $1 ORDER BY created_at DESC",
        )
        .bind(firm_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Record a webhook event id. Returns false when the event was already processed.
    #[tracing::instrument(skip(self), fields(db.table = "stripe_events", db.operation = "insert"))]
    pub async fn record_event(&self, event_id: &str, event_type: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO stripe_events (event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Forget an event so Stripe's redelivery is processed again after a failure.
    #[tracing::instrument(skip(self), fields(db.table = "stripe_events", db.operation = "delete"))]
    pub async fn forget_event(&self, event_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM stripe_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
